//! Transport setup: TCP connect and optional TLS handshake.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use super::session::BoxedIo;
use super::NntpError;
use crate::config::ServerConfig;

/// Upper bound on TCP connect plus TLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Client TLS config shared by all connections to one server.
///
/// With `insecure` set, certificates are accepted without verification.
pub fn build_tls_config(insecure: bool) -> Result<Arc<ClientConfig>, NntpError> {
    let provider = rustls::crypto::ring::default_provider();
    let _ = provider.clone().install_default();

    let config = if insecure {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier::new()))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Connect to `server`, wrapping the socket in TLS when `tls_config` is given.
pub async fn open_transport(
    server: &ServerConfig,
    tls_config: Option<Arc<ClientConfig>>,
) -> Result<BoxedIo, NntpError> {
    connect_within(server, tls_config, CONNECT_TIMEOUT).await
}

async fn connect_within(
    server: &ServerConfig,
    tls_config: Option<Arc<ClientConfig>>,
    limit: Duration,
) -> Result<BoxedIo, NntpError> {
    let endpoint = server.endpoint();
    let connect = async {
        let tcp = TcpStream::connect((server.address.as_str(), server.port))
            .await
            .map_err(|e| NntpError::Connect(format!("{endpoint}: {e}")))?;
        let _ = tcp.set_nodelay(true);

        match tls_config {
            Some(config) => {
                let server_name = ServerName::try_from(server.address.clone()).map_err(|_| {
                    NntpError::Connect(format!("invalid TLS server name: {}", server.address))
                })?;
                let tls = TlsConnector::from(config)
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| NntpError::Connect(format!("{endpoint}: TLS handshake: {e}")))?;
                Ok::<BoxedIo, NntpError>(Box::new(tls))
            }
            None => Ok(Box::new(tcp) as BoxedIo),
        }
    };

    tokio::time::timeout(limit, connect)
        .await
        .map_err(|_| NntpError::Connect(format!("{endpoint}: timed out after {limit:?}")))?
}

#[derive(Debug)]
struct NoVerifier {
    supported_schemes: Vec<rustls::SignatureScheme>,
}

impl NoVerifier {
    fn new() -> Self {
        Self {
            supported_schemes: rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes(),
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.supported_schemes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(port: u16) -> ServerConfig {
        ServerConfig {
            name: "local".into(),
            address: "127.0.0.1".into(),
            port,
            username: None,
            password: None,
            connections: 1,
            tls: false,
            insecure_tls: false,
        }
    }

    #[test]
    fn builds_both_verifier_modes() {
        assert!(build_tls_config(false).is_ok());
        assert!(build_tls_config(true).is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        // Bind then drop to get a port with no listener.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = open_transport(&server(port), None).await.err().unwrap();
        assert!(matches!(err, NntpError::Connect(_)));
    }

    #[tokio::test]
    async fn plain_transport_reaches_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        assert!(open_transport(&server(port), None).await.is_ok());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_handshake_is_connect_error() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ = sock.write_all(b"200 plain text, not TLS\r\n").await;
            let _ = sock.shutdown().await;
        });

        let tls = build_tls_config(true).unwrap();
        let err = open_transport(&server(port), Some(tls)).await.err().unwrap();
        match err {
            NntpError::Connect(msg) => assert!(msg.contains("TLS handshake"), "{msg}"),
            other => panic!("expected a connect error, got {other:?}"),
        }
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn silent_peer_hits_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(sock);
        });

        let tls = build_tls_config(true).unwrap();
        let started = std::time::Instant::now();
        let err = connect_within(&server(port), Some(tls), Duration::from_millis(100))
            .await
            .err()
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            NntpError::Connect(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected a connect error, got {other:?}"),
        }
        peer.abort();
    }
}
