use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_rustls::rustls::ClientConfig;

use super::response::{code_matches, parse_status_line, Reply};
use super::tls::open_transport;
use super::NntpError;
use crate::article::EncodedArticle;
use crate::config::ServerConfig;
use crate::throughput::{SampleSender, ThroughputSample};

pub trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> NntpIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedIo = Box<dyn NntpIo>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Ready,
    Posting,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Posting => "posting",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

fn connection_closed() -> NntpError {
    NntpError::Protocol("connection closed".to_string())
}

/// One NNTP connection used for posting.
pub struct NntpSession {
    stream: Option<BufReader<BoxedIo>>,
    state: SessionState,
    samples: Option<SampleSender>,
}

impl NntpSession {
    /// A disconnected session. Each chunk written while posting is reported on `samples`.
    pub fn new(samples: Option<SampleSender>) -> Self {
        Self {
            stream: None,
            state: SessionState::Disconnected,
            samples,
        }
    }

    /// Open the transport to `server` (TLS when configured) and consume the greeting.
    pub async fn connect(
        server: &ServerConfig,
        tls_config: Option<Arc<ClientConfig>>,
        samples: Option<SampleSender>,
    ) -> Result<Self, NntpError> {
        let mut session = Self::new(samples);
        session.state = SessionState::Connecting;
        let io = open_transport(server, tls_config).await?;
        session.attach(io).await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Take over an already-open transport and read the server greeting.
    pub async fn attach(&mut self, io: BoxedIo) -> Result<(), NntpError> {
        self.state = SessionState::Connecting;
        self.stream = Some(BufReader::new(io));
        match self.read_reply().await {
            Ok(greeting) => {
                tracing::debug!(code = greeting.code, message = %greeting.message, "server greeting");
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.stream = None;
                self.state = SessionState::Closed;
                Err(NntpError::Connect(format!("reading greeting: {e}")))
            }
        }
    }

    /// `AUTHINFO USER`, then `AUTHINFO PASS` if the server asks for it (3xx).
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), NntpError> {
        if self.state != SessionState::Connected {
            return Err(self.wrong_state("authenticate"));
        }
        self.state = SessionState::Authenticating;

        let mut reply = self.command(&format!("AUTHINFO USER {username}"), 0).await?;
        if code_matches(3, reply.code) {
            reply = self.command(&format!("AUTHINFO PASS {password}"), 0).await?;
        }
        if !code_matches(2, reply.code) {
            self.state = SessionState::Connected;
            return Err(NntpError::Auth {
                code: reply.code,
                message: reply.message,
            });
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Post one article, writing it in chunks of at most `chunk_size` bytes.
    ///
    /// Failures other than protocol violations come back as
    /// [`NntpError::Post`] and leave the session ready for the next article.
    pub async fn post(&mut self, article: &EncodedArticle, chunk_size: usize) -> Result<(), NntpError> {
        if !matches!(self.state, SessionState::Connected | SessionState::Ready) {
            return Err(self.wrong_state("post"));
        }
        self.state = SessionState::Posting;
        let result = self.send_article(article, chunk_size).await;
        self.state = SessionState::Ready;
        result.map_err(|e| match e {
            NntpError::Protocol(msg) => NntpError::Protocol(msg),
            other => NntpError::Post(format!("{}: {}", article.message_id(), other)),
        })
    }

    async fn send_article(&mut self, article: &EncodedArticle, chunk_size: usize) -> Result<(), NntpError> {
        self.command("POST", 3).await?;

        let stream = self.stream.as_mut().ok_or_else(connection_closed)?;
        for chunk in article.as_bytes().chunks(chunk_size.max(1)) {
            stream.write_all(chunk).await?;
            if let Some(tx) = &self.samples {
                let _ = tx.send(ThroughputSample::now(chunk.len() as u64));
            }
        }

        self.command(".", 240).await?;
        Ok(())
    }

    /// Send `QUIT` and close the connection. The session is closed even if the
    /// exchange fails; later commands fail with a "connection closed" error.
    pub async fn quit(&mut self) -> Result<(), NntpError> {
        if self.stream.is_none() {
            self.state = SessionState::Closed;
            return Ok(());
        }
        let result = self.command("QUIT", 0).await.map(|_| ());
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
        self.state = SessionState::Closed;
        result
    }

    /// Drop the transport without any further exchange. Used once the
    /// server's replies can no longer be trusted.
    pub fn abandon(&mut self) {
        drop(self.stream.take());
        self.state = SessionState::Closed;
    }

    fn wrong_state(&self, op: &str) -> NntpError {
        match self.state {
            SessionState::Closed | SessionState::Disconnected => connection_closed(),
            state => NntpError::Protocol(format!("cannot {op} while {state}")),
        }
    }

    /// Send one command line and read its reply; `expect` as in [`code_matches`].
    async fn command(&mut self, line: &str, expect: u16) -> Result<Reply, NntpError> {
        let stream = self.stream.as_mut().ok_or_else(connection_closed)?;
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;

        let reply = self.read_reply().await?;
        if !code_matches(expect, reply.code) {
            return Err(NntpError::UnexpectedResponse {
                code: reply.code,
                message: reply.message,
            });
        }
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<Reply, NntpError> {
        let stream = self.stream.as_mut().ok_or_else(connection_closed)?;
        let mut line = Vec::new();
        let n = stream.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(NntpError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        parse_status_line(&String::from_utf8_lossy(&line))
    }
}
