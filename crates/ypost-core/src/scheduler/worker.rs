//! One connection of a server pipeline: connect, authenticate, post until
//! the queue is drained.

use std::sync::Arc;
use std::time::Instant;

use tokio_rustls::rustls::ClientConfig;

use super::queue::ArticleConsumer;
use super::totals::Totals;
use crate::config::ServerConfig;
use crate::nntp::{NntpError, NntpSession};
use crate::throughput::SampleSender;

async fn open_session(
    server: &ServerConfig,
    tls: Option<Arc<ClientConfig>>,
    samples: Option<SampleSender>,
) -> Result<NntpSession, NntpError> {
    let mut session = NntpSession::connect(server, tls, samples).await?;
    if let Some((username, password)) = server.credentials() {
        session.authenticate(username, password).await?;
    }
    Ok(session)
}

/// Run one connection to completion. Never fails: a connection that cannot be
/// established reports empty totals.
pub(super) async fn run_connection(
    server: Arc<ServerConfig>,
    conn: usize,
    tls: Option<Arc<ClientConfig>>,
    queue: ArticleConsumer,
    chunk_size: usize,
    samples: Option<SampleSender>,
) -> Totals {
    let name = server.name.as_str();
    tracing::debug!(server = name, conn, endpoint = %server.endpoint(), "connecting");
    let mut session = match open_session(&server, tls, samples).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(server = name, conn, error = %e, "connection failed");
            return Totals::default();
        }
    };
    tracing::info!(server = name, conn, "ready");

    let totals = post_articles(&mut session, &queue, chunk_size, name, conn).await;
    drop(queue);

    let secs = totals.elapsed().as_secs_f64();
    let speed = if secs > 0.0 {
        totals.bytes as f64 / secs / 1024.0
    } else {
        0.0
    };
    tracing::info!(
        server = name,
        conn,
        bytes = totals.bytes,
        posted = totals.posted,
        failed = totals.failed,
        "posted {} bytes in {:.1?} at {:.1} KiB/s",
        totals.bytes,
        totals.elapsed(),
        speed
    );

    if let Err(e) = session.quit().await {
        tracing::warn!(server = name, conn, error = %e, "error while closing connection");
    }
    totals
}

/// Post articles from `queue` until it is closed and drained, or until a
/// fatal error ends the connection. A fatal error abandons the session, so a
/// later `quit` sends nothing.
pub(super) async fn post_articles(
    session: &mut NntpSession,
    queue: &ArticleConsumer,
    chunk_size: usize,
    server: &str,
    conn: usize,
) -> Totals {
    let mut totals = Totals::started();
    while let Some(article) = queue.next().await {
        match session.post(&article, chunk_size).await {
            Ok(()) => {
                tracing::debug!(server, conn, message_id = article.message_id(), "posted");
                totals.bytes += article.len() as u64;
                totals.posted += 1;
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(server, conn, error = %e, "post error");
                totals.failed += 1;
            }
            Err(e) => {
                tracing::error!(server, conn, error = %e, "connection lost");
                totals.failed += 1;
                session.abandon();
                break;
            }
        }
    }
    totals.end = Some(Instant::now());
    totals
}
