//! Orchestration: one pipeline per server, all sharing one file cache.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinSet;

use super::generator::generate;
use super::queue::{article_queue, ArticleConsumer, ArticleProducer};
use super::totals::{RunReport, ServerReport, Totals};
use super::worker::run_connection;
use crate::cache::FileCache;
use crate::config::{RunConfig, ServerConfig};
use crate::enumerate::FileEntry;
use crate::nntp::build_tls_config;
use crate::throughput::{run_sampler, sample_channel, SampleSender, SAMPLE_INTERVAL};

enum TaskOutcome {
    Generated { server: usize, queued: usize },
    Connection { server: usize, totals: Totals },
}

/// The queue feeding one server's connections: one slot per connection.
pub(super) fn server_queue(server: &ServerConfig) -> (ArticleProducer, ArticleConsumer) {
    article_queue(server.connections)
}

/// Per-server collection state while tasks finish.
struct Pending {
    queued: Option<usize>,
    totals: Vec<Totals>,
    report: Option<ServerReport>,
}

/// Post `files` to every configured server, drawing a status line on stderr.
/// Returns once every connection of every server has finished.
pub async fn run_post(files: Vec<FileEntry>, config: Arc<RunConfig>) -> Result<RunReport> {
    let (samples, rx) = sample_channel();
    let sampler = tokio::spawn(run_sampler(rx, SAMPLE_INTERVAL, tokio::io::stderr()));
    let cache = Arc::new(FileCache::new());

    match run_pipelines(Arc::new(files), config, cache, Some(samples)).await {
        Ok(report) => {
            if let Err(e) = sampler.await {
                tracing::warn!(error = %e, "throughput sampler failed");
            }
            Ok(report)
        }
        Err(e) => {
            sampler.abort();
            Err(e)
        }
    }
}

/// Run every server pipeline against `cache`. Cache, encoding and setup
/// errors abort all outstanding tasks and are returned.
pub async fn run_pipelines(
    files: Arc<Vec<FileEntry>>,
    config: Arc<RunConfig>,
    cache: Arc<FileCache>,
    samples: Option<SampleSender>,
) -> Result<RunReport> {
    let readers = config.servers.len();
    let mut tasks: JoinSet<Result<TaskOutcome>> = JoinSet::new();
    let mut pending = Vec::with_capacity(readers);

    for (idx, server) in config.servers.iter().enumerate() {
        let server = Arc::new(server.clone());
        let connections = server.connections;
        let tls = if server.tls {
            Some(
                build_tls_config(server.insecure_tls)
                    .with_context(|| format!("TLS setup for server {}", server.name))?,
            )
        } else {
            None
        };
        tracing::info!(
            server = %server.name,
            endpoint = %server.endpoint(),
            connections,
            tls = server.tls,
            "starting pipeline"
        );

        let (producer, consumer) = server_queue(&server);
        for conn in 1..=connections {
            let server = Arc::clone(&server);
            let tls = tls.clone();
            let consumer = consumer.clone();
            let samples = samples.clone();
            let chunk_size = config.chunk_size;
            tasks.spawn(async move {
                let totals =
                    run_connection(server, conn, tls, consumer, chunk_size, samples).await;
                Ok(TaskOutcome::Connection { server: idx, totals })
            });
        }
        drop(consumer);

        let files = Arc::clone(&files);
        let cache = Arc::clone(&cache);
        let config = Arc::clone(&config);
        tasks.spawn_blocking(move || {
            let queued = generate(&server.name, &files, &cache, readers, &config, producer)
                .with_context(|| format!("server {}", server.name))?;
            Ok(TaskOutcome::Generated { server: idx, queued })
        });

        pending.push(Pending {
            queued: None,
            totals: Vec::with_capacity(connections),
            report: None,
        });
    }
    drop(samples);

    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                tasks.abort_all();
                return Err(anyhow::anyhow!("pipeline task join: {}", e));
            }
        };

        let idx = match outcome {
            TaskOutcome::Generated { server, queued } => {
                pending[server].queued = Some(queued);
                server
            }
            TaskOutcome::Connection { server, totals } => {
                pending[server].totals.push(totals);
                server
            }
        };

        let server = &config.servers[idx];
        let entry = &mut pending[idx];
        if entry.totals.len() < server.connections {
            continue;
        }
        if let Some(queued) = entry.queued {
            let report = ServerReport::from_totals(&server.name, queued, &entry.totals);
            tracing::info!(
                server = %report.name,
                connected = report.connected,
                posted = report.posted,
                failed = report.failed,
                "posted {} bytes in {:.1?} at {:.1} KiB/s",
                report.bytes,
                report.elapsed,
                report.bytes_per_sec() / 1024.0
            );
            entry.report = Some(report);
        }
    }

    let servers = pending
        .into_iter()
        .zip(&config.servers)
        .map(|(p, server)| {
            p.report
                .ok_or_else(|| anyhow::anyhow!("server {} finished without a report", server.name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RunReport {
        files: files.len(),
        servers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{encode_article, ArticlePart};
    use crate::config::SubjectMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn server(connections: usize) -> ServerConfig {
        ServerConfig {
            name: "news".into(),
            address: "127.0.0.1".into(),
            port: 119,
            username: None,
            password: None,
            connections,
            tls: false,
            insecure_tls: false,
        }
    }

    fn article(n: u64) -> crate::article::EncodedArticle {
        let cfg = RunConfig {
            from: "a <a@b>".into(),
            newsgroups: "alt.test".into(),
            subject_prefix: None,
            article_size: 10,
            chunk_size: 10,
            subject: SubjectMode::Explicit("s".into()),
            servers: Vec::new(),
        };
        let part = ArticlePart {
            part_num: n,
            part_total: 10,
            file_num: 1,
            file_total: 1,
            begin: 0,
            end: 10,
            file_size: 100,
            file_name: "f.bin".into(),
            subject: "s".into(),
        };
        encode_article(&[0u8; 10], &part, &cfg).unwrap()
    }

    #[test]
    fn server_queue_holds_one_article_per_connection() {
        let (producer, consumer) = server_queue(&server(3));
        let pushed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&pushed);
        let generator = std::thread::spawn(move || {
            for n in 1..=10 {
                if producer.push_blocking(article(n)).is_err() {
                    break;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(pushed.load(Ordering::SeqCst), 3);

        drop(consumer);
        generator.join().unwrap();
        assert_eq!(pushed.load(Ordering::SeqCst), 3);
    }
}
