//! Per-server article generator.
//!
//! Walks the file list in order, encodes every part into the server's queue
//! and keeps the shared cache's reader counts balanced. Runs on a blocking
//! thread: it reads mapped pages and does the CPU-bound encoding.

use anyhow::{Context, Result};

use super::queue::ArticleProducer;
use crate::article::{encode_article, ArticlePart};
use crate::cache::FileCache;
use crate::config::{RunConfig, SubjectMode};
use crate::enumerate::FileEntry;
use crate::segmenter::plan_parts;

/// Subject for every part of `file`.
pub(super) fn subject_for(mode: &SubjectMode, file: &FileEntry) -> String {
    match mode {
        SubjectMode::Explicit(subject) => subject.clone(),
        SubjectMode::ParentDirectory => file.parent_name(),
    }
}

/// Encode and enqueue every part of every file, then finish the queue.
///
/// `readers` is the number of servers sharing `cache`. Once the queue's
/// consumers are all gone, encoding stops but each remaining file is still
/// acquired and decremented so the other servers can release their mappings.
/// Returns the number of articles queued.
pub(super) fn generate(
    server: &str,
    files: &[FileEntry],
    cache: &FileCache,
    readers: usize,
    cfg: &RunConfig,
    producer: ArticleProducer,
) -> Result<usize> {
    let file_total = files.len();
    let mut queued = 0usize;
    let mut open = true;

    for (idx, file) in files.iter().enumerate() {
        let mapped = cache
            .acquire(&file.path, readers)
            .with_context(|| format!("mapping {}", file.path.display()))?;

        if open && producer.is_closed() {
            tracing::warn!(server, "no connections left; skipping remaining articles");
            open = false;
        }

        if open {
            let subject = subject_for(&cfg.subject, file);
            let file_name = file.file_name();
            let parts = plan_parts(mapped.size(), cfg.article_size);
            let part_total = parts.len() as u64;
            tracing::debug!(server, file = %file_name, parts = part_total, "encoding file");

            for range in parts {
                let data = mapped.slice(range.begin, range.end)?;
                let part = ArticlePart {
                    part_num: range.number,
                    part_total,
                    file_num: idx + 1,
                    file_total,
                    begin: range.begin,
                    end: range.end,
                    file_size: mapped.size(),
                    file_name: file_name.clone(),
                    subject: subject.clone(),
                };
                let article = encode_article(data, &part, cfg)
                    .with_context(|| format!("encoding part {} of {}", range.number, file_name))?;
                if producer.push_blocking(article).is_err() {
                    tracing::warn!(server, "no connections left; skipping remaining articles");
                    open = false;
                    break;
                }
                queued += 1;
            }
        }

        drop(mapped);
        if cache.decrement(&file.path)? {
            cache.release(&file.path)?;
        }
    }

    producer.finish();
    tracing::debug!(server, queued, "generator finished");
    Ok(queued)
}
