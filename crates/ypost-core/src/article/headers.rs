//! Posting headers: subject line and Message-ID.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::ArticlePart;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A Message-ID unique within the run: nanosecond timestamp, a process-wide
/// sequence number, and a suffix naming this process.
pub fn message_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("<{}.{}${}{}@{}>", nanos, seq, crate::TOOL_NAME, std::process::id(), crate::TOOL_NAME)
}

/// `{prefix }{subject} [{fileNum}/{fileTotal}] - "{filename}" yEnc ({partNum}/{partTotal})`
pub fn subject_line(prefix: Option<&str>, part: &ArticlePart) -> String {
    let subject = match prefix {
        Some(p) if !p.is_empty() => format!("{} {}", p, part.subject),
        _ => part.subject.clone(),
    };
    format!(
        "{} [{}/{}] - \"{}\" yEnc ({}/{})",
        subject, part.file_num, part.file_total, part.file_name, part.part_num, part.part_total
    )
}
