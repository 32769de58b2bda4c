//! Article encoding: one file part to one ready-to-send NNTP article.
//!
//! An article is a header block (From, Newsgroups, Message-ID, tool header,
//! Subject), a blank line, and a yEnc body framed by `=ybegin`, `=ypart` and
//! `=yend` lines. The buffer is reserved up front with `try_reserve`, so an
//! allocation failure surfaces as [`ArticleError`] instead of a half-built
//! article.

mod headers;
pub mod yenc;

pub use headers::{message_id, subject_line};

use std::collections::TryReserveError;
use std::io::Write;
use thiserror::Error;

use crate::config::RunConfig;

/// One contiguous byte range of a file, with everything needed to describe it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePart {
    /// 1-based part number.
    pub part_num: u64,
    pub part_total: u64,
    /// 1-based position of the file in the run.
    pub file_num: usize,
    pub file_total: usize,
    /// Start offset (inclusive).
    pub begin: u64,
    /// End offset (exclusive).
    pub end: u64,
    pub file_size: u64,
    pub file_name: String,
    pub subject: String,
}

impl ArticlePart {
    /// Bytes carried by this part.
    pub fn size(&self) -> u64 {
        self.end - self.begin
    }
}

/// Encoding failures. Fatal to the run.
#[derive(Debug, Error)]
pub enum ArticleError {
    #[error("article buffer allocation failed: {0}")]
    Alloc(#[from] TryReserveError),

    #[error("part {part} of {file}: got {actual} bytes, expected {expected}")]
    LengthMismatch {
        file: String,
        part: u64,
        expected: u64,
        actual: usize,
    },
}

/// A fully encoded article. Immutable; ownership moves through the posting queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArticle {
    message_id: String,
    bytes: Vec<u8>,
}

impl EncodedArticle {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Headers and body as sent after `POST`, without the terminating dot line.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Header labels, the tool header and the three yEnc framing lines with every
/// number at its widest.
const FRAMING_OVERHEAD: usize = 512;

/// Upper bound on the encoded size of an article, so the buffer never regrows.
fn reserve_len(
    data_len: usize,
    part: &ArticlePart,
    cfg: &RunConfig,
    message_id: &str,
    subject: &str,
) -> usize {
    FRAMING_OVERHEAD
        + cfg.from.len()
        + cfg.newsgroups.len()
        + message_id.len()
        + subject.len()
        + part.file_name.len()
        + yenc::max_encoded_len(data_len)
}

/// Encode `data` (the bytes of `part`) into an article using the run's From,
/// Newsgroups and subject prefix.
pub fn encode_article(
    data: &[u8],
    part: &ArticlePart,
    cfg: &RunConfig,
) -> Result<EncodedArticle, ArticleError> {
    if data.len() as u64 != part.size() {
        return Err(ArticleError::LengthMismatch {
            file: part.file_name.clone(),
            part: part.part_num,
            expected: part.size(),
            actual: data.len(),
        });
    }

    let message_id = message_id();
    let subject = subject_line(cfg.subject_prefix.as_deref(), part);

    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(reserve_len(data.len(), part, cfg, &message_id, &subject))?;

    // Writes into a reserved Vec cannot fail.
    let _ = write!(
        buf,
        "From: {}\r\nNewsgroups: {}\r\nMessage-ID: {}\r\nX-Newsposter: {} {}\r\nSubject: {}\r\n\r\n",
        cfg.from,
        cfg.newsgroups,
        message_id,
        crate::TOOL_NAME,
        crate::VERSION,
        subject
    );
    let _ = write!(
        buf,
        "=ybegin part={} total={} line={} size={} name={}\r\n=ypart begin={} end={}\r\n",
        part.part_num,
        part.part_total,
        yenc::LINE_LENGTH,
        part.file_size,
        part.file_name,
        part.begin + 1,
        part.end
    );
    yenc::encode_into(data, &mut buf);
    let _ = write!(
        buf,
        "=yend size={} part={} pcrc32={:08X}\r\n",
        part.size(),
        part.part_num,
        yenc::crc32(data)
    );

    Ok(EncodedArticle {
        message_id,
        bytes: buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubjectMode;

    fn run_config(prefix: Option<&str>) -> RunConfig {
        RunConfig {
            from: "poster <poster@example.com>".into(),
            newsgroups: "alt.binaries.test,alt.binaries.misc".into(),
            subject_prefix: prefix.map(String::from),
            article_size: 10_240,
            chunk_size: 1024,
            subject: SubjectMode::Explicit("Holiday".into()),
            servers: Vec::new(),
        }
    }

    fn part(begin: u64, end: u64) -> ArticlePart {
        ArticlePart {
            part_num: 3,
            part_total: 3,
            file_num: 2,
            file_total: 2,
            begin,
            end,
            file_size: 30_000,
            file_name: "photos.rar".into(),
            subject: "Holiday".into(),
        }
    }

    /// Split an article into (header lines, body bytes).
    fn split(article: &EncodedArticle) -> (Vec<String>, Vec<u8>) {
        let bytes = article.as_bytes();
        let pos = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("blank line");
        let headers = String::from_utf8(bytes[..pos].to_vec())
            .unwrap()
            .split("\r\n")
            .map(String::from)
            .collect();
        (headers, bytes[pos + 4..].to_vec())
    }

    #[test]
    fn headers_and_framing() {
        let data: Vec<u8> = (0..9_520u32).map(|i| (i * 7 % 256) as u8).collect();
        let article = encode_article(&data, &part(20_480, 30_000), &run_config(None)).unwrap();
        let (headers, body) = split(&article);

        assert_eq!(headers[0], "From: poster <poster@example.com>");
        assert_eq!(headers[1], "Newsgroups: alt.binaries.test,alt.binaries.misc");
        assert_eq!(headers[2], format!("Message-ID: {}", article.message_id()));
        assert_eq!(headers[3], format!("X-Newsposter: ypost {}", crate::VERSION));
        assert_eq!(
            headers[4],
            "Subject: Holiday [2/2] - \"photos.rar\" yEnc (3/3)"
        );

        let text = String::from_utf8_lossy(&body);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "=ybegin part=3 total=3 line=128 size=30000 name=photos.rar"
        );
        assert_eq!(lines[1], "=ypart begin=20481 end=30000");
        let crc = format!("{:08X}", yenc::crc32(&data));
        assert!(text.ends_with(&format!("=yend size=9520 part=3 pcrc32={}\r\n", crc)));
    }

    #[test]
    fn payload_decodes_to_input_slice() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_240).collect();
        let article = encode_article(&data, &part(0, 10_240), &run_config(Some("[x]"))).unwrap();
        let (headers, body) = split(&article);
        assert!(headers[4].starts_with("Subject: [x] Holiday "));

        let start = body.windows(2).position(|w| w == b"\r\n").unwrap() + 2;
        let start = start + body[start..].windows(2).position(|w| w == b"\r\n").unwrap() + 2;
        let end = body
            .windows(6)
            .rposition(|w| w == b"=yend ")
            .unwrap();
        assert_eq!(yenc::decode(&body[start..end]), data);

        // pcrc32 matches the unencoded slice
        let trailer = String::from_utf8_lossy(&body[end..]).to_string();
        let crc_hex = trailer.trim_end().rsplit('=').next().unwrap();
        assert_eq!(u32::from_str_radix(crc_hex, 16).unwrap(), crc32fast::hash(&data));
        assert_eq!(crc_hex.len(), 8);
        assert_eq!(crc_hex, crc_hex.to_uppercase());
    }

    #[test]
    fn identical_input_yields_identical_body() {
        let data = vec![0x55u8; 500];
        let cfg = run_config(None);
        let a = encode_article(&data, &part(0, 500), &cfg).unwrap();
        let b = encode_article(&data, &part(0, 500), &cfg).unwrap();
        assert_ne!(a.message_id(), b.message_id());
        assert_eq!(split(&a).1, split(&b).1);
        assert!(a.as_bytes().ends_with(b"\r\n"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = encode_article(&[1, 2, 3], &part(0, 10), &run_config(None)).unwrap_err();
        assert!(matches!(err, ArticleError::LengthMismatch { expected: 10, actual: 3, .. }));
    }

    #[test]
    fn reservation_covers_long_headers() {
        let mut cfg = run_config(Some("[a very long prefix for this upload]"));
        cfg.newsgroups = (0..200)
            .map(|i| format!("alt.binaries.group{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let mut part = part(u64::MAX - 10, u64::MAX);
        part.part_num = u64::MAX;
        part.part_total = u64::MAX;
        part.file_size = u64::MAX;
        part.file_name = "n".repeat(300);

        let data = [b'='; 10];
        let article = encode_article(&data, &part, &cfg).unwrap();
        let subject = subject_line(cfg.subject_prefix.as_deref(), &part);
        let reserved = reserve_len(data.len(), &part, &cfg, article.message_id(), &subject);
        assert!(
            reserved >= article.len(),
            "reserved {reserved} for an article of {}",
            article.len()
        );
    }
}
