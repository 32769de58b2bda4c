pub mod config;
pub mod error;
pub mod logging;

// Posting pipeline, leaves first
pub mod article;
pub mod cache;
pub mod enumerate;
pub mod nntp;
pub mod scheduler;
pub mod segmenter;
pub mod throughput;

/// Tool identifier used in the `X-Newsposter` header and `--version` output.
pub const TOOL_NAME: &str = "ypost";

/// Crate version, stamped into every posted article.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
