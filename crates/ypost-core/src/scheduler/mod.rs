//! Posting pipelines.
//!
//! Each configured server gets one blocking generator that encodes every part
//! of every file into a bounded queue, and `connections` workers that post from
//! that queue over their own NNTP session. All servers read the same files
//! through one [`FileCache`](crate::cache::FileCache); a file stays mapped until
//! every server's generator is done with it.

mod generator;
mod queue;
mod run;
mod totals;
mod worker;

pub use queue::{article_queue, ArticleConsumer, ArticleProducer};
pub use run::{run_pipelines, run_post};
pub use totals::{RunReport, ServerReport, Totals};
