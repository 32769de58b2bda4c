//! Range math and part planning.
//!
//! Splits a file into article-sized byte ranges that exactly tile
//! `[0, file_size)`; only the last part may be shorter.

mod range;

pub use range::{part_count, plan_parts, PartRange};
