//! CLI command handlers.

mod config;
mod post;

pub use config::run_show_config;
pub use post::run_post;
