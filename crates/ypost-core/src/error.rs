//! Setup errors: anything that must abort the run before the first article is posted.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration or input paths. Always fatal, always raised before posting starts.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A required configuration value is absent or empty.
    #[error("missing config value: {0}")]
    MissingValue(&'static str),

    /// A configuration value is present but unusable.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The config file has no `[server.<name>]` section.
    #[error("no servers configured (add a [server.<name>] section to {0})")]
    NoServers(String),

    /// An input path could not be read or walked.
    #[error("cannot read {}: {source}", .path.display())]
    BadPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory subjects were requested but an input is not a directory.
    #[error("directory subjects requested but not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Inputs resolved to zero postable files.
    #[error("no non-empty files found in the given paths")]
    NoInputFiles,
}
