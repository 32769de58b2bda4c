//! Per-connection totals and the per-server / per-run reports built from them.

use std::time::{Duration, Instant};

/// What one connection did. A connection that never became ready reports
/// `Totals::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub connected: bool,
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    /// Article bytes accepted by the server.
    pub bytes: u64,
    pub posted: u64,
    pub failed: u64,
}

impl Totals {
    pub(super) fn started() -> Self {
        Self {
            connected: true,
            start: Some(Instant::now()),
            ..Self::default()
        }
    }

    pub fn elapsed(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

/// Aggregate of one server's connections.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReport {
    pub name: String,
    pub connections: usize,
    /// Connections that got past connect and authentication.
    pub connected: usize,
    pub queued: usize,
    pub posted: u64,
    pub failed: u64,
    pub bytes: u64,
    /// Earliest connection start to latest connection end.
    pub elapsed: Duration,
}

impl ServerReport {
    pub fn from_totals(name: &str, queued: usize, totals: &[Totals]) -> Self {
        let start = totals.iter().filter_map(|t| t.start).min();
        let end = totals.iter().filter_map(|t| t.end).max();
        let elapsed = match (start, end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        Self {
            name: name.to_string(),
            connections: totals.len(),
            connected: totals.iter().filter(|t| t.connected).count(),
            queued,
            posted: totals.iter().map(|t| t.posted).sum(),
            failed: totals.iter().map(|t| t.failed).sum(),
            bytes: totals.iter().map(|t| t.bytes).sum(),
            elapsed,
        }
    }

    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs
    }

    /// Every queued article was accepted.
    pub fn is_complete(&self) -> bool {
        self.connected > 0 && self.failed == 0 && self.posted == self.queued as u64
    }
}

/// Result of a whole posting run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub files: usize,
    pub servers: Vec<ServerReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.servers.iter().all(ServerReport::is_complete)
    }

    pub fn bytes_posted(&self) -> u64 {
        self.servers.iter().map(|s| s.bytes).sum()
    }
}
