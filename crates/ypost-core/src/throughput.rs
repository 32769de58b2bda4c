//! Posting speed status line.
//!
//! Every chunk written to a server produces a [`ThroughputSample`] on an
//! unbounded channel. [`run_sampler`] drains the channel once per tick, keeps
//! a 5 second trailing window and redraws one status line in place.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::MissedTickBehavior;

/// Trailing window used for the current-speed figure.
pub const WINDOW_MS: u64 = 5_000;
/// Status line refresh period.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Bytes written at one instant (milliseconds since the Unix epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputSample {
    pub timestamp_ms: u64,
    pub bytes: u64,
}

impl ThroughputSample {
    pub fn now(bytes: u64) -> Self {
        Self {
            timestamp_ms: now_ms(),
            bytes,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub type SampleSender = mpsc::UnboundedSender<ThroughputSample>;
pub type SampleReceiver = mpsc::UnboundedReceiver<ThroughputSample>;

pub fn sample_channel() -> (SampleSender, SampleReceiver) {
    mpsc::unbounded_channel()
}

/// Rolling sample buffer plus the cumulative byte count.
#[derive(Debug, Default)]
pub struct ThroughputWindow {
    samples: VecDeque<ThroughputSample>,
    total_bytes: u64,
}

impl ThroughputWindow {
    pub fn push(&mut self, sample: ThroughputSample) {
        self.total_bytes += sample.bytes;
        self.samples.push_back(sample);
    }

    /// Drop samples older than `now_ms - WINDOW_MS`.
    pub fn prune(&mut self, now_ms: u64) {
        let earliest = now_ms.saturating_sub(WINDOW_MS);
        self.samples.retain(|s| s.timestamp_ms >= earliest);
    }

    /// Move every queued sample into the window. Returns true once all senders are gone.
    pub fn drain(&mut self, rx: &mut SampleReceiver) -> bool {
        loop {
            match rx.try_recv() {
                Ok(sample) => self.push(sample),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Bytes in the window divided by the span of its timestamps; 0 for an empty span.
    pub fn bytes_per_sec(&self) -> f64 {
        let (Some(min), Some(max)) = (
            self.samples.iter().map(|s| s.timestamp_ms).min(),
            self.samples.iter().map(|s| s.timestamp_ms).max(),
        ) else {
            return 0.0;
        };
        let span_ms = max - min;
        if span_ms == 0 {
            return 0.0;
        }
        let bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        bytes as f64 * 1000.0 / span_ms as f64
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn render(&self) -> String {
        format!(
            "Posted {:.1} MiB - Current speed: {:.1} KiB/s",
            self.total_bytes as f64 / 1024.0 / 1024.0,
            self.bytes_per_sec() / 1024.0
        )
    }
}

/// Redraw the status line on `out` every `period` until every sender is
/// dropped. Returns the cumulative bytes seen.
pub async fn run_sampler<W>(mut rx: SampleReceiver, period: Duration, mut out: W) -> u64
where
    W: AsyncWrite + Unpin + Send,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window = ThroughputWindow::default();

    loop {
        ticker.tick().await;
        let closed = window.drain(&mut rx);
        let now = now_ms();
        // Tick marker keeps the span moving while nothing is written.
        window.push(ThroughputSample {
            timestamp_ms: now,
            bytes: 0,
        });
        window.prune(now);

        let mut line = format!("\r{}          ", window.render());
        if closed {
            line.push('\n');
        }
        // Status output errors are ignored.
        let _ = out.write_all(line.as_bytes()).await;
        let _ = out.flush().await;
        if closed {
            break;
        }
    }

    tracing::debug!(total_bytes = window.total_bytes(), "throughput sampler stopped");
    window.total_bytes()
}
