//! Statistics processing and output
// (c) 2026 The mqft authors

use std::fmt::Display;
use std::time::Duration;

use human_repr::{HumanCount as _, HumanDuration as _, HumanThroughput as _};

use crate::client::TransferStats;

/// Human friendly output helper
#[derive(Debug, Clone, Copy)]
pub struct DataRate {
    /// Bytes per second; if None, we were unable to compute a rate.
    rate: Option<f64>,
}

impl DataRate {
    /// Standard constructor
    #[must_use]
    pub fn new(bytes: u64, time: Option<Duration>) -> Self {
        match time {
            None => Self { rate: None },
            Some(time) if time.is_zero() => Self { rate: None }, // divide by zero is not meaningful
            Some(time) => Self {
                #[allow(clippy::cast_precision_loss)]
                rate: Some((bytes as f64) / time.as_secs_f64()),
            },
        }
    }

    /// Accessor
    #[must_use]
    pub fn byte_rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_rate() {
            None => f.write_str("unknown"),
            Some(rate) => rate.human_throughput_bytes().fmt(f),
        }
    }
}

/// One-line summary of a completed transfer
#[must_use]
pub fn transfer_summary(stats: &TransferStats) -> String {
    let rate = DataRate::new(stats.bytes, Some(stats.elapsed));
    format!(
        "Transferred {size} in {messages} messages, {time}; average {rate}",
        size = stats.bytes.human_count_bytes(),
        messages = stats.messages,
        time = stats.elapsed.human_duration(),
    )
}
