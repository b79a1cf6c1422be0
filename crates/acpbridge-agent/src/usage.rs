//! Per-session usage accounting, supplemented from the original
//! implementation's `ResultMessage.usage` handling (spec §4.D). Additive
//! and internal-only: never exposed on the CPP wire, logged at `debug`.

use std::sync::Mutex;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
}

#[derive(Default)]
pub struct UsageTracker {
    totals: Mutex<SessionUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, input_tokens: u64, output_tokens: u64, total_cost_usd: f64) {
        let mut totals = self.totals.lock().unwrap();
        totals.input_tokens += input_tokens;
        totals.output_tokens += output_tokens;
        totals.total_cost_usd += total_cost_usd;
        tracing::debug!(
            input_tokens = totals.input_tokens,
            output_tokens = totals.output_tokens,
            total_cost_usd = totals.total_cost_usd,
            "session usage updated"
        );
    }

    pub fn snapshot(&self) -> SessionUsage {
        self.totals.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_across_multiple_records() {
        let tracker = UsageTracker::new();
        tracker.record(10, 5, 0.01);
        tracker.record(20, 15, 0.02);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.input_tokens, 30);
        assert_eq!(snapshot.output_tokens, 20);
        assert!((snapshot.total_cost_usd - 0.03).abs() < 1e-9);
    }
}
