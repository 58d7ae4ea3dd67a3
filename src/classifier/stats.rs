/// One-pass aggregation over classified events
///
/// Used by tests and reconciliation diagnostics; must match exactly what the
/// ledger derives from the same event set.
use super::types::{ClassifiedEvent, FeeEventType};

/// Per-type sums and counts over a sequence of events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStats {
    pub collect_count: u64,
    pub collect_total: u64,
    pub withdraw_count: u64,
    pub withdraw_total: u64,
    pub burn_count: u64,
    pub burn_total: u64,
}

impl EventStats {
    pub fn total_events(&self) -> u64 {
        self.collect_count + self.withdraw_count + self.burn_count
    }
}

/// Reduce a sequence of events into per-type sums and counts in one pass
pub fn calculate_event_stats(events: &[ClassifiedEvent]) -> EventStats {
    events.iter().fold(EventStats::default(), |mut stats, event| {
        match event.event_type {
            FeeEventType::Collect => {
                stats.collect_count += 1;
                stats.collect_total += event.amount_lamports;
            }
            FeeEventType::Withdraw => {
                stats.withdraw_count += 1;
                stats.withdraw_total += event.amount_lamports;
            }
            FeeEventType::Burn => {
                stats.burn_count += 1;
                stats.burn_total += event.amount_lamports;
            }
        }
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(event_type: FeeEventType, amount: u64, signature: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            event_type,
            amount_lamports: amount,
            signature: signature.to_string(),
            slot: 1,
            block_time: Utc::now(),
            burned_token_mint: None,
            burned_token_amount: None,
            recovered: false,
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = calculate_event_stats(&[]);
        assert_eq!(stats, EventStats::default());
        assert_eq!(stats.total_events(), 0);
    }

    #[test]
    fn test_mixed_event_stats() {
        let events = vec![
            event(FeeEventType::Collect, 1_000, "a"),
            event(FeeEventType::Collect, 2_000, "b"),
            event(FeeEventType::Withdraw, 500, "c"),
            event(FeeEventType::Burn, 300, "d"),
        ];
        let stats = calculate_event_stats(&events);
        assert_eq!(stats.collect_count, 2);
        assert_eq!(stats.collect_total, 3_000);
        assert_eq!(stats.withdraw_count, 1);
        assert_eq!(stats.withdraw_total, 500);
        assert_eq!(stats.burn_count, 1);
        assert_eq!(stats.burn_total, 300);
        assert_eq!(stats.total_events(), 4);
    }
}
