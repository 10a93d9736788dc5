//! Bounty history reports.
//!
//! Everything here runs against the [`BountyHistory`] seam so the scanning and
//! aggregation logic can be exercised without a chain.

pub mod blocks;
pub mod report;
pub mod scan;

use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

pub use blocks::{first_block_at_or_after, resolve_range, BlockRange};
pub use report::{
    bounty_report, node_metrics, validator_metrics, BountyReport, BountyRow, NodeMetrics,
    NodeMetricsRow, NodeTotals, ReportOptions, ValidatorMetrics, ValidatorMetricsRow,
};
pub use scan::{RetryPolicy, BLOCK_CHUNK_SIZE, FILTER_RETRIES, FILTER_TIMEOUT};

/// A decoded `BountyReceived` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BountyEvent {
    pub node_id: u64,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub bounty: U256,
    pub average_downtime: U256,
    /// Milliseconds
    pub average_latency: U256,
    /// Block of the node's previous bounty event, 0 when there is none
    pub previous_block_event: u64,
}

/// Read access to the chain data the reports are built from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BountyHistory: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    /// Block timestamp in seconds since the epoch
    async fn block_timestamp(&self, block: u64) -> Result<u64>;

    /// Bounty events emitted in `[from_block, to_block]` for the given nodes.
    /// An empty `node_ids` slice matches every node.
    async fn bounty_events(
        &self,
        from_block: u64,
        to_block: u64,
        node_ids: &[u64],
    ) -> Result<Vec<BountyEvent>>;

    /// Block of the node's most recent bounty event as recorded by the
    /// monitoring contract. `None` when the deployment has no such contract.
    async fn last_bounty_block(&self, node_id: u64) -> Result<Option<u64>>;
}

/// Half-open `[since, till)` date window in UTC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub till: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Calendar days are taken as UTC midnight
    pub fn from_dates(since: Option<NaiveDate>, till: Option<NaiveDate>) -> Self {
        let midnight = |date: NaiveDate| date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        Self {
            since: since.and_then(midnight),
            till: till.and_then(midnight),
        }
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| *timestamp >= since)
            && self.till.map_or(true, |till| *timestamp < till)
    }

    pub fn is_before_start(&self, timestamp: &DateTime<Utc>) -> bool {
        self.since.map_or(false, |since| *timestamp < since)
    }
}

/// Parse a `--since`/`--till` argument
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date: {}. Expected format: YYYY-MM-DD", value))
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory chain used by the report tests

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeChain {
        pub timestamps: Vec<u64>,
        pub events: Vec<BountyEvent>,
        pub last_bounty: BTreeMap<u64, u64>,
        pub has_monitors: bool,
        pub event_queries: AtomicUsize,
    }

    pub fn ts(date: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc)
    }

    impl FakeChain {
        /// One block per hour starting at `start`
        pub fn hourly(start: &str, blocks: u64) -> Self {
            let base = ts(start).timestamp() as u64;
            Self {
                timestamps: (0..blocks).map(|n| base + n * 3600).collect(),
                has_monitors: true,
                ..Default::default()
            }
        }

        /// Append a bounty event for `node_id` at `block`, chained to the
        /// node's previous event
        pub fn add_bounty(&mut self, node_id: u64, block: u64, bounty: u64) {
            let previous = self.last_bounty.get(&node_id).copied().unwrap_or(0);
            let timestamp = DateTime::from_timestamp(self.timestamps[block as usize] as i64, 0).unwrap();
            self.events.push(BountyEvent {
                node_id,
                block_number: block,
                timestamp,
                bounty: U256::from(bounty),
                average_downtime: U256::from(node_id + 1),
                average_latency: U256::from(1500u64),
                previous_block_event: previous,
            });
            self.last_bounty.insert(node_id, block);
        }

        pub fn queries(&self) -> usize {
            self.event_queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BountyHistory for FakeChain {
        async fn latest_block(&self) -> Result<u64> {
            Ok(self.timestamps.len() as u64 - 1)
        }

        async fn block_timestamp(&self, block: u64) -> Result<u64> {
            self.timestamps
                .get(block as usize)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no block {}", block))
        }

        async fn bounty_events(
            &self,
            from_block: u64,
            to_block: u64,
            node_ids: &[u64],
        ) -> Result<Vec<BountyEvent>> {
            self.event_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .events
                .iter()
                .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
                .filter(|e| node_ids.is_empty() || node_ids.contains(&e.node_id))
                .cloned()
                .collect())
        }

        async fn last_bounty_block(&self, node_id: u64) -> Result<Option<u64>> {
            if !self.has_monitors {
                return Ok(None);
            }
            Ok(Some(self.last_bounty.get(&node_id).copied().unwrap_or(0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::fake::ts;

    #[test]
    fn test_date_range_is_half_open() {
        let range = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 2, 1),
        );
        assert!(range.contains(&ts("2024-01-01T00:00:00Z")));
        assert!(range.contains(&ts("2024-01-31T23:59:59Z")));
        assert!(!range.contains(&ts("2024-02-01T00:00:00Z")));
        assert!(!range.contains(&ts("2023-12-31T23:59:59Z")));
    }

    #[test]
    fn test_open_date_range() {
        let range = DateRange::default();
        assert!(range.contains(&ts("1999-01-01T00:00:00Z")));
        assert!(!range.is_before_start(&ts("1999-01-01T00:00:00Z")));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-15").unwrap(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert!(parse_date("15.03.2024").unwrap_err().contains("YYYY-MM-DD"));
    }
}
