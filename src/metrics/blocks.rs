use anyhow::Result;
use super::{BountyHistory, DateRange};

/// Inclusive block interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Lowest block whose timestamp is `>= timestamp`, or `latest + 1` if every
/// block is older.
pub async fn first_block_at_or_after<H>(history: &H, timestamp: u64, latest: u64) -> Result<u64>
where
    H: BountyHistory + ?Sized,
{
    let mut low = 0u64;
    let mut high = latest + 1;
    while low < high {
        let mid = low + (high - low) / 2;
        if history.block_timestamp(mid).await? >= timestamp {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    Ok(low)
}

/// Map a date window onto blocks. `None` means the window holds no blocks.
pub async fn resolve_range<H>(history: &H, dates: &DateRange) -> Result<Option<BlockRange>>
where
    H: BountyHistory + ?Sized,
{
    let latest = history.latest_block().await?;

    let from = match dates.since {
        Some(since) => first_block_at_or_after(history, since.timestamp().max(0) as u64, latest).await?,
        None => 0,
    };
    let to = match dates.till {
        Some(till) => {
            let first_excluded =
                first_block_at_or_after(history, till.timestamp().max(0) as u64, latest).await?;
            match first_excluded.checked_sub(1) {
                Some(to) => to,
                None => return Ok(None),
            }
        }
        None => latest,
    };

    tracing::debug!("Resolved {:?} to blocks {}..={} (latest {})", dates, from, to, latest);

    if from > to {
        return Ok(None);
    }
    Ok(Some(BlockRange { from, to }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fake::{ts, FakeChain};
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[tokio::test]
    async fn test_binary_search_exact_match() {
        // 48 hourly blocks starting Jan 1st
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 48);
        let target = ts("2024-01-02T00:00:00Z").timestamp() as u64;

        assert_eq!(first_block_at_or_after(&chain, target, 47).await.unwrap(), 24);
    }

    #[tokio::test]
    async fn test_binary_search_between_blocks() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 48);
        let target = ts("2024-01-01T05:30:00Z").timestamp() as u64;

        assert_eq!(first_block_at_or_after(&chain, target, 47).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_binary_search_bounds() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 48);

        let before = ts("2023-06-01T00:00:00Z").timestamp() as u64;
        assert_eq!(first_block_at_or_after(&chain, before, 47).await.unwrap(), 0);

        let after = ts("2025-01-01T00:00:00Z").timestamp() as u64;
        assert_eq!(first_block_at_or_after(&chain, after, 47).await.unwrap(), 48);
    }

    #[tokio::test]
    async fn test_resolve_full_range() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 48);
        let range = resolve_range(&chain, &DateRange::default()).await.unwrap();

        assert_eq!(range, Some(BlockRange { from: 0, to: 47 }));
        assert_eq!(range.unwrap().block_count(), 48);
    }

    #[tokio::test]
    async fn test_resolve_till_is_exclusive() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 72);
        let dates = DateRange::from_dates(day(2024, 1, 2), day(2024, 1, 3));
        let range = resolve_range(&chain, &dates).await.unwrap();

        assert_eq!(range, Some(BlockRange { from: 24, to: 47 }));
    }

    #[tokio::test]
    async fn test_resolve_inverted_range_is_empty() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 72);
        let dates = DateRange::from_dates(day(2024, 1, 3), day(2024, 1, 2));

        assert_eq!(resolve_range(&chain, &dates).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_till_before_chain_start() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 72);
        let dates = DateRange::from_dates(None, day(2023, 12, 1));

        assert_eq!(resolve_range(&chain, &dates).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_since_after_chain_end() {
        let chain = FakeChain::hourly("2024-01-01T00:00:00Z", 72);
        let dates = DateRange::from_dates(day(2024, 6, 1), None);

        assert_eq!(resolve_range(&chain, &dates).await.unwrap(), None);
    }
}
