use anyhow::Result;
use std::time::Duration;
use crate::errors::CliError;
use super::{BlockRange, BountyEvent, BountyHistory};

pub const BLOCK_CHUNK_SIZE: u64 = 1000;
pub const FILTER_RETRIES: usize = 10;
pub const FILTER_TIMEOUT: Duration = Duration::from_secs(1);

/// How hard to try a single event-log query before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: FILTER_RETRIES,
            pause: FILTER_TIMEOUT,
        }
    }
}

/// Fetch bounty events for one window, retrying failed queries
pub async fn fetch_with_retry<H>(
    history: &H,
    from_block: u64,
    to_block: u64,
    node_ids: &[u64],
    policy: &RetryPolicy,
) -> Result<Vec<BountyEvent>>
where
    H: BountyHistory + ?Sized,
{
    for attempt in 1..=policy.attempts {
        match history.bounty_events(from_block, to_block, node_ids).await {
            Ok(events) => return Ok(events),
            Err(e) => {
                tracing::error!(
                    "Retrieving events from filter failed with {} (blocks {}..={}, attempt {}/{})",
                    e, from_block, to_block, attempt, policy.attempts
                );
                if attempt < policy.attempts && !policy.pause.is_zero() {
                    tokio::time::sleep(policy.pause).await;
                }
            }
        }
    }
    Err(CliError::FilterTimedOut(policy.attempts).into())
}

/// Windows of at most `chunk_size` blocks covering `range`, newest first
pub fn windows_newest_first(range: BlockRange, chunk_size: u64) -> Vec<BlockRange> {
    let chunk_size = chunk_size.max(1);
    let mut windows = Vec::new();
    let mut to = range.to;
    loop {
        let from = to.saturating_sub(chunk_size - 1).max(range.from);
        windows.push(BlockRange { from, to });
        if from == range.from {
            break;
        }
        to = from - 1;
    }
    windows
}

/// Scan `range` from the newest window to the oldest, collecting events.
/// After each window `done` is asked whether older windows still matter.
pub async fn scan_backwards<H, F>(
    history: &H,
    range: BlockRange,
    node_ids: &[u64],
    policy: &RetryPolicy,
    mut done: F,
) -> Result<Vec<BountyEvent>>
where
    H: BountyHistory + ?Sized,
    F: FnMut(&[BountyEvent]) -> bool,
{
    let mut collected = Vec::new();
    for window in windows_newest_first(range, BLOCK_CHUNK_SIZE) {
        let mut events = fetch_with_retry(history, window.from, window.to, node_ids, policy).await?;
        tracing::debug!(
            "Fetched {} bounty events from blocks {}..={}",
            events.len(), window.from, window.to
        );
        events.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        collected.extend(events);
        if done(&collected) {
            break;
        }
    }
    Ok(collected)
}

/// Most recent bounty event block for a node, found by scanning the chain.
/// Used when there is no monitoring contract to ask.
pub async fn latest_event_block<H>(
    history: &H,
    node_id: u64,
    policy: &RetryPolicy,
) -> Result<Option<u64>>
where
    H: BountyHistory + ?Sized,
{
    let latest = history.latest_block().await?;
    let events = scan_backwards(
        history,
        BlockRange { from: 0, to: latest },
        &[node_id],
        policy,
        |events| !events.is_empty(),
    )
    .await?;
    Ok(events.first().map(|event| event.block_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fake::FakeChain;
    use crate::metrics::MockBountyHistory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn no_pause(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            pause: Duration::ZERO,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.pause, Duration::from_secs(1));
    }

    #[test]
    fn test_windows_cover_range_newest_first() {
        let windows = windows_newest_first(BlockRange { from: 0, to: 2499 }, 1000);
        assert_eq!(
            windows,
            vec![
                BlockRange { from: 1500, to: 2499 },
                BlockRange { from: 500, to: 1499 },
                BlockRange { from: 0, to: 499 },
            ]
        );
    }

    #[test]
    fn test_single_block_window() {
        let windows = windows_newest_first(BlockRange { from: 7, to: 7 }, 1000);
        assert_eq!(windows, vec![BlockRange { from: 7, to: 7 }]);
    }

    #[test]
    fn test_windows_with_offset_start() {
        let windows = windows_newest_first(BlockRange { from: 10, to: 2009 }, 1000);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], BlockRange { from: 10, to: 1009 });
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockBountyHistory::new();
        mock.expect_bounty_events().returning(move |_, _, _| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(anyhow::anyhow!("filter not found"))
            } else {
                Ok(vec![])
            }
        });

        let events = fetch_with_retry(&mock, 0, 10, &[1], &no_pause(10)).await.unwrap();

        assert!(events.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut mock = MockBountyHistory::new();
        mock.expect_bounty_events()
            .times(10)
            .returning(|_, _, _| Err(anyhow::anyhow!("filter not found")));

        let err = fetch_with_retry(&mock, 0, 10, &[1], &no_pause(10)).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::FilterTimedOut(10))
        ));
    }

    #[tokio::test]
    async fn test_scan_stops_when_done() {
        let mut chain = FakeChain::hourly("2024-01-01T00:00:00Z", 3000);
        chain.add_bounty(1, 100, 5);
        chain.add_bounty(1, 2900, 7);

        let events = scan_backwards(
            &chain,
            BlockRange { from: 0, to: 2999 },
            &[1],
            &no_pause(1),
            |events| !events.is_empty(),
        )
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].block_number, 2900);
        assert_eq!(chain.queries(), 1);
    }

    #[tokio::test]
    async fn test_scan_collects_newest_first() {
        let mut chain = FakeChain::hourly("2024-01-01T00:00:00Z", 2100);
        chain.add_bounty(1, 10, 1);
        chain.add_bounty(2, 1500, 2);
        chain.add_bounty(1, 1600, 3);
        chain.add_bounty(3, 2050, 4);

        let events = scan_backwards(
            &chain,
            BlockRange { from: 0, to: 2099 },
            &[1, 2],
            &no_pause(1),
            |_| false,
        )
        .await
        .unwrap();

        let blocks: Vec<u64> = events.iter().map(|e| e.block_number).collect();
        assert_eq!(blocks, vec![1600, 1500, 10]);
        assert_eq!(chain.queries(), 3);
    }

    #[tokio::test]
    async fn test_latest_event_block() {
        let mut chain = FakeChain::hourly("2024-01-01T00:00:00Z", 1500);
        chain.add_bounty(4, 20, 1);
        chain.add_bounty(4, 300, 1);
        chain.add_bounty(5, 1400, 1);

        let policy = no_pause(1);
        assert_eq!(latest_event_block(&chain, 4, &policy).await.unwrap(), Some(300));
        assert_eq!(latest_event_block(&chain, 6, &policy).await.unwrap(), None);
    }
}
