use alloy::primitives::U256;
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use crate::units::latency_seconds;
use super::scan::{self, fetch_with_retry, scan_backwards, RetryPolicy};
use super::{resolve_range, BountyEvent, BountyHistory, DateRange};

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub dates: DateRange,
    /// Max rows for metrics, max months for the bounty report
    pub limit: Option<usize>,
    pub retry: RetryPolicy,
}

impl ReportOptions {
    fn limit_reached(&self, count: usize) -> bool {
        self.limit.map_or(false, |limit| count >= limit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetricsRow {
    pub date: DateTime<Utc>,
    pub bounty: U256,
    pub downtime: U256,
    /// Seconds
    pub latency: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMetrics {
    pub rows: Vec<NodeMetricsRow>,
    pub total_bounty: U256,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorMetricsRow {
    pub date: DateTime<Utc>,
    pub node_id: u64,
    pub bounty: U256,
    pub downtime: U256,
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTotals {
    pub node_id: u64,
    pub bounty: U256,
    pub downtime: U256,
    pub mean_latency: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorMetrics {
    pub rows: Vec<ValidatorMetricsRow>,
    pub totals: Vec<NodeTotals>,
    pub total_bounty: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BountyRow {
    /// `YYYY-MM`
    pub month: String,
    pub total: U256,
    /// Same order as `BountyReport::node_ids`
    pub per_node: Vec<U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BountyReport {
    pub node_ids: Vec<u64>,
    /// Newest month first
    pub rows: Vec<BountyRow>,
}

impl BountyReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column sums: all nodes, then each node
    pub fn totals(&self) -> (U256, Vec<U256>) {
        let mut per_node = vec![U256::ZERO; self.node_ids.len()];
        let mut total = U256::ZERO;
        for row in &self.rows {
            total += row.total;
            for (sum, amount) in per_node.iter_mut().zip(&row.per_node) {
                *sum += *amount;
            }
        }
        (total, per_node)
    }
}

fn month_of(event: &BountyEvent) -> String {
    event.timestamp.format("%Y-%m").to_string()
}

/// Follow a node's chain of bounty events from the newest one backwards.
/// Stops at the first event before `since`, at the end of the chain, or at
/// the row limit. Events at or after `till` are skipped.
async fn walk_node_events<H>(history: &H, node_id: u64, opts: &ReportOptions) -> Result<Vec<BountyEvent>>
where
    H: BountyHistory + ?Sized,
{
    let start = match history.last_bounty_block(node_id).await? {
        Some(block) => block,
        None => scan::latest_event_block(history, node_id, &opts.retry)
            .await?
            .unwrap_or(0),
    };
    tracing::debug!("Node {} last bounty block: {}", node_id, start);

    let mut events = Vec::new();
    let mut block = start;
    while block != 0 && !opts.limit_reached(events.len()) {
        let found = fetch_with_retry(history, block, block, &[node_id], &opts.retry).await?;
        let event = match found.into_iter().find(|e| e.node_id == node_id) {
            Some(event) => event,
            None => {
                tracing::warn!("No bounty event for node {} in block {}", node_id, block);
                break;
            }
        };
        if opts.dates.is_before_start(&event.timestamp) {
            break;
        }

        let previous = event.previous_block_event;
        if opts.dates.contains(&event.timestamp) {
            events.push(event);
        }
        if previous >= block {
            tracing::warn!(
                "Bounty event chain for node {} does not go back in time ({} -> {})",
                node_id, block, previous
            );
            break;
        }
        block = previous;
    }
    Ok(events)
}

/// Bounty, downtime and latency rows for one node, newest first
pub async fn node_metrics<H>(history: &H, node_id: u64, opts: &ReportOptions) -> Result<NodeMetrics>
where
    H: BountyHistory + ?Sized,
{
    let events = walk_node_events(history, node_id, opts).await?;
    let rows: Vec<NodeMetricsRow> = events
        .iter()
        .map(|event| NodeMetricsRow {
            date: event.timestamp,
            bounty: event.bounty,
            downtime: event.average_downtime,
            latency: latency_seconds(event.average_latency),
        })
        .collect();
    let total_bounty = rows.iter().fold(U256::ZERO, |acc, row| acc + row.bounty);
    Ok(NodeMetrics { rows, total_bounty })
}

/// Metrics for all of a validator's nodes. Nodes are walked concurrently.
pub async fn validator_metrics<H>(
    history: &H,
    node_ids: &[u64],
    opts: &ReportOptions,
) -> Result<ValidatorMetrics>
where
    H: BountyHistory + ?Sized,
{
    let per_node = try_join_all(
        node_ids
            .iter()
            .map(|&node_id| walk_node_events(history, node_id, opts)),
    )
    .await?;

    let mut rows: Vec<ValidatorMetricsRow> = per_node
        .into_iter()
        .flatten()
        .map(|event| ValidatorMetricsRow {
            date: event.timestamp,
            node_id: event.node_id,
            bounty: event.bounty,
            downtime: event.average_downtime,
            latency: latency_seconds(event.average_latency),
        })
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.node_id.cmp(&b.node_id)));
    if let Some(limit) = opts.limit {
        rows.truncate(limit);
    }

    let mut sums: BTreeMap<u64, (U256, U256, f64, usize)> = BTreeMap::new();
    for row in &rows {
        let entry = sums
            .entry(row.node_id)
            .or_insert((U256::ZERO, U256::ZERO, 0.0, 0));
        entry.0 += row.bounty;
        entry.1 += row.downtime;
        entry.2 += row.latency;
        entry.3 += 1;
    }
    let totals = sums
        .into_iter()
        .map(|(node_id, (bounty, downtime, latency, count))| NodeTotals {
            node_id,
            bounty,
            downtime,
            mean_latency: latency / count as f64,
        })
        .collect();
    let total_bounty = rows.iter().fold(U256::ZERO, |acc, row| acc + row.bounty);

    Ok(ValidatorMetrics {
        rows,
        totals,
        total_bounty,
    })
}

/// Bounty per calendar month and node, newest month first
pub async fn bounty_report<H>(
    history: &H,
    node_ids: &[u64],
    opts: &ReportOptions,
) -> Result<BountyReport>
where
    H: BountyHistory + ?Sized,
{
    let columns: Vec<u64> = node_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let range = match resolve_range(history, &opts.dates).await? {
        Some(range) if !columns.is_empty() => range,
        _ => {
            return Ok(BountyReport {
                node_ids: columns,
                rows: Vec::new(),
            })
        }
    };

    // Older windows can only add older months, so once more months than the
    // limit are known the newest `limit` months are final
    let dates = opts.dates;
    let limit = opts.limit;
    let events = scan_backwards(history, range, &columns, &opts.retry, |events| {
        limit.map_or(false, |limit| {
            let months: HashSet<String> = events
                .iter()
                .filter(|e| dates.contains(&e.timestamp))
                .map(month_of)
                .collect();
            months.len() > limit
        })
    })
    .await?;

    let mut by_month: BTreeMap<String, BTreeMap<u64, U256>> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|e| dates.contains(&e.timestamp) && columns.contains(&e.node_id))
    {
        *by_month
            .entry(month_of(event))
            .or_default()
            .entry(event.node_id)
            .or_insert(U256::ZERO) += event.bounty;
    }

    let rows = by_month
        .into_iter()
        .rev()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(month, per_node_sums)| {
            let per_node: Vec<U256> = columns
                .iter()
                .map(|id| per_node_sums.get(id).copied().unwrap_or(U256::ZERO))
                .collect();
            let total = per_node.iter().fold(U256::ZERO, |acc, amount| acc + *amount);
            BountyRow {
                month,
                total,
                per_node,
            }
        })
        .collect();

    Ok(BountyReport {
        node_ids: columns,
        rows,
    })
}
