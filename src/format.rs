//! Console tables for command output.

use alloy::primitives::U256;
use anyhow::Result;
use std::path::Path;
use crate::contracts::{DelegationInfo, LinkedAddress, ValidatorInfo};
use crate::metrics::{BountyReport, NodeMetrics, ValidatorMetrics};
use crate::units::{amount_unit, format_amount, from_wei};

const COLUMN_GAP: &str = "   ";
pub const TOTAL_LABEL: &str = "Total per period:";

/// Column-aligned table with a centered header and a dashed rule under it
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut lines = Vec::with_capacity(self.rows.len() + 2);

        let header: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let title = self.headers.get(i).map(String::as_str).unwrap_or("");
                format!("{:^width$}", title, width = *width)
            })
            .collect();
        lines.push(header.join(COLUMN_GAP).trim_end().to_string());

        let rule_len = widths.iter().sum::<usize>() + COLUMN_GAP.len() * widths.len().saturating_sub(1);
        lines.push("-".repeat(rule_len));

        for row in &self.rows {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", cell, width = *width)
                })
                .collect();
            lines.push(cells.join(COLUMN_GAP).trim_end().to_string());
        }
        lines.join("\n")
    }
}

/// Two-column boxed table for single-record details
pub fn key_value_box(rows: &[(&str, String)]) -> String {
    let key_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);
    let border = format!("+-{}-+-{}-+", "-".repeat(key_width), "-".repeat(value_width));

    let mut lines = vec![border.clone()];
    for (key, value) in rows {
        lines.push(format!(
            "| {:<kw$} | {:<vw$} |",
            key,
            value,
            kw = key_width,
            vw = value_width
        ));
        lines.push(border.clone());
    }
    lines.join("\n")
}

fn date_time(date: &chrono::DateTime<chrono::Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

pub fn validators_table(validators: &[ValidatorInfo], wei: bool) -> String {
    let mut table = Table::new([
        "Name".to_string(),
        "Id".to_string(),
        "Address".to_string(),
        "Description".to_string(),
        "Fee rate (%)".to_string(),
        "Registration time".to_string(),
        format!("Minimum delegation ({})", amount_unit(wei)),
        "Validator status".to_string(),
    ]);
    for validator in validators {
        table.add_row(vec![
            validator.name.clone(),
            validator.id.to_string(),
            validator.address.to_string(),
            validator.description.clone(),
            validator.fee_rate.to_string(),
            date_time(&validator.registration_time),
            format_amount(validator.minimum_delegation_amount, wei),
            if validator.trusted { "Trusted" } else { "Registered" }.to_string(),
        ]);
    }
    table.render()
}

pub fn validator_info(validator: &ValidatorInfo, msr: U256) -> String {
    key_value_box(&[
        ("Validator ID", validator.id.to_string()),
        ("Name", validator.name.clone()),
        ("Address", validator.address.to_string()),
        ("Fee rate (percent %)", validator.fee_rate.to_string()),
        ("Minimum delegation amount (SKL)", format_amount(validator.minimum_delegation_amount, false)),
        ("Accepting new delegation requests", yes_no(validator.accept_new_requests)),
        ("Trusted", yes_no(validator.trusted)),
        ("Minimum staking requirement (SKL)", format_amount(msr, false)),
    ])
}

pub fn delegations_table(delegations: &[DelegationInfo], wei: bool) -> String {
    let mut table = Table::new([
        "Id".to_string(),
        "Delegator Address".to_string(),
        "Status".to_string(),
        "Validator Id".to_string(),
        format!("Amount ({})", amount_unit(wei)),
        "Delegation period (months)".to_string(),
        "Created At".to_string(),
        "Info".to_string(),
    ]);
    for delegation in delegations {
        table.add_row(vec![
            delegation.id.to_string(),
            delegation.holder.to_string(),
            delegation.state.to_string(),
            delegation.validator_id.to_string(),
            format_amount(delegation.amount, wei),
            delegation.delegation_period.to_string(),
            date_time(&delegation.created),
            delegation.info.clone(),
        ]);
    }
    table.render()
}

pub fn linked_addresses_table(addresses: &[LinkedAddress]) -> String {
    let mut table = Table::new(["Address", "Status", "Balance (ETH)", "Nodes"]);
    for linked in addresses {
        table.add_row(vec![
            linked.address.to_string(),
            if linked.primary { "Primary" } else { "Linked" }.to_string(),
            from_wei(linked.balance),
            linked.nodes.to_string(),
        ]);
    }
    table.render()
}

pub fn node_metrics_table(metrics: &NodeMetrics, wei: bool) -> String {
    let mut table = Table::new(["Date", "Bounty", "Downtime", "Latency"]);
    for row in &metrics.rows {
        table.add_row(vec![
            date_time(&row.date),
            format_amount(row.bounty, wei),
            row.downtime.to_string(),
            format!("{:.1}", row.latency),
        ]);
    }
    table.render()
}

pub fn validator_metrics_table(metrics: &ValidatorMetrics, wei: bool) -> String {
    let mut table = Table::new(["Date", "Node ID", "Bounty", "Downtime", "Latency"]);
    for row in &metrics.rows {
        table.add_row(vec![
            date_time(&row.date),
            row.node_id.to_string(),
            format_amount(row.bounty, wei),
            row.downtime.to_string(),
            format!("{:.1}", row.latency),
        ]);
    }
    table.render()
}

pub fn node_totals_table(metrics: &ValidatorMetrics, wei: bool) -> String {
    let mut table = Table::new(["Node ID", "Bounty", "Downtime", "Latency"]);
    for totals in &metrics.totals {
        table.add_row(vec![
            totals.node_id.to_string(),
            format_amount(totals.bounty, wei),
            totals.downtime.to_string(),
            format!("{:.1}", totals.mean_latency),
        ]);
    }
    table.render()
}

/// Monthly bounty table with a blank spacer and a totals row at the bottom
pub fn bounty_table(report: &BountyReport, wei: bool) -> String {
    let mut headers = vec!["Date".to_string(), "All nodes".to_string()];
    headers.extend(report.node_ids.iter().map(|id| format!("Node ID = {}", id)));
    let mut table = Table::new(headers);

    for row in &report.rows {
        let mut cells = vec![row.month.clone(), format_amount(row.total, wei)];
        cells.extend(row.per_node.iter().map(|amount| format_amount(*amount, wei)));
        table.add_row(cells);
    }

    let (total, per_node) = report.totals();
    table.add_row(Vec::new());
    let mut totals = vec![TOTAL_LABEL.to_string(), format_amount(total, wei)];
    totals.extend(per_node.iter().map(|amount| format_amount(*amount, wei)));
    table.add_row(totals);

    table.render()
}

pub fn total_bounty_line(total: U256, wei: bool) -> String {
    format!(
        " Total bounty per the given period: {} {}",
        format_amount(total, wei),
        amount_unit(wei)
    )
}

/// Export validator metrics rows to CSV
pub fn write_validator_metrics_csv(path: &Path, metrics: &ValidatorMetrics, wei: bool) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Date", "Node ID", "Bounty", "Downtime", "Latency"])?;
    for row in &metrics.rows {
        writer.write_record([
            date_time(&row.date),
            row.node_id.to_string(),
            format_amount(row.bounty, wei),
            row.downtime.to_string(),
            format!("{:.1}", row.latency),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BountyRow, NodeMetricsRow, NodeTotals, ValidatorMetricsRow};
    use chrono::{TimeZone, Utc};

    fn skl(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u8))
    }

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new(["Id", "Name"]);
        table.add_row(vec!["1".to_string(), "Alice".to_string()]);
        table.add_row(vec!["10".to_string(), "Bob".to_string()]);

        let expected = "Id   Name\n----------\n1    Alice\n10   Bob";
        assert_eq!(table.render(), expected);
    }

    #[test]
    fn test_table_centers_headers() {
        let mut table = Table::new(["A", "B"]);
        table.add_row(vec!["xxxxx".to_string(), "y".to_string()]);

        let rendered = table.render();
        assert_eq!(rendered.lines().next().unwrap(), "  A     B");
        assert_eq!(rendered.lines().nth(1).unwrap(), "---------");
    }

    #[test]
    fn test_table_empty_row_renders_blank_line() {
        let mut table = Table::new(["A"]);
        table.add_row(Vec::new());
        assert_eq!(table.render(), "A\n-\n");
    }

    #[test]
    fn test_key_value_box() {
        let rendered = key_value_box(&[("Name", "Bob".to_string()), ("Id", "12".to_string())]);
        let expected = "+------+-----+\n| Name | Bob |\n+------+-----+\n| Id   | 12  |\n+------+-----+";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_node_metrics_table() {
        let metrics = NodeMetrics {
            rows: vec![NodeMetricsRow {
                date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                bounty: skl(2),
                downtime: U256::from(4u64),
                latency: 1.5,
            }],
            total_bounty: skl(2),
        };
        let rendered = node_metrics_table(&metrics, false);

        let header: Vec<&str> = rendered.lines().next().unwrap().split_whitespace().collect();
        assert_eq!(header, vec!["Date", "Bounty", "Downtime", "Latency"]);
        assert!(rendered.contains("2024-03-01 12:00:00   2.000"));
        assert!(rendered.ends_with("1.5"));
    }

    #[test]
    fn test_bounty_table_totals() {
        let report = BountyReport {
            node_ids: vec![0, 1],
            rows: vec![
                BountyRow {
                    month: "2024-02".to_string(),
                    total: skl(3),
                    per_node: vec![skl(1), skl(2)],
                },
                BountyRow {
                    month: "2024-01".to_string(),
                    total: skl(3),
                    per_node: vec![skl(1), skl(2)],
                },
            ],
        };
        let rendered = bounty_table(&report, false);
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].trim_start().starts_with("Date"));
        assert!(lines[0].contains("All nodes"));
        assert!(lines[0].contains("Node ID = 0"));
        assert!(lines[2].contains("3.000"));
        assert!(lines[2].starts_with("2024-02"));
        assert_eq!(lines[4], "");
        assert!(lines[5].starts_with(TOTAL_LABEL));
        assert!(lines[5].contains("6.000"));
    }

    #[test]
    fn test_bounty_table_wei() {
        let report = BountyReport {
            node_ids: vec![5],
            rows: vec![BountyRow {
                month: "2024-01".to_string(),
                total: U256::from(1234u64),
                per_node: vec![U256::from(1234u64)],
            }],
        };
        let rendered = bounty_table(&report, true);
        assert!(rendered.contains("All nodes"));
        assert!(!rendered.contains("WEI"));
        assert!(rendered.contains("1234"));
    }

    #[test]
    fn test_total_bounty_line() {
        assert_eq!(
            total_bounty_line(skl(5), false),
            " Total bounty per the given period: 5.000 SKL"
        );
        assert_eq!(
            total_bounty_line(U256::from(7u64), true),
            " Total bounty per the given period: 7 WEI"
        );
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        let metrics = ValidatorMetrics {
            rows: vec![ValidatorMetricsRow {
                date: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                node_id: 7,
                bounty: U256::from(100u64),
                downtime: U256::from(2u64),
                latency: 0.4,
            }],
            totals: vec![NodeTotals {
                node_id: 7,
                bounty: U256::from(100u64),
                downtime: U256::from(2u64),
                mean_latency: 0.4,
            }],
            total_bounty: U256::from(100u64),
        };

        write_validator_metrics_csv(&path, &metrics, true).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Date,Node ID,Bounty,Downtime,Latency\n2024-01-02 03:04:05,7,100,2,0.4\n"
        );
    }
}
