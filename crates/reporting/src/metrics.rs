//! Metrics engine — aggregate and per-interaction campaign metrics over a
//! resolved export, with test-user exclusion applied once up front.

use crate::schema::{CanonicalField, ResolvedSchema};
use campaign_core::IngestConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Cell values treated as "no value" in addition to the empty string.
const MISSING_MARKERS: [&str; 5] = ["null", "nan", "n/a", "na", "undefined"];

// ─── Metric catalogue ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TotalRows,
    UniqueVisitors,
    Impressions,
    Visits,
    Plays,
    ThumbnailClicks,
    Completions,
    UniqueCompletions,
    UniqueCompletionRate,
    CompletionRate,
    TotalAudience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Count,
    /// Percentage constrained to [0, 100].
    Rate,
    /// Percentage over an independent denominator; may exceed 100.
    UnboundedRate,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::TotalRows,
        Metric::UniqueVisitors,
        Metric::Impressions,
        Metric::Visits,
        Metric::Plays,
        Metric::ThumbnailClicks,
        Metric::Completions,
        Metric::UniqueCompletions,
        Metric::UniqueCompletionRate,
        Metric::CompletionRate,
        Metric::TotalAudience,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::TotalRows => "totalRows",
            Metric::UniqueVisitors => "uniqueVisitors",
            Metric::Impressions => "impressions",
            Metric::Visits => "visits",
            Metric::Plays => "plays",
            Metric::ThumbnailClicks => "thumbnailClicks",
            Metric::Completions => "completions",
            Metric::UniqueCompletions => "uniqueCompletions",
            Metric::UniqueCompletionRate => "uniqueCompletionRate",
            Metric::CompletionRate => "completionRate",
            Metric::TotalAudience => "totalAudience",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::TotalRows => "Total Rows",
            Metric::UniqueVisitors => "Unique Visitors",
            Metric::Impressions => "Impressions",
            Metric::Visits => "Visits",
            Metric::Plays => "Plays",
            Metric::ThumbnailClicks => "Thumbnail Clicks",
            Metric::Completions => "Completions",
            Metric::UniqueCompletions => "Unique Completions",
            Metric::UniqueCompletionRate => "Unique Completion Rate",
            Metric::CompletionRate => "Completion Rate",
            Metric::TotalAudience => "Total Audience",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::UniqueCompletionRate => MetricKind::Rate,
            Metric::CompletionRate => MetricKind::UnboundedRate,
            _ => MetricKind::Count,
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Rates render with the percent sign first (`%100.00`); report text is
/// assembled by concatenating this string after the label.
pub fn format_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::Rate | MetricKind::UnboundedRate => format!("%{value:.2}"),
        MetricKind::Count if value.fract() == 0.0 => format!("{value:.0}"),
        MetricKind::Count => format!("{value:.2}"),
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMetric {
    pub header: String,
    pub display_name: String,
    /// Distinct identities with any value present in the column.
    pub unique_users: u64,
    /// Sum of the numeric values in the column.
    pub total_events: f64,
}

/// Computed metrics for one export. Metrics whose source column is missing
/// are absent rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    metrics: BTreeMap<Metric, f64>,
    interactions: Vec<InteractionMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_audience: Option<u64>,
    excluded_rows: u64,
}

impl MetricsRecord {
    /// Value for a metric or interaction header key.
    pub fn get(&self, name: &str) -> Option<f64> {
        match Metric::from_name(name) {
            Some(metric) => self.metric(metric),
            None => self.interaction(name).map(|i| i.unique_users as f64),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalAudience => self.total_audience.map(|v| v as f64),
            other => self.metrics.get(&other).copied(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Display label for a metric or interaction header key.
    pub fn label(&self, name: &str) -> Option<String> {
        if !self.contains(name) {
            return None;
        }
        match Metric::from_name(name) {
            Some(metric) => Some(metric.label().to_string()),
            None => self.interaction(name).map(|i| i.display_name.clone()),
        }
    }

    /// Formatted value ready for report text.
    pub fn display_value(&self, name: &str) -> Option<String> {
        let value = self.get(name)?;
        let kind = Metric::from_name(name).map_or(MetricKind::Count, |m| m.kind());
        Some(format_value(kind, value))
    }

    pub fn interactions(&self) -> &[InteractionMetric] {
        &self.interactions
    }

    pub fn interaction(&self, header: &str) -> Option<&InteractionMetric> {
        self.interactions.iter().find(|i| i.header == header)
    }

    /// Names of every metric present, core metrics first then interactions.
    pub fn available(&self) -> Vec<String> {
        Metric::ALL
            .iter()
            .filter(|m| self.metric(**m).is_some())
            .map(|m| m.name().to_string())
            .chain(self.interactions.iter().map(|i| i.header.clone()))
            .collect()
    }

    pub fn total_audience(&self) -> Option<u64> {
        self.total_audience
    }

    /// Rows dropped by test-user exclusion.
    pub fn excluded_rows(&self) -> u64 {
        self.excluded_rows
    }

    /// New record carrying a manually supplied audience size.
    pub fn with_total_audience(&self, audience: u64) -> MetricsRecord {
        MetricsRecord {
            total_audience: Some(audience),
            ..self.clone()
        }
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct MetricsEngine {
    test_user_ids: HashSet<String>,
}

impl MetricsEngine {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            test_user_ids: config
                .test_user_ids
                .iter()
                .map(|id| normalize_identity(id))
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    pub fn is_test_user(&self, identity: &str) -> bool {
        self.test_user_ids.contains(&normalize_identity(identity))
    }

    pub fn compute(&self, rows: &[Vec<String>], schema: &ResolvedSchema) -> MetricsRecord {
        let id_pos = schema.user_id_position();
        let eligible: Vec<&Vec<String>> = rows
            .iter()
            .filter(|row| !self.is_test_user(cell(row, id_pos)))
            .collect();
        let excluded_rows = (rows.len() - eligible.len()) as u64;

        ::metrics::counter!("reporting.rows_excluded").increment(excluded_rows);
        if excluded_rows > 0 {
            info!(excluded = excluded_rows, "Test-user rows excluded");
        }

        let visitors: HashSet<&str> = eligible
            .iter()
            .filter_map(|row| identity(row, id_pos))
            .collect();

        let mut values = BTreeMap::new();
        values.insert(Metric::TotalRows, eligible.len() as f64);
        values.insert(Metric::UniqueVisitors, visitors.len() as f64);

        let sum_of = |field: CanonicalField| -> Option<f64> {
            let pos = schema.position(field)?;
            Some(eligible.iter().filter_map(|row| parse_count(cell(row, pos))).sum())
        };

        for (field, metric) in [
            (CanonicalField::Impressions, Metric::Impressions),
            (CanonicalField::Visits, Metric::Visits),
            (CanonicalField::Plays, Metric::Plays),
            (CanonicalField::ThumbnailClicks, Metric::ThumbnailClicks),
            (CanonicalField::Completions, Metric::Completions),
        ] {
            if let Some(total) = sum_of(field) {
                values.insert(metric, total);
            }
        }

        if let Some(pos) = schema.position(CanonicalField::Completions) {
            let completers: HashSet<&str> = eligible
                .iter()
                .filter(|row| parse_count(cell(row, pos)).is_some_and(|v| v > 0.0))
                .filter_map(|row| identity(row, id_pos))
                .collect();
            values.insert(Metric::UniqueCompletions, completers.len() as f64);
            values.insert(
                Metric::UniqueCompletionRate,
                percentage(completers.len() as f64, visitors.len() as f64),
            );
            if let Some(impressions) = values.get(&Metric::Impressions).copied() {
                let completions = values.get(&Metric::Completions).copied().unwrap_or(0.0);
                values.insert(Metric::CompletionRate, percentage(completions, impressions));
            }
        }

        let interactions = schema
            .interaction_columns()
            .iter()
            .map(|column| {
                let present: Vec<&Vec<String>> = eligible
                    .iter()
                    .copied()
                    .filter(|row| is_present(cell(row, column.position)))
                    .collect();
                let users: HashSet<&str> = present
                    .iter()
                    .filter_map(|row| identity(row, id_pos))
                    .collect();
                InteractionMetric {
                    header: column.header.clone(),
                    display_name: column.display_name.clone(),
                    unique_users: users.len() as u64,
                    total_events: present
                        .iter()
                        .filter_map(|row| parse_count(cell(row, column.position)))
                        .sum(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            rows = eligible.len(),
            unique_visitors = visitors.len(),
            interactions = interactions.len(),
            "Metrics computed"
        );

        MetricsRecord {
            metrics: values,
            interactions,
            total_audience: None,
            excluded_rows,
        }
    }
}

fn cell(row: &[String], pos: usize) -> &str {
    row.get(pos).map(String::as_str).unwrap_or("")
}

fn identity(row: &[String], pos: usize) -> Option<&str> {
    let id = cell(row, pos).trim();
    (!id.is_empty()).then_some(id)
}

fn normalize_identity(id: &str) -> String {
    id.trim().to_lowercase()
}

fn is_present(raw: &str) -> bool {
    let value = raw.trim();
    !value.is_empty() && !MISSING_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m))
}

/// Non-negative numeric reading of a cell; thousands separators allowed.
fn parse_count(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// `part / whole * 100`, with an empty denominator reported as 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
