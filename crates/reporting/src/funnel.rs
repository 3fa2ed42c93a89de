//! Funnel analysis — arranges selected metrics into ordered conversion stages.

use crate::metrics::{percentage, Metric, MetricsRecord};
use campaign_core::{CampaignError, CampaignResult, FunnelConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Preferred stage order when proposing a default funnel: widest reach
/// first, deepest engagement last.
const DEFAULT_STAGE_ORDER: [Metric; 8] = [
    Metric::TotalAudience,
    Metric::Impressions,
    Metric::UniqueVisitors,
    Metric::Visits,
    Metric::Plays,
    Metric::ThumbnailClicks,
    Metric::Completions,
    Metric::UniqueCompletions,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepResult {
    /// Metric name or interaction header the stage was built from.
    pub metric: String,
    pub label: String,
    pub value: f64,
    /// Share of the first stage, in percent. Always 100 for the first stage.
    pub percent_of_first: f64,
    /// Share of the preceding stage, in percent. Absent for the first stage.
    pub percent_of_previous: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelResult {
    pub steps: Vec<FunnelStepResult>,
    pub overall_conversion_rate: f64,
}

impl FunnelResult {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct FunnelAnalyzer {
    bounds: FunnelConfig,
}

impl FunnelAnalyzer {
    pub fn new(bounds: FunnelConfig) -> CampaignResult<Self> {
        bounds.validate()?;
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &FunnelConfig {
        &self.bounds
    }

    /// Build a funnel over `selection`, in exactly the order given.
    pub fn analyze<S: AsRef<str>>(
        &self,
        metrics: &MetricsRecord,
        selection: &[S],
    ) -> CampaignResult<FunnelResult> {
        if !self.bounds.accepts(selection.len()) {
            return Err(CampaignError::InvalidFunnelSize {
                requested: selection.len(),
                min: self.bounds.min_stages,
                max: self.bounds.max_stages,
            });
        }

        let mut staged = Vec::with_capacity(selection.len());
        for name in selection {
            let name = name.as_ref();
            let value = metrics
                .get(name)
                .ok_or_else(|| CampaignError::UnknownMetric(name.to_string()))?;
            let label = metrics.label(name).unwrap_or_else(|| name.to_string());
            staged.push((name.to_string(), label, value));
        }

        let first = staged.first().map_or(0.0, |(_, _, v)| *v);
        let mut steps: Vec<FunnelStepResult> = Vec::with_capacity(staged.len());
        for (metric, label, value) in staged {
            let (percent_of_first, percent_of_previous) = match steps.last() {
                None => (100.0, None),
                Some(prev) => (percentage(value, first), Some(percentage(value, prev.value))),
            };
            steps.push(FunnelStepResult {
                metric,
                label,
                value,
                percent_of_first,
                percent_of_previous,
            });
        }

        let overall = steps.last().map_or(0.0, |s| percentage(s.value, first));

        ::metrics::counter!("reporting.funnels_built").increment(1);
        info!(stages = steps.len(), overall_conversion = overall, "Funnel built");

        Ok(FunnelResult {
            steps,
            overall_conversion_rate: overall,
        })
    }

    /// Propose a default stage list from the metrics that are present,
    /// padded with interaction columns if the core metrics fall short.
    pub fn default_selection(&self, metrics: &MetricsRecord) -> Vec<String> {
        let target = self.bounds.default_stages;
        DEFAULT_STAGE_ORDER
            .iter()
            .filter(|m| metrics.metric(**m).is_some())
            .map(|m| m.name().to_string())
            .chain(metrics.interactions().iter().map(|i| i.header.clone()))
            .take(target)
            .collect()
    }
}

impl Default for FunnelAnalyzer {
    fn default() -> Self {
        Self {
            bounds: FunnelConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsEngine;
    use crate::schema::ResolvedSchema;
    use campaign_core::IngestConfig;

    fn record(headers: &[&str], rows: &[&[&str]]) -> MetricsRecord {
        let headers: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        let schema = ResolvedSchema::resolve(&headers, "event_count_").unwrap();
        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        MetricsEngine::new(&IngestConfig::default()).compute(&rows, &schema)
    }

    fn sample() -> MetricsRecord {
        record(
            &["UserID", "impressions", "plays", "completions", "event_count_click"],
            &[
                &["U1", "100", "40", "10", "1"],
                &["U2", "60", "20", "10", ""],
                &["U3", "40", "20", "0", "3"],
            ],
        )
    }

    #[test]
    fn test_stage_percentages() {
        let funnel = FunnelAnalyzer::default()
            .analyze(&sample(), &["impressions", "plays", "completions"])
            .unwrap();
        assert_eq!(funnel.len(), 3);

        let first = &funnel.steps[0];
        assert_eq!(first.label, "Impressions");
        assert_eq!(first.value, 200.0);
        assert_eq!(first.percent_of_first, 100.0);
        assert_eq!(first.percent_of_previous, None);

        let plays = &funnel.steps[1];
        assert!((plays.percent_of_first - 40.0).abs() < 1e-9);
        assert!((plays.percent_of_previous.unwrap() - 40.0).abs() < 1e-9);

        let completions = &funnel.steps[2];
        assert!((completions.percent_of_first - 10.0).abs() < 1e-9);
        assert!((completions.percent_of_previous.unwrap() - 25.0).abs() < 1e-9);
        assert!((funnel.overall_conversion_rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_caller_order_preserved() {
        let funnel = FunnelAnalyzer::default()
            .analyze(&sample(), &["completions", "plays", "impressions"])
            .unwrap();
        let names: Vec<&str> = funnel.steps.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(names, vec!["completions", "plays", "impressions"]);
        assert!((funnel.steps[2].percent_of_first - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_first_stage_reports_zero() {
        let metrics = record(
            &["UserID", "impressions", "plays", "visits"],
            &[&["U1", "0", "5", "2"]],
        );
        let funnel = FunnelAnalyzer::default()
            .analyze(&metrics, &["impressions", "plays", "visits"])
            .unwrap();
        assert_eq!(funnel.steps[0].percent_of_first, 100.0);
        for step in &funnel.steps[1..] {
            assert_eq!(step.percent_of_first, 0.0);
            assert!(!step.percent_of_first.is_nan());
        }
        assert_eq!(funnel.steps[1].percent_of_previous, Some(0.0));
        assert!((funnel.steps[2].percent_of_previous.unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(funnel.overall_conversion_rate, 0.0);
    }

    #[test]
    fn test_stage_count_bounds() {
        let analyzer = FunnelAnalyzer::default();
        let metrics = sample();
        let too_few = analyzer.analyze(&metrics, &["impressions", "plays"]);
        assert!(matches!(
            too_few,
            Err(CampaignError::InvalidFunnelSize {
                requested: 2,
                min: 3,
                max: 6
            })
        ));

        let seven = [
            "totalRows",
            "uniqueVisitors",
            "impressions",
            "plays",
            "completions",
            "uniqueCompletions",
            "event_count_click",
        ];
        assert!(matches!(
            analyzer.analyze(&metrics, &seven),
            Err(CampaignError::InvalidFunnelSize { requested: 7, .. })
        ));
        assert!(analyzer.analyze(&metrics, &seven[..6]).is_ok());
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let err = FunnelAnalyzer::default()
            .analyze(&sample(), &["impressions", "visits", "plays"])
            .unwrap_err();
        match err {
            CampaignError::UnknownMetric(name) => assert_eq!(name, "visits"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_total_audience_stage_requires_override() {
        let analyzer = FunnelAnalyzer::default();
        let metrics = sample();
        let selection = ["totalAudience", "impressions", "plays"];
        assert!(matches!(
            analyzer.analyze(&metrics, &selection),
            Err(CampaignError::UnknownMetric(_))
        ));

        let funnel = analyzer
            .analyze(&metrics.with_total_audience(1000), &selection)
            .unwrap();
        assert_eq!(funnel.steps[0].label, "Total Audience");
        assert!((funnel.steps[1].percent_of_first - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_interaction_stage() {
        let funnel = FunnelAnalyzer::default()
            .analyze(&sample(), &["uniqueVisitors", "uniqueCompletions", "event_count_click"])
            .unwrap();
        assert_eq!(funnel.steps[2].label, "Click");
        assert_eq!(funnel.steps[2].value, 2.0);
    }

    #[test]
    fn test_default_selection() {
        let analyzer = FunnelAnalyzer::default();
        let selection = analyzer.default_selection(&sample());
        assert_eq!(
            selection,
            vec!["impressions", "uniqueVisitors", "plays", "completions"]
        );
        assert!(analyzer.analyze(&sample(), &selection).is_ok());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let bounds = FunnelConfig {
            min_stages: 4,
            max_stages: 3,
            default_stages: 3,
        };
        assert!(FunnelAnalyzer::new(bounds).is_err());
    }
}
