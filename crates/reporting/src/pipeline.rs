//! Per-file ingestion pipeline — parse, resolve, extract, compute.
//!
//! A pipeline owns a snapshot of its configuration, so independent
//! pipelines can run concurrently without coordination.

use crate::funnel::{FunnelAnalyzer, FunnelResult};
use crate::metadata::{CampaignMetadata, MetadataExtractor};
use crate::metrics::{MetricsEngine, MetricsRecord};
use crate::parser;
use crate::schema::{InteractionColumn, ResolvedSchema};
use campaign_core::{AppConfig, CampaignResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Everything derived from one export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub report_id: Uuid,
    pub source_file: String,
    pub generated_at: DateTime<Utc>,
    pub metadata: CampaignMetadata,
    pub interaction_columns: Vec<InteractionColumn>,
    pub metrics: MetricsRecord,
}

impl IngestReport {
    /// Copy of this report with a manually supplied audience size.
    pub fn with_total_audience(&self, audience: u64) -> IngestReport {
        IngestReport {
            metrics: self.metrics.with_total_audience(audience),
            ..self.clone()
        }
    }
}

pub struct ReportPipeline {
    config: AppConfig,
    extractor: MetadataExtractor,
    engine: MetricsEngine,
    funnel: FunnelAnalyzer,
}

impl ReportPipeline {
    pub fn new(config: AppConfig) -> CampaignResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor: MetadataExtractor::new(),
            engine: MetricsEngine::new(&config.ingest),
            funnel: FunnelAnalyzer::new(config.funnel.clone())?,
            config,
        })
    }

    /// Replace the filename rules, e.g. to add campaign-specific patterns.
    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the whole pipeline over one file's text. Any failure rejects the
    /// file; no partial report is produced.
    pub fn ingest(&self, filename: &str, content: &str) -> CampaignResult<IngestReport> {
        let table = parser::parse(content)?;
        ::metrics::counter!("reporting.rows_parsed").increment(table.row_count() as u64);

        let schema =
            ResolvedSchema::resolve(&table.headers, &self.config.ingest.interaction_column_prefix)?;
        let metadata = self.extractor.extract(filename);
        let metrics = self.engine.compute(&table.rows, &schema);

        ::metrics::counter!("reporting.files_ingested").increment(1);
        info!(
            file = %filename,
            rows = table.row_count(),
            excluded = metrics.excluded_rows(),
            interactions = schema.interaction_columns().len(),
            "Export ingested"
        );

        Ok(IngestReport {
            report_id: Uuid::new_v4(),
            source_file: filename.to_string(),
            generated_at: Utc::now(),
            metadata,
            interaction_columns: schema.interaction_columns().to_vec(),
            metrics,
        })
    }

    /// Read and ingest a file from disk.
    pub fn ingest_path(&self, path: &Path) -> CampaignResult<IngestReport> {
        let content = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest(&filename, &content)
    }

    pub fn build_funnel<S: AsRef<str>>(
        &self,
        metrics: &MetricsRecord,
        selection: &[S],
    ) -> CampaignResult<FunnelResult> {
        self.funnel.analyze(metrics, selection)
    }

    pub fn default_funnel_selection(&self, metrics: &MetricsRecord) -> Vec<String> {
        self.funnel.default_selection(metrics)
    }
}
