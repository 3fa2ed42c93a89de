//! Campaign export ingestion and reporting — parses analytics exports,
//! resolves their schema, extracts filename metadata, and derives the
//! metrics and funnels that feed generated reports.

pub mod funnel;
pub mod metadata;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod schema;

pub use funnel::{FunnelAnalyzer, FunnelResult, FunnelStepResult};
pub use metadata::{CampaignMetadata, FilenamePattern, MetadataExtractor};
pub use metrics::{InteractionMetric, Metric, MetricKind, MetricsEngine, MetricsRecord};
pub use parser::ParsedTable;
pub use pipeline::{IngestReport, ReportPipeline};
pub use schema::{CanonicalField, InteractionColumn, ResolvedSchema};
