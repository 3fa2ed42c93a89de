use crate::error::{CampaignError, CampaignResult};
use serde::Deserialize;
use std::path::Path;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_REPORT__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub funnel: FunnelConfig,
}

/// Settings that shape how an export file is read and which rows count.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Identities excluded from every metric (QA accounts).
    #[serde(default = "default_test_user_ids")]
    pub test_user_ids: Vec<String>,
    /// Header prefix marking a dynamically named event-count column.
    #[serde(default = "default_interaction_column_prefix")]
    pub interaction_column_prefix: String,
}

/// Bounds on the number of stages a funnel may hold.
#[derive(Debug, Clone, Deserialize)]
pub struct FunnelConfig {
    #[serde(default = "default_min_stages")]
    pub min_stages: usize,
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,
    #[serde(default = "default_default_stages")]
    pub default_stages: usize,
}

fn default_test_user_ids() -> Vec<String> {
    vec!["TESTUSER".to_string()]
}
fn default_interaction_column_prefix() -> String {
    "event_count_".to_string()
}
fn default_min_stages() -> usize {
    3
}
fn default_max_stages() -> usize {
    6
}
fn default_default_stages() -> usize {
    4
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            test_user_ids: default_test_user_ids(),
            interaction_column_prefix: default_interaction_column_prefix(),
        }
    }
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            min_stages: default_min_stages(),
            max_stages: default_max_stages(),
            default_stages: default_default_stages(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> CampaignResult<()> {
        if self.interaction_column_prefix.trim().is_empty() {
            return Err(CampaignError::Config(
                "interaction_column_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl FunnelConfig {
    pub fn validate(&self) -> CampaignResult<()> {
        if self.min_stages == 0 {
            return Err(CampaignError::Config("min_stages must be at least 1".into()));
        }
        if self.min_stages > self.max_stages {
            return Err(CampaignError::Config(format!(
                "min_stages ({}) exceeds max_stages ({})",
                self.min_stages, self.max_stages
            )));
        }
        if !(self.min_stages..=self.max_stages).contains(&self.default_stages) {
            return Err(CampaignError::Config(format!(
                "default_stages ({}) must lie within {}..={}",
                self.default_stages, self.min_stages, self.max_stages
            )));
        }
        Ok(())
    }

    pub fn accepts(&self, stages: usize) -> bool {
        (self.min_stages..=self.max_stages).contains(&stages)
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&Path>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(true)),
            None => builder.add_source(config::File::with_name("campaign-report").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_REPORT")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ingest.test_user_ids"),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CampaignError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CampaignResult<()> {
        self.ingest.validate()?;
        self.funnel.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.funnel.min_stages, 3);
        assert_eq!(config.funnel.max_stages, 6);
        assert_eq!(config.funnel.default_stages, 4);
        assert_eq!(config.ingest.interaction_column_prefix, "event_count_");
        assert_eq!(config.ingest.test_user_ids, vec!["TESTUSER".to_string()]);
    }

    #[test]
    fn test_funnel_bounds_validation() {
        let inverted = FunnelConfig {
            min_stages: 5,
            max_stages: 4,
            default_stages: 4,
        };
        assert!(matches!(inverted.validate(), Err(CampaignError::Config(_))));

        let default_outside = FunnelConfig {
            min_stages: 3,
            max_stages: 6,
            default_stages: 7,
        };
        assert!(default_outside.validate().is_err());

        let zero = FunnelConfig {
            min_stages: 0,
            max_stages: 6,
            default_stages: 4,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_funnel_accepts() {
        let bounds = FunnelConfig::default();
        assert!(!bounds.accepts(2));
        assert!(bounds.accepts(3));
        assert!(bounds.accepts(6));
        assert!(!bounds.accepts(7));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let ingest = IngestConfig {
            test_user_ids: vec![],
            interaction_column_prefix: "  ".into(),
        };
        assert!(ingest.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[funnel]\nmax_stages = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(parsed.funnel.max_stages, 5);
        assert_eq!(parsed.funnel.min_stages, 3);
        assert_eq!(parsed.ingest.interaction_column_prefix, "event_count_");
    }
}
