//! Campaign metadata extraction from export filenames.
//!
//! Filenames follow loose conventions that vary by campaign. Each
//! convention is a [`FilenamePattern`]: a named regex whose named capture
//! groups (`campaign`, `client`, `year`, `quarter`, `start`, `end`, `date`)
//! feed the [`CampaignMetadata`] record. Patterns are tried in order and the
//! first one that matches *and* yields valid dates wins.

use crate::schema::title_case;
use campaign_core::{CampaignError, CampaignResult};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Canonical display format for every extracted date, e.g. `13 May 2025`.
pub const CANONICAL_DATE_FORMAT: &str = "%d %B %Y";

const DATE: &str = r"\d{1,2}[_./-]\d{1,2}[_./-]\d{4}|\d{4}[_./-]\d{1,2}[_./-]\d{1,2}";

static BUILTIN_PATTERNS: LazyLock<Vec<FilenamePattern>> = LazyLock::new(|| {
    [
        (
            "client_quarter_range",
            format!(
                r"(?i)^(?P<client>.+?)\s+-\s+(?P<year>\d{{4}})\s*Q(?P<quarter>[1-4])\s+(?P<start>{DATE})\s*-\s*(?P<end>{DATE})$"
            ),
        ),
        (
            "campaign_range",
            format!(r"^(?P<campaign>.+?)\s+-\s+(?P<start>{DATE})\s+-\s+(?P<end>{DATE})$"),
        ),
        (
            "campaign_iso_date",
            r"^(?P<campaign>.+?)[\s_]+(?P<date>\d{4}-\d{2}-\d{2})$".to_string(),
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| FilenamePattern {
        name: name.to_string(),
        regex: Regex::new(&pattern).unwrap(),
    })
    .collect()
});

/// Best-effort campaign description derived from a filename. Every field is
/// independently optional; absent means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMetadata {
    pub campaign_name: Option<String>,
    pub client: Option<String>,
    #[serde(default, with = "canonical_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "canonical_date")]
    pub end_date: Option<NaiveDate>,
    pub quarter: Option<String>,
    pub matched_pattern: Option<String>,
}

impl CampaignMetadata {
    pub fn is_empty(&self) -> bool {
        self.matched_pattern.is_none()
    }

    /// `13 May 2025 - 20 May 2025`, or the single known date.
    pub fn date_range_display(&self) -> Option<String> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(format!(
                "{} - {}",
                format_date(start),
                format_date(end)
            )),
            (Some(date), None) | (None, Some(date)) => Some(format_date(date)),
            (None, None) => None,
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// Parse a filename date token in any accepted layout
/// (`DD_MM_YYYY`, `DD-MM-YYYY`, `DD.MM.YYYY`, `YYYY-MM-DD`, ...).
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let normalized: String = token
        .trim()
        .chars()
        .map(|c| if matches!(c, '_' | '.' | '/') { '-' } else { c })
        .collect();
    ["%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
}

#[derive(Debug, Clone)]
pub struct FilenamePattern {
    name: String,
    regex: Regex,
}

impl FilenamePattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> CampaignResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| CampaignError::Config(format!("invalid filename pattern: {e}")))?;
        Ok(Self {
            name: name.into(),
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stem: &str) -> Option<CampaignMetadata> {
        let caps = self.regex.captures(stem)?;
        interpret(&self.name, &caps)
    }
}

/// Turn captures into a record. Returns `None` when a captured date is
/// invalid or the range is inverted, so no partially parsed record escapes.
fn interpret(pattern: &str, caps: &Captures<'_>) -> Option<CampaignMetadata> {
    let text = |group: &str| {
        caps.name(group)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
    };
    let date = |group: &str| -> Option<Option<NaiveDate>> {
        match text(group) {
            Some(token) => parse_date_token(token).map(Some),
            None => Some(None),
        }
    };

    let start_date = date("start")?.or(date("date")?);
    let end_date = date("end")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return None;
        }
    }

    let client = text("client").map(title_case);
    let quarter = match (text("year"), text("quarter")) {
        (Some(year), Some(q)) => Some(format!("{year} Q{q}")),
        _ => None,
    };
    let campaign_name = text("campaign").map(title_case).or_else(|| match (&client, &quarter) {
        (Some(client), Some(quarter)) => Some(format!("{client} {quarter}")),
        _ => None,
    });

    Some(CampaignMetadata {
        campaign_name,
        client,
        start_date,
        end_date,
        quarter,
        matched_pattern: Some(pattern.to_string()),
    })
}

/// Ordered filename rules; first successful match wins.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    patterns: Vec<FilenamePattern>,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            patterns: BUILTIN_PATTERNS.clone(),
        }
    }

    /// Append a rule tried after the existing ones.
    pub fn with_pattern(mut self, pattern: FilenamePattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(FilenamePattern::name)
    }

    pub fn extract(&self, filename: &str) -> CampaignMetadata {
        let stem = file_stem(filename);
        for pattern in &self.patterns {
            if let Some(metadata) = pattern.apply(stem) {
                info!(
                    filename = %filename,
                    pattern = %pattern.name,
                    campaign = ?metadata.campaign_name,
                    "Filename metadata extracted"
                );
                return metadata;
            }
        }
        debug!(filename = %filename, "No filename pattern matched");
        CampaignMetadata::default()
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn file_stem(filename: &str) -> &str {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && ext.chars().all(char::is_alphanumeric)
                && ext.chars().any(char::is_alphabetic) =>
        {
            stem.trim()
        }
        _ => name.trim(),
    }
}

mod canonical_date {
    use super::CANONICAL_DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_some(&d.format(CANONICAL_DATE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| {
                NaiveDate::parse_from_str(&s, CANONICAL_DATE_FORMAT)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
