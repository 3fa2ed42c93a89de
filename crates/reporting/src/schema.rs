//! Schema resolution — maps export headers onto canonical fields and
//! discovers dynamically named interaction columns.

use campaign_core::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Logical attributes an export may carry under varying header spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    UserId,
    Impressions,
    Completions,
    ThumbnailClicks,
    Visits,
    Plays,
}

impl CanonicalField {
    /// Resolution order. Earlier fields claim a header first.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::UserId,
        CanonicalField::Impressions,
        CanonicalField::Completions,
        CanonicalField::ThumbnailClicks,
        CanonicalField::Visits,
        CanonicalField::Plays,
    ];

    /// Accepted header spellings, compared case-insensitively.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::UserId => &["userid", "user_id", "user id", "visitorid", "visitor_id", "visitor id"],
            CanonicalField::Impressions => &["impressions", "impression", "views", "view_count"],
            CanonicalField::Completions => &["completions", "completion", "completed", "complete_count"],
            CanonicalField::ThumbnailClicks => &["thumbnail_clicks", "thumbnailclicks", "thumbnail clicks", "thumbnail_click"],
            CanonicalField::Visits => &["visits", "visit", "sessions"],
            CanonicalField::Plays => &["plays", "play", "play_count"],
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, CanonicalField::UserId)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalField::UserId => "userId",
            CanonicalField::Impressions => "impressions",
            CanonicalField::Completions => "completions",
            CanonicalField::ThumbnailClicks => "thumbnailClicks",
            CanonicalField::Visits => "visits",
            CanonicalField::Plays => "plays",
        }
    }

    fn matches(&self, header: &str) -> bool {
        let normalized = header.trim().to_lowercase();
        self.synonyms().iter().any(|s| *s == normalized)
    }
}

/// An event column discovered by its naming prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionColumn {
    /// Original header text; the lookup key for values and metrics.
    pub header: String,
    /// Title-cased event name derived from the suffix.
    pub display_name: String,
    pub position: usize,
}

/// Resolved header layout for one export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    fields: BTreeMap<CanonicalField, usize>,
    interactions: Vec<InteractionColumn>,
}

impl ResolvedSchema {
    /// Resolve `headers`, failing only when a required field is absent.
    pub fn resolve(headers: &[String], interaction_prefix: &str) -> CampaignResult<Self> {
        let mut fields = BTreeMap::new();
        let mut claimed = vec![false; headers.len()];

        for field in CanonicalField::ALL {
            let hit = headers
                .iter()
                .enumerate()
                .find(|(pos, h)| !claimed[*pos] && field.matches(h));
            if let Some((pos, _)) = hit {
                claimed[pos] = true;
                fields.insert(field, pos);
            } else if field.is_required() {
                return Err(CampaignError::SchemaResolution(format!(
                    "no column for required field '{}' (accepted: {})",
                    field.display_name(),
                    field.synonyms().join(", ")
                )));
            }
        }

        let prefix = interaction_prefix.to_lowercase();
        let mut interactions: Vec<InteractionColumn> = Vec::new();
        for (pos, header) in headers.iter().enumerate() {
            if claimed[pos] {
                continue;
            }
            let Some(suffix) = strip_prefix_ignore_case(header, &prefix) else {
                continue;
            };
            if suffix.trim().is_empty() || interactions.iter().any(|c| c.header == *header) {
                continue;
            }
            interactions.push(InteractionColumn {
                header: header.clone(),
                display_name: title_case(suffix),
                position: pos,
            });
        }

        info!(
            fields = fields.len(),
            interactions = interactions.len(),
            "Schema resolved"
        );
        debug!(fields = ?fields, "Canonical field positions");

        Ok(Self {
            fields,
            interactions,
        })
    }

    pub fn position(&self, field: CanonicalField) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Identity column position. Always present once resolved.
    pub fn user_id_position(&self) -> usize {
        self.fields[&CanonicalField::UserId]
    }

    pub fn interaction_columns(&self) -> &[InteractionColumn] {
        &self.interactions
    }

    /// Raw cell for `field` in `row`, if the field resolved.
    pub fn value<'a>(&self, row: &'a [String], field: CanonicalField) -> Option<&'a str> {
        self.position(field)
            .and_then(|pos| row.get(pos))
            .map(String::as_str)
    }
}

fn strip_prefix_ignore_case<'a>(header: &'a str, lowercase_prefix: &str) -> Option<&'a str> {
    let head = header.get(..lowercase_prefix.len())?;
    if head.to_lowercase() == lowercase_prefix {
        header.get(lowercase_prefix.len()..)
    } else {
        None
    }
}

/// Title-case words split on underscores and whitespace; hyphenated parts
/// are capitalised individually. All-caps words (acronyms) are kept as written.
pub fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    if word.chars().count() > 1 && word.chars().all(|c| !c.is_lowercase()) {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolves_case_insensitive_synonyms() {
        let schema = ResolvedSchema::resolve(
            &headers(&["UserID", "Views", "COMPLETIONS", "Plays"]),
            "event_count_",
        )
        .unwrap();
        assert_eq!(schema.position(CanonicalField::UserId), Some(0));
        assert_eq!(schema.position(CanonicalField::Impressions), Some(1));
        assert_eq!(schema.position(CanonicalField::Completions), Some(2));
        assert_eq!(schema.position(CanonicalField::Plays), Some(3));
        assert!(!schema.has(CanonicalField::Visits));
        assert!(!schema.has(CanonicalField::ThumbnailClicks));
    }

    #[test]
    fn test_first_matching_header_wins() {
        let schema = ResolvedSchema::resolve(
            &headers(&["user_id", "impressions", "UserID", "views"]),
            "event_count_",
        )
        .unwrap();
        assert_eq!(schema.user_id_position(), 0);
        assert_eq!(schema.position(CanonicalField::Impressions), Some(1));
    }

    #[test]
    fn test_missing_user_id_is_fatal() {
        let err = ResolvedSchema::resolve(&headers(&["impressions", "plays"]), "event_count_")
            .unwrap_err();
        assert!(matches!(err, CampaignError::SchemaResolution(_)));
    }

    #[test]
    fn test_discovers_interaction_columns_in_order() {
        let schema = ResolvedSchema::resolve(
            &headers(&[
                "UserID",
                "event_count_cta_click",
                "Country",
                "Event_Count_share",
                "event_count_",
            ]),
            "event_count_",
        )
        .unwrap();
        let cols = schema.interaction_columns();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].header, "event_count_cta_click");
        assert_eq!(cols[0].display_name, "Cta Click");
        assert_eq!(cols[0].position, 1);
        assert_eq!(cols[1].header, "Event_Count_share");
        assert_eq!(cols[1].display_name, "Share");
    }

    #[test]
    fn test_unrecognised_headers_ignored() {
        let schema =
            ResolvedSchema::resolve(&headers(&["Country", "UserID", "Device"]), "event_count_")
                .unwrap();
        assert_eq!(schema.user_id_position(), 1);
        assert!(schema.interaction_columns().is_empty());
    }

    #[test]
    fn test_custom_prefix() {
        let schema = ResolvedSchema::resolve(&headers(&["UserID", "evt:download"]), "evt:")
            .unwrap();
        assert_eq!(schema.interaction_columns()[0].display_name, "Download");
    }

    #[test]
    fn test_value_lookup() {
        let schema =
            ResolvedSchema::resolve(&headers(&["UserID", "plays"]), "event_count_").unwrap();
        let row = vec!["U1".to_string(), "7".to_string()];
        assert_eq!(schema.value(&row, CanonicalField::Plays), Some("7"));
        assert_eq!(schema.value(&row, CanonicalField::Visits), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("summer_sale"), "Summer Sale");
        assert_eq!(title_case("re-engagement  push"), "Re-Engagement Push");
        assert_eq!(title_case("CCI launch"), "CCI Launch");
        assert_eq!(title_case("vIDEO"), "Video");
    }
}
