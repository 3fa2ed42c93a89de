//! Delimited-text parser — splits an export file into a header and
//! header-aligned rows, honouring quoted fields.

use campaign_core::{CampaignError, CampaignResult};
use tracing::debug;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// A parsed export: the header row plus data rows, each exactly
/// `headers.len()` fields wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One logical record and the physical line it started on.
struct RawRecord {
    line: usize,
    fields: Vec<String>,
}

impl RawRecord {
    fn is_blank(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].trim().is_empty()
    }
}

/// Parse comma-delimited text with a header row.
///
/// Quoted fields may contain the delimiter, doubled quotes and newlines.
/// Fully blank lines are skipped. Short rows are padded with empty fields;
/// long rows are accepted only when the surplus fields are all empty.
pub fn parse(content: &str) -> CampaignResult<ParsedTable> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut records = split_records(content)?
        .into_iter()
        .filter(|r| !r.is_blank());

    let header = records
        .next()
        .ok_or_else(|| CampaignError::malformed(1, "input has no header row"))?;
    let headers: Vec<String> = header.fields.iter().map(|h| h.trim().to_string()).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for record in records {
        rows.push(reconcile(record, width)?);
    }

    debug!(columns = width, rows = rows.len(), "Parsed delimited input");
    Ok(ParsedTable { headers, rows })
}

fn reconcile(record: RawRecord, width: usize) -> CampaignResult<Vec<String>> {
    let RawRecord { line, mut fields } = record;
    if fields.len() < width {
        fields.resize(width, String::new());
    } else if fields.len() > width {
        if fields[width..].iter().any(|f| !f.trim().is_empty()) {
            return Err(CampaignError::malformed(
                line,
                format!("expected {} fields, found {}", width, fields.len()),
            ));
        }
        fields.truncate(width);
    }
    Ok(fields)
}

fn split_records(content: &str) -> CampaignResult<Vec<RawRecord>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_start = 1;
    let mut quote_opened_at = 0;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    field.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                '\r' if chars.peek() == Some(&'\n') => {}
                _ => field.push(c),
            }
            continue;
        }

        match c {
            QUOTE if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quote_opened_at = line;
            }
            DELIMITER => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                records.push(RawRecord {
                    line: record_start,
                    fields: std::mem::take(&mut fields),
                });
                line += 1;
                record_start = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CampaignError::malformed(
            quote_opened_at,
            "quoted field is never closed",
        ));
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(RawRecord {
            line: record_start,
            fields,
        });
    }
    Ok(records)
}
