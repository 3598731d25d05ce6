use crate::model::Student;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Separator {
    DoubleLine,
    SingleLine,
    Semicolon,
    Pipe,
    TripleDash,
}

impl Separator {
    fn delimiter(self) -> &'static str {
        match self {
            Separator::DoubleLine => "\n\n",
            Separator::SingleLine => "\n",
            Separator::Semicolon => ";",
            Separator::Pipe => "|",
            Separator::TripleDash => "---",
        }
    }
}

/// Splits pasted text into comment variants on the chosen literal separator.
/// Pieces are trimmed and empty ones dropped; order and duplicates are kept.
pub fn parse_variants(text: &str, separator: Separator) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    text.split(separator.delimiter())
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// How imported variants combine with a bucket that already has content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergePolicy {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantImport {
    /// Nothing parsable; the bucket stays as it was.
    NoValidData,
    /// The bucket already has variants and no policy was given.
    NeedsDecision { parsed: Vec<String>, existing: usize },
    Ready(Vec<String>),
}

pub fn import_variants(
    existing: &[String],
    text: &str,
    separator: Separator,
    policy: Option<MergePolicy>,
) -> VariantImport {
    let parsed = parse_variants(text, separator);
    if parsed.is_empty() {
        return VariantImport::NoValidData;
    }

    let kept: Vec<&String> = existing.iter().filter(|v| !v.trim().is_empty()).collect();
    if kept.is_empty() {
        return VariantImport::Ready(parsed);
    }

    match policy {
        None => VariantImport::NeedsDecision {
            parsed,
            existing: kept.len(),
        },
        Some(MergePolicy::Replace) => VariantImport::Ready(parsed),
        Some(MergePolicy::Append) => {
            let mut merged: Vec<String> = kept.into_iter().cloned().collect();
            merged.extend(parsed);
            VariantImport::Ready(merged)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RosterEntry {
    #[serde(rename_all = "camelCase")]
    Named {
        first_name: String,
        last_name: String,
    },
    /// One-word line; the caller decides whether it is a first or last name.
    SingleName { line: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterParse {
    pub entries: Vec<RosterEntry>,
    pub from_header: bool,
}

impl RosterParse {
    pub fn pending(&self) -> Vec<PendingName> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                RosterEntry::SingleName { line, name } => Some(PendingName {
                    line: *line,
                    name: name.clone(),
                }),
                RosterEntry::Named { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SingleNameAs {
    FirstName,
    LastName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingName {
    pub line: usize,
    pub name: String,
}

/// Parses a pasted class list.
///
/// A first line mentioning "first" or "last" is tried as a CSV header; when it
/// names both columns, the remaining lines are read as CSV and nothing else
/// runs. Otherwise each line is read as "First [Middle...] Last".
pub fn parse_roster(text: &str) -> RosterParse {
    let lines: Vec<&str> = text.trim().lines().collect();

    if let Some(first) = lines.first() {
        let header = first.trim().to_lowercase();
        if header.contains("first") || header.contains("last") {
            if let Some(entries) = parse_csv_rows(&header, &lines[1..]) {
                return RosterParse {
                    entries,
                    from_header: true,
                };
            }
        }
    }

    let mut entries = Vec::new();
    for (i, raw) in lines.iter().enumerate() {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            [single] => entries.push(RosterEntry::SingleName {
                line: i,
                name: single.to_string(),
            }),
            [first, .., last] => entries.push(RosterEntry::Named {
                first_name: first.to_string(),
                last_name: last.to_string(),
            }),
        }
    }

    RosterParse {
        entries,
        from_header: false,
    }
}

fn parse_csv_rows(header: &str, rows: &[&str]) -> Option<Vec<RosterEntry>> {
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let first_idx = columns
        .iter()
        .position(|h| h.contains("first") || h.contains("given"))?;
    let last_idx = columns
        .iter()
        .position(|h| h.contains("last") || h.contains("sur") || h.contains("family"))?;

    let mut entries = Vec::new();
    for row in rows {
        let values: Vec<&str> = row.split(',').map(str::trim).collect();
        if values.len() < 2 {
            continue;
        }
        let first = values.get(first_idx).copied().unwrap_or("");
        let last = values.get(last_idx).copied().unwrap_or("");
        if first.is_empty() || last.is_empty() {
            continue;
        }
        entries.push(RosterEntry::Named {
            first_name: first.to_string(),
            last_name: last.to_string(),
        });
    }
    Some(entries)
}

/// Turns parsed entries into new students with fresh ids, in input order.
/// Fails with the undecided lines if any single-name line has no decision.
pub fn resolve_roster(
    parse: &RosterParse,
    decisions: &HashMap<usize, SingleNameAs>,
) -> Result<Vec<Student>, Vec<PendingName>> {
    let undecided: Vec<PendingName> = parse
        .pending()
        .into_iter()
        .filter(|p| !decisions.contains_key(&p.line))
        .collect();
    if !undecided.is_empty() {
        return Err(undecided);
    }

    let students = parse
        .entries
        .iter()
        .map(|e| match e {
            RosterEntry::Named {
                first_name,
                last_name,
            } => Student::new(first_name.as_str(), last_name.as_str()),
            RosterEntry::SingleName { line, name } => match decisions.get(line) {
                Some(SingleNameAs::LastName) => Student::new("", name.as_str()),
                _ => Student::new(name.as_str(), ""),
            },
        })
        .collect();
    Ok(students)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterImport {
    NoValidData,
    /// Single-name lines still waiting for a first/last decision.
    NeedsDecision(Vec<PendingName>),
    Ready {
        students: Vec<Student>,
        from_header: bool,
    },
}

/// Parses and resolves a pasted roster in one step.
pub fn import_roster(text: &str, decisions: &HashMap<usize, SingleNameAs>) -> RosterImport {
    let parsed = parse_roster(text);
    if parsed.entries.is_empty() {
        return RosterImport::NoValidData;
    }
    match resolve_roster(&parsed, decisions) {
        Ok(students) => RosterImport::Ready {
            students,
            from_header: parsed.from_header,
        },
        Err(pending) => RosterImport::NeedsDecision(pending),
    }
}
