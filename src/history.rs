//! # Stage: History Store
//!
//! ## Responsibility
//! Persists each region's final configuration and convergence verdict
//! across runs, as delimited text: one header row naming the columns, one
//! row per region. Loaded records pre-populate the registry with sessions
//! pinned to single-candidate domains, so regions with known-good history
//! skip the search entirely.
//!
//! ## Guarantees
//! - Malformed rows (wrong field count) are skipped with a diagnostic,
//!   never fatal
//! - String fields are quoted; embedded quotes are doubled
//! - The converged column uses the fixed literals `CONVERGED` /
//!   `NOT CONVERGED`
//!
//! ## NOT Responsible For
//! - Building pinned sessions (the controller does, from the records)
//! - Deciding when to save (shutdown is the caller's moment)

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use serde::Serialize;
use tracing::warn;

use crate::{
    error::TuneError,
    space::ParamValue,
};

pub const CONVERGED_LITERAL: &str = "CONVERGED";
pub const NOT_CONVERGED_LITERAL: &str = "NOT CONVERGED";

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// One persisted region: its name, one value per declared parameter (in
/// column order), and whether the session had converged at shutdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub region: String,
    pub values: Vec<(String, ParamValue)>,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Field-level format helpers
// ---------------------------------------------------------------------------

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn render_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Int(n) => n.to_string(),
        ParamValue::Str(s) => quote(s),
    }
}

/// Split one comma-delimited row, honoring quoted fields with doubled
/// quote escapes.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Write the header plus one row per record. Column order comes from the
/// first record; every session created from one controller shares the same
/// parameter template, so the header holds for all rows.
pub fn save<W: Write>(writer: &mut W, records: &[HistoryRecord]) -> io::Result<()> {
    let Some(first) = records.first() else {
        writeln!(writer, "{},{}", quote("name"), quote("converged"))?;
        return Ok(());
    };

    let mut header: Vec<String> = vec![quote("name")];
    header.extend(first.values.iter().map(|(name, _)| quote(name)));
    header.push(quote("converged"));
    writeln!(writer, "{}", header.join(","))?;

    for record in records {
        let mut row: Vec<String> = vec![quote(&record.region)];
        row.extend(record.values.iter().map(|(_, v)| render_value(v)));
        row.push(
            if record.converged {
                CONVERGED_LITERAL
            } else {
                NOT_CONVERGED_LITERAL
            }
            .to_string(),
        );
        writeln!(writer, "{}", row.join(","))?;
    }
    Ok(())
}

/// Save to a filesystem path. IO failures are reported, not fatal to the
/// caller's shutdown path.
pub fn save_file(path: &Path, records: &[HistoryRecord]) -> Result<(), TuneError> {
    let file = File::create(path).map_err(|source| TuneError::HistoryIo {
        path: path.display().to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    save(&mut writer, records)
        .and_then(|()| writer.flush())
        .map_err(|source| TuneError::HistoryIo {
            path: path.display().to_string(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse records from a reader. Rows with the wrong field count are skipped
/// with a warning; an empty or header-only input yields no records.
pub fn load<R: BufRead>(reader: R) -> io::Result<Vec<HistoryRecord>> {
    let mut lines = reader.lines();

    let Some(header_line) = lines.next().transpose()? else {
        return Ok(Vec::new());
    };
    let header = split_row(&header_line);
    if header.len() < 2 {
        warn!(
            target: "region_tuner::history",
            "history header has {} columns; expected at least name and converged",
            header.len()
        );
        return Ok(Vec::new());
    }
    let param_names: Vec<String> = header[1..header.len() - 1].to_vec();
    let expected = header.len();

    let mut records = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(&line);
        if fields.len() != expected {
            let e = TuneError::MalformedHistoryRecord {
                line: lineno + 2,
                detail: format!("{} fields, expected {expected}", fields.len()),
            };
            warn!(target: "region_tuner::history", "{e}");
            continue;
        }

        let converged = match fields[expected - 1].as_str() {
            CONVERGED_LITERAL => true,
            NOT_CONVERGED_LITERAL => false,
            other => {
                let e = TuneError::MalformedHistoryRecord {
                    line: lineno + 2,
                    detail: format!("bad converged literal '{other}'"),
                };
                warn!(target: "region_tuner::history", "{e}");
                continue;
            }
        };

        let values = param_names
            .iter()
            .cloned()
            .zip(fields[1..expected - 1].iter().map(|f| ParamValue::parse(f)))
            .collect();

        records.push(HistoryRecord {
            region: fields[0].clone(),
            values,
            converged,
        });
    }
    Ok(records)
}

/// Load from a filesystem path. An unreadable path means the feature is
/// disabled, reported via the returned error.
pub fn load_file(path: &Path) -> Result<Vec<HistoryRecord>, TuneError> {
    let file = File::open(path).map_err(|source| TuneError::HistoryIo {
        path: path.display().to_string(),
        source,
    })?;
    load(BufReader::new(file)).map_err(|source| TuneError::HistoryIo {
        path: path.display().to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
