/// Parser for the real-time CSV feed.
///
/// The feed's header row is not stable across responses: it may start with
/// a byte-order mark, carry stray whitespace, and name columns in English,
/// French, or both (`Parameter/Paramètre`, `Value/Valeur`). Only four
/// logical columns matter; column order and any extra columns are ignored.
///
/// Header names are trimmed; data fields are kept exactly as published.
/// A header missing one of the four columns fails the whole batch. A row
/// that cannot be read yields an error item; callers collecting with
/// `collect::<Result<Vec<_>, _>>()` (as `parse_csv` does) therefore reject
/// the entire batch rather than merge part of it.

use crate::model::Observation;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use thiserror::Error;

const BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Parse error: CSV header has no {column} column (headers: {headers:?})")]
    MissingColumn {
        column: &'static str,
        headers: Vec<String>,
    },

    #[error("Parse error: malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Parse error: {0}")]
    Csv(#[from] csv::Error),
}

// ---------------------------------------------------------------------------
// Header normalization
// ---------------------------------------------------------------------------

/// Strips byte-order marks and surrounding whitespace from a field name.
pub fn normalize_field_name(name: &str) -> String {
    name.replace(BOM, "").trim().to_string()
}

/// The four columns an observation is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalColumn {
    StationId,
    Timestamp,
    Parameter,
    Value,
}

impl LogicalColumn {
    pub const ALL: [LogicalColumn; 4] = [
        LogicalColumn::StationId,
        LogicalColumn::Timestamp,
        LogicalColumn::Parameter,
        LogicalColumn::Value,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalColumn::StationId => "station id",
            LogicalColumn::Timestamp => "date",
            LogicalColumn::Parameter => "parameter",
            LogicalColumn::Value => "value",
        }
    }

    /// Lower-case English and French names accepted for this column.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            LogicalColumn::StationId => &["id", "identifier", "identifiant", "station"],
            LogicalColumn::Timestamp => &["date", "datetime", "date/heure"],
            LogicalColumn::Parameter => &["parameter", "paramètre", "parametre"],
            LogicalColumn::Value => &["value", "valeur"],
        }
    }

    /// True if a normalized header names this column.
    ///
    /// Bilingual headers are split on `/` and each half is compared on its
    /// own, so `Parameter/Paramètre` and `Paramètre / Parameter` both match.
    pub fn matches(&self, header: &str) -> bool {
        let lowered = header.to_lowercase();
        let aliases = self.aliases();

        aliases.contains(&lowered.as_str())
            || lowered
                .split('/')
                .map(str::trim)
                .any(|part| aliases.contains(&part))
    }

    /// Logical column named by `header`, if any.
    pub fn classify(header: &str) -> Option<LogicalColumn> {
        let normalized = normalize_field_name(header);
        LogicalColumn::ALL
            .into_iter()
            .find(|column| column.matches(&normalized))
    }
}

/// Positions of the logical columns within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub station_id: usize,
    pub timestamp: usize,
    pub parameter: usize,
    pub value: usize,
}

impl ColumnMap {
    /// Resolves the logical columns against a header row. The first header
    /// naming a column wins.
    pub fn resolve(headers: &StringRecord) -> Result<ColumnMap, ParseError> {
        let normalized: Vec<String> = headers.iter().map(normalize_field_name).collect();

        let position = |column: LogicalColumn| {
            normalized
                .iter()
                .position(|h| column.matches(h))
                .ok_or_else(|| ParseError::MissingColumn {
                    column: column.as_str(),
                    headers: normalized.clone(),
                })
        };

        Ok(ColumnMap {
            station_id: position(LogicalColumn::StationId)?,
            timestamp: position(LogicalColumn::Timestamp)?,
            parameter: position(LogicalColumn::Parameter)?,
            value: position(LogicalColumn::Value)?,
        })
    }

    fn observation(&self, record: &StringRecord) -> Result<Observation, ParseError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let field = |index: usize, column: LogicalColumn| {
            record.get(index).ok_or_else(|| ParseError::MalformedRow {
                line,
                reason: format!(
                    "expected at least {} fields, found {} (no {})",
                    index + 1,
                    record.len(),
                    column.as_str()
                ),
            })
        };

        let station_id = field(self.station_id, LogicalColumn::StationId)?;
        let timestamp = field(self.timestamp, LogicalColumn::Timestamp)?;
        let parameter_code = field(self.parameter, LogicalColumn::Parameter)?;
        let value = field(self.value, LogicalColumn::Value)?;

        for (text, column) in [
            (station_id, LogicalColumn::StationId),
            (timestamp, LogicalColumn::Timestamp),
            (parameter_code, LogicalColumn::Parameter),
        ] {
            if text.trim().is_empty() {
                return Err(ParseError::MalformedRow {
                    line,
                    reason: format!("empty {}", column.as_str()),
                });
            }
        }

        Ok(Observation::new(station_id, timestamp, parameter_code, value))
    }
}

// ---------------------------------------------------------------------------
// Row iteration
// ---------------------------------------------------------------------------

/// Lazy sequence of observations over one CSV body.
pub struct ObservationRows<'a> {
    inner: Option<(StringRecordsIntoIter<&'a [u8]>, ColumnMap)>,
}

impl ObservationRows<'_> {
    /// Column positions, `None` for an empty body.
    pub fn columns(&self) -> Option<ColumnMap> {
        self.inner.as_ref().map(|(_, columns)| *columns)
    }
}

impl Iterator for ObservationRows<'_> {
    type Item = Result<Observation, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (records, columns) = self.inner.as_mut()?;

        loop {
            let record = match records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(ParseError::Csv(e))),
            };

            // Blank trailing lines come through as a single empty field.
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            return Some(columns.observation(&record));
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == BOM || c.is_whitespace())
}

/// Starts a fresh pass over `text`.
///
/// Header problems are reported here; row problems are reported by the
/// returned iterator as it reaches them.
pub fn parse_observations(text: &str) -> Result<ObservationRows<'_>, ParseError> {
    if is_blank(text) {
        return Ok(ObservationRows { inner: None });
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());

    let columns = ColumnMap::resolve(reader.headers()?)?;

    Ok(ObservationRows {
        inner: Some((reader.into_records(), columns)),
    })
}

/// Parses the whole body, failing on the first bad row.
pub fn parse_csv(text: &str) -> Result<Vec<Observation>, ParseError> {
    parse_observations(text)?.collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
