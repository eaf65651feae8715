use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Fixed row index table for the CPI sheets: 12 calendar months followed by
/// the December restatement sentinel.
pub const MONTH_LABELS: [&str; 13] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
    "lastDecember",
];

/// Row index (zero-based) of the year-label header inside the sheet.
/// The three rows above it are title noise.
const HEADER_ROW: usize = 3;

#[derive(Error, Debug)]
pub enum TableImportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spreadsheet is not a parseable grid: {0}")]
    Format(String),

    #[error("Invalid cell at row {row}, col {col}: {msg}")]
    InvalidCell { row: usize, col: usize, msg: String },

    #[error("Year label is not a 4-digit year: {0}")]
    InvalidYear(String),

    #[error("Unknown month label: {0}")]
    InvalidMonth(String),
}

/// What to do with the December restatement row. The source data carries a
/// 13th row restating the prior December's index; excluding it is the
/// historical behavior, including it emits the figure as Dec 1 of the prior
/// year so each column stays chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestatementPolicy {
    #[default]
    Exclude,
    IncludePriorDecember,
}

/// One point of the output series: month-over-month index ratio dated to the
/// first of the month.
#[derive(Debug, Clone, Serialize)]
pub struct CpiPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Sheet contents after structural trimming (title rows, footer row) but
/// before any cell cleanup. Cells are still raw calamine values.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub year_labels: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone)]
pub struct RawRow {
    pub label: String,
    pub cells: Vec<Data>,
}

/// Fully numeric month-by-year grid, reindexed against [`MONTH_LABELS`] and
/// with the restatement row split off.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub years: Vec<String>,
    /// 12 rows, January through December, one value per year column.
    pub months: Vec<Vec<f64>>,
    /// Restated prior-December figures, one per year column.
    pub restatement: Vec<f64>,
}

pub struct CpiTableImporter {
    client: reqwest::Client,
    policy: RestatementPolicy,
}

impl CpiTableImporter {
    pub fn new(policy: RestatementPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::config::USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self::with_client(client, policy)
    }

    pub fn with_client(client: reqwest::Client, policy: RestatementPolicy) -> Self {
        Self { client, policy }
    }

    /// Download a spreadsheet and fold it into a chronological series.
    pub async fn fetch_series(&self, link: &str) -> Result<Vec<CpiPoint>, TableImportError> {
        let table = self.load_table(link).await?;
        let series = self.clean_and_reshape(table)?;
        info!("Built series of {} points from {}", series.len(), link);
        Ok(series)
    }

    /// Download the spreadsheet at `link` and read its first sheet into a
    /// [`RawTable`].
    #[instrument(skip(self))]
    pub async fn load_table(&self, link: &str) -> Result<RawTable, TableImportError> {
        debug!("Downloading spreadsheet: {}", link);
        let response = self.client.get(link).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());

        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook: Xlsx<_> =
            Xlsx::new(cursor).map_err(|e| TableImportError::Format(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TableImportError::Format("workbook has no sheets".to_string()))?
            .map_err(|e| TableImportError::Format(e.to_string()))?;

        Self::parse_range(&range)
    }

    /// Structural pass over the sheet: row `HEADER_ROW` carries the year
    /// labels (first cell is the index-column header), the last row is a
    /// footer note, everything in between is data with the month label in
    /// column 0. Rows whose data cells are all empty are dropped.
    pub fn parse_range(range: &Range<Data>) -> Result<RawTable, TableImportError> {
        let all_rows: Vec<&[Data]> = range.rows().collect();
        // Title rows, header row, at least one data row, footer row
        if all_rows.len() < HEADER_ROW + 3 {
            return Err(TableImportError::Format(format!(
                "expected at least {} rows, got {}",
                HEADER_ROW + 3,
                all_rows.len()
            )));
        }

        let mut year_labels = Vec::new();
        for cell in all_rows[HEADER_ROW].iter().skip(1) {
            match cell {
                Data::String(s) if !s.trim().is_empty() => year_labels.push(s.trim().to_string()),
                Data::Int(i) => year_labels.push(i.to_string()),
                Data::Float(f) => year_labels.push(format!("{f:.0}")),
                Data::Empty | Data::String(_) => break,
                other => {
                    return Err(TableImportError::Format(format!(
                        "unexpected year header cell: {other:?}"
                    )))
                }
            }
        }
        if year_labels.is_empty() {
            return Err(TableImportError::Format(
                "no year columns in header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for row in &all_rows[HEADER_ROW + 1..all_rows.len() - 1] {
            let cells: Vec<Data> = row
                .iter()
                .skip(1)
                .take(year_labels.len())
                .cloned()
                .collect();
            if cells.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }
            if cells.len() != year_labels.len() {
                return Err(TableImportError::Format(format!(
                    "row has {} data cells, expected {}",
                    cells.len(),
                    year_labels.len()
                )));
            }
            let label = match &row[0] {
                Data::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            rows.push(RawRow { label, cells });
        }

        debug!(
            "Parsed raw table: {} year columns, {} rows",
            year_labels.len(),
            rows.len()
        );
        Ok(RawTable { year_labels, rows })
    }

    /// Coerce every cell to `f64` and reindex the rows against the fixed
    /// 13-label table. A non-numeric cell is a hard failure: the reshape step
    /// needs a fully rectangular numeric grid, so a silent null would only
    /// surface later as a corrupt series.
    #[instrument(skip(self, table), fields(year_columns = table.year_labels.len(), rows = table.rows.len()))]
    pub fn clean(&self, table: RawTable) -> Result<CleanedTable, TableImportError> {
        if table.rows.len() != MONTH_LABELS.len() {
            return Err(TableImportError::Format(format!(
                "expected {} month rows after dropping empty rows, got {}",
                MONTH_LABELS.len(),
                table.rows.len()
            )));
        }

        let mut months = Vec::with_capacity(MONTH_LABELS.len() - 1);
        let mut restatement = Vec::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let mut cleaned = Vec::with_capacity(row.cells.len());
            for (col_idx, cell) in row.cells.iter().enumerate() {
                let value = clean_cell(cell).map_err(|msg| TableImportError::InvalidCell {
                    row: row_idx,
                    col: col_idx,
                    msg,
                })?;
                cleaned.push(value);
            }
            if row_idx == MONTH_LABELS.len() - 1 {
                restatement = cleaned;
            } else {
                months.push(cleaned);
            }
        }

        Ok(CleanedTable {
            years: table.year_labels,
            months,
            restatement,
        })
    }

    /// Unstack the month-by-year grid into a flat series: columns in their
    /// original left-to-right order, months varying fastest within each
    /// column. No explicit sort; the unstack order is already chronological
    /// within each column.
    pub fn reshape(&self, table: CleanedTable) -> Result<Vec<CpiPoint>, TableImportError> {
        let years = table
            .years
            .iter()
            .map(|label| parse_year(label))
            .collect::<Result<Vec<i32>, _>>()?;

        let mut points = Vec::with_capacity(years.len() * MONTH_LABELS.len());
        for (col, &year) in years.iter().enumerate() {
            if self.policy == RestatementPolicy::IncludePriorDecember {
                let value = table.restatement.get(col).copied().ok_or_else(|| {
                    TableImportError::Format(format!(
                        "restatement row has no value for year column {year}"
                    ))
                })?;
                points.push(CpiPoint {
                    date: first_of_month(year - 1, 12)?,
                    value,
                });
            }
            for (row, month_label) in MONTH_LABELS.iter().take(12).enumerate() {
                let month = month_number(month_label)
                    .ok_or_else(|| TableImportError::InvalidMonth(month_label.to_string()))?;
                let value = table
                    .months
                    .get(row)
                    .and_then(|r| r.get(col))
                    .copied()
                    .ok_or_else(|| {
                        TableImportError::Format(format!(
                            "month grid has no value at row {row}, col {col}"
                        ))
                    })?;
                points.push(CpiPoint {
                    date: first_of_month(year, month)?,
                    value,
                });
            }
        }
        Ok(points)
    }

    pub fn clean_and_reshape(&self, table: RawTable) -> Result<Vec<CpiPoint>, TableImportError> {
        let cleaned = self.clean(table)?;
        self.reshape(cleaned)
    }
}

/// Map a calendar month label to its 1-based month number. The restatement
/// sentinel is not a calendar month and maps to nothing.
pub fn month_number(label: &str) -> Option<u32> {
    MONTH_LABELS
        .iter()
        .take(12)
        .position(|m| *m == label)
        .map(|idx| idx as u32 + 1)
}

fn parse_year(label: &str) -> Result<i32, TableImportError> {
    let trimmed = label.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(TableImportError::InvalidYear(label.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| TableImportError::InvalidYear(label.to_string()))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, TableImportError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| TableImportError::InvalidYear(format!("{year}-{month:02}")))
}

fn clean_cell(cell: &Data) -> Result<f64, String> {
    match cell {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => clean_numeric_str(s),
        other => Err(format!("expected a numeric cell, got {other:?}")),
    }
}

/// Normalize the sheet's string cells: parentheses mark estimated figures,
/// and the decimal separator is a comma.
fn clean_numeric_str(raw: &str) -> Result<f64, String> {
    let stripped = raw.trim().trim_matches(|c| c == '(' || c == ')');
    stripped
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("cannot parse {raw:?} as a number"))
}
