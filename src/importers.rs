//! Spreadsheet import for the published CPI month-by-year tables

pub mod table_importer;

// Re-export commonly used items
pub use table_importer::{
    CpiPoint, CpiTableImporter, RawTable, RestatementPolicy, TableImportError, MONTH_LABELS,
};
