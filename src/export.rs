use std::fmt;
use std::path::{Path, PathBuf};

use crate::filter::{FieldValue, Fields};

pub const SUMMARY_FILE: &str = "EducationalValidationSummary.csv";
pub const DETAIL_FILE: &str = "EducationalValidationDetail.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    DateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub label: &'static str,
    pub field: &'static str,
    pub kind: ColumnType,
}

const fn column(label: &'static str, field: &'static str, kind: ColumnType) -> Column {
    Column { label, field, kind }
}

pub const SUMMARY_COLUMNS: &[Column] = &[
    column("IC Code", "code", ColumnType::Text),
    column("IC Name", "text", ColumnType::Text),
    column("In Draft", "draft", ColumnType::Integer),
    column("Pending Approval", "pending_approval", ColumnType::Integer),
    column("Approved", "approved", ColumnType::Integer),
    column("Self Approved", "self_approved", ColumnType::Integer),
    column("Rejected", "rejected", ColumnType::Integer),
    column("Total Submitted", "total", ColumnType::Integer),
    column("No Action Yet", "no_action_yet", ColumnType::Integer),
    column("Total Population", "population", ColumnType::Integer),
];

pub const DETAIL_COLUMNS: &[Column] = &[
    column("PSID", "person_id", ColumnType::Text),
    column("IC", "unit_text", ColumnType::Text),
    column("Status", "status_text", ColumnType::Text),
    column("Last Modified", "last_modified", ColumnType::DateTime),
    column("Submitted By", "submitted_by", ColumnType::Text),
    column("Approver", "approver", ColumnType::Text),
];

#[derive(Debug, Clone, Copy)]
pub enum Table {
    Summary,
    Detail,
}

impl Table {
    pub fn columns(self) -> &'static [Column] {
        match self {
            Table::Summary => SUMMARY_COLUMNS,
            Table::Detail => DETAIL_COLUMNS,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Table::Summary => SUMMARY_FILE,
            Table::Detail => DETAIL_FILE,
        }
    }

    /// Field that must be present for a row to count as bound to data.
    fn key_field(self) -> &'static str {
        match self {
            Table::Summary => "code",
            Table::Detail => "person_id",
        }
    }
}

/// Transient outcome message shown after an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Exported { path: PathBuf, rows: usize },
    Failed { message: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Exported { path, rows } => {
                write!(f, "Exported {rows} rows to {}.", path.display())
            }
            Notification::Failed { message } => write!(f, "Export failed: {message}"),
        }
    }
}

pub fn format_cell(value: Option<FieldValue>, kind: ColumnType) -> String {
    match (value, kind) {
        (None, _) => String::new(),
        (Some(FieldValue::DateTime(at)), ColumnType::DateTime) => {
            at.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        (Some(FieldValue::Integer(n)), ColumnType::Integer | ColumnType::Text) => n.to_string(),
        (Some(FieldValue::Text(text)), ColumnType::Integer) => text
            .trim()
            .parse::<i64>()
            .map(|n| n.to_string())
            .unwrap_or_default(),
        (Some(other), _) => other.as_text(),
    }
}

pub fn write_table<R, W>(table: Table, rows: &[&R], writer: W) -> anyhow::Result<usize>
where
    R: Fields,
    W: std::io::Write,
{
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.columns().iter().map(|column| column.label))?;

    let mut written = 0usize;
    for row in rows.iter().filter(|row| row.field(table.key_field()).is_some()) {
        out.write_record(
            table
                .columns()
                .iter()
                .map(|column| format_cell(row.field(column.field), column.kind)),
        )?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

/// Writes the visible rows to the table's fixed file name under `directory`.
///
/// Errors are logged and turned into a failure notification.
pub fn export_table<R: Fields>(table: Table, rows: &[&R], directory: &Path) -> Notification {
    let path = directory.join(table.file_name());
    let result = std::fs::File::create(&path)
        .map_err(anyhow::Error::from)
        .and_then(|file| write_table(table, rows, file));

    match result {
        Ok(written) => {
            tracing::info!(path = %path.display(), rows = written, "export written");
            Notification::Exported {
                path,
                rows: written,
            }
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "export failed");
            Notification::Failed {
                message: err.to_string(),
            }
        }
    }
}
