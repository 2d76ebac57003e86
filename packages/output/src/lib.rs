#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Renders a run's groups using its [`ColumnManifest`].
//!
//! Both renderers show one row per group and one cell per column, in
//! manifest order. Derived values a group never had render as [`ABSENT`].

use std::path::{Path, PathBuf};

use group_scout_group_models::{ColumnManifest, Group};
use tabled::builder::Builder;
use tabled::settings::Style;

/// Placeholder for a value the group does not have.
pub const ABSENT: &str = "-";

/// Errors that can occur while writing output files.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The CSV file could not be created or written.
    #[error("Failed to write CSV {}: {source}", .path.display())]
    Csv {
        /// Destination file.
        path: PathBuf,
        /// Writer diagnostic.
        source: csv::Error,
    },

    /// Flushing the CSV file failed.
    #[error("Failed to write CSV {}: {source}", .path.display())]
    Io {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

fn cells(columns: &ColumnManifest, group: &Group) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            group
                .field_value(column.field)
                .unwrap_or_else(|| ABSENT.to_string())
        })
        .collect()
}

/// Formats the groups as a left-aligned text table with a header row and a
/// separator line.
#[must_use]
pub fn render_table(columns: &ColumnManifest, groups: &[Group]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns.labels());
    for group in groups {
        builder.push_record(cells(columns, group));
    }

    let mut table = builder.build();
    table.with(Style::psql());
    table.to_string()
}

/// Writes the groups to `path` as CSV, with the column labels as header.
///
/// # Errors
///
/// Returns [`OutputError`] if the file cannot be created or written.
pub fn write_csv(path: &Path, columns: &ColumnManifest, groups: &[Group]) -> Result<(), OutputError> {
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(columns.labels()).map_err(csv_err)?;
    for group in groups {
        writer.write_record(cells(columns, group)).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {} group(s) to {}", groups.len(), path.display());
    Ok(())
}
