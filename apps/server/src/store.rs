//! Flat CSV tables: load-or-create on startup, whole-file rewrite on change.

use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A row type stored in its own CSV file.
pub trait CsvRecord: Serialize + DeserializeOwned {
    /// Header row, in the same order as the struct's fields.
    const COLUMNS: &'static [&'static str];
    /// Columns a file must have to be readable at all.
    const REQUIRED: &'static [&'static str];
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing columns: {0}")]
    MissingColumns(String),
}

/// Read every row of `path`.
///
/// A missing file is created with just the header row. An unreadable file is
/// moved aside to `<name>.corrupt-<timestamp>` and replaced by an empty one,
/// so the next rewrite cannot destroy what was there.
pub async fn load<T: CsvRecord>(path: &Path) -> Result<Vec<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            persist::<T>(path, &[]).await?;
            tracing::info!("Created empty table {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    match parse::<T>(&bytes) {
        Ok(rows) => {
            tracing::info!("Loaded {} rows from {}", rows.len(), path.display());
            Ok(rows)
        }
        Err(reason) => {
            let backup = sidecar(path, &format!(".corrupt-{}", chrono::Utc::now().format("%Y%m%d%H%M%S")));
            tokio::fs::rename(path, &backup).await?;
            persist::<T>(path, &[]).await?;
            tracing::warn!(
                "{} is unreadable ({}); moved to {} and starting empty",
                path.display(),
                reason,
                backup.display()
            );
            Ok(Vec::new())
        }
    }
}

/// Replace the contents of `path` with the header and `rows`.
///
/// Writes a sibling temp file first and renames it over the target.
pub async fn persist<T: CsvRecord>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let bytes = to_csv_bytes(rows)?;
    let tmp = sidecar(path, ".tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

/// Encode `rows` with a header line. Always emits the header, even for no rows.
pub fn to_csv_bytes<T: CsvRecord>(rows: &[T]) -> Result<Vec<u8>, StoreError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}

fn parse<T: CsvRecord>(bytes: &[u8]) -> Result<Vec<T>, StoreError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = T::REQUIRED
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::MissingColumns(missing.join(", ")));
    }

    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
