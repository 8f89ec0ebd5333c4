//! Append-only CSV store of summary records.
//!
//! The store is a plain file holding one header line and one line per
//! finalized image, in the format of [`cellsnake_export::table`]. Rows
//! are only ever appended; re-finalizing an image adds a second row.
//!
//! Every write is all-or-nothing for the new row. A missing store is
//! built in a temporary file next to its destination and moved into
//! place without clobbering, so a reader never sees a header without its
//! first row. An existing store is extended in append mode and truncated
//! back to its previous length if the write fails.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use cellsnake_export::table;
use cellsnake_pipeline::{SummaryRecord, SummarySink};

/// Default store file name, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "Output_Features.csv";

/// How a successful [`append`] changed the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The store did not exist and was created with a header.
    Created,
    /// The row was added after the existing rows.
    Appended,
}

/// Errors that can occur when writing the store.
///
/// The store's previous content is intact whenever one of these is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is not writable, typically because another program
    /// holds it open.
    #[error("permission denied writing {}; close any program using it and retry", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other filesystem failure.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        if is_permission_denied(&source) {
            Self::PermissionDenied { path, source }
        } else {
            Self::Io { path, source }
        }
    }

    /// The store the failed write was aimed at.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

/// Windows reports a file locked by another process as a sharing (32)
/// or lock (33) violation rather than as access denied.
fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Append `record` to the store at `path`, creating it if needed.
///
/// # Errors
///
/// [`StoreError::PermissionDenied`] when the store or its directory is
/// not writable, [`StoreError::Io`] for any other failure. The store is
/// left as it was in both cases.
pub fn append(record: &SummaryRecord, path: &Path) -> Result<AppendOutcome, StoreError> {
    let row = table::to_row(record);
    let outcome = match append_row(path, &row) {
        Ok(true) => AppendOutcome::Created,
        Ok(false) => AppendOutcome::Appended,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if create_with_row(path, &row).map_err(|e| StoreError::from_io(path, e))? {
                AppendOutcome::Created
            } else {
                // Another writer created the store in between.
                if append_row(path, &row).map_err(|e| StoreError::from_io(path, e))? {
                    AppendOutcome::Created
                } else {
                    AppendOutcome::Appended
                }
            }
        }
        Err(err) => return Err(StoreError::from_io(path, err)),
    };
    log::info!(
        "{} row for {} to {}",
        match outcome {
            AppendOutcome::Created => "wrote first",
            AppendOutcome::Appended => "appended",
        },
        record.image_id,
        path.display()
    );
    Ok(outcome)
}

/// Write header and `row` to a fresh store at `path`.
///
/// Returns `false`, leaving nothing behind, when `path` already exists.
fn create_with_row(path: &Path, row: &str) -> io::Result<bool> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".cellsnake-")
        .suffix(".csv.tmp")
        .tempfile_in(dir)?;
    tmp.write_all(table::header_row().as_bytes())?;
    tmp.write_all(row.as_bytes())?;
    tmp.as_file().sync_all()?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err.error),
    }
}

/// Append `row` to the existing store at `path`.
///
/// An empty file gets the header first, and `true` is returned. A file
/// whose last line lacks its terminator gets one, so the row never
/// merges into the previous line.
fn append_row(path: &Path, row: &str) -> io::Result<bool> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    let original_len = file.metadata()?.len();

    let with_header = original_len == 0;
    let mut buf = Vec::with_capacity(row.len() + 1);
    if with_header {
        buf.extend_from_slice(table::header_row().as_bytes());
    } else if !ends_with_newline(&mut file)? {
        buf.push(b'\n');
    }
    buf.extend_from_slice(row.as_bytes());

    write_or_rollback(&mut file, &buf, original_len, path)?;
    Ok(with_header)
}

/// What an append needs from the open store beyond [`Write`].
trait AppendTarget: Write {
    /// Flush written data to the device.
    fn sync(&mut self) -> io::Result<()>;

    /// Cut the store back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write and sync `buf`, or restore the store to `original_len` bytes.
fn write_or_rollback<T: AppendTarget>(
    target: &mut T,
    buf: &[u8],
    original_len: u64,
    path: &Path,
) -> io::Result<()> {
    let Err(err) = target.write_all(buf).and_then(|()| target.sync()) else {
        return Ok(());
    };
    if let Err(rollback) = target.truncate(original_len) {
        log::error!(
            "failed to restore {} to {original_len} bytes: {rollback}",
            path.display()
        );
    }
    Err(err)
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// A [`SummarySink`] backed by the CSV store at a fixed path.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    last_outcome: Option<AppendOutcome>,
}

impl CsvStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_outcome: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outcome of the most recent successful append.
    #[must_use]
    pub const fn last_outcome(&self) -> Option<AppendOutcome> {
        self.last_outcome
    }
}

impl Default for CsvStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_PATH)
    }
}

impl SummarySink for CsvStore {
    type Error = StoreError;

    fn append(&mut self, record: &SummaryRecord) -> Result<(), StoreError> {
        self.last_outcome = Some(append(record, &self.path)?);
        Ok(())
    }
}
