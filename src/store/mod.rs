//! Append-only image store.
//!
//! The store is one binary file holding raw encoded images back to back. It
//! has no header and no index: the only way to find an image is the
//! [`Locator`] recorded for it in `metadata.json`. The store never looks at
//! the bytes it holds.
//!
//! Writers go through [`ImageStore::append`], which holds an internal lock
//! across the offset lookup and the write. Readers get their own file handle
//! from [`ImageStore::reader`], so browsing and exporting can read at the
//! same time without sharing a cursor.

mod ingest;

pub use ingest::{ingest_directory, IngestReport};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CamtrapError;
use crate::schema::Locator;

/// A single-file image container addressed by byte windows.
#[derive(Debug)]
pub struct ImageStore {
    path: PathBuf,
    writer: Mutex<File>,
}

impl ImageStore {
    /// Opens the store at `path`, creating an empty one if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CamtrapError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the store in bytes.
    pub fn len(&self) -> Result<u64, CamtrapError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CamtrapError> {
        Ok(self.len()? == 0)
    }

    /// Appends `bytes` to the end of the store and returns where they landed.
    pub fn append(&self, bytes: &[u8]) -> Result<Locator, CamtrapError> {
        if bytes.is_empty() {
            return Err(CamtrapError::EmptyImage);
        }

        // The offset is re-read from the file, so a poisoned lock is usable.
        let mut file = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let start = file.seek(SeekFrom::End(0))?;
        file.write_all(bytes)?;
        file.flush()?;

        let locator = Locator::new(start, bytes.len() as u64);
        tracing::debug!(start, size = locator.size, "appended image");
        Ok(locator)
    }

    /// Opens an independent read handle.
    pub fn reader(&self) -> Result<StoreReader, CamtrapError> {
        StoreReader::open(&self.path)
    }

    /// Reads one image. Opens a fresh handle per call; use [`reader`](Self::reader)
    /// for many reads.
    pub fn read(&self, locator: Locator) -> Result<Vec<u8>, CamtrapError> {
        self.reader()?.read(locator)
    }
}

/// A read handle onto an [`ImageStore`] file.
#[derive(Debug)]
pub struct StoreReader {
    file: File,
}

impl StoreReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CamtrapError> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Seeks to `locator.start` and reads exactly `locator.size` bytes.
    ///
    /// Fails with [`CamtrapError::OutOfRange`] when the window is empty or
    /// runs past the current end of the store; never returns short reads.
    pub fn read(&mut self, locator: Locator) -> Result<Vec<u8>, CamtrapError> {
        let len = self.file.metadata()?.len();
        if !locator.fits_within(len) {
            return Err(CamtrapError::OutOfRange {
                start: locator.start,
                size: locator.size,
                len,
            });
        }

        let size = usize::try_from(locator.size).map_err(|_| CamtrapError::OutOfRange {
            start: locator.start,
            size: locator.size,
            len,
        })?;

        self.file.seek(SeekFrom::Start(locator.start))?;
        let mut buf = vec![0u8; size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
