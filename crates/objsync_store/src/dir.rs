//! Directory-backed bucket.
//!
//! Maps object names onto paths below a root directory, with `/` as the
//! separator. Uploads are crash-safe: data is written to a temporary file
//! in the target directory and atomically renamed into place.

use crate::bucket::{DestinationBucket, ObjectEntry, ObjectMetadata, SourceBucket};
use crate::digest::sha256_hex;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A bucket stored as a directory tree on the local filesystem.
///
/// Implements both `SourceBucket` and `DestinationBucket`, so a pair of
/// `DirBucket`s gives a fully functional mirror without any cloud
/// credentials.
#[derive(Debug)]
pub struct DirBucket {
    root: PathBuf,
}

impl DirBucket {
    /// Opens a bucket rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist and
    /// `create_if_missing` is false, or if the path is not a directory.
    pub fn open(root: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !root.exists() {
            if create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(StoreError::backend_fatal(format!(
                    "bucket root does not exist: {}",
                    root.display()
                )));
            }
        }

        if !root.is_dir() {
            return Err(StoreError::backend_fatal(format!(
                "bucket root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the bucket root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty() || name.starts_with('/') || name.split('/').any(|c| c == "..") {
            return Err(StoreError::backend_fatal(format!(
                "invalid object name: {name}"
            )));
        }
        Ok(self.root.join(name))
    }

    fn collect_entries(&self, dir: &Path, out: &mut Vec<ObjectEntry>) -> StoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_entries(&path, out)?;
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            let metadata = entry.metadata()?;
            let name = path
                .strip_prefix(&self.root)
                .map_err(|_| StoreError::backend_fatal("listing escaped bucket root"))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push(ObjectEntry {
                name,
                size: metadata.len(),
                created_at: file_created_at(&metadata),
            });
        }
        Ok(())
    }
}

fn file_created_at(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

impl SourceBucket for DirBucket {
    fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        self.collect_entries(&self.root, &mut entries)?;
        entries.retain(|e| e.name.starts_with(prefix));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(prefix, count = entries.len(), "listed bucket objects");
        Ok(entries)
    }

    fn open_read(&self, name: &str) -> StoreResult<Box<dyn Read + Send>> {
        let path = self.object_path(name)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn check(&self) -> StoreResult<()> {
        if !self.root.is_dir() {
            return Err(StoreError::backend_fatal(format!(
                "bucket root is not a directory: {}",
                self.root.display()
            )));
        }
        fs::read_dir(&self.root)?;
        Ok(())
    }
}

impl DestinationBucket for DirBucket {
    fn put(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so readers never observe a partial object.
        let mut tmp_os = path.clone().into_os_string();
        tmp_os.push(".tmp");
        let tmp_path = PathBuf::from(tmp_os);
        let mut file = File::create(&tmp_path)?;
        let bytes = io::copy(reader, &mut file)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &path)?;

        debug!(key, bytes, "stored object");
        Ok(bytes)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.object_path(key)?.is_file())
    }

    fn head(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        let path = self.object_path(key)?;
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let data = fs::read(&path)?;
        Ok(Some(ObjectMetadata {
            size: metadata.len(),
            checksum: Some(sha256_hex(&data)),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    fn check(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.root)?;
        // Probe write permissions the same way a cloud client would, with a
        // throwaway object that is removed immediately.
        let probe = self.root.join(".objsync_probe.tmp");
        let mut file = File::create(&probe)?;
        file.write_all(b"probe")?;
        drop(file);
        fs::remove_file(&probe)?;
        Ok(())
    }
}
