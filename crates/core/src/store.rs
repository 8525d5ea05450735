//! Folder store: filesystem operations on the year/country/city tree.
//!
//! Every operation is a direct wrapper over filesystem primitives. Nothing
//! is cached; listing re-reads the directory on every call. Mutating
//! operations (upload writes, moves, sorts) serialise on a per-folder
//! advisory lock so that concurrent requests touching the same folder do
//! not interleave their rename sequences. Exactly one lock is ever held at
//! a time, so the lock map cannot deadlock.

use crate::location::validate_segment;
use crate::{LocationKey, StoreConfig, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use uuid::Uuid;

/// File extensions visible through image listing (case-insensitive).
///
/// Other files in the same directory are ignored by listing but still
/// counted by the pin aggregator and renamed by sorting.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// One image file as seen by the listing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Filename within its location folder; doubles as the external id.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last-modified timestamp from the filesystem.
    pub modified_at: DateTime<Utc>,
}

/// Result of storing one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename as supplied by the client.
    pub original_name: String,
    /// Server-generated filename (random hex plus the original extension).
    pub saved_as: String,
    /// Absolute path of the stored file.
    pub path: String,
}

/// Filesystem-backed store for location folders and the images they hold.
#[derive(Debug)]
pub struct FolderStore {
    cfg: Arc<StoreConfig>,
    folder_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FolderStore {
    pub fn new(cfg: Arc<StoreConfig>) -> Self {
        Self {
            cfg,
            folder_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Directory for a location key under the configured storage root.
    pub fn location_dir(&self, key: &LocationKey) -> PathBuf {
        key.dir(self.cfg.storage_root())
    }

    /// Create the directory chain for a location. Idempotent.
    ///
    /// # Errors
    /// Returns `StoreError::FolderCreation` if the filesystem rejects the
    /// operation (permissions, invalid path, disk full).
    pub fn create_folder(&self, key: &LocationKey) -> StoreResult<PathBuf> {
        let dir = self.location_dir(key);
        fs::create_dir_all(&dir).map_err(StoreError::FolderCreation)?;
        Ok(dir)
    }

    /// List the image files in a location folder.
    ///
    /// Returns an empty vec when the folder does not exist. Entries follow
    /// filesystem iteration order; only regular files with an extension in
    /// [`IMAGE_EXTENSIONS`] are included.
    pub fn list_images(&self, key: &LocationKey) -> StoreResult<Vec<ImageEntry>> {
        let dir = self.location_dir(key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(StoreError::DirRead)? {
            let entry = entry.map_err(StoreError::DirRead)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !has_image_extension(name) {
                continue;
            }
            let metadata = entry.metadata().map_err(StoreError::FileStat)?;
            let modified = metadata.modified().map_err(StoreError::FileStat)?;
            entries.push(ImageEntry {
                name: name.to_string(),
                size_bytes: metadata.len(),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }
        Ok(entries)
    }

    /// Path of a stored image, validated for serving.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` for a path-hostile filename and
    /// `StoreError::NotFound` if the file is absent.
    pub fn image_path(&self, key: &LocationKey, filename: &str) -> StoreResult<PathBuf> {
        validate_segment("filename", filename)?;
        let path = self.location_dir(key).join(filename);
        if !path.is_file() {
            return Err(StoreError::NotFound(format!(
                "image '{filename}' not found in {key}"
            )));
        }
        Ok(path)
    }

    /// Read the raw bytes of a stored image.
    pub fn read_image(&self, key: &LocationKey, filename: &str) -> StoreResult<Vec<u8>> {
        let path = self.image_path(key, filename)?;
        fs::read(&path).map_err(StoreError::FileRead)
    }

    /// Move an image from `source_dir` into the folder for `dest`.
    ///
    /// The destination folder is created if absent. When a file with the
    /// same name already exists there, `_{counter}` is appended before the
    /// extension until a free name is found. Returns the final filename so
    /// callers can learn the new id without re-listing.
    ///
    /// # Errors
    /// - `StoreError::InvalidInput` if `image_id` is not a bare filename or
    ///   `source_dir` resolves outside the storage root
    /// - `StoreError::NotFound` if the source file does not exist
    /// - I/O variants for filesystem failures
    pub fn move_image(
        &self,
        image_id: &str,
        source_dir: &Path,
        dest: &LocationKey,
    ) -> StoreResult<String> {
        validate_segment("imageId", image_id)?;
        let source_dir = self.resolve_inside_root(source_dir)?;
        let source_path = source_dir.join(image_id);
        if !source_path.is_file() {
            return Err(StoreError::NotFound(format!(
                "source file '{}' not found in '{}'",
                image_id,
                source_dir.display()
            )));
        }

        let dest_dir = self.create_folder(dest)?;

        // Hold the destination folder's lock across name selection and the
        // rename, so two concurrent moves cannot pick the same free name.
        let lock = self.folder_lock(&dest_dir);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let final_name = next_free_name(&dest_dir, image_id);
        let dest_path = dest_dir.join(&final_name);
        move_file(&source_path, &dest_path)?;

        tracing::info!(
            "moved {} to {} as {}",
            source_path.display(),
            dest_dir.display(),
            final_name
        );
        Ok(final_name)
    }

    /// Rename the files in `dir` with `001_`, `002_`, … prefixes in order
    /// of ascending modification time. Ties keep filesystem iteration
    /// order, which is unspecified.
    ///
    /// An existing three-digit `NNN_` prefix is stripped before the new
    /// name is computed, so repeated sorts re-number files instead of
    /// stacking prefixes; a file already bearing its target name is left
    /// untouched. Returns the number of files renamed.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if `dir` does not exist.
    pub fn sort_by_date(&self, dir: &Path) -> StoreResult<usize> {
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!(
                "directory '{}' does not exist",
                dir.display()
            )));
        }

        let lock = self.folder_lock(dir);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in fs::read_dir(dir).map_err(StoreError::DirRead)? {
            let entry = entry.map_err(StoreError::DirRead)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let metadata = entry.metadata().map_err(StoreError::FileStat)?;
            let modified = metadata.modified().map_err(StoreError::FileStat)?;
            files.push((path, modified));
        }
        // Stable sort keeps iteration order on equal timestamps.
        files.sort_by_key(|(_, modified)| *modified);

        let mut renamed = 0;
        for (position, (old_path, _)) in files.iter().enumerate() {
            let Some(name) = old_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let base = strip_sequence_prefix(name);
            let target = format!("{:03}_{}", position + 1, base);
            if target == name {
                continue;
            }
            let mut new_path = dir.join(&target);
            let mut counter = 1;
            while new_path.exists() {
                new_path = dir.join(format!("{:03}_{}_{}", position + 1, counter, base));
                counter += 1;
            }
            fs::rename(old_path, &new_path).map_err(StoreError::FileRename)?;
            renamed += 1;
        }

        tracing::debug!("sorted {}: {} files renamed", dir.display(), renamed);
        Ok(renamed)
    }

    /// Store one uploaded file in the (lazily created) folder for `key`.
    ///
    /// The stored filename is a random 32-hex-digit name carrying only the
    /// extension of the client-supplied filename, which avoids collisions
    /// between client names entirely.
    pub fn save_upload(
        &self,
        key: &LocationKey,
        original_name: &str,
        bytes: &[u8],
    ) -> StoreResult<UploadedFile> {
        let dir = self.create_folder(key)?;
        let saved_as = match Path::new(original_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };
        let path = dir.join(&saved_as);

        let lock = self.folder_lock(&dir);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        fs::write(&path, bytes).map_err(StoreError::FileWrite)?;

        Ok(UploadedFile {
            original_name: original_name.to_string(),
            saved_as,
            path: path.display().to_string(),
        })
    }

    /// Advisory lock for one folder. Callers hold at most one at a time.
    fn folder_lock(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.folder_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(dir.to_path_buf()).or_default().clone()
    }

    /// Canonicalise a client-supplied directory and require it to live
    /// inside the storage root.
    fn resolve_inside_root(&self, dir: &Path) -> StoreResult<PathBuf> {
        let root = self
            .cfg
            .storage_root()
            .canonicalize()
            .map_err(StoreError::PathResolve)?;
        let resolved = dir.canonicalize().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("source folder '{}' does not exist", dir.display()))
            } else {
                StoreError::PathResolve(e)
            }
        })?;
        if !resolved.starts_with(&root) {
            return Err(StoreError::InvalidInput(format!(
                "source folder '{}' is outside the storage root",
                dir.display()
            )));
        }
        Ok(resolved)
    }
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// First free variant of `name` in `dir`: the name itself, then
/// `stem_1.ext`, `stem_2.ext`, …
fn next_free_name(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut counter = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{name}_{counter}"),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Drop a leading `NNN_` sequence prefix if present.
fn strip_sequence_prefix(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b'_' {
        &name[4..]
    } else {
        name
    }
}

/// Rename, or copy-and-delete when rename fails (filesystem boundary).
/// Atomic within a single filesystem, best-effort otherwise.
fn move_file(from: &Path, to: &Path) -> StoreResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to).map_err(StoreError::FileMove)?;
            fs::remove_file(from).map_err(StoreError::FileMove)?;
            Ok(())
        }
    }
}
