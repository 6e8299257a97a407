//! On-disk layout and file helpers
//!
//! ```text
//! <data_dir>/
//!   metadata/<id>           source metadata, as fetched
//!   pepes/<id>.png          images, as fetched
//!   pepes/metadata/<id>     rewritten metadata
//! ```
//!
//! Fetch-stage files are the resume checkpoint: a file that exists under its final name is
//! complete, because every write goes through [`write_atomic`].

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::types::{ResourceId, ResourceKind};
use std::path::{Path, PathBuf};

/// Suffix of in-progress temporary files
pub const PART_SUFFIX: &str = ".part";

/// Paths of the local store
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
    metadata_dir: PathBuf,
    images_dir: PathBuf,
    rewritten_dir: PathBuf,
    rewritten_name: String,
}

impl LocalStore {
    /// Build the layout described by `config`
    pub fn new(config: &StorageConfig) -> Self {
        let root = config.data_dir.clone();
        let images_dir = root.join(&config.images_dir);
        Self {
            metadata_dir: root.join(&config.metadata_dir),
            rewritten_dir: images_dir.join(&config.rewritten_dir),
            images_dir,
            rewritten_name: config.rewritten_dir.clone(),
            root,
        }
    }

    /// Data root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding source metadata records
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Folder holding images
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Folder holding rewritten metadata, nested inside the images folder
    pub fn rewritten_dir(&self) -> &Path {
        &self.rewritten_dir
    }

    /// `ipfs add --ignore` pattern that keeps the rewritten folder out of the images publish
    pub fn rewritten_ignore_pattern(&self) -> String {
        format!("{}/**", self.rewritten_name)
    }

    /// Local destination of one fetched resource
    pub fn resource_path(&self, kind: ResourceKind, id: ResourceId) -> PathBuf {
        match kind {
            ResourceKind::Metadata => self.metadata_dir.join(id.to_string()),
            ResourceKind::Image => self.images_dir.join(format!("{id}.png")),
        }
    }

    /// Local destination of one rewritten record
    pub fn rewritten_path(&self, id: ResourceId) -> PathBuf {
        self.rewritten_dir.join(id.to_string())
    }

    /// Create the fetch-stage folders
    pub async fn ensure_fetch_dirs(&self) -> Result<()> {
        for dir in [&self.metadata_dir, &self.images_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("cannot create {}: {}", dir.display(), e),
                ))
            })?;
        }
        Ok(())
    }

    /// Remove temporaries left behind by an interrupted run
    ///
    /// Returns the number of files removed.
    pub async fn remove_stale_parts(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.metadata_dir, &self.images_dir] {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') && name.ends_with(PART_SUFFIX) {
                    tokio::fs::remove_file(entry.path()).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Removed stale partial files from a previous run");
        }
        Ok(removed)
    }
}

/// Whether `path` already holds a persisted entry
pub async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Hidden sibling used while `path` is being written
///
/// e.g. `pepes/12.png` → `pepes/.12.png.part`
pub fn temporary_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{PART_SUFFIX}"))
}

/// Write `bytes` to `path` so the final name only ever refers to complete content
///
/// The data goes to [`temporary_path`] first and is renamed into place once fully written.
/// On failure the temporary is removed and `path` is left untouched.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = temporary_path(path);
    let result = async {
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    result
}

/// Fail with [`Error::InsufficientSpace`] when less than `required` bytes are free at `path`
///
/// A `required` of 0 disables the check.
pub fn check_free_space(path: &Path, required: u64) -> Result<()> {
    if required == 0 {
        return Ok(());
    }
    let available = get_available_space(path)?;
    if available < required {
        return Err(Error::InsufficientSpace {
            required,
            available,
        });
    }
    tracing::debug!(available, required, path = %path.display(), "Disk space check passed");
    Ok(())
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs to query filesystem statistics:
/// - Unix: statvfs
/// - Windows: GetDiskFreeSpaceExW
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialised and
        // only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            #[allow(clippy::unnecessary_cast)]
            let available = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and all out-pointers reference live u64s that
        // are only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}
