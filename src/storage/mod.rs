pub mod local;
pub mod space;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use local::LocalStorage;
pub use space::{format_size, FreeSpace};

/// Filesystem access used by the scanners and the sync engine
#[async_trait]
pub trait Storage: Send + Sync {
    /// Immediate subdirectories, in enumeration order
    async fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Immediate regular files, in enumeration order
    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Read up to `length` bytes at `offset`; shorter when the file ends first
    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Total size of all files below `dir`
    async fn dir_size(&self, dir: &Path) -> Result<u64>;

    async fn is_dir(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path) -> Result<()>;

    /// Copy one file, overwriting the destination. Returns bytes copied.
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Free bytes on the volume holding `path`
    async fn available_space(&self, path: &Path) -> Result<u64>;

    /// Copy everything below `from` into `to`, creating folders as needed.
    /// Not atomic: a failure leaves what was already written in place.
    async fn copy_dir_contents(&self, from: &Path, to: &Path) -> Result<u64> {
        let mut copied = 0u64;
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src_dir, dst_dir)) = pending.pop() {
            self.create_dir(&dst_dir).await?;

            for file in self.list_files(&src_dir).await? {
                let Some(file_name) = file.file_name() else {
                    continue;
                };
                copied += self.copy_file(&file, &dst_dir.join(file_name)).await?;
            }

            for sub in self.list_dirs(&src_dir).await? {
                if let Some(dir_name) = sub.file_name() {
                    let target = dst_dir.join(dir_name);
                    pending.push((sub, target));
                }
            }
        }

        Ok(copied)
    }

    /// Delete the files directly inside `dir`; the folder itself stays
    async fn remove_files_in(&self, dir: &Path) -> Result<usize> {
        let files = self.list_files(dir).await?;
        let count = files.len();
        for file in files {
            self.remove_file(&file).await?;
        }
        Ok(count)
    }

    /// Name used in logs
    fn name(&self) -> &str;
}
