use super::Storage;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use walkdir::WalkDir;

/// Local disk (PC library and mounted SD card alike)
pub struct LocalStorage {
    name: String,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            name: "local".to_string(),
        }
    }

    async fn list_entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if (want_dirs && file_type.is_dir()) || (!want_dirs && file_type.is_file()) {
                paths.push(entry.path());
            }
        }

        Ok(paths)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Self::list_entries(dir, true).await
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Self::list_entries(dir, false).await
    }

    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;

        // take() stops at EOF, so short files yield a short buffer
        let mut buffer = Vec::with_capacity(length as usize);
        file.take(length).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn dir_size(&self, dir: &Path) -> Result<u64> {
        let base = dir.to_path_buf();

        // walkdir is blocking, keep it off the async workers
        let total = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|entry| entry.metadata().ok())
                .filter(|metadata| metadata.is_file())
                .map(|metadata| metadata.len())
                .sum::<u64>()
        })
        .await?;

        Ok(total)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::copy(from, to).await?)
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn available_space(&self, path: &Path) -> Result<u64> {
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || super::space::available_space(&target)).await?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
