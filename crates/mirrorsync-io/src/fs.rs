//! Local filesystem provider backed by `tokio::fs`

use async_trait::async_trait;
use mirrorsync_types::{
    DirEntry, EntryKind, EntryMetadata, Error, FileReader, FileSystem, Result,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Suffix of the temporary file a replacement is written to before the rename
const TEMP_SUFFIX: &str = ".mirrorsync-tmp";

/// [`FileSystem`] implementation for locally addressable paths
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Create a new local filesystem provider
    pub fn new() -> Self {
        Self
    }

    /// Sibling path used while `target` is being written.
    ///
    /// Every call yields a fresh name, so the temporary file never lands on a
    /// mirrored sibling that happens to share the `.{name}.mirrorsync-tmp` shape.
    fn temp_path_for(target: &Path) -> PathBuf {
        let mut name = OsString::from(".");
        name.push(target.file_name().unwrap_or_default());
        name.push(format!(".{}", Uuid::new_v4().simple()));
        name.push(TEMP_SUFFIX);
        target.with_file_name(name)
    }

    /// Carry modification time and permission bits from `source` over to `destination`
    async fn preserve_file_metadata(source: &Path, destination: &Path) -> Result<()> {
        let source_metadata = fs::metadata(source)
            .await
            .map_err(|e| Error::io(source, &e))?;

        let accessed = source_metadata
            .accessed()
            .unwrap_or_else(|_| std::time::SystemTime::now());
        let modified = source_metadata
            .modified()
            .unwrap_or_else(|_| std::time::SystemTime::now());

        filetime::set_file_times(
            destination,
            filetime::FileTime::from_system_time(accessed),
            filetime::FileTime::from_system_time(modified),
        )
        .map_err(|e| Error::io_message(destination, format!("Failed to set file times: {}", e)))?;

        fs::set_permissions(destination, source_metadata.permissions())
            .await
            .map_err(|e| {
                Error::io_message(destination, format!("Failed to set permissions: {}", e))
            })?;

        Ok(())
    }
}

fn entry_kind(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn metadata(&self, path: &Path) -> Result<Option<EntryMetadata>> {
        match fs::symlink_metadata(path).await {
            Ok(metadata) => Ok(Some(EntryMetadata {
                kind: entry_kind(metadata.file_type()),
                len: metadata.len(),
                modified: metadata.modified().ok(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, &e)),
        }
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = fs::read_dir(path).await.map_err(|e| Error::io(path, &e))?;
        let mut listing = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(path, &e))? {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path(), &e))?;
            listing.push(DirEntry {
                name: entry.file_name(),
                kind: entry_kind(file_type),
            });
        }

        Ok(listing)
    }

    async fn open_read(&self, path: &Path) -> Result<FileReader> {
        let file = fs::File::open(path).await.map_err(|e| Error::io(path, &e))?;
        Ok(Box::new(file))
    }

    async fn write_file_from(&self, source: &Path, target: &Path) -> Result<u64> {
        let temp = Self::temp_path_for(target);

        let result = async {
            let bytes = fs::copy(source, &temp)
                .await
                .map_err(|e| Error::io_message(source, format!("Failed to copy to '{}': {}", temp.display(), e)))?;
            Self::preserve_file_metadata(source, &temp).await?;
            // Renaming over the old replica works even when it is read-only
            fs::rename(&temp, target)
                .await
                .map_err(|e| Error::io(target, &e))?;
            Ok(bytes)
        }
        .await;

        match &result {
            Ok(bytes) => debug!("Wrote {} bytes to {}", bytes, target.display()),
            Err(_) => {
                if let Err(e) = fs::remove_file(&temp).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to clean up '{}': {}", temp.display(), e);
                    }
                }
            }
        }

        result
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(|e| Error::io(path, &e))
    }

    async fn remove_empty_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).await.map_err(|e| Error::io(path, &e))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(|e| Error::io(path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_metadata_of_missing_path_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();

        let missing = fs.metadata(&temp_dir.path().join("nope")).await.unwrap();
        assert!(missing.is_none());

        let root = fs.metadata(temp_dir.path()).await.unwrap().unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_read_dir_reports_kinds() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("file.txt"), b"data").unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let mut listing = LocalFileSystem::new().read_dir(temp_dir.path()).await.unwrap();
        listing.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "file.txt");
        assert_eq!(listing[0].kind, EntryKind::File);
        assert_eq!(listing[1].name, "sub");
        assert_eq!(listing[1].kind, EntryKind::Directory);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("target")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("target"), temp_dir.path().join("link"))
            .unwrap();

        let fs = LocalFileSystem::new();
        let metadata = fs.metadata(&temp_dir.path().join("link")).await.unwrap().unwrap();
        assert_eq!(metadata.kind, EntryKind::Symlink);
    }

    #[tokio::test]
    async fn test_open_read_streams_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut reader = LocalFileSystem::new().open_read(&path).await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_write_file_from_preserves_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let target = temp_dir.path().join("target.txt");
        std::fs::write(&source, b"content").unwrap();

        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        filetime::set_file_mtime(&source, filetime::FileTime::from_system_time(mtime)).unwrap();

        let bytes = LocalFileSystem::new()
            .write_file_from(&source, &target)
            .await
            .unwrap();

        assert_eq!(bytes, 7);
        assert_eq!(std::fs::read(&target).unwrap(), b"content");
        assert_eq!(std::fs::metadata(&target).unwrap().modified().unwrap(), mtime);
        assert_eq!(dir_names(temp_dir.path()), vec!["source.txt", "target.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_file_from_replaces_read_only_target() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let target = temp_dir.path().join("target.txt");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o444)).unwrap();

        LocalFileSystem::new()
            .write_file_from(&source, &target)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        let source_mode = std::fs::metadata(&source).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, source_mode & 0o777);
    }

    #[tokio::test]
    async fn test_write_file_from_missing_source_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.txt");

        let result = LocalFileSystem::new()
            .write_file_from(&temp_dir.path().join("missing"), &target)
            .await;

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(dir_names(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_remove_empty_dir_refuses_non_empty() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("dir");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("keep.txt"), b"x").unwrap();

        let fs = LocalFileSystem::new();
        assert!(fs.remove_empty_dir(&dir).await.is_err());

        fs.remove_file(&dir.join("keep.txt")).await.unwrap();
        fs.remove_empty_dir(&dir).await.unwrap();
        assert!(!dir.exists());
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_temp_path_is_unique_hidden_sibling() {
        let target = Path::new("/replica/dir/file.txt");
        let first = LocalFileSystem::temp_path_for(target);
        let second = LocalFileSystem::temp_path_for(target);

        assert_eq!(first.parent(), Some(Path::new("/replica/dir")));
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".file.txt."));
        assert!(name.ends_with(TEMP_SUFFIX));
        assert_ne!(first, second);
        assert_ne!(first, PathBuf::from("/replica/dir/.file.txt.mirrorsync-tmp"));
    }

    #[tokio::test]
    async fn test_write_keeps_sibling_named_like_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let source_dir = temp_dir.path().join("source");
        let replica_dir = temp_dir.path().join("replica");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::create_dir_all(&replica_dir).unwrap();
        std::fs::write(source_dir.join("a.txt"), b"real").unwrap();
        std::fs::write(source_dir.join(".a.txt.mirrorsync-tmp"), b"lookalike").unwrap();

        let fs = LocalFileSystem::new();
        for name in [".a.txt.mirrorsync-tmp", "a.txt"] {
            fs.write_file_from(&source_dir.join(name), &replica_dir.join(name))
                .await
                .unwrap();
        }

        assert_eq!(
            dir_names(&replica_dir),
            vec![".a.txt.mirrorsync-tmp", "a.txt"]
        );
        assert_eq!(
            std::fs::read(replica_dir.join(".a.txt.mirrorsync-tmp")).unwrap(),
            b"lookalike"
        );
        assert_eq!(std::fs::read(replica_dir.join("a.txt")).unwrap(), b"real");
    }
}
