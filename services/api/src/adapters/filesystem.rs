//! services/api/src/adapters/filesystem.rs
//!
//! Disk-backed attachment and session stores.

use async_trait::async_trait;
use backoffice_core::ports::{AttachmentStore, PortError, PortResult, SessionStore, SESSION_MARKER};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Attachments
//=========================================================================================

/// Stores each blob as a file under `root`, mirroring its slash-separated path.
#[derive(Clone, Debug)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a blob path onto disk, refusing anything that could escape `root`.
    fn resolve(&self, path: &str) -> PortResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PortError::Rejected(format!("invalid attachment path '{path}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn put(&self, path: &str, data: Bytes, _content_type: &str) -> PortResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&target, &data).await.map_err(io_error)?;
        debug!("Stored {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn get(&self, path: &str) -> PortResult<Option<Bytes>> {
        match tokio::fs::read(self.resolve(path)?).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn download_url(&self, path: &str) -> PortResult<Option<String>> {
        let exists = tokio::fs::try_exists(self.resolve(path)?)
            .await
            .map_err(io_error)?;
        Ok(exists.then(|| format!("/files/{path}")))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(e)),
            _ => Ok(()),
        }
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
                let path = entry.path();
                if entry.file_type().await.map_err(io_error)?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    found.push(key);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

//=========================================================================================
// Session
//=========================================================================================

/// Persists the session marker in a single file so a login survives restarts.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn establish(&self) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&self.path, SESSION_MARKER)
            .await
            .map_err(io_error)
    }

    async fn clear(&self) -> PortResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(e)),
            _ => Ok(()),
        }
    }

    async fn is_active(&self) -> PortResult<bool> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.trim() == SESSION_MARKER),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_reads_lists_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAttachmentStore::new(dir.path());
        store
            .put("documenti/BK-1/fattura_ota.pdf", Bytes::from_static(b"%PDF-1"), "application/pdf")
            .await
            .unwrap();
        store
            .put("documenti/BK-1/dettagli_ospiti.pdf", Bytes::from_static(b"%PDF-2"), "application/pdf")
            .await
            .unwrap();
        store
            .put("fatture_passive/INV-1/a.pdf", Bytes::from_static(b"%PDF-3"), "application/pdf")
            .await
            .unwrap();

        assert_eq!(
            store.get("documenti/BK-1/fattura_ota.pdf").await.unwrap(),
            Some(Bytes::from_static(b"%PDF-1"))
        );
        assert_eq!(
            store.list("documenti/BK-1/").await.unwrap(),
            vec!["documenti/BK-1/dettagli_ospiti.pdf", "documenti/BK-1/fattura_ota.pdf"]
        );

        store.delete("documenti/BK-1/fattura_ota.pdf").await.unwrap();
        store.delete("documenti/BK-1/fattura_ota.pdf").await.unwrap();
        assert_eq!(store.get("documenti/BK-1/fattura_ota.pdf").await.unwrap(), None);
        assert_eq!(store.download_url("documenti/BK-1/fattura_ota.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_paths_leaving_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAttachmentStore::new(dir.path());
        for path in ["../secret.pdf", "/etc/passwd", "a/../../b.pdf", ""] {
            assert!(matches!(store.get(path).await, Err(PortError::Rejected(_))), "{path}");
        }
    }

    #[tokio::test]
    async fn session_survives_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/session");
        FileSessionStore::new(&path).establish().await.unwrap();
        let reopened = FileSessionStore::new(&path);
        assert!(reopened.is_active().await.unwrap());
        reopened.clear().await.unwrap();
        assert!(!reopened.is_active().await.unwrap());
        reopened.clear().await.unwrap();
    }
}
