use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clipshare_core::error::{Error, Result};
use clipshare_core::ids::is_safe_basename;
use clipshare_core::model::{EntryInfo, Meta, Mode};
use clipshare_core::store::ClipboardStore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::fifo;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn unique_suffix() -> String {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("{}.{}.{}", std::process::id(), nanos, n)
}

/// Filesystem-backed implementation of `ClipboardStore` (C1). One directory
/// holds a payload file (or FIFO) per entry plus a `<id>:meta` sidecar.
pub struct FsClipboardStore {
    dir: PathBuf,
}

impl FsClipboardStore {
    /// Opens (creating if needed) the clipboard directory at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn payload_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}:meta"))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!(".{id}.tmp.{}", unique_suffix()))
    }

    fn check_id(id: &str) -> Result<()> {
        if is_safe_basename(id) {
            Ok(())
        } else {
            Err(Error::BadRequest(format!("unsafe id: {id}")))
        }
    }

    async fn read_meta(&self, id: &str) -> Option<Meta> {
        let bytes = tokio::fs::read(self.meta_path(id)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn write_meta_atomic(&self, id: &str, meta: &Meta) -> Result<()> {
        let tmp = self.dir.join(format!(".{id}:meta.tmp.{}", unique_suffix()));
        let bytes = serde_json::to_vec(meta)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.meta_path(id)).await?;
        Ok(())
    }

    async fn check_overwrite_allowed(&self, id: &str) -> Result<()> {
        if let Some(meta) = self.read_meta(id).await {
            if meta.mode == Mode::Ro && !meta.is_expired(now_secs()) {
                return Err(Error::ForbiddenOverwrite);
            }
        }
        Ok(())
    }
}

/// Removes whatever this write attempt created unless `finish()` is called.
/// Guards against leaving partial state behind when a PUT is cancelled
/// mid-stream (spec §5 "Cancellation").
struct WriteGuard<'a> {
    store: &'a FsClipboardStore,
    id: String,
    tmp: PathBuf,
    renamed: bool,
    done: bool,
}

impl<'a> WriteGuard<'a> {
    fn new(store: &'a FsClipboardStore, id: &str, tmp: PathBuf) -> Self {
        Self {
            store,
            id: id.to_string(),
            tmp,
            renamed: false,
            done: false,
        }
    }

    fn mark_renamed(&mut self) {
        self.renamed = true;
    }

    fn finish(mut self) {
        self.done = true;
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let _ = std::fs::remove_file(&self.tmp);
        if self.renamed {
            let _ = std::fs::remove_file(self.store.payload_path(&self.id));
            let _ = std::fs::remove_file(self.store.meta_path(&self.id));
        }
    }
}

const COPY_CHUNK: usize = 64 * 1024;

#[async_trait::async_trait]
impl ClipboardStore for FsClipboardStore {
    async fn write(
        &self,
        id: &str,
        mut body: Pin<Box<dyn AsyncRead + Send>>,
        mode: Mode,
        expires: u64,
        byte_limit: u64,
    ) -> Result<u64> {
        Self::check_id(id)?;
        self.check_overwrite_allowed(id).await?;

        let tmp = self.temp_path(id);
        let mut guard = WriteGuard::new(self, id, tmp.clone());

        let mut file = tokio::fs::File::create(&tmp).await?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total: u64 = 0;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > byte_limit {
                return Err(Error::PayloadTooLarge);
            }
            file.write_all(&buf[..n]).await?;
        }
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, self.payload_path(id)).await?;
        guard.mark_renamed();

        self.write_meta_atomic(id, &Meta { mode, expires }).await?;
        guard.finish();

        Ok(total)
    }

    async fn reserve(&self, id: &str, mode: Mode, expires: u64) -> Result<()> {
        Self::check_id(id)?;
        self.check_overwrite_allowed(id).await?;

        let tmp = self.temp_path(id);
        let mut guard = WriteGuard::new(self, id, tmp.clone());

        tokio::fs::File::create(&tmp).await?;
        tokio::fs::rename(&tmp, self.payload_path(id)).await?;
        guard.mark_renamed();

        self.write_meta_atomic(id, &Meta { mode, expires }).await?;
        guard.finish();
        Ok(())
    }

    async fn write_stream(&self, id: &str, mode: Mode, expires: u64) -> Result<()> {
        Self::check_id(id)?;

        // A reserved placeholder (a zero-byte regular file) may be promoted
        // without the ro-overwrite check. A real entry that merely happens
        // to exist, including an unexpired ro one, still goes through
        // check_overwrite_allowed.
        let payload = self.payload_path(id);
        let is_reserved_placeholder = self.read_meta(id).await.is_some()
            && !fifo::is_fifo(&payload)
            && tokio::fs::metadata(&payload)
                .await
                .map(|m| m.len() == 0)
                .unwrap_or(false);
        if !is_reserved_placeholder {
            self.check_overwrite_allowed(id).await?;
        }
        if payload.exists() {
            tokio::fs::remove_file(&payload).await?;
        }

        fifo::mkfifo(&payload)?;
        if let Err(e) = self.write_meta_atomic(id, &Meta { mode, expires }).await {
            let _ = tokio::fs::remove_file(&payload).await;
            return Err(e);
        }
        Ok(())
    }

    async fn open_producer(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Pin<Box<dyn AsyncWrite + Send>>> {
        Self::check_id(id)?;
        let path = self.payload_path(id);
        let opened = tokio::time::timeout(
            timeout,
            tokio::fs::OpenOptions::new().write(true).open(&path),
        )
        .await;
        match opened {
            Ok(Ok(file)) => Ok(Box::pin(file)),
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => {
                self.delete(id).await?;
                Err(Error::GatewayTimeout)
            }
        }
    }

    async fn open_consumer(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        Self::check_id(id)?;
        let path = self.payload_path(id);
        let opened = tokio::time::timeout(
            timeout,
            tokio::fs::OpenOptions::new().read(true).open(&path),
        )
        .await;
        match opened {
            Ok(Ok(file)) => Ok(Box::pin(file)),
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => {
                self.delete(id).await?;
                Err(Error::GatewayTimeout)
            }
        }
    }

    async fn read(&self, id: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        Self::check_id(id)?;
        let file = tokio::fs::File::open(self.payload_path(id)).await?;
        Ok(Box::pin(file))
    }

    async fn stat(&self, id: &str) -> Result<EntryInfo> {
        Self::check_id(id)?;
        let meta = self.read_meta(id).await.ok_or(Error::NotFound)?;
        let size = tokio::fs::metadata(self.payload_path(id))
            .await
            .map(|m| m.len())
            .map_err(|_| Error::NotFound)?;
        Ok(EntryInfo {
            id: id.to_string(),
            meta,
            size,
        })
    }

    async fn list(&self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(":meta") || name.starts_with('.') {
                continue;
            }
            if let Some(meta) = self.read_meta(name).await {
                let size = tokio::fs::metadata(entry.path())
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                entries.push(EntryInfo {
                    id: name.to_string(),
                    meta,
                    size,
                });
            }
        }
        Ok(entries)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Self::check_id(id)?;
        let _ = tokio::fs::remove_file(self.payload_path(id)).await;
        let _ = tokio::fs::remove_file(self.meta_path(id)).await;
        Ok(())
    }

    async fn is_stream(&self, id: &str) -> bool {
        if Self::check_id(id).is_err() {
            return false;
        }
        fifo::is_fifo(&self.payload_path(id))
    }
}
