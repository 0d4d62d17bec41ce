mod fifo;
mod fs_store;

pub use fs_store::FsClipboardStore;

#[cfg(test)]
mod tests {
    use super::*;
    use clipshare_core::model::Mode;
    use clipshare_core::store::ClipboardStore;
    use std::pin::Pin;
    use tokio::io::AsyncReadExt;

    fn reader(bytes: &'static [u8]) -> Pin<Box<dyn tokio::io::AsyncRead + Send>> {
        Box::pin(std::io::Cursor::new(bytes))
    }

    #[tokio::test]
    async fn round_trip_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        let n = store
            .write("hello", reader(b"world"), Mode::Rw, 0, 1024)
            .await
            .unwrap();
        assert_eq!(n, 5);

        let mut out = Vec::new();
        store
            .read("hello")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"world");
    }

    #[tokio::test]
    async fn ro_entry_rejects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store
            .write("k", reader(b"a"), Mode::Ro, 0, 1024)
            .await
            .unwrap();

        let err = store
            .write("k", reader(b"b"), Mode::Ro, 0, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, clipshare_core::error::Error::ForbiddenOverwrite));

        let mut out = Vec::new();
        store
            .read("k")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"a");
    }

    #[tokio::test]
    async fn overwrite_allowed_for_rw() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store
            .write("k", reader(b"a"), Mode::Rw, 0, 1024)
            .await
            .unwrap();
        store
            .write("k", reader(b"bb"), Mode::Rw, 0, 1024)
            .await
            .unwrap();

        let mut out = Vec::new();
        store
            .read("k")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"bb");
    }

    #[tokio::test]
    async fn payload_too_large_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        let err = store
            .write("big", reader(b"0123456789"), Mode::Rw, 0, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            clipshare_core::error::Error::PayloadTooLarge
        ));

        assert!(store.stat("big").await.is_err());
        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn stat_reports_size_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store
            .write("k", reader(b"abcd"), Mode::Rw, 42, 1024)
            .await
            .unwrap();

        let info = store.stat("k").await.unwrap();
        assert_eq!(info.size, 4);
        assert_eq!(info.meta.mode, Mode::Rw);
        assert_eq!(info.meta.expires, 42);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store.delete("missing").await.unwrap();
        store
            .write("k", reader(b"x"), Mode::Rw, 0, 1024)
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.stat("k").await.is_err());
    }

    #[tokio::test]
    async fn list_skips_entries_without_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store
            .write("good", reader(b"x"), Mode::Rw, 0, 1024)
            .await
            .unwrap();
        // An orphan payload with no sidecar meta must be ignored, not error.
        tokio::fs::write(dir.path().join("orphan"), b"y")
            .await
            .unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "good");
    }

    #[tokio::test]
    async fn reject_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        for bad in ["../escape", "a/b", ""] {
            let err = store
                .write(bad, reader(b"x"), Mode::Rw, 0, 1024)
                .await
                .unwrap_err();
            assert!(matches!(err, clipshare_core::error::Error::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn streaming_entry_round_trips_through_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FsClipboardStore::open(dir.path()).await.unwrap());

        store.write_stream("s", Mode::Rw, 0).await.unwrap();
        assert!(store.is_stream("s").await);

        let producer_store = store.clone();
        let producer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut w = producer_store
                .open_producer("s", std::time::Duration::from_secs(5))
                .await
                .unwrap();
            w.write_all(b"streamed").await.unwrap();
        });

        let mut r = store
            .open_consumer("s", std::time::Duration::from_secs(5))
            .await
            .unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).await.unwrap();
        producer.await.unwrap();

        assert_eq!(out, b"streamed");
    }

    #[tokio::test]
    async fn reserve_then_promote_to_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store.reserve("r", Mode::Rw, 0).await.unwrap();
        let info = store.stat("r").await.unwrap();
        assert_eq!(info.size, 0);
        assert!(!store.is_stream("r").await);

        store.write_stream("r", Mode::Rw, 0).await.unwrap();
        assert!(store.is_stream("r").await);
    }

    #[tokio::test]
    async fn write_stream_does_not_bypass_ro_overwrite_guard() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClipboardStore::open(dir.path()).await.unwrap();

        store
            .write("k", reader(b"a"), Mode::Ro, 0, 1024)
            .await
            .unwrap();

        let err = store.write_stream("k", Mode::Rw, 0).await.unwrap_err();
        assert!(matches!(err, clipshare_core::error::Error::ForbiddenOverwrite));

        // The original payload must be untouched, not replaced by a FIFO.
        assert!(!store.is_stream("k").await);
        let mut out = Vec::new();
        store
            .read("k")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"a");
    }
}
