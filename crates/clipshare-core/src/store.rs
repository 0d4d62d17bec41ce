use crate::error::Result;
use crate::model::{EntryInfo, Mode};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// Abstraction over the on-disk clipboard store (C1). There is a single real
/// implementation (`clipshare_store::FsClipboardStore`); the trait exists so
/// the request handler and manager loop in `clipshare-server` don't need to
/// know about filesystem layout, matching the storage-trait-in-core /
/// backend-in-its-own-crate split the teacher uses for `TraceStore`.
#[async_trait::async_trait]
pub trait ClipboardStore: Send + Sync {
    /// Writes `body` to `id`, enforcing `byte_limit`. Fails with
    /// `Error::ForbiddenOverwrite` if an unexpired `ro` entry already exists.
    /// Returns the final byte count on success.
    async fn write(
        &self,
        id: &str,
        body: Pin<Box<dyn AsyncRead + Send>>,
        mode: Mode,
        expires: u64,
        byte_limit: u64,
    ) -> Result<u64>;

    /// Creates a zero-byte placeholder entry (spec §4.1 Reserve).
    async fn reserve(&self, id: &str, mode: Mode, expires: u64) -> Result<()>;

    /// Creates a FIFO at `id` plus its meta record. Promotes a reserved
    /// placeholder if one exists. Returns once the pipe and meta exist; the
    /// producer/consumer rendezvous happens via `open_producer`/`open_consumer`.
    async fn write_stream(&self, id: &str, mode: Mode, expires: u64) -> Result<()>;

    /// Opens the producer (write) side of a streaming entry's FIFO, blocking
    /// (up to `timeout`) until a consumer opens the read side.
    async fn open_producer(
        &self,
        id: &str,
        timeout: std::time::Duration,
    ) -> Result<Pin<Box<dyn AsyncWrite + Send>>>;

    /// Opens the consumer (read) side of a streaming entry's FIFO, blocking
    /// (up to `timeout`) until the producer has begun writing.
    async fn open_consumer(
        &self,
        id: &str,
        timeout: std::time::Duration,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>>;

    /// Opens a regular (non-streaming) payload for reading.
    async fn read(&self, id: &str) -> Result<Pin<Box<dyn AsyncRead + Send>>>;

    /// Returns the entry's meta and size, or `Error::NotFound`.
    async fn stat(&self, id: &str) -> Result<EntryInfo>;

    /// Enumerates all entries with valid meta; malformed/missing meta is
    /// skipped rather than surfaced as an error (self-healing listing).
    async fn list(&self) -> Result<Vec<EntryInfo>>;

    /// Removes payload and meta. Missing files are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// True if `id`'s payload is a FIFO (a promoted streaming entry) rather
    /// than a regular file. False (including on "not found") otherwise.
    async fn is_stream(&self, id: &str) -> bool;
}
