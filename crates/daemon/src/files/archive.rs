//! Streaming ZIP archives of a folder subtree.
//!
//! The encoder runs in its own task and writes into a bounded in-memory pipe;
//! the HTTP body reads the other end. Backpressure comes from the pipe: the
//! encoder only produces as fast as the client consumes. Dropping the
//! response body cancels the encoder.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, DeflateOption, ZipEntryBuilder};
use bytes::Bytes;
use futures_util::io::AsyncWriteExt as _;
use futures_util::stream::{self, Stream, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::{not_found_or_io, FileError};
use super::metadata::{join_relative, read_entries, EntryMetadata, IgnoreList};
use super::sandbox::{PathRequirement, PathSandbox, ResolvedPath};

/// Capacity of the pipe between encoder and response body.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Read buffer size for file contents.
const CHUNK_SIZE: usize = 64 * 1024;

/// Download name used when the target has no usable last segment.
const FALLBACK_NAME: &str = "folder";

/// Bytes escaped in an RFC 5987 `ext-value`: everything but `attr-char`.
const ATTR_CHAR_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// A folder that has been validated for archiving.
#[derive(Debug, Clone)]
pub struct ArchiveTarget {
    resolved: ResolvedPath,
    file_name: String,
}

impl ArchiveTarget {
    pub fn relative(&self) -> &str {
        self.resolved.relative()
    }

    pub fn absolute(&self) -> &Path {
        self.resolved.absolute()
    }

    /// Suggested download name, `<folder>.zip`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `Content-Disposition` header value with an ASCII fallback name and
    /// the exact UTF-8 name in `filename*`.
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii_fallback(&self.file_name),
            percent_encode(&self.file_name)
        )
    }
}

/// Counters for a completed archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub folders: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Produces ZIP archives of folders inside the sandbox.
#[derive(Debug, Clone)]
pub struct ArchiveStreamer {
    sandbox: Arc<PathSandbox>,
    ignore: Arc<IgnoreList>,
}

impl ArchiveStreamer {
    pub fn new(sandbox: Arc<PathSandbox>, ignore: Arc<IgnoreList>) -> Self {
        Self { sandbox, ignore }
    }

    /// Validate a raw client path as an existing folder.
    ///
    /// Nothing is written until this succeeds, so every error here can still
    /// become a proper HTTP status.
    pub async fn prepare(&self, raw: &str) -> Result<ArchiveTarget, FileError> {
        let resolved = self.sandbox.resolve(raw, PathRequirement::Concrete)?;

        let metadata = tokio::fs::metadata(resolved.absolute())
            .await
            .map_err(not_found_or_io)?;
        if !metadata.is_dir() {
            return Err(FileError::NotFound);
        }

        let folder = resolved
            .last_segment()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());

        Ok(ArchiveTarget {
            file_name: format!("{}.zip", folder),
            resolved,
        })
    }

    /// Start encoding `target` in a background task.
    pub fn stream(&self, target: ArchiveTarget) -> ArchiveStream {
        let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let guard_token = cancel.clone();
        let guard = cancel.clone().drop_guard();

        let streamer = self.clone();
        let span = info_span!("archive", job = %Uuid::new_v4(), path = %target.relative());

        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = streamer.write_archive(&target, writer, &cancel).await;

                match &result {
                    Ok(summary) => info!(
                        files = summary.files,
                        folders = summary.folders,
                        bytes_read = summary.bytes_read,
                        bytes_written = summary.bytes_written,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Archive complete"
                    ),
                    Err(FileError::StreamAborted) => warn!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Archive stream aborted by client"
                    ),
                    Err(e) => error!(error = %e, "Archive failed"),
                }

                // The receiver is gone if the client disconnected.
                let _ = outcome_tx.send(result);
            }
            .instrument(span),
        );

        ArchiveStream {
            reader: ReaderStream::with_capacity(reader, CHUNK_SIZE),
            outcome: Some(outcome_rx),
            cancel: guard_token,
            _guard: guard,
        }
    }

    /// Encode `target` into `sink`.
    ///
    /// Returns [`FileError::StreamAborted`] when `cancel` fires or the sink
    /// reports that its reader went away.
    pub async fn write_archive<W>(
        &self,
        target: &ArchiveTarget,
        sink: W,
        cancel: &CancellationToken,
    ) -> Result<ArchiveSummary, FileError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let stats = Arc::new(SinkStats::default());
        let sink = CountingSink {
            inner: sink,
            stats: Arc::clone(&stats),
        };
        let mut summary = ArchiveSummary::default();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FileError::StreamAborted),
            result = self.encode(target.absolute(), sink, &mut summary) => result,
        };

        match result {
            Ok(()) => {
                summary.bytes_written = stats.written.load(Ordering::Relaxed);
                Ok(summary)
            }
            Err(_) if cancel.is_cancelled() || stats.disconnected.load(Ordering::Relaxed) => {
                Err(FileError::StreamAborted)
            }
            Err(e) => Err(e),
        }
    }

    /// Depth-first walk writing files before subfolders, in sibling order.
    async fn encode<W>(
        &self,
        root: &Path,
        sink: W,
        summary: &mut ArchiveSummary,
    ) -> Result<(), FileError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut writer = ZipFileWriter::with_tokio(sink);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut pending: Vec<(PathBuf, String)> = vec![(root.to_path_buf(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let entries = self.read_dir(&dir).await?;

            if entries.is_empty() && !prefix.is_empty() {
                let builder = ZipEntryBuilder::new(format!("{}/", prefix).into(), Compression::Stored);
                writer.write_entry_whole(builder, &[]).await?;
                continue;
            }

            let mut subdirs = Vec::new();
            for (name, meta) in entries {
                let path = dir.join(&name);
                let entry_name = join_relative(&prefix, &name);

                if meta.kind.is_folder() {
                    if meta.is_walkable_folder() {
                        summary.folders += 1;
                        subdirs.push((path, entry_name));
                    } else {
                        debug!(entry = %entry_name, "Skipping symlinked folder");
                    }
                    continue;
                }

                if meta.is_special_file() {
                    warn!(entry = %entry_name, "Skipping entry that is not a regular file");
                    continue;
                }

                let mut file = match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(entry = %entry_name, "Skipping vanished or dangling entry");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let builder = ZipEntryBuilder::new(entry_name.into(), Compression::Deflate)
                    .deflate_option(DeflateOption::Maximum);
                let mut entry = writer.write_entry_stream(builder).await?;
                summary.bytes_read += copy_into_entry(&mut file, &mut entry, &mut buf).await?;
                entry.close().await?;
                summary.files += 1;
            }

            pending.extend(subdirs.into_iter().rev());
        }

        writer.close().await?;
        Ok(())
    }

    async fn read_dir(&self, dir: &Path) -> Result<Vec<(String, EntryMetadata)>, FileError> {
        let dir = dir.to_path_buf();
        let ignore = Arc::clone(&self.ignore);
        let entries = tokio::task::spawn_blocking(move || read_entries(&dir, &ignore))
            .await
            .map_err(io::Error::other)??;
        Ok(entries)
    }
}

async fn copy_into_entry<R, W>(reader: &mut R, entry: &mut W, buf: &mut [u8]) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: futures_util::io::AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let n = reader.read(buf).await?;
        if n == 0 {
            return Ok(total);
        }
        entry.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

/// Response body for an archive.
///
/// Yields the encoder's bytes, then an error item if the encoder failed.
/// Dropping it cancels the encoder task.
pub struct ArchiveStream {
    reader: ReaderStream<DuplexStream>,
    outcome: Option<oneshot::Receiver<Result<ArchiveSummary, FileError>>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ArchiveStream {
    /// Token that fires when this stream is dropped.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the first chunk.
    ///
    /// A failure before any byte is produced is returned as the encoder's
    /// error so the caller can still answer with an error status.
    pub async fn begin(
        mut self,
    ) -> Result<impl Stream<Item = io::Result<Bytes>> + Send + 'static, FileError> {
        let first = match self.reader.next().await {
            Some(Ok(chunk)) => Some(chunk),
            Some(Err(e)) => return Err(FileError::Io(e)),
            None => match self.outcome.take() {
                Some(outcome) => match outcome.await {
                    Ok(Ok(_)) => None,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(FileError::Archive("encoder task ended".to_string())),
                },
                None => None,
            },
        };

        Ok(stream::iter(first.map(Ok::<Bytes, io::Error>)).chain(self))
    }
}

impl Stream for ArchiveStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(chunk) = ready!(Pin::new(&mut this.reader).poll_next(cx)) {
            return Poll::Ready(Some(chunk));
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };
        let result = ready!(Pin::new(outcome).poll(cx));
        this.outcome = None;

        match result {
            Ok(Ok(_)) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(io::Error::other(e)))),
            Err(_) => Poll::Ready(Some(Err(io::Error::other("encoder task ended")))),
        }
    }
}

#[derive(Debug, Default)]
struct SinkStats {
    written: AtomicU64,
    disconnected: AtomicBool,
}

/// Pass-through writer that counts bytes and notices a vanished reader.
struct CountingSink<W> {
    inner: W,
    stats: Arc<SinkStats>,
}

impl<W> CountingSink<W> {
    fn observe<T>(&self, result: &io::Result<T>) {
        if let Err(e) = result {
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) {
                self.stats.disconnected.store(true, Ordering::Relaxed);
            }
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingSink<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = ready!(Pin::new(&mut this.inner).poll_write(cx, buf));
        match &result {
            Ok(n) => {
                this.stats.written.fetch_add(*n as u64, Ordering::Relaxed);
            }
            Err(_) => this.observe(&result),
        }
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = ready!(Pin::new(&mut this.inner).poll_flush(cx));
        this.observe(&result);
        Poll::Ready(result)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = ready!(Pin::new(&mut this.inner).poll_shutdown(cx));
        this.observe(&result);
        Poll::Ready(result)
    }
}

/// Replace characters that would break a header or a path.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' | '/' | ';' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn ascii_fallback(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect()
}

/// RFC 5987 `value-chars` encoding.
fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, ATTR_CHAR_ESCAPE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn streamer(root: &Path) -> ArchiveStreamer {
        let sandbox = PathSandbox::new(
            root,
            vec![
                "documents".to_string(),
                "music".to_string(),
                "pictures".to_string(),
                "videos".to_string(),
            ],
        );
        ArchiveStreamer::new(
            Arc::new(sandbox),
            Arc::new(IgnoreList::new([".DS_Store", "Thumbs.db", ".gitkeep"])),
        )
    }

    fn entries(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut contents = String::new();
                file.read_to_string(&mut contents).unwrap();
                (file.name().to_string(), contents)
            })
            .collect()
    }

    async fn archive_bytes(streamer: &ArchiveStreamer, raw: &str) -> Vec<u8> {
        let target = streamer.prepare(raw).await.unwrap();
        let body = streamer.stream(target).begin().await.unwrap();
        let chunks: Vec<io::Result<Bytes>> = body.collect().await;
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_archive_contains_relative_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents/x/sub")).unwrap();
        fs::write(root.join("documents/x/a.txt"), "alpha").unwrap();
        fs::write(root.join("documents/x/sub/b.txt"), "beta").unwrap();
        fs::write(root.join("documents/x/.DS_Store"), "junk").unwrap();

        let bytes = archive_bytes(&streamer(root), "documents/x").await;
        assert_eq!(
            entries(&bytes),
            vec![
                ("a.txt".to_string(), "alpha".to_string()),
                ("sub/b.txt".to_string(), "beta".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_archive_keeps_empty_folders() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("music/set/empty")).unwrap();
        fs::create_dir_all(root.join("music/set/junk-only")).unwrap();
        fs::write(root.join("music/set/junk-only/Thumbs.db"), "junk").unwrap();
        fs::write(root.join("music/set/track.mp3"), "la").unwrap();

        let bytes = archive_bytes(&streamer(root), "music/set").await;
        let names: Vec<String> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["track.mp3", "empty/", "junk-only/"]);
    }

    #[tokio::test]
    async fn test_archive_order_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["b", "A", "c"] {
            fs::create_dir_all(root.join("pictures/trip").join(name)).unwrap();
            fs::write(root.join("pictures/trip").join(name).join("p.jpg"), name).unwrap();
        }
        fs::write(root.join("pictures/trip/Z.jpg"), "z").unwrap();
        fs::write(root.join("pictures/trip/a.jpg"), "a").unwrap();

        let streamer = streamer(root);
        let first = archive_bytes(&streamer, "pictures/trip").await;
        let names: Vec<String> = entries(&first).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.jpg", "Z.jpg", "A/p.jpg", "b/p.jpg", "c/p.jpg"]);

        let second = archive_bytes(&streamer, "pictures/trip").await;
        let again: Vec<String> = entries(&second).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, again);
    }

    #[tokio::test]
    async fn test_archive_large_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("videos/raw")).unwrap();
        let data: String = (0..200_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        fs::write(root.join("videos/raw/big.txt"), &data).unwrap();

        let bytes = archive_bytes(&streamer(root), "videos/raw").await;
        let files = entries(&bytes);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, data);
        assert!(bytes.len() < data.len());
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_targets() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents")).unwrap();
        fs::write(root.join("documents/file.txt"), "x").unwrap();
        let streamer = streamer(root);

        assert!(matches!(streamer.prepare("").await, Err(FileError::InvalidPath)));
        assert!(matches!(
            streamer.prepare("../../etc").await,
            Err(FileError::InvalidPath)
        ));
        assert!(matches!(
            streamer.prepare("documents/missing").await,
            Err(FileError::NotFound)
        ));
        assert!(matches!(
            streamer.prepare("documents/file.txt").await,
            Err(FileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_write_archive_summary() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents/r/s")).unwrap();
        fs::write(root.join("documents/r/one.txt"), "12345").unwrap();
        fs::write(root.join("documents/r/s/two.txt"), "678").unwrap();

        let streamer = streamer(root);
        let target = streamer.prepare("documents/r").await.unwrap();
        let (mut rx, tx) = tokio::io::duplex(1024 * 1024);
        let cancel = CancellationToken::new();

        let (summary, bytes) = tokio::join!(
            streamer.write_archive(&target, tx, &cancel),
            async {
                let mut out = Vec::new();
                rx.read_to_end(&mut out).await.unwrap();
                out
            }
        );
        let summary = summary.unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.folders, 1);
        assert_eq!(summary.bytes_read, 8);
        assert_eq!(summary.bytes_written, bytes.len() as u64);
    }

    #[tokio::test]
    async fn test_write_archive_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents/r")).unwrap();
        fs::write(root.join("documents/r/one.txt"), "12345").unwrap();

        let streamer = streamer(root);
        let target = streamer.prepare("documents/r").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = streamer
            .write_archive(&target, tokio::io::sink(), &cancel)
            .await;
        assert!(matches!(result, Err(FileError::StreamAborted)));
    }

    #[tokio::test]
    async fn test_write_archive_reader_gone() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents/r")).unwrap();
        fs::write(root.join("documents/r/one.txt"), "12345").unwrap();

        let streamer = streamer(root);
        let target = streamer.prepare("documents/r").await.unwrap();
        let (rx, tx) = tokio::io::duplex(16);
        drop(rx);

        let result = streamer
            .write_archive(&target, tx, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FileError::StreamAborted)));
    }

    /// Bytes that deflate cannot shrink.
    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[tokio::test]
    async fn test_write_archive_cancelled_mid_stream() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("videos/long")).unwrap();
        for i in 0..4u32 {
            fs::write(root.join(format!("videos/long/{}.bin", i)), noise(512 * 1024, i + 1)).unwrap();
        }

        let streamer = streamer(root);
        let target = streamer.prepare("videos/long").await.unwrap();
        let (mut rx, tx) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();

        let reader = async move {
            let mut head = vec![0u8; 16 * 1024];
            rx.read_exact(&mut head).await.unwrap();
            canceller.cancel();
            (rx, head)
        };

        let (result, (_rx, head)) = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            async { tokio::join!(streamer.write_archive(&target, tx, &cancel), reader) },
        )
        .await
        .expect("encoder did not stop after cancellation");

        assert_eq!(&head[..4], b"PK\x03\x04");
        assert!(matches!(result, Err(FileError::StreamAborted)));
    }

    #[tokio::test]
    async fn test_dropping_stream_ends_encoder() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("videos/long")).unwrap();
        for i in 0..4u32 {
            fs::write(root.join(format!("videos/long/{}.bin", i)), noise(512 * 1024, i + 1)).unwrap();
        }

        let streamer = streamer(root);
        let target = streamer.prepare("videos/long").await.unwrap();
        let stream = streamer.stream(target);
        let cancel = stream.cancellation();

        let mut body = Box::pin(stream.begin().await.unwrap());
        assert!(body.next().await.unwrap().is_ok());
        assert!(!cancel.is_cancelled());

        drop(body);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_archive_skips_fifo() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("documents/mixed")).unwrap();
        fs::write(root.join("documents/mixed/a.txt"), "alpha").unwrap();
        let status = std::process::Command::new("mkfifo")
            .arg(root.join("documents/mixed/pipe"))
            .status()
            .unwrap();
        assert!(status.success());

        let bytes = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            archive_bytes(&streamer(root), "documents/mixed"),
        )
        .await
        .expect("archive of a folder with a FIFO did not finish");

        assert_eq!(entries(&bytes), vec![("a.txt".to_string(), "alpha".to_string())]);
    }

    #[tokio::test]
    async fn test_target_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("music/Été \"live\"")).unwrap();

        let target = streamer(root).prepare("/music/Été \"live\"/").await.unwrap();
        assert_eq!(target.relative(), "music/Été \"live\"");
        assert_eq!(target.file_name(), "Été _live_.zip");
        assert_eq!(
            target.content_disposition(),
            "attachment; filename=\"_t_ _live_.zip\"; filename*=UTF-8''%C3%89t%C3%A9%20_live_.zip"
        );
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("plain-name_1.zip"), "plain-name_1.zip");
        assert_eq!(percent_encode("a b%c"), "a%20b%25c");
        assert_eq!(percent_encode("x!#$&+^`|~"), "x!#$&+^`|~");
        assert_eq!(percent_encode("é(1)*'"), "%C3%A9%281%29%2A%27");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a/b\\c\"d;e\n"), "a_b_c_d_e_");
    }
}
