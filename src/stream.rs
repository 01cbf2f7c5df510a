//! File-like handles onto Data Mart objects.
//!
//! [`DataMartReader`] streams an object's body straight from the HTTP
//! response. [`DataMartWriter`] buffers writes into a local temporary file
//! and only contacts the server when [`DataMartWriter::commit`] is called, so
//! the store never sees a partial upload.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::client::{content_type_for, remove_temp, Client};
use crate::codec;
use crate::error::DataMartError;

/// The modes accepted by [`Client::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadBinary,
    Write,
    WriteBinary,
}

impl OpenMode {
    pub fn is_write(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::WriteBinary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadBinary => "rb",
            OpenMode::Write => "w",
            OpenMode::WriteBinary => "wb",
        }
    }
}

impl FromStr for OpenMode {
    type Err = DataMartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(OpenMode::Read),
            "rb" => Ok(OpenMode::ReadBinary),
            "w" => Ok(OpenMode::Write),
            "wb" => Ok(OpenMode::WriteBinary),
            other => Err(DataMartError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A readable byte stream bound to a remote Data Mart object.
pub trait ReadableStream: AsyncRead + Unpin + Send {
    /// The remote filename being read.
    fn filename(&self) -> &str;

    /// The `Content-Type` the server reported, if any.
    fn content_type(&self) -> Option<&str>;
}

type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Streaming reader over a Data Mart GET response.
///
/// Dropping the reader (or calling [`close`](Self::close)) releases the
/// connection.
pub struct DataMartReader {
    filename: String,
    content_type: Option<String>,
    content_length: Option<u64>,
    inner: StreamReader<BodyStream, Bytes>,
}

impl DataMartReader {
    pub(crate) fn new(filename: &str, resp: reqwest::Response) -> Self {
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = resp.content_length();
        let body: BodyStream = Box::pin(resp.bytes_stream().map_err(io::Error::other));

        Self {
            filename: filename.to_string(),
            content_type,
            content_length,
            inner: StreamReader::new(body),
        }
    }

    /// Body size announced by the server, when known.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the remaining body into memory.
    pub async fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Read the remaining body, gunzipping it if it is gzip-compressed.
    pub async fn read_decoded(&mut self) -> io::Result<Vec<u8>> {
        codec::maybe_decompress(self.read_to_vec().await?)
    }

    pub fn close(self) {}
}

impl ReadableStream for DataMartReader {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

impl AsyncRead for DataMartReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl fmt::Debug for DataMartReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMartReader")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Local file plus the guard that deletes it.
struct Staged {
    file: File,
    temp_path: TempPath,
}

impl Staged {
    /// Close the handle before deleting; an open file cannot be removed on
    /// every platform.
    fn close_and_remove(self) {
        let Staged { file, temp_path } = self;
        drop(file);
        remove_temp(temp_path);
    }
}

/// Write handle for a Data Mart object.
///
/// Bytes go to a local temporary file. [`commit`](Self::commit) uploads the
/// whole file; [`discard`](Self::discard) or dropping the writer throws it
/// away. The temporary file never outlives the writer.
pub struct DataMartWriter {
    client: Client,
    filename: String,
    staged: Option<Staged>,
}

impl DataMartWriter {
    pub(crate) fn new(client: Client, filename: &str, file: File, temp_path: TempPath) -> Self {
        Self {
            client,
            filename: filename.to_string(),
            staged: Some(Staged { file, temp_path }),
        }
    }

    /// The remote filename the writer will upload to.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Location of the local temporary file.
    pub fn temp_path(&self) -> Option<&Path> {
        self.staged.as_ref().map(|s| &*s.temp_path)
    }

    /// Close the local file and upload its contents.
    ///
    /// The temporary file is removed whether or not the upload succeeds.
    pub async fn commit(mut self) -> Result<(), DataMartError> {
        let Some(Staged {
            mut file,
            temp_path,
        }) = self.staged.take()
        else {
            return Ok(());
        };

        let result: Result<(), DataMartError> = async {
            file.flush().await?;
            file.shutdown().await?;
            drop(file);
            self.client
                .upload_path(&temp_path, &self.filename, &content_type_for(&self.filename))
                .await
        }
        .await;

        remove_temp(temp_path);
        result
    }

    /// Drop the buffered bytes without uploading.
    pub fn discard(mut self) {
        if let Some(staged) = self.staged.take() {
            staged.close_and_remove();
        }
    }

    fn file(&mut self) -> io::Result<Pin<&mut File>> {
        match self.staged.as_mut() {
            Some(staged) => Ok(Pin::new(&mut staged.file)),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Data Mart writer is already closed",
            )),
        }
    }
}

impl AsyncWrite for DataMartWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.file() {
            Ok(file) => file.poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file() {
            Ok(file) => file.poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    // Only the local file is shut down; uploading needs an explicit commit.
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file() {
            Ok(file) => file.poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Drop for DataMartWriter {
    fn drop(&mut self) {
        if let Some(staged) = self.staged.take() {
            warn!(
                filename = %self.filename,
                "Data Mart writer dropped without commit; discarding buffered data"
            );
            staged.close_and_remove();
        }
    }
}

impl fmt::Debug for DataMartWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMartWriter")
            .field("filename", &self.filename)
            .field("temp_path", &self.temp_path())
            .finish_non_exhaustive()
    }
}

/// A handle returned by [`Client::open`].
#[derive(Debug)]
pub enum DataMartHandle {
    Read(DataMartReader),
    Write(DataMartWriter),
}

impl DataMartHandle {
    pub fn into_reader(self) -> Option<DataMartReader> {
        match self {
            DataMartHandle::Read(reader) => Some(reader),
            DataMartHandle::Write(_) => None,
        }
    }

    pub fn into_writer(self) -> Option<DataMartWriter> {
        match self {
            DataMartHandle::Write(writer) => Some(writer),
            DataMartHandle::Read(_) => None,
        }
    }
}
