//! Line-oriented view over capture output.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::CaptureError;

/// A source of capture text, one line at a time, in arrival order.
#[async_trait]
pub trait LineSource: Send {
    /// Returns the next line without its terminator, or `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>, CaptureError>;
}

/// Splits any buffered reader into lines.
///
/// Bytes that are not valid UTF-8 are replaced rather than treated as a read
/// error; capture payloads routinely contain binary data. A trailing `\r` is
/// stripped along with the `\n`.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(512),
        }
    }
}

impl LineReader<BufReader<File>> {
    /// Opens a saved capture text file for replay.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> Result<Option<String>, CaptureError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(CaptureError::Read)?;
        if read == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}
