//! Scoped I/O handles.
//!
//! A session wraps the caller's reader or writer for the duration of one
//! operation. The wrapper counts bytes and is dropped, releasing the handle,
//! on every exit path of the operation.

use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::trace;

/// Output handle lent to a session operation.
pub struct OutputPipe<W: Write> {
    inner: W,
    bytes: u64,
    finished: bool,
}

impl<W: Write> OutputPipe<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            bytes: 0,
            finished: false,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }
}

impl<W: Write> Write for OutputPipe<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for OutputPipe<W> {
    fn drop(&mut self) {
        trace!(
            bytes = self.bytes,
            finished = self.finished,
            "Output pipe released"
        );
    }
}

/// Buffered input handle lent to a session operation.
pub struct InputPipe<R: Read> {
    inner: BufReader<R>,
    bytes: u64,
}

impl<R: Read> InputPipe<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            bytes: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Read everything that remains as UTF-8.
    pub fn read_all_string(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl<R: Read> Read for InputPipe<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.bytes += read as u64;
        Ok(read)
    }
}

impl<R: Read> BufRead for InputPipe<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.bytes += amt as u64;
        self.inner.consume(amt);
    }
}

impl<R: Read> Drop for InputPipe<R> {
    fn drop(&mut self) {
        trace!(bytes = self.bytes, "Input pipe released");
    }
}
