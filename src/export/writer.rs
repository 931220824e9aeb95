//! Output sink helpers.

use std::io::{self, ErrorKind, Write};

/// Writer wrapper that ignores broken pipe errors.
///
/// When output is piped to a command that exits early (e.g. `head`), the
/// remaining lines are dropped instead of failing the run.
pub(crate) struct IgnoreBrokenPipe<W: Write> {
    inner: W,
}

impl<W: Write> IgnoreBrokenPipe<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for IgnoreBrokenPipe<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).or_else(|e| {
            if e.kind() == ErrorKind::BrokenPipe {
                Ok(buf.len())
            } else {
                Err(e)
            }
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().or_else(|e| {
            if e.kind() == ErrorKind::BrokenPipe {
                Ok(())
            } else {
                Err(e)
            }
        })
    }
}

/// Writes `text` to stdout followed by a newline unless it already ends in one.
pub fn emit(text: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = IgnoreBrokenPipe::new(stdout.lock());
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}
