//! Append-only JSONL file sink.
//!
//! Every line is flushed as it is written so `tail -f` and log shippers see
//! complete records while a soak run is still in progress.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared, line-flushed file writer.
#[derive(Clone)]
pub struct JsonlFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl JsonlFileWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for JsonlFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for JsonlFileWriter {
    type Writer = JsonlFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    #[test]
    fn test_writer_appends_and_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("test.jsonl");

        let mut writer = JsonlFileWriter::open(&path).unwrap();
        writer.write_all(b"first\n").unwrap();
        drop(writer);

        let mut again = JsonlFileWriter::open(&path).unwrap();
        again.write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
