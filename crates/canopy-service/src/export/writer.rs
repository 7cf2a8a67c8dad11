//! Zip encoding on a blocking thread, fed by chunks and drained through a
//! bounded channel.

use std::io::{self, BufWriter, Seek, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Output buffer size before bytes are handed to the consumer.
const OUTPUT_BUFFER_BYTES: usize = 64 * 1024;

/// Input to the archive thread.
#[derive(Debug)]
pub(crate) enum Chunk {
    /// Begin a new entry.
    Start(String),
    /// Bytes of the current entry.
    Data(Bytes),
    /// Stop without finishing the archive.
    Abort(io::Error),
}

/// `Write` adapter that forwards into a bounded channel.
///
/// Once `closed` is set every write fails, so nothing reaches the
/// consumer after an abort.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    closed: Arc<AtomicBool>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "archive aborted"));
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "export consumer went away"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs on a blocking thread until the input ends, an abort arrives, or
/// the consumer drops the output.
pub(crate) fn write_archive(input: mpsc::Receiver<Chunk>, output: mpsc::Sender<io::Result<Bytes>>) {
    let closed = Arc::new(AtomicBool::new(false));
    let sink = ChannelWriter {
        tx: output.clone(),
        closed: closed.clone(),
    };

    if let Err(e) = encode(input, sink, &closed) {
        // Fails only if the consumer is already gone.
        let _ = output.blocking_send(Err(e));
    }
}

fn encode(input: mpsc::Receiver<Chunk>, sink: ChannelWriter, closed: &AtomicBool) -> io::Result<()> {
    let mut zip = ZipWriter::new_stream(BufWriter::with_capacity(OUTPUT_BUFFER_BYTES, sink));

    // Close the sink before the writer drops, so a half-built archive
    // never gets a central directory.
    if let Err(e) = fill(&mut zip, input) {
        closed.store(true, Ordering::Release);
        return Err(e);
    }

    let mut out = zip.finish().map_err(io::Error::other)?;
    out.flush()
}

fn fill<W: Write + Seek>(zip: &mut ZipWriter<W>, mut input: mpsc::Receiver<Chunk>) -> io::Result<()> {
    let options = SimpleFileOptions::default().large_file(true);

    while let Some(chunk) = input.blocking_recv() {
        match chunk {
            Chunk::Start(name) => zip.start_file(name, options).map_err(io::Error::other)?,
            Chunk::Data(bytes) => zip.write_all(&bytes)?,
            Chunk::Abort(e) => return Err(e),
        }
    }
    Ok(())
}
