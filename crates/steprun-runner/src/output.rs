//! Relaying runner stdout and stderr

use std::sync::{Arc, Mutex};
use steprun_utils::Logger;
use steprun_utils::text::add_prefix_to_each_line;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Which runner stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Destination for runner output lines.
pub trait OutputSink: Send + Sync {
    fn write_line(&self, stream: OutputStream, line: &str);
}

/// Logs runner output as `[<name> Plugin] : <line>`; stderr at error level.
pub struct TracingSink {
    prefix: String,
    logger: Arc<dyn Logger>,
}

impl TracingSink {
    #[must_use]
    pub fn new(runner_name: &str, logger: Arc<dyn Logger>) -> Self {
        Self {
            prefix: format!("[{runner_name} Plugin] : "),
            logger,
        }
    }
}

impl OutputSink for TracingSink {
    fn write_line(&self, stream: OutputStream, line: &str) {
        let line = add_prefix_to_each_line(line, &self.prefix);
        match stream {
            OutputStream::Stdout => self.logger.info(&line),
            OutputStream::Stderr => self.logger.error(&line),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl BufferedSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<(OutputStream, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for BufferedSink {
    fn write_line(&self, stream: OutputStream, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((stream, line.to_string()));
        }
    }
}

/// Forward `reader` to `sink` line by line until EOF.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the relay.
pub(crate) fn forward_lines<R>(
    reader: R,
    stream: OutputStream,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']);
                    sink.write_line(stream, line);
                }
            }
        }
    })
}
