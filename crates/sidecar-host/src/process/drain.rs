//! Background readers that forward child output to the log.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{OUTPUT_TARGET, PROCESS_TARGET};

/// Which pipe a drain reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

type Tail = Arc<Mutex<VecDeque<String>>>;

/// Reader thread draining one pipe until it closes.
///
/// The most recent `tail_capacity` lines are kept for diagnostics; everything
/// else is only logged.
#[derive(Debug)]
pub(crate) struct OutputDrain {
    origin: String,
    stream: StreamKind,
    handle: Option<JoinHandle<()>>,
    done: Receiver<()>,
    tail: Tail,
}

impl OutputDrain {
    pub(crate) fn spawn<R>(
        origin: &str,
        stream: StreamKind,
        reader: R,
        tail_capacity: usize,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let tail: Tail = Arc::new(Mutex::new(VecDeque::with_capacity(tail_capacity)));
        let (done_tx, done) = mpsc::channel();
        let thread_tail = Arc::clone(&tail);
        let thread_origin = origin.to_owned();
        let handle = thread::Builder::new()
            .name(format!("{origin}-{stream}"))
            .spawn(move || {
                forward_lines(&thread_origin, stream, reader, &thread_tail, tail_capacity);
                if done_tx.send(()).is_err() {
                    debug!(
                        target: PROCESS_TARGET,
                        origin = %thread_origin,
                        stream = %stream,
                        "output reader outlived its owner"
                    );
                }
            })?;
        Ok(Self {
            origin: origin.to_owned(),
            stream,
            handle: Some(handle),
            done,
            tail,
        })
    }

    /// Waits up to `timeout` for the stream to close, then returns the tail.
    ///
    /// A reader still blocked after the timeout is detached; a grandchild
    /// holding the pipe open must not wedge teardown.
    pub(crate) fn join_timeout(mut self, timeout: Duration) -> Vec<String> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take()
                    && handle.join().is_err()
                {
                    warn!(
                        target: PROCESS_TARGET,
                        origin = %self.origin,
                        stream = %self.stream,
                        "output reader panicked"
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: PROCESS_TARGET,
                    origin = %self.origin,
                    stream = %self.stream,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "output stream still open; detaching reader"
                );
            }
        }
        let tail = self.tail.lock().unwrap_or_else(|poison| poison.into_inner());
        tail.iter().cloned().collect()
    }
}

fn forward_lines<R: Read>(
    origin: &str,
    stream: StreamKind,
    reader: R,
    tail: &Tail,
    tail_capacity: usize,
) {
    let mut buffered = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match buffered.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buffer);
                let line = text.trim_end_matches(['\r', '\n']);
                emit(origin, stream, line);
                if tail_capacity > 0 {
                    let mut lines = tail.lock().unwrap_or_else(|poison| poison.into_inner());
                    if lines.len() == tail_capacity {
                        lines.pop_front();
                    }
                    lines.push_back(line.to_owned());
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                debug!(
                    target: PROCESS_TARGET,
                    origin,
                    stream = %stream,
                    %error,
                    "output stream read failed"
                );
                break;
            }
        }
    }
    debug!(target: PROCESS_TARGET, origin, stream = %stream, "output stream closed");
}

fn emit(origin: &str, stream: StreamKind, line: &str) {
    match stream {
        StreamKind::Stdout => info!(target: OUTPUT_TARGET, origin, stream = "stdout", "{line}"),
        StreamKind::Stderr => warn!(target: OUTPUT_TARGET, origin, stream = "stderr", "{line}"),
    }
}
