//! Log streams
//!
//! `get_logs` hands back a lazily polled stream. Whatever the stream reads
//! from (a file handle, a child process) is owned by the stream itself, so a
//! consumer that stops pulling and drops it releases those resources right
//! away.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, warn};

use crate::errors::HaymakerError;

/// Log lines of a deployment
pub type LogStream = BoxStream<'static, String>;

/// Finite stream over already collected lines
pub fn from_lines<I>(lines: I) -> LogStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    stream::iter(lines).boxed()
}

/// Stream that yields nothing
pub fn empty() -> LogStream {
    stream::empty().boxed()
}

/// Options for tailing a log file
#[derive(Debug, Clone)]
pub struct TailOptions {
    /// Keep yielding lines appended after the history
    pub follow: bool,

    /// Number of historical lines to yield first
    pub lines: usize,

    /// How long to wait at end of file before checking again
    pub poll_interval: Duration,
}

impl TailOptions {
    pub fn new(follow: bool, lines: usize) -> Self {
        Self {
            follow,
            lines,
            ..Default::default()
        }
    }
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            follow: false,
            lines: 100,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Decode one raw line, dropping the line terminator. Invalid UTF-8 is
/// replaced rather than rejected.
fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

struct Follower {
    reader: BufReader<fs::File>,
    pending: Vec<u8>,
    poll_interval: Duration,
}

/// Tail a log file: the last `lines` lines, then new lines if following.
///
/// When following, only complete lines are yielded; a line still being
/// written is held back until its newline arrives.
pub async fn tail_file(
    path: impl AsRef<Path>,
    options: TailOptions,
) -> Result<LogStream, HaymakerError> {
    let path = path.as_ref();
    let file = fs::File::open(path).await?;
    let mut reader = BufReader::new(file);

    let mut history: VecDeque<String> = VecDeque::new();
    let mut buf = Vec::new();
    let mut pending = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if options.follow && buf.last() != Some(&b'\n') {
            pending = std::mem::take(&mut buf);
            break;
        }
        if options.lines > 0 {
            if history.len() == options.lines {
                history.pop_front();
            }
            history.push_back(decode_line(std::mem::take(&mut buf)));
        }
    }
    debug!(
        "Tailing {} ({} historical lines, follow={})",
        path.display(),
        history.len(),
        options.follow
    );

    let history = stream::iter(history);
    if !options.follow {
        return Ok(history.boxed());
    }

    let follower = Follower {
        reader,
        pending,
        poll_interval: options.poll_interval,
    };
    let live = stream::unfold(follower, |mut st| async move {
        loop {
            match st.reader.read_until(b'\n', &mut st.pending).await {
                Ok(0) => tokio::time::sleep(st.poll_interval).await,
                Ok(_) if st.pending.last() == Some(&b'\n') => {
                    let line = decode_line(std::mem::take(&mut st.pending));
                    return Some((line, st));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Stopped following log file: {}", e);
                    return None;
                }
            }
        }
    });

    Ok(history.chain(live).boxed())
}

struct ChildLines {
    child: Child,
    reader: BufReader<ChildStdout>,
}

/// Stream the stdout lines of a child process.
///
/// The child should be spawned with `kill_on_drop(true)` and a piped stdout:
/// dropping the stream then terminates it.
pub fn child_lines(mut child: Child) -> Result<LogStream, HaymakerError> {
    let stdout = child.stdout.take().ok_or_else(|| {
        HaymakerError::Internal("child process was spawned without a piped stdout".to_string())
    })?;
    let state = ChildLines {
        child,
        reader: BufReader::new(stdout),
    };

    Ok(stream::unfold(state, |mut st| async move {
        let mut raw = Vec::new();
        match st.reader.read_until(b'\n', &mut raw).await {
            Ok(n) if n > 0 => Some((decode_line(raw), st)),
            Ok(_) => {
                if let Err(e) = st.child.wait().await {
                    warn!("Failed to reap log process: {}", e);
                }
                None
            }
            Err(e) => {
                warn!("Failed to read log process output: {}", e);
                None
            }
        }
    })
    .boxed())
}
