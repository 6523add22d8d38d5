//! Async stream log readers (non-UTF8-safe).
//!
//! The engine can emit non-UTF8 bytes on stdout/stderr. `BufReader::lines()`
//! would end the reader task on invalid UTF-8, so lines are read as bytes and
//! decoded lossily.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

/// Tracing target engine output is logged under.
pub const ENGINE_LOG_TARGET: &str = "hostengine::engine";

/// Forward every line of `stream` to tracing until EOF.
pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    pid: Option<u32>,
    stream_type: &'static str,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    if !line.is_empty() {
                        info!(target: ENGINE_LOG_TARGET, ?pid, stream = stream_type, "{line}");
                    }
                }
                Err(e) => {
                    debug!(?pid, stream = stream_type, error = %e, "Engine log reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(?pid, stream = stream_type, "Engine log reader exiting");
    });
}

/// Strip the line terminator and decode lossily.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if raw[..end].ends_with(b"\n") {
        end -= 1;
    }
    if raw[..end].ends_with(b"\r") {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_crlf_and_replaces_invalid_bytes() {
        assert_eq!(decode_line(b"loading weights\r\n"), "loading weights");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
        assert_eq!(decode_line(b"\n"), "");
    }
}
