//! # Multipart JPEG Stream Parser
//!
//! Incremental parser for `multipart/x-mixed-replace` bodies as served by the
//! playback endpoint:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! [Content-Length: N\r\n]
//! \r\n
//! <jpeg bytes>\r\n
//! --frame\r\n
//! ...
//! ```
//!
//! Bytes are pushed in whatever chunks the network delivers; complete parts
//! are pulled out with `next_frame`. When a part declares `Content-Length`
//! the body is cut at exactly that many bytes, otherwise it ends at the next
//! boundary line.

use crate::error::{StreamError, StreamResult};

pub const DEFAULT_BOUNDARY: &str = "frame";

/// Largest part body accepted, whether declared by `Content-Length` or
/// buffered while waiting for the next boundary.
pub const MAX_PART_LEN: usize = 32 * 1024 * 1024;

const MAX_HEADER_LEN: usize = 16 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Extract the boundary parameter from a `Content-Type` header value.
///
/// `multipart/x-mixed-replace; boundary=frame` yields `frame`. Quotes and a
/// leading `--` are stripped.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let value = value.strip_prefix("--").unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[derive(Debug)]
pub struct MjpegParser {
    buffer: Vec<u8>,
    /// `--<boundary>`
    delimiter: Vec<u8>,
    /// `\r\n--<boundary>`, the end of a body without `Content-Length`
    terminator: Vec<u8>,
    /// Body bytes before this offset are known to hold no terminator.
    scan_from: usize,
    finished: bool,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDARY)
    }
}

impl MjpegParser {
    pub fn new(boundary: &str) -> Self {
        let delimiter = format!("--{boundary}").into_bytes();
        let mut terminator = b"\r\n".to_vec();
        terminator.extend_from_slice(&delimiter);
        Self {
            buffer: Vec::new(),
            delimiter,
            terminator,
            scan_from: 0,
            finished: false,
        }
    }

    /// Append bytes received from the network.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.finished {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// True once the closing `--<boundary>--` line has been seen, or the
    /// stream was abandoned as malformed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for more input.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pull the next complete part body, if one is fully buffered.
    ///
    /// A part larger than [`MAX_PART_LEN`] or with runaway headers is a
    /// decode error and ends the stream.
    pub fn next_frame(&mut self) -> StreamResult<Option<Vec<u8>>> {
        let result = self.parse_next();
        if result.is_err() {
            self.finished = true;
            self.buffer.clear();
            self.scan_from = 0;
        }
        result
    }

    fn parse_next(&mut self) -> StreamResult<Option<Vec<u8>>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let Some(start) = find(&self.buffer, &self.delimiter, 0) else {
                // Only a delimiter split across chunks is worth keeping.
                let keep = self.delimiter.len() - 1;
                if self.buffer.len() > keep {
                    let cut = self.buffer.len() - keep;
                    self.buffer.drain(..cut);
                }
                return Ok(None);
            };
            if start > 0 {
                self.buffer.drain(..start);
                self.scan_from = 0;
            }

            let after_delim = self.delimiter.len();
            if self.buffer.len() < after_delim + 2 {
                return Ok(None);
            }
            if &self.buffer[after_delim..after_delim + 2] == b"--" {
                self.finished = true;
                self.buffer.clear();
                return Ok(None);
            }

            let Some(header_end) = find(&self.buffer, HEADER_END, after_delim) else {
                if self.buffer.len() - after_delim > MAX_HEADER_LEN {
                    return Err(StreamError::decode(format!(
                        "multipart headers longer than {MAX_HEADER_LEN} bytes"
                    )));
                }
                return Ok(None);
            };
            let body_start = header_end + HEADER_END.len();

            let body_end = match content_length(&self.buffer[after_delim..header_end]) {
                Some(len) => {
                    let end = match body_start.checked_add(len) {
                        Some(end) if len <= MAX_PART_LEN => end,
                        _ => return Err(oversized_part(len)),
                    };
                    if self.buffer.len() < end {
                        return Ok(None);
                    }
                    end
                }
                None => match find(&self.buffer, &self.terminator, body_start.max(self.scan_from)) {
                    Some(end) => end,
                    None => {
                        let waiting = self.buffer.len() - body_start;
                        if waiting > MAX_PART_LEN {
                            return Err(oversized_part(waiting));
                        }
                        self.scan_from = self
                            .buffer
                            .len()
                            .saturating_sub(self.terminator.len() - 1);
                        return Ok(None);
                    }
                },
            };

            let body = self.buffer[body_start..body_end].to_vec();
            self.buffer.drain(..body_end);
            self.scan_from = 0;

            // Parts with an empty body carry nothing to show.
            if !body.is_empty() {
                return Ok(Some(body));
            }
        }
    }

    /// Flush at end of stream. Returns the trailing part when the server
    /// closed the connection without a final boundary.
    pub fn finish(&mut self) -> StreamResult<Option<Vec<u8>>> {
        if let Some(frame) = self.next_frame()? {
            return Ok(Some(frame));
        }
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        let buffer = std::mem::take(&mut self.buffer);

        let Some(start) = find(&buffer, &self.delimiter, 0) else {
            return Ok(None);
        };
        let Some(header_end) = find(&buffer, HEADER_END, start + self.delimiter.len()) else {
            return Ok(None);
        };
        let mut body = buffer[header_end + HEADER_END.len()..].to_vec();
        while body.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            body.pop();
        }
        Ok((!body.is_empty()).then_some(body))
    }
}

fn oversized_part(len: usize) -> StreamError {
    StreamError::decode(format!(
        "multipart part of {len} bytes exceeds the {MAX_PART_LEN} byte limit"
    ))
}

fn content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
