//! Recovering JSON objects from an undelimited byte stream.
//!
//! Senders write objects back to back (`{...}{...}`) with no length prefix
//! or separator, and TCP may split or merge them arbitrarily. The decoder
//! tracks brace depth outside string literals, so objects are recovered
//! whole regardless of how reads fall.
//!
//! ```text
//! read 1: {"type":"a"}{"type":"b","waypoints":[[1
//! read 2: 00,200]]}
//!          -> {"type":"a"}
//!          -> {"type":"b","waypoints":[[100,200]]}
//! ```
//!
//! # Resynchronisation
//!
//! A broken object (unbalanced braces or an odd number of quotes) would
//! otherwise swallow the rest of the stream. A `}` followed by `{` (with
//! optional whitespace between) is never valid JSON outside a string, so it
//! marks the start of the next object:
//!
//! - outside a string, the open object is cut off there at once
//! - inside a string, a second scanner follows the candidate object; if it
//!   closes as a typed message before the outer object does, the outer
//!   object is cut off and the candidate is emitted
//! - when an object outgrows `max_frame_len`, the buffer is replayed from its
//!   first boundary

use serde_json::Value;
use thiserror::Error;

/// A frame that could not be turned into text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("object was not closed before the next one began")]
    Unterminated,
}

/// Brace and string state of one object
#[derive(Clone, Copy, Debug, Default)]
struct Scanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Scanner positioned just after an opening brace
    fn opened() -> Self {
        Self {
            depth: 1,
            ..Self::default()
        }
    }

    /// Advance by one byte; true when it closed the outermost object.
    fn step(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return false;
        }

        match byte {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => {
                self.depth = self.depth.saturating_sub(1);
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// Incremental brace-matching splitter.
///
/// Bytes outside any object (whitespace, stray characters) are discarded.
/// UTF-8 continuation bytes never collide with the ASCII structural
/// characters, so scanning works on raw bytes.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_len: usize,
    scan: Scanner,
    /// Last non-whitespace byte seen was `}`
    after_close: bool,
    /// Candidate object started at a boundary inside a string: buffer offset
    /// of its `{` and its own scanner
    candidate: Option<(usize, Scanner)>,
    oversized: bool,
    discarded: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len,
            scan: Scanner::default(),
            after_close: false,
            candidate: None,
            oversized: false,
            discarded: 0,
        }
    }

    /// Feed received bytes; returns every object completed by them, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String, FrameError>> {
        let mut frames = Vec::new();
        let mut input = data.to_vec();
        let mut pos = 0;

        while pos < input.len() {
            let byte = input[pos];
            pos += 1;
            if let Some(mut replay) = self.feed(byte, &mut frames) {
                replay.extend_from_slice(&input[pos..]);
                input = replay;
                pos = 0;
            }
        }

        frames
    }

    /// Process one byte. Returns bytes to scan again after a resync.
    fn feed(&mut self, byte: u8, frames: &mut Vec<Result<String, FrameError>>) -> Option<Vec<u8>> {
        let boundary = byte == b'{' && self.after_close;
        if !byte.is_ascii_whitespace() {
            self.after_close = byte == b'}';
        }

        if self.scan.depth == 0 {
            if byte == b'{' {
                self.start_frame();
            } else if !byte.is_ascii_whitespace() {
                self.discarded += 1;
            }
            return None;
        }

        if self.oversized {
            if boundary {
                frames.push(Err(self.too_large()));
                self.start_frame();
            } else if self.scan.step(byte) {
                frames.push(Err(self.too_large()));
                self.reset();
            }
            return None;
        }

        if boundary && !self.scan.in_string {
            frames.push(Err(FrameError::Unterminated));
            self.start_frame();
            return None;
        }

        self.buffer.push(byte);

        if let Some(text) = self.follow_candidate(byte, boundary) {
            frames.push(Err(FrameError::Unterminated));
            frames.push(Ok(text));
            self.reset();
            return None;
        }

        let closed = self.scan.step(byte);
        if self.buffer.len() > self.max_frame_len {
            return self.overflow(closed, frames);
        }
        if closed {
            frames.push(self.finish_frame());
        }
        None
    }

    /// Track the candidate object; returns it once it closes as a message.
    fn follow_candidate(&mut self, byte: u8, boundary: bool) -> Option<String> {
        let restart = boundary
            && self
                .candidate
                .as_ref()
                .is_none_or(|(_, scan)| !scan.in_string);
        if restart {
            self.candidate = Some((self.buffer.len() - 1, Scanner::opened()));
            return None;
        }

        let (start, scan) = self.candidate.as_mut()?;
        if !scan.step(byte) {
            return None;
        }
        let start = *start;
        self.candidate = None;
        typed_message(&self.buffer[start..])
    }

    /// The open object outgrew the limit: replay from its first boundary, or
    /// skip the rest of it.
    fn overflow(
        &mut self,
        closed: bool,
        frames: &mut Vec<Result<String, FrameError>>,
    ) -> Option<Vec<u8>> {
        if let Some(at) = find_boundary(&self.buffer[1..]) {
            frames.push(Err(FrameError::Unterminated));
            let replay = self.buffer.split_off(at + 1);
            self.reset();
            return Some(replay);
        }

        if closed {
            frames.push(Err(self.too_large()));
            self.reset();
        } else {
            self.buffer = Vec::new();
            self.candidate = None;
            self.oversized = true;
        }
        None
    }

    fn start_frame(&mut self) {
        self.buffer.clear();
        self.buffer.push(b'{');
        self.scan = Scanner::opened();
        self.candidate = None;
        self.oversized = false;
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.scan = Scanner::default();
        self.after_close = false;
        self.candidate = None;
        self.oversized = false;
    }

    fn too_large(&self) -> FrameError {
        FrameError::TooLarge {
            max: self.max_frame_len,
        }
    }

    fn finish_frame(&mut self) -> Result<String, FrameError> {
        self.candidate = None;
        let bytes = std::mem::take(&mut self.buffer);
        String::from_utf8(bytes).map_err(|_| FrameError::InvalidUtf8)
    }

    /// True while part of an object is buffered
    pub fn is_mid_frame(&self) -> bool {
        self.scan.depth > 0
    }

    /// Count of non-whitespace bytes seen outside any object
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

/// Split text at every `}{` boundary, strings included.
///
/// Fallback for a frame that failed to parse as a whole.
pub fn split_concatenated(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < text.len() {
        match find_boundary(&text.as_bytes()[start + 1..]) {
            Some(i) => {
                let at = start + 1 + i;
                pieces.push(text[start..at].trim_end());
                start = at;
            }
            None => break,
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Offset of the first `{` whose preceding non-whitespace byte is `}`
fn find_boundary(bytes: &[u8]) -> Option<usize> {
    let mut after_close = false;
    for (i, &byte) in bytes.iter().enumerate() {
        if byte == b'{' && after_close {
            return Some(i);
        }
        if !byte.is_ascii_whitespace() {
            after_close = byte == b'}';
        }
    }
    None
}

/// The bytes as text when they hold a JSON object with a string `type`
fn typed_message(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .get("type")
        .is_some_and(Value::is_string)
        .then(|| text.to_string())
}
