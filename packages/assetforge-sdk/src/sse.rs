//! Incremental decoder for `text/event-stream` bodies.
//!
//! Chunks from the HTTP body do not line up with event boundaries, so the
//! decoder buffers until it sees a blank line. Comment lines (`: ping`) are
//! the usual keep-alive on SSE and are surfaced as heartbeat frames so the
//! connection's liveness watch sees them.

use assetforge_core::HEARTBEAT_SENTINEL;
use tracing::warn;

/// Largest unterminated block kept before it is discarded.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a block terminator.
    scanned: usize,
    max_pending: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_pending,
        }
    }

    /// Feeds one body chunk and returns every frame it completed.
    ///
    /// Works on bytes so a multi-byte character split across chunks is
    /// only decoded once the whole block has arrived. Each byte is searched
    /// once. A block that grows past the limit without terminating is
    /// dropped, along with the rest of it up to the next blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.find_terminator() {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            if let Some(frame) = decode_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_pending {
            warn!(
                pending = self.buffer.len(),
                limit = self.max_pending,
                "discarding oversized event-stream block"
            );
            // Keep a trailing newline so a terminator split across chunks is
            // still seen.
            let keep_newline = self.buffer.last() == Some(&b'\n');
            self.buffer.clear();
            if keep_newline {
                self.buffer.push(b'\n');
            }
            self.scanned = 0;
        }
        frames
    }

    /// Finds the next `\n\n`, starting one byte before the last scan ended so
    /// a terminator split across chunks is found.
    fn find_terminator(&mut self) -> Option<usize> {
        let start = self.scanned.saturating_sub(1);
        match self.buffer[start..].windows(2).position(|pair| pair == b"\n\n") {
            Some(offset) => Some(start + offset),
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }
}

fn decode_block(block: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    let mut event = None;
    let mut saw_comment = false;

    for line in block.lines() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(':') {
            saw_comment = true;
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data.push(value),
            "event" => event = Some(value),
            _ => {}
        }
    }

    if event == Some(HEARTBEAT_SENTINEL) {
        return Some(HEARTBEAT_SENTINEL.to_string());
    }
    if !data.is_empty() {
        return Some(data.join("\n"));
    }
    saw_comment.then(|| HEARTBEAT_SENTINEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"type\":\"unread_count\",\"count\":2}\n\n");
        assert_eq!(frames, vec![r#"{"type":"unread_count","count":2}"#.to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").is_empty());
        assert!(decoder.push(b"\"heartbeat\"}\n").is_empty());
        let frames = decoder.push(b"\ndata: next\n\n");
        assert_eq!(
            frames,
            vec![r#"{"type":"heartbeat"}"#.to_string(), "next".to_string()]
        );
    }

    #[test]
    fn test_comment_is_heartbeat() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b": keep-alive\n\n"), vec!["heartbeat".to_string()]);
    }

    #[test]
    fn test_named_heartbeat_event() {
        let mut decoder = SseDecoder::new();
        assert_eq!(
            decoder.push(b"event: heartbeat\ndata: 1700000000\n\n"),
            vec!["heartbeat".to_string()]
        );
    }

    #[test]
    fn test_multiline_data_and_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"id: 7\r\ndata: line one\r\ndata: line two\r\n\r\n");
        assert_eq!(frames, vec!["line one\nline two".to_string()]);
    }

    #[test]
    fn test_terminator_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: one\n").is_empty());
        assert!(decoder.push(b"data: two\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_oversized_block_is_dropped_and_stream_recovers() {
        let mut decoder = SseDecoder::with_limit(64);
        for _ in 0..10 {
            assert!(decoder.push(&[b'x'; 32]).is_empty());
        }
        assert!(decoder.buffer.len() <= 64);

        // Tail of the dropped block goes with it; the next block decodes.
        let frames = decoder.push(b"xxx\n\ndata: after\n\n");
        assert_eq!(frames, vec!["after".to_string()]);
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn test_block_without_data_is_skipped() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"retry: 3000\n\n").is_empty());
    }
}
