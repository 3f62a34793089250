use goose_desktop_models::StreamEvent;
use tracing::{debug, trace};

use crate::error::ProtocolError;

/// Incremental decoder for the event-stream body of `/reply`.
///
/// Frames are blocks of `field: value` lines terminated by a blank line.
/// Only `data` lines carry payload; comment lines (`:`) and other fields
/// are skipped. Raw bytes are buffered so a chunk may end anywhere, even
/// inside a multi-byte character.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, ProtocolError>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, delimiter)) = find_block_end(&self.buffer, self.scanned) {
            let block: Vec<u8> = self.buffer.drain(..end + delimiter).collect();
            self.scanned = 0;
            if let Some(frame) = decode_block(&block[..end]) {
                frames.push(frame);
            }
        }
        // A delimiter can straddle two chunks; rescan its first bytes next time.
        self.scanned = self.buffer.len().saturating_sub(2);
        frames
    }

    /// Flush a trailing block that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<Result<StreamEvent, ProtocolError>> {
        self.scanned = 0;
        let block = std::mem::take(&mut self.buffer);
        if block.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        debug!("Flushing unterminated frame ({} bytes)", block.len());
        decode_block(&block)
    }

    pub fn has_pending_data(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Position of the blank line ending the first complete block, and the
/// length of the delimiter.
fn find_block_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn decode_block(block: &[u8]) -> Option<Result<StreamEvent, ProtocolError>> {
    let text = match std::str::from_utf8(block) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field != "data" {
            trace!("Ignoring stream field '{}'", field);
            continue;
        }
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    let payload = data?;
    if payload.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamEvent>(&payload) {
        Ok(event) => Some(Ok(event)),
        Err(source) => Some(Err(ProtocolError::InvalidJson { payload, source })),
    }
}
