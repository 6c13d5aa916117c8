//! Incremental UTF-8 decoding for chunked response bodies.
//!
//! HTTP chunk boundaries fall anywhere, including inside a multi-byte UTF-8
//! sequence. The accumulator keeps the undecoded tail between pushes so a
//! split sequence decodes once its remaining bytes arrive.

/// Streaming UTF-8 decoder tolerant of chunk-split multi-byte sequences.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes in and returns the newly decoded text.
    ///
    /// Invalid sequences decode to U+FFFD; an incomplete trailing sequence
    /// is held back until the next push.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut decoded = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&self.pending[..valid_len]));
                    match e.error_len() {
                        Some(invalid_len) => {
                            decoded.push('\u{FFFD}');
                            self.pending.drain(..valid_len + invalid_len);
                        }
                        None => {
                            // Incomplete tail; keep it for the next chunk.
                            self.pending.drain(..valid_len);
                            break;
                        }
                    }
                }
            }
        }
        decoded
    }
}
