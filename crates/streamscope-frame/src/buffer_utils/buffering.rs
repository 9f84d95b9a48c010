/// Incremental UTF-8 decoder for chunked byte streams.
///
/// Multi-byte sequences split across chunk boundaries are held back until the
/// next call. Invalid sequences decode to U+FFFD instead of failing.
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
    bom_checked: bool,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

impl Default for Utf8StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(4),
            bom_checked: false,
        }
    }

    /// Decode the next chunk, returning every complete character available so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        if !self.bom_checked {
            // Leading BOM may itself be split across chunks
            if self.pending.len() < BOM.len() && BOM.starts_with(&self.pending) {
                return String::new();
            }
            self.bom_checked = true;
            if self.pending.starts_with(BOM) {
                self.pending.drain(..BOM.len());
            }
        }

        let mut out = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&input[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + invalid..];
                        }
                        None => {
                            // incomplete sequence at the end, keep it for later
                            input = &input[valid..];
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - input.len();
        self.pending.drain(..consumed);
        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Bytes held back waiting for the rest of a sequence.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
