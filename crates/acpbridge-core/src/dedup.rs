//! Streaming text deduplication (spec §4.D "Streaming deduplication").
//!
//! Some upstream agents emit cumulative snapshots alongside deltas; this
//! collapses that into a pure delta stream. Used both by the ACP client
//! stub (B) when consuming an external backend's updates and by the agent
//! adapter (D) when producing our own.

/// Per-prompt dedup state. Reset at the start of each new prompt.
#[derive(Debug, Default, Clone)]
pub struct TextDedup {
    buffer: String,
}

impl TextDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound chunk, returning the text to emit, or `None` if the
    /// chunk is an exact duplicate of the buffer and should be dropped.
    pub fn ingest(&mut self, chunk: &str) -> Option<String> {
        if self.buffer.is_empty() {
            self.buffer = chunk.to_string();
            return Some(chunk.to_string());
        }
        if chunk == self.buffer {
            return None;
        }
        if let Some(suffix) = chunk.strip_prefix(self.buffer.as_str()) {
            self.buffer = chunk.to_string();
            return Some(suffix.to_string());
        }
        self.buffer.push_str(chunk);
        Some(chunk.to_string())
    }

    /// Clears the buffer, e.g. at the start of a new prompt.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_matches_spec_scenario_3() {
        let mut dedup = TextDedup::new();
        assert_eq!(dedup.ingest("He"), Some("He".to_string()));
        assert_eq!(dedup.ingest("Hello"), Some("llo".to_string()));
        assert_eq!(dedup.ingest("Hello"), None);
        assert_eq!(dedup.ingest(" world"), Some(" world".to_string()));
    }

    #[test]
    fn non_prefix_chunk_is_appended_and_emitted_whole() {
        let mut dedup = TextDedup::new();
        dedup.ingest("foo");
        assert_eq!(dedup.ingest("bar"), Some("bar".to_string()));
    }
}
