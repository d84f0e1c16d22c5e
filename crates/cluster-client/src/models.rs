//! Data passed across the client boundary

/// Output harvested from a pod's log stream, bounded by a byte ceiling
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodLogs {
    /// Log text decoded from at most the requested number of bytes; invalid
    /// UTF-8 is replaced with U+FFFD
    pub content: String,
    /// Whether the stream held more than the requested number of bytes
    pub truncated: bool,
}

impl PodLogs {
    /// Bounds raw log bytes to `limit`, then decodes them.
    ///
    /// A multi-byte character split by the cut is dropped rather than
    /// replaced. Callers fetch one byte more than `limit` so that an
    /// overflowing stream is distinguishable from one that fits exactly.
    pub fn bounded(mut raw: Vec<u8>, limit: usize) -> Self {
        let truncated = raw.len() > limit;
        if truncated {
            raw.truncate(limit);
            raw.truncate(complete_prefix_len(&raw));
        }
        Self {
            content: String::from_utf8_lossy(&raw).into_owned(),
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Length of `bytes` without a trailing, unfinished UTF-8 sequence
fn complete_prefix_len(bytes: &[u8]) -> usize {
    // Sequences are at most 4 bytes, so only the last 3 can start an unfinished one
    for back in 1..=bytes.len().min(3) {
        let start = bytes.len() - back;
        let byte = bytes[start];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { start } else { bytes.len() };
    }
    bytes.len()
}

/// Severity of a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

/// A user-visible event attached to a PodFlame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerEvent {
    pub severity: EventSeverity,
    /// Short machine-readable reason (e.g. `Deleting`)
    pub reason: String,
    /// Human-readable description
    pub note: String,
    /// What the controller was doing when the event happened
    pub action: String,
}

impl ProfilerEvent {
    /// Informational event
    pub fn normal(reason: impl Into<String>, action: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Normal,
            reason: reason.into(),
            note: note.into(),
            action: action.into(),
        }
    }

    /// Warning event
    pub fn warning(reason: impl Into<String>, action: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Warning,
            reason: reason.into(),
            note: note.into(),
            action: action.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_fits() {
        let logs = PodLogs::bounded(b"graph-data".to_vec(), 10);
        assert_eq!(logs.content, "graph-data");
        assert!(!logs.truncated);
    }

    #[test]
    fn test_bounded_truncates() {
        let logs = PodLogs::bounded(b"graph-data".to_vec(), 5);
        assert_eq!(logs.content, "graph");
        assert!(logs.truncated);
    }

    #[test]
    fn test_bounded_drops_split_character() {
        // "é" is two bytes; cutting at 2 would split it
        let logs = PodLogs::bounded("aé".as_bytes().to_vec(), 2);
        assert_eq!(logs.content, "a");
        assert!(logs.truncated);

        // "€" is three bytes
        let logs = PodLogs::bounded("ab€".as_bytes().to_vec(), 4);
        assert_eq!(logs.content, "ab");

        let logs = PodLogs::bounded("ab€c".as_bytes().to_vec(), 5);
        assert_eq!(logs.content, "ab€");
    }

    #[test]
    fn test_bounded_replaces_invalid_bytes() {
        let logs = PodLogs::bounded(b"graph\xFFdata".to_vec(), 1024);
        assert_eq!(logs.content, "graph\u{FFFD}data");
        assert!(!logs.truncated);
    }

    #[test]
    fn test_bounded_empty() {
        let logs = PodLogs::bounded(Vec::new(), 4096);
        assert!(logs.is_empty());
        assert!(!logs.truncated);
    }
}
