//! Wire-level constants and the in-band control scan.
//!
//! The termshare wire format is a bare TLS byte stream. There is no
//! framing: every byte is raw terminal I/O except for a single control
//! byte a guest may send to leave the session without touching the
//! shared shell.

/// In-band byte a guest sends to detach from the session (ASCII EOT).
///
/// Only the guest-to-host direction interprets this byte; in the
/// host-to-guest direction it is ordinary terminal output.
pub const SENTINEL_DISCONNECT: u8 = 0x04;

/// Upper bound for every single read/write in the relay loops.
pub const CHUNK_SIZE: usize = 1024;

/// Payload sent to a guest immediately after a successful handshake,
/// so the guest sees feedback before any shell output arrives.
pub const GREETING: &[u8] = b"$ ";

/// Splits an input chunk at the first disconnect sentinel.
///
/// Returns the bytes preceding the sentinel and whether a sentinel was
/// present. Bytes after the sentinel are discarded: the guest is gone,
/// anything trailing its farewell is noise.
pub fn split_at_sentinel(data: &[u8]) -> (&[u8], bool) {
    match data.iter().position(|&b| b == SENTINEL_DISCONNECT) {
        Some(idx) => (&data[..idx], true),
        None => (data, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sentinel_passes_through() {
        let (prefix, found) = split_at_sentinel(b"echo hi\n");
        assert_eq!(prefix, b"echo hi\n");
        assert!(!found);
    }

    #[test]
    fn test_sentinel_splits_prefix() {
        let (prefix, found) = split_at_sentinel(b"partial\x04trailing");
        assert_eq!(prefix, b"partial");
        assert!(found);
    }

    #[test]
    fn test_sentinel_alone() {
        let (prefix, found) = split_at_sentinel(&[SENTINEL_DISCONNECT]);
        assert!(prefix.is_empty());
        assert!(found);
    }

    #[test]
    fn test_sentinel_first_occurrence_wins() {
        let (prefix, found) = split_at_sentinel(b"a\x04b\x04c");
        assert_eq!(prefix, b"a");
        assert!(found);
    }

    #[test]
    fn test_empty_chunk() {
        let (prefix, found) = split_at_sentinel(b"");
        assert!(prefix.is_empty());
        assert!(!found);
    }

    #[test]
    fn test_control_characters_are_not_sentinels() {
        // ^C (0x03) and ^] (0x1d) must reach the shell untouched.
        let (prefix, found) = split_at_sentinel(b"\x03\x1d");
        assert_eq!(prefix, b"\x03\x1d");
        assert!(!found);
    }
}
