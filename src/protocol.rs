//! Text echo rules shared by both transports.
//!
//! - TCP: newline-terminated lines, each answered with `Server received: <line>`
//! - UDP: one datagram in, `UDP Server received: <payload>` out
//!
//! Special payload (trimmed, any case):
//! - `quit` - TCP closes the session after the echo, UDP adds a goodbye datagram

use bytes::Bytes;
use std::borrow::Cow;

/// Session-ending sentinel.
pub const QUIT_SENTINEL: &str = "quit";

/// Prefix of every TCP echo line.
pub const TCP_RESPONSE_PREFIX: &str = "Server received: ";

/// Prefix of every UDP echo datagram.
pub const UDP_RESPONSE_PREFIX: &str = "UDP Server received: ";

/// Second reply to a UDP quit.
pub const UDP_GOODBYE: &str = "Goodbye from UDP Server!";

/// Marker the UDP client watches for to end its receiver.
pub const GOODBYE_MARKER: &str = "Goodbye";

/// Largest datagram the UDP server reads; longer ones are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// True when `text`, trimmed, is `quit` in any case.
pub fn is_quit(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(QUIT_SENTINEL)
}

/// True when a reply from the UDP server ends the client session.
pub fn is_goodbye(text: &str) -> bool {
    text.contains(GOODBYE_MARKER)
}

/// Decode a payload as text; invalid UTF-8 is replaced, never rejected.
pub fn decode(payload: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(payload)
}

/// Strip one trailing `\n`, then one trailing `\r`.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// The full TCP response for one received line, newline included.
pub fn tcp_response(line: &str) -> String {
    format!("{TCP_RESPONSE_PREFIX}{line}\n")
}

/// Reply datagrams for one received UDP message, in send order.
pub fn udp_replies(message: &str) -> Vec<Bytes> {
    let mut replies = Vec::with_capacity(2);
    replies.push(Bytes::from(format!("{UDP_RESPONSE_PREFIX}{message}")));
    if is_quit(message) {
        replies.push(Bytes::from_static(UDP_GOODBYE.as_bytes()));
    }
    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quit() {
        assert!(is_quit("quit"));
        assert!(is_quit("  QUIT \t"));
        assert!(is_quit("QuIt\r"));
        assert!(!is_quit("quit now"));
        assert!(!is_quit("q uit"));
        assert!(!is_quit(""));
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"hello\n"), b"hello");
        assert_eq!(strip_line_ending(b"hello\r\n"), b"hello");
        assert_eq!(strip_line_ending(b"hello"), b"hello");
        assert_eq!(strip_line_ending(b"\n"), b"");
        // only one terminator is removed
        assert_eq!(strip_line_ending(b"hello\n\n"), b"hello\n");
    }

    #[test]
    fn test_tcp_response() {
        assert_eq!(tcp_response("hello"), "Server received: hello\n");
        assert_eq!(tcp_response(" QUIT "), "Server received:  QUIT \n");
    }

    #[test]
    fn test_udp_replies() {
        let replies = udp_replies("hello");
        assert_eq!(replies, vec![Bytes::from_static(b"UDP Server received: hello")]);

        let replies = udp_replies("quit");
        assert_eq!(
            replies,
            vec![
                Bytes::from_static(b"UDP Server received: quit"),
                Bytes::from_static(b"Goodbye from UDP Server!"),
            ]
        );
    }

    #[test]
    fn test_goodbye_is_recognised() {
        assert!(is_goodbye(UDP_GOODBYE));
        assert!(!is_goodbye("UDP Server received: bye"));
    }

    #[test]
    fn test_decode_is_lossy() {
        assert_eq!(decode(b"plain"), "plain");
        assert_eq!(decode(&[b'a', 0xff, b'b']), "a\u{fffd}b");
    }
}
