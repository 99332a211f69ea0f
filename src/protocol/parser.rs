//! Replay RESP Reply Decoder
//!
//! The executor accumulates reply bytes in a fixed buffer and calls
//! [`decode`] on the whole buffer after every read. The decoder keeps no
//! state between calls; it starts over from the first byte each time.
//!
//! ## How the Decoder Works
//!
//! `decode` returns one of:
//! - `Ok(Some((reply, consumed)))` - a complete reply, `consumed` bytes long
//! - `Ok(None)` - the reply is truncated, read more bytes and call again
//! - `Err(ParseError)` - the bytes can never become a valid reply
//!
//! Because partial state is never kept, any byte-level split of a valid
//! reply across reads decodes to the same result once every byte arrived.
//! The price is re-scanning the buffer prefix on every call, which is cheap
//! for the reply sizes a single command produces.
//!
//! The leading byte is checked before anything else, so an unknown prefix
//! fails on the first byte and stays an error however many bytes follow.

use crate::protocol::types::{prefix, Reply, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur while decoding a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer, length or count line
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a status or error line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk length that cannot be addressed on this platform
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// Decodes one reply from the start of `buf`.
///
/// # Example
///
/// ```
/// use rconnect::protocol::{decode, Reply};
///
/// let (reply, consumed) = decode(b"+OK\r\n").unwrap().unwrap();
/// assert_eq!(reply, Reply::Status("OK".to_string()));
/// assert_eq!(consumed, 5);
///
/// assert!(decode(b"$5\r\nhel").unwrap().is_none());
/// ```
pub fn decode(buf: &[u8]) -> ParseResult<Option<(Reply, usize)>> {
    let Some(&lead) = buf.first() else {
        return Ok(None);
    };

    match lead {
        prefix::SIMPLE_STRING => {
            let Some((line, used)) = read_line(buf) else {
                return Ok(None);
            };
            Ok(Some((Reply::Status(to_text(line)?), used)))
        }
        prefix::ERROR => {
            let Some((line, used)) = read_line(buf) else {
                return Ok(None);
            };
            Ok(Some((Reply::Error(to_text(line)?), used)))
        }
        prefix::INTEGER => {
            let Some((line, used)) = read_line(buf) else {
                return Ok(None);
            };
            Ok(Some((Reply::Integer(parse_integer(line)?), used)))
        }
        prefix::BULK_STRING => match decode_bulk(buf)? {
            Some((Some(data), used)) => Ok(Some((Reply::Bulk(data), used))),
            Some((None, used)) => Ok(Some((Reply::Null, used))),
            None => Ok(None),
        },
        prefix::ARRAY => decode_array(buf),
        other => Err(ParseError::UnknownPrefix(other)),
    }
}

/// Parses a bulk string: `$<length>\r\n<data>\r\n`
///
/// A negative length is a null and yields `Some((None, consumed))`.
fn decode_bulk(buf: &[u8]) -> ParseResult<Option<(Option<Bytes>, usize)>> {
    debug_assert!(buf[0] == prefix::BULK_STRING);

    let Some((line, header)) = read_line(buf) else {
        return Ok(None);
    };

    let length = parse_integer(line)?;
    if length < 0 {
        return Ok(Some((None, header)));
    }

    let length = usize::try_from(length).map_err(|_| ParseError::InvalidBulkLength(length))?;
    let end = header
        .checked_add(length)
        .and_then(|n| n.checked_add(CRLF.len()))
        .ok_or(ParseError::InvalidBulkLength(length as i64))?;

    if buf.len() < end {
        return Ok(None);
    }

    if &buf[header + length..end] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    Ok(Some((
        Some(Bytes::copy_from_slice(&buf[header..header + length])),
        end,
    )))
}

/// Parses a top-level array: `*<count>\r\n<elements...>`
fn decode_array(buf: &[u8]) -> ParseResult<Option<(Reply, usize)>> {
    debug_assert!(buf[0] == prefix::ARRAY);

    let Some((line, header)) = read_line(buf) else {
        return Ok(None);
    };

    let count = parse_integer(line)?;
    if count < 0 {
        return Ok(Some((Reply::Null, header)));
    }

    let mut items = Vec::with_capacity((count as usize).min(1024));
    let mut consumed = header;

    for _ in 0..count {
        match collect_element(&buf[consumed..], 1, &mut items)? {
            Some(used) => consumed += used,
            None => return Ok(None),
        }
    }

    Ok(Some((Reply::Array(items), consumed)))
}

/// Appends the payload of one array element to `out`.
///
/// Returns the number of bytes the element occupied, or `None` when the
/// element is truncated.
fn collect_element(buf: &[u8], depth: usize, out: &mut Vec<Bytes>) -> ParseResult<Option<usize>> {
    let Some(&lead) = buf.first() else {
        return Ok(None);
    };

    match lead {
        prefix::BULK_STRING => match decode_bulk(buf)? {
            Some((data, used)) => {
                out.push(data.unwrap_or_default());
                Ok(Some(used))
            }
            None => Ok(None),
        },
        prefix::SIMPLE_STRING | prefix::ERROR => {
            let Some((line, used)) = read_line(buf) else {
                return Ok(None);
            };
            out.push(Bytes::copy_from_slice(line));
            Ok(Some(used))
        }
        prefix::INTEGER => {
            let Some((line, used)) = read_line(buf) else {
                return Ok(None);
            };
            let value = parse_integer(line)?;
            out.push(Bytes::from(value.to_string()));
            Ok(Some(used))
        }
        prefix::ARRAY => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(ParseError::ProtocolError(format!(
                    "maximum nesting depth exceeded: {}",
                    MAX_NESTING_DEPTH
                )));
            }

            let Some((line, header)) = read_line(buf) else {
                return Ok(None);
            };

            let count = parse_integer(line)?;
            if count < 0 {
                out.push(Bytes::new());
                return Ok(Some(header));
            }

            let mut consumed = header;
            for _ in 0..count {
                match collect_element(&buf[consumed..], depth + 1, out)? {
                    Some(used) => consumed += used,
                    None => return Ok(None),
                }
            }
            Ok(Some(consumed))
        }
        other => Err(ParseError::UnknownPrefix(other)),
    }
}

/// Reads the line after the prefix byte.
///
/// Returns the line content and the number of bytes consumed including the
/// prefix and CRLF.
#[inline]
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let pos = find_crlf(&buf[1..])?;
    Some((&buf[1..1 + pos], 1 + pos + CRLF.len()))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

fn parse_integer(line: &[u8]) -> ParseResult<i64> {
    let s = std::str::from_utf8(line).map_err(|e| ParseError::InvalidInteger(e.to_string()))?;
    s.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("{:?}: {}", s, e)))
}

fn to_text(line: &[u8]) -> ParseResult<String> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::encode;

    /// Feeds `input` in the given chunks, decoding the growing buffer after
    /// each one, and returns the first terminal outcome.
    fn feed(input: &[u8], cuts: &[usize]) -> ParseResult<Option<(Reply, usize)>> {
        let mut buffer = Vec::new();
        let mut start = 0;
        for &cut in cuts.iter().chain(std::iter::once(&input.len())) {
            buffer.extend_from_slice(&input[start..cut]);
            start = cut;
            match decode(&buffer) {
                Ok(None) => continue,
                outcome => return outcome,
            }
        }
        Ok(None)
    }

    #[test]
    fn test_decode_status() {
        let (reply, consumed) = decode(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Status("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_decode_error() {
        let (reply, consumed) = decode(b"-ERR unknown command\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Error("ERR unknown command".to_string()));
        assert_eq!(consumed, 22);
    }

    #[test]
    fn test_decode_integer() {
        let (reply, _) = decode(b":1000\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Integer(1000));

        let (reply, _) = decode(b":-42\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Integer(-42));
    }

    #[test]
    fn test_decode_invalid_integer() {
        assert!(matches!(
            decode(b":not_a_number\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert!(matches!(decode(b"$abc\r\n"), Err(ParseError::InvalidInteger(_))));
    }

    #[test]
    fn test_decode_bulk() {
        let (reply, consumed) = decode(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Bulk(Bytes::from("hello")));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_decode_empty_and_binary_bulk() {
        let (reply, _) = decode(b"$0\r\n\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Bulk(Bytes::new()));

        let (reply, _) = decode(b"$7\r\nhe\r\n\x00lo\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Bulk(Bytes::from(&b"he\r\n\x00lo"[..])));
    }

    #[test]
    fn test_decode_null_bulk() {
        let (reply, consumed) = decode(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Null);
        assert_eq!(consumed, 5);

        let (reply, _) = decode(b"$-5\r\n").unwrap().unwrap();
        assert!(reply.is_null());
    }

    #[test]
    fn test_decode_incomplete() {
        for input in [
            &b""[..],
            b"+OK",
            b"+OK\r",
            b":12",
            b"$5",
            b"$5\r\nhel",
            b"$5\r\nhello",
            b"$5\r\nhello\r",
            b"*2\r\n$3\r\nfoo\r\n",
            b"*2\r\n$3\r\nfoo\r\n$3\r\nba",
            b"*2",
        ] {
            assert_eq!(decode(input), Ok(None), "input {:?}", input);
        }
    }

    #[test]
    fn test_decode_bulk_missing_crlf() {
        assert!(matches!(
            decode(b"$3\r\nfooXY"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_decode_array() {
        let (reply, consumed) = decode(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![Bytes::from("foo"), Bytes::from("bar")])
        );
        assert_eq!(consumed, 22);
    }

    #[test]
    fn test_decode_array_null_placeholder() {
        let (reply, _) = decode(b"*3\r\n$1\r\na\r\n$-1\r\n$1\r\nc\r\n").unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![Bytes::from("a"), Bytes::new(), Bytes::from("c")])
        );
    }

    #[test]
    fn test_decode_null_and_empty_array() {
        assert_eq!(decode(b"*-1\r\n").unwrap().unwrap().0, Reply::Null);
        assert_eq!(decode(b"*0\r\n").unwrap().unwrap().0, Reply::Array(vec![]));
    }

    #[test]
    fn test_decode_mixed_and_nested_array() {
        let input = b"*4\r\n+OK\r\n:100\r\n*2\r\n$1\r\nx\r\n:7\r\n-ERR inner\r\n";
        let (reply, consumed) = decode(input).unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![
                Bytes::from("OK"),
                Bytes::from("100"),
                Bytes::from("x"),
                Bytes::from("7"),
                Bytes::from("ERR inner"),
            ])
        );
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_decode_nesting_limit() {
        let mut input = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert!(matches!(decode(&input), Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_unknown_prefix_is_permanent() {
        assert_eq!(decode(b"#bad\r\n"), Err(ParseError::UnknownPrefix(b'#')));
        assert_eq!(decode(b"#"), Err(ParseError::UnknownPrefix(b'#')));
        assert_eq!(
            decode(b"#bad\r\n+OK\r\n$3\r\nfoo\r\n"),
            Err(ParseError::UnknownPrefix(b'#'))
        );
        assert!(matches!(
            decode(b"*2\r\n$1\r\na\r\n?x\r\n"),
            Err(ParseError::UnknownPrefix(b'?'))
        ));
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let (reply, consumed) = decode(b"+OK\r\n+EXTRA\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Status("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_request_round_trip() {
        let cases: [&[&[u8]]; 4] = [
            &[b"PING"],
            &[b"SET", b"foo", b"bar"],
            &[b"SET", b"", b"\x00\xff\r\n"],
            &[b"", b"", b""],
        ];
        for args in cases {
            let encoded = encode(args);
            let (reply, consumed) = decode(&encoded).unwrap().unwrap();
            let expected: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a)).collect();
            assert_eq!(reply, Reply::Array(expected));
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_fragmentation_invariance() {
        let replies: [&[u8]; 6] = [
            b"+OK\r\n",
            b"-ERR bad thing\r\n",
            b":-12345\r\n",
            b"$12\r\nhello\r\nworld\r\n",
            b"$-1\r\n",
            b"*4\r\n$3\r\nfoo\r\n$-1\r\n:9\r\n*1\r\n+in\r\n",
        ];

        for input in replies {
            let whole = decode(input).unwrap();
            assert!(whole.is_some());

            // every two-chunk split
            for cut in 1..input.len() {
                assert_eq!(feed(input, &[cut]).unwrap(), whole, "cut at {}", cut);
            }

            // one byte at a time
            let cuts: Vec<usize> = (1..input.len()).collect();
            assert_eq!(feed(input, &cuts).unwrap(), whole);
        }
    }
}
