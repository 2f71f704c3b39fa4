//! Minimal MPD line codec for the verbs the `mpd` crate does not cover
//! (`add` on a directory, bare `listplaylist`).
//!
//! A command is one line, `verb "arg" "arg"\n`. The response is a run of
//! `key: value` lines terminated by `OK`, or a single
//! `ACK [code@index] {command} message` line.

use crate::error::{TransportError, TransportResult};
use std::io::{self, BufRead, Write};
use tracing::debug;

pub type Pairs = Vec<(String, String)>;

/// Request/response channel over any buffered reader/writer pair.
pub struct RawChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> RawChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Sends one command and collects the key/value pairs of its response.
    ///
    /// The response is always read up to its `OK` or `ACK`, even past a
    /// malformed line, so the next command starts on a clean stream.
    pub fn command(&mut self, verb: &str, args: &[&str]) -> TransportResult<Pairs> {
        let line = encode(verb, args);
        debug!(command = %line.trim_end(), "mpd raw");
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut pairs = Vec::new();
        let mut malformed: Option<String> = None;
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Err(TransportError::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "daemon closed the connection",
                )));
            }
            let line = buf.trim_end_matches(['\r', '\n']);
            if line == "OK" {
                return match malformed {
                    Some(bad) => Err(TransportError::Protocol(format!("unexpected line: {bad}"))),
                    None => Ok(pairs),
                };
            }
            if line.starts_with("ACK ") {
                let (code, message) = parse_ack(line);
                return Err(TransportError::rejected(code, message));
            }
            match line.split_once(": ") {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None if malformed.is_none() => malformed = Some(line.to_string()),
                None => {}
            }
        }
    }
}

pub fn encode(verb: &str, args: &[&str]) -> String {
    let mut line = String::from(verb);
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg));
    }
    line.push('\n');
    line
}

/// Double-quotes an argument, escaping `"` and `\`.
pub fn quote(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `ACK [50@0] {listplaylist} No such playlist` -> `(Some(50), "No such playlist")`
pub fn parse_ack(line: &str) -> (Option<u16>, String) {
    let rest = line.trim_start_matches("ACK ").trim();
    let code = rest
        .strip_prefix('[')
        .and_then(|r| r.split_once('@'))
        .and_then(|(code, _)| code.parse().ok());
    let message = match rest.find("} ") {
        Some(idx) => rest[idx + 2..].to_string(),
        None => rest.to_string(),
    };
    (code, message)
}

/// `listplaylist` answers with bare `file:` lines.
pub fn parse_uris(pairs: Pairs) -> Vec<String> {
    pairs
        .into_iter()
        .filter(|(k, _)| k == "file")
        .map(|(_, v)| v)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn channel(response: &str) -> RawChannel<Cursor<Vec<u8>>, Vec<u8>> {
        RawChannel::new(Cursor::new(response.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
        assert_eq!(encode("addtagid", &["7", "title", "Radio 1"]), "addtagid \"7\" \"title\" \"Radio 1\"\n");
    }

    #[test]
    fn test_command_collects_pairs() {
        let mut ch = channel("file: a.mp3\nfile: b/c.flac\nOK\n");
        let pairs = ch.command("listplaylist", &["定期播放"]).unwrap();
        assert_eq!(parse_uris(pairs), vec!["a.mp3", "b/c.flac"]);
        assert_eq!(String::from_utf8(ch.writer).unwrap(), "listplaylist \"定期播放\"\n");
    }

    #[test]
    fn test_command_maps_ack() {
        let mut ch = channel("ACK [50@0] {listplaylist} No such playlist\n");
        match ch.command("listplaylist", &["missing"]) {
            Err(TransportError::Rejected { code, message }) => {
                assert_eq!(code, Some(50));
                assert_eq!(message, "No such playlist");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_is_connection_error() {
        let mut ch = channel("file: a.mp3\n");
        let err = ch.command("listplaylist", &["x"]).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_malformed_line_does_not_desync() {
        let mut ch = channel("garbage\nfile: stale.mp3\nOK\nfile: fresh.mp3\nOK\n");
        match ch.command("listplaylist", &["P"]) {
            Err(TransportError::Protocol(message)) => assert!(message.contains("garbage")),
            other => panic!("expected protocol error, got {:?}", other),
        }
        let pairs = ch.command("listplaylist", &["P"]).unwrap();
        assert_eq!(parse_uris(pairs), vec!["fresh.mp3"]);
    }

    #[test]
    fn test_malformed_line_then_ack_reports_ack() {
        let mut ch = channel("garbage\nACK [50@0] {listplaylist} No such playlist\nfile: next.mp3\nOK\n");
        assert!(matches!(
            ch.command("listplaylist", &["P"]),
            Err(TransportError::Rejected { code: Some(50), .. })
        ));
        assert_eq!(parse_uris(ch.command("listplaylist", &["Q"]).unwrap()), vec!["next.mp3"]);
    }
}
