//! Line splitting for child process output.

use std::io::{self, BufRead, BufReader, Read};

/// One line of child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Content without its terminator
    pub text: String,
    /// `\n`, `\r\n`, or empty for a trailing unterminated line
    pub terminator: &'static [u8],
}

impl Line {
    pub fn is_terminated(&self) -> bool {
        !self.terminator.is_empty()
    }

    /// Text plus the original terminator
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.text.into_bytes();
        bytes.extend_from_slice(self.terminator);
        bytes
    }
}

/// Iterator over the lines of a byte stream
///
/// Invalid UTF-8 is replaced lossily. The terminator is split off into
/// `Line::terminator` and a trailing unterminated line is still yielded.
pub struct LineSplitter<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> LineSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }
}

impl<R: Read> Iterator for LineSplitter<R> {
    type Item = io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let terminator: &'static [u8] = if self.buf.ends_with(b"\r\n") {
                    b"\r\n"
                } else if self.buf.ends_with(b"\n") {
                    b"\n"
                } else {
                    b""
                };
                self.buf.truncate(self.buf.len() - terminator.len());
                Some(Ok(Line {
                    text: String::from_utf8_lossy(&self.buf).into_owned(),
                    terminator,
                }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(input: &[u8]) -> Vec<String> {
        LineSplitter::new(input).map(|l| l.unwrap().text).collect()
    }

    #[test]
    fn test_splits_and_strips_terminators() {
        assert_eq!(split(b"a\nb\r\nc\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keeps_trailing_partial_line() {
        assert_eq!(split(b"first\nsecond"), vec!["first", "second"]);
    }

    #[test]
    fn test_records_terminators() {
        let lines: Vec<Line> = LineSplitter::new(&b"a\r\nb\nc"[..])
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines[0].terminator, b"\r\n");
        assert_eq!(lines[1].terminator, b"\n");
        assert!(!lines[2].is_terminated());
    }

    #[test]
    fn test_bytes_round_trip() {
        let input = b"one\r\ntwo\n\nthree";
        let out: Vec<u8> = LineSplitter::new(&input[..])
            .flat_map(|l| l.unwrap().into_bytes())
            .collect();
        assert_eq!(out, input);
    }

    #[test]
    fn test_keeps_empty_lines() {
        assert_eq!(split(b"\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn test_lossy_utf8() {
        let lines = split(b"ok \xff\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }
}
