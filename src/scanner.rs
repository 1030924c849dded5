//! Scans an input string (a pipeline diagram) character by character.

use std::path::Path;

#[derive(Debug)]
pub struct ParseError {
    pub msg: String,
    pub ofs: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.msg, self.ofs)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Scanner<'a> {
    buf: &'a [u8],
    pub ofs: usize,
    pub line: usize,
}

impl<'a> Scanner<'a> {
    /// The buffer must be valid UTF-8 and end with a nul byte, which is used
    /// as the end-of-input sentinel.
    pub fn new(buf: &'a [u8]) -> Self {
        if !buf.ends_with(b"\0") {
            panic!("Scanner requires nul-terminated buf");
        }
        Scanner {
            buf,
            ofs: 0,
            line: 1,
        }
    }

    /// Callers only slice at ASCII delimiters, so the slice is valid UTF-8
    /// whenever the buffer is.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.buf[start..end]).unwrap_or("")
    }
    pub fn peek(&self) -> char {
        self.buf[self.ofs] as char
    }
    pub fn peek_at(&self, n: usize) -> char {
        match self.buf.get(self.ofs + n) {
            Some(&c) => c as char,
            None => '\0',
        }
    }
    /// Whether the unread input starts with `s`.
    pub fn peek_str(&self, s: &str) -> bool {
        self.buf[self.ofs..].starts_with(s.as_bytes())
    }
    pub fn next(&mut self) {
        if self.peek() == '\n' {
            self.line += 1;
        }
        if self.ofs == self.buf.len() - 1 {
            panic!("scanned past end")
        }
        self.ofs += 1;
    }
    pub fn back(&mut self) {
        if self.ofs == 0 {
            panic!("back at start")
        }
        self.ofs -= 1;
        if self.peek() == '\n' {
            self.line -= 1;
        }
    }
    pub fn read(&mut self) -> char {
        let c = self.peek();
        if c != '\0' {
            self.next();
        }
        c
    }
    pub fn skip(&mut self, ch: char) -> bool {
        if self.peek() == ch {
            self.next();
            return true;
        }
        false
    }
    pub fn skip_str(&mut self, s: &str) -> bool {
        if !self.peek_str(s) {
            return false;
        }
        for _ in 0..s.len() {
            self.next();
        }
        true
    }

    /// Skips spaces and tabs, but not line breaks.
    pub fn skip_spaces(&mut self) {
        while self.skip(' ') || self.skip('\t') || self.skip('\r') {}
    }

    pub fn expect(&mut self, ch: char) -> ParseResult<()> {
        let r = self.read();
        if r != ch {
            if r != '\0' {
                self.back();
            }
            return self.parse_error(format!("expected {:?}, got {:?}", ch, r));
        }
        Ok(())
    }

    pub fn parse_error<T, S: Into<String>>(&self, msg: S) -> ParseResult<T> {
        Err(ParseError {
            msg: msg.into(),
            ofs: self.ofs,
        })
    }

    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        let mut ofs = 0;
        let lines = self.buf.split(|&c| c == b'\n');
        for (line_number, line) in lines.enumerate() {
            if ofs + line.len() >= err.ofs {
                let mut msg = "parse error: ".to_string();
                msg.push_str(&err.msg);
                msg.push('\n');

                let prefix = format!("{}:{}: ", filename.display(), line_number + 1);
                msg.push_str(&prefix);

                let line = String::from_utf8_lossy(line);
                let line = line.trim_end_matches('\0');
                let mut context: Vec<char> = line.chars().collect();
                let mut col = (err.ofs - ofs).min(context.len());
                if col > 40 {
                    // Trim beginning of line to fit it on screen.
                    msg.push_str("...");
                    context.drain(..col - 20);
                    col = 3 + 20;
                }
                if context.len() > 40 {
                    context.truncate(40);
                    msg.extend(context.iter());
                    msg.push_str("...");
                } else {
                    msg.extend(context.iter());
                }
                msg.push('\n');

                msg.push_str(&" ".repeat(prefix.len() + col));
                msg.push_str("^\n");
                return msg;
            }
            ofs += line.len() + 1;
        }
        format!("parse error: {}\n{}\n", err.msg, filename.display())
    }
}
