//! Parser for flowchart pipeline diagrams.
//!
//! The parser only produces a tree of declarations; it knows nothing about
//! what node ids mean.  A statement that fails to parse is recorded as a
//! `Declaration::Malformed` and parsing resumes at the next statement, so one
//! bad line never loses the rest of the diagram.  Only a document without a
//! `graph`/`flowchart` header is rejected outright.

use crate::scanner::{ParseError, ParseResult, Scanner};
use std::path::Path;

/// Brackets surrounding a node label.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `[text]`
    Square,
    /// `(text)`
    Round,
    /// `{text}`
    Diamond,
    /// `([text])`
    Stadium,
    /// `[[text]]`
    Subroutine,
    /// `((text))`
    Circle,
}

impl Shape {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Shape::Square => ("[", "]"),
            Shape::Round => ("(", ")"),
            Shape::Diamond => ("{", "}"),
            Shape::Stadium => ("([", "])"),
            Shape::Subroutine => ("[[", "]]"),
            Shape::Circle => ("((", "))"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub shape: Shape,
    /// Label text between the brackets, verbatim.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub line: usize,
    pub id: String,
    pub shape: Option<NodeShape>,
}

/// An arrow between two nodes.  `children` holds the raw tokens in source
/// order: source id, arrow, optional `|label|`, destination id.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDecl {
    pub line: usize,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Node(NodeDecl),
    Edge(EdgeDecl),
    /// `classDef name props`
    ClassDef { name: String, props: String },
    /// `class A,B name`
    ClassAssign { nodes: Vec<String>, class: String },
    Malformed { line: usize, msg: String },
}

#[derive(Debug, Default)]
pub struct Diagram {
    pub direction: String,
    /// Raw text of a `%%{ ... }%%` directive, if any.
    pub init: Option<String>,
    pub declarations: Vec<Declaration>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_arrow_char(c: char) -> bool {
    matches!(c, '-' | '.' | '=' | '>')
}

fn is_statement_end(c: char) -> bool {
    matches!(c, '\0' | '\n' | ';')
}

pub struct Parser<'text> {
    scanner: Scanner<'text>,
}

impl<'text> Parser<'text> {
    pub fn new(buf: &'text [u8]) -> Parser<'text> {
        Parser {
            scanner: Scanner::new(buf),
        }
    }

    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        self.scanner.format_parse_error(filename, err)
    }

    /// Reads the whole diagram.  Errors only on a missing header.
    pub fn read(&mut self) -> ParseResult<Diagram> {
        let mut diagram = Diagram::default();
        self.skip_trivia(&mut diagram)?;
        let header = self.read_ident()?;
        if header != "graph" && header != "flowchart" {
            return self.scanner.parse_error(format!(
                "expected 'graph' or 'flowchart' header, got {:?}",
                header
            ));
        }
        self.scanner.skip_spaces();
        diagram.direction = match self.scanner.peek() {
            c if is_ident_char(c) => self.read_ident()?.to_owned(),
            _ => "TD".to_owned(),
        };
        self.scanner.skip_spaces();
        if !is_statement_end(self.scanner.peek()) {
            return self.scanner.parse_error("unexpected text after diagram header");
        }

        loop {
            self.skip_trivia(&mut diagram)?;
            if self.scanner.peek() == '\0' {
                break;
            }
            let line = self.scanner.line;
            let mut decls = Vec::new();
            match self.read_statement(&mut decls) {
                Ok(()) => diagram.declarations.extend(decls),
                Err(err) => {
                    diagram
                        .declarations
                        .push(Declaration::Malformed { line, msg: err.msg });
                    self.skip_statement();
                }
            }
        }
        Ok(diagram)
    }

    /// Skips whitespace, statement separators, comments and directives.
    fn skip_trivia(&mut self, diagram: &mut Diagram) -> ParseResult<()> {
        loop {
            match self.scanner.peek() {
                ' ' | '\t' | '\r' | '\n' | ';' => self.scanner.next(),
                '%' if self.scanner.peek_at(1) == '%' => {
                    if self.scanner.peek_at(2) == '{' {
                        diagram.init = Some(self.read_directive()?);
                    } else {
                        self.skip_comment();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) {
        loop {
            match self.scanner.read() {
                '\0' | '\n' => return,
                _ => {}
            }
        }
    }

    fn read_directive(&mut self) -> ParseResult<String> {
        self.scanner.skip_str("%%{");
        let start = self.scanner.ofs;
        loop {
            if self.scanner.peek_str("}%%") {
                let text = self.scanner.slice(start, self.scanner.ofs).trim().to_owned();
                self.scanner.skip_str("}%%");
                return Ok(text);
            }
            if self.scanner.read() == '\0' {
                return self.scanner.parse_error("unterminated %%{ directive");
            }
        }
    }

    /// Skips to the start of the next statement after an error.
    fn skip_statement(&mut self) {
        while !is_statement_end(self.scanner.peek()) {
            self.scanner.next();
        }
    }

    fn expect_statement_end(&mut self) -> ParseResult<()> {
        self.scanner.skip_spaces();
        if self.scanner.peek_str("%%") {
            self.skip_comment();
            return Ok(());
        }
        match self.scanner.peek() {
            c if is_statement_end(c) => Ok(()),
            c => self
                .scanner
                .parse_error(format!("unexpected character {:?}", c)),
        }
    }

    fn read_statement(&mut self, decls: &mut Vec<Declaration>) -> ParseResult<()> {
        let line = self.scanner.line;
        let ident = self.read_ident()?;
        match ident {
            "classDef" => {
                self.scanner.skip_spaces();
                let name = self.read_ident()?.to_owned();
                let props = self.read_rest()?;
                decls.push(Declaration::ClassDef { name, props });
                Ok(())
            }
            "class" if self.scanner.peek() == ' ' => {
                self.scanner.skip_spaces();
                let mut nodes = vec![self.read_ident()?.to_owned()];
                while self.scanner.skip(',') {
                    self.scanner.skip_spaces();
                    nodes.push(self.read_ident()?.to_owned());
                }
                self.scanner.skip_spaces();
                let class = self.read_ident()?.to_owned();
                decls.push(Declaration::ClassAssign { nodes, class });
                self.expect_statement_end()
            }
            "style" | "linkStyle" if self.scanner.peek() == ' ' => {
                // Purely presentational; nothing downstream reads it.
                self.read_rest()?;
                Ok(())
            }
            id => {
                let id = id.to_owned();
                let shape = self.read_shape()?;
                self.scanner.skip_spaces();
                if is_statement_end(self.scanner.peek()) || self.scanner.peek_str("%%") {
                    decls.push(Declaration::Node(NodeDecl { line, id, shape }));
                    return self.expect_statement_end();
                }
                if shape.is_some() {
                    decls.push(Declaration::Node(NodeDecl {
                        line,
                        id: id.clone(),
                        shape,
                    }));
                }
                self.read_chain(id, decls)
            }
        }
    }

    /// Reads `--> B[..] --> C` following an already-read node reference.
    fn read_chain(&mut self, mut from: String, decls: &mut Vec<Declaration>) -> ParseResult<()> {
        loop {
            self.scanner.skip_spaces();
            if is_statement_end(self.scanner.peek()) || self.scanner.peek_str("%%") {
                return self.expect_statement_end();
            }
            let line = self.scanner.line;
            let arrow = self.read_arrow()?;
            self.scanner.skip_spaces();
            let mut children = vec![from, arrow];
            if self.scanner.peek() == '|' {
                children.push(self.read_edge_label()?);
                self.scanner.skip_spaces();
            }
            let to = self.read_ident()?.to_owned();
            let shape = self.read_shape()?;
            if shape.is_some() {
                decls.push(Declaration::Node(NodeDecl {
                    line,
                    id: to.clone(),
                    shape,
                }));
            }
            children.push(to.clone());
            decls.push(Declaration::Edge(EdgeDecl { line, children }));
            from = to;
        }
    }

    fn read_arrow(&mut self) -> ParseResult<String> {
        let start = self.scanner.ofs;
        while is_arrow_char(self.scanner.peek()) {
            self.scanner.next();
        }
        let arrow = self.scanner.slice(start, self.scanner.ofs);
        let valid = arrow.len() >= 3
            && (arrow.starts_with("--") || arrow.starts_with("==") || arrow.starts_with("-."));
        if !valid {
            self.scanner.ofs = start;
            return self.scanner.parse_error(format!(
                "expected arrow, got {:?}",
                self.scanner.peek()
            ));
        }
        Ok(arrow.to_owned())
    }

    fn read_edge_label(&mut self) -> ParseResult<String> {
        let start = self.scanner.ofs;
        self.scanner.expect('|')?;
        loop {
            match self.scanner.peek() {
                '|' => break,
                '\0' | '\n' => return self.scanner.parse_error("unterminated edge label"),
                _ => self.scanner.next(),
            }
        }
        self.scanner.next();
        Ok(self.scanner.slice(start, self.scanner.ofs).to_owned())
    }

    fn read_shape(&mut self) -> ParseResult<Option<NodeShape>> {
        let shape = match (self.scanner.peek(), self.scanner.peek_at(1)) {
            ('[', '[') => Shape::Subroutine,
            ('[', _) => Shape::Square,
            ('(', '[') => Shape::Stadium,
            ('(', '(') => Shape::Circle,
            ('(', _) => Shape::Round,
            ('{', _) => Shape::Diamond,
            _ => return Ok(None),
        };
        let (open, close) = shape.delimiters();
        self.scanner.skip_str(open);
        let start = self.scanner.ofs;
        // Quotes only delimit text when the label itself is quoted; a bare
        // label may carry stray quotes, as shell commands do.
        let mut lead = 0;
        while self.scanner.peek_at(lead) == ' ' {
            lead += 1;
        }
        let quotable = self.scanner.peek_at(lead) == '"';
        let mut quoted = false;
        loop {
            if !quoted && self.scanner.peek_str(close) {
                break;
            }
            match self.scanner.peek() {
                '\0' | '\n' => {
                    return self
                        .scanner
                        .parse_error(format!("unterminated node shape, expected {:?}", close))
                }
                '"' if quotable => quoted = !quoted,
                _ => {}
            }
            self.scanner.next();
        }
        let mut text = self.scanner.slice(start, self.scanner.ofs);
        self.scanner.skip_str(close);
        let trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            text = &trimmed[1..trimmed.len() - 1];
        }
        Ok(Some(NodeShape {
            shape,
            text: text.to_owned(),
        }))
    }

    /// Reads the remainder of a statement, trimmed.
    fn read_rest(&mut self) -> ParseResult<String> {
        let start = self.scanner.ofs;
        self.skip_statement();
        Ok(self.scanner.slice(start, self.scanner.ofs).trim().to_owned())
    }

    fn read_ident(&mut self) -> ParseResult<&'text str> {
        let start = self.scanner.ofs;
        while is_ident_char(self.scanner.peek()) {
            self.scanner.next();
        }
        let end = self.scanner.ofs;
        if end == start {
            return self.scanner.parse_error(format!(
                "expected identifier, got {:?}",
                self.scanner.peek()
            ));
        }
        Ok(self.scanner.slice(start, end))
    }
}

/// Parses diagram text, formatting any fatal error against `filename`.
pub fn parse(filename: &Path, text: &str) -> anyhow::Result<Diagram> {
    // The scanner treats NUL as end of input.
    if let Some(pos) = text.find('\0') {
        let line = text[..pos].matches('\n').count() + 1;
        anyhow::bail!("{}:{}: unexpected NUL byte", filename.display(), line);
    }
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    let mut parser = Parser::new(&buf);
    match parser.read() {
        Ok(diagram) => Ok(diagram),
        Err(err) => anyhow::bail!(parser.format_parse_error(filename, err)),
    }
}
