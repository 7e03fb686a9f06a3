//! Parser for projections of the form `.[] | [.a, .b[].c, .d["X-Key"]]`.

use crate::error::ProjectionError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member access (`.name` or `["name"]`).
    Key(String),
    /// Array iteration (`[]`).
    Iter,
}

/// A parsed record projection: every top-level record is mapped to one or more rows whose
/// columns are the listed paths, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    columns: Vec<Vec<Segment>>,
    source: String,
}

impl Projection {
    pub fn columns(&self) -> &[Vec<Segment>] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Projection {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut p = Parser { src: s, pos: 0 };
        p.skip_ws();
        p.expect('.')?;
        p.skip_ws();
        p.expect('[')?;
        p.skip_ws();
        p.expect(']')?;
        p.skip_ws();
        p.expect('|')?;
        p.skip_ws();
        p.expect('[')?;

        let mut columns = Vec::new();
        loop {
            p.skip_ws();
            columns.push(p.path()?);
            p.skip_ws();
            match p.peek() {
                Some(',') => p.bump(','),
                Some(']') => {
                    p.bump(']');
                    break;
                }
                Some(c) => return Err(ProjectionError::new(p.pos, format!("expected ',' or ']', found '{}'", c))),
                None => return Err(ProjectionError::new(p.pos, "unterminated column list")),
            }
        }
        p.skip_ws();
        if p.pos < s.len() {
            return Err(ProjectionError::new(p.pos, "trailing input after column list"));
        }
        Ok(Projection { columns, source: s.trim().to_string() })
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump(c);
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ProjectionError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump(c);
                Ok(())
            }
            Some(c) => Err(ProjectionError::new(self.pos, format!("expected '{}', found '{}'", want, c))),
            None => Err(ProjectionError::new(self.pos, format!("expected '{}', found end of input", want))),
        }
    }

    /// `.` alone is the identity path; otherwise a chain of member/iterate segments.
    fn path(&mut self) -> Result<Vec<Segment>, ProjectionError> {
        self.expect('.')?;
        let mut segments = Vec::new();
        match self.peek() {
            Some(c) if is_ident(c) => segments.push(Segment::Key(self.ident())),
            Some('[') => segments.push(self.bracket()?),
            _ => return Ok(segments),
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump('.');
                    match self.peek() {
                        Some(c) if is_ident(c) => segments.push(Segment::Key(self.ident())),
                        Some('[') => segments.push(self.bracket()?),
                        _ => return Err(ProjectionError::new(self.pos, "expected field name after '.'")),
                    }
                }
                Some('[') => segments.push(self.bracket()?),
                _ => return Ok(segments),
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident(c) {
                break;
            }
            self.bump(c);
        }
        self.src[start..self.pos].to_string()
    }

    fn bracket(&mut self) -> Result<Segment, ProjectionError> {
        self.expect('[')?;
        self.skip_ws();
        let seg = match self.peek() {
            Some(']') => Segment::Iter,
            Some('"') => Segment::Key(self.quoted()?),
            Some(c) => return Err(ProjectionError::new(self.pos, format!("unsupported subscript starting with '{}'", c))),
            None => return Err(ProjectionError::new(self.pos, "unterminated subscript")),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(seg)
    }

    fn quoted(&mut self) -> Result<String, ProjectionError> {
        let start = self.pos;
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump('"');
                    return Ok(out);
                }
                Some('\\') => {
                    self.bump('\\');
                    match self.peek() {
                        Some(c @ ('"' | '\\')) => {
                            out.push(c);
                            self.bump(c);
                        }
                        _ => return Err(ProjectionError::new(self.pos, "unsupported escape in key")),
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump(c);
                }
                None => return Err(ProjectionError::new(start, "unterminated string key")),
            }
        }
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
