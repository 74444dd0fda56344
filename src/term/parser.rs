//! KIF-like term parser: a `logos` lexer feeding a recursive-descent reader,
//! the same pairing used for the expression grammar in
//! `parser/lexer.rs` + `parser/grammar/kerml_expressions`, rather than the
//! full `pest`/`rowan` machinery used for the SysML CST — there is no
//! concrete-syntax-tree requirement here (see DESIGN.md).

use super::Term;
use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
enum Tok {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,
    #[regex(r#"\?[^\s()";]+"#)]
    Variable,
    #[regex(r#"[^\s()";?][^\s()";]*"#)]
    Symbol,
}

/// A parse error with the line/column it occurred at (spec.md §4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at line {line}, column {column}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("unclosed list")]
    UnclosedList,
    #[error("unexpected ')'")]
    UnmatchedRParen,
    #[error("invalid token {0:?}")]
    InvalidToken(String),
    #[error("invalid string escape in {0:?}")]
    InvalidEscape(String),
    #[error("empty variable name")]
    EmptyVariable,
}

struct LineIndex {
    /// Byte offset of the start of each line.
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        LineIndex { starts }
    }

    /// 1-based line, 1-based column for a byte offset.
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = offset - self.starts[line_idx] + 1;
        (line_idx + 1, col)
    }
}

/// Parse the first top-level term in `input`.
pub fn parse_one(input: &str) -> Result<Term, ParseError> {
    let mut terms = parse_all(input)?;
    if terms.is_empty() {
        return Err(ParseError {
            line: 1,
            column: 1,
            kind: ParseErrorKind::UnexpectedEof { expected: "a term" },
        });
    }
    Ok(terms.remove(0))
}

/// Parse every top-level term in `input`.
pub fn parse_all(input: &str) -> Result<Vec<Term>, ParseError> {
    let index = LineIndex::new(input);
    let mut lexer = Tok::lexer(input);
    let mut tokens: Vec<(Tok, &str, usize)> = Vec::new();
    while let Some(tok) = lexer.next() {
        match tok {
            Ok(t) => tokens.push((t, lexer.slice(), lexer.span().start)),
            Err(()) => {
                let (line, column) = index.line_col(lexer.span().start);
                return Err(ParseError {
                    line,
                    column,
                    kind: ParseErrorKind::InvalidToken(lexer.slice().to_string()),
                });
            }
        }
    }

    let mut reader = Reader {
        tokens: &tokens,
        pos: 0,
        index: &index,
    };
    let mut out = Vec::new();
    while reader.pos < reader.tokens.len() {
        out.push(reader.read_term()?);
    }
    Ok(out)
}

struct Reader<'a> {
    tokens: &'a [(Tok, &'a str, usize)],
    pos: usize,
    index: &'a LineIndex,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<&(Tok, &'a str, usize)> {
        self.tokens.get(self.pos)
    }

    fn err_at(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
        let (line, column) = self.index.line_col(offset);
        ParseError { line, column, kind }
    }

    fn eof_err(&self, expected: &'static str) -> ParseError {
        let offset = self.tokens.last().map(|(_, s, o)| o + s.len()).unwrap_or(0);
        self.err_at(offset, ParseErrorKind::UnexpectedEof { expected })
    }

    fn read_term(&mut self) -> Result<Term, ParseError> {
        let (tok, text, offset) = *self.peek().ok_or_else(|| self.eof_err("a term"))?;
        match tok {
            Tok::LParen => self.read_list(),
            Tok::RParen => Err(self.err_at(offset, ParseErrorKind::UnmatchedRParen)),
            Tok::Str => {
                self.pos += 1;
                Ok(Term::string_atom(&unescape(text, self, offset)?))
            }
            Tok::Variable => {
                self.pos += 1;
                if text.len() <= 1 {
                    return Err(self.err_at(offset, ParseErrorKind::EmptyVariable));
                }
                Ok(Term::var(text))
            }
            Tok::Symbol => {
                self.pos += 1;
                Ok(classify_symbol(text))
            }
        }
    }

    fn read_list(&mut self) -> Result<Term, ParseError> {
        let open_offset = self.peek().unwrap().2;
        self.pos += 1; // consume '('
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.err_at(open_offset, ParseErrorKind::UnclosedList)),
                Some((Tok::RParen, _, _)) => {
                    self.pos += 1;
                    return Ok(Term::list(items));
                }
                _ => items.push(self.read_term()?),
            }
        }
    }
}

fn classify_symbol(text: &str) -> Term {
    if is_number_literal(text) {
        Term::number_atom(text)
    } else {
        Term::atom(text)
    }
}

fn is_number_literal(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    if body.is_empty() || !body.chars().next().unwrap().is_ascii_digit() {
        return false;
    }
    body.parse::<f64>().is_ok()
}

fn unescape(text: &str, reader: &Reader, offset: usize) -> Result<String, ParseError> {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            _ => return Err(reader.err_at(offset, ParseErrorKind::InvalidEscape(text.to_string()))),
        }
    }
    Ok(out)
}
