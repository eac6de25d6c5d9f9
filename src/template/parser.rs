//! Template syntax tree
//!
//! Supported statements: `if` / `elsif` / `else` / `end` and
//! `each <expr> as <name>` / `end`. Expressions are variable paths
//! (`a.b[0]["c"]`), literals and `partial("name", key: expr, ...)`.

use std::ops::Range;

use crate::error::RenderErrorKind;

use super::lexer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(Range<usize>),
    Output(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Each {
        items: Expr,
        var: String,
        body: Vec<Node>,
    },
}

/// A path segment after the root variable
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.field` or `["field"]`
    Field(String),
    /// `[0]`
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path {
        root: String,
        segments: Vec<Segment>,
        position: usize,
    },
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Partial {
        name: String,
        locals: Vec<(String, Expr)>,
        position: usize,
    },
}

/// Build the syntax tree for a tokenized template
pub fn parse(src: &str, tokens: &[Token]) -> Result<Vec<Node>, RenderErrorKind> {
    let mut stream = tokens.iter().peekable();
    let (nodes, terminator) = parse_block(src, &mut stream)?;
    match terminator {
        None => Ok(nodes),
        Some((stmt, position)) => Err(syntax(position, format!("unexpected '{}'", stmt.keyword()))),
    }
}

/// Block-closing statements
#[derive(Debug)]
enum Terminator {
    Elsif(Expr),
    Else,
    End,
}

impl Terminator {
    fn keyword(&self) -> &'static str {
        match self {
            Terminator::Elsif(_) => "elsif",
            Terminator::Else => "else",
            Terminator::End => "end",
        }
    }
}

type TokenStream<'a> = std::iter::Peekable<std::slice::Iter<'a, Token>>;

fn parse_block(
    src: &str,
    stream: &mut TokenStream<'_>,
) -> Result<(Vec<Node>, Option<(Terminator, usize)>), RenderErrorKind> {
    let mut nodes = Vec::new();

    while let Some(token) = stream.next() {
        match token {
            Token::Literal(range) => nodes.push(Node::Text(range.clone())),
            Token::Output(range) => nodes.push(Node::Output(parse_expr(src, range.clone())?)),
            Token::Code(range) => {
                let code = &src[range.clone()];
                let trimmed = code.trim();
                let position = range.start + (code.len() - code.trim_start().len());
                let (keyword, rest) = split_keyword(trimmed);
                let rest_range = position + keyword.len()..position + trimmed.len();

                match keyword {
                    "if" => nodes.push(parse_if(src, stream, rest_range, position)?),
                    "each" => nodes.push(parse_each(src, stream, rest, rest_range, position)?),
                    "elsif" => {
                        let cond = parse_expr(src, rest_range)?;
                        return Ok((nodes, Some((Terminator::Elsif(cond), position))));
                    }
                    "else" if rest.is_empty() => {
                        return Ok((nodes, Some((Terminator::Else, position))));
                    }
                    "end" if rest.is_empty() => {
                        return Ok((nodes, Some((Terminator::End, position))));
                    }
                    "" => {}
                    _ => {
                        return Err(syntax(
                            position,
                            format!("unsupported statement '{}'", trimmed),
                        ))
                    }
                }
            }
        }
    }

    Ok((nodes, None))
}

fn parse_if(
    src: &str,
    stream: &mut TokenStream<'_>,
    cond_range: Range<usize>,
    position: usize,
) -> Result<Node, RenderErrorKind> {
    let mut branches = Vec::new();
    let mut cond = parse_expr(src, cond_range)?;

    loop {
        let (body, terminator) = parse_block(src, stream)?;
        match terminator {
            Some((Terminator::Elsif(next), _)) => {
                branches.push((cond, body));
                cond = next;
            }
            Some((Terminator::Else, else_pos)) => {
                branches.push((cond, body));
                let (otherwise, terminator) = parse_block(src, stream)?;
                return match terminator {
                    Some((Terminator::End, _)) => Ok(Node::If { branches, otherwise }),
                    Some((t, pos)) => Err(syntax(pos, format!("unexpected '{}' after else", t.keyword()))),
                    None => Err(syntax(else_pos, "missing 'end' for 'if'")),
                };
            }
            Some((Terminator::End, _)) => {
                branches.push((cond, body));
                return Ok(Node::If {
                    branches,
                    otherwise: Vec::new(),
                });
            }
            None => return Err(syntax(position, "missing 'end' for 'if'")),
        }
    }
}

fn parse_each(
    src: &str,
    stream: &mut TokenStream<'_>,
    rest: &str,
    rest_range: Range<usize>,
    position: usize,
) -> Result<Node, RenderErrorKind> {
    let as_pos = rest
        .rfind(" as ")
        .ok_or_else(|| syntax(position, "expected 'each <expr> as <name>'"))?;
    let var = rest[as_pos + 4..].trim();
    if !is_ident(var) {
        return Err(syntax(position, format!("invalid loop variable '{}'", var)));
    }
    // rest is rest_range trimmed on the left by split_keyword
    let lead = src[rest_range.clone()].len() - src[rest_range.clone()].trim_start().len();
    let items_range = rest_range.start + lead..rest_range.start + lead + as_pos;
    let items = parse_expr(src, items_range)?;

    let (body, terminator) = parse_block(src, stream)?;
    match terminator {
        Some((Terminator::End, _)) => Ok(Node::Each {
            items,
            var: var.to_string(),
            body,
        }),
        Some((t, pos)) => Err(syntax(pos, format!("unexpected '{}' inside 'each'", t.keyword()))),
        None => Err(syntax(position, "missing 'end' for 'each'")),
    }
}

fn split_keyword(code: &str) -> (&str, &str) {
    match code.find(char::is_whitespace) {
        Some(idx) => (&code[..idx], code[idx..].trim()),
        None => (code, ""),
    }
}

fn syntax(position: usize, details: impl Into<String>) -> RenderErrorKind {
    RenderErrorKind::Syntax {
        position,
        details: details.into(),
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Parse the expression in `src[range]`
pub fn parse_expr(src: &str, range: Range<usize>) -> Result<Expr, RenderErrorKind> {
    let mut cursor = Cursor {
        src: &src[range.clone()],
        pos: 0,
        base: range.start,
    };
    cursor.skip_ws();
    if cursor.at_end() {
        return Err(syntax(range.start, "empty expression"));
    }
    let expr = cursor.expr()?;
    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(syntax(
            cursor.abs(),
            format!("unexpected '{}'", &cursor.src[cursor.pos..]),
        ));
    }
    Ok(expr)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    fn abs(&self) -> usize {
        self.base + self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), RenderErrorKind> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(syntax(self.abs(), format!("expected '{}'", expected)))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expr(&mut self) -> Result<Expr, RenderErrorKind> {
        self.skip_ws();
        let start = self.abs();
        match self.peek() {
            Some('"') | Some('\'') => Ok(Expr::Str(self.string()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => self.int(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let ident = self.ident();
                match ident {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    "nil" | "null" => Ok(Expr::Nil),
                    "partial" => self.partial(start),
                    _ => {
                        let root = ident.to_string();
                        let segments = self.segments()?;
                        Ok(Expr::Path {
                            root,
                            segments,
                            position: start,
                        })
                    }
                }
            }
            Some(c) => Err(syntax(start, format!("unexpected '{}'", c))),
            None => Err(syntax(start, "unexpected end of expression")),
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn int(&mut self) -> Result<Expr, RenderErrorKind> {
        let start = self.pos;
        self.eat('-');
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map(Expr::Int)
            .map_err(|_| syntax(self.base + start, "invalid integer"))
    }

    fn string(&mut self) -> Result<String, RenderErrorKind> {
        let start = self.abs();
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(syntax(start, "unterminated string"))
    }

    fn segments(&mut self) -> Result<Vec<Segment>, RenderErrorKind> {
        let mut segments = Vec::new();
        loop {
            if self.eat('.') {
                let field = self.ident();
                if field.is_empty() {
                    return Err(syntax(self.abs(), "expected field name after '.'"));
                }
                segments.push(Segment::Field(field.to_string()));
            } else if self.eat('[') {
                self.skip_ws();
                let segment = match self.peek() {
                    Some('"') | Some('\'') => Segment::Field(self.string()?),
                    Some(c) if c.is_ascii_digit() => match self.int()? {
                        Expr::Int(n) => Segment::Index(n as usize),
                        _ => unreachable!("int() only returns Expr::Int"),
                    },
                    _ => return Err(syntax(self.abs(), "expected index or quoted key")),
                };
                self.expect(']')?;
                segments.push(segment);
            } else {
                return Ok(segments);
            }
        }
    }

    /// `partial("name", key: expr, ...)` or `partial "name", key: expr`
    fn partial(&mut self, position: usize) -> Result<Expr, RenderErrorKind> {
        self.skip_ws();
        let parens = self.eat('(');
        self.skip_ws();
        if !matches!(self.peek(), Some('"') | Some('\'')) {
            return Err(syntax(self.abs(), "partial name must be a quoted string"));
        }
        let name = self.string()?;

        let mut locals = Vec::new();
        loop {
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
            self.skip_ws();
            let key_pos = self.abs();
            let key = self.ident().to_string();
            if key.is_empty() {
                return Err(syntax(key_pos, "expected local name"));
            }
            self.expect(':')?;
            let value = self.expr()?;
            locals.push((key, value));
        }

        if parens {
            self.expect(')')?;
        }
        Ok(Expr::Partial {
            name,
            locals,
            position,
        })
    }
}
