/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! A single-pass recursive descent parser over the template source. Markup
//! and curly-brace expressions are recognized together, so a block statement
//! can wrap elements and an element attribute can hold an expression.
//!
//! The parser is forgiving about markup (unclosed elements are
//! closed at end of input) and strict about expressions (every block must be
//! closed by name).

use crate::ast::{
    AttrNode, AttrValue, BlockStatement, CommentNode, ConcatPart, ElementNode, Expression, Hash,
    HashPair, Literal, MustacheStatement, PathExpression, Program, Span, Statement, SubExpression,
    TextNode,
};
use crate::error::{SyntaxError, SyntaxResult};

/// Elements that never have content.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is text (plus expressions), never markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Parser configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Recognize `{{ }}` expressions. When false, braces are plain text.
    pub mustaches: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { mustaches: true }
    }
}

/// Parse template source into a [`Program`].
pub fn parse(source: &str) -> SyntaxResult<Program> {
    parse_with_options(source, ParseOptions::default())
}

/// Parse plain markup, treating curly braces as text.
pub fn parse_markup(source: &str) -> SyntaxResult<Program> {
    parse_with_options(source, ParseOptions { mustaches: false })
}

/// Parse template source with explicit options.
pub fn parse_with_options(source: &str, options: ParseOptions) -> SyntaxResult<Program> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        options,
    };
    let (body, stop) = parser.parse_content(None)?;
    match stop {
        Stop::Eof => Ok(Program {
            body,
            block_params: Vec::new(),
            span: Span::new(0, source.len()),
        }),
        Stop::CloseTag { name, offset } => Err(SyntaxError::Unexpected {
            construct: format!("</{}>", name),
            offset,
        }),
        Stop::CloseBlock { name, offset } => Err(SyntaxError::Unexpected {
            construct: format!("{{{{/{}}}}}", name),
            offset,
        }),
        Stop::Else { offset, .. } => Err(SyntaxError::Unexpected {
            construct: "{{else}}".to_string(),
            offset,
        }),
    }
}

/// Why a content run stopped.
#[derive(Debug)]
enum Stop {
    Eof,
    CloseTag { name: String, offset: usize },
    CloseBlock { name: String, offset: usize },
    Else { chain: Option<BlockHeader>, offset: usize },
}

/// `{{#path params hash as |a b|}}` without its body.
#[derive(Debug)]
struct BlockHeader {
    path: PathExpression,
    params: Vec<Expression>,
    hash: Hash,
    block_params: Vec<String>,
    start: usize,
}

/// Result of scanning one `{{ ... }}` construct.
enum Curly {
    Statement(Statement),
    Stop(Stop),
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    options: ParseOptions,
}

impl<'s> Parser<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eof(&self, expected: &str) -> SyntaxError {
        SyntaxError::UnexpectedEof {
            expected: expected.to_string(),
            offset: self.pos,
        }
    }

    fn mustache_ahead(&self) -> bool {
        self.options.mustaches && self.starts_with("{{")
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Parse statements until end of input or a terminator.
    ///
    /// Inside a raw-text element only text and expressions are recognized,
    /// and the run stops at the matching close tag.
    fn parse_content(&mut self, raw_text: Option<&str>) -> SyntaxResult<(Vec<Statement>, Stop)> {
        let mut body = Vec::new();
        loop {
            if self.at_end() {
                return Ok((body, Stop::Eof));
            }

            if self.mustache_ahead() {
                match self.parse_curly()? {
                    Curly::Statement(statement) => body.push(statement),
                    Curly::Stop(stop) => return Ok((body, stop)),
                }
                continue;
            }

            if let Some(tag) = raw_text {
                if self.at_close_tag(tag) {
                    let offset = self.pos;
                    let name = self.parse_close_tag()?;
                    return Ok((body, Stop::CloseTag { name, offset }));
                }
                let text = self.parse_raw_text(tag);
                body.push(Statement::Text(text));
                continue;
            }

            if self.starts_with("<!--") {
                body.push(self.parse_html_comment()?);
            } else if self.starts_with("</") {
                let offset = self.pos;
                let name = self.parse_close_tag()?;
                return Ok((body, Stop::CloseTag { name, offset }));
            } else if self.starts_with("<!") || self.starts_with("<?") {
                // Doctype and processing instructions carry no content.
                match self.rest().find('>') {
                    Some(end) => self.pos += end + 1,
                    None => return Err(self.eof(">")),
                }
            } else if self.starts_with("<")
                && self.rest()[1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
            {
                body.push(Statement::Element(self.parse_element()?));
            } else {
                body.push(Statement::Text(self.parse_text()));
            }
        }
    }

    fn parse_text(&mut self) -> TextNode {
        let start = self.pos;
        // Always consume at least one character so a lone `<` cannot stall.
        self.bump();
        while !self.at_end() {
            if self.starts_with("<") || self.mustache_ahead() {
                break;
            }
            self.bump();
        }
        TextNode {
            text: decode_entities(&self.src[start..self.pos]),
            span: Span::new(start, self.pos),
        }
    }

    fn parse_raw_text(&mut self, tag: &str) -> TextNode {
        let start = self.pos;
        self.bump();
        while !self.at_end() && !self.mustache_ahead() && !self.at_close_tag(tag) {
            self.bump();
        }
        TextNode {
            text: self.src[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }
    }

    fn at_close_tag(&self, tag: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with("</") {
            return false;
        }
        let name = &rest[2..];
        name.len() >= tag.len()
            && name.is_char_boundary(tag.len())
            && name[..tag.len()].eq_ignore_ascii_case(tag)
            && name[tag.len()..]
                .chars()
                .next()
                .is_none_or(|c| c == '>' || c.is_whitespace())
    }

    fn parse_html_comment(&mut self) -> SyntaxResult<Statement> {
        let start = self.pos;
        self.pos += "<!--".len();
        let Some(end) = self.rest().find("-->") else {
            return Err(self.eof("-->"));
        };
        let text = self.rest()[..end].to_string();
        self.pos += end + "-->".len();
        Ok(Statement::Comment(CommentNode {
            text,
            span: Span::new(start, self.pos),
        }))
    }

    fn parse_close_tag(&mut self) -> SyntaxResult<String> {
        self.pos += "</".len();
        let Some(end) = self.rest().find('>') else {
            return Err(self.eof(">"));
        };
        let name = self.rest()[..end].trim().to_string();
        self.pos += end + 1;
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------

    fn parse_element(&mut self) -> SyntaxResult<ElementNode> {
        let start = self.pos;
        self.pos += 1;
        let tag = self.take_while(|c| !c.is_whitespace() && c != '>' && c != '/');
        let mut attributes = Vec::new();
        let self_closing;

        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if self.starts_with(">") {
                self.pos += 1;
                self_closing = false;
                break;
            }
            if self.at_end() {
                return Err(self.eof(&format!("end of <{}> tag", tag)));
            }
            attributes.push(self.parse_attribute()?);
        }

        let lower = tag.to_ascii_lowercase();
        let mut children = Vec::new();
        if !self_closing && !VOID_ELEMENTS.contains(&lower.as_str()) {
            let raw_text = RAW_TEXT_ELEMENTS.contains(&lower.as_str());
            let (body, stop) = self.parse_content(raw_text.then_some(lower.as_str()))?;
            children = body;
            match stop {
                Stop::Eof => {}
                Stop::CloseTag { name, offset } => {
                    if !name.eq_ignore_ascii_case(&tag) {
                        return Err(SyntaxError::MismatchedTag {
                            expected: tag,
                            found: name,
                            offset,
                        });
                    }
                }
                Stop::CloseBlock { name, offset } => {
                    return Err(SyntaxError::Unexpected {
                        construct: format!("{{{{/{}}}}} inside <{}>", name, tag),
                        offset,
                    });
                }
                Stop::Else { offset, .. } => {
                    return Err(SyntaxError::Unexpected {
                        construct: format!("{{{{else}}}} inside <{}>", tag),
                        offset,
                    });
                }
            }
        }

        Ok(ElementNode {
            tag,
            attributes,
            children,
            self_closing,
            span: Span::new(start, self.pos),
        })
    }

    fn parse_attribute(&mut self) -> SyntaxResult<AttrNode> {
        let start = self.pos;
        if self.mustache_ahead() {
            return Err(SyntaxError::InvalidExpression {
                message: "expressions are not allowed in attribute name position".to_string(),
                offset: self.pos,
            });
        }
        let name = self.take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/');
        if name.is_empty() {
            // A stray `/` inside a tag.
            self.bump();
            return self.parse_attribute();
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok(AttrNode {
                name,
                value: AttrValue::Text(String::new()),
                span: Span::new(start, self.pos),
            });
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.parse_quoted_value(quote)?
            }
            _ if self.mustache_ahead() => match self.parse_curly()? {
                Curly::Statement(Statement::Mustache(mustache)) => AttrValue::Mustache(mustache),
                _ => {
                    return Err(SyntaxError::InvalidExpression {
                        message: format!("attribute `{}` must hold a plain expression", name),
                        offset: start,
                    });
                }
            },
            _ => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                AttrValue::Text(decode_entities(&raw))
            }
        };

        Ok(AttrNode {
            name,
            value,
            span: Span::new(start, self.pos),
        })
    }

    fn parse_quoted_value(&mut self, quote: char) -> SyntaxResult<AttrValue> {
        let mut parts = Vec::new();
        let mut text_start = self.pos;
        loop {
            if self.at_end() {
                return Err(self.eof(&format!("closing {} of attribute value", quote)));
            }
            if self.mustache_ahead() {
                if text_start < self.pos {
                    parts.push(ConcatPart::Text(decode_entities(
                        &self.src[text_start..self.pos],
                    )));
                }
                let offset = self.pos;
                match self.parse_curly()? {
                    Curly::Statement(Statement::Mustache(mustache)) => {
                        parts.push(ConcatPart::Mustache(mustache));
                    }
                    Curly::Statement(Statement::MustacheComment(_)) => {}
                    _ => {
                        return Err(SyntaxError::InvalidExpression {
                            message: "blocks are not allowed inside attribute values".to_string(),
                            offset,
                        });
                    }
                }
                text_start = self.pos;
                continue;
            }
            if self.peek() == Some(quote) {
                if text_start < self.pos {
                    parts.push(ConcatPart::Text(decode_entities(
                        &self.src[text_start..self.pos],
                    )));
                }
                self.bump();
                break;
            }
            self.bump();
        }

        Ok(match parts.len() {
            0 => AttrValue::Text(String::new()),
            1 => match parts.pop() {
                Some(ConcatPart::Text(text)) => AttrValue::Text(text),
                Some(ConcatPart::Mustache(mustache)) => AttrValue::Mustache(mustache),
                None => AttrValue::Text(String::new()),
            },
            _ => AttrValue::Concat(parts),
        })
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    // ------------------------------------------------------------------
    // Curly-brace constructs
    // ------------------------------------------------------------------

    fn parse_curly(&mut self) -> SyntaxResult<Curly> {
        let start = self.pos;

        if self.starts_with("{{!") {
            return self.parse_mustache_comment().map(Curly::Statement);
        }

        if self.starts_with("{{{") {
            self.pos += 3;
            self.skip_strip_marker();
            let mustache = self.parse_mustache_body(start, true)?;
            return Ok(Curly::Statement(Statement::Mustache(mustache)));
        }

        self.pos += 2;
        self.skip_strip_marker();
        self.skip_whitespace();

        match self.peek() {
            Some('#') => {
                self.bump();
                let header = self.parse_block_header(start)?;
                let close = header.path.original.clone();
                let block = self.parse_block_body(header, &close)?;
                Ok(Curly::Statement(Statement::Block(block)))
            }
            Some('/') => {
                self.bump();
                self.skip_whitespace();
                let name = self.take_while(|c| !c.is_whitespace() && c != '}' && c != '~');
                self.expect_close(false)?;
                Ok(Curly::Stop(Stop::CloseBlock {
                    name,
                    offset: start,
                }))
            }
            Some('>') => Err(SyntaxError::InvalidExpression {
                message: "partials are not supported; use a component".to_string(),
                offset: start,
            }),
            _ if self.at_keyword("else") => {
                self.pos += "else".len();
                self.skip_whitespace();
                if self.at_close() {
                    self.expect_close(false)?;
                    return Ok(Curly::Stop(Stop::Else {
                        chain: None,
                        offset: start,
                    }));
                }
                let header = self.parse_block_header(start)?;
                Ok(Curly::Stop(Stop::Else {
                    chain: Some(header),
                    offset: start,
                }))
            }
            _ => {
                let mustache = self.parse_mustache_body(start, false)?;
                Ok(Curly::Statement(Statement::Mustache(mustache)))
            }
        }
    }

    fn parse_mustache_comment(&mut self) -> SyntaxResult<Statement> {
        let start = self.pos;
        let (open, close) = if self.starts_with("{{!--") {
            ("{{!--", "--}}")
        } else {
            ("{{!", "}}")
        };
        self.pos += open.len();
        let Some(end) = self.rest().find(close) else {
            return Err(self.eof(close));
        };
        let text = self.rest()[..end].to_string();
        self.pos += end + close.len();
        Ok(Statement::MustacheComment(CommentNode {
            text,
            span: Span::new(start, self.pos),
        }))
    }

    fn parse_mustache_body(&mut self, start: usize, trusting: bool) -> SyntaxResult<MustacheStatement> {
        self.skip_whitespace();
        let path = match self.parse_expression()? {
            Expression::SubExpression(sub) => {
                return Err(SyntaxError::InvalidExpression {
                    message: format!("`{}` cannot be called directly", sub.path.original),
                    offset: sub.span.start,
                });
            }
            other => other,
        };
        let (params, hash) = self.parse_params_and_hash(false)?.into_call();
        self.expect_close(trusting)?;
        Ok(MustacheStatement {
            path,
            params,
            hash,
            trusting,
            span: Span::new(start, self.pos),
        })
    }

    fn parse_block_header(&mut self, start: usize) -> SyntaxResult<BlockHeader> {
        self.skip_whitespace();
        let path = match self.parse_expression()? {
            Expression::Path(path) => path,
            _ => {
                return Err(SyntaxError::InvalidExpression {
                    message: "a block must be opened with a helper name".to_string(),
                    offset: start,
                });
            }
        };
        let args = self.parse_params_and_hash(true)?;
        self.expect_close(false)?;
        Ok(BlockHeader {
            path,
            params: args.params,
            hash: args.hash,
            block_params: args.block_params,
            start,
        })
    }

    fn parse_block_body(&mut self, header: BlockHeader, close: &str) -> SyntaxResult<BlockStatement> {
        let body_start = self.pos;
        let (body, stop) = self.parse_content(None)?;
        let program = Program {
            body,
            block_params: header.block_params,
            span: Span::new(body_start, self.pos),
        };

        let inverse = match stop {
            Stop::CloseBlock { name, offset } => {
                check_block_close(close, &name, offset)?;
                None
            }
            Stop::Else { chain: None, .. } => {
                let inverse_start = self.pos;
                let (body, stop) = self.parse_content(None)?;
                let span = Span::new(inverse_start, self.pos);
                match stop {
                    Stop::CloseBlock { name, offset } => check_block_close(close, &name, offset)?,
                    Stop::Else { offset, .. } => {
                        return Err(SyntaxError::Unexpected {
                            construct: "second {{else}}".to_string(),
                            offset,
                        });
                    }
                    _ => return Err(self.eof(&format!("{{{{/{}}}}}", close))),
                }
                Some(Program {
                    body,
                    block_params: Vec::new(),
                    span,
                })
            }
            Stop::Else {
                chain: Some(chained),
                ..
            } => {
                // `{{else if x}}` nests a block that shares this block's close.
                let nested = self.parse_block_body(chained, close)?;
                let span = nested.span;
                Some(Program {
                    body: vec![Statement::Block(nested)],
                    block_params: Vec::new(),
                    span,
                })
            }
            Stop::CloseTag { name, offset } => {
                return Err(SyntaxError::Unexpected {
                    construct: format!("</{}> inside {{{{#{}}}}}", name, close),
                    offset,
                });
            }
            Stop::Eof => return Err(self.eof(&format!("{{{{/{}}}}}", close))),
        };

        Ok(BlockStatement {
            path: header.path,
            params: header.params,
            hash: header.hash,
            program,
            inverse,
            span: Span::new(header.start, self.pos),
        })
    }

    fn skip_strip_marker(&mut self) {
        if self.starts_with("~") {
            self.pos += 1;
        }
    }

    fn at_close(&self) -> bool {
        self.starts_with("}}") || self.starts_with("~}}")
    }

    fn expect_close(&mut self, trusting: bool) -> SyntaxResult<()> {
        self.skip_whitespace();
        self.skip_strip_marker();
        let close = if trusting { "}}}" } else { "}}" };
        if self.starts_with(close) {
            self.pos += close.len();
            Ok(())
        } else if self.at_end() {
            Err(self.eof(close))
        } else {
            Err(SyntaxError::InvalidExpression {
                message: format!("expected `{}`", close),
                offset: self.pos,
            })
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        let rest = self.rest();
        rest.starts_with(word)
            && rest[word.len()..]
                .chars()
                .next()
                .is_none_or(|c| c.is_whitespace() || c == '}' || c == '~' || c == ')')
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_params_and_hash(&mut self, allow_block_params: bool) -> SyntaxResult<Arguments> {
        let mut args = Arguments::default();
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Err(self.eof("}}"));
            }
            if self.at_close() || self.starts_with(")") {
                return Ok(args);
            }
            if allow_block_params && self.at_keyword("as") {
                let save = self.pos;
                self.pos += 2;
                self.skip_whitespace();
                if self.starts_with("|") {
                    self.pos += 1;
                    let names = self.take_while(|c| c != '|' && c != '}');
                    if !self.starts_with("|") {
                        return Err(SyntaxError::InvalidExpression {
                            message: "unterminated block parameters".to_string(),
                            offset: save,
                        });
                    }
                    self.pos += 1;
                    args.block_params = names.split_whitespace().map(str::to_string).collect();
                    continue;
                }
                self.pos = save;
            }

            if let Some(key) = self.peek_hash_key() {
                self.pos += key.len();
                self.skip_whitespace();
                self.pos += 1; // '='
                self.skip_whitespace();
                let value = self.parse_expression()?;
                args.hash.pairs.push(HashPair { key, value });
            } else {
                if !args.hash.is_empty() {
                    return Err(SyntaxError::InvalidExpression {
                        message: "positional parameters must come before named arguments"
                            .to_string(),
                        offset: self.pos,
                    });
                }
                args.params.push(self.parse_expression()?);
            }
        }
    }

    /// If the next token is `key=`, return the key.
    fn peek_hash_key(&self) -> Option<String> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return None;
        }
        let after = rest[len..].trim_start();
        after.starts_with('=').then(|| rest[..len].to_string())
    }

    fn parse_expression(&mut self) -> SyntaxResult<Expression> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            None => Err(self.eof("expression")),
            Some('(') => {
                self.bump();
                self.skip_whitespace();
                let path = match self.parse_expression()? {
                    Expression::Path(path) => path,
                    _ => {
                        return Err(SyntaxError::InvalidExpression {
                            message: "a sub-expression must start with a helper name".to_string(),
                            offset: start,
                        });
                    }
                };
                let (params, hash) = self.parse_params_and_hash(false)?.into_call();
                self.skip_whitespace();
                if !self.starts_with(")") {
                    return Err(self.eof(")"));
                }
                self.bump();
                Ok(Expression::SubExpression(SubExpression {
                    path,
                    params,
                    hash,
                    span: Span::new(start, self.pos),
                }))
            }
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        None => return Err(self.eof("closing quote")),
                        Some('\\') => {
                            if let Some(escaped) = self.bump() {
                                value.push(escaped);
                            }
                        }
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                    }
                }
                Ok(Expression::Literal(Literal::String(value)))
            }
            Some(_) => {
                let token = self.take_while(|c| {
                    !c.is_whitespace() && !matches!(c, '}' | ')' | '(' | '=' | '|' | '~')
                });
                if token.is_empty() {
                    return Err(SyntaxError::InvalidExpression {
                        message: format!("unexpected `{}`", self.peek().unwrap_or(' ')),
                        offset: start,
                    });
                }
                Ok(match token.as_str() {
                    "true" => Expression::Literal(Literal::Boolean(true)),
                    "false" => Expression::Literal(Literal::Boolean(false)),
                    "null" => Expression::Literal(Literal::Null),
                    "undefined" => Expression::Literal(Literal::Undefined),
                    _ => match parse_number(&token) {
                        Some(number) => Expression::Literal(Literal::Number(number)),
                        None => Expression::Path(PathExpression::from_original(
                            &token,
                            Span::new(start, self.pos),
                        )),
                    },
                })
            }
        }
    }
}

#[derive(Debug, Default)]
struct Arguments {
    params: Vec<Expression>,
    hash: Hash,
    block_params: Vec<String>,
}

impl Arguments {
    fn into_call(self) -> (Vec<Expression>, Hash) {
        (self.params, self.hash)
    }
}

fn check_block_close(expected: &str, found: &str, offset: usize) -> SyntaxResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SyntaxError::MismatchedBlock {
            expected: expected.to_string(),
            found: found.to_string(),
            offset,
        })
    }
}

fn parse_number(token: &str) -> Option<f64> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    token.parse().ok()
}

/// Decode the character references that matter for template text.
///
/// Unknown references are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
