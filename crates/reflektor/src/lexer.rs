//! Stylesheet tokenizer.
//!
//! The low-level scanning is done by `cssparser` (the tokenizer used by
//! Firefox), which already understands strings, escapes, comments, numbers and
//! nested blocks. This module flattens its block-structured stream into the
//! flat [`Token`] sequence the stylesheet parser consumes:
//!
//! - blocks become explicit open/close punctuation
//! - comments and whitespace are dropped, but every token records whether
//!   whitespace preceded it (needed to rebuild raw value strings)
//! - adjacent delimiters are merged into comparison operators (`<=`, `>=`,
//!   `==`, `!=`)
//!
//! Unlike a browser, an unterminated string, comment or block is an error here:
//! a stylesheet that silently swallows the rest of the file is never what the
//! author meant. Blocks may nest at most [`MAX_NESTING`] levels deep.

use std::fmt;
use std::sync::Arc;

use cssparser::{ParseErrorKind, Parser, ParserInput, SourceLocation, Token as CssToken};

use crate::error::LexError;

/// Deepest block nesting accepted by [`tokenize`] and by condition
/// expressions.
pub const MAX_NESTING: usize = 128;

/// Location of a token in its source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    /// File the token came from (`None` for inline text).
    pub origin: Option<Arc<str>>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl Span {
    /// Creates a span for inline text.
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            origin: None,
            line,
            column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{}:{}:{}", origin, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

/// Operators recognized inside values and conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Lte,
    /// Single `=`: assignment in `@global`, equality in conditions.
    Assign,
    Eq,
    Ne,
    Gt,
    Gte,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Assign => "=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
        }
    }
}

/// Punctuation tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Bang,
    Amp,
    /// Any other single-character delimiter.
    Delim(char),
}

impl Punct {
    pub fn as_char(self) -> char {
        match self {
            Punct::OpenBrace => '{',
            Punct::CloseBrace => '}',
            Punct::OpenBracket => '[',
            Punct::CloseBracket => ']',
            Punct::OpenParen => '(',
            Punct::CloseParen => ')',
            Punct::Semicolon => ';',
            Punct::Colon => ':',
            Punct::Comma => ',',
            Punct::Dot => '.',
            Punct::Bang => '!',
            Punct::Amp => '&',
            Punct::Delim(c) => c,
        }
    }
}

/// Kind and payload of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// `@name`
    AtKeyword(String),
    /// `#name`
    Hash(String),
    /// Quoted string, without quotes and with escapes resolved.
    Str(String),
    /// Number with an optional unit (`12`, `12px`, `50%`). `repr` is the
    /// source text, kept so signs and formatting survive re-rendering.
    Number {
        value: f64,
        unit: Option<String>,
        repr: String,
    },
    /// Function head `name(`; closed by a [`Punct::CloseParen`].
    Function(String),
    Operator(Operator),
    Punct(Punct),
}

impl TokenKind {
    /// Short human description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::AtKeyword(name) => format!("'@{}'", name),
            TokenKind::Hash(name) => format!("'#{}'", name),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Number { repr, .. } => format!("number '{}'", repr),
            TokenKind::Function(name) => format!("function '{}('", name),
            TokenKind::Operator(op) => format!("'{}'", op.as_str()),
            TokenKind::Punct(p) => format!("'{}'", p.as_char()),
        }
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(self, TokenKind::Punct(p) if *p == punct)
    }

    /// True for tokens that open a nested group.
    pub fn opens_group(&self) -> bool {
        matches!(
            self,
            TokenKind::Function(_)
                | TokenKind::Punct(Punct::OpenBrace)
                | TokenKind::Punct(Punct::OpenBracket)
                | TokenKind::Punct(Punct::OpenParen)
        )
    }

    /// True for tokens that close a nested group.
    pub fn closes_group(&self) -> bool {
        matches!(
            self,
            TokenKind::Punct(Punct::CloseBrace)
                | TokenKind::Punct(Punct::CloseBracket)
                | TokenKind::Punct(Punct::CloseParen)
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => f.write_str(name),
            TokenKind::AtKeyword(name) => write!(f, "@{}", name),
            TokenKind::Hash(name) => write!(f, "#{}", name),
            TokenKind::Str(value) => {
                f.write_str("\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
            TokenKind::Number { repr, .. } => f.write_str(repr),
            TokenKind::Function(name) => write!(f, "{}(", name),
            TokenKind::Operator(op) => f.write_str(op.as_str()),
            TokenKind::Punct(p) => write!(f, "{}", p.as_char()),
        }
    }
}

/// A token with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Whitespace (or a comment) preceded this token.
    pub spaced: bool,
}

/// Rebuilds source-like text from tokens, collapsing whitespace runs to a
/// single space.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.spaced {
            out.push(' ');
        }
        out.push_str(&token.kind.to_string());
    }
    out
}

/// Tokenizes stylesheet text.
///
/// `origin` names the source file in spans and error messages.
pub fn tokenize(source: &str, origin: Option<&str>) -> Result<Vec<Token>, LexError> {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut lexer = Lexer {
        origin: origin.map(Arc::from),
        tokens: Vec::new(),
        pending_space: false,
        depth: 0,
    };

    let result = lexer.lex_block(&mut parser);
    match result {
        Ok(()) => Ok(lexer.tokens),
        Err(err) => Err(match err.kind {
            ParseErrorKind::Custom(lex) => lex,
            ParseErrorKind::Basic(basic) => LexError::InvalidToken {
                span: lexer.span_at(err.location),
                text: format!("{:?}", basic),
            },
        }),
    }
}

struct Lexer {
    origin: Option<Arc<str>>,
    tokens: Vec<Token>,
    pending_space: bool,
    /// Blocks currently open.
    depth: usize,
}

type LexResult<'i> = Result<(), cssparser::ParseError<'i, LexError>>;

impl Lexer {
    fn span_at(&self, location: SourceLocation) -> Span {
        Span {
            origin: self.origin.clone(),
            line: location.line + 1,
            column: location.column,
        }
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        let spaced = std::mem::take(&mut self.pending_space);

        // `<=`, `>=`, `==` and `!=` arrive as two delimiters.
        if kind == TokenKind::Operator(Operator::Assign) && !spaced {
            if let Some(last) = self.tokens.last_mut() {
                let merged = match last.kind {
                    TokenKind::Operator(Operator::Lt) => Some(Operator::Lte),
                    TokenKind::Operator(Operator::Gt) => Some(Operator::Gte),
                    TokenKind::Operator(Operator::Assign) => Some(Operator::Eq),
                    TokenKind::Punct(Punct::Bang) => Some(Operator::Ne),
                    _ => None,
                };
                if let Some(op) = merged {
                    last.kind = TokenKind::Operator(op);
                    return;
                }
            }
        }

        self.tokens.push(Token { kind, span, spaced });
    }

    fn lex_block<'i, 't>(&mut self, parser: &mut Parser<'i, 't>) -> LexResult<'i> {
        loop {
            let start = parser.position();
            let location = parser.current_source_location();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(()),
            };
            let span = self.span_at(location);

            match token {
                CssToken::WhiteSpace(_) => self.pending_space = true,
                CssToken::Comment(_) => {
                    let text = parser.slice_from(start);
                    if text.len() < 4 || !text.ends_with("*/") {
                        return Err(parser.new_custom_error(LexError::UnterminatedComment { span }));
                    }
                    self.pending_space = true;
                }
                CssToken::Ident(name) => self.push(TokenKind::Ident(name.to_string()), span),
                CssToken::AtKeyword(name) => {
                    self.push(TokenKind::AtKeyword(name.to_string()), span)
                }
                CssToken::Hash(name) | CssToken::IDHash(name) => {
                    self.push(TokenKind::Hash(name.to_string()), span)
                }
                CssToken::QuotedString(value) => {
                    if !is_terminated_string(parser.slice_from(start)) {
                        return Err(parser.new_custom_error(LexError::UnterminatedString { span }));
                    }
                    self.push(TokenKind::Str(value.to_string()), span);
                }
                CssToken::BadString(_) => {
                    return Err(parser.new_custom_error(LexError::UnterminatedString { span }));
                }
                CssToken::Number { value, .. } => {
                    let repr = parser.slice_from(start).to_string();
                    let value = repr.parse::<f64>().unwrap_or(value as f64);
                    self.push(
                        TokenKind::Number {
                            value,
                            unit: None,
                            repr,
                        },
                        span,
                    );
                }
                CssToken::Percentage { unit_value, .. } => {
                    let repr = parser.slice_from(start).to_string();
                    let value = repr
                        .strip_suffix('%')
                        .and_then(|n| n.parse::<f64>().ok())
                        .unwrap_or(unit_value as f64 * 100.0);
                    self.push(
                        TokenKind::Number {
                            value,
                            unit: Some("%".to_string()),
                            repr,
                        },
                        span,
                    );
                }
                CssToken::Dimension { value, unit, .. } => {
                    let repr = parser.slice_from(start).to_string();
                    let value = repr
                        .strip_suffix(&*unit)
                        .and_then(|n| n.parse::<f64>().ok())
                        .unwrap_or(value as f64);
                    self.push(
                        TokenKind::Number {
                            value,
                            unit: Some(unit.to_string()),
                            repr,
                        },
                        span,
                    );
                }
                CssToken::Delim(c) => self.push(delim_kind(c), span),
                CssToken::Colon => self.push(TokenKind::Punct(Punct::Colon), span),
                CssToken::Semicolon => self.push(TokenKind::Punct(Punct::Semicolon), span),
                CssToken::Comma => self.push(TokenKind::Punct(Punct::Comma), span),
                CssToken::Function(name) => {
                    self.push(TokenKind::Function(name.to_string()), span.clone());
                    self.lex_nested(parser, span, Punct::CloseParen)?;
                }
                CssToken::ParenthesisBlock => {
                    self.push(TokenKind::Punct(Punct::OpenParen), span.clone());
                    self.lex_nested(parser, span, Punct::CloseParen)?;
                }
                CssToken::SquareBracketBlock => {
                    self.push(TokenKind::Punct(Punct::OpenBracket), span.clone());
                    self.lex_nested(parser, span, Punct::CloseBracket)?;
                }
                CssToken::CurlyBracketBlock => {
                    self.push(TokenKind::Punct(Punct::OpenBrace), span.clone());
                    self.lex_nested(parser, span, Punct::CloseBrace)?;
                }
                CssToken::CloseParenthesis => {
                    self.push(TokenKind::Punct(Punct::CloseParen), span)
                }
                CssToken::CloseSquareBracket => {
                    self.push(TokenKind::Punct(Punct::CloseBracket), span)
                }
                CssToken::CloseCurlyBracket => {
                    self.push(TokenKind::Punct(Punct::CloseBrace), span)
                }
                CssToken::UnquotedUrl(url) => {
                    self.push(TokenKind::Function("url".to_string()), span.clone());
                    self.push(TokenKind::Str(url.to_string()), span.clone());
                    self.push(TokenKind::Punct(Punct::CloseParen), span);
                }
                CssToken::BadUrl(_)
                | CssToken::CDO
                | CssToken::CDC
                | CssToken::IncludeMatch
                | CssToken::DashMatch
                | CssToken::PrefixMatch
                | CssToken::SuffixMatch
                | CssToken::SubstringMatch => {
                    let text = parser.slice_from(start).to_string();
                    return Err(parser.new_custom_error(LexError::InvalidToken { span, text }));
                }
            }
        }
    }

    /// Lexes the block whose opening token was just consumed, then emits its
    /// closing punctuation.
    fn lex_nested<'i, 't>(
        &mut self,
        parser: &mut Parser<'i, 't>,
        open: Span,
        close: Punct,
    ) -> LexResult<'i> {
        if self.depth >= MAX_NESTING {
            return Err(parser.new_custom_error(LexError::TooDeep {
                span: open,
                limit: MAX_NESTING,
            }));
        }
        self.depth += 1;
        let inner_end = parser.parse_nested_block(|nested| {
            self.lex_block(nested)?;
            Ok(nested.position())
        })?;
        self.depth -= 1;

        // A closed block consumes its closing delimiter; at end of input the
        // position does not move.
        if parser.position() == inner_end {
            return Err(parser.new_custom_error(LexError::UnterminatedBlock {
                span: open,
                delimiter: close.as_char(),
            }));
        }

        let after = parser.current_source_location();
        let span = Span {
            origin: self.origin.clone(),
            line: after.line + 1,
            column: after.column.saturating_sub(1).max(1),
        };
        self.push(TokenKind::Punct(close), span);
        Ok(())
    }
}

fn delim_kind(c: char) -> TokenKind {
    match c {
        '<' => TokenKind::Operator(Operator::Lt),
        '>' => TokenKind::Operator(Operator::Gt),
        '=' => TokenKind::Operator(Operator::Assign),
        '+' => TokenKind::Operator(Operator::Plus),
        '-' => TokenKind::Operator(Operator::Minus),
        '*' => TokenKind::Operator(Operator::Star),
        '/' => TokenKind::Operator(Operator::Slash),
        '.' => TokenKind::Punct(Punct::Dot),
        '!' => TokenKind::Punct(Punct::Bang),
        '&' => TokenKind::Punct(Punct::Amp),
        other => TokenKind::Punct(Punct::Delim(other)),
    }
}

/// `cssparser` closes strings at end of input without complaint; check the
/// source slice for the closing quote.
fn is_terminated_string(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(quote) = chars.next() else {
        return false;
    };
    let body = &text[quote.len_utf8()..];
    let Some(inner) = body.strip_suffix(quote) else {
        return false;
    };
    let escapes = inner.chars().rev().take_while(|c| *c == '\\').count();
    escapes % 2 == 0
}
