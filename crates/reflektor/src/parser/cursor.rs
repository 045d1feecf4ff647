use crate::error::ParseError;
use crate::lexer::{Punct, Span, Token, TokenKind};

/// Forward-only reader over a token stream.
pub(crate) struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub(crate) fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.advance();
        token
    }

    pub(crate) fn at_punct(&self, punct: Punct) -> bool {
        self.peek_kind().is_some_and(|k| k.is_punct(punct))
    }

    pub(crate) fn eat_punct(&mut self, punct: Punct) -> bool {
        let found = self.at_punct(punct);
        if found {
            self.advance();
        }
        found
    }

    pub(crate) fn expect_punct(&mut self, punct: Punct, expected: &str) -> Result<Token, ParseError> {
        if !self.at_punct(punct) {
            return Err(self.unexpected(expected));
        }
        self.next().ok_or_else(|| self.unexpected(expected))
    }

    /// Span of the current token, or of the last one at end of input.
    pub(crate) fn span(&self) -> Option<Span> {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.span.clone())
    }

    /// A syntax error describing the current token.
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let found = self
            .peek()
            .map(|t| t.kind.describe())
            .unwrap_or_else(|| "end of input".to_string());
        ParseError::syntax(expected, found, self.span())
    }
}
