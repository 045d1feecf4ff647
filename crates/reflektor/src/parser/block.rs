//! Selector blocks, `@global` variables and declarations.

use std::collections::HashMap;

use crate::condition::Condition;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{render, Operator, Punct, Token, TokenKind};
use crate::plugin::PluginRegistry;
use crate::stylesheet::{Literal, Rule, RuleTable, Selector, Stylesheet, Value, ValueFlags, ValueKind};

use super::cursor::Cursor;

/// Builds a [`Stylesheet`] from an import-expanded token stream.
pub(crate) struct StylesheetBuilder<'a> {
    plugins: &'a PluginRegistry,
    rules: RuleTable,
    variables: Rule,
    /// Variable name (as written, without `@`) to its substituted tokens.
    substitutions: HashMap<String, Vec<Token>>,
}

impl<'a> StylesheetBuilder<'a> {
    pub(crate) fn new(plugins: &'a PluginRegistry) -> Self {
        Self {
            plugins,
            rules: RuleTable::new(),
            variables: Rule::new(),
            substitutions: HashMap::new(),
        }
    }

    pub(crate) fn build(self) -> Stylesheet {
        Stylesheet::new(self.rules, self.variables)
    }

    /// Parses top-level statements.
    pub(crate) fn parse(&mut self, tokens: Vec<Token>) -> Result<(), ParseError> {
        let mut cursor = Cursor::new(tokens);
        while let Some(token) = cursor.peek() {
            match &token.kind {
                TokenKind::AtKeyword(name) if name.eq_ignore_ascii_case("global") => {
                    cursor.advance();
                    self.parse_global_block(&mut cursor)?;
                }
                TokenKind::AtKeyword(name) => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnknownDirective { name: name.clone() },
                        Some(token.span.clone()),
                    ));
                }
                TokenKind::Punct(Punct::Semicolon) => cursor.advance(),
                _ => self.parse_rule_set(&mut cursor)?,
            }
        }
        Ok(())
    }

    fn parse_global_block(&mut self, cursor: &mut Cursor) -> Result<(), ParseError> {
        cursor.expect_punct(Punct::OpenBrace, "'{' after '@global'")?;
        loop {
            let Some(token) = cursor.next() else {
                return Err(cursor.unexpected("'}'"));
            };
            let name = match token.kind {
                TokenKind::Punct(Punct::CloseBrace) => return Ok(()),
                TokenKind::Punct(Punct::Semicolon) => continue,
                TokenKind::AtKeyword(name) => name,
                other => {
                    return Err(ParseError::syntax(
                        "a variable definition '@name = value'",
                        other.describe(),
                        Some(token.span),
                    ));
                }
            };

            match cursor.peek_kind() {
                Some(TokenKind::Operator(Operator::Assign))
                | Some(TokenKind::Punct(Punct::Colon)) => cursor.advance(),
                _ => return Err(cursor.unexpected("'=' or ':'")),
            }

            let tokens = self.collect_value(cursor)?;
            if tokens.is_empty() {
                return Err(cursor.unexpected("a value"));
            }
            let tokens = self.substitute(tokens)?;
            let value = self.make_value(&tokens, ValueFlags::default())?;
            self.variables.insert(name.as_str(), value);
            self.substitutions.insert(name, tokens);
            cursor.eat_punct(Punct::Semicolon);
        }
    }

    fn parse_rule_set(&mut self, cursor: &mut Cursor) -> Result<(), ParseError> {
        let selectors = self.parse_selector_list(cursor)?;
        cursor.expect_punct(Punct::OpenBrace, "',' or '{'")?;
        self.parse_block_body(cursor, &selectors)
    }

    fn parse_selector_list(&mut self, cursor: &mut Cursor) -> Result<Vec<Selector>, ParseError> {
        let mut selectors = vec![self.parse_selector_head(cursor)?];
        while cursor.eat_punct(Punct::Comma) {
            selectors.push(self.parse_selector_head(cursor)?);
        }
        Ok(selectors)
    }

    /// `.Name`, `Name` or `#name`, then refinements.
    fn parse_selector_head(&mut self, cursor: &mut Cursor) -> Result<Selector, ParseError> {
        let span = cursor.span();
        let mut selector = match cursor.next().map(|t| t.kind) {
            Some(TokenKind::Punct(Punct::Dot)) => match cursor.peek() {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    spaced: false,
                    ..
                }) => {
                    let selector = Selector::class(name.as_str());
                    cursor.advance();
                    selector
                }
                _ => {
                    return Err(ParseError::malformed_selector(
                        "'.' must be followed by a class name",
                        span,
                    ));
                }
            },
            Some(TokenKind::Ident(name)) => Selector::class(name),
            Some(TokenKind::Hash(name)) => Selector::trait_tag(name),
            Some(other) => {
                return Err(ParseError::syntax("a selector", other.describe(), span));
            }
            None => return Err(ParseError::syntax("a selector", "end of input", span)),
        };

        let (condition, additional_trait) = self.parse_refinements(cursor)?;
        if let Some(condition) = condition {
            selector = selector.with_condition(condition);
        }
        if let Some(trait_name) = additional_trait {
            selector = selector.with_additional_trait(trait_name);
        }
        Ok(selector)
    }

    /// `[condition]*` followed by an optional `:trait`. Several bracketed
    /// conditions are ANDed.
    fn parse_refinements(
        &mut self,
        cursor: &mut Cursor,
    ) -> Result<(Option<Condition>, Option<String>), ParseError> {
        let mut condition: Option<Condition> = None;
        while cursor.at_punct(Punct::OpenBracket) {
            let span = cursor.span();
            cursor.advance();
            let tokens = self.collect_group(cursor, Punct::CloseBracket)?;
            let tokens = self.substitute(tokens)?;
            let parsed = Condition::parse(&tokens).map_err(|mut err| {
                if err.span.is_none() {
                    err.span = span;
                }
                err
            })?;
            condition = Some(match condition {
                Some(existing) => existing.and(&parsed),
                None => parsed,
            });
        }

        let mut additional_trait = None;
        if cursor.eat_punct(Punct::Colon) {
            match cursor.next() {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => additional_trait = Some(name),
                Some(other) => {
                    return Err(ParseError::malformed_selector(
                        format!("expected a trait name after ':', found {}", other.kind.describe()),
                        Some(other.span),
                    ));
                }
                None => {
                    return Err(ParseError::malformed_selector(
                        "expected a trait name after ':'",
                        cursor.span(),
                    ));
                }
            }
        }
        Ok((condition, additional_trait))
    }

    /// Tokens up to the `close` matching an already consumed opener.
    fn collect_group(&mut self, cursor: &mut Cursor, close: Punct) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = cursor.next() else {
                return Err(cursor.unexpected(&format!("'{}'", close.as_char())));
            };
            if depth == 0 && token.kind.is_punct(close) {
                return Ok(tokens);
            }
            if token.kind.opens_group() {
                depth += 1;
            } else if token.kind.closes_group() {
                depth = depth.saturating_sub(1);
            }
            tokens.push(token);
        }
    }

    /// Parses declarations and nested blocks up to the closing `}`.
    fn parse_block_body(&mut self, cursor: &mut Cursor, selectors: &[Selector]) -> Result<(), ParseError> {
        for selector in selectors {
            self.rules.add_selector(selector.clone());
        }

        loop {
            match cursor.peek_kind() {
                None => return Err(cursor.unexpected("'}'")),
                Some(TokenKind::Punct(Punct::CloseBrace)) => {
                    cursor.advance();
                    return Ok(());
                }
                Some(TokenKind::Punct(Punct::Semicolon)) => cursor.advance(),
                Some(TokenKind::Punct(Punct::Amp)) => {
                    let span = cursor.span();
                    cursor.advance();
                    let (condition, additional_trait) = self.parse_refinements(cursor)?;
                    cursor.expect_punct(Punct::OpenBrace, "'{' after nested selector")?;
                    let nested = selectors
                        .iter()
                        .map(|parent| {
                            parent
                                .refine(condition.as_ref(), additional_trait.as_deref())
                                .map_err(|message| ParseError::malformed_selector(message, span.clone()))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    self.parse_block_body(cursor, &nested)?;
                }
                Some(_) => self.parse_declaration(cursor, selectors)?,
            }
        }
    }

    /// `key: value [!important] [;]`
    fn parse_declaration(&mut self, cursor: &mut Cursor, selectors: &[Selector]) -> Result<(), ParseError> {
        let mut key = String::new();
        loop {
            let Some(token) = cursor.peek() else {
                return Err(cursor.unexpected("':'"));
            };
            match &token.kind {
                TokenKind::Ident(segment) if key.is_empty() || key.ends_with('.') => {
                    key.push_str(segment);
                }
                TokenKind::Punct(Punct::Dot) if !key.is_empty() && !key.ends_with('.') => key.push('.'),
                TokenKind::Punct(Punct::Colon) if !key.is_empty() && !key.ends_with('.') => break,
                _ if key.is_empty() => {
                    return Err(cursor.unexpected("a property name or a nested '&' block"));
                }
                _ => return Err(cursor.unexpected("':'")),
            }
            cursor.advance();
        }
        cursor.advance();

        let tokens = self.collect_value(cursor)?;
        let (tokens, important) = split_important(tokens);
        if tokens.is_empty() {
            return Err(cursor.unexpected("a value"));
        }
        let tokens = self.substitute(tokens)?;
        let value = self.make_value(&tokens, ValueFlags { important })?;

        let declaration = self.rules.next_declaration();
        for selector in selectors {
            self.rules.declare(selector, key.as_str(), value.clone(), declaration);
        }
        cursor.eat_punct(Punct::Semicolon);
        Ok(())
    }

    /// Value tokens up to a `;` or `}` outside any group. Neither is consumed.
    fn collect_value(&mut self, cursor: &mut Cursor) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = cursor.peek() else {
                return Err(cursor.unexpected("';' or '}'"));
            };
            if depth == 0 {
                match &token.kind {
                    TokenKind::Punct(Punct::Semicolon) | TokenKind::Punct(Punct::CloseBrace) => {
                        return Ok(tokens);
                    }
                    TokenKind::Punct(Punct::OpenBrace) => {
                        return Err(ParseError::syntax(
                            "';'",
                            "'{' (nested blocks must start with '&')",
                            Some(token.span.clone()),
                        ));
                    }
                    TokenKind::Punct(Punct::Colon) => {
                        return Err(ParseError::syntax(
                            "';'",
                            "':' (missing ';' after the previous declaration?)",
                            Some(token.span.clone()),
                        ));
                    }
                    _ => {}
                }
            }
            if token.kind.opens_group() {
                depth += 1;
            } else if token.kind.closes_group() {
                depth = depth.saturating_sub(1);
            }
            if let Some(token) = cursor.next() {
                tokens.push(token);
            }
        }
    }

    /// Replaces `@name` references with the variable's tokens.
    fn substitute(&self, tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            let TokenKind::AtKeyword(name) = &token.kind else {
                out.push(token);
                continue;
            };
            let replacement = self.substitutions.get(name).ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::UndefinedVariable { name: name.clone() },
                    Some(token.span.clone()),
                )
            })?;
            let start = out.len();
            out.extend(replacement.iter().cloned());
            if let Some(first) = out.get_mut(start) {
                first.spaced = token.spaced;
            }
        }
        Ok(out)
    }

    /// Offers the value to the plugins, falling back to a literal.
    fn make_value(&self, tokens: &[Token], flags: ValueFlags) -> Result<Value, ParseError> {
        let raw = render(tokens);
        let kind = match self.plugins.parse(&raw) {
            Some(Ok(object)) => ValueKind::Object(object),
            Some(Err(err)) => {
                let span = tokens.first().map(|t| t.span.clone());
                return Err(ParseError::new(ParseErrorKind::Plugin(err), span));
            }
            None => ValueKind::Literal(Literal::from_tokens(tokens, &raw)),
        };
        Ok(Value::from_parts(kind, raw, flags))
    }
}

/// Strips a trailing `!important`.
fn split_important(mut tokens: Vec<Token>) -> (Vec<Token>, bool) {
    let n = tokens.len();
    let important = n >= 2
        && tokens[n - 2].kind.is_punct(Punct::Bang)
        && matches!(&tokens[n - 1].kind, TokenKind::Ident(word) if word.eq_ignore_ascii_case("important"));
    if important {
        tokens.truncate(n - 2);
    }
    (tokens, important)
}
