//! Condition expression tree and its recursive-descent parser.

use std::fmt;

use super::op::{ArithOp, CompareOp};
use crate::error::ParseError;
use crate::lexer::{Operator, Punct, Token, TokenKind, MAX_NESTING};

/// Most operators a single condition may contain. Together with
/// [`MAX_NESTING`] this bounds the depth of the expression tree.
pub const MAX_OPERATORS: usize = 256;

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Identifier or dotted path, resolved at evaluation time.
    Ident(String),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Number of top-level `and` terms.
    pub fn conjuncts(&self) -> usize {
        match self {
            Expr::And(left, right) => left.conjuncts() + right.conjuncts(),
            _ => 1,
        }
    }
}

/// Canonical, fully parenthesized form. Structurally equal trees print the
/// same text, which is what selector identity is based on.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Text(s) => write!(f, "{:?}", s),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Ident(path) => f.write_str(path),
            Expr::Negate(inner) => write!(f, "(-{})", inner),
            Expr::Not(inner) => write!(f, "(not {})", inner),
            Expr::And(l, r) => write!(f, "({} and {})", l, r),
            Expr::Or(l, r) => write!(f, "({} or {})", l, r),
            Expr::Compare(op, l, r) => write!(f, "({} {} {})", l, op, r),
            Expr::Arith(op, l, r) => write!(f, "({} {} {})", l, op, r),
        }
    }
}

/// Parses a condition from the tokens between `[` and `]`.
pub fn parse_expr(tokens: &[Token]) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::malformed_condition("empty condition", None));
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected {}", token.kind.describe())));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Open parentheses and prefix operators being parsed.
    depth: usize,
    operators: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_operator(&self) -> Option<Operator> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Ident(w)) if w.eq_ignore_ascii_case(word))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let span = self
            .peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.span.clone());
        ParseError::malformed_condition(message, span)
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nested more than {} levels deep", MAX_NESTING)));
        }
        self.depth += 1;
        Ok(())
    }

    fn count_operator(&mut self) -> Result<(), ParseError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(self.error(format!("more than {} operators", MAX_OPERATORS)));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.at_keyword("or") {
            self.count_operator()?;
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.at_keyword("and") {
            self.count_operator()?;
            self.bump();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("not") {
            self.count_operator()?;
            self.descend()?;
            self.bump();
            let operand = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = self.peek_operator().and_then(CompareOp::from_operator) else {
            return Ok(left);
        };
        self.count_operator()?;
        self.bump();
        let right = self.parse_additive()?;
        if self
            .peek_operator()
            .and_then(CompareOp::from_operator)
            .is_some()
        {
            return Err(self.error("comparisons cannot be chained"));
        }
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Operator(op @ (Operator::Plus | Operator::Minus))) => {
                    let op = if *op == Operator::Plus {
                        ArithOp::Add
                    } else {
                        ArithOp::Sub
                    };
                    self.count_operator()?;
                    self.bump();
                    let right = self.parse_multiplicative()?;
                    left = Expr::Arith(op, Box::new(left), Box::new(right));
                }
                // `width -8` lexes as a signed number right after an operand.
                Some(TokenKind::Number { repr, .. })
                    if repr.starts_with('+') || repr.starts_with('-') =>
                {
                    self.count_operator()?;
                    let right = self.parse_multiplicative()?;
                    left = Expr::Arith(ArithOp::Add, Box::new(left), Box::new(right));
                }
                _ => return Ok(left),
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self
            .peek_operator()
            .and_then(ArithOp::from_operator)
            .filter(|op| op.is_multiplicative())
        {
            self.count_operator()?;
            self.bump();
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek_operator() == Some(Operator::Minus) {
            self.count_operator()?;
            self.descend()?;
            self.bump();
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.error("expected a value, found end of condition"));
        };
        match &token.kind {
            TokenKind::Number { value, unit, .. } => {
                match unit.as_deref() {
                    None | Some("px") | Some("pt") => {}
                    Some(other) => {
                        return Err(self.error(format!("unsupported unit '{}'", other)));
                    }
                }
                self.bump();
                Ok(Expr::Number(*value))
            }
            TokenKind::Str(text) => {
                self.bump();
                Ok(Expr::Text(text.clone()))
            }
            TokenKind::Ident(name) => {
                if ["and", "or", "not"]
                    .iter()
                    .any(|kw| name.eq_ignore_ascii_case(kw))
                {
                    return Err(self.error(format!("unexpected keyword '{}'", name)));
                }
                self.bump();
                if name.eq_ignore_ascii_case("true") {
                    return Ok(Expr::Bool(true));
                }
                if name.eq_ignore_ascii_case("false") {
                    return Ok(Expr::Bool(false));
                }
                Ok(Expr::Ident(self.finish_path(name.clone())))
            }
            TokenKind::Punct(Punct::OpenParen) => {
                self.descend()?;
                self.bump();
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.peek() {
                    Some(t) if t.kind.is_punct(Punct::CloseParen) => {
                        self.bump();
                        Ok(inner)
                    }
                    _ => Err(self.error("expected ')'")),
                }
            }
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Extends an identifier with `.segment` parts written without spaces.
    fn finish_path(&mut self, mut path: String) -> String {
        loop {
            let (Some(dot), Some(next)) = (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
            else {
                return path;
            };
            match (&dot.kind, &next.kind) {
                (TokenKind::Punct(Punct::Dot), TokenKind::Ident(segment))
                    if !dot.spaced && !next.spaced =>
                {
                    path.push('.');
                    path.push_str(segment);
                    self.pos += 2;
                }
                _ => return path,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> Result<Expr, ParseError> {
        parse_expr(&tokenize(source, None).unwrap())
    }

    fn canonical(source: &str) -> String {
        parse(source).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(canonical("a or b and c"), "(a or (b and c))");
        assert_eq!(canonical("width + 2 * 3 > 10"), "((width + (2 * 3)) > 10)");
        assert_eq!(canonical("- width < 0"), "((-width) < 0)");
        assert_eq!(canonical("(a or b) and c"), "((a or b) and c)");
    }

    #[test]
    fn test_not_binds_to_comparison() {
        assert_eq!(canonical("not width > 320"), "(not (width > 320))");
        assert_eq!(
            canonical("not width > 320 and height > 10"),
            "((not (width > 320)) and (height > 10))"
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(canonical("a AND b Or NOT c"), "((a and b) or (not c))");
        assert_eq!(canonical("TRUE"), "true");
    }

    #[test]
    fn test_equality_spellings_agree() {
        assert_eq!(canonical("horizontal = compact"), canonical("horizontal == compact"));
    }

    #[test]
    fn test_dotted_paths() {
        assert_eq!(parse("size.width").unwrap(), Expr::Ident("size.width".into()));
    }

    #[test]
    fn test_units_are_ignored() {
        assert_eq!(canonical("width > 320px"), "(width > 320)");
        let err = parse("width > 50%").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedCondition { .. }));
    }

    #[test]
    fn test_signed_number_after_operand() {
        assert_eq!(canonical("width -8 > 0"), "((width + -8) > 0)");
    }

    #[test]
    fn test_conjunct_count() {
        assert_eq!(parse("a").unwrap().conjuncts(), 1);
        assert_eq!(parse("a and b and c").unwrap().conjuncts(), 3);
        assert_eq!(parse("a and (b or c)").unwrap().conjuncts(), 2);
        assert_eq!(parse("a or b").unwrap().conjuncts(), 1);
    }

    #[test]
    fn test_errors_carry_spans() {
        let err = parse("width >").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MalformedCondition { .. }));
        assert!(err.span.is_some());

        assert!(parse("width > 1 < 2").is_err());
        assert!(parse("width 320").is_err());
        assert!(parse("and").is_err());
        assert!(parse_expr(&[]).is_err());
    }

    #[test]
    fn test_missing_close_paren() {
        let mut tokens = tokenize("(width > 1)", None).unwrap();
        tokens.pop();
        let err = parse_expr(&tokens).unwrap_err();
        assert!(err.to_string().contains("expected ')'"), "{}", err);
    }

    // =========================================================================
    // Limits
    // =========================================================================

    #[test]
    fn test_parenthesis_depth_is_bounded() {
        // Variable substitution can splice token streams deeper than any
        // single source file.
        let group = tokenize("(width)", None).unwrap();
        let depth = MAX_NESTING + 72;
        let mut tokens = vec![group[0].clone(); depth];
        tokens.push(group[1].clone());
        tokens.extend(std::iter::repeat(group[2].clone()).take(depth));

        let err = parse_expr(&tokens).unwrap_err();
        assert!(err.to_string().contains("nested more than 128 levels"), "{}", err);

        let shallow = tokenize("((((width))))", None).unwrap();
        assert!(parse_expr(&shallow).is_ok());
    }

    #[test]
    fn test_prefix_chains_are_bounded() {
        let nots = format!("{}width", "not ".repeat(200));
        assert!(matches!(
            parse(&nots).unwrap_err().kind,
            ParseErrorKind::MalformedCondition { .. }
        ));

        let negations = format!("{}width > 0", "- ".repeat(200));
        assert!(parse(&negations).is_err());
    }

    #[test]
    fn test_operator_count_is_bounded() {
        let sum = |terms: usize| format!("width{} > 0", " + 1".repeat(terms));
        assert!(parse(&sum(MAX_OPERATORS - 1)).is_ok());

        let err = parse(&sum(MAX_OPERATORS + 10)).unwrap_err();
        assert!(err.to_string().contains("more than 256 operators"), "{}", err);
    }
}
