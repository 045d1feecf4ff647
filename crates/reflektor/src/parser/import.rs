//! `@import` expansion.
//!
//! Imports are textual: an `@import "name";` statement is replaced by the
//! tokens of the imported file (itself expanded first), so later definitions
//! override earlier ones exactly as if the files were concatenated. A file
//! imported twice is spliced twice; at most [`MAX_IMPORTS`] files are
//! expanded per load.

use tracing::debug;

use crate::error::{LoadError, ParseError, ParseErrorKind, StyleError};
use crate::lexer::{tokenize, Punct, Span, Token, TokenKind};
use crate::loader::{Location, StylesheetLoader};

/// Most files one load may expand, counting repeated imports each time.
pub const MAX_IMPORTS: usize = 1024;

pub(crate) struct Importer<'a> {
    source: Option<(&'a dyn StylesheetLoader, &'a Location)>,
    /// Files currently being expanded, outermost first.
    stack: Vec<String>,
    expanded: usize,
}

impl<'a> Importer<'a> {
    pub(crate) fn new(source: Option<(&'a dyn StylesheetLoader, &'a Location)>) -> Self {
        Self {
            source,
            stack: Vec::new(),
            expanded: 0,
        }
    }

    /// Loads and expands an entry file.
    pub(crate) fn load_root(&mut self, name: &str, extension: &str) -> Result<Vec<Token>, StyleError> {
        self.load(name, extension, None)
    }

    /// Splices every top-level `@import` in `tokens`. `extension` is the
    /// default for imports written without one.
    pub(crate) fn expand(&mut self, tokens: Vec<Token>, extension: &str) -> Result<Vec<Token>, StyleError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut depth = 0usize;
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            let is_import =
                matches!(&token.kind, TokenKind::AtKeyword(name) if name.eq_ignore_ascii_case("import"));
            if !is_import {
                if token.kind.opens_group() {
                    depth += 1;
                } else if token.kind.closes_group() {
                    depth = depth.saturating_sub(1);
                }
                out.push(token);
                continue;
            }

            if depth > 0 {
                return Err(ParseError::syntax(
                    "a declaration",
                    "'@import' (imports are only allowed at the top level)",
                    Some(token.span),
                )
                .into());
            }

            let target = match iter.next() {
                Some(Token {
                    kind: TokenKind::Str(target) | TokenKind::Ident(target),
                    ..
                }) => target,
                Some(other) => {
                    return Err(ParseError::syntax(
                        "a quoted file name after '@import'",
                        other.kind.describe(),
                        Some(other.span),
                    )
                    .into());
                }
                None => {
                    return Err(ParseError::syntax(
                        "a quoted file name after '@import'",
                        "end of input",
                        Some(token.span),
                    )
                    .into());
                }
            };
            match iter.next() {
                None => {}
                Some(t) if t.kind.is_punct(Punct::Semicolon) => {}
                Some(other) => {
                    return Err(
                        ParseError::syntax("';'", other.kind.describe(), Some(other.span)).into(),
                    );
                }
            }

            let (name, import_extension) = split_target(&target, extension);
            let mut imported = self.load(name, import_extension, Some(token.span))?;
            if let Some(first) = imported.first_mut() {
                first.spaced = token.spaced;
            }
            out.extend(imported);
        }

        Ok(out)
    }

    fn load(&mut self, name: &str, extension: &str, span: Option<Span>) -> Result<Vec<Token>, StyleError> {
        let key = format!("{}.{}", name, extension);
        if let Some(start) = self.stack.iter().position(|open| *open == key) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(key);
            return Err(ParseError::new(ParseErrorKind::ImportCycle { chain }, span).into());
        }
        if self.expanded >= MAX_IMPORTS {
            let kind = ParseErrorKind::TooManyImports { limit: MAX_IMPORTS };
            return Err(ParseError::new(kind, span).into());
        }
        self.expanded += 1;

        let Some((loader, location)) = self.source else {
            return Err(LoadError::NotFound {
                name: name.to_string(),
                extension: extension.to_string(),
                location: "no import location".to_string(),
            }
            .into());
        };
        let text = loader.load(name, extension, location)?;
        debug!(file = %key, location = %location, "expanding stylesheet");

        let tokens = tokenize(&text, Some(&key))?;
        self.stack.push(key);
        let expanded = self.expand(tokens, extension);
        self.stack.pop();
        expanded
    }
}

/// Splits `name.ext`; names without an extension get `default_extension`.
fn split_target<'t>(target: &'t str, default_extension: &'t str) -> (&'t str, &'t str) {
    match target.rsplit_once('.') {
        Some((name, ext))
            if !name.is_empty() && !ext.is_empty() && !ext.contains(|c: char| c == '/' || c == '\\') =>
        {
            (name, ext)
        }
        _ => (target, default_extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::render;
    use crate::loader::MemoryLoader;

    fn expand_main(loader: &MemoryLoader) -> Result<Vec<Token>, StyleError> {
        let location = Location::bundle("app");
        let mut importer = Importer::new(Some((loader, &location)));
        importer.load_root("main", "less")
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("colors", "less"), ("colors", "less"));
        assert_eq!(split_target("colors.css", "less"), ("colors", "css"));
        assert_eq!(split_target("themes/dark", "less"), ("themes/dark", "less"));
        assert_eq!(split_target("../shared/base.less", "css"), ("../shared/base", "less"));
        assert_eq!(split_target("./base", "less"), ("./base", "less"));
    }

    #[test]
    fn test_imports_are_spliced_in_place() {
        let loader = MemoryLoader::new()
            .with_source("app", "main.less", ".A { x: 1; } @import \"b\"; .C { x: 3; }")
            .with_source("app", "b.less", ".B { x: 2; }");
        let tokens = expand_main(&loader).unwrap();
        assert_eq!(render(&tokens), ".A { x: 1; } .B { x: 2; } .C { x: 3; }");
    }

    #[test]
    fn test_imported_spans_name_their_file() {
        let loader = MemoryLoader::new()
            .with_source("app", "main.less", "@import \"b\";")
            .with_source("app", "b.less", ".B { }");
        let tokens = expand_main(&loader).unwrap();
        assert_eq!(tokens[0].span.origin.as_deref(), Some("b.less"));
    }

    #[test]
    fn test_diamond_imports_are_allowed() {
        let loader = MemoryLoader::new()
            .with_source("app", "main.less", "@import \"left\"; @import \"right\";")
            .with_source("app", "left.less", "@import \"base\";")
            .with_source("app", "right.less", "@import \"base\";")
            .with_source("app", "base.less", ".Base { }");
        let tokens = expand_main(&loader).unwrap();
        assert_eq!(render(&tokens), ".Base { } .Base { }");
    }

    #[test]
    fn test_layered_diamonds_hit_the_import_limit() {
        let mut loader = MemoryLoader::new()
            .with_source("app", "main.less", "@import \"layer0\";")
            .with_source("app", "layer12.less", ".Leaf { }");
        for layer in 0..12 {
            let next = format!("layer{}", layer + 1);
            loader.add_source(
                "app",
                format!("layer{}.less", layer),
                format!("@import \"{next}\"; @import \"{next}\";"),
            );
        }

        let err = expand_main(&loader).unwrap_err();
        assert!(matches!(
            err.parse_kind(),
            Some(ParseErrorKind::TooManyImports { limit }) if *limit == MAX_IMPORTS
        ));
    }

    #[test]
    fn test_cycle_reports_chain() {
        let loader = MemoryLoader::new()
            .with_source("app", "main.less", "@import \"a\";")
            .with_source("app", "a.less", "@import \"b.less\";")
            .with_source("app", "b.less", "@import \"a\";");
        let err = expand_main(&loader).unwrap_err();
        match err.parse_kind() {
            Some(ParseErrorKind::ImportCycle { chain }) => {
                assert_eq!(chain, &vec!["a.less", "b.less", "a.less"]);
            }
            other => panic!("Expected ImportCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let loader = MemoryLoader::new().with_source("app", "main.less", "@import \"main\";");
        let err = expand_main(&loader).unwrap_err();
        assert!(matches!(err, StyleError::Parse(ref e) if e.is_import_cycle()));
    }

    #[test]
    fn test_nested_import_is_rejected() {
        let loader =
            MemoryLoader::new().with_source("app", "main.less", ".A { @import \"b\"; }");
        let err = expand_main(&loader).unwrap_err();
        assert!(matches!(
            err.parse_kind(),
            Some(ParseErrorKind::Syntax { .. })
        ));
    }

    #[test]
    fn test_missing_import() {
        let loader = MemoryLoader::new().with_source("app", "main.less", "@import \"nope\";");
        let err = expand_main(&loader).unwrap_err();
        assert!(matches!(err, StyleError::Load(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_import_without_loader() {
        let mut importer = Importer::new(None);
        let tokens = tokenize("@import \"b\";", None).unwrap();
        let err = importer.expand(tokens, "less").unwrap_err();
        assert!(matches!(err, StyleError::Load(_)));
    }
}
