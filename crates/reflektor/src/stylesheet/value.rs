//! Property values.
//!
//! A declaration's raw text becomes either a [`Literal`] (numbers, strings,
//! colors, booleans) or, when a value plugin claims it, an object whose final
//! form is only known at read time (see [`Value::compute`]).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::PluginError;
use crate::lexer::{Punct, Token, TokenKind};
use crate::plugin::constraint::LayoutConstraint;
use crate::plugin::{ComputeContext, PropertyValuePlugin};

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Parses `rgb`, `rgba`, `rrggbb` or `rrggbbaa` hex digits (no `#`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
        let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 | 4 => {
                let mut channels = [255u8; 4];
                for (i, channel) in channels.iter_mut().take(hex.len()).enumerate() {
                    *channel = digit(i)? * 17;
                }
                Some(Self::rgba(channels[0], channels[1], channels[2], channels[3]))
            }
            6 | 8 => {
                let alpha = if hex.len() == 8 { pair(6)? } else { 255 };
                Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, alpha))
            }
            _ => None,
        }
    }

    /// Alpha as a fraction in `0.0..=1.0`.
    pub fn alpha(&self) -> f64 {
        f64::from(self.a) / 255.0
    }

    /// `#rrggbbaa`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A value fully known at parse time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    String(String),
    Color(Color),
    Bool(bool),
}

impl Literal {
    /// Decodes a declaration's tokens.
    ///
    /// Anything that is not a single string, boolean, number, hex color or
    /// `rgb()`/`rgba()` call is kept as the normalized raw text.
    pub fn from_tokens(tokens: &[Token], raw: &str) -> Self {
        match tokens {
            [Token {
                kind: TokenKind::Str(s),
                ..
            }] => Literal::String(s.clone()),
            [Token {
                kind: TokenKind::Ident(word),
                ..
            }] if word == "true" || word == "false" => Literal::Bool(word == "true"),
            [Token {
                kind: TokenKind::Number { value, unit, .. },
                ..
            }] if matches!(unit.as_deref(), None | Some("px") | Some("pt")) => {
                Literal::Number(*value)
            }
            [Token {
                kind: TokenKind::Hash(hex),
                ..
            }] => Color::from_hex(hex)
                .map(Literal::Color)
                .unwrap_or_else(|| Literal::String(raw.to_string())),
            [Token {
                kind: TokenKind::Function(name),
                ..
            }, args @ .., Token {
                kind: TokenKind::Punct(Punct::CloseParen),
                ..
            }] if name.eq_ignore_ascii_case("rgb") || name.eq_ignore_ascii_case("rgba") => {
                rgb_function(args)
                    .map(Literal::Color)
                    .unwrap_or_else(|| Literal::String(raw.to_string()))
            }
            _ => Literal::String(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Literal::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<Color> for Literal {
    fn from(c: Color) -> Self {
        Literal::Color(c)
    }
}

/// `r, g, b` channels are 0-255, the optional alpha is 0-1.
fn rgb_function(args: &[Token]) -> Option<Color> {
    let mut numbers = Vec::with_capacity(4);
    for (i, token) in args.iter().enumerate() {
        match (&token.kind, i % 2) {
            (TokenKind::Number { value, unit: None, .. }, 0) => numbers.push(*value),
            (TokenKind::Punct(Punct::Comma), 1) => {}
            _ => return None,
        }
    }
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    match numbers.as_slice() {
        [r, g, b] => Some(Color::rgb(channel(*r), channel(*g), channel(*b))),
        [r, g, b, a] => Some(Color::rgba(
            channel(*r),
            channel(*g),
            channel(*b),
            channel(a.clamp(0.0, 1.0) * 255.0),
        )),
        _ => None,
    }
}

/// A value claimed by a plugin: the plugin and its parsed payload.
#[derive(Clone)]
pub struct PluginObject {
    plugin: Rc<dyn PropertyValuePlugin>,
    payload: Rc<dyn Any>,
}

impl PluginObject {
    pub fn new(plugin: Rc<dyn PropertyValuePlugin>, payload: Rc<dyn Any>) -> Self {
        Self { plugin, payload }
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin.name()
    }

    pub fn payload(&self) -> &dyn Any {
        self.payload.as_ref()
    }
}

impl fmt::Debug for PluginObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginObject")
            .field("plugin", &self.plugin.name())
            .finish_non_exhaustive()
    }
}

impl PartialEq for PluginObject {
    fn eq(&self, other: &Self) -> bool {
        self.plugin.name() == other.plugin.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Literal(Literal),
    Object(PluginObject),
}

/// Per-value flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ValueFlags {
    /// Declared with `!important`.
    pub important: bool,
}

/// A declared property value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    kind: ValueKind,
    flags: ValueFlags,
    raw: String,
}

impl Value {
    pub fn literal(literal: impl Into<Literal>) -> Self {
        let literal = literal.into();
        let raw = match &literal {
            Literal::Number(n) => n.to_string(),
            Literal::String(s) => s.clone(),
            Literal::Color(c) => c.to_hex(),
            Literal::Bool(b) => b.to_string(),
        };
        Self {
            kind: ValueKind::Literal(literal),
            flags: ValueFlags::default(),
            raw,
        }
    }

    pub(crate) fn from_parts(kind: ValueKind, raw: String, flags: ValueFlags) -> Self {
        Self { kind, flags, raw }
    }

    pub fn important(mut self) -> Self {
        self.flags.important = true;
        self
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn flags(&self) -> ValueFlags {
        self.flags
    }

    pub fn is_important(&self) -> bool {
        self.flags.important
    }

    /// Normalized source text of the value (without `!important`).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ValueKind::Literal(literal) => Some(literal),
            ValueKind::Object(_) => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, ValueKind::Object(_))
    }

    /// Produces the value to apply. Literals are returned as they are; plugin
    /// objects are computed by their plugin against the live context.
    pub fn compute(&self, context: &ComputeContext<'_>) -> Result<ResolvedValue, PluginError> {
        match &self.kind {
            ValueKind::Literal(literal) => Ok(ResolvedValue::Literal(literal.clone())),
            ValueKind::Object(object) => object
                .plugin
                .compute_value(object.payload.as_ref(), context),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.kind {
            ValueKind::Literal(literal) => map.serialize_entry("value", literal)?,
            ValueKind::Object(object) => {
                map.serialize_entry("plugin", object.plugin_name())?;
                map.serialize_entry("raw", &self.raw)?;
            }
        }
        if self.flags.important {
            map.serialize_entry("important", &true)?;
        }
        map.end()
    }
}

/// The value handed to an element when a property is applied.
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Literal(Literal),
    Constraints(Vec<LayoutConstraint>),
    /// Output of a third-party plugin.
    Opaque(Rc<dyn Any>),
}

impl ResolvedValue {
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            ResolvedValue::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn as_constraints(&self) -> Option<&[LayoutConstraint]> {
        match self {
            ResolvedValue::Constraints(constraints) => Some(constraints),
            _ => None,
        }
    }
}

impl PartialEq for ResolvedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResolvedValue::Literal(a), ResolvedValue::Literal(b)) => a == b,
            (ResolvedValue::Constraints(a), ResolvedValue::Constraints(b)) => a == b,
            (ResolvedValue::Opaque(a), ResolvedValue::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Literal> for ResolvedValue {
    fn from(literal: Literal) -> Self {
        ResolvedValue::Literal(literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{render, tokenize};

    fn decode(source: &str) -> Literal {
        let tokens = tokenize(source, None).unwrap();
        Literal::from_tokens(&tokens, &render(&tokens))
    }

    #[test]
    fn test_literal_decoding() {
        assert_eq!(decode("\"hello\""), Literal::String("hello".into()));
        assert_eq!(decode("true"), Literal::Bool(true));
        assert_eq!(decode("false"), Literal::Bool(false));
        assert_eq!(decode("12"), Literal::Number(12.0));
        assert_eq!(decode("12px"), Literal::Number(12.0));
        assert_eq!(decode("1.5pt"), Literal::Number(1.5));
        assert_eq!(decode("-4"), Literal::Number(-4.0));
    }

    #[test]
    fn test_unrecognized_values_keep_raw_text() {
        assert_eq!(decode("50%"), Literal::String("50%".into()));
        assert_eq!(decode("bold"), Literal::String("bold".into()));
        assert_eq!(
            decode("Helvetica   Neue"),
            Literal::String("Helvetica Neue".into())
        );
        assert_eq!(decode("#nothex"), Literal::String("#nothex".into()));
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(decode("#f00"), Literal::Color(Color::rgb(255, 0, 0)));
        assert_eq!(decode("#f008"), Literal::Color(Color::rgba(255, 0, 0, 136)));
        assert_eq!(decode("#00ff00"), Literal::Color(Color::rgb(0, 255, 0)));
        assert_eq!(
            decode("#0000ff80"),
            Literal::Color(Color::rgba(0, 0, 255, 128))
        );
        assert_eq!(Color::from_hex("12345"), None);
    }

    #[test]
    fn test_rgb_functions() {
        assert_eq!(decode("rgb(10, 20, 30)"), Literal::Color(Color::rgb(10, 20, 30)));
        assert_eq!(
            decode("rgba(0, 0, 0, 0.5)"),
            Literal::Color(Color::rgba(0, 0, 0, 128))
        );
        assert_eq!(
            decode("rgb(10, 20)"),
            Literal::String("rgb(10, 20)".into())
        );
    }

    #[test]
    fn test_color_hex_output() {
        assert_eq!(Color::rgba(255, 0, 16, 255).to_hex(), "#ff0010ff");
        assert_eq!(Color::rgb(0, 0, 0).alpha(), 1.0);
    }

    #[test]
    fn test_value_json() {
        let value = Value::literal(Color::rgb(255, 0, 0)).important();
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r##"{"value":"#ff0000ff","important":true}"##);

        let json = serde_json::to_string(&Value::literal(2.0)).unwrap();
        assert_eq!(json, r#"{"value":2.0}"#);
    }
}
