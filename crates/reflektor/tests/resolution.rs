//! End-to-end resolution tests: stylesheet text in, computed properties out.

use reflektor::{
    compute_style, parse_stylesheet, Color, ComputedStyle, Environment, Idiom, Literal,
    PluginRegistry, SizeClass, StyleContext, Stylesheet, TraitCollection,
};

fn sheet(source: &str) -> Stylesheet {
    parse_stylesheet(source, &PluginRegistry::with_builtins()).unwrap()
}

fn literal<'a>(style: &'a ComputedStyle, key: &str) -> Option<&'a Literal> {
    style.get(key).and_then(|v| v.as_literal())
}

// ============================================================================
// Overrides and important
// ============================================================================

#[test]
fn later_important_declaration_overrides() {
    let s = sheet(".A { x: 1; } .A { x: 2 !important; }");
    let style = compute_style(&s, &StyleContext::new("A"));

    assert_eq!(literal(&style, "x"), Some(&Literal::Number(2.0)));
    assert_eq!(
        style.important.get("x").and_then(|v| v.as_literal()),
        Some(&Literal::Number(2.0))
    );
}

#[test]
fn last_declared_value_wins_for_literals() {
    let s = sheet(
        ".A { title: \"one\"; color: #000; }
         .A { title: \"two\"; }
         .A { enabled: false; }",
    );
    let style = compute_style(&s, &StyleContext::new("A"));
    assert_eq!(literal(&style, "title"), Some(&Literal::String("two".into())));
    assert_eq!(literal(&style, "color"), Some(&Literal::Color(Color::rgb(0, 0, 0))));
    assert_eq!(literal(&style, "enabled"), Some(&Literal::Bool(false)));
}

// ============================================================================
// Conditions
// ============================================================================

#[test]
fn width_condition_includes_and_excludes() {
    let s = sheet(".A[width > 320] { x: \"wide\"; }");

    let wide = compute_style(&s, &StyleContext::new("A").with_size(400.0, 100.0));
    assert_eq!(literal(&wide, "x"), Some(&Literal::String("wide".into())));

    let narrow = compute_style(&s, &StyleContext::new("A").with_size(200.0, 100.0));
    assert!(narrow.get("x").is_none());
}

#[test]
fn trait_collection_conditions() {
    let s = sheet(
        ".A[horizontal == compact and idiom == phone] { layout: \"stacked\"; }
         .A[appearance == dark] { tint: #fff; }
         .A[scale >= 2] { hairline: 0.5; }",
    );
    let traits = TraitCollection::default()
        .with_horizontal(SizeClass::Compact)
        .with_idiom(Idiom::Phone)
        .with_scale(3.0);
    let style = compute_style(&s, &StyleContext::new("A").with_traits(traits));

    assert_eq!(literal(&style, "layout"), Some(&Literal::String("stacked".into())));
    assert!(style.get("tint").is_none());
    assert_eq!(literal(&style, "hairline"), Some(&Literal::Number(0.5)));
}

#[test]
fn environment_values_in_conditions() {
    let s = sheet(".A[locale == \"de\" or columns * 2 >= 6] { x: 1; }");

    let german = StyleContext::new("A").with_value("locale", "de");
    assert!(compute_style(&s, &german).get("x").is_some());

    let wide = StyleContext::new("A").with_environment(Environment::new().with_value("columns", 3));
    assert!(compute_style(&s, &wide).get("x").is_some());

    let neither = StyleContext::new("A").with_value("columns", 2);
    assert!(compute_style(&s, &neither).get("x").is_none());
}

#[test]
fn nested_condition_is_anded_with_parent() {
    let s = sheet(".A[width > 320] { & [height > 100] { x: 1; } }");

    let both = compute_style(&s, &StyleContext::new("A").with_size(400.0, 200.0));
    assert!(both.get("x").is_some());

    // Only the nested condition holds.
    let nested_only = compute_style(&s, &StyleContext::new("A").with_size(200.0, 200.0));
    assert!(nested_only.get("x").is_none());
}

// ============================================================================
// Traits
// ============================================================================

#[test]
fn additional_trait_requires_matching_trait() {
    let s = sheet(".A:dark { x: 1; }");

    assert!(compute_style(&s, &StyleContext::new("A").with_trait("dark"))
        .get("x")
        .is_some());
    assert!(compute_style(&s, &StyleContext::new("A").with_trait("light"))
        .get("x")
        .is_none());
    assert!(compute_style(&s, &StyleContext::new("A")).get("x").is_none());
    assert!(compute_style(&s, &StyleContext::new("B").with_trait("dark"))
        .get("x")
        .is_none());
}

#[test]
fn trait_selector_matches_any_class() {
    let s = sheet("#dark { x: 1; }");
    assert!(compute_style(&s, &StyleContext::new("Anything").with_trait("dark"))
        .get("x")
        .is_some());
}

// ============================================================================
// Priority policy
// ============================================================================

#[test]
fn priority_orders_class_condition_qualifier_trait() {
    // Declared from most to least specific; resolution must still apply them
    // least specific first.
    let s = sheet(
        "#dark { a: \"trait\"; }
         .A:dark { a: \"qualifier\"; b: \"qualifier\"; }
         .A[width > 0][height > 0] { a: \"two\"; b: \"two\"; c: \"two\"; }
         .A[width > 0] { a: \"one\"; b: \"one\"; c: \"one\"; d: \"one\"; }
         .A { a: \"plain\"; b: \"plain\"; c: \"plain\"; d: \"plain\"; e: \"plain\"; }",
    );
    let style = compute_style(
        &s,
        &StyleContext::new("A").with_trait("dark").with_size(10.0, 10.0),
    );
    let get = |key| literal(&style, key).and_then(Literal::as_str).map(str::to_string);

    assert_eq!(get("a").as_deref(), Some("trait"));
    assert_eq!(get("b").as_deref(), Some("qualifier"));
    assert_eq!(get("c").as_deref(), Some("two"));
    assert_eq!(get("d").as_deref(), Some("one"));
    assert_eq!(get("e").as_deref(), Some("plain"));
}

#[test]
fn equal_priority_uses_declaration_order() {
    let s = sheet(".A[width > 0] { x: 1; } .A[height > 0] { x: 2; }");
    let style = compute_style(&s, &StyleContext::new("A").with_size(1.0, 1.0));
    assert_eq!(literal(&style, "x"), Some(&Literal::Number(2.0)));

    let s = sheet(".A[height > 0] { x: 2; } .A[width > 0] { x: 1; }");
    let style = compute_style(&s, &StyleContext::new("A").with_size(1.0, 1.0));
    assert_eq!(literal(&style, "x"), Some(&Literal::Number(1.0)));
}

#[test]
fn redeclared_selector_takes_its_latest_position() {
    let s = sheet(
        ".A[width > 0] { x: 1; }
         .A[height > 0] { x: 2; }
         .A { & [width > 0] { x: 3; } }",
    );
    let style = compute_style(&s, &StyleContext::new("A").with_size(10.0, 10.0));
    assert_eq!(literal(&style, "x"), Some(&Literal::Number(3.0)));
    assert_eq!(s.rules().len(), 3);
}

// ============================================================================
// Variables and plugins
// ============================================================================

#[test]
fn variables_resolve_in_values_and_conditions() {
    let s = sheet(
        "@global { @breakpoint = 600; @accent = rgb(255, 128, 0); }
         .A[width >= @breakpoint] { tint: @accent; }",
    );
    let style = compute_style(&s, &StyleContext::new("A").with_size(600.0, 0.0));
    assert_eq!(
        literal(&style, "tint"),
        Some(&Literal::Color(Color::rgb(255, 128, 0)))
    );
    assert_eq!(s.variable("breakpoint").and_then(|v| v.as_literal()), Some(&Literal::Number(600.0)));
}

#[test]
fn plugin_values_stay_unresolved_until_read() {
    let s = sheet(".A { pin: constraint(__self.width == 44); }");
    let style = compute_style(&s, &StyleContext::new("A"));
    let value = style.get("pin").unwrap();
    assert!(value.is_object());
    assert!(value.as_literal().is_none());
}
