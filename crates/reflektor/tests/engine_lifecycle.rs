//! Engine lifecycle: loading, reloading, failure policy and subscribers.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use reflektor::{
    ColorMode, ComputeContext, EngineConfig, Literal, Location, MemoryLoader, PluginError,
    PropertyValuePlugin, ResolvedValue, StyleContext, StyleEngine, StyleError, StyleProxy,
    Styleable,
};
use tempfile::TempDir;

/// `scaled(n)`: n multiplied by the display scale at read time.
struct Scaled;

impl PropertyValuePlugin for Scaled {
    fn name(&self) -> &str {
        "scaled"
    }

    fn should_parse_value(&self, raw: &str) -> bool {
        raw.starts_with("scaled(")
    }

    fn parse_value(&self, raw: &str) -> Result<Rc<dyn Any>, PluginError> {
        let inner = raw
            .strip_prefix("scaled(")
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or_default();
        let n: f64 = inner
            .trim()
            .parse()
            .map_err(|_| PluginError::new("scaled", format!("not a number: '{}'", inner)))?;
        Ok(Rc::new(n))
    }

    fn compute_value(
        &self,
        payload: &dyn Any,
        context: &ComputeContext<'_>,
    ) -> Result<ResolvedValue, PluginError> {
        let n = payload
            .downcast_ref::<f64>()
            .ok_or_else(|| PluginError::new("scaled", "unexpected payload"))?;
        Ok(Literal::Number(n * context.environment.traits.scale).into())
    }
}

#[derive(Default)]
struct View {
    properties: HashMap<String, Option<ResolvedValue>>,
}

impl Styleable for View {
    fn identity_tag(&self) -> &str {
        "View"
    }

    fn has_property(&self, path: &str) -> bool {
        self.properties.contains_key(path)
    }

    fn property_value(&self, path: &str) -> Option<ResolvedValue> {
        self.properties.get(path).cloned().flatten()
    }

    fn set_property(&mut self, path: &str, value: Option<ResolvedValue>) {
        self.properties.insert(path.to_string(), value);
    }
}

fn bundle_engine(loader: MemoryLoader) -> StyleEngine {
    StyleEngine::with_loader(EngineConfig::new().with_bundle("app"), loader)
}

#[test]
fn reload_from_disk_picks_up_changes() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.less"), ".View { x: 1; }").unwrap();
    let engine = StyleEngine::new(EngineConfig::new().with_base_dir(dir.path()));

    engine.reload().unwrap();
    let first = engine.compute_style(&StyleContext::new("View"));
    assert_eq!(first.get("x").unwrap().raw(), "1");

    fs::write(dir.path().join("main.less"), ".View { x: 2; }").unwrap();
    engine.reload().unwrap();
    let second = engine.compute_style(&StyleContext::new("View"));
    assert_eq!(second.get("x").unwrap().raw(), "2");
}

#[test]
fn failed_load_installs_empty_stylesheet_and_notifies() {
    let engine = bundle_engine(MemoryLoader::new());
    let notified = Rc::new(Cell::new(0));
    let counter = Rc::clone(&notified);
    engine.on_reload(move || counter.set(counter.get() + 1));

    engine.load_stylesheet(".View { x: 1; }").unwrap();
    assert_eq!(notified.get(), 1);

    let err = engine.load_stylesheet(".View { x: \"unterminated }").unwrap_err();
    assert!(matches!(err, StyleError::Lex(_)));
    assert_eq!(notified.get(), 2);
    assert!(engine.stylesheet().is_empty());
    assert!(engine.compute_style(&StyleContext::new("View")).is_empty());
}

#[test]
fn load_from_named_location() {
    let loader = MemoryLoader::new()
        .with_source("themes", "night.less", "@global { @tint = #000; }")
        .with_source("app", "main.less", ".View { }");
    let engine = bundle_engine(loader);

    engine
        .load_stylesheet_from_file("night", "less", &Location::bundle("themes"))
        .unwrap();
    assert!(engine.variable("tint").is_some());
}

#[test]
fn snapshot_is_never_partially_replaced() {
    let engine = bundle_engine(MemoryLoader::new());
    engine.load_stylesheet(".View { a: 1; b: 1; }").unwrap();
    let before = engine.stylesheet();

    assert!(engine.load_stylesheet(".View { a: 2; b: @undefined; }").is_err());
    let rule = before.rules().iter().next().unwrap().1;
    assert_eq!(rule.get("a").unwrap().raw(), "1");
    assert_eq!(rule.get("b").unwrap().raw(), "1");
    assert!(engine.stylesheet().is_empty());
}

#[test]
fn subscribers_can_refresh_proxies() {
    let engine = Rc::new(bundle_engine(MemoryLoader::new()));
    let view = Rc::new(RefCell::new(View::default()));
    view.borrow_mut().properties.insert("alpha".to_string(), None);
    reflektor::set_color_mode_detector(|| ColorMode::Light);
    let proxy = Rc::new(RefCell::new(StyleProxy::for_engine(&engine)));

    let weak = Rc::downgrade(&engine);
    let (held_view, held_proxy) = (Rc::clone(&view), Rc::clone(&proxy));
    engine.on_reload(move || {
        if let Some(engine) = weak.upgrade() {
            held_proxy
                .borrow_mut()
                .refresh(&engine, &mut *held_view.borrow_mut());
        }
    });

    engine.load_stylesheet(".View { alpha: 0.5; }").unwrap();
    assert_eq!(
        view.borrow().property_value("alpha"),
        Some(ResolvedValue::Literal(Literal::Number(0.5)))
    );

    engine.load_stylesheet(".Other { alpha: 1; }").unwrap();
    assert_eq!(view.borrow().property_value("alpha"), None);
}

#[test]
fn registered_plugins_compute_at_read_time() {
    let mut engine = bundle_engine(MemoryLoader::new());
    engine.register_plugin(Scaled);
    assert_eq!(engine.plugins().names(), vec!["constraint", "scaled"]);

    engine.load_stylesheet(".View { width: scaled(10); }").unwrap();
    let mut proxy = StyleProxy::new(false);
    let mut view = View::default();
    proxy.refresh(&engine, &mut view);

    assert_eq!(
        proxy.property("width", None).unwrap(),
        Some(Literal::Number(10.0).into())
    );

    let retina = reflektor::Environment::new()
        .with_traits(reflektor::TraitCollection::default().with_scale(2.0));
    proxy.set_environment(&engine, &mut view, retina);
    assert_eq!(
        proxy.property("width", None).unwrap(),
        Some(Literal::Number(20.0).into())
    );
}

#[test]
fn plugin_parse_errors_abort_the_load() {
    let mut engine = bundle_engine(MemoryLoader::new());
    engine.register_plugin(Scaled);
    let err = engine.load_stylesheet(".View { width: scaled(wide); }").unwrap_err();
    assert!(err.to_string().contains("scaled: not a number"), "{}", err);
}

#[test]
fn teardown_drops_subscribers() {
    let engine = bundle_engine(MemoryLoader::new());
    let token = Rc::new(());
    let held = Rc::clone(&token);
    engine.on_reload(move || {
        let _ = &held;
    });
    assert_eq!(Rc::strong_count(&token), 2);
    engine.teardown();
    assert_eq!(Rc::strong_count(&token), 1);
}
