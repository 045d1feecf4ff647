//! The style engine.
//!
//! A [`StyleEngine`] owns the installed [`Stylesheet`], the value plugins and
//! the reload subscribers. Loading parses a complete stylesheet first and then
//! swaps it in with a single assignment, so a reader never sees a partially
//! built table. A failed load installs an empty stylesheet and still returns
//! the error.
//!
//! The engine holds `Rc`/`RefCell` state and is neither `Send` nor `Sync`: it
//! lives on the thread that created it, typically the UI thread.
//!
//! ```compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<reflektor::StyleEngine>();
//! ```
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use reflektor::{EngineConfig, StyleContext, StyleEngine};
//!
//! let engine = StyleEngine::new(EngineConfig::default());
//! let reloads = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&reloads);
//! engine.on_reload(move || counter.set(counter.get() + 1));
//!
//! engine.load_stylesheet(".Button[width > 320] { title: \"wide\"; }").unwrap();
//! assert_eq!(reloads.get(), 1);
//!
//! let style = engine.compute_style(&StyleContext::new("Button").with_size(400.0, 44.0));
//! assert_eq!(style.get("title").unwrap().raw(), "\"wide\"");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::StyleContext;
use crate::error::StyleError;
use crate::loader::{FsLoader, Location, StylesheetLoader};
use crate::parser::Parser;
use crate::plugin::{PluginRegistry, PropertyValuePlugin};
use crate::resolver::{self, ComputedStyle};
use crate::stylesheet::{Stylesheet, Value};

/// Handle returned by [`StyleEngine::on_reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ReloadCallback = Rc<dyn Fn()>;

/// A stylesheet file: name, extension and where to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceFile {
    name: String,
    extension: String,
    location: Location,
}

pub struct StyleEngine {
    config: EngineConfig,
    loader: Box<dyn StylesheetLoader>,
    plugins: PluginRegistry,
    stylesheet: RefCell<Rc<Stylesheet>>,
    /// File [`reload`](Self::reload) loads; the configured entry point until
    /// a file is loaded explicitly.
    source_file: RefCell<SourceFile>,
    subscribers: RefCell<Vec<(SubscriptionId, ReloadCallback)>>,
    next_id: Cell<u64>,
}

impl StyleEngine {
    /// An engine that loads files from disk.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_loader(config, FsLoader::new())
    }

    pub fn with_loader(config: EngineConfig, loader: impl StylesheetLoader + 'static) -> Self {
        let plugins = if config.builtin_plugins {
            PluginRegistry::with_builtins()
        } else {
            PluginRegistry::new()
        };
        let source_file = SourceFile {
            name: config.entry_point.name.clone(),
            extension: config.entry_point.extension.clone(),
            location: config.location(),
        };
        Self {
            config,
            loader: Box::new(loader),
            plugins,
            stylesheet: RefCell::new(Rc::new(Stylesheet::empty())),
            source_file: RefCell::new(source_file),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Appends a value plugin. It takes part in the next load.
    pub fn register_plugin<P: PropertyValuePlugin + 'static>(&mut self, plugin: P) {
        self.plugins.register(plugin);
        debug!(plugins = ?self.plugins.names(), "registered value plugin");
    }

    /// Parses `text` and installs it. Imports resolve against the configured
    /// location.
    pub fn load_stylesheet(&self, text: &str) -> Result<(), StyleError> {
        let location = self.config.location();
        let result = Parser::new(&self.plugins)
            .with_loader(self.loader.as_ref(), location)
            .with_default_extension(self.config.entry_point.extension.as_str())
            .parse_stylesheet(text);
        self.install(result, "inline stylesheet")
    }

    /// Loads `name.extension` from `location` and installs it. The file
    /// becomes the one [`reload`](Self::reload) loads, even if loading fails.
    pub fn load_stylesheet_from_file(
        &self,
        name: &str,
        extension: &str,
        location: &Location,
    ) -> Result<(), StyleError> {
        self.source_file.replace(SourceFile {
            name: name.to_string(),
            extension: extension.to_string(),
            location: location.clone(),
        });
        let result = Parser::new(&self.plugins)
            .with_loader(self.loader.as_ref(), location.clone())
            .parse_file(name, extension);
        self.install(result, &format!("{}.{}", name, extension))
    }

    /// Reloads the last file loaded, or the configured entry point.
    pub fn reload(&self) -> Result<(), StyleError> {
        let SourceFile {
            name,
            extension,
            location,
        } = self.source_file.borrow().clone();
        self.load_stylesheet_from_file(&name, &extension, &location)
    }

    fn install(&self, result: Result<Stylesheet, StyleError>, source: &str) -> Result<(), StyleError> {
        let outcome = match result {
            Ok(stylesheet) => {
                info!(
                    source,
                    selectors = stylesheet.rules().len(),
                    variables = stylesheet.variables().len(),
                    "installed stylesheet"
                );
                self.stylesheet.replace(Rc::new(stylesheet));
                Ok(())
            }
            Err(err) => {
                warn!(source, error = %err, "failed to load stylesheet, installing an empty one");
                self.stylesheet.replace(Rc::new(Stylesheet::empty()));
                Err(err)
            }
        };
        self.notify();
        outcome
    }

    fn notify(&self) {
        // Callbacks may subscribe or unsubscribe.
        let callbacks: Vec<ReloadCallback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// The installed stylesheet. The snapshot stays valid across reloads.
    pub fn stylesheet(&self) -> Rc<Stylesheet> {
        Rc::clone(&self.stylesheet.borrow())
    }

    pub fn compute_style(&self, context: &StyleContext) -> ComputedStyle {
        resolver::compute_style(&self.stylesheet(), context)
    }

    /// An `@global` variable of the installed stylesheet.
    pub fn variable(&self, key: &str) -> Option<Value> {
        self.stylesheet.borrow().variable(key).cloned()
    }

    /// Calls `callback` after every install, successful or not, in
    /// subscription order.
    pub fn on_reload(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Drops the stylesheet and every subscriber.
    pub fn teardown(self) {
        let subscribers = self.subscribers.borrow().len();
        info!(subscribers, "style engine torn down");
    }
}

impl fmt::Debug for StyleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleEngine")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .field("selectors", &self.stylesheet.borrow().rules().len())
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}
