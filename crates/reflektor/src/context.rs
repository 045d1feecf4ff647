//! The context a style is resolved against.
//!
//! A [`StyleContext`] names the element being styled (its class identity and
//! optional trait tag) and carries the [`Environment`] conditions are evaluated
//! in: the trait collection (size classes, idiom, scale, light/dark
//! appearance), the element's size, and free-form environment values.
//!
//! # Color mode
//!
//! [`TraitCollection::default`] is light. [`TraitCollection::detected`], and
//! so every proxy created with
//! [`StyleProxy::for_engine`](crate::StyleProxy::for_engine), takes the
//! appearance from the OS preference, queried through the `dark-light` crate.
//! Use [`set_color_mode_detector`] to override detection in tests:
//!
//! ```rust
//! use reflektor::{set_color_mode_detector, ColorMode, TraitCollection};
//!
//! set_color_mode_detector(|| ColorMode::Dark);
//! assert_eq!(TraitCollection::detected().appearance, ColorMode::Dark);
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use dark_light::{detect as detect_os_mode, Mode as OsMode};
use once_cell::sync::Lazy;

use crate::condition::{EvalContext, Scalar};

/// Light or dark appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }
}

type ColorModeDetector = fn() -> ColorMode;

static COLOR_MODE_DETECTOR: Lazy<Mutex<ColorModeDetector>> =
    Lazy::new(|| Mutex::new(os_color_mode));

/// Overrides the detector used to determine the OS color mode.
pub fn set_color_mode_detector(detector: ColorModeDetector) {
    let mut guard = COLOR_MODE_DETECTOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = detector;
}

/// Detects the user's preferred color mode.
///
/// Unless overridden with [`set_color_mode_detector`], this asks the OS; an
/// unknown or failed detection counts as [`ColorMode::Light`].
pub fn detect_color_mode() -> ColorMode {
    let detector = COLOR_MODE_DETECTOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    (*detector)()
}

fn os_color_mode() -> ColorMode {
    match detect_os_mode() {
        Ok(OsMode::Dark) => ColorMode::Dark,
        _ => ColorMode::Light,
    }
}

/// Horizontal or vertical size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeClass {
    #[default]
    Unspecified,
    Compact,
    Regular,
}

impl SizeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeClass::Unspecified => "unspecified",
            SizeClass::Compact => "compact",
            SizeClass::Regular => "regular",
        }
    }
}

/// Kind of device the interface runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Idiom {
    #[default]
    Unspecified,
    Phone,
    Pad,
    Tv,
    Desktop,
}

impl Idiom {
    pub fn as_str(self) -> &'static str {
        match self {
            Idiom::Unspecified => "unspecified",
            Idiom::Phone => "phone",
            Idiom::Pad => "pad",
            Idiom::Tv => "tv",
            Idiom::Desktop => "desktop",
        }
    }
}

/// Width and height in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Interface traits of the styled element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraitCollection {
    pub horizontal: SizeClass,
    pub vertical: SizeClass,
    pub idiom: Idiom,
    pub scale: f64,
    pub appearance: ColorMode,
}

impl Default for TraitCollection {
    fn default() -> Self {
        Self {
            horizontal: SizeClass::Unspecified,
            vertical: SizeClass::Unspecified,
            idiom: Idiom::Unspecified,
            scale: 1.0,
            appearance: ColorMode::Light,
        }
    }
}

impl TraitCollection {
    /// Default traits with the appearance taken from [`detect_color_mode`].
    pub fn detected() -> Self {
        Self::default().with_appearance(detect_color_mode())
    }

    pub fn with_horizontal(mut self, size_class: SizeClass) -> Self {
        self.horizontal = size_class;
        self
    }

    pub fn with_vertical(mut self, size_class: SizeClass) -> Self {
        self.vertical = size_class;
        self
    }

    pub fn with_idiom(mut self, idiom: Idiom) -> Self {
        self.idiom = idiom;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_appearance(mut self, appearance: ColorMode) -> Self {
        self.appearance = appearance;
        self
    }
}

/// Everything a condition can observe besides the element's trait tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    pub traits: TraitCollection,
    pub size: Size,
    /// Extra named values, looked up after the built-in attributes.
    pub values: BTreeMap<String, Scalar>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_traits(mut self, traits: TraitCollection) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Size::new(width, height);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// The element a style is computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleContext {
    /// Class identity, matched by `.Name` selectors.
    pub class: String,
    /// Trait tag, matched by `#name` selectors and `:name` qualifiers.
    pub trait_name: Option<String>,
    pub environment: Environment,
}

impl StyleContext {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            trait_name: None,
            environment: Environment::default(),
        }
    }

    pub fn with_trait(mut self, trait_name: impl Into<String>) -> Self {
        self.trait_name = Some(trait_name.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.environment.size = Size::new(width, height);
        self
    }

    pub fn with_traits(mut self, traits: TraitCollection) -> Self {
        self.environment.traits = traits;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.environment.values.insert(key.into(), value.into());
        self
    }

    pub fn eval_context(&self) -> EvalContext<'_> {
        EvalContext::new(&self.environment, self.trait_name.as_deref())
    }
}
