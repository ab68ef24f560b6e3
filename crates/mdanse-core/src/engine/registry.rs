use super::error::{ConfigurationError, EngineError};
use super::job::JobDefinition;
use crate::core::instrument::coverage::{self, CoverageFactory};
use crate::core::instrument::method::{self, MethodFactory};
use crate::core::instrument::spectrum::{self, SpectrumFactory};
use crate::core::io::{self, OutputFormat};
use crate::core::math::qvectors::{self, QVectorFactory};
use crate::core::math::resolution::{self, ResolutionFactory};
use crate::core::selection::{self, Selector};
use crate::core::trajectory::{Trajectory, TrajectoryError, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Job,
    Selector,
    Format,
    Converter,
    /// Detector coverage models.
    Instrument,
    ScatteringMethod,
    Resolution,
    Spectrum,
    QVectors,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Job,
        Category::Selector,
        Category::Format,
        Category::Converter,
        Category::Instrument,
        Category::ScatteringMethod,
        Category::Resolution,
        Category::Spectrum,
        Category::QVectors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Job => "job",
            Category::Selector => "selector",
            Category::Format => "format",
            Category::Converter => "converter",
            Category::Instrument => "instrument",
            Category::ScatteringMethod => "scattering_method",
            Category::Resolution => "resolution",
            Category::Spectrum => "spectrum",
            Category::QVectors => "q_vectors",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

pub type OpenTrajectory = fn(&Path) -> Result<Arc<dyn Trajectory>, TrajectoryError>;

/// Opens trajectory files of a given format.
#[derive(Clone, Copy)]
pub struct Converter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub open: OpenTrajectory,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// A registrable component; its category follows from the variant.
#[derive(Clone)]
pub enum Component {
    Job(Arc<dyn JobDefinition>),
    Selector(Arc<dyn Selector>),
    Format(Arc<dyn OutputFormat>),
    Converter(Converter),
    Coverage(CoverageFactory),
    ScatteringMethod(MethodFactory),
    Resolution(ResolutionFactory),
    Spectrum(SpectrumFactory),
    QVectors(QVectorFactory),
}

impl Component {
    pub fn category(&self) -> Category {
        match self {
            Component::Job(_) => Category::Job,
            Component::Selector(_) => Category::Selector,
            Component::Format(_) => Category::Format,
            Component::Converter(_) => Category::Converter,
            Component::Coverage(_) => Category::Instrument,
            Component::ScatteringMethod(_) => Category::ScatteringMethod,
            Component::Resolution(_) => Category::Resolution,
            Component::Spectrum(_) => Category::Spectrum,
            Component::QVectors(_) => Category::QVectors,
        }
    }
}

/// A registrant that was skipped at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationWarning {
    pub category: Category,
    pub name: String,
    pub cause: String,
}

impl fmt::Display for RegistrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' unavailable: {}", self.category, self.name, self.cause)
    }
}

/// Name to component map, one namespace per [`Category`].
///
/// Filled once at startup, then frozen; a frozen registry rejects further
/// registrations.
#[derive(Default)]
pub struct Registry {
    components: BTreeMap<(Category, String), Component>,
    warnings: Vec<RegistrationWarning>,
    frozen: bool,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("warnings", &self.warnings)
            .field("frozen", &self.frozen)
            .finish()
    }
}

fn open_json(path: &Path) -> Result<Arc<dyn Trajectory>, TrajectoryError> {
    Ok(Arc::new(json::read_trajectory(path)?))
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every component shipped with the engine, frozen.
    pub fn with_defaults() -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        crate::jobs::register(&mut registry)?;
        registry.register_core()?;
        registry.freeze();
        debug!(
            components = registry.components.len(),
            warnings = registry.warnings.len(),
            "Registry initialized"
        );
        Ok(registry)
    }

    fn register_core(&mut self) -> Result<(), ConfigurationError> {
        for selector in selection::builtin() {
            self.register(selector.name(), Component::Selector(selector))?;
        }
        for format in io::builtin() {
            self.register(format.name(), Component::Format(format))?;
        }
        for (name, cause) in io::unavailable() {
            self.warn(Category::Format, name, cause);
        }
        self.register(
            "json",
            Component::Converter(Converter {
                name: "json",
                extensions: &["json"],
                open: open_json,
            }),
        )?;
        for (name, factory) in coverage::builtin() {
            self.register(name, Component::Coverage(factory))?;
        }
        for (name, factory) in method::builtin() {
            self.register(name, Component::ScatteringMethod(factory))?;
        }
        for (name, factory) in spectrum::builtin() {
            self.register(name, Component::Spectrum(factory))?;
        }
        for (name, factory) in resolution::builtin() {
            self.register(name, Component::Resolution(factory))?;
        }
        for (name, factory) in qvectors::builtin() {
            self.register(name, Component::QVectors(factory))?;
        }
        Ok(())
    }

    pub fn register(&mut self, name: &str, component: Component) -> Result<(), ConfigurationError> {
        let category = component.category();
        if self.frozen {
            return Err(ConfigurationError::new(
                format!("{category}:{name}"),
                "registration",
                name,
                "the registry is frozen",
            ));
        }
        let key = (category, name.to_string());
        if self.components.contains_key(&key) {
            return Err(ConfigurationError::new(
                format!("{category}:{name}"),
                "registration",
                name,
                "duplicate registration",
            ));
        }
        self.components.insert(key, component);
        Ok(())
    }

    /// Records a registrant that could not be enabled; the program goes on
    /// without it.
    pub fn warn(&mut self, category: Category, name: &str, cause: &str) {
        warn!(%category, name, cause, "Component unavailable");
        self.warnings.push(RegistrationWarning {
            category,
            name: name.to_string(),
            cause: cause.to_string(),
        });
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn warnings(&self) -> &[RegistrationWarning] {
        &self.warnings
    }

    /// Registered names of a category, sorted.
    pub fn names(&self, category: Category) -> Vec<&str> {
        self.components
            .keys()
            .filter(|(c, _)| *c == category)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    fn get(&self, category: Category, name: &str) -> Result<&Component, EngineError> {
        self.components
            .get(&(category, name.to_string()))
            .ok_or_else(|| EngineError::UnknownName {
                category,
                name: name.to_string(),
            })
    }

    fn mismatch(category: Category, name: &str) -> EngineError {
        EngineError::Internal(format!("{category} '{name}' registered under the wrong kind"))
    }

    pub fn job(&self, name: &str) -> Result<Arc<dyn JobDefinition>, EngineError> {
        match self.get(Category::Job, name)? {
            Component::Job(job) => Ok(job.clone()),
            _ => Err(Self::mismatch(Category::Job, name)),
        }
    }

    pub fn jobs(&self) -> Vec<Arc<dyn JobDefinition>> {
        self.components
            .values()
            .filter_map(|c| match c {
                Component::Job(job) => Some(job.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn selector(&self, name: &str) -> Result<Arc<dyn Selector>, EngineError> {
        match self.get(Category::Selector, name)? {
            Component::Selector(selector) => Ok(selector.clone()),
            _ => Err(Self::mismatch(Category::Selector, name)),
        }
    }

    pub fn selectors(&self) -> Vec<Arc<dyn Selector>> {
        self.components
            .values()
            .filter_map(|c| match c {
                Component::Selector(selector) => Some(selector.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn format(&self, name: &str) -> Result<Arc<dyn OutputFormat>, EngineError> {
        match self.get(Category::Format, name)? {
            Component::Format(format) => Ok(format.clone()),
            _ => Err(Self::mismatch(Category::Format, name)),
        }
    }

    pub fn converter(&self, name: &str) -> Result<Converter, EngineError> {
        match self.get(Category::Converter, name)? {
            Component::Converter(converter) => Ok(*converter),
            _ => Err(Self::mismatch(Category::Converter, name)),
        }
    }

    /// The converter whose extensions include the extension of `path`.
    pub fn converter_for(&self, path: &Path) -> Result<Converter, EngineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        self.components
            .values()
            .find_map(|c| match c {
                Component::Converter(converter) if converter.extensions.contains(&extension.as_str()) => {
                    Some(*converter)
                }
                _ => None,
            })
            .ok_or_else(|| EngineError::UnknownName {
                category: Category::Converter,
                name: extension,
            })
    }

    pub fn coverage(&self, name: &str) -> Result<CoverageFactory, EngineError> {
        match self.get(Category::Instrument, name)? {
            Component::Coverage(factory) => Ok(*factory),
            _ => Err(Self::mismatch(Category::Instrument, name)),
        }
    }

    pub fn scattering_method(&self, name: &str) -> Result<MethodFactory, EngineError> {
        match self.get(Category::ScatteringMethod, name)? {
            Component::ScatteringMethod(factory) => Ok(*factory),
            _ => Err(Self::mismatch(Category::ScatteringMethod, name)),
        }
    }

    pub fn resolution(&self, name: &str) -> Result<ResolutionFactory, EngineError> {
        match self.get(Category::Resolution, name)? {
            Component::Resolution(factory) => Ok(*factory),
            _ => Err(Self::mismatch(Category::Resolution, name)),
        }
    }

    pub fn spectrum(&self, name: &str) -> Result<SpectrumFactory, EngineError> {
        match self.get(Category::Spectrum, name)? {
            Component::Spectrum(factory) => Ok(*factory),
            _ => Err(Self::mismatch(Category::Spectrum, name)),
        }
    }

    pub fn q_vectors(&self, name: &str) -> Result<QVectorFactory, EngineError> {
        match self.get(Category::QVectors, name)? {
            Component::QVectors(factory) => Ok(*factory),
            _ => Err(Self::mismatch(Category::QVectors, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::ascii::AsciiFormat;

    #[test]
    fn defaults_cover_every_category() {
        let registry = Registry::with_defaults().unwrap();
        for category in Category::ALL {
            assert!(!registry.names(category).is_empty(), "{category}");
        }
        assert!(registry.is_frozen());
        assert!(registry.names(Category::Selector).contains(&"atom_element"));
        assert!(registry.names(Category::Job).contains(&"mean_square_displacement"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = Registry::new();
        registry.register("ascii", Component::Format(Arc::new(AsciiFormat))).unwrap();
        let err = registry
            .register("ascii", Component::Format(Arc::new(AsciiFormat)))
            .unwrap_err();
        assert_eq!(err.cause, "duplicate registration");
    }

    #[test]
    fn same_name_in_different_categories_is_allowed() {
        let mut registry = Registry::new();
        registry.register("ideal", Component::Coverage(coverage::builtin()[0].1)).unwrap();
        registry.register("ideal", Component::Resolution(resolution::builtin()[0].1)).unwrap();
        assert!(registry.coverage("ideal").is_ok());
        assert!(registry.resolution("ideal").is_ok());
    }

    #[test]
    fn frozen_registry_rejects_registrations() {
        let mut registry = Registry::with_defaults().unwrap();
        let result = registry.register("late", Component::Format(Arc::new(AsciiFormat)));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_names_report_their_category() {
        let registry = Registry::with_defaults().unwrap();
        match registry.selector("no_such_selector") {
            Err(EngineError::UnknownName { category, name }) => {
                assert_eq!(category, Category::Selector);
                assert_eq!(name, "no_such_selector");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("unknown selector resolved"),
        }
    }

    #[test]
    fn converters_are_found_by_extension() {
        let registry = Registry::with_defaults().unwrap();
        assert_eq!(registry.converter_for(Path::new("run/traj.JSON")).unwrap().name, "json");
        assert!(registry.converter_for(Path::new("traj.xyz")).is_err());
    }

    #[test]
    fn missing_optional_formats_are_warnings() {
        let registry = Registry::with_defaults().unwrap();
        let hdf5_registered = registry.names(Category::Format).contains(&"hdf5");
        let hdf5_warned = registry.warnings().iter().any(|w| w.name == "hdf5");
        assert!(hdf5_registered ^ hdf5_warned);
    }

    #[test]
    fn categories_parse_from_their_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert!("widgets".parse::<Category>().is_err());
    }
}
