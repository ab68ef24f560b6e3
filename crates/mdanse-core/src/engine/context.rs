use super::error::{ConfigurationError, EngineError};
use super::registry::Registry;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

pub const NUM_WORKERS_VAR: &str = "MDANSE_NUM_WORKERS";
pub const TEMP_DIR_VAR: &str = "MDANSE_TEMP_DIR";

/// Process-level settings read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound on multiprocessor workers.
    pub max_workers: Option<usize>,
    /// Where outputs are staged before being moved into place.
    pub temp_dir: Option<PathBuf>,
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let max_workers = match lookup(NUM_WORKERS_VAR).filter(|v| !v.trim().is_empty()) {
            None => None,
            Some(raw) => Some(
                raw.trim()
                    .parse::<NonZeroUsize>()
                    .map_err(|_| {
                        ConfigurationError::new(
                            NUM_WORKERS_VAR,
                            "environment",
                            raw.clone(),
                            "expected a positive integer",
                        )
                    })?
                    .get(),
            ),
        };
        let temp_dir = lookup(TEMP_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        if let Some(dir) = &temp_dir {
            if !dir.is_dir() {
                return Err(ConfigurationError::new(
                    TEMP_DIR_VAR,
                    "environment",
                    dir.display().to_string(),
                    "not an existing directory",
                ));
            }
        }
        Ok(Self {
            max_workers,
            temp_dir,
        })
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers.max(1));
        self
    }

    /// The effective cap: the configured maximum, or the machine's
    /// parallelism.
    pub fn worker_cap(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Everything a job needs from its surroundings: the frozen registry and the
/// process settings. Built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct EngineContext {
    registry: Arc<Registry>,
    settings: EngineSettings,
}

impl EngineContext {
    pub fn new(registry: Arc<Registry>, settings: EngineSettings) -> Self {
        Self { registry, settings }
    }

    /// Default registry plus settings from the environment.
    pub fn from_env() -> Result<Self, EngineError> {
        let registry = Registry::with_defaults()?;
        let settings = EngineSettings::from_env()?;
        Ok(Self::new(Arc::new(registry), settings))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_give_defaults() {
        let settings = EngineSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings.worker_cap() >= 1);
    }

    #[test]
    fn worker_cap_is_parsed() {
        let settings = EngineSettings::from_lookup(lookup(&[(NUM_WORKERS_VAR, " 3 ")])).unwrap();
        assert_eq!(settings.max_workers, Some(3));
        assert_eq!(settings.worker_cap(), 3);
    }

    #[test]
    fn invalid_worker_caps_are_configuration_errors() {
        for raw in ["0", "-2", "many"] {
            let err = EngineSettings::from_lookup(lookup(&[(NUM_WORKERS_VAR, raw)])).unwrap_err();
            assert_eq!(err.slot, NUM_WORKERS_VAR);
        }
    }

    #[test]
    fn temp_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let settings = EngineSettings::from_lookup(lookup(&[(TEMP_DIR_VAR, &path)])).unwrap();
        assert_eq!(settings.temp_dir.as_deref(), Some(dir.path()));

        let missing = dir.path().join("missing").to_string_lossy().to_string();
        assert!(EngineSettings::from_lookup(lookup(&[(TEMP_DIR_VAR, &missing)])).is_err());
    }
}
