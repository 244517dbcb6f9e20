use crate::aggregate::{AggregateCollector, Instantiated};
use crate::{compute, dataproc, snapshot, CollectorContext, CollectorFactory};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("collector {0} is already registered")]
    Duplicate(String),

    #[error("unknown collector: {0}")]
    UnknownCollector(String),
}

struct Registration {
    factory: CollectorFactory,
    default_enabled: bool,
    /// Explicit operator choice, overrides the default.
    selected: Option<bool>,
    /// Held for the whole `update` of this collector, across scrapes.
    gate: Arc<Mutex<()>>,
}

/// Named collector constructors and their enable state.
///
/// Built and configured once at startup, then shared read-only with the
/// request handlers.
///
/// # Examples
///
/// ```
/// use idleness_collector::CollectorRegistry;
///
/// let mut registry = CollectorRegistry::with_builtin().unwrap();
/// assert_eq!(registry.is_enabled("gce_disk_snapshot"), Some(true));
/// assert_eq!(registry.is_enabled("gce_disk_snapshot_amount"), Some(false));
///
/// registry.set_disable_defaults(true);
/// assert_eq!(registry.is_enabled("gce_disk_snapshot"), Some(false));
/// assert_eq!(registry.is_enabled("nonexistent"), None);
/// ```
#[derive(Default)]
pub struct CollectorRegistry {
    entries: BTreeMap<&'static str, Registration>,
    disable_defaults: bool,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every collector shipped with the exporter.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        compute::register(&mut registry)?;
        snapshot::register(&mut registry)?;
        dataproc::register(&mut registry)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: &'static str,
        default_enabled: bool,
        factory: CollectorFactory,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.entries.insert(
            name,
            Registration {
                factory,
                default_enabled,
                selected: None,
                gate: Arc::new(Mutex::new(())),
            },
        );
        Ok(())
    }

    /// Flips every default to disabled. Explicit selections still apply.
    pub fn set_disable_defaults(&mut self, disable: bool) {
        self.disable_defaults = disable;
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownCollector(name.to_string()))?;
        entry.selected = Some(enabled);
        Ok(())
    }

    /// Applies an operator selection. `disabled` wins over `enabled`.
    pub fn apply_selection(
        &mut self,
        disable_defaults: bool,
        enabled: &[String],
        disabled: &[String],
    ) -> Result<(), RegistryError> {
        self.set_disable_defaults(disable_defaults);
        for name in enabled {
            self.set_enabled(name, true)?;
        }
        for name in disabled {
            self.set_enabled(name, false)?;
        }
        Ok(())
    }

    /// `None` for names that were never registered.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|entry| {
            entry
                .selected
                .unwrap_or(entry.default_enabled && !self.disable_defaults)
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn enabled_names(&self) -> Vec<&'static str> {
        self.names()
            .into_iter()
            .filter(|name| self.is_enabled(name) == Some(true))
            .collect()
    }

    /// Constructs every enabled collector for one scrape. A constructor that
    /// fails is logged and left out.
    pub fn instantiate_enabled(&self, ctx: &CollectorContext) -> AggregateCollector {
        let mut collectors = Vec::new();
        for (&name, entry) in &self.entries {
            if self.is_enabled(name) != Some(true) {
                continue;
            }
            match (entry.factory)(ctx) {
                Ok(collector) => collectors.push(Instantiated {
                    name,
                    collector,
                    gate: entry.gate.clone(),
                }),
                Err(e) => {
                    tracing::error!(collector = name, project = %ctx.project, error = %e, "Failed to create collector")
                }
            }
        }
        AggregateCollector::new(collectors)
    }
}
