//! # Manifest
//!
//! TOML description of a frame's declared order and its services.
//!
//! ```toml
//! [dispatch]
//! order = ["ServiceRegistry", "Satellite"]
//!
//! [[services]]
//! name = "Clock"
//! active = true
//! policy = "eager"
//!
//! [[services]]
//! name = "Audio"
//! policy = "on_demand"
//! preset = { volume = 0.5 }
//! ```
//!
//! Loading validates structure only. [`Manifest::resolve`] turns names into
//! types through a [`TypeCatalog`].

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use orrery_core::{ConstructionPolicy, ServiceDescriptor, TypeKey};
use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::error::{ConfigError, ConfigResult};

/// Construction policy as written in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySetting {
    /// See [`ConstructionPolicy::Eager`].
    Eager,
    /// See [`ConstructionPolicy::OnDemand`].
    OnDemand,
    /// See [`ConstructionPolicy::OnDemandWithWarning`].
    #[default]
    OnDemandWithWarning,
}

impl From<PolicySetting> for ConstructionPolicy {
    fn from(setting: PolicySetting) -> Self {
        match setting {
            PolicySetting::Eager => Self::Eager,
            PolicySetting::OnDemand => Self::OnDemand,
            PolicySetting::OnDemandWithWarning => Self::OnDemandWithWarning,
        }
    }
}

impl fmt::Display for PolicySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&ConstructionPolicy::from(*self), f)
    }
}

/// The `[dispatch]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchManifest {
    /// Declared type order of the frame dispatcher.
    pub order: Vec<String>,
}

/// One `[[services]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Catalog name of the service type.
    pub name: String,
    /// Whether the service may be constructed at all.
    #[serde(default = "default_active")]
    pub active: bool,
    /// When the service is constructed.
    #[serde(default)]
    pub policy: PolicySetting,
    /// Template fields cloned into every instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<toml::Table>,
}

fn default_active() -> bool {
    true
}

impl ServiceEntry {
    /// An entry with no preset.
    #[must_use]
    pub fn new(name: impl Into<String>, active: bool, policy: PolicySetting) -> Self {
        Self {
            name: name.into(),
            active,
            policy,
            preset: None,
        }
    }
}

impl fmt::Display for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active {
            write!(f, "{}: [ACTIVE: {}]", self.name, self.policy)
        } else {
            write!(f, "{}: [inactive]", self.name)
        }
    }
}

/// A whole manifest file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// The `[dispatch]` section.
    pub dispatch: DispatchManifest,
    /// The `[[services]]` entries, in declared order.
    pub services: Vec<ServiceEntry>,
}

/// A manifest resolved against a catalog.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    /// Declared order for the frame dispatcher.
    pub dispatch_order: Vec<TypeKey>,
    /// Descriptors for the service registry, in declared order.
    pub services: Vec<ServiceDescriptor>,
}

impl Manifest {
    /// Parses and validates a manifest.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::DuplicateType`] for a name listed twice in a section.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let manifest: Self = toml::from_str(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads, parses and validates a manifest file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Manifest::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        let manifest = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            dispatch = manifest.dispatch.order.len(),
            services = manifest.services.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Serialises the manifest back to TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] if a preset holds a value TOML cannot
    /// represent in its position.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the manifest to `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    }

    /// Rejects names listed twice in one section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateType`] naming the first repeated entry.
    pub fn validate(&self) -> ConfigResult<()> {
        ensure_unique(self.dispatch.order.iter().map(String::as_str), "dispatch")?;
        ensure_unique(self.services.iter().map(|entry| entry.name.as_str()), "services")
    }

    /// Resolves every name through `catalog`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`], [`ConfigError::NotAService`] or
    /// [`ConfigError::InvalidPreset`] for the first entry that fails, and
    /// [`ConfigError::DuplicateType`] as in [`Manifest::validate`].
    pub fn resolve(&self, catalog: &TypeCatalog) -> ConfigResult<ResolvedManifest> {
        self.validate()?;

        let dispatch_order = self
            .dispatch
            .order
            .iter()
            .map(|name| {
                catalog
                    .type_key(name)
                    .ok_or_else(|| ConfigError::UnknownType(name.clone()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let services = self
            .services
            .iter()
            .map(|entry| {
                Ok(catalog
                    .service_descriptor(&entry.name, entry.preset.as_ref())?
                    .active(entry.active)
                    .policy(entry.policy.into()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        tracing::debug!(
            dispatch = dispatch_order.len(),
            services = services.len(),
            "manifest resolved"
        );
        Ok(ResolvedManifest {
            dispatch_order,
            services,
        })
    }

    /// One line per service entry: `Name: [ACTIVE: policy]` or
    /// `Name: [inactive]`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.services
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn ensure_unique<'a>(names: impl Iterator<Item = &'a str>, section: &'static str) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateType {
                name: name.to_owned(),
                section,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[dispatch]
order = ["ServiceRegistry", "Satellite"]

[[services]]
name = "Clock"
policy = "eager"

[[services]]
name = "Audio"
active = false
preset = { volume = 0.5 }
"#;

    #[test]
    fn test_parse_defaults() {
        let manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        assert_eq!(manifest.dispatch.order, vec!["ServiceRegistry", "Satellite"]);
        assert_eq!(manifest.services.len(), 2);
        assert!(manifest.services[0].active);
        assert_eq!(manifest.services[0].policy, PolicySetting::Eager);
        assert_eq!(manifest.services[1].policy, PolicySetting::OnDemandWithWarning);
        assert!(manifest.services[1].preset.is_some());
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = Manifest::from_toml_str("").unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let source = "[dispatch]\norder = [\"A\", \"B\", \"A\"]\n";
        assert_eq!(
            Manifest::from_toml_str(source),
            Err(ConfigError::DuplicateType {
                name: "A".to_owned(),
                section: "dispatch",
            })
        );
    }

    #[test]
    fn test_bad_policy_is_parse_error() {
        let source = "[[services]]\nname = \"Clock\"\npolicy = \"sometimes\"\n";
        assert!(matches!(Manifest::from_toml_str(source), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_describe() {
        let manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        assert_eq!(manifest.describe(), "Clock: [ACTIVE: eager]\nAudio: [inactive]");
    }

    #[test]
    fn test_toml_text_survives_reload() {
        let manifest = Manifest::from_toml_str(SAMPLE).unwrap();
        let text = manifest.to_toml_string().unwrap();
        assert_eq!(Manifest::from_toml_str(&text).unwrap(), manifest);
    }
}
