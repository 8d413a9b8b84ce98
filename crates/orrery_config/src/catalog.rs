//! # Type Catalog
//!
//! The explicit name -> type mapping a manifest is resolved against. Every
//! type a manifest may name is registered once, in code, at startup.
//!
//! The registration order of services is the code's service order; it is what
//! [`Manifest::reconcile`](crate::Manifest::reconcile) restores.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use orrery_core::{Service, ServiceDescriptor, ServiceRegistry, TypeKey};
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, ConfigResult};

/// Name under which every catalog knows [`ServiceRegistry`] (the relay key).
pub const SERVICE_REGISTRY_NAME: &str = "ServiceRegistry";

/// Builds a descriptor from an optional preset table.
type DescriptorBuilder = Rc<dyn Fn(Option<&toml::Table>) -> ConfigResult<ServiceDescriptor>>;

/// Name -> type registrations used to resolve manifests.
///
/// # Example
///
/// ```rust
/// use orrery_config::TypeCatalog;
///
/// struct Satellite;
///
/// let mut catalog = TypeCatalog::new();
/// catalog.register_type::<Satellite>("Satellite").unwrap();
/// assert!(catalog.type_key("Satellite").is_some());
/// assert!(catalog.type_key("ServiceRegistry").is_some());
/// ```
#[derive(Clone)]
pub struct TypeCatalog {
    types: HashMap<String, TypeKey>,
    services: HashMap<String, DescriptorBuilder>,
    service_order: Vec<String>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        let mut types = HashMap::new();
        types.insert(SERVICE_REGISTRY_NAME.to_owned(), TypeKey::of::<ServiceRegistry>());
        Self {
            types,
            services: HashMap::new(),
            service_order: Vec::new(),
        }
    }
}

impl TypeCatalog {
    /// Creates a catalog knowing only [`SERVICE_REGISTRY_NAME`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dispatchable type under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRegistration`] if `name` is taken.
    pub fn register_type<T: ?Sized + 'static>(&mut self, name: impl Into<String>) -> ConfigResult<()> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(ConfigError::DuplicateRegistration(name));
        }
        tracing::debug!(%name, "catalog type registered");
        self.types.insert(name, TypeKey::of::<T>());
        Ok(())
    }

    /// Registers a service type under `name`, appending it to the code's
    /// service order.
    ///
    /// Manifest presets for the service are deserialised into `S`; fields a
    /// preset leaves out must be covered by `S`'s serde defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRegistration`] if `name` is taken.
    pub fn register_service<S>(&mut self, name: impl Into<String>) -> ConfigResult<()>
    where
        S: Service + Default + Clone + DeserializeOwned,
    {
        let name = name.into();
        self.register_type::<S>(name.clone())?;

        let preset_name = name.clone();
        let builder: DescriptorBuilder = Rc::new(move |preset: Option<&toml::Table>| match preset {
            None => Ok(ServiceDescriptor::of::<S>()),
            Some(table) => {
                let value: S = toml::Value::Table(table.clone()).try_into().map_err(
                    |error: toml::de::Error| ConfigError::InvalidPreset {
                        name: preset_name.clone(),
                        message: error.to_string(),
                    },
                )?;
                Ok(ServiceDescriptor::from_preset(value))
            }
        });

        self.services.insert(name.clone(), builder);
        self.service_order.push(name);
        Ok(())
    }

    /// Type registered under `name`.
    #[must_use]
    pub fn type_key(&self, name: &str) -> Option<TypeKey> {
        self.types.get(name).copied()
    }

    /// Returns true if `name` is a registered service.
    #[must_use]
    pub fn is_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Service names in registration (code) order.
    #[must_use]
    pub fn service_names(&self) -> &[String] {
        &self.service_order
    }

    /// Builds the descriptor of service `name`, with an optional preset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownType`] if `name` is unregistered,
    /// [`ConfigError::NotAService`] if it is not a service, and
    /// [`ConfigError::InvalidPreset`] if the preset does not deserialise.
    pub fn service_descriptor(
        &self,
        name: &str,
        preset: Option<&toml::Table>,
    ) -> ConfigResult<ServiceDescriptor> {
        match self.services.get(name) {
            Some(build) => build(preset),
            None if self.types.contains_key(name) => Err(ConfigError::NotAService(name.to_owned())),
            None => Err(ConfigError::UnknownType(name.to_owned())),
        }
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.types)
            .field("services", &self.service_order)
            .finish()
    }
}
