//! # ORRERY Configuration
//!
//! Startup-time configuration for the runtime core:
//! - `Manifest`: TOML file naming the frame's declared order and the services
//! - `TypeCatalog`: the explicit name -> type registrations manifests resolve against
//! - Reconciliation of a manifest against the code's service order
//!
//! ## Example
//!
//! ```rust
//! use orrery_config::{Manifest, TypeCatalog};
//!
//! let manifest = Manifest::from_toml_str(r#"
//!     [dispatch]
//!     order = ["ServiceRegistry"]
//! "#).unwrap();
//!
//! let resolved = manifest.resolve(&TypeCatalog::new()).unwrap();
//! assert_eq!(resolved.dispatch_order.len(), 1);
//! assert!(resolved.services.is_empty());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod error;
pub mod manifest;
pub mod reconcile;

pub use catalog::{TypeCatalog, SERVICE_REGISTRY_NAME};
pub use error::{ConfigError, ConfigResult};
pub use manifest::{DispatchManifest, Manifest, PolicySetting, ResolvedManifest, ServiceEntry};
pub use reconcile::ReconcileReport;
