//! # Manifest Reconciliation
//!
//! Brings a manifest's service list back in line with the code's service
//! order (the order services were registered in the [`TypeCatalog`]).
//!
//! Existing entries keep their settings. Services missing from the manifest
//! are added inactive with [`PolicySetting::OnDemandWithWarning`], so a
//! forgotten dependency shows up as a warning instead of breaking. Entries the
//! code no longer knows are dropped.

use std::fmt;

use crate::catalog::TypeCatalog;
use crate::manifest::{Manifest, PolicySetting, ServiceEntry};

/// What a [`Manifest::reconcile`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Service entries before reconciling.
    pub previous_count: usize,
    /// Service entries after reconciling.
    pub current_count: usize,
    /// Names added as inactive entries.
    pub added: Vec<String>,
    /// Names dropped because the catalog no longer registers them.
    pub removed: Vec<String>,
}

impl ReconcileReport {
    /// Returns true if no entry was added or dropped.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "previously {} entries, now {}; {} added: [{}]; {} removed: [{}]",
            self.previous_count,
            self.current_count,
            self.added.len(),
            self.added.join(", "),
            self.removed.len(),
            self.removed.join(", ")
        )
    }
}

impl Manifest {
    /// Returns true if the service list differs from the catalog's service
    /// order (length, names or order).
    #[must_use]
    pub fn needs_refresh(&self, catalog: &TypeCatalog) -> bool {
        let expected = catalog.service_names();
        self.services.len() != expected.len()
            || self
                .services
                .iter()
                .zip(expected)
                .any(|(entry, name)| &entry.name != name)
    }

    /// Rebuilds the service list in the catalog's service order.
    pub fn reconcile(&mut self, catalog: &TypeCatalog) -> ReconcileReport {
        let mut previous = std::mem::take(&mut self.services);
        let mut report = ReconcileReport {
            previous_count: previous.len(),
            ..ReconcileReport::default()
        };

        for name in catalog.service_names() {
            match previous.iter().position(|entry| &entry.name == name) {
                Some(index) => self.services.push(previous.remove(index)),
                None => {
                    self.services
                        .push(ServiceEntry::new(name.clone(), false, PolicySetting::OnDemandWithWarning));
                    report.added.push(name.clone());
                }
            }
        }

        report.removed = previous.into_iter().map(|entry| entry.name).collect();
        report.current_count = self.services.len();

        if report.is_unchanged() {
            tracing::debug!(%report, "service list reordered");
        } else {
            tracing::info!(%report, "service list updated");
        }
        report
    }
}
