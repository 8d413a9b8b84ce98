//! # Phase Registry
//!
//! Bookkeeping for a single phase: one bucket per declared type plus a
//! catch-all bucket for registrants whose type was never declared.
//!
//! The registry only stores; the dispatcher decides which bucket a registrant
//! belongs to and in which order buckets are walked.

use std::any::TypeId;
use std::collections::HashMap;
use std::hash::Hash;

use crate::collections::DenseSet;

/// Address of a bucket inside a [`PhaseRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Bucket of a declared type.
    Ordered(TypeId),
    /// Catch-all bucket for undeclared types.
    Unordered,
}

/// Registrants of one phase, grouped by bucket.
///
/// A registrant lives in exactly one bucket: its type's ordered bucket if the
/// type is declared, the unordered bucket otherwise.
#[derive(Debug)]
pub struct PhaseRegistry<T> {
    /// Buckets keyed by declared type. Created on first registration and kept
    /// while empty so an enumeration in progress never loses its bucket.
    ordered: HashMap<TypeId, DenseSet<T>>,
    /// Registrants of undeclared types.
    unordered: DenseSet<T>,
}

impl<T> Default for PhaseRegistry<T> {
    fn default() -> Self {
        Self {
            ordered: HashMap::new(),
            unordered: DenseSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> PhaseRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registrant to a bucket.
    ///
    /// # Returns
    ///
    /// `false` if the registrant was already in that bucket.
    pub fn add(&mut self, bucket: Bucket, item: T) -> bool {
        match bucket {
            Bucket::Ordered(type_id) => self.ordered.entry(type_id).or_default().add(item),
            Bucket::Unordered => self.unordered.add(item),
        }
    }

    /// Removes a registrant from a bucket.
    ///
    /// # Returns
    ///
    /// `false` if the registrant was not in that bucket.
    pub fn remove(&mut self, bucket: Bucket, item: &T) -> bool {
        self.bucket_mut(bucket).is_some_and(|set| set.remove(item))
    }

    /// Returns true if the registrant is in the bucket.
    #[must_use]
    pub fn contains(&self, bucket: Bucket, item: &T) -> bool {
        self.bucket(bucket).is_some_and(|set| set.contains(item))
    }

    /// Looks up a bucket.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> Option<&DenseSet<T>> {
        match bucket {
            Bucket::Ordered(type_id) => self.ordered.get(&type_id),
            Bucket::Unordered => Some(&self.unordered),
        }
    }

    /// Looks up a bucket mutably.
    pub fn bucket_mut(&mut self, bucket: Bucket) -> Option<&mut DenseSet<T>> {
        match bucket {
            Bucket::Ordered(type_id) => self.ordered.get_mut(&type_id),
            Bucket::Unordered => Some(&mut self.unordered),
        }
    }

    /// Returns true if any ordered bucket holds a registrant.
    #[must_use]
    pub fn has_ordered_content(&self) -> bool {
        self.ordered.values().any(|set| !set.is_empty())
    }

    /// Returns true if the unordered bucket holds a registrant.
    #[must_use]
    pub fn has_unordered_content(&self) -> bool {
        !self.unordered.is_empty()
    }

    /// Total number of registrants across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.values().map(DenseSet::len).sum::<usize>() + self.unordered.len()
    }

    /// Returns true if no bucket holds a registrant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops empty ordered buckets that are not being enumerated.
    pub fn prune_empty(&mut self) {
        self.ordered
            .retain(|_, set| !set.is_empty() || set.is_enumerating());
    }

    /// Removes every registrant.
    pub fn clear(&mut self) {
        for set in self.ordered.values_mut() {
            set.clear();
        }
        self.unordered.clear();
    }
}
