//! # Dense Set
//!
//! Unique-membership collection backed by a dense array plus a position map.
//!
//! - Each item is represented at most once (enforced)
//! - Add, remove and contains are O(1)
//! - Indexed iteration walks a contiguous array
//! - Order is mutable and not guaranteed: removal swaps the tail into the hole
//!
//! ## Enumeration Cursor
//!
//! Owners that must mutate the set while walking it (a dispatcher whose
//! callbacks unregister themselves, an event bus whose listeners unsubscribe)
//! use the cursor API instead of [`DenseSet::iter`]:
//!
//! ```text
//!   visited          next         unvisited
//! ┌─────┬─────┬─────┬─────┬─────┬─────┐
//! │  A  │  B  │  C  │  D  │  E  │  F  │
//! └─────┴─────┴─────┴─────┴─────┴─────┘
//!                    ^
//!                  cursor
//! ```
//!
//! Removing a slot at or after the cursor is an ordinary swap-remove: the tail
//! lands ahead of the cursor and is still visited. Removing a visited slot
//! first swaps it with the most recently visited slot, then swap-removes that
//! slot and steps the cursor back, so the tail that slides in is visited next.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{CoreError, CoreResult};

/// Dense, unique-membership collection with O(1) add/remove/contains.
///
/// # Type Parameters
///
/// * `T` - The element type; stored twice (array and map key), hence `Clone`
///
/// # Example
///
/// ```rust
/// use orrery_core::DenseSet;
///
/// let mut set = DenseSet::new();
/// assert!(set.add("clock"));
/// assert!(!set.add("clock"));
/// assert!(set.remove(&"clock"));
/// assert!(set.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct DenseSet<T> {
    /// The dense array.
    items: Vec<T>,
    /// Position of every element in `items`.
    indices: HashMap<T, usize>,
    /// Index of the next slot to visit while an enumeration is active.
    cursor: Option<usize>,
}

impl<T> Default for DenseSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            indices: HashMap::new(),
            cursor: None,
        }
    }
}

impl<T> DenseSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            indices: HashMap::with_capacity(capacity),
            cursor: None,
        }
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Gets the element at a dense position.
    ///
    /// # Returns
    ///
    /// The element, or None if `index` is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns the dense array.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates front-to-back over the current dense order.
    ///
    /// The iterator borrows the set, so the set cannot change underneath it.
    /// Use the cursor API to mutate during a walk.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns true while an enumeration is active.
    #[inline]
    #[must_use]
    pub fn is_enumerating(&self) -> bool {
        self.cursor.is_some()
    }

    /// Returns the index of the next slot the active enumeration will visit.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Starts an enumeration at the front of the dense array.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NestedEnumeration`] if an enumeration is already
    /// active; the active enumeration is left untouched.
    pub fn begin_enumeration(&mut self) -> CoreResult<()> {
        if self.cursor.is_some() {
            return Err(CoreError::NestedEnumeration);
        }
        self.cursor = Some(0);
        Ok(())
    }

    /// Ends the active enumeration. No-op if none is active.
    pub fn end_enumeration(&mut self) {
        self.cursor = None;
    }
}

impl<T: Eq + Hash + Clone> DenseSet<T> {
    /// Adds an element.
    ///
    /// Elements added during an enumeration land behind the cursor's unvisited
    /// range and are visited by that enumeration.
    ///
    /// # Returns
    ///
    /// `true` if the element was added, `false` if it was already present.
    pub fn add(&mut self, item: T) -> bool {
        if self.indices.contains_key(&item) {
            return false;
        }
        self.indices.insert(item.clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// Removes an element.
    ///
    /// # Returns
    ///
    /// `true` if the element was present.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.indices.get(item) {
            Some(&index) => {
                self.remove_slot(index);
                true
            }
            None => false,
        }
    }

    /// Removes the element at a dense position.
    ///
    /// # Returns
    ///
    /// The removed element, or None if `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.remove_slot(index))
    }

    /// Returns true if the element is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.indices.contains_key(item)
    }

    /// Returns the dense position of an element.
    #[inline]
    #[must_use]
    pub fn position(&self, item: &T) -> Option<usize> {
        self.indices.get(item).copied()
    }

    /// Removes every element. An active enumeration stays active and finds
    /// nothing left to visit.
    pub fn clear(&mut self) {
        self.items.clear();
        self.indices.clear();
        if let Some(cursor) = self.cursor.as_mut() {
            *cursor = 0;
        }
    }

    /// Advances the active enumeration.
    ///
    /// # Returns
    ///
    /// A clone of the next unvisited element, or None when the enumeration is
    /// exhausted or no enumeration is active.
    pub fn next_enumerated(&mut self) -> Option<T> {
        let cursor = self.cursor.as_mut()?;
        let item = self.items.get(*cursor)?.clone();
        *cursor += 1;
        Some(item)
    }

    /// Visits every element once, handing the set back to the visitor so it
    /// can add or remove elements mid-walk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NestedEnumeration`] if called from inside another
    /// enumeration of the same set.
    pub fn enumerate_with<F>(&mut self, mut visit: F) -> CoreResult<()>
    where
        F: FnMut(&mut Self, T),
    {
        self.begin_enumeration()?;
        while let Some(item) = self.next_enumerated() {
            visit(self, item);
        }
        self.end_enumeration();
        Ok(())
    }

    fn remove_slot(&mut self, index: usize) -> T {
        if let Some(next) = self.cursor {
            if index < next {
                // Visited slot: trade places with the most recently visited
                // element so the hole sits directly under the cursor.
                let last_visited = next - 1;
                self.swap_slots(index, last_visited);
                self.cursor = Some(last_visited);
                return self.swap_remove_slot(last_visited);
            }
        }
        self.swap_remove_slot(index)
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.items.swap(a, b);
        if let Some(slot) = self.indices.get_mut(&self.items[a]) {
            *slot = a;
        }
        if let Some(slot) = self.indices.get_mut(&self.items[b]) {
            *slot = b;
        }
    }

    fn swap_remove_slot(&mut self, index: usize) -> T {
        let removed = self.items.swap_remove(index);
        self.indices.remove(&removed);
        if let Some(moved) = self.items.get(index) {
            if let Some(slot) = self.indices.get_mut(moved) {
                *slot = index;
            }
        }
        removed
    }
}

impl<T: Display> DenseSet<T> {
    /// Comma-separated listing of the current contents in dense order.
    #[must_use]
    pub fn content_string(&self) -> String {
        self.items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a, T> IntoIterator for &'a DenseSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for DenseSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Eq + Hash + Clone> Extend<T> for DenseSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consistent<T: Eq + Hash + Clone + std::fmt::Debug>(set: &DenseSet<T>) {
        assert_eq!(set.items.len(), set.indices.len());
        for (index, item) in set.items.iter().enumerate() {
            assert_eq!(set.indices.get(item), Some(&index), "stale index for {item:?}");
        }
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut set = DenseSet::new();
        assert!(set.add(1));
        assert!(set.add(2));
        assert!(!set.add(1));
        assert_eq!(set.len(), 2);
        consistent(&set);
    }

    #[test]
    fn test_remove_swaps_tail_into_hole() {
        let mut set: DenseSet<char> = "abcd".chars().collect();
        assert!(set.remove(&'b'));
        assert_eq!(set.as_slice(), &['a', 'd', 'c']);
        assert!(!set.remove(&'b'));
        consistent(&set);
    }

    #[test]
    fn test_remove_at_bounds() {
        let mut set: DenseSet<u32> = (0..3).collect();
        assert_eq!(set.remove_at(3), None);
        assert_eq!(set.remove_at(0), Some(0));
        assert_eq!(set.as_slice(), &[2, 1]);
        assert_eq!(set.get(5), None);
        consistent(&set);
    }

    #[test]
    fn test_remove_last_element() {
        let mut set: DenseSet<u32> = (0..3).collect();
        assert!(set.remove(&2));
        assert_eq!(set.as_slice(), &[0, 1]);
        consistent(&set);
    }

    #[test]
    fn test_nested_enumeration_rejected() {
        let mut set: DenseSet<u32> = (0..3).collect();
        set.begin_enumeration().unwrap();
        assert_eq!(set.next_enumerated(), Some(0));
        assert_eq!(set.begin_enumeration(), Err(CoreError::NestedEnumeration));
        // The active enumeration keeps its place.
        assert_eq!(set.next_enumerated(), Some(1));
        set.end_enumeration();
        assert!(set.begin_enumeration().is_ok());
    }

    #[test]
    fn test_next_without_enumeration() {
        let mut set: DenseSet<u32> = (0..3).collect();
        assert_eq!(set.next_enumerated(), None);
    }

    #[test]
    fn test_remove_current_during_enumeration() {
        let mut set: DenseSet<u32> = (0..5).collect();
        let mut visited = Vec::new();
        set.enumerate_with(|set, item| {
            visited.push(item);
            set.remove(&item);
        })
        .unwrap();
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_visited_during_enumeration() {
        let mut set: DenseSet<u32> = (0..6).collect();
        let mut visited = Vec::new();
        set.enumerate_with(|set, item| {
            visited.push(item);
            if item == 3 {
                // Both already visited.
                set.remove(&0);
                set.remove(&2);
            }
        })
        .unwrap();
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);
        consistent(&set);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_remove_unvisited_during_enumeration() {
        let mut set: DenseSet<u32> = (0..6).collect();
        let mut visited = Vec::new();
        set.enumerate_with(|set, item| {
            visited.push(item);
            if item == 1 {
                set.remove(&4);
                set.remove(&5);
            }
        })
        .unwrap();
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3]);
        consistent(&set);
    }

    #[test]
    fn test_add_during_enumeration_is_visited() {
        let mut set: DenseSet<u32> = (0..2).collect();
        let mut visited = Vec::new();
        set.enumerate_with(|set, item| {
            visited.push(item);
            if item == 0 {
                set.add(10);
            }
        })
        .unwrap();
        assert_eq!(visited, vec![0, 1, 10]);
    }

    #[test]
    fn test_clear_during_enumeration() {
        let mut set: DenseSet<u32> = (0..4).collect();
        let mut visited = Vec::new();
        set.enumerate_with(|set, item| {
            visited.push(item);
            set.clear();
        })
        .unwrap();
        assert_eq!(visited, vec![0]);
        assert!(!set.is_enumerating());
    }

    #[test]
    fn test_content_string() {
        let set: DenseSet<u32> = [3, 1, 2].into_iter().collect();
        assert_eq!(set.content_string(), "3, 1, 2");
    }
}
