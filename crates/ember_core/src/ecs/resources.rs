//! # Resources
//!
//! Singletons keyed by type. At most one value of each type lives in a
//! [`Resources`] map; inserting a second replaces the first.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

/// Type-keyed map of singleton values.
#[derive(Default)]
pub struct Resources {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl Resources {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the value it replaced.
    pub fn insert<R: 'static>(&mut self, value: R) -> Option<R> {
        tracing::trace!(resource = type_name::<R>(), "insert resource");
        self.values
            .insert(TypeId::of::<R>(), Box::new(value))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    /// Borrows the resource of type `R`.
    #[inline]
    #[must_use]
    pub fn get<R: 'static>(&self) -> Option<&R> {
        self.values
            .get(&TypeId::of::<R>())
            .and_then(|value| value.downcast_ref())
    }

    /// Mutably borrows the resource of type `R`.
    #[inline]
    pub fn get_mut<R: 'static>(&mut self) -> Option<&mut R> {
        self.values
            .get_mut(&TypeId::of::<R>())
            .and_then(|value| value.downcast_mut())
    }

    /// Borrows the resource of type `R`, inserting `init()` first if absent.
    pub fn get_or_insert_with<R: 'static>(&mut self, init: impl FnOnce() -> R) -> &mut R {
        let slot = self
            .values
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(init()));
        // Keys are the TypeId of the boxed value, so the downcast holds.
        match slot.downcast_mut() {
            Some(value) => value,
            None => unreachable!("resource stored under a foreign TypeId"),
        }
    }

    /// Removes and returns the resource of type `R`.
    pub fn remove<R: 'static>(&mut self) -> Option<R> {
        self.values
            .remove(&TypeId::of::<R>())
            .and_then(|value| value.downcast::<R>().ok())
            .map(|value| *value)
    }

    /// Checks if a resource of type `R` is present.
    #[inline]
    #[must_use]
    pub fn contains<R: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<R>())
    }

    /// Number of stored resources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks if no resource is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources").field("len", &self.len()).finish()
    }
}
