//! # Component System
//!
//! Components are plain Rust values. The storage never sees their types:
//! each one is described by a [`ComponentMeta`] (size, alignment, and how to
//! destroy a value in place) and identified by a [`ComponentId`] handed out
//! by the World's [`ComponentRegistry`].
//!
//! There is no process-global type registry. Two Worlds may assign different
//! ids to the same Rust type.

// SAFETY: type-erased drop hooks need unsafe fn pointers.
#![allow(unsafe_code)]

use std::alloc::Layout;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Marker trait for ECS components.
///
/// Any `'static` type qualifies. Zero-sized types act as tags: they take part
/// in archetype identity but occupy no column bytes.
///
/// # Example
///
/// ```rust
/// use ember_core::World;
///
/// #[derive(Debug, PartialEq)]
/// struct Health(u32);
///
/// let mut world = World::new();
/// world.register::<Health>();
/// let e = world.create_entity();
/// world.attach(e, Health(10)).unwrap();
/// assert_eq!(world.get::<Health>(e), Some(&Health(10)));
/// ```
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// Identifier of a registered component type.
///
/// This is the attachment id stored in a [`Family`](crate::Family).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Wraps a raw attachment id.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw attachment id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<ComponentId> for u64 {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Destroys one value in place.
pub type DropFn = unsafe fn(*mut u8);

/// Binary layout of one component type.
///
/// Tables size their columns from `size`/`align` and call `drop_fn` for
/// every value they destroy. Moves are bitwise, so no move hook is needed.
#[derive(Clone, Copy, Debug)]
pub struct ComponentMeta {
    size: usize,
    align: usize,
    drop_fn: Option<DropFn>,
    name: &'static str,
    /// Layout-only component; any byte pattern of `size` bytes is a value.
    plain: bool,
}

impl ComponentMeta {
    /// Describes the Rust type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        unsafe fn drop_value<T>(ptr: *mut u8) {
            // SAFETY: caller guarantees `ptr` holds an initialized, aligned `T`.
            unsafe { ptr.cast::<T>().drop_in_place() }
        }

        Self {
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            drop_fn: std::mem::needs_drop::<T>().then_some(drop_value::<T> as DropFn),
            name: type_name::<T>(),
            plain: false,
        }
    }

    /// Describes a plain-data component by layout alone.
    ///
    /// Values of such components are written and read as raw bytes and are
    /// never dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidLayout`] if `align` is not a power of two
    /// or `size` overflows when rounded up to `align`.
    pub fn plain(size: usize, align: usize, name: &'static str) -> EcsResult<Self> {
        Layout::from_size_align(size, align).map_err(|_| EcsError::InvalidLayout { size, align })?;
        Ok(Self {
            size,
            align,
            drop_fn: None,
            name,
            plain: true,
        })
    }

    /// Size of one value in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Alignment of one value in bytes.
    #[inline]
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Diagnostic name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether destroying a value runs code.
    #[inline]
    #[must_use]
    pub const fn needs_drop(&self) -> bool {
        self.drop_fn.is_some()
    }

    /// Checks if this component was registered by layout alone, so its
    /// values may be written and read as raw bytes.
    #[inline]
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        self.plain
    }

    /// Checks if this is a zero-sized tag.
    #[inline]
    #[must_use]
    pub const fn is_tag(&self) -> bool {
        self.size == 0
    }

    /// Destroys the value at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized value of the described type, and
    /// the value must not be used afterwards.
    #[inline]
    pub(crate) unsafe fn drop_in_place(&self, ptr: *mut u8) {
        if let Some(drop_fn) = self.drop_fn {
            // SAFETY: forwarded from the caller.
            unsafe { drop_fn(ptr) }
        }
    }
}

/// Per-World registry assigning sequential ids to component types.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentId>,
    metas: Vec<ComponentMeta>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, returning its id. Registering twice returns the same id.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return id;
        }

        let id = self.push(ComponentMeta::of::<T>());
        self.by_type.insert(TypeId::of::<T>(), id);
        tracing::debug!(component = type_name::<T>(), %id, "registered component");
        id
    }

    /// Registers a component known only by its layout.
    ///
    /// Every call creates a new id.
    pub fn register_raw(&mut self, meta: ComponentMeta) -> ComponentId {
        let id = self.push(meta);
        tracing::debug!(component = meta.name(), %id, "registered raw component");
        id
    }

    fn push(&mut self, meta: ComponentMeta) -> ComponentId {
        let id = ComponentId(self.metas.len() as u64);
        self.metas.push(meta);
        id
    }

    /// Looks up the id of `T`.
    #[inline]
    #[must_use]
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Looks up the id of `T`, failing with a descriptive error.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`] if `T` was never registered.
    pub fn expect_id<T: Component>(&self) -> EcsResult<ComponentId> {
        self.id_of::<T>()
            .ok_or(EcsError::UnregisteredComponent(type_name::<T>()))
    }

    /// Returns the metadata of a registered id.
    #[inline]
    #[must_use]
    pub fn meta(&self, id: ComponentId) -> Option<&ComponentMeta> {
        usize::try_from(id.0).ok().and_then(|i| self.metas.get(i))
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// Checks if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag;

    #[test]
    fn test_meta_of_plain_and_owning_types() {
        let meta = ComponentMeta::of::<[f32; 3]>();
        assert_eq!(meta.size(), 12);
        assert_eq!(meta.align(), 4);
        assert!(!meta.needs_drop());

        let meta = ComponentMeta::of::<String>();
        assert!(meta.needs_drop());

        let meta = ComponentMeta::of::<Tag>();
        assert!(meta.is_tag());
        assert!(!meta.is_plain());
    }

    #[test]
    fn test_plain_rejects_bad_alignment() {
        assert!(ComponentMeta::plain(8, 3, "bad").is_err());
        assert!(ComponentMeta::plain(8, 8, "good").unwrap().is_plain());
    }

    #[test]
    fn test_register_is_idempotent_and_sequential() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<u32>();
        let b = registry.register::<String>();
        assert_eq!(registry.register::<u32>(), a);
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.id_of::<String>(), Some(b));
        assert!(registry.id_of::<Tag>().is_none());
    }

    #[test]
    fn test_register_raw_always_new() {
        let mut registry = ComponentRegistry::new();
        let meta = ComponentMeta::plain(4, 4, "blob").unwrap();
        let a = registry.register_raw(meta);
        let b = registry.register_raw(meta);
        assert_ne!(a, b);
        assert_eq!(registry.meta(b).unwrap().name(), "blob");
    }

    #[test]
    fn test_expect_id_error() {
        let registry = ComponentRegistry::new();
        assert!(matches!(
            registry.expect_id::<Tag>(),
            Err(EcsError::UnregisteredComponent(_))
        ));
    }
}
