//! # ECS World
//!
//! The central container: an [`EntityPool`], one [`Table`] per Family,
//! the location of every live entity, and type-keyed resources.
//!
//! ## Archetype transitions
//!
//! Attaching or detaching a component moves the entity between tables:
//!
//! ```text
//!   {Pos, Vel}  ── attach Hp ──>  {Pos, Vel, Hp}
//!   row 3                          row 0 (new)
//!     │  Pos, Vel bytes moved ──────>│
//!     │                              └─ Hp written
//!     └─ swap-removed; last row of {Pos, Vel} now lives at row 3
//! ```
//!
//! The destination Family is looked up through a `With`/`Without`
//! descriptor, so the common case (the table already exists) allocates
//! nothing.
//!
//! ## Archetype lifetime
//!
//! An archetype lives while some entity has its Family. When the last row
//! leaves a non-root table, the archetype is released and its id is reused
//! by the next Family discovered. The root archetype is never released.

// SAFETY: The World is the only caller of the Table's unsafe API. It keeps
// the invariant that column `c` of an archetype stores the component whose
// id sits at position `c` of the archetype's Family.
#![allow(unsafe_code)]

use std::any::type_name;
use std::hash::{BuildHasher, Hash};

use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::{Equivalent, HashTable};

use super::component::{Component, ComponentId, ComponentMeta, ComponentRegistry};
use super::entity::{EntityId, EntityPool};
use super::family::{Family, IdSpan};
use super::resources::Resources;
use super::table::Table;
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};
use crate::events::{EventChannel, EventIter, Reader};

/// Index of an archetype inside its World.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The archetype of entities with no components.
    pub const ROOT: Self = Self(0);

    /// Position in the World's archetype list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an entity's data lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeId,
    /// Row inside that archetype's table.
    pub row: usize,
}

/// One Family and the table of every entity that has exactly it. The
/// archetype is the Family's only owner.
struct Archetype {
    family: Family,
    table: Table,
}

/// Which way an entity moves between archetypes.
#[derive(Clone, Copy)]
enum Transition {
    Attach(ComponentId),
    Detach(ComponentId),
}

/// The ECS World.
///
/// # Example
///
/// ```rust
/// use ember_core::World;
///
/// struct Position([f32; 3]);
/// struct Frozen;
///
/// let mut world = World::new();
/// world.register::<Position>();
/// world.register::<Frozen>();
///
/// let e = world.create_entity();
/// world.attach(e, Position([0.0; 3])).unwrap();
/// world.attach(e, Frozen).unwrap();
/// assert!(world.has::<Frozen>(e));
///
/// world.detach::<Frozen>(e).unwrap();
/// assert!(!world.has::<Frozen>(e));
/// // Root and {Position}; {Position, Frozen} was released when emptied.
/// assert_eq!(world.archetype_count(), 2);
/// ```
pub struct World {
    entities: EntityPool,
    components: ComponentRegistry,
    /// Archetype slots; `None` marks a released id awaiting reuse.
    archetypes: Vec<Option<Archetype>>,
    free_archetypes: Vec<ArchetypeId>,
    /// Family → archetype. Entries are hashed by the archetype's Family and
    /// probed with `Family`/`IdSpan`/`With`/`Without` keys.
    archetype_index: HashTable<ArchetypeId>,
    hash_state: DefaultHashBuilder,
    /// Location per entity index; `None` for dead slots.
    locations: Vec<Option<EntityLocation>>,
    resources: Resources,
    config: WorldConfig,
}

impl World {
    /// Creates an empty World with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty World, reserving space per `config`.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        let mut archetypes = Vec::with_capacity(config.archetype_capacity);
        archetypes.push(Some(Archetype {
            family: Family::empty(),
            table: Table::new(&[]),
        }));

        tracing::debug!(
            entity_capacity = config.entity_capacity,
            archetype_capacity = config.archetype_capacity,
            "world created"
        );

        let mut world = Self {
            entities: EntityPool::with_capacity(config.entity_capacity),
            components: ComponentRegistry::new(),
            archetype_index: HashTable::with_capacity(config.archetype_capacity),
            archetypes,
            free_archetypes: Vec::new(),
            hash_state: DefaultHashBuilder::default(),
            locations: Vec::with_capacity(config.entity_capacity),
            resources: Resources::new(),
            config,
        };
        world.index_archetype(ArchetypeId::ROOT);
        world
    }

    /// Configuration this World was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.entities.allocate();
        let root = &mut self.archetype_mut(ArchetypeId::ROOT).table;
        // SAFETY: the root table has no columns, so the row is complete.
        let row = unsafe { root.insert(id) };

        let slot = id.index() as usize;
        if slot >= self.locations.len() {
            self.locations.resize(slot + 1, None);
        }
        self.locations[slot] = Some(EntityLocation {
            archetype: ArchetypeId::ROOT,
            row,
        });
        id
    }

    /// Removes an entity and drops all of its components.
    ///
    /// # Returns
    ///
    /// `true` if the entity was alive.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };

        let moved = self.archetype_mut(location.archetype).table.remove(location.row);
        if let Some(moved) = moved {
            self.set_location(moved, location);
        }
        self.locations[entity.index() as usize] = None;
        self.release_if_empty(location.archetype);
        self.entities.release(entity)
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterates over all live entities.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter()
    }

    /// Location of a live entity.
    #[inline]
    #[must_use]
    pub fn location(&self, entity: EntityId) -> Option<EntityLocation> {
        if !self.entities.contains(entity) {
            return None;
        }
        self.locations.get(entity.index() as usize).copied().flatten()
    }

    fn set_location(&mut self, entity: EntityId, location: EntityLocation) {
        self.locations[entity.index() as usize] = Some(location);
    }

    fn live_location(&self, entity: EntityId) -> EcsResult<EntityLocation> {
        self.location(entity).ok_or(EcsError::NoSuchEntity(entity))
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a component type. Idempotent.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.components.register::<T>()
    }

    /// Registers a component by layout alone. Every call makes a new id.
    pub fn register_raw(&mut self, meta: ComponentMeta) -> ComponentId {
        self.components.register_raw(meta)
    }

    /// Id of a registered component type.
    #[inline]
    #[must_use]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.id_of::<T>()
    }

    /// The component registry.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Attaches `value` to `entity`, replacing (and dropping) any existing
    /// value of the same type.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::NoSuchEntity`] if `entity` is not alive
    pub fn attach<T: Component>(&mut self, entity: EntityId, value: T) -> EcsResult<()> {
        let id = self.components.expect_id::<T>()?;
        let location = self.live_location(entity)?;

        let archetype = self.archetype_mut(location.archetype);
        if let Some(col) = archetype.family.position(id.raw()) {
            // SAFETY: column `col` stores `T` and the row is live.
            unsafe { *archetype.table.get_mut::<T>(col, location.row) = value };
            return Ok(());
        }

        let (archetype, row) = self.transition(entity, location, Transition::Attach(id))?;
        let archetype = self.archetype_mut(archetype);
        let col = column_of(&archetype.family, id);
        // SAFETY: `transition` left this cell uninitialized.
        unsafe { archetype.table.write(col, row, value) };
        Ok(())
    }

    /// Detaches the `T` component of `entity` and returns it.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the entity did not have a `T`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredComponent`] if `T` was never registered
    /// - [`EcsError::NoSuchEntity`] if `entity` is not alive
    pub fn detach<T: Component>(&mut self, entity: EntityId) -> EcsResult<Option<T>> {
        let id = self.components.expect_id::<T>()?;
        let location = self.live_location(entity)?;

        let Some(col) = self.archetype(location.archetype).family.position(id.raw()) else {
            return Ok(None);
        };

        let (archetype, row) = self.transition_keep_source(entity, location, Transition::Detach(id))?;
        let source = &self.archetype(location.archetype).table;
        // SAFETY: column `col` stores `T`; the source row is forgotten right
        // after, so the value is moved out exactly once.
        let value = unsafe { source.cell_ptr(col, location.row).cast::<T>().read() };
        self.finish_transition(entity, location, archetype, row);
        Ok(Some(value))
    }

    /// Detaches and drops the component with `id`.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if the entity did not have it.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownComponentId`] if `id` was never registered
    /// - [`EcsError::NoSuchEntity`] if `entity` is not alive
    pub fn detach_by_id(&mut self, entity: EntityId, id: ComponentId) -> EcsResult<bool> {
        self.meta_of(id)?;
        let location = self.live_location(entity)?;

        let Some(col) = self.archetype(location.archetype).family.position(id.raw()) else {
            return Ok(false);
        };

        // Move the survivors out first; the source row still holds the
        // detached value until it is dropped below.
        let (new_archetype, new_row) = self.transition_keep_source(entity, location, Transition::Detach(id))?;
        let source = &mut self.archetype_mut(location.archetype).table;
        // SAFETY: the detached cell is live and was not moved.
        unsafe { source.drop_cell(col, location.row) };
        self.finish_transition(entity, location, new_archetype, new_row);
        Ok(true)
    }

    /// Borrows the `T` component of `entity`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let location = self.location(entity)?;
        let archetype = self.archetype(location.archetype);
        let col = archetype.family.position(id.raw())?;
        // SAFETY: column `col` stores `T` and the row is live.
        Some(unsafe { archetype.table.get::<T>(col, location.row) })
    }

    /// Mutably borrows the `T` component of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = self.components.id_of::<T>()?;
        let location = self.location(entity)?;
        let archetype = self.archetype_mut(location.archetype);
        let col = archetype.family.position(id.raw())?;
        // SAFETY: column `col` stores `T` and the row is live.
        Some(unsafe { archetype.table.get_mut::<T>(col, location.row) })
    }

    /// Checks if `entity` has a `T` component.
    #[must_use]
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.components
            .id_of::<T>()
            .is_some_and(|id| self.has_id(entity, id))
    }

    /// Checks if `entity` has the component with `id`.
    #[must_use]
    pub fn has_id(&self, entity: EntityId, id: ComponentId) -> bool {
        self.family_of(entity).is_some_and(|family| family.has(id.raw()))
    }

    /// Family of a live entity.
    #[must_use]
    pub fn family_of(&self, entity: EntityId) -> Option<&Family> {
        let location = self.location(entity)?;
        Some(&self.archetype(location.archetype).family)
    }

    /// Writes a plain-data component from raw bytes, attaching it if absent.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnknownComponentId`] if `id` was never registered
    /// - [`EcsError::NotPlainData`] if the component was registered by type
    /// - [`EcsError::SizeMismatch`] if `bytes` has the wrong length
    /// - [`EcsError::NoSuchEntity`] if `entity` is not alive
    pub fn attach_raw(&mut self, entity: EntityId, id: ComponentId, bytes: &[u8]) -> EcsResult<()> {
        let meta = *self.plain_meta_of(id)?;
        if bytes.len() != meta.size() {
            return Err(EcsError::SizeMismatch {
                name: meta.name(),
                expected: meta.size(),
                actual: bytes.len(),
            });
        }
        let location = self.live_location(entity)?;

        let (archetype, row) = if self.archetype(location.archetype).family.has(id.raw()) {
            (location.archetype, location.row)
        } else {
            self.transition(entity, location, Transition::Attach(id))?
        };

        let archetype = self.archetype_mut(archetype);
        let col = column_of(&archetype.family, id);
        // SAFETY: plain components have no drop hook, so overwriting a live
        // value leaks nothing; any byte pattern is a valid value.
        unsafe { archetype.table.write_bytes(col, row, bytes) };
        Ok(())
    }

    /// Reads a plain-data component as raw bytes.
    #[must_use]
    pub fn get_raw(&self, entity: EntityId, id: ComponentId) -> Option<&[u8]> {
        let meta = self.plain_meta_of(id).ok()?;
        let location = self.location(entity)?;
        let archetype = self.archetype(location.archetype);
        let col = archetype.family.position(id.raw())?;
        let ptr = archetype.table.cell_ptr(col, location.row);
        // SAFETY: plain values are written from initialized byte slices of
        // exactly `size` bytes; the pointer is aligned and non-null even for
        // zero-sized components.
        Some(unsafe { std::slice::from_raw_parts(ptr, meta.size()) })
    }

    /// Writes a plain-data component from a `Pod` value.
    ///
    /// # Errors
    ///
    /// As for [`World::attach_raw`].
    pub fn attach_pod<T: bytemuck::Pod>(&mut self, entity: EntityId, id: ComponentId, value: &T) -> EcsResult<()> {
        self.attach_raw(entity, id, bytemuck::bytes_of(value))
    }

    /// Reads a plain-data component as a `Pod` value.
    ///
    /// Returns `None` if the entity lacks it or the sizes differ.
    #[must_use]
    pub fn get_pod<T: bytemuck::Pod>(&self, entity: EntityId, id: ComponentId) -> Option<T> {
        let bytes = self.get_raw(entity, id)?;
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    fn meta_of(&self, id: ComponentId) -> EcsResult<&ComponentMeta> {
        self.components
            .meta(id)
            .ok_or(EcsError::UnknownComponentId(id.raw()))
    }

    fn plain_meta_of(&self, id: ComponentId) -> EcsResult<&ComponentMeta> {
        let meta = self.meta_of(id)?;
        if meta.is_plain() {
            Ok(meta)
        } else {
            Err(EcsError::NotPlainData(meta.name()))
        }
    }

    // =========================================================================
    // Archetypes
    // =========================================================================

    /// Number of live archetypes, including the empty root.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len() - self.free_archetypes.len()
    }

    /// Looks up the archetype storing exactly `family`.
    ///
    /// Ids of released archetypes are reused, so a stale id may name a
    /// different Family later.
    #[must_use]
    pub fn archetype_of(&self, family: &Family) -> Option<ArchetypeId> {
        self.find_archetype(family)
    }

    /// Looks up the archetype for a sorted id list without building a Family.
    #[must_use]
    pub fn archetype_of_ids(&self, ids: IdSpan<'_>) -> Option<ArchetypeId> {
        self.find_archetype(&ids)
    }

    /// Table of a live archetype.
    #[must_use]
    pub fn table(&self, archetype: ArchetypeId) -> Option<&Table> {
        self.archetypes
            .get(archetype.index())
            .and_then(Option::as_ref)
            .map(|a| &a.table)
    }

    /// Iterates over every entity with a `T`, with its component.
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        let id = self.components.id_of::<T>();
        self.archetypes
            .iter()
            .flatten()
            .filter_map(move |archetype| {
                let col = archetype.family.position(id?.raw())?;
                Some((archetype, col))
            })
            .flat_map(|(archetype, col)| {
                archetype
                    .table
                    .entities()
                    .iter()
                    .enumerate()
                    // SAFETY: column `col` stores `T`; every row < len is live.
                    .map(move |(row, &entity)| (entity, unsafe { archetype.table.get::<T>(col, row) }))
            })
    }

    /// Calls `f` with every entity that has a `T` and its component.
    pub fn for_each_mut<T: Component>(&mut self, mut f: impl FnMut(EntityId, &mut T)) {
        let Some(id) = self.components.id_of::<T>() else {
            return;
        };
        for archetype in self.archetypes.iter_mut().flatten() {
            let Some(col) = archetype.family.position(id.raw()) else {
                continue;
            };
            for row in 0..archetype.table.len() {
                let entity = archetype.table.entities()[row];
                // SAFETY: column `col` stores `T`; row < len.
                f(entity, unsafe { archetype.table.get_mut::<T>(col, row) });
            }
        }
    }

    fn archetype(&self, id: ArchetypeId) -> &Archetype {
        match &self.archetypes[id.index()] {
            Some(archetype) => archetype,
            None => unreachable!("archetype {} was released", id.0),
        }
    }

    fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        match &mut self.archetypes[id.index()] {
            Some(archetype) => archetype,
            None => unreachable!("archetype {} was released", id.0),
        }
    }

    /// Probes the index with any Family-shaped key.
    fn find_archetype<Q: Hash + Equivalent<Family> + ?Sized>(&self, key: &Q) -> Option<ArchetypeId> {
        let hash = self.hash_state.hash_one(key);
        self.archetype_index
            .find(hash, |&id| key.equivalent(&self.archetype(id).family))
            .copied()
    }

    /// Returns the archetype one step away from `from`, creating it on a miss.
    fn neighbor(&mut self, from: ArchetypeId, step: Transition) -> EcsResult<ArchetypeId> {
        let base = &self.archetype(from).family;
        let found = match step {
            Transition::Attach(id) => self.find_archetype(&base.with(id.raw())),
            Transition::Detach(id) => self.find_archetype(&base.without(id.raw())),
        };
        if let Some(found) = found {
            return Ok(found);
        }

        let family = match step {
            Transition::Attach(id) => Family::from(base.with(id.raw())),
            Transition::Detach(id) => Family::from(base.without(id.raw())),
        };
        self.create_archetype(family)
    }

    fn create_archetype(&mut self, family: Family) -> EcsResult<ArchetypeId> {
        let metas = family
            .iter()
            .map(|id| self.meta_of(ComponentId::from_raw(id)).copied())
            .collect::<EcsResult<Vec<_>>>()?;

        let id = match self.free_archetypes.pop() {
            Some(id) => id,
            None => {
                let id = u32::try_from(self.archetypes.len())
                    .map(ArchetypeId)
                    .expect("archetype count exceeds u32::MAX");
                self.archetypes.push(None);
                id
            }
        };
        tracing::debug!(archetype = id.0, components = ?family.ids(), "archetype created");

        self.archetypes[id.index()] = Some(Archetype {
            family,
            table: Table::new(&metas),
        });
        self.index_archetype(id);
        Ok(id)
    }

    /// Adds a live archetype to the index under its Family's hash.
    fn index_archetype(&mut self, id: ArchetypeId) {
        let Self {
            archetypes,
            archetype_index,
            hash_state,
            ..
        } = self;
        let family_hash = |id: ArchetypeId| match &archetypes[id.index()] {
            Some(archetype) => hash_state.hash_one(&archetype.family),
            None => unreachable!("released archetype {} in the index", id.0),
        };
        archetype_index.insert_unique(family_hash(id), id, |&other| family_hash(other));
    }

    /// Releases a non-root archetype whose table has no rows left.
    fn release_if_empty(&mut self, id: ArchetypeId) {
        if id == ArchetypeId::ROOT {
            return;
        }
        let archetype = self.archetype(id);
        if !archetype.table.is_empty() {
            return;
        }

        let hash = self.hash_state.hash_one(&archetype.family);
        if let Ok(entry) = self.archetype_index.find_entry(hash, |&other| other == id) {
            let _ = entry.remove();
        }
        self.archetypes[id.index()] = None;
        self.free_archetypes.push(id);
        tracing::debug!(archetype = id.0, "archetype released");
    }

    /// Moves `entity` one step to a neighbouring archetype.
    ///
    /// On attach, the new component's cell is left uninitialized for the
    /// caller. On detach, the detached value is neither moved nor dropped;
    /// the caller must have read it out.
    fn transition(
        &mut self,
        entity: EntityId,
        from: EntityLocation,
        step: Transition,
    ) -> EcsResult<(ArchetypeId, usize)> {
        let (archetype, row) = self.transition_keep_source(entity, from, step)?;
        self.finish_transition(entity, from, archetype, row);
        Ok((archetype, row))
    }

    /// First half of a transition: allocate the destination row and move
    /// every shared column into it. The source row is left in place.
    fn transition_keep_source(
        &mut self,
        entity: EntityId,
        from: EntityLocation,
        step: Transition,
    ) -> EcsResult<(ArchetypeId, usize)> {
        let to = self.neighbor(from.archetype, step)?;
        let (src, dst) = pair_mut(&mut self.archetypes, from.archetype.index(), to.index());

        // SAFETY: every destination column is initialized below, except the
        // attached one, which the caller writes.
        let row = unsafe { dst.table.insert(entity) };
        for (dst_col, id) in dst.family.iter().enumerate() {
            if let Some(src_col) = src.family.position(id) {
                // SAFETY: same id, same component type; the source cell is
                // live and is forgotten by `finish_transition`.
                unsafe { src.table.move_cell_to(src_col, from.row, &mut dst.table, dst_col, row) };
            }
        }
        Ok((to, row))
    }

    /// Second half of a transition: forget the source row and fix up
    /// locations.
    fn finish_transition(&mut self, entity: EntityId, from: EntityLocation, to: ArchetypeId, row: usize) {
        let moved = self.archetype_mut(from.archetype).table.swap_remove_forget(from.row);
        if let Some(moved) = moved {
            self.set_location(moved, from);
        }
        self.set_location(entity, EntityLocation { archetype: to, row });
        self.release_if_empty(from.archetype);
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Stores a resource, returning the one it replaced.
    pub fn insert_resource<R: 'static>(&mut self, value: R) -> Option<R> {
        let old = self.resources.insert(value);
        if old.is_some() {
            tracing::debug!(resource = type_name::<R>(), "resource replaced");
        }
        old
    }

    /// Borrows a resource.
    #[must_use]
    pub fn resource<R: 'static>(&self) -> Option<&R> {
        self.resources.get()
    }

    /// Mutably borrows a resource.
    pub fn resource_mut<R: 'static>(&mut self) -> Option<&mut R> {
        self.resources.get_mut()
    }

    /// Borrows a resource, inserting `init()` first if absent.
    pub fn resource_or_insert_with<R: 'static>(&mut self, init: impl FnOnce() -> R) -> &mut R {
        self.resources.get_or_insert_with(init)
    }

    /// Removes and returns a resource.
    pub fn remove_resource<R: 'static>(&mut self) -> Option<R> {
        self.resources.remove()
    }

    /// Checks if a resource is present.
    #[must_use]
    pub fn contains_resource<R: 'static>(&self) -> bool {
        self.resources.contains::<R>()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Ensures an [`EventChannel<E>`] resource exists and returns it.
    pub fn add_event<E: 'static>(&mut self) -> &mut EventChannel<E> {
        let capacity = self.config.event_capacity;
        self.resources
            .get_or_insert_with(|| EventChannel::<E>::with_capacity(capacity))
    }

    /// The event channel for `E`, if one was added.
    #[must_use]
    pub fn events<E: 'static>(&self) -> Option<&EventChannel<E>> {
        self.resources.get()
    }

    /// Pushes an event, adding the channel if needed.
    pub fn send_event<E: 'static>(&mut self, event: E) {
        self.add_event::<E>().push(event);
    }

    /// Creates a reader for `E`, adding the channel if needed.
    pub fn subscribe<E: 'static>(&mut self) -> Reader<E> {
        self.add_event::<E>().create_reader()
    }

    /// Reads every event the reader has not seen yet.
    ///
    /// # Panics
    ///
    /// Panics if `reader` was not created by this World's channel for `E`.
    pub fn read_events<'w, E: 'static>(&'w mut self, reader: &mut Reader<E>) -> EventIter<'w, E> {
        self.add_event::<E>().read(reader)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .field("archetypes", &self.archetype_count())
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Column of `id` in an archetype known to contain it.
fn column_of(family: &Family, id: ComponentId) -> usize {
    match family.position(id.raw()) {
        Some(col) => col,
        None => unreachable!("component {id} missing from destination family"),
    }
}

/// Borrows two distinct live archetypes mutably.
fn pair_mut(archetypes: &mut [Option<Archetype>], a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
    assert_ne!(a, b, "transition to the same archetype");
    let (first, second) = if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    };
    match (first, second) {
        (Some(first), Some(second)) => (first, second),
        _ => unreachable!("transition between released archetypes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position([f32; 3]);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity([f32; 3]);

    #[derive(Debug, PartialEq)]
    struct Name(String);

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn world() -> World {
        let mut world = World::new();
        world.register::<Position>();
        world.register::<Velocity>();
        world.register::<Name>();
        world
    }

    #[test]
    fn test_new_entity_lives_in_root() {
        let mut world = world();
        let e = world.create_entity();
        assert!(world.is_alive(e));
        assert_eq!(world.location(e).unwrap().archetype, ArchetypeId::ROOT);
        assert!(world.family_of(e).unwrap().is_empty());
    }

    #[test]
    fn test_attach_moves_and_keeps_data() {
        let mut world = world();
        let e = world.create_entity();
        world.attach(e, Position([1.0, 2.0, 3.0])).unwrap();
        world.attach(e, Velocity([0.5; 3])).unwrap();
        world.attach(e, Name("ship".into())).unwrap();

        assert_eq!(world.get::<Position>(e), Some(&Position([1.0, 2.0, 3.0])));
        assert_eq!(world.get::<Velocity>(e), Some(&Velocity([0.5; 3])));
        assert_eq!(world.get::<Name>(e), Some(&Name("ship".into())));
        assert_eq!(world.family_of(e).unwrap().len(), 3);
    }

    #[test]
    fn test_attach_twice_replaces_in_place() {
        let drops = Rc::new(Cell::new(0));
        let mut world = World::new();
        world.register::<DropCounter>();
        let e = world.create_entity();

        world.attach(e, DropCounter(Rc::clone(&drops))).unwrap();
        let archetypes = world.archetype_count();
        world.attach(e, DropCounter(Rc::clone(&drops))).unwrap();

        assert_eq!(drops.get(), 1);
        assert_eq!(world.archetype_count(), archetypes);
    }

    #[test]
    fn test_detach_returns_value() {
        let mut world = world();
        let e = world.create_entity();
        world.attach(e, Position([1.0; 3])).unwrap();
        world.attach(e, Name("scout".into())).unwrap();

        assert_eq!(world.detach::<Name>(e).unwrap(), Some(Name("scout".into())));
        assert_eq!(world.detach::<Name>(e).unwrap(), None);
        assert!(!world.has::<Name>(e));
        assert_eq!(world.get::<Position>(e), Some(&Position([1.0; 3])));
    }

    #[test]
    fn test_emptied_archetype_is_released_and_recreated() {
        struct Tag;

        let mut world = World::new();
        let tag = world.register::<Tag>();
        let only_tag = Family::new(&[tag.raw()]);
        let e = world.create_entity();

        world.attach(e, Tag).unwrap();
        let first = world.archetype_of(&only_tag).unwrap();
        assert_eq!(world.archetype_count(), 2);

        world.detach::<Tag>(e).unwrap();
        assert_eq!(world.archetype_count(), 1);
        assert!(world.archetype_of(&only_tag).is_none());
        assert!(world.table(first).is_none());

        world.attach(e, Tag).unwrap();
        assert_eq!(world.archetype_of(&only_tag), Some(first));
        assert_eq!(world.table(first).map(Table::len), Some(1));

        assert!(world.remove_entity(e));
        assert_eq!(world.archetype_count(), 1);
        assert!(world.archetype_of(&only_tag).is_none());
        assert!(world.table(ArchetypeId::ROOT).is_some());
    }

    #[test]
    fn test_detach_by_id_drops_once() {
        let drops = Rc::new(Cell::new(0));
        let mut world = World::new();
        let id = world.register::<DropCounter>();
        world.register::<Position>();
        let e = world.create_entity();
        world.attach(e, Position([0.0; 3])).unwrap();
        world.attach(e, DropCounter(Rc::clone(&drops))).unwrap();

        assert!(world.detach_by_id(e, id).unwrap());
        assert_eq!(drops.get(), 1);
        assert!(!world.detach_by_id(e, id).unwrap());
        drop(world);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_swap_remove_patches_moved_entity() {
        let mut world = world();
        let entities: Vec<_> = (0..4)
            .map(|i| {
                let e = world.create_entity();
                world.attach(e, Position([i as f32; 3])).unwrap();
                e
            })
            .collect();

        // Moving the first entity out swap-removes it; the last takes its row.
        world.attach(entities[0], Velocity([9.0; 3])).unwrap();
        assert_eq!(world.location(entities[3]).unwrap().row, 0);
        for (i, &e) in entities.iter().enumerate() {
            assert_eq!(world.get::<Position>(e), Some(&Position([i as f32; 3])));
        }
    }

    #[test]
    fn test_remove_entity_drops_components() {
        let drops = Rc::new(Cell::new(0));
        let mut world = World::new();
        world.register::<DropCounter>();
        let a = world.create_entity();
        let b = world.create_entity();
        world.attach(a, DropCounter(Rc::clone(&drops))).unwrap();
        world.attach(b, DropCounter(Rc::clone(&drops))).unwrap();

        assert!(world.remove_entity(a));
        assert_eq!(drops.get(), 1);
        assert!(!world.remove_entity(a));
        assert!(world.get::<DropCounter>(b).is_some());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_errors() {
        let mut world = World::new();
        let e = world.create_entity();
        assert!(matches!(
            world.attach(e, 5u8),
            Err(EcsError::UnregisteredComponent(_))
        ));

        world.register::<u8>();
        world.remove_entity(e);
        assert_eq!(world.attach(e, 5u8), Err(EcsError::NoSuchEntity(e)));
        assert_eq!(
            world.detach_by_id(e, ComponentId::from_raw(42)),
            Err(EcsError::UnknownComponentId(42))
        );
    }

    #[test]
    fn test_raw_components() {
        let mut world = World::new();
        let typed = world.register::<u32>();
        let raw = world.register_raw(ComponentMeta::plain(8, 4, "pair").unwrap());
        let e = world.create_entity();

        world.attach_pod(e, raw, &[3u32, 4u32]).unwrap();
        assert_eq!(world.get_pod::<[u32; 2]>(e, raw), Some([3, 4]));
        assert_eq!(world.get_raw(e, raw).map(<[u8]>::len), Some(8));

        assert!(matches!(
            world.attach_raw(e, raw, &[0; 3]),
            Err(EcsError::SizeMismatch { expected: 8, actual: 3, .. })
        ));
        assert!(matches!(
            world.attach_raw(e, typed, &[0; 4]),
            Err(EcsError::NotPlainData(_))
        ));
    }

    #[test]
    fn test_query_and_for_each_mut() {
        let mut world = world();
        for i in 0..6 {
            let e = world.create_entity();
            world.attach(e, Position([i as f32; 3])).unwrap();
            if i % 2 == 0 {
                world.attach(e, Velocity([1.0; 3])).unwrap();
            }
        }

        world.for_each_mut::<Position>(|_, p| p.0[0] += 10.0);
        let mut xs: Vec<f32> = world.query::<Position>().map(|(_, p)| p.0[0]).collect();
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs, vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        assert_eq!(world.query::<Velocity>().count(), 3);
        assert_eq!(world.query::<u64>().count(), 0);
    }

    #[test]
    fn test_resources_and_events() {
        let mut world = World::new();
        world.insert_resource(60u32);
        assert_eq!(world.insert_resource(30u32), Some(60));
        assert_eq!(world.resource::<u32>(), Some(&30));

        let mut reader = world.subscribe::<&'static str>();
        world.send_event("hello");
        world.send_event("world");
        let seen: Vec<_> = world.read_events(&mut reader).copied().collect();
        assert_eq!(seen, vec!["hello", "world"]);
        assert_eq!(world.events::<&'static str>().unwrap().reader_count(), 1);
    }
}
