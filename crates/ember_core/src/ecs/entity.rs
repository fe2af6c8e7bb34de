//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the pool's slot arrays
//! - A generation counter for safe reuse
//!
//! Identity is owned by the [`EntityPool`] that issued it. Copying an id is
//! fine; fabricating one with [`EntityId::new`] only yields something the pool
//! recognizes if the index and generation happen to be live.

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the pool
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot index (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Same index, next generation.
    #[inline]
    #[must_use]
    pub const fn next_gen(self) -> Self {
        Self::new(self.index(), self.generation().wrapping_add(1))
    }

    /// Returns the packed 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Null/invalid entity ID. Never live in any pool.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Allocator for entity identifiers.
///
/// Released indices are kept (not forgotten) so that the next allocation of
/// the same index carries a bumped generation. Holding an old [`EntityId`]
/// after release is therefore safe: [`EntityPool::contains`] reports it dead.
///
/// # Example
///
/// ```rust
/// use ember_core::EntityPool;
///
/// let mut pool = EntityPool::new();
/// let a = pool.allocate();
/// assert!(pool.release(a));
/// let b = pool.allocate();
/// assert_eq!(a.index(), b.index());
/// assert!(b.generation() > a.generation());
/// assert!(!pool.contains(a));
/// ```
#[derive(Debug, Default)]
pub struct EntityPool {
    /// Current generation of every index ever minted.
    generations: Vec<u32>,
    /// Liveness per index.
    alive: Vec<bool>,
    /// Released indices waiting for reuse. Retired indices are not listed.
    released: Vec<u32>,
    /// Number of currently live entities.
    live_count: usize,
}

impl EntityPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty pool with room for `capacity` indices.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            released: Vec::new(),
            live_count: 0,
        }
    }

    /// Allocates an entity id.
    ///
    /// Reuses a released index with its generation bumped, otherwise mints a
    /// fresh index at generation 0. Generations never wrap: an index whose
    /// generation reaches `u32::MAX` is retired on release instead of reused.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` indices would be minted.
    pub fn allocate(&mut self) -> EntityId {
        self.live_count += 1;

        if let Some(index) = self.released.pop() {
            let slot = index as usize;
            let generation = self.generations[slot] + 1;
            self.generations[slot] = generation;
            self.alive[slot] = true;
            return EntityId::new(index, generation);
        }

        let index = u32::try_from(self.generations.len())
            .ok()
            .filter(|&i| i != u32::MAX)
            .expect("entity index space exhausted");
        self.generations.push(0);
        self.alive.push(true);
        EntityId::new(index, 0)
    }

    /// Releases a live entity.
    ///
    /// # Returns
    ///
    /// `true` if `id` was live, `false` if it was never allocated, already
    /// released, or stale.
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            return false;
        }

        self.alive[id.index() as usize] = false;
        if id.generation() < u32::MAX {
            self.released.push(id.index());
        }
        self.live_count -= 1;
        true
    }

    /// Checks whether `id` is live under exactly this index and generation.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }

        let slot = id.index() as usize;
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == id.generation()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Checks if no entity is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Number of distinct indices ever minted. Never decreases.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.generations.len()
    }

    /// Iterates over all live entity ids in index order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive
            .iter()
            .zip(&self.generations)
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, &generation))| EntityId::new(index as u32, generation))
    }
}
