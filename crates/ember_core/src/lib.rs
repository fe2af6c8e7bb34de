//! # EMBER Core Engine
//!
//! Runtime core of the EMBER Entity Component System:
//! - Generational entity ids
//! - Archetype ("Family") identity with allocation-free transition lookup
//! - Columnar, type-erased component tables
//! - A multi-reader broadcast event bus
//!
//! ## Architecture Rules
//!
//! 1. **Data-oriented design** - Components of one archetype are stored in
//!    contiguous columns
//! 2. **No allocation on the common path** - Looking up the next archetype
//!    and reading events allocate nothing
//! 3. **Single-threaded** - The World is the one shared mutable resource
//!
//! ## Example
//!
//! ```rust
//! use ember_core::World;
//!
//! struct Position([f32; 3]);
//! struct Velocity([f32; 3]);
//!
//! let mut world = World::new();
//! world.register::<Position>();
//! world.register::<Velocity>();
//!
//! let e = world.create_entity();
//! world.attach(e, Position([0.0; 3])).unwrap();
//! world.attach(e, Velocity([1.0, 0.0, 0.0])).unwrap();
//!
//! let moves: Vec<_> = world
//!     .query::<Velocity>()
//!     .map(|(entity, v)| (entity, v.0))
//!     .collect();
//! for (entity, v) in moves {
//!     if let Some(p) = world.get_mut::<Position>(entity) {
//!         p.0[0] += v[0];
//!     }
//! }
//! assert_eq!(world.get::<Position>(e).unwrap().0[0], 1.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod events;

pub use config::WorldConfig;
pub use ecs::{
    ArchetypeId, Component, ComponentId, ComponentMeta, ComponentRegistry, EntityId,
    EntityLocation, EntityPool, Family, IdSpan, Resources, Table, With, Without, World,
};
pub use error::{EcsError, EcsResult};
pub use events::{EventChannel, EventIter, Reader, RingBuffer};
