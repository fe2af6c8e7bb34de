//! # Entity Component System
//!
//! Archetype-based ECS: every distinct set of components (a [`Family`]) owns
//! one columnar [`Table`], and entities move between tables as components
//! are attached and detached.
//!
//! ## Design Philosophy
//!
//! - Entity ids are indices with generation counters
//! - Components are stored in dense, type-erased columns
//! - Archetype lookup on the hot path never allocates
//! - Component ids come from a per-World registry

mod component;
mod entity;
pub mod family;
mod resources;
mod table;
mod world;

pub use component::{Component, ComponentId, ComponentMeta, ComponentRegistry, DropFn};
pub use entity::{EntityId, EntityPool};
pub use family::{AttachmentId, Family, IdSpan, With, WithIter, Without};
pub use resources::Resources;
pub use table::Table;
pub use world::{ArchetypeId, EntityLocation, World};
