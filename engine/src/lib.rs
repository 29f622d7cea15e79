//! A chunked-arena entity-component-system runtime: a slab allocator of
//! fixed-capacity chunks, an archetype ("composition") registry keyed by
//! component type-set, and entity handles that stay valid across the
//! compaction a free triggers.
//!
//! `extern crate self` lets `#[derive(Component)]` (in `chunked_ecs_macros`)
//! expand to `impl ::chunked_ecs::component::Component for #name {}` and
//! resolve correctly both from within this crate's own tests and from a
//! downstream crate.
extern crate self as chunked_ecs;

pub mod class_index;
pub mod component;
mod composition;
pub mod entity;
pub mod error;
pub mod id;
mod key;
mod pool;
mod query;
pub mod world;

pub use chunked_ecs_macros::Component;
pub use class_index::ClassIndex;
pub use component::Component;
pub use entity::IntEntity;
pub use error::{EcsError, Result};
pub use id::{ChunkId, IdSchema, RawId, SlotId};
pub use world::{ComponentBundle, World};
