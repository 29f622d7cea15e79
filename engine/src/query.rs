//! Lazy-ish chunk-scan queries over compositions (spec.md §4.8).
//!
//! Grounded on `engine/src/ecs/storage/table.rs` (`Table::iter_views` /
//! the `View` trait: typed tuple projection through a precomputed column
//! index) and `engine/src/ecs/storage/mod.rs` (`Storage::supporting` —
//! the superset filter that hands a query the set of tables to scan).
//! Disabled slots are skipped during the chunk scan itself, per spec.md
//! §4.8, rather than filtered afterward. `findComponents` is specified for
//! 1..6 component types (spec.md §6); `impl_scan!` below generates one
//! function per arity rather than hand-duplicating the chunk-walk six
//! times, the same call the design notes make ("code-generate or
//! macro-expand six typed-tuple iterators").

use crate::component::Component;
use crate::entity::IntEntity;
use crate::id::SlotId;
use crate::key::IndexKey;
use crate::world::WorldInner;

macro_rules! impl_scan {
    ($fn_name:ident, $($name:ident),+) => {
        /// `findComponents<
        #[doc = stringify!($($name),+)]
        /// >`: every currently-enabled, non-deleted entity carrying all of
        /// these component types, paired with a clone of each current value.
        pub(crate) fn $fn_name<$($name: Component + Clone),+>(world: &WorldInner) -> Vec<(IntEntity, $($name),+)> {
            #[allow(non_snake_case)]
            let ($($name,)+) = ($(world.classes.get::<$name>(),)+);
            $(let Some($name) = $name else { return Vec::new() };)+
            let key = IndexKey::from_classes(&[$($name),+]);
            let mut results = Vec::new();

            for composition in world.repo.matching(&key) {
                #[allow(non_snake_case)]
                let ($($name,)+) =
                    ($(composition.column_index_of($name).expect("matching() guarantees this class is present"),)+);
                for chunk in world.pool.chunks_of(composition.tenant()) {
                    for slot_index in 0..chunk.logical_size() {
                        let slot = SlotId(slot_index);
                        if !chunk.is_enabled(slot) {
                            continue;
                        }
                        let Some(handle) = chunk.get_item(slot) else { continue };
                        if handle.is_deleted() {
                            continue;
                        }
                        // SAFETY: each index was resolved from this
                        // composition for its respective type; `slot` is a
                        // live, enabled entity's own slot.
                        #[allow(non_snake_case)]
                        let ($($name,)+) =
                            ($(unsafe { chunk.column($name).get::<$name>(slot.index()) }.clone(),)+);
                        results.push((IntEntity::from_handle(handle), $($name),+));
                    }
                }
            }
            results
        }
    };
}

impl_scan!(scan1, A);
impl_scan!(scan2, A, B);
impl_scan!(scan3, A, B, C);
impl_scan!(scan4, A, B, C, D);
impl_scan!(scan5, A, B, C, D, E);
impl_scan!(scan6, A, B, C, D, E, F);
