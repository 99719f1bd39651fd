//! Whole-collection persistence for the JSON mode.

mod json;

use anyhow::Result;

pub use json::JsonStorage;

/// Load/save contract for a flat list of records. Loading never fails: a
/// store that cannot produce data yields an empty list and logs why.
pub trait DataStorage<T> {
    fn load(&self) -> Vec<T>;
    fn save(&self, data: &[T]) -> Result<()>;
}
