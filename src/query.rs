//! In-memory views over a materialized bird collection: sorting, filtering,
//! pagination, grouping and id-keyed set algebra.
//!
//! Every function borrows its input and returns fresh data, so callers can
//! hand in the slice they just fetched from a repository without worrying
//! about it changing underneath them. Aggregates over an empty slice return a
//! neutral value (zero, `None`, an empty list) instead of failing.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Bird, Observation, Species};

/// One page of a larger collection, with enough metadata to render a pager.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Requested page number, echoed back unvalidated.
    pub page: i64,
    pub size: i64,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeciesCount {
    pub species: Species,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationCount {
    pub location_id: i64,
    pub observations: usize,
}

/// Stable ascending sort by a caller-supplied key. Keys that cannot be
/// compared (a NaN weight, say) are treated as equal and keep input order.
pub fn sort_by_key<K, F>(birds: &[Bird], key: F) -> Vec<Bird>
where
    K: PartialOrd,
    F: Fn(&Bird) -> K,
{
    let mut sorted = birds.to_vec();
    sorted.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));
    sorted
}

pub fn filter<P>(birds: &[Bird], predicate: P) -> Vec<Bird>
where
    P: Fn(&Bird) -> bool,
{
    birds.iter().filter(|&b| predicate(b)).cloned().collect()
}

/// Case-insensitive substring match on the name. An empty needle matches
/// everything.
pub fn search_by_name(birds: &[Bird], needle: &str) -> Vec<Bird> {
    let needle = needle.to_lowercase();
    filter(birds, |b| b.name.to_lowercase().contains(&needle))
}

pub fn filter_by_species(birds: &[Bird], species: Species) -> Vec<Bird> {
    filter(birds, |b| b.species == species)
}

pub fn filter_endangered(birds: &[Bird], endangered: bool) -> Vec<Bird> {
    filter(birds, |b| b.is_endangered() == endangered)
}

/// Birds whose recorded weight lies in `[min, max]`. Birds without a weight
/// never match.
pub fn filter_by_weight_range(birds: &[Bird], min: f64, max: f64) -> Vec<Bird> {
    filter(birds, |b| b.weight().is_some_and(|w| w >= min && w <= max))
}

/// Name descending, then species ordinal ascending.
pub fn sort_by_name_desc_then_species(birds: &[Bird]) -> Vec<Bird> {
    let mut sorted = birds.to_vec();
    sorted.sort_by(|a, b| {
        b.name
            .cmp(&a.name)
            .then_with(|| a.species.cmp(&b.species))
    });
    sorted
}

/// 1-indexed page slice: skip `(page - 1) * size`, take `size`.
///
/// Inputs are not validated. A skip that works out negative skips nothing, a
/// size of zero or less takes nothing, and a page past the end is empty.
pub fn paginate(birds: &[Bird], page: i64, size: i64) -> Vec<Bird> {
    if size <= 0 {
        return Vec::new();
    }
    let skip = page.saturating_sub(1).saturating_mul(size).max(0);
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let take = usize::try_from(size).unwrap_or(usize::MAX);
    birds.iter().skip(skip).take(take).cloned().collect()
}

/// [`paginate`] plus totals. `total_pages` is `ceil(total / size)`, or zero
/// when `size` is not positive.
pub fn page_of(birds: &[Bird], page: i64, size: i64) -> Page<Bird> {
    let total = birds.len();
    let total_pages = match usize::try_from(size) {
        Ok(size) if size > 0 => total.div_ceil(size),
        _ => 0,
    };
    Page {
        items: paginate(birds, page, size),
        page,
        size,
        total,
        total_pages,
    }
}

pub fn total_count(birds: &[Bird]) -> usize {
    birds.len()
}

/// Group by species, keeping groups in the order their first member appears.
pub fn species_distribution(birds: &[Bird]) -> Vec<SpeciesCount> {
    let mut groups: Vec<SpeciesCount> = Vec::new();
    for bird in birds {
        match groups.iter_mut().find(|g| g.species == bird.species) {
            Some(group) => group.count += 1,
            None => groups.push(SpeciesCount {
                species: bird.species,
                count: 1,
            }),
        }
    }
    groups
}

/// Number of observation records per location, in first-seen order.
pub fn observations_per_location(observations: &[Observation]) -> Vec<LocationCount> {
    let mut groups: Vec<LocationCount> = Vec::new();
    for observation in observations {
        match groups
            .iter_mut()
            .find(|g| g.location_id == observation.location_id)
        {
            Some(group) => group.observations += 1,
            None => groups.push(LocationCount {
                location_id: observation.location_id,
                observations: 1,
            }),
        }
    }
    groups
}

/// Species with the most birds. On a tie the group encountered first wins.
pub fn most_common_species(birds: &[Bird]) -> Option<Species> {
    let mut best: Option<SpeciesCount> = None;
    for group in species_distribution(birds) {
        if best.map_or(true, |b| group.count > b.count) {
            best = Some(group);
        }
    }
    best.map(|g| g.species)
}

/// Mean weight over birds that have one; `0.0` when none do.
pub fn average_weight(birds: &[Bird]) -> f64 {
    let weights: Vec<f64> = birds.iter().filter_map(Bird::weight).collect();
    if weights.is_empty() {
        0.0
    } else {
        weights.iter().sum::<f64>() / weights.len() as f64
    }
}

/// Birds of `a` whose id also appears in `b`. Each id is emitted once.
pub fn intersection(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
    let keys: HashSet<i64> = b.iter().map(|bird| bird.id).collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|bird| keys.contains(&bird.id) && seen.insert(bird.id))
        .cloned()
        .collect()
}

/// Birds of `a` whose id does not appear in `b`. Each id is emitted once.
pub fn difference(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
    let keys: HashSet<i64> = b.iter().map(|bird| bird.id).collect();
    let mut seen = HashSet::new();
    a.iter()
        .filter(|bird| !keys.contains(&bird.id) && seen.insert(bird.id))
        .cloned()
        .collect()
}

/// Every id from `a` then `b`; the first occurrence of an id wins.
pub fn union(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
    let mut seen = HashSet::new();
    a.iter()
        .chain(b)
        .filter(|bird| seen.insert(bird.id))
        .cloned()
        .collect()
}

pub fn basic_info(birds: &[Bird]) -> Vec<(String, Species)> {
    birds.iter().map(|b| (b.name.clone(), b.species)).collect()
}
