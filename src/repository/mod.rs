//! CRUD access to the bird collection, independent of where it is stored.

mod json;
mod sqlite;

use anyhow::Result;

use crate::models::{
    Bird, BirdAtLocation, BirdDetails, BirdHabitat, BirdSummary, Location,
    LocationObservationCount, Observation, Sighting, Species,
};

pub use json::JsonBirdRepository;
pub use sqlite::SqliteBirdRepository;

/// Materialized CRUD over one entity type. Unknown ids are not errors:
/// `update`/`delete` return `false` and `get_by_id` returns `None`.
pub trait Repository<T> {
    /// Store a new entity and return it with its assigned id.
    fn add(&mut self, entity: T) -> Result<T>;
    fn update(&mut self, entity: &T) -> Result<bool>;
    fn delete(&mut self, id: i64) -> Result<bool>;
    fn get_by_id(&self, id: i64) -> Result<Option<T>>;
    fn get_all(&self) -> Result<Vec<T>>;

    /// Related-entity and report access, when the backing store has it.
    fn relational(&self) -> Option<&dyn Relational> {
        None
    }
}

/// Operations that only exist when birds live in the relational store.
pub trait Relational {
    fn locations(&self) -> Result<Vec<Location>>;
    fn add_location(&self, location: &Location) -> Result<Location>;
    fn delete_location(&self, id: i64) -> Result<bool>;

    fn observations(&self) -> Result<Vec<Observation>>;
    fn observations_for_bird(&self, bird_id: i64) -> Result<Vec<Observation>>;
    fn add_observation(&self, observation: &Observation) -> Result<Observation>;

    fn habitats_for_bird(&self, bird_id: i64) -> Result<Vec<BirdHabitat>>;
    fn add_habitat(&self, habitat: &BirdHabitat) -> Result<BirdHabitat>;

    fn add_bird_with_details_and_habitat(
        &self,
        bird: &Bird,
        details: &BirdDetails,
        habitat: Option<&BirdHabitat>,
    ) -> Result<Bird>;

    fn birds_sorted(&self) -> Result<Vec<BirdSummary>>;
    fn birds_by_location_prefix(&self, prefix: &str) -> Result<Vec<BirdAtLocation>>;
    fn birds_observed_in(&self, month: u32, year: i32) -> Result<Vec<Sighting>>;
    fn locations_with_min_observations(&self, min_count: i64)
        -> Result<Vec<LocationObservationCount>>;
    fn locations_by_species(&self, species: Species) -> Result<Vec<String>>;
    fn average_observation_count(&self) -> Result<f64>;
    fn update_species_for_name(&self, name: &str, species: Species) -> Result<bool>;
    fn add_two_locations(&self, first: &Location, second: &Location)
        -> Result<(Location, Location)>;
    fn delete_locations_without_observations_in(&self, year: i32) -> Result<usize>;
}
