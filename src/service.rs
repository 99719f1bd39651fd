//! Orchestrates the repository and the query layer. Every read re-fetches the
//! collection so views never go stale after a mutation.

use anyhow::Result;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::models::{
    Bird, BirdAtLocation, BirdDetails, BirdHabitat, BirdSummary, Location,
    LocationObservationCount, Observation, Sighting, Species,
};
use crate::query::{self, LocationCount, Page, SpeciesCount};
use crate::repository::{Relational, Repository};
use crate::validation::{
    self, validate_bird, validate_habitat, validate_location, validate_observation, Validation,
};

pub struct BirdService {
    repository: Box<dyn Repository<Bird>>,
}

/// Names and info are stored trimmed, so they are validated trimmed too.
fn trimmed(bird: &Bird) -> Bird {
    Bird {
        name: bird.name.trim().to_string(),
        info: bird.info.trim().to_string(),
        ..bird.clone()
    }
}

fn check(result: Validation) -> Result<()> {
    if result.valid {
        Ok(())
    } else {
        Err(CatalogError::Validation(result.message).into())
    }
}

impl BirdService {
    pub fn new(repository: Box<dyn Repository<Bird>>) -> Self {
        Self { repository }
    }

    /// Whether the backing store supports locations, observations and reports.
    pub fn is_relational(&self) -> bool {
        self.repository.relational().is_some()
    }

    fn relational(&self, what: &'static str) -> Result<&dyn Relational> {
        self.repository
            .relational()
            .ok_or_else(|| CatalogError::Unsupported(what).into())
    }

    pub fn all_birds(&self) -> Result<Vec<Bird>> {
        self.repository.get_all()
    }

    pub fn bird(&self, id: i64) -> Result<Option<Bird>> {
        self.repository.get_by_id(id)
    }

    pub fn add_bird(&mut self, bird: Bird) -> Result<Bird> {
        let bird = trimmed(&bird);
        let existing = self.all_birds()?;
        check(validate_bird(&bird, &existing))?;
        let stored = self.repository.add(bird)?;
        info!(id = stored.id, name = %stored.name, "added bird");
        Ok(stored)
    }

    /// Returns `false` when no bird has this id.
    pub fn update_bird(&mut self, bird: &Bird) -> Result<bool> {
        let bird = trimmed(bird);
        let existing = self.all_birds()?;
        check(validate_bird(&bird, &existing))?;
        let updated = self.repository.update(&bird)?;
        if updated {
            info!(id = bird.id, "updated bird");
        }
        Ok(updated)
    }

    pub fn delete_bird(&mut self, id: i64) -> Result<bool> {
        let deleted = self.repository.delete(id)?;
        if deleted {
            info!(id, "deleted bird");
        }
        Ok(deleted)
    }

    pub fn sorted_birds<K, F>(&self, key: F) -> Result<Vec<Bird>>
    where
        K: PartialOrd,
        F: Fn(&Bird) -> K,
    {
        Ok(query::sort_by_key(&self.all_birds()?, key))
    }

    pub fn birds_matching<P>(&self, predicate: P) -> Result<Vec<Bird>>
    where
        P: Fn(&Bird) -> bool,
    {
        Ok(query::filter(&self.all_birds()?, predicate))
    }

    pub fn search_by_name(&self, needle: &str) -> Result<Vec<Bird>> {
        debug!(needle, "searching birds by name");
        Ok(query::search_by_name(&self.all_birds()?, needle))
    }

    pub fn filter_by_species(&self, species: Species) -> Result<Vec<Bird>> {
        Ok(query::filter_by_species(&self.all_birds()?, species))
    }

    pub fn endangered_birds(&self) -> Result<Vec<Bird>> {
        Ok(query::filter_endangered(&self.all_birds()?, true))
    }

    pub fn birds_in_weight_range(&self, min: f64, max: f64) -> Result<Vec<Bird>> {
        Ok(query::filter_by_weight_range(&self.all_birds()?, min, max))
    }

    pub fn sorted_by_name_desc_then_species(&self) -> Result<Vec<Bird>> {
        Ok(query::sort_by_name_desc_then_species(&self.all_birds()?))
    }

    pub fn basic_info(&self) -> Result<Vec<(String, Species)>> {
        Ok(query::basic_info(&self.all_birds()?))
    }

    pub fn paged_birds(&self, page: i64, size: i64) -> Result<Vec<Bird>> {
        Ok(query::paginate(&self.all_birds()?, page, size))
    }

    pub fn page(&self, page: i64, size: i64) -> Result<Page<Bird>> {
        Ok(query::page_of(&self.all_birds()?, page, size))
    }

    pub fn total_count(&self) -> Result<usize> {
        Ok(query::total_count(&self.all_birds()?))
    }

    pub fn species_distribution(&self) -> Result<Vec<SpeciesCount>> {
        Ok(query::species_distribution(&self.all_birds()?))
    }

    pub fn most_common_species(&self) -> Result<Option<Species>> {
        Ok(query::most_common_species(&self.all_birds()?))
    }

    pub fn average_weight(&self) -> Result<f64> {
        Ok(query::average_weight(&self.all_birds()?))
    }

    pub fn intersection(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
        query::intersection(a, b)
    }

    pub fn set_minus(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
        query::difference(a, b)
    }

    pub fn union(a: &[Bird], b: &[Bird]) -> Vec<Bird> {
        query::union(a, b)
    }

    pub fn locations(&self) -> Result<Vec<Location>> {
        self.relational("Locations")?.locations()
    }

    pub fn add_location(&self, location: &Location) -> Result<Location> {
        let relational = self.relational("Locations")?;
        check(validate_location(location))?;
        relational.add_location(location)
    }

    pub fn delete_location(&self, id: i64) -> Result<bool> {
        self.relational("Locations")?.delete_location(id)
    }

    pub fn observations(&self) -> Result<Vec<Observation>> {
        self.relational("Observations")?.observations()
    }

    pub fn observations_for_bird(&self, bird_id: i64) -> Result<Vec<Observation>> {
        self.relational("Observations")?.observations_for_bird(bird_id)
    }

    pub fn add_observation(&self, observation: &Observation) -> Result<Observation> {
        let relational = self.relational("Observations")?;
        check(validate_observation(observation))?;
        relational.add_observation(observation)
    }

    /// Observation records per location, in first-seen order.
    pub fn observations_per_location(&self) -> Result<Vec<LocationCount>> {
        let observations = self.relational("Observations")?.observations()?;
        Ok(query::observations_per_location(&observations))
    }

    pub fn habitats_for_bird(&self, bird_id: i64) -> Result<Vec<BirdHabitat>> {
        self.relational("Habitats")?.habitats_for_bird(bird_id)
    }

    pub fn add_habitat(&self, habitat: &BirdHabitat) -> Result<BirdHabitat> {
        let relational = self.relational("Habitats")?;
        check(validate_habitat(habitat))?;
        relational.add_habitat(habitat)
    }

    pub fn add_bird_with_details_and_habitat(
        &self,
        bird: &Bird,
        details: &BirdDetails,
        habitat: Option<&BirdHabitat>,
    ) -> Result<Bird> {
        let relational = self.relational("Adding a bird with details")?;
        let bird = trimmed(bird);
        let existing = self.all_birds()?;
        check(validate_bird(&bird, &existing))?;
        check(validation::validate_details(details))?;
        if let Some(habitat) = habitat {
            check(validate_habitat(habitat))?;
        }
        let stored = relational.add_bird_with_details_and_habitat(&bird, details, habitat)?;
        info!(id = stored.id, name = %stored.name, "added bird with details");
        Ok(stored)
    }

    pub fn birds_sorted(&self) -> Result<Vec<BirdSummary>> {
        self.relational("Reports")?.birds_sorted()
    }

    pub fn birds_by_location_prefix(&self, prefix: &str) -> Result<Vec<BirdAtLocation>> {
        self.relational("Reports")?.birds_by_location_prefix(prefix)
    }

    pub fn birds_observed_in(&self, month: u32, year: i32) -> Result<Vec<Sighting>> {
        if !(1..=12).contains(&month) {
            return Err(CatalogError::validation("Month must be between 1 and 12.").into());
        }
        self.relational("Reports")?.birds_observed_in(month, year)
    }

    pub fn locations_with_min_observations(
        &self,
        min_count: i64,
    ) -> Result<Vec<LocationObservationCount>> {
        self.relational("Reports")?
            .locations_with_min_observations(min_count)
    }

    pub fn locations_by_species(&self, species: Species) -> Result<Vec<String>> {
        self.relational("Reports")?.locations_by_species(species)
    }

    pub fn average_observation_count(&self) -> Result<f64> {
        self.relational("Reports")?.average_observation_count()
    }

    pub fn update_species_for_name(&self, name: &str, species: Species) -> Result<bool> {
        self.relational("Reports")?
            .update_species_for_name(name, species)
    }

    pub fn add_two_locations(
        &self,
        first: &Location,
        second: &Location,
    ) -> Result<(Location, Location)> {
        let relational = self.relational("Locations")?;
        check(validate_location(first))?;
        check(validate_location(second))?;
        relational.add_two_locations(first, second)
    }

    pub fn delete_locations_without_observations_in(&self, year: i32) -> Result<usize> {
        let removed = self
            .relational("Reports")?
            .delete_locations_without_observations_in(year)?;
        info!(removed, year, "pruned locations without observations");
        Ok(removed)
    }
}
