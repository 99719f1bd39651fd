use anyhow::{Context, Result};
use rusqlite::Connection;

use super::{Relational, Repository};
use crate::db;
use crate::models::{
    Bird, BirdAtLocation, BirdDetails, BirdHabitat, BirdSummary, Location,
    LocationObservationCount, Observation, Sighting, Species,
};

/// Bird repository backed by the relational store. Birds load with their
/// details; related entities and reports are reachable through
/// [`Repository::relational`].
pub struct SqliteBirdRepository {
    conn: Connection,
}

impl SqliteBirdRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Repository<Bird> for SqliteBirdRepository {
    /// Bird and details go in together or not at all.
    fn add(&mut self, bird: Bird) -> Result<Bird> {
        let tx = self
            .conn
            .transaction()
            .context("failed to begin transaction")?;
        let stored = db::insert_bird(&tx, &bird)?;
        tx.commit().context("failed to commit bird")?;
        Ok(stored)
    }

    fn update(&mut self, bird: &Bird) -> Result<bool> {
        let tx = self
            .conn
            .transaction()
            .context("failed to begin transaction")?;
        let updated = db::update_bird(&tx, bird)?;
        tx.commit().context("failed to commit bird update")?;
        Ok(updated)
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        db::delete_bird(&self.conn, id)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Bird>> {
        db::fetch_bird(&self.conn, id)
    }

    fn get_all(&self) -> Result<Vec<Bird>> {
        db::fetch_birds(&self.conn)
    }

    fn relational(&self) -> Option<&dyn Relational> {
        Some(self)
    }
}

impl Relational for SqliteBirdRepository {
    fn locations(&self) -> Result<Vec<Location>> {
        db::fetch_locations(&self.conn)
    }

    fn add_location(&self, location: &Location) -> Result<Location> {
        db::insert_location(&self.conn, location)
    }

    fn delete_location(&self, id: i64) -> Result<bool> {
        db::delete_location(&self.conn, id)
    }

    fn observations(&self) -> Result<Vec<Observation>> {
        db::fetch_observations(&self.conn)
    }

    fn observations_for_bird(&self, bird_id: i64) -> Result<Vec<Observation>> {
        db::fetch_observations_for_bird(&self.conn, bird_id)
    }

    fn add_observation(&self, observation: &Observation) -> Result<Observation> {
        db::insert_observation(&self.conn, observation)
    }

    fn habitats_for_bird(&self, bird_id: i64) -> Result<Vec<BirdHabitat>> {
        db::fetch_habitats_for_bird(&self.conn, bird_id)
    }

    fn add_habitat(&self, habitat: &BirdHabitat) -> Result<BirdHabitat> {
        db::insert_habitat(&self.conn, habitat)
    }

    fn add_bird_with_details_and_habitat(
        &self,
        bird: &Bird,
        details: &BirdDetails,
        habitat: Option<&BirdHabitat>,
    ) -> Result<Bird> {
        db::add_bird_with_details_and_habitat(&self.conn, bird, details, habitat)
    }

    fn birds_sorted(&self) -> Result<Vec<BirdSummary>> {
        db::birds_sorted(&self.conn)
    }

    fn birds_by_location_prefix(&self, prefix: &str) -> Result<Vec<BirdAtLocation>> {
        db::birds_by_location_prefix(&self.conn, prefix)
    }

    fn birds_observed_in(&self, month: u32, year: i32) -> Result<Vec<Sighting>> {
        db::birds_observed_in(&self.conn, month, year)
    }

    fn locations_with_min_observations(
        &self,
        min_count: i64,
    ) -> Result<Vec<LocationObservationCount>> {
        db::locations_with_min_observations(&self.conn, min_count)
    }

    fn locations_by_species(&self, species: Species) -> Result<Vec<String>> {
        db::locations_by_species(&self.conn, species)
    }

    fn average_observation_count(&self) -> Result<f64> {
        db::average_observation_count(&self.conn)
    }

    fn update_species_for_name(&self, name: &str, species: Species) -> Result<bool> {
        db::update_species_for_name(&self.conn, name, species)
    }

    fn add_two_locations(
        &self,
        first: &Location,
        second: &Location,
    ) -> Result<(Location, Location)> {
        db::add_two_locations(&self.conn, first, second)
    }

    fn delete_locations_without_observations_in(&self, year: i32) -> Result<usize> {
        db::delete_locations_without_observations_in(&self.conn, year)
    }
}
