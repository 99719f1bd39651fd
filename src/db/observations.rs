use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use super::map_constraint;
use crate::models::Observation;

const OBSERVATION_COLUMNS: &str = "id, bird_id, location_id, observation_date, count, notes,
     observer_name, created_at FROM observations";

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        bird_id: row.get(1)?,
        location_id: row.get(2)?,
        observation_date: row.get(3)?,
        count: row.get(4)?,
        notes: row.get(5)?,
        observer_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn fetch_observations(conn: &Connection) -> Result<Vec<Observation>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} ORDER BY observation_date, id"
        ))
        .context("failed to prepare observation query")?;

    let observations = stmt
        .query_map([], observation_from_row)
        .context("failed to load observations")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect observations")?;

    Ok(observations)
}

pub fn fetch_observations_for_bird(conn: &Connection, bird_id: i64) -> Result<Vec<Observation>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {OBSERVATION_COLUMNS} WHERE bird_id = ?1 ORDER BY observation_date, id"
        ))
        .context("failed to prepare bird observation query")?;

    let observations = stmt
        .query_map([bird_id], observation_from_row)
        .context("failed to load bird observations")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect bird observations")?;

    Ok(observations)
}

/// Record a sighting. Unknown bird or location ids fail the foreign keys.
pub fn insert_observation(conn: &Connection, observation: &Observation) -> Result<Observation> {
    conn.execute(
        "INSERT INTO observations
            (bird_id, location_id, observation_date, count, notes, observer_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            observation.bird_id,
            observation.location_id,
            observation.observation_date,
            observation.count,
            observation.notes,
            observation.observer_name,
            observation.created_at,
        ],
    )
    .map_err(|err| {
        map_constraint(err, || {
            "Observation must reference an existing bird and location.".to_string()
        })
    })
    .context("failed to insert observation")?;

    let mut stored = observation.clone();
    stored.id = conn.last_insert_rowid();
    Ok(stored)
}
