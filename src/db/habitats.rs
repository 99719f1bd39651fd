use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::map_constraint;
use crate::models::BirdHabitat;

pub fn fetch_habitats_for_bird(conn: &Connection, bird_id: i64) -> Result<Vec<BirdHabitat>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, bird_id, location_id, season, is_primary_habitat
             FROM bird_habitats
             WHERE bird_id = ?1
             ORDER BY is_primary_habitat DESC, id",
        )
        .context("failed to prepare habitat query")?;

    let habitats = stmt
        .query_map([bird_id], |row| {
            Ok(BirdHabitat {
                id: row.get(0)?,
                bird_id: row.get(1)?,
                location_id: row.get(2)?,
                season: row.get(3)?,
                is_primary_habitat: row.get(4)?,
            })
        })
        .context("failed to load habitats")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect habitats")?;

    Ok(habitats)
}

/// Link a bird to a location. The (bird, location, season) triple is unique.
pub fn insert_habitat(conn: &Connection, habitat: &BirdHabitat) -> Result<BirdHabitat> {
    conn.execute(
        "INSERT INTO bird_habitats (bird_id, location_id, season, is_primary_habitat)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            habitat.bird_id,
            habitat.location_id,
            habitat.season,
            habitat.is_primary_habitat,
        ],
    )
    .map_err(|err| {
        map_constraint(err, || {
            format!(
                "Habitat link ({}) already exists or references a missing bird or location.",
                habitat.season.as_deref().unwrap_or("all seasons")
            )
        })
    })
    .context("failed to insert habitat")?;

    let mut stored = habitat.clone();
    stored.id = conn.last_insert_rowid();
    Ok(stored)
}
