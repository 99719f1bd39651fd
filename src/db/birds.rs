use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Bird, BirdDetails};

/// Column list shared by every bird query. Details come from a LEFT JOIN so a
/// bird without a details row still loads.
const BIRD_COLUMNS: &str = "b.id, b.name, b.species, b.info, b.created_at, b.updated_at,
     d.bird_id, d.info, d.description, d.average_length, d.average_weight,
     d.diet, d.behavior, d.is_endangered
     FROM birds b
     LEFT JOIN bird_details d ON d.bird_id = b.id";

fn bird_from_row(row: &Row<'_>) -> rusqlite::Result<Bird> {
    let details_id: Option<i64> = row.get(6)?;
    let details = match details_id {
        Some(bird_id) => Some(BirdDetails {
            bird_id,
            info: row.get(7)?,
            description: row.get(8)?,
            average_length: row.get(9)?,
            average_weight: row.get(10)?,
            diet: row.get(11)?,
            behavior: row.get(12)?,
            is_endangered: row.get(13)?,
        }),
        None => None,
    };

    Ok(Bird {
        id: row.get(0)?,
        name: row.get(1)?,
        species: row.get(2)?,
        info: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        details,
    })
}

/// Retrieve every bird with its details, in insertion (id) order.
pub fn fetch_birds(conn: &Connection) -> Result<Vec<Bird>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {BIRD_COLUMNS} ORDER BY b.id"))
        .context("failed to prepare bird query")?;

    let birds = stmt
        .query_map([], bird_from_row)
        .context("failed to load birds")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect birds")?;

    Ok(birds)
}

pub fn fetch_bird(conn: &Connection, id: i64) -> Result<Option<Bird>> {
    conn.query_row(
        &format!("SELECT {BIRD_COLUMNS} WHERE b.id = ?1"),
        [id],
        bird_from_row,
    )
    .optional()
    .context("failed to load bird")
}

/// Insert a bird and, when present, its details. Returns the hydrated struct
/// carrying the new id. Callers wanting all-or-nothing pass a transaction.
pub fn insert_bird(conn: &Connection, bird: &Bird) -> Result<Bird> {
    conn.execute(
        "INSERT INTO birds (name, species, info, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![bird.name, bird.species, bird.info, bird.created_at, bird.updated_at],
    )
    .context("failed to insert bird")?;

    let id = conn.last_insert_rowid();
    let mut stored = bird.clone();
    stored.id = id;

    if let Some(details) = stored.details.as_mut() {
        details.bird_id = id;
        upsert_details(conn, details)?;
    }

    Ok(stored)
}

/// Write the details row for `details.bird_id`, replacing any existing one.
pub fn upsert_details(conn: &Connection, details: &BirdDetails) -> Result<()> {
    conn.execute(
        "INSERT INTO bird_details
            (bird_id, info, description, average_length, average_weight, diet, behavior, is_endangered)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(bird_id) DO UPDATE SET
            info = excluded.info,
            description = excluded.description,
            average_length = excluded.average_length,
            average_weight = excluded.average_weight,
            diet = excluded.diet,
            behavior = excluded.behavior,
            is_endangered = excluded.is_endangered",
        params![
            details.bird_id,
            details.info,
            details.description,
            details.average_length,
            details.average_weight,
            details.diet,
            details.behavior,
            details.is_endangered,
        ],
    )
    .context("failed to write bird details")?;
    Ok(())
}

/// Update the editable bird fields and stamp `updated_at`. Returns `false`
/// when no bird has that id.
pub fn update_bird(conn: &Connection, bird: &Bird) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE birds SET name = ?1, species = ?2, info = ?3, updated_at = ?4 WHERE id = ?5",
            params![bird.name, bird.species, bird.info, Utc::now(), bird.id],
        )
        .context("failed to update bird")?;

    if updated == 0 {
        return Ok(false);
    }

    if let Some(details) = &bird.details {
        let mut details = details.clone();
        details.bird_id = bird.id;
        upsert_details(conn, &details)?;
    }
    Ok(true)
}

/// Remove a bird. Details, observations and habitat links cascade.
pub fn delete_bird(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM birds WHERE id = ?1", params![id])
        .context("failed to delete bird")?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::models::Species;

    #[test]
    fn insert_and_fetch_with_details() {
        let conn = open_in_memory().unwrap();
        let mut details = BirdDetails::new("Large raptor");
        details.average_weight = Some(4500.0);
        details.is_endangered = true;
        let bird = Bird::new("Baldy", Species::Eagle, "national bird").with_details(details);

        let stored = insert_bird(&conn, &bird).unwrap();
        let loaded = fetch_bird(&conn, stored.id).unwrap().unwrap();

        assert_eq!(loaded.name, "Baldy");
        assert_eq!(loaded.species, Species::Eagle);
        let details = loaded.details.unwrap();
        assert_eq!(details.bird_id, stored.id);
        assert_eq!(details.average_weight, Some(4500.0));
        assert!(details.is_endangered);
    }

    #[test]
    fn bird_without_details_loads_none() {
        let conn = open_in_memory().unwrap();
        let stored = insert_bird(&conn, &Bird::new("Pip", Species::Sparrow, "small")).unwrap();
        let all = fetch_birds(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, stored.id);
        assert!(all[0].details.is_none());
    }

    #[test]
    fn update_stamps_time_and_reports_missing() {
        let conn = open_in_memory().unwrap();
        let mut stored = insert_bird(&conn, &Bird::new("Pip", Species::Sparrow, "small")).unwrap();
        stored.name = "Pipper".to_string();

        assert!(update_bird(&conn, &stored).unwrap());
        let loaded = fetch_bird(&conn, stored.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Pipper");
        assert!(loaded.updated_at.is_some());

        stored.id = 999;
        assert!(!update_bird(&conn, &stored).unwrap());
    }

    #[test]
    fn delete_missing_bird_is_false() {
        let conn = open_in_memory().unwrap();
        assert!(!delete_bird(&conn, 42).unwrap());
    }
}
