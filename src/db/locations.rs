use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::map_constraint;
use crate::models::Location;

pub(super) const LOCATION_COLUMNS: &str =
    "l.id, l.name, l.latitude, l.longitude, l.country, l.region, l.description";

/// Map the seven `LOCATION_COLUMNS` starting at `offset`.
pub(super) fn location_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        latitude: row.get(offset + 2)?,
        longitude: row.get(offset + 3)?,
        country: row.get(offset + 4)?,
        region: row.get(offset + 5)?,
        description: row.get(offset + 6)?,
    })
}

pub fn fetch_locations(conn: &Connection) -> Result<Vec<Location>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations l ORDER BY l.name COLLATE NOCASE, l.id"
        ))
        .context("failed to prepare location query")?;

    let locations = stmt
        .query_map([], |row| location_from_row(row, 0))
        .context("failed to load locations")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect locations")?;

    Ok(locations)
}

pub fn fetch_location(conn: &Connection, id: i64) -> Result<Option<Location>> {
    conn.query_row(
        &format!("SELECT {LOCATION_COLUMNS} FROM locations l WHERE l.id = ?1"),
        [id],
        |row| location_from_row(row, 0),
    )
    .optional()
    .context("failed to load location")
}

/// Insert a location. Coordinates are unique, so a second row at the same
/// spot surfaces as a constraint error naming the coordinates.
pub fn insert_location(conn: &Connection, location: &Location) -> Result<Location> {
    conn.execute(
        "INSERT INTO locations (name, latitude, longitude, country, region, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            location.name,
            location.latitude,
            location.longitude,
            location.country,
            location.region,
            location.description,
        ],
    )
    .map_err(|err| {
        map_constraint(err, || {
            format!(
                "A location already exists at ({}, {}).",
                location.latitude, location.longitude
            )
        })
    })
    .context("failed to insert location")?;

    let mut stored = location.clone();
    stored.id = conn.last_insert_rowid();
    Ok(stored)
}

/// Delete a location. Observations restrict the delete; habitat links cascade.
pub fn delete_location(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM locations WHERE id = ?1", params![id])
        .map_err(|err| {
            map_constraint(err, || {
                "Location still has observations and cannot be deleted.".to_string()
            })
        })
        .context("failed to delete location")?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::CatalogError;

    #[test]
    fn duplicate_coordinates_are_rejected() {
        let conn = open_in_memory().unwrap();
        let err = insert_location(&conn, &Location::new("Copy", 40.7829, -73.9654)).unwrap_err();
        let constraint = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<CatalogError>())
            .cloned();
        assert!(matches!(constraint, Some(CatalogError::Constraint(_))));
    }

    #[test]
    fn insert_fetch_delete_round() {
        let conn = open_in_memory().unwrap();
        let stored = insert_location(&conn, &Location::new("Marsh", 10.0, 20.0)).unwrap();
        assert_eq!(fetch_location(&conn, stored.id).unwrap(), Some(stored.clone()));
        assert_eq!(fetch_locations(&conn).unwrap().len(), 3);
        assert!(delete_location(&conn, stored.id).unwrap());
        assert!(!delete_location(&conn, stored.id).unwrap());
    }
}
