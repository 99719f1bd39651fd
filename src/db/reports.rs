//! The canned report queries and the two all-or-nothing insert sequences.
//! Reports 4, 6 and 9 are plain SQL aggregates; the others compose joins the
//! same way the entity helpers do.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::locations::{location_from_row, LOCATION_COLUMNS};
use super::{insert_bird, insert_habitat, insert_location, map_constraint};
use crate::models::{
    Bird, BirdAtLocation, BirdDetails, BirdHabitat, BirdSummary, Location,
    LocationObservationCount, Sighting, Species,
};

/// Report 1: id, name and species ordered by id ascending, then name
/// descending.
pub fn birds_sorted(conn: &Connection) -> Result<Vec<BirdSummary>> {
    let mut stmt = conn
        .prepare("SELECT id, name, species FROM birds ORDER BY id ASC, name DESC")
        .context("failed to prepare sorted birds report")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(BirdSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                species: row.get(2)?,
            })
        })
        .context("failed to run sorted birds report")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect sorted birds report")?;

    Ok(rows)
}

/// Report 2: birds with a habitat whose location name starts with `prefix`
/// (case-sensitive). Each bird appears once, paired with its earliest matching
/// habitat's location.
pub fn birds_by_location_prefix(conn: &Connection, prefix: &str) -> Result<Vec<BirdAtLocation>> {
    let mut stmt = conn
        .prepare(
            "SELECT b.id, b.name, l.name
             FROM birds b
             INNER JOIN bird_habitats bh ON bh.bird_id = b.id
             INNER JOIN locations l ON l.id = bh.location_id
             WHERE bh.id = (
                 SELECT MIN(bh2.id)
                 FROM bird_habitats bh2
                 INNER JOIN locations l2 ON l2.id = bh2.location_id
                 WHERE bh2.bird_id = b.id
                   AND substr(l2.name, 1, length(?1)) = ?1
             )
             ORDER BY b.id",
        )
        .context("failed to prepare location prefix report")?;

    let rows = stmt
        .query_map([prefix], |row| {
            Ok(BirdAtLocation {
                bird_id: row.get(0)?,
                bird_name: row.get(1)?,
                location_name: row.get(2)?,
            })
        })
        .context("failed to run location prefix report")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect location prefix report")?;

    Ok(rows)
}

/// Report 3: sightings in the given calendar month (1-12) of `year`.
pub fn birds_observed_in(conn: &Connection, month: u32, year: i32) -> Result<Vec<Sighting>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT b.name, o.observation_date, {LOCATION_COLUMNS}
             FROM observations o
             INNER JOIN birds b ON b.id = o.bird_id
             INNER JOIN locations l ON l.id = o.location_id
             WHERE CAST(strftime('%m', o.observation_date) AS INTEGER) = ?1
               AND CAST(strftime('%Y', o.observation_date) AS INTEGER) = ?2
             ORDER BY o.observation_date, o.id"
        ))
        .context("failed to prepare monthly sightings report")?;

    let rows = stmt
        .query_map(params![month, year], |row| {
            Ok(Sighting {
                bird_name: row.get(0)?,
                observation_date: row.get(1)?,
                location: location_from_row(row, 2)?,
            })
        })
        .context("failed to run monthly sightings report")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect monthly sightings report")?;

    Ok(rows)
}

/// Report 4: locations with strictly more than `min_count` observations.
pub fn locations_with_min_observations(
    conn: &Connection,
    min_count: i64,
) -> Result<Vec<LocationObservationCount>> {
    let mut stmt = conn
        .prepare(
            "SELECT l.name, COUNT(o.id) AS count
             FROM locations l
             INNER JOIN observations o ON l.id = o.location_id
             GROUP BY l.name
             HAVING COUNT(o.id) > ?1
             ORDER BY l.name",
        )
        .context("failed to prepare busy locations report")?;

    let rows = stmt
        .query_map([min_count], |row| {
            Ok(LocationObservationCount {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })
        .context("failed to run busy locations report")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect busy locations report")?;

    Ok(rows)
}

/// Report 5: names of locations where a bird of `species` has a habitat.
pub fn locations_by_species(conn: &Connection, species: Species) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT l.name
             FROM locations l
             WHERE EXISTS (
                 SELECT 1 FROM bird_habitats bh
                 INNER JOIN birds b ON b.id = bh.bird_id
                 WHERE bh.location_id = l.id AND b.species = ?1
             )
             ORDER BY l.id",
        )
        .context("failed to prepare species locations report")?;

    let mut rows = stmt
        .query([species])
        .context("failed to run species locations report")?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().context("failed to fetch location row")? {
        let name: String = row.get(0).context("failed to read location name")?;
        names.push(name);
    }

    Ok(names)
}

/// Report 6: mean observation count, `0.0` when nothing has been observed.
pub fn average_observation_count(conn: &Connection) -> Result<f64> {
    let average: Option<f64> = conn
        .query_row(
            "SELECT AVG(CAST(count AS REAL)) FROM observations",
            [],
            |row| row.get(0),
        )
        .context("failed to compute average observation count")?;
    Ok(average.unwrap_or(0.0))
}

/// Report 7: move every bird named exactly `name` to `species`. Returns
/// whether any bird matched.
pub fn update_species_for_name(conn: &Connection, name: &str, species: Species) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE birds SET species = ?1, updated_at = ?2 WHERE name = ?3",
            params![species, Utc::now(), name],
        )
        .context("failed to update species")?;
    debug!(name, %species, updated, "bulk species update");
    Ok(updated > 0)
}

/// Report 8: insert two locations inside one transaction; either both land or
/// neither does.
pub fn add_two_locations(
    conn: &Connection,
    first: &Location,
    second: &Location,
) -> Result<(Location, Location)> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let first = insert_location(&tx, first)?;
    let second = insert_location(&tx, second)?;

    tx.commit().context("failed to commit locations")?;
    Ok((first, second))
}

/// Report 9: delete locations with no observation dated in `year`. Locations
/// still holding observations from other years block the delete.
pub fn delete_locations_without_observations_in(conn: &Connection, year: i32) -> Result<usize> {
    let deleted = conn
        .execute(
            "DELETE FROM locations
             WHERE id NOT IN (
                 SELECT DISTINCT location_id
                 FROM observations
                 WHERE CAST(strftime('%Y', observation_date) AS INTEGER) = ?1
             )",
            [year],
        )
        .map_err(|err| {
            map_constraint(err, || {
                format!("Some locations without {year} observations still have older observations.")
            })
        })
        .context("failed to delete unused locations")?;
    Ok(deleted)
}

/// Insert a bird, its details and an optional habitat link as one unit. The
/// transaction rolls back on drop if any step fails.
pub fn add_bird_with_details_and_habitat(
    conn: &Connection,
    bird: &Bird,
    details: &BirdDetails,
    habitat: Option<&BirdHabitat>,
) -> Result<Bird> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let bird = bird.clone().with_details(details.clone());
    let stored = insert_bird(&tx, &bird)?;

    if let Some(habitat) = habitat {
        let mut habitat = habitat.clone();
        habitat.bird_id = stored.id;
        if let Err(err) = insert_habitat(&tx, &habitat) {
            warn!(bird = %stored.name, "habitat insert failed, rolling back bird");
            return Err(err);
        }
    }

    tx.commit().context("failed to commit bird")?;
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::{
        fetch_birds, fetch_locations, insert_habitat, insert_observation, open_in_memory,
    };
    use crate::models::Observation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Two birds, seeded locations 1 (Central Park) and 2 (Yellowstone).
    fn fixture() -> (Connection, Bird, Bird) {
        let conn = open_in_memory().unwrap();
        let owl = insert_bird(&conn, &Bird::new("Hoot", Species::Owl, "nocturnal")).unwrap();
        let crow = insert_bird(&conn, &Bird::new("Corvo", Species::Crow, "clever")).unwrap();
        (conn, owl, crow)
    }

    fn observe(conn: &Connection, bird: i64, location: i64, on: NaiveDate, count: i64) {
        let mut observation = Observation::new(bird, location, on);
        observation.count = count;
        insert_observation(conn, &observation).unwrap();
    }

    #[test]
    fn sorted_report_orders_by_id() {
        let (conn, owl, crow) = fixture();
        let rows = birds_sorted(&conn).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![owl.id, crow.id]);
        assert_eq!(rows[0].species, Species::Owl);
    }

    #[test]
    fn prefix_report_matches_case_sensitively() {
        let (conn, owl, crow) = fixture();
        insert_habitat(&conn, &BirdHabitat { bird_id: owl.id, ..BirdHabitat::new(2, None) })
            .unwrap();
        insert_habitat(&conn, &BirdHabitat { bird_id: owl.id, ..BirdHabitat::new(1, None) })
            .unwrap();
        insert_habitat(&conn, &BirdHabitat { bird_id: crow.id, ..BirdHabitat::new(2, None) })
            .unwrap();

        let rows = birds_by_location_prefix(&conn, "Central").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bird_name, "Hoot");
        assert_eq!(rows[0].location_name, "Central Park");

        assert!(birds_by_location_prefix(&conn, "central").unwrap().is_empty());
        assert_eq!(birds_by_location_prefix(&conn, "").unwrap().len(), 2);
    }

    #[test]
    fn monthly_report_filters_month_and_year() {
        let (conn, owl, crow) = fixture();
        observe(&conn, owl.id, 1, date(2024, 9, 3), 1);
        observe(&conn, crow.id, 2, date(2024, 10, 1), 2);
        observe(&conn, crow.id, 2, date(2023, 9, 20), 1);

        let rows = birds_observed_in(&conn, 9, 2024).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bird_name, "Hoot");
        assert_eq!(rows[0].location.name, "Central Park");
        assert_eq!(rows[0].observation_date, date(2024, 9, 3));
    }

    #[test]
    fn aggregate_reports() {
        let (conn, owl, crow) = fixture();
        assert_eq!(average_observation_count(&conn).unwrap(), 0.0);

        observe(&conn, owl.id, 1, date(2024, 1, 1), 1);
        observe(&conn, crow.id, 1, date(2024, 1, 2), 4);
        observe(&conn, crow.id, 2, date(2024, 1, 3), 1);

        let busy = locations_with_min_observations(&conn, 1).unwrap();
        assert_eq!(
            busy,
            vec![LocationObservationCount {
                name: "Central Park".to_string(),
                count: 2
            }]
        );
        assert_eq!(average_observation_count(&conn).unwrap(), 2.0);
    }

    #[test]
    fn species_locations_report() {
        let (conn, owl, _) = fixture();
        insert_habitat(
            &conn,
            &BirdHabitat { bird_id: owl.id, ..BirdHabitat::new(2, Some("Winter")) },
        )
        .unwrap();
        assert_eq!(
            locations_by_species(&conn, Species::Owl).unwrap(),
            vec!["Yellowstone National Park".to_string()]
        );
        assert!(locations_by_species(&conn, Species::Crow).unwrap().is_empty());
    }

    #[test]
    fn bulk_species_update() {
        let (conn, _, _) = fixture();
        insert_bird(&conn, &Bird::new("Hoot", Species::Parrot, "second hoot")).unwrap();

        assert!(update_species_for_name(&conn, "Hoot", Species::Eagle).unwrap());
        assert!(!update_species_for_name(&conn, "Nobody", Species::Eagle).unwrap());

        let eagles = fetch_birds(&conn)
            .unwrap()
            .into_iter()
            .filter(|b| b.species == Species::Eagle)
            .count();
        assert_eq!(eagles, 2);
    }

    #[test]
    fn two_locations_are_all_or_nothing() {
        let conn = open_in_memory().unwrap();
        let fresh = Location::new("Marsh", 1.0, 1.0);
        let clash = Location::new("Central copy", 40.7829, -73.9654);

        assert!(add_two_locations(&conn, &fresh, &clash).is_err());
        assert_eq!(fetch_locations(&conn).unwrap().len(), 2);

        let (a, b) = add_two_locations(&conn, &fresh, &Location::new("Bay", 2.0, 2.0)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(fetch_locations(&conn).unwrap().len(), 4);
    }

    #[test]
    fn unused_locations_are_deleted() {
        let (conn, owl, _) = fixture();
        observe(&conn, owl.id, 1, date(2024, 5, 5), 1);

        let deleted = delete_locations_without_observations_in(&conn, 2024).unwrap();

        assert_eq!(deleted, 1);
        let names: Vec<String> = fetch_locations(&conn)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Central Park".to_string()]);
    }

    #[test]
    fn failed_habitat_rolls_back_bird() {
        let conn = open_in_memory().unwrap();
        let bird = Bird::new("Ghost", Species::Owl, "never stored");
        let details = BirdDetails::new("ghostly");
        let missing_location = BirdHabitat::new(999, Some("Fall"));

        let result =
            add_bird_with_details_and_habitat(&conn, &bird, &details, Some(&missing_location));

        assert!(result.is_err());
        assert!(fetch_birds(&conn).unwrap().is_empty());
        let details_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM bird_details", [], |row| row.get(0))
            .unwrap();
        assert_eq!(details_rows, 0);
    }

    #[test]
    fn bird_details_and_habitat_commit_together() {
        let conn = open_in_memory().unwrap();
        let stored = add_bird_with_details_and_habitat(
            &conn,
            &Bird::new("Polly", Species::Parrot, "talks"),
            &BirdDetails::new("green"),
            Some(&BirdHabitat::new(1, Some("Summer"))),
        )
        .unwrap();

        assert_eq!(stored.details.as_ref().map(|d| d.bird_id), Some(stored.id));
        assert_eq!(crate::db::fetch_habitats_for_bird(&conn, stored.id).unwrap().len(), 1);
    }
}
