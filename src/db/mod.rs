//! Persistence module split across logical submodules. Each function wraps one
//! query or statement so the repository layer can compose them, including
//! inside a transaction (every helper takes `&Connection`, which a
//! `rusqlite::Transaction` derefs to).

mod birds;
mod connection;
mod habitats;
mod locations;
mod observations;
mod reports;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Error as SqlError, ErrorCode};

use crate::error::CatalogError;
use crate::models::Species;

pub use birds::{delete_bird, fetch_bird, fetch_birds, insert_bird, update_bird, upsert_details};
pub use connection::{ensure_schema, open_catalog, open_in_memory};
pub use habitats::{fetch_habitats_for_bird, insert_habitat};
pub use locations::{delete_location, fetch_location, fetch_locations, insert_location};
pub use observations::{fetch_observations, fetch_observations_for_bird, insert_observation};
pub use reports::{
    add_bird_with_details_and_habitat, add_two_locations, average_observation_count,
    birds_by_location_prefix, birds_observed_in, birds_sorted,
    delete_locations_without_observations_in, locations_by_species,
    locations_with_min_observations, update_species_for_name,
};

/// Species are stored as their ordinal, matching the integer column the
/// relational schema has always used.
impl ToSql for Species {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.ordinal())))
    }
}

impl FromSql for Species {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let ordinal = value.as_i64()?;
        Species::from_ordinal(ordinal).ok_or(FromSqlError::OutOfRange(ordinal))
    }
}

/// Coerce SQLite constraint errors into readable catalog errors. Anything else
/// passes through untouched so the context chain still shows the driver error.
fn map_constraint(err: SqlError, message: impl FnOnce() -> String) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        CatalogError::Constraint(message()).into()
    } else {
        err.into()
    }
}
