//! Domain models that mirror the relational schema and get passed throughout
//! the catalog. The intent is that these types stay light-weight data holders
//! so other layers can focus on querying, validation and persistence. Report
//! rows returned by the relational store live at the bottom of the file.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of bird taxa recognized by the catalog. Declaration order is the
/// ordinal stored in SQLite and accepted from legacy JSON files, so new
/// variants must only ever be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SpeciesRepr")]
pub enum Species {
    Cardinal,
    Sparrow,
    Eagle,
    Owl,
    Parrot,
    Crow,
    Penguin,
}

impl Species {
    /// Every species in ordinal order. Used by pickers and distribution reports.
    pub const ALL: [Species; 7] = [
        Species::Cardinal,
        Species::Sparrow,
        Species::Eagle,
        Species::Owl,
        Species::Parrot,
        Species::Crow,
        Species::Penguin,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::Cardinal => "Cardinal",
            Species::Sparrow => "Sparrow",
            Species::Eagle => "Eagle",
            Species::Owl => "Owl",
            Species::Parrot => "Parrot",
            Species::Crow => "Crow",
            Species::Penguin => "Penguin",
        }
    }

    /// Step through the enumeration, wrapping at both ends. The add form uses
    /// this to cycle the species field with the arrow keys.
    pub fn cycle(self, offset: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let idx = (self.ordinal() as isize + offset).rem_euclid(len);
        Self::ALL[idx as usize]
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when text or a number does not name a species.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown species '{0}'")]
pub struct UnknownSpecies(pub String);

impl FromStr for Species {
    type Err = UnknownSpecies;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|species| species.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSpecies(wanted.to_string()))
    }
}

/// Wire shapes accepted for a species in JSON: the name, or the ordinal the
/// first desktop revision wrote.
#[derive(Deserialize)]
#[serde(untagged)]
enum SpeciesRepr {
    Ordinal(i64),
    Name(String),
}

impl TryFrom<SpeciesRepr> for Species {
    type Error = UnknownSpecies;

    fn try_from(repr: SpeciesRepr) -> Result<Self, Self::Error> {
        match repr {
            SpeciesRepr::Ordinal(ordinal) => {
                Species::from_ordinal(ordinal).ok_or_else(|| UnknownSpecies(ordinal.to_string()))
            }
            SpeciesRepr::Name(name) => name.parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A catalogued bird. `details` is populated when the relational store has a
/// matching `bird_details` row; JSON mode never carries details.
pub struct Bird {
    /// Primary key. Zero means "not stored yet"; repositories assign the real
    /// id on insert.
    pub id: i64,
    /// Display name, at most 100 characters and unique ignoring case.
    pub name: String,
    pub species: Species,
    /// Short free-text summary shown on the info card.
    pub info: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub details: Option<BirdDetails>,
}

impl Bird {
    /// Build an unsaved bird stamped with the current time.
    pub fn new(name: impl Into<String>, species: Species, info: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            species,
            info: info.into(),
            created_at: Utc::now(),
            updated_at: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: BirdDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Average weight in grams, when the details record one.
    pub fn weight(&self) -> Option<f64> {
        self.details.as_ref().and_then(|d| d.average_weight)
    }

    /// Birds without details are treated as not endangered.
    pub fn is_endangered(&self) -> bool {
        self.details.as_ref().is_some_and(|d| d.is_endangered)
    }
}

impl fmt::Display for Bird {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// One-to-one extension of a bird, keyed by the owning bird's id.
pub struct BirdDetails {
    pub bird_id: i64,
    pub info: String,
    pub description: Option<String>,
    /// Centimetres, within `[0, 100]`.
    pub average_length: Option<f64>,
    /// Grams, within `[0, 10000]`.
    pub average_weight: Option<f64>,
    pub diet: Option<String>,
    pub behavior: Option<String>,
    pub is_endangered: bool,
}

impl BirdDetails {
    pub fn new(info: impl Into<String>) -> Self {
        Self {
            info: info.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A dated sighting of a bird at a location.
pub struct Observation {
    pub id: i64,
    pub bird_id: i64,
    pub location_id: i64,
    pub observation_date: NaiveDate,
    /// Number of individuals seen, at least one.
    pub count: i64,
    pub notes: Option<String>,
    pub observer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(bird_id: i64, location_id: i64, observation_date: NaiveDate) -> Self {
        Self {
            id: 0,
            bird_id,
            location_id,
            observation_date,
            count: 1,
            notes: None,
            observer_name: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A named place with coordinates. The coordinate pair is unique.
pub struct Location {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            latitude,
            longitude,
            country: None,
            region: None,
            description: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.4}, {:.4})", self.name, self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Habitat link: records that a bird uses a location, optionally for a season.
pub struct BirdHabitat {
    pub id: i64,
    pub bird_id: i64,
    pub location_id: i64,
    /// Spring, Summer, Fall, Winter or any other short label.
    pub season: Option<String>,
    pub is_primary_habitat: bool,
}

impl BirdHabitat {
    pub fn new(location_id: i64, season: Option<&str>) -> Self {
        Self {
            location_id,
            season: season.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Row persisted by the JSON store. Keys are PascalCase so files written by
/// the first desktop revision load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BirdRecord {
    pub id: i64,
    pub name: String,
    pub species: Species,
    #[serde(default)]
    pub info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Bird> for BirdRecord {
    fn from(bird: &Bird) -> Self {
        Self {
            id: bird.id,
            name: bird.name.clone(),
            species: bird.species,
            info: bird.info.clone(),
            created_at: Some(bird.created_at),
            updated_at: bird.updated_at,
        }
    }
}

impl From<BirdRecord> for Bird {
    fn from(record: BirdRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            species: record.species,
            info: record.info,
            created_at: record.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            updated_at: record.updated_at,
            details: None,
        }
    }
}

/// Report 1 row.
#[derive(Debug, Clone, PartialEq)]
pub struct BirdSummary {
    pub id: i64,
    pub name: String,
    pub species: Species,
}

/// Report 2 row: a bird and the matching habitat location.
#[derive(Debug, Clone, PartialEq)]
pub struct BirdAtLocation {
    pub bird_id: i64,
    pub bird_name: String,
    pub location_name: String,
}

/// Report 3 row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub bird_name: String,
    pub location: Location,
    pub observation_date: NaiveDate,
}

/// Report 4 row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationObservationCount {
    pub name: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_parses_names_case_insensitively() {
        assert_eq!("owl".parse::<Species>(), Ok(Species::Owl));
        assert_eq!(" PENGUIN ".parse::<Species>(), Ok(Species::Penguin));
        assert!("dodo".parse::<Species>().is_err());
    }

    #[test]
    fn species_json_accepts_name_or_ordinal() {
        let by_name: Species = serde_json::from_str("\"Crow\"").unwrap();
        let by_ordinal: Species = serde_json::from_str("5").unwrap();
        assert_eq!(by_name, Species::Crow);
        assert_eq!(by_ordinal, Species::Crow);
        assert!(serde_json::from_str::<Species>("42").is_err());
        assert_eq!(serde_json::to_string(&Species::Eagle).unwrap(), "\"Eagle\"");
    }

    #[test]
    fn species_cycle_wraps() {
        assert_eq!(Species::Penguin.cycle(1), Species::Cardinal);
        assert_eq!(Species::Cardinal.cycle(-1), Species::Penguin);
    }

    #[test]
    fn legacy_record_without_timestamp_loads() {
        let raw = r#"{"Id":3,"Name":"Hoot","Species":3,"Info":"night shift"}"#;
        let record: BirdRecord = serde_json::from_str(raw).unwrap();
        let bird = Bird::from(record);
        assert_eq!(bird.species, Species::Owl);
        assert_eq!(bird.created_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(bird.updated_at, None);
    }
}
