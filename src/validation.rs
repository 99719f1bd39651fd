//! Pre-persistence checks. Each returns a [`Validation`] pair instead of an
//! error so forms can show the message inline and keep the user's input.

use crate::models::{Bird, BirdDetails, BirdHabitat, Location, Observation};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_INFO_LEN: usize = 500;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_DIET_LEN: usize = 200;
pub const MAX_BEHAVIOR_LEN: usize = 200;
pub const MAX_LENGTH_CM: f64 = 100.0;
pub const MAX_WEIGHT_G: f64 = 10_000.0;
pub const MAX_LOCATION_NAME_LEN: usize = 200;
pub const MAX_REGION_LEN: usize = 100;
pub const MAX_LOCATION_DESCRIPTION_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_OBSERVER_LEN: usize = 100;
pub const MAX_SEASON_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }

    /// Keep the first failure; later checks only run while still valid.
    fn and_then(self, next: impl FnOnce() -> Validation) -> Validation {
        if self.valid {
            next()
        } else {
            self
        }
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn max_len(field: &str, value: Option<&str>, max: usize) -> Validation {
    match value {
        Some(value) if char_len(value) > max => {
            Validation::fail(format!("{field} must be at most {max} characters."))
        }
        _ => Validation::ok(),
    }
}

fn within(field: &str, value: Option<f64>, min: f64, max: f64) -> Validation {
    match value {
        Some(value) if !(min..=max).contains(&value) => {
            Validation::fail(format!("{field} must be between {min} and {max}."))
        }
        _ => Validation::ok(),
    }
}

/// Name is required, at most 100 characters, and must not match another
/// bird's name ignoring case. `exclude_id` lets an edit keep its own name.
pub fn validate_bird_name(name: &str, existing: &[Bird], exclude_id: Option<i64>) -> Validation {
    let name = name.trim();
    if name.is_empty() {
        return Validation::fail("Bird name is required.");
    }
    if char_len(name) > MAX_NAME_LEN {
        return Validation::fail(format!(
            "Bird name must be at most {MAX_NAME_LEN} characters."
        ));
    }

    let lowered = name.to_lowercase();
    let duplicate = existing
        .iter()
        .filter(|b| Some(b.id) != exclude_id)
        .any(|b| b.name.trim().to_lowercase() == lowered);
    if duplicate {
        return Validation::fail(format!("A bird named '{name}' already exists."));
    }

    Validation::ok()
}

pub fn validate_bird_info(info: &str) -> Validation {
    if info.trim().is_empty() {
        return Validation::fail("Bird info is required.");
    }
    max_len("Bird info", Some(info), MAX_INFO_LEN)
}

pub fn validate_details(details: &BirdDetails) -> Validation {
    if details.info.trim().is_empty() {
        return Validation::fail("Details info is required.");
    }
    max_len("Details info", Some(&details.info), MAX_INFO_LEN)
        .and_then(|| {
            max_len("Description", details.description.as_deref(), MAX_DESCRIPTION_LEN)
        })
        .and_then(|| max_len("Diet", details.diet.as_deref(), MAX_DIET_LEN))
        .and_then(|| max_len("Behavior", details.behavior.as_deref(), MAX_BEHAVIOR_LEN))
        .and_then(|| within("Average length", details.average_length, 0.0, MAX_LENGTH_CM))
        .and_then(|| within("Average weight", details.average_weight, 0.0, MAX_WEIGHT_G))
}

/// Name, info and (when present) details of a bird about to be stored.
pub fn validate_bird(bird: &Bird, existing: &[Bird]) -> Validation {
    let exclude = (bird.id != 0).then_some(bird.id);
    validate_bird_name(&bird.name, existing, exclude)
        .and_then(|| validate_bird_info(&bird.info))
        .and_then(|| match &bird.details {
            Some(details) => validate_details(details),
            None => Validation::ok(),
        })
}

pub fn validate_location(location: &Location) -> Validation {
    if location.name.trim().is_empty() {
        return Validation::fail("Location name is required.");
    }
    max_len("Location name", Some(&location.name), MAX_LOCATION_NAME_LEN)
        .and_then(|| within("Latitude", Some(location.latitude), -90.0, 90.0))
        .and_then(|| within("Longitude", Some(location.longitude), -180.0, 180.0))
        .and_then(|| max_len("Country", location.country.as_deref(), MAX_REGION_LEN))
        .and_then(|| max_len("Region", location.region.as_deref(), MAX_REGION_LEN))
        .and_then(|| {
            max_len(
                "Location description",
                location.description.as_deref(),
                MAX_LOCATION_DESCRIPTION_LEN,
            )
        })
}

pub fn validate_observation(observation: &Observation) -> Validation {
    if observation.count < 1 {
        return Validation::fail("Observation count must be at least 1.");
    }
    max_len("Notes", observation.notes.as_deref(), MAX_NOTES_LEN).and_then(|| {
        max_len(
            "Observer name",
            observation.observer_name.as_deref(),
            MAX_OBSERVER_LEN,
        )
    })
}

pub fn validate_habitat(habitat: &BirdHabitat) -> Validation {
    max_len("Season", habitat.season.as_deref(), MAX_SEASON_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Species;

    fn existing() -> Vec<Bird> {
        vec![Bird {
            id: 1,
            ..Bird::new("Snowy Owl", Species::Owl, "white")
        }]
    }

    #[test]
    fn name_of_101_chars_is_too_long() {
        let name = "a".repeat(101);
        let result = validate_bird_name(&name, &[], None);
        assert!(!result.valid);
        assert_eq!(result.message, "Bird name must be at most 100 characters.");
        assert!(validate_bird_name(&"a".repeat(100), &[], None).valid);
    }

    #[test]
    fn duplicate_names_ignore_case() {
        let result = validate_bird_name("snowy OWL", &existing(), None);
        assert!(!result.valid);
        assert_eq!(result.message, "A bird named 'snowy OWL' already exists.");
        assert!(validate_bird_name("Snowy Owl", &existing(), Some(1)).valid);
    }

    #[test]
    fn blank_name_is_required() {
        assert_eq!(
            validate_bird_name("   ", &[], None),
            Validation::fail("Bird name is required.")
        );
    }

    #[test]
    fn details_bounds() {
        let mut details = BirdDetails::new("ok");
        assert!(validate_details(&details).valid);

        details.average_weight = Some(10_000.0);
        details.average_length = Some(0.0);
        assert!(validate_details(&details).valid);

        details.average_weight = Some(10_000.5);
        assert!(!validate_details(&details).valid);

        details.average_weight = None;
        details.info = "x".repeat(501);
        assert_eq!(
            validate_details(&details).message,
            "Details info must be at most 500 characters."
        );

        assert!(!validate_details(&BirdDetails::new("")).valid);
    }

    #[test]
    fn location_and_observation_rules() {
        let mut location = Location::new("Lake", 91.0, 0.0);
        assert!(!validate_location(&location).valid);
        location.latitude = 45.0;
        assert!(validate_location(&location).valid);

        let mut observation =
            Observation::new(1, 1, chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(validate_observation(&observation).valid);
        observation.count = 0;
        assert!(!validate_observation(&observation).valid);

        let habitat = BirdHabitat::new(1, Some(&"s".repeat(51)));
        assert!(!validate_habitat(&habitat).valid);
    }
}
