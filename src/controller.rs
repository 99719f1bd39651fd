//! Command handlers sitting between the presentation adapters and the
//! service. `Controller::handle` never fails: every error becomes a
//! [`Notice`] the caller can show.

use std::fmt;

use anyhow::Error;
use tracing::{error, warn};

use crate::error::CatalogError;
use crate::models::{
    Bird, BirdAtLocation, BirdSummary, Location, LocationObservationCount, Sighting, Species,
};
use crate::query::{Page, SpeciesCount};
use crate::service::BirdService;

/// Input for a new bird. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBird {
    pub name: String,
    pub species: Species,
    pub info: String,
}

impl From<NewBird> for Bird {
    fn from(value: NewBird) -> Self {
        Bird::new(value.name.trim(), value.species, value.info.trim())
    }
}

/// The relational reports, with their arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    BirdsSorted,
    BirdsByLocationPrefix(String),
    BirdsObservedIn { month: u32, year: i32 },
    LocationsWithMinObservations(i64),
    LocationsBySpecies(Species),
    AverageObservationCount,
    UpdateSpeciesForName { name: String, species: Species },
    AddTwoLocations(Location, Location),
    DeleteLocationsWithoutObservationsIn(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    Birds(Vec<BirdSummary>),
    BirdsAtLocations(Vec<BirdAtLocation>),
    Sightings(Vec<Sighting>),
    LocationCounts(Vec<LocationObservationCount>),
    LocationNames(Vec<String>),
    Average(f64),
    SpeciesUpdated,
    LocationsAdded(Location, Location),
    LocationsDeleted(usize),
}

impl fmt::Display for ReportOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutput::Birds(rows) => {
                for row in rows {
                    writeln!(f, "{:>5}  {:<30} {}", row.id, row.name, row.species)?;
                }
                Ok(())
            }
            ReportOutput::BirdsAtLocations(rows) => {
                for row in rows {
                    writeln!(f, "{:<30} {}", row.bird_name, row.location_name)?;
                }
                Ok(())
            }
            ReportOutput::Sightings(rows) => {
                for row in rows {
                    writeln!(
                        f,
                        "{}  {:<30} {}",
                        row.observation_date, row.bird_name, row.location
                    )?;
                }
                Ok(())
            }
            ReportOutput::LocationCounts(rows) => {
                for row in rows {
                    writeln!(f, "{:<40} {}", row.name, row.count)?;
                }
                Ok(())
            }
            ReportOutput::LocationNames(names) => {
                for name in names {
                    writeln!(f, "{name}")?;
                }
                Ok(())
            }
            ReportOutput::Average(value) => writeln!(f, "{value:.2}"),
            ReportOutput::SpeciesUpdated => writeln!(f, "Species updated."),
            ReportOutput::LocationsAdded(first, second) => {
                writeln!(f, "Added {} (#{}) and {} (#{}).", first, first.id, second, second.id)
            }
            ReportOutput::LocationsDeleted(count) => writeln!(f, "Deleted {count} location(s)."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total: usize,
    pub distribution: Vec<SpeciesCount>,
    pub most_common: Option<Species>,
    pub average_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    Select(i64),
    Add(NewBird),
    Update(Bird),
    DeleteSelected,
    Delete(i64),
    Search(String),
    FilterSpecies(Species),
    SortByNameDesc,
    Page { page: i64, size: i64 },
    Statistics,
    Report(Report),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Birds(Vec<Bird>),
    Selected(Option<Bird>),
    Added(Bird),
    Updated(Bird),
    Deleted(i64),
    Page(Page<Bird>),
    Statistics(Statistics),
    Report(ReportOutput),
    Notice(Notice),
}

pub struct Controller {
    service: BirdService,
    selected: Option<i64>,
}

impl Controller {
    pub fn new(service: BirdService) -> Self {
        Self {
            service,
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn is_relational(&self) -> bool {
        self.service.is_relational()
    }

    pub fn handle(&mut self, command: Command) -> Response {
        match self.dispatch(command) {
            Ok(response) => response,
            Err(err) => Response::Notice(notice_for(&err)),
        }
    }

    fn dispatch(&mut self, command: Command) -> anyhow::Result<Response> {
        let response = match command {
            Command::Refresh => Response::Birds(self.service.all_birds()?),
            Command::Select(id) => match self.service.bird(id)? {
                Some(bird) => {
                    self.selected = Some(bird.id);
                    Response::Selected(Some(bird))
                }
                None => {
                    self.selected = None;
                    return Err(CatalogError::NotFound { entity: "Bird", id }.into());
                }
            },
            Command::Add(new_bird) => Response::Added(self.service.add_bird(new_bird.into())?),
            Command::Update(bird) => {
                if !self.service.update_bird(&bird)? {
                    return Err(CatalogError::NotFound { entity: "Bird", id: bird.id }.into());
                }
                let stored = self.service.bird(bird.id)?.unwrap_or(bird);
                Response::Updated(stored)
            }
            Command::DeleteSelected => match self.selected {
                Some(id) => self.delete(id)?,
                None => Response::Notice(Notice::warning("Select a bird to delete first.")),
            },
            Command::Delete(id) => self.delete(id)?,
            Command::Search(text) => Response::Birds(self.service.search_by_name(&text)?),
            Command::FilterSpecies(species) => {
                Response::Birds(self.service.filter_by_species(species)?)
            }
            Command::SortByNameDesc => {
                Response::Birds(self.service.sorted_by_name_desc_then_species()?)
            }
            Command::Page { page, size } => Response::Page(self.service.page(page, size)?),
            Command::Statistics => Response::Statistics(Statistics {
                total: self.service.total_count()?,
                distribution: self.service.species_distribution()?,
                most_common: self.service.most_common_species()?,
                average_weight: self.service.average_weight()?,
            }),
            Command::Report(report) => self.report(report)?,
        };
        Ok(response)
    }

    fn delete(&mut self, id: i64) -> anyhow::Result<Response> {
        if !self.service.delete_bird(id)? {
            return Err(CatalogError::NotFound { entity: "Bird", id }.into());
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(Response::Deleted(id))
    }

    /// Runs a report. A species update that matches no bird is an info
    /// notice rather than a failure.
    fn report(&self, report: Report) -> anyhow::Result<Response> {
        let service = &self.service;
        let output = match report {
            Report::BirdsSorted => ReportOutput::Birds(service.birds_sorted()?),
            Report::BirdsByLocationPrefix(prefix) => {
                ReportOutput::BirdsAtLocations(service.birds_by_location_prefix(&prefix)?)
            }
            Report::BirdsObservedIn { month, year } => {
                ReportOutput::Sightings(service.birds_observed_in(month, year)?)
            }
            Report::LocationsWithMinObservations(min) => {
                ReportOutput::LocationCounts(service.locations_with_min_observations(min)?)
            }
            Report::LocationsBySpecies(species) => {
                ReportOutput::LocationNames(service.locations_by_species(species)?)
            }
            Report::AverageObservationCount => {
                ReportOutput::Average(service.average_observation_count()?)
            }
            Report::UpdateSpeciesForName { name, species } => {
                if !service.update_species_for_name(&name, species)? {
                    return Ok(Response::Notice(Notice::info(format!(
                        "No bird is named '{name}'."
                    ))));
                }
                ReportOutput::SpeciesUpdated
            }
            Report::AddTwoLocations(first, second) => {
                let (first, second) = service.add_two_locations(&first, &second)?;
                ReportOutput::LocationsAdded(first, second)
            }
            Report::DeleteLocationsWithoutObservationsIn(year) => {
                ReportOutput::LocationsDeleted(service.delete_locations_without_observations_in(year)?)
            }
        };
        Ok(Response::Report(output))
    }
}

/// Domain refusals become warnings; anything else is a storage failure.
fn notice_for(err: &Error) -> Notice {
    let domain = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<CatalogError>());
    match domain {
        Some(domain) => {
            warn!(error = %domain, "request refused");
            Notice::warning(domain.to_string())
        }
        None => {
            error!(error = ?err, "storage operation failed");
            let cause = err
                .chain()
                .last()
                .map(|cause| cause.to_string())
                .unwrap_or_else(|| err.to_string());
            Notice::error(cause)
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;
    use crate::db;
    use crate::models::BirdRecord;
    use crate::repository::{JsonBirdRepository, SqliteBirdRepository};
    use crate::storage::{DataStorage, JsonStorage};

    fn controller() -> Controller {
        let repo = SqliteBirdRepository::new(db::open_in_memory().unwrap());
        Controller::new(BirdService::new(Box::new(repo)))
    }

    fn new_bird(name: &str, species: Species) -> NewBird {
        NewBird {
            name: name.to_string(),
            species,
            info: format!("{name} info"),
        }
    }

    fn added(controller: &mut Controller, name: &str, species: Species) -> Bird {
        match controller.handle(Command::Add(new_bird(name, species))) {
            Response::Added(bird) => bird,
            other => panic!("expected Added, got {other:?}"),
        }
    }

    #[test]
    fn delete_without_selection_warns() {
        let mut controller = controller();
        let response = controller.handle(Command::DeleteSelected);
        assert_eq!(
            response,
            Response::Notice(Notice::warning("Select a bird to delete first."))
        );
    }

    #[test]
    fn delete_selected_clears_selection() {
        let mut controller = controller();
        let bird = added(&mut controller, "Hoot", Species::Owl);

        assert!(matches!(
            controller.handle(Command::Select(bird.id)),
            Response::Selected(Some(_))
        ));
        assert_eq!(controller.selected(), Some(bird.id));

        assert_eq!(controller.handle(Command::DeleteSelected), Response::Deleted(bird.id));
        assert_eq!(controller.selected(), None);
        assert_eq!(controller.handle(Command::Refresh), Response::Birds(Vec::new()));
    }

    #[test]
    fn invalid_add_warns_and_does_not_persist() {
        let mut controller = controller();
        let response = controller.handle(Command::Add(new_bird("", Species::Crow)));
        assert_eq!(
            response,
            Response::Notice(Notice::warning("Bird name is required."))
        );
        assert_eq!(controller.handle(Command::Refresh), Response::Birds(Vec::new()));
    }

    #[test]
    fn unknown_ids_warn() {
        let mut controller = controller();
        let Response::Notice(notice) = controller.handle(Command::Delete(42)) else {
            panic!("expected a notice");
        };
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.message, "Bird 42 not found");

        let Response::Notice(notice) = controller.handle(Command::Select(42)) else {
            panic!("expected a notice");
        };
        assert_eq!(notice.severity, Severity::Warning);
    }

    #[test]
    fn update_returns_stored_bird() {
        let mut controller = controller();
        let mut bird = added(&mut controller, "Pip", Species::Sparrow);
        bird.species = Species::Parrot;

        let Response::Updated(stored) = controller.handle(Command::Update(bird.clone())) else {
            panic!("expected Updated");
        };
        assert_eq!(stored.species, Species::Parrot);
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn statistics_summarize_collection() {
        let mut controller = controller();
        added(&mut controller, "Corvo", Species::Crow);
        added(&mut controller, "Hoot", Species::Owl);
        added(&mut controller, "Cora", Species::Crow);

        let Response::Statistics(stats) = controller.handle(Command::Statistics) else {
            panic!("expected Statistics");
        };
        assert_eq!(stats.total, 3);
        assert_eq!(stats.most_common, Some(Species::Crow));
        assert_eq!(stats.distribution[0], SpeciesCount { species: Species::Crow, count: 2 });
        assert_eq!(stats.average_weight, 0.0);
    }

    #[test]
    fn reports_run_in_sqlite_and_warn_in_json() {
        let mut controller = controller();
        added(&mut controller, "Hoot", Species::Owl);
        let Response::Report(ReportOutput::Birds(rows)) =
            controller.handle(Command::Report(Report::BirdsSorted))
        else {
            panic!("expected report rows");
        };
        assert_eq!(rows.len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::<BirdRecord>::new(dir.path().join("birds.json"));
        let mut json = Controller::new(BirdService::new(Box::new(JsonBirdRepository::new(storage))));
        let Response::Notice(notice) = json.handle(Command::Report(Report::AverageObservationCount))
        else {
            panic!("expected a notice");
        };
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.message, "Reports is only available with the SQLite store");
    }

    #[test]
    fn species_update_without_a_match_is_informational() {
        let mut controller = controller();
        added(&mut controller, "Hoot", Species::Owl);

        let missing = Report::UpdateSpeciesForName {
            name: "Nobody".to_string(),
            species: Species::Crow,
        };
        assert_eq!(
            controller.handle(Command::Report(missing)),
            Response::Notice(Notice::info("No bird is named 'Nobody'."))
        );

        let found = Report::UpdateSpeciesForName {
            name: "Hoot".to_string(),
            species: Species::Crow,
        };
        assert_eq!(
            controller.handle(Command::Report(found)),
            Response::Report(ReportOutput::SpeciesUpdated)
        );
        let Response::Birds(crows) = controller.handle(Command::FilterSpecies(Species::Crow))
        else {
            panic!("expected birds");
        };
        assert_eq!(crows.len(), 1);
    }

    struct BrokenStorage;

    impl DataStorage<BirdRecord> for BrokenStorage {
        fn load(&self) -> Vec<BirdRecord> {
            Vec::new()
        }

        fn save(&self, _data: &[BirdRecord]) -> anyhow::Result<()> {
            Err(anyhow!("disk full").context("failed to write birds"))
        }
    }

    #[test]
    fn storage_failures_become_error_notices() {
        let repo = JsonBirdRepository::new(BrokenStorage);
        let mut controller = Controller::new(BirdService::new(Box::new(repo)));

        let response = controller.handle(Command::Add(new_bird("Hoot", Species::Owl)));
        assert_eq!(response, Response::Notice(Notice::error("disk full")));
        assert_eq!(controller.handle(Command::Refresh), Response::Birds(Vec::new()));
    }
}
