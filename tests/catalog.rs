use std::fs;

use chrono::NaiveDate;

use bird_catalog::controller::{Command, Controller, NewBird, Report, ReportOutput, Response};
use bird_catalog::db;
use bird_catalog::models::{BirdDetails, BirdHabitat, BirdRecord, Location, Observation, Species};
use bird_catalog::repository::{JsonBirdRepository, SqliteBirdRepository};
use bird_catalog::service::BirdService;
use bird_catalog::storage::JsonStorage;
use bird_catalog::{Bird, Severity};

fn json_controller(path: &std::path::Path) -> Controller {
    let storage = JsonStorage::<BirdRecord>::new(path);
    Controller::new(BirdService::new(Box::new(JsonBirdRepository::new(storage))))
}

fn new_bird(name: &str, species: Species) -> NewBird {
    NewBird {
        name: name.to_string(),
        species,
        info: format!("{name} was here"),
    }
}

#[test]
fn json_catalog_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("birds.json");

    {
        let mut controller = json_controller(&path);
        for (name, species) in [
            ("Hoot", Species::Owl),
            ("Corvo", Species::Crow),
            ("Cora", Species::Crow),
        ] {
            assert!(matches!(
                controller.handle(Command::Add(new_bird(name, species))),
                Response::Added(_)
            ));
        }
        assert_eq!(controller.handle(Command::Delete(1)), Response::Deleted(1));
    }

    let mut controller = json_controller(&path);
    let Response::Birds(birds) = controller.handle(Command::Refresh) else {
        panic!("expected birds");
    };
    let ids: Vec<i64> = birds.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![2, 3]);

    let Response::Added(next) = controller.handle(Command::Add(new_bird("Pip", Species::Sparrow)))
    else {
        panic!("expected Added");
    };
    assert_eq!(next.id, 4);
}

#[test]
fn json_file_from_an_older_release_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birds.json");
    fs::write(
        &path,
        r#"[
            {"Id": 7, "Name": "Tux", "Species": 6, "Info": "waddles"},
            {"Id": 9, "Name": "Polly", "Species": "Parrot"}
        ]"#,
    )
    .unwrap();

    let mut controller = json_controller(&path);
    let Response::Page(page) = controller.handle(Command::Page { page: 1, size: 10 }) else {
        panic!("expected a page");
    };
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].species, Species::Penguin);
    assert_eq!(page.items[1].species, Species::Parrot);
    assert_eq!(page.items[1].info, "");
}

#[test]
fn malformed_json_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birds.json");
    fs::write(&path, "{ not json").unwrap();

    let mut controller = json_controller(&path);
    assert_eq!(controller.handle(Command::Refresh), Response::Birds(Vec::new()));
}

#[test]
fn sqlite_catalog_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("birds.sqlite");

    let bird_id = {
        let repo = SqliteBirdRepository::new(db::open_catalog(&db_path).unwrap());
        let service = BirdService::new(Box::new(repo));

        let mut details = BirdDetails::new("Large owl of the tundra");
        details.average_weight = Some(1800.0);
        let bird = service
            .add_bird_with_details_and_habitat(
                &Bird::new("Snowy", Species::Owl, "white"),
                &details,
                Some(&BirdHabitat::new(1, Some("Winter"))),
            )
            .unwrap();

        let mut observation =
            Observation::new(bird.id, 1, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        observation.count = 3;
        service.add_observation(&observation).unwrap();
        bird.id
    };

    let repo = SqliteBirdRepository::new(db::open_catalog(&db_path).unwrap());
    let mut controller = Controller::new(BirdService::new(Box::new(repo)));

    let Response::Selected(Some(bird)) = controller.handle(Command::Select(bird_id)) else {
        panic!("expected the stored bird");
    };
    assert_eq!(bird.weight(), Some(1800.0));

    let Response::Report(ReportOutput::BirdsAtLocations(rows)) =
        controller.handle(Command::Report(Report::BirdsByLocationPrefix("Central".into())))
    else {
        panic!("expected prefix report");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location_name, "Central Park");

    let Response::Report(ReportOutput::Sightings(rows)) = controller.handle(Command::Report(
        Report::BirdsObservedIn { month: 1, year: 2024 },
    )) else {
        panic!("expected sightings");
    };
    assert_eq!(rows.len(), 1);

    assert_eq!(
        controller.handle(Command::Report(Report::AverageObservationCount)),
        Response::Report(ReportOutput::Average(3.0))
    );

    // Yellowstone has no 2024 observations; Central Park has one.
    assert_eq!(
        controller.handle(Command::Report(Report::DeleteLocationsWithoutObservationsIn(2024))),
        Response::Report(ReportOutput::LocationsDeleted(1))
    );

    let duplicate = Report::AddTwoLocations(
        Location::new("Lake", 10.0, 10.0),
        Location::new("Central Park Again", 40.7829, -73.9654),
    );
    let Response::Notice(notice) = controller.handle(Command::Report(duplicate)) else {
        panic!("expected a notice");
    };
    assert_eq!(notice.severity, Severity::Warning);

    let Response::Report(ReportOutput::LocationNames(names)) =
        controller.handle(Command::Report(Report::LocationsBySpecies(Species::Owl)))
    else {
        panic!("expected location names");
    };
    assert_eq!(names, vec!["Central Park".to_string()]);

    assert_eq!(controller.handle(Command::Delete(bird_id)), Response::Deleted(bird_id));
    assert_eq!(
        controller.handle(Command::Report(Report::AverageObservationCount)),
        Response::Report(ReportOutput::Average(0.0))
    );
}
