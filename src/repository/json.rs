use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::Repository;
use crate::error::CatalogError;
use crate::models::{Bird, BirdRecord};
use crate::storage::DataStorage;

/// Bird repository for the JSON mode. The list is loaded once at construction
/// and is the sole source of truth afterwards; every mutation rewrites the
/// whole file. A mutation only lands in memory after its save succeeded.
pub struct JsonBirdRepository<S> {
    storage: S,
    birds: Vec<Bird>,
}

impl<S> JsonBirdRepository<S>
where
    S: DataStorage<BirdRecord>,
{
    pub fn new(storage: S) -> Self {
        let birds: Vec<Bird> = storage.load().into_iter().map(Bird::from).collect();
        info!(birds = birds.len(), "loaded JSON catalog");
        Self { storage, birds }
    }

    fn next_id(&self) -> Result<i64> {
        let max = self.birds.iter().map(|b| b.id).max().unwrap_or(0);
        max.checked_add(1).ok_or_else(|| {
            CatalogError::Constraint(format!("No bird id is left after {max}.")).into()
        })
    }

    /// Persist `candidate` and adopt it as the in-memory list on success.
    fn commit(&mut self, candidate: Vec<Bird>) -> Result<()> {
        let records: Vec<BirdRecord> = candidate.iter().map(BirdRecord::from).collect();
        self.storage.save(&records)?;
        self.birds = candidate;
        Ok(())
    }
}

impl<S> Repository<Bird> for JsonBirdRepository<S>
where
    S: DataStorage<BirdRecord>,
{
    fn add(&mut self, mut bird: Bird) -> Result<Bird> {
        if bird.id == 0 {
            bird.id = self.next_id()?;
        } else if self.birds.iter().any(|b| b.id == bird.id) {
            return Err(CatalogError::Constraint(format!("Bird id {} already exists.", bird.id)).into());
        }
        // The flat file has nowhere to keep details.
        bird.details = None;

        let mut candidate = self.birds.clone();
        candidate.push(bird.clone());
        self.commit(candidate)?;
        Ok(bird)
    }

    fn update(&mut self, bird: &Bird) -> Result<bool> {
        let Some(idx) = self.birds.iter().position(|b| b.id == bird.id) else {
            return Ok(false);
        };

        let mut candidate = self.birds.clone();
        let existing = &mut candidate[idx];
        existing.name = bird.name.clone();
        existing.species = bird.species;
        existing.info = bird.info.clone();
        existing.updated_at = Some(Utc::now());

        self.commit(candidate)?;
        Ok(true)
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        let Some(idx) = self.birds.iter().position(|b| b.id == id) else {
            return Ok(false);
        };

        let mut candidate = self.birds.clone();
        candidate.remove(idx);
        self.commit(candidate)?;
        Ok(true)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Bird>> {
        Ok(self.birds.iter().find(|b| b.id == id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Bird>> {
        Ok(self.birds.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;

    use super::*;
    use crate::models::Species;
    use crate::storage::JsonStorage;

    /// In-memory storage whose saves can be made to fail.
    #[derive(Clone, Default)]
    struct FlakyStorage {
        saved: Rc<RefCell<Vec<BirdRecord>>>,
        fail: Rc<RefCell<bool>>,
    }

    impl DataStorage<BirdRecord> for FlakyStorage {
        fn load(&self) -> Vec<BirdRecord> {
            self.saved.borrow().clone()
        }

        fn save(&self, data: &[BirdRecord]) -> Result<()> {
            if *self.fail.borrow() {
                return Err(anyhow!("disk full"));
            }
            *self.saved.borrow_mut() = data.to_vec();
            Ok(())
        }
    }

    #[test]
    fn ids_are_assigned_after_the_largest() {
        let mut repo = JsonBirdRepository::new(FlakyStorage::default());
        let first = repo.add(Bird::new("A", Species::Owl, "a")).unwrap();
        let explicit = repo
            .add(Bird { id: 10, ..Bird::new("B", Species::Crow, "b") })
            .unwrap();
        let next = repo.add(Bird::new("C", Species::Eagle, "c")).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(explicit.id, 10);
        assert_eq!(next.id, 11);
        assert!(repo.add(Bird { id: 10, ..Bird::new("D", Species::Owl, "d") }).is_err());
    }

    #[test]
    fn exhausted_ids_are_refused() {
        let storage = FlakyStorage::default();
        storage.saved.borrow_mut().push(BirdRecord {
            id: i64::MAX,
            name: "Last".to_string(),
            species: Species::Owl,
            info: "end of the line".to_string(),
            created_at: None,
            updated_at: None,
        });
        let mut repo = JsonBirdRepository::new(storage);

        let err = repo.add(Bird::new("Next", Species::Crow, "c")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::Constraint(_))
        ));
        assert_eq!(repo.get_all().unwrap().len(), 1);
    }

    #[test]
    fn updates_keep_their_stamp_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birds.json");
        let stamped = {
            let mut repo = JsonBirdRepository::new(JsonStorage::new(&path));
            let mut bird = repo.add(Bird::new("Hoot", Species::Owl, "night")).unwrap();
            assert_eq!(bird.updated_at, None);
            bird.info = "dusk".to_string();
            assert!(repo.update(&bird).unwrap());
            repo.get_by_id(bird.id).unwrap().unwrap().updated_at
        };
        assert!(stamped.is_some());

        let reopened = JsonBirdRepository::new(JsonStorage::<BirdRecord>::new(&path));
        let bird = reopened.get_all().unwrap().remove(0);
        assert_eq!(bird.info, "dusk");
        assert_eq!(bird.updated_at, stamped);
    }

    #[test]
    fn failed_save_leaves_memory_unchanged() {
        let storage = FlakyStorage::default();
        let mut repo = JsonBirdRepository::new(storage.clone());
        let kept = repo.add(Bird::new("Kept", Species::Owl, "stays")).unwrap();

        *storage.fail.borrow_mut() = true;
        assert!(repo.add(Bird::new("Lost", Species::Crow, "gone")).is_err());
        assert!(repo.delete(kept.id).is_err());

        let all = repo.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Kept");
    }

    #[test]
    fn update_and_delete_report_missing_ids() {
        let mut repo = JsonBirdRepository::new(FlakyStorage::default());
        let mut bird = repo.add(Bird::new("A", Species::Owl, "a")).unwrap();
        bird.name = "Renamed".to_string();
        bird.species = Species::Parrot;

        assert!(repo.update(&bird).unwrap());
        let stored = repo.get_by_id(bird.id).unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.species, Species::Parrot);

        assert!(!repo.update(&Bird { id: 77, ..bird.clone() }).unwrap());
        assert!(!repo.delete(77).unwrap());
        assert!(repo.relational().is_none());
    }

    #[test]
    fn mutations_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birds.json");
        {
            let mut repo = JsonBirdRepository::new(JsonStorage::new(&path));
            repo.add(Bird::new("Hoot", Species::Owl, "night")).unwrap();
            repo.add(Bird::new("Corvo", Species::Crow, "day")).unwrap();
        }

        let reopened = JsonBirdRepository::new(JsonStorage::<BirdRecord>::new(&path));
        let names: Vec<String> = reopened.get_all().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Hoot".to_string(), "Corvo".to_string()]);
    }
}
