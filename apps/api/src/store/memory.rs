// In-process profile store. A transaction works on a private copy of the
// owner's data and publishes it by swap on commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::import::identity::{EducationKey, ExperienceKey, ProjectKey, SkillKey};
use crate::models::profile::{
    EducationRow, ExperienceRow, NewEducation, NewExperience, NewProject, NewSkill,
    ProfileSnapshot, ProjectRow, SkillRow, UserUpdate,
};
use crate::store::{EntityKind, ProfileStore, ProfileTx, StoreError};

type Owners = Arc<Mutex<HashMap<Uuid, ProfileSnapshot>>>;
type Locks = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    owners: Owners,
    locks: Locks,
    failures: Arc<Mutex<HashMap<EntityKind, usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `nth` (1-based) insert of `kind` fail in every transaction
    /// opened afterwards.
    #[cfg(test)]
    pub fn inject_failure(&self, kind: EntityKind, nth: usize) -> Result<(), StoreError> {
        let mut guard = self.failures.lock().map_err(|_| StoreError::Poisoned)?;
        guard.insert(kind, nth);
        Ok(())
    }

    #[cfg(test)]
    pub fn clear_failures(&self) -> Result<(), StoreError> {
        let mut guard = self.failures.lock().map_err(|_| StoreError::Poisoned)?;
        guard.clear();
        Ok(())
    }

    fn owner_lock(&self, owner: Uuid) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut guard = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.entry(owner).or_default().clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn begin(&self, owner: Uuid) -> Result<Box<dyn ProfileTx>, StoreError> {
        let guard = self.owner_lock(owner)?.lock_owned().await;
        let lease = OwnerLease {
            owner,
            locks: Arc::clone(&self.locks),
            _guard: guard,
        };

        let staged = {
            let guard = self.owners.lock().map_err(|_| StoreError::Poisoned)?;
            guard.get(&owner).cloned().unwrap_or_default()
        };
        let failures = self
            .failures
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .clone();

        debug!(%owner, "memory transaction opened");
        Ok(Box::new(MemoryTx {
            owner,
            staged,
            owners: Arc::clone(&self.owners),
            failures,
            inserts: HashMap::new(),
            _lease: lease,
        }))
    }

    async fn load_profile(&self, owner: Uuid) -> Result<ProfileSnapshot, StoreError> {
        let guard = self.owners.lock().map_err(|_| StoreError::Poisoned)?;
        guard
            .get(&owner)
            .cloned()
            .ok_or(StoreError::OwnerNotFound(owner))
    }
}

/// Holds an owner's lock for the life of a transaction. Drops the map entry
/// once nobody else holds or waits on it.
struct OwnerLease {
    owner: Uuid,
    locks: Locks,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for OwnerLease {
    fn drop(&mut self) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // One reference in the map, one in the guard still held here.
        if locks
            .get(&self.owner)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.owner);
        }
    }
}

pub struct MemoryTx {
    owner: Uuid,
    staged: ProfileSnapshot,
    owners: Owners,
    failures: HashMap<EntityKind, usize>,
    inserts: HashMap<EntityKind, usize>,
    _lease: OwnerLease,
}

impl MemoryTx {
    fn count_insert(&mut self, kind: EntityKind) -> Result<(), StoreError> {
        let count = {
            let count = self.inserts.entry(kind).or_insert(0);
            *count += 1;
            *count
        };
        if self.failures.get(&kind) == Some(&count) {
            return Err(StoreError::Injected(format!("{kind} insert #{count}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileTx for MemoryTx {
    fn owner(&self) -> Uuid {
        self.owner
    }

    async fn update_user(&mut self, update: &UserUpdate) -> Result<(), StoreError> {
        if let Some(name) = &update.name {
            self.staged.name = Some(name.clone());
        }
        if let Some(bio) = &update.bio {
            self.staged.bio = Some(bio.clone());
        }
        Ok(())
    }

    async fn find_experience(&mut self, key: &ExperienceKey) -> Result<Option<Uuid>, StoreError> {
        let found = self.staged.experiences.iter().find(|row| match key {
            ExperienceKey::Dated {
                company,
                title,
                start_date,
            } => row.company == *company && row.title == *title && row.start_date == *start_date,
            ExperienceKey::Undated {
                company,
                title,
                description,
            } => {
                row.company == *company && row.title == *title && row.description == *description
            }
        });
        Ok(found.map(|row| row.id))
    }

    async fn insert_experience(&mut self, row: &NewExperience) -> Result<Uuid, StoreError> {
        self.count_insert(EntityKind::Experience)?;
        let id = Uuid::new_v4();
        self.staged.experiences.push(ExperienceRow {
            id,
            user_id: self.owner,
            company: row.company.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
            current: row.current,
            location: row.location.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_education(&mut self, key: &EducationKey) -> Result<Option<Uuid>, StoreError> {
        let found = self.staged.educations.iter().find(|row| {
            row.institution == key.institution && row.degree == key.degree && row.field == key.field
        });
        Ok(found.map(|row| row.id))
    }

    async fn insert_education(&mut self, row: &NewEducation) -> Result<Uuid, StoreError> {
        self.count_insert(EntityKind::Education)?;
        let id = Uuid::new_v4();
        self.staged.educations.push(EducationRow {
            id,
            user_id: self.owner,
            institution: row.institution.clone(),
            degree: row.degree.clone(),
            field: row.field.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
            gpa: row.gpa,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_skill(&mut self, key: &SkillKey) -> Result<Option<Uuid>, StoreError> {
        let found = self.staged.skills.iter().find(|row| row.name == key.0);
        Ok(found.map(|row| row.id))
    }

    async fn insert_skill(&mut self, row: &NewSkill) -> Result<Uuid, StoreError> {
        self.count_insert(EntityKind::Skill)?;
        if self.staged.skills.iter().any(|s| s.name == row.name) {
            return Err(StoreError::Conflict(format!(
                "skill '{}' already exists for owner {}",
                row.name, self.owner
            )));
        }
        let id = Uuid::new_v4();
        self.staged.skills.push(SkillRow {
            id,
            user_id: self.owner,
            name: row.name.clone(),
            category: row.category.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_project(&mut self, key: &ProjectKey) -> Result<Option<Uuid>, StoreError> {
        let found = self.staged.projects.iter().find(|row| row.name == key.0);
        Ok(found.map(|row| row.id))
    }

    async fn insert_project(&mut self, row: &NewProject) -> Result<Uuid, StoreError> {
        self.count_insert(EntityKind::Project)?;
        let id = Uuid::new_v4();
        self.staged.projects.push(ProjectRow {
            id,
            user_id: self.owner,
            name: row.name.clone(),
            description: row.description.clone(),
            technologies: row.technologies.clone(),
            url: row.url.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            owner,
            staged,
            owners,
            ..
        } = *self;
        let mut guard = owners.lock().map_err(|_| StoreError::Poisoned)?;
        guard.insert(owner, staged);
        debug!(%owner, "memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(owner = %self.owner, "memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn skill(name: &str) -> NewSkill {
        NewSkill {
            name: name.into(),
            category: "Other".into(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let mut tx = store.begin(owner).await.unwrap();
        tx.insert_skill(&skill("Go")).await.unwrap();
        assert!(matches!(
            store.load_profile(owner).await,
            Err(StoreError::OwnerNotFound(_))
        ));
        tx.commit().await.unwrap();

        let profile = store.load_profile(owner).await.unwrap();
        assert_eq!(profile.skills.len(), 1);
        assert_eq!(profile.skills[0].user_id, owner);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let mut tx = store.begin(owner).await.unwrap();
        tx.insert_skill(&skill("Go")).await.unwrap();
        tx.update_user(&UserUpdate {
            name: Some("Ada".into()),
            bio: None,
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        assert!(matches!(
            store.load_profile(owner).await,
            Err(StoreError::OwnerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_skill_violates_uniqueness() {
        let store = MemoryStore::new();
        let mut tx = store.begin(Uuid::new_v4()).await.unwrap();
        tx.insert_skill(&skill("Go")).await.unwrap();
        let err = tx.insert_skill(&skill("Go")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_nth_insert() {
        let store = MemoryStore::new();
        store.inject_failure(EntityKind::Skill, 2).unwrap();

        let mut tx = store.begin(Uuid::new_v4()).await.unwrap();
        tx.insert_skill(&skill("Go")).await.unwrap();
        let err = tx.insert_skill(&skill("Rust")).await.unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));
    }

    #[tokio::test]
    async fn test_same_owner_transactions_serialize() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let first = store.begin(owner).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), store.begin(owner)).await;
        assert!(blocked.is_err(), "second begin should wait for the first");

        first.rollback().await.unwrap();
        let second = tokio::time::timeout(Duration::from_millis(50), store.begin(owner)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_owner_locks_are_released() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        store.begin(owner).await.unwrap().commit().await.unwrap();
        store.begin(Uuid::new_v4()).await.unwrap().rollback().await.unwrap();
        assert!(store.locks.lock().unwrap().is_empty());

        let _held = store.begin(owner).await.unwrap();
        assert_eq!(store.locks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_queued_owner_keeps_its_lock() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let first = store.begin(owner).await.unwrap();
        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.begin(owner).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.rollback().await.unwrap();

        waiter.await.unwrap().unwrap();
        assert!(store.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_different_owners_do_not_block() {
        let store = MemoryStore::new();
        let _first = store.begin(Uuid::new_v4()).await.unwrap();
        let other = tokio::time::timeout(Duration::from_millis(50), store.begin(Uuid::new_v4())).await;
        assert!(other.is_ok());
    }
}
