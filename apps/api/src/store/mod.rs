// A ProfileStore hands out ProfileTx handles, each bound to one owner and
// closed exactly once by commit or rollback. Opening one takes a per-owner
// exclusive lock.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::import::identity::{EducationKey, ExperienceKey, ProjectKey, SkillKey};
use crate::models::profile::{
    NewEducation, NewExperience, NewProject, NewSkill, ProfileSnapshot, UserUpdate,
};

pub use memory::MemoryStore;
pub use postgres::PgProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Experience,
    Education,
    Skill,
    Project,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Experience => "experience",
            EntityKind::Education => "education",
            EntityKind::Skill => "skill",
            EntityKind::Project => "project",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("owner {0} does not exist")]
    OwnerNotFound(Uuid),

    #[error("store state poisoned")]
    Poisoned,

    #[error("injected failure: {0}")]
    Injected(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Opens a transaction scoped to `owner`.
    async fn begin(&self, owner: Uuid) -> Result<Box<dyn ProfileTx>, StoreError>;

    async fn load_profile(&self, owner: Uuid) -> Result<ProfileSnapshot, StoreError>;
}

/// One open, owner-scoped transaction. Lookups observe writes staged
/// earlier in the same transaction.
#[async_trait]
pub trait ProfileTx: Send {
    fn owner(&self) -> Uuid;

    async fn update_user(&mut self, update: &UserUpdate) -> Result<(), StoreError>;

    async fn find_experience(&mut self, key: &ExperienceKey) -> Result<Option<Uuid>, StoreError>;
    async fn insert_experience(&mut self, row: &NewExperience) -> Result<Uuid, StoreError>;

    async fn find_education(&mut self, key: &EducationKey) -> Result<Option<Uuid>, StoreError>;
    async fn insert_education(&mut self, row: &NewEducation) -> Result<Uuid, StoreError>;

    async fn find_skill(&mut self, key: &SkillKey) -> Result<Option<Uuid>, StoreError>;
    async fn insert_skill(&mut self, row: &NewSkill) -> Result<Uuid, StoreError>;

    async fn find_project(&mut self, key: &ProjectKey) -> Result<Option<Uuid>, StoreError>;
    async fn insert_project(&mut self, row: &NewProject) -> Result<Uuid, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
