// Opens one owner-scoped transaction, walks the batch in write order and
// closes it exactly once: commit when every step succeeded, rollback on the
// first error.

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::import::candidates::{CandidateRecord, NormalizedBatch};
use crate::import::identity::{
    resolve_education, resolve_experience, resolve_project, resolve_skill, EducationKey,
    ExperienceKey, ProjectKey, SkillKey,
};
use crate::import::merge::{self, decide, WriteAction};
use crate::store::{ProfileStore, ProfileTx, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub experiences: usize,
    pub educations: usize,
    pub skills: usize,
    pub projects: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub name_updated: bool,
    pub bio_updated: bool,
    pub created: EntityCounts,
    pub skipped: EntityCounts,
}

/// Runs the whole batch as one atomic unit for `owner`.
pub async fn reconcile(
    store: &dyn ProfileStore,
    owner: Uuid,
    batch: NormalizedBatch,
) -> Result<ReconcileOutcome, StoreError> {
    let mut tx = store.begin(owner).await?;

    match apply_batch(tx.as_mut(), batch).await {
        Ok(outcome) => {
            tx.commit().await?;
            info!(
                %owner,
                created = ?outcome.created,
                skipped = ?outcome.skipped,
                name_updated = outcome.name_updated,
                bio_updated = outcome.bio_updated,
                "profile import committed"
            );
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(%owner, error = %rollback_err, "profile import rollback failed");
            }
            Err(err)
        }
    }
}

async fn apply_batch(
    tx: &mut dyn ProfileTx,
    batch: NormalizedBatch,
) -> Result<ReconcileOutcome, StoreError> {
    let mut outcome = ReconcileOutcome::default();

    for record in batch.into_records() {
        let entry_type = record.entry_type_str();
        match record {
            CandidateRecord::BioUpdate(bio) => {
                let update = merge::user_update(bio);
                if !update.is_empty() {
                    tx.update_user(&update).await?;
                }
                outcome.name_updated = update.name.is_some();
                outcome.bio_updated = update.bio.is_some();
            }
            CandidateRecord::Experience(candidate) => {
                let key = ExperienceKey::for_candidate(&candidate);
                let resolution = resolve_experience(tx, &key).await?;
                match decide(resolution, || merge::new_experience(candidate)) {
                    WriteAction::Skip { existing } => {
                        debug!(owner = %tx.owner(), entry_type, %existing, "skipping duplicate");
                        outcome.skipped.experiences += 1;
                    }
                    WriteAction::Create(row) => {
                        tx.insert_experience(&row).await?;
                        outcome.created.experiences += 1;
                    }
                }
            }
            CandidateRecord::Education(candidate) => {
                let key = EducationKey::for_candidate(&candidate);
                let resolution = resolve_education(tx, &key).await?;
                match decide(resolution, || merge::new_education(candidate)) {
                    WriteAction::Skip { existing } => {
                        debug!(owner = %tx.owner(), entry_type, %existing, "skipping duplicate");
                        outcome.skipped.educations += 1;
                    }
                    WriteAction::Create(row) => {
                        tx.insert_education(&row).await?;
                        outcome.created.educations += 1;
                    }
                }
            }
            CandidateRecord::Skill(candidate) => {
                let key = SkillKey::for_candidate(&candidate);
                let resolution = resolve_skill(tx, &key).await?;
                match decide(resolution, || merge::new_skill(candidate)) {
                    WriteAction::Skip { existing } => {
                        debug!(owner = %tx.owner(), entry_type, %existing, "skipping duplicate");
                        outcome.skipped.skills += 1;
                    }
                    WriteAction::Create(row) => {
                        tx.insert_skill(&row).await?;
                        outcome.created.skills += 1;
                    }
                }
            }
            CandidateRecord::Project(candidate) => {
                let key = ProjectKey::for_candidate(&candidate);
                let resolution = resolve_project(tx, &key).await?;
                match decide(resolution, || merge::new_project(candidate)) {
                    WriteAction::Skip { existing } => {
                        debug!(owner = %tx.owner(), entry_type, %existing, "skipping duplicate");
                        outcome.skipped.projects += 1;
                    }
                    WriteAction::Create(row) => {
                        tx.insert_project(&row).await?;
                        outcome.created.projects += 1;
                    }
                }
            }
        }
    }

    Ok(outcome)
}
