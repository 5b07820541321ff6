use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::import::coordinator::{EntityCounts, ReconcileOutcome};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedCounts {
    pub name: bool,
    pub summary: bool,
    pub experiences_imported: usize,
    pub projects_imported: usize,
    pub skills_imported: usize,
    pub educations_imported: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: ImportedCounts,
    pub skipped: EntityCounts,
}

impl From<ReconcileOutcome> for ImportResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        ImportResponse {
            success: true,
            imported: ImportedCounts {
                name: outcome.name_updated,
                summary: outcome.bio_updated,
                experiences_imported: outcome.created.experiences,
                projects_imported: outcome.created.projects,
                skills_imported: outcome.created.skills,
                educations_imported: outcome.created.educations,
            },
            skipped: outcome.skipped,
        }
    }
}

/// Wraps the coordinator result for the caller. Store failures are logged
/// here with full detail and surface only as a generic internal error; an
/// unknown owner surfaces as not found.
pub fn report(
    owner: Uuid,
    result: Result<ReconcileOutcome, StoreError>,
) -> Result<ImportResponse, AppError> {
    match result {
        Ok(outcome) => Ok(outcome.into()),
        Err(err) => {
            error!(%owner, error = %err, "profile import failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let outcome = ReconcileOutcome {
            name_updated: true,
            bio_updated: false,
            created: EntityCounts {
                experiences: 1,
                educations: 0,
                skills: 1,
                projects: 0,
            },
            skipped: EntityCounts {
                skills: 1,
                ..Default::default()
            },
        };

        let body = serde_json::to_value(report(Uuid::new_v4(), Ok(outcome)).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "success": true,
                "imported": {
                    "name": true,
                    "summary": false,
                    "experiencesImported": 1,
                    "projectsImported": 0,
                    "skillsImported": 1,
                    "educationsImported": 0
                },
                "skipped": { "experiences": 0, "educations": 0, "skills": 1, "projects": 0 }
            })
        );
    }

    #[test]
    fn test_failure_carries_no_counts() {
        let err = report(
            Uuid::new_v4(),
            Err(StoreError::Conflict("skills_user_name_key".into())),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Conflict(_))));
    }

    #[test]
    fn test_unknown_owner_is_not_found() {
        let owner = Uuid::new_v4();
        let err = report(owner, Err(StoreError::OwnerNotFound(owner))).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
