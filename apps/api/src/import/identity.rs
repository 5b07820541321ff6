// Identity keys and the resolver. Matching is exact: no case folding,
// trimming or fuzzy scoring.

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::import::candidates::{
    EducationCandidate, ExperienceCandidate, ProjectCandidate, SkillCandidate,
};
use crate::import::merge::compose_description;
use crate::store::{ProfileTx, StoreError};

pub const UNKNOWN_INSTITUTION: &str = "Unknown Institution";
pub const DEFAULT_DEGREE: &str = "Degree";
pub const DEFAULT_FIELD: &str = "Field";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExperienceKey {
    Dated {
        company: String,
        title: String,
        start_date: NaiveDate,
    },
    /// Without a start date the stored description is the next-best
    /// discriminator.
    Undated {
        company: String,
        title: String,
        description: String,
    },
}

impl ExperienceKey {
    pub fn for_candidate(candidate: &ExperienceCandidate) -> Self {
        match candidate.start_date {
            Some(start_date) => ExperienceKey::Dated {
                company: candidate.company.clone(),
                title: candidate.title.clone(),
                start_date,
            },
            None => ExperienceKey::Undated {
                company: candidate.company.clone(),
                title: candidate.title.clone(),
                description: compose_description(
                    candidate.description.as_deref(),
                    &candidate.highlights,
                ),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EducationKey {
    pub institution: String,
    pub degree: String,
    pub field: String,
}

impl EducationKey {
    /// Placeholders are substituted first, so two candidates that both omit
    /// an institution compare equal on it.
    pub fn for_candidate(candidate: &EducationCandidate) -> Self {
        EducationKey {
            institution: candidate
                .institution
                .clone()
                .unwrap_or_else(|| UNKNOWN_INSTITUTION.to_string()),
            degree: candidate
                .degree
                .clone()
                .unwrap_or_else(|| DEFAULT_DEGREE.to_string()),
            field: candidate
                .field
                .clone()
                .unwrap_or_else(|| DEFAULT_FIELD.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkillKey(pub String);

impl SkillKey {
    pub fn for_candidate(candidate: &SkillCandidate) -> Self {
        SkillKey(candidate.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey(pub String);

impl ProjectKey {
    pub fn for_candidate(candidate: &ProjectCandidate) -> Self {
        ProjectKey(candidate.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Match(Uuid),
    NoMatch,
}

impl From<Option<Uuid>> for Resolution {
    fn from(found: Option<Uuid>) -> Self {
        found.map_or(Resolution::NoMatch, Resolution::Match)
    }
}

pub async fn resolve_experience(
    tx: &mut dyn ProfileTx,
    key: &ExperienceKey,
) -> Result<Resolution, StoreError> {
    let resolution = Resolution::from(tx.find_experience(key).await?);
    debug!(?key, ?resolution, "resolved experience");
    Ok(resolution)
}

pub async fn resolve_education(
    tx: &mut dyn ProfileTx,
    key: &EducationKey,
) -> Result<Resolution, StoreError> {
    let resolution = Resolution::from(tx.find_education(key).await?);
    debug!(?key, ?resolution, "resolved education");
    Ok(resolution)
}

pub async fn resolve_skill(
    tx: &mut dyn ProfileTx,
    key: &SkillKey,
) -> Result<Resolution, StoreError> {
    let resolution = Resolution::from(tx.find_skill(key).await?);
    debug!(?key, ?resolution, "resolved skill");
    Ok(resolution)
}

pub async fn resolve_project(
    tx: &mut dyn ProfileTx,
    key: &ProjectKey,
) -> Result<Resolution, StoreError> {
    let resolution = Resolution::from(tx.find_project(key).await?);
    debug!(?key, ?resolution, "resolved project");
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::NewSkill;
    use crate::store::{MemoryStore, ProfileStore};

    fn experience(start: Option<NaiveDate>) -> ExperienceCandidate {
        ExperienceCandidate {
            company: "Acme".into(),
            title: "Engineer".into(),
            description: Some("Led the team".into()),
            start_date: start,
            end_date: None,
            current: None,
            location: None,
            highlights: vec!["Shipped X".into()],
        }
    }

    #[test]
    fn test_dated_experience_ignores_description() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1);
        let mut other = experience(start);
        other.description = Some("Something else".into());
        assert_eq!(
            ExperienceKey::for_candidate(&experience(start)),
            ExperienceKey::for_candidate(&other)
        );
    }

    #[test]
    fn test_undated_experience_keys_on_stored_description() {
        let key = ExperienceKey::for_candidate(&experience(None));
        assert_eq!(
            key,
            ExperienceKey::Undated {
                company: "Acme".into(),
                title: "Engineer".into(),
                description: "Led the team\n\nKey Achievements:\n• Shipped X".into(),
            }
        );
    }

    #[test]
    fn test_education_key_substitutes_placeholders() {
        let key = EducationKey::for_candidate(&EducationCandidate {
            institution: None,
            degree: Some("BSc".into()),
            field: None,
            start_date: None,
            end_date: None,
            gpa: None,
        });
        assert_eq!(key.institution, "Unknown Institution");
        assert_eq!(key.degree, "BSc");
        assert_eq!(key.field, "Field");
    }

    #[tokio::test]
    async fn test_skill_resolution_is_exact() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut tx = store.begin(owner).await.unwrap();
        let id = tx
            .insert_skill(&NewSkill {
                name: "Python".into(),
                category: "Other".into(),
            })
            .await
            .unwrap();

        let exact = resolve_skill(tx.as_mut(), &SkillKey("Python".into()))
            .await
            .unwrap();
        let folded = resolve_skill(tx.as_mut(), &SkillKey("python".into()))
            .await
            .unwrap();
        assert_eq!(exact, Resolution::Match(id));
        assert_eq!(folded, Resolution::NoMatch);
        tx.rollback().await.unwrap();
    }
}
