// A matched candidate is always skipped and never overwrites a persisted
// record. An unmatched candidate becomes an insert payload.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::import::candidates::{
    BioUpdate, EducationCandidate, ExperienceCandidate, ProjectCandidate, SkillCandidate,
};
use crate::import::identity::{
    Resolution, DEFAULT_DEGREE, DEFAULT_FIELD, UNKNOWN_INSTITUTION,
};
use crate::models::profile::{NewEducation, NewExperience, NewProject, NewSkill, UserUpdate};

pub const DEFAULT_SKILL_CATEGORY: &str = "Other";
const HIGHLIGHTS_HEADING: &str = "Key Achievements:";

#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction<T> {
    Skip { existing: Uuid },
    Create(T),
}

/// Maps a resolver verdict to a write action. `build` only runs on a miss.
pub fn decide<T>(resolution: Resolution, build: impl FnOnce() -> T) -> WriteAction<T> {
    match resolution {
        Resolution::Match(existing) => WriteAction::Skip { existing },
        Resolution::NoMatch => WriteAction::Create(build()),
    }
}

/// Base description followed by a bulleted highlights block, separated by a
/// blank line.
pub fn compose_description(base: Option<&str>, highlights: &[String]) -> String {
    let base = base.unwrap_or_default();
    if highlights.is_empty() {
        return base.to_string();
    }

    let bullets = highlights
        .iter()
        .map(|h| format!("• {h}"))
        .collect::<Vec<_>>()
        .join("\n");
    let block = format!("{HIGHLIGHTS_HEADING}\n{bullets}");

    if base.is_empty() {
        block
    } else {
        format!("{base}\n\n{block}")
    }
}

/// Stand-in for an unknown start date: 1970-01-01, so it never reads as recent.
pub fn unknown_start_date() -> NaiveDate {
    NaiveDate::default()
}

pub fn new_experience(candidate: ExperienceCandidate) -> NewExperience {
    let description =
        compose_description(candidate.description.as_deref(), &candidate.highlights);
    NewExperience {
        company: candidate.company,
        title: candidate.title,
        description,
        start_date: candidate.start_date.unwrap_or_else(unknown_start_date),
        end_date: candidate.end_date,
        current: candidate.current.unwrap_or(false),
        location: candidate.location,
    }
}

pub fn new_education(candidate: EducationCandidate) -> NewEducation {
    NewEducation {
        institution: candidate
            .institution
            .unwrap_or_else(|| UNKNOWN_INSTITUTION.to_string()),
        degree: candidate
            .degree
            .unwrap_or_else(|| DEFAULT_DEGREE.to_string()),
        field: candidate.field.unwrap_or_else(|| DEFAULT_FIELD.to_string()),
        start_date: candidate.start_date,
        end_date: candidate.end_date,
        gpa: candidate.gpa,
    }
}

pub fn new_skill(candidate: SkillCandidate) -> NewSkill {
    NewSkill {
        name: candidate.name,
        category: DEFAULT_SKILL_CATEGORY.to_string(),
    }
}

pub fn new_project(candidate: ProjectCandidate) -> NewProject {
    NewProject {
        name: candidate.name,
        description: candidate.description.unwrap_or_default(),
        technologies: candidate.technologies,
        url: candidate.url,
        start_date: candidate.start_date,
        end_date: candidate.end_date,
    }
}

pub fn user_update(bio: BioUpdate) -> UserUpdate {
    UserUpdate {
        name: bio.name,
        bio: bio.bio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience() -> ExperienceCandidate {
        ExperienceCandidate {
            company: "Acme".into(),
            title: "Engineer".into(),
            description: Some("Led the team".into()),
            start_date: None,
            end_date: None,
            current: None,
            location: None,
            highlights: vec!["Shipped X".into(), "Cut costs 30%".into()],
        }
    }

    #[test]
    fn test_highlights_are_appended_as_bullets() {
        let row = new_experience(experience());
        assert_eq!(
            row.description,
            "Led the team\n\nKey Achievements:\n• Shipped X\n• Cut costs 30%"
        );
    }

    #[test]
    fn test_description_without_highlights_is_untouched() {
        assert_eq!(compose_description(Some("Built things"), &[]), "Built things");
        assert_eq!(compose_description(None, &[]), "");
    }

    #[test]
    fn test_highlights_without_base_have_no_leading_gap() {
        assert_eq!(
            compose_description(None, &["Shipped X".into()]),
            "Key Achievements:\n• Shipped X"
        );
    }

    #[test]
    fn test_missing_dates_and_flags_get_defaults() {
        let row = new_experience(experience());
        assert_eq!(row.start_date, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(row.end_date, None);
        assert!(!row.current);
    }

    #[test]
    fn test_education_placeholders() {
        let row = new_education(EducationCandidate {
            institution: None,
            degree: None,
            field: Some("CS".into()),
            start_date: None,
            end_date: None,
            gpa: None,
        });
        assert_eq!(row.institution, "Unknown Institution");
        assert_eq!(row.degree, "Degree");
        assert_eq!(row.field, "CS");
    }

    #[test]
    fn test_match_skips_without_building() {
        let existing = Uuid::new_v4();
        let action: WriteAction<NewSkill> = decide(Resolution::Match(existing), || {
            panic!("builder must not run on a match")
        });
        assert_eq!(action, WriteAction::Skip { existing });
    }

    #[test]
    fn test_no_match_creates() {
        let action = decide(Resolution::NoMatch, || {
            new_skill(SkillCandidate { name: "Go".into() })
        });
        assert_eq!(
            action,
            WriteAction::Create(NewSkill {
                name: "Go".into(),
                category: "Other".into(),
            })
        );
    }
}
