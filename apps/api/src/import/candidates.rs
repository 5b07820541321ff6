use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceCandidate {
    pub company: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub current: Option<bool>,
    pub location: Option<String>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EducationCandidate {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub gpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillCandidate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCandidate {
    pub name: String,
    pub description: Option<String>,
    pub technologies: Vec<String>,
    pub url: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Name and bio for the owning user, already alias-resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BioUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
}

/// One unpersisted unit of incoming profile data.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRecord {
    BioUpdate(BioUpdate),
    Experience(ExperienceCandidate),
    Education(EducationCandidate),
    Skill(SkillCandidate),
    Project(ProjectCandidate),
}

impl CandidateRecord {
    pub fn entry_type_str(&self) -> &'static str {
        match self {
            CandidateRecord::BioUpdate(_) => "bio_update",
            CandidateRecord::Experience(_) => "experience",
            CandidateRecord::Education(_) => "education",
            CandidateRecord::Skill(_) => "skill",
            CandidateRecord::Project(_) => "project",
        }
    }
}

/// Sections that are shape-checked on the way in but have no persisted entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IgnoredSections {
    pub publications: usize,
    pub certifications: usize,
}

/// Output of the normalizer, grouped by entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub bio: Option<BioUpdate>,
    pub experiences: Vec<ExperienceCandidate>,
    pub education: Vec<EducationCandidate>,
    pub skills: Vec<SkillCandidate>,
    pub projects: Vec<ProjectCandidate>,
    pub ignored: IgnoredSections,
}

impl NormalizedBatch {
    /// True when nothing in the batch could lead to a write.
    pub fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.experiences.is_empty()
            && self.education.is_empty()
            && self.skills.is_empty()
            && self.projects.is_empty()
    }

    /// Flattens the batch in write order: user fields, experiences,
    /// education, skills, projects.
    pub fn into_records(self) -> Vec<CandidateRecord> {
        let mut records = Vec::with_capacity(
            1 + self.experiences.len()
                + self.education.len()
                + self.skills.len()
                + self.projects.len(),
        );
        if let Some(bio) = self.bio {
            records.push(CandidateRecord::BioUpdate(bio));
        }
        records.extend(self.experiences.into_iter().map(CandidateRecord::Experience));
        records.extend(self.education.into_iter().map(CandidateRecord::Education));
        records.extend(self.skills.into_iter().map(CandidateRecord::Skill));
        records.extend(self.projects.into_iter().map(CandidateRecord::Project));
        records
    }
}
