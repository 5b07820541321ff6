// Decodes an untyped inbound payload into a NormalizedBatch. Every offending
// field is collected before failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::import::candidates::{
    BioUpdate, EducationCandidate, ExperienceCandidate, IgnoredSections, NormalizedBatch,
    ProjectCandidate, SkillCandidate,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("payload failed validation: {}", summarize(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{} {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Canonical {
    Bio,
    Education,
    Institution,
}

struct AliasRule {
    alias: &'static str,
    canonical: Canonical,
    precedence: u8,
}

/// Source field names that upstream producers disagree on.
///
/// Scalar canonicals take the first present alias by ascending precedence.
/// List canonicals concatenate every present alias in that same order.
const ALIASES: &[AliasRule] = &[
    AliasRule {
        alias: "about",
        canonical: Canonical::Bio,
        precedence: 0,
    },
    AliasRule {
        alias: "summary",
        canonical: Canonical::Bio,
        precedence: 1,
    },
    AliasRule {
        alias: "education",
        canonical: Canonical::Education,
        precedence: 0,
    },
    AliasRule {
        alias: "educations",
        canonical: Canonical::Education,
        precedence: 1,
    },
    AliasRule {
        alias: "institution",
        canonical: Canonical::Institution,
        precedence: 0,
    },
    AliasRule {
        alias: "school",
        canonical: Canonical::Institution,
        precedence: 1,
    },
];

fn aliases_for(canonical: Canonical) -> Vec<&'static str> {
    let mut rules: Vec<_> = ALIASES
        .iter()
        .filter(|r| r.canonical == canonical)
        .collect();
    rules.sort_by_key(|r| r.precedence);
    rules.into_iter().map(|r| r.alias).collect()
}

/// Validates and coerces an inbound payload.
pub fn normalize(payload: &Value) -> Result<NormalizedBatch, ValidationError> {
    let empty = Map::new();
    let root = match payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ValidationError {
                fields: vec![FieldError {
                    field: "$".to_string(),
                    message: "expected an object".to_string(),
                }],
            })
        }
    };

    let mut c = Collector::default();

    let name = c.opt_text(root, "name", "");
    let bio = aliases_for(Canonical::Bio)
        .into_iter()
        .map(|alias| c.opt_text(root, alias, ""))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .next();

    let experiences = c
        .object_items(root, "experiences", "")
        .into_iter()
        .filter_map(|(path, obj)| c.experience(obj, &path))
        .collect();

    let mut education = Vec::new();
    for alias in aliases_for(Canonical::Education) {
        for (path, obj) in c.object_items(root, alias, "") {
            if let Some(entry) = c.education(obj, &path) {
                education.push(entry);
            }
        }
    }

    let skills = c.skills(root);

    let projects = c
        .object_items(root, "projects", "")
        .into_iter()
        .filter_map(|(path, obj)| c.project(obj, &path))
        .collect();

    let ignored = IgnoredSections {
        publications: c.object_items(root, "publications", "").len(),
        certifications: c.object_items(root, "certifications", "").len(),
    };

    if !c.errors.is_empty() {
        return Err(ValidationError { fields: c.errors });
    }

    let bio = (name.is_some() || bio.is_some()).then_some(BioUpdate { name, bio });

    Ok(NormalizedBatch {
        bio,
        experiences,
        education,
        skills,
        projects,
        ignored,
    })
}

/// Parses the date shapes upstream producers emit: `YYYY-MM-DD`, RFC 3339,
/// naive ISO timestamps, `YYYY-MM` and bare `YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Some((year, month)) = s.split_once('-') {
        if year.len() == 4 && (1..=2).contains(&month.len()) {
            let year = year.parse::<i32>().ok()?;
            let month = month.parse::<u32>().ok()?;
            return NaiveDate::from_ymd_opt(year, month, 1);
        }
    }
    if s.len() == 4 {
        let year = s.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn is_ongoing_marker(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("present") || s.eq_ignore_ascii_case("current")
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn push(&mut self, field: String, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    /// A string field; blank strings count as absent.
    fn opt_text(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.push(join(path, key), "expected a string");
                None
            }
        }
    }

    fn opt_bool(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<bool> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.push(join(path, key), "expected a boolean");
                None
            }
        }
    }

    fn opt_number(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<f64> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => {
                self.push(join(path, key), "expected a number");
                None
            }
        }
    }

    fn opt_date(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<NaiveDate> {
        let raw = self.opt_text(obj, key, path)?;
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            self.push(join(path, key), "expected a date (YYYY-MM-DD)");
        }
        parsed
    }

    /// Like `opt_date`, but also accepts "Present"/"Current". The flag is
    /// true when the marker was seen.
    fn opt_end_date(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> (Option<NaiveDate>, bool) {
        match obj.get(key) {
            Some(Value::String(s)) if is_ongoing_marker(s) => (None, true),
            _ => (self.opt_date(obj, key, path), false),
        }
    }

    fn string_list(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Vec<String> {
        let field = join(path, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) if s.trim().is_empty() => {}
                        Value::String(s) => out.push(s.clone()),
                        _ => self.push(format!("{field}[{i}]"), "expected a string"),
                    }
                }
                out
            }
            Some(_) => {
                self.push(field, "expected an array of strings");
                Vec::new()
            }
        }
    }

    /// Entries of an array-of-objects field, each paired with its path.
    fn object_items<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Vec<(String, &'a Map<String, Value>)> {
        let field = join(path, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{field}[{i}]");
                    match item {
                        Value::Object(map) => out.push((item_path, map)),
                        _ => self.push(item_path, "expected an object"),
                    }
                }
                out
            }
            Some(_) => {
                self.push(field, "expected an array");
                Vec::new()
            }
        }
    }

    fn experience(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Option<ExperienceCandidate> {
        let errors_before = self.errors.len();
        let company = self.opt_text(obj, "company", path);
        let title = self.opt_text(obj, "title", path);
        let identity_mistyped = self.errors.len() > errors_before;

        let description = self.opt_text(obj, "description", path);
        let start_date = self.opt_date(obj, "startDate", path);
        let (end_date, ongoing) = self.opt_end_date(obj, "endDate", path);
        let current = self
            .opt_bool(obj, "current", path)
            .or(ongoing.then_some(true));
        let location = self.opt_text(obj, "location", path);
        let highlights = self.string_list(obj, "highlights", path);

        if company.is_none() && title.is_none() {
            if !identity_mistyped {
                self.push(path.to_string(), "requires a company or a title");
            }
            return None;
        }

        Some(ExperienceCandidate {
            company: company.unwrap_or_default(),
            title: title.unwrap_or_default(),
            description,
            start_date,
            end_date,
            current,
            location,
            highlights,
        })
    }

    fn education(&mut self, obj: &Map<String, Value>, path: &str) -> Option<EducationCandidate> {
        let institution = aliases_for(Canonical::Institution)
            .into_iter()
            .map(|alias| self.opt_text(obj, alias, path))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .next();

        Some(EducationCandidate {
            institution,
            degree: self.opt_text(obj, "degree", path),
            field: self.opt_text(obj, "field", path),
            start_date: self.opt_date(obj, "startDate", path),
            end_date: self.opt_end_date(obj, "endDate", path).0,
            gpa: self.opt_number(obj, "gpa", path),
        })
    }

    /// Skills must arrive as an array; entries that are not non-blank
    /// strings are dropped without complaint.
    fn skills(&mut self, root: &Map<String, Value>) -> Vec<SkillCandidate> {
        match root.get("skills") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| SkillCandidate {
                    name: s.to_string(),
                })
                .collect(),
            Some(_) => {
                self.push("skills".to_string(), "expected an array of strings");
                Vec::new()
            }
        }
    }

    fn project(&mut self, obj: &Map<String, Value>, path: &str) -> Option<ProjectCandidate> {
        let errors_before = self.errors.len();
        let name = self.opt_text(obj, "name", path);
        let name_mistyped = self.errors.len() > errors_before;

        let description = self.opt_text(obj, "description", path);
        let technologies = self.string_list(obj, "technologies", path);
        let url = self.opt_text(obj, "url", path);
        let start_date = self.opt_date(obj, "startDate", path);
        let end_date = self.opt_end_date(obj, "endDate", path).0;

        let Some(name) = name else {
            if !name_mistyped {
                self.push(join(path, "name"), "is required");
            }
            return None;
        };

        Some(ProjectCandidate {
            name,
            description,
            technologies,
            url,
            start_date,
            end_date,
        })
    }
}
