//! Heuristic classification of posting text into structured attributes
//!
//! Pure keyword/regex matching over case-folded text. Each category is
//! independent and first-match-wins in a fixed priority order, so a title
//! containing both "senior" and "manager" resolves deterministically.
//! Best-effort only: a miss produces `None`, never an error.

use crate::models::{Derived, EmploymentType, RoleLevel, WorkType};
use regex::Regex;
use std::sync::OnceLock;

fn level_patterns() -> &'static [(Regex, RoleLevel)] {
    static PATTERNS: OnceLock<Vec<(Regex, RoleLevel)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"\b(intern|internship|co[- ]?op)\b", RoleLevel::Intern),
            (r"\b(entry[- ]?level|junior|jr\.?)\b", RoleLevel::Junior),
            (r"\b(senior|sr\.?)\b", RoleLevel::Senior),
            (r"\b(principal|staff|lead)\b", RoleLevel::Principal),
            (r"\b(manager|managing)\b", RoleLevel::Manager),
            (r"\b(director|head of)\b", RoleLevel::Director),
        ]
        .into_iter()
        .map(|(p, lvl)| (Regex::new(p).expect("valid level pattern"), lvl))
        .collect()
    })
}

fn work_type_patterns() -> &'static [(Regex, WorkType)] {
    static PATTERNS: OnceLock<Vec<(Regex, WorkType)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"\bon[- ]?site\b", WorkType::Onsite),
            (r"\bhybrid\b", WorkType::Hybrid),
            (r"\bremote\b", WorkType::Remote),
        ]
        .into_iter()
        .map(|(p, wt)| (Regex::new(p).expect("valid work type pattern"), wt))
        .collect()
    })
}

fn employment_patterns() -> &'static [(Regex, EmploymentType)] {
    static PATTERNS: OnceLock<Vec<(Regex, EmploymentType)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"\bfull[- ]?time\b", EmploymentType::FullTime),
            (r"\bpart[- ]?time\b", EmploymentType::PartTime),
            (
                r"\b(contract|contractor|temporary|temp|fixed[- ]?term)\b",
                EmploymentType::Contract,
            ),
        ]
        .into_iter()
        .map(|(p, et)| (Regex::new(p).expect("valid employment pattern"), et))
        .collect()
    })
}

/// Infer seniority level from title + description
pub fn infer_level(text: &str) -> Option<RoleLevel> {
    let t = text.to_lowercase();
    level_patterns()
        .iter()
        .find(|(re, _)| re.is_match(&t))
        .map(|(_, lvl)| *lvl)
}

/// Infer work arrangement from the posting text, falling back to a plain
/// "remote" substring check on the location string
pub fn infer_work_type(text: &str, location: Option<&str>) -> Option<WorkType> {
    let blob = format!("{} {}", text, location.unwrap_or("")).to_lowercase();
    if let Some((_, wt)) = work_type_patterns().iter().find(|(re, _)| re.is_match(&blob)) {
        return Some(*wt);
    }
    if location.is_some_and(|l| l.to_lowercase().contains("remote")) {
        return Some(WorkType::Remote);
    }
    None
}

/// Infer employment type from title + description
pub fn infer_employment(text: &str) -> Option<EmploymentType> {
    let t = text.to_lowercase();
    employment_patterns()
        .iter()
        .find(|(re, _)| re.is_match(&t))
        .map(|(_, et)| *et)
}

/// Decompose a raw location string into (city, state, country, remote)
///
/// Takes the first segment before separator punctuation, then splits it on
/// commas into up to three parts. Not geocoded, best-effort only.
pub fn split_location(
    location: Option<&str>,
) -> (Option<String>, Option<String>, Option<String>, bool) {
    let Some(loc) = location else {
        return (None, None, None, false);
    };

    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let separators = SEPARATORS.get_or_init(|| Regex::new(r"[;/|-]").expect("valid separator set"));

    let first = separators.split(loc).next().unwrap_or("");
    let mut frags = first.split(',').map(|f| f.trim().to_string());

    let city = frags.next().filter(|f| !f.is_empty());
    let state = frags.next().filter(|f| !f.is_empty());
    let country = frags.next().filter(|f| !f.is_empty());
    let remote = loc.to_lowercase().contains("remote");

    (city, state, country, remote)
}

/// Derive all secondary attributes for one posting
pub fn normalize(title: &str, description: &str, location: Option<&str>) -> Derived {
    let text = format!("{} {}", title, description);
    let (city, state, country, remote) = split_location(location);

    Derived {
        role_level: infer_level(&text),
        work_type: infer_work_type(&text, location),
        employment_type: infer_employment(&text),
        city,
        state,
        country,
        remote,
    }
}
