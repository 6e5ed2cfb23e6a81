//! Canonical data model for job postings
//!
//! Every source adapter maps its wire format onto [`RawPosting`]; the store
//! persists one [`JobPosting`] row per distinct canonical URL.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Seniority level derived from the posting text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleLevel {
    Intern,
    Junior,
    Senior,
    Principal,
    Manager,
    Director,
}

impl std::fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleLevel::Intern => write!(f, "intern"),
            RoleLevel::Junior => write!(f, "junior"),
            RoleLevel::Senior => write!(f, "senior"),
            RoleLevel::Principal => write!(f, "principal"),
            RoleLevel::Manager => write!(f, "manager"),
            RoleLevel::Director => write!(f, "director"),
        }
    }
}

impl FromStr for RoleLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "intern" => Ok(RoleLevel::Intern),
            "junior" => Ok(RoleLevel::Junior),
            "senior" => Ok(RoleLevel::Senior),
            "principal" => Ok(RoleLevel::Principal),
            "manager" => Ok(RoleLevel::Manager),
            "director" => Ok(RoleLevel::Director),
            _ => Err(Error::Other(format!("Unknown role level: {}", s))),
        }
    }
}

/// Work arrangement derived from the posting text or location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Onsite,
    Hybrid,
    Remote,
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkType::Onsite => write!(f, "onsite"),
            WorkType::Hybrid => write!(f, "hybrid"),
            WorkType::Remote => write!(f, "remote"),
        }
    }
}

/// Employment type derived from the posting text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
}

impl std::fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmploymentType::FullTime => write!(f, "full-time"),
            EmploymentType::PartTime => write!(f, "part-time"),
            EmploymentType::Contract => write!(f, "contract"),
        }
    }
}

/// Secondary attributes computed by the normalizer, all best-effort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub role_level: Option<RoleLevel>,
    pub work_type: Option<WorkType>,
    pub employment_type: Option<EmploymentType>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub remote: bool,
}

/// A posting as produced by a source adapter, before persistence
///
/// `url` is guaranteed non-empty: adapters skip records without a usable
/// canonical URL instead of emitting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosting {
    pub source_id: String,
    pub org_name: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub url: String,
    pub posted_at: Option<DateTime<Utc>>,
}

impl RawPosting {
    /// Deterministic fingerprint of the canonical URL, the uniqueness
    /// constraint for the whole table
    pub fn identity_key(&self) -> String {
        identity_key(&self.url)
    }
}

/// Fingerprint a canonical URL. Same URL, same key, across all sources.
pub fn identity_key(canonical_url: &str) -> String {
    blake3::hash(canonical_url.as_bytes()).to_hex().to_string()
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A stored job posting row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: i64,
    pub source_id: String,
    pub org_name: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub role_level: Option<String>,
    pub work_type: Option<String>,
    pub employment_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub remote: Option<i64>,
    pub post_url: String,
    pub identity_key: String,
    pub posted_at: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
}
