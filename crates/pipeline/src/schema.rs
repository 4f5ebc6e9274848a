//! Canonical resume schema — the single output shape of the structuring
//! pipeline, plus the decision-log entry format and the two-part wire
//! structure the model is contracted to return.
//!
//! Everything here is plain serde data. Validation rules live in
//! `validate`; this module only defines shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which input source a value was drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Resume,
    Github,
    Both,
}

/// What the model (or the post-pass) did to the items named in a
/// decision-log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Included,
    Excluded,
    Merged,
    Normalized,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

// ────────────────────────────────────────────────────────────────────────────
// Resume sections
// ────────────────────────────────────────────────────────────────────────────

/// Contact block. `full_name` and `email` are required keys of the canonical
/// shape; they hold the empty string when no source supplied a value, because
/// inventing contact details is never an option. A non-empty email must pass
/// the shape check in `validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// Skills grouped into disjoint buckets. A name may appear in at most one
/// bucket; the normalizer enforces disjointness.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TechnicalSkills {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks_libraries: Vec<String>,
    #[serde(default)]
    pub tools_platforms: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
}

impl TechnicalSkills {
    /// Buckets in deduplication priority order: a name claimed by an earlier
    /// bucket is removed from every later one.
    pub fn buckets_mut(&mut self) -> [(&'static str, &mut Vec<String>); 5] {
        [
            ("languages", &mut self.languages),
            ("frameworks_libraries", &mut self.frameworks_libraries),
            ("databases", &mut self.databases),
            ("tools_platforms", &mut self.tools_platforms),
            ("other", &mut self.other),
        ]
    }

    pub fn buckets(&self) -> [(&'static str, &[String]); 5] {
        [
            ("languages", &self.languages),
            ("frameworks_libraries", &self.frameworks_libraries),
            ("databases", &self.databases),
            ("tools_platforms", &self.tools_platforms),
            ("other", &self.other),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.buckets().iter().all(|(_, names)| names.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub source: Source,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub graduation_date: Option<String>,
    #[serde(default)]
    pub gpa: Option<String>,
    #[serde(default)]
    pub relevant_coursework: Vec<String>,
    #[serde(default)]
    pub honors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    pub role: String,
    pub organization: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Factual bullet statements, at least one.
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certification {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub credential_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The canonical structured resume. Dates are canonical strings
/// ("Month YYYY", "YYYY", or "Present") after normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalResume {
    pub contact: ContactInfo,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub technical_skills: TechnicalSkills,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub additional_info: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Decision log
// ────────────────────────────────────────────────────────────────────────────

/// One audited decision: what was included, excluded, merged, or normalized,
/// and why. `items` and `reason` are non-empty after validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionLogEntry {
    pub section: String,
    pub action: DecisionAction,
    pub items: Vec<String>,
    pub reason: String,
    pub source: Source,
    pub confidence: Confidence,
}

/// The two-part structure the model must return: the resume plus its raw
/// decision log. Log entries stay untyped here — the decision-log builder
/// validates them one by one so a single bad entry cannot sink the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub structured_resume: CanonicalResume,
    #[serde(default)]
    pub decision_log: Vec<Value>,
}
