//! Response validation — from raw model text to a schema-valid resume.
//!
//! Flow: parse → (on failure) text repair passes with re-parse → value
//! repair passes → typed parse into the two-part structure → semantic
//! checks. Fail closed: a payload that still violates the schema after
//! repair is an error, never a partial result. Raw model text goes to the
//! debug log only, keyed by invocation id, and never into an error value.

use serde_json::Value;
use tracing::debug;

use crate::errors::PipelineError;
use crate::llm_client::RawModelOutput;
use crate::schema::{CanonicalResume, StructuredOutput};

pub mod repair;

/// Upper bound for the summary field, in characters.
pub const SUMMARY_MAX_CHARS: usize = 800;

/// Parses and validates raw model output into a canonical resume plus the
/// raw decision-log entries (validated leniently later, one by one).
pub fn parse_and_validate(
    raw: &RawModelOutput,
) -> Result<(CanonicalResume, Vec<Value>), PipelineError> {
    let mut text = raw.text.trim().to_string();
    let mut applied: Vec<&'static str> = Vec::new();

    let mut value: Option<Value> = serde_json::from_str(&text).ok();
    if value.is_none() {
        for (name, pass) in repair::TEXT_PASSES {
            if let Some(fixed) = pass(&text) {
                applied.push(name);
                text = fixed;
                if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                    value = Some(parsed);
                    break;
                }
            }
        }
    }

    let Some(mut value) = value else {
        return Err(PipelineError::MalformedOutput(format!(
            "response is not valid JSON after repair (passes applied: {applied:?})"
        )));
    };

    for (name, pass) in repair::VALUE_PASSES {
        if pass(&mut value) {
            applied.push(name);
        }
    }
    if !applied.is_empty() {
        debug!(passes = ?applied, "repair passes changed the payload");
    }

    let has_wrapper = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("structured_resume"));
    if !has_wrapper {
        return Err(PipelineError::MalformedOutput(
            "payload does not contain the two-part structure (structured_resume + decision_log)"
                .to_string(),
        ));
    }

    let output: StructuredOutput = serde_json::from_value(value)
        .map_err(|e| PipelineError::SchemaViolation(format!("canonical parse failed: {e}")))?;

    let issues = validate_resume(&output.structured_resume);
    if !issues.is_empty() {
        return Err(PipelineError::SchemaViolation(issues.join("; ")));
    }

    Ok((output.structured_resume, output.decision_log))
}

/// Semantic checks the typed parse cannot express. Returns every issue
/// found so the caller sees the full list at once.
pub fn validate_resume(resume: &CanonicalResume) -> Vec<String> {
    let mut issues = Vec::new();

    if !resume.contact.email.is_empty() && !is_valid_email(&resume.contact.email) {
        issues.push(format!(
            "contact.email is not a valid email address: '{}'",
            resume.contact.email
        ));
    }

    if let Some(summary) = &resume.summary {
        let len = summary.chars().count();
        if len > SUMMARY_MAX_CHARS {
            issues.push(format!(
                "summary exceeds {SUMMARY_MAX_CHARS} characters (got {len})"
            ));
        }
    }

    for (i, project) in resume.projects.iter().enumerate() {
        if project.name.trim().is_empty() {
            issues.push(format!("projects[{i}].name is blank"));
        }
        if project.description.trim().is_empty() {
            issues.push(format!("projects[{i}].description is blank"));
        }
        if project.technologies.iter().all(|t| t.trim().is_empty()) {
            issues.push(format!("projects[{i}].technologies is empty"));
        }
    }

    for (i, exp) in resume.experience.iter().enumerate() {
        if exp.role.trim().is_empty() {
            issues.push(format!("experience[{i}].role is blank"));
        }
        if exp.organization.trim().is_empty() {
            issues.push(format!("experience[{i}].organization is blank"));
        }
        if exp.description.iter().all(|d| d.trim().is_empty()) {
            issues.push(format!("experience[{i}].description is empty"));
        }
    }

    for (i, edu) in resume.education.iter().enumerate() {
        if edu.degree.trim().is_empty() {
            issues.push(format!("education[{i}].degree is blank"));
        }
        if edu.institution.trim().is_empty() {
            issues.push(format!("education[{i}].institution is blank"));
        }
    }

    for (i, cert) in resume.certifications.iter().enumerate() {
        if cert.name.trim().is_empty() {
            issues.push(format!("certifications[{i}].name is blank"));
        }
    }

    issues
}

/// Shape check only: one `@`, non-empty local part, dotted domain. Real
/// deliverability is not this crate's problem.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}
