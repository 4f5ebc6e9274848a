//! Repair passes for model output.
//!
//! Two families, both bounded and auditable:
//!
//! - text passes run only while the payload still fails to parse as JSON.
//!   Each returns `Some(fixed)` or `None` for no-change, and the caller
//!   re-parses after every change.
//! - value passes run exactly once on the parsed tree and report whether
//!   they changed anything.
//!
//! No pass invents a value. Renaming a field, closing a bracket, or
//! stringifying a number preserves what the model said; anything beyond
//! that is a validation failure, not a repair.

use serde_json::{Map, Value};

/// Text-level passes in application order.
pub(crate) const TEXT_PASSES: &[(&str, fn(&str) -> Option<String>)] = &[
    ("strip_code_fences", strip_code_fences),
    ("extract_payload", extract_payload),
    ("close_unterminated", close_unterminated),
];

/// Value-level passes in application order.
pub(crate) const VALUE_PASSES: &[(&str, fn(&mut Value) -> bool)] = &[
    ("wrap_bare_resume", wrap_bare_resume),
    ("normalize_field_aliases", normalize_field_aliases),
    ("coerce_scalars", coerce_scalars),
];

/// Strips ```json ... ``` or ``` ... ``` fences around the payload.
fn strip_code_fences(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))?;
    let stripped = stripped.trim_start();
    let stripped = stripped.strip_suffix("```").unwrap_or(stripped);
    Some(stripped.trim().to_string())
}

/// Extracts the JSON payload out of surrounding prose. The model sometimes
/// narrates before the object or keeps talking after it; occasionally it
/// even drops the opening brace before `"structured_resume"`.
fn extract_payload(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return None;
    }

    const MARKERS: &[&str] = &["{\"structured_resume\":", "\"structured_resume\":", "{"];

    let end = trimmed.rfind('}')? + 1;
    for marker in MARKERS {
        let Some(start) = trimmed.find(marker) else {
            continue;
        };
        if start >= end {
            continue;
        }
        let mut candidate = trimmed[start..end].to_string();
        if !candidate.starts_with('{') {
            candidate.insert(0, '{');
        }
        if candidate != trimmed {
            return Some(candidate);
        }
    }
    None
}

/// Closes unterminated strings, arrays, and objects at the end of the
/// payload. Only appends closers; a stray closer or mismatched pair is left
/// alone for validation to reject.
fn close_unterminated(text: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if !in_string && stack.is_empty() {
        return None;
    }

    let mut fixed = text.to_string();
    if in_string {
        fixed.push('"');
    }
    while let Some(closer) = stack.pop() {
        fixed.push(closer);
    }
    Some(fixed)
}

/// Wraps a bare resume object into the two-part structure. Applies only
/// when the top level looks like a resume (has `contact`) and the wrapper
/// key is missing.
fn wrap_bare_resume(value: &mut Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    if obj.contains_key("structured_resume") || !obj.contains_key("contact") {
        return false;
    }
    let resume = std::mem::take(value);
    let mut wrapper = Map::new();
    wrapper.insert("structured_resume".to_string(), resume);
    wrapper.insert("decision_log".to_string(), Value::Array(Vec::new()));
    *value = Value::Object(wrapper);
    true
}

/// Renames a key if the canonical key is absent and the alias present.
fn rename_key(obj: &mut Map<String, Value>, alias: &str, canonical: &str) -> bool {
    if obj.contains_key(canonical) || !obj.contains_key(alias) {
        return false;
    }
    if let Some(v) = obj.remove(alias) {
        obj.insert(canonical.to_string(), v);
        return true;
    }
    false
}

fn for_each_entry(
    resume: &mut Map<String, Value>,
    section: &str,
    mut f: impl FnMut(&mut Map<String, Value>) -> bool,
) -> bool {
    let mut changed = false;
    if let Some(Value::Array(entries)) = resume.get_mut(section) {
        for entry in entries {
            if let Some(obj) = entry.as_object_mut() {
                changed |= f(obj);
            }
        }
    }
    changed
}

/// Field-name drift the model produces often enough to be worth absorbing:
/// `title` for `role`, `company` for `organization`, `school` for
/// `institution`, and friends.
fn normalize_field_aliases(value: &mut Value) -> bool {
    let Some(top) = value.as_object_mut() else {
        return false;
    };
    let mut changed = rename_key(top, "decisions", "decision_log");
    changed |= rename_key(top, "decision_logs", "decision_log");

    let Some(resume) = top
        .get_mut("structured_resume")
        .and_then(Value::as_object_mut)
    else {
        return changed;
    };

    if let Some(contact) = resume.get_mut("contact").and_then(Value::as_object_mut) {
        changed |= rename_key(contact, "name", "full_name");
        changed |= rename_key(contact, "github_url", "github");
        changed |= rename_key(contact, "linkedin_url", "linkedin");
        changed |= rename_key(contact, "website_url", "website");
    }

    if let Some(skills) = resume
        .get_mut("technical_skills")
        .and_then(Value::as_object_mut)
    {
        changed |= rename_key(skills, "frameworks", "frameworks_libraries");
        changed |= rename_key(skills, "tools", "tools_platforms");
    }

    changed |= for_each_entry(resume, "experience", |entry| {
        let mut c = rename_key(entry, "title", "role");
        c |= rename_key(entry, "company", "organization");
        c |= rename_key(entry, "employer", "organization");
        if let Some(desc) = entry.get_mut("description") {
            if desc.is_string() {
                let text = std::mem::take(desc);
                *desc = Value::Array(vec![text]);
                c = true;
            }
        }
        c
    });

    changed |= for_each_entry(resume, "education", |entry| {
        let mut c = rename_key(entry, "school", "institution");
        c |= rename_key(entry, "university", "institution");
        c
    });

    changed |= for_each_entry(resume, "projects", |entry| {
        let mut c = rename_key(entry, "achievements", "highlights");
        c |= rename_key(entry, "bullets", "highlights");
        c |= rename_key(entry, "tech_stack", "technologies");
        c
    });

    changed
}

fn number_to_string(obj: &mut Map<String, Value>, key: &str) -> bool {
    match obj.get_mut(key) {
        Some(v) if v.is_number() => {
            let text = v.to_string();
            *v = Value::String(text);
            true
        }
        _ => false,
    }
}

fn lowercase_string(obj: &mut Map<String, Value>, key: &str) -> bool {
    match obj.get_mut(key) {
        Some(Value::String(s)) => {
            let lower = s.to_lowercase();
            if lower != *s {
                *s = lower;
                return true;
            }
            false
        }
        _ => false,
    }
}

/// Scalar shape fixes: numbers where strings belong (years, GPAs, phone
/// numbers) and uppercased enum values.
fn coerce_scalars(value: &mut Value) -> bool {
    let Some(resume) = value
        .as_object_mut()
        .and_then(|top| top.get_mut("structured_resume"))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };

    let mut changed = false;

    if let Some(contact) = resume.get_mut("contact").and_then(Value::as_object_mut) {
        changed |= number_to_string(contact, "phone");
    }

    changed |= for_each_entry(resume, "projects", |entry| {
        let mut c = number_to_string(entry, "start_date");
        c |= number_to_string(entry, "end_date");
        c |= lowercase_string(entry, "source");
        c
    });

    changed |= for_each_entry(resume, "experience", |entry| {
        let mut c = number_to_string(entry, "start_date");
        c |= number_to_string(entry, "end_date");
        c
    });

    changed |= for_each_entry(resume, "education", |entry| {
        let mut c = number_to_string(entry, "graduation_date");
        c |= number_to_string(entry, "gpa");
        c
    });

    changed |= for_each_entry(resume, "certifications", |entry| {
        number_to_string(entry, "date")
    });

    changed
}
