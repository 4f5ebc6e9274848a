//! Prompt assembly — turns the input sources into the exact prompt pair
//! sent to the model.
//!
//! Pure and deterministic: same sources, instructions, and options always
//! produce byte-identical output. Precondition failures (no usable source)
//! are caught here, before any model attempt.

use crate::errors::PipelineError;
use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, NON_FABRICATION_INSTRUCTION};
use crate::llm_client::ModelInput;
use crate::normalize::sanitize_text;
use crate::pipeline::StructureOptions;
use crate::sources::{EnrichmentSnapshot, SourceDocument};

pub mod prompts;

pub use prompts::{load_system_prompt, STRUCTURING_SYSTEM};

/// README text is cut to this many characters in the prompt; the model does
/// not need more to describe a project.
const README_EXCERPT_CHARS: usize = 500;

/// Builds the model input from whatever sources are present.
///
/// The non-fabrication instruction goes last, after custom instructions, so
/// a caller's wording can bias emphasis but can never displace the
/// grounding contract.
pub fn assemble_input(
    resume: Option<&SourceDocument>,
    enrichment: Option<&EnrichmentSnapshot>,
    custom_instructions: Option<&str>,
    options: &StructureOptions,
    system_prompt: &str,
) -> Result<ModelInput, PipelineError> {
    let resume_text = resume
        .map(|doc| doc.text.trim())
        .filter(|text| !text.is_empty());

    if resume_text.is_none() && enrichment.is_none() {
        return Err(PipelineError::Precondition(match resume {
            Some(_) => "resume text is blank and no GitHub enrichment was provided".to_string(),
            None => "no input sources provided; need resume text or GitHub enrichment".to_string(),
        }));
    }

    let custom = custom_instructions
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let mut lines: Vec<String> = Vec::new();
    lines.push("Structure the following data into a canonical resume.".to_string());
    lines.push(String::new());

    lines.push("<unstructured_resume>".to_string());
    lines.push(resume_text.unwrap_or("Not provided").to_string());
    lines.push("</unstructured_resume>".to_string());
    lines.push(String::new());

    lines.push("<github_data>".to_string());
    match enrichment {
        Some(snapshot) => push_github_block(&mut lines, snapshot),
        None => lines.push("Not provided".to_string()),
    }
    lines.push("</github_data>".to_string());
    lines.push(String::new());

    if let Some(custom) = custom {
        lines.push("<custom_instructions>".to_string());
        lines.push(custom.to_string());
        lines.push("</custom_instructions>".to_string());
        lines.push(String::new());
    }

    lines.push(
        "GOAL: Extract and normalize information from the tagged blocks above into the canonical JSON schema."
            .to_string(),
    );
    lines.push("RULES:".to_string());
    let mut rule = 1;
    let mut push_rule = |lines: &mut Vec<String>, text: String| {
        lines.push(format!("{rule}. {text}"));
        rule += 1;
    };
    push_rule(
        &mut lines,
        "Use only information from the tagged blocks above.".to_string(),
    );
    push_rule(
        &mut lines,
        format!(
            "Include at most {} of the most relevant projects, ordered most relevant first.",
            options.max_projects
        ),
    );
    if let Some(language) = &options.output_language {
        push_rule(
            &mut lines,
            format!("Write the resume content in {language}."),
        );
    }
    if let Some(verbosity) = options.verbosity {
        push_rule(&mut lines, format!("Use a {verbosity} writing style."));
    }
    if custom.is_some() {
        push_rule(
            &mut lines,
            "Follow the custom instructions above where they do not conflict with these rules."
                .to_string(),
        );
    }

    lines.push(String::new());
    lines.push(JSON_ONLY_INSTRUCTION.to_string());
    lines.push(String::new());
    lines.push(NON_FABRICATION_INSTRUCTION.to_string());

    Ok(ModelInput {
        system: system_prompt.to_string(),
        user: lines.join("\n"),
    })
}

fn push_github_block(lines: &mut Vec<String>, snapshot: &EnrichmentSnapshot) {
    let profile = &snapshot.profile;
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| sanitize_text(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "N/A".to_string())
    };

    lines.push("PROFILE:".to_string());
    lines.push(format!("  Username: {}", profile.username));
    lines.push(format!("  Name: {}", field(&profile.name)));
    lines.push(format!("  Bio: {}", field(&profile.bio)));
    lines.push(format!("  Location: {}", field(&profile.location)));
    lines.push(format!("  Email: {}", field(&profile.email)));
    lines.push(format!("  Blog: {}", field(&profile.blog)));
    lines.push(format!("  Company: {}", field(&profile.company)));
    lines.push(String::new());

    lines.push(format!(
        "REPOSITORIES ({} total):",
        snapshot.repositories.len()
    ));
    for (i, repo) in snapshot.repositories.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, repo.name));
        lines.push(format!(
            "   Description: {}",
            repo.description
                .as_deref()
                .map(|d| sanitize_text(d).trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "No description".to_string())
        ));
        lines.push(format!("   Languages: {}", repo.languages.join(", ")));
        if !repo.topics.is_empty() {
            lines.push(format!("   Topics: {}", repo.topics.join(", ")));
        }
        lines.push(format!(
            "   URL: {}",
            repo.url.as_deref().unwrap_or("N/A")
        ));
        lines.push(format!("   Stars: {}", repo.stars));
        if let Some(readme) = repo.readme_excerpt.as_deref() {
            let readme = sanitize_text(readme);
            let excerpt: String = readme.trim().chars().take(README_EXCERPT_CHARS).collect();
            if !excerpt.is_empty() {
                lines.push(format!("   README: {excerpt}"));
            }
        }
        lines.push(String::new());
    }
}
