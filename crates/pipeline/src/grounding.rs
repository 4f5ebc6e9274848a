//! Non-fabrication audit.
//!
//! After normalization, every token in the output must be traceable to the
//! inputs: present in the source text, derivable through a technology alias
//! whose raw form the sources contain, or a structural word (articles,
//! prepositions, month names). Anything else means uninvited content
//! survived validation, which the pipeline treats as a contract breach, not
//! as something to silently scrub.

use std::collections::HashSet;

use crate::normalize::dates::MONTHS;
use crate::normalize::AliasTable;
use crate::schema::CanonicalResume;
use crate::sources::{EnrichmentSnapshot, SourceDocument};

/// Connective vocabulary the model may use when composing sentences from
/// source facts. Deliberately small: content words stay subject to the
/// corpus check.
const STRUCTURAL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "with", "at", "by", "from",
    "as", "is", "are", "was", "were", "be", "been", "using", "via", "per", "present",
];

/// Lowercased token set of everything the model was shown, extended with
/// canonical technology names whose alias appears in the sources.
#[derive(Debug, Clone)]
pub struct SourceCorpus {
    tokens: HashSet<String>,
}

impl SourceCorpus {
    pub fn build(
        resume: Option<&SourceDocument>,
        enrichment: Option<&EnrichmentSnapshot>,
        aliases: &AliasTable,
    ) -> Self {
        let mut corpus = Self {
            tokens: HashSet::new(),
        };

        if let Some(doc) = resume {
            corpus.insert_text(&doc.text);
        }
        if let Some(snapshot) = enrichment {
            let profile = &snapshot.profile;
            corpus.insert_text(&profile.username);
            corpus.insert_opt(&profile.name);
            corpus.insert_opt(&profile.bio);
            corpus.insert_opt(&profile.location);
            corpus.insert_opt(&profile.email);
            corpus.insert_opt(&profile.blog);
            corpus.insert_opt(&profile.company);
            corpus.insert_opt(&profile.html_url);
            corpus.insert_text(&profile.public_repos.to_string());
            corpus.insert_text(&profile.followers.to_string());

            for repo in &snapshot.repositories {
                corpus.insert_text(&repo.name);
                corpus.insert_opt(&repo.description);
                corpus.insert_opt(&repo.url);
                corpus.insert_opt(&repo.readme_excerpt);
                for item in repo.languages.iter().chain(repo.topics.iter()) {
                    corpus.insert_text(item);
                }
                corpus.insert_text(&repo.stars.to_string());
                corpus.insert_text(&repo.forks.to_string());
            }
        }

        // A canonical name is traceable when all tokens of one of its raw
        // aliases appear in the sources.
        let mut derived: Vec<String> = Vec::new();
        for (alias, canonical) in aliases.entries() {
            if tokens(alias).all(|t| corpus.tokens.contains(&t)) {
                derived.extend(tokens(canonical));
            }
        }
        corpus.tokens.extend(derived);

        corpus
    }

    fn insert_text(&mut self, text: &str) {
        self.tokens.extend(tokens(text));
    }

    fn insert_opt(&mut self, text: &Option<String>) {
        if let Some(text) = text {
            self.insert_text(text);
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

/// An output token with no source to point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingViolation {
    pub field: String,
    pub token: String,
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn is_structural(token: &str) -> bool {
    STRUCTURAL_WORDS.contains(&token)
        || MONTHS.iter().any(|m| m.eq_ignore_ascii_case(token))
}

struct Auditor<'a> {
    corpus: &'a SourceCorpus,
    violations: Vec<GroundingViolation>,
}

impl Auditor<'_> {
    fn field(&mut self, field: String, text: &str) {
        for token in tokens(text) {
            if token.chars().count() <= 1 || is_structural(&token) {
                continue;
            }
            if !self.corpus.contains(&token) {
                self.violations.push(GroundingViolation {
                    field: field.clone(),
                    token,
                });
            }
        }
    }

    fn optional(&mut self, field: String, text: &Option<String>) {
        if let Some(text) = text {
            self.field(field, text);
        }
    }
}

/// Checks every leaf string of the resume against the corpus. Single-char
/// tokens are skipped; everything else must trace.
pub fn audit(resume: &CanonicalResume, corpus: &SourceCorpus) -> Vec<GroundingViolation> {
    let mut auditor = Auditor {
        corpus,
        violations: Vec::new(),
    };

    auditor.field("contact.full_name".into(), &resume.contact.full_name);
    auditor.field("contact.email".into(), &resume.contact.email);
    auditor.optional("contact.phone".into(), &resume.contact.phone);
    auditor.optional("contact.location".into(), &resume.contact.location);
    auditor.optional("contact.github".into(), &resume.contact.github);
    auditor.optional("contact.linkedin".into(), &resume.contact.linkedin);
    auditor.optional("contact.website".into(), &resume.contact.website);
    auditor.optional("summary".into(), &resume.summary);

    for (bucket, names) in resume.technical_skills.buckets() {
        for name in names {
            auditor.field(format!("technical_skills.{bucket}"), name);
        }
    }

    for (i, project) in resume.projects.iter().enumerate() {
        auditor.field(format!("projects[{i}].name"), &project.name);
        auditor.field(format!("projects[{i}].description"), &project.description);
        for tech in &project.technologies {
            auditor.field(format!("projects[{i}].technologies"), tech);
        }
        auditor.optional(format!("projects[{i}].url"), &project.url);
        for highlight in &project.highlights {
            auditor.field(format!("projects[{i}].highlights"), highlight);
        }
        auditor.optional(format!("projects[{i}].start_date"), &project.start_date);
        auditor.optional(format!("projects[{i}].end_date"), &project.end_date);
    }

    for (i, exp) in resume.experience.iter().enumerate() {
        auditor.field(format!("experience[{i}].role"), &exp.role);
        auditor.field(format!("experience[{i}].organization"), &exp.organization);
        auditor.optional(format!("experience[{i}].location"), &exp.location);
        auditor.optional(format!("experience[{i}].start_date"), &exp.start_date);
        auditor.optional(format!("experience[{i}].end_date"), &exp.end_date);
        for bullet in &exp.description {
            auditor.field(format!("experience[{i}].description"), bullet);
        }
        for tech in &exp.technologies {
            auditor.field(format!("experience[{i}].technologies"), tech);
        }
    }

    for (i, edu) in resume.education.iter().enumerate() {
        auditor.field(format!("education[{i}].degree"), &edu.degree);
        auditor.field(format!("education[{i}].institution"), &edu.institution);
        auditor.optional(format!("education[{i}].location"), &edu.location);
        auditor.optional(format!("education[{i}].graduation_date"), &edu.graduation_date);
        auditor.optional(format!("education[{i}].gpa"), &edu.gpa);
        for item in edu.relevant_coursework.iter().chain(edu.honors.iter()) {
            auditor.field(format!("education[{i}].details"), item);
        }
    }

    for (i, cert) in resume.certifications.iter().enumerate() {
        auditor.field(format!("certifications[{i}].name"), &cert.name);
        auditor.optional(format!("certifications[{i}].issuer"), &cert.issuer);
        auditor.optional(format!("certifications[{i}].date"), &cert.date);
        auditor.optional(format!("certifications[{i}].credential_id"), &cert.credential_id);
        auditor.optional(format!("certifications[{i}].url"), &cert.url);
    }

    auditor.optional("additional_info".into(), &resume.additional_info);

    auditor.violations
}
