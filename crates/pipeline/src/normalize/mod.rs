//! Normalization pass — deterministic cleanup applied after validation.
//!
//! Flow: canonicalize technology names (alias table) → enforce skill-bucket
//! disjointness → canonicalize dates → merge duplicate projects → enforce
//! the project budget.
//!
//! The model is asked to do all of this itself; this pass re-applies the
//! rules so the output never depends on the model having listened. Every
//! applied alias mapping and every other change is returned as a
//! `NormalizationRecord` for the decision-log builder.

use std::collections::{HashMap, HashSet};

use crate::schema::{CanonicalResume, DecisionAction, Source};

pub mod dates;
pub mod merge;
pub mod text;

pub use dates::canonicalize_date;
pub use merge::{merge_duplicate_projects, merge_projects, project_key};
pub use text::{clean_source_text, clean_text, redact_sensitive, sanitize_text};

/// One deterministic change applied by the post-pass, in the shape the
/// decision-log builder needs. Covers merges and budget exclusions as well
/// as plain renames.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationRecord {
    pub section: String,
    pub action: DecisionAction,
    pub items: Vec<String>,
    pub reason: String,
    pub source: Source,
}

// ────────────────────────────────────────────────────────────────────────────
// Technology alias table
// ────────────────────────────────────────────────────────────────────────────

/// Built-in alias map, lowercase alias → canonical name. Alias lookup is the
/// only rewriting we do: names not in the table pass through byte-for-byte,
/// whatever their casing, so niche technologies are never mangled.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    // Languages
    ("python", "Python"),
    ("python3", "Python"),
    ("python2", "Python"),
    ("py", "Python"),
    ("javascript", "JavaScript"),
    ("js", "JavaScript"),
    ("typescript", "TypeScript"),
    ("ts", "TypeScript"),
    ("c++", "C++"),
    ("cpp", "C++"),
    ("c#", "C#"),
    ("csharp", "C#"),
    ("golang", "Go"),
    ("go", "Go"),
    ("rust", "Rust"),
    ("java", "Java"),
    ("kotlin", "Kotlin"),
    ("swift", "Swift"),
    ("ruby", "Ruby"),
    ("php", "PHP"),
    ("r", "R"),
    ("matlab", "MATLAB"),
    ("scala", "Scala"),
    ("perl", "Perl"),
    ("shell", "Shell"),
    ("bash", "Bash"),
    ("powershell", "PowerShell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("sass", "Sass"),
    ("scss", "SCSS"),
    ("less", "LESS"),
    // Frontend frameworks
    ("react", "React"),
    ("react.js", "React"),
    ("reactjs", "React"),
    ("react js", "React"),
    ("vue", "Vue.js"),
    ("vue.js", "Vue.js"),
    ("vuejs", "Vue.js"),
    ("angular", "Angular"),
    ("angularjs", "Angular"),
    ("svelte", "Svelte"),
    ("next", "Next.js"),
    ("next.js", "Next.js"),
    ("nextjs", "Next.js"),
    ("nuxt", "Nuxt.js"),
    ("nuxt.js", "Nuxt.js"),
    ("gatsby", "Gatsby"),
    // Backend frameworks
    ("node", "Node.js"),
    ("node.js", "Node.js"),
    ("nodejs", "Node.js"),
    ("express", "Express.js"),
    ("express.js", "Express.js"),
    ("expressjs", "Express.js"),
    ("fastapi", "FastAPI"),
    ("flask", "Flask"),
    ("django", "Django"),
    ("spring", "Spring"),
    ("spring boot", "Spring Boot"),
    ("rails", "Ruby on Rails"),
    ("ruby on rails", "Ruby on Rails"),
    ("laravel", "Laravel"),
    ("asp.net", "ASP.NET"),
    ("aspnet", "ASP.NET"),
    // Databases
    ("postgres", "PostgreSQL"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mariadb", "MariaDB"),
    ("mongo", "MongoDB"),
    ("mongodb", "MongoDB"),
    ("redis", "Redis"),
    ("sqlite", "SQLite"),
    ("dynamodb", "DynamoDB"),
    ("cassandra", "Cassandra"),
    ("elasticsearch", "Elasticsearch"),
    ("neo4j", "Neo4j"),
    // Cloud and devops
    ("aws", "AWS"),
    ("amazon web services", "AWS"),
    ("gcp", "Google Cloud Platform"),
    ("google cloud", "Google Cloud Platform"),
    ("azure", "Azure"),
    ("docker", "Docker"),
    ("docker-compose", "Docker Compose"),
    ("kubernetes", "Kubernetes"),
    ("k8s", "Kubernetes"),
    ("terraform", "Terraform"),
    ("ansible", "Ansible"),
    ("jenkins", "Jenkins"),
    ("circleci", "CircleCI"),
    ("travis", "Travis CI"),
    ("github actions", "GitHub Actions"),
    ("gitlab ci", "GitLab CI"),
    // Tools
    ("git", "Git"),
    ("github", "GitHub"),
    ("gitlab", "GitLab"),
    ("bitbucket", "Bitbucket"),
    ("vscode", "VS Code"),
    ("visual studio code", "VS Code"),
    ("vim", "Vim"),
    ("neovim", "Neovim"),
    ("postman", "Postman"),
    ("figma", "Figma"),
    ("jira", "Jira"),
    ("confluence", "Confluence"),
    ("slack", "Slack"),
    ("notion", "Notion"),
    // ML / data
    ("tensorflow", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("keras", "Keras"),
    ("scikit-learn", "scikit-learn"),
    ("sklearn", "scikit-learn"),
    ("pandas", "Pandas"),
    ("numpy", "NumPy"),
    ("matplotlib", "Matplotlib"),
    ("opencv", "OpenCV"),
    ("huggingface", "Hugging Face"),
    ("langchain", "LangChain"),
    // Testing
    ("jest", "Jest"),
    ("mocha", "Mocha"),
    ("pytest", "pytest"),
    ("junit", "JUnit"),
    ("cypress", "Cypress"),
    ("selenium", "Selenium"),
    ("playwright", "Playwright"),
];

/// Case-insensitive technology alias table. Every canonical value is a fixed
/// point of the table, so canonicalization is idempotent.
#[derive(Debug, Clone)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_ALIASES.iter().copied())
    }
}

impl AliasTable {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::empty();
        for (alias, canonical) in pairs {
            table.insert(alias, canonical);
        }
        table
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.map
            .insert(alias.trim().to_lowercase(), canonical.trim().to_string());
    }

    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.map.get(&raw.trim().to_lowercase()).map(String::as_str)
    }

    /// Trims the name and applies the table. Unknown names are returned
    /// unchanged — casing included.
    pub fn canonicalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.lookup(trimmed) {
            Some(canonical) => canonical.to_string(),
            None => trimmed.to_string(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Post-pass
// ────────────────────────────────────────────────────────────────────────────

/// Canonicalizes a technology list in place, dropping case-insensitive
/// duplicates. Returns one (raw, canonical) pair per alias-table hit; a hit
/// counts even when the name was already canonical, and is captured before
/// the duplicate check so names deduplicated away are still accounted for.
fn canonicalize_list(table: &AliasTable, items: &mut Vec<String>) -> Vec<(String, String)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut mappings = Vec::new();
    let mut out = Vec::with_capacity(items.len());

    for raw in items.drain(..) {
        let trimmed = raw.trim();
        let hit = table.lookup(trimmed);
        let canonical = hit.unwrap_or(trimmed).to_string();
        if hit.is_some() {
            mappings.push((trimmed.to_string(), canonical.clone()));
        }
        if !seen.insert(canonical.to_lowercase()) {
            continue;
        }
        out.push(canonical);
    }

    *items = out;
    mappings
}

fn alias_records(
    section: &str,
    mappings: Vec<(String, String)>,
    source: Source,
) -> Vec<NormalizationRecord> {
    mappings
        .into_iter()
        .map(|(raw, canonical)| {
            let (items, reason) = if raw == canonical {
                (
                    vec![canonical.clone()],
                    format!("'{canonical}' already matches its canonical form"),
                )
            } else {
                (
                    vec![raw.clone(), canonical.clone()],
                    format!("'{raw}' normalized to '{canonical}'"),
                )
            };
            NormalizationRecord {
                section: section.to_string(),
                action: DecisionAction::Normalized,
                items,
                reason,
                source,
            }
        })
        .collect()
}

/// Canonicalizes all five skill buckets and enforces disjointness. Priority
/// runs languages > frameworks > databases > tools > other; a name stays in
/// the first bucket that claims it. Every alias-table hit is returned as a
/// record, dropped duplicates included.
pub fn canonicalize_skills(
    skills: &mut crate::schema::TechnicalSkills,
    table: &AliasTable,
    source: Source,
) -> Vec<NormalizationRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (_, bucket) in skills.buckets_mut() {
        let mut out = Vec::with_capacity(bucket.len());
        for raw in bucket.drain(..) {
            let trimmed = raw.trim();
            let hit = table.lookup(trimmed);
            let canonical = hit.unwrap_or(trimmed).to_string();
            if hit.is_some() {
                records.extend(alias_records(
                    "technical_skills",
                    vec![(trimmed.to_string(), canonical.clone())],
                    source,
                ));
            }
            if !seen.insert(canonical.to_lowercase()) {
                continue;
            }
            out.push(canonical);
        }
        *bucket = out;
    }

    records
}

fn canonicalize_date_field(
    field: &mut Option<String>,
    section: &str,
    source: Source,
    records: &mut Vec<NormalizationRecord>,
) {
    let Some(raw) = field.as_deref() else {
        return;
    };
    let raw = raw.trim().to_string();
    if raw.is_empty() {
        *field = None;
        return;
    }
    match dates::canonicalize_date(&raw) {
        Some(canonical) => {
            if canonical != raw {
                records.push(NormalizationRecord {
                    section: section.to_string(),
                    action: DecisionAction::Normalized,
                    items: vec![raw.clone(), canonical.clone()],
                    reason: format!("Date '{raw}' rewritten as '{canonical}'"),
                    source,
                });
            }
            *field = Some(canonical);
        }
        None => {
            records.push(NormalizationRecord {
                section: section.to_string(),
                action: DecisionAction::Normalized,
                items: vec![raw.clone()],
                reason: format!("Date '{raw}' is not in a recognized format; value omitted"),
                source,
            });
            *field = None;
        }
    }
}

fn combined_source(sources: impl IntoIterator<Item = Source>) -> Source {
    let mut iter = sources.into_iter();
    let Some(first) = iter.next() else {
        return Source::Both;
    };
    if iter.all(|s| s == first) {
        first
    } else {
        Source::Both
    }
}

/// Runs the whole deterministic post-pass over a validated resume.
///
/// `input_source` says which inputs this run actually had (resume, github,
/// or both); it labels records for values that carry no per-item provenance.
pub fn apply_post_pass(
    resume: &mut CanonicalResume,
    table: &AliasTable,
    max_projects: usize,
    highlight_cap: usize,
    input_source: Source,
) -> Vec<NormalizationRecord> {
    let mut records = Vec::new();

    // Skills: canonical names + bucket disjointness
    records.extend(canonicalize_skills(
        &mut resume.technical_skills,
        table,
        input_source,
    ));

    // Technology lists on projects and experience entries
    for project in &mut resume.projects {
        let mappings = canonicalize_list(table, &mut project.technologies);
        records.extend(alias_records("projects", mappings, project.source));
    }
    for exp in &mut resume.experience {
        let mappings = canonicalize_list(table, &mut exp.technologies);
        records.extend(alias_records("experience", mappings, input_source));
    }

    // Dates everywhere
    for project in &mut resume.projects {
        let source = project.source;
        canonicalize_date_field(&mut project.start_date, "projects", source, &mut records);
        canonicalize_date_field(&mut project.end_date, "projects", source, &mut records);
    }
    for exp in &mut resume.experience {
        canonicalize_date_field(&mut exp.start_date, "experience", input_source, &mut records);
        canonicalize_date_field(&mut exp.end_date, "experience", input_source, &mut records);
    }
    for edu in &mut resume.education {
        canonicalize_date_field(
            &mut edu.graduation_date,
            "education",
            input_source,
            &mut records,
        );
    }
    for cert in &mut resume.certifications {
        canonicalize_date_field(&mut cert.date, "certifications", input_source, &mut records);
    }

    // Duplicate projects the model failed to merge
    let (merged, merge_records) =
        merge::merge_duplicate_projects(std::mem::take(&mut resume.projects), highlight_cap);
    resume.projects = merged;
    records.extend(merge_records);

    // Project budget: the model ordered most-relevant-first, so drop from
    // the tail.
    if resume.projects.len() > max_projects {
        let dropped: Vec<crate::schema::Project> = resume.projects.split_off(max_projects);
        let source = combined_source(dropped.iter().map(|p| p.source));
        records.push(NormalizationRecord {
            section: "projects".to_string(),
            action: DecisionAction::Excluded,
            items: dropped.into_iter().map(|p| p.name).collect(),
            reason: format!("Exceeded the project budget of {max_projects}; least relevant entries dropped"),
            source,
        });
    }

    records
}
