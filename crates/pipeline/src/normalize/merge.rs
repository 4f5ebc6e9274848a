//! Duplicate-project detection and merging.
//!
//! The model is instructed to merge projects that appear in both sources,
//! but it misses some. This pass catches the rest: two projects are the
//! same when their names match after case and separator folding, so
//! "Task Tracker" (resume) and "task-tracker" (GitHub repo) collide.

use crate::schema::{DecisionAction, Project, Source};

use super::NormalizationRecord;

/// Folded comparison key for project names: lowercase, `-`/`_` become
/// spaces, whitespace runs collapse.
pub fn project_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut last_was_space = true;
    for c in name.trim().chars() {
        let c = match c {
            '-' | '_' => ' ',
            other => other,
        };
        if c.is_whitespace() {
            if !last_was_space {
                key.push(' ');
            }
            last_was_space = true;
        } else {
            for lower in c.to_lowercase() {
                key.push(lower);
            }
            last_was_space = false;
        }
    }
    if key.ends_with(' ') {
        key.pop();
    }
    key
}

/// How strongly a side's name/date claim wins: resume wording beats an
/// already-merged entry beats a bare repo name.
fn resume_rank(source: Source) -> u8 {
    match source {
        Source::Resume => 2,
        Source::Both => 1,
        Source::Github => 0,
    }
}

/// For urls the preference flips: the GitHub side carries the repo link.
fn github_rank(source: Source) -> u8 {
    match source {
        Source::Github => 2,
        Source::Both => 1,
        Source::Resume => 0,
    }
}

/// Merges two projects that refer to the same work.
///
/// Resume-sourced name and dates win; the longer description wins (first
/// argument on ties); technology and highlight sets are unioned
/// case-insensitively; the GitHub-side url wins; `source` becomes `Both`
/// when the sides disagree. Apart from the documented first-argument
/// tie-breaks the result does not depend on argument order.
pub fn merge_projects(a: &Project, b: &Project, highlight_cap: usize) -> Project {
    let (name_side, other_side) = if resume_rank(b.source) > resume_rank(a.source) {
        (b, a)
    } else {
        (a, b)
    };

    let description = if b.description.chars().count() > a.description.chars().count() {
        b.description.clone()
    } else {
        a.description.clone()
    };

    let mut technologies = a.technologies.clone();
    union_case_insensitive(&mut technologies, &b.technologies, usize::MAX);

    let mut highlights = a.highlights.clone();
    union_case_insensitive(&mut highlights, &b.highlights, highlight_cap);

    let (url_side, url_other) = if github_rank(b.source) > github_rank(a.source) {
        (b, a)
    } else {
        (a, b)
    };

    Project {
        name: name_side.name.clone(),
        description,
        technologies,
        source: if a.source == b.source {
            a.source
        } else {
            Source::Both
        },
        url: url_side.url.clone().or_else(|| url_other.url.clone()),
        highlights,
        start_date: name_side
            .start_date
            .clone()
            .or_else(|| other_side.start_date.clone()),
        end_date: name_side
            .end_date
            .clone()
            .or_else(|| other_side.end_date.clone()),
    }
}

fn union_case_insensitive(into: &mut Vec<String>, from: &[String], cap: usize) {
    for item in from {
        let exists = into
            .iter()
            .any(|have| have.eq_ignore_ascii_case(item.trim()));
        if !exists {
            into.push(item.trim().to_string());
        }
    }
    into.truncate(cap);
}

/// Folds a project list, merging entries whose keys collide. First
/// occurrence keeps its position. Returns one record per merge performed.
pub fn merge_duplicate_projects(
    projects: Vec<Project>,
    highlight_cap: usize,
) -> (Vec<Project>, Vec<NormalizationRecord>) {
    let mut out: Vec<Project> = Vec::with_capacity(projects.len());
    let mut records = Vec::new();

    for project in projects {
        let key = project_key(&project.name);
        match out.iter().position(|have| project_key(&have.name) == key) {
            Some(idx) => {
                let existing = &out[idx];
                let cross_source = existing.source != project.source;
                let mut items = vec![existing.name.clone()];
                if !existing.name.eq_ignore_ascii_case(project.name.trim()) {
                    items.push(project.name.clone());
                }
                let merged = merge_projects(existing, &project, highlight_cap);
                records.push(NormalizationRecord {
                    section: "projects".to_string(),
                    action: DecisionAction::Merged,
                    items,
                    reason: if cross_source {
                        "Same project reported by more than one source; entries merged".to_string()
                    } else {
                        "Duplicate project entries merged".to_string()
                    },
                    source: merged.source,
                });
                out[idx] = merged;
            }
            None => out.push(project),
        }
    }

    (out, records)
}
