//! Context assembly: a bounded, relevance-ranked summary of the civic
//! catalog handed to remote providers as grounding.
//!
//! Programs are ranked by a simple keyword signal (does the query mention the
//! program's category?) with a stable sort so ties keep catalog order.
//! Facilities keep catalog order. Both lists are capped and every rendered
//! field is truncated, so the prompt size is bounded no matter how large the
//! catalog grows.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use civicbridge_config::ContextConfig;

use crate::catalog::{CivicCatalog, Facility, Program};
use crate::query::Query;

pub const PROGRAMS_HEADER: &str = "Available Programs:";
pub const FACILITIES_HEADER: &str = "Nearby Facilities:";
pub const NO_PROGRAMS: &str = "No programs available.";
pub const NO_FACILITIES: &str = "No facilities available.";

/// Query words that point at agricultural programs even when the category
/// name itself is not mentioned.
const AGRICULTURE_HINTS: &[&str] = &["farm", "crop", "agri"];

/// One rendered line of context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub title: String,
    /// Secondary label, e.g. a facility type.
    pub tag: Option<String>,
    pub description: String,
}

/// The context for one query. Built fresh per query and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnippet {
    programs: Vec<ContextEntry>,
    facilities: Vec<ContextEntry>,
}

impl ContextSnippet {
    /// Ranked program entries.
    pub fn programs(&self) -> &[ContextEntry] {
        &self.programs
    }

    /// Facility entries in catalog order.
    pub fn facilities(&self) -> &[ContextEntry] {
        &self.facilities
    }

    /// True when neither list has entries.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.facilities.is_empty()
    }

    /// Render both sections. An empty section renders its placeholder line.
    pub fn render(&self) -> String {
        let programs = if self.programs.is_empty() {
            NO_PROGRAMS.to_string()
        } else {
            self.programs
                .iter()
                .map(|e| format!("{}: {}", e.title, e.description))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let facilities = if self.facilities.is_empty() {
            NO_FACILITIES.to_string()
        } else {
            self.facilities
                .iter()
                .map(|e| match e.tag {
                    Some(ref tag) => format!("{} ({}) - {}", e.title, tag, e.description),
                    None => format!("{} - {}", e.title, e.description),
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!("{PROGRAMS_HEADER}\n{programs}\n\n{FACILITIES_HEADER}\n{facilities}")
    }
}

impl fmt::Display for ContextSnippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Relevance of a program to an already lower-cased query.
///
/// 1 when the query mentions the program's category (or an agricultural
/// hint for agricultural programs), otherwise 0.
pub fn relevance(program: &Program, lower_query: &str) -> u8 {
    let category = program.category.trim().to_lowercase();
    if category.is_empty() {
        return 0;
    }
    if lower_query.contains(&category) {
        return 1;
    }
    if category == "agriculture" && AGRICULTURE_HINTS.iter().any(|h| lower_query.contains(h)) {
        return 1;
    }
    0
}

/// Builds a [`ContextSnippet`] from the catalog.
pub struct ContextBuilder {
    catalog: Arc<dyn CivicCatalog>,
    limits: ContextConfig,
}

impl ContextBuilder {
    /// Create a builder reading from `catalog`, bounded by `limits`.
    pub fn new(catalog: Arc<dyn CivicCatalog>, limits: ContextConfig) -> Self {
        Self { catalog, limits }
    }

    /// Build the context for `query`. Catalog read failures degrade to an
    /// empty section rather than failing the query.
    pub fn build(&self, query: &Query) -> ContextSnippet {
        let programs = self.catalog.list_active_programs().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read programs for context");
            Vec::new()
        });
        let facilities = self.catalog.list_active_facilities().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read facilities for context");
            Vec::new()
        });

        let snippet = ContextSnippet {
            programs: self.rank_programs(programs, query.text()),
            facilities: self.pick_facilities(facilities),
        };
        debug!(
            programs = snippet.programs.len(),
            facilities = snippet.facilities.len(),
            "context built"
        );
        snippet
    }

    fn rank_programs(&self, mut programs: Vec<Program>, query_text: &str) -> Vec<ContextEntry> {
        let lower_query = query_text.to_lowercase();
        // `sort_by_key` is stable: equally relevant programs keep catalog order.
        programs.sort_by_key(|p| Reverse(relevance(p, &lower_query)));

        let max = self.limits.max_field_chars;
        programs
            .into_iter()
            .take(self.limits.max_programs)
            .map(|p| ContextEntry {
                title: truncate(&p.name, max),
                tag: None,
                description: truncate(&p.description, max),
            })
            .collect()
    }

    fn pick_facilities(&self, facilities: Vec<Facility>) -> Vec<ContextEntry> {
        let max = self.limits.max_field_chars;
        facilities
            .into_iter()
            .take(self.limits.max_facilities)
            .map(|f| ContextEntry {
                title: truncate(&f.name, max),
                tag: Some(truncate(&f.kind, max)),
                description: truncate(&f.address, max),
            })
            .collect()
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
fn truncate(value: &str, max_chars: usize) -> String {
    let value = value.trim();
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = value.chars().take(keep).collect();
    out.push_str("...");
    out
}
