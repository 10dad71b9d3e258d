//! Keyword-driven fallback provider.
//!
//! Answers straight from the catalog without any remote call, so it is
//! always enabled and normally sits last in the registry.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::BoxFuture;
use crate::catalog::{CivicCatalog, nearby_facilities, programs_in_category};
use crate::context::ContextSnippet;
use crate::query::Query;

use super::{Provider, ProviderError};

/// Radius for the "facilities near you" answer.
pub const NEARBY_RADIUS_KM: f64 = 10.0;

pub const HELP_MESSAGE: &str = "I can help you find government programs, healthcare facilities, \
scholarships, and job training opportunities. What would you like to know about?";

/// What a query is about, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Programs,
    Healthcare,
    Education,
    Employment,
    Other,
}

impl Topic {
    /// Keyword classification, first match wins.
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has(&["subsidy", "subsidies", "program"]) {
            Topic::Programs
        } else if has(&["hospital", "healthcare", "vaccination"]) {
            Topic::Healthcare
        } else if has(&["scholarship", "education"]) {
            Topic::Education
        } else if has(&["job", "training", "skill", "employment"]) {
            Topic::Employment
        } else {
            Topic::Other
        }
    }
}

/// Catalog-backed provider named `"RuleBased"`.
pub struct RuleBasedProvider {
    name: String,
    catalog: Arc<dyn CivicCatalog>,
}

impl RuleBasedProvider {
    /// Create a provider reading from `catalog`.
    pub fn new(catalog: Arc<dyn CivicCatalog>) -> Self {
        Self {
            name: "RuleBased".to_string(),
            catalog,
        }
    }

    /// Register under a different name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Produce the answer for `query`. Never fails: catalog errors become
    /// an apology.
    pub fn answer(&self, query: &Query) -> String {
        let topic = Topic::classify(query.text());
        debug!(provider = %self.name, ?topic, "rule-based classification");

        match topic {
            Topic::Programs => self.program_answer(
                "AGRICULTURE",
                |n, name| format!("I found {n} agricultural programs available. The top program is: {name}"),
                "I couldn't find any agricultural programs at the moment. Please check back later.",
                "I'm having trouble accessing the program database right now.",
            ),
            Topic::Healthcare => self.healthcare_answer(query),
            Topic::Education => self.program_answer(
                "EDUCATION",
                |n, name| format!("I found {n} education programs. Check out: {name}"),
                "I couldn't find any education programs at the moment.",
                "I'm having trouble accessing educational programs right now.",
            ),
            Topic::Employment => self.program_answer(
                "EMPLOYMENT",
                |n, name| format!("I found {n} employment programs. Featured program: {name}"),
                "I couldn't find any job training programs at the moment.",
                "I'm having trouble accessing job programs right now.",
            ),
            Topic::Other => HELP_MESSAGE.to_string(),
        }
    }

    fn program_answer(
        &self,
        category: &str,
        found: impl Fn(usize, &str) -> String,
        none: &str,
        unavailable: &str,
    ) -> String {
        let programs = match self.catalog.list_active_programs() {
            Ok(programs) => programs,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "catalog read failed");
                return unavailable.to_string();
            }
        };
        let matching = programs_in_category(&programs, category);
        match matching.first() {
            Some(top) => found(matching.len(), &top.name),
            None => none.to_string(),
        }
    }

    fn healthcare_answer(&self, query: &Query) -> String {
        let Some(origin) = query.location() else {
            return "Please enable location services to find nearby healthcare facilities."
                .to_string();
        };
        let facilities = match self.catalog.list_active_facilities() {
            Ok(facilities) => facilities,
            Err(e) => {
                warn!(provider = %self.name, error = %e, "catalog read failed");
                return "I'm having trouble accessing the healthcare database right now.".to_string();
            }
        };
        let nearby = nearby_facilities(&facilities, &origin, NEARBY_RADIUS_KM);
        match nearby.first() {
            Some((_, closest)) => format!(
                "I found {} healthcare facilities near you. The closest is: {} at {}",
                nearby.len(),
                closest.name,
                closest.address
            ),
            None => format!(
                "I couldn't find any healthcare facilities within {NEARBY_RADIUS_KM} km of your location."
            ),
        }
    }
}

impl Provider for RuleBasedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn uses_context(&self) -> bool {
        false
    }

    fn process<'a>(
        &'a self,
        query: &'a Query,
        _context: &'a ContextSnippet,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move { Ok(self.answer(query)) })
    }
}
