//! Read-only access to the civic catalog (programs and healthcare facilities).
//!
//! The catalog itself is owned by the surrounding CRUD backend. This module
//! defines the narrow [`CivicCatalog`] read interface the orchestration layer
//! consumes, plus an [`InMemoryCatalog`] that can be seeded from a TOML file.
//!
//! ## Seed file example
//!
//! ```toml
//! [[programs]]
//! name = "PM-KISAN Income Support"
//! description = "Direct income support for small and marginal farmers."
//! category = "AGRICULTURE"
//!
//! [[facilities]]
//! name = "District Hospital"
//! type = "HOSPITAL"
//! address = "Station Road"
//! location = { lat = 12.97, lon = 77.59 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::query::GeoPoint;

/// A government program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub description: String,
    /// Category such as `AGRICULTURE`, `EDUCATION`, `EMPLOYMENT`, `HEALTHCARE`.
    pub category: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Program {
    /// An active program.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
            active: true,
        }
    }

    /// Case-insensitive category comparison.
    pub fn in_category(&self, category: &str) -> bool {
        self.category.eq_ignore_ascii_case(category)
    }
}

/// A healthcare facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    /// Facility type such as `HOSPITAL`, `CLINIC`, `VACCINATION_CENTER`.
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Facility {
    /// An active facility without coordinates.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            address: address.into(),
            location: None,
            active: true,
        }
    }

    /// Attach coordinates.
    pub fn at(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }
}

fn default_active() -> bool {
    true
}

/// Errors from catalog reads.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog seed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Synchronous read interface over the civic catalog.
pub trait CivicCatalog: Send + Sync {
    /// All programs currently marked active, in source order.
    fn list_active_programs(&self) -> Result<Vec<Program>, CatalogError>;

    /// All facilities currently marked active, in source order.
    fn list_active_facilities(&self) -> Result<Vec<Facility>, CatalogError>;
}

/// Programs of one category, preserving order.
pub fn programs_in_category<'a>(programs: &'a [Program], category: &str) -> Vec<&'a Program> {
    programs.iter().filter(|p| p.in_category(category)).collect()
}

/// Facilities within `radius_km` of `origin`, closest first.
///
/// Facilities without coordinates are never "nearby".
pub fn nearby_facilities<'a>(
    facilities: &'a [Facility],
    origin: &GeoPoint,
    radius_km: f64,
) -> Vec<(f64, &'a Facility)> {
    let mut found: Vec<(f64, &Facility)> = facilities
        .iter()
        .filter_map(|f| f.location.map(|loc| (origin.distance_km(&loc), f)))
        .filter(|(d, _)| *d <= radius_km)
        .collect();
    found.sort_by(|a, b| a.0.total_cmp(&b.0));
    found
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSeed {
    #[serde(default)]
    programs: Vec<Program>,
    #[serde(default)]
    facilities: Vec<Facility>,
}

/// A catalog held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    programs: Vec<Program>,
    facilities: Vec<Facility>,
}

impl InMemoryCatalog {
    /// Create a catalog from explicit lists.
    pub fn new(programs: Vec<Program>, facilities: Vec<Facility>) -> Self {
        Self {
            programs,
            facilities,
        }
    }

    /// Parse a seed document with `[[programs]]` and `[[facilities]]` tables.
    pub fn from_toml(s: &str) -> Result<Self, CatalogError> {
        let seed: CatalogSeed = toml::from_str(s)?;
        Ok(Self::new(seed.programs, seed.facilities))
    }

    /// Load a seed file using async I/O.
    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }
}

impl CivicCatalog for InMemoryCatalog {
    fn list_active_programs(&self) -> Result<Vec<Program>, CatalogError> {
        Ok(self.programs.iter().filter(|p| p.active).cloned().collect())
    }

    fn list_active_facilities(&self) -> Result<Vec<Facility>, CatalogError> {
        Ok(self.facilities.iter().filter(|f| f.active).cloned().collect())
    }
}
