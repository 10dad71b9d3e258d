//! Catalog fixtures.

use civicbridge_core::{CatalogError, CivicCatalog, Facility, GeoPoint, InMemoryCatalog, Program};

/// Where the sample facilities cluster (central Bengaluru).
pub fn sample_origin() -> GeoPoint {
    GeoPoint { lat: 12.9716, lon: 77.5946 }
}

/// A small catalog covering every rule-based topic, with two facilities near
/// [`sample_origin`] and one far away.
pub fn sample_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(
        vec![
            Program::new(
                "PM-KISAN Income Support",
                "Direct income support for small and marginal farmers.",
                "AGRICULTURE",
            ),
            Program::new(
                "Crop Insurance Scheme",
                "Insurance against crop failure due to natural calamities.",
                "AGRICULTURE",
            ),
            Program::new(
                "Post-Matric Scholarship",
                "Tuition and maintenance support for students.",
                "EDUCATION",
            ),
            Program::new(
                "Rural Skill Training",
                "Free vocational training with placement support.",
                "EMPLOYMENT",
            ),
        ],
        vec![
            Facility::new("Primary Health Centre", "CLINIC", "Market Road")
                .at(GeoPoint { lat: 12.9720, lon: 77.5950 }),
            Facility::new("District Hospital", "HOSPITAL", "Station Road")
                .at(GeoPoint { lat: 12.9900, lon: 77.6100 }),
            Facility::new("Mysuru Medical College", "HOSPITAL", "Irwin Road")
                .at(GeoPoint { lat: 12.3100, lon: 76.6500 }),
        ],
    )
}

/// A catalog whose reads always fail.
#[derive(Debug, Default)]
pub struct FailingCatalog;

impl CivicCatalog for FailingCatalog {
    fn list_active_programs(&self) -> Result<Vec<Program>, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }

    fn list_active_facilities(&self) -> Result<Vec<Facility>, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }
}
