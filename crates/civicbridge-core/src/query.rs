//! The query a citizen submits, validated once at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors from constructing a [`Query`] or [`GeoPoint`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("query text must not be empty")]
    EmptyText,

    #[error("language tag must not be empty")]
    EmptyLanguage,

    #[error("user id must not be empty")]
    EmptyUser,

    #[error("invalid coordinates: lat {lat}, lon {lon}")]
    InvalidLocation { lat: f64, lon: f64 },
}

/// A WGS84 coordinate pair.
///
/// Deserialization goes through [`GeoPoint::new`], so seed files and stored
/// records cannot carry out-of-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = QueryError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl GeoPoint {
    /// Create a point, rejecting NaN and out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, QueryError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(QueryError::InvalidLocation { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// How the query reached us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryChannel {
    #[default]
    Voice,
    Text,
}

impl fmt::Display for QueryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryChannel::Voice => write!(f, "VOICE"),
            QueryChannel::Text => write!(f, "TEXT"),
        }
    }
}

/// A citizen query. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: String,
    language_tag: String,
    user_id: String,
    channel: QueryChannel,
    location: Option<GeoPoint>,
}

impl Query {
    /// Create a voice query without a location.
    pub fn new(
        text: impl Into<String>,
        language_tag: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let text = text.into().trim().to_string();
        let language_tag = language_tag.into().trim().to_string();
        let user_id = user_id.into().trim().to_string();

        if text.is_empty() {
            return Err(QueryError::EmptyText);
        }
        if language_tag.is_empty() {
            return Err(QueryError::EmptyLanguage);
        }
        if user_id.is_empty() {
            return Err(QueryError::EmptyUser);
        }

        Ok(Self {
            text,
            language_tag,
            user_id,
            channel: QueryChannel::default(),
            location: None,
        })
    }

    /// Attach the caller's location.
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the submission channel.
    pub fn with_channel(mut self, channel: QueryChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Trimmed query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Language of the query, e.g. `hi-IN`.
    pub fn language_tag(&self) -> &str {
        &self.language_tag
    }

    /// Id of the asking user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// How the query was captured.
    pub fn channel(&self) -> QueryChannel {
        self.channel
    }

    /// Caller location, if shared.
    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_and_validates() {
        let query = Query::new("  hospital near me ", "en", "42").unwrap();
        assert_eq!(query.text(), "hospital near me");
        assert_eq!(query.channel(), QueryChannel::Voice);
        assert!(query.location().is_none());
    }

    #[test]
    fn test_query_rejects_blank_fields() {
        assert_eq!(Query::new("   ", "en", "1"), Err(QueryError::EmptyText));
        assert_eq!(Query::new("jobs", "", "1"), Err(QueryError::EmptyLanguage));
        assert_eq!(Query::new("jobs", "en", " "), Err(QueryError::EmptyUser));
    }

    #[test]
    fn test_geopoint_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(12.97, 77.59).is_ok());
    }

    #[test]
    fn test_distance_km() {
        let bangalore = GeoPoint::new(12.9716, 77.5946).unwrap();
        let mysore = GeoPoint::new(12.2958, 76.6394).unwrap();
        let d = bangalore.distance_km(&mysore);
        assert!((125.0..130.0).contains(&d), "got {d}");
        assert!(bangalore.distance_km(&bangalore) < 1e-9);
    }

    #[test]
    fn test_channel_serializes_uppercase() {
        let json = serde_json::to_string(&QueryChannel::Text).unwrap();
        assert_eq!(json, "\"TEXT\"");
        assert_eq!(QueryChannel::Voice.to_string(), "VOICE");
    }

    #[test]
    fn test_geopoint_deserialize_validates_range() {
        let point: GeoPoint = serde_json::from_str(r#"{"lat": 12.97, "lon": 77.59}"#).unwrap();
        assert_eq!(point, GeoPoint::new(12.97, 77.59).unwrap());

        let err = serde_json::from_str::<GeoPoint>(r#"{"lat": 95.0, "lon": 0.0}"#).unwrap_err();
        assert!(err.to_string().contains("invalid coordinates"));
    }
}
