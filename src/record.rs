//! Data model shared by the pipeline stages.

use std::fmt;

use serde::Serialize;

/// Normalised notice identifier (`"5/8672"` becomes `"5_8672"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NoticeId(String);

impl NoticeId {
    /// Normalises a raw identifier. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.replace('/', "_")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whatever the listing stage knows about a notice. Every field is optional
/// because listing shapes differ in what they expose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeMetadata {
    pub facility: Option<String>,
    pub state: Option<String>,
    pub notice_type: Option<String>,
    pub description: Option<String>,
}

/// One row of the listing: an identifier plus its listing-stage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedNotice {
    pub id: NoticeId,
    pub metadata: NoticeMetadata,
}

impl ListedNotice {
    pub fn bare(id: NoticeId) -> Self {
        Self {
            id,
            metadata: NoticeMetadata::default(),
        }
    }
}

/// (longitude, latitude) in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

/// One open ring of vertices, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    pub points: Vec<Point>,
}

impl BoundaryPolygon {
    pub fn ring(&self) -> Vec<Vec<f64>> {
        self.points.iter().map(|p| vec![p.lon, p.lat]).collect()
    }
}

/// Document fields that are kept for the CSV summary but never emitted as
/// GeoJSON properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeDetails {
    pub guid: Option<String>,
    pub time_zone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub purpose: Option<String>,
}

/// A fully reconciled notice.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeRecord {
    pub id: NoticeId,
    pub facility: Option<String>,
    pub notice_type: Option<String>,
    pub description: Option<String>,
    pub date_issued: Option<String>,
    pub date_effective: Option<String>,
    /// Expiration timestamp, or the no-expiration sentinel.
    pub date_expire: String,
    /// Upper limit in feet.
    pub upper_val: Option<i64>,
    pub lower_val: Option<i64>,
    pub polygons: Vec<BoundaryPolygon>,
    pub details: NoticeDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_id_replaces_separator() {
        assert_eq!(NoticeId::parse("5/8672").unwrap().as_str(), "5_8672");
        assert_eq!(NoticeId::parse(" 4/3621 ").unwrap().as_str(), "4_3621");
    }

    #[test]
    fn test_notice_id_already_normalised_is_unchanged() {
        assert_eq!(NoticeId::parse("5_8672").unwrap().as_str(), "5_8672");
    }

    #[test]
    fn test_blank_notice_id_rejected() {
        assert!(NoticeId::parse("   ").is_none());
    }

    #[test]
    fn test_ring_is_lon_lat_without_closure() {
        let polygon = BoundaryPolygon {
            points: vec![
                Point { lon: -77.0, lat: 38.0 },
                Point { lon: -76.0, lat: 38.0 },
                Point { lon: -76.0, lat: 39.0 },
            ],
        };
        let ring = polygon.ring();
        assert_eq!(ring.len(), 3);
        assert_eq!(ring[0], vec![-77.0, 38.0]);
    }
}
