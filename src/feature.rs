//! GeoJSON assembly.
//!
//! One Feature per (notice, boundary polygon) pair. Features follow the
//! order of the records, then the order of the polygons within each record.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::record::{BoundaryPolygon, NoticeRecord};

/// Builds the collection for a whole run.
pub fn assemble(records: &[NoticeRecord]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().flat_map(notice_features).collect(),
        foreign_members: None,
    }
}

/// Features for one notice. Empty when the notice has no polygon.
pub fn notice_features(record: &NoticeRecord) -> Vec<Feature> {
    let properties = properties(record);
    record
        .polygons
        .iter()
        .map(|polygon| polygon_feature(polygon, properties.clone()))
        .collect()
}

fn polygon_feature(polygon: &BoundaryPolygon, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![polygon.ring()]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn properties(record: &NoticeRecord) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("description".into(), json!(record.description));
    props.insert("notam".into(), json!(record.id.as_str()));
    props.insert("dateIssued".into(), json!(record.date_issued));
    props.insert("dateEffective".into(), json!(record.date_effective));
    props.insert("dateExpire".into(), json!(record.date_expire));
    props.insert("upperVal".into(), json!(record.upper_val));
    props.insert("lowerVal".into(), json!(record.lower_val));
    props.insert("facility".into(), json!(record.facility));
    props.insert("type".into(), json!(record.notice_type));
    props
}
