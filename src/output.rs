//! Output persistence: the GeoJSON file and the CSV notice summary.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use geojson::FeatureCollection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::TfrError;
use crate::record::NoticeRecord;

/// Writes the collection as pretty-printed UTF-8 JSON, gzip-compressed when
/// `gzip` is set.
pub fn write_geojson(
    path: &Path,
    collection: &FeatureCollection,
    gzip: bool,
) -> Result<(), TfrError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = BufWriter::new(File::create(path)?);

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, collection)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = file;
        serde_json::to_writer_pretty(&mut writer, collection)?;
        writer.flush()?;
    }

    info!(
        path = %path.display(),
        features = collection.features.len(),
        gzip,
        "GeoJSON written"
    );
    Ok(())
}

/// One CSV row per notice.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub notam: String,
    pub guid: Option<String>,
    pub date_issued: Option<String>,
    pub date_effective: Option<String>,
    pub date_expire: String,
    pub time_zone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub facility: Option<String>,
    #[serde(rename = "type")]
    pub notice_type: Option<String>,
    pub purpose: Option<String>,
    pub polygons: usize,
    pub generated_at: DateTime<Utc>,
}

impl SummaryRow {
    pub fn from_record(record: &NoticeRecord, generated_at: DateTime<Utc>) -> Self {
        Self {
            notam: record.id.to_string(),
            guid: record.details.guid.clone(),
            date_issued: record.date_issued.clone(),
            date_effective: record.date_effective.clone(),
            date_expire: record.date_expire.clone(),
            time_zone: record.details.time_zone.clone(),
            city: record.details.city.clone(),
            state: record.details.state.clone(),
            facility: record.facility.clone(),
            notice_type: record.notice_type.clone(),
            purpose: record.details.purpose.clone(),
            polygons: record.polygons.len(),
            generated_at,
        }
    }
}

/// Appends one row per record to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summary(path: &Path, records: &[NoticeRecord]) -> Result<(), TfrError> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV summary");

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    let generated_at = Utc::now();
    for record in records {
        writer.serialize(SummaryRow::from_record(record, generated_at))?;
    }
    writer.flush()?;

    Ok(())
}
