//! Notice field extraction.
//!
//! The detail document has shipped in three shapes: namespaced XML with the
//! schedule inside a `ScheduleGroup`, flat XML without namespaces, and flat
//! XML whose identity fields only exist in the listing. Every lookup below
//! matches on local element names, so namespace prefixes never matter, and
//! each field is resolved from an ordered list of locations: listing
//! metadata first, then document paths in precedence order.

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};

use crate::config::ExtractionDefaults;
use crate::coords::{parse_latitude, parse_longitude};
use crate::error::Skip;
use crate::record::{BoundaryPolygon, ListedNotice, NoticeDetails, NoticeId, NoticeRecord, Point};

/// Outcome of extracting one notice element.
pub type Extraction = Result<NoticeRecord, Skip>;

/// A field location: a chain of element names, the first matched anywhere
/// below the notice and each following one as a direct child.
type Path = &'static [&'static str];

const NOTICE: &str = "Not";
const LOCAL_NAME: &[Path] = &[&["NotUid", "txtLocalName"]];
const DATE_ISSUED: &[Path] = &[&["NotUid", "dateIssued"]];
const FACILITY: &[Path] = &[&["codeFacility"]];
const NOTICE_TYPE: &[Path] = &[&["TfrNot", "codeType"], &["codeType"]];
const DESCRIPTION: &[Path] = &[&["txtDescrTraditional"]];
const GUID: &[Path] = &[&["NotUid", "codeGUID"]];
const TIME_ZONE: &[Path] = &[&["codeTimeZone"]];
const CITY: &[Path] = &[&["AffLocGroup", "txtNameCity"]];
const STATE: &[Path] = &[&["AffLocGroup", "txtNameUSState"]];
const PURPOSE: &[Path] = &[&["txtDescrPurpose"]];

const SCHEDULE: &[Path] = &[&["ScheduleGroup"]];
const TIME_SEPARATE: &[Path] = &[&["isTimeSeparate"]];
const START_TIME: &[Path] = &[&["startTime"]];
const END_TIME: &[Path] = &[&["endTime"]];
const DATE_EFFECTIVE: &[Path] = &[&["dateEffective"]];
const DATE_EXPIRE: &[Path] = &[&["dateExpire"]];

const ALTITUDE_BLOCK: &[Path] = &[&["TFRAreaGroup", "aseTFRArea"], &["aseTFRArea"]];
const UPPER_VAL: &[Path] = &[&["valDistVerUpper"]];
const LOWER_VAL: &[Path] = &[&["valDistVerLower"]];
const UPPER_UNIT: &[Path] = &[&["uomDistVerUpper"]];

const AREA: &str = "abdMergedArea";
const VERTEX: &str = "Avx";
const LATITUDE: &[Path] = &[&["geoLat"]];
const LONGITUDE: &[Path] = &[&["geoLong"]];

/// Parses one detail document into one extraction per notice element.
///
/// `listed` carries the listing-stage identity and metadata; its values take
/// precedence over the document's. A document that does not parse, or holds
/// no notice at all, is a document-level [`Skip`].
pub fn extract_notices(
    xml: &str,
    listed: Option<&ListedNotice>,
    defaults: &ExtractionDefaults,
) -> Result<Vec<Extraction>, Skip> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml.trim_start_matches('\u{feff}'), options)
        .map_err(|e| Skip::MalformedDocument(e.to_string()))?;

    let notices: Vec<Node> = doc
        .descendants()
        .filter(|n| is_named(n, NOTICE))
        .collect();
    if notices.is_empty() {
        return Err(Skip::NoNotices);
    }

    Ok(notices
        .into_iter()
        .enumerate()
        .map(|(index, notice)| {
            let extraction = extract_notice(notice, listed, defaults);
            if let Err(skip) = &extraction {
                warn!(index, reason = %skip, "Notice skipped");
            }
            extraction
        })
        .collect())
}

fn extract_notice(
    notice: Node,
    listed: Option<&ListedNotice>,
    defaults: &ExtractionDefaults,
) -> Extraction {
    let id = listed
        .map(|l| l.id.clone())
        .or_else(|| first_text(notice, LOCAL_NAME).and_then(|raw| NoticeId::parse(&raw)))
        .ok_or(Skip::MissingIdentity)?;
    let metadata = listed.map(|l| &l.metadata);

    let facility = metadata
        .and_then(|m| m.facility.clone())
        .or_else(|| first_text(notice, FACILITY));
    let notice_type = metadata
        .and_then(|m| m.notice_type.clone())
        .or_else(|| first_text(notice, NOTICE_TYPE));
    let description = metadata
        .and_then(|m| m.description.clone())
        .or_else(|| first_text(notice, DESCRIPTION));

    let (date_effective, date_expire) = validity(notice);
    let (upper_val, lower_val) = vertical_limits(notice, defaults);
    let polygons = boundary_polygons(notice, &id);

    let details = NoticeDetails {
        guid: first_text(notice, GUID),
        time_zone: first_text(notice, TIME_ZONE),
        city: first_text(notice, CITY),
        state: metadata
            .and_then(|m| m.state.clone())
            .or_else(|| first_text(notice, STATE)),
        purpose: first_text(notice, PURPOSE),
    };

    Ok(NoticeRecord {
        date_issued: first_text(notice, DATE_ISSUED),
        date_effective,
        date_expire: date_expire.unwrap_or_else(|| defaults.sentinel_no_expiration.clone()),
        id,
        facility,
        notice_type,
        description,
        upper_val,
        lower_val,
        polygons,
        details,
    })
}

/// Effective and expiration timestamps.
///
/// With `isTimeSeparate = TRUE` the window comes from `startTime`/`endTime`
/// only. Otherwise the schedule block is searched first, then the whole notice.
fn validity(notice: Node) -> (Option<String>, Option<String>) {
    let schedule = first_node(notice, SCHEDULE);
    let scope = schedule.unwrap_or(notice);

    let time_separate = first_text(scope, TIME_SEPARATE)
        .or_else(|| first_text(notice, TIME_SEPARATE))
        .is_some_and(|flag| flag.eq_ignore_ascii_case("TRUE"));

    if time_separate {
        return (first_text(scope, START_TIME), first_text(scope, END_TIME));
    }

    let lookup = |paths: &[Path]| {
        schedule
            .and_then(|s| first_text(s, paths))
            .or_else(|| first_text(notice, paths))
    };
    (lookup(DATE_EFFECTIVE), lookup(DATE_EXPIRE))
}

/// Upper and lower limits in feet. Only the upper limit is scaled when its
/// unit is a flight level.
fn vertical_limits(notice: Node, defaults: &ExtractionDefaults) -> (Option<i64>, Option<i64>) {
    let Some(block) = first_node(notice, ALTITUDE_BLOCK) else {
        return (None, None);
    };

    let upper = first_text(block, UPPER_VAL).and_then(|v| parse_altitude(&v));
    let lower = first_text(block, LOWER_VAL).and_then(|v| parse_altitude(&v));
    let flight_level =
        first_text(block, UPPER_UNIT).is_some_and(|unit| unit == defaults.flight_level_unit_code);

    let upper = if flight_level {
        upper.map(|v| v.saturating_mul(defaults.flight_level_multiplier))
    } else {
        upper
    };
    (upper, lower)
}

fn parse_altitude(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// One polygon per boundary area with at least one complete vertex.
fn boundary_polygons(notice: Node, id: &NoticeId) -> Vec<BoundaryPolygon> {
    let mut polygons = Vec::new();
    for (index, area) in descendants_named(notice, AREA).enumerate() {
        let mut dropped = 0usize;
        let points: Vec<Point> = descendants_named(area, VERTEX)
            .filter_map(|avx| {
                let lat = first_text(avx, LATITUDE).and_then(|t| parse_latitude(&t));
                let lon = first_text(avx, LONGITUDE).and_then(|t| parse_longitude(&t));
                let point = lat.zip(lon).map(|(lat, lon)| Point { lon, lat });
                if point.is_none() {
                    dropped += 1;
                }
                point
            })
            .collect();

        if dropped > 0 {
            debug!(notam = %id, area = index, dropped, "Dropped incomplete vertices");
        }
        if points.is_empty() {
            debug!(notam = %id, area = index, "Boundary area has no valid vertex");
            continue;
        }
        polygons.push(BoundaryPolygon { points });
    }
    polygons
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Elements named `name` strictly below `scope`, in document order.
fn descendants_named<'a, 'input>(
    scope: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    scope.descendants().skip(1).filter(move |n| is_named(n, name))
}

/// Every node matching `path` below `scope`, in document order.
fn locate<'a, 'input>(scope: Node<'a, 'input>, path: Path) -> Vec<Node<'a, 'input>> {
    let Some((head, rest)) = path.split_first() else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for start in descendants_named(scope, *head) {
        collect_children(start, rest, &mut found);
    }
    found
}

fn collect_children<'a, 'input>(
    node: Node<'a, 'input>,
    rest: Path,
    out: &mut Vec<Node<'a, 'input>>,
) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(node);
        return;
    };
    for child in node.children().filter(|c| is_named(c, *head)) {
        collect_children(child, tail, out);
    }
}

fn first_node<'a, 'input>(scope: Node<'a, 'input>, paths: &[Path]) -> Option<Node<'a, 'input>> {
    paths
        .iter()
        .find_map(|path| locate(scope, path).into_iter().next())
}

/// First non-blank text found at any of `paths`, tried in order.
fn first_text(scope: Node, paths: &[Path]) -> Option<String> {
    paths.iter().find_map(|path| {
        locate(scope, path).into_iter().find_map(|node| {
            node.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
        })
    })
}
