use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geojson::{GeoJson, Geometry, Value};
use reqwest::{Request, Response};
use tfr_geojson::config::{ListingFormat, RetryPolicy, Settings};
use tfr_geojson::error::TfrError;
use tfr_geojson::fetch::{BasicClient, HttpClient};
use tfr_geojson::output::write_geojson;
use tfr_geojson::pipeline::{
    PipelineReport, archive_documents, build_feature_collection, collect_records,
};

const LIST_URL: &str = "https://tfr.test/tfrapi/exportTfrList";
const HTML_LIST_URL: &str = "https://tfr.test/tfr2/list.html";
const DETAIL_TEMPLATE: &str = "https://tfr.test/download/detail_{}.xml";

/// Serves canned bodies by exact URL; anything unknown is a 404.
#[derive(Default)]
struct StubClient {
    routes: HashMap<String, (u16, String)>,
}

impl StubClient {
    fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(url.to_string(), (status, body.to_string()));
        self
    }

    fn detail(self, id: &str, body: &str) -> Self {
        let url = DETAIL_TEMPLATE.replace("{}", id);
        self.route(&url, 200, body)
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let (status, body) = self
            .routes
            .get(req.url().as_str())
            .cloned()
            .unwrap_or((404, String::new()));
        let resp = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(Response::from(resp))
    }
}

/// Canned routes first, everything else over real HTTP.
struct Hybrid {
    stub: StubClient,
    real: BasicClient,
}

impl Hybrid {
    fn new(stub: StubClient, timeout: Duration) -> Self {
        Self {
            stub,
            real: BasicClient::new(timeout, timeout).unwrap(),
        }
    }
}

#[async_trait]
impl HttpClient for Hybrid {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        if self.stub.routes.contains_key(req.url().as_str()) {
            self.stub.execute(req).await
        } else {
            self.real.execute(req).await
        }
    }
}

/// Accepts connections and never answers them.
async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

/// Address of a port that was just released, so connecting is refused.
fn refused_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn unreachable_detail_run(base: &str, timeout: Duration) -> PipelineReport {
    let template = format!("{base}/detail_{{}}.xml");
    let stub = StubClient::default()
        .route(
            LIST_URL,
            200,
            r#"[{"notam_id": "1/1"}, {"notam_id": "1/2"}, {"notam_id": "1/3"}]"#,
        )
        .route(&template.replace("{}", "1_1"), 200, &flat_detail("1/1", 40.0));

    let mut settings = settings(ListingFormat::Json);
    settings.detail_url_template = template;

    collect_records(Arc::new(Hybrid::new(stub, timeout)), &settings)
        .await
        .unwrap()
}

fn settings(format: ListingFormat) -> Settings {
    let mut settings = Settings::for_format(format);
    settings.list_url = match format {
        ListingFormat::Json => LIST_URL.to_string(),
        ListingFormat::HtmlTable | ListingFormat::DetailLinks => HTML_LIST_URL.to_string(),
    };
    settings.detail_url_template = DETAIL_TEMPLATE.to_string();
    settings.retry = RetryPolicy::none();
    settings.concurrency = 3;
    settings
}

fn flat_detail(id: &str, lat: f64) -> String {
    format!(
        "<XNOTAM-Update><Group><Add><Not>\
           <NotUid><txtLocalName>{id}</txtLocalName></NotUid>\
           <abdMergedArea>\
             <Avx><geoLat>{lat}N</geoLat><geoLong>100.0W</geoLong></Avx>\
             <Avx><geoLat>{lat}N</geoLat><geoLong>101.0W</geoLong></Avx>\
             <Avx><geoLat>{}N</geoLat><geoLong>100.5W</geoLong></Avx>\
           </abdMergedArea>\
         </Not></Add></Group></XNOTAM-Update>",
        lat + 0.5
    )
}

fn notams(collection: &geojson::FeatureCollection) -> Vec<String> {
    collection
        .features
        .iter()
        .map(|f| f.properties.as_ref().unwrap()["notam"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_single_notice_end_to_end() {
    let client = StubClient::default()
        .route(LIST_URL, 200, r#"[{"notam_id": "5/8672"}]"#)
        .detail("5_8672", include_str!("fixtures/detail_5_8672.xml"));

    let settings = settings(ListingFormat::Json);
    let (collection, report) = build_feature_collection(Arc::new(client), &settings)
        .await
        .unwrap();

    assert_eq!(report.listed, 1);
    assert_eq!(report.records.len(), 1);
    assert_eq!(collection.features.len(), 1);

    let props = collection.features[0].properties.as_ref().unwrap();
    assert_eq!(props["notam"], "5_8672");
    assert_eq!(props["facility"], "ZDC");
    assert_eq!(props["type"], "VIP");
    assert_eq!(props["upperVal"], 18000);
    assert_eq!(props["lowerVal"], 0);
    assert_eq!(props["dateIssued"], "2025-03-01T12:00:00");
    assert_eq!(props["dateEffective"], "2025-03-02T14:00:00");
    assert_eq!(props["dateExpire"], "PERM");

    let Some(Geometry { value: Value::Polygon(rings), .. }) = &collection.features[0].geometry
    else {
        panic!("expected a polygon");
    };
    assert_eq!(rings.len(), 1);
    assert_eq!(rings[0].len(), 4);
    assert_eq!(rings[0][0], vec![-77.05, 38.90]);
}

#[tokio::test]
async fn test_missing_detail_is_skipped_not_fatal() {
    let client = StubClient::default()
        .route(LIST_URL, 200, r#"[{"notam_id": "1/100"}, {"notamNumber": "1/200"}]"#)
        .detail("1_100", &flat_detail("1/100", 40.0));

    let settings = settings(ListingFormat::Json);
    let (collection, report) = build_feature_collection(Arc::new(client), &settings)
        .await
        .unwrap();

    assert_eq!(notams(&collection), vec!["1_100"]);
    assert_eq!(report.listed, 2);
    assert_eq!(report.documents, 1);
    assert_eq!(report.skips.count("detail_status"), 1);
}

#[tokio::test]
async fn test_server_error_and_malformed_detail_are_skipped() {
    let client = StubClient::default()
        .route(
            LIST_URL,
            200,
            r#"[{"notam_id": "1/1"}, {"notam_id": "1/2"}, {"notam_id": "1/3"}]"#,
        )
        .route(&DETAIL_TEMPLATE.replace("{}", "1_1"), 503, "")
        .detail("1_2", "<Not><unclosed></Not>")
        .detail("1_3", &flat_detail("1/3", 41.0));

    let report = collect_records(Arc::new(client), &settings(ListingFormat::Json))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].id.as_str(), "1_3");
    assert_eq!(report.skips.count("detail_status"), 1);
    assert_eq!(report.skips.count("malformed_document"), 1);
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let client = StubClient::default().route(LIST_URL, 500, "oops");

    let result = build_feature_collection(Arc::new(client), &settings(ListingFormat::Json)).await;

    assert!(matches!(
        result,
        Err(TfrError::ListingStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_listing_order_survives_concurrency() {
    let ids: Vec<String> = (1..=12).map(|n| format!("7/{n}")).collect();
    let listing = serde_json::to_string(
        &ids.iter()
            .map(|id| serde_json::json!({ "notam_id": id }))
            .collect::<Vec<_>>(),
    )
    .unwrap();

    let mut client = StubClient::default().route(LIST_URL, 200, &listing);
    for (i, id) in ids.iter().enumerate() {
        client = client.detail(&id.replace('/', "_"), &flat_detail(id, 30.0 + i as f64));
    }

    let settings = settings(ListingFormat::Json);
    let (collection, _) = build_feature_collection(Arc::new(client), &settings)
        .await
        .unwrap();

    let expected: Vec<String> = ids.iter().map(|id| id.replace('/', "_")).collect();
    assert_eq!(notams(&collection), expected);
}

#[tokio::test]
async fn test_html_table_metadata_wins_over_legacy_document() {
    let client = StubClient::default()
        .route(HTML_LIST_URL, 200, include_str!("fixtures/list.html"))
        .detail("4_3621", include_str!("fixtures/detail_legacy.xml"))
        .detail("5_8672", include_str!("fixtures/detail_5_8672.xml"));

    let (collection, report) =
        build_feature_collection(Arc::new(client), &settings(ListingFormat::HtmlTable))
            .await
            .unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(notams(&collection), vec!["4_3621", "5_8672"]);

    let legacy = collection.features[0].properties.as_ref().unwrap();
    assert_eq!(legacy["facility"], "ZLA");
    assert_eq!(legacy["type"], "HAZARDS");
    assert_eq!(
        legacy["description"],
        "Los Angeles, CA, Friday, February 21, 2025 UTC"
    );
    assert_eq!(legacy["dateEffective"], "2025-02-21T15:00:00");
    assert_eq!(legacy["dateExpire"], "2025-02-21T23:00:00");
    assert_eq!(legacy["upperVal"], 3000);
    assert!(legacy["lowerVal"].is_null());

    let flat = collection.features[1].properties.as_ref().unwrap();
    assert_eq!(flat["description"], "Washington, DC");
}

#[tokio::test]
async fn test_detail_links_listing() {
    let client = StubClient::default()
        .route(HTML_LIST_URL, 200, include_str!("fixtures/list.html"))
        .detail("5_8672", include_str!("fixtures/detail_5_8672.xml"));

    let report = collect_records(Arc::new(client), &settings(ListingFormat::DetailLinks))
        .await
        .unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.records.len(), 1);
    // No listing metadata in this shape, so the document supplies it.
    assert_eq!(
        report.records[0].description.as_deref(),
        Some("Washington, DC, Sunday, March 02, 2025 UTC")
    );
    assert_eq!(report.records[0].details.city.as_deref(), Some("WASHINGTON"));
}

#[tokio::test]
async fn test_written_file_round_trips() {
    let client = StubClient::default()
        .route(LIST_URL, 200, r#"[{"notam_id": "5/8672"}, {"notam_id": "1/3"}]"#)
        .detail("5_8672", include_str!("fixtures/detail_5_8672.xml"))
        .detail("1_3", &flat_detail("1/3", 41.0));

    let settings = settings(ListingFormat::Json);
    let (collection, _) = build_feature_collection(Arc::new(client), &settings)
        .await
        .unwrap();

    let path = std::env::temp_dir().join("tfr_geojson_it_roundtrip.geojson");
    let _ = fs::remove_file(&path);
    write_geojson(&path, &collection, false).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let GeoJson::FeatureCollection(parsed) = text.parse::<GeoJson>().unwrap() else {
        panic!("expected a FeatureCollection");
    };
    assert_eq!(parsed.features.len(), collection.features.len());
    for (a, b) in parsed.features.iter().zip(&collection.features) {
        assert_eq!(a.geometry, b.geometry);
        assert_eq!(a.properties, b.properties);
    }

    fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_archive_saves_and_skips_existing() {
    let dir = std::env::temp_dir().join("tfr_geojson_it_archive");
    let _ = fs::remove_dir_all(&dir);

    let client = Arc::new(
        StubClient::default()
            .route(LIST_URL, 200, r#"[{"notam_id": "5/8672"}, {"notam_id": "9/9"}]"#)
            .detail("5_8672", include_str!("fixtures/detail_5_8672.xml")),
    );
    let settings = settings(ListingFormat::Json);

    let first = archive_documents(Arc::clone(&client), &settings, &dir)
        .await
        .unwrap();
    assert_eq!(first.saved, 1);
    assert_eq!(first.skips.count("detail_status"), 1);
    assert!(dir.join("detail_5_8672.xml").exists());

    let second = archive_documents(client, &settings, &dir).await.unwrap();
    assert_eq!(second.saved, 0);
    assert_eq!(second.already_present, 1);

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_detail_timeout_is_skipped_not_fatal() {
    let base = silent_server().await;
    let report = unreachable_detail_run(&base, Duration::from_millis(300)).await;

    assert_eq!(report.listed, 3);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].id.as_str(), "1_1");
    assert_eq!(report.skips.count("timeout"), 2);
}

#[tokio::test]
async fn test_refused_connection_is_skipped_not_fatal() {
    let base = refused_address();
    let report = unreachable_detail_run(&base, Duration::from_secs(5)).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].id.as_str(), "1_1");
    assert_eq!(report.skips.count("transport"), 2);
}

/// Panics when asked for one particular URL.
struct Panicking {
    stub: StubClient,
    poisoned: String,
}

#[async_trait]
impl HttpClient for Panicking {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        if req.url().as_str() == self.poisoned {
            panic!("client blew up on {}", self.poisoned);
        }
        self.stub.execute(req).await
    }
}

#[tokio::test]
async fn test_panicking_task_is_counted_as_skip() {
    let stub = StubClient::default()
        .route(
            LIST_URL,
            200,
            r#"[{"notam_id": "1/1"}, {"notam_id": "1/2"}, {"notam_id": "1/3"}]"#,
        )
        .detail("1_1", &flat_detail("1/1", 40.0))
        .detail("1_3", &flat_detail("1/3", 41.0));
    let client = Panicking {
        stub,
        poisoned: DETAIL_TEMPLATE.replace("{}", "1_2"),
    };

    let report = collect_records(Arc::new(client), &settings(ListingFormat::Json))
        .await
        .unwrap();

    let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1_1", "1_3"]);
    assert_eq!(report.skips.count("task_failed"), 1);
    assert_eq!(report.skips.total(), 1);
}
