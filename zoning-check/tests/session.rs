//! Scénarios de bout en bout contre un serveur local (couches + Nominatim)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use zoning_check::{
    Config, LayerConfig, NominatimGeocoder, OutputOptions, QueryError, QueryInput, Session,
};

#[derive(Clone, Default)]
struct Hits {
    layers: Arc<AtomicUsize>,
    geocoder: Arc<AtomicUsize>,
}

fn square(x0: f64, y0: f64, size: f64) -> Value {
    json!([[
        [x0, y0],
        [x0 + size, y0],
        [x0 + size, y0 + size],
        [x0, y0 + size],
        [x0, y0]
    ]])
}

fn zoning_body() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": square(153.015, -27.480, 0.025) },
                "properties": { "OBJECTID": 1, "ZONE_CODE": "PC1", "ZONE_DESC": "Principal centre (City centre)" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": square(152.90, -27.60, 0.05) },
                "properties": { "OBJECTID": 2, "ZONE_CODE": "LDR", "ZONE_DESC": "Low density residential" }
            }
        ]
    })
}

fn flood_body() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": square(153.02, -27.475, 0.01) },
            "properties": { "OVL2_CAT": "Brisbane River flood planning area 3" }
        }]
    })
}

async fn zoning(State(hits): State<Hits>) -> Json<Value> {
    hits.layers.fetch_add(1, Ordering::SeqCst);
    Json(zoning_body())
}

async fn flood(State(hits): State<Hits>) -> Json<Value> {
    hits.layers.fetch_add(1, Ordering::SeqCst);
    Json(flood_body())
}

async fn missing(State(hits): State<Hits>) -> StatusCode {
    hits.layers.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn search(
    State(hits): State<Hits>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    hits.geocoder.fetch_add(1, Ordering::SeqCst);
    assert_eq!(params.get("format").map(String::as_str), Some("jsonv2"));
    assert_eq!(params.get("limit").map(String::as_str), Some("1"));

    match params.get("q").map(String::as_str) {
        Some("Queen Street Mall, Brisbane") => Json(json!([{
            "lat": "-27.4698",
            "lon": "153.0251",
            "display_name": "Queen Street Mall, Brisbane City, Queensland, 4000, Australia"
        }])),
        _ => Json(json!([])),
    }
}

async fn serve(hits: Hits) -> SocketAddr {
    let app = Router::new()
        .route("/zoning", get(zoning))
        .route("/flood", get(flood))
        .route("/missing", get(missing))
        .route("/search", get(search))
        .with_state(hits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, data_dir: &Path, zoning_route: &str, overlays: &[&str]) -> Config {
    let mut config = Config::from_preset("brisbane").unwrap();
    config.data_dir = data_dir.to_path_buf();
    config.download_timeout_secs = 5;
    config.zoning.url = format!("http://{}{}", addr, zoning_route);
    config.geocoder.base_url = format!("http://{}", addr);
    config.geocoder.country_codes = None;
    for overlay in overlays {
        config.upsert_overlay(LayerConfig::parse_overlay_arg(overlay).unwrap());
    }
    config
}

async fn open(config: &Config) -> Result<Session<NominatimGeocoder>, QueryError> {
    let geocoder = NominatimGeocoder::new(&config.geocoder).unwrap();
    Session::open(config, geocoder).await
}

#[tokio::test]
async fn test_cbd_coordinates_single_zone() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let flood = format!("Flood Risk=http://{}/flood", addr);
    let config = config(addr, dir.path(), "/zoning", &[flood.as_str()]);

    let mut session = open(&config).await.unwrap();
    let outcome = session
        .run(
            QueryInput::Coordinates {
                lon: 153.0251,
                lat: -27.4698,
            },
            &OutputOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.zoning.rows.len(), 1);
    assert_eq!(
        outcome.zoning.rows[0].property_text("ZONE_CODE").as_deref(),
        Some("PC1")
    );
    assert_eq!(outcome.overlays["Flood Risk"].rows.len(), 1);
    assert!(dir.path().join("zoning_data.geojson").exists());
    assert!(dir.path().join("flood_risk.geojson").exists());
}

#[tokio::test]
async fn test_datasets_downloaded_once() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(addr, dir.path(), "/zoning", &[]);

    open(&config).await.unwrap();
    open(&config).await.unwrap();

    assert_eq!(hits.layers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_null_island_no_zoning_and_no_map() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(addr, dir.path(), "/zoning", &[]);
    let outputs = OutputOptions {
        map: Some(dir.path().join("map.png")),
        report: Some(dir.path().join("report.pdf")),
        geojson: None,
    };

    let mut session = open(&config).await.unwrap();
    let outcome = session
        .run(QueryInput::Coordinates { lon: 0.0, lat: 0.0 }, &outputs)
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert!(!dir.path().join("map.png").exists());
    assert!(!dir.path().join("report.pdf").exists());
}

#[tokio::test]
async fn test_address_geocoded_then_queried() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(addr, dir.path(), "/zoning", &[]);
    let outputs = OutputOptions {
        map: Some(dir.path().join("map.png")),
        report: Some(dir.path().join("report.pdf")),
        geojson: None,
    };

    let mut session = open(&config).await.unwrap();
    let outcome = session
        .run(
            QueryInput::Address("Queen Street Mall, Brisbane".into()),
            &outputs,
        )
        .await
        .unwrap();

    assert_eq!(outcome.zoning.rows.len(), 1);
    assert_eq!(hits.geocoder.load(Ordering::SeqCst), 1);
    assert!(std::fs::read(dir.path().join("map.png"))
        .unwrap()
        .starts_with(b"\x89PNG"));
    assert!(std::fs::read(dir.path().join("report.pdf"))
        .unwrap()
        .starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_nonsense_address_is_geocode_miss() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(addr, dir.path(), "/zoning", &[]);

    let mut session = open(&config).await.unwrap();
    let result = session
        .run(
            QueryInput::Address("zzzz qqqq xxxx".into()),
            &OutputOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(QueryError::GeocodeMiss(_))));
    assert_eq!(hits.geocoder.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zoning_404_halts_before_overlays() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let flood = format!("Flood Risk=http://{}/flood", addr);
    let config = config(addr, dir.path(), "/missing", &[flood.as_str()]);

    let result = open(&config).await;

    assert!(matches!(result, Err(QueryError::Network { .. })));
    assert!(!dir.path().join("zoning_data.geojson").exists());
    // Les overlays ne sont pas tentés
    assert_eq!(hits.layers.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("flood_risk.geojson").exists());
}

#[tokio::test]
async fn test_failed_overlay_is_unavailable() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let heritage = format!("Heritage=http://{}/missing", addr);
    let flood = format!("Flood Risk=http://{}/flood", addr);
    let config = config(addr, dir.path(), "/zoning", &[heritage.as_str(), flood.as_str()]);

    let mut session = open(&config).await.unwrap();
    assert_eq!(session.unavailable_overlays(), ["Heritage".to_string()]);

    let outcome = session
        .run(
            QueryInput::Coordinates {
                lon: 153.0251,
                lat: -27.4698,
            },
            &OutputOptions::default(),
        )
        .await
        .unwrap();
    assert!(outcome.overlays.contains_key("Flood Risk"));
    assert!(!outcome.overlays.contains_key("Heritage"));
    assert_eq!(outcome.unavailable_overlays, vec!["Heritage"]);
}

#[tokio::test]
async fn test_corrupt_cached_file_is_parse_error() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("zoning_data.geojson"), b"{not json").unwrap();
    let config = config(addr, dir.path(), "/zoning", &[]);

    let result = open(&config).await;

    assert!(matches!(result, Err(QueryError::Parse { .. })));
    assert_eq!(hits.layers.load(Ordering::SeqCst), 0);
}
