//! Export GeoJSON des correspondances d'une requête (geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use zonestore::{slugify, ZoneRecord};

use crate::session::QueryOutcome;

/// Erreurs d'export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geometry encoding failed: {0}")]
    Geometry(#[from] geozero::error::GeozeroError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Écrit toutes les correspondances (zonage puis overlays) dans un fichier
///
/// Retourne le nombre de features écrites.
pub fn export_matches(outcome: &QueryOutcome, output_path: &Path) -> Result<usize, ExportError> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);

    let count = write_matches(&mut writer, outcome)?;
    writer.flush()?;

    info!(path = %output_path.display(), features = count, "Matches exported");
    Ok(count)
}

/// Écrit la FeatureCollection des correspondances
pub fn write_matches<W: Write>(writer: &mut W, outcome: &QueryOutcome) -> Result<usize, ExportError> {
    write!(writer, r#"{{"type":"FeatureCollection","features":["#)?;

    let mut count = 0;
    for result in std::iter::once(&outcome.zoning).chain(outcome.overlays.values()) {
        for record in &result.rows {
            if count > 0 {
                write!(writer, ",")?;
            }
            write_feature(writer, &result.layer, record)?;
            count += 1;
        }
    }

    write!(writer, "]}}")?;
    Ok(count)
}

/// Écrit une feature, avec sa couche d'origine en propriété `layer`
fn write_feature<W: Write>(writer: &mut W, layer: &str, record: &ZoneRecord) -> Result<(), ExportError> {
    let id = format!("{}.{}", slugify(layer), record.id);
    write!(writer, r#"{{"type":"Feature","id":"#)?;
    serde_json::to_writer(&mut *writer, &id)?;

    // Geometry via geozero
    write!(writer, r#","geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    record.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    let mut properties = Map::with_capacity(record.properties.len() + 1);
    properties.insert("layer".to_string(), Value::String(layer.to_string()));
    for (key, value) in &record.properties {
        if key != "layer" {
            properties.insert(key.clone(), value.clone());
        }
    }
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &properties)?;
    write!(writer, "}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PointSource;
    use geo::{polygon, Geometry};
    use serde_json::json;
    use std::collections::BTreeMap;
    use zonestore::{MatchResult, QueryPoint};

    fn record(id: usize, zone: &str) -> ZoneRecord {
        let mut properties = Map::new();
        properties.insert("ZONE_CODE".into(), json!(zone));
        properties.insert("NOTE".into(), json!("quote \" and \\ backslash"));
        ZoneRecord {
            id,
            geometry: Geometry::Polygon(polygon![
                (x: 153.0, y: -27.5),
                (x: 153.1, y: -27.5),
                (x: 153.1, y: -27.4),
                (x: 153.0, y: -27.4),
            ]),
            properties,
        }
    }

    fn outcome() -> QueryOutcome {
        let mut overlays = BTreeMap::new();
        overlays.insert(
            "Flood Risk".to_string(),
            MatchResult {
                layer: "Flood Risk".into(),
                columns: vec!["ZONE_CODE".into()],
                rows: vec![record(3, "FLOOD")],
            },
        );
        overlays.insert(
            "Heritage".to_string(),
            MatchResult {
                layer: "Heritage".into(),
                columns: vec![],
                rows: vec![],
            },
        );

        QueryOutcome {
            point: QueryPoint::new(153.05, -27.45).unwrap(),
            source: PointSource::Coordinates,
            zoning: MatchResult {
                layer: "Zoning Data".into(),
                columns: vec!["ZONE_CODE".into(), "NOTE".into()],
                rows: vec![record(0, "PC1"), record(7, "SP")],
            },
            overlays,
            unavailable_overlays: vec![],
        }
    }

    #[test]
    fn test_write_matches() {
        let mut buffer = Vec::new();
        let count = write_matches(&mut buffer, &outcome()).unwrap();
        assert_eq!(count, 3);

        let value: Value = serde_json::from_slice(&buffer).unwrap();
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0]["id"], "zoning_data.0");
        assert_eq!(features[0]["properties"]["layer"], "Zoning Data");
        assert_eq!(features[0]["properties"]["NOTE"], "quote \" and \\ backslash");
        assert_eq!(features[0]["geometry"]["type"], "Polygon");
        assert_eq!(features[2]["properties"]["layer"], "Flood Risk");
        assert_eq!(features[2]["id"], "flood_risk.3");
    }

    #[test]
    fn test_export_matches_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.geojson");

        assert_eq!(export_matches(&outcome(), &path).unwrap(), 3);
        let content = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][1]["properties"]["ZONE_CODE"], "SP");
    }
}
