//! Chargement d'une couche GeoJSON en mémoire
//!
//! Étapes : parsing → limite optionnelle de lignes → reprojection en WGS84 →
//! filtrage des géométries invalides.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::Geometry;
use geojson::{Feature, GeoJson};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::reproject_lite::SmartReprojector;
use crate::types::{Layer, LoadStats, ZoneRecord, WGS84_EPSG};
use crate::validity;

/// Options de chargement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Nombre maximal de features lues (dans l'ordre du fichier)
    ///
    /// Optimisation avec perte : les zones décrites au-delà de la limite
    /// ne seront jamais trouvées par une requête.
    pub row_limit: Option<usize>,
}

/// Charge une couche depuis un fichier GeoJSON
pub fn load(name: &str, path: &Path, options: &LoadOptions) -> Result<Layer, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let geojson = GeoJson::from_reader(BufReader::new(file))
        .map_err(|e| StoreError::parse(path, e.to_string()))?;

    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|members| members.get("crs"))
                .cloned();
            (fc.features, crs)
        }
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(_) => {
            return Err(StoreError::NotFeatureCollection {
                path: path.to_path_buf(),
            })
        }
    };

    let source_epsg = match crs {
        Some(crs) => crs_epsg(&crs).ok_or_else(|| StoreError::UnknownCrs {
            path: path.to_path_buf(),
            name: crs.to_string(),
        })?,
        None => WGS84_EPSG,
    };

    let layer = build_layer(name, features, source_epsg, options)?;

    info!(
        layer = name,
        path = %path.display(),
        source_epsg = layer.source_epsg,
        kept = layer.stats.kept,
        invalid = layer.stats.skipped_invalid,
        unsupported = layer.stats.skipped_unsupported,
        truncated = layer.stats.truncated,
        "Layer loaded"
    );

    Ok(layer)
}

/// Charge plusieurs couches indépendantes
///
/// Chaque couche a son propre résultat : l'échec de l'une n'empêche pas les autres.
pub fn load_layers<'a, I>(
    layers: I,
    options: &LoadOptions,
) -> BTreeMap<String, Result<Layer, StoreError>>
where
    I: IntoIterator<Item = (&'a str, &'a Path)>,
{
    layers
        .into_iter()
        .map(|(name, path)| (name.to_string(), load(name, path, options)))
        .collect()
}

/// Construit une couche à partir de features déjà parsées
pub fn build_layer(
    name: &str,
    features: Vec<Feature>,
    source_epsg: u32,
    options: &LoadOptions,
) -> Result<Layer, StoreError> {
    let reprojector = SmartReprojector::new(source_epsg, WGS84_EPSG)?;
    debug!(
        layer = name,
        %reprojector,
        "Reprojecting to EPSG:4326"
    );

    let mut stats = LoadStats {
        total: features.len(),
        ..Default::default()
    };

    let limit = options.row_limit.unwrap_or(stats.total).min(stats.total);
    stats.truncated = stats.total - limit;
    if stats.truncated > 0 {
        warn!(
            layer = name,
            row_limit = limit,
            omitted = stats.truncated,
            "Row limit reached: zones beyond the limit will not be queried"
        );
    }

    let mut columns: Vec<String> = Vec::new();
    let mut seen_columns: HashSet<String> = HashSet::new();
    let mut candidates: Vec<ZoneRecord> = Vec::with_capacity(limit);

    for (id, feature) in features.into_iter().take(limit).enumerate() {
        let Some(geometry) = feature.geometry else {
            stats.skipped_unsupported += 1;
            continue;
        };

        let geometry = match Geometry::try_from(geometry) {
            Ok(g @ (Geometry::Polygon(_) | Geometry::MultiPolygon(_))) => g,
            Ok(_) => {
                stats.skipped_unsupported += 1;
                continue;
            }
            Err(e) => {
                debug!(layer = name, id, error = %e, "Unreadable geometry");
                stats.skipped_invalid += 1;
                continue;
            }
        };

        let geometry = reprojector.transform_geometry(&geometry)?;
        let properties = feature.properties.unwrap_or_default();

        for key in properties.keys() {
            if seen_columns.insert(key.clone()) {
                columns.push(key.clone());
            }
        }

        candidates.push(ZoneRecord {
            id,
            geometry,
            properties,
        });
    }

    // Passe de validité en parallèle (l'ordre est conservé par collect)
    let checks: Vec<Result<(), validity::InvalidReason>> = candidates
        .par_iter()
        .map(|record| validity::check(&record.geometry))
        .collect();

    let mut records = Vec::with_capacity(candidates.len());
    for (record, check) in candidates.into_iter().zip(checks) {
        match check {
            Ok(()) => records.push(record),
            Err(reason) => {
                debug!(layer = name, id = record.id, %reason, "Invalid geometry discarded");
                stats.skipped_invalid += 1;
            }
        }
    }
    stats.kept = records.len();

    Ok(Layer {
        name: name.to_string(),
        source_epsg,
        columns,
        records,
        stats,
    })
}

/// Extrait le code EPSG d'un membre `crs` GeoJSON (format 2008)
///
/// Formats reconnus : `EPSG:28356`, `urn:ogc:def:crs:EPSG::28356`,
/// `urn:ogc:def:crs:EPSG:6.3:28356`, `urn:ogc:def:crs:OGC:1.3:CRS84`.
pub fn crs_epsg(crs: &Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    parse_crs_name(name)
}

fn parse_crs_name(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();
    if upper.ends_with("CRS84") {
        return Some(WGS84_EPSG);
    }
    if !upper.contains("EPSG") {
        return None;
    }
    upper.rsplit(':').next()?.parse().ok()
}
