//! Types de données pour le crate zonestore

use std::path::{Path, PathBuf};

use geo::Geometry;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::InvalidPoint;

/// EPSG de travail : toutes les couches chargées sont dans ce système
pub const WGS84_EPSG: u32 = 4326;

/// Identifie une couche distante téléchargeable (zonage ou overlay)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    /// Nom affiché de la couche (ex: "Zoning Data", "Flood Risk")
    pub name: String,

    /// URL de téléchargement (FeatureServer `query?f=geojson` ou export direct)
    pub url: String,

    /// Chemin du fichier en cache
    pub local_path: PathBuf,
}

impl DatasetDescriptor {
    /// Crée un descripteur dont le fichier local est dérivé du nom
    /// (`data_dir/<slug>.geojson`)
    pub fn new(name: impl Into<String>, url: impl Into<String>, data_dir: &Path) -> Self {
        let name = name.into();
        let local_path = data_dir.join(format!("{}.geojson", slugify(&name)));
        Self {
            name,
            url: url.into(),
            local_path,
        }
    }

    /// Crée un descripteur avec un chemin local explicite
    pub fn with_path(
        name: impl Into<String>,
        url: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            local_path: local_path.into(),
        }
    }
}

/// Nom de fichier déterministe : minuscules, espaces et tirets → `_`
///
/// Les autres caractères non alphanumériques sont supprimés.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Point de requête en WGS84 (longitude, latitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryPoint {
    pub lon: f64,
    pub lat: f64,
}

impl QueryPoint {
    /// Valide et crée un point
    pub fn new(lon: f64, lat: f64) -> Result<Self, InvalidPoint> {
        let in_range = lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        if in_range {
            Ok(Self { lon, lat })
        } else {
            Err(InvalidPoint { lon, lat })
        }
    }

    pub fn to_point(self) -> geo::Point {
        geo::Point::new(self.lon, self.lat)
    }
}

impl std::fmt::Display for QueryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

/// Un enregistrement (géométrie + attributs) d'une couche
#[derive(Debug, Clone, Serialize)]
pub struct ZoneRecord {
    /// Position de la feature dans le fichier source
    pub id: usize,

    /// Géométrie en WGS84 (Polygon ou MultiPolygon)
    #[serde(skip)]
    pub geometry: Geometry,

    /// Attributs, dans l'ordre du fichier source
    pub properties: Map<String, Value>,
}

impl ZoneRecord {
    /// Valeur d'un attribut formatée pour affichage
    ///
    /// Les chaînes sont rendues sans guillemets, `null` devient une chaîne vide.
    pub fn property_text(&self, key: &str) -> Option<String> {
        self.properties.get(key).map(value_text)
    }
}

/// Formate une valeur JSON pour affichage
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compteurs de chargement d'une couche
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Features présentes dans le fichier
    pub total: usize,
    /// Features ignorées à cause de `row_limit`
    pub truncated: usize,
    /// Features sans géométrie ou non surfaciques
    pub skipped_unsupported: usize,
    /// Géométries invalides écartées
    pub skipped_invalid: usize,
    /// Enregistrements retenus
    pub kept: usize,
}

/// Collection de géométries chargée en mémoire, toujours en WGS84
#[derive(Debug, Clone)]
pub struct Layer {
    /// Nom de la couche
    pub name: String,

    /// EPSG détecté dans le fichier source
    pub source_epsg: u32,

    /// Colonnes d'attributs, dans l'ordre de première apparition
    pub columns: Vec<String>,

    /// Enregistrements valides
    pub records: Vec<ZoneRecord>,

    /// Compteurs de chargement
    pub stats: LoadStats,
}

impl Layer {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Résultat d'une requête de contenance sur une couche
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    /// Nom de la couche interrogée
    pub layer: String,

    /// Colonnes d'attributs de la couche
    pub columns: Vec<String>,

    /// Enregistrements contenant le point, dans l'ordre du fichier
    pub rows: Vec<ZoneRecord>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&ZoneRecord> {
        self.rows.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Zoning Data"), "zoning_data");
        assert_eq!(slugify("Flood Risk - River"), "flood_risk_river");
        assert_eq!(slugify("  Heritage  "), "heritage");
        assert_eq!(slugify("Bushfire (2024)"), "bushfire_2024");
    }

    #[test]
    fn test_descriptor_path() {
        let d = DatasetDescriptor::new("Zoning Data", "http://example.invalid", Path::new("data"));
        assert_eq!(d.local_path, Path::new("data").join("zoning_data.geojson"));
    }

    #[test]
    fn test_query_point_range() {
        assert!(QueryPoint::new(153.0251, -27.4698).is_ok());
        assert!(QueryPoint::new(181.0, 0.0).is_err());
        assert!(QueryPoint::new(0.0, -90.5).is_err());
        assert!(QueryPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::String("LMR2".into())), "LMR2");
        assert_eq!(value_text(&Value::Null), "");
        assert_eq!(value_text(&serde_json::json!(12.5)), "12.5");
    }
}
