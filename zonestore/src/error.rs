//! Types d'erreurs pour le crate zonestore

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs du cache de datasets (téléchargement)
#[derive(Debug, Error)]
pub enum CacheError {
    /// Le serveur a répondu autre chose que 200
    #[error("HTTP {status} while downloading {url}")]
    Status { url: String, status: u16 },

    /// Erreur réseau (connexion, DNS, timeout, lecture du corps)
    #[error("Network error while downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Erreur d'I/O locale (création du fichier, renommage)
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Impossible de construire le client HTTP
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl CacheError {
    pub(crate) fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Erreurs de chargement d'une couche
#[derive(Debug, Error)]
pub enum StoreError {
    /// Fichier illisible
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GeoJSON malformé
    #[error("Parse error in {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// Document GeoJSON valide mais qui n'est pas une collection de features
    #[error("Unsupported GeoJSON document in {}: expected a FeatureCollection", .path.display())]
    NotFeatureCollection { path: PathBuf },

    /// Système de coordonnées non reconnu dans le membre `crs`
    #[error("Unknown CRS in {}: {name}", .path.display())]
    UnknownCrs { path: PathBuf, name: String },

    /// Reprojection impossible
    #[error(transparent)]
    Reproject(#[from] ReprojectError),
}

impl StoreError {
    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Erreurs de reprojection
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// Couple source/cible non pris en charge
    #[error("Reprojection EPSG:{source_epsg} → EPSG:{target_epsg} not supported{hint}")]
    Unsupported {
        source_epsg: u32,
        target_epsg: u32,
        hint: &'static str,
    },

    /// Échec de la transformation d'une coordonnée
    #[error("Coordinate transformation failed: {0}")]
    Transform(String),

    /// Type de géométrie non transformable
    #[error("Unsupported geometry type for reprojection: {0}")]
    GeometryType(&'static str),
}

/// Coordonnées hors du domaine WGS84
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Coordinates out of range: lon={lon}, lat={lat} (expected lon in [-180, 180], lat in [-90, 90])")]
pub struct InvalidPoint {
    pub lon: f64,
    pub lat: f64,
}
