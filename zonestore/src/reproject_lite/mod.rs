//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les systèmes rencontrés dans les données ouvertes du Queensland :
//! - WGS84 / GDA94 / GDA2020 géographiques (EPSG:4326, 4283, 7844) - identité
//! - GDA94 / MGA zones 48 à 58 (EPSG:28348-28358)
//! - GDA2020 / MGA zones 46 à 59 (EPSG:7846-7859)
//! - WGS 84 / UTM toutes zones (EPSG:32601-32660, 32701-32760)
//! - Web Mercator (EPSG:3857, 900913, 102100)
//!
//! Cible supportée : WGS84 (EPSG:4326). L'écart entre GDA2020 et WGS84
//! (quelques centimètres à ~1.8 m pour GDA94) est négligé.

mod ellipsoid;
mod mercator;
mod smart;
mod tmerc;

pub use ellipsoid::{Ellipsoid, GRS80, WGS84};
pub use smart::SmartReprojector;
pub use tmerc::Zone;

use geo::{Coord, Geometry, MapCoords};

use crate::error::ReprojectError;
use crate::types::WGS84_EPSG;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }
}

/// Famille de projection d'un EPSG source
#[derive(Debug, Clone, Copy)]
enum SourceCrs {
    /// Coordonnées déjà en degrés (datum assimilé à WGS84)
    Geographic,
    /// UTM / MGA
    TransverseMercator { zone: Zone, ellipsoid: Ellipsoid },
    /// Pseudo-Mercator sphérique
    WebMercator,
}

impl SourceCrs {
    fn from_epsg(epsg: u32) -> Option<Self> {
        let tm = |number: u32, south: bool, ellipsoid: Ellipsoid| {
            Some(Self::TransverseMercator {
                zone: Zone { number, south },
                ellipsoid,
            })
        };

        match epsg {
            4326 | 4283 | 7844 => Some(Self::Geographic),
            28348..=28358 => tm(epsg - 28300, true, GRS80),
            7846..=7859 => tm(epsg - 7800, true, GRS80),
            32601..=32660 => tm(epsg - 32600, false, WGS84),
            32701..=32760 => tm(epsg - 32700, true, WGS84),
            3857 | 900913 | 102100 => Some(Self::WebMercator),
            _ => None,
        }
    }
}

/// Reprojection légère vers WGS84
pub struct ReprojectorLite {
    source_epsg: u32,
    source: SourceCrs,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectError> {
        let source = SourceCrs::from_epsg(source_epsg).filter(|_| target_epsg == WGS84_EPSG);
        let Some(source) = source else {
            return Err(ReprojectError::Unsupported {
                source_epsg,
                target_epsg,
                hint: " by reproject_lite (sources: 4326, 4283, 7844, MGA/UTM, 3857; target: 4326)",
            });
        };

        Ok(Self {
            source_epsg,
            source,
        })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        target == WGS84_EPSG && SourceCrs::from_epsg(source).is_some()
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    /// Transforme un point (x, y) de la source vers (lon, lat) en degrés
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        match self.source {
            SourceCrs::Geographic => (x, y),
            SourceCrs::TransverseMercator { zone, ellipsoid } => {
                tmerc::tmerc_to_geographic(x, y, zone, &ellipsoid).to_degrees()
            }
            SourceCrs::WebMercator => mercator::web_mercator_to_geographic(x, y).to_degrees(),
        }
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, ReprojectError> {
        let out = geom.map_coords(|c| {
            let (x, y) = self.transform_point(c.x, c.y);
            Coord { x, y }
        });
        Ok(out)
    }
}
