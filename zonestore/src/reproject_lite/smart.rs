//! Choix du moteur de reprojection vers WGS84 au chargement d'une couche
//!
//! Ordre : identité, reproject_lite, puis PROJ si la feature `reproject`
//! est activée.

use std::fmt;

use geo::Geometry;

use super::ReprojectorLite;
use crate::error::ReprojectError;

/// Moteur retenu pour une paire source/cible
pub enum SmartReprojector {
    /// Source déjà dans le système cible
    Identity,
    Lite(ReprojectorLite),
    #[cfg(feature = "reproject")]
    Proj(crate::reproject::Reprojector),
}

impl SmartReprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectError> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }
        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return ReprojectorLite::new(source_epsg, target_epsg).map(Self::Lite);
        }
        Self::fallback(source_epsg, target_epsg)
    }

    #[cfg(feature = "reproject")]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectError> {
        crate::reproject::Reprojector::new(source_epsg, target_epsg).map(Self::Proj)
    }

    #[cfg(not(feature = "reproject"))]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectError> {
        Err(ReprojectError::Unsupported {
            source_epsg,
            target_epsg,
            hint: " (build with --features reproject for PROJ support)",
        })
    }

    /// Reprojette une géométrie (copie inchangée pour l'identité)
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, ReprojectError> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }
}

impl fmt::Display for SmartReprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Lite(_) => f.write_str("reproject_lite"),
            #[cfg(feature = "reproject")]
            Self::Proj(_) => f.write_str("proj"),
        }
    }
}
