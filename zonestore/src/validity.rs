//! Contrôle de validité des géométries chargées
//!
//! Deux passes : structure des rings (nombre de points, fermeture, coordonnées
//! finies), puis validité OGC via `geo::Validation` (auto-intersections,
//! trous hors de l'extérieur, polygones qui se chevauchent dans un multi).

use geo::{Geometry, LineString, Polygon, Validation};

/// Raison du rejet d'une géométrie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Ni Polygon ni MultiPolygon
    NotAreal,
    /// MultiPolygon sans polygone
    Empty,
    /// Ring avec moins de 4 points ou non fermé
    DegenerateRing,
    /// Coordonnée NaN ou infinie
    NonFinite,
    /// Auto-intersection ou arrangement de rings invalide
    Topology,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::NotAreal => "not a polygon",
            Self::Empty => "empty multipolygon",
            Self::DegenerateRing => "degenerate ring",
            Self::NonFinite => "non-finite coordinate",
            Self::Topology => "self-intersection or invalid ring arrangement",
        };
        f.write_str(msg)
    }
}

/// Vérifie une géométrie surfacique
pub fn check(geom: &Geometry) -> Result<(), InvalidReason> {
    match geom {
        Geometry::Polygon(p) => polygon_structure(p)?,
        Geometry::MultiPolygon(mp) => {
            if mp.0.is_empty() {
                return Err(InvalidReason::Empty);
            }
            for p in &mp.0 {
                polygon_structure(p)?;
            }
        }
        _ => return Err(InvalidReason::NotAreal),
    }

    if geom.is_valid() {
        Ok(())
    } else {
        Err(InvalidReason::Topology)
    }
}

/// Raccourci booléen
pub fn is_valid(geom: &Geometry) -> bool {
    check(geom).is_ok()
}

fn polygon_structure(p: &Polygon) -> Result<(), InvalidReason> {
    ring_structure(p.exterior())?;
    for ring in p.interiors() {
        ring_structure(ring)?;
    }
    Ok(())
}

fn ring_structure(ring: &LineString) -> Result<(), InvalidReason> {
    // LinearRing: >= 4 points, first == last
    if ring.0.len() < 4 {
        return Err(InvalidReason::DegenerateRing);
    }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(InvalidReason::NonFinite);
    }
    match (ring.0.first(), ring.0.last()) {
        (Some(a), Some(b)) if a == b => Ok(()),
        _ => Err(InvalidReason::DegenerateRing),
    }
}
