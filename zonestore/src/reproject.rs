//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`. Il sert de
//! repli à `SmartReprojector` pour les EPSG inconnus de reproject_lite.

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use proj::Proj;

use crate::error::ReprojectError;

/// Reprojection de géométries entre deux systèmes de coordonnées
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    ///
    /// `new_known_crs` normalise l'ordre des axes (lon, lat) pour EPSG:4326.
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, ReprojectError> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).map_err(|e| {
            ReprojectError::Transform(format!(
                "Failed to create projection from {} to {}: {}",
                source, target, e
            ))
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    /// Retourne le SRID source
    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    /// Retourne le SRID cible
    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une géométrie surfacique ou ponctuelle
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, ReprojectError> {
        match geom {
            Geometry::Point(p) => {
                let (x, y) = self
                    .proj
                    .convert((p.x(), p.y()))
                    .map_err(|e| ReprojectError::Transform(e.to_string()))?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::Polygon(p) => Ok(Geometry::Polygon(self.transform_polygon(p)?)),
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>, ReprojectError> =
                    mp.0.iter().map(|p| self.transform_polygon(p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            Geometry::LineString(_) => Err(ReprojectError::GeometryType("LineString")),
            Geometry::MultiLineString(_) => Err(ReprojectError::GeometryType("MultiLineString")),
            Geometry::MultiPoint(_) => Err(ReprojectError::GeometryType("MultiPoint")),
            Geometry::GeometryCollection(_) => {
                Err(ReprojectError::GeometryType("GeometryCollection"))
            }
            Geometry::Line(_) => Err(ReprojectError::GeometryType("Line")),
            Geometry::Rect(_) => Err(ReprojectError::GeometryType("Rect")),
            Geometry::Triangle(_) => Err(ReprojectError::GeometryType("Triangle")),
        }
    }

    /// Transforme une LineString (batch conversion)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString, ReprojectError> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        // Transformation batch - beaucoup plus rapide que point par point
        self.proj
            .convert_array(&mut coords)
            .map_err(|e| ReprojectError::Transform(e.to_string()))?;

        Ok(LineString::new(
            coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
        ))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon, ReprojectError> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>, ReprojectError> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mga56_to_wgs84() {
        let reprojector = Reprojector::new(28356, 4326).unwrap();

        let brisbane = Geometry::Point(Point::new(502480.0, 6961535.0));
        let Geometry::Point(p) = reprojector.transform_geometry(&brisbane).unwrap() else {
            panic!("Expected Point geometry");
        };
        assert!((p.x() - 153.0251).abs() < 0.01, "lon={}", p.x());
        assert!((p.y() - (-27.4698)).abs() < 0.01, "lat={}", p.y());
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}
