//! Requêtes point-dans-polygone
//!
//! Prédicat `Intersects` : un point sur la frontière d'un polygone est
//! considéré comme contenu.

use std::collections::BTreeMap;

use geo::{BoundingRect, Intersects};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::types::{Layer, MatchResult, QueryPoint};

/// Teste le point contre chaque enregistrement (parcours linéaire)
pub fn query(point: QueryPoint, layer: &Layer) -> MatchResult {
    let p = point.to_point();
    let rows = layer
        .records
        .iter()
        .filter(|r| r.geometry.intersects(&p))
        .cloned()
        .collect();

    MatchResult {
        layer: layer.name.clone(),
        columns: layer.columns.clone(),
        rows,
    }
}

/// Enveloppe d'un enregistrement dans le R-tree
#[derive(Debug, Clone)]
struct IndexedRecord {
    /// Index dans `Layer::records`
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Couche indexée par R-tree pour des requêtes répétées
pub struct IndexedLayer {
    layer: Layer,
    tree: RTree<IndexedRecord>,
}

impl IndexedLayer {
    /// Construit l'index sur les emprises des enregistrements
    pub fn build(layer: Layer) -> Self {
        let indexed: Vec<IndexedRecord> = layer
            .records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                let rect = record.geometry.bounding_rect()?;
                Some(IndexedRecord {
                    idx,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!(
            layer = layer.name.as_str(),
            entries = tree.size(),
            "Spatial index built"
        );

        Self { layer, tree }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn into_layer(self) -> Layer {
        self.layer
    }

    /// Même résultat que [`query`], candidats filtrés par emprise
    pub fn query(&self, point: QueryPoint) -> MatchResult {
        let p = point.to_point();
        let envelope = AABB::from_point([point.lon, point.lat]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|ir| self.layer.records[ir.idx].geometry.intersects(&p))
            .map(|ir| ir.idx)
            .collect();
        // L'ordre du R-tree est arbitraire : on revient à l'ordre du fichier
        hits.sort_unstable();

        debug!(
            layer = self.layer.name.as_str(),
            %point,
            matches = hits.len(),
            "Containment query"
        );

        MatchResult {
            layer: self.layer.name.clone(),
            columns: self.layer.columns.clone(),
            rows: hits
                .into_iter()
                .map(|idx| self.layer.records[idx].clone())
                .collect(),
        }
    }
}

/// Interroge indépendamment chaque couche nommée
pub fn query_layers<'a, I>(point: QueryPoint, layers: I) -> BTreeMap<String, MatchResult>
where
    I: IntoIterator<Item = (&'a String, &'a IndexedLayer)>,
{
    layers
        .into_iter()
        .map(|(name, layer)| (name.clone(), layer.query(point)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LoadStats, ZoneRecord};
    use geo::{polygon, Geometry};
    use serde_json::{json, Map, Value};

    fn record(id: usize, geometry: Geometry, zone: &str) -> ZoneRecord {
        let mut properties = Map::new();
        properties.insert("zone_code".into(), Value::String(zone.into()));
        ZoneRecord {
            id,
            geometry,
            properties,
        }
    }

    fn layer(records: Vec<ZoneRecord>) -> Layer {
        Layer {
            name: "zoning".into(),
            source_epsg: 4326,
            columns: vec!["zone_code".into()],
            stats: LoadStats {
                kept: records.len(),
                total: records.len(),
                ..Default::default()
            },
            records,
        }
    }

    fn unit_square(x0: f64, y0: f64) -> Geometry {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + 1.0, y: y0),
            (x: x0 + 1.0, y: y0 + 1.0),
            (x: x0, y: y0 + 1.0),
        ])
    }

    #[test]
    fn test_inside_outside() {
        let layer = layer(vec![record(0, unit_square(0.0, 0.0), "A")]);
        let inside = QueryPoint::new(0.5, 0.5).unwrap();
        let outside = QueryPoint::new(5.0, 5.0).unwrap();

        assert_eq!(query(inside, &layer).rows.len(), 1);
        assert!(query(outside, &layer).is_empty());
    }

    #[test]
    fn test_boundary_counts_as_match() {
        let layer = layer(vec![record(0, unit_square(0.0, 0.0), "A")]);
        let on_edge = QueryPoint::new(1.0, 0.5).unwrap();
        let on_vertex = QueryPoint::new(0.0, 0.0).unwrap();

        assert_eq!(query(on_edge, &layer).rows.len(), 1);
        assert_eq!(query(on_vertex, &layer).rows.len(), 1);
    }

    #[test]
    fn test_overlapping_polygons_all_returned() {
        let layer = layer(vec![
            record(0, unit_square(0.0, 0.0), "A"),
            record(1, unit_square(0.5, 0.5), "B"),
            record(2, unit_square(3.0, 3.0), "C"),
        ]);
        let index = IndexedLayer::build(layer);

        let result = index.query(QueryPoint::new(0.75, 0.75).unwrap());
        let zones: Vec<String> = result
            .rows
            .iter()
            .filter_map(|r| r.property_text("zone_code"))
            .collect();
        assert_eq!(zones, vec!["A", "B"]);
    }

    #[test]
    fn test_hole_excluded() {
        let with_hole = Geometry::Polygon(polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
            ],
            interiors: [[
                (x: 1.0, y: 1.0),
                (x: 3.0, y: 1.0),
                (x: 3.0, y: 3.0),
                (x: 1.0, y: 3.0),
            ]],
        ));
        let index = IndexedLayer::build(layer(vec![record(0, with_hole, "A")]));

        assert!(index.query(QueryPoint::new(2.0, 2.0).unwrap()).is_empty());
        assert_eq!(index.query(QueryPoint::new(0.5, 2.0).unwrap()).rows.len(), 1);
    }

    #[test]
    fn test_index_matches_linear_scan() {
        let records = (0..20)
            .map(|i| {
                let x = (i % 5) as f64 * 0.6;
                let y = (i / 5) as f64 * 0.6;
                record(i, unit_square(x, y), &format!("Z{}", i))
            })
            .collect();
        let layer = layer(records);
        let index = IndexedLayer::build(layer.clone());

        for (lon, lat) in [(0.1, 0.1), (0.7, 0.7), (1.2, 1.9), (2.9, 2.5), (10.0, 10.0)] {
            let point = QueryPoint::new(lon, lat).unwrap();
            let linear: Vec<usize> = query(point, &layer).rows.iter().map(|r| r.id).collect();
            let indexed: Vec<usize> = index.query(point).rows.iter().map(|r| r.id).collect();
            assert_eq!(linear, indexed, "point ({}, {})", lon, lat);
        }
    }

    #[test]
    fn test_query_layers() {
        let mut layers = BTreeMap::new();
        layers.insert(
            "Flood".to_string(),
            IndexedLayer::build(layer(vec![record(0, unit_square(0.0, 0.0), "F")])),
        );
        layers.insert(
            "Heritage".to_string(),
            IndexedLayer::build(layer(vec![record(0, unit_square(5.0, 5.0), "H")])),
        );

        let results = query_layers(QueryPoint::new(0.5, 0.5).unwrap(), &layers);
        assert_eq!(results.len(), 2);
        assert_eq!(results["Flood"].rows.len(), 1);
        assert!(results["Heritage"].is_empty());
        assert_eq!(
            results["Flood"].rows[0].properties.get("zone_code"),
            Some(&json!("F"))
        );
    }
}
