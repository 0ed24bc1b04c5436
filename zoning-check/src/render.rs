//! Rendu cartographique (plotters)
//!
//! Polygones de zonage colorés par catégorie, overlays en contour, point
//! interrogé marqué d'un disque et d'une croix. Aucun texte n'est dessiné :
//! le rendu ne dépend d'aucune police et deux rendus identiques produisent
//! les mêmes octets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use geo::{BoundingRect, Geometry, Intersects, LineString, Rect};
use plotters::coord::Shift;
use plotters::drawing::{DrawingArea, DrawingAreaErrorKind};
use plotters::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use zonestore::{Layer, QueryPoint};

/// Erreurs de rendu
#[derive(Debug, Error)]
pub enum RenderError {
    /// Extension de fichier non gérée
    #[error("Unsupported map format '{0}' (use .png or .svg)")]
    Format(String),

    /// Dimensions nulles
    #[error("Invalid map size {width}x{height}")]
    Size { width: u32, height: u32 },

    /// Erreur du backend de dessin
    #[error("Drawing failed: {0}")]
    Draw(String),
}

/// Paramètres de rendu
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,

    /// Demi-largeur de la vue autour du point, en degrés
    pub view_radius: Option<f64>,

    /// Attribut de catégorie du zonage
    pub category_field: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            view_radius: None,
            category_field: None,
        }
    }
}

/// Palette des catégories de zonage
const ZONE_PALETTE: [RGBColor; 12] = [
    RGBColor(141, 211, 199),
    RGBColor(255, 255, 179),
    RGBColor(190, 186, 218),
    RGBColor(251, 128, 114),
    RGBColor(128, 177, 211),
    RGBColor(253, 180, 98),
    RGBColor(179, 222, 105),
    RGBColor(252, 205, 229),
    RGBColor(217, 217, 217),
    RGBColor(188, 128, 189),
    RGBColor(204, 235, 197),
    RGBColor(255, 237, 111),
];

/// Couleurs de contour des overlays
const OVERLAY_PALETTE: [RGBColor; 6] = [
    RGBColor(31, 120, 180),
    RGBColor(227, 26, 28),
    RGBColor(51, 160, 44),
    RGBColor(106, 61, 154),
    RGBColor(255, 127, 0),
    RGBColor(177, 89, 40),
];

const UNCATEGORISED: RGBColor = RGBColor(200, 200, 200);
const EDGE: RGBColor = RGBColor(90, 90, 90);
const MARKER: RGBColor = RGBColor(220, 0, 0);

/// Premier attribut dont le nom contient "zone" (insensible à la casse)
pub fn detect_category_field(columns: &[String]) -> Option<String> {
    columns
        .iter()
        .find(|c| c.to_lowercase().contains("zone"))
        .cloned()
}

type Ring = Vec<(f64, f64)>;

/// Géométries projetées sur la vue, prêtes à dessiner
struct Scene {
    view: Rect<f64>,
    /// (anneau extérieur, index de palette) ; `None` = sans catégorie
    fills: Vec<(Ring, Option<usize>)>,
    /// Tous les anneaux du zonage (extérieurs et trous)
    edges: Vec<Ring>,
    /// Anneaux de chaque overlay, dans l'ordre des couches
    overlays: Vec<Vec<Ring>>,
    point: (f64, f64),
}

impl Scene {
    fn build(
        zoning: &Layer,
        overlays: &[&Layer],
        point: QueryPoint,
        options: &RenderOptions,
    ) -> Self {
        let view = view_rect(zoning, point, options);
        let view_geom = Geometry::Rect(view);

        let field = options
            .category_field
            .clone()
            .or_else(|| detect_category_field(&zoning.columns));

        // Catégories triées : une même valeur a toujours la même couleur
        let categories: BTreeMap<String, usize> = match &field {
            Some(f) => zoning
                .records
                .iter()
                .filter_map(|r| r.property_text(f))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .enumerate()
                .map(|(pos, cat)| (cat, pos % ZONE_PALETTE.len()))
                .collect(),
            None => BTreeMap::new(),
        };

        let mut fills = Vec::new();
        let mut edges = Vec::new();
        for record in zoning
            .records
            .iter()
            .filter(|r| r.geometry.intersects(&view_geom))
        {
            let palette_idx = field
                .as_ref()
                .and_then(|f| record.property_text(f))
                .and_then(|cat| categories.get(&cat).copied());

            for_each_polygon(&record.geometry, |exterior, interiors| {
                fills.push((ring(exterior), palette_idx));
                edges.push(ring(exterior));
                edges.extend(interiors.iter().map(ring));
            });
        }

        let overlays = overlays
            .iter()
            .map(|layer| {
                let mut rings = Vec::new();
                for record in layer
                    .records
                    .iter()
                    .filter(|r| r.geometry.intersects(&view_geom))
                {
                    for_each_polygon(&record.geometry, |exterior, interiors| {
                        rings.push(ring(exterior));
                        rings.extend(interiors.iter().map(ring));
                    });
                }
                rings
            })
            .collect();

        Self {
            view,
            fills,
            edges,
            overlays,
            point: (point.lon, point.lat),
        }
    }
}

fn for_each_polygon<F>(geometry: &Geometry, mut f: F)
where
    F: FnMut(&LineString, &[LineString]),
{
    match geometry {
        Geometry::Polygon(p) => f(p.exterior(), p.interiors()),
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                f(p.exterior(), p.interiors());
            }
        }
        _ => {}
    }
}

fn ring(line: &LineString) -> Ring {
    line.coords().map(|c| (c.x, c.y)).collect()
}

/// Emprise affichée : fenêtre autour du point ou emprise du zonage,
/// élargie pour respecter le rapport largeur/hauteur de l'image
fn view_rect(zoning: &Layer, point: QueryPoint, options: &RenderOptions) -> Rect<f64> {
    let (lon, lat) = (point.lon, point.lat);

    let (mut min_x, mut min_y, mut max_x, mut max_y) = match options.view_radius {
        Some(r) if r > 0.0 => (lon - r, lat - r, lon + r, lat + r),
        _ => {
            let extent = zoning
                .records
                .iter()
                .filter_map(|r| r.geometry.bounding_rect())
                .fold(None::<(f64, f64, f64, f64)>, |acc, rect| {
                    let (x0, y0, x1, y1) = acc.unwrap_or((
                        rect.min().x,
                        rect.min().y,
                        rect.max().x,
                        rect.max().y,
                    ));
                    Some((
                        x0.min(rect.min().x),
                        y0.min(rect.min().y),
                        x1.max(rect.max().x),
                        y1.max(rect.max().y),
                    ))
                });
            match extent {
                // Le point reste toujours visible
                Some((x0, y0, x1, y1)) => (x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat)),
                None => (lon - 0.01, lat - 0.01, lon + 0.01, lat + 0.01),
            }
        }
    };

    // Marge de 5 %, minimum pour un zonage réduit à un point
    let pad_x = ((max_x - min_x) * 0.05).max(1e-4);
    let pad_y = ((max_y - min_y) * 0.05).max(1e-4);
    min_x -= pad_x;
    max_x += pad_x;
    min_y -= pad_y;
    max_y += pad_y;

    // Un degré de longitude vaut cos(lat) degré de latitude au sol
    let scale = ((min_y + max_y) / 2.0).to_radians().cos().max(0.01);
    let ground_w = (max_x - min_x) * scale;
    let ground_h = max_y - min_y;
    let target = options.width as f64 / options.height as f64;

    if ground_w / ground_h < target {
        let half = ground_h * target / scale / 2.0;
        let cx = (min_x + max_x) / 2.0;
        min_x = cx - half;
        max_x = cx + half;
    } else {
        let half = ground_w / target / 2.0;
        let cy = (min_y + max_y) / 2.0;
        min_y = cy - half;
        max_y = cy + half;
    }

    Rect::new((min_x, min_y), (max_x, max_y))
}

fn draw_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Draw(e.to_string())
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, scene: &Scene) -> Result<(), RenderError> {
    root.fill(&WHITE).map_err(draw_err)?;

    let (min, max) = (scene.view.min(), scene.view.max());
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .build_cartesian_2d(min.x..max.x, min.y..max.y)
        .map_err(draw_err)?;

    chart
        .draw_series(scene.fills.iter().map(|(pts, idx)| {
            let color = idx.map(|i| ZONE_PALETTE[i]).unwrap_or(UNCATEGORISED);
            Polygon::new(pts.clone(), color.mix(0.7).filled())
        }))
        .map_err(draw_err)?;

    chart
        .draw_series(
            scene
                .edges
                .iter()
                .map(|pts| PathElement::new(pts.clone(), EDGE.stroke_width(1))),
        )
        .map_err(draw_err)?;

    for (i, rings) in scene.overlays.iter().enumerate() {
        let color = OVERLAY_PALETTE[i % OVERLAY_PALETTE.len()];
        chart
            .draw_series(
                rings
                    .iter()
                    .map(|pts| PathElement::new(pts.clone(), color.stroke_width(2))),
            )
            .map_err(draw_err)?;
    }

    chart
        .draw_series(std::iter::once(Circle::new(scene.point, 6, MARKER.filled())))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Cross::new(
            scene.point,
            9,
            BLACK.stroke_width(2),
        )))
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

fn check_size(options: &RenderOptions) -> Result<(), RenderError> {
    if options.width == 0 || options.height == 0 {
        return Err(RenderError::Size {
            width: options.width,
            height: options.height,
        });
    }
    Ok(())
}

/// Dessine la carte dans un fichier PNG ou SVG (selon l'extension)
pub fn render(
    zoning: &Layer,
    overlays: &[&Layer],
    point: QueryPoint,
    options: &RenderOptions,
    path: &Path,
) -> Result<(), RenderError> {
    check_size(options)?;
    let scene = Scene::build(zoning, overlays, point, options);
    let size = (options.width, options.height);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    debug!(
        path = %path.display(),
        polygons = scene.fills.len(),
        overlays = scene.overlays.len(),
        "Rendering map"
    );

    match ext.as_str() {
        "png" => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw(&root, &scene)?;
        }
        "svg" => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw(&root, &scene)?;
        }
        other => return Err(RenderError::Format(other.to_string())),
    }

    info!(path = %path.display(), "Map saved");
    Ok(())
}

/// Dessine la carte en SVG, en mémoire
pub fn render_svg_string(
    zoning: &Layer,
    overlays: &[&Layer],
    point: QueryPoint,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    check_size(options)?;
    let scene = Scene::build(zoning, overlays, point, options);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw(&root, &scene)?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use serde_json::{Map, Value};
    use zonestore::{LoadStats, ZoneRecord};

    fn square(id: usize, x: f64, y: f64, zone: &str) -> ZoneRecord {
        let mut properties = Map::new();
        properties.insert("ZONE_CODE".into(), Value::String(zone.into()));
        ZoneRecord {
            id,
            geometry: Geometry::Polygon(polygon![
                (x: x, y: y),
                (x: x + 0.01, y: y),
                (x: x + 0.01, y: y + 0.01),
                (x: x, y: y + 0.01),
            ]),
            properties,
        }
    }

    fn layer(name: &str, records: Vec<ZoneRecord>) -> Layer {
        Layer {
            name: name.into(),
            source_epsg: 4326,
            columns: vec!["ZONE_CODE".into()],
            stats: LoadStats::default(),
            records,
        }
    }

    fn brisbane() -> Layer {
        layer(
            "Zoning Data",
            vec![
                square(0, 153.02, -27.47, "PC1"),
                square(1, 153.06, -27.47, "LDR"),
                square(2, 153.02, -27.52, "PC1"),
            ],
        )
    }

    #[test]
    fn test_detect_category_field() {
        let columns = vec!["OBJECTID".to_string(), "Zone_Code".to_string(), "ZONE_DESC".to_string()];
        assert_eq!(detect_category_field(&columns).as_deref(), Some("Zone_Code"));
        assert_eq!(detect_category_field(&["OBJECTID".to_string()]), None);
    }

    #[test]
    fn test_same_category_same_color() {
        let scene = Scene::build(
            &brisbane(),
            &[],
            QueryPoint::new(153.025, -27.465).unwrap(),
            &RenderOptions::default(),
        );
        // Catégories triées : LDR = 0, PC1 = 1
        let idx: Vec<Option<usize>> = scene.fills.iter().map(|(_, i)| *i).collect();
        assert_eq!(idx, vec![Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn test_palette_wraps_past_last_color() {
        let records = (0..ZONE_PALETTE.len() + 2)
            .map(|i| square(i, 153.0 + i as f64 * 0.02, -27.47, &format!("Z{:02}", i)))
            .collect();
        let scene = Scene::build(
            &layer("Zoning Data", records),
            &[],
            QueryPoint::new(153.005, -27.465).unwrap(),
            &RenderOptions::default(),
        );

        let idx: Vec<Option<usize>> = scene.fills.iter().map(|(_, i)| *i).collect();
        assert_eq!(idx.len(), ZONE_PALETTE.len() + 2);
        assert_eq!(idx[ZONE_PALETTE.len()], Some(0));
        assert_eq!(idx[ZONE_PALETTE.len() + 1], Some(1));
        assert_eq!(idx[ZONE_PALETTE.len() - 1], Some(ZONE_PALETTE.len() - 1));
    }

    #[test]
    fn test_view_radius_clips_far_polygons() {
        let options = RenderOptions {
            view_radius: Some(0.005),
            ..Default::default()
        };
        let scene = Scene::build(
            &brisbane(),
            &[],
            QueryPoint::new(153.025, -27.465).unwrap(),
            &options,
        );
        assert_eq!(scene.fills.len(), 1);
    }

    #[test]
    fn test_view_keeps_aspect_ratio() {
        let options = RenderOptions::default();
        let view = view_rect(&brisbane(), QueryPoint::new(153.025, -27.465).unwrap(), &options);
        let scale = view.center().y.to_radians().cos();
        let ratio = view.width() * scale / view.height();
        assert!((ratio - 1024.0 / 768.0).abs() < 1e-9);
        assert!(view.intersects(&geo::Point::new(153.025, -27.465)));
    }

    #[test]
    fn test_svg_rendering_is_deterministic() {
        let zoning = brisbane();
        let overlay = layer("Flood", vec![square(0, 153.024, -27.466, "F")]);
        let point = QueryPoint::new(153.025, -27.465).unwrap();
        let options = RenderOptions {
            width: 400,
            height: 300,
            ..Default::default()
        };

        let first = render_svg_string(&zoning, &[&overlay], point, &options).unwrap();
        let second = render_svg_string(&zoning, &[&overlay], point, &options).unwrap();
        assert!(first.starts_with("<svg"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let result = render(
            &brisbane(),
            &[],
            QueryPoint::new(153.025, -27.465).unwrap(),
            &RenderOptions::default(),
            &dir.path().join("map.gif"),
        );
        assert!(matches!(result, Err(RenderError::Format(ext)) if ext == "gif"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let options = RenderOptions {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            render_svg_string(&brisbane(), &[], QueryPoint::new(153.0, -27.0).unwrap(), &options),
            Err(RenderError::Size { .. })
        ));
    }
}
