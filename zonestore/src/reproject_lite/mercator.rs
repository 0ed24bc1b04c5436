//! Projection Web Mercator (EPSG:3857)
//!
//! Aussi connu sous le nom de Pseudo-Mercator. C'est le système natif de la
//! plupart des services ArcGIS (wkid 102100).

use super::ellipsoid::WGS84;
use super::Geographic;

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    // Modèle sphérique avec le rayon équatorial
    let r = WGS84.a;

    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brisbane_from_web_mercator() {
        // Brisbane CBD: 153.0251°E, 27.4698°S
        let geo = web_mercator_to_geographic(17_034_600.0, -3_182_480.0);
        let (lon, lat) = geo.to_degrees();

        assert!((lon - 153.0251).abs() < 0.01, "lon={}", lon);
        assert!((lat - (-27.4698)).abs() < 0.01, "lat={}", lat);
    }

    #[test]
    fn test_origin() {
        let (lon, lat) = web_mercator_to_geographic(0.0, 0.0).to_degrees();
        assert!(lon.abs() < 1e-12);
        assert!(lat.abs() < 1e-12);
    }
}
