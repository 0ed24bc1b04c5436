//! # zoning-check
//!
//! Trouve la zone d'urbanisme et les overlays réglementaires de Brisbane
//! contenant un point (coordonnées ou adresse), avec carte et rapport PDF.
//!
//! ## Features
//!
//! - Configuration par preset embarqué ou fichier JSON, surcharges d'env
//! - Géocodage Nominatim
//! - Session à couches chargées une seule fois
//! - Carte PNG/SVG (plotters), rapport PDF (printpdf), export GeoJSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Requête par coordonnées, avec carte et rapport
//! zoning-check query --lon 153.0251 --lat -27.4698 --map map.png --report report.pdf
//!
//! # Requête par adresse
//! zoning-check query --address "Queen Street Mall, Brisbane"
//!
//! # Mode interactif
//! zoning-check interactive --overlay "Flood Risk=https://example.org/flood.geojson"
//! ```

pub mod config;
pub mod export;
pub mod geocode;
pub mod render;
pub mod report;
pub mod session;

pub use config::{Config, LayerConfig};
pub use geocode::{GeocodeError, GeocodeOutcome, GeocodedPlace, Geocoder, NominatimGeocoder};
pub use render::{render, render_svg_string, RenderError, RenderOptions};
pub use report::{ReportError, ZoneReport};
pub use session::{
    OutputOptions, PointSource, QueryError, QueryInput, QueryOutcome, Session, SessionState,
};
