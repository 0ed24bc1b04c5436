//! Géocodage d'adresses (Nominatim)
//!
//! Seul le premier résultat est retenu, sans désambiguïsation.

use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use zonestore::{InvalidPoint, QueryPoint};

use crate::config::GeocoderConfig;

/// Erreurs du service de géocodage
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Configuration inutilisable (User-Agent vide, client HTTP)
    #[error("Geocoder configuration error: {0}")]
    Config(String),

    /// Service injoignable ou timeout
    #[error("Geocoding service unreachable: {0}")]
    Network(#[source] reqwest::Error),

    /// Réponse HTTP autre que 200
    #[error("Geocoding service returned HTTP {0}")]
    Status(u16),

    /// Réponse illisible
    #[error("Unexpected geocoding response: {0}")]
    Decode(String),

    /// Coordonnées hors limites dans la réponse
    #[error(transparent)]
    Coordinates(#[from] InvalidPoint),
}

/// Lieu trouvé
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedPlace {
    pub point: QueryPoint,
    pub display_name: String,
}

/// Résultat d'un géocodage
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found(GeocodedPlace),
    NotFound,
}

/// Service transformant une adresse libre en point WGS84
pub trait Geocoder: Send + Sync {
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<GeocodeOutcome, GeocodeError>> + Send;
}

/// Un résultat de `/search?format=jsonv2` (lat/lon sont des chaînes)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Client Nominatim
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    country_codes: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let user_agent = config.user_agent.trim();
        if user_agent.is_empty() {
            return Err(GeocodeError::Config(
                "a User-Agent identifying the application is required".into(),
            ));
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()
            .map_err(|e| GeocodeError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_codes: config.country_codes.clone().filter(|c| !c.is_empty()),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodeOutcome, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(GeocodeOutcome::NotFound);
        }

        let mut params = vec![("q", address), ("format", "jsonv2"), ("limit", "1")];
        if let Some(codes) = &self.country_codes {
            params.push(("countrycodes", codes.as_str()));
        }

        debug!(address, "Geocoding request");
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(GeocodeError::Network)?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let body = response.text().await.map_err(GeocodeError::Network)?;
        let outcome = parse_response(&body)?;

        match &outcome {
            GeocodeOutcome::Found(place) => info!(
                address,
                point = %place.point,
                display_name = place.display_name.as_str(),
                "Address geocoded"
            ),
            GeocodeOutcome::NotFound => info!(address, "Address not found"),
        }
        Ok(outcome)
    }
}

/// Interprète le corps JSON d'une réponse `/search`
fn parse_response(body: &str) -> Result<GeocodeOutcome, GeocodeError> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

    let Some(place) = places.into_iter().next() else {
        return Ok(GeocodeOutcome::NotFound);
    };

    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("invalid latitude '{}'", place.lat)))?;
    let lon: f64 = place
        .lon
        .parse()
        .map_err(|_| GeocodeError::Decode(format!("invalid longitude '{}'", place.lon)))?;

    Ok(GeocodeOutcome::Found(GeocodedPlace {
        point: QueryPoint::new(lon, lat)?,
        display_name: place.display_name,
    }))
}
