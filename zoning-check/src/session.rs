//! Session de requêtes
//!
//! Les couches sont téléchargées (si besoin), chargées et indexées une seule
//! fois à l'ouverture. Chaque requête suit ensuite le cycle :
//!
//! ```text
//! idle → awaiting input → (geocoding | direct) → querying
//!      → { found → rendered | no results → notified } → idle
//! ```
//!
//! Toute erreur passe par `error notified` puis revient à `idle`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use zonestore::{
    CacheError, DatasetCache, DatasetDescriptor, IndexedLayer, InvalidPoint, Layer, LoadOptions,
    MatchResult, QueryPoint, StoreError,
};

use crate::config::Config;
use crate::export::{self, ExportError};
use crate::geocode::{GeocodeError, GeocodeOutcome, Geocoder};
use crate::render::{self, detect_category_field, RenderError, RenderOptions};
use crate::report::{ReportError, ZoneReport};

/// Erreurs d'ouverture de session ou de requête
#[derive(Debug, Error)]
pub enum QueryError {
    /// Téléchargement impossible (réseau, statut HTTP, écriture du cache)
    #[error("Could not download layer '{layer}': {source}")]
    Network {
        layer: String,
        #[source]
        source: CacheError,
    },

    /// Fichier de couche illisible
    #[error("Could not read layer '{layer}': {source}")]
    Parse {
        layer: String,
        #[source]
        source: StoreError,
    },

    /// Adresse inconnue du géocodeur
    #[error("Address not found: '{0}'")]
    GeocodeMiss(String),

    /// Échec du service de géocodage
    #[error(transparent)]
    Geocoding(#[from] GeocodeError),

    /// Coordonnées hors limites
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidPoint),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("GeoJSON export failed: {0}")]
    Export(#[from] ExportError),

    /// Tâche de chargement interrompue
    #[error("Background task failed: {0}")]
    Task(String),
}

/// État courant de la session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Geocoding,
    Querying,
    Rendered,
    Notified,
    ErrorNotified,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingInput => "awaiting input",
            Self::Geocoding => "geocoding",
            Self::Querying => "querying",
            Self::Rendered => "rendered",
            Self::Notified => "no results notified",
            Self::ErrorNotified => "error notified",
        };
        f.write_str(name)
    }
}

/// Saisie utilisateur
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Coordinates { lon: f64, lat: f64 },
    Address(String),
}

impl QueryInput {
    /// `lon,lat` donne des coordonnées, tout le reste est une adresse
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some((lon, lat)) = line.split_once(',') {
            if let (Ok(lon), Ok(lat)) = (lon.trim().parse(), lat.trim().parse()) {
                return Self::Coordinates { lon, lat };
            }
        }
        Self::Address(line.to_string())
    }
}

/// Origine du point interrogé
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointSource {
    Coordinates,
    Geocoded {
        address: String,
        display_name: String,
    },
}

/// Résultat d'une requête
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub point: QueryPoint,
    pub source: PointSource,
    pub zoning: MatchResult,
    /// Un résultat par overlay chargé, éventuellement vide
    pub overlays: BTreeMap<String, MatchResult>,
    /// Overlays dont le chargement a échoué
    pub unavailable_overlays: Vec<String>,
}

impl QueryOutcome {
    /// Aucune zone ne contient le point
    pub fn is_empty(&self) -> bool {
        self.zoning.is_empty()
    }
}

/// Fichiers à produire après une requête fructueuse
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub map: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub geojson: Option<PathBuf>,
}

/// Couches chargées et géocodeur, pour toute la durée d'un run
pub struct Session<G: Geocoder> {
    geocoder: G,
    zoning: IndexedLayer,
    overlays: BTreeMap<String, IndexedLayer>,
    unavailable: Vec<String>,
    render: RenderOptions,
    state: SessionState,
}

impl<G: Geocoder> Session<G> {
    /// Télécharge (si besoin), charge et indexe toutes les couches
    ///
    /// Un échec sur le zonage est fatal ; un overlay en échec est seulement
    /// marqué indisponible.
    pub async fn open(config: &Config, geocoder: G) -> Result<Self, QueryError> {
        let zoning_descriptor = config.zoning_descriptor();
        let cache = DatasetCache::new(config.cache_config()).map_err(|source| {
            QueryError::Network {
                layer: zoning_descriptor.name.clone(),
                source,
            }
        })?;
        let options = config.load_options();

        let zoning = open_layer(&cache, zoning_descriptor, options).await?;

        let mut overlays = Vec::new();
        let mut unavailable = Vec::new();
        for descriptor in config.overlay_descriptors() {
            let name = descriptor.name.clone();
            match open_layer(&cache, descriptor, options).await {
                Ok(layer) => overlays.push(layer),
                Err(e) => {
                    warn!(layer = name.as_str(), error = %e, "Overlay unavailable");
                    unavailable.push(name);
                }
            }
        }

        let render = RenderOptions {
            width: config.render.width,
            height: config.render.height,
            view_radius: config.render.view_radius,
            category_field: config.zoning.category_field.clone(),
        };

        let mut session = Self::with_layers(geocoder, zoning, overlays, render);
        session.unavailable = unavailable;
        Ok(session)
    }

    /// Session sur des couches déjà indexées
    pub fn with_layers(
        geocoder: G,
        zoning: IndexedLayer,
        overlays: Vec<IndexedLayer>,
        mut render: RenderOptions,
    ) -> Self {
        if render.category_field.is_none() {
            render.category_field = detect_category_field(&zoning.layer().columns);
        }
        debug!(category_field = ?render.category_field, "Map category field");

        let session = Self {
            geocoder,
            zoning,
            overlays: overlays
                .into_iter()
                .map(|o| (o.layer().name.clone(), o))
                .collect(),
            unavailable: Vec::new(),
            render,
            state: SessionState::Idle,
        };
        info!(
            zoning = session.zoning.layer().len(),
            overlays = session.overlays.len(),
            "Session ready"
        );
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn zoning(&self) -> &Layer {
        self.zoning.layer()
    }

    pub fn overlay_names(&self) -> impl Iterator<Item = &str> {
        self.overlays.keys().map(String::as_str)
    }

    pub fn unavailable_overlays(&self) -> &[String] {
        &self.unavailable
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session state");
        self.state = next;
    }

    /// Traite une saisie de bout en bout et revient à l'état `idle`
    pub async fn run(
        &mut self,
        input: QueryInput,
        outputs: &OutputOptions,
    ) -> Result<QueryOutcome, QueryError> {
        self.transition(SessionState::AwaitingInput);

        let result = self.process(input, outputs).await;
        if let Err(e) = &result {
            self.transition(SessionState::ErrorNotified);
            warn!(error = %e, "Query failed");
        }

        self.transition(SessionState::Idle);
        result
    }

    async fn process(
        &mut self,
        input: QueryInput,
        outputs: &OutputOptions,
    ) -> Result<QueryOutcome, QueryError> {
        let (point, source) = match input {
            QueryInput::Coordinates { lon, lat } => {
                (QueryPoint::new(lon, lat)?, PointSource::Coordinates)
            }
            QueryInput::Address(address) => {
                self.transition(SessionState::Geocoding);
                match self.geocoder.geocode(&address).await? {
                    GeocodeOutcome::Found(place) => (
                        place.point,
                        PointSource::Geocoded {
                            address,
                            display_name: place.display_name,
                        },
                    ),
                    GeocodeOutcome::NotFound => return Err(QueryError::GeocodeMiss(address)),
                }
            }
        };

        self.transition(SessionState::Querying);
        let outcome = self.query(point, source);

        if outcome.is_empty() {
            self.transition(SessionState::Notified);
            info!(%point, "No zoning data found");
            return Ok(outcome);
        }

        self.write_outputs(&outcome, outputs)?;
        self.transition(SessionState::Rendered);
        Ok(outcome)
    }

    /// Interroge le zonage et chaque overlay indépendamment
    pub fn query(&self, point: QueryPoint, source: PointSource) -> QueryOutcome {
        let zoning = self.zoning.query(point);
        let overlays = zonestore::query_layers(point, &self.overlays);

        info!(
            %point,
            zoning = zoning.rows.len(),
            overlays = overlays.values().filter(|m| !m.is_empty()).count(),
            "Query done"
        );

        QueryOutcome {
            point,
            source,
            zoning,
            overlays,
            unavailable_overlays: self.unavailable.clone(),
        }
    }

    fn write_outputs(
        &self,
        outcome: &QueryOutcome,
        outputs: &OutputOptions,
    ) -> Result<(), QueryError> {
        if let Some(path) = &outputs.map {
            let overlays: Vec<&Layer> = self.overlays.values().map(IndexedLayer::layer).collect();
            render::render(
                self.zoning.layer(),
                &overlays,
                outcome.point,
                &self.render,
                path,
            )?;
        }
        if let Some(path) = &outputs.report {
            ZoneReport::build(outcome).write_pdf(path)?;
        }
        if let Some(path) = &outputs.geojson {
            export::export_matches(outcome, path)?;
        }
        Ok(())
    }
}

/// Garantit le cache puis charge et indexe une couche hors du runtime async
async fn open_layer(
    cache: &DatasetCache,
    descriptor: DatasetDescriptor,
    options: LoadOptions,
) -> Result<IndexedLayer, QueryError> {
    let path = cache
        .ensure_cached(&descriptor)
        .await
        .map_err(|source| QueryError::Network {
            layer: descriptor.name.clone(),
            source,
        })?;

    let name = descriptor.name;
    tokio::task::spawn_blocking(move || {
        zonestore::load(&name, &path, &options)
            .map(IndexedLayer::build)
            .map_err(|source| QueryError::Parse {
                layer: name.clone(),
                source,
            })
    })
    .await
    .map_err(|e| QueryError::Task(e.to_string()))?
}
