//! Configuration de l'application
//!
//! Ordre de priorité : preset ou fichier JSON, puis variables d'environnement
//! `ZONING_*` / `GEOCODER_*`, puis options de la ligne de commande.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use zonestore::{CacheConfig, DatasetDescriptor, FreshnessPolicy, LoadOptions};

/// Presets embarqués dans le binaire
pub const PRESETS: &[&str] = &["brisbane"];

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Répertoire des fichiers en cache
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Timeout réseau des téléchargements (secondes)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Taille du tampon d'écriture des téléchargements
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Âge maximal d'un fichier en cache (absent : réutilisé indéfiniment)
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    /// Nombre maximal de features lues par couche (absent : toutes)
    #[serde(default)]
    pub row_limit: Option<usize>,

    /// Couche de zonage principale
    pub zoning: LayerConfig,

    /// Couches d'overlays réglementaires
    #[serde(default)]
    pub overlays: Vec<LayerConfig>,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

/// Une couche distante
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LayerConfig {
    /// Nom affiché, dont dérive le nom du fichier en cache
    pub name: String,

    /// URL de téléchargement GeoJSON
    pub url: String,

    /// Chemin local explicite (sinon `data_dir/<slug>.geojson`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Attribut utilisé pour colorer la carte
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_field: Option<String>,
}

impl LayerConfig {
    /// Parse un argument `NOM=URL`
    pub fn parse_overlay_arg(arg: &str) -> std::result::Result<Self, String> {
        let (name, url) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=URL, got '{}'", arg))?;
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            return Err(format!("expected NAME=URL, got '{}'", arg));
        }
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            path: None,
            category_field: None,
        })
    }

    /// Descripteur de dataset dans `data_dir`
    pub fn descriptor(&self, data_dir: &Path) -> DatasetDescriptor {
        match &self.path {
            Some(path) => DatasetDescriptor::with_path(&self.name, &self.url, path),
            None => DatasetDescriptor::new(&self.name, &self.url, data_dir),
        }
    }
}

/// Service de géocodage Nominatim
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,

    /// Identifiant client exigé par Nominatim
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Restriction de pays (`countrycodes`)
    #[serde(default)]
    pub country_codes: Option<String>,

    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            country_codes: None,
            timeout_secs: default_geocoder_timeout(),
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rendu de la carte
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Demi-largeur de la vue autour du point, en degrés
    /// (absent : emprise de la couche de zonage)
    #[serde(default)]
    pub view_radius: Option<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            view_radius: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_download_timeout() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    8192
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "brisbane-zoning-checker".to_string()
}

fn default_geocoder_timeout() -> u64 {
    10
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "brisbane" => Self::load_embedded(include_str!("presets/brisbane.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Nom de preset ou chemin vers un fichier JSON
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if PRESETS.contains(&name_or_path) {
            Self::from_preset(name_or_path)
        } else {
            Self::load(Path::new(name_or_path))
        }
    }

    /// Applique les surcharges de l'environnement du processus
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applique les surcharges lues par `get` (testable sans toucher à l'env)
    pub fn apply_env_from<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = get("ZONING_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("ZONING_URL") {
            self.zoning.url = url;
        }
        if let Some(v) = get("ZONING_ROW_LIMIT") {
            self.row_limit = Some(v.parse().context(format!("Invalid ZONING_ROW_LIMIT: {}", v))?);
        }
        if let Some(v) = get("ZONING_TIMEOUT_SECS") {
            self.download_timeout_secs = v
                .parse()
                .context(format!("Invalid ZONING_TIMEOUT_SECS: {}", v))?;
        }
        if let Some(v) = get("ZONING_MAX_AGE_SECS") {
            self.max_age_secs = Some(
                v.parse()
                    .context(format!("Invalid ZONING_MAX_AGE_SECS: {}", v))?,
            );
        }
        if let Some(url) = get("GEOCODER_URL") {
            self.geocoder.base_url = url;
        }
        if let Some(ua) = get("GEOCODER_USER_AGENT") {
            self.geocoder.user_agent = ua;
        }
        Ok(())
    }

    /// Ajoute ou remplace un overlay (même nom)
    pub fn upsert_overlay(&mut self, overlay: LayerConfig) {
        match self.overlays.iter_mut().find(|o| o.name == overlay.name) {
            Some(existing) => *existing = overlay,
            None => self.overlays.push(overlay),
        }
    }

    /// Vérifie la cohérence avant usage
    pub fn validate(&self) -> Result<()> {
        if self.zoning.url.trim().is_empty() {
            anyhow::bail!("Zoning layer '{}' has no URL", self.zoning.name);
        }
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        let mut names = vec![self.zoning.name.as_str()];
        for overlay in &self.overlays {
            if names.contains(&overlay.name.as_str()) {
                anyhow::bail!("Duplicate layer name: {}", overlay.name);
            }
            names.push(&overlay.name);
        }

        // Deux noms distincts peuvent donner le même slug, donc le même fichier
        let mut paths: Vec<(String, PathBuf)> = Vec::with_capacity(self.overlays.len() + 1);
        for descriptor in std::iter::once(self.zoning_descriptor()).chain(self.overlay_descriptors()) {
            if let Some((other, _)) = paths.iter().find(|(_, p)| *p == descriptor.local_path) {
                anyhow::bail!(
                    "Layers '{}' and '{}' share the cache file {}",
                    other,
                    descriptor.name,
                    descriptor.local_path.display()
                );
            }
            paths.push((descriptor.name, descriptor.local_path));
        }
        Ok(())
    }

    pub fn zoning_descriptor(&self) -> DatasetDescriptor {
        self.zoning.descriptor(&self.data_dir)
    }

    pub fn overlay_descriptors(&self) -> Vec<DatasetDescriptor> {
        self.overlays
            .iter()
            .map(|o| o.descriptor(&self.data_dir))
            .collect()
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            timeout: Duration::from_secs(self.download_timeout_secs),
            chunk_size: self.chunk_size,
            policy: match self.max_age_secs {
                Some(secs) => FreshnessPolicy::MaxAge(Duration::from_secs(secs)),
                None => FreshnessPolicy::Forever,
            },
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            row_limit: self.row_limit,
        }
    }
}
