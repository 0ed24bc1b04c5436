//! Cache local des datasets distants
//!
//! Un dataset est téléchargé une seule fois puis réutilisé. Le téléchargement
//! passe par un fichier temporaire dans le même répertoire, renommé
//! atomiquement après succès : un téléchargement interrompu ne laisse jamais
//! de fichier tronqué à l'emplacement final.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::types::DatasetDescriptor;

/// Timeout réseau par défaut (connexion et lecture)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Taille des écritures sur disque
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Politique de fraîcheur d'un fichier en cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Un fichier présent est toujours réutilisé (péremption acceptée)
    #[default]
    Forever,
    /// Un fichier plus vieux que la durée est retéléchargé en entier
    MaxAge(Duration),
}

/// État d'une entrée du cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Missing,
    Fresh { size: u64, age: Duration },
    Stale { size: u64, age: Duration },
}

impl CacheStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

/// Entrée du cache : un chemin et sa politique de fraîcheur
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub policy: FreshnessPolicy,
}

impl CacheEntry {
    pub fn new(path: impl Into<PathBuf>, policy: FreshnessPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Inspecte le fichier sur disque
    pub fn status(&self) -> CacheStatus {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return CacheStatus::Missing;
        };
        if !metadata.is_file() {
            return CacheStatus::Missing;
        }

        let size = metadata.len();
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();

        match self.policy {
            FreshnessPolicy::MaxAge(max) if age > max => CacheStatus::Stale { size, age },
            _ => CacheStatus::Fresh { size, age },
        }
    }
}

/// Configuration du cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Timeout de connexion et de lecture
    pub timeout: Duration,
    /// Taille du tampon d'écriture
    pub chunk_size: usize,
    /// Politique de fraîcheur
    pub policy: FreshnessPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: FreshnessPolicy::Forever,
        }
    }
}

/// Cache de datasets distants
pub struct DatasetCache {
    client: Client,
    config: CacheConfig,
}

impl DatasetCache {
    /// Crée un cache avec son client HTTP
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let client = Client::builder()
            .user_agent(concat!("zonestore/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(CacheError::Client)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Entrée de cache d'un descripteur
    pub fn entry(&self, descriptor: &DatasetDescriptor) -> CacheEntry {
        CacheEntry::new(&descriptor.local_path, self.config.policy)
    }

    /// État courant du fichier local d'un descripteur
    pub fn status(&self, descriptor: &DatasetDescriptor) -> CacheStatus {
        self.entry(descriptor).status()
    }

    /// Garantit la présence locale du dataset et retourne son chemin
    ///
    /// Aucun accès réseau si le fichier est présent et frais.
    pub async fn ensure_cached(
        &self,
        descriptor: &DatasetDescriptor,
    ) -> Result<PathBuf, CacheError> {
        match self.entry(descriptor).status() {
            CacheStatus::Fresh { size, .. } => {
                debug!(
                    layer = descriptor.name.as_str(),
                    path = %descriptor.local_path.display(),
                    size,
                    "Cache hit"
                );
                return Ok(descriptor.local_path.clone());
            }
            CacheStatus::Stale { age, .. } => {
                info!(
                    layer = descriptor.name.as_str(),
                    age_secs = age.as_secs(),
                    "Cached dataset is stale, downloading again"
                );
            }
            CacheStatus::Missing => {}
        }

        self.download(descriptor).await?;
        Ok(descriptor.local_path.clone())
    }

    /// Force le téléchargement, quel que soit l'état du cache
    pub async fn refresh(&self, descriptor: &DatasetDescriptor) -> Result<PathBuf, CacheError> {
        self.download(descriptor).await?;
        Ok(descriptor.local_path.clone())
    }

    /// Télécharge le dataset vers un fichier temporaire puis le renomme
    async fn download(&self, descriptor: &DatasetDescriptor) -> Result<u64, CacheError> {
        let url = descriptor.url.as_str();
        let target = descriptor.local_path.as_path();
        let dir = parent_dir(target);

        info!(
            layer = descriptor.name.as_str(),
            url,
            "Downloading dataset (this may take a few minutes)"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::network(url, e))?;

        if response.status() != StatusCode::OK {
            warn!(
                layer = descriptor.name.as_str(),
                status = response.status().as_u16(),
                "Download failed"
            );
            return Err(CacheError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CacheError::io(dir, e))?;

        // Supprimé automatiquement au drop si on sort en erreur
        let tmp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| CacheError::io(dir, e))?;

        let std_file = tmp
            .as_file()
            .try_clone()
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        let mut writer =
            BufWriter::with_capacity(self.config.chunk_size, tokio::fs::File::from_std(std_file));

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CacheError::network(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| CacheError::io(tmp.path(), e))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| CacheError::io(tmp.path(), e))?;

        tmp.persist(target)
            .map_err(|e| CacheError::io(target, e.error))?;

        info!(
            layer = descriptor.name.as_str(),
            path = %target.display(),
            bytes = written,
            "Dataset downloaded"
        );

        Ok(written)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
