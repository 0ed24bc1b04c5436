//! Rapport de zonage
//!
//! Modèle en mémoire construit depuis un [`QueryOutcome`], affichable sur la
//! console, sérialisable en JSON et exportable en PDF (printpdf, A4,
//! Helvetica, pagination automatique). Toutes les correspondances de chaque
//! couche sont incluses.
//!
//! Les polices intégrées du PDF n'encodent que le jeu WinAnsi : les caractères
//! hors Latin-1 (macrons, CJK, ...) sont remplacés par `?` dans le PDF. La
//! console et le JSON gardent le texte d'origine.

use std::borrow::Cow;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use zonestore::{value_text, MatchResult, QueryPoint};

use crate::session::{PointSource, QueryOutcome};

/// Erreurs de génération du rapport
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Une correspondance : attributs dans l'ordre des colonnes de la couche
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub fields: Vec<(String, String)>,
}

/// Une couche interrogée
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub layer: String,
    pub matches: Vec<ReportEntry>,
}

/// Rapport complet d'une requête
#[derive(Debug, Clone, Serialize)]
pub struct ZoneReport {
    pub title: String,
    pub point: QueryPoint,
    /// Adresse saisie et libellé du géocodeur, ou `None` pour des coordonnées
    pub address: Option<String>,
    pub display_name: Option<String>,
    /// Zonage d'abord, puis les overlays par nom
    pub sections: Vec<ReportSection>,
    /// Overlays non chargés pendant la session
    pub unavailable: Vec<String>,
}

/// Ligne de texte du PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStyle {
    Title,
    Heading,
    Text,
}

impl LineStyle {
    fn font_size(self) -> f32 {
        match self {
            Self::Title => 16.0,
            Self::Heading => 12.0,
            Self::Text => 10.0,
        }
    }

    /// Interligne en mm
    fn height(self) -> f32 {
        match self {
            Self::Title => 10.0,
            Self::Heading => 8.0,
            Self::Text => 5.5,
        }
    }
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
/// Caractères par ligne en Helvetica 10 pt sur la largeur utile
const WRAP: usize = 95;

impl ReportSection {
    fn from_match(result: &MatchResult) -> Self {
        let matches = result
            .rows
            .iter()
            .map(|row| ReportEntry {
                fields: result
                    .columns
                    .iter()
                    .map(|col| {
                        let value = row.properties.get(col).map(value_text).unwrap_or_default();
                        (col.clone(), value)
                    })
                    .collect(),
            })
            .collect();

        Self {
            layer: result.layer.clone(),
            matches,
        }
    }
}

impl ZoneReport {
    /// Construit le rapport d'une requête
    pub fn build(outcome: &QueryOutcome) -> Self {
        let (address, display_name) = match &outcome.source {
            PointSource::Coordinates => (None, None),
            PointSource::Geocoded {
                address,
                display_name,
            } => (Some(address.clone()), Some(display_name.clone())),
        };

        let mut sections = vec![ReportSection::from_match(&outcome.zoning)];
        sections.extend(outcome.overlays.values().map(ReportSection::from_match));

        Self {
            title: "Brisbane Zoning Report".to_string(),
            point: outcome.point,
            address,
            display_name,
            sections,
            unavailable: outcome.unavailable_overlays.clone(),
        }
    }

    /// Nombre total de correspondances, toutes couches confondues
    pub fn total_matches(&self) -> usize {
        self.sections.iter().map(|s| s.matches.len()).sum()
    }

    /// Lignes du rapport, dans l'ordre d'affichage
    fn lines(&self) -> Vec<(LineStyle, String)> {
        let mut lines = vec![(LineStyle::Title, self.title.clone())];

        if let Some(address) = &self.address {
            lines.push((LineStyle::Text, format!("Address: {}", address)));
        }
        if let Some(name) = &self.display_name {
            lines.push((LineStyle::Text, format!("Location: {}", name)));
        }
        lines.push((
            LineStyle::Text,
            format!(
                "Coordinates: {:.6}, {:.6} (lon, lat, WGS84)",
                self.point.lon, self.point.lat
            ),
        ));

        for section in &self.sections {
            lines.push((
                LineStyle::Heading,
                format!("{} ({} match(es))", section.layer, section.matches.len()),
            ));
            if section.matches.is_empty() {
                lines.push((LineStyle::Text, "No match".to_string()));
            }
            for (i, entry) in section.matches.iter().enumerate() {
                if section.matches.len() > 1 {
                    lines.push((LineStyle::Text, format!("Match {}", i + 1)));
                }
                for (key, value) in &entry.fields {
                    lines.push((LineStyle::Text, format!("  {}: {}", key, value)));
                }
            }
        }

        for name in &self.unavailable {
            lines.push((LineStyle::Heading, format!("{} (unavailable)", name)));
        }

        lines
    }

    /// Génère le PDF en mémoire
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let (doc, page, layer) = PdfDocument::new(
            self.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        let mut current: PdfLayerReference = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT - MARGIN;
        let mut pages = 1;

        for (style, text) in self.lines() {
            let font: &IndirectFontRef = match style {
                LineStyle::Text => &regular,
                _ => &bold,
            };

            for chunk in wrap(&latin1(&text), WRAP) {
                if y - style.height() < MARGIN {
                    pages += 1;
                    let (p, l) = doc.add_page(
                        Mm(PAGE_WIDTH),
                        Mm(PAGE_HEIGHT),
                        format!("Layer {}", pages),
                    );
                    current = doc.get_page(p).get_layer(l);
                    y = PAGE_HEIGHT - MARGIN;
                }
                y -= style.height();
                current.use_text(chunk, style.font_size(), Mm(MARGIN), Mm(y), font);
            }
        }

        doc.save_to_bytes()
            .map_err(|e| ReportError::Pdf(e.to_string()))
    }

    /// Écrit le PDF sur disque
    pub fn write_pdf(&self, path: &Path) -> Result<(), ReportError> {
        let bytes = self.to_pdf_bytes()?;
        let io_err = |source: std::io::Error| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        std::io::Write::write_all(&mut writer, &bytes).map_err(io_err)?;
        std::io::Write::flush(&mut writer).map_err(io_err)?;

        info!(path = %path.display(), matches = self.total_matches(), "Report saved");
        Ok(())
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("{}", self.title.to_uppercase());
        println!("{}", "=".repeat(60));

        if let Some(address) = &self.address {
            println!("Address: {}", address);
        }
        if let Some(name) = &self.display_name {
            println!("Location: {}", name);
        }
        println!("Coordinates: {:.6}, {:.6}", self.point.lon, self.point.lat);

        for section in &self.sections {
            println!("\n--- {} ({}) ---", section.layer.to_uppercase(), section.matches.len());
            if section.matches.is_empty() {
                println!("  No match");
            }
            for (i, entry) in section.matches.iter().enumerate() {
                if i > 0 {
                    println!("  --");
                }
                for (key, value) in &entry.fields {
                    println!("  {}: {}", key, value);
                }
            }
        }

        if !self.unavailable.is_empty() {
            println!("\n--- UNAVAILABLE ({}) ---", self.unavailable.len());
            for name in &self.unavailable {
                println!("  {}", name);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let zoning = self
            .sections
            .first()
            .map(|s| s.matches.len())
            .unwrap_or_default();
        let overlays = self
            .sections
            .iter()
            .skip(1)
            .filter(|s| !s.matches.is_empty())
            .count();
        format!(
            "{}: {} zoning match(es), {} overlay(s) intersecting",
            self.point, zoning, overlays
        )
    }
}

/// Découpe une ligne trop longue sur les espaces
/// Remplace les caractères non représentables en WinAnsi par `?`
fn latin1(text: &str) -> Cow<'_, str> {
    let printable = |c: char| matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF);
    if text.chars().all(printable) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if printable(c) { c } else { '?' })
                .collect(),
        )
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current.push_str("    ");
        } else if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(current);
    lines
}
