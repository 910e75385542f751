use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// How a record's fields are turned into blocks.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionMode {
    /// Group `X`, `X.1`, … by base name and collapse identical values.
    #[default]
    BaseName,
    /// A field whose name starts with `marker` opens a new bordered section.
    Sections { marker: String },
}

/// Optional TrueType/OpenType files used instead of Helvetica.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FontConfig {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
}

impl FontConfig {
    /// Fill unset paths from `XLSXIDE_FONT` / `XLSXIDE_FONT_BOLD`.
    pub fn with_env(mut self) -> Self {
        let from_env = |var: &str| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        if self.regular.is_none() {
            self.regular = from_env("XLSXIDE_FONT");
        }
        if self.bold.is_none() {
            self.bold = from_env("XLSXIDE_FONT_BOLD");
        }
        self
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub author: String,
    pub link_label: String,
    pub footer_label: String,
    /// chrono format string for the footer timestamp.
    pub timestamp_format: String,
    /// Candidate name fields for the output file, in priority order.
    pub name_fields: Vec<String>,
    pub fallback_prefix: String,
    /// Label prefixes (case-insensitive) whose values are split into reference lines.
    pub reference_prefixes: Vec<String>,
    pub mode: CompositionMode,
    pub fonts: FontConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Project Summary".to_string(),
            author: "xlsxide-pdf".to_string(),
            link_label: "click here to access".to_string(),
            footer_label: "printed at:".to_string(),
            timestamp_format: "%d/%m/%Y %H:%M".to_string(),
            name_fields: ["Nome", "Name", "Nome do Projeto", "Project Name", "Projeto", "Project"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_prefix: "project_".to_string(),
            reference_prefixes: ["referência", "referencia", "reference", "bibliograph"]
                .into_iter()
                .map(String::from)
                .collect(),
            mode: CompositionMode::BaseName,
            fonts: FontConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON config; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let CompositionMode::Sections { marker } = &self.mode
            && marker.trim().is_empty()
        {
            return Err(Error::Config("section marker must not be empty".into()));
        }
        if self.fallback_prefix.trim().is_empty() {
            return Err(Error::Config("fallback_prefix must not be empty".into()));
        }
        // chrono panics when displaying a format with `Item::Error`.
        let bad = chrono::format::StrftimeItems::new(&self.timestamp_format)
            .any(|item| matches!(item, chrono::format::Item::Error));
        if bad {
            return Err(Error::Config(format!(
                "invalid timestamp_format {:?}",
                self.timestamp_format
            )));
        }
        Ok(())
    }

    pub(crate) fn is_reference_label(&self, label: &str) -> bool {
        let lower = label.trim().to_lowercase();
        self.reference_prefixes
            .iter()
            .any(|p| lower.starts_with(&p.to_lowercase()))
    }
}
