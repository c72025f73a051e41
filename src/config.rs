//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.rfpaudit.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".rfpaudit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upload/analysis backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Extraction model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Print and archive export settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format (`markdown`, `json` or `html`).
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: default_format(),
        }
    }
}

fn default_output() -> String {
    "rfp_report.md".to_string()
}

fn default_format() -> String {
    "markdown".to_string()
}

/// Upload/analysis backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,

    /// Document extensions accepted for upload.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_backend_timeout(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_backend_timeout() -> u64 {
    300
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string()]
}

/// Extraction model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_model_timeout() -> u64 {
    600
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File holding the current session identifier.
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    ".rfpaudit/session_id".to_string()
}

/// Print and archive export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_page_width")]
    pub page_width_mm: f64,

    #[serde(default = "default_page_height")]
    pub page_height_mm: f64,

    #[serde(default = "default_margin")]
    pub margin_mm: f64,

    /// Device pixel ratio used when rasterizing.
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,

    /// CSS viewport width of the rendered surface.
    #[serde(default = "default_css_width")]
    pub css_width_px: u32,

    /// Page background colour: `#rgb`, `#rrggbb` or a named colour.
    #[serde(default = "default_background")]
    pub background: String,

    /// Rasterizer executable.
    #[serde(default = "default_rasterizer_command")]
    pub rasterizer_command: String,

    /// Rasterizer arguments; `{input}`, `{output}`, `{zoom}` and `{width}`
    /// are substituted.
    #[serde(default = "default_rasterizer_args")]
    pub rasterizer_args: Vec<String>,

    /// Directory exported artifacts are written to.
    #[serde(default = "default_export_dir")]
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_width_mm: default_page_width(),
            page_height_mm: default_page_height(),
            margin_mm: default_margin(),
            pixel_ratio: default_pixel_ratio(),
            css_width_px: default_css_width(),
            background: default_background(),
            rasterizer_command: default_rasterizer_command(),
            rasterizer_args: default_rasterizer_args(),
            output_dir: default_export_dir(),
        }
    }
}

fn default_page_width() -> f64 {
    210.0
}

fn default_page_height() -> f64 {
    297.0
}

fn default_margin() -> f64 {
    10.0
}

fn default_pixel_ratio() -> f64 {
    2.0
}

fn default_css_width() -> u32 {
    794 // A4 width at 96 dpi
}

fn default_background() -> String {
    "#ffffff".to_string()
}

fn default_rasterizer_command() -> String {
    "wkhtmltoimage".to_string()
}

fn default_rasterizer_args() -> Vec<String> {
    [
        "--quiet",
        "--format",
        "png",
        "--zoom",
        "{zoom}",
        "--width",
        "{width}",
        "{input}",
        "{output}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_export_dir() -> String {
    ".".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Append the normalization notes to the report.
    #[serde(default)]
    pub show_coercions: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.backend.api_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }

        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
            self.model.timeout_seconds = timeout;
        }

        if let Some(ref dir) = args.export_dir {
            self.export.output_dir = dir.display().to_string();
        }

        if args.show_coercions {
            self.report.show_coercions = true;
        }
    }

    /// Check the merged settings before anything uses them.
    pub fn validate(&self) -> Result<()> {
        if !crate::cli::is_http_url(&self.backend.api_url) {
            bail!(
                "backend.api_url must start with 'http://' or 'https://': {}",
                self.backend.api_url
            );
        }
        if !crate::cli::is_http_url(&self.model.ollama_url) {
            bail!(
                "model.ollama_url must start with 'http://' or 'https://': {}",
                self.model.ollama_url
            );
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            bail!("model.temperature must be between 0.0 and 1.0");
        }
        if !is_colour_token(&self.export.background) {
            bail!(
                "export.background must be a hex or named colour: {}",
                self.export.background
            );
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, or a bare colour keyword.
fn is_colour_token(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()),
    }
}
