//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::Decision;
use crate::normalize::schema::parse_datetime;
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// RfpAudit - compliance and risk report engine for RFP documents
///
/// Upload an RFP, have it analysed, and get a compliance/eligibility/risk
/// report with a proceed recommendation. Markdown/JSON/HTML reports,
/// print-ready and PDF exports.
///
/// Examples:
///   rfpaudit --document county-rfp.pdf
///   rfpaudit --session 1718200000 --format html --output report.html
///   rfpaudit --extraction reply.json --export-pdf --fail-on do-not-proceed
///   rfpaudit --cleanup
///   rfpaudit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// RFP document to upload (.pdf or .docx)
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["session", "extraction"])]
    pub document: Option<PathBuf>,

    /// Existing backend session to analyse
    ///
    /// Defaults to the session stored by the last upload.
    #[arg(short, long, value_name = "ID", conflicts_with = "extraction")]
    pub session: Option<String>,

    /// Saved extraction reply to report on, skipping the collaborators
    #[arg(short, long, value_name = "FILE")]
    pub extraction: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the `general.output` setting.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, html)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Backend API base URL
    ///
    /// Defaults to the `backend.api_url` setting.
    #[arg(long, value_name = "URL", env = "RFPAUDIT_API_URL")]
    pub api_url: Option<String>,

    /// Ollama model used for extraction
    ///
    /// Defaults to the `model.name` setting.
    #[arg(short, long, env = "RFPAUDIT_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    ///
    /// Defaults to the `model.ollama_url` setting.
    #[arg(long, value_name = "URL", env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for the extraction model (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds for backend and model calls
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .rfpaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write the print-ready HTML document
    #[arg(long)]
    pub print: bool,

    /// Also write the paginated PDF archive
    #[arg(long)]
    pub export_pdf: bool,

    /// Directory for print and PDF exports
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Evaluate deadlines as of this date or timestamp (UTC)
    ///
    /// Example: --as-of 2024-06-12 or --as-of 2024-06-12T09:00:00
    #[arg(long, value_name = "WHEN")]
    pub as_of: Option<String>,

    /// Fail if the decision is at or below this level
    ///
    /// Useful for pipelines. Exit code 2 when the threshold is reached.
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Release the backend session when done
    ///
    /// On its own, releases the stored session and exits.
    #[arg(long)]
    pub cleanup: bool,

    /// Append the normalization notes to the report
    #[arg(long)]
    pub show_coercions: bool,

    /// Generate a default .rfpaudit.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Standalone HTML surface
    Html,
}

impl OutputFormat {
    /// Parse a format name from the configuration file.
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name.trim(), true).ok()
    }
}

/// Decision threshold for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailOnLevel {
    /// Fail on CONDITIONAL or DO_NOT_PROCEED
    Conditional,
    /// Fail on DO_NOT_PROCEED only
    DoNotProceed,
}

impl FailOnLevel {
    pub fn decision(&self) -> Decision {
        match self {
            FailOnLevel::Conditional => Decision::Conditional,
            FailOnLevel::DoNotProceed => Decision::DoNotProceed,
        }
    }

    /// Whether `decision` reaches this threshold.
    pub fn is_reached_by(&self, decision: Decision) -> bool {
        decision <= self.decision()
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when the invocation only releases the stored session.
    pub fn is_cleanup_only(&self) -> bool {
        self.cleanup
            && self.document.is_none()
            && self.session.is_none()
            && self.extraction.is_none()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Collaborator URLs are not needed when reporting on a saved reply.
        // Values left unset here are checked after the config merge.
        if self.extraction.is_none() {
            if let Some(ref url) = self.api_url {
                if !is_http_url(url) {
                    return Err("API URL must start with 'http://' or 'https://'".to_string());
                }
            }
            if let Some(ref url) = self.ollama_url {
                if !is_http_url(url) {
                    return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref document) = self.document {
            if !document.is_file() {
                return Err(format!("Document does not exist: {}", document.display()));
            }
            if document.extension().is_none() {
                return Err(format!(
                    "Document has no file extension: {}",
                    document.display()
                ));
            }
        }

        if let Some(ref extraction) = self.extraction {
            if !extraction.is_file() {
                return Err(format!(
                    "Extraction file does not exist: {}",
                    extraction.display()
                ));
            }
        }

        if let Some(ref session) = self.session {
            if session.trim().is_empty() {
                return Err("Session identifier cannot be empty".to_string());
            }
        }

        self.evaluation_time()?;

        Ok(())
    }

    /// Evaluation time for deadlines: `--as-of`, or now.
    pub fn evaluation_time(&self) -> Result<DateTime<Utc>, String> {
        match self.as_of {
            Some(ref raw) => parse_datetime(raw.trim())
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| format!("Invalid --as-of value: {}", raw)),
            None => Ok(Utc::now()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            document: None,
            session: Some("1718200000".to_string()),
            extraction: None,
            output: None,
            format: None,
            api_url: None,
            model: None,
            ollama_url: None,
            temperature: None,
            timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            print: false,
            export_pdf: false,
            export_dir: None,
            as_of: None,
            fail_on: None,
            cleanup: false,
            show_coercions: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:5000".to_string());
        assert!(args.validate().is_err());

        // Not needed for a saved extraction
        let dir = tempfile::tempdir().unwrap();
        let reply = dir.path().join("reply.json");
        std::fs::write(&reply, "{}").unwrap();
        args.session = None;
        args.extraction = Some(reply);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_unset_collaborators_stay_unset() {
        let args = Args::try_parse_from(["rfpaudit", "--session", "42"]).unwrap();
        assert_eq!(args.session.as_deref(), Some("42"));
        assert_eq!(args.temperature, None);
        assert!(args.validate().is_ok());

        let args = Args::try_parse_from([
            "rfpaudit",
            "--session",
            "42",
            "--temperature",
            "0.4",
            "--model",
            "mistral:7b",
        ])
        .unwrap();
        assert_eq!(args.temperature, Some(0.4));
        assert_eq!(args.model.as_deref(), Some("mistral:7b"));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_document() {
        let mut args = make_args();
        args.session = None;
        args.document = Some(PathBuf::from("/nonexistent/rfp.pdf"));
        assert!(args.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("rfp.pdf");
        std::fs::write(&doc, b"%PDF").unwrap();
        args.document = Some(doc);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_temperature_and_timeout() {
        let mut args = make_args();
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_evaluation_time() {
        let mut args = make_args();
        args.as_of = Some("2024-06-12".to_string());
        let when = args.evaluation_time().unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap());

        args.as_of = Some("2024-06-12T09:30:00".to_string());
        let when = args.evaluation_time().unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2024, 6, 12, 9, 30, 0).unwrap());

        args.as_of = Some("next tuesday".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_fail_on_threshold() {
        assert!(FailOnLevel::DoNotProceed.is_reached_by(Decision::DoNotProceed));
        assert!(!FailOnLevel::DoNotProceed.is_reached_by(Decision::Conditional));
        assert!(FailOnLevel::Conditional.is_reached_by(Decision::Conditional));
        assert!(FailOnLevel::Conditional.is_reached_by(Decision::DoNotProceed));
        assert!(!FailOnLevel::Conditional.is_reached_by(Decision::Proceed));
    }

    #[test]
    fn test_output_format_from_name() {
        assert_eq!(OutputFormat::from_name("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("html"), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::from_name("pdf"), None);
    }

    #[test]
    fn test_cleanup_only() {
        let mut args = make_args();
        args.cleanup = true;
        assert!(!args.is_cleanup_only());
        args.session = None;
        assert!(args.is_cleanup_only());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
