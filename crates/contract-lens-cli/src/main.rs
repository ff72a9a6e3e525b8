use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use contract_lens_core::{
    backend_from_settings, extract_text, render_report, templates, AnalysisConfig, Analyzer,
    DocumentFormat, GenerativeBackend, HumanReport, LlmSettings, OfflineBackend, OutputFormat,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "contract-lens",
    author,
    version,
    about = "Plain-language risk review for legal documents"
)]
struct Cli {
    /// Optional configuration file (TOML, YAML or JSON) with [llm] and [analysis] sections
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Full analysis: summary, clauses, recommendations and risk assessment
    Analyze {
        /// Document to analyse (.txt or .pdf)
        file: PathBuf,
    },
    /// Pattern-based risk assessment only; never calls the generative backend
    Risk {
        file: PathBuf,
    },
    /// Ask a question about a document
    Ask {
        file: PathBuf,
        #[arg(long, short)]
        question: String,
    },
    /// Compare two documents side by side
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// List the document templates and their key questions
    Templates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
    Yaml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    llm: LlmFileConfig,
    analysis: AnalysisFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmFileConfig {
    provider: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    deployment: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl LlmFileConfig {
    /// File values keyed by the environment variable each one stands in for.
    fn into_vars(self) -> HashMap<String, String> {
        let entries = [
            (LlmSettings::PROVIDER_ENV, self.provider),
            (LlmSettings::API_KEY_ENV, self.api_key),
            (LlmSettings::ENDPOINT_ENV, self.endpoint),
            (LlmSettings::MODEL_ENV, self.model),
            (LlmSettings::DEPLOYMENT_ENV, self.deployment),
            (LlmSettings::API_VERSION_ENV, self.api_version),
            (
                LlmSettings::TIMEOUT_ENV,
                self.timeout_secs.map(|v| v.to_string()),
            ),
            (
                LlmSettings::RETRIES_ENV,
                self.max_retries.map(|v| v.to_string()),
            ),
            (
                LlmSettings::MAX_TOKENS_ENV,
                self.max_tokens.map(|v| v.to_string()),
            ),
            (
                LlmSettings::TEMPERATURE_ENV,
                self.temperature.map(|v| v.to_string()),
            ),
        ];
        entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisFileConfig {
    /// humantime duration, e.g. "45s" or "2m"
    backend_timeout: Option<String>,
    excerpt_chars: Option<usize>,
    chat_excerpt_chars: Option<usize>,
    salvage_excerpt_chars: Option<usize>,
    summary_chars: Option<usize>,
}

impl AnalysisFileConfig {
    fn into_config(self) -> Result<AnalysisConfig> {
        let mut config = AnalysisConfig::default();
        if let Some(raw) = self.backend_timeout {
            config.backend_timeout = humantime::parse_duration(&raw)
                .with_context(|| format!("invalid analysis.backend_timeout `{raw}`"))?;
        }
        if config.backend_timeout == Duration::ZERO {
            return Err(anyhow!("analysis.backend_timeout must be greater than zero"));
        }
        if let Some(value) = self.excerpt_chars {
            config.excerpt_chars = value;
        }
        if let Some(value) = self.chat_excerpt_chars {
            config.chat_excerpt_chars = value;
        }
        if let Some(value) = self.salvage_excerpt_chars {
            config.salvage_excerpt_chars = value;
        }
        if let Some(value) = self.summary_chars {
            config.summary_chars = value;
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let file_config = load_file_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Templates => emit(templates::all(), cli.format)?,
        Commands::Risk { file } => {
            let text = read_document(&file)?;
            let assessment = Analyzer::offline().assess_risks(&text);
            emit(&assessment, cli.format)?;
        }
        Commands::Analyze { file } => {
            let analyzer = build_analyzer(file_config)?;
            let text = read_document(&file)?;
            let analysis = analyzer.analyze(&text, &display_name(&file)).await;
            emit(&analysis, cli.format)?;
        }
        Commands::Ask { file, question } => {
            let analyzer = build_analyzer(file_config)?;
            let text = read_document(&file)?;
            let analysis = analyzer.analyze(&text, &display_name(&file)).await;
            let answer = analyzer.answer_question(&question, &text, &analysis).await;
            emit(&answer, cli.format)?;
        }
        Commands::Compare { first, second } => {
            let analyzer = build_analyzer(file_config)?;
            let text_a = read_document(&first)?;
            let text_b = read_document(&second)?;
            let result = analyzer
                .compare_documents(
                    &text_a,
                    &display_name(&first),
                    &text_b,
                    &display_name(&second),
                )
                .await;
            emit(&result, cli.format)?;
        }
    }
    Ok(())
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .and_then(|cfg| cfg.try_deserialize::<FileConfig>())
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Environment variables take precedence over the configuration file.
fn build_analyzer(file_config: FileConfig) -> Result<Analyzer> {
    let analysis = file_config.analysis.into_config()?;
    let mut vars = file_config.llm.into_vars();
    vars.extend(std::env::vars());

    let backend: Arc<dyn GenerativeBackend> =
        match LlmSettings::from_vars(vars).and_then(|settings| backend_from_settings(&settings)) {
            Ok(backend) => backend,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(error = %reason, "generative backend unavailable; using offline analysis");
                Arc::new(OfflineBackend)
            }
        };
    info!(backend = backend.name(), "analyzer ready");
    Ok(Analyzer::new(backend).with_config(analysis))
}

fn read_document(path: &Path) -> Result<String> {
    let format = DocumentFormat::detect(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    extract_text(&bytes, format)
        .with_context(|| format!("failed to extract text from {}", path.display()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn emit<T>(value: &T, format: Format) -> Result<()>
where
    T: HumanReport + Serialize + ?Sized,
{
    let output = match format {
        Format::Human => render_report(value, OutputFormat::Human)?,
        Format::Json => render_report(value, OutputFormat::Json)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
