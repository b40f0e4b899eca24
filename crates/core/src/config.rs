//! Configuration management for the Marketing Insight Agent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config files (.insight/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. The configuration is workspace-centric: relative paths
//! (vector index, dataset storage) are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the generation capability can be built from.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Severity names accepted by `refinement.severityThreshold`.
pub const SEVERITY_LEVELS: [&str; 3] = ["low", "medium", "high"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .insight/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider ("ollama" or "gemini")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// Optional endpoint override for the generation provider
    pub endpoint: Option<String>,

    /// API key for the generation provider
    pub api_key: Option<String>,

    /// Sampling temperature for every generation call
    pub temperature: f32,

    /// Output token cap for every generation call
    pub max_output_tokens: u32,

    /// Per-request HTTP timeout for the generation provider, in milliseconds
    pub request_timeout_ms: u64,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub graph: GraphConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub refinement: RefinementConfig,
    pub agent: AgentConfig,
}

/// Neo4j connection settings for concept lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Set to false to skip graph-guided retrieval entirely
    pub enabled: bool,

    /// Base URL of the Neo4j HTTP API (e.g., http://localhost:7474)
    pub endpoint: String,

    pub database: String,
    pub user: String,
    pub password: Option<String>,

    /// Maximum number of concept hints per query
    pub concept_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            user: "neo4j".to_string(),
            password: None,
            concept_limit: 5,
        }
    }
}

/// Blog passage index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorConfig {
    /// LanceDB directory, relative to the workspace unless absolute
    pub index_dir: PathBuf,

    pub table: String,

    /// Embedding provider: "trigram" (offline) or "ollama"
    pub embedding_provider: String,

    pub embedding_model: String,
    pub dimensions: usize,

    /// Ollama endpoint used by the "ollama" embedding provider
    pub embedding_endpoint: String,

    /// Number of passages requested from similarity search
    pub k: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("blogs/lance_index"),
            table: "blog_chunks".to_string(),
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            dimensions: 384,
            embedding_endpoint: "http://localhost:11434".to_string(),
            k: 3,
        }
    }
}

/// Evidence fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Additive score boost for chunks confirmed by a concept hint
    pub graph_boost: f32,

    /// Maximum number of evidence chunks kept after fusion
    pub max_evidence: usize,

    /// Per-source timeout for graph and vector lookups
    pub source_timeout_ms: u64,

    /// Fetch passages for concept hints that semantic search missed
    pub hydrate_hints: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            graph_boost: 0.05,
            max_evidence: 5,
            source_timeout_ms: 5_000,
            hydrate_hints: true,
        }
    }
}

/// Prompt context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextConfig {
    /// Hard cap on the structured summary, in characters
    pub summary_max_chars: usize,

    pub evidence_separator: String,

    /// Substituted when the structured summary cannot be produced
    pub summary_placeholder: String,

    pub summarizer_timeout_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            summary_max_chars: 2000,
            evidence_separator: "\n\n".to_string(),
            summary_placeholder: "Could not summarize CSV.".to_string(),
            summarizer_timeout_ms: 5_000,
        }
    }
}

/// Critique-revise loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefinementConfig {
    pub max_iterations: usize,

    /// Issues below this severity never trigger a revision ("low", "medium", "high")
    pub severity_threshold: String,

    /// "heuristic" or "llm"
    pub critic: String,

    /// Answers longer than this many words are flagged as verbose
    pub max_answer_words: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            severity_threshold: "medium".to_string(),
            critic: "heuristic".to_string(),
            max_answer_words: 250,
        }
    }
}

/// Request-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Overall deadline for one answer, in milliseconds
    pub deadline_ms: u64,

    /// Directory holding uploaded campaign CSVs, relative to the workspace
    pub dataset_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 60_000,
            dataset_dir: PathBuf::from("tmp/csvs"),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    graph: Option<GraphConfig>,
    vector: Option<VectorConfig>,
    retrieval: Option<RetrievalConfig>,
    context: Option<ContextConfig>,
    refinement: Option<RefinementConfig>,
    agent: Option<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            temperature: 0.3,
            max_output_tokens: 2048,
            request_timeout_ms: 60_000,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            graph: GraphConfig::default(),
            vector: VectorConfig::default(),
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
            refinement: RefinementConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_WORKSPACE`: Override workspace path
    /// - `INSIGHT_CONFIG`: Path to config file
    /// - `INSIGHT_PROVIDER`: Generation provider
    /// - `INSIGHT_MODEL`: Model identifier
    /// - `INSIGHT_API_KEY` / `GOOGLE_API_KEY`: API key
    /// - `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`: Graph connection
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use insight_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with explicit workspace and config file
    /// paths taking precedence over the environment.
    pub fn load_from(
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
    ) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace = workspace.or_else(|| env_path("INSIGHT_WORKSPACE"));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_path("INSIGHT_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.insight_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env();

        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) {
        if let Ok(provider) = std::env::var("INSIGHT_PROVIDER") {
            self.provider = provider;
        }

        if let Ok(model) = std::env::var("INSIGHT_MODEL") {
            self.model = model;
        }

        if let Ok(key) = std::env::var("INSIGHT_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() && self.provider == "gemini" {
            self.api_key = std::env::var("GOOGLE_API_KEY").ok();
        }

        if let Ok(uri) = std::env::var("NEO4J_URI") {
            self.graph.endpoint = uri;
        }

        if let Ok(user) = std::env::var("NEO4J_USER") {
            self.graph.user = user;
        }

        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_json = format.eq_ignore_ascii_case("json");
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if let Some(env_var) = llm.api_key_env {
                if let Ok(key) = std::env::var(&env_var) {
                    result.api_key = Some(key);
                }
            }
            if let Some(temperature) = llm.temperature {
                result.temperature = temperature;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                result.max_output_tokens = max_output_tokens;
            }
            if let Some(request_timeout_ms) = llm.request_timeout_ms {
                result.request_timeout_ms = request_timeout_ms;
            }
        }

        if let Some(graph) = config_file.graph {
            result.graph = graph;
        }
        if let Some(vector) = config_file.vector {
            result.vector = vector;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(context) = config_file.context {
            result.context = context;
        }
        if let Some(refinement) = config_file.refinement {
            result.refinement = refinement;
        }
        if let Some(agent) = config_file.agent {
            result.agent = agent;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .insight directory.
    pub fn insight_dir(&self) -> PathBuf {
        self.workspace.join(".insight")
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Absolute path of the LanceDB blog index.
    pub fn vector_index_path(&self) -> PathBuf {
        self.resolve(&self.vector.index_dir)
    }

    /// Absolute path of the campaign CSV directory.
    pub fn dataset_dir(&self) -> PathBuf {
        self.resolve(&self.agent.dataset_dir)
    }

    /// Validate the configuration before building any service.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.provider == "gemini" && self.api_key.is_none() {
            return Err(AppError::Config(
                "Gemini provider requires GOOGLE_API_KEY or INSIGHT_API_KEY".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "llm.requestTimeoutMs must be at least 1".to_string(),
            ));
        }

        if !self.retrieval.graph_boost.is_finite() || self.retrieval.graph_boost < 0.0 {
            return Err(AppError::Config(format!(
                "retrieval.graphBoost must be a non-negative number, got {}",
                self.retrieval.graph_boost
            )));
        }

        if self.retrieval.max_evidence == 0 {
            return Err(AppError::Config(
                "retrieval.maxEvidence must be at least 1".to_string(),
            ));
        }

        if self.context.summary_max_chars == 0 {
            return Err(AppError::Config(
                "context.summaryMaxChars must be at least 1".to_string(),
            ));
        }

        let threshold = self.refinement.severity_threshold.to_lowercase();
        if !SEVERITY_LEVELS.contains(&threshold.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown severity threshold: {}. Supported: {}",
                self.refinement.severity_threshold,
                SEVERITY_LEVELS.join(", ")
            )));
        }

        if !["heuristic", "llm"].contains(&self.refinement.critic.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown critic: {}. Supported: heuristic, llm",
                self.refinement.critic
            )));
        }

        Ok(())
    }
}
