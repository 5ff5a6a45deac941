use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // LLM configuration (OpenAI-compatible: OpenAI, Ollama, LM Studio, vLLM, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    // Embeddings (same API family as the LLM endpoint)
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    // Web search (Tavily)
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default = "default_max_web_results")]
    pub max_web_results: usize,

    // Local knowledge base
    #[serde(default = "default_games_dir")]
    pub games_dir: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    // Retrieval loop tunables
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_temperature() -> f32 {
    0.3
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_max_web_results() -> usize {
    3
}

fn default_games_dir() -> String {
    "./games".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_max_candidates() -> usize {
    5
}

fn default_confidence_threshold() -> f32 {
    0.7
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            llm_temperature: default_llm_temperature(),
            embedding_model: default_embedding_model(),
            tavily_api_key: None,
            max_web_results: default_max_web_results(),
            games_dir: default_games_dir(),
            data_dir: default_data_dir(),
            max_candidates: default_max_candidates(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl AgentConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("gamesage.toml")
    }

    /// Load config from gamesage.toml next to the executable, falling back
    /// to defaults, with environment variables overlaid either way.
    pub fn load() -> Self {
        let path = Self::config_path();

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse_file(&path, &contents).apply_env(),
            Err(_) => {
                tracing::warn!("No config file found at {:?}, using defaults + env vars", path);
                Self::default().apply_env()
            }
        }
    }

    /// Parse file contents, falling back to defaults on a malformed file.
    /// A file that exists but does not parse is reported as malformed, not
    /// as missing.
    fn parse_file(path: &Path, contents: &str) -> Self {
        match toml::from_str::<AgentConfig>(contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!(
                    "Config file {:?} is malformed, using defaults + env vars: {}",
                    path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Overlay environment variables on top of whatever was loaded.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = env::var("LLM_API_URL") {
            self.llm_api_url = url;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm_model = model;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm_api_key = Some(key);
            }
        }

        if let Ok(key) = env::var("TAVILY_API_KEY") {
            if !key.trim().is_empty() {
                self.tavily_api_key = Some(key);
            }
        }

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding_model = model;
        }

        if let Ok(dir) = env::var("GAMES_DIRECTORY") {
            if !dir.trim().is_empty() {
                self.games_dir = dir;
            }
        }

        if let Ok(dir) = env::var("AGENT_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }

        if let Ok(n) = env::var("DEFAULT_SEARCH_RESULTS") {
            if let Ok(n) = n.parse() {
                self.max_candidates = n;
            }
        }

        if let Ok(t) = env::var("CONFIDENCE_THRESHOLD") {
            if let Ok(t) = t.parse() {
                self.confidence_threshold = t;
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: AgentConfig = toml::from_str("llm_model = \"llama3\"").unwrap();
        assert_eq!(config.llm_model, "llama3");
        assert_eq!(config.max_candidates, 5);
        assert!((config.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = AgentConfig::default();
        let s = toml::to_string_pretty(&config).unwrap();
        let back: AgentConfig = toml::from_str(&s).unwrap();
        assert_eq!(back.llm_model, config.llm_model);
        assert_eq!(back.games_dir, config.games_dir);
    }

    #[test]
    fn well_formed_file_contents_are_parsed() {
        let config =
            AgentConfig::parse_file(Path::new("gamesage.toml"), "llm_model = \"llama3\"");
        assert_eq!(config.llm_model, "llama3");
    }

    #[test]
    fn malformed_file_contents_fall_back_to_defaults() {
        let config = AgentConfig::parse_file(Path::new("gamesage.toml"), "llm_model = [broken");
        assert_eq!(config.llm_model, default_llm_model());
        assert_eq!(config.max_candidates, default_max_candidates());
    }
}
