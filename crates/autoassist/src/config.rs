use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use autoassist_core::BudgetScope;
use autoassist_core::DEFAULT_PROMPT;
use autoassist_core::budget::{
    DEFAULT_MARKER_RESERVE, DEFAULT_OUTPUT_BUDGET, OutputBudget,
};
use autoassist_core::env_store::EnvStore;
use autoassist_core::tool::CollisionPolicy;
use serde::Deserialize;

use crate::tools::{CORE_MODULE, WEB_MODULE};

/// The configuration file read when no other path is given.
pub const DEFAULT_CONFIG_PATH: &str = "autoassist.toml";

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_OBJECTIVE: &str = "\
You are the editor of a publication focused on the latest trends in music.
Stay Current: Continuously track emerging trends, new releases, and \
developments across genres, artists, and platforms.
Explore & Discover: Investigate new music technologies, production tools, \
genres, artists, albums, and events. Identify valuable insights and \
breaking news to feature in your content.
Deepen the Scope: Organically expand your coverage as new styles, \
innovations, or movements surface within the industry.
Audience Assumption: Write with the understanding that your readers are \
knowledgeable about music and trends. They likely have an intermediate or \
higher level of expertise.
Be Specific & Engaging: Avoid generalities. Focus on fresh perspectives, \
deep insights, and detailed breakdowns (e.g., production techniques, \
lyrics analysis, trends). Provide actionable content where relevant \
(e.g., playlists, recommendations, event coverage).
Tone & Style: Maintain a joyful, energetic, and playful voice to create an \
engaging and immersive reading experience.
";

/// The error returned when the configuration file cannot be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but cannot be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not a valid configuration.
    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },
}

/// Settings of the assistant, read from a TOML file.
///
/// Every field has a default, so a partial file (or no file at all) is a
/// valid configuration. Secrets are not part of it, they are read from the
/// environment.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// What the assistant works toward. Becomes part of its instructions.
    pub objective: String,
    /// The model that runs the assistant.
    pub model: String,
    /// The text sent at the start of every turn.
    pub prompt: String,
    /// Tool modules to install, in load order.
    pub modules: Vec<String>,
    /// The directory tools store their files in.
    pub outputs_dir: PathBuf,
    /// The directory raw tool outputs are logged to.
    pub logs_dir: PathBuf,
    /// The file the remote identifiers are kept in.
    pub env_file: PathBuf,
    /// Delay between two polls of a run, in milliseconds.
    pub poll_interval_ms: u64,
    /// Total bytes of tool output returned per budget scope.
    pub turn_output_budget: usize,
    /// Extra bytes reserved for truncation markers.
    pub marker_reserve: usize,
    /// When the output budget starts over.
    pub budget_scope: BudgetScope,
    /// Upper bound of a single tool call, in seconds. Unbounded if absent.
    pub tool_timeout_secs: Option<u64>,
    /// What to do when two modules provide the same tool.
    pub collision_policy: CollisionPolicy,
}

impl AppConfig {
    /// Loads the configuration from `path`. A missing file yields the
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Returns the delay between two polls of a run.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the upper bound of a single tool call.
    #[inline]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    /// Returns a fresh output budget with the configured limits.
    #[inline]
    pub fn output_budget(&self) -> OutputBudget {
        OutputBudget::new(self.turn_output_budget, self.marker_reserve)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            objective: DEFAULT_OBJECTIVE.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            prompt: DEFAULT_PROMPT.to_owned(),
            modules: vec![CORE_MODULE.to_owned(), WEB_MODULE.to_owned()],
            outputs_dir: PathBuf::from("outputs"),
            logs_dir: PathBuf::from("logs"),
            env_file: PathBuf::from(".env"),
            poll_interval_ms: 100,
            turn_output_budget: DEFAULT_OUTPUT_BUDGET,
            marker_reserve: DEFAULT_MARKER_RESERVE,
            budget_scope: BudgetScope::Turn,
            tool_timeout_secs: None,
            collision_policy: CollisionPolicy::Replace,
        }
    }
}

/// Reads a setting from the process environment, falling back to the
/// env file.
pub fn env_setting(store: &EnvStore, key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .or_else(|| store.get(key).map(str::to_owned))
}
