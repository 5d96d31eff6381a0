//! Configuration resolution.
//!
//! Merges CLI flags, process environment, an optional YAML file and an
//! optional `.env` file into one [`EffectiveConfig`]. Precedence is per
//! field: CLI > environment > YAML > `.env` > built-in default. Resolution
//! happens once at startup and every failure is fatal.

use crate::tools::{unknown_tools, ToolCatalog, DEFAULT_ENABLED_TOOLS};
use crate::types::{
    AuthMode, Credentials, EffectiveConfig, Error, Result, DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
};
use crate::validation::{parse_timeout, parse_tool_list, validate_base_url};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_BASE_URL: &str = "LIGHTRAG_BASE_URL";
pub const ENV_API_KEY: &str = "LIGHTRAG_API_KEY";
pub const ENV_TOOLS: &str = "LIGHTRAG_TOOLS";
pub const ENV_AUTH_MODE: &str = "LIGHTRAG_AUTH_MODE";
pub const ENV_USERNAME: &str = "LIGHTRAG_USERNAME";
pub const ENV_PASSWORD: &str = "LIGHTRAG_PASSWORD";
pub const ENV_TIMEOUT: &str = "LIGHTRAG_TIMEOUT";
/// Path of the YAML config file, below `--config`.
pub const ENV_CONFIG_PATH: &str = "LIGHTRAG_MCP_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "lightrag-mcp.yaml";
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Enable-list entry selecting the whole catalog.
pub const ALL_TOOLS: &str = "all";

/// Values given on the command line. `None` means the flag was not passed.
#[derive(Clone, Default)]
pub struct CliOverrides {
    pub service_url: Option<String>,
    pub key: Option<String>,
    pub tools: Option<String>,
    pub auth_mode: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<String>,
    pub config_file: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

impl fmt::Debug for CliOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliOverrides")
            .field("service_url", &self.service_url)
            .field("key", &redacted(&self.key))
            .field("tools", &self.tools)
            .field("auth_mode", &self.auth_mode)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("timeout", &self.timeout)
            .field("config_file", &self.config_file)
            .field("env_file", &self.env_file)
            .finish()
    }
}

/// Timeout as written in YAML: a number of seconds or a humantime string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum YamlTimeout {
    Seconds(u64),
    Text(String),
}

impl YamlTimeout {
    fn as_text(&self) -> String {
        match self {
            YamlTimeout::Seconds(secs) => secs.to_string(),
            YamlTimeout::Text(text) => text.clone(),
        }
    }
}

/// Contents of the YAML config file.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// `Some(empty)` when the key is present but every entry is commented out.
    #[serde(default, deserialize_with = "nullable_list")]
    pub enabled_tools: Option<Vec<String>>,
    pub auth_mode: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<YamlTimeout>,
}

impl YamlConfig {
    pub fn parse(content: &str) -> Result<Self> {
        // Empty or comment-only documents parse as null.
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content).map_err(|e| {
            Error::configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }
}

impl fmt::Debug for YamlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YamlConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("enabled_tools", &self.enabled_tools)
            .field("auth_mode", &self.auth_mode)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn nullable_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(Some(items.unwrap_or_default().into_iter().flatten().collect()))
}

/// Every raw input to resolution, gathered before any merging.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub cli: CliOverrides,
    /// `LIGHTRAG_*` process environment variables.
    pub env: HashMap<String, String>,
    pub yaml: Option<YamlConfig>,
    /// `.env` entries, kept apart from the process environment.
    pub dotenv: HashMap<String, String>,
}

impl ConfigSources {
    /// Gather from the real process environment and working directory.
    pub fn gather(cli: CliOverrides) -> Result<Self> {
        let env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::load(cli, env, Path::new("."))
    }

    /// Gather using the given environment, looking for default files in `dir`.
    ///
    /// An explicitly named file (flag or env var) that cannot be read is an
    /// error; a missing default file is skipped.
    pub fn load<I>(cli: CliOverrides, env: I, dir: &Path) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: HashMap<String, String> = env
            .into_iter()
            .filter(|(key, _)| key.starts_with("LIGHTRAG_"))
            .collect();

        let yaml_path = cli
            .config_file
            .clone()
            .or_else(|| non_empty(env.get(ENV_CONFIG_PATH)).map(PathBuf::from))
            .or_else(|| existing(dir.join(DEFAULT_CONFIG_FILE)));
        let yaml = match yaml_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading YAML config");
                Some(YamlConfig::load(&path)?)
            }
            None => None,
        };

        let env_path = cli
            .env_file
            .clone()
            .or_else(|| existing(dir.join(DEFAULT_ENV_FILE)));
        let dotenv = match env_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading .env file");
                load_dotenv(&path)?
            }
            None => HashMap::new(),
        };

        Ok(Self {
            cli,
            env,
            yaml,
            dotenv,
        })
    }

    /// First non-empty value for a field, in precedence order.
    fn pick(&self, cli: &Option<String>, env_key: &str, yaml: Option<&String>) -> Option<String> {
        non_empty(cli.as_ref())
            .or_else(|| non_empty(self.env.get(env_key)))
            .or_else(|| non_empty(yaml))
            .or_else(|| non_empty(self.dotenv.get(env_key)))
            .map(str::to_string)
    }

    fn yaml_field(&self, field: impl Fn(&YamlConfig) -> Option<&String>) -> Option<&String> {
        self.yaml.as_ref().and_then(field)
    }
}

fn load_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        Error::configuration(format!("cannot read env file {}: {}", path.display(), e))
    })?;
    iter.map(|item| {
        item.map_err(|e| Error::configuration(format!("invalid env file {}: {}", path.display(), e)))
    })
    .collect()
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<none>"
    }
}

/// Merge `sources` into the effective configuration.
///
/// Unknown tool names in any enable-list source are all reported in one
/// error, even when a higher-precedence list wins.
pub fn resolve(sources: &ConfigSources, catalog: &ToolCatalog) -> Result<EffectiveConfig> {
    let cli = &sources.cli;

    let base_url = sources
        .pick(&cli.service_url, ENV_BASE_URL, sources.yaml_field(|y| y.base_url.as_ref()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = validate_base_url(&base_url)?;

    let api_key = sources.pick(&cli.key, ENV_API_KEY, sources.yaml_field(|y| y.api_key.as_ref()));
    let username = sources.pick(&cli.username, ENV_USERNAME, sources.yaml_field(|y| y.username.as_ref()));
    let password = sources.pick(&cli.password, ENV_PASSWORD, sources.yaml_field(|y| y.password.as_ref()));
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (Some(_), None) | (None, Some(_)) => {
            return Err(Error::configuration(
                "username and password must both be set (--username/--password or LIGHTRAG_USERNAME/LIGHTRAG_PASSWORD)",
            ))
        }
        (None, None) => None,
    };

    let explicit_mode = sources
        .pick(&cli.auth_mode, ENV_AUTH_MODE, sources.yaml_field(|y| y.auth_mode.as_ref()))
        .map(|raw| raw.parse::<AuthMode>().map_err(Error::configuration))
        .transpose()?;
    let auth_mode = match explicit_mode {
        Some(AuthMode::ApiKeyHeader) if api_key.is_none() => {
            return Err(Error::configuration(
                "auth mode api_key_header requires an API key (--key or LIGHTRAG_API_KEY)",
            ))
        }
        Some(AuthMode::Oauth2Bearer) if credentials.is_none() => {
            return Err(Error::configuration(
                "auth mode oauth2_bearer requires a username and password",
            ))
        }
        Some(mode) => mode,
        None if credentials.is_some() => AuthMode::Oauth2Bearer,
        None if api_key.is_some() => AuthMode::ApiKeyHeader,
        None => AuthMode::None,
    };

    let yaml_timeout = sources
        .yaml
        .as_ref()
        .and_then(|y| y.timeout.as_ref())
        .map(YamlTimeout::as_text);
    let timeout = match sources.pick(&cli.timeout, ENV_TIMEOUT, yaml_timeout.as_ref()) {
        Some(raw) => parse_timeout(&raw)?,
        None => DEFAULT_TIMEOUT,
    };

    let enabled_tools = resolve_tools(sources, catalog)?;

    Ok(EffectiveConfig {
        base_url,
        api_key,
        auth_mode,
        credentials,
        enabled_tools,
        timeout,
    })
}

fn resolve_tools(sources: &ConfigSources, catalog: &ToolCatalog) -> Result<BTreeSet<String>> {
    // Every present list, highest precedence first.
    let mut lists: Vec<(&str, Vec<String>)> = Vec::new();
    if let Some(raw) = non_empty(sources.cli.tools.as_ref()) {
        lists.push(("--tools", parse_tool_list(raw)));
    }
    if let Some(raw) = non_empty(sources.env.get(ENV_TOOLS)) {
        lists.push((ENV_TOOLS, parse_tool_list(raw)));
    }
    if let Some(list) = sources.yaml.as_ref().and_then(|y| y.enabled_tools.as_ref()) {
        let names = list
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        lists.push(("YAML enabled_tools", names));
    }
    if let Some(raw) = non_empty(sources.dotenv.get(ENV_TOOLS)) {
        lists.push((".env LIGHTRAG_TOOLS", parse_tool_list(raw)));
    }

    let problems: Vec<String> = lists
        .iter()
        .filter_map(|(origin, names)| {
            let named: Vec<String> = names
                .iter()
                .filter(|name| !name.eq_ignore_ascii_case(ALL_TOOLS))
                .cloned()
                .collect();
            let unknown = unknown_tools(catalog, &named);
            (!unknown.is_empty()).then(|| format!("{} in {}", unknown.join(", "), origin))
        })
        .collect();
    if !problems.is_empty() {
        return Err(Error::configuration(format!(
            "unknown tool name(s): {}. Available tools: {}",
            problems.join("; "),
            catalog.names().join(", ")
        )));
    }

    let Some((origin, names)) = lists.into_iter().next() else {
        debug!("No enable-list configured, using default tools");
        return Ok(DEFAULT_ENABLED_TOOLS.iter().map(|s| s.to_string()).collect());
    };
    if names.is_empty() {
        warn!(origin, "Enable-list has no active entries; no tools are enabled");
    }

    debug!(origin, "Enabled tools selected");
    if names.iter().any(|name| name.eq_ignore_ascii_case(ALL_TOOLS)) {
        return Ok(catalog.names().into_iter().collect());
    }
    Ok(names.into_iter().collect())
}
