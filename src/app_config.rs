//! Configuration file and environment loading for CLI defaults.
//!
//! Precedence, lowest to highest: config file, `NETSCHOOL_*` environment
//! variables, command-line flags. The password is never read from the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use netschool_core::constants::DEFAULT_POLL_MULTIPLIER;
use netschool_core::{ClientOptions, PollPolicy};

/// Environment variable holding the account password.
pub const PASSWORD_ENV: &str = "NETSCHOOL_PASSWORD";

/// File-backed configuration; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Portal host, with or without scheme.
    pub host: Option<String>,
    /// Account login.
    pub login: Option<String>,
    /// School-selection form payload sent with the login.
    pub secondary: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Delay before the first report status poll, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Upper bound for a single poll delay, in milliseconds.
    pub poll_max_interval_ms: Option<u64>,
    /// Total wait budget for one report job, in seconds.
    pub poll_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        validate_range("poll_interval_ms", self.poll_interval_ms, 10, 60_000)?;
        validate_range("poll_max_interval_ms", self.poll_max_interval_ms, 10, 60_000)?;
        validate_range("poll_timeout_secs", self.poll_timeout_secs, 1, 3600)?;

        if let (Some(initial), Some(max)) = (self.poll_interval_ms, self.poll_max_interval_ms)
            && max < initial
        {
            bail!(
                "Invalid config value for `poll_max_interval_ms`: {max}. Must not be below `poll_interval_ms` ({initial})"
            );
        }
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            bail!("Invalid config value for `host`: must not be empty");
        }
        Ok(())
    }

    /// Overlays `NETSCHOOL_HOST`, `NETSCHOOL_LOGIN`, `NETSCHOOL_SECONDARY` and
    /// `NETSCHOOL_POLL_TIMEOUT_SECS` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = non_empty("NETSCHOOL_HOST") {
            self.host = Some(host);
        }
        if let Some(login) = non_empty("NETSCHOOL_LOGIN") {
            self.login = Some(login);
        }
        if let Some(secondary) = non_empty("NETSCHOOL_SECONDARY") {
            self.secondary = Some(secondary);
        }
        if let Some(raw) = non_empty("NETSCHOOL_POLL_TIMEOUT_SECS") {
            let parsed = parse_integer_u64(&raw)
                .context("Invalid `NETSCHOOL_POLL_TIMEOUT_SECS` environment value")?;
            self.poll_timeout_secs = Some(parsed);
        }
        self.validate()
    }

    /// Client options with every unset value at its library default.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        let poll = PollPolicy::new(
            self.poll_interval_ms
                .map_or(defaults.poll.initial_interval(), Duration::from_millis),
            DEFAULT_POLL_MULTIPLIER,
            self.poll_max_interval_ms
                .map_or(defaults.poll.max_interval(), Duration::from_millis),
            self.poll_timeout_secs
                .map_or(defaults.poll.timeout(), Duration::from_secs),
        );
        defaults.with_poll(poll).with_timeouts(
            self.connect_timeout_secs.unwrap_or(defaults.connect_timeout_secs),
            self.read_timeout_secs.unwrap_or(defaults.read_timeout_secs),
        )
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn default_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config, empty when no file was found.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/netschool/config.toml`
/// 2. `$HOME/.config/netschool/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("netschool")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("netschool")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` when given (it must exist), otherwise the default path
/// if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let string = || {
            parse_string_literal(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };
        let integer = || {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };

        match key {
            "host" => cfg.host = Some(string()?),
            "login" => cfg.login = Some(string()?),
            "secondary" => cfg.secondary = Some(string()?),
            "password" => {
                bail!(
                    "The password cannot be stored in the config file (line {line_no}); use {PASSWORD_ENV} or --password-stdin"
                );
            }
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(integer()?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(integer()?),
            "poll_interval_ms" => cfg.poll_interval_ms = Some(integer()?),
            "poll_max_interval_ms" => cfg.poll_max_interval_ms = Some(integer()?),
            "poll_timeout_secs" => cfg.poll_timeout_secs = Some(integer()?),
            "verbosity" => {
                let parsed = string()?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
host = "sgo.example.org"
verbosity = "verbose"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.host.as_deref(), Some("sgo.example.org"));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.login.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
secondary = "cid=2&sid=1#x" # school selection
poll_timeout_secs = 90 # slow portal
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.secondary.as_deref(), Some("cid=2&sid=1#x"));
        assert_eq!(cfg.poll_timeout_secs, Some(90));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key expected");
        assert!(err.to_string().contains("Unknown configuration key: 'concurrency' on line 1"));
    }

    #[test]
    fn test_parse_config_rejects_password() {
        let err = parse_config_str(r#"password = "secret""#).expect_err("password must be refused");
        assert!(err.to_string().contains(PASSWORD_ENV));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_timeout() {
        let err = parse_config_str("connect_timeout_secs = 0").expect_err("range error expected");
        assert!(err.to_string().contains("connect_timeout_secs"));
        assert!(err.to_string().contains("1..=3600"));
    }

    #[test]
    fn test_parse_config_rejects_negative_integer() {
        let err = parse_config_str("poll_interval_ms = -5").expect_err("negative value expected to fail");
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_parse_config_rejects_inverted_poll_bounds() {
        let err = parse_config_str("poll_interval_ms = 2000\npoll_max_interval_ms = 1000")
            .expect_err("max below initial expected to fail");
        assert!(err.to_string().contains("poll_max_interval_ms"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("login = ivan").expect_err("quoted string expected");
        assert!(err.to_string().contains("login"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("host").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_apply_env_overrides_file_values() {
        let mut cfg = parse_config_str(r#"host = "file.example.org""#).expect("config should parse");
        let env: HashMap<&str, &str> = [
            ("NETSCHOOL_HOST", "env.example.org"),
            ("NETSCHOOL_LOGIN", "ivan"),
            ("NETSCHOOL_SECONDARY", "  "),
            ("NETSCHOOL_POLL_TIMEOUT_SECS", "120"),
        ]
        .into_iter()
        .collect();

        cfg.apply_env(|name| env.get(name).map(ToString::to_string))
            .expect("env overlay should apply");

        assert_eq!(cfg.host.as_deref(), Some("env.example.org"));
        assert_eq!(cfg.login.as_deref(), Some("ivan"));
        assert!(cfg.secondary.is_none());
        assert_eq!(cfg.poll_timeout_secs, Some(120));
    }

    #[test]
    fn test_apply_env_rejects_bad_poll_timeout() {
        let mut cfg = FileConfig::default();
        let err = cfg
            .apply_env(|name| (name == "NETSCHOOL_POLL_TIMEOUT_SECS").then(|| "soon".to_string()))
            .expect_err("non-numeric timeout expected to fail");
        assert!(err.to_string().contains("NETSCHOOL_POLL_TIMEOUT_SECS"));
    }

    #[test]
    fn test_client_options_defaults_and_overrides() {
        let defaults = FileConfig::default().client_options();
        assert_eq!(defaults.connect_timeout_secs, 10);
        assert_eq!(defaults.read_timeout_secs, 30);
        assert_eq!(defaults.poll.initial_interval(), Duration::from_millis(500));

        let cfg = FileConfig {
            read_timeout_secs: Some(5),
            poll_interval_ms: Some(250),
            poll_timeout_secs: Some(15),
            ..FileConfig::default()
        };
        let options = cfg.client_options();
        assert_eq!(options.read_timeout_secs, 5);
        assert_eq!(options.poll.initial_interval(), Duration::from_millis(250));
        assert_eq!(options.poll.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_verbosity_default_level() {
        assert_eq!(VerbositySetting::Default.default_level(), "info");
        assert_eq!(VerbositySetting::Verbose.default_level(), "debug");
        assert_eq!(VerbositySetting::Quiet.default_level(), "error");
        assert_eq!(VerbositySetting::Debug.default_level(), "trace");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "host = \"sgo.example.org\"\nread_timeout_secs = 45").expect("write config");

        let loaded = load_config(Some(file.path())).expect("config should load");
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.read_timeout_secs, Some(45));
        assert_eq!(loaded.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_config_explicit_missing_path_fails() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let err = load_config(Some(&dir.path().join("absent.toml"))).expect_err("missing file");
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
