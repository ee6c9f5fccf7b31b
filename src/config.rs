//! Configuration types for inbox-dl
//!
//! [`Config`] is built once at startup, normally from the process environment
//! via [`Config::from_env`], and handed to each component. Nothing below the
//! binary reads the environment directly.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Mailbox connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// IMAP server hostname (default: "imap.gmail.com")
    #[serde(default = "default_imap_host")]
    pub host: String,

    /// IMAP port, implicit TLS (default: 993)
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Login name, usually the email address
    #[serde(default)]
    pub username: String,

    /// App-scoped password
    #[serde(default)]
    pub password: String,

    /// Mailbox to watch (default: "INBOX")
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_imap_port(),
            username: String::new(),
            password: String::new(),
            mailbox: default_mailbox(),
        }
    }
}

/// Link extraction settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// String an anchor's href must equal or contain to be picked first.
    /// Empty disables the pattern pass.
    #[serde(default)]
    pub link_pattern: String,

    /// Regex matched against anchor text when no href matches (default: "(?i)download")
    #[serde(default = "default_text_pattern")]
    pub text_pattern: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            link_pattern: String::new(),
            text_pattern: default_text_pattern(),
        }
    }
}

/// Which link resolver to deploy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverMode {
    /// The extracted link is the archive itself
    #[default]
    Direct,
    /// The extracted link is a page whose download buttons only exist after scripts run
    Rendered,
}

impl FromStr for ResolverMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ResolverMode::Direct),
            "rendered" | "browser" => Ok(ResolverMode::Rendered),
            other => Err(Error::config(
                "RESOLVER_MODE",
                format!("unknown resolver mode '{other}', expected 'direct' or 'rendered'"),
            )),
        }
    }
}

/// Link resolution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Resolver variant (default: direct)
    #[serde(default)]
    pub mode: ResolverMode,

    /// WebDriver endpoint used by the rendered resolver (default: "http://localhost:4444")
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// How long to wait for a clickable download element (default: 10 seconds)
    #[serde(default = "default_render_timeout", with = "duration_serde")]
    pub render_timeout: Duration,

    /// Partial link text identifying download buttons (default: "DOWNLOAD")
    #[serde(default = "default_download_text")]
    pub download_text: String,

    /// Ask the browser to run without a window (default: true)
    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: ResolverMode::default(),
            webdriver_url: default_webdriver_url(),
            render_timeout: default_render_timeout(),
            download_text: default_download_text(),
            headless: true,
        }
    }
}

/// What to do when a download target already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Append (1), (2), etc. to the filename
    Rename,
    /// Leave the existing file and skip the download
    Skip,
}

impl FromStr for FileCollisionAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(FileCollisionAction::Overwrite),
            "rename" => Ok(FileCollisionAction::Rename),
            "skip" => Ok(FileCollisionAction::Skip),
            other => Err(Error::config(
                "FILE_COLLISION",
                format!("unknown collision action '{other}'"),
            )),
        }
    }
}

/// Archive download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory downloads are written into (default: ".")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Substring the response content-type must contain (default: "application/zip")
    #[serde(default = "default_content_type")]
    pub expected_content_type: String,

    /// Overall request timeout (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            expected_content_type: default_content_type(),
            request_timeout: default_request_timeout(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Main configuration for the mailbox watcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Mailbox connection settings
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Link extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Link resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Archive download settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Delay between poll cycles (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            extraction: ExtractionConfig::default(),
            resolver: ResolverConfig::default(),
            fetch: FetchConfig::default(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Config {
    /// Build configuration from process environment variables.
    ///
    /// Unset variables fall back to defaults. Credentials are not
    /// checked here: a missing password shows up as a failed login each cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a numeric or enum variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("IMAP_SERVER") {
            config.mailbox.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "IMAP_PORT")? {
            config.mailbox.port = port;
        }
        if let Some(username) = lookup("EMAIL_ADDRESS") {
            config.mailbox.username = username;
        }
        if let Some(password) = lookup("APP_PASSWORD") {
            config.mailbox.password = password;
        }
        if let Some(mailbox) = lookup("MAILBOX") {
            config.mailbox.mailbox = mailbox;
        }

        if let Some(pattern) = lookup("DOWNLOAD_LINK_PATTERN") {
            config.extraction.link_pattern = pattern;
        }
        if let Some(pattern) = lookup("DOWNLOAD_TEXT_PATTERN") {
            regex::Regex::new(&pattern).map_err(|e| {
                Error::config("DOWNLOAD_TEXT_PATTERN", format!("invalid regex: {e}"))
            })?;
            config.extraction.text_pattern = pattern;
        }

        if let Some(mode) = parse_var::<ResolverMode>(&lookup, "RESOLVER_MODE")? {
            config.resolver.mode = mode;
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            config.resolver.webdriver_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RENDER_TIMEOUT")? {
            config.resolver.render_timeout = Duration::from_secs(secs);
        }
        if let Some(text) = lookup("DOWNLOAD_BUTTON_TEXT") {
            config.resolver.download_text = text;
        }
        if let Some(headless) = parse_var::<bool>(&lookup, "BROWSER_HEADLESS")? {
            config.resolver.headless = headless;
        }

        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            config.fetch.download_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "DOWNLOAD_TIMEOUT")? {
            config.fetch.request_timeout = Duration::from_secs(secs);
        }
        if let Some(action) = parse_var::<FileCollisionAction>(&lookup, "FILE_COLLISION")? {
            config.fetch.file_collision = action;
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "CHECK_INTERVAL")? {
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Parse an optional variable, turning parse failures into keyed config errors
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(key, format!("invalid value '{raw}' for {key}: {e}"))),
    }
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_imap_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_text_pattern() -> String {
    "(?i)download".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_render_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_download_text() -> String {
    "DOWNLOAD".to_string()
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_content_type() -> String {
    "application/zip".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
