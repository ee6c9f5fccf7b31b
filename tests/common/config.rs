//! Test configuration helpers for loading .env credentials

use inbox_dl::config::MailboxConfig;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Load IMAP mailbox configuration from environment variables
///
/// Required environment variables:
/// - `EMAIL_ADDRESS` - Login name
/// - `APP_PASSWORD` - App-specific password
///
/// Optional environment variables:
/// - `IMAP_SERVER` - Server hostname (default: imap.gmail.com)
/// - `IMAP_PORT` - TLS port (default: 993)
/// - `MAILBOX` - Folder to select (default: INBOX)
pub fn load_mailbox_config() -> Result<MailboxConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let username = std::env::var("EMAIL_ADDRESS")
        .map_err(|_| ConfigError("EMAIL_ADDRESS not set in environment".to_string()))?;
    let password = std::env::var("APP_PASSWORD")
        .map_err(|_| ConfigError("APP_PASSWORD not set in environment".to_string()))?;

    let defaults = MailboxConfig::default();
    Ok(MailboxConfig {
        host: std::env::var("IMAP_SERVER").unwrap_or(defaults.host),
        port: std::env::var("IMAP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port),
        username,
        password,
        mailbox: std::env::var("MAILBOX").unwrap_or(defaults.mailbox),
    })
}

/// Check whether live mailbox credentials are available
pub fn has_live_credentials() -> bool {
    load_mailbox_config().is_ok()
}
