//! Configuration for socksd
//!
//! The server takes its entire configuration from the command line; there
//! are no configuration files and no environment variables. Configuration
//! is immutable after startup and shared across sessions via `Arc`.

use thiserror::Error;

/// Default listening port when none is given on the command line
pub const DEFAULT_PORT: u16 = 1080;

/// Default timeout for outbound connection attempts, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors raised while interpreting command-line arguments
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The port argument did not parse as a number in 1..=65535
    #[error("invalid port number: {0}")]
    InvalidPort(String),

    /// A username or password was empty or longer than 255 bytes
    #[error("username and password must be 1 to 255 bytes")]
    InvalidCredential,

    /// Wrong number of arguments
    #[error("usage: socksd [port] [username password]")]
    Usage,
}

/// Username/password pair for RFC 1929 authentication.
///
/// Both fields are opaque byte strings of 1 to 255 bytes; the wire
/// comparison is byte-wise with no normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Expected username
    pub username: String,
    /// Expected password
    pub password: String,
}

impl Credentials {
    /// Create a credentials pair, validating the RFC 1929 length limits.
    pub fn new(username: String, password: String) -> Result<Self, ConfigError> {
        if username.is_empty()
            || username.len() > 255
            || password.is_empty()
            || password.len() > 255
        {
            return Err(ConfigError::InvalidCredential);
        }
        Ok(Credentials { username, password })
    }

    /// Compare the decoded wire username and password against this pair.
    pub fn matches(&self, username: &[u8], password: &[u8]) -> bool {
        self.username.as_bytes() == username && self.password.as_bytes() == password
    }
}

/// Process-wide server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the acceptors listen on
    pub port: u16,
    /// Credentials for username/password authentication. When absent,
    /// only the no-authentication method is offered.
    pub credentials: Option<Credentials>,
    /// Timeout for each outbound connection attempt, in seconds
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from the positional command-line arguments.
    ///
    /// Accepted forms:
    /// - no arguments: port 1080, no authentication
    /// - `port`: listen on that port, no authentication
    /// - `username password`: port 1080 with authentication
    /// - `port username password`: both
    pub fn from_args(args: &[String]) -> Result<ServerConfig, ConfigError> {
        match args {
            [] => Ok(ServerConfig::default()),
            [port] => Ok(ServerConfig {
                port: parse_port(port)?,
                ..ServerConfig::default()
            }),
            [username, password] => Ok(ServerConfig {
                credentials: Some(Credentials::new(username.clone(), password.clone())?),
                ..ServerConfig::default()
            }),
            [port, username, password] => Ok(ServerConfig {
                port: parse_port(port)?,
                credentials: Some(Credentials::new(username.clone(), password.clone())?),
                ..ServerConfig::default()
            }),
            _ => Err(ConfigError::Usage),
        }
    }

    /// Whether username/password authentication is configured
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

fn parse_port(arg: &str) -> Result<u16, ConfigError> {
    arg.parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::InvalidPort(arg.to_string()))
}
