use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use keystone_application::BootstrapAccount;
use keystone_core::AppError;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;

/// What the binary was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
    Seed,
}

impl Command {
    fn parse(argument: Option<&str>) -> Result<Self, AppError> {
        match argument {
            None | Some("serve") => Ok(Self::Serve),
            Some("migrate") => Ok(Self::Migrate),
            Some("seed") => Ok(Self::Seed),
            Some(other) => Err(AppError::Internal(format!(
                "unknown command '{other}', expected serve, migrate or seed"
            ))),
        }
    }
}

/// Backing store for users, roles and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { database_url: String },
    Memory,
}

/// Settings for the bootstrap Super Admin account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: Option<String>,
}

impl BootstrapConfig {
    /// Returns the account to seed; the password has no default.
    pub fn account(&self) -> Result<BootstrapAccount, AppError> {
        let password = self
            .password
            .clone()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| config_error("BOOTSTRAP_PASSWORD is required to seed"))?;

        Ok(BootstrapAccount {
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            password,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: Command,
    pub store: StoreConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub cookie_secure: bool,
    pub session_ttl_minutes: i64,
    pub bootstrap: BootstrapConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(env::args().nth(1).as_deref(), |name| env::var(name).ok())
    }

    fn from_lookup(
        argument: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let command = Command::parse(argument)?;

        let store = match lookup("KEYSTONE_STORE")
            .unwrap_or_else(|| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StoreConfig::Postgres {
                database_url: required_non_empty(&lookup, "DATABASE_URL")?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(config_error(&format!(
                    "KEYSTONE_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_owned());
        let parsed_frontend = Url::parse(&frontend_url)
            .map_err(|error| config_error(&format!("invalid FRONTEND_URL: {error}")))?;
        // Origin headers carry no trailing slash.
        let frontend_url = parsed_frontend.origin().ascii_serialization();

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = lookup("API_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);
        let cookie_secure = lookup("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|| "false".to_owned())
            .eq_ignore_ascii_case("true");
        let session_ttl_minutes = lookup("SESSION_TTL_MINUTES")
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_MINUTES);

        let bootstrap = BootstrapConfig {
            username: lookup("BOOTSTRAP_USERNAME").unwrap_or_else(|| "superadmin".to_owned()),
            email: lookup("BOOTSTRAP_EMAIL")
                .unwrap_or_else(|| "superadmin@example.com".to_owned()),
            name: lookup("BOOTSTRAP_NAME").unwrap_or_else(|| "Super Admin".to_owned()),
            password: lookup("BOOTSTRAP_PASSWORD"),
        };

        Ok(Self {
            command,
            store,
            frontend_url,
            api_host,
            api_port,
            cookie_secure,
            session_ttl_minutes,
            bootstrap,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, AppError> {
    let value = lookup(name).ok_or_else(|| config_error(&format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(config_error(&format!("{name} must not be empty")));
    }

    Ok(value)
}

fn config_error(message: &str) -> AppError {
    AppError::Internal(format!("invalid configuration: {message}"))
}
