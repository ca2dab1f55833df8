use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default route classification table, in declaration order.
pub const DEFAULT_ROUTE_RULES: &str = "/feed=protected,/profile=protected,/messages=protected,\
/notifications=protected,/search=protected,/settings=protected,/api=protected,\
/login=auth_only,/signup=auth_only";

/// Default base URL of the hosted backend (auth and REST data store) when running locally.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Base URL of the hosted authentication provider.
    #[arg(long, env, default_value = DEFAULT_BACKEND_URL)]
    auth_url: String,

    /// Base URL of the hosted REST data store.
    #[arg(long, env, default_value = DEFAULT_BACKEND_URL)]
    data_url: String,

    /// Public (anon) API key sent with every call to the hosted backend.
    #[arg(long, env)]
    anon_key: Option<String>,

    /// Server-side API key for the hosted REST data store. Falls back to the anon key.
    #[arg(long, env)]
    data_api_key: Option<String>,

    /// Shared secret used to verify HMAC signatures on database webhooks.
    #[arg(long, env)]
    webhook_secret: Option<String>,

    /// Ordered route classification table as `prefix=class` pairs, where class is
    /// one of `protected`, `auth_only` or `public`. Longest matching prefix wins.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = DEFAULT_ROUTE_RULES
    )]
    pub route_rules: Vec<String>,

    /// Upper bound in milliseconds on resolving a request's credentials before
    /// the request is treated as unauthenticated.
    #[arg(long, env, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    pub credential_timeout_ms: u64,

    /// Maximum retries the auth provider client makes on transient failures.
    #[arg(long, env, default_value_t = 1)]
    pub auth_max_retries: u32,

    /// Directory holding the built frontend bundle served for page routes.
    #[arg(long, env, default_value = "./public")]
    pub static_dir: String,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Session expiry duration in seconds (default: 24 hours = 86400 seconds)
    #[arg(long, env, default_value_t = 86400)]
    pub backend_session_expiry_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Builds a config from built-in defaults and the environment only, without
    /// reading the process arguments or a `.env` file.
    pub fn with_defaults() -> Self {
        Config::parse_from([env!("CARGO_PKG_NAME")])
    }

    pub fn auth_url(&self) -> &str {
        self.auth_url.trim_end_matches('/')
    }

    pub fn set_auth_url(mut self, auth_url: String) -> Self {
        self.auth_url = auth_url;
        self
    }

    pub fn data_url(&self) -> &str {
        self.data_url.trim_end_matches('/')
    }

    pub fn set_data_url(mut self, data_url: String) -> Self {
        self.data_url = data_url;
        self
    }

    pub fn anon_key(&self) -> Option<String> {
        self.anon_key.clone()
    }

    pub fn set_anon_key(mut self, anon_key: String) -> Self {
        self.anon_key = Some(anon_key);
        self
    }

    pub fn data_api_key(&self) -> Option<String> {
        self.data_api_key.clone().or_else(|| self.anon_key())
    }

    pub fn webhook_secret(&self) -> Option<String> {
        self.webhook_secret.clone()
    }

    pub fn set_webhook_secret(mut self, webhook_secret: String) -> Self {
        self.webhook_secret = Some(webhook_secret);
        self
    }

    pub fn credential_timeout(&self) -> Duration {
        Duration::from_millis(self.credential_timeout_ms)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
