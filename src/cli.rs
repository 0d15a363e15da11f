//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::RolePermissions;
use crate::db::Database;
use crate::jwt::{
    ACCESS_TOKEN_DURATION_SECS, MAX_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS,
};
use crate::rate_limit::DEFAULT_LOGIN_PER_MINUTE;
use clap::Parser;
use std::net::IpAddr;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header a trusted reverse proxy uses to pass the client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For`, the entry appended by the nearest proxy is used
    XForwardFor,
    /// `X-Real-IP`
    XRealIp,
}

/// Reads the client IP from a proxy header instead of the socket address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpExtractor {
    pub header_name: &'static str,
}

impl IpExtractor {
    /// Parse the client IP out of the configured header's value.
    pub fn extract(&self, header_value: &str) -> Result<String, &'static str> {
        let candidate = header_value
            .rsplit(',')
            .next()
            .map(str::trim)
            .unwrap_or_default();

        candidate
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

impl From<ClientIpHeader> for IpExtractor {
    fn from(header: ClientIpHeader) -> Self {
        let header_name = match header {
            ClientIpHeader::XForwardFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        };
        Self { header_name }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bankauth",
    about = "Token issuing and verification service for the banking API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "AUTH_PORT", default_value = "8181")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "bankauth.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// JSON file mapping roles to permitted routes, e.g. {"user": ["GetCustomer"]}
    #[arg(long)]
    pub permissions_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(..=MAX_TOKEN_DURATION_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(..=MAX_TOKEN_DURATION_SECS))]
    pub refresh_token_ttl: u64,

    /// Login attempts allowed per client IP per minute
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub login_rate_per_minute: u32,

    /// Take the client IP from this header (only when running behind a proxy that sets it)
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load the route permission table from a JSON file, or use the built-in table.
/// Returns None and logs an error if the file cannot be read or parsed.
pub fn load_permissions(permissions_file: Option<&str>) -> Option<RolePermissions> {
    let Some(path) = permissions_file else {
        info!("Using built-in route permissions");
        return Some(RolePermissions::default());
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read permissions file");
            return None;
        }
    };

    match RolePermissions::from_json(&content) {
        Ok(permissions) => {
            info!(path = %path, "Route permissions loaded");
            Some(permissions)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Invalid permissions file");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    permissions: RolePermissions,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl: args.access_token_ttl,
        refresh_token_ttl: args.refresh_token_ttl,
        permissions,
        login_rate_per_minute: args.login_rate_per_minute,
        ip_extractor: args.ip_header.map(IpExtractor::from),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
