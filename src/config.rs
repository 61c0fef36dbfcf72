use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub session_idle_secs: i64,
    pub session_rotate_secs: i64,
    pub rate_window_secs: i64,
    pub rate_max_attempts: u32,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("MEDBOARD_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_HOST: {e}"))?;

        let port: u16 = env_or("MEDBOARD_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_PORT: {e}"))?;

        let base_url = env_or("MEDBOARD_BASE_URL", &format!("http://{host}:{port}"));

        let session_idle_secs: i64 = env_or("MEDBOARD_SESSION_IDLE_SECS", "1800")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_SESSION_IDLE_SECS: {e}"))?;

        let session_rotate_secs: i64 = env_or("MEDBOARD_SESSION_ROTATE_SECS", "300")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_SESSION_ROTATE_SECS: {e}"))?;

        let rate_window_secs: i64 = env_or("MEDBOARD_RATE_WINDOW_SECS", "900")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_RATE_WINDOW_SECS: {e}"))?;

        let rate_max_attempts: u32 = env_or("MEDBOARD_RATE_MAX_ATTEMPTS", "5")
            .parse()
            .map_err(|e| format!("Invalid MEDBOARD_RATE_MAX_ATTEMPTS: {e}"))?;

        let trusted_proxies: Vec<IpNet> = env_or("MEDBOARD_TRUSTED_PROXIES", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| format!("Invalid MEDBOARD_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let log_level = env_or("MEDBOARD_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("MEDBOARD_SMTP_HOST").ok(),
            std::env::var("MEDBOARD_SMTP_PORT").ok(),
            std::env::var("MEDBOARD_SMTP_USER").ok(),
            std::env::var("MEDBOARD_SMTP_PASS").ok(),
            std::env::var("MEDBOARD_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid MEDBOARD_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            base_url,
            session_idle_secs,
            session_rotate_secs,
            rate_window_secs,
            rate_max_attempts,
            trusted_proxies,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
