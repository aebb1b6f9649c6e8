use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Default: `8000`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Idle lifetime of a login session in seconds.
    /// TOML: `basic.session_ttl_secs`. Default: `43200` (12h).
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Login attempts allowed per email per minute.
    /// TOML: `basic.login_attempts_per_minute`. Default: `10`.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,

    /// Interval between overdue invoice sweeps in seconds.
    /// TOML: `basic.sweep_interval_secs`. Default: `3600`.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Maximum accepted size for price-list uploads, in bytes.
    /// TOML: `basic.upload_limit_bytes`. Default: `5242880` (5 MiB).
    #[serde(default = "default_upload_limit")]
    pub upload_limit_bytes: usize,

    /// Drop the `Secure` attribute from the session cookie (plain HTTP deployments).
    /// TOML: `basic.insecure_cookie`. Default: `true`.
    #[serde(default = "default_insecure_cookie")]
    pub insecure_cookie: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            loglevel: default_loglevel(),
            session_ttl_secs: default_session_ttl(),
            login_attempts_per_minute: default_login_attempts(),
            sweep_interval_secs: default_sweep_interval(),
            upload_limit_bytes: default_upload_limit(),
            insecure_cookie: default_insecure_cookie(),
        }
    }
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_session_ttl() -> u64 {
    12 * 60 * 60
}

fn default_login_attempts() -> u32 {
    10
}

fn default_sweep_interval() -> u64 {
    60 * 60
}

fn default_upload_limit() -> usize {
    5 * 1024 * 1024
}

fn default_insecure_cookie() -> bool {
    true
}
