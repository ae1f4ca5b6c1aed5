use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "careflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fallback tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info,tower_http=info")
}

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub bind_addr: SocketAddr,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Generation backend base URL.
    pub llm_base_url: String,
    /// Generation model name.
    pub llm_model: String,
    /// LLM request timeout in seconds.
    pub llm_timeout_secs: u64,
    /// Worker poll interval in seconds.
    pub worker_poll_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("CAREFLOW_ADDR", "127.0.0.1:3001")
                .parse()
                .unwrap_or_else(|_| ([127, 0, 0, 1], 3001).into()),
            database_path: PathBuf::from(env_or("CAREFLOW_DB", "careflow.db")),
            llm_base_url: env_or("CAREFLOW_LLM_URL", "http://localhost:11434"),
            llm_model: env_or("CAREFLOW_LLM_MODEL", "medllm"),
            llm_timeout_secs: env_or("CAREFLOW_LLM_TIMEOUT_SECS", "300")
                .parse()
                .unwrap_or(300),
            worker_poll_secs: env_or("CAREFLOW_WORKER_POLL_SECS", "1")
                .parse()
                .unwrap_or(1),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        assert_eq!(env_or("CAREFLOW_TEST_UNSET", "fallback"), "fallback");
    }

    #[test]
    fn env_or_reads_set_variable() {
        std::env::set_var("CAREFLOW_TEST_SET", "custom");
        assert_eq!(env_or("CAREFLOW_TEST_SET", "default"), "custom");
        std::env::remove_var("CAREFLOW_TEST_SET");
    }

    #[test]
    fn app_name_is_careflow() {
        assert_eq!(APP_NAME, "careflow");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
