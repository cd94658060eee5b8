//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "CONTRACT_PROXY";

/// Configuration picked up from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Upstream base URL from CONTRACT_PROXY_UPSTREAM
    pub upstream: Option<String>,
    /// Listen host from CONTRACT_PROXY_HOST
    pub listen_host: Option<String>,
    /// Local port from CONTRACT_PROXY_PORT
    pub port: Option<u16>,
    /// Bypass mode from CONTRACT_PROXY_BYPASS
    pub bypass: Option<bool>,
    /// Debug dumps from CONTRACT_PROXY_DEBUG
    pub debug: Option<bool>,
    /// Request body dumps from CONTRACT_PROXY_DUMP_BODIES
    pub dump_bodies: Option<bool>,
    /// Dump destination from CONTRACT_PROXY_DUMP_FILE
    pub dump_file: Option<String>,
    /// Inter-request delay from CONTRACT_PROXY_DELAY_MS
    pub delay_ms: Option<u64>,
    /// Fail-fast from CONTRACT_PROXY_FAIL_FAST
    pub fail_fast: Option<bool>,
    /// Timeout from CONTRACT_PROXY_TIMEOUT
    pub timeout: Option<u64>,
    /// Connectivity check URL from CONTRACT_PROXY_CHECK_URL
    pub check_url: Option<String>,
    /// Config file from CONTRACT_PROXY_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            upstream: get_env("UPSTREAM"),
            listen_host: get_env("HOST"),
            port: get_env_parse("PORT"),
            bypass: get_env_bool("BYPASS"),
            debug: get_env_bool("DEBUG"),
            dump_bodies: get_env_bool("DUMP_BODIES"),
            dump_file: get_env("DUMP_FILE"),
            delay_ms: get_env_parse("DELAY_MS"),
            fail_fast: get_env_bool("FAIL_FAST"),
            timeout: get_env_parse("TIMEOUT"),
            check_url: get_env("CHECK_URL"),
            config_file: get_env("CONFIG"),
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all CONTRACT_PROXY environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_UPSTREAM     Upstream API base URL");
    println!("  {ENV_PREFIX}_HOST         Interface the gateway binds");
    println!("  {ENV_PREFIX}_PORT         Local port targeted by the runner");
    println!("  {ENV_PREFIX}_BYPASS       Listen directly instead of behind a recorder (true/false)");
    println!("  {ENV_PREFIX}_DEBUG        Dump requests and responses (true/false)");
    println!("  {ENV_PREFIX}_DUMP_BODIES  Include request bodies in dumps (true/false)");
    println!("  {ENV_PREFIX}_DUMP_FILE    Append dumps to this file instead of stderr");
    println!("  {ENV_PREFIX}_DELAY_MS     Delay between catalog entries in milliseconds");
    println!("  {ENV_PREFIX}_FAIL_FAST    Stop at the first failure (true/false)");
    println!("  {ENV_PREFIX}_TIMEOUT      Request timeout in seconds");
    println!("  {ENV_PREFIX}_CHECK_URL    Connectivity check endpoint");
    println!("  {ENV_PREFIX}_CONFIG       Path to configuration file");
    println!("  OPTIC_API_PORT              Gateway port handed over by the recording tool");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_UPSTREAM=https://api.example.com/v2/");
    println!("  export {ENV_PREFIX}_BYPASS=true");
    println!("  contract-proxy run");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let previous = vars
                .iter()
                .map(|(k, _)| {
                    let key = format!("{ENV_PREFIX}_{k}");
                    let old = env::var(&key).ok();
                    (key, old)
                })
                .collect();
            for (k, v) in vars {
                env::set_var(format!("{ENV_PREFIX}_{k}"), v);
            }
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.upstream.is_none());
    }

    #[test]
    fn test_env_load() {
        let _guard = EnvGuard::set(&[
            ("UPSTREAM", "https://api.example.com/v2/"),
            ("PORT", "9999"),
            ("DELAY_MS", "250"),
        ]);

        let config = EnvConfig::load();
        assert_eq!(config.upstream.as_deref(), Some("https://api.example.com/v2/"));
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.delay_ms, Some(250));
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvGuard::set(&[("FAIL_FAST", "yes"), ("DUMP_BODIES", "off")]);

        let config = EnvConfig::load();
        assert_eq!(config.fail_fast, Some(true));
        assert_eq!(config.dump_bodies, Some(false));
    }
}
