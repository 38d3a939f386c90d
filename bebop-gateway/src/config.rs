//! Gateway configuration, read from the environment at startup.

use std::path::PathBuf;

use bebop_core::DEFAULT_PROGRAM_NAME;

/// Default TCP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

/// Default location of the compiler module.
pub const DEFAULT_MODULE_PATH: &str = "assets/bebopc.wasm";

/// Default request body limit: 2 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A variable was set to an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Runtime settings for the gateway binary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct GatewayConfig {
    /// Address to bind, from `BEBOP_LISTEN_ADDR`.
    pub listen_addr: String,
    /// Compiler module, from `BEBOP_MODULE_PATH`.
    pub module_path: PathBuf,
    /// `argv[0]` for the compiler, from `BEBOP_PROGRAM_NAME`.
    pub program_name: String,
    /// Request body limit in bytes, from `BEBOP_MAX_BODY_BYTES`.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            module_path: PathBuf::from(DEFAULT_MODULE_PATH),
            program_name: DEFAULT_PROGRAM_NAME.to_owned(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`; unset variables use defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if `BEBOP_MAX_BODY_BYTES` is not
    /// a positive integer or `BEBOP_PROGRAM_NAME` is empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("BEBOP_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(path) = lookup("BEBOP_MODULE_PATH") {
            config.module_path = PathBuf::from(path);
        }
        if let Some(name) = lookup("BEBOP_PROGRAM_NAME") {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "BEBOP_PROGRAM_NAME",
                    reason: "must not be empty".to_owned(),
                });
            }
            config.program_name = name;
        }
        if let Some(raw) = lookup("BEBOP_MAX_BODY_BYTES") {
            config.max_body_bytes = match raw.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        var: "BEBOP_MAX_BODY_BYTES",
                        reason: "must be greater than zero".to_owned(),
                    })
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        var: "BEBOP_MAX_BODY_BYTES",
                        reason: format!("{raw:?}: {e}"),
                    })
                }
            };
        }

        Ok(config)
    }
}
