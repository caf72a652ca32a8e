//! Layered configuration loading.
//!
//! Sources, later overriding earlier:
//!  1. `/etc/payhook/service.yaml`  system-wide defaults
//!  2. `./config/service.yaml`      deployment-local override
//!  3. file named by `PAYHOOK_CONFIG_FILE`
//!  4. `PAYHOOK__SECTION__KEY` environment variables,
//!     e.g. `PAYHOOK__SERVER__PORT=9090`
//!
//! Absent files are fine because every field has a default. A malformed
//! file, or a variable that cannot be coerced to its field type, is an error.

use payhook_api::ServiceConfig;
use std::path::Path;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "PAYHOOK_CONFIG_FILE";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PAYHOOK";

/// Load configuration from the standard locations
pub fn load() -> Result<ServiceConfig, config::ConfigError> {
    let explicit = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty());
    load_from(explicit.as_deref().map(Path::new))
}

/// Load configuration with an optional operator-specified file
pub fn load_from(explicit_file: Option<&Path>) -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/payhook/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_file {
        builder = builder.add_source(
            config::File::from(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
