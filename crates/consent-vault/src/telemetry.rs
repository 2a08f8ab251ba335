//! Logging bootstrap for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable switching log output to JSON.
pub const LOG_JSON_ENV: &str = "CONSENT_VAULT_LOG_JSON";

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for command output.
pub fn init() -> anyhow::Result<()> {
    let json_logs = std::env::var(LOG_JSON_ENV).unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("consent_vault=info".parse()?);

    if json_logs {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
    Ok(())
}
