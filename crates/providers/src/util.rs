//! Shared utility functions for provider adapters.

use sa_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve a provider API key.
///
/// Precedence: an explicit env var, then the OS keychain entry
/// `(service, account)`, then a headless fallback env var
/// `{SERVICE}_{ACCOUNT}` (uppercased, hyphens to underscores) for
/// systems with no keychain daemon.
pub fn resolve_api_key(env_var: &str, service: &str, account: &str) -> Result<String> {
    if let Ok(val) = std::env::var(env_var) {
        return Ok(val);
    }

    match keyring::Entry::new(service, account).and_then(|e| e.get_password()) {
        Ok(secret) => return Ok(secret),
        Err(e) => {
            tracing::debug!(service, account, error = %e, "keychain lookup failed, falling through to env");
        }
    }

    let fallback_var = keychain_fallback_env_name(service, account);
    if let Ok(val) = std::env::var(&fallback_var) {
        tracing::info!(env_var = %fallback_var, "API key resolved from keychain headless fallback env var");
        return Ok(val);
    }

    Err(Error::Config(format!(
        "no API key configured: set {env_var} or {fallback_var}, or store it in the OS keychain under service '{service}'"
    )))
}

/// Build the headless fallback env var name for a keychain service/account.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!("{}_{}", service.to_uppercase().replace('-', "_"), account.to_uppercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_env_name_basic() {
        assert_eq!(keychain_fallback_env_name("sa-runner", "anthropic-key"), "SA_RUNNER_ANTHROPIC_KEY");
    }

    #[test]
    fn resolve_api_key_prefers_explicit_env_var() {
        std::env::set_var("SA_TEST_PROVIDER_KEY", "explicit-value");
        let result = resolve_api_key("SA_TEST_PROVIDER_KEY", "sa-runner-cli", "test-provider").unwrap();
        assert_eq!(result, "explicit-value");
        std::env::remove_var("SA_TEST_PROVIDER_KEY");
    }

    #[test]
    fn resolve_api_key_falls_back_to_headless_env_var() {
        std::env::set_var("SA_RUNNER_CLI_TEST_FALLBACK", "fallback-value");
        let result = resolve_api_key("SA_TEST_MISSING_VAR", "sa-runner-cli", "test-fallback").unwrap();
        assert_eq!(result, "fallback-value");
        std::env::remove_var("SA_RUNNER_CLI_TEST_FALLBACK");
    }

    #[test]
    fn resolve_api_key_errors_when_nothing_configured() {
        let err = resolve_api_key("SA_TEST_TOTALLY_MISSING", "sa-runner-cli", "nonexistent").unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }
}
