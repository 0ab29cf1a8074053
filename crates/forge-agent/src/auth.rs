//! API key lookup for the Anthropic backend
//!
//! The key is read from the variable named by `[models] api_key_env`
//! (`ANTHROPIC_API_KEY` unless configured otherwise). The CLI loads `.env`
//! before this runs, so the key may live there. It is sent as `x-api-key`.

use forge_core::{ForgeError, Result};
use std::env;

/// Read the API key from `api_key_env`
///
/// An unset or blank variable is a [`ForgeError::Auth`] error, raised before
/// any stage runs.
pub fn api_key_from_env(api_key_env: &str) -> Result<String> {
    match env::var(api_key_env) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using API key from {}", api_key_env);
            Ok(key.trim().to_string())
        }
        Ok(_) => Err(ForgeError::Auth(format!("{} is set but empty", api_key_env))),
        Err(_) => Err(ForgeError::Auth(format!(
            "{} is not set. Export it or add `{}=sk-ant-...` to .env, \
             or point [models] api_key_env at another variable",
            api_key_env, api_key_env
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_var<R>(key: &str, value: Option<&str>, f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(key).ok();

        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
        let result = f();
        match original {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }

        result
    }

    #[test]
    fn test_reads_configured_variable() {
        with_var("FORGE_TEST_API_KEY", Some(" sk-ant-test \n"), || {
            assert_eq!(api_key_from_env("FORGE_TEST_API_KEY").unwrap(), "sk-ant-test");
        });
    }

    #[test]
    fn test_blank_key_is_auth_error() {
        with_var("FORGE_TEST_API_KEY", Some("   "), || {
            let err = api_key_from_env("FORGE_TEST_API_KEY").unwrap_err();
            assert!(matches!(err, ForgeError::Auth(_)));
            assert!(err.to_string().contains("empty"));
        });
    }

    #[test]
    fn test_missing_key_names_the_variable() {
        with_var("FORGE_TEST_API_KEY", None, || {
            let err = api_key_from_env("FORGE_TEST_API_KEY").unwrap_err();
            assert!(err.is_input_error());
            assert!(err.to_string().contains("FORGE_TEST_API_KEY"));
        });
    }
}
