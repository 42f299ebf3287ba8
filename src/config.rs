use crate::middleware::TraceMode;
use crate::models::token::DEV_TOKEN;

pub const DEFAULT_REMOTE: &str = "sc://localhost:8100/";

#[derive(Clone)]
pub struct Config {
    /// Connection string, `sc://host:port/[;key=value]*`.
    pub remote: String,
    /// Bearer secret attached to every call.
    /// Set via CONNECT_AUTH_TOKEN. Defaults to the development token.
    pub token: String,
    /// Log metadata unredacted. Off unless CONNECT_AUTH_TRACE_SECRETS is set.
    pub trace_secrets: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("remote", &self.remote)
            .field("token", &"[REDACTED]")
            .field("trace_secrets", &self.trace_secrets)
            .finish()
    }
}

impl Config {
    pub fn trace_mode(&self) -> TraceMode {
        if self.trace_secrets {
            TraceMode::Plaintext
        } else {
            TraceMode::Redacted
        }
    }

    pub fn uses_dev_token(&self) -> bool {
        self.token == DEV_TOKEN
    }

    /// Refuse the development token in production, warn about it elsewhere.
    pub fn check_token(&self, deployment: &str) -> anyhow::Result<()> {
        if !self.uses_dev_token() {
            return Ok(());
        }
        if deployment == "production" {
            anyhow::bail!(
                "the bearer token is still the development token. \
                 Set CONNECT_AUTH_TOKEN or --token before running in production."
            );
        }
        tracing::warn!("no bearer token configured, using the development token");
        Ok(())
    }
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub remote: Option<String>,
    pub token: Option<String>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn deployment() -> String {
    std::env::var("CONNECT_AUTH_ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .unwrap_or_default()
}

pub fn load(overrides: Overrides) -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let cfg = Config {
        remote: overrides
            .remote
            .or_else(|| std::env::var("CONNECT_AUTH_REMOTE").ok())
            .unwrap_or_else(|| DEFAULT_REMOTE.into()),
        token: overrides
            .token
            .or_else(|| std::env::var("CONNECT_AUTH_TOKEN").ok())
            .unwrap_or_else(|| DEV_TOKEN.into()),
        trace_secrets: env_flag("CONNECT_AUTH_TRACE_SECRETS"),
    };

    cfg.check_token(&deployment())?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_trace_mode_follows_flag() {
        let mut cfg = Config {
            remote: DEFAULT_REMOTE.into(),
            token: DEV_TOKEN.into(),
            trace_secrets: false,
        };
        assert_eq!(cfg.trace_mode(), TraceMode::Redacted);
        assert!(cfg.uses_dev_token());

        cfg.trace_secrets = true;
        assert_eq!(cfg.trace_mode(), TraceMode::Plaintext);
    }

    #[test]
    fn test_dev_token_refused_in_production() {
        let cfg = Config {
            remote: DEFAULT_REMOTE.into(),
            token: DEV_TOKEN.into(),
            trace_secrets: false,
        };
        assert_err!(cfg.check_token("production"));
        assert_ok!(cfg.check_token(""));
        assert_ok!(cfg.check_token("staging"));
    }

    #[test]
    fn test_real_token_accepted_in_production() {
        let cfg = Config {
            remote: DEFAULT_REMOTE.into(),
            token: "real-token".into(),
            trace_secrets: false,
        };
        assert_ok!(cfg.check_token("production"));
    }

    #[test]
    fn test_cli_token_decides_production_guard() {
        std::env::set_var("CONNECT_AUTH_ENV", "production");
        std::env::set_var("CONNECT_AUTH_TOKEN", "env-token");

        let cfg = assert_ok!(load(Overrides {
            remote: None,
            token: Some("real-token".into()),
        }));
        assert_eq!(cfg.token, "real-token");

        let refused = load(Overrides {
            remote: Some("sc://h:1/".into()),
            token: Some(DEV_TOKEN.into()),
        });

        std::env::remove_var("CONNECT_AUTH_ENV");
        std::env::remove_var("CONNECT_AUTH_TOKEN");
        assert_err!(refused);
    }

    #[test]
    fn test_debug_hides_token() {
        let cfg = Config {
            remote: DEFAULT_REMOTE.into(),
            token: "s3cr3t".into(),
            trace_secrets: false,
        };
        assert!(!format!("{:?}", cfg).contains("s3cr3t"));
    }
}
