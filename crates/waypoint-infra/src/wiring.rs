//! Builds executor and sink registries from [`EngineConfig`].
//!
//! Every `[executors.<name>]` and `[sinks.<name>]` table becomes one registry
//! entry under that name. A `log` sink is always available so definitions can
//! notify without any sink configuration; a configured `log` entry replaces it.

use std::time::Duration;

use secrecy::SecretString;
use waypoint_core::executor::{BoxTaskExecutor, ExecutorRegistry};
use waypoint_core::notify::{BoxNotificationSink, SinkRegistry};
use waypoint_types::config::{EngineConfig, ExecutorConfig, SinkConfig};

use crate::config::ConfigError;
use crate::executor::{CommandExecutor, HttpExecutor};
use crate::sink::{LogSink, WebhookSink};

/// Name of the sink registered by default.
pub const DEFAULT_SINK: &str = "log";

pub fn build_executor_registry(config: &EngineConfig) -> Result<ExecutorRegistry, ConfigError> {
    let mut registry = ExecutorRegistry::new();

    for (name, entry) in &config.executors {
        let executor = match entry {
            ExecutorConfig::Command {
                program,
                args,
                env,
                working_dir,
            } => {
                if program.trim().is_empty() {
                    return Err(invalid(name, "command executor needs a program"));
                }
                BoxTaskExecutor::new(
                    CommandExecutor::new(program.clone())
                        .with_args(args.clone())
                        .with_env(env.clone())
                        .with_working_dir(working_dir.clone()),
                )
            }
            ExecutorConfig::Http {
                url,
                auth_token,
                timeout_secs,
            } => {
                check_url(name, url)?;
                BoxTaskExecutor::new(HttpExecutor::new(
                    url.clone(),
                    auth_token.clone().map(SecretString::from),
                    timeout_secs.map(Duration::from_secs),
                )?)
            }
        };
        tracing::debug!(executor = %name, "registered executor");
        registry.register(name.clone(), executor);
    }

    Ok(registry)
}

pub fn build_sink_registry(config: &EngineConfig) -> Result<SinkRegistry, ConfigError> {
    let mut registry = SinkRegistry::new();
    registry.register(DEFAULT_SINK, BoxNotificationSink::new(LogSink));

    for (name, entry) in &config.sinks {
        let sink = match entry {
            SinkConfig::Log => BoxNotificationSink::new(LogSink),
            SinkConfig::Webhook {
                url,
                signing_secret,
            } => {
                check_url(name, url)?;
                BoxNotificationSink::new(WebhookSink::new(
                    url.clone(),
                    signing_secret.clone().map(SecretString::from),
                )?)
            }
        };
        tracing::debug!(sink = %name, "registered sink");
        registry.register(name.clone(), sink);
    }

    Ok(registry)
}

fn check_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(name, format!("url must be http(s), got '{url}'")))
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}
