use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::loop_runner::LoopConfig;

const TPS_ENV_VAR: &str = "ACTOR_SIM_TPS";
const RUN_SECONDS_ENV_VAR: &str = "ACTOR_SIM_SECONDS";
const CONTENT_ENV_VAR: &str = "ACTOR_SIM_CONTENT";
const SAVE_ENV_VAR: &str = "ACTOR_SIM_SAVE";
const LOAD_ENV_VAR: &str = "ACTOR_SIM_LOAD";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Actor Sim Startup ===");

    let defaults = LoopConfig::default();
    let config = LoopConfig {
        target_tps: resolve_parsed(TPS_ENV_VAR, defaults.target_tps),
        run_seconds: resolve_parsed(RUN_SECONDS_ENV_VAR, defaults.run_seconds),
        armory_path: resolve_path(CONTENT_ENV_VAR),
        save_path: resolve_path(SAVE_ENV_VAR),
        load_path: resolve_path(LOAD_ENV_VAR),
        ..defaults
    };

    AppWiring { config }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_parsed<T>(env_var: &'static str, fallback: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(env_var) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    env_var,
                    value = value.as_str(),
                    "invalid env var value; falling back to config"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var,
                error = %err,
                "unable to read env var; falling back to config"
            );
            fallback
        }
    }
}

fn resolve_path(env_var: &'static str) -> Option<PathBuf> {
    env::var_os(env_var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_env_var_uses_fallback() {
        let value = resolve_parsed("ACTOR_SIM_TEST_UNSET_TPS", 42u32);
        assert_eq!(value, 42);
        assert!(resolve_path("ACTOR_SIM_TEST_UNSET_PATH").is_none());
    }
}
