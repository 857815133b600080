use std::path::{Path, PathBuf};

use agent_core::AgentSettings;
use anyhow::{Context, Result};

/// Resolves the user config file path, preferring an explicit `--config`
/// argument over the platform config directory
/// (`$XDG_CONFIG_HOME/soulbrowser-agent/config.yaml` and equivalents via
/// `dirs`), matching the teacher's layered settings style
/// (SPEC_FULL.md §2.1, §6.1).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soulbrowser-agent").join("config.yaml"))
}

/// Loads `AgentSettings` as defaults -> optional file -> environment
/// overrides (`AGENT_` prefixed, double-underscore nested keys), the same
/// source-layering order the teacher's `app_settings::Config` follows.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<AgentSettings> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&AgentSettings::default())?);

    let candidate = explicit_path
        .map(PathBuf::from)
        .or_else(default_config_path);

    if let Some(path) = candidate {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let settings = builder
        .build()
        .context("failed to assemble layered agent configuration")?;
    settings
        .try_deserialize()
        .context("failed to deserialize AgentSettings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_settings_falls_back_to_defaults_without_any_file() {
        let settings = load_settings(Some(Path::new("/nonexistent/path/config.yaml"))).unwrap();
        assert_eq!(settings.max_steps, AgentSettings::default().max_steps);
    }
}
