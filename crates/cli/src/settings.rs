use anyhow::{Context as AnyhowContext, Result};
use apisim_graph::{FunctionTree, TreeLoader};
use apisim_mesh::MeshConfig;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_ENV: &str = "APISIM_CONFIG";
pub const PORT_ENV: &str = "APISIM_PORT";
pub const DEFAULT_CONFIG: &str = "definition.json";
pub const DEFAULT_PORT: u16 = 8080;

/// Process-wide settings, resolved once from flags and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub port: u16,
    pub mesh: MeshConfig,
}

impl Settings {
    /// Flags win over `APISIM_CONFIG` / `APISIM_PORT`, which win over the
    /// defaults.
    pub fn resolve(
        config: Option<PathBuf>,
        port: Option<u16>,
        timeout_ms: u64,
        max_in_flight: usize,
    ) -> Result<Self> {
        let config_path = config
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

        let port = match port {
            Some(port) => port,
            None => match env::var(PORT_ENV) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{PORT_ENV}={raw} is not a valid port"))?,
                Err(_) => DEFAULT_PORT,
            },
        };

        if max_in_flight == 0 {
            anyhow::bail!("--max-in-flight must be at least 1");
        }

        Ok(Self {
            config_path,
            port,
            mesh: MeshConfig {
                base_timeout: Duration::from_millis(timeout_ms),
                max_in_flight,
            },
        })
    }

    /// Load and validate the function tree. Any failure is fatal to the
    /// caller; there is no partial tree.
    pub fn load_tree(&self) -> Result<Arc<FunctionTree>> {
        let tree = TreeLoader::new(self.port)
            .load_file(&self.config_path)
            .context("Failed to load function definitions")?;

        for cycle in tree.call_cycles() {
            let members: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            log::warn!("Call cycle: {}", members.join(" -> "));
        }

        Ok(Arc::new(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_are_used() {
        let settings =
            Settings::resolve(Some(PathBuf::from("mesh.json")), Some(9000), 250, 8).unwrap();
        assert_eq!(settings.config_path, PathBuf::from("mesh.json"));
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.mesh.base_timeout, Duration::from_millis(250));
        assert_eq!(settings.mesh.max_in_flight, 8);
    }

    #[test]
    fn zero_width_fan_out_is_rejected() {
        assert!(Settings::resolve(Some(PathBuf::from("x.json")), Some(1), 10, 0).is_err());
    }

    #[test]
    fn load_tree_wraps_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.json");
        std::fs::write(&path, r#"{"Functions": {"GET a/x": ["CALL missing"]}}"#).unwrap();

        let settings = Settings::resolve(Some(path), Some(8080), 10, 1).unwrap();
        let err = settings.load_tree().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to load function definitions"), "{message}");
        assert!(message.contains("unresolved reference \"missing\""), "{message}");
    }
}
