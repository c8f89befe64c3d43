use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Pool configuration. Every field has a default matching the stock setup:
/// four workers sharing one hundred objects drawn from the two bundled
/// scripts, with a fixed seed so assignment is reproducible.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "HostConfig::default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "HostConfig::default_object_count")]
    pub object_count: usize,
    #[serde(default = "HostConfig::default_scripts")]
    pub scripts: Vec<String>,
    #[serde(default = "HostConfig::default_script_root")]
    pub script_root: String,
    #[serde(default = "HostConfig::default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HostConfigOverrides {
    pub worker_count: Option<usize>,
    pub object_count: Option<usize>,
    pub seed: Option<u64>,
    pub script_root: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worker_count: Self::default_worker_count(),
            object_count: Self::default_object_count(),
            scripts: Self::default_scripts(),
            script_root: Self::default_script_root(),
            seed: Self::default_seed(),
        }
    }
}

impl HostConfig {
    const fn default_worker_count() -> usize {
        4
    }

    const fn default_object_count() -> usize {
        100
    }

    fn default_scripts() -> Vec<String> {
        vec!["script_a.rhai".to_string(), "script_b.rhai".to_string()]
    }

    fn default_script_root() -> String {
        "assets/scripts".to_string()
    }

    const fn default_seed() -> u64 {
        0xFFAC_ADE0
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &HostConfigOverrides) {
        if let Some(worker_count) = overrides.worker_count {
            self.worker_count = worker_count;
        }
        if let Some(object_count) = overrides.object_count {
            self.object_count = object_count;
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        if let Some(script_root) = &overrides.script_root {
            self.script_root = script_root.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            bail!("worker_count must be at least 1");
        }
        if self.scripts.is_empty() {
            bail!("at least one script name is required");
        }
        Ok(())
    }
}

impl HostConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.worker_count.is_none()
            && self.object_count.is_none()
            && self.seed.is_none()
            && self.script_root.is_none()
    }
}
