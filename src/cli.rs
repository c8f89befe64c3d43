use crate::config::HostConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    workers: Option<usize>,
    objects: Option<usize>,
    seed: Option<u64>,
    scripts_root: Option<String>,
    config_path: Option<String>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --workers/--objects/--seed/--scripts-root/--config with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "workers" => {
                    overrides.workers =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid worker count '{value}'"))?);
                }
                "objects" => {
                    overrides.objects =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid object count '{value}'"))?);
                }
                "seed" => {
                    overrides.seed =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "scripts-root" => {
                    overrides.scripts_root = Some(value);
                }
                "config" => {
                    overrides.config_path = Some(value);
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --workers, --objects, --seed, --scripts-root, --config."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn into_config_overrides(self) -> HostConfigOverrides {
        HostConfigOverrides {
            worker_count: self.workers,
            object_count: self.objects,
            seed: self.seed,
            script_root: self.scripts_root,
        }
    }

    #[cfg(test)]
    fn as_tuple(&self) -> (Option<usize>, Option<usize>, Option<u64>) {
        (self.workers, self.objects, self.seed)
    }
}
