use std::fs;
use std::path::PathBuf;

use rhai::{Engine, Scope, AST};

use crate::error::LoadError;

/// Naming convention tying a script file to its update entry point: the file
/// suffix is stripped and the entry token appended, so `"spinner.rhai"`
/// resolves to `"spinner_update"`. The defaults match the stock scripts; both
/// parts are configurable at loader construction.
#[derive(Debug, Clone)]
pub struct NameScheme {
    pub suffix: String,
    pub entry_token: String,
}

impl Default for NameScheme {
    fn default() -> Self {
        Self { suffix: ".rhai".to_string(), entry_token: "_update".to_string() }
    }
}

impl NameScheme {
    /// Derives the entry-point name for `script_name`. Fails if the name does
    /// not end with the expected suffix (or is nothing but the suffix).
    pub fn entry_point(&self, script_name: &str) -> Result<String, LoadError> {
        match script_name.strip_suffix(self.suffix.as_str()) {
            Some(stem) if !stem.is_empty() => Ok(format!("{stem}{}", self.entry_token)),
            _ => Err(LoadError::BadName {
                name: script_name.to_string(),
                suffix: self.suffix.clone(),
            }),
        }
    }
}

/// The cached result of loading and initializing one script: its compiled AST
/// plus the derived entry-point name. Immutable after creation and owned by
/// the cache that produced it.
#[derive(Debug)]
pub struct ScriptDescriptor {
    pub name: String,
    pub entry_point: String,
    pub ast: AST,
}

/// Resolves script names to sources under a root directory, compiles them,
/// and runs each top-level body exactly once for one-time setup.
pub struct ScriptLoader {
    root: PathBuf,
    scheme: NameScheme,
}

impl ScriptLoader {
    pub fn new(root: impl Into<PathBuf>, scheme: NameScheme) -> Self {
        Self { root: root.into(), scheme }
    }

    pub fn scheme(&self) -> &NameScheme {
        &self.scheme
    }

    /// Loads `name` and runs its top-level body on `engine` so the script can
    /// perform one-time setup. The name is validated before any filesystem
    /// access; an initialization error is distinct from a load failure.
    pub fn load_and_initialize(
        &self,
        engine: &Engine,
        scope: &mut Scope,
        name: &str,
    ) -> Result<ScriptDescriptor, LoadError> {
        let entry_point = self.scheme.entry_point(name)?;
        let path = self.root.join(name);
        let source = fs::read_to_string(&path).map_err(|err| LoadError::NotFound {
            name: name.to_string(),
            reason: format!("{}: {err}", path.display()),
        })?;
        let ast = engine.compile(&source).map_err(|err| LoadError::NotFound {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        engine.run_ast_with_scope(scope, &ast).map_err(|err| LoadError::InitFailed {
            name: name.to_string(),
            message: err.to_string(),
        })?;
        Ok(ScriptDescriptor { name: name.to_string(), entry_point, ast })
    }
}
