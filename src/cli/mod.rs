//! CLI support for jsonte
//!
//! Provides programmatic access to the `eval` and `compile` commands so they
//! can be driven from tests or embedded in other tools.

mod compile;
mod eval;

pub use compile::{CompileOptions, CompileReport, collect_sources, execute_compile};
pub use eval::{evaluate_expressions, run_repl};

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::{EvalError, Scope, TemplateError, Value, merge::merge_into};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Scope file {} must contain a JSON object", path.display())]
    ScopeNotObject { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{failed} of {total} file(s) failed to compile")]
    CompileFailed { failed: usize, total: usize },
}

/// Build the global scope from `.json` files and directories of them.
///
/// Files are merged in the order given (directories in file-name order);
/// earlier bindings win and arrays concatenate.
pub fn load_scope(paths: &[PathBuf]) -> Result<Scope, CliError> {
    let mut scope = Value::object(Default::default());

    for path in paths {
        for file in json_files(path)? {
            let text = fs::read_to_string(&file)?;
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(|source| CliError::Json {
                    path: file.clone(),
                    source,
                })?;
            let value = Value::from(json);
            if !matches!(value, Value::Object(_)) {
                return Err(CliError::ScopeNotObject { path: file });
            }
            debug!(file = %file.display(), "merging scope file");
            merge_into(&mut scope, &value)?;
        }
    }

    Ok(match scope {
        Value::Object(map) => Scope::from_map(std::sync::Arc::unwrap_or_clone(map)),
        _ => Scope::new(),
    })
}

fn json_files(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
