//! Compile module and template files into JSON outputs

use std::{
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};

use tracing::{error, info};
use walkdir::WalkDir;

use super::{CliError, load_scope};
use crate::{Processor, Scope, output::JsonPrinter};

/// Extension of module sources
pub const MODULE_EXTENSION: &str = "modl";
/// Extension of template documents
pub const TEMPLATE_EXTENSION: &str = "templ";

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Files and directories to compile
    pub paths: Vec<PathBuf>,
    /// Scope files and directories merged into the global scope
    pub scope: Vec<PathBuf>,
    /// Output directory; outputs are printed when absent
    pub out: Option<PathBuf>,
    /// Delete sources that compiled successfully
    pub remove_src: bool,
    /// Pretty-print the output
    pub pretty: bool,
}

/// Outcome of a compile run.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Files written to the output directory
    pub written: Vec<PathBuf>,
    /// Sources that failed, with the reason
    pub failures: Vec<(PathBuf, String)>,
    /// Number of module and template sources attempted
    pub total: usize,
}

/// Expand directories recursively into module and template files.
///
/// Returns modules and templates separately, each in file-name order.
pub fn collect_sources(paths: &[PathBuf]) -> Result<(Vec<PathBuf>, Vec<PathBuf>), CliError> {
    let mut modules = Vec::new();
    let mut templates = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.path().extension().and_then(|ext| ext.to_str()) {
                Some(MODULE_EXTENSION) => modules.push(entry.into_path()),
                Some(TEMPLATE_EXTENSION) => templates.push(entry.into_path()),
                _ => {}
            }
        }
    }
    Ok((modules, templates))
}

/// Load every module, then compile every template.
///
/// A failing source is recorded in the report and the run moves on to the
/// next one; it never stops at the first failure.
pub fn execute_compile<W: Write>(
    options: &CompileOptions,
    out: &mut W,
) -> Result<CompileReport, CliError> {
    let scope = load_scope(&options.scope)?;
    let (modules, templates) = collect_sources(&options.paths)?;
    let printer = JsonPrinter::new(options.pretty);
    let mut processor = Processor::default();
    let mut report = CompileReport {
        total: modules.len() + templates.len(),
        ..CompileReport::default()
    };
    let mut compiled = Vec::new();

    for module in modules {
        let result = fs::read_to_string(&module)
            .map_err(CliError::from)
            .and_then(|text| Ok(processor.process_module(&text, &scope)?.name.clone()));
        match result {
            Ok(name) => {
                info!(module = %name, file = %module.display(), "loaded module");
                compiled.push(module);
            }
            Err(e) => {
                error!(file = %module.display(), "{}", e);
                report.failures.push((module, e.to_string()));
            }
        }
    }

    for template in templates {
        match compile_template(&processor, &template, &scope, &printer, options, out, &mut report) {
            Ok(()) => compiled.push(template),
            Err(e) => {
                error!(file = %template.display(), "{}", e);
                report.failures.push((template, e.to_string()));
            }
        }
    }

    if options.remove_src {
        for source in &compiled {
            fs::remove_file(source)?;
        }
    }

    Ok(report)
}

fn compile_template<W: Write>(
    processor: &Processor,
    template: &Path,
    scope: &Scope,
    printer: &JsonPrinter,
    options: &CompileOptions,
    out: &mut W,
    report: &mut CompileReport,
) -> Result<(), CliError> {
    let text = fs::read_to_string(template)?;
    let name = template
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let outputs = processor.process_document(&name, &text, scope)?;

    // Render everything first so a failing output writes nothing.
    let mut rendered = Vec::with_capacity(outputs.len());
    for (output_name, json) in outputs {
        let text = printer.print(&crate::Value::from(json))?;
        rendered.push((output_name, text));
    }

    for (output_name, text) in rendered {
        match &options.out {
            Some(dir) => {
                let target = dir
                    .join(relative_parent(template))
                    .join(format!("{}.json", output_name));
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, format!("{}\n", text))?;
                info!(file = %target.display(), "wrote output");
                report.written.push(target);
            }
            None => {
                writeln!(out, "{}.json:", output_name)?;
                writeln!(out, "{}", text)?;
            }
        }
    }
    Ok(())
}

/// Source directory with root and `..` components dropped, so it can be
/// nested under the output directory.
fn relative_parent(source: &Path) -> PathBuf {
    source
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect()
        })
        .unwrap_or_default()
}
