//! # Template Processor
//!
//! Walks a JSON template tree and resolves it against a scope.
//!
//! ## Documents
//!
//! A template document is a JSON object with directive keys:
//!
//! ```json
//! {
//!   "$extend": "shared",
//!   "$scope": { "prefix": "demo" },
//!   "$files": { "array": "{{0..2}}", "fileName": "{{'item_' + value}}" },
//!   "$template": {
//!     "id": "{{prefix + ':' + value}}",
//!     "{{#tags as tag}}": { "{{tag}}": true },
//!     "{{?value > 0}}": { "notFirst": true }
//!   }
//! }
//! ```
//!
//! - `$template` - the body to resolve (required)
//! - `$scope` - document bindings, resolved before the body
//! - `$extend` - module name or list of names to inherit scope and template from
//! - `$files` - fan out into one output per array element (`index`, `value` bound)
//! - `$comment` - ignored
//!
//! ## Nodes
//!
//! - Strings wrapped in `{{ }}` are replaced by the expression's value.
//! - `{{#expr}}` / `{{#expr as name}}` keys repeat their body per element.
//! - `{{?expr}}` keys include their body when the condition is truthy.
//! - Other `{{expr}}` keys compute the key name.
//! - Nested objects holding `$template` are directive nodes.
//!
//! After resolution, `null` and `"null"` values are removed everywhere.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    evaluator::{EvalConfig, EvalError, Evaluator, compile},
    functions::Registry,
    merge::{merge_into, strip_nulls},
    path::Path,
    scope::Scope,
    value::{Map, Value},
};

const TEMPLATE: &str = "$template";
const SCOPE: &str = "$scope";
const EXTEND: &str = "$extend";
const FILES: &str = "$files";
const COMMENT: &str = "$comment";
const MODULE: &str = "$module";

/// Name bound to the element of an iteration without `as name`.
pub const DEFAULT_ELEMENT_NAME: &str = "value";
/// Name bound to the position of the current element.
pub const INDEX_NAME: &str = "index";

static ITERATION_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\{\{\s*#(.+?)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?\s*\}\}$")
        .expect("iteration key pattern is valid")
});

static CONDITIONAL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\{\{\s*\?(.+)\}\}$").expect("conditional key pattern is valid")
});

/// Errors raised while processing template documents and modules.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The document text is not valid JSON
    #[error("Invalid JSON in {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// An expression, merge or module lookup failed at `path`
    #[error("{path}: {source}")]
    Eval {
        path: Path,
        #[source]
        source: EvalError,
    },

    /// Directives used in a way the processor cannot interpret
    #[error("{path}: {message}")]
    InvalidTemplate { path: Path, message: String },
}

impl TemplateError {
    fn eval(path: &Path, source: EvalError) -> Self {
        TemplateError::Eval {
            path: path.clone(),
            source,
        }
    }

    fn invalid(path: &Path, message: impl Into<String>) -> Self {
        TemplateError::InvalidTemplate {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// The underlying evaluation error, if this is one.
    pub fn eval_error(&self) -> Option<&EvalError> {
        match self {
            TemplateError::Eval { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Location of the failing node inside the document, when known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            TemplateError::Eval { path, .. } | TemplateError::InvalidTemplate { path, .. } => {
                Some(path)
            }
            TemplateError::Json { .. } => None,
        }
    }
}

/// Shared data loaded from a module source.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// Resolved `$scope` object
    pub scope: Value,
    /// Unresolved `$template`, merged under each extending template
    pub template: Option<Value>,
}

/// Processes modules and template documents.
///
/// Modules are registered once with [`Processor::process_module`] and stay
/// available to every document processed afterwards.
///
/// # Examples
///
/// ```
/// use jsonte::{Processor, Scope};
///
/// let processor = Processor::default();
/// let outputs = processor
///     .process_document(
///         "numbers",
///         r#"{"$template": {"evens": "{{filter(0..6, x => mod(x, 2) == 0)}}"}}"#,
///         &Scope::new(),
///     )
///     .unwrap();
/// assert_eq!(outputs["numbers"], serde_json::json!({"evens": [0, 2, 4, 6]}));
/// ```
#[derive(Debug, Clone)]
pub struct Processor {
    registry: Arc<Registry>,
    config: EvalConfig,
    modules: IndexMap<String, Module>,
}

impl Default for Processor {
    fn default() -> Self {
        Processor::new(Registry::builtins())
    }
}

impl Processor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Processor {
            registry,
            config: EvalConfig::default(),
            modules: IndexMap::new(),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Load a module source and register it under its `$module` name.
    ///
    /// The module's `$scope` is resolved once, against `scope`. A module
    /// registered under an existing name replaces it.
    pub fn process_module(&mut self, text: &str, scope: &Scope) -> Result<&Module, TemplateError> {
        let source = load_module_source(text)?;
        let root = Path::root();
        check_keys(&source, &[MODULE, SCOPE, TEMPLATE, COMMENT], &root)?;

        let name = match source.get(MODULE) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            Some(_) => {
                return Err(TemplateError::invalid(
                    &root.field(MODULE),
                    "module name must be a non-empty string",
                ));
            }
            None => return Err(TemplateError::invalid(&root, "missing $module")),
        };

        let scope_value = match source.get(SCOPE) {
            Some(node) => {
                let mut resolver = Resolver::new(self);
                let base = Arc::new(scope.clone());
                let resolved = resolver.resolve_bindings(node, &base, &root.field(SCOPE))?;
                Value::object(resolved)
            }
            None => Value::object(Map::new()),
        };

        let bindings = scope_value.as_object().map_or(0, Map::len);
        debug!(module = %name, bindings, "registered module");
        let module = Module {
            name: name.clone(),
            scope: scope_value,
            template: source.get(TEMPLATE).cloned(),
        };
        self.modules.insert(name.clone(), module);
        self.modules
            .get(&name)
            .ok_or_else(|| TemplateError::invalid(&root, "module was not registered"))
    }

    /// Process a template document into its named outputs.
    ///
    /// Without `$files` there is one output, named `name`. With `$files`
    /// there is one output per element of its array.
    pub fn process_document(
        &self,
        name: &str,
        text: &str,
        scope: &Scope,
    ) -> Result<IndexMap<String, serde_json::Value>, TemplateError> {
        debug!(document = name, "compiling document");
        let document = parse_object(name, text)?;
        let root = Path::root();
        check_keys(&document, &[TEMPLATE, SCOPE, EXTEND, FILES, COMMENT], &root)?;
        if !document.contains_key(TEMPLATE) {
            return Err(TemplateError::invalid(&root, "missing $template"));
        }

        let mut resolver = Resolver::new(self);
        let global = Arc::new(scope.clone());
        let (working, body) = resolver.extend(&document, &global, &root)?;
        let body_path = root.field(TEMPLATE);

        let mut outputs = IndexMap::new();
        let Some(files) = document.get(FILES) else {
            outputs.insert(name.to_string(), resolver.finish(&body, &working, &body_path)?);
            return Ok(outputs);
        };

        let files_path = root.field(FILES);
        let Value::Object(files) = files else {
            return Err(TemplateError::invalid(
                &files_path,
                "$files must be an object with array and fileName",
            ));
        };
        let (Some(array), Some(file_name)) = (files.get("array"), files.get("fileName")) else {
            return Err(TemplateError::invalid(
                &files_path,
                "$files requires both array and fileName",
            ));
        };

        let items = match resolver.resolve(array, &working, &files_path.field("array"))? {
            Value::Array(items) => items,
            other => {
                return Err(TemplateError::invalid(
                    &files_path.field("array"),
                    format!("$files array must be an array, found {}", other.kind_name()),
                ));
            }
        };
        debug!(document = name, outputs = items.len(), "fanning out document");

        for (index, item) in items.iter().enumerate() {
            let step = Arc::new(iteration_scope(&working, DEFAULT_ELEMENT_NAME, item, index));
            let output_name = resolver
                .resolve(file_name, &step, &files_path.field("fileName"))?
                .to_display_string();
            let output = resolver.finish(&body, &step, &body_path)?;
            if outputs.insert(output_name.clone(), output).is_some() {
                return Err(TemplateError::invalid(
                    &files_path.field("fileName"),
                    format!("duplicate output name '{}'", output_name),
                ));
            }
        }
        Ok(outputs)
    }

    /// Resolve a bare template tree (no document directives at the root)
    /// and strip nulls from the result.
    pub fn process_value(&self, template: &Value, scope: &Scope) -> Result<Value, TemplateError> {
        let mut resolver = Resolver::new(self);
        let mut value = resolver.resolve(template, &Arc::new(scope.clone()), &Path::root())?;
        strip_nulls(&mut value);
        Ok(value)
    }
}

/// Parse module source text into its JSON object.
pub fn load_module_source(text: &str) -> Result<Map, TemplateError> {
    parse_object("module", text)
}

fn parse_object(name: &str, text: &str) -> Result<Map, TemplateError> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(|source| TemplateError::Json {
        name: name.to_string(),
        source,
    })?;
    match Value::from(json) {
        Value::Object(map) => Ok(Arc::unwrap_or_clone(map)),
        other => Err(TemplateError::invalid(
            &Path::root(),
            format!("expected an object, found {}", other.kind_name()),
        )),
    }
}

fn check_keys(map: &Map, allowed: &[&str], path: &Path) -> Result<(), TemplateError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(TemplateError::invalid(
            &path.field(key),
            format!("unexpected key '{}' in directive", key),
        )),
        None => Ok(()),
    }
}

/// The source of a `{{ ... }}` string, if it is one.
fn expression_source(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.len() >= 4 && trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        Some(&trimmed[2..trimmed.len() - 2])
    } else {
        None
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Key<'a> {
    Comment,
    Iteration { source: &'a str, name: &'a str },
    Conditional(&'a str),
    Computed(&'a str),
    Literal,
}

fn classify(key: &str) -> Key<'_> {
    if key == COMMENT {
        return Key::Comment;
    }
    let trimmed = key.trim();
    if let Some(captures) = ITERATION_KEY.captures(trimmed)
        && let Some(source) = captures.get(1)
    {
        let name = captures.get(2).map_or(DEFAULT_ELEMENT_NAME, |m| m.as_str());
        return Key::Iteration {
            source: source.as_str(),
            name,
        };
    }
    if let Some(source) = CONDITIONAL_KEY.captures(trimmed).and_then(|c| c.get(1)) {
        return Key::Conditional(source.as_str());
    }
    match expression_source(key) {
        Some(source) => Key::Computed(source),
        None => Key::Literal,
    }
}

fn iteration_scope(parent: &Arc<Scope>, name: &str, item: &Value, index: usize) -> Scope {
    let mut bindings = Map::new();
    bindings.insert(INDEX_NAME.to_string(), Value::Integer(index as i64));
    bindings.insert(name.to_string(), item.clone());
    Scope::with_bindings(parent, bindings)
}

/// One processing pass: an evaluator plus the document nesting depth.
struct Resolver<'p> {
    processor: &'p Processor,
    evaluator: Evaluator<'p>,
    depth: usize,
}

impl<'p> Resolver<'p> {
    fn new(processor: &'p Processor) -> Self {
        Resolver {
            processor,
            evaluator: Evaluator::with_config(&processor.registry, processor.config),
            depth: 0,
        }
    }

    fn eval(
        &mut self,
        source: &str,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Value, TemplateError> {
        let expr = compile(source).map_err(|e| TemplateError::eval(path, e))?;
        self.evaluator
            .evaluate(&expr, scope)
            .map_err(|e| TemplateError::eval(path, e))
    }

    /// Resolve, strip nulls and convert to JSON.
    fn finish(
        &mut self,
        body: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<serde_json::Value, TemplateError> {
        let mut value = self.resolve(body, scope, path)?;
        strip_nulls(&mut value);
        serde_json::Value::try_from(&value).map_err(|e| TemplateError::eval(path, e))
    }

    fn resolve(
        &mut self,
        node: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Value, TemplateError> {
        let limit = self.processor.config.max_depth;
        if self.depth >= limit {
            return Err(TemplateError::eval(path, EvalError::RecursionLimitExceeded { limit }));
        }
        self.depth += 1;
        let result = self.resolve_node(node, scope, path);
        self.depth -= 1;
        result
    }

    fn resolve_node(
        &mut self,
        node: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Value, TemplateError> {
        match node {
            Value::String(text) => match expression_source(text) {
                Some(source) => {
                    let value = self.eval(source, scope, path)?;
                    if value.is_callable() {
                        return Err(TemplateError::eval(
                            path,
                            EvalError::TypeError(format!(
                                "a {} cannot be stored in a document",
                                value.kind_name()
                            )),
                        ));
                    }
                    // Results may share nodes with the scope; the output tree must not.
                    Ok(value.deep_copy())
                }
                None => Ok(node.clone()),
            },
            Value::Array(items) => self.resolve_array(items, scope, path),
            Value::Object(map) if map.contains_key(TEMPLATE) => {
                check_keys(map, &[TEMPLATE, SCOPE, EXTEND, COMMENT], path)?;
                let (working, body) = self.extend(map, scope, path)?;
                self.resolve(&body, &working, &path.field(TEMPLATE))
            }
            Value::Object(map) => self.resolve_object(map, scope, path),
            other => Ok(other.clone()),
        }
    }

    /// Scope and body of a directive: `$extend` modules and `$scope` bindings
    /// layered over `scope`, and `$template` with module templates merged under it.
    fn extend(
        &mut self,
        directive: &Map,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<(Arc<Scope>, Value), TemplateError> {
        let extend_path = path.field(EXTEND);
        let modules = self.extended_modules(directive.get(EXTEND), &extend_path)?;

        let mut module_bindings = Value::object(Map::new());
        for module in &modules {
            merge_into(&mut module_bindings, &module.scope)
                .map_err(|e| TemplateError::eval(&extend_path, e))?;
        }
        let module_bindings = match module_bindings {
            Value::Object(map) => Arc::unwrap_or_clone(map),
            _ => Map::new(),
        };

        let working = match directive.get(SCOPE) {
            Some(node) => {
                let base = Arc::new(Scope::with_bindings(scope, module_bindings.clone()));
                let scope_path = path.field(SCOPE);
                let local = self.resolve_bindings(node, &base, &scope_path)?;
                let mut combined = Value::object(local.clone());
                merge_into(&mut combined, &Value::object(module_bindings))
                    .map_err(|e| TemplateError::eval(&scope_path, e))?;
                let mut bindings = match combined {
                    Value::Object(map) => Arc::unwrap_or_clone(map),
                    _ => Map::new(),
                };
                // A binding deleted from a module still shadows outer scopes.
                for (key, value) in &local {
                    if value.is_deletion_sentinel() && !bindings.contains_key(key) {
                        bindings.insert(key.clone(), Value::Null);
                    }
                }
                Scope::with_bindings(scope, bindings)
            }
            None => Scope::with_bindings(scope, module_bindings),
        };

        let template_path = path.field(TEMPLATE);
        let mut body = directive.get(TEMPLATE).cloned().unwrap_or(Value::Null);
        for module in &modules {
            if let Some(template) = &module.template {
                merge_into(&mut body, template)
                    .map_err(|e| TemplateError::eval(&template_path, e))?;
            }
        }
        Ok((Arc::new(working), body))
    }

    fn extended_modules(
        &self,
        node: Option<&Value>,
        path: &Path,
    ) -> Result<Vec<&'p Module>, TemplateError> {
        let names: Vec<&str> = match node {
            None => Vec::new(),
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().ok_or_else(|| {
                        TemplateError::invalid(path, "$extend entries must be module names")
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(TemplateError::invalid(
                    path,
                    format!(
                        "$extend must be a module name or a list of names, found {}",
                        other.kind_name()
                    ),
                ));
            }
        };

        let processor = self.processor;
        names
            .into_iter()
            .map(|name| {
                processor.modules.get(name).ok_or_else(|| {
                    TemplateError::eval(path, EvalError::ModuleNotFound { name: name.to_string() })
                })
            })
            .collect()
    }

    /// Resolve a `$scope` node, which must produce an object.
    fn resolve_bindings(
        &mut self,
        node: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Map, TemplateError> {
        match self.resolve(node, scope, path)? {
            Value::Object(map) => Ok(Arc::unwrap_or_clone(map)),
            other => Err(TemplateError::invalid(
                path,
                format!("$scope must be an object, found {}", other.kind_name()),
            )),
        }
    }

    /// Resolve `body` once per element of the array `source` evaluates to.
    fn iterate(
        &mut self,
        source: &str,
        name: &str,
        body: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Vec<Value>, TemplateError> {
        let items = match self.eval(source, scope, path)? {
            Value::Array(items) => items,
            other => {
                return Err(TemplateError::eval(
                    path,
                    EvalError::TypeError(format!("cannot iterate over {}", other.kind_name())),
                ));
            }
        };
        trace!(%path, count = items.len(), element = name, "expanding iteration");

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let step = Arc::new(iteration_scope(scope, name, item, index));
            results.push(self.resolve(body, &step, &path.index(index))?);
        }
        Ok(results)
    }

    fn conditional(
        &mut self,
        source: &str,
        body: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Option<Value>, TemplateError> {
        if self.eval(source, scope, path)?.is_truthy() {
            self.resolve(body, scope, path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Expansions of a single-key iteration or conditional object inside an array.
    fn expand_element(
        &mut self,
        item: &Value,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Option<Vec<Value>>, TemplateError> {
        let Value::Object(map) = item else {
            return Ok(None);
        };
        let Some((key, body)) = map.get_index(0).filter(|_| map.len() == 1) else {
            return Ok(None);
        };
        let key_path = path.field(key);
        match classify(key) {
            Key::Iteration { source, name } => {
                self.iterate(source, name, body, scope, &key_path).map(Some)
            }
            Key::Conditional(source) => Ok(Some(
                self.conditional(source, body, scope, &key_path)?
                    .into_iter()
                    .collect(),
            )),
            _ => Ok(None),
        }
    }

    fn resolve_array(
        &mut self,
        items: &[Value],
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Value, TemplateError> {
        let mut resolved = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let item_path = path.index(index);
            match self.expand_element(item, scope, &item_path)? {
                Some(expansions) => {
                    for expansion in expansions {
                        match expansion {
                            Value::Array(values) => resolved.extend(values.iter().cloned()),
                            value => resolved.push(value),
                        }
                    }
                }
                None => resolved.push(self.resolve(item, scope, &item_path)?),
            }
        }
        Ok(Value::array(resolved))
    }

    fn resolve_object(
        &mut self,
        map: &Map,
        scope: &Arc<Scope>,
        path: &Path,
    ) -> Result<Value, TemplateError> {
        let mut resolved = Map::new();
        let mut expansions: Vec<(Path, Value)> = Vec::new();

        for (key, value) in map {
            let key_path = path.field(key);
            match classify(key) {
                Key::Comment => {}
                Key::Iteration { source, name } => {
                    for result in self.iterate(source, name, value, scope, &key_path)? {
                        expansions.push((key_path.clone(), result));
                    }
                }
                Key::Conditional(source) => {
                    if let Some(result) = self.conditional(source, value, scope, &key_path)? {
                        expansions.push((key_path, result));
                    }
                }
                Key::Computed(source) => {
                    let name = self.eval(source, scope, &key_path)?;
                    if name.is_callable() {
                        return Err(TemplateError::eval(
                            &key_path,
                            EvalError::TypeError(format!(
                                "a {} cannot be used as a key",
                                name.kind_name()
                            )),
                        ));
                    }
                    let value = self.resolve(value, scope, &key_path)?;
                    resolved.insert(name.to_display_string(), value);
                }
                Key::Literal => {
                    let value = self.resolve(value, scope, &key_path)?;
                    resolved.insert(key.clone(), value);
                }
            }
        }

        // Enclosing keys win over expanded ones; expansions merge in order.
        let mut result = Value::object(resolved);
        for (key_path, expansion) in expansions {
            match expansion {
                Value::Object(_) => merge_into(&mut result, &expansion)
                    .map_err(|e| TemplateError::eval(&key_path, e))?,
                Value::Null => {}
                other => {
                    return Err(TemplateError::invalid(
                        &key_path,
                        format!(
                            "expansions inside an object must produce objects, found {}",
                            other.kind_name()
                        ),
                    ));
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keys() {
        assert_eq!(
            classify("{{#items}}"),
            Key::Iteration { source: "items", name: "value" }
        );
        assert_eq!(
            classify("{{#0..2 as item}}"),
            Key::Iteration { source: "0..2", name: "item" }
        );
        assert_eq!(classify("{{?x > 1}}"), Key::Conditional("x > 1"));
        assert_eq!(classify("{{name}}"), Key::Computed("name"));
        assert_eq!(classify("$comment"), Key::Comment);
        assert_eq!(classify("plain"), Key::Literal);
    }

    #[test]
    fn test_expression_source() {
        assert_eq!(expression_source("  {{ 1 + 1 }} "), Some(" 1 + 1 "));
        assert_eq!(expression_source("prefix {{x}}"), None);
        assert_eq!(expression_source("{{}"), None);
    }
}
