//! Inclusion engine
//!
//! Resolves specifications, loads each matched fragment once per scope and
//! executes its statements against the scope. Fragments may themselves call
//! `include(...)`; nested calls share the scope's visited list, so a file is
//! merged at most once per scope however many globs reach it.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{IncludeError, Result};
use crate::fragment::{self, Expr, Fragment, FragmentKind, SpecExpr, Statement};
use crate::locator::{NoLocator, PackageLocator};
use crate::registry::{module_name, ModuleRegistry, NoopRegistry, DEFAULT_PREFIX};
use crate::resolve::{absolute, resolve};
use crate::scope::{is_reserved, Scope};
use crate::spec::{self, Spec};

/// Include engine with its collaborators
pub struct Engine {
    locator: Box<dyn PackageLocator + Send + Sync>,
    registry: Arc<dyn ModuleRegistry + Send + Sync>,
    registry_prefix: String,
    registry_root: PathBuf,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            locator: Box::new(NoLocator),
            registry: Arc::new(NoopRegistry),
            registry_prefix: DEFAULT_PREFIX.to_string(),
            registry_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the locator used by `resource(...)` specifications
    pub fn with_locator(mut self, locator: impl PackageLocator + Send + Sync + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// Set the registry that receives one entry per merged file
    pub fn with_registry(mut self, registry: Arc<dyn ModuleRegistry + Send + Sync>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_registry_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry_prefix = prefix.into();
        self
    }

    /// Directory that registry names are made relative to
    pub fn with_registry_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.registry_root = root.into();
        self
    }

    /// Build a resource specification with this engine's locator
    pub fn resource(&self, package: impl Into<spec::PackageRef>, filename: impl Into<String>) -> Spec {
        spec::resource(package, filename, self.locator.as_ref())
    }

    /// Merge every file selected by `specs` into `scope`, in order
    ///
    /// Stops at the first error; values merged before it stay in the scope.
    pub fn include(&self, specs: &[Spec], scope: &mut Scope) -> Result<()> {
        scope.ensure_included_files();
        let base_dir = scope.base_dir();

        for spec in specs {
            if spec.is_inert() {
                trace!("skipping empty optional");
                continue;
            }

            let saved = scope.included_file().map(Path::to_path_buf);
            let result = self.include_spec(spec, &base_dir, scope);
            scope.set_included_file(saved);
            result?;
        }
        Ok(())
    }

    fn include_spec(&self, spec: &Spec, base_dir: &Path, scope: &mut Scope) -> Result<()> {
        for file in resolve(spec, base_dir)? {
            if !scope.mark_included(&file.path) {
                debug!(path = %file.path.display(), "already included, skipping");
                continue;
            }

            scope.set_included_file(Some(file.path.clone()));
            debug!(path = %file.path.display(), kind = %file.kind, "including fragment");

            let unit = fragment::load(&file.path, file.kind)?;
            self.execute(&unit, scope)?;

            let name = module_name(&self.registry_prefix, &self.registry_root, &file.path);
            self.registry.register(&name, &file.path);
        }
        Ok(())
    }

    /// Run a fragment's statements against `scope`
    pub fn execute(&self, unit: &Fragment, scope: &mut Scope) -> Result<()> {
        for statement in unit.statements() {
            trace!(path = %unit.path().display(), line = statement.line(), "executing statement");
            match statement {
                Statement::Assign { name, value, .. } => {
                    check_name(unit, name)?;
                    let value = evaluate(unit, value, scope)?;
                    scope.insert(name.as_str(), value);
                }
                Statement::Extend { name, value, .. } => {
                    check_name(unit, name)?;
                    let addition = evaluate(unit, value, scope)?;
                    let current = scope.get(name).cloned().ok_or_else(|| IncludeError::UndefinedName {
                        path: unit.path().to_path_buf(),
                        name: name.clone(),
                    })?;
                    let merged = extend(current, addition).map_err(|message| {
                        IncludeError::TypeMismatch {
                            path: unit.path().to_path_buf(),
                            name: name.clone(),
                            message,
                        }
                    })?;
                    scope.insert(name.as_str(), merged);
                }
                Statement::Delete { name, .. } => {
                    check_name(unit, name)?;
                    scope.remove(name);
                }
                Statement::Include { specs, .. } => {
                    let specs = specs
                        .iter()
                        .map(|s| self.build_spec(s))
                        .collect::<Result<Vec<_>>>()?;
                    self.include(&specs, scope)?;
                }
            }
        }
        Ok(())
    }

    fn build_spec(&self, expr: &SpecExpr) -> Result<Spec> {
        match expr {
            SpecExpr::Entry(pattern) => spec::entry(pattern.as_str()),
            SpecExpr::Compiled(pattern) => spec::compiled(pattern.as_str()),
            SpecExpr::OneOf(alternatives) => spec::one_of(
                alternatives
                    .iter()
                    .map(|alt| self.build_spec(alt))
                    .collect::<Result<Vec<_>>>()?,
            ),
            SpecExpr::Optional(None) => spec::optional(None::<Spec>),
            SpecExpr::Optional(Some(inner)) => spec::optional(self.build_spec(inner)?),
            SpecExpr::Resource { package, filename } => {
                Ok(self.resource(package.as_str(), filename.as_str()))
            }
        }
    }

    /// Merge a root settings file into a fresh scope owned by it
    pub fn merge_file(&self, path: &Path) -> Result<Scope> {
        let path = absolute(path).map_err(|e| IncludeError::io(path, e))?;
        let mut scope = Scope::new(&path);

        let pattern = glob::Pattern::escape(&path.to_string_lossy());
        let root = match FragmentKind::of_path(&path) {
            FragmentKind::Source => spec::entry(pattern)?,
            FragmentKind::Compiled => spec::compiled(pattern)?,
        };
        self.include(&[root], &mut scope)?;
        Ok(scope)
    }
}

fn check_name(unit: &Fragment, name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(IncludeError::ReservedName {
            path: unit.path().to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

fn evaluate(unit: &Fragment, expr: &Expr, scope: &Scope) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| IncludeError::UndefinedName {
                path: unit.path().to_path_buf(),
                name: name.clone(),
            }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}

/// `current += addition`
fn extend(current: Value, addition: Value) -> std::result::Result<Value, String> {
    match (current, addition) {
        (Value::Array(mut items), Value::Array(more)) => {
            items.extend(more);
            Ok(Value::Array(items))
        }
        (Value::Array(mut items), item) => {
            items.push(item);
            Ok(Value::Array(items))
        }
        (Value::String(mut s), Value::String(more)) => {
            s.push_str(&more);
            Ok(Value::String(s))
        }
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a
                    .checked_add(b)
                    .map(Value::from)
                    .ok_or_else(|| "integer overflow".to_string());
            }
            let sum = a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN);
            serde_json::Number::from_f64(sum)
                .map(Value::Number)
                .ok_or_else(|| "result is not a finite number".to_string())
        }
        (Value::Object(mut table), Value::Object(more)) => {
            table.extend(more);
            Ok(Value::Object(table))
        }
        (current, addition) => Err(format!(
            "cannot add {} to {}",
            type_name(&addition),
            type_name(&current)
        )),
    }
}
