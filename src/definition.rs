//! Calculation definitions and body normalization.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CalcError, ExprError};
use crate::expr::CompiledExpr;
use crate::path::{FieldPath, CALC_PREFIX};

/// Signature of a native calculation body.
///
/// The body receives resolved dependency values in declaration order and
/// returns the calculation's value. Missing snapshot fields arrive as
/// `Value::Null`; bodies are responsible for defaulting internally.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, anyhow::Error> + Send + Sync>;

/// One dependency of a calculation.
///
/// The string form is either a dotted field path into the snapshot
/// (`recipe.batch_gal`) or a reference to another calculation's output,
/// marked by the reserved `calc:` prefix (`calc:og`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A dotted field path into the current snapshot.
    Field(FieldPath),
    /// Another calculation's output, by id.
    Calc(String),
}

impl Dependency {
    /// Parse the string form of a dependency path.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(CALC_PREFIX) {
            Some(id) => Dependency::Calc(id.to_string()),
            None => Dependency::Field(FieldPath::parse(raw)),
        }
    }
}

/// The body of a calculation definition.
pub enum CalcBody {
    /// A native Rust closure, used as-is.
    Native(NativeFn),
    /// Closure-shaped source text, compiled once at wiring time by the
    /// expression sublanguage.
    Expr(String),
}

impl fmt::Debug for CalcBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcBody::Native(_) => write!(f, "Native(..)"),
            CalcBody::Expr(source) => write!(f, "Expr({:?})", source),
        }
    }
}

/// A declarative description of one named calculation.
///
/// `depends_on` is ordered: the body receives resolved argument values in
/// exactly that order. Ids must be unique within one wiring pass, and a
/// definition must appear after every calculation it references.
#[derive(Debug)]
pub struct CalcDefinition {
    /// Unique id of this calculation within a wiring pass.
    pub id: String,
    /// Ordered dependency paths (field paths or `calc:` references).
    pub depends_on: Vec<String>,
    /// The calculation body.
    pub body: CalcBody,
}

impl CalcDefinition {
    /// Define a calculation with a native body.
    pub fn native<I, D, F>(id: impl Into<String>, depends_on: I, body: F) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
        F: Fn(&[Value]) -> Result<Value, anyhow::Error> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            body: CalcBody::Native(Arc::new(body)),
        }
    }

    /// Define a calculation with a textual body.
    pub fn expr<I, D>(id: impl Into<String>, depends_on: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        Self {
            id: id.into(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            body: CalcBody::Expr(source.into()),
        }
    }

    /// Parse the declared dependency paths, preserving order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.depends_on.iter().map(|raw| Dependency::parse(raw)).collect()
    }
}

/// A body normalized to a uniform variadic callable.
///
/// Native bodies are used as-is; textual bodies are compiled exactly once, at
/// wiring time. A compilation failure surfaces there, never at first use.
#[derive(Clone)]
pub enum CompiledBody {
    /// A native body.
    Native(NativeFn),
    /// A compiled textual body.
    Expr(Arc<CompiledExpr>),
}

impl CompiledBody {
    /// Call the body with resolved argument values in declaration order.
    pub fn call(&self, args: &[Value]) -> Result<Value, CalcError> {
        match self {
            CompiledBody::Native(f) => f(args).map_err(CalcError::from),
            CompiledBody::Expr(expr) => Ok(expr.eval(args)),
        }
    }
}

impl CalcBody {
    /// Normalize this body for the given dependency count.
    ///
    /// Textual bodies whose parameter list does not match the dependency
    /// count are rejected here.
    pub(crate) fn compile(&self, arity: usize) -> Result<CompiledBody, ExprError> {
        match self {
            CalcBody::Native(f) => Ok(CompiledBody::Native(f.clone())),
            CalcBody::Expr(source) => {
                let compiled = CompiledExpr::compile(source)?;
                if compiled.arity() != arity {
                    return Err(ExprError::ArityMismatch {
                        takes: compiled.arity(),
                        declared: arity,
                    });
                }
                Ok(CompiledBody::Expr(Arc::new(compiled)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dependency_parsing_distinguishes_calc_references() {
        assert_eq!(
            Dependency::parse("calc:og"),
            Dependency::Calc("og".to_string())
        );
        assert_eq!(
            Dependency::parse("recipe.batch_gal"),
            Dependency::Field(FieldPath::parse("recipe.batch_gal"))
        );
    }

    #[test]
    fn native_bodies_pass_through() {
        let def = CalcDefinition::native("sum", ["a", "b"], |args| {
            let a = args[0].as_f64().unwrap_or(0.0);
            let b = args[1].as_f64().unwrap_or(0.0);
            Ok(json!(a + b))
        });
        let body = def.body.compile(2).unwrap();
        assert_eq!(body.call(&[json!(1.0), json!(2.0)]).unwrap(), json!(3.0));
    }

    #[test]
    fn expr_arity_is_checked_against_dependencies() {
        let def = CalcDefinition::expr("fg", ["calc:og", "attenuation"], "|og| og");
        let err = def.body.compile(def.depends_on.len()).unwrap_err();
        assert_eq!(
            err,
            ExprError::ArityMismatch {
                takes: 1,
                declared: 2
            }
        );
    }
}
