//! Error types for wiring and calculation.

use std::fmt;
use std::sync::Arc;

/// Errors raised by [`wire`](crate::wire) and by calculation bodies during
/// propagation.
///
/// Wiring-time variants (`DuplicateId`, `UnknownCalc`, `OutOfOrder`, `Cycle`,
/// `Compile`) abort the wiring pass fail-fast. `User` wraps an error returned
/// by a native calculation body; it is never caught by the engine and
/// propagates out of whatever call triggered the recomputation.
///
/// User errors can be propagated with the `?` operator, which converts any
/// `Into<anyhow::Error>` type into `CalcError::User`.
#[derive(Debug, Clone)]
pub enum CalcError {
    /// Two definitions in the same wiring pass share an id.
    DuplicateId {
        /// The repeated calculation id.
        id: String,
    },

    /// A `calc:` dependency names an id not present in this wiring pass.
    UnknownCalc {
        /// The calculation declaring the dependency.
        id: String,
        /// The missing calculation id.
        dependency: String,
    },

    /// A `calc:` dependency names a definition declared later in the list.
    ///
    /// Calculations must be declared after every calculation they depend on;
    /// binding a forward reference would read a slot that is not live.
    OutOfOrder {
        /// The calculation declaring the dependency.
        id: String,
        /// The forward-referenced calculation id.
        dependency: String,
    },

    /// The declared dependency graph contains a cycle.
    ///
    /// The `path` contains the calculation ids forming the cycle.
    Cycle {
        /// Ids of the calculations forming the cycle.
        path: Vec<String>,
    },

    /// A textual body failed to compile at wiring time.
    Compile {
        /// The calculation whose body failed to compile.
        id: String,
        /// The compilation failure.
        source: ExprError,
    },

    /// A native calculation body returned an error.
    ///
    /// This variant allows body errors to be propagated through the engine
    /// using the `?` operator. Any type implementing `Into<anyhow::Error>`
    /// can be converted to this variant.
    User(Arc<anyhow::Error>),
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcError::DuplicateId { id } => {
                write!(f, "duplicate calculation id `{}`", id)
            }
            CalcError::UnknownCalc { id, dependency } => {
                write!(
                    f,
                    "calculation `{}` depends on unknown calculation `{}`",
                    id, dependency
                )
            }
            CalcError::OutOfOrder { id, dependency } => {
                write!(
                    f,
                    "calculation `{}` depends on `{}`, which is declared later; \
                     calculations must be declared after every calculation they depend on",
                    id, dependency
                )
            }
            CalcError::Cycle { path } => {
                write!(f, "dependency cycle detected: {}", path.join(" -> "))
            }
            CalcError::Compile { id, source } => {
                write!(f, "failed to compile body of `{}`: {}", id, source)
            }
            CalcError::User(e) => write!(f, "calculation error: {}", e),
        }
    }
}

impl<T: Into<anyhow::Error>> From<T> for CalcError {
    fn from(err: T) -> Self {
        CalcError::User(Arc::new(err.into()))
    }
}

impl CalcError {
    /// Returns a reference to the inner body error if this is a `User` variant.
    pub fn user_error(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            CalcError::User(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast the body error to a specific type.
    ///
    /// Returns `Some(&E)` if this is a `User` variant containing an error of
    /// type `E`, otherwise returns `None`.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.user_error().and_then(|e| e.downcast_ref::<E>())
    }

    /// Returns `true` if this is a `User` variant containing an error of type `E`.
    pub fn is<E: std::error::Error + Send + Sync + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }
}

/// Compilation errors for the textual expression sublanguage.
///
/// All of these surface at wiring time; a compiled expression never fails at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// The source does not start with a `|a, b|` parameter list.
    #[error("expected a parameter list like `|a, b|` at the start of the expression")]
    MissingParams,

    /// An unexpected character was encountered.
    #[error("unexpected character `{0}` at byte {1}")]
    UnexpectedChar(char, usize),

    /// The source ended mid-expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Input remained after a complete expression.
    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),

    /// A numeric literal did not parse.
    #[error("invalid numeric literal `{0}`")]
    InvalidNumber(String),

    /// An identifier is not one of the declared parameters.
    #[error("unknown identifier `{0}`; expressions may only reference their parameters")]
    UnknownIdent(String),

    /// The parameter list length does not match the dependency list length.
    #[error("expression takes {takes} parameters but {declared} dependencies are declared")]
    ArityMismatch {
        /// Parameters the expression declares.
        takes: usize,
        /// Dependencies the definition declares.
        declared: usize,
    },
}

/// Errors for malformed physical quantities in the pure formula helpers.
///
/// The engine does not catch these: a body that fails to parse a quantity
/// propagates the error out of the snapshot replacement that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// The unit string is not a recognized unit.
    #[error("unrecognized unit `{0}`")]
    UnrecognizedUnit(String),

    /// The value is not shaped like a quantity.
    #[error("malformed quantity: {0}")]
    Malformed(String),
}
