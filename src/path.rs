//! Dotted-path resolution against a snapshot document.

use std::fmt;

use serde_json::Value;

/// Reserved prefix marking a dependency as another calculation's output.
pub(crate) const CALC_PREFIX: &str = "calc:";

/// Resolve a dotted field path against a snapshot.
///
/// Strips the reserved `calc:` prefix if present, splits the path on `.`, and
/// folds across the snapshot one segment at a time. Object segments index
/// maps; numeric segments index arrays. Returns `None` the moment a segment
/// is missing rather than panicking: recipe documents are partially populated
/// during editing, and calculations receive `null` for absent inputs.
///
/// ```
/// use serde_json::json;
///
/// let doc = json!({ "recipe": { "hops": [{ "alpha_acid": 5.5 }] } });
/// assert_eq!(
///     brewflow::resolve(&doc, "recipe.hops.0.alpha_acid"),
///     Some(&json!(5.5)),
/// );
/// assert_eq!(brewflow::resolve(&doc, "recipe.fermentables"), None);
/// ```
pub fn resolve<'a>(snapshot: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix(CALC_PREFIX).unwrap_or(path);
    path.split('.').try_fold(snapshot, step)
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// A field path split into segments once, at wiring time.
///
/// Resolution semantics are identical to [`resolve`]; the split is just not
/// repeated on every recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path, stripping the reserved `calc:` prefix if present.
    pub fn parse(path: &str) -> Self {
        let path = path.strip_prefix(CALC_PREFIX).unwrap_or(path);
        Self {
            segments: path.split('.').map(str::to_owned).collect(),
        }
    }

    /// Resolve this path against a snapshot, returning `None` on the first
    /// missing segment.
    pub fn resolve_in<'a>(&self, snapshot: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(snapshot, |value, segment| step(value, segment))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
