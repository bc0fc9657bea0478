use std::path::PathBuf;
use thiserror::Error;

use crate::value::Value;

/// Problems found while resolving schema nodes. Never fatal: the resolver logs
/// them, skips the node and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("unrecognized type node ({kind}) in {context}")]
    UnrecognizedNode { context: String, kind: &'static str },
    #[error("{what} in {context} has no name")]
    MissingName { context: String, what: &'static str },
    #[error("record {record} extends unknown type {parent}")]
    UnknownParent { record: String, parent: String },
    #[error("extends cycle through {record}")]
    ExtendsCycle { record: String },
}

/// The normalized document does not fit the canonical contract.
#[derive(Debug, Clone, Error)]
#[error("document does not match {target} at {path}: {message}")]
pub struct ConversionError {
    pub target: &'static str,
    pub path: String,
    pub message: String,
    /// The normalized tree that failed to decode, kept for diagnosis.
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("document has no class tag")]
    MissingClass,
    #[error("unknown document class `{0}`")]
    UnknownClass(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("reference depth exceeds {limit} while loading {}", path.display())]
    RecursionLimit { path: PathBuf, limit: usize },
    #[error("reference cycle: {} is already being loaded", path.display())]
    ReferenceCycle { path: PathBuf },
    #[error("cannot pick a process out of $graph in {} (fragment: {fragment:?})", path.display())]
    AmbiguousGraph { path: PathBuf, fragment: Option<String> },
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to render {template}: {source}")]
    Render { template: &'static str, source: tera::Error },
}

/// A `#name` run reference inside a `$graph` bundle that matched no member.
/// Reported, not raised: the step keeps the dangling path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub workflow: Option<String>,
    pub step: Option<String>,
    pub reference: String,
}

impl std::fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step {} of {} runs {} which is not in the bundle",
            self.step.as_deref().unwrap_or("<anonymous>"),
            self.workflow.as_deref().unwrap_or("<anonymous>"),
            self.reference,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_names_the_path() {
        let err = ConversionError {
            target: "Workflow",
            path: "steps[0].run".into(),
            message: "unknown variant `bogus`".into(),
            payload: Value::Null,
        };
        assert_eq!(
            err.to_string(),
            "document does not match Workflow at steps[0].run: unknown variant `bogus`"
        );
    }

    #[test]
    fn unresolved_reference_formats_missing_ids() {
        let r = UnresolvedReference { workflow: Some("main".into()), step: None, reference: "#tool".into() };
        assert_eq!(r.to_string(), "step <anonymous> of main runs #tool which is not in the bundle");
    }
}
