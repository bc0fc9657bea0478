//! Canonical, strictly-typed CWL document model.
//!
//! Every list-or-map and scalar-or-list ambiguity of the input format is gone:
//! parameters and steps are ordered lists, `doc`/`glob`/`source` are lists,
//! `type` is a [`TypeSchema`], defaults are [`DataValue`]s and `run` is a
//! [`RunRecord`]. Unknown keys are rejected, so anything the normalizer failed
//! to canonicalize surfaces as a decode error.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, LoadError};
use crate::schema::TypeSchema;
use crate::value::{Mapping, Value};

// ————————————————————————————————————————————————————————————————————————————
// CLASS TAG
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTag {
    CommandLineTool,
    ExpressionTool,
    Workflow,
}

impl ClassTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassTag::CommandLineTool => "CommandLineTool",
            ClassTag::ExpressionTool => "ExpressionTool",
            ClassTag::Workflow => "Workflow",
        }
    }

    /// Read the `class` attribute of a raw document. An unrecognized class is
    /// a contract violation and carries the document.
    pub fn of(doc: &Value) -> Result<Self, LoadError> {
        let class = match doc.get("class") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => format!("<{}>", other.kind()),
            None => return Err(LoadError::MissingClass),
        };
        class.parse().map_err(|_| {
            LoadError::Conversion(ConversionError {
                target: "ProcessClass",
                path: "class".into(),
                message: format!("unknown document class `{class}`"),
                payload: doc.clone(),
            })
        })
    }
}

impl FromStr for ClassTag {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CommandLineTool" => Ok(ClassTag::CommandLineTool),
            "ExpressionTool" => Ok(ClassTag::ExpressionTool),
            "Workflow" => Ok(ClassTag::Workflow),
            other => Err(LoadError::UnknownClass(other.to_string())),
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ONEOF WRAPPERS
// ————————————————————————————————————————————————————————————————————————————

/// A process boxed by its class (`CWLClass` in the interface description).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessClass {
    #[serde(rename = "commandline")]
    CommandLineTool(Box<CommandLineTool>),
    #[serde(rename = "expression")]
    ExpressionTool(Box<ExpressionTool>),
    #[serde(rename = "workflow")]
    Workflow(Box<Workflow>),
}

/// What a step runs: a path (relative file or `#id` inside a bundle) or an
/// inline process boxed by class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunRecord {
    Path(String),
    Commandline(Box<CommandLineTool>),
    Expression(Box<ExpressionTool>),
    Workflow(Box<Workflow>),
}

/// A discriminated data value, used for parameter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    StringValue(String),
    StructValue(Mapping),
    FloatValue(f64),
    IntValue(i64),
    ListValue(Vec<Value>),
    BoolValue(bool),
}

impl ProcessClass {
    pub fn class(&self) -> ClassTag {
        match self {
            ProcessClass::CommandLineTool(_) => ClassTag::CommandLineTool,
            ProcessClass::ExpressionTool(_) => ClassTag::ExpressionTool,
            ProcessClass::Workflow(_) => ClassTag::Workflow,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ProcessClass::CommandLineTool(p) => p.id.as_deref(),
            ProcessClass::ExpressionTool(p) => p.id.as_deref(),
            ProcessClass::Workflow(p) => p.id.as_deref(),
        }
    }

    pub fn as_workflow(&self) -> Option<&Workflow> {
        match self {
            ProcessClass::Workflow(w) => Some(w),
            _ => None,
        }
    }
}

impl From<ProcessClass> for RunRecord {
    fn from(p: ProcessClass) -> Self {
        match p {
            ProcessClass::CommandLineTool(t) => RunRecord::Commandline(t),
            ProcessClass::ExpressionTool(t) => RunRecord::Expression(t),
            ProcessClass::Workflow(w) => RunRecord::Workflow(w),
        }
    }
}

impl RunRecord {
    pub fn path(&self) -> Option<&str> {
        match self {
            RunRecord::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_process(self) -> Option<ProcessClass> {
        match self {
            RunRecord::Path(_) => None,
            RunRecord::Commandline(t) => Some(ProcessClass::CommandLineTool(t)),
            RunRecord::Expression(t) => Some(ProcessClass::ExpressionTool(t)),
            RunRecord::Workflow(w) => Some(ProcessClass::Workflow(w)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PROCESSES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandLineTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwl_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CommandLineBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_codes: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporary_fail_codes: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permanent_fail_codes: Vec<i64>,
    #[serde(rename = "$namespaces", default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Value>,
    #[serde(rename = "$schemas", default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExpressionTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwl_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Mapping>,
    #[serde(default)]
    pub expression: String,
    #[serde(rename = "$namespaces", default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Value>,
    #[serde(rename = "$schemas", default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwl_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputParameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<WorkflowStep>,
    #[serde(rename = "$namespaces", default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Value>,
    #[serde(rename = "$schemas", default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// PARAMETERS & BINDINGS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InputParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_binding: Option<CommandLineBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_files: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_binding: Option<CommandOutputBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_source: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_merge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_files: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandLineBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_quote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_contents: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandOutputBinding {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glob: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_contents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_eval: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// STEPS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<WorkflowStepInput>,
    #[serde(rename = "out", default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<WorkflowStepOutput>,
    pub run: RunRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scatter: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scatter_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowStepInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_merge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStepOutput {
    pub id: String,
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENTS
// ————————————————————————————————————————————————————————————————————————————

/// A `$graph` bundle after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwl_version: Option<String>,
    #[serde(default)]
    pub graph: Vec<ProcessClass>,
}

impl GraphRecord {
    /// First member whose id (ignoring a leading `#`) equals `name`.
    pub fn find(&self, name: &str) -> Option<&ProcessClass> {
        find_process(&self.graph, name)
    }
}

pub(crate) fn find_process<'a>(members: &'a [ProcessClass], name: &str) -> Option<&'a ProcessClass> {
    let name = name.trim_start_matches('#');
    members.iter().find(|m| m.id().map(|id| id.trim_start_matches('#')) == Some(name))
}

/// Either a single process or a bundle; the output of one conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalDocument {
    Process(ProcessClass),
    Graph(GraphRecord),
}

impl Serialize for CanonicalDocument {
    /// Single processes print unboxed; their `class` field already says what they are.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CanonicalDocument::Process(ProcessClass::CommandLineTool(t)) => t.serialize(serializer),
            CanonicalDocument::Process(ProcessClass::ExpressionTool(t)) => t.serialize(serializer),
            CanonicalDocument::Process(ProcessClass::Workflow(w)) => w.serialize(serializer),
            CanonicalDocument::Graph(g) => g.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn class_tags_parse_exhaustively() {
        assert_eq!("Workflow".parse::<ClassTag>().unwrap(), ClassTag::Workflow);
        assert_eq!("CommandLineTool".parse::<ClassTag>().unwrap(), ClassTag::CommandLineTool);
        assert!(matches!("Operation".parse::<ClassTag>(), Err(LoadError::UnknownClass(c)) if c == "Operation"));
        assert!(matches!(ClassTag::of(&Value::from(json!({"id": "x"}))), Err(LoadError::MissingClass)));
    }

    #[test]
    fn unknown_document_class_keeps_the_document() {
        let doc = Value::from(json!({"class": "Operation", "id": "op"}));
        match ClassTag::of(&doc) {
            Err(LoadError::Conversion(err)) => {
                assert_eq!(err.path, "class");
                assert!(err.message.contains("`Operation`"), "{}", err.message);
                assert_eq!(err.payload, doc);
            }
            other => panic!("unexpected {other:?}"),
        }
        let doc = Value::from(json!({"class": 3}));
        assert!(matches!(ClassTag::of(&doc), Err(LoadError::Conversion(e)) if e.message.contains("<int>")));
    }

    #[test]
    fn run_record_wire_shape() {
        let run: RunRecord = serde_json::from_value(json!({"path": "#tool"})).unwrap();
        assert_eq!(run.path(), Some("#tool"));
        let run: RunRecord = serde_json::from_value(json!({"commandline": {"id": "t", "baseCommand": ["echo"]}})).unwrap();
        let process = run.into_process().unwrap();
        assert_eq!(process.class(), ClassTag::CommandLineTool);
        assert_eq!(process.id(), Some("t"));
    }

    #[test]
    fn data_values_are_tagged() {
        let d: DataValue = serde_json::from_value(json!({"int_value": 4})).unwrap();
        assert_eq!(d, DataValue::IntValue(4));
        assert_eq!(serde_json::to_value(DataValue::StringValue("a".into())).unwrap(), json!({"string_value": "a"}));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_value::<CommandLineTool>(json!({"id": "t", "bogus": 1})).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn bundle_lookup_ignores_leading_hash() {
        let g: GraphRecord = serde_json::from_value(json!({
            "cwlVersion": "v1.0",
            "graph": [{"commandline": {"id": "#tool"}}, {"workflow": {"id": "main"}}]
        }))
        .unwrap();
        assert_eq!(g.find("tool").map(ProcessClass::class), Some(ClassTag::CommandLineTool));
        assert_eq!(g.find("#main").map(ProcessClass::class), Some(ClassTag::Workflow));
        assert!(g.find("other").is_none());
    }
}
