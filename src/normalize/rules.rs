//! Rewrite tables and the generic, class-independent rewrites they drive.
use std::collections::HashSet;

use tracing::{trace, warn};

use crate::cwl::ClassTag;
use crate::resolve::resolve_type;
use crate::value::{Mapping, Value};

/// Immutable normalization tables. Built once, shared by reference.
#[derive(Debug, Clone)]
pub struct Rules {
    /// Process-level fields that may be written as id-keyed maps, per class.
    pub command_line_tool: HashSet<&'static str>,
    pub expression_tool: HashSet<&'static str>,
    pub workflow: HashSet<&'static str>,
    /// Step-level map fields other than `in`.
    pub step: HashSet<&'static str>,
    /// Scalar-or-list fields, wrapped wherever they appear on a rewritten record.
    pub force_list: HashSet<&'static str>,
    /// Field a scalar map entry lands in for process-level maps.
    pub parameter_tag: &'static str,
    /// Same, for a step's `in` map.
    pub step_input_tag: &'static str,
}

impl Default for Rules {
    fn default() -> Self {
        let tool = ["inputs", "outputs", "hints", "requirements"];
        Self {
            command_line_tool: HashSet::from(tool),
            expression_tool: HashSet::from(tool),
            workflow: tool.into_iter().chain(["steps"]).collect(),
            step: HashSet::from(["hints", "requirements"]),
            force_list: HashSet::from(["doc", "baseCommand", "glob", "scatter", "source", "outputSource"]),
            parameter_tag: "type",
            step_input_tag: "source",
        }
    }
}

impl Rules {
    pub fn dict_fields(&self, class: ClassTag) -> &HashSet<&'static str> {
        match class {
            ClassTag::CommandLineTool => &self.command_line_tool,
            ClassTag::ExpressionTool => &self.expression_tool,
            ClassTag::Workflow => &self.workflow,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GENERIC REWRITES
// ————————————————————————————————————————————————————————————————————————————

/// For each field in `fields` whose value is a mapping, turn the entries into
/// an ordered list keyed by `id`. A non-mapping entry value becomes
/// `{id: key, <tag>: value}`; a mapping entry gets `id` injected in front.
pub fn dict_to_list(doc: &Mapping, fields: &HashSet<&str>, tag: &str) -> Mapping {
    doc.iter()
        .map(|(k, v)| match v {
            Value::Mapping(entries) if fields.contains(k.as_str()) => {
                trace!(field = %k, entries = entries.len(), "dict-to-list");
                (k.clone(), Value::Sequence(entries.iter().map(|(id, e)| keyed_entry(id, e, tag)).collect()))
            }
            _ => (k.clone(), v.clone()),
        })
        .collect()
}

fn keyed_entry(id: &str, entry: &Value, tag: &str) -> Value {
    let mut out = Mapping::new();
    out.insert("id".to_string(), Value::from(id));
    match entry {
        Value::Mapping(m) => {
            for (k, v) in m.iter().filter(|(k, _)| k.as_str() != "id") {
                out.insert(k.clone(), v.clone());
            }
        }
        other => {
            out.insert(tag.to_string(), other.clone());
        }
    }
    Value::Mapping(out)
}

/// Wrap non-list values of `fields` in a singleton list. Lists are untouched
/// and an explicit `null` becomes the empty list.
pub fn force_list(doc: &Mapping, fields: &HashSet<&str>) -> Mapping {
    doc.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Sequence(_) => v.clone(),
                Value::Null if fields.contains(k.as_str()) => Value::Sequence(Vec::new()),
                other if fields.contains(k.as_str()) => Value::Sequence(vec![other.clone()]),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Rewrite a `type` attribute into its tagged TypeSchema form. A node the
/// resolver does not recognize is left as-is and fails at decode time.
pub fn tag_type(ty: &Value, context: &str) -> Value {
    let schema = match resolve_type(ty, context) {
        Ok(schema) => schema,
        Err(err) => {
            warn!(%err, "type left untagged");
            return ty.clone();
        }
    };
    match crate::value::to_value(&schema) {
        Ok(v) => v,
        Err(err) => {
            warn!(%err, context, "type left untagged");
            ty.clone()
        }
    }
}

/// Wrap a default value into its discriminated DataValue arm.
pub fn coerce_default(v: &Value) -> Value {
    let arm = match v {
        Value::Null => return Value::Null,
        Value::String(_) => "string_value",
        Value::Mapping(_) => "struct_value",
        Value::Sequence(_) => "list_value",
        Value::Float(_) => "float_value",
        Value::Int(_) => "int_value",
        Value::Bool(_) => "bool_value",
    };
    tagged(arm, v.clone())
}

/// Single-entry mapping `{tag: v}`, the shape of every oneof wrapper.
pub fn tagged(tag: &str, v: Value) -> Value {
    Value::Mapping(Mapping::from([(tag.to_string(), v)]))
}
