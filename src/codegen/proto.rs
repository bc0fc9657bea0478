//! Protocol-Buffer interface description.
use serde::Serialize;
use tracing::debug;

use crate::error::CodegenError;
use crate::schema::{EnumDef, Registry};

use super::{describe, fix_caps, plan_record, render, snake_case, FieldShape, RecordPlan, Tables, UnionSignature};

const HEADER: &str = r#"
syntax = "proto3";

import "google/protobuf/struct.proto";

message ArrayRecord {
    TypeRecord items = 1;
}

message FieldRecord {
    string name = 1;
    TypeRecord type = 2;
}

message RecordRecord {
    string name = 1;
    repeated FieldRecord fields = 2;
}

message EnumRecord {
    string name = 1;
    repeated string symbols = 2;
}

message OneOfRecord {
    repeated TypeRecord types = 1;
}

message TypeRecord {
    oneof type {
        string name = 1;
        ArrayRecord array = 2;
        OneOfRecord oneof = 3;
        RecordRecord record = 4;
        EnumRecord enum = 5;
    }
}

message RunRecord {
    oneof run {
        string path = 1;
        CommandLineTool commandline = 2;
        ExpressionTool expression = 3;
        Workflow workflow = 4;
    }
}

message DataRecord {
    oneof data {
        string string_value = 1;
        google.protobuf.Struct struct_value = 2;
        double float_value = 3;
        int64 int_value = 4;
        google.protobuf.ListValue list_value = 5;
        bool bool_value = 6;
    }
}

message CWLClass {
    oneof class {
        Workflow workflow = 1;
        CommandLineTool commandline = 2;
        ExpressionTool expression = 3;
    }
}

message GraphRecord {
    string cwlVersion = 1;
    repeated CWLClass graph = 2;
}
"#;

const MESSAGE_TEMPLATE: &str = r#"
message {{ name }} {
{%- for field in fields %}
    {{ field.ty }} {{ field.name }} = {{ field.num }};{% if field.comment %} //{{ field.comment }}{% endif %}
{%- endfor %}
}
"#;

const ENUM_TEMPLATE: &str = r#"
enum {{ name }} {
{%- for value in values %}
    {{ value.ident }} = {{ value.num }};
{%- endfor %}
}
"#;

#[derive(Debug, Serialize)]
struct MessageView {
    name: String,
    fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    ty: String,
    name: String,
    num: usize,
    comment: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnumView {
    name: String,
    values: Vec<EnumValueView>,
}

#[derive(Debug, Serialize)]
struct EnumValueView {
    ident: String,
    num: usize,
}

pub struct ProtoEmitter<'a> {
    tables: &'a Tables,
}

impl<'a> ProtoEmitter<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    pub fn emit(&self, registry: &Registry) -> Result<String, CodegenError> {
        let mut out = String::from(HEADER);
        for e in registry.enums() {
            out.push_str(&self.render_enum(e)?);
        }
        for record in registry.records() {
            if self.tables.proto_skip.contains(record.name.as_str()) {
                debug!(record = %record.name, "skipped");
                continue;
            }
            let plan = plan_record(record);
            let message = self.message(&plan, registry);
            // wrappers only exist for fields that no override claimed
            for sig in &plan.unions {
                if message.fields.iter().any(|f| mentions(&f.ty, &sig.name)) || is_nested(sig, &plan) {
                    out.push_str(&render("proto union", MESSAGE_TEMPLATE, &self.union_message(sig, registry))?);
                }
            }
            out.push_str(&render("proto message", MESSAGE_TEMPLATE, &message)?);
        }
        Ok(out)
    }

    fn render_enum(&self, e: &EnumDef) -> Result<String, CodegenError> {
        let view = EnumView {
            name: e.name.clone(),
            values: e
                .symbols
                .iter()
                .enumerate()
                .map(|(num, s)| EnumValueView { ident: format!("{}_{}", e.name, fix_caps(s)), num })
                .collect(),
        };
        render("proto enum", ENUM_TEMPLATE, &view)
    }

    fn message(&self, plan: &RecordPlan, registry: &Registry) -> MessageView {
        let fields = plan
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let (ty, comment) = match self.tables.proto_override(&plan.name, &f.name) {
                    Some(fixed) => (fixed.to_string(), overridden_comment(&f.shape, &f.ty)),
                    None => (self.spell(&f.shape, registry), None),
                };
                FieldView { ty, name: proto_field_name(&f.name), num: i + 1, comment }
            })
            .collect();
        MessageView { name: plan.name.clone(), fields }
    }

    fn union_message(&self, sig: &UnionSignature, registry: &Registry) -> MessageView {
        let fields = sig
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let base = self.type_name(&m.underlying, registry);
                let ty = if m.is_array { format!("repeated {base}") } else { base };
                FieldView { ty, name: snake_case(&m.wrapper_name), num: i + 1, comment: None }
            })
            .collect();
        MessageView { name: sig.name.clone(), fields }
    }

    fn spell(&self, shape: &FieldShape, registry: &Registry) -> String {
        match shape {
            FieldShape::Scalar(n) | FieldShape::Ref(n) => self.type_name(n, registry),
            FieldShape::Union(w) => w.clone(),
            FieldShape::Array(inner) => format!("repeated {}", self.spell(inner, registry)),
        }
    }

    /// Scalars through the lookup table; references to records/enums we emit
    /// by name; anything else degrades to `google.protobuf.Struct`.
    fn type_name(&self, name: &str, registry: &Registry) -> String {
        if let Some(alias) = self.tables.proto_aliases.get(name) {
            return alias.to_string();
        }
        if let Some(scalar) = self.tables.proto_scalars.get(name) {
            return scalar.to_string();
        }
        let emitted = registry.get(name).is_some() && !self.tables.proto_skip.contains(name);
        if emitted || name.ends_with("Element") {
            name.to_string()
        } else {
            "google.protobuf.Struct".to_string()
        }
    }
}

fn proto_field_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// Overridden unions and arrays keep their original type as a comment.
fn overridden_comment(shape: &FieldShape, ty: &crate::schema::TypeSchema) -> Option<String> {
    match shape {
        FieldShape::Union(_) | FieldShape::Array(_) => Some(describe(ty)),
        FieldShape::Scalar(_) | FieldShape::Ref(_) => None,
    }
}

fn mentions(ty: &str, wrapper: &str) -> bool {
    ty == wrapper || ty.strip_prefix("repeated ") == Some(wrapper)
}

/// Element wrappers are referenced from their parent wrapper, not a field.
fn is_nested(sig: &UnionSignature, plan: &RecordPlan) -> bool {
    plan.unions.iter().any(|u| u.members.iter().any(|m| m.underlying == sig.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_schema;
    use crate::value::Value;
    use serde_json::json;

    fn registry(nodes: serde_json::Value) -> Registry {
        let nodes: Vec<Value> = nodes.as_array().unwrap().iter().cloned().map(Value::from).collect();
        resolve_schema(nodes.iter()).registry
    }

    #[test]
    fn header_and_records_are_emitted() {
        let reg = registry(json!([
            {"type": "enum", "name": "Mode", "symbols": ["fast", "slow-ish"]},
            {"type": "record", "name": "Binding", "fields": [
                {"name": "position", "type": ["null", "int"]},
                {"name": "prefix", "type": "string"},
                {"name": "mode", "type": "Mode"},
                {"name": "tags", "type": {"type": "array", "items": "string"}}
            ]}
        ]));
        let src = ProtoEmitter::new(&Tables::default()).emit(&reg).unwrap();
        assert!(src.contains("syntax = \"proto3\";"));
        assert!(src.contains("message TypeRecord {"));
        assert!(src.contains("enum Mode {\n    Mode_Fast = 0;\n    Mode_Slow_ish = 1;\n}"));
        assert!(src.contains("message Binding {\n    int64 position = 1;\n    string prefix = 2;\n    Mode mode = 3;\n    repeated string tags = 4;\n}"));
    }

    #[test]
    fn union_wrapper_keeps_only_array_member() {
        let reg = registry(json!([
            {"type": "record", "name": "Foo", "fields": [{"name": "n", "type": "int"}]},
            {"type": "record", "name": "Holder", "fields": [
                {"name": "items", "type": [{"type": "array", "items": "Foo"}, "Foo"]}
            ]}
        ]));
        let src = ProtoEmitter::new(&Tables::default()).emit(&reg).unwrap();
        assert!(src.contains("message HolderItems {\n    repeated Foo foo_value = 1;\n}"));
        assert!(src.contains("HolderItems items = 1;"));
    }

    #[test]
    fn overrides_and_skips_apply() {
        let reg = registry(json!([
            {"type": "record", "name": "ArraySchema", "fields": [{"name": "items", "type": "string"}]},
            {"type": "record", "name": "WorkflowStep", "fields": [
                {"name": "id", "type": "string"},
                {"name": "run", "type": ["string", "Process"]},
                {"name": "doc", "type": ["null", "string", {"type": "array", "items": "string"}]}
            ]}
        ]));
        let src = ProtoEmitter::new(&Tables::default()).emit(&reg).unwrap();
        assert!(!src.contains("message ArraySchema"));
        assert!(src.contains("RunRecord run = 2; //string | Process"));
        assert!(src.contains("repeated string doc = 3;"));
        assert!(!src.contains("message WorkflowStepRun"));
    }
}
