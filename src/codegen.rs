//! Code emission from a resolved registry.
//!
//! Both targets share one planning pass: every record field's resolved type is
//! classified into a [`FieldShape`], and every OneOf gets a synthesized wrapper
//! ([`union::UnionSignature`]). Targets only differ in spelling and templates.
pub mod proto;
pub mod rust;
pub mod union;

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::CodegenError;
use crate::resolve::local_name;
use crate::schema::{Definition, RecordDef, Registry, TypeSchema};
pub use union::{UnionMember, UnionSignature};

// ————————————————————————————————————————————————————————————————————————————
// TABLES
// ————————————————————————————————————————————————————————————————————————————

/// Avro primitive names (plus `Any`) that never refer to a registry entry.
pub const SCALARS: &[&str] = &["string", "boolean", "int", "long", "float", "double", "Any", "null"];

/// Lookup tables for both targets. Built once and passed to the emitters.
#[derive(Debug, Clone)]
pub struct Tables {
    pub proto_scalars: HashMap<&'static str, &'static str>,
    /// Named types spelled as a plain proto type instead of a reference.
    pub proto_aliases: HashMap<&'static str, &'static str>,
    /// Record → field → proto type; the `*` record applies to every record.
    pub proto_field_fix: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    pub proto_skip: HashSet<&'static str>,
    pub rust_scalars: HashMap<&'static str, &'static str>,
    pub rust_skip: HashSet<&'static str>,
}

impl Default for Tables {
    fn default() -> Self {
        let proto_scalars = HashMap::from([
            ("string", "string"),
            ("boolean", "bool"),
            ("int", "int64"),
            ("long", "int64"),
            ("float", "float"),
            ("double", "double"),
            ("Any", "google.protobuf.Struct"),
            ("null", "google.protobuf.NullValue"),
        ]);
        let proto_aliases = HashMap::from([
            ("CWLVersion", "string"),
            ("LinkMergeMethod", "string"),
            ("ScatterMethod", "string"),
        ]);
        let requirements = ("requirements", "repeated google.protobuf.Struct");
        let proto_field_fix = HashMap::from([
            ("Workflow", HashMap::from([requirements])),
            ("WorkflowStepInput", HashMap::from([("source", "repeated string")])),
            ("WorkflowOutputParameter", HashMap::from([("outputSource", "repeated string")])),
            ("ExpressionTool", HashMap::from([("expression", "string"), requirements])),
            ("CommandOutputBinding", HashMap::from([("glob", "repeated string"), ("outputEval", "string")])),
            (
                "CommandLineTool",
                HashMap::from([
                    ("stdout", "string"),
                    ("stdin", "string"),
                    ("stderr", "string"),
                    ("baseCommand", "repeated string"),
                    requirements,
                    ("arguments", "repeated CommandLineBinding"),
                ]),
            ),
            ("CommandInputParameter", HashMap::from([("default", "DataRecord")])),
            (
                "WorkflowStep",
                HashMap::from([
                    ("run", "RunRecord"),
                    ("scatter", "repeated string"),
                    requirements,
                    ("out", "repeated WorkflowStepOutput"),
                ]),
            ),
            ("EnvironmentDef", HashMap::from([("envValue", "string")])),
            (
                "*",
                HashMap::from([
                    ("doc", "repeated string"),
                    ("type", "TypeRecord"),
                    ("valueFrom", "string"),
                    ("format", "repeated string"),
                    ("secondaryFiles", "repeated string"),
                ]),
            ),
        ]);
        let proto_skip = HashSet::from([
            "Any",
            "ArraySchema",
            "CommandInputArraySchema",
            "OutputArraySchema",
            "InputArraySchema",
            "CommandOutputArraySchema",
            "SchemaDefRequirement",
        ]);
        let rust_scalars = HashMap::from([
            ("string", "String"),
            ("boolean", "bool"),
            ("int", "i32"),
            ("long", "i64"),
            ("float", "f32"),
            ("double", "f64"),
            ("Any", "serde_json::Value"),
            ("null", "()"),
        ]);
        Self {
            proto_scalars,
            proto_aliases,
            proto_field_fix,
            proto_skip,
            rust_scalars,
            rust_skip: HashSet::from(["Any"]),
        }
    }
}

impl Tables {
    pub(crate) fn proto_override(&self, record: &str, field: &str) -> Option<&'static str> {
        self.proto_field_fix
            .get(record)
            .and_then(|m| m.get(field))
            .or_else(|| self.proto_field_fix.get("*").and_then(|m| m.get(field)))
            .copied()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PLANNING
// ————————————————————————————————————————————————————————————————————————————

/// Where a field's resolved type lands in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Scalar(String),
    Ref(String),
    Array(Box<FieldShape>),
    /// Synthesized wrapper type, by name.
    Union(String),
}

#[derive(Debug, Clone)]
pub struct PlannedField {
    pub name: String,
    pub ty: TypeSchema,
    pub shape: FieldShape,
}

#[derive(Debug, Clone)]
pub struct RecordPlan {
    pub name: String,
    pub fields: Vec<PlannedField>,
    /// Wrappers synthesized for this record's OneOf fields, element wrappers first.
    pub unions: Vec<UnionSignature>,
}

pub fn is_scalar(name: &str) -> bool {
    SCALARS.contains(&name)
}

/// Classify every field of a record. Duplicate field names (possible after
/// `extends` flattening) keep their first occurrence.
pub fn plan_record(record: &RecordDef) -> RecordPlan {
    let mut seen = HashSet::new();
    let mut unions = Vec::new();
    let mut fields = Vec::new();
    for field in &record.fields {
        if !seen.insert(field.name.as_str()) {
            continue;
        }
        let wrapper = format!("{}{}", record.name, fix_caps(&field.name));
        let shape = classify(&field.ty, &wrapper, &mut unions);
        fields.push(PlannedField { name: field.name.clone(), ty: field.ty.clone(), shape });
    }
    RecordPlan { name: record.name.clone(), fields, unions }
}

fn classify(ty: &TypeSchema, wrapper: &str, unions: &mut Vec<UnionSignature>) -> FieldShape {
    match ty.without_null() {
        TypeSchema::NamedRef(n) if is_scalar(&n) => FieldShape::Scalar(n),
        TypeSchema::NamedRef(n) => FieldShape::Ref(local_name(&n).to_string()),
        TypeSchema::Record(r) if !r.name.is_empty() => FieldShape::Ref(local_name(&r.name).to_string()),
        TypeSchema::Enum(e) if !e.name.is_empty() => FieldShape::Ref(local_name(&e.name).to_string()),
        TypeSchema::Record(_) | TypeSchema::Enum(_) => FieldShape::Scalar("Any".into()),
        TypeSchema::ArrayOf(a) => match a.items.without_null() {
            TypeSchema::OneOf(u) if u.types.len() > 1 => {
                let name = format!("{wrapper}Element");
                let sig = UnionSignature::build(&name, &u.types, unions);
                unions.push(sig);
                FieldShape::Array(Box::new(FieldShape::Union(name)))
            }
            TypeSchema::ArrayOf(_) => FieldShape::Array(Box::new(FieldShape::Scalar("Any".into()))),
            items => FieldShape::Array(Box::new(classify(&items, wrapper, unions))),
        },
        TypeSchema::OneOf(u) if u.types.is_empty() => FieldShape::Scalar("Any".into()),
        TypeSchema::OneOf(u) => {
            let sig = UnionSignature::build(wrapper, &u.types, unions);
            unions.push(sig);
            FieldShape::Union(wrapper.to_string())
        }
    }
}

/// Compact human rendering of a type, used for generated comments.
pub fn describe(ty: &TypeSchema) -> String {
    match ty {
        TypeSchema::NamedRef(n) => local_name(n).to_string(),
        TypeSchema::ArrayOf(a) => format!("{}[]", describe(&a.items)),
        TypeSchema::OneOf(u) => u.types.iter().map(describe).collect::<Vec<_>>().join(" | "),
        TypeSchema::Record(r) => format!("record {}", r.name),
        TypeSchema::Enum(e) => format!("enum {}", e.name),
    }
}

pub(crate) fn is_enum(registry: &Registry, name: &str) -> bool {
    matches!(registry.get(name), Some(Definition::Enum(_)))
}

// ————————————————————————————————————————————————————————————————————————————
// NAMES
// ————————————————————————————————————————————————————————————————————————————

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false", "fn", "for",
    "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "static",
    "struct", "trait", "true", "try", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
];

/// `-`, `.` and any other non-identifier character become `_`; first letter upper-cased.
pub fn fix_caps(s: &str) -> String {
    let s = NON_IDENT.replace_all(s, "_");
    let mut chars = s.chars();
    let out: String = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    if out.starts_with(|c: char| c.is_ascii_digit()) { format!("_{out}") } else { out }
}

/// `baseCommand` → `base_command`; keywords come back as raw identifiers.
pub fn snake_case(s: &str) -> String {
    let s = NON_IDENT.replace_all(s, "_");
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    match out.as_str() {
        "self" | "super" | "crate" => format!("{out}_"),
        k if RUST_KEYWORDS.contains(&k) => format!("r#{out}"),
        _ => out,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn render<T: Serialize>(template_name: &'static str, template: &str, view: &T) -> Result<String, CodegenError> {
    let context = Context::from_serialize(view)
        .map_err(|source| CodegenError::Render { template: template_name, source })?;
    Tera::one_off(template, &context, false).map_err(|source| CodegenError::Render { template: template_name, source })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    /// Protocol-Buffer interface description
    Proto,
    /// Rust record/enum/union definitions with a name registry
    Rust,
}

pub fn emit(target: Target, registry: &Registry, tables: &Tables) -> Result<String, CodegenError> {
    match target {
        Target::Proto => proto::ProtoEmitter::new(tables).emit(registry),
        Target::Rust => rust::RustEmitter::new(tables).emit(registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn field(name: &str, ty: TypeSchema) -> FieldDef {
        FieldDef { name: name.into(), ty, doc: Vec::new(), default: None }
    }

    #[test]
    fn names() {
        assert_eq!(fix_caps("draft-3.dev1"), "Draft_3_dev1");
        assert_eq!(fix_caps("v1.0"), "V1_0");
        assert_eq!(snake_case("baseCommand"), "base_command");
        assert_eq!(snake_case("type"), "r#type");
        assert_eq!(snake_case("in"), "r#in");
        assert_eq!(snake_case("self"), "self_");
        assert_eq!(snake_case("CommandLineToolValue"), "command_line_tool_value");
    }

    #[test]
    fn planning_classifies_shapes() {
        let record = RecordDef {
            name: "Step".into(),
            fields: vec![
                field("id", TypeSchema::one_of(vec![TypeSchema::named("null"), TypeSchema::named("string")])),
                field("binding", TypeSchema::named("#CommandLineBinding")),
                field("globs", TypeSchema::array_of(TypeSchema::named("string"))),
                field("run", TypeSchema::one_of(vec![TypeSchema::named("string"), TypeSchema::named("Process")])),
                field("id", TypeSchema::named("int")),
            ],
            extends: Vec::new(),
            doc: Vec::new(),
        };
        let plan = plan_record(&record);
        let shapes: Vec<_> = plan.fields.iter().map(|f| f.shape.clone()).collect();
        assert_eq!(
            shapes,
            [
                FieldShape::Scalar("string".into()),
                FieldShape::Ref("CommandLineBinding".into()),
                FieldShape::Array(Box::new(FieldShape::Scalar("string".into()))),
                FieldShape::Union("StepRun".into()),
            ]
        );
        assert_eq!(plan.unions.len(), 1);
    }

    #[test]
    fn array_of_union_gets_element_wrapper() {
        let record = RecordDef {
            name: "Tool".into(),
            fields: vec![field(
                "arguments",
                TypeSchema::array_of(TypeSchema::one_of(vec![TypeSchema::named("string"), TypeSchema::named("Binding")])),
            )],
            extends: Vec::new(),
            doc: Vec::new(),
        };
        let plan = plan_record(&record);
        assert_eq!(plan.fields[0].shape, FieldShape::Array(Box::new(FieldShape::Union("ToolArgumentsElement".into()))));
        assert_eq!(plan.unions[0].name, "ToolArgumentsElement");
    }

    #[test]
    fn fixture_schema_emits_both_targets() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schema.json");
        let doc = crate::graph::read_document(&path).unwrap();
        let resolution = crate::resolve::resolve_schema(crate::resolve::schema_nodes(&doc));
        assert_eq!(resolution.diagnostics.len(), 1);

        let proto = emit(Target::Proto, &resolution.registry, &Tables::default()).unwrap();
        assert!(proto.contains("enum CWLVersion {\n    CWLVersion_Draft_3 = 0;\n    CWLVersion_V1_0 = 1;\n}"));
        assert!(proto.contains("    TypeRecord type = 2;"));
        assert!(proto.contains("    CommandLineBinding inputBinding = 3;"));
        assert!(proto.contains("    DataRecord default = 4;"));
        assert!(proto.contains("    string label = 5;"));
        assert!(proto.contains("    string cwlVersion = 2;"));

        let rust = emit(Target::Rust, &resolution.registry, &Tables::default()).unwrap();
        assert!(rust.contains("pub struct CommandInputParameter {"));
        assert!(rust.contains("    pub arguments: Vec<CommandLineToolArgumentsElement>,"));
        assert!(rust.contains("pub struct CommandLineToolArgumentsElement {"));
        assert!(rust.contains("\"CommandLineTool\" => Some(Box::new(CommandLineTool::default())),"));
    }
}
