//! Rust record/enum/union definitions plus a name → constructor registry.
use serde::Serialize;

use crate::error::CodegenError;
use crate::schema::{EnumDef, Registry};

use super::{fix_caps, is_enum, is_scalar, plan_record, render, snake_case, FieldShape, RecordPlan, Tables, UnionSignature};

const HEADER: &str = r#"// Generated by cwl-lite from a schema description.
#![allow(non_camel_case_types, clippy::all)]

use serde::{Deserialize, Serialize};
"#;

const ENUM_TEMPLATE: &str = r#"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum {{ name }} {
{%- for symbol in symbols %}
    #[serde(rename = "{{ symbol.raw }}")]
    {{ symbol.ident }},
{%- endfor %}
}
"#;

const RECORD_TEMPLATE: &str = r#"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct {{ name }} {
{%- for field in fields %}
    #[serde(rename = "{{ field.raw }}", default)]
    pub {{ field.ident }}: {{ field.ty }},
{%- endfor %}
}
{%- if has_id %}

impl {{ name }} {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
{%- endif %}
"#;

const REGISTRY_TEMPLATE: &str = r#"
pub const TYPE_NAMES: &[&str] = &[
{%- for name in names %}
    "{{ name }}",
{%- endfor %}
];

/// Construct a default instance of any generated record by its schema name.
pub fn new_by_name(name: &str) -> Option<Box<dyn std::any::Any>> {
    match name {
{%- for name in names %}
        "{{ name }}" => Some(Box::new({{ name }}::default())),
{%- endfor %}
        _ => None,
    }
}
"#;

#[derive(Debug, Serialize)]
struct SymbolView {
    raw: String,
    ident: String,
}

#[derive(Debug, Serialize)]
struct EnumView {
    name: String,
    symbols: Vec<SymbolView>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    raw: String,
    ident: String,
    ty: String,
}

#[derive(Debug, Serialize)]
struct RecordView {
    name: String,
    fields: Vec<FieldView>,
    has_id: bool,
}

#[derive(Debug, Serialize)]
struct RegistryView<'a> {
    names: Vec<&'a str>,
}

pub struct RustEmitter<'a> {
    tables: &'a Tables,
}

impl<'a> RustEmitter<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    pub fn emit(&self, registry: &Registry) -> Result<String, CodegenError> {
        let mut out = String::from(HEADER);
        for e in registry.enums() {
            out.push_str(&render("rust enum", ENUM_TEMPLATE, &enum_view(e))?);
        }

        let records: Vec<_> = registry
            .records()
            .filter(|r| !self.tables.rust_skip.contains(r.name.as_str()))
            .collect();
        let names = records.iter().map(|r| r.name.as_str()).collect();
        out.push_str(&render("rust registry", REGISTRY_TEMPLATE, &RegistryView { names })?);

        for record in records {
            let plan = plan_record(record);
            out.push_str(&render("rust record", RECORD_TEMPLATE, &self.record_view(&plan, registry))?);
            for sig in &plan.unions {
                out.push_str(&render("rust union", RECORD_TEMPLATE, &self.union_view(sig, registry))?);
            }
        }
        Ok(out)
    }

    fn record_view(&self, plan: &RecordPlan, registry: &Registry) -> RecordView {
        let fields: Vec<FieldView> = plan
            .fields
            .iter()
            .map(|f| FieldView { raw: f.name.clone(), ident: snake_case(&f.name), ty: self.field_type(&f.shape, registry) })
            .collect();
        let has_id = fields.iter().any(|f| f.ident == "id" && f.ty == "Option<String>");
        RecordView { name: plan.name.clone(), fields, has_id }
    }

    fn union_view(&self, sig: &UnionSignature, registry: &Registry) -> RecordView {
        let fields = sig
            .members
            .iter()
            .map(|m| {
                let shape = if is_scalar(&m.underlying) {
                    FieldShape::Scalar(m.underlying.clone())
                } else {
                    FieldShape::Ref(m.underlying.clone())
                };
                let shape = if m.is_array { FieldShape::Array(Box::new(shape)) } else { shape };
                FieldView { raw: m.wrapper_name.clone(), ident: snake_case(&m.wrapper_name), ty: self.field_type(&shape, registry) }
            })
            .collect();
        RecordView { name: sig.name.clone(), fields, has_id: false }
    }

    /// Singletons are optional, records boxed; arrays are plain `Vec`s.
    fn field_type(&self, shape: &FieldShape, registry: &Registry) -> String {
        match shape {
            FieldShape::Array(inner) => format!("Vec<{}>", self.plain_type(inner, registry)),
            FieldShape::Ref(n) if registry.record(n).is_some() && !self.tables.rust_skip.contains(n.as_str()) => {
                format!("Option<Box<{n}>>")
            }
            other => format!("Option<{}>", self.plain_type(other, registry)),
        }
    }

    fn plain_type(&self, shape: &FieldShape, registry: &Registry) -> String {
        match shape {
            FieldShape::Scalar(n) => self.tables.rust_scalars.get(n.as_str()).copied().unwrap_or("serde_json::Value").to_string(),
            FieldShape::Ref(n) if is_enum(registry, n) => n.clone(),
            FieldShape::Ref(n) if registry.record(n).is_some() && !self.tables.rust_skip.contains(n.as_str()) => n.clone(),
            FieldShape::Ref(n) if n.ends_with("Element") => n.clone(),
            FieldShape::Ref(_) => "serde_json::Value".to_string(),
            FieldShape::Union(w) => w.clone(),
            FieldShape::Array(inner) => format!("Vec<{}>", self.plain_type(inner, registry)),
        }
    }
}

fn enum_view(e: &EnumDef) -> EnumView {
    EnumView {
        name: e.name.clone(),
        symbols: e.symbols.iter().map(|s| SymbolView { raw: s.clone(), ident: fix_caps(s) }).collect(),
    }
}
