//! Canonical model → CWL-shaped tree.
//!
//! The inverse of the normalizer, up to sugar: types go back to their
//! shorthand spelling, defaults lose their discriminator, run records become a
//! path or an inline process with `class`, and one-line docs become strings.
//! List forms are kept; CWL accepts them everywhere the map forms are allowed.
use serde::Serialize;

use crate::cwl::{CanonicalDocument, DataValue, InputParameter, OutputParameter, ProcessClass, RunRecord, WorkflowStep};
use crate::schema::{FieldDef, TypeSchema};
use crate::value::{to_value, Mapping, Value};

pub fn denormalize_document(doc: &CanonicalDocument) -> Result<Value, serde_json::Error> {
    match doc {
        CanonicalDocument::Process(p) => denormalize(p),
        CanonicalDocument::Graph(g) => {
            let mut out = Mapping::new();
            if let Some(v) = &g.cwl_version {
                out.insert("cwlVersion".into(), Value::from(v.as_str()));
            }
            let graph = g.graph.iter().map(denormalize).collect::<Result<Vec<_>, _>>()?;
            out.insert("$graph".into(), Value::Sequence(graph));
            Ok(Value::Mapping(out))
        }
    }
}

pub fn denormalize(process: &ProcessClass) -> Result<Value, serde_json::Error> {
    let (mut out, inputs, outputs) = match process {
        ProcessClass::CommandLineTool(t) => (mapping(t)?, &t.inputs, &t.outputs),
        ProcessClass::ExpressionTool(t) => (mapping(t)?, &t.inputs, &t.outputs),
        ProcessClass::Workflow(w) => (mapping(w)?, &w.inputs, &w.outputs),
    };
    out.shift_remove("class");
    out.shift_insert(0, "class".into(), Value::from(process.class().as_str()));
    unwrap_doc(&mut out);
    if !inputs.is_empty() {
        let xs = inputs.iter().map(input).collect::<Result<Vec<_>, _>>()?;
        out.insert("inputs".into(), Value::Sequence(xs));
    }
    if !outputs.is_empty() {
        let xs = outputs.iter().map(output).collect::<Result<Vec<_>, _>>()?;
        out.insert("outputs".into(), Value::Sequence(xs));
    }
    if let ProcessClass::Workflow(w) = process {
        if !w.steps.is_empty() {
            let xs = w.steps.iter().map(step).collect::<Result<Vec<_>, _>>()?;
            out.insert("steps".into(), Value::Sequence(xs));
        }
    }
    Ok(Value::Mapping(out))
}

fn input(p: &InputParameter) -> Result<Value, serde_json::Error> {
    let mut out = mapping(p)?;
    unwrap_doc(&mut out);
    if let Some(ty) = &p.ty {
        out.insert("type".into(), type_to_cwl(ty));
    }
    if let Some(d) = &p.default {
        out.insert("default".into(), data_to_value(d));
    }
    Ok(Value::Mapping(out))
}

fn output(p: &OutputParameter) -> Result<Value, serde_json::Error> {
    let mut out = mapping(p)?;
    unwrap_doc(&mut out);
    if let Some(ty) = &p.ty {
        out.insert("type".into(), type_to_cwl(ty));
    }
    Ok(Value::Mapping(out))
}

fn step(s: &WorkflowStep) -> Result<Value, serde_json::Error> {
    let mut out = mapping(s)?;
    unwrap_doc(&mut out);
    let run = match &s.run {
        RunRecord::Path(p) => Value::from(p.as_str()),
        inline => match inline.clone().into_process() {
            Some(p) => denormalize(&p)?,
            None => Value::Null,
        },
    };
    out.insert("run".into(), run);
    Ok(Value::Mapping(out))
}

/// `T`, `T[]`, `T?` where the shorthand can express it; explicit mappings
/// otherwise.
pub fn type_to_cwl(ty: &TypeSchema) -> Value {
    match ty {
        TypeSchema::NamedRef(n) => Value::from(n.as_str()),
        TypeSchema::ArrayOf(a) => match a.items.as_ref() {
            TypeSchema::NamedRef(n) => Value::String(format!("{n}[]")),
            items => {
                let mut m = Mapping::new();
                m.insert("type".into(), Value::from("array"));
                m.insert("items".into(), type_to_cwl(items));
                Value::Mapping(m)
            }
        },
        TypeSchema::OneOf(u) => match u.types.as_slice() {
            [null, t] if null.is_null() => match type_to_cwl(t) {
                Value::String(s) if !s.ends_with('?') => Value::String(format!("{s}?")),
                other => Value::Sequence(vec![Value::from("null"), other]),
            },
            types => Value::Sequence(types.iter().map(type_to_cwl).collect()),
        },
        TypeSchema::Record(r) => {
            let mut m = Mapping::new();
            m.insert("type".into(), Value::from("record"));
            m.insert("name".into(), Value::from(r.name.as_str()));
            m.insert("fields".into(), Value::Sequence(r.fields.iter().map(field_to_cwl).collect()));
            Value::Mapping(m)
        }
        TypeSchema::Enum(e) => {
            let mut m = Mapping::new();
            m.insert("type".into(), Value::from("enum"));
            m.insert("name".into(), Value::from(e.name.as_str()));
            m.insert("symbols".into(), Value::Sequence(e.symbols.iter().map(|s| Value::from(s.as_str())).collect()));
            Value::Mapping(m)
        }
    }
}

fn field_to_cwl(f: &FieldDef) -> Value {
    let mut m = Mapping::new();
    m.insert("name".into(), Value::from(f.name.as_str()));
    m.insert("type".into(), type_to_cwl(&f.ty));
    match f.doc.as_slice() {
        [] => {}
        [one] => {
            m.insert("doc".into(), Value::from(one.as_str()));
        }
        many => {
            m.insert("doc".into(), Value::Sequence(many.iter().map(|d| Value::from(d.as_str())).collect()));
        }
    }
    if let Some(d) = &f.default {
        m.insert("default".into(), d.clone());
    }
    Value::Mapping(m)
}

pub fn data_to_value(d: &DataValue) -> Value {
    match d {
        DataValue::StringValue(s) => Value::from(s.as_str()),
        DataValue::StructValue(m) => Value::Mapping(m.clone()),
        DataValue::FloatValue(f) => Value::Float(*f),
        DataValue::IntValue(i) => Value::Int(*i),
        DataValue::ListValue(xs) => Value::Sequence(xs.clone()),
        DataValue::BoolValue(b) => Value::Bool(*b),
    }
}

fn mapping<T: Serialize>(v: &T) -> Result<Mapping, serde_json::Error> {
    match to_value(v)? {
        Value::Mapping(m) => Ok(m),
        _ => Ok(Mapping::new()),
    }
}

fn unwrap_doc(m: &mut Mapping) {
    let single = match m.get("doc").and_then(Value::as_sequence) {
        Some([Value::String(s)]) => s.clone(),
        _ => return,
    };
    m.insert("doc".into(), Value::String(single));
}
