//! DocumentNormalizer: raw CWL tree → canonical discriminated tree.
//!
//! Normalization is two stages. The tree stage ([`Normalizer::normalize_value`])
//! is a set of pure rewrites over [`Value`], dispatched on the document's
//! [`ClassTag`]; the decode stage hands the rewritten tree to the typed model,
//! which rejects anything that still does not fit.
pub mod rules;

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::cwl::{ClassTag, ProcessClass};
use crate::error::{ConversionError, LoadError};
use crate::path_de::decode;
use crate::value::{Mapping, Value};
pub use rules::Rules;
use rules::{coerce_default, dict_to_list, force_list, tag_type, tagged};

pub struct Normalizer<'a> {
    rules: &'a Rules,
}

impl<'a> Normalizer<'a> {
    pub fn new(rules: &'a Rules) -> Self {
        Self { rules }
    }

    /// Normalize one raw process document and decode it into the typed model.
    pub fn normalize(&self, doc: &Value) -> Result<ProcessClass, LoadError> {
        let class = ClassTag::of(doc)?;
        let tree = self.normalize_value(doc)?;
        Ok(decode_process(class, tree)?)
    }

    /// Tree stage only: the canonical shape as a dynamic value.
    pub fn normalize_value(&self, doc: &Value) -> Result<Value, LoadError> {
        let class = ClassTag::of(doc)?;
        let Value::Mapping(m) = doc else {
            return Err(LoadError::MissingClass);
        };
        let id = m.get("id").and_then(Value::as_str).unwrap_or("<anonymous>");
        debug!(%class, id, "normalizing");
        let out = match class {
            ClassTag::CommandLineTool => self.command_line_tool(m),
            ClassTag::ExpressionTool => self.expression_tool(m),
            ClassTag::Workflow => self.workflow(m)?,
        };
        Ok(Value::Mapping(out))
    }

    // ---- per class ---- //

    fn process_common(&self, doc: &Mapping, class: ClassTag) -> Mapping {
        let doc = dict_to_list(doc, self.rules.dict_fields(class), self.rules.parameter_tag);
        let mut doc = force_list(&doc, &self.rules.force_list);
        let context = doc.get("id").and_then(Value::as_str).unwrap_or(class.as_str()).to_string();
        if let Some(Value::Sequence(xs)) = doc.get_mut("inputs") {
            for x in xs.iter_mut() {
                *x = self.parameter(x, &context, true);
            }
        }
        if let Some(Value::Sequence(xs)) = doc.get_mut("outputs") {
            for x in xs.iter_mut() {
                *x = self.parameter(x, &context, false);
            }
        }
        doc
    }

    fn command_line_tool(&self, doc: &Mapping) -> Mapping {
        let mut doc = self.process_common(doc, ClassTag::CommandLineTool);
        if let Some(Value::Sequence(args)) = doc.get_mut("arguments") {
            for a in args.iter_mut() {
                if let Value::String(expr) = a {
                    trace!(argument = %expr, "argument shorthand");
                    *a = tagged("valueFrom", Value::String(std::mem::take(expr)));
                }
            }
        }
        doc
    }

    fn expression_tool(&self, doc: &Mapping) -> Mapping {
        self.process_common(doc, ClassTag::ExpressionTool)
    }

    fn workflow(&self, doc: &Mapping) -> Result<Mapping, LoadError> {
        let mut doc = self.process_common(doc, ClassTag::Workflow);
        if let Some(Value::Sequence(steps)) = doc.get_mut("steps") {
            for s in steps.iter_mut() {
                *s = self.step(s)?;
            }
        }
        Ok(doc)
    }

    // ---- records ---- //

    fn parameter(&self, p: &Value, context: &str, is_input: bool) -> Value {
        let Value::Mapping(p) = p else {
            return p.clone();
        };
        let mut p = force_list(p, &self.rules.force_list);
        let context = match p.get("id").and_then(Value::as_str) {
            Some(id) => format!("{context}.{id}"),
            None => context.to_string(),
        };
        if let Some(ty) = p.get_mut("type") {
            *ty = tag_type(ty, &context);
        }
        if is_input {
            if let Some(d) = p.get_mut("default") {
                *d = coerce_default(d);
            }
        }
        if let Some(Value::Mapping(binding)) = p.get("outputBinding") {
            let binding = force_list(binding, &self.rules.force_list);
            p.insert("outputBinding".to_string(), Value::Mapping(binding));
        }
        Value::Mapping(p)
    }

    fn step(&self, s: &Value) -> Result<Value, LoadError> {
        let Value::Mapping(s) = s else {
            return Ok(s.clone());
        };
        let s = dict_to_list(s, &self.rules.step, self.rules.parameter_tag);
        let s = dict_to_list(&s, &HashSet::from(["in"]), self.rules.step_input_tag);
        let mut s = force_list(&s, &self.rules.force_list);
        if let Some(Value::Sequence(inputs)) = s.get_mut("in") {
            for i in inputs.iter_mut() {
                if let Value::Mapping(m) = i {
                    *m = force_list(m, &self.rules.force_list);
                }
            }
        }
        if let Some(Value::Sequence(outputs)) = s.get_mut("out") {
            for o in outputs.iter_mut() {
                if let Value::String(id) = o {
                    *o = tagged("id", Value::String(std::mem::take(id)));
                }
            }
        }
        if let Some(run) = s.get_mut("run") {
            *run = self.run(run)?;
        }
        Ok(Value::Mapping(s))
    }

    /// `run` is a path, an inline process boxed by its own class, or already
    /// canonical (a mapping without `class`).
    fn run(&self, run: &Value) -> Result<Value, LoadError> {
        match run {
            Value::String(path) => Ok(tagged("path", Value::from(path.as_str()))),
            Value::Mapping(m) if m.contains_key("class") => {
                let class = ClassTag::of(run)?;
                let inner = self.normalize_value(run)?;
                trace!(%class, "inline run process");
                Ok(tagged(box_tag(class), inner))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Oneof arm a process of `class` is boxed under in `RunRecord` and `CWLClass`.
pub fn box_tag(class: ClassTag) -> &'static str {
    match class {
        ClassTag::CommandLineTool => "commandline",
        ClassTag::ExpressionTool => "expression",
        ClassTag::Workflow => "workflow",
    }
}

/// Decode a normalized tree into the typed variant selected by `class`.
pub fn decode_process(class: ClassTag, tree: Value) -> Result<ProcessClass, ConversionError> {
    Ok(match class {
        ClassTag::CommandLineTool => ProcessClass::CommandLineTool(Box::new(decode(tree, class.as_str())?)),
        ClassTag::ExpressionTool => ProcessClass::ExpressionTool(Box::new(decode(tree, class.as_str())?)),
        ClassTag::Workflow => ProcessClass::Workflow(Box::new(decode(tree, class.as_str())?)),
    })
}
