//! Type resolver.
//!
//! Feed it raw schema nodes (Avro-style records/enums as written in the CWL
//! schema description), then `solve` to get a registry with every field type
//! resolved and `extends` flattened.
//!
//! - Shorthand: `T?` is `[null, T]`, `T[]` is `{type: array, items: T}`.
//! - Unknown node shapes are diagnostics, not failures.
//! - Flattening is transitive: parents are flattened before being appended.
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::SchemaError;
use crate::schema::{Definition, EnumDef, EnumSchema, FieldDef, RecordDef, RecordSchema, Registry, TypeSchema};
use crate::value::Value;

// ------------------------------ Type nodes -------------------------------- //

/// Resolve one type expression. `context` names where the node sits, for diagnostics.
pub fn resolve_type(node: &Value, context: &str) -> Result<TypeSchema, SchemaError> {
    match node {
        Value::String(s) => Ok(resolve_shorthand(s)),
        Value::Sequence(xs) => {
            let types = xs
                .iter()
                .map(|x| resolve_type(x, context))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TypeSchema::one_of(types))
        }
        Value::Mapping(m) => match m.get("type").and_then(Value::as_str) {
            Some("array") => {
                let items = m.get("items").ok_or_else(|| unrecognized(context, node))?;
                Ok(TypeSchema::array_of(resolve_type(items, context)?))
            }
            Some("record") => {
                let name = m.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let ctx = if name.is_empty() { context.to_string() } else { name.clone() };
                let fields = resolve_fields(m.get("fields"), &ctx, &mut |err| {
                    warn!(%err, "skipping record field");
                });
                Ok(TypeSchema::Record(RecordSchema { name, fields }))
            }
            Some("enum") => {
                let name = m.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let symbols = string_list(m.get("symbols")).ok_or_else(|| unrecognized(context, node))?;
                Ok(TypeSchema::Enum(EnumSchema { name, symbols }))
            }
            _ => Err(unrecognized(context, node)),
        },
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => Err(unrecognized(context, node)),
    }
}

fn resolve_shorthand(s: &str) -> TypeSchema {
    if let Some(inner) = s.strip_suffix('?') {
        return TypeSchema::one_of(vec![TypeSchema::named("null"), resolve_shorthand(inner)]);
    }
    if let Some(inner) = s.strip_suffix("[]") {
        return TypeSchema::array_of(resolve_shorthand(inner));
    }
    TypeSchema::named(s)
}

/// Resolve a record's field list. Accepts the list form and the `name: type`
/// map form; fields whose type cannot be resolved are reported and dropped.
fn resolve_fields(
    fields: Option<&Value>,
    context: &str,
    on_error: &mut dyn FnMut(SchemaError),
) -> Vec<FieldDef> {
    let entries: Vec<(String, &Value)> = match fields {
        Some(Value::Sequence(xs)) => xs
            .iter()
            .map(|f| (f.get("name").and_then(Value::as_str).unwrap_or_default().to_string(), f))
            .collect(),
        Some(Value::Mapping(m)) => m.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Some(other) => {
            on_error(unrecognized(context, other));
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut out = Vec::with_capacity(entries.len());
    for (name, field) in entries {
        if name.is_empty() {
            on_error(SchemaError::MissingName { context: context.to_string(), what: "field" });
            continue;
        }
        // map form allows `name: type` directly
        let (type_node, doc, default) = match field {
            Value::Mapping(m) if m.contains_key("type") && !is_type_mapping(field) => {
                (m.get("type"), doc_list(m.get("doc")), m.get("default").cloned())
            }
            other => (Some(other), Vec::new(), None),
        };
        let field_ctx = format!("{context}.{name}");
        let Some(type_node) = type_node else {
            on_error(SchemaError::UnrecognizedNode { context: field_ctx, kind: "missing" });
            continue;
        };
        match resolve_type(type_node, &field_ctx) {
            Ok(ty) => out.push(FieldDef { name, ty, doc, default }),
            Err(err) => on_error(err),
        }
    }
    out
}

/// A mapping that is itself a type expression rather than a field declaration.
fn is_type_mapping(v: &Value) -> bool {
    matches!(v.get("type").and_then(Value::as_str), Some("array" | "record" | "enum"))
        && ["items", "symbols", "fields"].iter().any(|k| v.get(k).is_some())
}

fn unrecognized(context: &str, node: &Value) -> SchemaError {
    SchemaError::UnrecognizedNode { context: context.to_string(), kind: node.kind() }
}

fn string_list(v: Option<&Value>) -> Option<Vec<String>> {
    v?.as_sequence()?
        .iter()
        .map(|s| s.as_str().map(str::to_string))
        .collect()
}

/// `doc` is a string or a list of strings; stored as a list either way.
pub(crate) fn doc_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(xs)) => xs.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Strip a namespace prefix: `#Process`, `cwl:Process` and
/// `https://w3id.org/cwl/cwl#Process` are all `Process`.
pub fn local_name(s: &str) -> &str {
    let s = s.rsplit('#').next().unwrap_or(s);
    if s.contains("://") {
        return s;
    }
    s.rsplit(':').next().unwrap_or(s)
}

// ------------------------------ Registry ---------------------------------- //

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub registry: Registry,
    pub diagnostics: Vec<SchemaError>,
}

#[derive(Debug, Default)]
pub struct TypeResolver {
    defs: IndexMap<String, Definition>,
    diagnostics: Vec<SchemaError>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, err: SchemaError) {
        warn!(%err, "schema diagnostic");
        self.diagnostics.push(err);
    }

    /// Register one top-level schema node.
    pub fn observe_node(&mut self, node: &Value) {
        let kind = node.get("type").and_then(Value::as_str);
        match kind {
            Some("record") => self.observe_record(node),
            Some("enum") => self.observe_enum(node),
            _ => {
                let context = node.get("name").and_then(Value::as_str).unwrap_or("<top level>").to_string();
                self.report(unrecognized(&context, node));
            }
        }
    }

    pub fn observe_nodes<'a, I>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        for node in nodes {
            self.observe_node(node);
        }
    }

    fn observe_record(&mut self, node: &Value) {
        let Some(name) = node.get("name").and_then(Value::as_str).map(|n| local_name(n).to_string()) else {
            self.report(SchemaError::MissingName { context: "<top level>".into(), what: "record" });
            return;
        };
        let mut errors = Vec::new();
        let mut fields = resolve_fields(node.get("fields"), &name, &mut |err| errors.push(err));
        for err in errors {
            self.report(err);
        }
        let extends = match node.get("extends") {
            Some(Value::String(s)) => vec![local_name(s).to_string()],
            Some(Value::Sequence(xs)) => xs.iter().filter_map(Value::as_str).map(|s| local_name(s).to_string()).collect(),
            _ => Vec::new(),
        };
        for field in fields.iter_mut() {
            self.register_inline(&mut field.ty);
        }
        trace!(record = %name, fields = fields.len(), parents = extends.len(), "record resolved");
        self.insert(Definition::Record(RecordDef {
            name,
            fields,
            extends,
            doc: doc_list(node.get("doc")),
        }));
    }

    fn observe_enum(&mut self, node: &Value) {
        let Some(name) = node.get("name").and_then(Value::as_str).map(|n| local_name(n).to_string()) else {
            self.report(SchemaError::MissingName { context: "<top level>".into(), what: "enum" });
            return;
        };
        let Some(symbols) = string_list(node.get("symbols")) else {
            self.report(unrecognized(&name, node));
            return;
        };
        self.insert(Definition::Enum(EnumDef { name, symbols, doc: doc_list(node.get("doc")) }));
    }

    /// Named records and enums declared inline in a field type get their own
    /// registry entries; the field keeps only a reference by name.
    fn register_inline(&mut self, ty: &mut TypeSchema) {
        let def = match ty {
            TypeSchema::NamedRef(_) => return,
            TypeSchema::ArrayOf(a) => {
                self.register_inline(&mut a.items);
                return;
            }
            TypeSchema::OneOf(u) => {
                for t in u.types.iter_mut() {
                    self.register_inline(t);
                }
                return;
            }
            TypeSchema::Record(r) if !r.name.is_empty() => {
                for f in r.fields.iter_mut() {
                    self.register_inline(&mut f.ty);
                }
                Definition::Record(RecordDef {
                    name: local_name(&r.name).to_string(),
                    fields: std::mem::take(&mut r.fields),
                    extends: Vec::new(),
                    doc: Vec::new(),
                })
            }
            TypeSchema::Enum(e) if !e.name.is_empty() => Definition::Enum(EnumDef {
                name: local_name(&e.name).to_string(),
                symbols: std::mem::take(&mut e.symbols),
                doc: Vec::new(),
            }),
            TypeSchema::Record(_) | TypeSchema::Enum(_) => return,
        };
        let name = def.name().to_string();
        if !self.defs.contains_key(&name) {
            self.insert(def);
        }
        *ty = TypeSchema::NamedRef(name);
    }

    fn insert(&mut self, def: Definition) {
        let name = def.name().to_string();
        if self.defs.insert(name.clone(), def).is_some() {
            debug!(%name, "definition replaced by a later declaration");
        }
    }

    /// Flatten `extends` and hand out the immutable registry.
    pub fn solve(mut self) -> Resolution {
        let declared: IndexMap<String, (Vec<FieldDef>, Vec<String>)> = self
            .defs
            .values()
            .filter_map(|d| match d {
                Definition::Record(r) => Some((r.name.clone(), (r.fields.clone(), r.extends.clone()))),
                Definition::Enum(_) => None,
            })
            .collect();

        let mut flattened = HashMap::new();
        let mut errors = Vec::new();
        for name in declared.keys() {
            flatten_record(name, &declared, &mut flattened, &mut Vec::new(), &mut errors);
        }
        for err in errors {
            self.report(err);
        }
        for def in self.defs.values_mut() {
            if let Definition::Record(r) = def {
                if let Some(fields) = flattened.remove(&r.name) {
                    r.fields = fields;
                }
            }
        }
        debug!(definitions = self.defs.len(), diagnostics = self.diagnostics.len(), "schema resolved");
        Resolution { registry: Registry::from_defs(self.defs), diagnostics: self.diagnostics }
    }
}

/// Own fields first, then each parent's flattened fields in declaration order.
/// No de-duplication.
fn flatten_record(
    name: &str,
    declared: &IndexMap<String, (Vec<FieldDef>, Vec<String>)>,
    done: &mut HashMap<String, Vec<FieldDef>>,
    stack: &mut Vec<String>,
    errors: &mut Vec<SchemaError>,
) -> Vec<FieldDef> {
    if let Some(fields) = done.get(name) {
        return fields.clone();
    }
    let Some((own, parents)) = declared.get(name) else {
        return Vec::new();
    };
    stack.push(name.to_string());
    let mut fields = own.clone();
    for parent in parents {
        if stack.iter().any(|s| s == parent) {
            errors.push(SchemaError::ExtendsCycle { record: name.to_string() });
            continue;
        }
        if !declared.contains_key(parent) {
            errors.push(SchemaError::UnknownParent { record: name.to_string(), parent: parent.clone() });
            continue;
        }
        fields.extend(flatten_record(parent, declared, done, stack, errors));
    }
    stack.pop();
    done.insert(name.to_string(), fields.clone());
    fields
}

/// Top-level nodes of a schema description file: a bare list, a
/// `{"$graph": [...]}` document, or a single node.
pub fn schema_nodes(doc: &Value) -> &[Value] {
    match doc {
        Value::Sequence(xs) => xs,
        Value::Mapping(m) => match m.get("$graph") {
            Some(Value::Sequence(xs)) => xs,
            _ => std::slice::from_ref(doc),
        },
        _ => &[],
    }
}

/// Convenience: resolve a whole schema description in one go.
pub fn resolve_schema<'a, I>(nodes: I) -> Resolution
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut resolver = TypeResolver::new();
    resolver.observe_nodes(nodes);
    resolver.solve()
}

// ------------------------------- Tests ------------------------------------ //
