use crate::resolve::local_name;
use crate::schema::TypeSchema;

use super::{fix_caps, is_scalar};

/// One member of a synthesized union wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionMember {
    /// `StringValue`, `CommandLineToolValue`, ...
    pub wrapper_name: String,
    /// Scalar name or registry type name.
    pub underlying: String,
    pub is_array: bool,
}

/// A OneOf field as a generated wrapper type, scoped `<Record><Field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionSignature {
    pub name: String,
    pub members: Vec<UnionMember>,
}

impl UnionMember {
    fn new(underlying: impl Into<String>, is_array: bool) -> Self {
        let underlying = underlying.into();
        Self { wrapper_name: format!("{}Value", fix_caps(&underlying)), underlying, is_array }
    }
}

impl UnionSignature {
    /// Tag every non-null member, then prune. A nested OneOf inside an array
    /// member becomes its own `<name>Element` wrapper, pushed onto `extra`.
    pub fn build(name: &str, types: &[TypeSchema], extra: &mut Vec<UnionSignature>) -> Self {
        let mut members = Vec::new();
        collect_members(name, types, extra, &mut members);
        Self { name: name.to_string(), members: prune(members) }
    }
}

fn collect_members(name: &str, types: &[TypeSchema], extra: &mut Vec<UnionSignature>, out: &mut Vec<UnionMember>) {
    for t in types {
        match t {
            TypeSchema::NamedRef(n) if n == "null" => {}
            TypeSchema::OneOf(inner) => collect_members(name, &inner.types, extra, out),
            TypeSchema::ArrayOf(a) => match a.items.without_null() {
                TypeSchema::OneOf(u) if u.types.len() > 1 => {
                    let element = format!("{name}Element");
                    let sig = UnionSignature::build(&element, &u.types, extra);
                    extra.push(sig);
                    out.push(UnionMember::new(element, true));
                }
                TypeSchema::ArrayOf(_) => out.push(UnionMember::new("Any", true)),
                items => out.push(UnionMember::new(underlying(&items), true)),
            },
            other => out.push(UnionMember::new(underlying(other), false)),
        }
    }
}

fn underlying(t: &TypeSchema) -> String {
    match t.type_name() {
        Some(n) if is_scalar(n) => n.to_string(),
        Some(n) if !n.is_empty() => local_name(n).to_string(),
        _ => "Any".to_string(),
    }
}

/// Array supersedes singleton: a scalar member is dropped when an array member
/// with the same underlying type exists. Exact duplicates collapse.
fn prune(members: Vec<UnionMember>) -> Vec<UnionMember> {
    let mut out: Vec<UnionMember> = Vec::with_capacity(members.len());
    for m in &members {
        let superseded = !m.is_array && members.iter().any(|o| o.is_array && o.underlying == m.underlying);
        if superseded || out.contains(m) {
            continue;
        }
        out.push(m.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_member_supersedes_scalar() {
        let types = [TypeSchema::array_of(TypeSchema::named("Foo")), TypeSchema::named("Foo")];
        let sig = UnionSignature::build("RecField", &types, &mut Vec::new());
        assert_eq!(
            sig.members,
            [UnionMember { wrapper_name: "FooValue".into(), underlying: "Foo".into(), is_array: true }]
        );
    }

    #[test]
    fn distinct_members_keep_declaration_order() {
        let types = [
            TypeSchema::named("null"),
            TypeSchema::named("string"),
            TypeSchema::named("#Expression"),
            TypeSchema::array_of(TypeSchema::named("string")),
            TypeSchema::named("CommandLineBinding"),
        ];
        let sig = UnionSignature::build("ToolField", &types, &mut Vec::new());
        let names: Vec<_> = sig.members.iter().map(|m| (m.underlying.as_str(), m.is_array)).collect();
        assert_eq!(names, [("Expression", false), ("string", true), ("CommandLineBinding", false)]);
    }

    #[test]
    fn nested_union_in_array_member_gets_element_wrapper() {
        let types = [
            TypeSchema::named("string"),
            TypeSchema::array_of(TypeSchema::one_of(vec![TypeSchema::named("string"), TypeSchema::named("File")])),
        ];
        let mut extra = Vec::new();
        let sig = UnionSignature::build("StepIn", &types, &mut extra);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].name, "StepInElement");
        assert_eq!(sig.members[1].underlying, "StepInElement");
        assert!(sig.members[1].is_array);
    }
}
