//! Load pipeline and GraphResolver.
//!
//! `load` reads a file, normalizes it (one process or every member of a
//! `$graph` bundle) and then resolves step `run` references:
//! - `#name` against the bundle's members, first id match wins;
//! - anything else as a path relative to the referring document, by running
//!   the whole pipeline on that file.
//!
//! External loads keep a stack of the files being loaded, so a reference
//! chain that comes back to itself fails instead of recursing forever.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::cwl::{find_process, CanonicalDocument, ClassTag, GraphRecord, ProcessClass, RunRecord, Workflow};
use crate::error::{ConversionError, LoadError, UnresolvedReference};
use crate::normalize::{decode_process, Normalizer, Rules};
use crate::path_de::decode;
use crate::value::Value;

/// A converted document plus every run reference left dangling.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: CanonicalDocument,
    pub unresolved: Vec<UnresolvedReference>,
}

pub fn load(path: &Path, rules: &Rules, settings: &Settings) -> Result<Loaded, LoadError> {
    let mut loader = Loader::new(rules, settings);
    let document = loader.load(path)?;
    Ok(Loaded { document, unresolved: loader.unresolved })
}

/// Parse a YAML or JSON file into a dynamic tree.
pub fn read_document(path: &Path) -> Result<Value, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&text).map_err(|source| LoadError::Parse { path: path.to_path_buf(), source })
}

/// Read a file already in canonical form: a `GraphRecord` (`graph` key) or a
/// single process selected by its `class` field.
pub fn load_canonical(path: &Path) -> Result<CanonicalDocument, LoadError> {
    let raw = read_document(path)?;
    if raw.get("graph").is_some() {
        return Ok(CanonicalDocument::Graph(decode::<GraphRecord>(raw, "GraphRecord")?));
    }
    let class = ClassTag::of(&raw)?;
    Ok(CanonicalDocument::Process(decode_process(class, raw)?))
}

pub struct Loader<'a> {
    normalizer: Normalizer<'a>,
    settings: &'a Settings,
    stack: Vec<PathBuf>,
    unresolved: Vec<UnresolvedReference>,
}

impl<'a> Loader<'a> {
    pub fn new(rules: &'a Rules, settings: &'a Settings) -> Self {
        Self { normalizer: Normalizer::new(rules), settings, stack: Vec::new(), unresolved: Vec::new() }
    }

    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    pub fn load(&mut self, path: &Path) -> Result<CanonicalDocument, LoadError> {
        let canonical = fs::canonicalize(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        if self.stack.contains(&canonical) {
            return Err(LoadError::ReferenceCycle { path: canonical });
        }
        if self.stack.len() >= self.settings.max_depth {
            return Err(LoadError::RecursionLimit { path: canonical, limit: self.settings.max_depth });
        }
        debug!(path = %canonical.display(), depth = self.stack.len(), "loading");
        let raw = read_document(&canonical)?;
        self.stack.push(canonical.clone());
        let out = self.load_value(&raw, &canonical);
        self.stack.pop();
        out
    }

    /// Normalize and resolve an already-parsed document. `origin` anchors
    /// relative run paths.
    pub fn load_value(&mut self, raw: &Value, origin: &Path) -> Result<CanonicalDocument, LoadError> {
        let Some(members) = raw.get("$graph") else {
            let mut process = self.normalizer.normalize(raw)?;
            if self.settings.resolve {
                let mut seen = Vec::new();
                self.resolve_process(&mut process, origin, &[], &mut seen)?;
            }
            return Ok(CanonicalDocument::Process(process));
        };

        let Some(members) = members.as_sequence() else {
            return Err(ConversionError {
                target: "GraphRecord",
                path: "$graph".into(),
                message: format!("expected a sequence of processes, found {}", members.kind()),
                payload: raw.clone(),
            }
            .into());
        };
        let mut graph = members.iter().map(|m| self.normalizer.normalize(m)).collect::<Result<Vec<_>, _>>()?;
        debug!(members = graph.len(), "normalized bundle");
        if self.settings.resolve {
            let bundle = graph.clone();
            for member in graph.iter_mut() {
                let mut seen: Vec<String> = member.id().map(|id| id.trim_start_matches('#').to_string()).into_iter().collect();
                self.resolve_process(member, origin, &bundle, &mut seen)?;
            }
        }
        let cwl_version = raw.get("cwlVersion").and_then(Value::as_str).map(str::to_string);
        Ok(CanonicalDocument::Graph(GraphRecord { cwl_version, graph }))
    }

    // ---- resolution ---- //

    fn resolve_process(
        &mut self,
        process: &mut ProcessClass,
        origin: &Path,
        bundle: &[ProcessClass],
        seen: &mut Vec<String>,
    ) -> Result<(), LoadError> {
        match process {
            ProcessClass::Workflow(wf) => self.resolve_workflow(wf, origin, bundle, seen),
            ProcessClass::CommandLineTool(_) | ProcessClass::ExpressionTool(_) => Ok(()),
        }
    }

    fn resolve_workflow(
        &mut self,
        wf: &mut Workflow,
        origin: &Path,
        bundle: &[ProcessClass],
        seen: &mut Vec<String>,
    ) -> Result<(), LoadError> {
        for step in wf.steps.iter_mut() {
            let target = match &mut step.run {
                RunRecord::Path(p) => p.clone(),
                RunRecord::Workflow(inner) => {
                    self.resolve_workflow(inner, origin, bundle, seen)?;
                    continue;
                }
                RunRecord::Commandline(_) | RunRecord::Expression(_) => continue,
            };
            let resolved = if target.starts_with('#') {
                self.resolve_local(&target, origin, bundle, seen)?
            } else {
                Some(self.load_external(&target, origin)?)
            };
            match resolved {
                Some(process) => step.run = RunRecord::from(process),
                None => {
                    let r = UnresolvedReference { workflow: wf.id.clone(), step: step.id.clone(), reference: target };
                    warn!(%r, "dangling run reference");
                    self.unresolved.push(r);
                }
            }
        }
        Ok(())
    }

    fn resolve_local(
        &mut self,
        target: &str,
        origin: &Path,
        bundle: &[ProcessClass],
        seen: &mut Vec<String>,
    ) -> Result<Option<ProcessClass>, LoadError> {
        let Some(found) = find_process(bundle, target) else {
            return Ok(None);
        };
        let mut found = found.clone();
        if let ProcessClass::Workflow(wf) = &mut found {
            let id = target.trim_start_matches('#').to_string();
            if seen.contains(&id) {
                warn!(reference = target, "bundle reference cycle");
                return Ok(None);
            }
            seen.push(id);
            let res = self.resolve_workflow(wf, origin, bundle, seen);
            seen.pop();
            res?;
        }
        debug!(reference = target, class = %found.class(), "resolved against bundle");
        Ok(Some(found))
    }

    fn load_external(&mut self, target: &str, origin: &Path) -> Result<ProcessClass, LoadError> {
        let (file, fragment) = match target.split_once('#') {
            Some((file, fragment)) => (file, Some(fragment)),
            None => (target, None),
        };
        let path = origin.parent().unwrap_or(Path::new("")).join(file);
        let doc = self.load(&path)?;
        let process = select(doc, fragment, &path)?;
        debug!(reference = target, class = %process.class(), "resolved external file");
        Ok(process)
    }
}

/// Pick one process out of a loaded document: the fragment's member, else
/// the member called `main`, else the only member.
fn select(doc: CanonicalDocument, fragment: Option<&str>, path: &Path) -> Result<ProcessClass, LoadError> {
    let graph = match doc {
        CanonicalDocument::Process(p) => return Ok(p),
        CanonicalDocument::Graph(g) => g,
    };
    let picked = match fragment {
        Some(f) => graph.find(f),
        None => graph.find("main").or(match graph.graph.as_slice() {
            [only] => Some(only),
            _ => None,
        }),
    };
    picked.cloned().ok_or_else(|| LoadError::AmbiguousGraph {
        path: path.to_path_buf(),
        fragment: fragment.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn load_default(path: &Path) -> Result<Loaded, LoadError> {
        load(path, &Rules::default(), &Settings::default())
    }

    #[test]
    fn bundle_reference_resolves_to_sibling() {
        let raw = Value::from(json!({
            "cwlVersion": "v1.0",
            "$graph": [
                {"class": "CommandLineTool", "id": "step1", "baseCommand": "echo"},
                {"class": "Workflow", "id": "main", "steps": [{"id": "s", "run": {"path": "#step1"}}]}
            ]
        }));
        let rules = Rules::default();
        let settings = Settings::default();
        let mut loader = Loader::new(&rules, &settings);
        let CanonicalDocument::Graph(g) = loader.load_value(&raw, Path::new("bundle.cwl")).unwrap() else {
            panic!("expected a bundle")
        };
        assert_eq!(g.cwl_version.as_deref(), Some("v1.0"));
        let wf = g.graph[1].as_workflow().unwrap();
        match &wf.steps[0].run {
            RunRecord::Commandline(t) => {
                assert_eq!(t.id.as_deref(), Some("step1"));
                assert_eq!(t.base_command, ["echo"]);
            }
            other => panic!("unexpected run {other:?}"),
        }
        assert!(loader.unresolved().is_empty());
    }

    #[test]
    fn graph_must_be_a_sequence() {
        let raw = Value::from(json!({"cwlVersion": "v1.0", "$graph": {"main": {"class": "Workflow"}}}));
        let rules = Rules::default();
        let settings = Settings::default();
        let mut loader = Loader::new(&rules, &settings);
        match loader.load_value(&raw, Path::new("bundle.cwl")) {
            Err(LoadError::Conversion(err)) => {
                assert_eq!(err.path, "$graph");
                assert!(err.message.contains("mapping"), "{}", err.message);
                assert_eq!(err.payload, raw);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn first_match_wins_and_misses_dangle() {
        let raw = Value::from(json!({
            "cwlVersion": "v1.0",
            "$graph": [
                {"class": "CommandLineTool", "id": "#dup", "baseCommand": "first"},
                {"class": "CommandLineTool", "id": "dup", "baseCommand": "second"},
                {"class": "Workflow", "id": "main", "steps": [
                    {"id": "a", "run": "#dup"},
                    {"id": "b", "run": "#missing"}
                ]}
            ]
        }));
        let rules = Rules::default();
        let settings = Settings::default();
        let mut loader = Loader::new(&rules, &settings);
        let CanonicalDocument::Graph(g) = loader.load_value(&raw, Path::new("bundle.cwl")).unwrap() else {
            panic!("expected a bundle")
        };
        let wf = g.graph[2].as_workflow().unwrap();
        let RunRecord::Commandline(t) = &wf.steps[0].run else { panic!("not inlined") };
        assert_eq!(t.base_command, ["first"]);
        assert_eq!(wf.steps[1].run.path(), Some("#missing"));
        assert_eq!(
            loader.unresolved(),
            [UnresolvedReference { workflow: Some("main".into()), step: Some("b".into()), reference: "#missing".into() }]
        );
    }

    #[test]
    fn sibling_workflows_are_resolved_and_cycles_dangle() {
        let raw = Value::from(json!({
            "cwlVersion": "v1.0",
            "$graph": [
                {"class": "CommandLineTool", "id": "tool"},
                {"class": "Workflow", "id": "inner", "steps": [
                    {"id": "t", "run": "#tool"},
                    {"id": "back", "run": "#main"}
                ]},
                {"class": "Workflow", "id": "main", "steps": [{"id": "i", "run": "#inner"}]}
            ]
        }));
        let rules = Rules::default();
        let settings = Settings::default();
        let mut loader = Loader::new(&rules, &settings);
        let CanonicalDocument::Graph(g) = loader.load_value(&raw, Path::new("bundle.cwl")).unwrap() else {
            panic!("expected a bundle")
        };
        let main = g.graph[2].as_workflow().unwrap();
        let RunRecord::Workflow(inner) = &main.steps[0].run else { panic!("inner not inlined") };
        assert!(matches!(inner.steps[0].run, RunRecord::Commandline(_)));
        assert_eq!(inner.steps[1].run.path(), Some("#main"));
    }

    #[test]
    fn external_file_is_boxed_under_its_own_class() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tool.cwl", "class: CommandLineTool\nid: echo\nbaseCommand: echo\n");
        let wf = write(
            dir.path(),
            "wf.cwl",
            "class: Workflow\nid: wf\nsteps:\n  s1:\n    run: tool.cwl\n    out: [o]\n",
        );
        let loaded = load_default(&wf).unwrap();
        let CanonicalDocument::Process(ProcessClass::Workflow(wf)) = loaded.document else { panic!("wrong shape") };
        match &wf.steps[0].run {
            RunRecord::Commandline(t) => assert_eq!(t.id.as_deref(), Some("echo")),
            other => panic!("unexpected run {other:?}"),
        }
        assert!(loaded.unresolved.is_empty());
    }

    #[test]
    fn external_bundle_member_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "lib.cwl",
            "cwlVersion: v1.0\n$graph:\n  - {class: CommandLineTool, id: a}\n  - {class: ExpressionTool, id: b, expression: x}\n",
        );
        write(dir.path(), "one.cwl", "cwlVersion: v1.0\n$graph:\n  - {class: CommandLineTool, id: only}\n");
        let wf = write(
            dir.path(),
            "wf.cwl",
            "class: Workflow\nsteps:\n  - {id: s1, run: 'lib.cwl#b'}\n  - {id: s2, run: one.cwl}\n",
        );
        let loaded = load_default(&wf).unwrap();
        let CanonicalDocument::Process(p) = loaded.document else { panic!("wrong shape") };
        let wf = p.as_workflow().unwrap();
        assert!(matches!(&wf.steps[0].run, RunRecord::Expression(e) if e.id.as_deref() == Some("b")));
        assert!(matches!(&wf.steps[1].run, RunRecord::Commandline(t) if t.id.as_deref() == Some("only")));

        let ambiguous = write(dir.path(), "amb.cwl", "class: Workflow\nsteps:\n  - {id: s, run: lib.cwl}\n");
        assert!(matches!(load_default(&ambiguous), Err(LoadError::AmbiguousGraph { fragment: None, .. })));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.cwl", "class: Workflow\nsteps:\n  - {id: s, run: b.cwl}\n");
        let b = write(dir.path(), "b.cwl", "class: Workflow\nsteps:\n  - {id: s, run: a.cwl}\n");
        let err = load_default(&b).unwrap_err();
        assert!(matches!(err, LoadError::ReferenceCycle { ref path } if path.ends_with("b.cwl")), "{err}");
    }

    #[test]
    fn depth_limit_applies() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "leaf.cwl", "class: CommandLineTool\n");
        write(dir.path(), "mid.cwl", "class: Workflow\nsteps:\n  - {id: s, run: leaf.cwl}\n");
        let top = write(dir.path(), "top.cwl", "class: Workflow\nsteps:\n  - {id: s, run: mid.cwl}\n");

        let shallow = Settings::default().with_max_depth(2);
        let err = load(&top, &Rules::default(), &shallow).unwrap_err();
        assert!(matches!(err, LoadError::RecursionLimit { limit: 2, .. }), "{err}");
        assert!(load(&top, &Rules::default(), &Settings::default().with_max_depth(3)).is_ok());
    }

    #[test]
    fn resolution_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let wf = write(dir.path(), "wf.cwl", "class: Workflow\nsteps:\n  - {id: s, run: missing.cwl}\n");
        assert!(matches!(load_default(&wf), Err(LoadError::Io { .. })));
        let loaded = load(&wf, &Rules::default(), &Settings::default().without_resolution()).unwrap();
        let CanonicalDocument::Process(p) = loaded.document else { panic!("wrong shape") };
        assert_eq!(p.as_workflow().unwrap().steps[0].run.path(), Some("missing.cwl"));
    }

    #[test]
    fn canonical_files_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let single = write(dir.path(), "t.yaml", "class: CommandLineTool\nid: t\nbaseCommand: [ls]\n");
        let CanonicalDocument::Process(p) = load_canonical(&single).unwrap() else { panic!("wrong shape") };
        assert_eq!(p.class(), ClassTag::CommandLineTool);

        let graph = write(dir.path(), "g.yaml", "cwlVersion: v1.0\ngraph:\n  - commandline: {id: t}\n");
        let CanonicalDocument::Graph(g) = load_canonical(&graph).unwrap() else { panic!("wrong shape") };
        assert_eq!(g.find("t").map(ProcessClass::class), Some(ClassTag::CommandLineTool));

        let bad = write(dir.path(), "bad.yaml", "class: CommandLineTool\nbaseCommand: ls\n");
        assert!(matches!(load_canonical(&bad), Err(LoadError::Conversion(_))));
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn fixture_workflow_inlines_external_and_inline_runs() {
        let loaded = load_default(&fixture("wf.cwl")).unwrap();
        let CanonicalDocument::Process(p) = loaded.document else { panic!("wrong shape") };
        let wf = p.as_workflow().unwrap();
        assert_eq!(wf.outputs[0].output_source, ["shout/out"]);
        assert_eq!(wf.steps[0].inputs[0].source, ["message"]);
        let RunRecord::Commandline(echo) = &wf.steps[0].run else { panic!("echo.cwl not inlined") };
        assert_eq!(echo.arguments[0].value_from.as_deref(), Some("-n"));
        assert_eq!(echo.inputs[0].default, Some(crate::cwl::DataValue::StringValue("hello".into())));
        assert!(matches!(&wf.steps[1].run, RunRecord::Expression(e) if e.id.as_deref() == Some("upper")));
    }

    #[test]
    fn fixture_bundle_resolves_hash_reference() {
        let loaded = load_default(&fixture("bundle.cwl")).unwrap();
        let CanonicalDocument::Graph(g) = loaded.document else { panic!("wrong shape") };
        let main = g.find("main").and_then(ProcessClass::as_workflow).unwrap();
        assert_eq!(main.steps[0].scatter, ["file"]);
        assert!(matches!(&main.steps[0].run, RunRecord::Commandline(t) if t.base_command == ["wc", "-l"]));
        assert!(loaded.unresolved.is_empty());
    }
}
