//! Command surface: cwl2proto | proto2cwl | schema
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::codegen::{self, Tables, Target};
use crate::config::{Settings, DEFAULT_MAX_DEPTH};
use crate::denormalize::denormalize_document;
use crate::graph;
use crate::normalize::Rules;
use crate::resolve::{resolve_schema, schema_nodes};
use crate::value::to_value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// convert CWL documents to and from their canonical typed form, and compile the CWL schema description
#[derive(Parser, Debug)]
#[command(name = "cwl-lite", version)]
pub struct CommandLineInterface {
    /// log pipeline steps to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// normalize a CWL document and print the canonical form
    #[command(name = "cwl2proto")]
    Cwl2Proto(Cwl2ProtoOut),
    /// print a canonical document back as CWL
    #[command(name = "proto2cwl")]
    Proto2Cwl(Proto2CwlOut),
    /// compile an Avro-style schema description into generated source
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct OutputSettings {
    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct Cwl2ProtoOut {
    /// CWL document (YAML or JSON), a single process or a $graph bundle
    input: PathBuf,

    /// leave step `run` references as written
    #[arg(long)]
    no_resolve: bool,

    /// maximum depth of nested external run files
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// print JSON instead of YAML
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    output: OutputSettings,
}

#[derive(clap::Parser, Debug)]
struct Proto2CwlOut {
    /// canonical document, as printed by `cwl2proto`
    input: PathBuf,

    #[command(flatten)]
    output: OutputSettings,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    /// schema description: a JSON/YAML list of types or a {"$graph": [...]} document
    input: PathBuf,

    /// what to generate
    #[arg(long, value_enum, default_value_t = Target::Proto)]
    target: Target,

    #[command(flatten)]
    output: OutputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Cwl2ProtoOut {
    fn settings(&self) -> Settings {
        let settings = Settings::default().with_max_depth(self.max_depth);
        if self.no_resolve { settings.without_resolution() } else { settings }
    }
}

impl OutputSettings {
    fn write(&self, text: &str) -> anyhow::Result<()> {
        match self.out.as_ref() {
            Some(out) => write_file(out, text),
            None => {
                println!("{}", text.trim_end());
                Ok(())
            }
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Cwl2Proto(target) => {
                let rules = Rules::default();
                let loaded = graph::load(&target.input, &rules, &target.settings())
                    .with_context(|| format!("converting {}", target.input.display()))?;
                if !loaded.unresolved.is_empty() {
                    tracing::warn!(count = loaded.unresolved.len(), "document has dangling run references");
                }
                target.output.write(&to_text(&loaded.document, target.json)?)
            }
            Command::Proto2Cwl(target) => {
                let doc = graph::load_canonical(&target.input)
                    .with_context(|| format!("reading {}", target.input.display()))?;
                let cwl = denormalize_document(&doc)?;
                target.output.write(&to_text(&cwl, false)?)
            }
            Command::Schema(target) => {
                let doc = graph::read_document(&target.input)?;
                let resolution = resolve_schema(schema_nodes(&doc));
                if !resolution.diagnostics.is_empty() {
                    tracing::warn!(count = resolution.diagnostics.len(), "schema nodes skipped");
                }
                let src = codegen::emit(target.target, &resolution.registry, &Tables::default())?;
                target.output.write(&src)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Printed from the dynamic tree: oneof enums are single-key mappings, never YAML tags.
fn to_text<T: Serialize>(value: &T, json: bool) -> anyhow::Result<String> {
    let tree = to_value(value)?;
    if json {
        Ok(serde_json::to_string_pretty(&tree)?)
    } else {
        Ok(serde_yaml::to_string(&tree)?)
    }
}

fn write_file(out: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(out, text).with_context(|| format!("writing {}", out.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = CommandLineInterface::try_parse_from(["cwl-lite", "-v", "cwl2proto", "wf.cwl", "--no-resolve", "--max-depth", "4"])
            .unwrap();
        assert!(cli.verbose);
        let Command::Cwl2Proto(c) = &cli.cmd else { panic!("wrong command") };
        assert_eq!(c.settings(), Settings { resolve: false, max_depth: 4 });

        let cli = CommandLineInterface::try_parse_from(["cwl-lite", "schema", "cwl.json", "--target", "rust"]).unwrap();
        let Command::Schema(s) = &cli.cmd else { panic!("wrong command") };
        assert_eq!(s.target, Target::Rust);
    }

    #[test]
    fn conversion_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tool.cwl");
        std::fs::write(&input, "class: CommandLineTool\nid: t\nbaseCommand: ls\ninputs:\n  x: string\n").unwrap();
        let out = dir.path().join("out/tool.yaml");
        let cli = CommandLineInterface::try_parse_from([
            "cwl-lite",
            "cwl2proto",
            input.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        cli.run().unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("baseCommand:\n- ls"), "{text}");
        assert!(text.contains("name: string"), "{text}");

        let back = dir.path().join("back.cwl");
        let cli = CommandLineInterface::try_parse_from([
            "cwl-lite",
            "proto2cwl",
            out.to_str().unwrap(),
            "-o",
            back.to_str().unwrap(),
        ])
        .unwrap();
        cli.run().unwrap();
        let text = std::fs::read_to_string(&back).unwrap();
        assert!(text.contains("type: string"), "{text}");
    }

    #[test]
    fn yaml_canonical_output_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wf.cwl");
        let workflow = "\
class: Workflow
id: wf
inputs:
  n: {type: int, default: 3}
  word: {type: string?, default: hi}
steps:
  count:
    run: tool.cwl
    in: {n: n}
    out: [total]
  upper:
    run:
      class: ExpressionTool
      id: upper
      expression: $(inputs.word)
      inputs: {word: string}
    in: {word: word}
    out: [out]
";
        std::fs::write(&input, workflow).unwrap();
        let out = dir.path().join("wf.yaml");
        let cli = CommandLineInterface::try_parse_from([
            "cwl-lite",
            "cwl2proto",
            input.to_str().unwrap(),
            "--no-resolve",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        cli.run().unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(!text.contains('!'), "{text}");
        assert!(text.contains("int_value: 3"), "{text}");
        assert!(text.contains("path: tool.cwl"), "{text}");

        let settings = Settings::default().without_resolution();
        let expected = graph::load(&input, &Rules::default(), &settings).unwrap().document;
        assert_eq!(graph::load_canonical(&out).unwrap(), expected);
    }
}
