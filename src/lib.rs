//! Translate CWL documents into a strictly-typed canonical model and back, and
//! compile the CWL schema description into interface definitions.
//!
//! Two pipelines share the schema model:
//! - conversion: [`graph::load`] → [`normalize`] → [`cwl`] (and [`denormalize`] back);
//! - generation: [`resolve`] → [`codegen`].
pub mod cli;
pub mod codegen;
pub mod config;
pub mod cwl;
pub mod denormalize;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod path_de;
pub mod resolve;
pub mod schema;
pub mod value;
