//! Chartwright Engine - Go templates for Kubernetes charts
//!
//! This crate provides a Helm-compatible template engine with:
//! - A `text/template` lexer, parser and tree-walking evaluator
//! - The Sprig and Helm function library (strings, math, encoding, semver,
//!   dates, crypto, collections)
//! - Chart tree rendering with subchart value scoping and aliasing
//! - Block-scalar aware manifest normalization
//! - Go-compatible error messages with suggestions

pub mod ast;
pub mod chart_renderer;
pub mod engine;
pub mod error;
pub mod exec;
pub mod format;
pub mod functions;
pub mod lexer;
pub mod manifest;
pub mod parser;
pub mod subchart;
pub mod suggestions;
pub mod template_set;
pub mod value;

pub use chart_renderer::{ChartRenderer, RenderedChart};
pub use engine::{Engine, EngineBuilder};
pub use error::{
    EngineError, ExecError, ExecErrorKind, ParseError, RenderIssue, RenderReport, Result,
    TemplateFailure,
};
pub use exec::ExecOptions;
pub use manifest::normalize;
pub use subchart::{DiscoveryResult, SubchartConfig, SubchartInfo};
pub use template_set::TemplateSet;
pub use value::Value;
