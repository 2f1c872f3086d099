//! Chartwright Core - Core types for the Helm-compatible chart renderer
//!
//! This crate provides the foundational types used throughout Chartwright:
//! - `Chart`: The chart definition (metadata, templates, values, subcharts)
//! - `Values`: Configuration values with deep merge support
//! - `ReleaseInfo`: `.Release` as seen by templates
//! - `RenderContext`: Template rendering context

pub mod chart;
pub mod context;
pub mod error;
pub mod release;
pub mod values;

pub use chart::{Chart, ChartKind, ChartMetadata, Dependency, Maintainer, TemplateFile};
pub use context::{Capabilities, ChartInfo, HelmVersion, KubeVersion, RenderContext, TemplateInfo};
pub use error::CoreError;
pub use release::ReleaseInfo;
pub use values::{GLOBAL_KEY, Values, json_kind, json_truthy};
