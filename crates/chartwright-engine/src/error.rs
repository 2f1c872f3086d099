//! Engine error types with Go-compatible messages

use std::fmt;

use chartwright_core::CoreError;
use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{error}")]
    TemplateNotFound { name: String, error: ExecError },

    #[error(transparent)]
    Execution(ExecError),

    #[error("every template in chart {chart} failed to parse")]
    AllTemplatesFailed {
        chart: String,
        errors: Vec<ParseError>,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<ExecError> for EngineError {
    fn from(error: ExecError) -> Self {
        match &error.kind {
            ExecErrorKind::TemplateNotFound { name } => EngineError::TemplateNotFound {
                name: name.clone(),
                error,
            },
            _ => EngineError::Execution(error),
        }
    }
}

/// Malformed template syntax, reported per template
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("template: {name}:{line}: {message}")]
#[diagnostic(code(chartwright::template::parse))]
pub struct ParseError {
    /// Template (file) name
    pub name: String,

    /// 1-based line of the offending token
    pub line: usize,

    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(name: &str, source: &str, pos: usize, message: impl Into<String>) -> Self {
        let pos = pos.min(source.len());
        let line = 1 + source[..pos].matches('\n').count();
        let len = source[pos..]
            .find(|c: char| c.is_whitespace() || c == '}')
            .unwrap_or(source.len() - pos)
            .max(1)
            .min(source.len().saturating_sub(pos));
        Self {
            name: name.to_string(),
            line,
            message: message.into(),
            src: NamedSource::new(name, source.to_string()),
            span: Some(SourceSpan::new(pos.into(), len)),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

/// Error kind for categorizing execution errors
///
/// Note: This enum is non-exhaustive - new variants may be added in future versions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecErrorKind {
    /// A function returned an error or got bad arguments
    Function,
    /// `template`/`include` named an unregistered template
    TemplateNotFound { name: String },
    /// Include or `tpl` nesting exceeded its ceiling
    Recursion,
    /// Field access on nil or on a non-map
    Field,
    Index,
    Type,
    /// `fail` was called
    Fail,
    /// `required` got an empty value
    Required,
    Variable,
}

impl ExecErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::Recursion => "recursion",
            Self::Field => "field",
            Self::Index => "index",
            Self::Type => "type",
            Self::Fail => "fail",
            Self::Required => "required",
            Self::Variable => "variable",
        }
    }
}

/// Failure while executing a parsed template
///
/// Formats like Go's `text/template`:
/// `template: <file>:<line>:<col>: executing "<name>" at <<node>>: <message>`
#[derive(Error, Debug, Clone)]
pub struct ExecError {
    pub kind: ExecErrorKind,
    /// File the failing node was parsed from, empty for errors without a location
    pub template: String,
    /// Name of the template being executed
    pub executing: String,
    pub line: usize,
    pub column: usize,
    /// Source form of the failing node
    pub node: String,
    pub message: String,
}

impl ExecError {
    /// An error with no source location
    pub fn bare(kind: ExecErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            template: String::new(),
            executing: String::new(),
            line: 0,
            column: 0,
            node: String::new(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &ExecErrorKind {
        &self.kind
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.template.is_empty() {
            return write!(f, "template: {}", self.message);
        }
        write!(
            f,
            "template: {}:{}:{}: executing \"{}\" at <{}>: {}",
            self.template, self.line, self.column, self.executing, self.node, self.message
        )
    }
}

/// A template that failed, either while parsing or while executing
#[derive(Debug, Clone)]
pub enum TemplateFailure {
    Parse(ParseError),
    Exec(ExecError),
}

impl fmt::Display for TemplateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{}", e),
            Self::Exec(e) => write!(f, "{}", e),
        }
    }
}

/// Non-fatal issue found while rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderIssue {
    /// Machine-readable category, e.g. `template_parse` or `subchart_depth`
    pub category: String,
    pub message: String,
}

impl RenderIssue {
    pub fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }
}

/// A collection of errors and warnings from rendering a chart tree
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Errors grouped by template name (IndexMap preserves insertion order)
    pub errors_by_template: IndexMap<String, Vec<TemplateFailure>>,

    /// Warnings in the order they were raised
    pub issues: Vec<RenderIssue>,

    /// Successfully rendered templates
    pub successful_templates: Vec<String>,

    /// Total error count
    pub total_errors: usize,
}

impl RenderReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for a specific template
    pub fn add_error(&mut self, template_name: String, error: TemplateFailure) {
        self.errors_by_template
            .entry(template_name)
            .or_default()
            .push(error);
        self.total_errors += 1;
    }

    pub fn add_warning(&mut self, category: &str, message: impl Into<String>) {
        self.issues.push(RenderIssue::warning(category, message));
    }

    pub fn add_issue(&mut self, issue: RenderIssue) {
        self.issues.push(issue);
    }

    /// Mark a template as successfully rendered
    pub fn add_success(&mut self, template_name: String) {
        self.successful_templates.push(template_name);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Get count of templates with errors
    pub fn templates_with_errors(&self) -> usize {
        self.errors_by_template.len()
    }

    /// Warnings of one category
    pub fn warnings_in(&self, category: &str) -> impl Iterator<Item = &RenderIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Fold another report into this one
    pub fn extend(&mut self, other: RenderReport) {
        for (template, errors) in other.errors_by_template {
            for error in errors {
                self.add_error(template.clone(), error);
            }
        }
        self.issues.extend(other.issues);
        self.successful_templates.extend(other.successful_templates);
    }

    /// Generate summary message: "5 errors in 3 templates"
    pub fn summary(&self) -> String {
        let template_word = if self.templates_with_errors() == 1 {
            "template"
        } else {
            "templates"
        };
        let error_word = if self.total_errors == 1 {
            "error"
        } else {
            "errors"
        };
        let mut summary = format!(
            "{} {} in {} {}",
            self.total_errors,
            error_word,
            self.templates_with_errors(),
            template_word
        );
        if self.has_warnings() {
            let warning_word = if self.issues.len() == 1 {
                "warning"
            } else {
                "warnings"
            };
            summary.push_str(&format!(", {} {}", self.issues.len(), warning_word));
        }
        summary
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
