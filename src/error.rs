//! Error types with fix suggestions
//!
//! Error code ranges:
//! - KD-001-009: Configuration and binding errors
//! - KD-010-019: Template render errors
//! - KD-020-029: Cluster and watch errors

use std::fmt;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// What went wrong while rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// No search directory contains the partial
    PartialNotFound { name: String, searched: Vec<String> },
    /// The template referenced a binding (or a field of one) that does not exist
    UndefinedReference { name: String },
    /// Expansion worked but the result is not valid YAML
    MalformedOutput { details: String },
    /// The template itself could not be parsed
    Syntax { position: usize, details: String },
    /// A value was used in a way its type does not allow
    TypeMismatch { position: usize, details: String },
    /// Partials nested deeper than `MAX_PARTIAL_DEPTH`
    PartialDepthExceeded { name: String, depth: usize },
    /// Reading a template or partial from disk failed
    Io { details: String },
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderErrorKind::PartialNotFound { name, searched } => write!(
                f,
                "could not find partial '{}' in any of {}",
                name,
                searched.join(":")
            ),
            RenderErrorKind::UndefinedReference { name } => {
                write!(f, "undefined local variable or method '{}'", name)
            }
            RenderErrorKind::MalformedOutput { details } => {
                write!(f, "rendered output is not valid YAML: {}", details)
            }
            RenderErrorKind::Syntax { position, details } => {
                write!(f, "syntax error at position {}: {}", position, details)
            }
            RenderErrorKind::TypeMismatch { position, details } => {
                write!(f, "type error at position {}: {}", position, details)
            }
            RenderErrorKind::PartialDepthExceeded { name, depth } => write!(
                f,
                "partial '{}' nested {} levels deep (recursive partial?)",
                name, depth
            ),
            RenderErrorKind::Io { details } => write!(f, "read failed: {}", details),
        }
    }
}

/// A fatal template render failure.
///
/// `content` is the raw template for reference and syntax errors, and the
/// rendered text for [`RenderErrorKind::MalformedOutput`], since in that case
/// the template was fine but its expansion was not.
#[derive(Error, Debug, Clone)]
#[error("Template '{filename}' cannot be rendered: {kind}")]
pub struct TemplateRenderError {
    pub kind: RenderErrorKind,
    pub filename: String,
    pub content: String,
}

impl TemplateRenderError {
    pub fn new(kind: RenderErrorKind, filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &RenderErrorKind {
        &self.kind
    }

    /// Human-readable paragraph for the deploy summary
    pub fn diagnostic(&self) -> String {
        let label = match self.kind {
            RenderErrorKind::MalformedOutput { .. } => "Rendered template content",
            _ => "Template content",
        };
        format!(
            "Error from renderer:\n  {}\n{} ({}):\n{}",
            self.kind.to_string().replace('\n', " "),
            label,
            self.filename,
            self.content
        )
    }
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("KD-001: Invalid binding '{input}': expected key=value with key matching [A-Za-z_][A-Za-z0-9_]*")]
    InvalidBinding { input: String },

    #[error("KD-002: Bindings file '{path}' must contain a mapping: {details}")]
    BindingsFile { path: String, details: String },

    #[error("KD-003: Template directory '{path}' not found")]
    TemplateDirNotFound { path: String },

    #[error("KD-004: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("KD-005: IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Render errors (KD-010 to KD-019)
    // ─────────────────────────────────────────────────────────────
    #[error("KD-010: {0}")]
    Render(#[from] TemplateRenderError),

    // ─────────────────────────────────────────────────────────────
    // Cluster and watch errors (KD-020 to KD-029)
    // ─────────────────────────────────────────────────────────────
    #[error("KD-020: kubectl not available at '{path}'")]
    KubectlUnavailable { path: String },

    #[error("KD-021: {failed} resource(s) failed or timed out")]
    ResourcesFailed { failed: usize },

    #[error("KD-022: Deploy attempt deadline of {secs}s exceeded")]
    Deadline { secs: u64 },
}

impl FixSuggestion for DeployError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DeployError::InvalidBinding { .. } => Some("Pass bindings as --bindings name=value"),
            DeployError::BindingsFile { .. } => {
                Some("Use a top-level YAML or JSON mapping, e.g. {\"replicas\": 3}")
            }
            DeployError::TemplateDirNotFound { .. } => Some("Check the template directory path"),
            DeployError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            DeployError::Io(_) => Some("Check file path and permissions"),
            DeployError::Render(e) => e.fix_suggestion(),
            DeployError::KubectlUnavailable { .. } => {
                Some("Install kubectl or put it on PATH")
            }
            DeployError::ResourcesFailed { .. } => {
                Some("Inspect the failed resources with kubectl describe")
            }
            DeployError::Deadline { .. } => Some("Raise --deadline-secs or investigate slow resources"),
        }
    }
}

impl FixSuggestion for TemplateRenderError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self.kind {
            RenderErrorKind::PartialNotFound { .. } => {
                Some("Add <name>.yaml.erb to a partials/ directory next to or above the templates")
            }
            RenderErrorKind::UndefinedReference { .. } => {
                Some("Pass the missing value with --bindings name=value")
            }
            RenderErrorKind::MalformedOutput { .. } => {
                Some("Check the rendered content for broken indentation or quoting")
            }
            RenderErrorKind::Syntax { .. } => {
                Some("Check that every <% tag is closed and every if/each has a matching end")
            }
            RenderErrorKind::TypeMismatch { .. } => {
                Some("Only sequences and mappings can be iterated with each")
            }
            RenderErrorKind::PartialDepthExceeded { .. } => {
                Some("Remove the partial that includes itself")
            }
            RenderErrorKind::Io { .. } => Some("Check file path and permissions"),
        }
    }
}
