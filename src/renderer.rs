//! Template renderer
//!
//! Expands manifest templates into YAML documents:
//!
//! - `*.yaml` / `*.yml` files pass through unchanged
//! - `*.yaml.erb` / `*.yml.erb` files are evaluated against the layered
//!   bindings (attempt constants, renderer bindings, call bindings)
//! - `partial("name", ...)` includes are rendered recursively and inlined as
//!   compact JSON so the indentation of the including line cannot break them
//!
//! The renderer holds no mutable state; one instance can render any number
//! of templates, from any number of threads.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, error, instrument};
use walkdir::WalkDir;

use crate::attempt::DeployAttempt;
use crate::binding::Bindings;
use crate::error::{DeployError, RenderErrorKind, TemplateRenderError};
use crate::limits::MAX_PARTIAL_DEPTH;
use crate::partials::PartialResolver;
use crate::template::{self, EvalError, PartialRenderer, Template};

const TEMPLATE_SUFFIXES: [&str; 4] = [".yaml", ".yml", ".yaml.erb", ".yml.erb"];

/// The documents a template expanded to
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedDocument {
    Single(Value),
    /// Zero or several documents, in source order
    Stream(Vec<Value>),
}

impl RenderedDocument {
    fn from_documents(mut documents: Vec<Value>) -> Self {
        if documents.len() == 1 {
            RenderedDocument::Single(documents.remove(0))
        } else {
            RenderedDocument::Stream(documents)
        }
    }

    pub fn documents(&self) -> &[Value] {
        match self {
            RenderedDocument::Single(doc) => std::slice::from_ref(doc),
            RenderedDocument::Stream(docs) => docs,
        }
    }

    pub fn into_documents(self) -> Vec<Value> {
        match self {
            RenderedDocument::Single(doc) => vec![doc],
            RenderedDocument::Stream(docs) => docs,
        }
    }

    pub fn len(&self) -> usize {
        self.documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents().is_empty()
    }

    /// Serialize as YAML. Streams prefix every document with `---`.
    pub fn to_yaml_stream(&self) -> Result<String, serde_yaml::Error> {
        match self {
            RenderedDocument::Single(doc) => serde_yaml::to_string(doc),
            RenderedDocument::Stream(docs) => {
                let mut out = String::new();
                for doc in docs {
                    out.push_str("---\n");
                    out.push_str(&serde_yaml::to_string(doc)?);
                }
                Ok(out)
            }
        }
    }

    /// One compact JSON line per document; fails on the first document
    /// JSON cannot represent (e.g. a mapping with a sequence as key)
    pub fn to_compact(&self) -> Result<Vec<String>, String> {
        self.documents().iter().map(template::to_compact_json).collect()
    }
}

/// A rendered template file
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub filename: String,
    /// Expanded text (the raw text for literal templates)
    pub text: String,
    pub document: RenderedDocument,
}

pub struct TemplateRenderer {
    template_dir: PathBuf,
    base: Bindings,
    partials: PartialResolver,
}

impl TemplateRenderer {
    pub fn new(attempt: &DeployAttempt, template_dir: impl Into<PathBuf>, bindings: Bindings) -> Self {
        let template_dir = template_dir.into();
        Self {
            partials: PartialResolver::new(&template_dir),
            base: attempt.bindings().layer(&bindings),
            template_dir,
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Bindings every template sees before call-specific values
    pub fn base_bindings(&self) -> &Bindings {
        &self.base
    }

    /// Render one template from its raw text
    #[instrument(skip(self, raw, extra))]
    pub fn render(
        &self,
        filename: &str,
        raw: &str,
        extra: &Bindings,
    ) -> Result<RenderedTemplate, TemplateRenderError> {
        let result = self.render_inner(filename, raw, extra);
        if let Err(err) = &result {
            error!("{}", err.diagnostic());
        }
        result
    }

    fn render_inner(
        &self,
        filename: &str,
        raw: &str,
        extra: &Bindings,
    ) -> Result<RenderedTemplate, TemplateRenderError> {
        let text = if is_expandable(filename) {
            self.expand(filename, raw, &self.base.layer(extra), 0)?
        } else {
            raw.to_string()
        };

        let documents = template::parse_stream(&text).map_err(|details| {
            TemplateRenderError::new(RenderErrorKind::MalformedOutput { details }, filename, &text)
        })?;
        debug!(documents = documents.len(), "rendered");

        Ok(RenderedTemplate {
            filename: filename.to_string(),
            document: RenderedDocument::from_documents(documents),
            text,
        })
    }

    /// Render a partial with `locals` into its structured document
    pub fn render_partial(
        &self,
        name: &str,
        locals: &Bindings,
    ) -> Result<RenderedDocument, TemplateRenderError> {
        let (filename, text) = self.partial_at(name, locals, 1).map_err(|e| match e {
            EvalError::Nested(err) => err,
            EvalError::Local(kind) => TemplateRenderError::new(kind, name, ""),
        })?;
        let document = template::parse_single(&text).map_err(|details| {
            TemplateRenderError::new(RenderErrorKind::MalformedOutput { details }, &filename, &text)
        })?;
        Ok(RenderedDocument::Single(document))
    }

    /// Resolve and expand a partial; returns its file name and expanded text
    fn partial_at(
        &self,
        name: &str,
        locals: &Bindings,
        depth: usize,
    ) -> Result<(String, String), EvalError> {
        if depth > MAX_PARTIAL_DEPTH {
            return Err(EvalError::Local(RenderErrorKind::PartialDepthExceeded {
                name: name.to_string(),
                depth,
            }));
        }

        let path = self.partials.resolve(name)?;
        let filename = file_name(&path);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            EvalError::Nested(TemplateRenderError::new(
                RenderErrorKind::Io {
                    details: e.to_string(),
                },
                &filename,
                "",
            ))
        })?;
        debug!(partial = name, path = %path.display(), depth, "rendering partial");

        let text = self
            .expand(&filename, &raw, &self.base.for_partial(locals), depth)
            .map_err(EvalError::Nested)?;
        Ok((filename, text))
    }

    fn expand(
        &self,
        filename: &str,
        raw: &str,
        scope: &Bindings,
        depth: usize,
    ) -> Result<String, TemplateRenderError> {
        let template =
            Template::compile(raw).map_err(|kind| TemplateRenderError::new(kind, filename, raw))?;
        template
            .evaluate(scope, &PartialScope { renderer: self, depth })
            .map_err(|e| match e {
                EvalError::Local(kind) => TemplateRenderError::new(kind, filename, raw),
                EvalError::Nested(err) => err,
            })
    }

    /// Read and render one template file
    pub fn render_file(&self, path: &Path) -> Result<RenderedTemplate, TemplateRenderError> {
        let filename = file_name(path);
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TemplateRenderError::new(
                RenderErrorKind::Io {
                    details: e.to_string(),
                },
                &filename,
                "",
            )
        })?;
        self.render(&filename, &raw, &Bindings::new())
    }

    /// Template files directly inside the template directory, sorted by name
    pub fn template_files(&self) -> Result<Vec<PathBuf>, DeployError> {
        if !self.template_dir.is_dir() {
            return Err(DeployError::TemplateDirNotFound {
                path: self.template_dir.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.template_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| DeployError::Io(e.into()))?;
            if entry.file_type().is_file() && is_template(&entry.file_name().to_string_lossy()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Render every template in the template directory
    pub fn render_dir(&self) -> Result<Vec<RenderedTemplate>, DeployError> {
        let files = self.template_files()?;
        debug!(count = files.len(), dir = %self.template_dir.display(), "rendering templates");
        files
            .iter()
            .map(|path| self.render_file(path).map_err(DeployError::from))
            .collect()
    }
}

/// Partial renderer bound to the current nesting depth
struct PartialScope<'r> {
    renderer: &'r TemplateRenderer,
    depth: usize,
}

impl PartialRenderer for PartialScope<'_> {
    fn render_partial(&self, name: &str, locals: &Bindings) -> Result<String, EvalError> {
        let (filename, text) = self.renderer.partial_at(name, locals, self.depth + 1)?;
        template::normalize(&text).map_err(|details| {
            EvalError::Nested(TemplateRenderError::new(
                RenderErrorKind::MalformedOutput { details },
                &filename,
                text,
            ))
        })
    }
}

pub fn is_expandable(filename: &str) -> bool {
    filename.ends_with(".erb")
}

fn is_template(filename: &str) -> bool {
    TEMPLATE_SUFFIXES.iter().any(|s| filename.ends_with(s))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer(dir: &Path) -> TemplateRenderer {
        TemplateRenderer::new(
            &DeployAttempt::new(Some("abcdef123456".to_string())),
            dir,
            Bindings::new(),
        )
    }

    #[test]
    fn literal_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "kind: ConfigMap\nvalue: <%= not_expanded %>\n";
        let out = renderer(dir.path()).render("cm.yaml", raw, &Bindings::new()).unwrap();
        assert_eq!(out.text, raw);
        match out.document {
            RenderedDocument::Single(doc) => {
                assert_eq!(doc["value"].as_str(), Some("<%= not_expanded %>"))
            }
            other => panic!("expected single document, got {:?}", other),
        }
    }

    #[test]
    fn call_bindings_override_renderer_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let r = TemplateRenderer::new(
            &DeployAttempt::new(Some("abcdef123456".to_string())),
            dir.path(),
            Bindings::from([("env", json!("staging")), ("current_sha", json!("fromcaller"))]),
        );
        let out = r
            .render(
                "a.yaml.erb",
                "env: <%= env %>\nsha: <%= current_sha %>\n",
                &Bindings::from([("env", json!("production"))]),
            )
            .unwrap();
        let doc = &out.document.documents()[0];
        assert_eq!(doc["env"].as_str(), Some("production"));
        assert_eq!(doc["sha"].as_str(), Some("fromcaller"));
    }

    #[test]
    fn single_document_has_no_separator() {
        let dir = tempfile::tempdir().unwrap();
        let out = renderer(dir.path())
            .render("a.yaml.erb", "---\na: 1\n", &Bindings::new())
            .unwrap();
        assert!(matches!(out.document, RenderedDocument::Single(_)));
        assert!(!out.document.to_yaml_stream().unwrap().contains("---"));
    }

    #[test]
    fn depth_limit_stops_recursive_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(
            dir.path().join("partials/loop.yaml.erb"),
            "a: <%= partial('loop') %>\n",
        )
        .unwrap();
        let err = renderer(dir.path())
            .render("a.yaml.erb", "x: <%= partial('loop') %>\n", &Bindings::new())
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            RenderErrorKind::PartialDepthExceeded { depth, .. } if *depth == MAX_PARTIAL_DEPTH + 1
        ));
    }

    #[test]
    fn template_files_skips_partials_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("partials/p.yaml.erb"), "a: 1").unwrap();
        std::fs::write(dir.path().join("b.yml"), "a: 1").unwrap();
        std::fs::write(dir.path().join("a.yaml.erb"), "a: 1").unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();

        let files = renderer(dir.path()).template_files().unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.yaml.erb", "b.yml"]);
    }

    #[test]
    fn render_partial_returns_the_parsed_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(
            dir.path().join("partials/labels.yaml.erb"),
            "app: <%= app %>\ntier: <%= locals.tier %>\n",
        )
        .unwrap();

        let locals = Bindings::from([("app", json!("shop")), ("tier", json!("web"))]);
        let doc = renderer(dir.path()).render_partial("labels", &locals).unwrap();
        let RenderedDocument::Single(labels) = doc else {
            panic!("expected a single document, got {:?}", doc);
        };
        assert_eq!(labels["app"].as_str(), Some("shop"));
        assert_eq!(labels["tier"].as_str(), Some("web"));
    }

    #[test]
    fn render_partial_reports_missing_partial() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer(dir.path())
            .render_partial("absent", &Bindings::new())
            .unwrap_err();
        assert!(matches!(err.kind(), RenderErrorKind::PartialNotFound { name, .. } if name == "absent"));
    }

    #[test]
    fn multi_document_literal_keeps_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "---\nkind: ConfigMap\nmetadata:\n  name: a\n---\nkind: ConfigMap\nmetadata:\n  name: b\n";
        let out = renderer(dir.path()).render("cms.yaml", raw, &Bindings::new()).unwrap();
        assert_eq!(out.text, raw);
        let RenderedDocument::Stream(docs) = &out.document else {
            panic!("expected a stream, got {:?}", out.document);
        };
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["metadata"]["name"].as_str(), Some("b"));
    }

    #[test]
    fn empty_literal_is_an_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let out = renderer(dir.path()).render("empty.yml", "", &Bindings::new()).unwrap();
        assert_eq!(out.document, RenderedDocument::Stream(Vec::new()));
        assert!(out.document.is_empty());
    }

    #[test]
    fn to_compact_rejects_unrepresentable_documents() {
        let mut map = serde_yaml::Mapping::new();
        map.insert(Value::Sequence(vec![Value::from(1)]), Value::from("x"));
        let doc = RenderedDocument::Stream(vec![
            serde_yaml::from_str("a: 1").unwrap(),
            Value::Mapping(map),
        ]);
        assert!(doc.to_compact().is_err());

        let ok = RenderedDocument::Single(serde_yaml::from_str("a: 1").unwrap());
        assert_eq!(ok.to_compact().unwrap(), vec![r#"{"a":1}"#.to_string()]);
    }

    #[test]
    fn missing_template_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer(&dir.path().join("nope")).render_dir().unwrap_err();
        assert!(matches!(err, DeployError::TemplateDirNotFound { .. }));
    }
}
