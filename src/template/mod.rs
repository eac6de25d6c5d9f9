//! # ERB-style manifest templates
//!
//! A small subset of ERB, enough for Kubernetes manifests:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `<%= expr %>` | output a value |
//! | `<% if expr %>` … `<% elsif expr %>` … `<% else %>` … `<% end %>` | conditional |
//! | `<% each expr as name %>` … `<% end %>` | loop over a sequence or mapping |
//! | `<%# text %>` | comment |
//! | `<%%` | literal `<%` |
//!
//! `<%-` and `-%>` trim surrounding whitespace. Expressions are binding
//! paths (`app.ports[0]`, `env["KEY"]`), literals and
//! `partial("name", key: value, ...)`.
//!
//! ```rust
//! use kubedeploy::binding::Bindings;
//! use kubedeploy::template::{NoPartials, Template};
//! use serde_json::json;
//!
//! let template = Template::compile("name: <%= app %>").unwrap();
//! let scope = Bindings::from([("app", json!("web"))]);
//! assert_eq!(template.evaluate(&scope, &NoPartials).unwrap(), "name: web");
//! ```

pub mod eval;
pub mod lexer;
pub mod normalize;
pub mod parser;

pub use eval::{EvalError, PartialRenderer};
pub use normalize::{normalize, parse_single, parse_stream, to_compact_json};

use crate::binding::Bindings;
use crate::error::RenderErrorKind;

/// A parsed template, ready to evaluate against any scope
#[derive(Debug, Clone)]
pub struct Template<'a> {
    src: &'a str,
    nodes: Vec<parser::Node>,
}

impl<'a> Template<'a> {
    pub fn compile(src: &'a str) -> Result<Self, RenderErrorKind> {
        let tokens = lexer::tokenize(src)?;
        let nodes = parser::parse(src, &tokens)?;
        Ok(Self { src, nodes })
    }

    pub fn evaluate(&self, scope: &Bindings, partials: &dyn PartialRenderer) -> Result<String, EvalError> {
        eval::evaluate(self.src, &self.nodes, scope, partials)
    }
}

/// Partial renderer for templates that must not include partials
pub struct NoPartials;

impl PartialRenderer for NoPartials {
    fn render_partial(&self, name: &str, _locals: &Bindings) -> Result<String, EvalError> {
        Err(EvalError::Local(RenderErrorKind::PartialNotFound {
            name: name.to_string(),
            searched: Vec::new(),
        }))
    }
}
