//! Template evaluation against a [`Bindings`] scope

use serde_json::Value;

use crate::binding::{type_name, Bindings};
use crate::error::{RenderErrorKind, TemplateRenderError};

use super::parser::{Expr, Node, Segment};

/// Renders `partial(...)` calls on behalf of the evaluator
pub trait PartialRenderer {
    /// Expand partial `name` with `locals` and return compact single-line output.
    ///
    /// Problems locating the partial are [`EvalError::Local`] so they are
    /// reported against the including template.
    fn render_partial(&self, name: &str, locals: &Bindings) -> Result<String, EvalError>;
}

/// Evaluation failure: either in the template being evaluated, or already
/// attributed to a nested partial file.
#[derive(Debug)]
pub enum EvalError {
    Local(RenderErrorKind),
    Nested(TemplateRenderError),
}

impl From<RenderErrorKind> for EvalError {
    fn from(kind: RenderErrorKind) -> Self {
        EvalError::Local(kind)
    }
}

/// Evaluate a parsed template
pub fn evaluate(
    src: &str,
    nodes: &[Node],
    scope: &Bindings,
    partials: &dyn PartialRenderer,
) -> Result<String, EvalError> {
    let mut out = String::with_capacity(src.len() * 2);
    eval_nodes(src, nodes, scope, partials, &mut out)?;
    Ok(out)
}

fn eval_nodes(
    src: &str,
    nodes: &[Node],
    scope: &Bindings,
    partials: &dyn PartialRenderer,
    out: &mut String,
) -> Result<(), EvalError> {
    for node in nodes {
        match node {
            Node::Text(range) => out.push_str(&src[range.clone()]),
            Node::Output(expr) => {
                let value = eval_expr(expr, scope, partials)?;
                push_value(out, &value);
            }
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if truthy(&eval_expr(cond, scope, partials)?) {
                        eval_nodes(src, body, scope, partials, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    eval_nodes(src, otherwise, scope, partials, out)?;
                }
            }
            Node::Each { items, var, body } => {
                let position = expr_position(items);
                match eval_expr(items, scope, partials)? {
                    Value::Array(items) => {
                        for item in items {
                            eval_nodes(src, body, &scope.with(var.as_str(), item), partials, out)?;
                        }
                    }
                    Value::Object(map) => {
                        for (key, value) in map {
                            let entry = serde_json::json!({ "key": key, "value": value });
                            eval_nodes(src, body, &scope.with(var.as_str(), entry), partials, out)?;
                        }
                    }
                    other => {
                        return Err(RenderErrorKind::TypeMismatch {
                            position,
                            details: format!("cannot iterate over {}", type_name(&other)),
                        }
                        .into())
                    }
                }
            }
        }
    }
    Ok(())
}

fn eval_expr(expr: &Expr, scope: &Bindings, partials: &dyn PartialRenderer) -> Result<Value, EvalError> {
    match expr {
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Int(n) => Ok(Value::from(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Nil => Ok(Value::Null),
        Expr::Path { root, segments, .. } => lookup(root, segments, scope).map_err(EvalError::Local),
        Expr::Partial { name, locals, .. } => {
            let mut values = Vec::with_capacity(locals.len());
            for (key, value_expr) in locals {
                values.push((key.clone(), eval_expr(value_expr, scope, partials)?));
            }
            let locals: Bindings = values.into_iter().collect();
            partials.render_partial(name, &locals).map(Value::String)
        }
    }
}

/// Resolve `root.seg...`; anything missing is an undefined reference
fn lookup(root: &str, segments: &[Segment], scope: &Bindings) -> Result<Value, RenderErrorKind> {
    let mut current = scope.get(root).ok_or_else(|| RenderErrorKind::UndefinedReference {
        name: root.to_string(),
    })?;
    let mut path = root.to_string();

    for segment in segments {
        let next = match segment {
            Segment::Field(field) => {
                path.push('.');
                path.push_str(field);
                current.as_object().and_then(|o| o.get(field))
            }
            Segment::Index(idx) => {
                path.push_str(&format!("[{}]", idx));
                current.as_array().and_then(|a| a.get(*idx))
            }
        };
        current = next.ok_or_else(|| RenderErrorKind::UndefinedReference { name: path.clone() })?;
    }

    Ok(current.clone())
}

fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        // compact JSON is valid YAML flow style
        other => out.push_str(&other.to_string()),
    }
}

fn expr_position(expr: &Expr) -> usize {
    match expr {
        Expr::Path { position, .. } | Expr::Partial { position, .. } => *position,
        _ => 0,
    }
}
