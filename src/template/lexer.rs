//! Splits a template into literal text and `<% %>` tags
//!
//! Tokens keep byte ranges into the original source so literals are never
//! copied until output time.

use std::ops::Range;

use crate::error::RenderErrorKind;

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (range in original string)
    Literal(Range<usize>),
    /// `<%= expr %>` (range of the expression)
    Output(Range<usize>),
    /// `<% code %>` (range of the statement)
    Code(Range<usize>),
}

/// Tokenize an ERB template.
///
/// `<%# ... %>` comments are dropped, `<%%` becomes a literal `<%`,
/// `<%-` strips spaces and tabs before the tag and `-%>` eats the newline
/// right after it.
pub fn tokenize(src: &str) -> Result<Vec<Token>, RenderErrorKind> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while let Some(offset) = src[i..].find("<%") {
        let tag_start = i + offset;

        // <%% escape: flush text up to and including "<%", skip the extra '%'
        if bytes.get(tag_start + 2) == Some(&b'%') {
            push_literal(&mut tokens, literal_start..tag_start + 2);
            literal_start = tag_start + 3;
            i = literal_start;
            continue;
        }

        let mut literal_end = tag_start;
        let mut body_start = tag_start + 2;
        if bytes.get(body_start) == Some(&b'-') {
            body_start += 1;
            while literal_end > literal_start && matches!(bytes[literal_end - 1], b' ' | b'\t') {
                literal_end -= 1;
            }
        }
        push_literal(&mut tokens, literal_start..literal_end);

        let close = src[body_start..]
            .find("%>")
            .map(|o| body_start + o)
            .ok_or_else(|| RenderErrorKind::Syntax {
                position: tag_start,
                details: "unterminated tag, expected '%>'".to_string(),
            })?;

        let mut body_end = close;
        let mut after = close + 2;
        if body_end > body_start && bytes[body_end - 1] == b'-' {
            body_end -= 1;
            if src[after..].starts_with("\r\n") {
                after += 2;
            } else if src[after..].starts_with('\n') {
                after += 1;
            }
        }

        match bytes.get(body_start) {
            Some(b'=') => tokens.push(Token::Output(body_start + 1..body_end)),
            Some(b'#') => {}
            _ => tokens.push(Token::Code(body_start..body_end)),
        }

        literal_start = after;
        i = after;
    }

    push_literal(&mut tokens, literal_start..src.len());
    Ok(tokens)
}

fn push_literal(tokens: &mut Vec<Token>, range: Range<usize>) {
    if range.start < range.end {
        tokens.push(Token::Literal(range));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| match t {
                Token::Literal(r) => format!("L({})", &src[r]),
                Token::Output(r) => format!("O({})", src[r].trim()),
                Token::Code(r) => format!("C({})", src[r].trim()),
            })
            .collect()
    }

    #[test]
    fn tokenize_simple_literal() {
        assert_eq!(texts("kind: ConfigMap"), vec!["L(kind: ConfigMap)"]);
    }

    #[test]
    fn tokenize_output_and_code() {
        assert_eq!(
            texts("a: <%= x %>\n<% if y %>b<% end %>"),
            vec!["L(a: )", "O(x)", "L(\n)", "C(if y)", "L(b)", "C(end)"]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(texts("a<%# note %>b"), vec!["L(a)", "L(b)"]);
    }

    #[test]
    fn escape_emits_literal_open_tag() {
        assert_eq!(texts("x <%% y"), vec!["L(x <%)", "L( y)"]);
    }

    #[test]
    fn trim_markers() {
        assert_eq!(
            texts("a:\n  <%- if x -%>\n  b: 1\n  <%- end -%>\n"),
            vec!["L(a:\n)", "C(if x)", "L(  b: 1\n)", "C(end)"]
        );
    }

    #[test]
    fn unterminated_tag_reports_position() {
        let err = tokenize("abc <%= x").unwrap_err();
        assert_eq!(
            err,
            RenderErrorKind::Syntax {
                position: 4,
                details: "unterminated tag, expected '%>'".to_string()
            }
        );
    }
}
