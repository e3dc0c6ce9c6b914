//! N-Triples serialization.

use super::errors::RenderError;
use super::Statement;

/// Serialize statements as N-Triples lines (`s p o .`), each terminated by a
/// newline. An empty slice renders as the empty string.
pub fn try_render(statements: &[Statement]) -> Result<String, RenderError> {
    let mut out = String::new();
    for (index, statement) in statements.iter().enumerate() {
        check_token(index, "subject", &statement.subject, false)?;
        check_token(index, "predicate", &statement.predicate, false)?;
        check_token(index, "object", &statement.object, true)?;

        out.push_str(&statement.subject);
        out.push(' ');
        out.push_str(&statement.predicate);
        out.push(' ');
        out.push_str(&statement.object);
        out.push_str(" .\n");
    }
    Ok(out)
}

/// Like [`try_render`], but a malformed statement is logged and the whole
/// batch renders as the empty string.
pub fn render_statements(statements: &[Statement]) -> String {
    match try_render(statements) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Could not render {} statements: {}", statements.len(), e);
            String::new()
        }
    }
}

fn check_token(index: usize, part: &'static str, token: &str, literal_allowed: bool) -> Result<(), RenderError> {
    let fail = |reason| RenderError {
        index,
        part,
        token: token.to_string(),
        reason,
    };

    if token.is_empty() {
        return Err(fail("empty"));
    }
    if token.contains(['\n', '\r']) {
        return Err(fail("contains a line break"));
    }
    let is_iri = token.len() > 2
        && token.starts_with('<')
        && token.ends_with('>')
        && !token[1..token.len() - 1].contains(is_forbidden_in_iri);
    let is_blank = token.starts_with("_:");
    let is_literal = token.starts_with('"');
    match (is_iri || is_blank, is_literal) {
        (true, _) => Ok(()),
        (false, true) if literal_allowed => Ok(()),
        _ => Err(fail("not an IRI, blank node or literal")),
    }
}

/// Characters an N-Triples IRIREF may not contain unescaped.
fn is_forbidden_in_iri(c: char) -> bool {
    c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(s: &str, p: &str, o: &str) -> Statement {
        Statement::new(s, p, o)
    }

    #[test]
    fn test_render_lines() {
        let statements = vec![
            statement("<urn:a>", "<urn:p>", "\"x\""),
            statement("<urn:a>", "<urn:q>", "<urn:b>"),
        ];
        assert_eq!(
            try_render(&statements).unwrap(),
            "<urn:a> <urn:p> \"x\" .\n<urn:a> <urn:q> <urn:b> .\n"
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let statements = vec![statement("<urn:a>", "<urn:p>", "\"1\"^^<urn:t>")];
        assert_eq!(render_statements(&statements), render_statements(&statements));
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(render_statements(&[]), "");
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let err = try_render(&[statement("<urn:a>", "", "\"x\"")]).unwrap_err();
        assert_eq!(err.part, "predicate");
        assert_eq!(err.reason, "empty");

        let err = try_render(&[statement("<urn:a>", "<urn:p>", "\"a\nb\"")]).unwrap_err();
        assert_eq!(err.reason, "contains a line break");

        let err = try_render(&[statement("<urn:a>", "\"p\"", "\"x\"")]).unwrap_err();
        assert_eq!(err.part, "predicate");

        assert_eq!(render_statements(&[statement("bare", "<urn:p>", "\"x\"")]), "");
    }

    #[test]
    fn test_invalid_iri_characters_drop_the_batch() {
        let err = try_render(&[statement("<http://x/John Smith>x>", "<urn:p>", "<urn:o>")]).unwrap_err();
        assert_eq!(err.part, "subject");
        assert_eq!(err.reason, "not an IRI, blank node or literal");

        let statements = vec![
            statement("<urn:a>", "<urn:p>", "\"ok\""),
            statement("<urn:a>", "<urn:q>", "<urn:b|c>"),
        ];
        assert_eq!(render_statements(&statements), "");
        assert!(try_render(&[statement("<>", "<urn:p>", "<urn:o>")]).is_err());
    }
}
