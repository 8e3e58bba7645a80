//! URI Template Matching
//!
//! Decides whether a concrete URI is an expansion of an RFC 6570 template
//! such as `repo://{owner}/{repo}/contents{/path*}`. Only matching is
//! supported; variable values are not extracted.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part<'a> {
    Literal(&'a str),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expr {
    /// Leading character every non-empty expansion starts with (`/`, `?`, ...).
    prefix: Option<char>,
    /// Reserved expansions may contain `/` and `?`.
    reserved: bool,
}

impl Expr {
    fn parse(body: &str) -> Self {
        match body.chars().next() {
            Some('+') => Expr { prefix: None, reserved: true },
            Some(op @ ('#' | '/' | '.' | ';' | '?' | '&')) => Expr {
                prefix: Some(op),
                reserved: true,
            },
            _ => Expr { prefix: None, reserved: false },
        }
    }

    fn admits(&self, chunk: &str) -> bool {
        match self.prefix {
            // prefixed operators expand to nothing when every variable is undefined
            Some(op) => chunk.is_empty() || chunk.starts_with(op),
            None if self.reserved => !chunk.is_empty(),
            None => !chunk.is_empty() && !chunk.contains(['/', '?', '#']),
        }
    }
}

fn parse(template: &str) -> Option<Vec<Part<'_>>> {
    let mut parts = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let close = rest.find('}')?;
                parts.push(Part::Expr(Expr::parse(&rest[1..close])));
                rest = &rest[close + 1..];
            }
            Some(open) => {
                parts.push(Part::Literal(&rest[..open]));
                rest = &rest[open..];
            }
            None => {
                parts.push(Part::Literal(rest));
                rest = "";
            }
        }
    }
    Some(parts)
}

fn match_parts(parts: &[Part<'_>], uri: &str) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return uri.is_empty();
    };
    match first {
        Part::Literal(lit) => uri.strip_prefix(*lit).is_some_and(|tail| match_parts(rest, tail)),
        Part::Expr(expr) => uri
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(uri.len()))
            .any(|end| expr.admits(&uri[..end]) && match_parts(rest, &uri[end..])),
    }
}

/// True when `uri` is an expansion of `template`. A malformed template
/// (unclosed brace) matches nothing but itself.
pub fn matches(template: &str, uri: &str) -> bool {
    if template == uri {
        return true;
    }
    match parse(template) {
        Some(parts) => match_parts(&parts, uri),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_variables() {
        let template = "repo://{owner}/{repo}/issues/{n}";
        assert!(matches(template, "repo://octo/hello/issues/7"));
        assert!(!matches(template, "repo://octo/hello/issues/"));
        assert!(!matches(template, "repo://octo/hello/pulls/7"));
        assert!(!matches(template, "repo://octo/hello/world/issues/7"));
    }

    #[test]
    fn test_path_expansion() {
        let template = "repo://{owner}/{repo}/contents{/path*}";
        assert!(matches(template, "repo://octo/hello/contents"));
        assert!(matches(template, "repo://octo/hello/contents/src/main.rs"));
        assert!(!matches(template, "repo://octo/hello/contentsx"));
    }

    #[test]
    fn test_reserved_and_query_expansion() {
        assert!(matches("file://{+path}", "file://a/b/c.txt"));
        assert!(!matches("file://{path}", "file://a/b/c.txt"));
        assert!(matches("search://issues{?q,page}", "search://issues?q=bug&page=2"));
        assert!(matches("search://issues{?q,page}", "search://issues"));
    }

    #[test]
    fn test_template_literal_and_malformed() {
        assert!(matches("repo://{owner}", "repo://{owner}"));
        assert!(!matches("repo://{owner", "repo://octo"));
        assert!(!matches("repo://{owner}", "gist://octo"));
    }
}
