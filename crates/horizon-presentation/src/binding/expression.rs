//! Binding expression syntax.
//!
//! A binding expression names a member path on a data source, optionally
//! followed by a display format:
//!
//! ```text
//! {{Model.Name}}
//! {{Score}}[F2]
//! {{Greeting}}[Hello, {0}!]
//! ```
//!
//! The literal `{{null}}` is reserved: it means "explicitly bind to nothing"
//! and is not a binding expression. With braces disabled the whole string is
//! the member path and formats are not supported.
//!
//! Everything in this module is a pure string function.

use crate::error::{PresentationError, Result};

/// The reserved sentinel that binds to nothing.
pub const NULL_BINDING_EXPRESSION: &str = "{{null}}";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Returns `true` if `text` is the `{{null}}` sentinel.
pub fn is_null_binding_expression(text: &str) -> bool {
    text == NULL_BINDING_EXPRESSION
}

/// Returns `true` if `text` is a binding expression.
///
/// With `braces` the text must start with `{{`, contain a closing `}}`, and
/// either end right there or continue with a `[...]` format that runs to the
/// end of the string.
pub fn is_binding_expression(text: &str, braces: bool) -> bool {
    if text.is_empty() || is_null_binding_expression(text) {
        return false;
    }
    if !braces {
        return true;
    }
    split_braced(text).is_some()
}

/// Extract the trimmed member path of a binding expression.
pub fn get_binding_member_path_part(text: &str, braces: bool) -> Result<&str> {
    if !is_binding_expression(text, braces) {
        return Err(PresentationError::invalid_expression(text));
    }
    if !braces {
        return Ok(text.trim());
    }
    split_braced(text)
        .map(|(path, _)| path.trim())
        .ok_or_else(|| PresentationError::invalid_expression(text))
}

/// Extract the format string of a binding expression, if it has one.
pub fn get_binding_format_string_part(text: &str, braces: bool) -> Result<Option<&str>> {
    if !is_binding_expression(text, braces) {
        return Err(PresentationError::invalid_expression(text));
    }
    if !braces {
        return Ok(None);
    }
    split_braced(text)
        .map(|(_, format)| format)
        .ok_or_else(|| PresentationError::invalid_expression(text))
}

/// Split `{{path}}[format]` into its path and optional format.
fn split_braced(text: &str) -> Option<(&str, Option<&str>)> {
    let body = text.strip_prefix(OPEN)?;
    let close = body.find(CLOSE)?;
    let path = &body[..close];
    let rest = &body[close + CLOSE.len()..];

    if rest.is_empty() {
        return Some((path, None));
    }

    let format = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((path, Some(format)))
}

/// A parsed binding expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingExpression {
    path: String,
    format: Option<String>,
}

impl BindingExpression {
    /// Parse a braced binding expression.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, true)
    }

    /// Parse a binding expression, optionally without braces.
    pub fn parse_with(text: &str, braces: bool) -> Result<Self> {
        let path = get_binding_member_path_part(text, braces)?;
        let format = get_binding_format_string_part(text, braces)?;
        let expression = Self {
            path: path.to_string(),
            format: format.map(str::to_string),
        };
        if expression.segments().any(str::is_empty) {
            return Err(PresentationError::invalid_expression(text));
        }
        Ok(expression)
    }

    /// The trimmed member path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The format string, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// The member names along the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.').map(str::trim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_braced_expressions() {
        assert!(is_binding_expression("{{Name}}", true));
        assert!(is_binding_expression("{{ Model.Name }}", true));
        assert!(is_binding_expression("{{Score}}[F2]", true));
        assert!(is_binding_expression("{{Score}}[]", true));
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        assert!(!is_binding_expression("", true));
        assert!(!is_binding_expression("Name", true));
        assert!(!is_binding_expression("{{Name", true));
        assert!(!is_binding_expression("{{Name}} ", true));
        assert!(!is_binding_expression("{{Name}}[F2", true));
        assert!(!is_binding_expression("{{Name}}x[F2]", true));
        assert!(!is_binding_expression("x{{Name}}", true));
    }

    #[test]
    fn test_null_sentinel_is_not_an_expression() {
        assert!(!is_binding_expression("{{null}}", true));
        assert!(!is_binding_expression("{{null}}", false));
        assert!(is_null_binding_expression("{{null}}"));
        assert!(is_binding_expression("{{ null }}", true));
    }

    #[test]
    fn test_member_path_round_trips_trimmed() {
        for path in ["Name", " Model.Name ", "a.b.c", "\tScore"] {
            let text = format!("{{{{{}}}}}", path);
            assert!(is_binding_expression(&text, true), "{text}");
            assert_eq!(get_binding_member_path_part(&text, true).unwrap(), path.trim());
        }
    }

    #[test]
    fn test_format_part() {
        assert_eq!(get_binding_format_string_part("{{Score}}[F2]", true).unwrap(), Some("F2"));
        assert_eq!(get_binding_format_string_part("{{Score}}", true).unwrap(), None);
        assert_eq!(
            get_binding_format_string_part("{{Name}}[Hello, {0}!]", true).unwrap(),
            Some("Hello, {0}!")
        );
    }

    #[test]
    fn test_braceless_mode() {
        assert!(is_binding_expression("Model.Name", false));
        assert_eq!(get_binding_member_path_part(" Model.Name ", false).unwrap(), "Model.Name");
        assert_eq!(get_binding_format_string_part("Score[F2]", false).unwrap(), None);
    }

    #[test]
    fn test_parts_fail_on_invalid_input() {
        assert_eq!(
            get_binding_member_path_part("Name", true),
            Err(PresentationError::invalid_expression("Name"))
        );
        assert!(get_binding_format_string_part("{{null}}", true).is_err());
    }

    #[test]
    fn test_parse() {
        let expression = BindingExpression::parse("{{ Model.Score }}[F1]").unwrap();
        assert_eq!(expression.path(), "Model.Score");
        assert_eq!(expression.format(), Some("F1"));
        assert_eq!(expression.segments().collect::<Vec<_>>(), vec!["Model", "Score"]);

        assert!(BindingExpression::parse("{{Model..Score}}").is_err());
        assert!(BindingExpression::parse("{{}}").is_err());
    }
}
