//! Parameter constraint patterns and their wire-format types.
//!
//! A `{param}` token carries no type on its own; its `where` pattern
//! decides which typed placeholder it compiles to (`<id:int>`,
//! `<key:uuid>`, ...) and which regex it must satisfy when matching.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const NUMBER: &str = r"[0-9]+";
pub const ALPHA: &str = r"[a-zA-Z]+";
pub const ALPHA_NUMERIC: &str = r"[a-zA-Z0-9]+";
pub const SLUG: &str = r"[a-zA-Z0-9\-]+";
pub const PATH: &str = r".*";
pub const UUID: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// Default pattern for an unconstrained parameter: one path segment.
pub const SEGMENT: &str = r"[^/]+";

/// Matches `{name}` and `{name?}` tokens in a route URI.
pub static PARAM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)(\?)?\}").expect("valid parameter token pattern"));

/// Wire-format type a constraint compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Uuid,
    Slug,
    Path,
    Str,
}

impl ParamType {
    /// Classify a `where` pattern.
    pub fn classify(pattern: Option<&str>) -> Self {
        match pattern {
            Some(NUMBER) => ParamType::Int,
            Some(p) if p.starts_with("[0-9a-fA-F]{8}") => ParamType::Uuid,
            Some(SLUG) => ParamType::Slug,
            Some(PATH) => ParamType::Path,
            _ => ParamType::Str,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Uuid => "uuid",
            ParamType::Slug => "slug",
            ParamType::Path => "path",
            ParamType::Str => "str",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternation pattern accepting exactly one of `values`.
pub fn one_of<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let escaped: Vec<String> = values
        .into_iter()
        .map(|v| regex::escape(v.as_ref()))
        .collect();
    format!("({})", escaped.join("|"))
}

/// Parameter names in declaration order.
pub fn parameter_names(uri: &str) -> Vec<String> {
    PARAM_TOKEN
        .captures_iter(uri)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(ParamType::classify(Some(NUMBER)), ParamType::Int);
        assert_eq!(ParamType::classify(Some(UUID)), ParamType::Uuid);
        assert_eq!(ParamType::classify(Some(SLUG)), ParamType::Slug);
        assert_eq!(ParamType::classify(Some(PATH)), ParamType::Path);
        assert_eq!(ParamType::classify(Some(ALPHA)), ParamType::Str);
        assert_eq!(ParamType::classify(None), ParamType::Str);
    }

    #[test]
    fn test_one_of_escapes() {
        assert_eq!(one_of(["draft", "v1.0"]), r"(draft|v1\.0)");
    }

    #[test]
    fn test_parameter_names() {
        assert_eq!(
            parameter_names("posts/{post}/comments/{comment?}"),
            vec!["post", "comment"]
        );
        assert!(parameter_names("about").is_empty());
    }
}
