//! Template rendering contract.
//!
//! The pipeline never depends on a concrete template engine; it renders
//! through whatever [`ViewRenderer`] the kernel was given.

use crate::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub trait ViewRenderer: Send + Sync {
    /// Render `name` with the given context object.
    fn render(&self, name: &str, context: &Value) -> Result<String>;

    fn view_exists(&self, name: &str) -> bool;
}

/// Shared renderer handle stored in request context extensions.
#[derive(Clone)]
pub struct Views(pub Arc<dyn ViewRenderer>);

impl Views {
    pub fn new<V: ViewRenderer + 'static>(renderer: V) -> Self {
        Self(Arc::new(renderer))
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("valid placeholder pattern")
});

/// Templates held in memory with `{{ key }}` substitution.
///
/// Dotted keys walk nested objects. Unknown keys render as empty strings.
#[derive(Debug, Default, Clone)]
pub struct InMemoryViews {
    templates: HashMap<String, String>,
}

impl InMemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(name.into(), template.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }
}

fn lookup<'a>(context: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(context, |value, part| value.get(part))
}

impl ViewRenderer for InMemoryViews {
    fn render(&self, name: &str, context: &Value) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("View [{}] not found", name)))?;

        Ok(PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| {
                match lookup(context, &caps[1]) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                }
            })
            .into_owned())
    }

    fn view_exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitutes_values() {
        let views = InMemoryViews::new().add("hello", "<p>Hello {{ user.name }}, {{count}} new</p>");
        let html = views
            .render("hello", &json!({"user": {"name": "Ada"}, "count": 3}))
            .unwrap();
        assert_eq!(html, "<p>Hello Ada, 3 new</p>");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        let views = InMemoryViews::new().add("t", "[{{ nope }}]");
        assert_eq!(views.render("t", &json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_missing_template() {
        let views = InMemoryViews::new();
        assert!(!views.view_exists("errors.404"));
        assert!(matches!(views.render("errors.404", &json!({})), Err(Error::NotFound(_))));
    }
}
