// Route groups

use std::collections::HashMap;

/// Attributes shared by every route registered inside a
/// [`Router::group`](crate::Router::group) call.
///
/// Nested groups accumulate: prefixes join with `/`, middleware lists
/// concatenate outermost first and name prefixes concatenate. The
/// innermost blueprint and domain win.
#[derive(Debug, Clone, Default)]
pub struct RouteGroup {
    pub(crate) prefix: Option<String>,
    pub(crate) middleware: Vec<String>,
    pub(crate) name: Option<String>,
    pub(crate) blueprint: Option<String>,
    pub(crate) domain: Option<String>,
    pub(crate) wheres: HashMap<String, String>,
}

impl RouteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// URI prefix for the group's routes.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(names.into_iter().map(Into::into));
        self
    }

    /// Name prefix, e.g. `admin.`. Without one the prefix is derived from
    /// the URI prefix (`api/auth` becomes `api.auth.`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn blueprint(mut self, blueprint: impl Into<String>) -> Self {
        self.blueprint = Some(blueprint.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn where_(mut self, param: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.wheres.insert(param.into(), pattern.into());
        self
    }

    pub fn get_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn get_middleware(&self) -> &[String] {
        &self.middleware
    }

    /// The name prefix this group contributes, explicit or derived.
    pub fn name_prefix(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.prefix
                .as_deref()
                .map(|p| format!("{}.", p.replace('/', ".")))
        })
    }
}
