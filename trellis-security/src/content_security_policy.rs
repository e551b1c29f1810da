//! Content Security Policy (CSP) configuration
//!
//! CSP helps prevent XSS attacks by declaring which dynamic resources are allowed to load.

/// Content Security Policy
///
/// Directives keep their insertion order so the rendered header is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspPolicy {
    directives: Vec<(String, Vec<String>)>,
}

impl CspPolicy {
    /// An empty policy
    pub fn new() -> Self {
        Self { directives: Vec::new() }
    }

    /// Parse a raw `Content-Security-Policy` value such as
    /// `"default-src 'self'; img-src *"`.
    pub fn parse(raw: &str) -> Self {
        let directives = raw
            .split(';')
            .filter_map(|part| {
                let mut tokens = part.split_whitespace();
                let name = tokens.next()?;
                Some((name.to_ascii_lowercase(), tokens.map(str::to_string).collect()))
            })
            .collect();
        Self { directives }
    }

    /// Set a directive, replacing any existing value for it.
    pub fn directive<I, S>(mut self, name: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        match self.directives.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = sources,
            None => self.directives.push((name, sources)),
        }
        self
    }

    pub fn default_src<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directive("default-src", sources)
    }

    pub fn script_src<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directive("script-src", sources)
    }

    pub fn style_src<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directive("style-src", sources)
    }

    pub fn img_src<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directive("img-src", sources)
    }

    pub fn connect_src<I, S>(self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directive("connect-src", sources)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sources)| sources.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn to_header_value(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for CspPolicy {
    /// Same-origin everything. Inline and eval'd scripts are allowed so
    /// that Alpine/Vue style templates work out of the box.
    fn default() -> Self {
        Self::new()
            .default_src(["'self'"])
            .script_src(["'self'", "'unsafe-eval'", "'unsafe-inline'"])
            .style_src(["'self'", "'unsafe-inline'"])
            .img_src(["'self'", "data:", "https:"])
            .directive("font-src", ["'self'"])
            .connect_src(["'self'"])
            .directive("frame-ancestors", ["'none'"])
            .directive("base-uri", ["'self'"])
            .directive("form-action", ["'self'"])
    }
}
