//! Deferred response building.
//!
//! Handlers and middleware return a [`Reply`]: either a finished
//! [`HttpResponse`] or a [`ResponseBuilder`] that is turned into one after
//! the after-phase, once every middleware has queued its headers and
//! cookies on the request context.

use crate::context::RequestContext;
use crate::cookie::Cookie;
use crate::view::Views;
use crate::HttpResponse;
use serde_json::{Map, Value};
use std::fmt;
use crate::logging::warn;

pub const JSON: &str = "application/json";
pub const HTML: &str = "text/html; charset=utf-8";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const XML: &str = "application/xml";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Response type used when serializing a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Json,
    Html,
    Text,
    Xml,
    Raw,
    Redirect,
    View,
}

/// Builder content.
#[derive(Debug, Clone)]
pub enum Content {
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
    View { name: String, context: Value },
    Response(HttpResponse),
}

impl Content {
    fn to_value(&self) -> Value {
        match self {
            Content::Empty => Value::Null,
            Content::Text(s) => Value::String(s.clone()),
            Content::Json(v) => v.clone(),
            Content::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            Content::View { context, .. } => context.clone(),
            Content::Response(r) => Value::String(r.body_text()),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Content::Empty => String::new(),
            Content::Text(s) => s.clone(),
            Content::Json(Value::String(s)) => s.clone(),
            Content::Json(v) => v.to_string(),
            Content::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Content::View { name, .. } => name.clone(),
            Content::Response(r) => r.body_text(),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<Value> for Content {
    fn from(v: Value) -> Self {
        Content::Json(v)
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Content::Bytes(b)
    }
}

impl From<HttpResponse> for Content {
    fn from(r: HttpResponse) -> Self {
        Content::Response(r)
    }
}

/// Fields of the `{success, data|message, meta, errors, code}` envelope.
#[derive(Debug, Clone, Default)]
struct Envelope {
    success: Option<bool>,
    message: Option<String>,
    meta: Option<Value>,
    errors: Option<Value>,
    code: Option<String>,
}

/// Accumulates content, status, headers and cookies; serialized by
/// [`ResponseBuilder::build`].
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    content: Content,
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    response_type: Option<ResponseType>,
    content_type: Option<String>,
    envelope: Option<Envelope>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new(Content::Empty)
    }
}

impl ResponseBuilder {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
            response_type: None,
            content_type: None,
            envelope: None,
        }
    }

    /// A builder that renders `name` with `context` when built.
    pub fn view(name: impl Into<String>, context: Value) -> Self {
        Self::new(Content::View {
            name: name.into(),
            context,
        })
        .response_type(ResponseType::View)
    }

    // ---- chainable setters ----

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.set_cookie(cookie);
        self
    }

    /// Expire a cookie on the client.
    pub fn without_cookie(self, name: impl Into<String>) -> Self {
        self.cookie(Cookie::removal(name))
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a key to a view's context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Content::View { context, .. } = &mut self.content {
            if !context.is_object() {
                *context = Value::Object(Map::new());
            }
            if let Some(obj) = context.as_object_mut() {
                obj.insert(key.into(), value.into());
            }
        }
        self
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        self.envelope.get_or_insert_with(Envelope::default)
    }

    pub fn success(mut self, success: bool) -> Self {
        self.envelope_mut().success = Some(success);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.envelope_mut().message = Some(message.into());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.envelope_mut().meta = Some(meta);
        self
    }

    pub fn errors(mut self, errors: Value) -> Self {
        self.envelope_mut().errors = Some(errors);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.envelope_mut().code = Some(code.into());
        self
    }

    // ---- in-place mutation, used by middleware ----

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    // ---- accessors ----

    pub fn get_status(&self) -> u16 {
        self.status
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn get_content(&self) -> &Content {
        &self.content
    }

    pub fn has_envelope(&self) -> bool {
        self.envelope.is_some()
    }

    // ---- building ----

    /// Resolve the response type: an explicit type wins, then a built
    /// response passes through, then a JSON-negotiating client forces
    /// JSON, then the content's shape decides.
    pub fn determine_type(&self, wants_json: bool) -> ResponseType {
        if let Some(ty) = self.response_type {
            return ty;
        }
        match &self.content {
            Content::Response(_) => ResponseType::Raw,
            Content::View { .. } => ResponseType::View,
            Content::Empty => ResponseType::Text,
            _ if wants_json => ResponseType::Json,
            Content::Bytes(_) => ResponseType::Raw,
            Content::Json(_) => ResponseType::Json,
            Content::Text(text) => {
                if looks_like_html(text) {
                    ResponseType::Html
                } else {
                    ResponseType::Text
                }
            }
        }
    }

    fn structured(&self) -> Value {
        let Some(envelope) = &self.envelope else {
            return self.content.to_value();
        };

        let success = envelope.success.unwrap_or(self.status < 400);
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(success));

        if success {
            body.insert("data".into(), self.content.to_value());
            if let Some(message) = &envelope.message {
                body.insert("message".into(), Value::String(message.clone()));
            }
            if let Some(meta) = envelope.meta.as_ref().filter(|m| !is_empty_value(m)) {
                body.insert("meta".into(), meta.clone());
            }
        } else {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| self.content.to_text());
            body.insert("message".into(), Value::String(message));
            if let Some(errors) = envelope.errors.as_ref().filter(|e| !is_empty_value(e)) {
                body.insert("errors".into(), errors.clone());
            }
            if let Some(code) = &envelope.code {
                body.insert("code".into(), Value::String(code.clone()));
            }
            if let Some(meta) = envelope.meta.as_ref().filter(|m| !is_empty_value(m)) {
                body.insert("meta".into(), meta.clone());
            }
        }

        Value::Object(body)
    }

    fn base_response(&self, ctx: &RequestContext) -> HttpResponse {
        let wants_json = ctx.wants_json();
        let ty = self.determine_type(wants_json);

        match ty {
            ResponseType::Json => json_response(self.status, &self.structured()),
            ResponseType::Html if wants_json && self.envelope.is_some() => {
                json_response(self.status, &self.structured())
            }
            ResponseType::Html => {
                typed(self.status, HTML, self.content.to_text().into_bytes())
            }
            ResponseType::Text => {
                typed(self.status, TEXT, self.content.to_text().into_bytes())
            }
            ResponseType::Xml => typed(self.status, XML, self.content.to_text().into_bytes()),
            ResponseType::Redirect => {
                let status = if self.status == 200 { 302 } else { self.status };
                HttpResponse::new(status).with_header("Location", self.content.to_text())
            }
            ResponseType::Raw => match &self.content {
                Content::Response(response) => {
                    let mut response = response.clone();
                    if self.status != 200 {
                        response.status = self.status;
                    }
                    response
                }
                Content::Bytes(bytes) => {
                    let content_type = self.content_type.as_deref().unwrap_or(OCTET_STREAM);
                    typed(self.status, content_type, bytes.clone())
                }
                other => typed(self.status, TEXT, other.to_text().into_bytes()),
            },
            ResponseType::View => self.render_view(ctx),
        }
    }

    fn render_view(&self, ctx: &RequestContext) -> HttpResponse {
        let Content::View { name, context } = &self.content else {
            return typed(self.status, HTML, self.content.to_text().into_bytes());
        };

        let rendered = ctx
            .extension::<Views>()
            .ok_or_else(|| crate::Error::Internal("no view renderer configured".into()))
            .and_then(|views| views.0.render(name, context));

        match rendered {
            Ok(html) => typed(self.status, HTML, html.into_bytes()),
            Err(e) => {
                warn!(view = %name, error = %e, "View rendering failed");
                typed(500, TEXT, format!("View [{}] could not be rendered", name).into_bytes())
            }
        }
    }

    /// Serialize into an [`HttpResponse`].
    ///
    /// Queued context headers and cookies are applied first, skipping any
    /// the builder set itself; the builder's own values are applied last.
    /// Never fails: content that cannot be rendered falls back to text.
    pub fn build(self, ctx: &RequestContext) -> HttpResponse {
        let mut response = self.base_response(ctx);

        for cookie in ctx.queued_cookies() {
            if self.get_cookie(&cookie.name).is_none() {
                response.set_cookie(cookie);
            }
        }
        for (name, value) in ctx.queued_headers() {
            if self.get_header(&name).is_none() {
                response.set_header(name, value);
            }
        }

        for (name, value) in self.headers {
            response.set_header(name, value);
        }
        for cookie in self.cookies {
            response.set_cookie(cookie);
        }

        if let Some(content_type) = self.content_type {
            response.set_header("Content-Type", content_type);
        }

        response
    }
}

fn typed(status: u16, content_type: &str, body: Vec<u8>) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("Content-Type", content_type)
        .with_body(body)
}

fn json_response(status: u16, value: &Value) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => typed(status, JSON, body),
        Err(_) => typed(status, TEXT, value.to_string().into_bytes()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// HTML sniffing for string content: a doctype or `<html` prefix, or any
/// angle-bracket pair.
pub fn looks_like_html(text: &str) -> bool {
    let lower = text.trim_start().to_ascii_lowercase();
    lower.starts_with("<!doctype")
        || lower.starts_with("<html")
        || (text.contains('<') && text.contains('>'))
}

/// What a handler or middleware hands back to the pipeline.
pub enum Reply {
    Response(HttpResponse),
    Builder(ResponseBuilder),
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Response(r) => r.status,
            Reply::Builder(b) => b.get_status(),
        }
    }

    pub fn is_builder(&self) -> bool {
        matches!(self, Reply::Builder(_))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            Reply::Response(r) => r.header(name),
            Reply::Builder(b) => b.get_header(name),
        }
    }

    /// Set a header on whichever form the reply currently has.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        match self {
            Reply::Response(r) => r.set_header(name, value),
            Reply::Builder(b) => b.set_header(name, value),
        }
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        match self {
            Reply::Response(r) => r.set_cookie(cookie),
            Reply::Builder(b) => b.set_cookie(cookie),
        }
    }

    /// Turn the reply into the final response.
    ///
    /// Builders serialize through [`ResponseBuilder::build`]. A finished
    /// response passes through, receiving only queued headers and cookies
    /// it does not already carry.
    pub fn build(self, ctx: &RequestContext) -> HttpResponse {
        match self {
            Reply::Builder(builder) => builder.build(ctx),
            Reply::Response(mut response) => {
                for cookie in ctx.queued_cookies() {
                    if response.cookie(&cookie.name).is_none() {
                        response.set_cookie(cookie);
                    }
                }
                for (name, value) in ctx.queued_headers() {
                    if !response.has_header(&name) {
                        response.set_header(name, value);
                    }
                }
                response
            }
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Response(r) => f.debug_tuple("Response").field(&r.status).finish(),
            Reply::Builder(b) => f.debug_tuple("Builder").field(&b.get_status()).finish(),
        }
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Reply::Response(response)
    }
}

impl From<ResponseBuilder> for Reply {
    fn from(builder: ResponseBuilder) -> Self {
        Reply::Builder(builder)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Builder(ResponseBuilder::new(value))
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Builder(ResponseBuilder::new(text))
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Builder(ResponseBuilder::new(text))
    }
}
