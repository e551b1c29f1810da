//! One-time request analysis: negotiation, client identity and
//! user-agent sniffing.
//!
//! The user-agent classification is a best-effort substring heuristic. It
//! is meant for response shaping and logging, never for access control.

use crate::HttpRequest;
use serde::Serialize;

/// Path prefixes that skip analysis entirely.
pub const STATIC_PATHS: &[&str] = &[
    "/static/",
    "/favicon.ico",
    "/robots.txt",
    "/sitemap.xml",
    "/health",
];

/// Response format negotiated from `Accept`, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Html,
    Xml,
    Text,
}

impl ResponseFormat {
    fn from_mime(mime: &str) -> Option<Self> {
        if mime.contains("application/json") {
            Some(ResponseFormat::Json)
        } else if mime.contains("text/html") {
            Some(ResponseFormat::Html)
        } else if mime.contains("application/xml") || mime.contains("text/xml") {
            Some(ResponseFormat::Xml)
        } else if mime.contains("text/plain") {
            Some(ResponseFormat::Text)
        } else {
            None
        }
    }

    fn rank(self) -> u8 {
        match self {
            ResponseFormat::Json => 0,
            ResponseFormat::Html => 1,
            ResponseFormat::Xml => 2,
            ResponseFormat::Text => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Html => "html",
            ResponseFormat::Xml => "xml",
            ResponseFormat::Text => "text",
        }
    }
}

/// Kind of body the client sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Json,
    Form,
    Multipart,
    Text,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAgentType {
    Curl,
    Postman,
    Bot,
    Mobile,
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Static,
    Ajax,
    Browser,
}

/// Flags derived from the request headers, computed once per request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAnalysis {
    pub request_type: RequestType,
    pub is_ajax: bool,
    pub wants_json: bool,
    pub wants_html: bool,
    pub preferred_response: ResponseFormat,
    pub content_type: ContentKind,
    pub client_ip: String,
    pub bearer_token: Option<String>,
    pub user_agent: String,
    pub user_agent_type: UserAgentType,
    pub referer: Option<String>,
}

impl RequestAnalysis {
    pub fn analyze(request: &HttpRequest) -> Self {
        let mut analysis = Self {
            request_type: RequestType::Browser,
            is_ajax: false,
            wants_json: false,
            wants_html: false,
            preferred_response: ResponseFormat::Html,
            content_type: content_kind(request.content_type()),
            client_ip: client_ip(request),
            bearer_token: request.bearer_token(),
            user_agent: request.header("user-agent").unwrap_or("Unknown").to_string(),
            user_agent_type: UserAgentType::Browser,
            referer: request.header("referer").map(str::to_string),
        };

        if STATIC_PATHS.iter().any(|p| request.path.starts_with(p)) {
            analysis.request_type = RequestType::Static;
            return analysis;
        }

        if request
            .header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
        {
            analysis.request_type = RequestType::Ajax;
            analysis.is_ajax = true;
        }

        analysis.user_agent_type = classify_user_agent(request.header("user-agent"));
        analysis.preferred_response = preferred_format(request.header("accept"));
        analysis.wants_json = analysis.preferred_response == ResponseFormat::Json
            || analysis.content_type == ContentKind::Json;
        analysis.wants_html = analysis.preferred_response == ResponseFormat::Html;

        analysis
    }

    pub fn is_static(&self) -> bool {
        self.request_type == RequestType::Static
    }
}

/// Pick the response format from an `Accept` header.
///
/// Only the entries sharing the highest `q` are considered; among those the
/// recognized format ranked first by json, html, xml, text wins. Anything
/// unrecognized, or no header at all, yields HTML.
pub fn preferred_format(accept: Option<&str>) -> ResponseFormat {
    let Some(accept) = accept else {
        return ResponseFormat::Html;
    };

    let entries: Vec<(String, f32)> = accept
        .to_ascii_lowercase()
        .split(',')
        .filter_map(|item| {
            let mut parts = item.trim().split(';');
            let mime = parts.next()?.trim().to_string();
            if mime.is_empty() {
                return None;
            }
            let q = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((mime, q))
        })
        .collect();

    let Some(top) = entries.iter().map(|(_, q)| *q).reduce(f32::max) else {
        return ResponseFormat::Html;
    };

    entries
        .iter()
        .filter(|(_, q)| (*q - top).abs() < f32::EPSILON)
        .filter_map(|(mime, _)| ResponseFormat::from_mime(mime))
        .min_by_key(|f| f.rank())
        .unwrap_or(ResponseFormat::Html)
}

fn content_kind(header: Option<&str>) -> ContentKind {
    let Some(header) = header else {
        return ContentKind::None;
    };
    let header = header.to_ascii_lowercase();
    if header.contains("application/json") {
        ContentKind::Json
    } else if header.contains("application/x-www-form-urlencoded") {
        ContentKind::Form
    } else if header.contains("multipart/form-data") {
        ContentKind::Multipart
    } else if header.contains("text/") {
        ContentKind::Text
    } else {
        ContentKind::None
    }
}

/// `X-Forwarded-For` first hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(request: &HttpRequest) -> String {
    if let Some(forwarded) = request.header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = request.header("x-real-ip") {
        if !real_ip.trim().is_empty() {
            return real_ip.trim().to_string();
        }
    }
    request
        .peer_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn classify_user_agent(user_agent: Option<&str>) -> UserAgentType {
    let ua = user_agent.unwrap_or_default().to_ascii_lowercase();
    if ua.contains("curl") {
        UserAgentType::Curl
    } else if ua.contains("postman") || ua.contains("insomnia") {
        UserAgentType::Postman
    } else if ua.contains("bot") || ua.contains("crawler") {
        UserAgentType::Bot
    } else if ua.contains("mobile") || ua.contains("android") || ua.contains("iphone") {
        UserAgentType::Mobile
    } else {
        UserAgentType::Browser
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_format_highest_quality() {
        assert_eq!(
            preferred_format(Some("text/html;q=0.9, application/json")),
            ResponseFormat::Json
        );
        assert_eq!(
            preferred_format(Some("application/json;q=0.2, text/plain;q=0.8")),
            ResponseFormat::Text
        );
    }

    #[test]
    fn test_preferred_format_tie_break() {
        assert_eq!(
            preferred_format(Some("text/html, application/json")),
            ResponseFormat::Json
        );
        assert_eq!(
            preferred_format(Some("text/plain, application/xml")),
            ResponseFormat::Xml
        );
    }

    #[test]
    fn test_preferred_format_defaults_to_html() {
        assert_eq!(preferred_format(None), ResponseFormat::Html);
        assert_eq!(preferred_format(Some("*/*")), ResponseFormat::Html);
        assert_eq!(preferred_format(Some("image/png")), ResponseFormat::Html);
        assert_eq!(
            preferred_format(Some(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            )),
            ResponseFormat::Html
        );
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: std::net::SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let req = HttpRequest::new("GET", "/")
            .with_header("X-Forwarded-For", "203.0.113.5, 10.0.0.1")
            .with_header("X-Real-IP", "198.51.100.7")
            .with_peer_addr(peer);
        assert_eq!(client_ip(&req), "203.0.113.5");

        let req = HttpRequest::new("GET", "/")
            .with_header("X-Real-IP", "198.51.100.7")
            .with_peer_addr(peer);
        assert_eq!(client_ip(&req), "198.51.100.7");

        let req = HttpRequest::new("GET", "/").with_peer_addr(peer);
        assert_eq!(client_ip(&req), "10.0.0.9");

        assert_eq!(client_ip(&HttpRequest::new("GET", "/")), "unknown");
    }

    #[test]
    fn test_user_agent_classification() {
        assert_eq!(classify_user_agent(Some("curl/8.4.0")), UserAgentType::Curl);
        assert_eq!(
            classify_user_agent(Some("PostmanRuntime/7.36")),
            UserAgentType::Postman
        );
        assert_eq!(classify_user_agent(Some("Googlebot/2.1")), UserAgentType::Bot);
        assert_eq!(
            classify_user_agent(Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)")),
            UserAgentType::Mobile
        );
        assert_eq!(classify_user_agent(None), UserAgentType::Browser);
    }

    #[test]
    fn test_analysis_flags() {
        let req = HttpRequest::new("POST", "/api/posts")
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "text/html")
            .with_header("X-Requested-With", "XMLHttpRequest");
        let analysis = RequestAnalysis::analyze(&req);

        assert!(analysis.is_ajax);
        assert!(analysis.wants_json);
        assert!(analysis.wants_html);
        assert_eq!(analysis.content_type, ContentKind::Json);
    }

    #[test]
    fn test_static_paths_skip_analysis() {
        let req = HttpRequest::new("GET", "/static/app.js")
            .with_header("Accept", "application/json")
            .with_header("X-Requested-With", "XMLHttpRequest");
        let analysis = RequestAnalysis::analyze(&req);

        assert!(analysis.is_static());
        assert!(!analysis.is_ajax);
        assert!(!analysis.wants_json);
    }
}
