//! Document preparation before the browser loads it.
//!
//! Injects the `@page` rule and an optional `<base href>`. With credentials and
//! a base URL, images served from that origin are fetched with the bearer token
//! and cookies and inlined as data URIs, since a `file://` page cannot attach
//! headers to its own sub-resource requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::{StatusCode, Url};

use super::{RenderError, RenderOptions};
use crate::report::format::escape_html;
use crate::report::models::AuthContext;

lazy_static! {
    static ref IMG_SRC: Regex =
        Regex::new(r#"(<img\b[^>]*?\bsrc=")([^"]+)(")"#).expect("valid img src pattern");
}

pub async fn prepare_document(
    client: &reqwest::Client,
    html: &str,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let base = match options.base_url.as_deref() {
        Some(raw) => Some(
            Url::parse(raw).map_err(|e| RenderError::Asset(format!("invalid base URL '{raw}': {e}")))?,
        ),
        None => None,
    };

    let mut head = format!("<style>{}</style>", options.page_rule());
    if let Some(base) = &base {
        head = format!(r#"<base href="{}">{}"#, escape_html(base.as_str()), head);
    }
    let mut document = inject_into_head(html, &head);

    if let (Some(base), Some(auth)) = (&base, &options.auth) {
        document = inline_authenticated_images(client, &document, base, auth).await?;
    }
    Ok(document)
}

fn inject_into_head(html: &str, fragment: &str) -> String {
    match html.find("<head>") {
        Some(pos) => {
            let at = pos + "<head>".len();
            format!("{}{}{}", &html[..at], fragment, &html[at..])
        }
        None => format!("{fragment}{html}"),
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn cookie_header(cookies: &[(String, String)]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

async fn inline_authenticated_images(
    client: &reqwest::Client,
    html: &str,
    base: &Url,
    auth: &AuthContext,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in IMG_SRC.captures_iter(html) {
        let (Some(whole), Some(src)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let raw_src = src.as_str();
        if raw_src.starts_with("data:") {
            continue;
        }
        let url = match base.join(raw_src) {
            Ok(url) if same_origin(&url, base) => url,
            _ => continue,
        };

        let Some(data_uri) = fetch_as_data_uri(client, &url, auth).await? else {
            continue;
        };

        out.push_str(&html[last..src.start()]);
        out.push_str(&data_uri);
        out.push_str(&html[src.end()..whole.end()]);
        last = whole.end();
    }

    out.push_str(&html[last..]);
    Ok(out)
}

/// `Ok(None)` leaves the original `src` in place for the browser to try.
async fn fetch_as_data_uri(
    client: &reqwest::Client,
    url: &Url,
    auth: &AuthContext,
) -> Result<Option<String>, RenderError> {
    let mut request = client.get(url.clone());
    if let Some(token) = &auth.bearer_token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(cookies) = cookie_header(&auth.cookies) {
        request = request.header(COOKIE, cookies);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Could not fetch asset {}: {}", url, e);
            return Ok(None);
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RenderError::AssetAuth {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        log::warn!("Asset {} answered HTTP {}", url, status);
        return Ok(None);
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(url.path())
                .first_or_octet_stream()
                .to_string()
        });

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RenderError::Asset(format!("reading {url}: {e}")))?;
    log::debug!("Inlined asset {} ({} bytes)", url, bytes.len());
    Ok(Some(format!(
        "data:{};base64,{}",
        content_type,
        STANDARD.encode(&bytes)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_rule_and_base_are_injected() {
        let options = RenderOptions {
            base_url: Some("https://panel.example.com/app/".to_string()),
            ..Default::default()
        };
        let html = "<html><head><title>x</title></head><body></body></html>";
        let doc = prepare_document(&reqwest::Client::new(), html, &options)
            .await
            .unwrap();

        assert!(doc.starts_with(
            r#"<html><head><base href="https://panel.example.com/app/"><style>@page { size: A4 portrait;"#
        ));
        assert!(doc.contains("<title>x</title>"));
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_asset_error() {
        let options = RenderOptions {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let err = prepare_document(&reqwest::Client::new(), "<head></head>", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Asset(_)));
    }

    #[tokio::test]
    async fn test_foreign_and_data_images_are_untouched() {
        let base = Url::parse("https://panel.example.com/").unwrap();
        let html = r#"<img src="data:image/png;base64,AAAA"><img alt="x" src="https://cdn.other.org/logo.png">"#;
        let out = inline_authenticated_images(
            &reqwest::Client::new(),
            html,
            &base,
            &AuthContext::bearer("t"),
        )
        .await
        .unwrap();
        assert_eq!(out, html);
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header(&[]), None);
        let cookies = vec![
            ("session".to_string(), "abc".to_string()),
            ("lang".to_string(), "es".to_string()),
        ];
        assert_eq!(cookie_header(&cookies).as_deref(), Some("session=abc; lang=es"));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://h.example.com/a").unwrap();
        let b = Url::parse("https://h.example.com:443/b/c.png").unwrap();
        let c = Url::parse("http://h.example.com/b").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
    }

    /// Answers a single HTTP request with `response` and returns the raw request.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&buf[..n]).to_lowercase()
        });
        (base, handle)
    }

    fn composed_with_logo() -> String {
        use crate::report::chart::render_charts;
        use crate::report::composer::{compose, ComposeOptions, PANEL_LOGO_PATH};
        use crate::report::fallback::synthetic_report_data;

        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let data = synthetic_report_data(date, 5.0, "offline");
        let options = ComposeOptions {
            logo_src: Some(PANEL_LOGO_PATH.to_string()),
            ..ComposeOptions::default()
        };
        compose(&data, &render_charts(&data), &options)
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn authed_options(base: String) -> RenderOptions {
        let mut auth = AuthContext::bearer("secret-token");
        auth.cookies.push(("session".to_string(), "abc".to_string()));
        RenderOptions {
            base_url: Some(base),
            auth: Some(auth),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_panel_logo_is_fetched_with_credentials_and_inlined() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\nConnection: close\r\n\r\nabcd",
        )
        .await;

        let doc = prepare_document(&local_client(), &composed_with_logo(), &authed_options(base))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("get /assets/logo.png "));
        assert!(request.contains("authorization: bearer secret-token"));
        assert!(request.contains("cookie: session=abc"));
        assert!(doc.contains(r#"<img class="logo" src="data:image/png;base64,YWJjZA==""#));
    }

    #[tokio::test]
    async fn test_rejected_logo_is_an_auth_error() {
        let (base, server) = serve_once(
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = prepare_document(&local_client(), &composed_with_logo(), &authed_options(base))
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, RenderError::AssetAuth { status: 403, .. }));
        let hint = crate::report::ReportError::Render(err).remediation_hint();
        assert!(hint.unwrap().contains("--authToken"));
    }
}
