//! Plain reqwest-backed engine implementation.
//!
//! Used when the bridge runs standalone (development, tests). It honors the
//! client spec fields a regular HTTP stack can honor (proxy, timeout,
//! HTTP/1 forcing, certificate-verification skipping) and carries the
//! fingerprint options without acting on them, as the bridge contract
//! requires. Redirect following is implemented here so the policy can be
//! chosen per request rather than per client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::CookieStore;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, Proxy};
use tracing::debug;
use url::Url;

use super::{ClientSpec, Cookie, Engine, EngineClient, EngineError, EngineRequest, EngineResponse};
use crate::config::EngineConfig;

pub struct NativeEngine {
    config: EngineConfig,
}

impl NativeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Engine for NativeEngine {
    fn create_client(&self, spec: &ClientSpec) -> Result<Arc<dyn EngineClient>, EngineError> {
        let jar = Arc::new(reqwest::cookie::Jar::default());

        let mut builder = Client::builder()
            .user_agent(&self.config.user_agent)
            .connect_timeout(self.config.connect_timeout())
            .timeout(spec.timeout.unwrap_or_else(|| self.config.request_timeout()))
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(jar.clone());

        if spec.tuning.force_http1 == Some(true) {
            builder = builder.http1_only();
        }

        if spec.tuning.insecure_skip_verify == Some(true) {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(proxy) = spec.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = Proxy::all(proxy)
                .map_err(|e| EngineError::ClientConstruction(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| EngineError::ClientConstruction(e.to_string()))?;

        Ok(Arc::new(NativeClient {
            client,
            jar,
            max_redirects: self.config.max_redirects,
        }))
    }
}

pub struct NativeClient {
    client: Client,
    jar: Arc<reqwest::cookie::Jar>,
    max_redirects: usize,
}

#[async_trait]
impl EngineClient for NativeClient {
    async fn execute(&self, request: EngineRequest) -> Result<Option<EngineResponse>, EngineError> {
        let mut url = request.url.clone();
        let mut method = request.method.clone();
        let mut body = request.body.clone();
        let mut hops = 0usize;

        loop {
            let mut builder = self.client.request(method.clone(), url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(bytes) = &body {
                builder = builder.body(bytes.clone());
            }

            let response = builder.send().await?;

            if request.follow_redirects
                && response.status().is_redirection()
                && hops < self.max_redirects
            {
                if let Some(next) = redirect_target(&url, &response) {
                    debug!(from = %url, to = %next, "following redirect");
                    // 301/302/303 rewrite non-idempotent requests to a bodyless GET
                    if matches!(response.status().as_u16(), 301 | 302 | 303)
                        && method != Method::GET
                        && method != Method::HEAD
                    {
                        method = Method::GET;
                        body = None;
                    }
                    url = next;
                    hops += 1;
                    continue;
                }
            }

            return Ok(Some(convert(response).await?));
        }
    }

    fn set_cookies(&self, url: &Url, cookies: Vec<Cookie>) {
        for cookie in cookies {
            self.jar
                .add_cookie_str(&format!("{}={}", cookie.name, cookie.value), url);
        }
    }

    fn cookies(&self, url: &Url) -> Vec<Cookie> {
        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };
        let Ok(joined) = header.to_str() else {
            return Vec::new();
        };
        joined
            .split("; ")
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                Some(Cookie {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }
}

fn redirect_target(current: &Url, response: &reqwest::Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

async fn convert(response: reqwest::Response) -> Result<EngineResponse, EngineError> {
    let status = response.status().as_u16();
    // http::Version's Debug form is the wire name ("HTTP/1.1", "HTTP/2.0")
    let protocol = format!("{:?}", response.version());
    let url = response.url().clone();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.bytes().await?;

    Ok(EngineResponse {
        status,
        protocol,
        url,
        headers,
        body,
        // reqwest strips Content-Encoding when it decodes, so a surviving
        // header means the body is still compressed
        decompressed: false,
    })
}
