//! The request/response pipeline shared by every upstream operation.
//!
//! build → throttle → trace start → send → read → classify → decode → trace end.
//! Nothing here retries; one call attempt yields one outcome.

use crate::{
    context::CallContext,
    normalize::Payload,
    throttle::Throttle,
    trace::{TraceSink, TraceSpan, Tracer},
    transport::Transport,
};
use reqwest::{
    Method, Url,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use wolt_types::{AuthContext, Endpoints, Result, UpstreamCause, UpstreamError, WoltError};

/// Web client version reported to the upstream.
pub const CLIENT_VERSION: &str = "1.16.41";

/// Platform name reported to the upstream.
pub const PLATFORM: &str = "Web";

/// Fixed session marker sent with every call.
pub const SESSION_ID: &str = "wolt-cli";

/// Default `app-language` value.
pub const DEFAULT_LOCALE: &str = "en";

/// Default spacing between outbound calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(300);

/// Default overall timeout of the built-in HTTP client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const HEADER_PLATFORM: &str = "platform";
const HEADER_CLIENT_VERSION: &str = "client-version";
const HEADER_CLIENT_VERSION_NUMBER: &str = "clientversionnumber";
const HEADER_SESSION_ID: &str = "w-wolt-session-id";
const HEADER_LANGUAGE: &str = "app-language";
const HEADER_WEB_CLIENT_ID: &str = "x-wolt-web-clientid";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Encoded request body.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Vec<u8>),
    Form(String),
}

impl RequestBody {
    fn len(&self) -> usize {
        match self {
            Self::Json(b) => b.len(),
            Self::Form(s) => s.len(),
        }
    }
}

/// One upstream call before headers, auth and throttling are applied.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    headers: Vec<(String, String)>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a query parameter; parameters keep insertion order.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Serializes `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Serialization`]; nothing has been sent.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Uses an already url-encoded form body.
    #[must_use]
    pub fn form(mut self, encoded: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Form(encoded.into()));
        self
    }

    /// Adds a header. Identification and auth headers are applied afterwards
    /// and cannot be replaced this way.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Client for the upstream consumer API.
///
/// Cheap to share behind an `Arc`; all per-call state lives on the stack of
/// the calling task. The throttle and the trace sink are the only shared
/// mutable state.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    locale: String,
    web_client_id: String,
    throttle: Throttle,
    tracer: Tracer,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("endpoints", &self.endpoints)
            .field("locale", &self.locale)
            .field("web_client_id", &self.web_client_id)
            .field("throttle", &self.throttle)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Gateway with production endpoints and default settings.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Config`] if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Random identifier generated once per gateway.
    #[must_use]
    pub fn web_client_id(&self) -> &str {
        &self.web_client_id
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.throttle.interval()
    }

    /// Installs or removes the trace sink; may be called at any time.
    pub fn set_trace_sink(&self, sink: Option<Arc<dyn TraceSink>>) {
        self.tracer.set_sink(sink);
    }

    /// Resolves `segments` under `base`, percent-encoding each segment.
    /// An empty trailing segment yields a trailing slash.
    pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| WoltError::Request(format!("invalid base url {base:?}: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| WoltError::Request(format!("base url cannot carry a path: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Runs one upstream call end-to-end and decodes the JSON object body.
    ///
    /// # Errors
    ///
    /// - [`WoltError::Request`] if headers are invalid (never sent).
    /// - [`WoltError::Context`] if `ctx` finishes before a throttle slot frees up.
    /// - [`WoltError::Upstream`] for transport, read, HTTP-status and decode failures.
    pub async fn execute(
        &self,
        ctx: &CallContext,
        request: ApiRequest,
        auth: Option<&AuthContext>,
    ) -> Result<Payload> {
        let (request, body_len) = self.build_request(request, auth)?;

        self.throttle.acquire(ctx).await?;

        let method = request.method().to_string();
        let url = request.url().to_string();
        tracing::debug!(%method, %url, body_len, "sending upstream request");
        let span = self.tracer.start(&method, &url, body_len);

        let response = match ctx.run(self.transport.execute(request)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                let cause = UpstreamCause::Transport(Box::new(e));
                return Err(fail(span, UpstreamError::new(method, url, 0, "", Some(cause))));
            }
            Err(e) => {
                let cause = UpstreamCause::Context(e);
                return Err(fail(span, UpstreamError::new(method, url, 0, "", Some(cause))));
            }
        };

        let status = response.status().as_u16();
        let bytes = match ctx.run(response.bytes()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                let cause = UpstreamCause::Read(Box::new(e));
                return Err(fail(span, UpstreamError::new(method, url, status, "", Some(cause))));
            }
            Err(e) => {
                let cause = UpstreamCause::Context(e);
                return Err(fail(span, UpstreamError::new(method, url, status, "", Some(cause))));
            }
        };
        span.response(status, bytes.len());

        if !(200..300).contains(&status) {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            let err = UpstreamError::new(method, url, status, body, None);
            tracing::warn!(status, error = %err, "upstream returned non-success status");
            return Err(err.into());
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::new());
        }

        serde_json::from_slice::<Payload>(&bytes).map_err(|e| {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            let err = UpstreamError::new(method, url, status, body, Some(UpstreamCause::Decode(e)));
            tracing::warn!(error = %err, "upstream body is not a JSON object");
            err.into()
        })
    }

    fn build_request(
        &self,
        request: ApiRequest,
        auth: Option<&AuthContext>,
    ) -> Result<(reqwest::Request, Option<usize>)> {
        let ApiRequest {
            method,
            mut url,
            query,
            body,
            headers: extra,
        } = request;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &query {
                pairs.append_pair(k, v);
            }
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &extra {
            headers.append(header_name(name)?, header_value(name, value)?);
        }

        if let Some(body) = &body {
            let content_type = match body {
                RequestBody::Json(_) => CONTENT_TYPE_JSON,
                RequestBody::Form(_) => CONTENT_TYPE_FORM,
            };
            headers
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(content_type));
        }
        headers
            .entry(header::ACCEPT)
            .or_insert(HeaderValue::from_static(CONTENT_TYPE_JSON));
        headers.entry(header::USER_AGENT).or_insert(HeaderValue::from_static(concat!(
            "wolt-cli/",
            env!("CARGO_PKG_VERSION")
        )));

        self.apply_identity(&mut headers)?;
        if let Some(auth) = auth {
            apply_auth(&mut headers, auth)?;
        }

        let body_len = body.as_ref().map(RequestBody::len);
        let mut req = reqwest::Request::new(method, url);
        *req.headers_mut() = headers;
        if let Some(body) = body {
            *req.body_mut() = Some(match body {
                RequestBody::Json(bytes) => reqwest::Body::from(bytes),
                RequestBody::Form(s) => reqwest::Body::from(s),
            });
        }
        Ok((req, body_len))
    }

    fn apply_identity(&self, headers: &mut HeaderMap) -> Result<()> {
        let pairs: [(&'static str, &str); 6] = [
            (HEADER_PLATFORM, PLATFORM),
            (HEADER_CLIENT_VERSION, CLIENT_VERSION),
            (HEADER_CLIENT_VERSION_NUMBER, CLIENT_VERSION),
            (HEADER_SESSION_ID, SESSION_ID),
            (HEADER_LANGUAGE, self.locale.as_str()),
            (HEADER_WEB_CLIENT_ID, self.web_client_id.as_str()),
        ];
        for (name, value) in pairs {
            headers.insert(HeaderName::from_static(name), header_value(name, value)?);
        }
        Ok(())
    }
}

fn apply_auth(headers: &mut HeaderMap, auth: &AuthContext) -> Result<()> {
    if let Some(bearer) = auth.authorization_header() {
        let mut value = header_value("authorization", &bearer)?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }
    if let Some(cookie) = auth.cookie_header() {
        let mut value = header_value("cookie", &cookie)?;
        value.set_sensitive(true);
        headers.insert(header::COOKIE, value);
    }
    Ok(())
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| WoltError::Request(format!("invalid header name {name:?}: {e}")))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| WoltError::Request(format!("invalid value for header {name:?}: {e}")))
}

fn fail(span: TraceSpan<'_>, err: UpstreamError) -> WoltError {
    // The span line already names method and URL.
    match &err.cause {
        Some(cause) => span.failure(cause),
        None => span.failure(&err),
    }
    tracing::warn!(error = %err, "upstream request failed");
    err.into()
}

/// Builder for [`Gateway`]; every option is independent and optional.
#[derive(Default)]
pub struct GatewayBuilder {
    transport: Option<Arc<dyn Transport>>,
    endpoints: Option<Endpoints>,
    locale: Option<String>,
    min_interval: Option<Duration>,
    timeout: Option<Duration>,
    trace_sink: Option<Arc<dyn TraceSink>>,
}

impl GatewayBuilder {
    /// Replaces the HTTP transport (defaults to a `reqwest::Client`).
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides endpoint base URLs; blank fields keep the defaults.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Sets the `app-language` header value; blank keeps the default.
    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Minimum spacing between calls; zero disables throttling.
    #[must_use]
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Signed variant of [`min_interval`](Self::min_interval); negative values clamp to zero.
    #[must_use]
    pub fn min_interval_millis(self, millis: i64) -> Self {
        self.min_interval(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }

    /// Overall timeout of the built-in HTTP client. Ignored with a custom transport.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// # Errors
    ///
    /// Returns [`WoltError::Config`] if the default HTTP client cannot be built.
    pub fn build(self) -> Result<Gateway> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                reqwest::Client::builder()
                    .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                    .build()
                    .map_err(|e| WoltError::Config(format!("http client: {e}")))?,
            ),
        };
        let endpoints = match &self.endpoints {
            Some(over) => Endpoints::default().merged(over),
            None => Endpoints::default(),
        };
        let locale = self
            .locale
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        let tracer = Tracer::default();
        tracer.set_sink(self.trace_sink);

        Ok(Gateway {
            transport,
            endpoints,
            locale,
            web_client_id: uuid::Uuid::new_v4().to_string(),
            throttle: Throttle::new(self.min_interval.unwrap_or(DEFAULT_MIN_INTERVAL)),
            tracer,
        })
    }
}
