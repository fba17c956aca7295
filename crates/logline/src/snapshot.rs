//! An owned, serializable [`Provider`].
//!
//! [`Snapshot`] captures everything a format can ask about one exchange in
//! plain data. Hosts that already have their request state in memory should
//! implement [`Provider`] directly; a snapshot is for previewing formats,
//! replaying captured traffic and tests.
//!
//! Selectors are reconciled "primary, else fallback".
//!
//! ```
//! use logline::{compile, render, Snapshot};
//!
//! let snapshot: Snapshot = serde_json::from_str(r#"{
//!     "ints": {"RESPONSE_CODE": 201},
//!     "request": {"method": "POST", "headers": {"X-Request-Id": "abc"}}
//! }"#).unwrap();
//!
//! let program = compile("%REQ(:method)% %RESPONSE_CODE% %REQ(x-request-id)%").unwrap();
//! assert_eq!(render(&program, &snapshot, "-", ""), "POST 201 abc");
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{
    FieldRef, FieldSelector, FlagField, HttpField, IntMetric, MiddlewareField, StrMetric, UriField,
    Verbatim,
};
use crate::program::MiddlewareStage;
use crate::provider::Provider;

/// Everything known about one request/response exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Snapshot {
    pub start_time: Option<DateTime<Utc>>,
    /// Integer metrics keyed by template name, e.g. `"BYTES_SENT"`.
    pub ints: BTreeMap<IntMetric, i64>,
    /// String metrics keyed by template name, e.g. `"UPSTREAM_HOST"`.
    pub strings: BTreeMap<StrMetric, String>,
    pub flags: BTreeMap<FlagField, bool>,
    pub request: HttpSnapshot,
    pub response: HttpSnapshot,
    pub uri: UriSnapshot,
    pub router_info: BTreeMap<String, String>,
    pub middleware: MiddlewareSnapshot,
}

/// One side of an HTTP exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSnapshot {
    pub method: Option<String>,
    pub status: Option<u16>,
    pub protocol: Option<String>,
    pub tls_cipher: Option<String>,
    pub tls_version: Option<String>,
    pub path: Option<String>,
    pub authority: Option<String>,
    /// Header names are matched case-insensitively.
    pub headers: BTreeMap<String, String>,
    pub trailers: BTreeMap<String, String>,
    /// Decoded body, addressed with dotted paths such as `user.id` or `items.0`.
    pub body: Option<serde_json::Value>,
}

/// Components of the request URI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UriSnapshot {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub raw_path: Option<String>,
    pub raw_query: Option<String>,
    pub fragment: Option<String>,
    /// Query parameters; custom URI names look these up.
    pub query: BTreeMap<String, String>,
}

/// The middleware chains that handled the exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiddlewareSnapshot {
    pub request: MiddlewareChain,
    pub response: MiddlewareChain,
    pub app: MiddlewareChain,
    pub request_name: Option<String>,
    pub response_name: Option<String>,
    pub app_name: Option<String>,
}

/// One middleware chain: the names in execution order plus free-form attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiddlewareChain {
    pub names: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

/// Parses a JSON document holding one snapshot object or an array of them.
pub fn parse_snapshots(source: &str) -> serde_json::Result<Vec<Snapshot>> {
    match serde_json::from_str(source)? {
        serde_json::Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

fn borrowed(value: &Option<String>) -> Option<Cow<'_, str>> {
    value.as_deref().map(Cow::Borrowed)
}

fn entry(value: Option<&String>) -> Option<Cow<'_, str>> {
    value.map(|v| Cow::Borrowed(v.as_str()))
}

fn lookup_ignore_case<'a>(map: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    map.get(name).map(String::as_str).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    })
}

/// Resolves a dotted path in a JSON value.
fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(part)?,
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl HttpSnapshot {
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(&self.headers, name)
    }

    pub fn trailer(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(&self.trailers, name)
    }

    fn field(&self, field: &FieldRef<HttpField>) -> Option<Cow<'_, str>> {
        let header = |name: &str| self.header(name).map(Cow::Borrowed);
        match field {
            FieldRef::WellKnown(HttpField::Method) => borrowed(&self.method),
            FieldRef::WellKnown(HttpField::Status) => {
                self.status.map(|status| Cow::Owned(status.to_string()))
            }
            FieldRef::WellKnown(HttpField::Protocol) => borrowed(&self.protocol),
            FieldRef::WellKnown(HttpField::TlsCipher) => borrowed(&self.tls_cipher),
            FieldRef::WellKnown(HttpField::TlsVersion) => borrowed(&self.tls_version),
            FieldRef::WellKnown(HttpField::Path) => borrowed(&self.path),
            FieldRef::WellKnown(HttpField::Authority) => {
                borrowed(&self.authority).or_else(|| header("host"))
            }
            FieldRef::WellKnown(HttpField::Host) => {
                header("host").or_else(|| borrowed(&self.authority))
            }
            FieldRef::WellKnown(HttpField::UserAgent) => header("user-agent"),
            FieldRef::WellKnown(HttpField::Cookie) => header("cookie"),
            FieldRef::Custom(name) => header(name),
        }
    }

    /// A body field as text. Strings are emitted bare, other values as JSON;
    /// `null` counts as missing.
    fn body_field(&self, path: &str) -> Option<Cow<'_, str>> {
        match resolve_path(self.body.as_ref()?, path)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(Cow::Borrowed(text.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

impl UriSnapshot {
    fn field(&self, field: &FieldRef<UriField>) -> Option<Cow<'_, str>> {
        match field {
            FieldRef::WellKnown(UriField::Scheme) => borrowed(&self.scheme),
            FieldRef::WellKnown(UriField::User) => borrowed(&self.user),
            FieldRef::WellKnown(UriField::Password) => borrowed(&self.password),
            FieldRef::WellKnown(UriField::Host) => borrowed(&self.host),
            FieldRef::WellKnown(UriField::Path) => borrowed(&self.path),
            FieldRef::WellKnown(UriField::RawPath) => borrowed(&self.raw_path),
            FieldRef::WellKnown(UriField::RawQuery) => borrowed(&self.raw_query),
            FieldRef::WellKnown(UriField::Fragment) => borrowed(&self.fragment),
            FieldRef::Custom(name) => entry(self.query.get(name.as_str())),
        }
    }
}

impl MiddlewareSnapshot {
    pub fn chain(&self, stage: MiddlewareStage) -> &MiddlewareChain {
        match stage {
            MiddlewareStage::Request => &self.request,
            MiddlewareStage::Response => &self.response,
            MiddlewareStage::App => &self.app,
        }
    }

    fn field(
        &self,
        stage: MiddlewareStage,
        field: &FieldRef<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        match field {
            FieldRef::WellKnown(MiddlewareField::FirstRequest) => entry(self.request.names.first()),
            FieldRef::WellKnown(MiddlewareField::LastRequest) => entry(self.request.names.last()),
            FieldRef::WellKnown(MiddlewareField::FirstResponse) => {
                entry(self.response.names.first())
            }
            FieldRef::WellKnown(MiddlewareField::LastResponse) => entry(self.response.names.last()),
            FieldRef::WellKnown(MiddlewareField::Count) => {
                Some(Cow::Owned(self.chain(stage).names.len().to_string()))
            }
            FieldRef::WellKnown(MiddlewareField::RequestName) => borrowed(&self.request_name),
            FieldRef::WellKnown(MiddlewareField::ResponseName) => borrowed(&self.response_name),
            FieldRef::WellKnown(MiddlewareField::AppName) => borrowed(&self.app_name),
            FieldRef::Custom(key) => entry(self.chain(stage).attributes.get(key.as_str())),
        }
    }
}

impl Snapshot {
    fn verbatim<'a>(
        map: &'a BTreeMap<String, String>,
        selector: &FieldSelector<Verbatim>,
    ) -> Option<Cow<'a, str>> {
        selector.first_match(|field| entry(map.get(field.name())))
    }

    fn middleware_field(
        &self,
        stage: MiddlewareStage,
        selector: &FieldSelector<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.middleware.field(stage, field))
    }
}

impl Provider for Snapshot {
    /// Named patterns, matched ignoring ASCII case: empty or `RFC3339`
    /// (milliseconds, UTC), `RFC2822`, `CLF` (common log format), `DATE`,
    /// `UNIX`, `UNIX_MS`. A pattern containing `$` is a strftime layout
    /// spelled with `$` for `%` (`$Y-$m-$d`). Anything else, including an
    /// invalid layout, renders as RFC 3339. Without a start time the result
    /// is empty.
    fn format_start_time(&self, pattern: &str) -> String {
        let Some(start) = self.start_time else {
            return String::new();
        };
        let rfc3339 = || start.to_rfc3339_opts(SecondsFormat::Millis, true);
        match pattern.to_ascii_uppercase().as_str() {
            "" | "RFC3339" => rfc3339(),
            "RFC2822" => start.to_rfc2822(),
            "CLF" => start.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            "DATE" => start.format("%Y-%m-%d").to_string(),
            "UNIX" => start.timestamp().to_string(),
            "UNIX_MS" => start.timestamp_millis().to_string(),
            _ if pattern.contains('$') => {
                let layout = pattern.replace('$', "%");
                let mut out = String::new();
                match write!(out, "{}", start.format(&layout)) {
                    Ok(()) => out,
                    Err(_) => rfc3339(),
                }
            }
            _ => rfc3339(),
        }
    }

    fn int_metric(&self, metric: IntMetric) -> Option<i64> {
        match (self.ints.get(&metric), metric) {
            (Some(value), _) => Some(*value),
            (None, IntMetric::ResponseCode) => self.response.status.map(i64::from),
            (None, _) => None,
        }
    }

    fn str_metric(&self, metric: StrMetric) -> Option<Cow<'_, str>> {
        entry(self.strings.get(&metric))
    }

    fn flag(&self, flag: FlagField) -> Option<bool> {
        self.flags.get(&flag).copied()
    }

    fn request_header(&self, selector: &FieldSelector<HttpField>) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.request.field(field))
    }

    fn response_header(&self, selector: &FieldSelector<HttpField>) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.response.field(field))
    }

    fn response_trailer(&self, selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        let response = &self.response;
        selector.first_match(|field| response.trailer(field.name()).map(Cow::Borrowed))
    }

    fn request_body(&self, selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.request.body_field(field.name()))
    }

    fn response_body(&self, selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.response.body_field(field.name()))
    }

    fn uri(&self, selector: &FieldSelector<UriField>) -> Option<Cow<'_, str>> {
        selector.first_match(|field| self.uri.field(field))
    }

    fn router_info(&self, selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        Snapshot::verbatim(&self.router_info, selector)
    }

    fn request_middleware(
        &self,
        selector: &FieldSelector<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        self.middleware_field(MiddlewareStage::Request, selector)
    }

    fn response_middleware(
        &self,
        selector: &FieldSelector<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        self.middleware_field(MiddlewareStage::Response, selector)
    }

    fn app_middleware(&self, selector: &FieldSelector<MiddlewareField>) -> Option<Cow<'_, str>> {
        self.middleware_field(MiddlewareStage::App, selector)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{compile, render};

    fn sample() -> Snapshot {
        serde_json::from_value(json!({
            "start_time": "2024-03-09T14:05:07.250Z",
            "ints": {"BYTES_SENT": 1024, "DURATION": 12},
            "strings": {"UPSTREAM_HOST": "10.0.0.7:8080"},
            "flags": {"DOWNSTREAM_TLS": true},
            "request": {
                "method": "GET",
                "path": "/api/items?limit=5",
                "authority": "api.example.com",
                "headers": {"User-Agent": "curl/8.0", "X-Request-Id": "r-1"},
                "body": {"user": {"id": 7, "name": "ana"}, "tags": ["a", "b"], "gone": null}
            },
            "response": {
                "status": 200,
                "headers": {"Content-Type": "application/json"},
                "trailers": {"grpc-status": "0"}
            },
            "uri": {"scheme": "https", "path": "/api/items", "query": {"limit": "5"}},
            "router_info": {"route": "items"},
            "middleware": {
                "request": {"names": ["auth", "ratelimit"], "attributes": {"tenant": "t1"}},
                "response": {"names": ["gzip"]},
                "app_name": "catalog"
            }
        }))
        .unwrap()
    }

    fn run(raw: &str, snapshot: &Snapshot) -> String {
        render(&compile(raw).unwrap(), snapshot, "-", "")
    }

    mod time {
        use super::*;

        #[test]
        fn named_patterns() {
            let snapshot = sample();
            assert_eq!(snapshot.format_start_time(""), "2024-03-09T14:05:07.250Z");
            assert_eq!(snapshot.format_start_time("UNIX"), "1709993107");
            assert_eq!(snapshot.format_start_time("UNIX_MS"), "1709993107250");
            assert_eq!(snapshot.format_start_time("DATE"), "2024-03-09");
            assert_eq!(
                snapshot.format_start_time("CLF"),
                "09/Mar/2024:14:05:07 +0000"
            );
        }

        #[test]
        fn named_patterns_ignore_case() {
            let snapshot = sample();
            assert_eq!(
                snapshot.format_start_time("rfc3339"),
                "2024-03-09T14:05:07.250Z"
            );
            assert_eq!(snapshot.format_start_time("unix"), "1709993107");
            assert_eq!(snapshot.format_start_time("Date"), "2024-03-09");
        }

        #[test]
        fn dollar_layouts() {
            let snapshot = Snapshot {
                start_time: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
                ..Snapshot::default()
            };
            assert_eq!(
                snapshot.format_start_time("$Y-$m-$dT$H:$M"),
                "2024-01-02T03:04"
            );
            assert_eq!(snapshot.format_start_time("$d/$b/$Y"), "02/Jan/2024");
        }

        #[test]
        fn unknown_and_invalid_patterns_use_rfc3339() {
            let snapshot = sample();
            let patterns = [
                "YYYY-MM-DD",
                "2006-01-02T15:04:05Z07:00",
                "epoch",
                "$!",
                "$",
            ];
            for pattern in patterns {
                assert_eq!(
                    snapshot.format_start_time(pattern),
                    "2024-03-09T14:05:07.250Z",
                    "pattern {:?}",
                    pattern
                );
            }
        }

        #[test]
        fn layouts_through_a_template() {
            let program = compile("[%START_TIME($H:$M:$S)%] [%START_TIME(YYYY-MM-DD)%]").unwrap();
            assert_eq!(
                render(&program, &sample(), "-", ""),
                "[14:05:07] [2024-03-09T14:05:07.250Z]"
            );
        }

        #[test]
        fn missing_start_time_is_empty() {
            assert_eq!(Snapshot::default().format_start_time("UNIX"), "");
        }
    }

    mod http {
        use super::*;

        #[test]
        fn well_known_and_custom_headers() {
            let snapshot = sample();
            assert_eq!(
                run(
                    "%REQ(:method)% %REQ(:authority)% %REQ(user-agent)%",
                    &snapshot
                ),
                "GET api.example.com curl/8.0"
            );
            assert_eq!(run("%REQ(x-request-id)%", &snapshot), "r-1");
            assert_eq!(run("%RESP(content-type)%", &snapshot), "application/json");
            assert_eq!(run("%RESP(:status)%", &snapshot), "200");
        }

        #[test]
        fn host_falls_back_to_authority() {
            assert_eq!(run("%REQ(host)%", &sample()), "api.example.com");
        }

        #[test]
        fn selector_fallback() {
            let snapshot = sample();
            assert_eq!(
                run("%REQ(X-Original-Path?:path)%", &snapshot),
                "/api/items?limit=5"
            );
            assert_eq!(run("%REQ(X-Request-Id?:path)%", &snapshot), "r-1");
            assert_eq!(run("%REQ(X-A?X-B)%", &snapshot), "-");
        }

        #[test]
        fn trailers() {
            let snapshot = sample();
            assert_eq!(run("%TRAILER(GRPC-STATUS)%", &snapshot), "0");
            assert_eq!(run("%TRAILER(grpc-message)%", &snapshot), "-");
        }

        #[test]
        fn body_paths() {
            let snapshot = sample();
            assert_eq!(run("%REQ_BODY(user.name)%", &snapshot), "ana");
            assert_eq!(run("%REQ_BODY(user.id)%", &snapshot), "7");
            assert_eq!(run("%REQ_BODY(tags.1)%", &snapshot), "b");
            assert_eq!(run("%REQ_BODY(tags)%", &snapshot), r#"["a","b"]"#);
            assert_eq!(run("%REQ_BODY(gone)%", &snapshot), "-");
            assert_eq!(run("%REQ_BODY(user.email?user.name)%", &snapshot), "ana");
            assert_eq!(run("%RESP_BODY(anything)%", &snapshot), "-");
        }
    }

    mod metrics {
        use super::*;

        #[test]
        fn maps_by_template_name() {
            let snapshot = sample();
            assert_eq!(
                run(
                    "%BYTES_SENT% %DURATION% %UPSTREAM_HOST% %DOWNSTREAM_TLS%",
                    &snapshot
                ),
                "1024 12 10.0.0.7:8080 true"
            );
            assert_eq!(run("%BYTES_RECEIVED% %ROUTE_NAME%", &snapshot), "- -");
        }

        #[test]
        fn response_code_defaults_to_response_status() {
            assert_eq!(run("%RESPONSE_CODE%", &sample()), "200");
            assert_eq!(run("%RESPONSE_CODE%", &Snapshot::default()), "-");
        }
    }

    mod uri_router_middleware {
        use super::*;

        #[test]
        fn uri_components_and_query() {
            let snapshot = sample();
            assert_eq!(
                run("%URI(scheme)%://%URI(path)%", &snapshot),
                "https:///api/items"
            );
            assert_eq!(run("%URI(limit)% %URI(offset)%", &snapshot), "5 -");
            assert_eq!(run("%URI(raw_path?path)%", &snapshot), "/api/items");
        }

        #[test]
        fn router_info() {
            let snapshot = sample();
            assert_eq!(run("%ROUTER_INFO(route)%", &snapshot), "items");
            assert_eq!(run("%ROUTER_INFO(cluster?route)%", &snapshot), "items");
        }

        #[test]
        fn middleware_fields() {
            let snapshot = sample();
            assert_eq!(
                run(
                    "%REQ_MIDDLEWARE(first_request)%,%REQ_MIDDLEWARE(last_request)%,\
                     %RESP_MIDDLEWARE(first_response)%,%APP_MIDDLEWARE(app_name)%",
                    &snapshot
                ),
                "auth,ratelimit,gzip,catalog"
            );
            assert_eq!(run("%REQ_MIDDLEWARE(count)%", &snapshot), "2");
            assert_eq!(run("%RESP_MIDDLEWARE(count)%", &snapshot), "1");
            assert_eq!(run("%APP_MIDDLEWARE(count)%", &snapshot), "0");
            assert_eq!(run("%REQ_MIDDLEWARE(tenant)%", &snapshot), "t1");
            assert_eq!(run("%RESP_MIDDLEWARE(tenant)%", &snapshot), "-");
            assert_eq!(run("%REQ_MIDDLEWARE(request_name)%", &snapshot), "-");
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn single_object_or_array() {
            assert_eq!(parse_snapshots("{}").unwrap().len(), 1);
            assert_eq!(parse_snapshots("[{}, {}, {}]").unwrap().len(), 3);
            assert!(parse_snapshots("42").is_err());
        }

        #[test]
        fn errors_name_the_unknown_key() {
            for source in [r#"[{"reqest": {}}]"#, r#"{"reqest": {}}"#] {
                let err = parse_snapshots(source).unwrap_err().to_string();
                assert!(err.contains("unknown field `reqest`"), "{}", err);
            }
            let err = parse_snapshots(r#"{"request": {"hedaers": {}}}"#).unwrap_err();
            assert!(err.to_string().contains("unknown field `hedaers`"));
        }

        #[test]
        fn unknown_metric_names_are_rejected() {
            let parse = |source: &str| serde_json::from_str::<Snapshot>(source);
            assert!(parse(r#"{"ints": {"BYTES": 1}}"#).is_err());
            assert!(parse(r#"{"unknown": 1}"#).is_err());
        }

        #[test]
        fn serializes_back_to_template_names() {
            let mut snapshot = Snapshot::default();
            snapshot.ints.insert(IntMetric::BytesSent, 3);
            let value = serde_json::to_value(&snapshot).unwrap();
            assert_eq!(value["ints"]["BYTES_SENT"], json!(3));
        }
    }
}
