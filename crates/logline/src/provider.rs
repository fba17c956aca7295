//! The data-provider contract.
//!
//! The renderer knows nothing about requests, sessions or clocks. Every value
//! it emits comes from a [`Provider`] that the host implements over whatever
//! it is logging. A `None` return means "not available" and renders as the
//! empty placeholder.

use std::borrow::Cow;

use crate::fields::{
    FieldSelector, FlagField, HttpField, IntMetric, MiddlewareField, StrMetric, UriField, Verbatim,
};

/// Per-request data access for the renderer.
///
/// There is one method per field category. Selector-based methods receive the
/// selector exactly as compiled; reconciling `primary` and `fallback` is up to
/// the implementation ([`FieldSelector::first_match`] covers the usual policy).
///
/// Only the time and metric accessors are required. The selector categories
/// default to "not available", so a host can start small.
///
/// A provider is called from a single render at a time. Sharing one instance
/// across threads requires it to be `Sync`, which the compiler enforces.
///
/// # Example
///
/// ```
/// use std::borrow::Cow;
/// use logline::{compile, render, FieldSelector, HttpField, IntMetric, Provider, StrMetric};
///
/// struct Request {
///     status: u16,
///     request_id: Option<String>,
/// }
///
/// impl Provider for Request {
///     fn format_start_time(&self, _pattern: &str) -> String {
///         "2024-01-01T00:00:00Z".to_string()
///     }
///
///     fn int_metric(&self, metric: IntMetric) -> Option<i64> {
///         match metric {
///             IntMetric::ResponseCode => Some(self.status as i64),
///             _ => None,
///         }
///     }
///
///     fn str_metric(&self, _metric: StrMetric) -> Option<Cow<'_, str>> {
///         None
///     }
///
///     fn request_header(&self, selector: &FieldSelector<HttpField>) -> Option<Cow<'_, str>> {
///         selector.first_match(|field| match field.name() {
///             "X-Request-Id" => self.request_id.as_deref().map(Cow::Borrowed),
///             _ => None,
///         })
///     }
/// }
///
/// let program = compile("%RESPONSE_CODE% %REQ(X-Request-Id)%").unwrap();
/// let request = Request { status: 200, request_id: None };
/// assert_eq!(render(&program, &request, "-", ""), "200 -");
/// ```
pub trait Provider {
    /// Formats the request start time. The pattern is passed through
    /// uninterpreted; an empty pattern asks for the default format.
    fn format_start_time(&self, pattern: &str) -> String;

    fn int_metric(&self, metric: IntMetric) -> Option<i64>;

    fn str_metric(&self, metric: StrMetric) -> Option<Cow<'_, str>>;

    fn flag(&self, _flag: FlagField) -> Option<bool> {
        None
    }

    fn request_header(&self, _selector: &FieldSelector<HttpField>) -> Option<Cow<'_, str>> {
        None
    }

    fn response_header(&self, _selector: &FieldSelector<HttpField>) -> Option<Cow<'_, str>> {
        None
    }

    fn response_trailer(&self, _selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        None
    }

    fn request_body(&self, _selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        None
    }

    fn response_body(&self, _selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        None
    }

    fn uri(&self, _selector: &FieldSelector<UriField>) -> Option<Cow<'_, str>> {
        None
    }

    fn router_info(&self, _selector: &FieldSelector<Verbatim>) -> Option<Cow<'_, str>> {
        None
    }

    fn request_middleware(
        &self,
        _selector: &FieldSelector<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        None
    }

    fn response_middleware(
        &self,
        _selector: &FieldSelector<MiddlewareField>,
    ) -> Option<Cow<'_, str>> {
        None
    }

    fn app_middleware(&self, _selector: &FieldSelector<MiddlewareField>) -> Option<Cow<'_, str>> {
        None
    }
}
