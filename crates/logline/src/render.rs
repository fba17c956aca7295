//! Program interpreter.
//!
//! Rendering never fails. Each field asks the provider for its value; a
//! missing value is replaced by the empty placeholder. The delimiter is
//! written after every instruction, the last one included.

use std::borrow::Cow;
use std::fmt::Write;

use crate::program::{HttpSource, Instruction, MiddlewareStage, Op, Program};
use crate::provider::Provider;

/// Renders `program` against `provider` into a new string.
///
/// # Example
///
/// ```
/// use std::borrow::Cow;
/// use logline::{compile, render, IntMetric, Provider, StrMetric};
///
/// struct Fixed;
///
/// impl Provider for Fixed {
///     fn format_start_time(&self, _pattern: &str) -> String {
///         String::new()
///     }
///     fn int_metric(&self, metric: IntMetric) -> Option<i64> {
///         (metric == IntMetric::BytesSent).then_some(512)
///     }
///     fn str_metric(&self, _metric: StrMetric) -> Option<Cow<'_, str>> {
///         None
///     }
/// }
///
/// let program = compile("sent=%BYTES_SENT% host=%UPSTREAM_HOST%").unwrap();
/// assert_eq!(render(&program, &Fixed, "-", ""), "sent=512 host=-");
/// assert_eq!(render(&program, &Fixed, "-", "|"), "sent=|512| host=|-|");
/// ```
pub fn render<P>(
    program: &Program,
    provider: &P,
    empty_placeholder: &str,
    delimiter: &str,
) -> String
where
    P: Provider + ?Sized,
{
    let mut out = String::with_capacity(program.raw().len() + 64);
    render_into(&mut out, program, provider, empty_placeholder, delimiter);
    out
}

/// Renders `program` onto the end of `out`, reusing its allocation.
pub fn render_into<P>(
    out: &mut String,
    program: &Program,
    provider: &P,
    empty_placeholder: &str,
    delimiter: &str,
) where
    P: Provider + ?Sized,
{
    for instruction in program.instructions() {
        execute(out, instruction, provider, empty_placeholder);
        out.push_str(delimiter);
    }
}

fn execute<P>(out: &mut String, instruction: &Instruction, provider: &P, placeholder: &str)
where
    P: Provider + ?Sized,
{
    let limit = instruction.truncate;
    let value = match &instruction.op {
        Op::Text(text) => {
            out.push_str(text);
            return;
        }
        Op::Int(metric) => match provider.int_metric(*metric) {
            Some(value) => {
                let start = out.len();
                // Writing to a `String` cannot fail.
                let _ = write!(out, "{}", value);
                truncate_from(out, start, limit);
                return;
            }
            None => None,
        },
        Op::StartTime(pattern) => Some(Cow::Owned(provider.format_start_time(pattern))),
        Op::Str(metric) => provider.str_metric(*metric),
        Op::Flag(flag) => provider.flag(*flag).map(flag_text),
        Op::Header(HttpSource::Request, selector) => provider.request_header(selector),
        Op::Header(HttpSource::Response, selector) => provider.response_header(selector),
        Op::Trailer(selector) => provider.response_trailer(selector),
        Op::Body(HttpSource::Request, selector) => provider.request_body(selector),
        Op::Body(HttpSource::Response, selector) => provider.response_body(selector),
        Op::Uri(selector) => provider.uri(selector),
        Op::RouterInfo(selector) => provider.router_info(selector),
        Op::Middleware(MiddlewareStage::Request, selector) => provider.request_middleware(selector),
        Op::Middleware(MiddlewareStage::Response, selector) => {
            provider.response_middleware(selector)
        }
        Op::Middleware(MiddlewareStage::App, selector) => provider.app_middleware(selector),
    };
    push_str(out, value, placeholder, limit);
}

fn flag_text(on: bool) -> Cow<'static, str> {
    Cow::Borrowed(if on { "true" } else { "false" })
}

fn push_str(
    out: &mut String,
    value: Option<Cow<'_, str>>,
    placeholder: &str,
    limit: Option<usize>,
) {
    match value {
        Some(value) => out.push_str(truncated(&value, limit)),
        None => out.push_str(placeholder),
    }
}

/// The first `limit` characters of `value`.
fn truncated(value: &str, limit: Option<usize>) -> &str {
    match limit.and_then(|limit| value.char_indices().nth(limit)) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Applies `limit` to whatever was written to `out` after `start`.
fn truncate_from(out: &mut String, start: usize, limit: Option<usize>) {
    let keep = truncated(&out[start..], limit).len();
    out.truncate(start + keep);
}
