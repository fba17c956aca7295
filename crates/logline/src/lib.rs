//! Logline - access-log format compiler and renderer.
//!
//! A gateway describes its access log with a format string such as
//!
//! ```text
//! [%START_TIME%] "%REQ(:method)% %REQ(X-Original-Path?:path)%" %RESPONSE_CODE% %BYTES_SENT%
//! ```
//!
//! Logline compiles that string once, at configuration time, into a
//! [`Program`]: an immutable list of instructions. Each request then renders
//! the program against a [`Provider`], the host's view of that request.
//!
//! - Compilation is all-or-nothing and reports the offset of the offending field.
//! - Rendering never fails: anything the provider lacks becomes the empty placeholder.
//! - A compiled program is read-only and can be shared between threads.
//!
//! # Quick Start
//!
//! ```rust
//! use std::borrow::Cow;
//! use logline::{compile, render, IntMetric, Provider, StrMetric};
//!
//! struct Exchange {
//!     status: u16,
//!     upstream: Option<String>,
//! }
//!
//! impl Provider for Exchange {
//!     fn format_start_time(&self, _pattern: &str) -> String {
//!         "2024-05-01T10:00:00.000Z".to_string()
//!     }
//!
//!     fn int_metric(&self, metric: IntMetric) -> Option<i64> {
//!         match metric {
//!             IntMetric::ResponseCode => Some(i64::from(self.status)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn str_metric(&self, metric: StrMetric) -> Option<Cow<'_, str>> {
//!         match metric {
//!             StrMetric::UpstreamHost => self.upstream.as_deref().map(Cow::Borrowed),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let program = compile("%START_TIME% %RESPONSE_CODE% %UPSTREAM_HOST% %BYTES_SENT%").unwrap();
//! let line = render(&program, &Exchange { status: 502, upstream: None }, "-", "");
//! assert_eq!(line, "2024-05-01T10:00:00.000Z 502 - -");
//! ```
//!
//! # Format Syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | `text` | copied verbatim |
//! | `%%` | a literal `%` |
//! | `%NAME%` | a field without parameter |
//! | `%NAME(PARAM)%` | a field with parameter, e.g. `%REQ(:method)%` |
//! | `%NAME(a?b)%` | selector: `a`, falling back to `b` |
//! | `%NAME:N%`, `%NAME(PARAM):N%` | value truncated to `N` characters |
//!
//! Field names are case-sensitive. Names inside a parameter are looked up in
//! the field's namespace ([`HttpField`], [`UriField`], [`MiddlewareField`])
//! ignoring ASCII case; anything else is passed to the provider as written.
//!
//! # Delimiters and Records
//!
//! [`render`] writes the delimiter after every instruction. A [`LogRecord`]
//! adds host-supplied appendix lines after the program output, each also
//! followed by the delimiter. [`AccessLogConfig`] bundles the format,
//! placeholder and delimiter and loads them from YAML or JSON.

mod command;
mod config;
mod error;
mod fields;
mod parser;
mod program;
mod provider;
mod record;
mod render;
mod snapshot;

// Re-export public API
pub use command::{Arity, Command};
pub use config::{AccessLog, AccessLogConfig, DEFAULT_EMPTY_PLACEHOLDER, DEFAULT_FORMAT};
pub use error::{CompileError, ConfigError, Result};
pub use fields::{
    FieldRef, FieldSelector, FlagField, HttpField, IntMetric, MiddlewareField, Namespace,
    StrMetric, UriField, Verbatim,
};
pub use parser::compile;
pub use program::{HttpSource, Instruction, MiddlewareStage, Op, Program};
pub use provider::Provider;
pub use record::{render_log, LogRecord};
pub use render::{render, render_into};
pub use snapshot::{
    parse_snapshots, HttpSnapshot, MiddlewareChain, MiddlewareSnapshot, Snapshot, UriSnapshot,
};
