//! Field tables: the names a format string may refer to.
//!
//! There are two kinds of tables:
//!
//! - **Metric tables** ([`IntMetric`], [`StrMetric`], [`FlagField`]) feed the
//!   top-level command table. Their names are upper-case and matched exactly.
//! - **Namespaces** ([`HttpField`], [`UriField`], [`MiddlewareField`],
//!   [`Verbatim`]) are consulted *inside* an already recognized field, e.g.
//!   the `:method` in `%REQ(:method)%`. They are total: a name that is not a
//!   member resolves to [`FieldRef::Custom`] and is handed to the provider
//!   as written. Member names are matched ASCII-case-insensitively.
//!
//! All tables are built once from each enum's `ALL` constant and are
//! read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Declares a closed set of named fields.
///
/// Generates the enum, an `ALL` constant in declaration order, `name()`
/// returning the canonical spelling, and `Display`. The serde name of each
/// variant is its canonical spelling, so the enums can key JSON maps using
/// exactly the names that appear in format strings.
macro_rules! field_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $ty:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $name:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        $vis enum $ty {
            $(
                $(#[$vmeta])*
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl $ty {
            /// Every member, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant,)*];

            /// The canonical spelling of this field.
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Implements [`Namespace`] for a table declared with `field_table!`.
macro_rules! namespace {
    ($ty:ident, $kind:literal) => {
        impl Namespace for $ty {
            const KIND: &'static str = $kind;

            fn lookup(name: &str) -> Option<Self> {
                static TABLE: Lazy<HashMap<&'static str, $ty>> =
                    Lazy::new(|| $ty::ALL.iter().map(|field| (field.name(), *field)).collect());

                if name.bytes().any(|b| b.is_ascii_uppercase()) {
                    TABLE.get(name.to_ascii_lowercase().as_str()).copied()
                } else {
                    TABLE.get(name).copied()
                }
            }

            fn name(self) -> &'static str {
                $ty::name(self)
            }
        }
    };
}

field_table! {
    /// Integer-valued fields.
    pub enum IntMetric {
        /// Time from the first request byte to the last request byte, in milliseconds.
        RequestDuration => "REQUEST_DURATION",
        /// Time spent sending the request upstream, in milliseconds.
        RequestTxDuration => "REQUEST_TX_DURATION",
        /// Time from the start of the request to the first response byte, in milliseconds.
        ResponseDuration => "RESPONSE_DURATION",
        /// Time from the first to the last response byte, in milliseconds.
        ResponseTxDuration => "RESPONSE_TX_DURATION",
        /// Total time from start to the last response byte, in milliseconds.
        Duration => "DURATION",
        BytesReceived => "BYTES_RECEIVED",
        BytesSent => "BYTES_SENT",
        RequestHeadersBytes => "REQUEST_HEADERS_BYTES",
        ResponseHeadersBytes => "RESPONSE_HEADERS_BYTES",
        /// HTTP status code sent downstream.
        ResponseCode => "RESPONSE_CODE",
        /// Number of upstream attempts, retries included.
        RequestAttemptCount => "REQUEST_ATTEMPT_COUNT",
    }
}

field_table! {
    /// String-valued fields.
    pub enum StrMetric {
        ConnectionId => "CONNECTION_ID",
        VirtualHost => "VIRTUAL_HOST",
        Host => "HOST",
        Scheme => "SCHEME",
        Protocol => "PROTOCOL",
        DownstreamRemoteAddress => "DOWNSTREAM_REMOTE_ADDRESS",
        DownstreamLocalAddress => "DOWNSTREAM_LOCAL_ADDRESS",
        UpstreamHost => "UPSTREAM_HOST",
        UpstreamCluster => "UPSTREAM_CLUSTER",
        RouteName => "ROUTE_NAME",
        ResponseFlags => "RESPONSE_FLAGS",
    }
}

field_table! {
    /// Boolean toggles, rendered as `true` or `false`.
    pub enum FlagField {
        UpstreamConnectionReused => "UPSTREAM_CONNECTION_REUSED",
        DownstreamTls => "DOWNSTREAM_TLS",
        RequestAborted => "REQUEST_ABORTED",
    }
}

field_table! {
    /// Well-known HTTP message components.
    pub enum HttpField {
        Method => ":method",
        Status => ":status",
        Protocol => ":protocol",
        TlsCipher => ":tls-cipher",
        TlsVersion => ":tls-version",
        Path => ":path",
        Authority => ":authority",
        Host => "host",
        UserAgent => "user-agent",
        Cookie => "cookie",
    }
}

field_table! {
    /// Well-known URI components.
    pub enum UriField {
        Scheme => "scheme",
        User => "user",
        Password => "password",
        Host => "host",
        Path => "path",
        RawPath => "raw_path",
        RawQuery => "raw_query",
        Fragment => "fragment",
    }
}

field_table! {
    /// Well-known middleware chain properties.
    pub enum MiddlewareField {
        FirstRequest => "first_request",
        LastRequest => "last_request",
        FirstResponse => "first_response",
        LastResponse => "last_response",
        Count => "count",
        RequestName => "request_name",
        ResponseName => "response_name",
        AppName => "app_name",
    }
}

field_table! {
    /// A namespace with no members: every name is [`FieldRef::Custom`].
    ///
    /// Used by router info, body fields and trailers, whose names are
    /// entirely host-defined but which still accept `primary?fallback`.
    pub enum Verbatim {}
}

namespace!(HttpField, "HTTP field");
namespace!(UriField, "URI component");
namespace!(MiddlewareField, "middleware field");
namespace!(Verbatim, "name");

/// A name table consulted inside a field's parameter.
pub trait Namespace: Copy + Eq + Hash + fmt::Debug + fmt::Display + 'static {
    /// What a member names, as shown in selector errors.
    const KIND: &'static str;

    /// Finds the member with the given name, ignoring ASCII case.
    fn lookup(name: &str) -> Option<Self>;

    /// The canonical spelling of this member.
    fn name(self) -> &'static str;
}

/// A resolved field name: a namespace member, or a literal custom name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef<N> {
    WellKnown(N),
    Custom(String),
}

impl<N: Namespace> FieldRef<N> {
    /// Resolves `name` against the namespace `N`.
    pub fn resolve(name: &str) -> Self {
        match N::lookup(name) {
            Some(field) => FieldRef::WellKnown(field),
            None => FieldRef::Custom(name.to_string()),
        }
    }

    /// The canonical name for well-known members, the raw text otherwise.
    pub fn name(&self) -> &str {
        match self {
            FieldRef::WellKnown(field) => field.name(),
            FieldRef::Custom(name) => name,
        }
    }

    /// Returns the namespace member, if this is one.
    pub fn well_known(&self) -> Option<N> {
        match self {
            FieldRef::WellKnown(field) => Some(*field),
            FieldRef::Custom(_) => None,
        }
    }

    /// Returns `true` if the name is not a member of the namespace.
    pub fn is_custom(&self) -> bool {
        matches!(self, FieldRef::Custom(_))
    }
}

impl<N: Namespace> fmt::Display for FieldRef<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primary field reference with an optional fallback, from `primary?fallback`.
///
/// The renderer passes selectors to the provider untouched; how the two
/// halves are reconciled is the provider's decision. [`FieldSelector::first_match`]
/// implements the common "primary, else fallback" policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldSelector<N> {
    pub primary: FieldRef<N>,
    pub fallback: Option<FieldRef<N>>,
}

impl<N: Namespace> FieldSelector<N> {
    /// Resolves both halves independently against `N`.
    pub fn resolve(primary: &str, fallback: Option<&str>) -> Self {
        FieldSelector {
            primary: FieldRef::resolve(primary),
            fallback: fallback.map(FieldRef::resolve),
        }
    }

    /// A selector without fallback.
    pub fn single(primary: FieldRef<N>) -> Self {
        FieldSelector {
            primary,
            fallback: None,
        }
    }

    /// Iterates over the primary reference, then the fallback if present.
    pub fn refs(&self) -> impl Iterator<Item = &FieldRef<N>> {
        std::iter::once(&self.primary).chain(self.fallback.as_ref())
    }

    /// Looks up the primary reference, falling back to the fallback reference.
    pub fn first_match<'a, T>(
        &'a self,
        mut lookup: impl FnMut(&'a FieldRef<N>) -> Option<T>,
    ) -> Option<T> {
        lookup(&self.primary).or_else(|| self.fallback.as_ref().and_then(lookup))
    }
}

impl<N: Namespace> fmt::Display for FieldSelector<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(fallback) = &self.fallback {
            write!(f, "?{}", fallback)?;
        }
        Ok(())
    }
}
