//! The top-level command table and its arity rules.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::fields::{FlagField, IntMetric, StrMetric};
use crate::program::{HttpSource, MiddlewareStage};

/// Whether a command accepts a parenthesized parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `%NAME%` only.
    None,
    /// `%NAME(PARAM)%` only.
    Required,
    /// Either form.
    Optional,
}

/// A recognized top-level field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    StartTime,
    Int(IntMetric),
    Str(StrMetric),
    Flag(FlagField),
    Header(HttpSource),
    Trailer,
    Body(HttpSource),
    Uri,
    RouterInfo,
    Middleware(MiddlewareStage),
}

static COMMANDS: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("START_TIME", Command::StartTime);
    for metric in IntMetric::ALL {
        table.insert(metric.name(), Command::Int(*metric));
    }
    for metric in StrMetric::ALL {
        table.insert(metric.name(), Command::Str(*metric));
    }
    for flag in FlagField::ALL {
        table.insert(flag.name(), Command::Flag(*flag));
    }
    table.insert("REQ", Command::Header(HttpSource::Request));
    table.insert("RESP", Command::Header(HttpSource::Response));
    table.insert("TRAILER", Command::Trailer);
    table.insert("REQ_BODY", Command::Body(HttpSource::Request));
    table.insert("RESP_BODY", Command::Body(HttpSource::Response));
    table.insert("URI", Command::Uri);
    table.insert("ROUTER_INFO", Command::RouterInfo);
    table.insert(
        "REQ_MIDDLEWARE",
        Command::Middleware(MiddlewareStage::Request),
    );
    table.insert(
        "RESP_MIDDLEWARE",
        Command::Middleware(MiddlewareStage::Response),
    );
    table.insert("APP_MIDDLEWARE", Command::Middleware(MiddlewareStage::App));
    table
});

impl Command {
    /// Looks up a field name. Names are case-sensitive.
    pub fn lookup(name: &str) -> Option<Command> {
        COMMANDS.get(name).copied()
    }

    /// Every recognized command name, sorted.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = COMMANDS.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// The name this command is spelled with in format strings.
    pub fn name(self) -> &'static str {
        match self {
            Command::StartTime => "START_TIME",
            Command::Int(metric) => metric.name(),
            Command::Str(metric) => metric.name(),
            Command::Flag(flag) => flag.name(),
            Command::Header(HttpSource::Request) => "REQ",
            Command::Header(HttpSource::Response) => "RESP",
            Command::Trailer => "TRAILER",
            Command::Body(HttpSource::Request) => "REQ_BODY",
            Command::Body(HttpSource::Response) => "RESP_BODY",
            Command::Uri => "URI",
            Command::RouterInfo => "ROUTER_INFO",
            Command::Middleware(MiddlewareStage::Request) => "REQ_MIDDLEWARE",
            Command::Middleware(MiddlewareStage::Response) => "RESP_MIDDLEWARE",
            Command::Middleware(MiddlewareStage::App) => "APP_MIDDLEWARE",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Command::StartTime => Arity::Optional,
            Command::Int(_) | Command::Str(_) | Command::Flag(_) => Arity::None,
            Command::Header(_)
            | Command::Trailer
            | Command::Body(_)
            | Command::Uri
            | Command::RouterInfo
            | Command::Middleware(_) => Arity::Required,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
