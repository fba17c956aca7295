//! Compiled programs.
//!
//! A [`Program`] is the immutable output of [`compile`](crate::compile): an
//! ordered list of [`Instruction`]s, each an [`Op`] with an optional length
//! limit. The payload of every instruction is fully determined by its
//! variant, so the renderer never has to guess at types.

use std::fmt;

use serde::Serialize;

use crate::command::Command;
use crate::fields::{
    FieldSelector, FlagField, HttpField, IntMetric, MiddlewareField, StrMetric, UriField, Verbatim,
};

/// Which side of the exchange an HTTP field or body refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpSource {
    Request,
    Response,
}

/// Which middleware chain a middleware field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareStage {
    Request,
    Response,
    App,
}

/// One operation of a compiled program, with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Emit literal text.
    Text(String),
    /// Emit the start time using the given pattern; empty means the provider's default.
    StartTime(String),
    Int(IntMetric),
    Str(StrMetric),
    Flag(FlagField),
    /// A request or response HTTP field (`%REQ(..)%`, `%RESP(..)%`).
    Header(HttpSource, FieldSelector<HttpField>),
    /// A response trailer (`%TRAILER(..)%`).
    Trailer(FieldSelector<Verbatim>),
    /// A field of the request or response body (`%REQ_BODY(..)%`, `%RESP_BODY(..)%`).
    Body(HttpSource, FieldSelector<Verbatim>),
    /// A component of the request URI (`%URI(..)%`).
    Uri(FieldSelector<UriField>),
    /// Routing metadata (`%ROUTER_INFO(..)%`).
    RouterInfo(FieldSelector<Verbatim>),
    /// A property of a middleware chain (`%REQ_MIDDLEWARE(..)%` and friends).
    Middleware(MiddlewareStage, FieldSelector<MiddlewareField>),
}

impl Op {
    /// The command this operation was compiled from. `None` for literal text.
    pub fn command(&self) -> Option<Command> {
        let command = match self {
            Op::Text(_) => return None,
            Op::StartTime(_) => Command::StartTime,
            Op::Int(metric) => Command::Int(*metric),
            Op::Str(metric) => Command::Str(*metric),
            Op::Flag(flag) => Command::Flag(*flag),
            Op::Header(source, _) => Command::Header(*source),
            Op::Trailer(_) => Command::Trailer,
            Op::Body(source, _) => Command::Body(*source),
            Op::Uri(_) => Command::Uri,
            Op::RouterInfo(_) => Command::RouterInfo,
            Op::Middleware(stage, _) => Command::Middleware(*stage),
        };
        Some(command)
    }

    /// The parameter text in canonical form, if the operation has one.
    pub fn parameter(&self) -> Option<String> {
        match self {
            Op::Text(_) | Op::Int(_) | Op::Str(_) | Op::Flag(_) => None,
            Op::StartTime(pattern) if pattern.is_empty() => None,
            Op::StartTime(pattern) => Some(pattern.clone()),
            Op::Header(_, selector) => Some(selector.to_string()),
            Op::Uri(selector) => Some(selector.to_string()),
            Op::Middleware(_, selector) => Some(selector.to_string()),
            Op::Trailer(selector) | Op::Body(_, selector) | Op::RouterInfo(selector) => {
                Some(selector.to_string())
            }
        }
    }
}

/// An operation plus the optional `:N` length limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Instruction {
    pub op: Op,
    /// Maximum number of characters of the rendered value.
    pub truncate: Option<usize>,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction { op, truncate: None }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Instruction::new(Op::Text(text.into()))
    }

    /// Sets the length limit.
    pub fn truncated(mut self, limit: Option<usize>) -> Self {
        self.truncate = limit;
        self
    }
}

impl fmt::Display for Instruction {
    /// Writes the instruction back as format-string text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = match (&self.op, self.op.command()) {
            (Op::Text(text), _) if text.contains('%') => {
                return f.write_str(&text.replace('%', "%%"))
            }
            (Op::Text(text), _) => return f.write_str(text),
            (_, Some(command)) => command,
            (_, None) => return Ok(()),
        };

        write!(f, "%{}", command)?;
        if let Some(param) = self.op.parameter() {
            write!(f, "({})", param)?;
        }
        if let Some(limit) = self.truncate {
            write!(f, ":{}", limit)?;
        }
        f.write_str("%")
    }
}

/// A compiled format string.
///
/// Programs are immutable; share them across threads behind an `Arc`.
/// Replacing a format means compiling a new program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    raw: String,
    instructions: Vec<Instruction>,
}

impl Program {
    pub(crate) fn new(raw: String, instructions: Vec<Instruction>) -> Self {
        Program { raw, instructions }
    }

    /// The format string this program was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    /// Writes the canonical format string, which compiles to an equal program.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            write!(f, "{}", instruction)?;
        }
        Ok(())
    }
}
