//! Format string parser.
//!
//! Turns a format string into a [`Program`]. The grammar:
//!
//! - Text outside `%...%` is copied verbatim.
//! - `%%` is a literal `%`.
//! - `%NAME%`, `%NAME(PARAM)%`, `%NAME:N%` and `%NAME(PARAM):N%` are fields.
//!   `PARAM` runs from the first `(` to the first `)`; `N` limits the
//!   rendered value to `N` characters.
//! - Selector parameters may be written `primary?fallback`.
//!
//! Parsing is all-or-nothing: the first error aborts compilation.

use tracing::debug;

use crate::command::{Arity, Command};
use crate::error::{CompileError, Result};
use crate::fields::{FieldSelector, Namespace};
use crate::program::{Instruction, Op, Program};

/// Compiles a format string into a [`Program`].
///
/// # Example
///
/// ```
/// use logline::{compile, Op, IntMetric};
///
/// let program = compile("%RESPONSE_CODE% %REQ(:path)%").unwrap();
/// assert_eq!(program.len(), 3);
/// assert_eq!(program.instructions()[0].op, Op::Int(IntMetric::ResponseCode));
///
/// assert!(compile("%RESPONSE_CODE").is_err());
/// ```
pub fn compile(raw: &str) -> Result<Program> {
    match Parser::new(raw).run() {
        Ok(program) => {
            debug!(
                template_len = raw.len(),
                instructions = program.len(),
                "compiled access log format"
            );
            Ok(program)
        }
        Err(err) => {
            debug!(error = %err, "access log format rejected");
            Err(err)
        }
    }
}

/// Left-to-right scanner over the format string.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    instructions: Vec<Instruction>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            instructions: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Program> {
        while self.pos < self.input.len() {
            let remaining = &self.input[self.pos..];

            let Some(open) = remaining.find('%') else {
                // No more fields - rest is text
                self.instructions.push(Instruction::text(remaining));
                break;
            };

            if open > 0 {
                self.instructions.push(Instruction::text(&remaining[..open]));
            }

            let position = self.pos + open;
            let body_start = position + 1;
            let close = self.input[body_start..]
                .find('%')
                .ok_or(CompileError::Unterminated { position })?;
            let body = &self.input[body_start..body_start + close];

            let instruction = if body.is_empty() {
                Instruction::text("%")
            } else {
                parse_field(body, position)?
            };
            self.instructions.push(instruction);
            self.pos = body_start + close + 1;
        }

        Ok(Program::new(self.input.to_string(), self.instructions))
    }
}

/// The pieces of a field body, before the name is looked up.
#[derive(Debug, PartialEq, Eq)]
struct Token<'a> {
    name: &'a str,
    param: &'a str,
    length: Option<usize>,
}

/// The field name: everything before the first `(` or `:`.
fn field_name(body: &str) -> &str {
    let end = body.find(|c| c == '(' || c == ':').unwrap_or(body.len());
    &body[..end]
}

fn split_token(body: &str, position: usize) -> Result<Token<'_>> {
    let name = field_name(body);
    let rest = &body[name.len()..];
    let (param, tail) = match rest.strip_prefix('(') {
        Some(after) => {
            let Some(close) = after.find(')') else {
                return Err(CompileError::UnterminatedParameter {
                    field: name.to_string(),
                    position,
                });
            };
            (&after[..close], &after[close + 1..])
        }
        None => ("", rest),
    };

    let length = parse_length(name, tail, position)?;
    Ok(Token {
        name,
        param,
        length,
    })
}

fn parse_length(field: &str, tail: &str, position: usize) -> Result<Option<usize>> {
    if tail.is_empty() {
        return Ok(None);
    }

    let Some(digits) = tail.strip_prefix(':') else {
        return Err(CompileError::TrailingCharacters {
            field: field.to_string(),
            rest: tail.to_string(),
            position,
        });
    };

    let invalid = || CompileError::InvalidLength {
        field: field.to_string(),
        value: digits.to_string(),
        position,
    };

    // `str::parse` alone would accept a leading `+`
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    digits.parse().map(Some).map_err(|_| invalid())
}

fn parse_field(body: &str, position: usize) -> Result<Instruction> {
    let name = field_name(body);
    let Some(command) = Command::lookup(name) else {
        return Err(CompileError::UnknownField {
            name: name.to_string(),
            position,
        });
    };
    let token = split_token(body, position)?;

    match (command.arity(), token.param.is_empty()) {
        (Arity::None, false) => {
            return Err(CompileError::UnexpectedParameter {
                field: token.name.to_string(),
                position,
            })
        }
        (Arity::Required, true) => {
            return Err(CompileError::MissingParameter {
                field: token.name.to_string(),
                position,
            })
        }
        _ => {}
    }

    let op = match command {
        Command::StartTime => Op::StartTime(token.param.to_string()),
        Command::Int(metric) => Op::Int(metric),
        Command::Str(metric) => Op::Str(metric),
        Command::Flag(flag) => Op::Flag(flag),
        Command::Header(source) => Op::Header(source, selector(&token, position)?),
        Command::Trailer => Op::Trailer(selector(&token, position)?),
        Command::Body(source) => Op::Body(source, selector(&token, position)?),
        Command::Uri => Op::Uri(selector(&token, position)?),
        Command::RouterInfo => Op::RouterInfo(selector(&token, position)?),
        Command::Middleware(stage) => Op::Middleware(stage, selector(&token, position)?),
    };

    Ok(Instruction::new(op).truncated(token.length))
}

/// Splits `primary?fallback` and resolves both halves against `N`.
fn selector<N: Namespace>(token: &Token<'_>, position: usize) -> Result<FieldSelector<N>> {
    let mut halves = token.param.split('?');
    let primary = halves.next().unwrap_or_default();
    let fallback = halves.next();

    if primary.is_empty() || fallback == Some("") || halves.next().is_some() {
        return Err(CompileError::InvalidSelector {
            field: token.name.to_string(),
            selector: token.param.to_string(),
            expected: N::KIND,
            position,
        });
    }

    Ok(FieldSelector::resolve(primary, fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{
        FieldRef, FlagField, HttpField, IntMetric, MiddlewareField, StrMetric, UriField,
    };
    use crate::program::{HttpSource, MiddlewareStage};

    fn ops(raw: &str) -> Vec<Op> {
        compile(raw)
            .unwrap()
            .instructions()
            .iter()
            .map(|i| i.op.clone())
            .collect()
    }

    mod literals {
        use super::*;

        #[test]
        fn empty_template() {
            let program = compile("").unwrap();
            assert!(program.is_empty());
            assert_eq!(program.raw(), "");
        }

        #[test]
        fn plain_text_is_one_instruction() {
            assert_eq!(ops("hello world"), vec![Op::Text("hello world".into())]);
        }

        #[test]
        fn escape_is_its_own_instruction() {
            assert_eq!(
                ops("100%% done"),
                vec![
                    Op::Text("100".into()),
                    Op::Text("%".into()),
                    Op::Text(" done".into()),
                ]
            );
        }

        #[test]
        fn consecutive_escapes() {
            assert_eq!(
                ops("%%%%"),
                vec![Op::Text("%".into()), Op::Text("%".into())]
            );
        }

        #[test]
        fn text_around_fields() {
            assert_eq!(
                ops("[%BYTES_SENT%]"),
                vec![
                    Op::Text("[".into()),
                    Op::Int(IntMetric::BytesSent),
                    Op::Text("]".into()),
                ]
            );
        }

        #[test]
        fn non_ascii_text() {
            assert_eq!(
                ops("→ %HOST% ✓"),
                vec![
                    Op::Text("→ ".into()),
                    Op::Str(StrMetric::Host),
                    Op::Text(" ✓".into()),
                ]
            );
        }
    }

    mod fields {
        use super::*;

        #[test]
        fn metrics() {
            assert_eq!(
                ops("%RESPONSE_CODE%%CONNECTION_ID%%DOWNSTREAM_TLS%"),
                vec![
                    Op::Int(IntMetric::ResponseCode),
                    Op::Str(StrMetric::ConnectionId),
                    Op::Flag(FlagField::DownstreamTls),
                ]
            );
        }

        #[test]
        fn start_time_with_and_without_pattern() {
            assert_eq!(ops("%START_TIME%"), vec![Op::StartTime(String::new())]);
            assert_eq!(
                ops("%START_TIME(UNIX_MS)%"),
                vec![Op::StartTime("UNIX_MS".into())]
            );
        }

        #[test]
        fn request_header_custom() {
            assert_eq!(
                ops("%REQ(X-Request-Id)%"),
                vec![Op::Header(
                    HttpSource::Request,
                    FieldSelector::single(FieldRef::Custom("X-Request-Id".into()))
                )]
            );
        }

        #[test]
        fn response_header_well_known() {
            assert_eq!(
                ops("%RESP(:status)%"),
                vec![Op::Header(
                    HttpSource::Response,
                    FieldSelector::single(FieldRef::WellKnown(HttpField::Status))
                )]
            );
        }

        #[test]
        fn parameter_may_contain_colons() {
            let program = compile("%REQ(:authority):10%").unwrap();
            let ins = &program.instructions()[0];
            assert_eq!(
                ins.op,
                Op::Header(
                    HttpSource::Request,
                    FieldSelector::single(FieldRef::WellKnown(HttpField::Authority))
                )
            );
            assert_eq!(ins.truncate, Some(10));
        }

        #[test]
        fn every_selector_category() {
            assert_eq!(
                ops("%URI(raw_query)%"),
                vec![Op::Uri(FieldSelector::single(FieldRef::WellKnown(
                    UriField::RawQuery
                )))]
            );
            assert_eq!(
                ops("%APP_MIDDLEWARE(count)%"),
                vec![Op::Middleware(
                    MiddlewareStage::App,
                    FieldSelector::single(FieldRef::WellKnown(MiddlewareField::Count))
                )]
            );
            assert_eq!(
                ops("%TRAILER(grpc-status)%"),
                vec![Op::Trailer(FieldSelector::single(FieldRef::Custom(
                    "grpc-status".into()
                )))]
            );
            assert_eq!(
                ops("%RESP_BODY(error.code)%"),
                vec![Op::Body(
                    HttpSource::Response,
                    FieldSelector::single(FieldRef::Custom("error.code".into()))
                )]
            );
            assert_eq!(
                ops("%ROUTER_INFO(route_id)%"),
                vec![Op::RouterInfo(FieldSelector::single(FieldRef::Custom(
                    "route_id".into()
                )))]
            );
        }

        #[test]
        fn empty_parentheses_count_as_no_parameter() {
            assert_eq!(ops("%BYTES_SENT()%"), vec![Op::Int(IntMetric::BytesSent)]);
        }
    }

    mod selectors {
        use super::*;

        #[test]
        fn fallback_is_resolved_in_same_namespace() {
            assert_eq!(
                ops("%REQ(X-Forwarded-Host?:authority)%"),
                vec![Op::Header(
                    HttpSource::Request,
                    FieldSelector {
                        primary: FieldRef::Custom("X-Forwarded-Host".into()),
                        fallback: Some(FieldRef::WellKnown(HttpField::Authority)),
                    }
                )]
            );
        }

        #[test]
        fn verbatim_fields_accept_fallback() {
            assert_eq!(
                ops("%ROUTER_INFO(route?cluster)%"),
                vec![Op::RouterInfo(FieldSelector {
                    primary: FieldRef::Custom("route".into()),
                    fallback: Some(FieldRef::Custom("cluster".into())),
                })]
            );
        }

        #[test]
        fn more_than_one_question_mark() {
            let err = compile("%REQ(a?b?c)%").unwrap_err();
            assert!(matches!(err, CompileError::InvalidSelector { .. }));
        }

        #[test]
        fn selector_errors_name_the_namespace() {
            let err = compile("%URI(a?)%").unwrap_err();
            assert!(matches!(
                err,
                CompileError::InvalidSelector {
                    expected: "URI component",
                    ..
                }
            ));
            assert!(err.to_string().contains("URI component"));

            let err = compile("%ROUTER_INFO(?b)%").unwrap_err();
            assert!(err.to_string().contains("expected `name` or `name?name`"));
        }

        #[test]
        fn empty_halves() {
            assert!(matches!(
                compile("%REQ(?b)%").unwrap_err(),
                CompileError::InvalidSelector { .. }
            ));
            assert!(matches!(
                compile("%REQ(a?)%").unwrap_err(),
                CompileError::InvalidSelector { .. }
            ));
        }

        #[test]
        fn start_time_pattern_is_not_split() {
            assert_eq!(ops("%START_TIME(a?b)%"), vec![Op::StartTime("a?b".into())]);
        }
    }

    mod lengths {
        use super::*;

        #[test]
        fn suffix_without_parameter() {
            let program = compile("%UPSTREAM_HOST:16%").unwrap();
            assert_eq!(program.instructions()[0].truncate, Some(16));
        }

        #[test]
        fn zero_is_allowed() {
            let program = compile("%REQ(user-agent):0%").unwrap();
            assert_eq!(program.instructions()[0].truncate, Some(0));
        }

        #[test]
        fn unset_by_default() {
            let program = compile("%BYTES_SENT%").unwrap();
            assert_eq!(program.instructions()[0].truncate, None);
        }

        #[test]
        fn rejects_non_integers() {
            for raw in [
                "%BYTES_SENT:abc%",
                "%BYTES_SENT:%",
                "%BYTES_SENT:-1%",
                "%BYTES_SENT:+1%",
                "%REQ(x):1.5%",
                "%REQ(x):99999999999999999999999999%",
            ] {
                assert!(
                    matches!(compile(raw), Err(CompileError::InvalidLength { .. })),
                    "{} should fail",
                    raw
                );
            }
        }

        #[test]
        fn rejects_trailing_text_after_parameter() {
            let err = compile("%REQ(x)y%").unwrap_err();
            assert_eq!(
                err,
                CompileError::TrailingCharacters {
                    field: "REQ".into(),
                    rest: "y".into(),
                    position: 0,
                }
            );
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn unterminated_field() {
            assert_eq!(
                compile("%FOO").unwrap_err(),
                CompileError::Unterminated { position: 0 }
            );
            assert_eq!(
                compile("abc %BYTES_SENT% %").unwrap_err(),
                CompileError::Unterminated { position: 17 }
            );
        }

        #[test]
        fn unknown_field() {
            assert_eq!(
                compile("x %NOT_A_FIELD%").unwrap_err(),
                CompileError::UnknownField {
                    name: "NOT_A_FIELD".into(),
                    position: 2,
                }
            );
        }

        #[test]
        fn command_names_are_case_sensitive() {
            assert!(matches!(
                compile("%bytes_sent%").unwrap_err(),
                CompileError::UnknownField { .. }
            ));
        }

        #[test]
        fn parameter_not_allowed() {
            assert_eq!(
                compile("%BYTES_SENT(x)%").unwrap_err(),
                CompileError::UnexpectedParameter {
                    field: "BYTES_SENT".into(),
                    position: 0,
                }
            );
        }

        #[test]
        fn parameter_required() {
            for raw in ["%REQ%", "%RESP()%", "%URI:4%", "%APP_MIDDLEWARE%"] {
                assert!(
                    matches!(compile(raw), Err(CompileError::MissingParameter { .. })),
                    "{} should fail",
                    raw
                );
            }
        }

        #[test]
        fn unclosed_parenthesis() {
            assert_eq!(
                compile("%REQ(x-id%").unwrap_err(),
                CompileError::UnterminatedParameter {
                    field: "REQ".into(),
                    position: 0,
                }
            );
        }

        #[test]
        fn unknown_name_is_reported_before_its_suffix() {
            for raw in ["%NOT_A_FIELD:x%", "%NOT_A_FIELD(x%", "%NOT_A_FIELD(x)y%"] {
                assert_eq!(
                    compile(raw).unwrap_err(),
                    CompileError::UnknownField {
                        name: "NOT_A_FIELD".into(),
                        position: 0,
                    },
                    "{}",
                    raw
                );
            }
        }

        #[test]
        fn first_error_wins() {
            let err = compile("%NOPE% %REQ%").unwrap_err();
            assert!(matches!(err, CompileError::UnknownField { .. }));
        }
    }

    mod tokens {
        use super::*;

        #[test]
        fn split_forms() {
            assert_eq!(
                split_token("NAME", 0).unwrap(),
                Token {
                    name: "NAME",
                    param: "",
                    length: None
                }
            );
            assert_eq!(
                split_token("NAME:3", 0).unwrap(),
                Token {
                    name: "NAME",
                    param: "",
                    length: Some(3)
                }
            );
            assert_eq!(
                split_token("NAME(a:b)", 0).unwrap(),
                Token {
                    name: "NAME",
                    param: "a:b",
                    length: None
                }
            );
            assert_eq!(
                split_token("NAME(a(b)):7", 0).unwrap_err(),
                CompileError::TrailingCharacters {
                    field: "NAME".into(),
                    rest: "):7".into(),
                    position: 0,
                }
            );
        }
    }
}
