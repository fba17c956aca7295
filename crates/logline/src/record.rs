//! Log records: a compiled program plus host-appended lines.

use crate::program::Program;
use crate::provider::Provider;
use crate::render::render_into;

/// One log line in the making.
///
/// The appendix carries runtime text the host wants after the rendered
/// format without recompiling it. Appendix lines are emitted verbatim,
/// each followed by the delimiter.
///
/// # Example
///
/// ```
/// use std::borrow::Cow;
/// use logline::{compile, IntMetric, LogRecord, Provider, StrMetric};
///
/// struct Nothing;
///
/// impl Provider for Nothing {
///     fn format_start_time(&self, _pattern: &str) -> String {
///         String::new()
///     }
///     fn int_metric(&self, _metric: IntMetric) -> Option<i64> {
///         None
///     }
///     fn str_metric(&self, _metric: StrMetric) -> Option<Cow<'_, str>> {
///         None
///     }
/// }
///
/// let program = compile("%RESPONSE_CODE%").unwrap();
/// let mut record = LogRecord::new(&program);
/// record.push("a");
/// record.push("b");
/// assert_eq!(record.render(&Nothing, "-", ","), "-,a,b,");
/// ```
#[derive(Debug, Clone)]
pub struct LogRecord<'p> {
    program: &'p Program,
    appendix: Vec<String>,
}

impl<'p> LogRecord<'p> {
    pub fn new(program: &'p Program) -> Self {
        LogRecord {
            program,
            appendix: Vec::new(),
        }
    }

    /// Creates a record with the given appendix lines.
    pub fn with_appendix<I, S>(program: &'p Program, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LogRecord {
            program,
            appendix: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a line after the rendered program.
    pub fn push(&mut self, line: impl Into<String>) -> &mut Self {
        self.appendix.push(line.into());
        self
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn appendix(&self) -> &[String] {
        &self.appendix
    }

    /// Renders the program, then every appendix line followed by `delimiter`.
    pub fn render<P>(&self, provider: &P, empty_placeholder: &str, delimiter: &str) -> String
    where
        P: Provider + ?Sized,
    {
        let extra: usize = self
            .appendix
            .iter()
            .map(|line| line.len() + delimiter.len())
            .sum();
        let mut out = String::with_capacity(self.program.raw().len() + 64 + extra);
        self.render_into(&mut out, provider, empty_placeholder, delimiter);
        out
    }

    /// Like [`LogRecord::render`], appending to `out`.
    pub fn render_into<P>(
        &self,
        out: &mut String,
        provider: &P,
        empty_placeholder: &str,
        delimiter: &str,
    ) where
        P: Provider + ?Sized,
    {
        render_into(out, self.program, provider, empty_placeholder, delimiter);
        for line in &self.appendix {
            out.push_str(line);
            out.push_str(delimiter);
        }
    }
}

/// Renders a [`LogRecord`]. Same as [`LogRecord::render`].
pub fn render_log<P>(
    record: &LogRecord<'_>,
    provider: &P,
    empty_placeholder: &str,
    delimiter: &str,
) -> String
where
    P: Provider + ?Sized,
{
    record.render(provider, empty_placeholder, delimiter)
}
