//! Access-log configuration.
//!
//! [`AccessLogConfig`] is the serde-facing description of an access log:
//! the format string, the placeholder for missing values and the delimiter.
//! [`AccessLogConfig::build`] validates it into an [`AccessLog`], which holds
//! the compiled program and is what request handlers render with.
//!
//! A configuration reload builds a new [`AccessLog`] and swaps it in; a
//! compiled program is never edited.
//!
//! # Example
//!
//! ```
//! use logline::AccessLogConfig;
//!
//! let config = AccessLogConfig::from_yaml_str(
//!     "format: '%REQ(:method)% %REQ(:path)% %RESPONSE_CODE%'\nempty_placeholder: '-'\n",
//! ).unwrap();
//! let log = config.build().unwrap();
//! assert_eq!(log.program().len(), 5);
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::parser::compile;
use crate::program::Program;
use crate::provider::Provider;
use crate::record::LogRecord;
use crate::render::render_into;

/// The format used when a configuration does not name one.
pub const DEFAULT_FORMAT: &str = "[%START_TIME%] \"%REQ(:method)% %REQ(X-Original-Path?:path)% \
%PROTOCOL%\" %RESPONSE_CODE% %RESPONSE_FLAGS% %BYTES_RECEIVED% %BYTES_SENT% %DURATION% \
\"%REQ(X-Forwarded-For)%\" \"%REQ(user-agent)%\" \"%REQ(X-Request-Id)%\" \
\"%REQ(:authority)%\" \"%UPSTREAM_HOST%\"";

/// The placeholder used when a configuration does not name one.
pub const DEFAULT_EMPTY_PLACEHOLDER: &str = "-";

/// Serializable access-log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConfig {
    /// The format string.
    pub format: String,
    /// Emitted in place of values the provider does not have.
    pub empty_placeholder: String,
    /// Written after every instruction and appendix line.
    pub delimiter: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        AccessLogConfig {
            format: DEFAULT_FORMAT.to_string(),
            empty_placeholder: DEFAULT_EMPTY_PLACEHOLDER.to_string(),
            delimiter: String::new(),
        }
    }
}

impl AccessLogConfig {
    /// A configuration with the given format and default settings otherwise.
    pub fn new(format: impl Into<String>) -> Self {
        AccessLogConfig {
            format: format.into(),
            ..AccessLogConfig::default()
        }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Loads a configuration file, picking the parser by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source)?,
            Some("json") => Self::from_json_str(&source)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!(path = %path.display(), "loaded access log config");
        Ok(config)
    }

    /// Compiles the format into a ready-to-use [`AccessLog`].
    pub fn build(&self) -> Result<AccessLog, ConfigError> {
        let program = compile(&self.format)?;
        Ok(AccessLog {
            program: Arc::new(program),
            empty_placeholder: self.empty_placeholder.clone(),
            delimiter: self.delimiter.clone(),
        })
    }
}

/// A compiled access log, cheap to clone and share across threads.
#[derive(Debug, Clone)]
pub struct AccessLog {
    program: Arc<Program>,
    empty_placeholder: String,
    delimiter: String,
}

impl AccessLog {
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// A shared handle to the compiled program.
    pub fn shared_program(&self) -> Arc<Program> {
        Arc::clone(&self.program)
    }

    pub fn empty_placeholder(&self) -> &str {
        &self.empty_placeholder
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Renders one line.
    pub fn render<P: Provider + ?Sized>(&self, provider: &P) -> String {
        let mut out = String::with_capacity(self.program.raw().len() + 64);
        render_into(
            &mut out,
            &self.program,
            provider,
            &self.empty_placeholder,
            &self.delimiter,
        );
        out
    }

    /// Starts a record for lines that need an appendix.
    pub fn record(&self) -> LogRecord<'_> {
        LogRecord::new(&self.program)
    }

    /// Renders a record with this log's placeholder and delimiter.
    pub fn render_record<P: Provider + ?Sized>(
        &self,
        record: &LogRecord<'_>,
        provider: &P,
    ) -> String {
        record.render(provider, &self.empty_placeholder, &self.delimiter)
    }
}
