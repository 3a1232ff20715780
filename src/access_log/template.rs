//! Log line templates.
//!
//! Templates use `:token` or `:token[arg]` placeholders; token names are
//! at least two characters of `[A-Za-z0-9_-]`. Any other text, including
//! a lone `:`, is copied verbatim.

use super::exchange::Exchange;
use super::tokens::TokenRegistry;
use crate::config::Environment;

/// Compact, machine-oriented line.
pub const PRODUCTION_FORMAT: &str = ":short-date :method :url :colored-status \
:response-time[0]ms :bytes-sent :transfer-state - :parsed-user-agent";

/// Verbose, human-oriented line.
pub const DEVELOPMENT_FORMAT: &str = "[:short-date]  :method  :url  :status \
(:response-time[0]ms) | Size::bytes-sent :transfer-state | IP::remote-addr | \
Client::parsed-user-agent";

/// Which of the two built-in templates is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Production,
    Development,
}

impl LogFormat {
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => LogFormat::Production,
            Environment::Development | Environment::Test => LogFormat::Development,
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            LogFormat::Production => PRODUCTION_FORMAT,
            LogFormat::Development => DEVELOPMENT_FORMAT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token { name: String, arg: Option<String> },
}

/// A parsed template, ready to render exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find(':') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let name_len = after
                .find(|c: char| !is_name_char(c))
                .unwrap_or(after.len());
            if name_len < 2 {
                literal.push(':');
                rest = after;
                continue;
            }

            let name = after[..name_len].to_string();
            let mut tail = &after[name_len..];
            let mut arg = None;
            if let Some(inner) = tail.strip_prefix('[') {
                if let Some(close) = inner.find(']') {
                    if close > 0 {
                        arg = Some(inner[..close].to_string());
                        tail = &inner[close + 1..];
                    }
                }
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token { name, arg });
            rest = tail;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Token names referenced by this template, in order.
    pub fn token_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Token { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, registry: &TokenRegistry, exchange: &Exchange) -> String {
        let mut line = String::with_capacity(128);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Token { name, arg } => {
                    line.push_str(&registry.evaluate(name, exchange, arg.as_deref()))
                }
            }
        }
        line
    }
}

impl From<LogFormat> for Template {
    fn from(format: LogFormat) -> Self {
        Template::parse(format.template())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
