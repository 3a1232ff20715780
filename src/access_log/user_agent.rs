//! `User-Agent` classification for the access log.
//!
//! Parsing is delegated to woothee; this module only folds its names into
//! the `{OS}/{Browser} v{Major}` shape (Windows releases become `Windows`,
//! iPhone/iPad/iPod become `iOS`).

use woothee::parser::Parser;

const UNKNOWN: &str = "Unknown";

/// woothee's marker for a field it could not determine.
const PARSER_UNKNOWN: &str = "UNKNOWN";

/// Parsed view of a `User-Agent` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgent {
    pub os: Option<String>,
    pub browser: Option<String>,
    pub version: Option<String>,
}

impl UserAgent {
    pub fn parse(header: &str) -> Self {
        let parser = Parser::new();
        let Some(result) = parser.parse(header) else {
            return Self::default();
        };

        Self {
            os: known(&result.os).map(os_family),
            browser: known(&result.name).map(browser_name),
            version: known(&result.version).map(str::to_string),
        }
    }

    /// Leading numeric component of the version, or empty.
    pub fn major_version(&self) -> &str {
        self.version
            .as_deref()
            .and_then(|v| v.split('.').next())
            .filter(|major| !major.is_empty() && major.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or("")
    }

    /// `{OS}/{Browser} v{Major}`.
    pub fn describe(&self) -> String {
        format!(
            "{}/{} v{}",
            self.os.as_deref().unwrap_or(UNKNOWN),
            self.browser.as_deref().unwrap_or(UNKNOWN),
            self.major_version()
        )
    }
}

/// The `parsed-user-agent` value for an optional header.
pub fn describe(header: Option<&str>) -> String {
    match header {
        Some(ua) if !ua.trim().is_empty() => UserAgent::parse(ua).describe(),
        _ => UNKNOWN.to_string(),
    }
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != PARSER_UNKNOWN).then_some(value)
}

fn os_family(os: &str) -> String {
    let family = match os {
        os if os.starts_with("Windows Phone") => "Windows Phone",
        os if os.starts_with("Windows") => "Windows",
        "iPhone" | "iPad" | "iPod" => "iOS",
        os if os.starts_with("Mac OS") => "macOS",
        "ChromeOS" => "Chrome OS",
        other => other,
    };
    family.to_string()
}

fn browser_name(name: &str) -> String {
    match name {
        "Edge" => "Microsoft Edge".to_string(),
        other => other.to_string(),
    }
}
