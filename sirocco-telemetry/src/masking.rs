//! Sensitive data masking for logs.
//!
//! Authentication tokens presented on connect, secrets and passwords must
//! never reach log output in clear text.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

struct SensitivePattern {
    regex: Regex,
    group: usize,
}

/// (pattern, capture group holding the secret)
const PATTERN_SOURCES: &[(&str, usize)] = &[
    (
        r#"(?i)(authentication|auth[_-]?token|access[_-]?token)["\s:=]+["']?([^\s"',}]{4,})["']?"#,
        2,
    ),
    (
        r#"(?i)(secret|api[_-]?key|api[_-]?secret)["\s:=]+["']?([a-zA-Z0-9._-]{8,})["']?"#,
        2,
    ),
    (r#"(?i)(password|passwd|pwd)["\s:=]+["']?([^\s"']{4,})["']?"#, 2),
    (r"(?i)bearer\s+([a-zA-Z0-9._-]{20,})", 1),
    (r"eyJ[a-zA-Z0-9_-]*\.eyJ[a-zA-Z0-9_-]*\.[a-zA-Z0-9_-]*", 0),
];

static PATTERNS: LazyLock<Vec<SensitivePattern>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .filter_map(|(source, group)| {
            Regex::new(source).ok().map(|regex| SensitivePattern {
                regex,
                group: *group,
            })
        })
        .collect()
});

/// Masks sensitive values in strings.
#[derive(Debug, Clone)]
pub struct SensitiveDataMasker {
    min_length: usize,
    show_start: usize,
    show_end: usize,
}

impl Default for SensitiveDataMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl SensitiveDataMasker {
    /// Creates a masker that keeps three characters at each end of values of
    /// eight characters or more.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_length: 8,
            show_start: 3,
            show_end: 3,
        }
    }

    /// Creates a masker with custom settings.
    #[must_use]
    pub fn with_settings(min_length: usize, show_start: usize, show_end: usize) -> Self {
        Self {
            min_length,
            show_start,
            show_end,
        }
    }

    /// Masks a value known to be sensitive.
    ///
    /// ```
    /// use sirocco_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// assert_eq!(masker.mask_value("tok-1234567890"), "tok***890");
    /// assert_eq!(masker.mask_value("tok"), "***");
    /// ```
    #[must_use]
    pub fn mask_value(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() < self.min_length || chars.len() <= self.show_start + self.show_end {
            return "*".repeat(chars.len().max(3));
        }
        let start: String = chars[..self.show_start].iter().collect();
        let end: String = chars[chars.len() - self.show_end..].iter().collect();
        format!("{start}***{end}")
    }

    /// Masks every sensitive value detected in free text.
    ///
    /// ```
    /// use sirocco_telemetry::masking::SensitiveDataMasker;
    ///
    /// let masker = SensitiveDataMasker::new();
    /// let masked = masker.mask_string(r#"{"authentication": "s3cr3t-token-value"}"#);
    /// assert!(!masked.contains("s3cr3t-token-value"));
    /// ```
    #[must_use]
    pub fn mask_string<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(input);
        for pattern in PATTERNS.iter() {
            let secrets: Vec<String> = pattern
                .regex
                .captures_iter(&result)
                .filter_map(|c| c.get(pattern.group).map(|m| m.as_str().to_string()))
                .collect();
            for secret in secrets {
                let masked = self.mask_value(&secret);
                result = Cow::Owned(result.replace(&secret, &masked));
            }
        }
        result
    }

    /// Returns true if the input contains a sensitive pattern.
    #[must_use]
    pub fn contains_sensitive(&self, input: &str) -> bool {
        PATTERNS.iter().any(|p| p.regex.is_match(input))
    }
}

/// Wrapper that redacts its value in `Debug`, `Display` and `Serialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    /// Wraps a value.
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns the inner value.
    pub fn expose(&self) -> &T {
        &self.0
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> std::fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> serde::Serialize for Sensitive<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}
