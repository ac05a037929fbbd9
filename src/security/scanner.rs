//! Pattern-based input threat scanner.
//!
//! Stateless: patterns compile once at construction, every call is a pure
//! function of its input. Three ordered families are applied (SQL injection,
//! script/markup injection, control bytes), then context refinements for
//! file names and query length.
//!
//! Rejection at the boundary is the contract; `sanitize` is a display-safety
//! fallback only, never a substitute for refusing invalid input.

use regex::Regex;

use crate::config::schema::ScannerConfig;

/// Risk classification for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Where the input came from; refines the checks applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanContext {
    /// Search/query strings: additionally length-limited.
    Query,
    /// Free-form user input.
    UserInput,
    /// File names: restricted to a safe character set.
    FileName,
}

/// Result of scanning one input. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct ThreatAssessment {
    /// True iff `risk == Low`.
    pub is_valid: bool,
    pub risk: RiskLevel,
    /// One entry per matched pattern family or context violation.
    pub issues: Vec<String>,
    /// Stripped rendition of the input, safe for display.
    pub sanitized: String,
}

/// Compiled pattern tables.
pub struct ThreatScanner {
    sql_rules: Vec<(&'static str, Regex)>,
    script_rules: Vec<(&'static str, Regex)>,
    control_bytes: Regex,
    file_name: Regex,
    config: ScannerConfig,
}

impl ThreatScanner {
    /// Compile the pattern tables. Panics only on a malformed built-in
    /// pattern, which would be a programming error caught by the tests below.
    pub fn new(config: ScannerConfig) -> Self {
        let compile = |rules: &[(&'static str, &str)]| {
            rules
                .iter()
                .map(|(label, pat)| (*label, Regex::new(pat).expect("built-in pattern must compile")))
                .collect::<Vec<_>>()
        };

        let sql_rules = compile(&[
            (
                "sql statement verb",
                r"(?i)\b(select|insert|update|delete|drop|create|alter|exec|execute|truncate)\b",
            ),
            ("union-based injection", r"(?i)union[\s/*]+(all[\s/*]+)?select"),
            (
                "sql tautology",
                r#"(?i)\b(or|and)\b\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
            ),
            ("sql comment marker", r"(?:--|/\*|\*/|#)"),
            (
                "schema introspection",
                r"(?i)(information_schema|sysobjects|syscolumns|pg_catalog|mysql\.user)",
            ),
        ]);

        let script_rules = compile(&[
            (
                "script or markup tag",
                r"(?i)<\s*/?\s*(script|iframe|object|embed)\b",
            ),
            ("script uri scheme", r"(?i)\b(javascript|vbscript)\s*:"),
            ("inline event handler", r"(?i)\bon\w+\s*="),
        ]);

        Self {
            sql_rules,
            script_rules,
            control_bytes: Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]")
                .expect("built-in pattern must compile"),
            file_name: Regex::new(r"^[A-Za-z0-9._-]+$").expect("built-in pattern must compile"),
            config,
        }
    }

    /// Classify one input. Any SQL family match forces high risk; script or
    /// control matches force at least medium; context refinements raise to at
    /// least medium. Never errors.
    pub fn validate(&self, input: &str, context: ScanContext) -> ThreatAssessment {
        let mut risk = RiskLevel::Low;
        let mut issues = Vec::new();

        for (label, re) in &self.sql_rules {
            if re.is_match(input) {
                issues.push(format!("sql injection pattern: {label}"));
                risk = RiskLevel::High;
            }
        }
        for (label, re) in &self.script_rules {
            if re.is_match(input) {
                issues.push(format!("script injection pattern: {label}"));
                risk = risk.max(RiskLevel::Medium);
            }
        }
        if self.control_bytes.is_match(input) {
            issues.push("control characters present".to_string());
            risk = risk.max(RiskLevel::Medium);
        }

        match context {
            ScanContext::FileName => {
                if !self.file_name.is_match(input) {
                    issues.push("file name contains disallowed characters".to_string());
                    risk = risk.max(RiskLevel::Medium);
                }
            }
            ScanContext::Query => {
                if input.chars().count() > self.config.max_query_len {
                    issues.push(format!(
                        "query exceeds {} characters",
                        self.config.max_query_len
                    ));
                    risk = risk.max(RiskLevel::Medium);
                }
            }
            ScanContext::UserInput => {}
        }

        ThreatAssessment {
            is_valid: risk == RiskLevel::Low,
            risk,
            issues,
            sanitized: self.sanitize(input),
        }
    }

    /// Strip every matched dangerous substring, drop angle brackets, quotes
    /// and backslashes, trim, and truncate. The whole pipeline runs to a
    /// fixed point: a removal can splice a new match together, and the
    /// truncation can leave trailing whitespace for trim to find, so every
    /// step repeats until the output stops changing. Each pass only removes
    /// characters, so the loop terminates.
    pub fn sanitize(&self, input: &str) -> String {
        let mut out = input.to_string();
        loop {
            let before = out.clone();
            for (_, re) in self.sql_rules.iter().chain(self.script_rules.iter()) {
                out = re.replace_all(&out, "").into_owned();
            }
            out = self.control_bytes.replace_all(&out, "").into_owned();
            out.retain(|c| !matches!(c, '<' | '>' | '"' | '\'' | '\\'));
            out = out.trim().to_string();
            if out.chars().count() > self.config.max_sanitized_len {
                out = out.chars().take(self.config.max_sanitized_len).collect();
            }
            if out == before {
                break;
            }
        }
        out
    }
}

impl Default for ThreatScanner {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}
