//! Mapping a free-text report to a verdict.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FAIL_TOKEN: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"(?i)\bFAIL\b") {
    Ok(regex) => regex,
    Err(err) => panic!("FAIL token regex is invalid: {err}"),
});

static PASS_TOKEN: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"(?i)\bPASS\b") {
    Ok(regex) => regex,
    Err(err) => panic!("PASS token regex is invalid: {err}"),
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one compliance check, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    /// The agent's report, byte for byte.
    pub raw_output: String,
    pub status: Verdict,
    pub tool_calls: usize,
}

/// Find the verdict marker in a report. FAIL wins over PASS.
///
/// Accepts either the exact `Status: FAIL` / `Status: PASS` marker or the
/// bare word in any case. Words that merely contain the token, such as
/// "passwords", do not count.
pub fn verdict_of(raw: &str) -> Verdict {
    if raw.contains("Status: FAIL") || FAIL_TOKEN.is_match(raw) {
        Verdict::Fail
    } else if raw.contains("Status: PASS") || PASS_TOKEN.is_match(raw) {
        Verdict::Pass
    } else {
        Verdict::Unknown
    }
}

pub fn classify(raw: impl Into<String>, tool_calls: usize) -> ComplianceResult {
    let raw_output = raw.into();
    let status = verdict_of(&raw_output);
    ComplianceResult {
        raw_output,
        status,
        tool_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_markers() {
        assert_eq!(verdict_of("## Status: FAIL\n\n## Summary\n..."), Verdict::Fail);
        assert_eq!(verdict_of("## Status: PASS\n\nAll good."), Verdict::Pass);
    }

    #[test]
    fn test_fail_takes_precedence() {
        let raw = "## Status: PASS\nbut one device would fail the rule";
        assert_eq!(verdict_of(raw), Verdict::Fail);
        assert_eq!(verdict_of("pass ... FAIL"), Verdict::Fail);
    }

    #[test]
    fn test_bare_tokens_any_case() {
        assert_eq!(verdict_of("**Status**: Pass"), Verdict::Pass);
        assert_eq!(verdict_of("Result: fail."), Verdict::Fail);
    }

    #[test]
    fn test_embedded_words_are_not_markers() {
        let raw = "NetBox does not store passwords or SNMP credentials; the check failed to start.";
        assert_eq!(verdict_of(raw), Verdict::Unknown);
    }

    #[test]
    fn test_unknown_keeps_text_verbatim() {
        let raw = "This rule cannot be checked as NetBox does not store SNMP credentials.\n  \n";
        let result = classify(raw, 0);
        assert_eq!(result.status, Verdict::Unknown);
        assert_eq!(result.raw_output, raw);
    }

    #[test]
    fn test_serializes_like_the_report_object() {
        let result = classify("## Status: FAIL", 3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"raw_output": "## Status: FAIL", "status": "FAIL", "tool_calls": 3})
        );
    }
}
