//! Tolerant JSON extraction from free-form model output.
//!
//! The analysis prompt tells the model to answer with pure JSON and nothing
//! else. Models mostly comply, but not always: they wrap the answer in
//! ` ```json ` fences, prepend "Here is the analysis:", append a closing
//! remark, or emit a stray byte-order mark. [`extract_json`] recovers the
//! first syntactically valid JSON value from such text, or fails with an
//! [`ExtractionError`] carrying the text so a human can see what went wrong.
//!
//! ## Search order
//!
//! 1. Remove fence lines (a line holding only ` ``` ` plus an optional
//!    language tag), keeping the fenced content. Backticks elsewhere, such
//!    as inside a JSON string, are left alone.
//! 2. Trim whitespace and invisible characters (BOM, zero-width spaces) from
//!    both ends.
//! 3. If the whole remaining text parses, return it as-is.
//! 4. Try every balanced `{…}` span in order of its opening brace.
//! 5. Try every balanced `[…]` span in order of its opening bracket.
//!
//! The first candidate that parses wins, even if a later one is "better".
//! Prose that itself contains a valid JSON object before the real payload
//! will therefore produce the wrong (but valid) value.
//!
//! Spans are found with a scan that tracks nesting depth and string-literal
//! state, so braces inside quoted strings are ignored and nesting depth is
//! unbounded. One scan settles every opener it passes, so a long run of
//! unclosed braces costs a single pass rather than one per brace.

use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+.-]*[ \t\r]*$").unwrap());

/// Characters that render as nothing but break `serde_json`.
const INVISIBLE: [char; 6] = [
    '\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{00AD}',
];

/// Recover the first valid JSON value from raw model output.
///
/// # Errors
/// [`ExtractionError`] when no candidate parses. Its `raw` field holds the
/// text after fence and invisible-character stripping.
///
/// # Example
/// ```rust
/// use edgequake_cv2career::pipeline::extract::extract_json;
///
/// let v = extract_json("Sure! ```json\n{\"career\": \"Data Analyst\"}\n``` Good luck.").unwrap();
/// assert_eq!(v["career"], "Data Analyst");
/// ```
pub fn extract_json(raw: &str) -> Result<Value, ExtractionError> {
    let text = strip_wrapping(raw);

    if let Ok(v) = serde_json::from_str::<Value>(&text) {
        return Ok(v);
    }

    let found = Candidates::new(&text, b'{', b'}')
        .chain(Candidates::new(&text, b'[', b']'))
        .find_map(|span| match serde_json::from_str::<Value>(span) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Rejected JSON candidate ({} bytes): {}", span.len(), e);
                None
            }
        });

    found.ok_or(ExtractionError { raw: text })
}

/// Steps 1 and 2: drop fence lines, then trim whitespace and invisible
/// characters from both ends.
fn strip_wrapping(raw: &str) -> String {
    let unfenced = RE_FENCE.replace_all(raw, "");
    unfenced
        .trim_matches(|c: char| c.is_whitespace() || INVISIBLE.contains(&c))
        .to_string()
}

/// Balanced `open … close` spans of `text`, in order of their opening byte.
///
/// Every occurrence of `open` starts a candidate, including ones nested
/// inside an earlier candidate, so a malformed outer object does not hide a
/// well-formed inner one. Openers that never balance are skipped.
struct Candidates<'a> {
    text: &'a str,
    pos: usize,
    open: u8,
    close: u8,
    /// Closing index per opener already passed by a scan; `None` = unclosed.
    settled: HashMap<usize, Option<usize>>,
}

impl<'a> Candidates<'a> {
    fn new(text: &'a str, open: u8, close: u8) -> Self {
        Self {
            text,
            pos: 0,
            open,
            close,
            settled: HashMap::new(),
        }
    }

    /// Index of the byte closing the span opened at `start`, if any.
    ///
    /// Openers met outside strings along the way are settled too: scanning
    /// from one of them would see the same bytes in the same string state.
    fn matching_close(&mut self, start: usize) -> Option<usize> {
        if let Some(&end) = self.settled.get(&start) {
            return end;
        }

        let bytes = self.text.as_bytes();
        let mut open_at: Vec<usize> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            if b == b'"' {
                in_string = true;
            } else if b == self.open {
                open_at.push(i);
            } else if b == self.close {
                if let Some(opener) = open_at.pop() {
                    self.settled.insert(opener, Some(i));
                    if open_at.is_empty() {
                        return Some(i);
                    }
                }
            }
        }

        for opener in open_at {
            self.settled.insert(opener, None);
        }
        None
    }
}

impl<'a> Iterator for Candidates<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let start = self.pos + bytes[self.pos..].iter().position(|&b| b == self.open)?;
            self.pos = start + 1;
            if let Some(end) = self.matching_close(start) {
                // Both ends are ASCII, so the slice sits on char boundaries.
                return Some(&self.text[start..=end]);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESUME_JSON: &str = r#"{"skills": ["Python", "SQL"], "career": "Data Analyst", "recommendation": "Good fit", "career_meta": {"type": 0, "estimatedYears": 1, "averageSalary": 60000, "jobGrowth": 40, "futureCareer": true}}"#;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn clean_object_is_returned_unchanged() {
        assert_eq!(extract_json(RESUME_JSON).unwrap(), parse(RESUME_JSON));
    }

    #[test]
    fn clean_array_of_objects_is_returned_whole() {
        let j = r#"[{"a": 1}, {"b": 2}]"#;
        assert_eq!(extract_json(j).unwrap(), parse(j));
    }

    #[test]
    fn clean_scalar_is_returned_unchanged() {
        assert_eq!(extract_json("42").unwrap(), json!(42));
        assert_eq!(extract_json("\"hi\"").unwrap(), json!("hi"));
    }

    #[test]
    fn fenced_resume_scenario() {
        let input = format!("```json\n{RESUME_JSON}\n```");
        let v = extract_json(&input).unwrap();
        assert_eq!(v["skills"], json!(["Python", "SQL"]));
        assert_eq!(v["career_meta"]["jobGrowth"], json!(40));
        assert_eq!(v, parse(RESUME_JSON));
    }

    #[test]
    fn fence_without_language_tag() {
        let input = "```\n{\"a\": [1, 2]}\n```";
        assert_eq!(extract_json(input).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn fence_with_crlf_and_trailing_prose() {
        let input = "Here you go:\r\n```json\r\n{\"a\": 1}\r\n```\r\nLet me know!";
        assert_eq!(extract_json(input).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_array() {
        let input = "```json\n[1, 2, 3]\n```";
        assert_eq!(extract_json(input).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn prose_before_and_after() {
        let input = format!("Sure, here is the analysis of the résumé:\n{RESUME_JSON}\nHope this helps.");
        assert_eq!(extract_json(&input).unwrap(), parse(RESUME_JSON));
    }

    #[test]
    fn bom_and_whitespace() {
        let input = format!("\u{FEFF}  {RESUME_JSON}  ");
        assert_eq!(extract_json(&input).unwrap(), parse(RESUME_JSON));
    }

    #[test]
    fn zero_width_inside_fence() {
        let input = "```json\n\u{200B}{\"a\": true}\u{200B}\n```";
        assert_eq!(extract_json(input).unwrap(), json!({"a": true}));
    }

    #[test]
    fn first_match_wins() {
        let input = r#"{"first": 1} and then {"second": 2}"#;
        assert_eq!(extract_json(input).unwrap(), json!({"first": 1}));
    }

    #[test]
    fn garbage_fails_with_trimmed_text() {
        let err = extract_json("  not json at all \n").unwrap_err();
        assert_eq!(err.raw, "not json at all");
    }

    #[test]
    fn empty_and_blank_fail() {
        assert_eq!(extract_json("").unwrap_err().raw, "");
        assert_eq!(extract_json("   ").unwrap_err().raw, "");
        assert_eq!(extract_json("```json\n```").unwrap_err().raw, "");
    }

    #[test]
    fn array_fallback() {
        assert_eq!(extract_json("result: [1,2,3]").unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn object_preferred_over_earlier_array() {
        let input = r#"tags [1, 2] then {"a": 1}"#;
        assert_eq!(extract_json(input).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn deep_nesting() {
        let input = r#"Result: {"a": {"b": {"c": {"d": [1, {"e": 2}]}}}} done"#;
        assert_eq!(
            extract_json(input).unwrap(),
            json!({"a": {"b": {"c": {"d": [1, {"e": 2}]}}}})
        );
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let input = r#"note: {"text": "a } tricky { string", "n": 1} end"#;
        assert_eq!(
            extract_json(input).unwrap(),
            json!({"text": "a } tricky { string", "n": 1})
        );
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let input = r#"x {"q": "she said \"}\" loudly"} y"#;
        assert_eq!(
            extract_json(input).unwrap(),
            json!({"q": "she said \"}\" loudly"})
        );
    }

    #[test]
    fn invalid_outer_falls_back_to_valid_inner() {
        let input = r#"{broken: {"a": 1}}"#;
        assert_eq!(extract_json(input).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn unbalanced_opener_is_skipped() {
        let input = r#"{ oops, never closed {"ok": true}"#;
        assert_eq!(extract_json(input).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn backticks_inside_string_values_are_kept() {
        let input = r#"{"recommendation": "Run ```cargo test``` before each commit", "n": 1}"#;
        assert_eq!(
            extract_json(input).unwrap(),
            json!({"recommendation": "Run ```cargo test``` before each commit", "n": 1})
        );
    }

    #[test]
    fn fenced_answer_with_backticks_in_a_string() {
        let input = "```json\n{\"tip\": \"use ```sh blocks\"}\n```";
        assert_eq!(extract_json(input).unwrap(), json!({"tip": "use ```sh blocks"}));
    }

    #[test]
    fn indented_fence_lines_are_removed() {
        let input = "  ```json  \n{\"a\": 1}\n  ```";
        assert_eq!(strip_wrapping(input), "{\"a\": 1}");
    }

    #[test]
    fn long_run_of_unclosed_braces() {
        let mut input = "{ ".repeat(20_000);
        input.push_str(r#"{"ok": true}"#);
        assert_eq!(extract_json(&input).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn one_scan_settles_nested_openers() {
        let mut c = Candidates::new("{ {a} { {b}", b'{', b'}');
        assert_eq!(c.matching_close(0), None);
        assert_eq!(c.settled.get(&2), Some(&Some(4)));
        assert_eq!(c.settled.get(&6), Some(&None));
        assert_eq!(c.settled.get(&8), Some(&Some(10)));
        let spans: Vec<&str> = c.collect();
        assert_eq!(spans, vec!["{a}", "{b}"]);
    }

    #[test]
    fn multibyte_prose_around_json() {
        let input = "Análise do currículo → {\"carreira\": \"Técnico\"} ✓";
        assert_eq!(extract_json(input).unwrap(), json!({"carreira": "Técnico"}));
    }

    #[test]
    fn braces_without_json_fail() {
        let err = extract_json("{not valid} and [also, not]").unwrap_err();
        assert_eq!(err.raw, "{not valid} and [also, not]");
    }

    #[test]
    fn strip_wrapping_is_noop_on_clean_input() {
        assert_eq!(strip_wrapping(RESUME_JSON), RESUME_JSON);
    }

    #[test]
    fn candidates_in_order_of_appearance() {
        let spans: Vec<&str> = Candidates::new("{a {b} c} {d}", b'{', b'}').collect();
        assert_eq!(spans, vec!["{a {b} c}", "{b}", "{d}"]);
    }
}
