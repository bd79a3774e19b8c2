//! Response normalization: turn raw model text into a JSON document.
//!
//! Strategies run in a fixed order and the first success wins:
//!   1. strict parse of the whole reply
//!   2. strict parse of a fenced block (```json ... ``` or bare ```)
//!   3. strict parse of the greedy outermost `{...}` or `[...]` span
//!   4. give up and hand back the text as `Normalized::Unparsed`
//!
//! `Unparsed` is not an error. Adapters run their own targeted extraction
//! (`extract_object_list`, `extract_first_object`) before declaring the reply malformed.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Outcome of normalizing one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
  /// A JSON object.
  Document(Map<String, Value>),
  /// A bare JSON array.
  List(Vec<Value>),
  /// Nothing structured could be recovered; the reply text, verbatim.
  Unparsed(String),
}

/// Which strategy produced a structured result. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  Strict,
  Fenced,
  Embedded,
}

fn fence_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
  })
}

/// Run the ordered strategies over `raw`.
pub fn normalize(raw: &str) -> Normalized {
  normalize_with_strategy(raw).0
}

/// Same as [`normalize`], also reporting which strategy succeeded (`None` for `Unparsed`).
pub fn normalize_with_strategy(raw: &str) -> (Normalized, Option<Strategy>) {
  let text = raw.trim().trim_start_matches('\u{feff}').trim();

  if let Some(n) = parse_structured(text) {
    return (n, Some(Strategy::Strict));
  }

  for cap in fence_re().captures_iter(text) {
    if let Some(inner) = cap.get(1) {
      if let Some(n) = parse_structured(inner.as_str().trim()) {
        return (n, Some(Strategy::Fenced));
      }
    }
  }

  if let Some(n) = outermost_span(text) {
    return (n, Some(Strategy::Embedded));
  }

  (Normalized::Unparsed(raw.to_string()), None)
}

/// Strict parse, accepting only objects and arrays.
fn parse_structured(text: &str) -> Option<Normalized> {
  match serde_json::from_str::<Value>(text).ok()? {
    Value::Object(map) => Some(Normalized::Document(map)),
    Value::Array(items) => Some(Normalized::List(items)),
    _ => None,
  }
}

/// Greedy span from the first opening delimiter to the last matching closer.
/// Whichever of `{` / `[` appears first is tried first.
fn outermost_span(text: &str) -> Option<Normalized> {
  let mut candidates: Vec<(usize, char)> = Vec::with_capacity(2);
  if let Some(i) = text.find('{') { candidates.push((i, '}')); }
  if let Some(i) = text.find('[') { candidates.push((i, ']')); }
  candidates.sort_by_key(|(i, _)| *i);

  for (start, close) in candidates {
    if let Some(end) = text.rfind(close) {
      if start < end {
        if let Some(n) = parse_structured(&text[start..=end]) {
          return Some(n);
        }
      }
    }
  }
  None
}

/// Opening delimiters tried before giving up on a reply.
const MAX_SPAN_STARTS: usize = 64;

/// Balanced `open ... close` spans in `text`, lazily, in order of their opening delimiter.
/// Delimiters inside JSON string literals are ignored. Only the first `MAX_SPAN_STARTS`
/// openings are considered.
pub fn balanced_spans(text: &str, open: char, close: char) -> impl Iterator<Item = &str> + '_ {
  text
    .char_indices()
    .filter(move |(_, c)| *c == open)
    .take(MAX_SPAN_STARTS)
    .filter_map(move |(start, _)| span_from(text, start, open, close))
}

fn span_from(text: &str, start: usize, open: char, close: char) -> Option<&str> {
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;
  for (offset, ch) in text[start..].char_indices() {
    if in_string {
      if escaped { escaped = false; }
      else if ch == '\\' { escaped = true; }
      else if ch == '"' { in_string = false; }
      continue;
    }
    if ch == '"' {
      in_string = true;
    } else if ch == open {
      depth += 1;
    } else if ch == close {
      depth -= 1;
      if depth == 0 {
        return Some(&text[start..start + offset + ch.len_utf8()]);
      }
    }
  }
  None
}

/// First balanced `[...]` span that parses as a non-empty array whose items are all objects.
pub fn extract_object_list(text: &str) -> Option<Vec<Value>> {
  balanced_spans(text, '[', ']').find_map(|span| {
    match serde_json::from_str::<Value>(span).ok()? {
      Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => Some(items),
      _ => None,
    }
  })
}

/// First balanced `{...}` span that parses as an object.
pub fn extract_first_object(text: &str) -> Option<Map<String, Value>> {
  balanced_spans(text, '{', '}').find_map(|span| {
    match serde_json::from_str::<Value>(span).ok()? {
      Value::Object(map) => Some(map),
      _ => None,
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn doc(v: Value) -> Normalized {
    match v {
      Value::Object(m) => Normalized::Document(m),
      Value::Array(a) => Normalized::List(a),
      other => panic!("not a document: {other}"),
    }
  }

  #[test]
  fn strict_reply_round_trips() {
    let v = json!({"score": 7, "strengths": ["a", "b"], "nested": {"x": [1, 2, {"y": null}]}});
    let (n, s) = normalize_with_strategy(&v.to_string());
    assert_eq!(n, doc(v));
    assert_eq!(s, Some(Strategy::Strict));
  }

  #[test]
  fn bare_array_is_a_list_document() {
    let v = json!([{"question": "q1"}, {"question": "q2"}]);
    assert_eq!(normalize(&format!("  {}\n", v)), doc(v));
  }

  #[test]
  fn fenced_block_inside_prose() {
    let raw = "Sure! Here you go:\n```json\n{\"questions\":[]}\n```";
    let (n, s) = normalize_with_strategy(raw);
    assert_eq!(n, doc(json!({"questions": []})));
    assert_eq!(s, Some(Strategy::Fenced));
  }

  #[test]
  fn untagged_fence_and_second_fence() {
    let raw = "```\nnot json\n```\nthen\n```\n{\"a\": 1}\n```";
    assert_eq!(normalize(raw), doc(json!({"a": 1})));
  }

  #[test]
  fn prose_wrapped_document_matches_bare_document() {
    let v = json!({"questions": [{"scenario": "A {tricky} case", "question": "Why?"}]});
    let wrapped = format!("Here is the JSON you asked for:\n{}\nLet me know if you need more.", v);
    let (n, s) = normalize_with_strategy(&wrapped);
    assert_eq!(n, normalize(&v.to_string()));
    assert_eq!(s, Some(Strategy::Embedded));
  }

  #[test]
  fn stray_bracket_before_object_falls_through_to_object() {
    let raw = "I wrote [3] questions: {\"questions\": []}";
    assert_eq!(normalize(raw), doc(json!({"questions": []})));
  }

  #[test]
  fn plain_prose_is_unparsed_and_verbatim() {
    let raw = "I'm sorry, I cannot help with that request.";
    assert_eq!(normalize(raw), Normalized::Unparsed(raw.to_string()));
  }

  #[test]
  fn scalar_json_is_not_a_document() {
    assert_eq!(normalize("42"), Normalized::Unparsed("42".into()));
    assert_eq!(normalize("\"text\""), Normalized::Unparsed("\"text\"".into()));
  }

  #[test]
  fn two_objects_separated_by_prose_stay_unparsed() {
    let raw = "First {\"a\": 1} and then {\"b\": 2}";
    assert_eq!(normalize(raw), Normalized::Unparsed(raw.to_string()));
    assert_eq!(extract_first_object(raw), json!({"a": 1}).as_object().cloned());
  }

  #[test]
  fn balanced_spans_ignore_delimiters_in_strings() {
    let raw = r#"x {"a": "}{", "b": {"c": "\"}"}} y"#;
    let first = balanced_spans(raw, '{', '}').next();
    assert_eq!(first, Some(r#"{"a": "}{", "b": {"c": "\"}"}}"#));
  }

  #[test]
  fn many_unclosed_openings_are_bounded() {
    let mut raw = "[".repeat(10_000);
    raw.push_str(r#"[{"question": "q"}]"#);
    assert_eq!(balanced_spans(&raw, '[', ']').count(), 0);
    assert!(extract_object_list(&raw).is_none());

    let late = format!("{}{}", "{ ".repeat(MAX_SPAN_STARTS), r#"{"a": 1}"#);
    assert!(extract_first_object(&late).is_none());
    let early = format!(r#"{{"a": 1}}{}"#, "{ ".repeat(10_000));
    assert_eq!(extract_first_object(&early), json!({"a": 1}).as_object().cloned());
  }

  #[test]
  fn object_list_extraction_skips_non_object_arrays() {
    let raw = "Ranks [1, 2] then [{\"question\": \"q\"}] and [{\"question\": \"r\"}] oops";
    let items = extract_object_list(raw).unwrap();
    assert_eq!(items, vec![json!({"question": "q"})]);
    assert!(extract_object_list("no arrays here").is_none());
    assert!(extract_object_list("[]").is_none());
  }
}
