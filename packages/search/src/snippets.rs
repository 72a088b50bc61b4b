//! Keyword-in-context snippets from highlighted search hits.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SearchError;

const EM_OPEN: &str = "<em>";
const EM_CLOSE: &str = "</em>";

static EMPHASIS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(<em>.*?</em>)"));

/// A point of a hit's bounding polygon on its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One highlighted match with its surrounding words.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    /// Up to `num_words` words before the match.
    pub prefix: String,
    /// The matched text, without highlight tags.
    pub hit: String,
    /// Up to `num_words` words after the match.
    pub suffix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    /// Remaining fields of the hit (`sentence_num`, `type`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Build one snippet per `<em>` match of every hit.
///
/// The highlighted text is read from the hit's `_formatted` object when the
/// engine returned one, else from the hit itself.
pub fn extract_snippets(hits: &[Value], num_words: usize) -> Result<Vec<Snippet>, SearchError> {
    let emphasis = EMPHASIS.as_ref().map_err(|e| SearchError::Pattern(e.clone()))?;

    let mut snippets = Vec::new();
    for hit in hits {
        let Some(record) = hit
            .get("_formatted")
            .and_then(Value::as_object)
            .or_else(|| hit.as_object())
        else {
            continue;
        };
        let Some(text) = record.get("text").and_then(Value::as_str) else {
            continue;
        };

        let page = record.get("page").and_then(as_page);
        let polygon = record.get("polygon").and_then(as_polygon);
        let mut fields = record.clone();
        for key in ["text", "page", "polygon", "_formatted"] {
            fields.remove(key);
        }

        for m in emphasis.find_iter(text) {
            let before = strip_tags(&text[..m.start()]);
            let after = strip_tags(&text[m.end()..]);
            let inner = &m.as_str()[EM_OPEN.len()..m.as_str().len() - EM_CLOSE.len()];

            snippets.push(Snippet {
                prefix: last_words(&before, num_words),
                hit: inner.to_string(),
                suffix: first_words(&after, num_words),
                page,
                polygon: polygon.clone(),
                fields: fields.clone(),
            });
        }
    }
    Ok(snippets)
}

fn strip_tags(text: &str) -> String {
    text.replace(EM_OPEN, "").replace(EM_CLOSE, "")
}

fn last_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words[words.len().saturating_sub(n)..].join(" ")
}

fn first_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_page(value: &Value) -> Option<i64> {
    as_number(value).map(|n| n.trunc() as i64)
}

fn as_polygon(value: &Value) -> Option<Vec<Point>> {
    value
        .as_array()?
        .iter()
        .map(|pair| {
            let pair = pair.as_array()?;
            Some(Point {
                x: as_number(pair.first()?)?,
                y: as_number(pair.get(1)?)?,
            })
        })
        .collect()
}
