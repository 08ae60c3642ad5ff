//! Evaluation of a single extraction pattern against a document.
//!
//! Every method yields a [`PatternMatch`]. A pattern that finds nothing, or
//! that cannot be compiled, produces an empty match with a reason instead of
//! an error, so a rule list can fall through to its next rule.

use regex::{Regex, RegexBuilder};

use invx_model::{
    DocumentInput, ExtractionMethod, ExtractionPattern, PositionRegion, VendorFieldValue,
};

/// Base confidence of a regex match.
pub const REGEX_BASE_CONFIDENCE: f64 = 0.85;
/// Base confidence of a keyword match without proximity words.
pub const KEYWORD_BASE_CONFIDENCE: f64 = 0.75;
/// Base confidence of a page-region read.
pub const POSITION_BASE_CONFIDENCE: f64 = 0.70;
/// Base confidence of a vendor-structured field.
pub const VENDOR_FIELD_BASE_CONFIDENCE: f64 = 0.90;

/// Keyword confidence floor when proximity words are configured.
const PROXIMITY_FLOOR: f64 = 0.60;
/// Extra keyword confidence for a proximity word directly adjacent.
const PROXIMITY_SPAN: f64 = 0.15;
/// Default token window for proximity words.
pub const DEFAULT_MAX_DISTANCE: usize = 5;
/// Longest value taken after a keyword.
const KEYWORD_VALUE_MAX_CHARS: usize = 100;

/// Outcome of evaluating one pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// Extracted value, trimmed; `None` when nothing matched.
    pub value: Option<String>,
    /// Method confidence in `[0, 1]`; 0 when nothing matched.
    pub confidence: f64,
    pub method: ExtractionMethod,
    /// Why nothing matched.
    pub reason: Option<String>,
    /// Value was read from the vendor-structured result rather than a fallback.
    pub vendor_direct: bool,
}

impl PatternMatch {
    fn hit(method: ExtractionMethod, value: String, base: f64, boost: f64) -> Self {
        Self {
            value: Some(value),
            confidence: (base + boost).clamp(0.0, 1.0),
            method,
            reason: None,
            vendor_direct: false,
        }
    }

    fn miss(method: ExtractionMethod, reason: impl Into<String>) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            method,
            reason: Some(reason.into()),
            vendor_direct: false,
        }
    }

    pub fn is_match(&self) -> bool {
        self.value.is_some()
    }
}

/// Evaluates extraction patterns against raw document inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternEvaluator;

impl PatternEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, pattern: &ExtractionPattern, document: &DocumentInput) -> PatternMatch {
        let boost = pattern.confidence_boost();
        match pattern {
            ExtractionPattern::Regex {
                pattern,
                flags,
                group_index,
                ..
            } => evaluate_regex(
                pattern,
                flags.as_deref(),
                GroupChoice::Index(group_index.unwrap_or(0)),
                &document.text,
                boost,
            ),
            ExtractionPattern::Keyword {
                keywords,
                proximity_words,
                max_distance,
                ..
            } => evaluate_keyword(
                keywords,
                proximity_words,
                max_distance.unwrap_or(DEFAULT_MAX_DISTANCE),
                &document.text,
                boost,
            ),
            ExtractionPattern::Position { page, region, .. } => {
                evaluate_position(page.unwrap_or(1), region, document, boost)
            }
            ExtractionPattern::VendorField {
                name,
                fallback_pattern,
                ..
            } => evaluate_vendor_field(name, fallback_pattern.as_deref(), document, boost),
        }
    }
}

/// Which capture group a regex match reports.
#[derive(Debug, Clone, Copy)]
enum GroupChoice {
    /// Explicit group; beyond the pattern's groups falls back to group 0.
    Index(usize),
    /// Group 1 when the pattern has one, else the whole match.
    FirstOrWhole,
}

fn compile(pattern: &str, flags: Option<&str>) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.unwrap_or_default().chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'g' | 'u' => &mut builder,
            other => return Err(format!("unsupported regex flag '{other}'")),
        };
    }
    builder
        .build()
        .map_err(|err| format!("invalid regex '{pattern}': {err}"))
}

fn evaluate_regex(
    pattern: &str,
    flags: Option<&str>,
    group: GroupChoice,
    text: &str,
    boost: f64,
) -> PatternMatch {
    let method = ExtractionMethod::Regex;
    let regex = match compile(pattern, flags) {
        Ok(regex) => regex,
        Err(reason) => {
            tracing::warn!(pattern, %reason, "Skipping uncompilable extraction pattern");
            return PatternMatch::miss(method, reason);
        }
    };

    let Some(captures) = regex.captures(text) else {
        return PatternMatch::miss(method, "pattern did not match");
    };

    let index = match group {
        GroupChoice::Index(index) if index < captures.len() => index,
        GroupChoice::Index(_) => 0,
        GroupChoice::FirstOrWhole => usize::from(captures.len() > 1),
    };
    let Some(found) = captures.get(index) else {
        return PatternMatch::miss(method, format!("capture group {index} did not participate"));
    };

    let value = found.as_str().trim();
    if value.is_empty() {
        return PatternMatch::miss(method, "pattern matched an empty value");
    }
    PatternMatch::hit(method, value.to_string(), REGEX_BASE_CONFIDENCE, boost)
}

/// A whitespace-separated token and the byte offset where it ends.
#[derive(Debug)]
struct Token<'a> {
    normalized: String,
    end: usize,
    raw: &'a str,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push(token(text, s, idx));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(token(text, s, text.len()));
    }
    tokens
}

fn token(text: &str, start: usize, end: usize) -> Token<'_> {
    let raw = &text[start..end];
    Token {
        normalized: normalize_token(raw),
        end,
        raw,
    }
}

fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn phrase_tokens(phrase: &str) -> Vec<String> {
    phrase
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Start indices where `phrase` occurs as a token run.
fn occurrences(tokens: &[Token<'_>], phrase: &[String]) -> Vec<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return Vec::new();
    }
    (0..=tokens.len() - phrase.len())
        .filter(|&start| {
            phrase
                .iter()
                .zip(&tokens[start..])
                .all(|(want, have)| *want == have.normalized)
        })
        .collect()
}

/// Token distance between two non-overlapping spans; `None` when they overlap.
fn span_distance(a: (usize, usize), b: (usize, usize)) -> Option<usize> {
    let (a_start, a_last) = a;
    let (b_start, b_last) = b;
    if b_last < a_start {
        Some(a_start - b_last)
    } else if b_start > a_last {
        Some(b_start - a_last)
    } else {
        None
    }
}

/// Text following `offset` on the same line, cleaned up as a field value.
fn value_after(text: &str, offset: usize) -> Option<String> {
    let rest = &text[offset..];
    let line = rest.split(['\n', '\r']).next().unwrap_or_default();
    let line = line.trim_start_matches([' ', ':', '\t', '\u{ff1a}']);
    let line = line.split('|').next().unwrap_or_default();
    let clipped: String = line.chars().take(KEYWORD_VALUE_MAX_CHARS).collect();
    let value = clipped
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'))
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn evaluate_keyword(
    keywords: &[String],
    proximity_words: &[String],
    max_distance: usize,
    text: &str,
    boost: f64,
) -> PatternMatch {
    let method = ExtractionMethod::Keyword;
    if keywords.is_empty() {
        return PatternMatch::miss(method, "no keywords configured");
    }

    let tokens = tokenize(text);
    let proximity: Vec<Vec<String>> = proximity_words
        .iter()
        .map(String::as_str)
        .map(phrase_tokens)
        .filter(|p| !p.is_empty())
        .collect();

    let mut saw_keyword = false;
    for keyword in keywords {
        let phrase = phrase_tokens(keyword);
        for start in occurrences(&tokens, &phrase) {
            saw_keyword = true;
            let last = start + phrase.len() - 1;

            let base = if proximity.is_empty() {
                KEYWORD_BASE_CONFIDENCE
            } else {
                let nearest = proximity
                    .iter()
                    .flat_map(|p| {
                        occurrences(&tokens, p)
                            .into_iter()
                            .map(move |s| (s, s + p.len() - 1))
                    })
                    .filter_map(|span| span_distance((start, last), span))
                    .filter(|&d| d <= max_distance)
                    .min();
                let Some(distance) = nearest else {
                    continue;
                };
                let closeness = 1.0 - (distance - 1) as f64 / max_distance as f64;
                PROXIMITY_FLOOR + PROXIMITY_SPAN * closeness
            };

            if let Some(value) = value_after(text, tokens[last].end) {
                tracing::trace!(%keyword, token = tokens[start].raw, "Keyword matched");
                return PatternMatch::hit(method, value, base, boost);
            }
        }
    }

    let reason = match (saw_keyword, proximity.is_empty()) {
        (false, _) => "no keyword found",
        (true, true) => "keyword found without a value",
        (true, false) => "no keyword near a proximity word with a value",
    };
    PatternMatch::miss(method, reason)
}

fn evaluate_position(
    page: u32,
    region: &PositionRegion,
    document: &DocumentInput,
    boost: f64,
) -> PatternMatch {
    let method = ExtractionMethod::Position;
    let Some(layout) = document.page(page) else {
        return PatternMatch::miss(method, format!("page {page} has no layout"));
    };

    let mut lines: Vec<_> = layout
        .lines
        .iter()
        .filter(|line| {
            let (x, y) = line.bounding_box.center();
            region.contains(x, y)
        })
        .collect();
    lines.sort_by(|a, b| {
        a.bounding_box
            .y
            .total_cmp(&b.bounding_box.y)
            .then(a.bounding_box.x.total_cmp(&b.bounding_box.x))
    });

    let value = lines
        .iter()
        .map(|line| line.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if value.is_empty() {
        return PatternMatch::miss(method, "no text inside region");
    }
    PatternMatch::hit(method, value, POSITION_BASE_CONFIDENCE, boost)
}

fn evaluate_vendor_field(
    name: &str,
    fallback_pattern: Option<&str>,
    document: &DocumentInput,
    boost: f64,
) -> PatternMatch {
    let field = document.vendor_fields.get(name).or_else(|| {
        document
            .vendor_fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    });

    if let Some(text) = field.and_then(VendorFieldValue::resolved) {
        let mut hit = PatternMatch::hit(
            ExtractionMethod::VendorField,
            text.trim().to_string(),
            VENDOR_FIELD_BASE_CONFIDENCE,
            boost,
        );
        hit.vendor_direct = true;
        return hit;
    }

    match fallback_pattern {
        Some(pattern) => {
            let mut fallback =
                evaluate_regex(pattern, None, GroupChoice::FirstOrWhole, &document.text, boost);
            fallback.method = ExtractionMethod::VendorField;
            if let Some(reason) = fallback.reason.as_mut() {
                *reason = format!("vendor field '{name}' absent; fallback: {reason}");
            }
            fallback
        }
        None => PatternMatch::miss(
            ExtractionMethod::VendorField,
            format!("vendor field '{name}' absent"),
        ),
    }
}
