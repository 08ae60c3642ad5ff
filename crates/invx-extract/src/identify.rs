//! Company identification from OCR text.
//!
//! Each company contributes identification signals; a document is scored
//! against every company and the best score decides the result:
//!
//! | Signal | Points |
//! |---|---|
//! | any name variant | 40 (once) |
//! | keyword | 15 each, at most 30 |
//! | reference-number format | 20 (first match) |
//! | logo text | 10 (first match) |
//!
//! Scores are capped at 100.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

pub const NAME_SCORE: f64 = 40.0;
pub const KEYWORD_SCORE: f64 = 15.0;
pub const KEYWORD_SCORE_MAX: f64 = 30.0;
pub const FORMAT_SCORE: f64 = 20.0;
pub const LOGO_TEXT_SCORE: f64 = 10.0;

/// Score at or above which a company is identified outright.
pub const IDENTIFIED_THRESHOLD: f64 = 80.0;
/// Score at or above which a company is proposed for review.
pub const REVIEW_THRESHOLD: f64 = 50.0;

/// Placeholder company code that never takes part in matching.
const UNKNOWN_CODE: &str = "UNKNOWN";

/// Identification signals for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPattern {
    pub company_id: String,
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Reference-number regexes, matched case-insensitively.
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub logo_text: Vec<String>,
    /// Higher values are checked first and win ties.
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentificationStatus {
    Identified,
    NeedsReview,
    Unidentified,
}

impl IdentificationStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= IDENTIFIED_THRESHOLD {
            Self::Identified
        } else if score >= REVIEW_THRESHOLD {
            Self::NeedsReview
        } else {
            Self::Unidentified
        }
    }
}

impl fmt::Display for IdentificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identified => "IDENTIFIED",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Unidentified => "UNIDENTIFIED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Name,
    Keyword,
    Format,
    LogoText,
}

/// One signal that contributed to a company's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMatch {
    pub kind: SignalKind,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_value: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub company_id: Option<String>,
    pub company_code: Option<String>,
    pub company_name: Option<String>,
    /// Score in `[0, 100]`.
    pub confidence: f64,
    pub status: IdentificationStatus,
    /// First signal kind that scored.
    pub primary_signal: Option<SignalKind>,
    pub signals: Vec<SignalMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Identification {
    fn unidentified(reason: &str) -> Self {
        Self {
            company_id: None,
            company_code: None,
            company_name: None,
            confidence: 0.0,
            status: IdentificationStatus::Unidentified,
            primary_signal: None,
            signals: Vec::new(),
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug)]
struct CompiledPattern {
    pattern: CompanyPattern,
    formats: Vec<Regex>,
}

/// Scores OCR text against a fixed set of company patterns.
#[derive(Debug)]
pub struct CompanyIdentifier {
    patterns: Vec<CompiledPattern>,
}

impl CompanyIdentifier {
    pub fn new(mut patterns: Vec<CompanyPattern>) -> Result<Self> {
        patterns.sort_by_key(|p| std::cmp::Reverse(p.priority));
        let patterns = patterns
            .into_iter()
            .filter(|p| p.code != UNKNOWN_CODE)
            .map(|pattern| {
                let formats = pattern
                    .formats
                    .iter()
                    .map(|fmt| {
                        RegexBuilder::new(fmt)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| ExtractError::InvalidFormatPattern {
                                company_id: pattern.company_id.clone(),
                                pattern: fmt.clone(),
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledPattern { pattern, formats })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(companies = patterns.len(), "Company identifier ready");
        Ok(Self { patterns })
    }

    pub fn identify(&self, text: &str) -> Identification {
        if text.trim().is_empty() {
            return Identification::unidentified("empty_text");
        }
        let normalized = normalize_text(text);

        let mut best: Option<Identification> = None;
        for compiled in &self.patterns {
            let candidate = score_company(compiled, &normalized, text);
            if candidate.confidence > best.as_ref().map_or(0.0, |b| b.confidence) {
                best = Some(candidate);
            }
        }

        match best {
            Some(found) if found.status != IdentificationStatus::Unidentified => {
                tracing::info!(
                    company = found.company_code.as_deref().unwrap_or_default(),
                    confidence = found.confidence,
                    status = %found.status,
                    "Company identified"
                );
                found
            }
            _ => Identification::unidentified("no_match"),
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn score_company(compiled: &CompiledPattern, normalized: &str, original: &str) -> Identification {
    let pattern = &compiled.pattern;
    let mut signals = Vec::new();
    let mut total = 0.0;

    let mut name_scored = false;
    for name in &pattern.names {
        if contains_phrase(normalized, name) {
            let score = if name_scored { 0.0 } else { NAME_SCORE };
            name_scored = true;
            total += score;
            signals.push(signal(SignalKind::Name, name, None, score));
        }
    }

    let mut keyword_total = 0.0;
    for keyword in &pattern.keywords {
        if contains_phrase(normalized, keyword) {
            let score = KEYWORD_SCORE.min(KEYWORD_SCORE_MAX - keyword_total).max(0.0);
            keyword_total += score;
            total += score;
            signals.push(signal(SignalKind::Keyword, keyword, None, score));
        }
    }

    if let Some((fmt, found)) = pattern
        .formats
        .iter()
        .zip(&compiled.formats)
        .find_map(|(fmt, regex)| regex.find(original).map(|m| (fmt, m.as_str())))
    {
        total += FORMAT_SCORE;
        signals.push(signal(SignalKind::Format, fmt, Some(found), FORMAT_SCORE));
    }

    if let Some(logo) = pattern
        .logo_text
        .iter()
        .find(|logo| contains_phrase(normalized, logo))
    {
        total += LOGO_TEXT_SCORE;
        signals.push(signal(SignalKind::LogoText, logo, None, LOGO_TEXT_SCORE));
    }

    let confidence = f64::min(total, 100.0);
    Identification {
        company_id: Some(pattern.company_id.clone()),
        company_code: Some(pattern.code.clone()),
        company_name: Some(pattern.display_name.clone()),
        confidence,
        status: IdentificationStatus::from_score(confidence),
        primary_signal: signals.iter().find(|s| s.score > 0.0).map(|s| s.kind),
        signals,
        reason: None,
    }
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let needle = normalize_text(phrase);
    !needle.is_empty() && normalized.contains(&needle)
}

fn signal(kind: SignalKind, pattern: &str, matched: Option<&str>, score: f64) -> SignalMatch {
    SignalMatch {
        kind,
        pattern: pattern.to_string(),
        matched_value: matched.map(str::to_string),
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> CompanyPattern {
        CompanyPattern {
            company_id: "c-acme".to_string(),
            code: "ACME".to_string(),
            display_name: "Acme Logistics".to_string(),
            names: vec!["Acme Logistics".to_string(), "ACME LOG".to_string()],
            keywords: vec![
                "acme tower".to_string(),
                "acme freight".to_string(),
                "acme ocean".to_string(),
            ],
            formats: vec![r"AC\d{8}".to_string()],
            logo_text: vec!["fast & safe".to_string()],
            priority: 0,
        }
    }

    #[test]
    fn full_signal_set_is_identified() {
        let identifier = CompanyIdentifier::new(vec![acme()]).unwrap();
        let text = "ACME   Logistics\nAcme Tower, Acme Freight, Acme Ocean\nRef ac12345678\nFast & Safe";
        let result = identifier.identify(text);
        // 40 + 30 + 20 + 10
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.status, IdentificationStatus::Identified);
        assert_eq!(result.company_code.as_deref(), Some("ACME"));
        assert_eq!(result.primary_signal, Some(SignalKind::Name));
        let format = result
            .signals
            .iter()
            .find(|s| s.kind == SignalKind::Format)
            .unwrap();
        assert_eq!(format.matched_value.as_deref(), Some("ac12345678"));
    }

    #[test]
    fn name_and_format_need_review() {
        let identifier = CompanyIdentifier::new(vec![acme()]).unwrap();
        let result = identifier.identify("Acme Logistics invoice AC00001111");
        assert_eq!(result.confidence, 60.0);
        assert_eq!(result.status, IdentificationStatus::NeedsReview);
    }

    #[test]
    fn weak_match_is_unidentified() {
        let identifier = CompanyIdentifier::new(vec![acme()]).unwrap();
        let result = identifier.identify("Acme Logistics");
        assert_eq!(result.status, IdentificationStatus::Unidentified);
        assert_eq!(result.company_id, None);
        assert_eq!(result.reason.as_deref(), Some("no_match"));
    }

    #[test]
    fn empty_text_is_unidentified() {
        let identifier = CompanyIdentifier::new(vec![acme()]).unwrap();
        let result = identifier.identify("  \n ");
        assert_eq!(result.reason.as_deref(), Some("empty_text"));
    }

    #[test]
    fn best_company_wins() {
        let mut globex = acme();
        globex.company_id = "c-globex".to_string();
        globex.code = "GLOBEX".to_string();
        globex.names = vec!["Globex".to_string()];
        globex.keywords = vec!["globex hq".to_string()];
        globex.formats = vec![];
        globex.logo_text = vec![];

        let identifier = CompanyIdentifier::new(vec![globex, acme()]).unwrap();
        let result = identifier.identify("Globex HQ\nAcme Logistics ref AC12345678 Acme Tower");
        assert_eq!(result.company_code.as_deref(), Some("ACME"));
        assert_eq!(result.confidence, 75.0);
    }

    #[test]
    fn invalid_format_is_rejected() {
        let mut bad = acme();
        bad.formats = vec!["(".to_string()];
        assert!(matches!(
            CompanyIdentifier::new(vec![bad]),
            Err(ExtractError::InvalidFormatPattern { .. })
        ));
    }
}
