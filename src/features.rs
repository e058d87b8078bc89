use crate::normalizer::{domain_of, NormalizedEmail};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical feature order. Vector positions are stable for a given model
/// version; models carry their own copy of this list so a mismatch is
/// caught at load time instead of silently scoring the wrong weights.
///
/// Families, concatenated:
///   lexical:        keyword_hits, uppercase_ratio, punct_bursts, avg_word_length
///   structural:     body_length, link_count, link_ratio, html_tags, attachment_headers
///   header-derived: from_replyto_mismatch, missing_auth_headers,
///                   subject_all_caps, subject_punct
pub const FEATURE_ORDER: [&str; 13] = [
    "keyword_hits",
    "uppercase_ratio",
    "punct_bursts",
    "avg_word_length",
    "body_length",
    "link_count",
    "link_ratio",
    "html_tags",
    "attachment_headers",
    "from_replyto_mismatch",
    "missing_auth_headers",
    "subject_all_caps",
    "subject_punct",
];

/// Body length saturates here so one feature cannot dwarf the rest.
const BODY_LENGTH_SCALE: f64 = 5_000.0;

const AUTH_HEADERS: [&str; 4] = [
    "dkim-signature",
    "received-spf",
    "authentication-results",
    "arc-authentication-results",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Keyword table matched case-insensitively against subject and body.
    pub keywords: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            keywords: [
                "free",
                "winner",
                "urgent",
                "money",
                "prize",
                "click now",
                "act now",
                "limited time",
                "congratulations",
                "viagra",
                "lottery",
                "wire transfer",
                "cash bonus",
                "verify your account",
                "risk-free",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Fixed-length numeric encoding of one email. Values are always finite.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    fn new(values: Vec<f64>) -> Self {
        debug_assert!(values.iter().all(|v| v.is_finite()));
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

pub struct FeatureExtractor {
    config: FeatureConfig,
    html_tag_regex: Regex,
    punct_burst_regex: Regex,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            html_tag_regex: Regex::new(r"(?i)</?[a-z][a-z0-9]*(?:\s[^>]*)?>").unwrap(),
            punct_burst_regex: Regex::new(r"[!?$]{2,}").unwrap(),
        }
    }

    pub fn feature_len(&self) -> usize {
        FEATURE_ORDER.len()
    }

    /// Names of the emitted features, in emission order.
    pub fn feature_order(&self) -> &'static [&'static str] {
        &FEATURE_ORDER
    }

    /// Total and deterministic; output length is always
    /// [`FEATURE_ORDER`]`.len()` regardless of input shape.
    pub fn extract(&self, email: &NormalizedEmail) -> FeatureVector {
        let body = email.body.as_str();
        let body_lower = body.to_lowercase();
        let subject = email.header("subject").unwrap_or("");
        let subject_lower = subject.to_lowercase();

        let words: Vec<&str> = body.split_whitespace().collect();
        let word_count = words.len();

        // lexical
        let keyword_hits = self.count_keywords(&body_lower, &subject_lower);
        let uppercase_ratio = uppercase_ratio(body);
        let punct_bursts = self.punct_burst_regex.find_iter(body).count() as f64;
        let avg_word_length = if word_count == 0 {
            0.0
        } else {
            words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / word_count as f64
        };

        // structural
        let body_length = (body.chars().count() as f64).min(BODY_LENGTH_SCALE) / BODY_LENGTH_SCALE;
        let link_count = email.links.len() as f64;
        let link_ratio = email.links.len() as f64 / word_count.max(1) as f64;
        let html_tags = bool_feature(self.html_tag_regex.is_match(body));
        let attachment_headers = bool_feature(has_attachment_headers(email));

        // header-derived
        let from_replyto_mismatch = bool_feature(from_replyto_mismatch(email));
        let missing_auth_headers = bool_feature(
            !email.headers.is_empty()
                && !AUTH_HEADERS.iter().any(|h| email.headers.contains_key(*h)),
        );
        let subject_all_caps = bool_feature(is_mostly_caps(subject));
        let subject_punct = subject.chars().filter(|c| matches!(c, '!' | '?')).count() as f64;

        FeatureVector::new(vec![
            keyword_hits,
            uppercase_ratio,
            punct_bursts,
            avg_word_length,
            body_length,
            link_count,
            link_ratio,
            html_tags,
            attachment_headers,
            from_replyto_mismatch,
            missing_auth_headers,
            subject_all_caps,
            subject_punct,
        ])
    }

    fn count_keywords(&self, body_lower: &str, subject_lower: &str) -> f64 {
        self.config
            .keywords
            .iter()
            .map(|kw| {
                let kw = kw.to_lowercase();
                body_lower.matches(&kw).count() + subject_lower.matches(&kw).count()
            })
            .sum::<usize>() as f64
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

fn bool_feature(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn uppercase_ratio(text: &str) -> f64 {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return 0.0;
    }
    let upper = text.chars().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters as f64
}

fn is_mostly_caps(subject: &str) -> bool {
    let letters = subject.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3 && uppercase_ratio(subject) >= 0.7
}

fn has_attachment_headers(email: &NormalizedEmail) -> bool {
    let disposition = email
        .header("content-disposition")
        .map(|v| v.to_lowercase().contains("attachment"))
        .unwrap_or(false);
    let multipart = email
        .header("content-type")
        .map(|v| {
            let v = v.to_lowercase();
            v.contains("multipart/mixed") || v.contains("name=")
        })
        .unwrap_or(false);
    disposition || multipart
}

fn from_replyto_mismatch(email: &NormalizedEmail) -> bool {
    let from = email.header("from").and_then(domain_of);
    let reply_to = email.header("reply-to").and_then(domain_of);
    match (from, reply_to) {
        (Some(f), Some(r)) => f != r,
        _ => false,
    }
}
