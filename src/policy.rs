use crate::classifier::{FeatureContribution, ScoreResult};
use serde::Serialize;
use std::fmt;

/// Most rationale entries rendered into a verdict.
const MAX_RATIONALE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Spam,
    Ham,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Spam => write!(f, "SPAM"),
            Label::Ham => write!(f, "HAM"),
        }
    }
}

/// Terminal classification result for one email.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Verdict {
    pub label: Label,
    /// In [0, 1]. SPAM carries the raw score, HAM its complement.
    pub confidence: f64,
    pub model_version: String,
    pub rationale: Vec<String>,
}

/// Converts a raw score into a labeled verdict using two calibrated cut
/// points. Scores between the cut points go to the nearest threshold;
/// the exact midpoint resolves to HAM, since a human-reviewed tool
/// prefers false negatives over false positives.
pub struct DecisionPolicy {
    low_threshold: f64,
    high_threshold: f64,
}

impl DecisionPolicy {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self {
            low_threshold,
            high_threshold,
        }
    }

    pub fn decide(&self, score: &ScoreResult, contributions: &[FeatureContribution]) -> Verdict {
        let raw = score.raw_score;
        let label = if raw >= self.high_threshold {
            Label::Spam
        } else if raw <= self.low_threshold {
            Label::Ham
        } else {
            // nearest threshold wins; comparing against the midpoint
            // directly avoids rounding asymmetry in the two distances,
            // so an exact tie reliably lands on HAM
            if 2.0 * raw > self.low_threshold + self.high_threshold {
                Label::Spam
            } else {
                Label::Ham
            }
        };

        let confidence = match label {
            Label::Spam => raw,
            Label::Ham => 1.0 - raw,
        }
        .clamp(0.0, 1.0);

        Verdict {
            label,
            confidence,
            model_version: score.model_version.clone(),
            rationale: build_rationale(contributions),
        }
    }
}

/// Rank contributions by absolute weighted share, descending; the stable
/// sort keeps feature declaration order on ties.
fn build_rationale(contributions: &[FeatureContribution]) -> Vec<String> {
    let mut ranked: Vec<&FeatureContribution> = contributions
        .iter()
        .filter(|c| c.contribution.abs() > 1e-9)
        .collect();
    ranked.sort_by(|a, b| {
        b.contribution
            .abs()
            .partial_cmp(&a.contribution.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let phrases: Vec<String> = ranked
        .iter()
        .take(MAX_RATIONALE)
        .map(|c| render_phrase(c))
        .collect();

    if phrases.is_empty() {
        vec!["no significant signals detected".to_string()]
    } else {
        phrases
    }
}

fn render_phrase(c: &FeatureContribution) -> String {
    let count = c.value.round() as i64;
    match c.name.as_str() {
        "keyword_hits" => format!(
            "contains {count} spam keyword{}",
            if count == 1 { "" } else { "s" }
        ),
        "uppercase_ratio" => format!("{:.0}% of letters are uppercase", c.value * 100.0),
        "punct_bursts" => format!(
            "{count} run{} of repeated punctuation",
            if count == 1 { "" } else { "s" }
        ),
        "avg_word_length" => "unusual average word length".to_string(),
        "body_length" => "message length weighed in".to_string(),
        "link_count" => format!("contains {count} link{}", if count == 1 { "" } else { "s" }),
        "link_ratio" => "high proportion of links to text".to_string(),
        "html_tags" => "contains HTML markup".to_string(),
        "attachment_headers" => "headers indicate an attachment".to_string(),
        "from_replyto_mismatch" => "sender/reply-to domain mismatch".to_string(),
        "missing_auth_headers" => "no authentication headers present".to_string(),
        "subject_all_caps" => "subject line is all capitals".to_string(),
        "subject_punct" => "excessive punctuation in subject".to_string(),
        other => format!("{} signal ({:.2})", other, c.value),
    }
}
