//! Deterministic persuasion scoring engine.
//!
//! `score` is a pure function from argument text to a structured
//! [`PersuasionScore`]: five lexical/structural sub-scores clipped to
//! [0, 20], a total that is always exactly their sum, strength/weakness
//! extraction, and a convince threshold at 75. No randomness anywhere.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Total score at or above which the coach counts as convinced.
pub const CONVINCE_THRESHOLD: u8 = 75;

/// Words that signal an emotional appeal. Each contributes +2 when present.
const EMOTION_WORDS: [&str; 8] = [
    "feel", "believe", "hope", "dream", "love", "hate", "fear", "joy",
];

/// Phrases that signal the argument engages with counterarguments.
/// Each contributes +3 when present.
const CONTRASTIVE_PHRASES: [&str; 5] = [
    "however",
    "but",
    "on the other hand",
    "critics might say",
    "you might think",
];

const DEFAULT_STRENGTH: &str = "Attempted to make a persuasive case";
const DEFAULT_WEAKNESS: &str = "Could improve overall persuasiveness";

/// Structured evaluation of one persuasion attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersuasionScore {
    /// Clarity and structure (0-20).
    pub clarity: u8,
    /// Use of evidence and facts (0-20).
    pub evidence: u8,
    /// Emotional appeal and storytelling (0-20).
    pub emotional: u8,
    /// Addressing potential objections (0-20).
    pub objections: u8,
    /// Overall persuasiveness (0-20).
    pub overall: u8,
    /// Always the exact sum of the five sub-scores (0-100).
    pub total: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// One of eight fixed impression sentences keyed off the total.
    pub impression: String,
    pub convinced: bool,
    /// Free-form label for how much of the time limit was used.
    pub time_used: String,
}

fn numeric_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn quoted_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*""#).expect("valid regex"))
}

fn clip(value: usize, max: usize) -> u8 {
    value.min(max) as u8
}

/// Score a persuasion attempt. Deterministic and side-effect free.
pub fn score(argument: &str) -> PersuasionScore {
    let len = argument.chars().count();
    let lower = argument.to_lowercase();

    let clarity = clip(len / 50, 20);

    let has_numbers = numeric_token_re().is_match(argument);
    let has_quotes = quoted_span_re().is_match(argument);
    let evidence_base = (len / 60).min(15);
    let evidence = clip(
        evidence_base + if has_numbers { 3 } else { 0 } + if has_quotes { 2 } else { 0 },
        20,
    );

    let emotion_hits = EMOTION_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let emotional = clip(len / 70 + emotion_hits * 2, 20);

    let contrastive_hits = CONTRASTIVE_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count();
    let objections = clip(len / 80 + contrastive_hits * 3, 20);

    let overall = clip(len / 40, 20);

    // Summed, never recomputed independently.
    let total = clarity + evidence + emotional + objections + overall;

    PersuasionScore {
        clarity,
        evidence,
        emotional,
        objections,
        overall,
        total,
        strengths: identify_strengths(argument, len, has_numbers, has_quotes),
        weaknesses: identify_weaknesses(argument, len, has_numbers, has_quotes, &lower),
        impression: impression_for(total),
        convinced: total >= CONVINCE_THRESHOLD,
        time_used: "1 minute".to_string(),
    }
}

fn has_personal_pronoun(argument: &str) -> bool {
    argument.contains('I') || argument.contains("we") || argument.contains("you")
}

fn identify_strengths(
    argument: &str,
    len: usize,
    has_numbers: bool,
    has_quotes: bool,
) -> Vec<String> {
    let mut strengths = Vec::new();

    if len > 200 {
        strengths.push("Detailed argument".to_string());
    }
    if has_numbers {
        strengths.push("Uses numerical evidence".to_string());
    }
    if has_quotes {
        strengths.push("Includes quotations or citations".to_string());
    }
    if argument.contains('?') {
        strengths.push("Engages the listener with questions".to_string());
    }
    if has_personal_pronoun(argument) {
        strengths.push("Personal connection with audience".to_string());
    }

    if strengths.is_empty() {
        strengths.push(DEFAULT_STRENGTH.to_string());
    }
    strengths
}

fn identify_weaknesses(
    _argument: &str,
    len: usize,
    has_numbers: bool,
    has_quotes: bool,
    lower: &str,
) -> Vec<String> {
    let mut weaknesses = Vec::new();

    if len < 200 {
        weaknesses.push("Could provide more detail".to_string());
    }
    if !has_numbers {
        weaknesses.push("Could include more concrete evidence".to_string());
    }
    if !has_quotes {
        weaknesses.push("Could include citations or expert opinions".to_string());
    }
    let addresses_objections = ["however", "but", "on the other hand"]
        .iter()
        .any(|p| lower.contains(p));
    if !addresses_objections {
        weaknesses.push("Could address potential counterarguments".to_string());
    }

    if weaknesses.is_empty() {
        weaknesses.push(DEFAULT_WEAKNESS.to_string());
    }
    weaknesses
}

fn impression_for(total: u8) -> String {
    let text = if total >= 90 {
        "An exceptionally persuasive argument that effectively combines logical reasoning, evidence, and emotional appeal."
    } else if total >= 80 {
        "A highly persuasive argument that successfully addresses most aspects of effective persuasion."
    } else if total >= 70 {
        "A strong argument with several persuasive elements, though there is room for improvement."
    } else if total >= 60 {
        "A reasonably persuasive argument that makes some good points but lacks in certain areas."
    } else if total >= 50 {
        "A moderately persuasive argument with both strengths and significant weaknesses."
    } else if total >= 40 {
        "An argument with some persuasive elements but substantial room for improvement."
    } else if total >= 30 {
        "A weak argument that fails to persuade in most aspects."
    } else {
        "An ineffective argument that needs significant improvement in all areas of persuasion."
    };
    text.to_string()
}
