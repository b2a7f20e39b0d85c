//! End-of-session report for chat practice.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use crate::models::chat::{ChatMessage, ChatSession, Performance, SessionAnalysis, WordCount};

pub const TOP_WORDS: usize = 10;
const MIN_WORD_CHARS: usize = 3;

lazy_static! {
    // Guaraní writes the glottal stop (puso) as an apostrophe inside words.
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{M}]+(?:['’][\p{L}\p{M}]+)*").unwrap();
}

pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

pub fn most_common_words(messages: &[ChatMessage], limit: usize) -> Vec<WordCount> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for message in messages {
        for word in WORD.find_iter(&message.message) {
            let word = word.as_str().to_lowercase();
            if word.chars().count() >= MIN_WORD_CHARS {
                *counts.entry(word).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    ranked.truncate(limit);
    ranked
}

pub fn error_breakdown(messages: &[ChatMessage]) -> BTreeMap<String, u32> {
    let mut breakdown = BTreeMap::new();
    for correction in messages.iter().flat_map(|m| &m.corrections) {
        *breakdown.entry(correction.error_type.clone()).or_default() += 1;
    }
    breakdown
}

/// Share of messages without a grammar error, in percent with one decimal.
pub fn accuracy_rate(message_count: u32, grammar_errors: u32) -> f64 {
    if message_count == 0 {
        return 0.0;
    }
    let clean = f64::from(message_count) - f64::from(grammar_errors);
    let rate = (clean / f64::from(message_count) * 100.0).clamp(0.0, 100.0);
    (rate * 10.0).round() / 10.0
}

pub fn performance(accuracy_rate: f64, message_count: u32) -> Performance {
    if accuracy_rate >= 90.0 && message_count >= 10 {
        Performance::Excellent
    } else if accuracy_rate >= 75.0 {
        Performance::Good
    } else if accuracy_rate >= 50.0 {
        Performance::Fair
    } else {
        Performance::NeedsImprovement
    }
}

/// Builds the report for a closed session whose counters were already
/// aggregated from `messages`.
pub fn analyze(session: &ChatSession, messages: &[ChatMessage]) -> SessionAnalysis {
    let accuracy = accuracy_rate(session.message_count, session.grammar_errors);
    SessionAnalysis {
        duration_minutes: session.duration_seconds / 60,
        messages_sent: session.message_count,
        words_used: session.words_used,
        grammar_errors: session.grammar_errors,
        accuracy_rate: accuracy,
        most_common_words: most_common_words(messages, TOP_WORDS),
        error_breakdown: error_breakdown(messages),
        performance: performance(accuracy, session.message_count),
    }
}
