//! Candidate scoring metrics (spec §4.5): relevance, coherence,
//! completeness, latency, cost — each in `[0, 1]`.

use std::time::Duration;

/// Lowercased alphabetic tokens of length >= 3, per spec's definition of
/// "words" for the relevance metric.
fn significant_words(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace()
        .filter_map(|w| {
            let cleaned: String = w.chars().filter(|c| c.is_alphabetic()).collect();
            let lower = cleaned.to_lowercase();
            (lower.len() >= 3).then_some(lower)
        })
        .collect()
}

/// Word overlap between prompt and response, as a fraction of the
/// prompt's significant word set.
pub fn relevance(prompt: &str, response: &str) -> f64 {
    let prompt_words = significant_words(prompt);
    if prompt_words.is_empty() {
        return 0.5;
    }
    let response_words = significant_words(response);
    let overlap = prompt_words.intersection(&response_words).count();
    overlap as f64 / prompt_words.len() as f64
}

fn length_score(avg_words_per_sentence: f64) -> f64 {
    if avg_words_per_sentence <= 5.0 {
        0.5
    } else if avg_words_per_sentence <= 10.0 {
        0.7
    } else if avg_words_per_sentence <= 25.0 {
        1.0
    } else if avg_words_per_sentence <= 40.0 {
        0.8
    } else {
        0.6
    }
}

/// Sentence-structure score: blends average sentence length against a
/// piecewise curve with a sentence-count-driven "structure" factor.
pub fn coherence(response: &str) -> f64 {
    let sentences: Vec<&str> = response
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return 0.0;
    }

    let total_words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    let avg_words = total_words as f64 / sentences.len() as f64;
    let length = length_score(avg_words);
    let structure = (sentences.len() as f64 / 5.0).min(1.0);
    0.6 * length + 0.4 * structure
}

/// Response length relative to prompt length, piecewise-scored.
pub fn completeness(prompt: &str, response: &str) -> f64 {
    let prompt_words = prompt.split_whitespace().count().max(1);
    let response_words = response.split_whitespace().count();
    let ratio = response_words as f64 / prompt_words as f64;

    if ratio < 0.5 {
        0.3
    } else if ratio < 1.0 {
        0.5
    } else if ratio < 2.0 {
        0.7
    } else if ratio <= 5.0 {
        1.0
    } else if ratio <= 10.0 {
        0.9
    } else {
        0.7
    }
}

/// Faster is better; zero credit past 30 seconds.
pub fn latency(elapsed: Duration) -> f64 {
    (1.0 - elapsed.as_secs_f64() / 30.0).max(0.0)
}

/// Cost score derived from a candidate's historical average cost. Unknown
/// history scores neutrally. The `0.01` normalizer's origin is
/// unspecified upstream; preserved as-is for parity (spec §9).
pub fn cost(avg_cost: Option<f64>) -> f64 {
    match avg_cost {
        None => 0.5,
        Some(avg) => (1.0 - (avg / 0.01).min(1.0)).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_full_overlap() {
        let score = relevance("tell me about rust programming", "rust programming is great");
        assert!(score > 0.5);
    }

    #[test]
    fn relevance_no_significant_words_defaults_half() {
        assert_eq!(relevance("a an", "anything"), 0.5);
    }

    #[test]
    fn completeness_ratio_one_to_two_scores_seven_tenths() {
        // prompt 5 words, response 8 words -> ratio 1.6
        let score = completeness("one two three four five", "a b c d e f g h");
        assert_eq!(score, 0.7);
    }

    #[test]
    fn latency_caps_at_zero_past_thirty_seconds() {
        assert_eq!(latency(Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn latency_near_instant_is_near_one() {
        assert!(latency(Duration::from_millis(10)) > 0.99);
    }

    #[test]
    fn cost_unknown_is_neutral() {
        assert_eq!(cost(None), 0.5);
    }

    #[test]
    fn cost_zero_is_best() {
        assert_eq!(cost(Some(0.0)), 1.0);
    }

    #[test]
    fn cost_at_or_above_normalizer_is_worst() {
        assert_eq!(cost(Some(0.01)), 0.0);
        assert_eq!(cost(Some(1.0)), 0.0);
    }
}
