//! Stage 2: quality scoring
//!
//! Four factors of 25 points each: word count, metadata completeness,
//! content richness and readability.

use lodestone_core::types::non_empty;
use lodestone_core::{FactorScore, QualityFactors, RawContent};
use tracing::debug;

const FACTOR_MAX: u32 = 25;
const MAX_QUALITY_SCORE: u32 = 100;

/// Word count factor: <100 -> 10, 100-199 -> 15, 200-299 -> 20, >=300 -> 25
pub fn word_count_points(words: usize) -> u32 {
    match words {
        0..=99 => 10,
        100..=199 => 15,
        200..=299 => 20,
        _ => FACTOR_MAX,
    }
}

/// Quality scoring result
#[derive(Debug, Clone, PartialEq)]
pub struct QualityResult {
    /// Total score (0-100)
    pub score: u32,
    pub factors: QualityFactors,
    pub is_spam: bool,
}

/// Evaluates content quality on a 0-100 scale
#[derive(Debug, Clone)]
pub struct QualityScorer {
    spam_threshold: u32,
}

impl QualityScorer {
    pub fn new(spam_threshold: u32) -> Self {
        Self { spam_threshold }
    }

    pub fn score(&self, raw: &RawContent) -> QualityResult {
        let words = raw.effective_word_count();
        let factors = QualityFactors {
            word_count: FactorScore {
                score: word_count_points(words),
                max: FACTOR_MAX,
                signals: vec![format!("words:{words}")],
            },
            metadata_completeness: metadata_score(raw),
            content_richness: richness_score(raw),
            readability: readability_score(&raw.raw_text),
        };

        let score = factors.total().min(MAX_QUALITY_SCORE);
        let is_spam = score < self.spam_threshold;

        debug!(
            content_id = %raw.id,
            quality_score = score,
            word_count = words,
            is_spam,
            "Quality score calculated"
        );

        QualityResult {
            score,
            factors,
            is_spam,
        }
    }
}

fn metadata_score(raw: &RawContent) -> FactorScore {
    let checks: [(&str, u32, bool); 4] = [
        ("title", 7, !raw.title.trim().is_empty()),
        ("published_date", 6, raw.published_date.is_some()),
        ("author", 6, non_empty(&raw.author).is_some()),
        ("description", 6, raw.description().is_some()),
    ];
    collect_points(&checks)
}

fn richness_score(raw: &RawContent) -> FactorScore {
    let html = raw.raw_html.as_deref().unwrap_or_default().to_lowercase();

    let text_paragraphs = raw
        .raw_text
        .split('\n')
        .filter(|p| p.split_whitespace().count() >= 5)
        .count();
    let paragraphs = text_paragraphs.max(html.matches("<p").count());
    let paragraph_points = match paragraphs {
        0 | 1 => 0,
        2 => 4,
        3 | 4 => 7,
        _ => 10,
    };

    let has_headings = ["<h1", "<h2", "<h3", "<h4"].iter().any(|h| html.contains(h));
    let has_image = non_empty(&raw.og_image).is_some() || html.contains("<img");
    let has_structure = non_empty(&raw.canonical_url).is_some()
        || (non_empty(&raw.og_type).is_some() && non_empty(&raw.og_url).is_some());

    let mut factor = collect_points(&[
        ("headings", 5, has_headings),
        ("image", 5, has_image),
        ("canonical_or_og", 5, has_structure),
    ]);
    if paragraph_points > 0 {
        factor.score += paragraph_points;
        factor.signals.insert(0, format!("paragraphs:{paragraphs}"));
    }
    factor
}

/// Sentence length and its variation; uniform or extreme lengths read worse
fn readability_score(text: &str) -> FactorScore {
    let lengths: Vec<f64> = text
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .map(|n| n as f64)
        .collect();

    if lengths.len() < 2 {
        return FactorScore {
            score: 10,
            max: FACTOR_MAX,
            signals: vec!["insufficient_sentences".to_string()],
        };
    }

    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
    let variation = variance.sqrt() / mean;

    let length_points = if (8.0..=25.0).contains(&mean) {
        15
    } else if (5.0..=35.0).contains(&mean) {
        10
    } else {
        5
    };
    let variation_points = if variation >= 0.25 {
        10
    } else if variation >= 0.1 {
        7
    } else {
        4
    };

    FactorScore {
        score: length_points + variation_points,
        max: FACTOR_MAX,
        signals: vec![
            format!("avg_sentence_words:{mean:.1}"),
            format!("variation:{variation:.2}"),
        ],
    }
}

fn collect_points(checks: &[(&str, u32, bool)]) -> FactorScore {
    let mut factor = FactorScore {
        score: 0,
        max: FACTOR_MAX,
        signals: Vec::new(),
    };
    for (signal, points, present) in checks {
        if *present {
            factor.score += points;
            factor.signals.push((*signal).to_string());
        }
    }
    factor
}
