//! Stage 3: rule cache and topic matching
//!
//! The cache is built once from the enabled rules and never mutated; a rule
//! change means building a new cache (and a new orchestrator).

use aho_corasick::{AhoCorasick, MatchKind};
use lodestone_core::{ClassificationRule, Error, RawContent, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

const TF_NORMALIZATION: f64 = 2.5;
const TF_WEIGHT: f64 = 0.5;
const COVERAGE_WEIGHT: f64 = 0.5;

/// Lowercase, replace everything but letters and digits with spaces, and pad
/// both ends so every token is surrounded by a space
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.push(' ');
    out
}

/// Keyword in the padded form used for word-boundary matching, or `None` when blank
pub fn normalize_keyword(keyword: &str) -> Option<String> {
    let tokens: Vec<String> = normalize_text(keyword)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(format!(" {} ", tokens.join(" ")))
    }
}

/// `min(1, ln(1 + hits) / 2.5) * 0.5 + coverage * 0.5`
pub fn rule_score(total_hits: usize, unique_matched: usize, total_keywords: usize) -> f64 {
    if total_hits == 0 || total_keywords == 0 {
        return 0.0;
    }
    let tf = ((total_hits as f64).ln_1p() / TF_NORMALIZATION).min(1.0);
    let coverage = unique_matched as f64 / total_keywords as f64;
    (tf * TF_WEIGHT + coverage * COVERAGE_WEIGHT).min(1.0)
}

/// Immutable snapshot of the enabled topic rules with a single keyword automaton
pub struct RuleCache {
    rules: Vec<ClassificationRule>,
    matcher: Option<AhoCorasick>,
    /// Pattern id -> (rule index, keyword index)
    pattern_owners: Vec<Vec<(usize, usize)>>,
}

impl RuleCache {
    /// Build from rules in insertion order; disabled rules are dropped
    pub fn new(rules: Vec<ClassificationRule>) -> Result<Self> {
        let mut rules: Vec<ClassificationRule> = rules.into_iter().filter(|r| r.enabled).collect();
        // Stable: equal priorities keep insertion order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_ids: HashMap<String, usize> = HashMap::new();
        let mut pattern_owners: Vec<Vec<(usize, usize)>> = Vec::new();

        for (rule_idx, rule) in rules.iter().enumerate() {
            for (kw_idx, keyword) in rule.keywords.iter().enumerate() {
                let Some(normalized) = normalize_keyword(keyword) else {
                    continue;
                };
                let id = *pattern_ids.entry(normalized.clone()).or_insert_with(|| {
                    patterns.push(normalized);
                    pattern_owners.push(Vec::new());
                    patterns.len() - 1
                });
                pattern_owners[id].push((rule_idx, kw_idx));
            }
        }

        let matcher = if patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::Standard)
                    .build(&patterns)
                    .map_err(|e| Error::classifier(format!("Failed to build rule matcher: {}", e)))?,
            )
        };

        info!(
            rules = rules.len(),
            keywords = patterns.len(),
            "Rule cache built"
        );

        Ok(Self {
            rules,
            matcher,
            pattern_owners,
        })
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn keyword_count(&self) -> usize {
        self.pattern_owners.len()
    }

    /// Per-rule (total hits, distinct keyword indexes) for the given text
    fn accumulate(&self, text: &str) -> Vec<(usize, HashSet<usize>)> {
        let mut accum: Vec<(usize, HashSet<usize>)> = vec![(0, HashSet::new()); self.rules.len()];
        let Some(matcher) = &self.matcher else {
            return accum;
        };

        let normalized = normalize_text(text);
        for m in matcher.find_overlapping_iter(&normalized) {
            for &(rule_idx, kw_idx) in &self.pattern_owners[m.pattern().as_usize()] {
                let (hits, unique) = &mut accum[rule_idx];
                *hits += 1;
                unique.insert(kw_idx);
            }
        }
        accum
    }
}

/// Topics matched for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicResult {
    /// Topic names in rule priority order
    pub topics: Vec<String>,
    pub topic_scores: BTreeMap<String, f64>,
}

impl TopicResult {
    /// Highest topic score, if any topic matched
    pub fn highest_score(&self) -> Option<f64> {
        self.topic_scores.values().copied().reduce(f64::max)
    }
}

/// Applies a rule cache to documents, capped at `max_topics`
#[derive(Clone)]
pub struct TopicMatcher {
    cache: Arc<RuleCache>,
    max_topics: usize,
}

impl TopicMatcher {
    pub fn new(cache: Arc<RuleCache>, max_topics: usize) -> Self {
        Self { cache, max_topics }
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    pub fn classify(&self, raw: &RawContent) -> TopicResult {
        let text = format!("{} {}", raw.title, raw.raw_text);
        let accum = self.cache.accumulate(&text);

        let mut result = TopicResult::default();
        for (rule, (hits, unique)) in self.cache.rules.iter().zip(accum) {
            if result.topics.len() >= self.max_topics {
                break;
            }
            if hits == 0 || result.topic_scores.contains_key(&rule.topic_name) {
                continue;
            }
            let score = rule_score(hits, unique.len(), rule.keywords.len());
            if score >= rule.min_confidence {
                debug!(
                    content_id = %raw.id,
                    topic = %rule.topic_name,
                    score,
                    priority = rule.priority,
                    "Topic matched"
                );
                result.topics.push(rule.topic_name.clone());
                result.topic_scores.insert(rule.topic_name.clone(), score);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn doc(title: &str, body: &str) -> RawContent {
        let mut raw = RawContent::new("doc-1", "https://example.com/a", "example");
        raw.title = title.to_string();
        raw.raw_text = body.to_string();
        raw
    }

    #[test]
    fn test_priority_order_and_word_boundaries() {
        let cache = RuleCache::new(vec![
            ClassificationRule::new("sports", kw(&["hockey", "goal"]), 50),
            ClassificationRule::new("crime", kw(&["police", "arrest"]), 100),
            ClassificationRule::new("mining", kw(&["ore"]), 90),
        ])
        .unwrap();
        let matcher = TopicMatcher::new(Arc::new(cache), 5);

        let result = matcher.classify(&doc(
            "Police arrest suspect after hockey game",
            "The store was closed. Officers made an arrest.",
        ));

        assert_eq!(result.topics, vec!["crime", "sports"]);
        assert!(!result.topic_scores.contains_key("mining"), "'store' must not match 'ore'");
    }

    #[test]
    fn test_multi_word_keyword() {
        let cache = RuleCache::new(vec![ClassificationRule::new(
            "mining",
            kw(&["drill results", "assay"]),
            10,
        )])
        .unwrap();
        let matcher = TopicMatcher::new(Arc::new(cache), 5);

        let result = matcher.classify(&doc("Gold exploration drill results", "Assay pending."));
        assert_eq!(result.topics, vec!["mining"]);
        // 2 hits, full coverage
        let expected = rule_score(2, 2, 2);
        assert!((result.topic_scores["mining"] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_min_confidence_and_disabled_rules() {
        let cache = RuleCache::new(vec![
            ClassificationRule::new("strict", kw(&["a1", "b2", "c3", "d4"]), 10)
                .with_min_confidence(0.9),
            ClassificationRule::new("off", kw(&["a1"]), 20).disabled(),
        ])
        .unwrap();
        assert_eq!(cache.len(), 1);

        let matcher = TopicMatcher::new(Arc::new(cache), 5);
        assert!(matcher.classify(&doc("a1", "")).topics.is_empty());
    }

    #[test]
    fn test_cap_stops_evaluation() {
        let rules = (0..8)
            .map(|i| ClassificationRule::new(format!("t{i}"), kw(&["shared"]), 100 - i))
            .collect();
        let matcher = TopicMatcher::new(Arc::new(RuleCache::new(rules).unwrap()), 3);

        let result = matcher.classify(&doc("shared", ""));
        assert_eq!(result.topics, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let cache = RuleCache::new(vec![
            ClassificationRule::new("second", kw(&["x"]), 5),
            ClassificationRule::new("first", kw(&["x"]), 5),
        ])
        .unwrap();
        let matcher = TopicMatcher::new(Arc::new(cache), 5);
        assert_eq!(matcher.classify(&doc("x", "")).topics, vec!["second", "first"]);
    }

    #[test]
    fn test_empty_cache() {
        let matcher = TopicMatcher::new(Arc::new(RuleCache::new(vec![]).unwrap()), 5);
        let result = matcher.classify(&doc("anything", "at all"));
        assert!(result.topics.is_empty());
        assert_eq!(result.highest_score(), None);
    }

    const VOCAB: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

    proptest! {
        #[test]
        fn prop_topics_subset_ordered_and_capped(
            rule_specs in prop::collection::vec((0usize..6, 0i32..100), 0..12),
            words in prop::collection::vec(0usize..6, 0..20),
            max_topics in 1usize..6,
        ) {
            let rules: Vec<ClassificationRule> = rule_specs
                .iter()
                .enumerate()
                .map(|(i, (w, p))| ClassificationRule::new(format!("topic{i}"), vec![VOCAB[*w].to_string()], *p))
                .collect();
            let priorities: HashMap<String, i32> =
                rules.iter().map(|r| (r.topic_name.clone(), r.priority)).collect();

            let matcher = TopicMatcher::new(Arc::new(RuleCache::new(rules).unwrap()), max_topics);
            let body: Vec<&str> = words.iter().map(|w| VOCAB[*w]).collect();
            let result = matcher.classify(&doc("", &body.join(" ")));

            prop_assert!(result.topics.len() <= max_topics);
            for topic in &result.topics {
                prop_assert!(priorities.contains_key(topic));
            }
            for pair in result.topics.windows(2) {
                prop_assert!(priorities[&pair[0]] >= priorities[&pair[1]]);
            }
        }
    }
}
