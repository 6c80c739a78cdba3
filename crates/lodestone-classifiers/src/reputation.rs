//! Stage 4: source reputation

use crate::config::ReputationConfig;
use chrono::{DateTime, Utc};
use lodestone_core::{
    Error, ReputationRank, ReputationSnapshot, ReputationStore, Result, SourceReputation,
};
use std::sync::Arc;
use tracing::debug;

const TRUST_BOOST: f64 = 1.1;
const TRUST_MIN_AVERAGE_QUALITY: f64 = 70.0;
const TRUST_MAX_SPAM_RATIO: f64 = 0.05;

/// Rank for a score; only established sources can be trusted
pub fn rank_for(score: i32, total_articles: i64, min_articles_for_trust: i64) -> ReputationRank {
    if score >= 75 && total_articles >= min_articles_for_trust {
        ReputationRank::Trusted
    } else if score >= 50 {
        ReputationRank::Moderate
    } else if score >= 30 {
        ReputationRank::Low
    } else {
        ReputationRank::Spam
    }
}

/// Fold one classified article into a reputation record
///
/// The score moves toward the article's quality with exponential decay:
/// `new = old * decay_rate + quality * (1 - decay_rate)`. Established sources
/// with a clean record get a trust boost before clamping to 0-100.
pub fn apply_sample(
    reputation: &mut SourceReputation,
    config: &ReputationConfig,
    quality_score: u32,
    is_spam: bool,
    now: DateTime<Utc>,
) {
    let quality = f64::from(quality_score);

    reputation.total_articles += 1;
    let n = reputation.total_articles as f64;
    reputation.average_quality_score += (quality - reputation.average_quality_score) / n;

    if is_spam || quality_score < config.spam_threshold {
        reputation.spam_count += 1;
    }

    let decay = config.decay_rate.clamp(0.0, 1.0);
    let mut score = f64::from(reputation.reputation_score) * decay + quality * (1.0 - decay);

    if reputation.total_articles >= config.min_articles_for_trust
        && reputation.average_quality_score >= TRUST_MIN_AVERAGE_QUALITY
        && reputation.spam_ratio() < TRUST_MAX_SPAM_RATIO
    {
        score *= TRUST_BOOST;
    }

    reputation.reputation_score = score.round().clamp(0.0, 100.0) as i32;
    reputation.last_classified_at = Some(now);
}

/// Reads and updates per-source trust through a [`ReputationStore`]
#[derive(Clone)]
pub struct ReputationScorer {
    store: Arc<dyn ReputationStore>,
    config: ReputationConfig,
}

impl ReputationScorer {
    pub fn new(store: Arc<dyn ReputationStore>, config: ReputationConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    /// Current snapshot for a source, creating the row at the default score
    pub async fn score(&self, source_name: &str) -> Result<ReputationSnapshot> {
        let reputation = self
            .store
            .get_or_create(source_name, self.config.default_score)
            .await
            .map_err(|e| Error::storage(format!("failed to get source reputation: {}", e)))?;

        let snapshot = self.snapshot(&reputation);
        debug!(
            source_name,
            score = snapshot.score,
            rank = ?snapshot.rank,
            total_articles = snapshot.total_articles,
            "Source reputation scored"
        );
        Ok(snapshot)
    }

    /// Record one classified article for its source
    pub async fn update(&self, source_name: &str, quality_score: u32, is_spam: bool) -> Result<SourceReputation> {
        let mut reputation = self
            .store
            .get_or_create(source_name, self.config.default_score)
            .await
            .map_err(|e| Error::storage(format!("failed to get source for update: {}", e)))?;

        apply_sample(&mut reputation, &self.config, quality_score, is_spam, Utc::now());

        self.store
            .save(&reputation)
            .await
            .map_err(|e| Error::storage(format!("failed to update source: {}", e)))?;

        debug!(
            source_name,
            new_score = reputation.reputation_score,
            total_articles = reputation.total_articles,
            avg_quality = reputation.average_quality_score,
            spam_count = reputation.spam_count,
            "Source reputation updated"
        );
        Ok(reputation)
    }

    pub fn snapshot(&self, reputation: &SourceReputation) -> ReputationSnapshot {
        ReputationSnapshot {
            score: reputation.reputation_score,
            rank: rank_for(
                reputation.reputation_score,
                reputation.total_articles,
                self.config.min_articles_for_trust,
            ),
            total_articles: reputation.total_articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapStore {
        rows: Mutex<HashMap<String, SourceReputation>>,
    }

    #[async_trait]
    impl ReputationStore for MapStore {
        async fn get_or_create(&self, source_name: &str, default_score: i32) -> Result<SourceReputation> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows
                .entry(source_name.to_string())
                .or_insert_with(|| SourceReputation::new(source_name, default_score))
                .clone())
        }

        async fn save(&self, reputation: &SourceReputation) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(reputation.source_name.clone(), reputation.clone());
            Ok(())
        }
    }

    #[test]
    fn test_ranks() {
        assert_eq!(rank_for(80, 10, 10), ReputationRank::Trusted);
        assert_eq!(rank_for(80, 3, 10), ReputationRank::Moderate);
        assert_eq!(rank_for(50, 0, 10), ReputationRank::Moderate);
        assert_eq!(rank_for(30, 0, 10), ReputationRank::Low);
        assert_eq!(rank_for(29, 100, 10), ReputationRank::Spam);
    }

    #[test]
    fn test_decay_moves_toward_sample() {
        let config = ReputationConfig::default();
        let mut rep = SourceReputation::new("example", 50);

        apply_sample(&mut rep, &config, 90, false, Utc::now());
        // 50 * 0.1 + 90 * 0.9 = 86
        assert_eq!(rep.reputation_score, 86);
        assert_eq!(rep.total_articles, 1);
        assert_eq!(rep.average_quality_score, 90.0);
        assert_eq!(rep.spam_count, 0);

        apply_sample(&mut rep, &config, 20, true, Utc::now());
        assert_eq!(rep.spam_count, 1);
        assert_eq!(rep.average_quality_score, 55.0);
        assert!(rep.reputation_score < 30);
        assert!(rep.last_classified_at.is_some());
    }

    #[test]
    fn test_trust_boost_is_clamped() {
        let config = ReputationConfig::default();
        let mut rep = SourceReputation::new("example", 95);
        for _ in 0..12 {
            apply_sample(&mut rep, &config, 100, false, Utc::now());
        }
        assert_eq!(rep.reputation_score, 100);
        assert_eq!(rank_for(rep.reputation_score, rep.total_articles, 10), ReputationRank::Trusted);
    }

    #[tokio::test]
    async fn test_scorer_creates_then_updates() {
        let store = Arc::new(MapStore::default());
        let scorer = ReputationScorer::new(store.clone(), ReputationConfig::default());

        let before = scorer.score("new-source").await.unwrap();
        assert_eq!(before.score, 50);
        assert_eq!(before.total_articles, 0);

        scorer.update("new-source", 80, false).await.unwrap();
        let after = scorer.score("new-source").await.unwrap();
        assert_eq!(after.total_articles, 1);
        assert_eq!(after.score, 77);
    }
}
