//! Hybrid (rule + remote model) domain verdicts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Domains covered by a hybrid classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Crime,
    Mining,
    Entertainment,
    Industry,
    Indigenous,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Crime,
        Domain::Mining,
        Domain::Entertainment,
        Domain::Industry,
        Domain::Indigenous,
    ];

    /// Name used in configuration and the routing table
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crime => "crime",
            Self::Mining => "mining",
            Self::Entertainment => "entertainment",
            Self::Industry => "industry",
            Self::Indigenous => "indigenous",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    /// Wire label the domain's model service uses for a relevance class
    pub fn label(&self, relevance: Relevance) -> &'static str {
        match (self, relevance) {
            (Self::Crime, Relevance::Core) => "core_street_crime",
            (Self::Crime, Relevance::Peripheral) => "peripheral_crime",
            (Self::Crime, Relevance::NotRelevant) => "not_crime",
            (Self::Mining, Relevance::Core) => "core_mining",
            (Self::Mining, Relevance::Peripheral) => "peripheral_mining",
            (Self::Mining, Relevance::NotRelevant) => "not_mining",
            (Self::Entertainment, Relevance::Core) => "core_entertainment",
            (Self::Entertainment, Relevance::Peripheral) => "peripheral_entertainment",
            (Self::Entertainment, Relevance::NotRelevant) => "not_entertainment",
            (Self::Industry, Relevance::Core) => "core_industry",
            (Self::Industry, Relevance::Peripheral) => "peripheral_industry",
            (Self::Industry, Relevance::NotRelevant) => "not_industry",
            (Self::Indigenous, Relevance::Core) => "core_indigenous",
            (Self::Indigenous, Relevance::Peripheral) => "peripheral_indigenous",
            (Self::Indigenous, Relevance::NotRelevant) => "not_indigenous",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tri-state relevance verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Core,
    Peripheral,
    NotRelevant,
}

impl Relevance {
    /// Parse a domain label such as `core_street_crime` or `not_mining`
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label == "core" || label.starts_with("core_") {
            Some(Self::Core)
        } else if label == "peripheral" || label.starts_with("peripheral_") {
            Some(Self::Peripheral)
        } else if label.starts_with("not_") || label == "not_relevant" || label == "none" {
            Some(Self::NotRelevant)
        } else {
            None
        }
    }
}

/// Which row of the decision matrix produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    BothAgree,
    RuleOverride,
    RulesOnly,
    MlOverride,
    MlUpgrade,
    Default,
}

/// Merged verdict for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResult {
    pub relevance: Relevance,

    /// Domain-specific tags (crime types, commodities, categories, industries)
    #[serde(default)]
    pub labels: Vec<String>,

    pub final_confidence: f64,

    pub review_required: bool,

    pub decision_path: DecisionPath,

    pub rule_relevance: Relevance,

    pub rule_confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_relevance: Option<Relevance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Finer label for peripheral verdicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_label: Option<String>,

    /// Extra domain fields returned by the model service or derived locally
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl HybridResult {
    pub fn is_core(&self) -> bool {
        self.relevance == Relevance::Core
    }
}

/// Optional result block per domain; absent blocks are omitted when serialized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crime: Option<HybridResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining: Option<HybridResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entertainment: Option<HybridResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<HybridResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indigenous: Option<HybridResult>,
}

impl HybridResults {
    pub fn get(&self, domain: Domain) -> Option<&HybridResult> {
        match domain {
            Domain::Crime => self.crime.as_ref(),
            Domain::Mining => self.mining.as_ref(),
            Domain::Entertainment => self.entertainment.as_ref(),
            Domain::Industry => self.industry.as_ref(),
            Domain::Indigenous => self.indigenous.as_ref(),
        }
    }

    pub fn set(&mut self, domain: Domain, result: HybridResult) {
        let slot = match domain {
            Domain::Crime => &mut self.crime,
            Domain::Mining => &mut self.mining,
            Domain::Entertainment => &mut self.entertainment,
            Domain::Industry => &mut self.industry,
            Domain::Indigenous => &mut self.indigenous,
        };
        *slot = Some(result);
    }

    /// Domains that produced a block
    pub fn present(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|d| self.get(*d).is_some())
            .collect()
    }

    /// Model version of the first block that reported one
    pub fn model_version(&self) -> Option<&str> {
        Domain::ALL
            .into_iter()
            .filter_map(|d| self.get(d))
            .find_map(|r| r.model_version.as_deref())
    }
}

/// How precisely a location could be pinned down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    City,
    Province,
    Country,
    Unknown,
}

/// Output of the location sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,

    pub country: String,

    pub specificity: Specificity,

    pub confidence: f64,
}

impl LocationResult {
    pub fn unknown(confidence: f64) -> Self {
        Self {
            city: None,
            province: None,
            country: "unknown".to_string(),
            specificity: Specificity::Unknown,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_from_label() {
        assert_eq!(Relevance::from_label("core_street_crime"), Some(Relevance::Core));
        assert_eq!(Relevance::from_label("peripheral_crime"), Some(Relevance::Peripheral));
        assert_eq!(Relevance::from_label("not_mining"), Some(Relevance::NotRelevant));
        assert_eq!(Relevance::from_label("CORE_MINING"), Some(Relevance::Core));
        assert_eq!(Relevance::from_label("maybe"), None);
    }

    #[test]
    fn test_domain_labels_round_trip() {
        for domain in Domain::ALL {
            for relevance in [Relevance::Core, Relevance::Peripheral, Relevance::NotRelevant] {
                assert_eq!(Relevance::from_label(domain.label(relevance)), Some(relevance));
            }
            assert_eq!(Domain::from_name(domain.name()), Some(domain));
        }
    }

    #[test]
    fn test_absent_blocks_are_omitted() {
        let mut results = HybridResults::default();
        results.set(
            Domain::Mining,
            HybridResult {
                relevance: Relevance::Core,
                labels: vec!["gold".to_string()],
                final_confidence: 0.9,
                review_required: false,
                decision_path: DecisionPath::BothAgree,
                rule_relevance: Relevance::Core,
                rule_confidence: 0.85,
                ml_relevance: Some(Relevance::Core),
                ml_confidence: Some(0.95),
                model_version: Some("mining-v1".to_string()),
                sub_label: None,
                attributes: BTreeMap::new(),
            },
        );

        let json = serde_json::to_value(&results).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["mining"]["relevance"], "core");
        assert_eq!(obj["mining"]["decision_path"], "both_agree");
        assert!(obj["mining"].get("sub_label").is_none());
        assert_eq!(results.present(), vec![Domain::Mining]);
        assert_eq!(results.model_version(), Some("mining-v1"));
    }
}
