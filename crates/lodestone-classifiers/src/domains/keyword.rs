//! Term-list rules for the mining, entertainment, industry and indigenous domains

use super::RULE_BODY_CHARS;
use crate::classifier::{DomainRules, RuleVerdict};
use crate::topic::{normalize_keyword, normalize_text};
use aho_corasick::AhoCorasick;
use lodestone_core::types::truncate_chars;
use lodestone_core::{Domain, Error, Relevance, Result};
use std::collections::{BTreeSet, HashMap};

const CORE_IN_TITLE_CONFIDENCE: f64 = 0.85;
const CORE_IN_TEXT_CONFIDENCE: f64 = 0.75;
const PERIPHERAL_CONFIDENCE: f64 = 0.6;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Static vocabulary of one domain
pub struct TermSet {
    /// Terms that on their own mark a document as about the domain
    pub core: &'static [&'static str],
    /// Terms that only suggest the domain
    pub peripheral: &'static [&'static str],
    /// Label -> terms that carry it
    pub labels: &'static [(&'static str, &'static [&'static str])],
    /// Field the domain's model service uses for labels
    pub label_field: &'static str,
}

pub static MINING: TermSet = TermSet {
    core: &[
        "mining", "mine", "mines", "miner", "miners", "drill results", "drill program",
        "drilling program", "drill hole", "assay", "assays", "ore", "orebody", "mineral exploration",
        "mineral deposit", "mineral resource", "open pit", "underground mine", "tailings",
        "high grade", "grams per tonne", "prospecting", "claim staking", "smelter",
        "feasibility study", "junior miner",
    ],
    peripheral: &[
        "exploration", "critical minerals", "geologist", "geology", "commodity prices",
        "tsx venture", "royalty", "refinery",
    ],
    labels: &[
        ("gold", &["gold"]),
        ("copper", &["copper"]),
        ("nickel", &["nickel"]),
        ("lithium", &["lithium"]),
        ("uranium", &["uranium"]),
        ("silver", &["silver"]),
        ("zinc", &["zinc"]),
        ("iron", &["iron ore"]),
        ("cobalt", &["cobalt"]),
        ("graphite", &["graphite"]),
        ("potash", &["potash"]),
        ("platinum_group", &["platinum", "palladium"]),
    ],
    label_field: "commodities",
};

pub static ENTERTAINMENT: TermSet = TermSet {
    core: &[
        "film", "films", "movie", "movies", "premiere", "premieres", "box office", "album",
        "concert", "oscar", "oscars", "grammy", "grammys", "emmy", "emmys", "juno awards",
        "tv series", "television series", "broadway", "music video", "red carpet", "cannes",
        "tiff", "film festival", "soundtrack", "actor", "actress",
    ],
    peripheral: &[
        "celebrity", "director", "singer", "band", "musician", "comedian", "comedy",
        "entertainment", "hollywood", "streaming", "podcast", "tour",
    ],
    labels: &[
        ("film", &["film", "films", "movie", "movies", "box office", "cannes", "tiff", "film festival"]),
        ("music", &["album", "concert", "grammy", "grammys", "juno awards", "music video", "singer", "band", "musician"]),
        ("television", &["tv series", "television series", "emmy", "emmys", "streaming"]),
        ("awards", &["oscar", "oscars", "grammy", "grammys", "emmy", "emmys", "juno awards", "red carpet"]),
        ("theatre", &["broadway", "theatre production"]),
        ("celebrity", &["celebrity", "hollywood", "red carpet"]),
    ],
    label_field: "categories",
};

pub static INDUSTRY: TermSet = TermSet {
    core: &[
        "startup", "startups", "series a", "series b", "series c", "seed round", "venture capital",
        "funding round", "sdk", "api", "open source", "open sources", "developer", "developers",
        "saas", "software", "cloud computing", "machine learning", "artificial intelligence",
    ],
    peripheral: &[
        "technology", "tech", "innovation", "ipo", "investors", "layoffs", "data center",
        "cybersecurity", "semiconductor", "app",
    ],
    labels: &[
        ("startups", &["startup", "startups"]),
        ("venture_capital", &["series a", "series b", "series c", "seed round", "venture capital", "funding round"]),
        ("software", &["sdk", "api", "saas", "software", "developer", "developers"]),
        ("open_source", &["open source", "open sources"]),
        ("ai", &["machine learning", "artificial intelligence"]),
        ("cloud", &["cloud computing", "data center"]),
        ("hardware", &["semiconductor"]),
    ],
    label_field: "industries",
};

pub static INDIGENOUS: TermSet = TermSet {
    core: &[
        "anishinaabe", "anishinaabek", "anishinaabemowin", "ojibwe", "ojibway", "first nation",
        "first nations", "indigenous", "metis", "métis", "inuit", "cree", "oji cree", "mohawk",
        "haudenosaunee", "treaty rights", "residential school", "residential schools",
        "band council", "powwow", "truth and reconciliation", "land claim",
    ],
    peripheral: &[
        "reconciliation", "reserve", "elder", "elders", "land acknowledgement",
        "traditional territory", "language revitalization", "sweat lodge", "smudging", "aboriginal",
    ],
    labels: &[
        ("language", &["anishinaabemowin", "language revitalization"]),
        ("treaty", &["treaty rights", "land claim", "traditional territory"]),
        ("education", &["residential school", "residential schools", "truth and reconciliation"]),
        ("governance", &["band council", "first nation", "first nations"]),
        ("culture", &["powwow", "sweat lodge", "smudging", "elder", "elders"]),
    ],
    label_field: "categories",
};

/// Term set for a keyword domain; crime uses regex rules instead
pub fn term_set(domain: Domain) -> Option<&'static TermSet> {
    match domain {
        Domain::Crime => None,
        Domain::Mining => Some(&MINING),
        Domain::Entertainment => Some(&ENTERTAINMENT),
        Domain::Industry => Some(&INDUSTRY),
        Domain::Indigenous => Some(&INDIGENOUS),
    }
}

#[derive(Debug, Default)]
struct TermInfo {
    core: bool,
    labels: Vec<&'static str>,
}

/// Keyword relevance rules over one automaton per domain
///
/// A core term in the title gives core at 0.85, two distinct core terms
/// anywhere give core at 0.75, a peripheral term or a lone body core term
/// gives peripheral at 0.6, anything else is not relevant at 0.5.
pub struct KeywordRules {
    domain: Domain,
    label_field: &'static str,
    matcher: AhoCorasick,
    terms: Vec<TermInfo>,
}

impl KeywordRules {
    pub fn new(domain: Domain, set: &'static TermSet) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::new();
        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut terms: Vec<TermInfo> = Vec::new();

        let mut intern = |term: &str| -> Option<usize> {
            let normalized = normalize_keyword(term)?;
            Some(*ids.entry(normalized.clone()).or_insert_with(|| {
                patterns.push(normalized);
                terms.push(TermInfo::default());
                patterns.len() - 1
            }))
        };

        let mut core_ids = Vec::new();
        for term in set.core {
            core_ids.extend(intern(term));
        }
        for term in set.peripheral {
            intern(term);
        }
        let mut labelled = Vec::new();
        for (label, label_terms) in set.labels {
            for term in *label_terms {
                if let Some(id) = intern(term) {
                    labelled.push((id, *label));
                }
            }
        }

        for id in core_ids {
            terms[id].core = true;
        }
        for (id, label) in labelled {
            terms[id].labels.push(label);
        }

        let matcher = AhoCorasick::builder()
            .build(&patterns)
            .map_err(|e| Error::classifier(format!("Failed to build {} term matcher: {}", domain, e)))?;

        Ok(Self {
            domain,
            label_field: set.label_field,
            matcher,
            terms,
        })
    }

    fn matches(&self, text: &str) -> BTreeSet<usize> {
        let normalized = normalize_text(text);
        self.matcher
            .find_overlapping_iter(&normalized)
            .map(|m| m.pattern().as_usize())
            .collect()
    }
}

impl DomainRules for KeywordRules {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn evaluate(&self, title: &str, body: &str) -> RuleVerdict {
        let title_hits = self.matches(title);
        let body_hits = self.matches(truncate_chars(body, RULE_BODY_CHARS));

        let core_in_title = title_hits.iter().any(|id| self.terms[*id].core);
        let all_hits: BTreeSet<usize> = title_hits.union(&body_hits).copied().collect();
        let distinct_core = all_hits.iter().filter(|id| self.terms[**id].core).count();
        let any_peripheral = all_hits.iter().any(|id| !self.terms[*id].core);

        let (relevance, confidence) = if core_in_title {
            (Relevance::Core, CORE_IN_TITLE_CONFIDENCE)
        } else if distinct_core >= 2 {
            (Relevance::Core, CORE_IN_TEXT_CONFIDENCE)
        } else if any_peripheral || distinct_core == 1 {
            (Relevance::Peripheral, PERIPHERAL_CONFIDENCE)
        } else {
            (Relevance::NotRelevant, DEFAULT_CONFIDENCE)
        };

        let mut labels: Vec<String> = Vec::new();
        for id in &all_hits {
            for label in &self.terms[*id].labels {
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.to_string());
                }
            }
        }

        RuleVerdict::new(relevance, confidence).with_labels(labels)
    }

    fn label_field(&self) -> &'static str {
        self.label_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(domain: Domain) -> KeywordRules {
        KeywordRules::new(domain, term_set(domain).unwrap()).unwrap()
    }

    #[test]
    fn test_mining_core_in_title() {
        let verdict = rules(Domain::Mining).evaluate(
            "Gold exploration drill results in Ontario",
            "Assay results show high-grade intercept.",
        );
        assert_eq!(verdict.relevance, Relevance::Core);
        assert_eq!(verdict.confidence, 0.85);
        assert_eq!(verdict.labels, vec!["gold"]);
    }

    #[test]
    fn test_domain_titles() {
        let cases = [
            (Domain::Indigenous, "Anishinaabe community celebrates language revitalization"),
            (Domain::Entertainment, "Oscar-winning film premieres at Cannes"),
            (Domain::Industry, "Startup open-sources developer SDK after Series A"),
        ];
        for (domain, title) in cases {
            let verdict = rules(domain).evaluate(title, "");
            assert_eq!(verdict.relevance, Relevance::Core, "{domain}: {title}");
            assert!(!verdict.labels.is_empty(), "{domain}: {title}");
        }
    }

    #[test]
    fn test_unrelated_title_is_not_relevant() {
        for domain in [Domain::Mining, Domain::Entertainment, Domain::Industry, Domain::Indigenous] {
            let verdict = rules(domain).evaluate("Weather forecast for the weekend", "");
            assert_eq!(verdict.relevance, Relevance::NotRelevant, "{domain}");
            assert_eq!(verdict.confidence, 0.5);
        }
    }

    #[test]
    fn test_body_terms() {
        let mining = rules(Domain::Mining);

        let single = mining.evaluate("Council meeting recap", "The mine expansion was discussed.");
        assert_eq!(single.relevance, Relevance::Peripheral);

        let double = mining.evaluate("Council meeting recap", "The mine expansion and its tailings pond.");
        assert_eq!(double.relevance, Relevance::Core);
        assert_eq!(double.confidence, 0.75);
    }

    #[test]
    fn test_word_boundaries() {
        // "ore" inside "store", "api" inside "capital"
        let verdict = rules(Domain::Mining).evaluate("Local store reopens", "");
        assert_eq!(verdict.relevance, Relevance::NotRelevant);
        let verdict = rules(Domain::Industry).evaluate("Capital city parade", "");
        assert_eq!(verdict.relevance, Relevance::NotRelevant);
    }
}
