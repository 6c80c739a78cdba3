//! Street-crime rules
//!
//! Positive families run over the title plus the first 500 body characters.
//! Exclusions and the international downgrade look at the title only, so stray
//! body text can neither hide nor demote a local crime story.

use super::RULE_BODY_CHARS;
use crate::classifier::{DomainRules, RuleVerdict};
use lodestone_core::types::truncate_chars;
use lodestone_core::{DecisionPath, Domain, Error, HybridResult, Relevance, Result};
use regex::Regex;
use std::collections::BTreeSet;

const EXCLUSION_CONFIDENCE: f64 = 0.95;
const DEFAULT_CONFIDENCE: f64 = 0.5;
const INTERNATIONAL_DOWNGRADE: f64 = 0.7;
const HOMEPAGE_MIN_CONFIDENCE: f64 = 0.75;
const RULE_HIGH_CONFIDENCE: f64 = 0.85;
const MIN_JUSTICE_SIGNALS: usize = 2;

/// Words that tie an incident to police or courts
const AUTHORITY: &str = "police|rcmp|opp|court|judge|investigation|suspect|accused|officer|constable|\
detective|prosecution|charged|arrest|sentenced|convicted|custody|detained|apprehended|wanted|manhunt";

const EXCLUSIONS: &[&str] = &[
    r"(?i)^(register|sign up|login|subscribe)",
    r"(?i)^(listings? by|directory|careers|jobs)",
    r"(?i)(part.time|full.time|hiring|position)",
    r"(?i)^local (sports|events|weather)$",
    r"(?i)^(opinion|editorial|commentary|letters?|column|op-ed)\s*:",
    r"(?i)\b(i think|in my view|in our view|we believe|my view)\b",
    r"(?i)\b(renovation|contractor|tournament|recipe|travel guide)\b",
    r"(?i)\bbest\s+.+\s+in\s+the\s+.+\s+area\b",
];

const INTERNATIONAL: &str = r"(?i)(minneapolis|u\.s\.|american|mexico|european|israel)";

const JUSTICE: &str =
    r"(?i)(charged|arrest|sentenced|trial|convicts?\b|convicted|found guilty|pleaded guilty|prison term)";

const JUSTICE_VERBS: &[&str] = &[
    "charged",
    "arrested",
    "arraigned",
    "pleads",
    "pleaded",
    "sentenced",
    "convicted",
    "acquitted",
    "appeals",
    "appealed",
    "investigation launched",
    "warrant issued",
    "indicted",
];

const JURISDICTIONS: &[&str] = &[
    "court",
    "judge",
    "prosecutor",
    "crown",
    "district attorney",
    "police",
    "rcmp",
    "opp",
    "fbi",
    "justice department",
];

/// How a family tags the crime types it detects
#[derive(Debug, Clone, Copy)]
enum Tagging {
    Fixed(&'static str),
    /// Crime types come from the charge words in the text
    FromCharges,
}

struct Family {
    name: &'static str,
    tagging: Tagging,
    patterns: Vec<(Regex, f64)>,
}

/// Either-order pairing of an action with the authority words
fn with_authority(action: &str, confidence: f64) -> Vec<(String, f64)> {
    vec![
        (format!("(?i)({action}).*({AUTHORITY})"), confidence),
        (format!("(?i)({AUTHORITY}).*({action})"), confidence),
    ]
}

fn family_specs() -> Vec<(&'static str, Tagging, Vec<(String, f64)>)> {
    let mut violent = Vec::new();
    violent.extend(with_authority("murder|homicide|manslaughter", 0.95));
    violent.extend(with_authority("shooting|shootout|shot dead|gunfire", 0.90));
    violent.extend(with_authority(r"\bstab|stabbing|stabbed", 0.90));
    violent.extend(with_authority("robbery|robbed|armed robbery", 0.85));
    violent.extend(with_authority(r"carjack\w*", 0.90));
    violent.extend(with_authority(r"kidnap\w*|abduct\w*", 0.90));
    violent.extend([
        ("(?i)(assault|assaulted).*(charged|arrest|police)".to_string(), 0.85),
        ("(?i)(charged|arrest|police).*(assault|assaulted)".to_string(), 0.85),
        ("(?i)(sexual assault|rape|sex assault)".to_string(), 0.90),
        ("(?i)(found dead|human remains)".to_string(), 0.80),
        ("(?i)hostage".to_string(), 0.90),
    ]);

    let owned = |specs: &[(&str, f64)]| -> Vec<(String, f64)> {
        specs.iter().map(|(p, c)| (p.to_string(), *c)).collect()
    };

    vec![
        ("violent", Tagging::Fixed("violent_crime"), violent),
        (
            "property",
            Tagging::Fixed("property_crime"),
            owned(&[
                ("(?i)(theft|stolen|shoplifting).*(police|arrest)", 0.85),
                ("(?i)(burglary|break.in)", 0.85),
                ("(?i)arson", 0.80),
                (r"(?i)\$[\d,]+.*(stolen|theft)", 0.85),
            ]),
        ),
        (
            "drug",
            Tagging::Fixed("drug_crime"),
            owned(&[
                ("(?i)(drug bust|drug raid|drug seizure)", 0.90),
                ("(?i)(fentanyl|cocaine|heroin).*(seiz|arrest|trafficking)", 0.90),
            ]),
        ),
        (
            "court_outcome",
            Tagging::Fixed("criminal_justice"),
            owned(&[
                (
                    r"(?i)(sentenced|convicts?\b|convicted|found guilty|pleaded guilty|prison term).*(court|judge|jury|prison|jail|penitentiary|charges)",
                    0.85,
                ),
                (
                    r"(?i)(court|judge|jury).*(sentenced|convicts?\b|convicted|found guilty|pleaded guilty|prison term)",
                    0.85,
                ),
            ]),
        ),
        (
            "accusation",
            Tagging::FromCharges,
            owned(&[
                ("(?i)(faces?|facing|charged with).*(assault|drug|weapon|theft|robbery).*charges", 0.85),
                ("(?i)(assault|drug|weapon|theft|robbery).*charges.*(faces?|facing|charged with)", 0.85),
                ("(?i)(faces?|facing|charged with).*charges.*(assault|drug|weapon|theft|robbery)", 0.85),
            ]),
        ),
        (
            "weapon",
            Tagging::Fixed("violent_crime"),
            owned(&[
                ("(?i)(weapons?).*(charges|arrest|charged|police)", 0.85),
                ("(?i)(charges|arrest|charged|police).*(weapons?)", 0.85),
            ]),
        ),
    ]
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::classifier(format!("Invalid crime pattern '{}': {}", pattern, e)))
}

/// Regex rule families for street crime
pub struct CrimeRules {
    exclusions: Vec<Regex>,
    families: Vec<Family>,
    international: Regex,
    justice: Regex,
}

impl CrimeRules {
    pub fn new() -> Result<Self> {
        let exclusions = EXCLUSIONS.iter().map(|p| compile(p)).collect::<Result<Vec<_>>>()?;

        let families = family_specs()
            .into_iter()
            .map(|(name, tagging, specs)| {
                let patterns = specs
                    .iter()
                    .map(|(p, c)| compile(p).map(|re| (re, *c)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Family {
                    name,
                    tagging,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exclusions,
            families,
            international: compile(INTERNATIONAL)?,
            justice: compile(JUSTICE)?,
        })
    }

    fn is_excluded(&self, title: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(title))
    }
}

fn push_unique(types: &mut Vec<String>, crime_type: &str) {
    if !types.iter().any(|t| t == crime_type) {
        types.push(crime_type.to_string());
    }
}

fn charge_types(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let mut types = Vec::new();
    if ["assault", "weapon", "robbery"].iter().any(|w| lower.contains(w)) {
        types.push("violent_crime");
    }
    if lower.contains("drug") {
        types.push("drug_crime");
    }
    if lower.contains("theft") {
        types.push("property_crime");
    }
    types
}

/// Crime category pages for a set of crime types
pub fn category_pages(crime_types: &[String]) -> Vec<String> {
    let mut pages = BTreeSet::new();
    for crime_type in crime_types {
        let mapped: &[&str] = match crime_type.as_str() {
            "violent_crime" => &["violent-crime", "crime"],
            "property_crime" => &["property-crime", "crime"],
            "drug_crime" => &["drug-crime", "crime"],
            "gang_violence" => &["gang-violence", "crime"],
            "organized_crime" => &["organized-crime", "crime"],
            "criminal_justice" => &["court-news"],
            "other_crime" => &["crime"],
            _ => &[],
        };
        pages.extend(mapped.iter().map(|p| p.to_string()));
    }
    pages.into_iter().collect()
}

impl DomainRules for CrimeRules {
    fn domain(&self) -> Domain {
        Domain::Crime
    }

    fn evaluate(&self, title: &str, body: &str) -> RuleVerdict {
        if self.is_excluded(title) {
            return RuleVerdict::new(Relevance::NotRelevant, EXCLUSION_CONFIDENCE);
        }

        let text = format!("{} {}", title, truncate_chars(body, RULE_BODY_CHARS));
        let mut relevance = Relevance::NotRelevant;
        let mut confidence = DEFAULT_CONFIDENCE;
        let mut crime_types: Vec<String> = Vec::new();

        for family in &self.families {
            for (pattern, pattern_confidence) in &family.patterns {
                if !pattern.is_match(&text) {
                    continue;
                }
                relevance = Relevance::Core;
                confidence = confidence.max(*pattern_confidence);
                match family.tagging {
                    Tagging::Fixed(crime_type) => push_unique(&mut crime_types, crime_type),
                    Tagging::FromCharges => {
                        for crime_type in charge_types(&text) {
                            push_unique(&mut crime_types, crime_type);
                        }
                        // One accusation match is enough
                        break;
                    }
                }
                tracing::trace!(family = family.name, "Crime pattern matched");
            }
        }

        if relevance == Relevance::Core && self.international.is_match(title) {
            relevance = Relevance::Peripheral;
            confidence *= INTERNATIONAL_DOWNGRADE;
        }

        if !crime_types.is_empty() && self.justice.is_match(&text) {
            push_unique(&mut crime_types, "criminal_justice");
        }

        RuleVerdict::new(relevance, confidence).with_labels(crime_types)
    }

    fn label_field(&self) -> &'static str {
        "crime_types"
    }

    fn finalize(&self, result: &mut HybridResult, title: &str, body: &str) {
        let homepage_eligible = match result.decision_path {
            DecisionPath::BothAgree => result.final_confidence >= HOMEPAGE_MIN_CONFIDENCE,
            DecisionPath::RuleOverride | DecisionPath::RulesOnly => {
                result.rule_confidence >= RULE_HIGH_CONFIDENCE
            }
            _ => false,
        };
        result
            .attributes
            .insert("homepage_eligible".to_string(), homepage_eligible.into());
        result.attributes.insert(
            "category_pages".to_string(),
            serde_json::json!(category_pages(&result.labels)),
        );

        result.sub_label = (result.relevance == Relevance::Peripheral).then(|| {
            let text = format!("{} {}", title, body).to_lowercase();
            let signals = usize::from(JURISDICTIONS.iter().any(|j| text.contains(j)))
                + usize::from(JUSTICE_VERBS.iter().any(|v| text.contains(v)));
            if signals >= MIN_JUSTICE_SIGNALS {
                "criminal_justice".to_string()
            } else {
                "crime_context".to_string()
            }
        });
    }
}
