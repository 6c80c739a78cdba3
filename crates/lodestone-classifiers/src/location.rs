//! Location sidecar
//!
//! Rule-only detection of the Canadian city, province or country an article
//! is about. Each zone counts an entity once: headline x3.0, lede x2.5, full
//! body x1.0, multiplied by a specificity bonus (city 3, province 2, country 1).
//! The winner must beat the runner-up by a 30% margin.

use crate::topic::{normalize_keyword, normalize_text};
use aho_corasick::AhoCorasick;
use lodestone_core::{Error, LocationResult, RawContent, Result, Specificity};
use std::collections::HashMap;
use tracing::debug;

const HEADLINE_WEIGHT: f64 = 3.0;
const LEDE_WEIGHT: f64 = 2.5;
const BODY_WEIGHT: f64 = 1.0;

const DOMINANCE_THRESHOLD: f64 = 0.30;
const AMBIGUOUS_CONFIDENCE: f64 = 0.5;
const UNCONTESTED_CONFIDENCE: f64 = 0.95;
const BASE_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_RANGE: f64 = 0.35;

/// (name as written, slug, province code)
const CITIES: &[(&str, &str, &str)] = &[
    ("toronto", "toronto", "ON"),
    ("ottawa", "ottawa", "ON"),
    ("mississauga", "mississauga", "ON"),
    ("brampton", "brampton", "ON"),
    ("hamilton", "hamilton", "ON"),
    ("london", "london", "ON"),
    ("markham", "markham", "ON"),
    ("vaughan", "vaughan", "ON"),
    ("kitchener", "kitchener", "ON"),
    ("windsor", "windsor", "ON"),
    ("sudbury", "sudbury", "ON"),
    ("greater sudbury", "sudbury", "ON"),
    ("thunder bay", "thunder-bay", "ON"),
    ("north bay", "north-bay", "ON"),
    ("sault ste marie", "sault-ste-marie", "ON"),
    ("timmins", "timmins", "ON"),
    ("peterborough", "peterborough", "ON"),
    ("kingston", "kingston", "ON"),
    ("guelph", "guelph", "ON"),
    ("cambridge", "cambridge", "ON"),
    ("waterloo", "waterloo", "ON"),
    ("barrie", "barrie", "ON"),
    ("oshawa", "oshawa", "ON"),
    ("st catharines", "st-catharines", "ON"),
    ("niagara falls", "niagara-falls", "ON"),
    ("welland", "welland", "ON"),
    ("brantford", "brantford", "ON"),
    ("sarnia", "sarnia", "ON"),
    ("belleville", "belleville", "ON"),
    ("cornwall", "cornwall", "ON"),
    ("chatham", "chatham", "ON"),
    ("orillia", "orillia", "ON"),
    ("owen sound", "owen-sound", "ON"),
    ("espanola", "espanola", "ON"),
    ("elliot lake", "elliot-lake", "ON"),
    ("kirkland lake", "kirkland-lake", "ON"),
    ("kapuskasing", "kapuskasing", "ON"),
    ("kenora", "kenora", "ON"),
    ("montreal", "montreal", "QC"),
    ("montréal", "montreal", "QC"),
    ("quebec city", "quebec-city", "QC"),
    ("laval", "laval", "QC"),
    ("gatineau", "gatineau", "QC"),
    ("longueuil", "longueuil", "QC"),
    ("sherbrooke", "sherbrooke", "QC"),
    ("trois rivieres", "trois-rivieres", "QC"),
    ("trois rivières", "trois-rivieres", "QC"),
    ("chicoutimi", "chicoutimi", "QC"),
    ("saguenay", "saguenay", "QC"),
    ("vancouver", "vancouver", "BC"),
    ("surrey", "surrey", "BC"),
    ("burnaby", "burnaby", "BC"),
    ("richmond", "richmond", "BC"),
    ("victoria", "victoria", "BC"),
    ("kelowna", "kelowna", "BC"),
    ("abbotsford", "abbotsford", "BC"),
    ("nanaimo", "nanaimo", "BC"),
    ("kamloops", "kamloops", "BC"),
    ("prince george", "prince-george", "BC"),
    ("chilliwack", "chilliwack", "BC"),
    ("vernon", "vernon", "BC"),
    ("courtenay", "courtenay", "BC"),
    ("calgary", "calgary", "AB"),
    ("edmonton", "edmonton", "AB"),
    ("red deer", "red-deer", "AB"),
    ("lethbridge", "lethbridge", "AB"),
    ("medicine hat", "medicine-hat", "AB"),
    ("grande prairie", "grande-prairie", "AB"),
    ("fort mcmurray", "fort-mcmurray", "AB"),
    ("winnipeg", "winnipeg", "MB"),
    ("brandon", "brandon", "MB"),
    ("steinbach", "steinbach", "MB"),
    ("thompson", "thompson", "MB"),
    ("saskatoon", "saskatoon", "SK"),
    ("regina", "regina", "SK"),
    ("prince albert", "prince-albert", "SK"),
    ("moose jaw", "moose-jaw", "SK"),
    ("halifax", "halifax", "NS"),
    ("dartmouth", "dartmouth", "NS"),
    ("sydney", "sydney", "NS"),
    ("truro", "truro", "NS"),
    ("saint john", "saint-john", "NB"),
    ("moncton", "moncton", "NB"),
    ("fredericton", "fredericton", "NB"),
    ("st johns", "st-johns", "NL"),
    ("st john's", "st-johns", "NL"),
    ("corner brook", "corner-brook", "NL"),
    ("mount pearl", "mount-pearl", "NL"),
    ("charlottetown", "charlottetown", "PE"),
    ("summerside", "summerside", "PE"),
    ("whitehorse", "whitehorse", "YT"),
    ("yellowknife", "yellowknife", "NT"),
    ("iqaluit", "iqaluit", "NU"),
];

const PROVINCES: &[(&str, &str)] = &[
    ("ontario", "ON"),
    ("quebec", "QC"),
    ("québec", "QC"),
    ("british columbia", "BC"),
    ("alberta", "AB"),
    ("manitoba", "MB"),
    ("saskatchewan", "SK"),
    ("nova scotia", "NS"),
    ("new brunswick", "NB"),
    ("newfoundland", "NL"),
    ("newfoundland and labrador", "NL"),
    ("prince edward island", "PE"),
    ("northwest territories", "NT"),
    ("yukon", "YT"),
    ("nunavut", "NU"),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("canada", "canada"),
    ("canadian", "canada"),
    ("united states", "united_states"),
    ("u.s.", "united_states"),
    ("u.s.a.", "united_states"),
    ("usa", "united_states"),
    ("american", "united_states"),
    ("america", "united_states"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Entity {
    City { slug: &'static str, province: &'static str },
    Province(&'static str),
    Country(&'static str),
}

impl Entity {
    fn bonus(&self) -> f64 {
        match self {
            Self::City { .. } => 3.0,
            Self::Province(_) => 2.0,
            Self::Country(_) => 1.0,
        }
    }

    fn into_result(self, confidence: f64) -> LocationResult {
        match self {
            Self::City { slug, province } => LocationResult {
                city: Some(slug.to_string()),
                province: Some(province.to_string()),
                country: "canada".to_string(),
                specificity: Specificity::City,
                confidence,
            },
            Self::Province(code) => LocationResult {
                city: None,
                province: Some(code.to_string()),
                country: "canada".to_string(),
                specificity: Specificity::Province,
                confidence,
            },
            Self::Country(country) => LocationResult {
                city: None,
                province: None,
                country: country.to_string(),
                specificity: Specificity::Country,
                confidence,
            },
        }
    }
}

/// First paragraph of the body
pub fn lede(text: &str) -> &str {
    text.split("\n\n").next().unwrap_or_default().trim()
}

/// Detects where an article takes place from its own text
pub struct LocationClassifier {
    matcher: AhoCorasick,
    entities: Vec<Entity>,
}

impl LocationClassifier {
    pub fn new() -> Result<Self> {
        let mut patterns = Vec::new();
        let mut entities = Vec::new();

        let all = CITIES
            .iter()
            .map(|&(name, slug, province)| (name, Entity::City { slug, province }))
            .chain(PROVINCES.iter().map(|&(name, code)| (name, Entity::Province(code))))
            .chain(COUNTRIES.iter().map(|&(name, country)| (name, Entity::Country(country))));

        for (name, entity) in all {
            if let Some(pattern) = normalize_keyword(name) {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                    entities.push(entity);
                }
            }
        }

        let matcher = AhoCorasick::builder()
            .build(&patterns)
            .map_err(|e| Error::classifier(format!("Failed to build location matcher: {}", e)))?;

        Ok(Self { matcher, entities })
    }

    /// Distinct entities mentioned in a text zone. A match inside a longer
    /// match ("quebec" in "quebec city") does not count.
    fn extract(&self, text: &str) -> Vec<&Entity> {
        let normalized = normalize_text(text);
        let spans: Vec<(usize, usize, usize)> = self
            .matcher
            .find_overlapping_iter(&normalized)
            .map(|m| (m.start(), m.end(), m.pattern().as_usize()))
            .collect();

        let mut found: Vec<&Entity> = Vec::new();
        for &(start, end, id) in &spans {
            let contained = spans
                .iter()
                .any(|&(s, e, _)| s <= start && end <= e && (e - s) > (end - start));
            let entity = &self.entities[id];
            if !contained && !found.contains(&entity) {
                found.push(entity);
            }
        }
        found
    }

    pub fn classify(&self, raw: &RawContent) -> LocationResult {
        let zones = [
            (raw.title.as_str(), HEADLINE_WEIGHT),
            (lede(&raw.raw_text), LEDE_WEIGHT),
            (raw.raw_text.as_str(), BODY_WEIGHT),
        ];

        // Insertion order breaks ties deterministically
        let mut order: Vec<&Entity> = Vec::new();
        let mut scores: HashMap<&Entity, f64> = HashMap::new();
        for (text, weight) in zones {
            for entity in self.extract(text) {
                let score = scores.entry(entity).or_insert_with(|| {
                    order.push(entity);
                    0.0
                });
                *score += weight * entity.bonus();
            }
        }

        let result = Self::dominant(&order, &scores);
        debug!(
            content_id = %raw.id,
            specificity = ?result.specificity,
            confidence = result.confidence,
            "Location classified"
        );
        result
    }

    fn dominant(order: &[&Entity], scores: &HashMap<&Entity, f64>) -> LocationResult {
        let mut ranked: Vec<(&Entity, f64)> = order.iter().map(|e| (*e, scores[e])).collect();
        // Stable sort keeps first-seen order among equal scores
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let Some(&(winner, top)) = ranked.first() else {
            return LocationResult::unknown(0.0);
        };

        let confidence = match ranked.get(1) {
            None => UNCONTESTED_CONFIDENCE,
            Some(&(_, second)) => {
                let margin = (top - second) / top;
                if margin < DOMINANCE_THRESHOLD {
                    return LocationResult::unknown(AMBIGUOUS_CONFIDENCE);
                }
                BASE_CONFIDENCE
                    + (margin - DOMINANCE_THRESHOLD) / (1.0 - DOMINANCE_THRESHOLD) * CONFIDENCE_RANGE
            }
        };

        winner.clone().into_result(confidence)
    }
}
