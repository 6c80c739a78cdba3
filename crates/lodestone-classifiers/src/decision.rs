//! Decision matrix merging a rule verdict with an optional model verdict
//!
//! Rows are evaluated top to bottom and the first match wins. The table is the
//! single source of truth for every (rule, model) combination.

use lodestone_core::{DecisionPath, Relevance};

/// Model confidence needed to override a non-core rule verdict
pub const ML_OVERRIDE_THRESHOLD: f64 = 0.90;

const RULE_OVERRIDE_DISCOUNT: f64 = 0.7;
const ML_OVERRIDE_DISCOUNT: f64 = 0.8;

#[derive(Debug, Clone, Copy)]
enum RuleMatch {
    Core,
    NotCore,
    Peripheral,
    Any,
}

#[derive(Debug, Clone, Copy)]
enum ModelMatch {
    Core,
    CoreAtLeast(f64),
    NotRelevant,
    Any,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Rule,
    Fixed(Relevance),
}

#[derive(Debug, Clone, Copy)]
enum Confidence {
    Average,
    Rule,
    RuleTimes(f64),
    Model,
    ModelTimes(f64),
}

#[derive(Debug, Clone, Copy)]
struct Row {
    rule: RuleMatch,
    model: ModelMatch,
    /// Row only applies to domains that allow model upgrades
    upgrade_only: bool,
    outcome: Outcome,
    confidence: Confidence,
    review_required: bool,
    path: DecisionPath,
}

const MATRIX: [Row; 6] = [
    Row {
        rule: RuleMatch::Core,
        model: ModelMatch::Core,
        upgrade_only: false,
        outcome: Outcome::Fixed(Relevance::Core),
        confidence: Confidence::Average,
        review_required: false,
        path: DecisionPath::BothAgree,
    },
    Row {
        rule: RuleMatch::Core,
        model: ModelMatch::NotRelevant,
        upgrade_only: false,
        outcome: Outcome::Fixed(Relevance::Core),
        confidence: Confidence::RuleTimes(RULE_OVERRIDE_DISCOUNT),
        review_required: true,
        path: DecisionPath::RuleOverride,
    },
    Row {
        rule: RuleMatch::Core,
        model: ModelMatch::Any,
        upgrade_only: false,
        outcome: Outcome::Fixed(Relevance::Core),
        confidence: Confidence::Rule,
        review_required: false,
        path: DecisionPath::RulesOnly,
    },
    Row {
        rule: RuleMatch::NotCore,
        model: ModelMatch::CoreAtLeast(ML_OVERRIDE_THRESHOLD),
        upgrade_only: false,
        outcome: Outcome::Fixed(Relevance::Peripheral),
        confidence: Confidence::ModelTimes(ML_OVERRIDE_DISCOUNT),
        review_required: true,
        path: DecisionPath::MlOverride,
    },
    Row {
        rule: RuleMatch::Peripheral,
        model: ModelMatch::Core,
        upgrade_only: true,
        outcome: Outcome::Fixed(Relevance::Core),
        confidence: Confidence::Model,
        review_required: false,
        path: DecisionPath::MlUpgrade,
    },
    Row {
        rule: RuleMatch::Any,
        model: ModelMatch::Any,
        upgrade_only: false,
        outcome: Outcome::Rule,
        confidence: Confidence::Rule,
        review_required: false,
        path: DecisionPath::Default,
    },
];

/// Merged verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub relevance: Relevance,
    pub confidence: f64,
    pub review_required: bool,
    pub path: DecisionPath,
}

/// Merge a rule verdict with a model verdict (`None` when the model was
/// unreachable or not configured)
pub fn decide(
    rule: (Relevance, f64),
    model: Option<(Relevance, f64)>,
    allow_upgrade: bool,
) -> Decision {
    let (rule_relevance, rule_conf) = rule;

    let row = MATRIX
        .iter()
        .find(|row| {
            (!row.upgrade_only || allow_upgrade)
                && rule_matches(row.rule, rule_relevance)
                && model_matches(row.model, model)
        })
        .unwrap_or(&MATRIX[MATRIX.len() - 1]);

    let model_conf = model.map(|(_, c)| c).unwrap_or(rule_conf);
    let confidence = match row.confidence {
        Confidence::Average => (rule_conf + model_conf) / 2.0,
        Confidence::Rule => rule_conf,
        Confidence::RuleTimes(f) => rule_conf * f,
        Confidence::Model => model_conf,
        Confidence::ModelTimes(f) => model_conf * f,
    };

    Decision {
        relevance: match row.outcome {
            Outcome::Rule => rule_relevance,
            Outcome::Fixed(r) => r,
        },
        confidence: confidence.clamp(0.0, 1.0),
        review_required: row.review_required,
        path: row.path,
    }
}

fn rule_matches(pattern: RuleMatch, relevance: Relevance) -> bool {
    match pattern {
        RuleMatch::Core => relevance == Relevance::Core,
        RuleMatch::NotCore => relevance != Relevance::Core,
        RuleMatch::Peripheral => relevance == Relevance::Peripheral,
        RuleMatch::Any => true,
    }
}

fn model_matches(pattern: ModelMatch, model: Option<(Relevance, f64)>) -> bool {
    match (pattern, model) {
        (ModelMatch::Any, _) => true,
        (ModelMatch::Core, Some((Relevance::Core, _))) => true,
        (ModelMatch::CoreAtLeast(min), Some((Relevance::Core, c))) => c >= min,
        (ModelMatch::NotRelevant, Some((Relevance::NotRelevant, _))) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Relevance::{Core, NotRelevant, Peripheral};

    struct Case {
        name: &'static str,
        rule: (Relevance, f64),
        model: Option<(Relevance, f64)>,
        allow_upgrade: bool,
        relevance: Relevance,
        confidence: f64,
        review: bool,
        path: DecisionPath,
    }

    #[test]
    fn test_decision_matrix() {
        let cases = [
            Case {
                name: "both core averages",
                rule: (Core, 0.8),
                model: Some((Core, 0.9)),
                allow_upgrade: false,
                relevance: Core,
                confidence: 0.85,
                review: false,
                path: DecisionPath::BothAgree,
            },
            Case {
                name: "rule core, model not relevant",
                rule: (Core, 0.8),
                model: Some((NotRelevant, 0.99)),
                allow_upgrade: false,
                relevance: Core,
                confidence: 0.56,
                review: true,
                path: DecisionPath::RuleOverride,
            },
            Case {
                name: "rule core, model unreachable",
                rule: (Core, 0.8),
                model: None,
                allow_upgrade: false,
                relevance: Core,
                confidence: 0.8,
                review: false,
                path: DecisionPath::RulesOnly,
            },
            Case {
                name: "rule core, model peripheral",
                rule: (Core, 0.75),
                model: Some((Peripheral, 0.7)),
                allow_upgrade: true,
                relevance: Core,
                confidence: 0.75,
                review: false,
                path: DecisionPath::RulesOnly,
            },
            Case {
                name: "rule not relevant, confident model core",
                rule: (NotRelevant, 0.5),
                model: Some((Core, 0.95)),
                allow_upgrade: false,
                relevance: Peripheral,
                confidence: 0.76,
                review: true,
                path: DecisionPath::MlOverride,
            },
            Case {
                name: "threshold is inclusive",
                rule: (Peripheral, 0.6),
                model: Some((Core, 0.90)),
                allow_upgrade: true,
                relevance: Peripheral,
                confidence: 0.72,
                review: true,
                path: DecisionPath::MlOverride,
            },
            Case {
                name: "rule not relevant, unsure model core",
                rule: (NotRelevant, 0.5),
                model: Some((Core, 0.89)),
                allow_upgrade: true,
                relevance: NotRelevant,
                confidence: 0.5,
                review: false,
                path: DecisionPath::Default,
            },
            Case {
                name: "peripheral upgraded where allowed",
                rule: (Peripheral, 0.6),
                model: Some((Core, 0.8)),
                allow_upgrade: true,
                relevance: Core,
                confidence: 0.8,
                review: false,
                path: DecisionPath::MlUpgrade,
            },
            Case {
                name: "peripheral kept where upgrade not allowed",
                rule: (Peripheral, 0.6),
                model: Some((Core, 0.8)),
                allow_upgrade: false,
                relevance: Peripheral,
                confidence: 0.6,
                review: false,
                path: DecisionPath::Default,
            },
            Case {
                name: "peripheral with model unreachable",
                rule: (Peripheral, 0.6),
                model: None,
                allow_upgrade: true,
                relevance: Peripheral,
                confidence: 0.6,
                review: false,
                path: DecisionPath::Default,
            },
            Case {
                name: "both not relevant",
                rule: (NotRelevant, 0.5),
                model: Some((NotRelevant, 0.97)),
                allow_upgrade: false,
                relevance: NotRelevant,
                confidence: 0.5,
                review: false,
                path: DecisionPath::Default,
            },
        ];

        for case in cases {
            let decision = decide(case.rule, case.model, case.allow_upgrade);
            assert_eq!(decision.relevance, case.relevance, "{}", case.name);
            assert!(
                (decision.confidence - case.confidence).abs() < 1e-9,
                "{}: confidence {} != {}",
                case.name,
                decision.confidence,
                case.confidence
            );
            assert_eq!(decision.review_required, case.review, "{}", case.name);
            assert_eq!(decision.path, case.path, "{}", case.name);
        }
    }

    #[test]
    fn test_every_combination_has_a_row() {
        let relevances = [Core, Peripheral, NotRelevant];
        for rule in relevances {
            for model in relevances.iter().map(|r| Some((*r, 0.5))).chain([None]) {
                for allow_upgrade in [false, true] {
                    let d = decide((rule, 0.5), model, allow_upgrade);
                    assert!((0.0..=1.0).contains(&d.confidence));
                }
            }
        }
    }
}
