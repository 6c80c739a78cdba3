//! Orchestrator integration tests
//!
//! Run full classifications against mock model services and an in-memory
//! reputation store.


use chrono::Utc;
use lodestone_classifiers::{ClassifierConfig, ClassifierOrchestrator, ModelClient};
use lodestone_core::{
    ClassificationRule, ContentSubtype, ContentType, DecisionPath, Domain, Error, RawContent,
    Relevance,
};
use mock_models::{FailingModel, InMemoryReputation, MockModel};
use std::sync::Arc;

const SOURCE: &str = "sudbury-star";

const PARAGRAPHS: &[&str] = &[
    "Police arrested a suspect on Friday after a shooting in the downtown core left one man injured. \
     Officers were called to the area shortly after midnight. Witnesses described hearing several shots.",
    "The victim was taken to hospital with serious but non-life-threatening injuries, according to a \
     police spokesperson. Investigators have not released his name. A second person was treated at the scene.",
    "Residents of the neighbourhood said the arrest came as a relief. Many had stayed indoors through \
     the night while officers searched nearby streets and alleys. Some described the sound of sirens for hours.",
    "The suspect, a 27-year-old man from Sudbury, faces charges including aggravated assault and \
     possession of a prohibited weapon. He is expected to appear in court next week. Police say the \
     investigation is ongoing and more charges are possible.",
    "City council has scheduled a public meeting to discuss safety in the downtown area. Several \
     councillors have asked for more foot patrols. Business owners say the area has become quieter in \
     recent months, but incidents like this one undo that progress.",
    "Anyone with information is asked to contact police or Crime Stoppers. Tips can be submitted \
     anonymously. Video from nearby businesses may help investigators build a timeline of the evening.",
];

fn complete_article(id: &str, url: &str) -> RawContent {
    let mut raw = RawContent::new(id, url, SOURCE);
    raw.title = "Police arrest suspect after downtown shooting in Sudbury".to_string();
    raw.raw_text = PARAGRAPHS.join("\n\n");
    raw.raw_html = Some(format!(
        "<h2>Shooting</h2>{}<img src=\"/scene.jpg\">",
        PARAGRAPHS.iter().map(|p| format!("<p>{p}</p>")).collect::<String>()
    ));
    raw.meta_description = Some("A suspect is in custody after an overnight shooting.".to_string());
    raw.author = Some("Staff Reporter".to_string());
    raw.published_date = Some(Utc::now());
    raw.og_type = Some("article".to_string());
    raw.og_url = Some(url.to_string());
    raw.og_image = Some("https://sudbury.example/scene.jpg".to_string());
    raw.canonical_url = Some(url.to_string());
    raw.word_count = 350;
    raw
}

fn rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            "local_news",
            vec!["council".to_string(), "downtown".to_string()],
            90,
        ),
        ClassificationRule::new(
            "crime",
            vec!["police".to_string(), "shooting".to_string(), "arrest".to_string()],
            100,
        ),
        ClassificationRule::new("weather", vec!["forecast".to_string()], 90),
    ]
}

fn config_with(domains: &[Domain]) -> ClassifierConfig {
    let mut config = ClassifierConfig::default();
    for domain in domains {
        config.domains.get_mut(*domain).enabled = true;
    }
    config
}

struct Harness {
    orchestrator: ClassifierOrchestrator,
    store: Arc<InMemoryReputation>,
    crime: Arc<MockModel>,
    mining: Arc<MockModel>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryReputation::new());
    let crime = Arc::new(
        MockModel::new("crime-model")
            .with_verdict("core_street_crime", 0.8)
            .with_labels(&["violent_crime"])
            .with_model_version("crime-v3"),
    );
    let mining = Arc::new(MockModel::new("mining-model").with_verdict("not_mining", 0.9));

    let orchestrator = ClassifierOrchestrator::builder(config_with(&[Domain::Crime, Domain::Mining]))
        .rules(rules())
        .reputation_store(store.clone())
        .model(Domain::Crime, crime.clone())
        .model(Domain::Mining, mining.clone())
        .build()
        .unwrap();

    Harness {
        orchestrator,
        store,
        crime,
        mining,
    }
}

#[tokio::test]
async fn test_complete_article_classification() {
    let h = harness();
    let raw = complete_article("doc-1", "https://sudbury.example/local/2025/06/shooting-arrest");

    let classification = h.orchestrator.classify(&raw).await.unwrap();
    let result = &classification.result;

    assert_eq!(result.content_type, ContentType::Article);
    assert_eq!(result.content_subtype, None);
    assert_eq!(result.type_method, "og_metadata");
    assert!(result.quality_score >= 70, "quality was {}", result.quality_score);
    assert!(!result.is_spam);
    assert_eq!(result.topics, vec!["crime", "local_news"]);
    assert!(!result.topic_scores.contains_key("weather"));

    let crime = result.hybrid.get(Domain::Crime).unwrap();
    assert_eq!(crime.decision_path, DecisionPath::BothAgree);
    assert_eq!(crime.relevance, Relevance::Core);
    assert!((crime.final_confidence - (crime.rule_confidence + 0.8) / 2.0).abs() < 1e-9);
    assert!(crime.labels.contains(&"violent_crime".to_string()));

    let mining = result.hybrid.get(Domain::Mining).unwrap();
    assert_eq!(mining.relevance, Relevance::NotRelevant);
    assert!(result.hybrid.get(Domain::Entertainment).is_none());

    let location = result.location.as_ref().unwrap();
    assert_eq!(location.city.as_deref(), Some("sudbury"));
    assert_eq!(location.province.as_deref(), Some("ON"));

    assert_eq!(result.classification_method, "hybrid");
    assert_eq!(result.model_version.as_deref(), Some("crime-v3"));
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    assert_eq!(h.crime.call_count(), 1);
    assert_eq!(h.mining.call_count(), 1);

    assert_eq!(classification.history.content_id, "doc-1");
    assert_eq!(classification.history.topics, result.topics);
    assert_eq!(classification.content.id(), "doc-1");
    assert_eq!(classification.content.quality_score, result.quality_score);
}

#[tokio::test]
async fn test_reputation_updated_once_per_document() {
    let h = harness();
    let raw = complete_article("doc-1", "https://sudbury.example/local/story");

    let first = h.orchestrator.classify(&raw).await.unwrap();
    assert_eq!(first.result.source_reputation.total_articles, 0);
    assert_eq!(h.store.get(SOURCE).unwrap().total_articles, 1);

    let second = h.orchestrator.classify(&raw).await.unwrap();
    assert_eq!(second.result.source_reputation.total_articles, 1);
    assert_eq!(h.store.get(SOURCE).unwrap().total_articles, 2);
}

#[tokio::test]
async fn test_event_routes_to_location_only() {
    let h = harness();
    let raw = complete_article("doc-2", "https://sudbury.example/events/summer-festival");

    let result = h.orchestrator.classify(&raw).await.unwrap().result;

    assert_eq!(result.content_subtype, Some(ContentSubtype::Event));
    assert!(result.hybrid.present().is_empty());
    assert!(result.location.is_some());
    assert_eq!(result.classification_method, "rule_based");
    assert_eq!(h.crime.call_count(), 0);
    assert_eq!(h.mining.call_count(), 0);
}

#[tokio::test]
async fn test_blotter_routes_to_crime_only() {
    let h = harness();
    let raw = complete_article("doc-3", "https://sudbury.example/police-blotter/overnight-shooting");

    let result = h.orchestrator.classify(&raw).await.unwrap().result;

    assert_eq!(result.content_subtype, Some(ContentSubtype::Blotter));
    assert_eq!(result.hybrid.present(), vec![Domain::Crime]);
    assert!(result.location.is_none());
    assert_eq!(h.crime.call_count(), 1);
    assert_eq!(h.mining.call_count(), 0);
}

#[tokio::test]
async fn test_pages_run_no_sidecars() {
    let h = harness();
    let mut raw = complete_article("doc-4", "https://sudbury.example/login");
    raw.og_type = None;

    let result = h.orchestrator.classify(&raw).await.unwrap().result;

    assert_eq!(result.content_type, ContentType::Page);
    assert!(result.hybrid.present().is_empty());
    assert!(result.location.is_none());
    assert_eq!(h.crime.call_count() + h.mining.call_count(), 0);
    // Topics and quality still run for pages
    assert!(!result.topics.is_empty());
}

#[tokio::test]
async fn test_model_timeout_is_absorbed() {
    let store = Arc::new(InMemoryReputation::new());
    let crime = Arc::new(FailingModel::new("crime-model").timing_out());
    let orchestrator = ClassifierOrchestrator::builder(config_with(&[Domain::Crime]))
        .rules(rules())
        .reputation_store(store)
        .model(Domain::Crime, crime.clone() as Arc<dyn ModelClient>)
        .build()
        .unwrap();

    let raw = complete_article("doc-5", "https://sudbury.example/local/story");
    let result = orchestrator.classify(&raw).await.unwrap().result;

    let block = result.hybrid.get(Domain::Crime).unwrap();
    assert_eq!(block.decision_path, DecisionPath::RulesOnly);
    assert_eq!(block.relevance, Relevance::Core);
    assert_eq!(block.ml_relevance, None);
    assert_eq!(result.classification_method, "rule_based");
    assert_eq!(result.model_version, None);
    assert_eq!(crime.call_count(), 1);
}

#[tokio::test]
async fn test_reputation_save_failure_does_not_fail_document() {
    let orchestrator = ClassifierOrchestrator::builder(ClassifierConfig::default())
        .reputation_store(Arc::new(InMemoryReputation::failing_saves()))
        .build()
        .unwrap();

    let raw = complete_article("doc-6", "https://sudbury.example/local/story");
    let result = orchestrator.classify(&raw).await.unwrap().result;
    assert!(result.hybrid.present().is_empty());
    assert!(result.topics.is_empty());
}

#[tokio::test]
async fn test_invalid_document_is_rejected() {
    let h = harness();
    let raw = complete_article("", "https://sudbury.example/local/story");

    let err = h.orchestrator.classify(&raw).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(h.store.get(SOURCE).is_none());
}

#[test]
fn test_builder_requires_reputation_store() {
    let result = ClassifierOrchestrator::builder(ClassifierConfig::default()).build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_enabled_domains_and_rule_count() {
    let h = harness();
    assert_eq!(h.orchestrator.enabled_domains(), vec![Domain::Crime, Domain::Mining]);
    assert_eq!(h.orchestrator.rule_count(), 3);
}
