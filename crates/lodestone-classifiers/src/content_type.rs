//! Stage 1: content type and subtype detection
//!
//! Strategies are tried in order and the first one that decides wins:
//! 1. URL exclusions (account pages, classifieds, section indexes, pagination, homepage)
//! 2. Job postings (Open Graph `job` or a `/jobs/` path)
//! 3. Open Graph type (`website` is ignored)
//! 4. Listing-page text patterns
//! 5. Article heuristic (length, title, published date, description)
//! 6. Default to `page`

use lodestone_core::types::non_empty;
use lodestone_core::{ContentSubtype, ContentType, RawContent};
use tracing::debug;
use url::Url;

const URL_EXCLUSION_CONFIDENCE: f64 = 0.9;
const OG_CONFIDENCE: f64 = 1.0;
const JOB_PATH_CONFIDENCE: f64 = 0.85;
const LISTING_PAGE_CONFIDENCE: f64 = 0.85;
const ARTICLE_CONFIDENCE: f64 = 0.75;
const PAGE_CONFIDENCE: f64 = 0.6;

const MIN_ARTICLE_WORDS: usize = 200;
const MIN_READ_MORE_FOR_LISTING: usize = 3;
const MIN_DATES_FOR_LISTING: usize = 5;
const MIN_DATELINES_FOR_LISTING: usize = 3;

/// Path prefixes that never hold articles; subpaths are excluded too
const ALWAYS_EXCLUDED_PREFIXES: &[&str] = &[
    "/account",
    "/login",
    "/signin",
    "/signup",
    "/register",
    "/classifieds",
    "/classified",
    "/ads",
    "/advertisements",
    "/directory",
    "/submissions",
    "/category",
    "/categories",
    "/browse",
    "/listings",
    "/search",
    "/results",
];

/// Section paths excluded only as exact paths; `/news/some-story` passes
const SECTION_INDEX_PATHS: &[&str] = &[
    "/news",
    "/articles",
    "/stories",
    "/posts",
    "/blog",
    "/ontario-news",
    "/local-news",
    "/breaking-news",
];

const PAGINATION_PARAMS: &[&str] = &[
    "page",
    "p",
    "pagenum",
    "paged",
    "page_num",
    "page_number",
    "offset",
    "start",
    "from",
];

const READ_MORE_PATTERNS: &[&str] = &[
    "read more",
    "read more >",
    "read more>>",
    "continue reading",
    "full story",
];

const MONTH_PATTERNS: &[&str] = &[
    "jan ", "feb ", "mar ", "apr ", "may ", "jun ", "jul ", "aug ", "sep ", "oct ", "nov ", "dec ",
];

const DATELINE_PATTERNS: &[&str] = &[
    "toronto —",
    "ottawa —",
    "ontario —",
    "vancouver —",
    "montreal —",
    "calgary —",
    "edmonton —",
];

/// (URL segments, title prefixes) per article subtype, checked in order
const SUBTYPE_SIGNALS: &[(ContentSubtype, &[&str], &[&str])] = &[
    (
        ContentSubtype::PressRelease,
        &["press-release", "press-releases", "news-release", "news-releases", "media-release"],
        &["press release", "news release", "media release", "media advisory"],
    ),
    (
        ContentSubtype::Blotter,
        &["blotter", "police-blotter", "police-briefs", "crime-log"],
        &["police blotter", "police briefs", "crime log"],
    ),
    (
        ContentSubtype::Event,
        &["event", "events", "calendar"],
        &["event:", "upcoming event"],
    ),
    (
        ContentSubtype::Report,
        &["report", "reports"],
        &["report:", "annual report"],
    ),
];

/// Result of content type classification
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeResult {
    pub content_type: ContentType,
    pub subtype: Option<ContentSubtype>,

    /// Confidence score (0.0-1.0)
    pub confidence: f64,

    /// `url_exclusion`, `og_metadata`, `url_pattern`, `content_pattern`, `heuristic` or `default`
    pub method: &'static str,
}

impl ContentTypeResult {
    fn new(content_type: ContentType, confidence: f64, method: &'static str) -> Self {
        Self {
            content_type,
            subtype: None,
            confidence,
            method,
        }
    }
}

/// Determines the type of content (article, page, video, image, job)
#[derive(Debug, Clone, Default)]
pub struct ContentTypeClassifier;

impl ContentTypeClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, raw: &RawContent) -> ContentTypeResult {
        let mut result = self.classify_type(raw);
        if result.content_type == ContentType::Article {
            result.subtype = detect_subtype(&raw.url, &raw.title);
        }

        debug!(
            content_id = %raw.id,
            content_type = %result.content_type,
            subtype = ?result.subtype,
            method = result.method,
            "Content type classified"
        );
        result
    }

    fn classify_type(&self, raw: &RawContent) -> ContentTypeResult {
        if is_non_article_url(&raw.url) {
            return ContentTypeResult::new(
                ContentType::Page,
                URL_EXCLUSION_CONFIDENCE,
                "url_exclusion",
            );
        }

        let og_type = non_empty(&raw.og_type).map(str::to_lowercase);

        if let Some(result) = detect_job(&raw.url, og_type.as_deref()) {
            return result;
        }

        if let Some(result) = og_type.as_deref().and_then(classify_og_type) {
            return result;
        }

        if is_listing_page(&raw.raw_text) {
            return ContentTypeResult::new(
                ContentType::Page,
                LISTING_PAGE_CONFIDENCE,
                "content_pattern",
            );
        }

        if has_article_characteristics(raw) {
            return ContentTypeResult::new(ContentType::Article, ARTICLE_CONFIDENCE, "heuristic");
        }

        ContentTypeResult::new(ContentType::Page, PAGE_CONFIDENCE, "default")
    }
}

fn classify_og_type(og_type: &str) -> Option<ContentTypeResult> {
    if og_type == "website" {
        return None;
    }
    let content_type = if og_type == "news" || og_type.contains("article") {
        ContentType::Article
    } else if og_type.contains("video") {
        ContentType::Video
    } else if og_type.contains("image") {
        ContentType::Image
    } else {
        return None;
    };
    Some(ContentTypeResult::new(content_type, OG_CONFIDENCE, "og_metadata"))
}

fn detect_job(url: &str, og_type: Option<&str>) -> Option<ContentTypeResult> {
    if og_type.is_some_and(|t| t.contains("job")) {
        return Some(ContentTypeResult::new(ContentType::Job, OG_CONFIDENCE, "og_metadata"));
    }
    let path = url_path(url)?;
    if path.contains("/jobs/") || path.contains("/job/") {
        return Some(ContentTypeResult::new(
            ContentType::Job,
            JOB_PATH_CONFIDENCE,
            "url_pattern",
        ));
    }
    None
}

fn url_path(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_lowercase())
}

/// URL patterns that indicate non-article content
pub fn is_non_article_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return is_non_article_url_fallback(url),
    };

    let path = parsed.path().to_lowercase();

    if ALWAYS_EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| matches_prefix(&path, prefix))
    {
        return true;
    }

    if SECTION_INDEX_PATHS
        .iter()
        .any(|section| path == *section || path == format!("{section}/"))
    {
        return true;
    }

    let query = parsed.query().unwrap_or_default().to_lowercase();
    if query.contains("returnurl=") || query.contains("redirect=") {
        return true;
    }

    if has_pagination_query(&parsed) {
        return true;
    }

    path.is_empty() || path == "/"
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn has_pagination_query(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| {
        PAGINATION_PARAMS.contains(&key.to_lowercase().as_str()) && is_numeric(value.trim())
    })
}

fn is_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_non_article_url_fallback(url: &str) -> bool {
    let lower = url.to_lowercase();
    ALWAYS_EXCLUDED_PREFIXES.iter().any(|p| lower.contains(p))
        || SECTION_INDEX_PATHS.iter().any(|s| lower.contains(s))
        || lower.contains("returnurl=")
        || lower.contains("redirect=")
}

fn count_all(text: &str, patterns: &[&str]) -> usize {
    patterns.iter().map(|p| text.matches(p).count()).sum()
}

/// Listing/index pages repeat "read more" links, dates or datelines
fn is_listing_page(text: &str) -> bool {
    let lower = text.to_lowercase();
    count_all(&lower, READ_MORE_PATTERNS) >= MIN_READ_MORE_FOR_LISTING
        || count_all(&lower, MONTH_PATTERNS) >= MIN_DATES_FOR_LISTING
        || count_all(&lower, DATELINE_PATTERNS) >= MIN_DATELINES_FOR_LISTING
}

fn has_article_characteristics(raw: &RawContent) -> bool {
    raw.effective_word_count() >= MIN_ARTICLE_WORDS
        && !raw.title.trim().is_empty()
        && raw.published_date.is_some()
        && raw.description().is_some()
}

/// Article subtype from URL path segments, then title prefixes
pub fn detect_subtype(url: &str, title: &str) -> Option<ContentSubtype> {
    let path = url_path(url).unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let title = title.trim().to_lowercase();

    SUBTYPE_SIGNALS
        .iter()
        .find(|(_, url_segments, title_prefixes)| {
            segments.iter().any(|s| url_segments.contains(s))
                || title_prefixes.iter().any(|p| title.starts_with(p))
        })
        .map(|(subtype, _, _)| *subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(url: &str) -> RawContent {
        let mut raw = RawContent::new("doc-1", url, "example");
        raw.title = "Council approves new transit plan".to_string();
        raw.word_count = 450;
        raw.published_date = Some(Utc::now());
        raw.meta_description = Some("Transit plan approved".to_string());
        raw
    }

    #[test]
    fn test_url_exclusions() {
        for url in [
            "https://example.com/",
            "https://example.com/login",
            "https://example.com/classifieds/job-listings",
            "https://example.com/news",
            "https://example.com/news/",
            "https://example.com/story?page=2",
            "https://example.com/account?returnUrl=/x",
        ] {
            assert!(is_non_article_url(url), "{url} should be excluded");
        }

        for url in [
            "https://example.com/news/council-approves-plan",
            "https://example.com/story?page=abc",
            "https://example.com/adsorption-study",
        ] {
            assert!(!is_non_article_url(url), "{url} should pass");
        }
    }

    #[test]
    fn test_og_type_article() {
        let classifier = ContentTypeClassifier::new();
        let mut raw = RawContent::new("doc-1", "https://example.com/news/a-story", "example");
        raw.og_type = Some("article".to_string());

        let result = classifier.classify(&raw);
        assert_eq!(result.content_type, ContentType::Article);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, "og_metadata");
    }

    #[test]
    fn test_og_website_falls_through_to_heuristic() {
        let classifier = ContentTypeClassifier::new();
        let mut raw = article("https://example.com/news/a-story");
        raw.og_type = Some("website".to_string());

        let result = classifier.classify(&raw);
        assert_eq!(result.content_type, ContentType::Article);
        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.method, "heuristic");
    }

    #[test]
    fn test_video_and_job() {
        let classifier = ContentTypeClassifier::new();
        let mut raw = RawContent::new("doc-1", "https://example.com/watch/1", "example");
        raw.og_type = Some("video.other".to_string());
        assert_eq!(classifier.classify(&raw).content_type, ContentType::Video);

        let raw = RawContent::new("doc-2", "https://example.com/jobs/welder-123", "example");
        assert_eq!(classifier.classify(&raw).content_type, ContentType::Job);
    }

    #[test]
    fn test_listing_page() {
        let classifier = ContentTypeClassifier::new();
        let mut raw = article("https://example.com/latest");
        raw.raw_text = "Story one. Read more. Story two. Read more. Story three. Read more.".into();

        let result = classifier.classify(&raw);
        assert_eq!(result.content_type, ContentType::Page);
        assert_eq!(result.method, "content_pattern");
    }

    #[test]
    fn test_default_page() {
        let classifier = ContentTypeClassifier::new();
        let mut raw = article("https://example.com/about-us");
        raw.published_date = None;

        let result = classifier.classify(&raw);
        assert_eq!(result.content_type, ContentType::Page);
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.subtype, None);
    }

    #[test]
    fn test_subtypes() {
        assert_eq!(
            detect_subtype("https://example.com/events/summer-fair", "Summer fair"),
            Some(ContentSubtype::Event)
        );
        assert_eq!(
            detect_subtype("https://example.com/news/x", "Police blotter: weekend arrests"),
            Some(ContentSubtype::Blotter)
        );
        assert_eq!(
            detect_subtype("https://example.com/press-releases/q3", "Q3 results"),
            Some(ContentSubtype::PressRelease)
        );
        assert_eq!(
            detect_subtype("https://example.com/reports/budget", "Budget"),
            Some(ContentSubtype::Report)
        );
        assert_eq!(detect_subtype("https://example.com/news/x", "Council vote"), None);
    }
}
