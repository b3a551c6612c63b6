// Category classifier - turns raw text into a ClassificationResult.
//
// Order of evaluation:
// 1. Rule-based pre-filters (URLs, shouting) short-circuit everything else.
// 2. The external classification service, when configured and the text is
//    long enough.
// 3. Deterministic keyword fallback whenever step 2 is skipped or fails.
//
// The classifier never fails outward. Service errors and timeouts are logged
// and routed to the keyword fallback.

use super::classification_models::{Category, ClassificationResult};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Texts shorter than this (after trimming) skip the external service.
const MIN_MODEL_TEXT_CHARS: usize = 5;
/// Service scores at or below this are discarded.
const MIN_MODEL_SCORE: f64 = 0.1;
/// All-caps texts longer than this trip the shouting pre-filter.
const SHOUTING_MIN_CHARS: usize = 15;

const HATE_WORDS: &[&str] = &["hate", "stupid", "idiot", "retard", "kill all", "die"];
const VIOLENCE_WORDS: &[&str] = &["kill", "hurt", "violence", "attack", "fight", "punch"];
const SEXUAL_WORDS: &[&str] = &["sex", "nude", "naked", "porn", "xxx", "adult"];
const SPAM_WORDS: &[&str] = &["free", "offer", "win", "prize", "click", "buy now"];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classification service unavailable: {0}")]
    Unavailable(String),

    #[error("Classification service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classification service HTTP error: {0}")]
    Http(String),

    #[error("Invalid classification response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// PROVIDER TRAIT (PORT)
// ============================================================================

/// One label/score pair returned by a classification service.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// A multi-label text classification backend.
///
/// Implementations live in the infra layer (HTTP model endpoints); tests use
/// stubs. The classifier only depends on this trait.
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    /// Score `text` independently against every label in `labels`.
    async fn score_labels(
        &self,
        text: &str,
        labels: &[Category],
    ) -> Result<Vec<LabelScore>, ClassifierError>;
}

#[async_trait]
impl ClassificationProvider for Box<dyn ClassificationProvider> {
    async fn score_labels(
        &self,
        text: &str,
        labels: &[Category],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        (**self).score_labels(text, labels).await
    }
}

// ============================================================================
// RULES
// ============================================================================

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+|www\.\S+").expect("URL pattern is valid"))
}

pub fn contains_url(text: &str) -> bool {
    url_pattern().is_match(text)
}

/// Upper-casing leaves the text unchanged. Texts without letters count too.
pub fn is_all_caps(text: &str) -> bool {
    text.to_uppercase() == text
}

/// Pre-filters checked before any model call.
pub fn prefilter(text: &str) -> Option<ClassificationResult> {
    if contains_url(text) {
        return Some(ClassificationResult::from_detected([(Category::Spam, 0.8)]));
    }

    if is_all_caps(text) && text.chars().count() > SHOUTING_MIN_CHARS {
        return Some(ClassificationResult::from_detected([
            (Category::Harassment, 0.6),
            (Category::Spam, 0.5),
        ]));
    }

    None
}

/// Keyword fallback used when no classification service result is available.
pub fn rule_based_classification(text: &str) -> ClassificationResult {
    let lower = text.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut detected = Vec::new();
    if mentions(HATE_WORDS) {
        detected.push((Category::HateSpeech, 0.7));
    }
    if mentions(VIOLENCE_WORDS) {
        detected.push((Category::Violence, 0.6));
    }
    if mentions(SEXUAL_WORDS) {
        detected.push((Category::SexualContent, 0.5));
    }
    if mentions(SPAM_WORDS) {
        detected.push((Category::Spam, 0.4));
    }

    ClassificationResult::from_detected(detected)
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct CategoryClassifier {
    provider: Option<Box<dyn ClassificationProvider>>,
    timeout: Duration,
}

impl CategoryClassifier {
    /// Create a classifier. `provider = None` means rule-based only.
    pub fn new(provider: Option<Box<dyn ClassificationProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn rule_based() -> Self {
        Self::new(None, Duration::from_secs(0))
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Classify text. Always returns a normalized result.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        if let Some(result) = prefilter(text) {
            return result;
        }

        let provider = match &self.provider {
            Some(provider) if text.trim().chars().count() >= MIN_MODEL_TEXT_CHARS => provider,
            _ => return rule_based_classification(text),
        };

        match self.score_with_provider(&**provider, text).await {
            Ok(scores) => {
                let detected = scores
                    .into_iter()
                    .filter(|s| s.score > MIN_MODEL_SCORE)
                    .map(|s| (Category::parse(&s.label), s.score));
                ClassificationResult::from_detected(detected)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Classification service failed, using keyword fallback");
                rule_based_classification(text)
            }
        }
    }

    async fn score_with_provider(
        &self,
        provider: &dyn ClassificationProvider,
        text: &str,
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        match tokio::time::timeout(self.timeout, provider.score_labels(text, &Category::POLICY))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.timeout)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider returning fixed scores and counting calls.
    struct FixedProvider {
        scores: Vec<(&'static str, f64)>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ClassificationProvider for FixedProvider {
        async fn score_labels(
            &self,
            _text: &str,
            _labels: &[Category],
        ) -> Result<Vec<LabelScore>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .scores
                .iter()
                .map(|(label, score)| LabelScore {
                    label: label.to_string(),
                    score: *score,
                })
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ClassificationProvider for FailingProvider {
        async fn score_labels(
            &self,
            _text: &str,
            _labels: &[Category],
        ) -> Result<Vec<LabelScore>, ClassifierError> {
            Err(ClassifierError::Unavailable("model offline".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl ClassificationProvider for SlowProvider {
        async fn score_labels(
            &self,
            _text: &str,
            _labels: &[Category],
        ) -> Result<Vec<LabelScore>, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn with_provider(provider: impl ClassificationProvider + 'static) -> CategoryClassifier {
        let provider: Box<dyn ClassificationProvider> = Box::new(provider);
        CategoryClassifier::new(Some(provider), Duration::from_millis(200))
    }

    fn fixed(scores: Vec<(&'static str, f64)>) -> (CategoryClassifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = with_provider(FixedProvider {
            scores,
            calls: Arc::clone(&calls),
        });
        (classifier, calls)
    }

    fn assert_normalized(result: &ClassificationResult) {
        assert!(result.contains(&Category::NormalContent));
        assert!((result.total() - 1.0).abs() < 1e-6, "sum was {}", result.total());
    }

    #[tokio::test]
    async fn url_prefilter_wins_over_provider() {
        let (classifier, calls) = fixed(vec![("violence", 0.9)]);

        let result = classifier.classify("check out https://example.com now").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.len(), 2);
        assert!((result.score(&Category::Spam) - 0.8).abs() < 1e-9);
        assert_normalized(&result);
    }

    #[tokio::test]
    async fn www_links_count_as_urls() {
        let result = CategoryClassifier::rule_based()
            .classify("visit www.example.org today")
            .await;
        assert!(result.contains(&Category::Spam));
    }

    #[tokio::test]
    async fn shouting_prefilter_fires_for_long_caps() {
        let result = CategoryClassifier::rule_based()
            .classify("FREE OFFER CLICK NOW TO WIN!!!")
            .await;

        assert!((result.score(&Category::Harassment) - 0.5).abs() < 1e-9);
        assert!((result.score(&Category::Spam) - 0.5 / 1.2).abs() < 1e-9);
        assert_normalized(&result);
    }

    #[tokio::test]
    async fn short_caps_text_is_not_shouting() {
        let result = CategoryClassifier::rule_based().classify("HELLO THERE").await;
        assert!(!result.contains(&Category::Harassment));
    }

    #[tokio::test]
    async fn fallback_detects_violence() {
        let result = CategoryClassifier::rule_based().classify("I will kill you").await;

        assert!((result.score(&Category::Violence) - 0.6).abs() < 1e-9);
        assert!((result.score(&Category::NormalContent) - 0.4).abs() < 1e-9);
        assert!(!result.contains(&Category::HateSpeech));
    }

    #[tokio::test]
    async fn fallback_keyword_sets_accumulate() {
        let result = CategoryClassifier::rule_based()
            .classify("I hate you, free prize inside")
            .await;

        assert!(result.contains(&Category::HateSpeech));
        assert!(result.contains(&Category::Spam));
        assert!(!result.contains(&Category::Violence));
        assert_normalized(&result);
    }

    #[tokio::test]
    async fn provider_scores_are_filtered_and_normalized() {
        let (classifier, calls) = fixed(vec![
            ("harassment", 0.7),
            ("spam", 0.1),
            ("misinformation", 0.05),
        ]);

        let result = classifier.classify("you are a terrible person").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.contains(&Category::Harassment));
        assert!(!result.contains(&Category::Spam));
        assert!(!result.contains(&Category::Misinformation));
        assert_normalized(&result);
    }

    #[tokio::test]
    async fn provider_with_nothing_above_threshold_is_normal() {
        let (classifier, _) = fixed(vec![("spam", 0.02)]);
        let result = classifier.classify("lovely weather today").await;

        assert_eq!(result.len(), 1);
        assert!((result.score(&Category::NormalContent) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn short_text_skips_provider() {
        let (classifier, calls) = fixed(vec![("violence", 0.9)]);
        let result = classifier.classify(" die ").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result.contains(&Category::HateSpeech));
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_keywords() {
        let classifier = with_provider(FailingProvider);
        let result = classifier.classify("I will kill you").await;
        assert!(result.contains(&Category::Violence));
        assert_normalized(&result);
    }

    #[tokio::test]
    async fn provider_timeout_falls_back_to_keywords() {
        let classifier = with_provider(SlowProvider);
        let result = classifier.classify("I will kill you").await;
        assert!(result.contains(&Category::Violence));
    }
}
