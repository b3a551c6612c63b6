// Classification domain models - the closed category set and the normalized
// probability distribution produced for every submission.
//
// These are pure domain types with no transport or storage dependencies.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Minimum share of probability mass kept for "normal content".
const MIN_NORMAL_SHARE: f64 = 0.1;

// ============================================================================
// CATEGORY
// ============================================================================

/// A content-policy label.
///
/// The seven policy categories plus the synthetic `NormalContent` form the
/// closed set the classifier scores against. Any other label (an external
/// service returning something unexpected, an old record written by a
/// different build) lands in `Other` and takes the default threshold and
/// weight everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    HateSpeech,
    Harassment,
    Violence,
    SelfHarm,
    SexualContent,
    Spam,
    Misinformation,
    NormalContent,
    Other(String),
}

impl Category {
    /// The policy categories submitted to the external classification service.
    pub const POLICY: [Category; 7] = [
        Category::HateSpeech,
        Category::Harassment,
        Category::Violence,
        Category::SelfHarm,
        Category::SexualContent,
        Category::Spam,
        Category::Misinformation,
    ];

    /// Parse a label as written in records and service responses.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "hate speech" => Category::HateSpeech,
            "harassment" => Category::Harassment,
            "violence" => Category::Violence,
            "self-harm" => Category::SelfHarm,
            "sexual content" => Category::SexualContent,
            "spam" => Category::Spam,
            "misinformation" => Category::Misinformation,
            "normal content" => Category::NormalContent,
            _ => Category::Other(label.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::HateSpeech => "hate speech",
            Category::Harassment => "harassment",
            Category::Violence => "violence",
            Category::SelfHarm => "self-harm",
            Category::SexualContent => "sexual content",
            Category::Spam => "spam",
            Category::Misinformation => "misinformation",
            Category::NormalContent => "normal content",
            Category::Other(label) => label,
        }
    }

    /// Score a category must exceed before it contributes to risk.
    pub fn risk_threshold(&self) -> f64 {
        match self {
            Category::HateSpeech => 0.4,
            Category::Harassment => 0.4,
            Category::Violence => 0.3,
            Category::SelfHarm => 0.3,
            Category::SexualContent => 0.4,
            Category::Spam => 0.6,
            Category::Misinformation => 0.5,
            Category::NormalContent | Category::Other(_) => 0.4,
        }
    }

    /// Multiplier applied to a category's score when it contributes to risk.
    pub fn risk_weight(&self) -> f64 {
        match self {
            Category::Violence => 0.7,
            Category::SelfHarm => 0.7,
            Category::SexualContent => 0.6,
            Category::HateSpeech => 0.5,
            Category::Harassment => 0.5,
            Category::Misinformation => 0.3,
            Category::Spam => 0.2,
            Category::NormalContent | Category::Other(_) => 0.3,
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::parse(&label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

/// Ordered mapping from category to probability.
///
/// Order matters: risk reasons and explanations are produced in mapping order,
/// so the entries keep the order they were detected in and serialize as a JSON
/// object in that same order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassificationResult {
    scores: Vec<(Category, f64)>,
}

impl ClassificationResult {
    /// Build a normalized result from raw detector scores.
    ///
    /// `normal = max(0.1, 1 - sum(detected))`, then every value (detected and
    /// normal) is divided by `sum(detected) + normal`, so the result always
    /// sums to 1 and always carries "normal content".
    pub fn from_detected<I>(detected: I) -> Self
    where
        I: IntoIterator<Item = (Category, f64)>,
    {
        let mut scores: Vec<(Category, f64)> = Vec::new();
        for (category, score) in detected {
            if category == Category::NormalContent {
                continue;
            }
            match scores.iter_mut().find(|(existing, _)| *existing == category) {
                Some(entry) => entry.1 = score,
                None => scores.push((category, score)),
            }
        }

        let abnormal: f64 = scores.iter().map(|(_, s)| s).sum();
        let normal = (1.0 - abnormal).max(MIN_NORMAL_SHARE);
        let total = abnormal + normal;

        for entry in scores.iter_mut() {
            entry.1 /= total;
        }
        scores.push((Category::NormalContent, normal / total));

        Self { scores }
    }

    /// Wrap already-computed scores without normalizing them.
    ///
    /// Used when decoding stored records and in tests that need exact values.
    pub fn with_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = (Category, f64)>,
    {
        Self {
            scores: scores.into_iter().collect(),
        }
    }

    pub fn get(&self, category: &Category) -> Option<f64> {
        self.scores
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, s)| *s)
    }

    /// Score for a category, 0.0 when absent.
    pub fn score(&self, category: &Category) -> f64 {
        self.get(category).unwrap_or(0.0)
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.get(category).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, f64)> {
        self.scores.iter().map(|(c, s)| (c, *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().map(|(_, s)| s).sum()
    }

    /// True when every score is a finite probability and there is at least one.
    pub fn is_well_formed(&self) -> bool {
        !self.scores.is_empty()
            && self
                .scores
                .iter()
                .all(|(_, s)| s.is_finite() && (0.0..=1.0).contains(s))
    }
}

impl Serialize for ClassificationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scores.len()))?;
        for (category, score) in &self.scores {
            map.serialize_entry(category.label(), score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassificationResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = ClassificationResult;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scores = Vec::with_capacity(access.size_hint().unwrap_or(8));
                while let Some((label, score)) = access.next_entry::<String, f64>()? {
                    scores.push((Category::parse(&label), score));
                }
                Ok(ClassificationResult { scores })
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

// ============================================================================
// TESTS
// ============================================================================
