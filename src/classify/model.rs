use thiserror::Error;

use super::category::Category;

/// Errors raised by a [`CategoryModel`].
///
/// `Load` is fatal at startup; every other variant is recovered by the
/// classifier as [`Category::Unknown`].
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Tokenization failed: {0}")]
    Tokenize(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model produced no scores")]
    EmptyOutput,
}

/// A loaded text classifier: concatenated text in, best output index out.
///
/// Implementations are loaded once and shared read-only for the life of the
/// process.
pub trait CategoryModel: Send + Sync {
    fn predict(&self, text: &str) -> Result<usize, ClassifierError>;
}

/// Index of the highest score; ties go to the lowest index.
pub(crate) fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Wellness, &["health", "wellness", "fitness", "sleep", "diet", "mental"]),
    (Category::Politics, &["election", "senate", "congress", "president", "vote", "policy"]),
    (Category::Entertainment, &["movie", "film", "music", "celebrity", "album", "tv"]),
    (Category::Travel, &["travel", "flight", "airport", "hotel", "tourism", "vacation"]),
    (Category::StyleBeauty, &["fashion", "beauty", "makeup", "style", "runway"]),
    (Category::Parenting, &["parent", "parents", "kids", "baby", "toddler", "school"]),
    (Category::FoodDrink, &["food", "recipe", "restaurant", "wine", "chef", "cooking"]),
    (Category::WorldNews, &["storm", "war", "earthquake", "coast", "united nations", "crisis"]),
    (Category::Business, &["market", "markets", "stocks", "economy", "company", "bank"]),
    (Category::Sports, &["match", "league", "cup", "team", "coach", "season"]),
];

/// Deterministic keyword-scoring model.
///
/// Used by `newscat ingest --dry-run-model` when no ONNX export is at hand,
/// and by tests. Counts keyword hits per category and predicts the
/// highest-scoring one, or `fallback` when nothing matches.
#[derive(Debug, Clone)]
pub struct KeywordModel {
    fallback: usize,
}

impl Default for KeywordModel {
    fn default() -> Self {
        Self {
            fallback: Category::WorldNews.index().unwrap_or(0),
        }
    }
}

impl KeywordModel {
    pub fn with_fallback(mut self, index: usize) -> Self {
        self.fallback = index;
        self
    }
}

impl CategoryModel for KeywordModel {
    fn predict(&self, text: &str) -> Result<usize, ClassifierError> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut scores = vec![0.0f32; Category::ALL.len()];
        for (category, keywords) in KEYWORDS {
            let Some(idx) = category.index() else { continue };
            for &kw in keywords.iter() {
                let hit = if kw.contains(' ') {
                    lower.contains(kw)
                } else {
                    words.contains(&kw)
                };
                if hit {
                    scores[idx] += 1.0;
                }
            }
        }

        if scores.iter().all(|&s| s == 0.0) {
            return Ok(self.fallback);
        }
        argmax(&scores).ok_or(ClassifierError::EmptyOutput)
    }
}

/// Model returning a fixed index, or failing every call.
#[derive(Debug, Clone)]
pub enum FixedModel {
    Index(usize),
    Failing(String),
}

impl CategoryModel for FixedModel {
    fn predict(&self, _text: &str) -> Result<usize, ClassifierError> {
        match self {
            FixedModel::Index(i) => Ok(*i),
            FixedModel::Failing(msg) => Err(ClassifierError::Inference(msg.clone())),
        }
    }
}
