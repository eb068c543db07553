//! Topic classification of feed entries.
//!
//! [`Classifier`] is the adapter the pipeline talks to. It owns a shared,
//! read-only [`CategoryModel`] plus the index↔label table, and it never
//! fails: inference errors and unmapped indexes come back as
//! [`Category::Unknown`].
//!
//! - [`category`]: the closed label set and its lookup table
//! - [`model`]: the model trait and the keyword/fixed models
//! - [`onnx`]: ONNX Runtime backend for fine-tuned transformer exports

mod category;
mod model;
mod onnx;

use std::sync::Arc;

pub use category::{Category, CategoryTable, ParseCategoryError};
pub use model::{CategoryModel, ClassifierError, FixedModel, KeywordModel};
pub use onnx::{label_table_from_config, OnnxCategoryModel, MAX_TOKENS};

#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn CategoryModel>,
    table: Arc<CategoryTable>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("labels", &self.table.len())
            .finish()
    }
}

impl Classifier {
    /// Classifier using the standard label order.
    pub fn new(model: Arc<dyn CategoryModel>) -> Self {
        Self::with_table(model, CategoryTable::new())
    }

    pub fn with_table(model: Arc<dyn CategoryModel>, table: CategoryTable) -> Self {
        Self {
            model,
            table: Arc::new(table),
        }
    }

    /// Classify one entry from its headline and description.
    pub fn classify(&self, headline: &str, description: &str) -> Category {
        let text = format!("{headline} {description}");

        match self.model.predict(&text) {
            Ok(index) => match self.table.category(index) {
                Some(category) => category,
                None => {
                    tracing::warn!(index, "Model predicted an index with no category");
                    Category::Unknown
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Error during prediction");
                Category::Unknown
            }
        }
    }

    /// [`classify`](Self::classify) on tokio's blocking pool, so inference
    /// does not stall the runtime's worker thread.
    pub async fn classify_async(&self, headline: &str, description: &str) -> Category {
        let this = self.clone();
        let headline = headline.to_string();
        let description = description.to_string();

        match tokio::task::spawn_blocking(move || this.classify(&headline, &description)).await {
            Ok(category) => category,
            Err(e) => {
                tracing::error!(error = %e, "Classification task failed");
                Category::Unknown
            }
        }
    }
}
