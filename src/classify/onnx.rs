//! ONNX Runtime sequence classifier.
//!
//! Expects a model directory containing:
//! - `model.onnx`, a sequence-classification export producing `[1, num_labels]` logits
//! - `tokenizer.json`, the matching HuggingFace fast-tokenizer file
//! - optionally `config.json`, whose `id2label` overrides the default label order

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use super::category::{Category, CategoryTable};
use super::model::{argmax, CategoryModel, ClassifierError};

/// Token budget for one headline + description input.
pub const MAX_TOKENS: usize = 128;

pub struct OnnxCategoryModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    /// Whether the graph declares a `token_type_ids` input (BERT does, DistilBERT doesn't).
    wants_token_types: bool,
}

impl std::fmt::Debug for OnnxCategoryModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxCategoryModel")
            .field("wants_token_types", &self.wants_token_types)
            .field("max_tokens", &MAX_TOKENS)
            .finish()
    }
}

impl OnnxCategoryModel {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn from_directory(model_dir: &Path) -> Result<Self, ClassifierError> {
        Self::from_files(&model_dir.join("model.onnx"), &model_dir.join("tokenizer.json"))
    }

    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::Load(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::Load(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| ClassifierError::Load(format!("ONNX session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::Load(format!("ONNX optimization level: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| ClassifierError::Load(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ClassifierError::Load(format!("ONNX load model: {}", e)))?;

        let wants_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ClassifierError::Load(format!("Failed to load tokenizer: {}", e)))?;
        configure_budget(&mut tokenizer)?;

        info!(
            model = %model_path.display(),
            max_tokens = MAX_TOKENS,
            wants_token_types,
            "Loaded ONNX classification model"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            wants_token_types,
        })
    }
}

/// Truncate and pad every encoding to exactly [`MAX_TOKENS`], keeping the
/// tokenizer's own pad token when it defines one.
fn configure_budget(tokenizer: &mut Tokenizer) -> Result<(), ClassifierError> {
    let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
    padding.strategy = PaddingStrategy::Fixed(MAX_TOKENS);
    tokenizer.with_padding(Some(padding));

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| ClassifierError::Load(format!("Tokenizer truncation: {}", e)))?;
    Ok(())
}

impl CategoryModel for OnnxCategoryModel {
    fn predict(&self, text: &str) -> Result<usize, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Tokenize(e.to_string()))?;

        let to_i64 = |v: &[u32]| v.iter().map(|&x| x as i64).collect::<Vec<i64>>();
        let seq_len = encoding.get_ids().len();

        let ids = Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_ids()))
            .map_err(|e| ClassifierError::Inference(format!("input_ids array: {}", e)))?;
        let mask = Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_attention_mask()))
            .map_err(|e| ClassifierError::Inference(format!("attention_mask array: {}", e)))?;
        let types = Array2::from_shape_vec((1, seq_len), to_i64(encoding.get_type_ids()))
            .map_err(|e| ClassifierError::Inference(format!("token_type_ids array: {}", e)))?;

        let ids_ref = TensorRef::from_array_view(&ids)
            .map_err(|e| ClassifierError::Inference(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask)
            .map_err(|e| ClassifierError::Inference(format!("TensorRef attention_mask: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ClassifierError::Inference(format!("Session lock poisoned: {}", e)))?;

        let outputs = if self.wants_token_types {
            let types_ref = TensorRef::from_array_view(&types).map_err(|e| {
                ClassifierError::Inference(format!("TensorRef token_type_ids: {}", e))
            })?;
            session.run(ort::inputs![
                "input_ids" => ids_ref,
                "attention_mask" => mask_ref,
                "token_type_ids" => types_ref,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_ref,
                "attention_mask" => mask_ref,
            ])
        }
        .map_err(|e| ClassifierError::Inference(format!("ONNX inference failed: {}", e)))?;

        // Logits: [batch = 1, num_labels]
        let (shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("Extract logits: {}", e)))?;

        let num_labels = shape.last().copied().unwrap_or(0).max(0) as usize;
        if num_labels == 0 || logits.len() < num_labels {
            return Err(ClassifierError::EmptyOutput);
        }

        let best = argmax(&logits[..num_labels]).ok_or(ClassifierError::EmptyOutput)?;
        debug!(index = best, num_labels, "Model prediction");
        Ok(best)
    }
}

/// Reads `id2label` from a model's `config.json`, if present.
///
/// Returns `None` when the file is missing or unusable, in which case the
/// standard label order applies. Labels that are not in the category
/// enumeration are skipped with a warning.
pub fn label_table_from_config(model_dir: &Path) -> Option<CategoryTable> {
    let path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&path).ok()?;
    let config: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable model config");
            return None;
        }
    };

    let id2label = config.get("id2label")?.as_object()?;
    let mut pairs = Vec::with_capacity(id2label.len());
    for (id, label) in id2label {
        let (Ok(index), Some(label)) = (id.parse::<usize>(), label.as_str()) else {
            continue;
        };
        match label.parse::<Category>() {
            Ok(category) => pairs.push((index, category)),
            Err(_) => warn!(index, label, "Model label is not a known category"),
        }
    }

    if pairs.is_empty() {
        // Exports often carry placeholder LABEL_0.. names; keep the standard order.
        return None;
    }
    Some(CategoryTable::from_pairs(pairs))
}
