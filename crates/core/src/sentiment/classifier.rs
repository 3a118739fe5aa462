use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::news::Sentiment;
use crate::error::CoreError;
use crate::sentiment::SentimentLabeler;

/// Serialized form of a trained tf-idf + linear model.
///
/// `vocabulary` maps a token to its column; `idf` and `coefficients` are indexed by column.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn validate(&self) -> Result<(), String> {
        let width = self.coefficients.len();
        if width == 0 {
            return Err("model has no coefficients".to_string());
        }
        if self.idf.len() != width {
            return Err(format!(
                "idf length {} does not match coefficient length {width}",
                self.idf.len()
            ));
        }
        if let Some((token, idx)) = self.vocabulary.iter().find(|(_, idx)| **idx >= width) {
            return Err(format!("token {token:?} maps to column {idx} beyond {width}"));
        }
        let all_finite = self.intercept.is_finite()
            && self.idf.iter().all(|v| v.is_finite())
            && self.coefficients.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err("model contains non-finite weights".to_string());
        }
        Ok(())
    }

    /// Sparse, l2-normalised tf-idf vector for `text`.
    fn vectorize(&self, text: &str) -> HashMap<usize, f64> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(text) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_default() += 1.0;
            }
        }

        for (idx, v) in counts.iter_mut() {
            *v *= self.idf[*idx];
        }

        let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in counts.values_mut() {
                *v /= norm;
            }
        }
        counts
    }

    pub fn decision(&self, text: &str) -> f64 {
        self.vectorize(text)
            .iter()
            .map(|(idx, v)| self.coefficients[*idx] * v)
            .sum::<f64>()
            + self.intercept
    }
}

/// Lowercased runs of two or more alphanumeric characters.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
}

/// Binary classifier: a positive decision value is "positive", anything else "negative".
#[derive(Debug, Clone)]
pub struct ClassifierLabeler {
    model: LinearModel,
}

impl ClassifierLabeler {
    pub fn new(model: LinearModel) -> Result<Self, CoreError> {
        model.validate().map_err(|e| {
            CoreError::DependencyUnavailable(format!("invalid sentiment model: {e}"))
        })?;
        Ok(Self { model })
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let model = serde_json::from_str::<LinearModel>(json).map_err(|e| {
            CoreError::DependencyUnavailable(format!("sentiment model is not valid JSON: {e}"))
        })?;
        Self::new(model)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::DependencyUnavailable(format!(
                "failed to read sentiment model {}: {e}",
                path.display()
            ))
        })?;
        let labeler = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            vocabulary = labeler.model.vocabulary.len(),
            "loaded sentiment classifier"
        );
        Ok(labeler)
    }
}

impl SentimentLabeler for ClassifierLabeler {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn label(&self, headline: &str) -> Sentiment {
        if self.model.decision(headline) > 0.0 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }

    fn emits_neutral(&self) -> bool {
        false
    }
}
