use crate::error::{AppError, Result};
use crate::ml::models::ModelType;
use crate::ml::vectorizer::TfidfVectorizer;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current text classifier artifact layout
pub const TEXT_CLASSIFIER_SCHEMA: u32 = 1;

/// Persisted linear blocker classifier over tf-idf features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextClassifierArtifact {
    pub schema_version: u32,

    #[serde(default = "default_model_type")]
    pub model_type: ModelType,

    /// Terms in feature order
    pub vocabulary: Vec<String>,

    /// Idf weight per term
    pub idf: Vec<f64>,

    /// Coefficient per term for the blocker class
    pub coefficients: Vec<f64>,

    pub intercept: f64,

    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

fn default_model_type() -> ModelType {
    ModelType::LogisticRegression
}

fn default_ngram_range() -> (usize, usize) {
    (1, 3)
}

/// Pretrained probabilistic blocker classifier
#[derive(Debug, Clone)]
pub struct TextClassifier {
    vectorizer: TfidfVectorizer,
    terms: Vec<String>,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl TextClassifier {
    pub fn from_artifact(artifact: TextClassifierArtifact) -> Result<Self> {
        if artifact.schema_version != TEXT_CLASSIFIER_SCHEMA {
            return Err(AppError::Artifact(format!(
                "unsupported text classifier schema {} (expected {})",
                artifact.schema_version, TEXT_CLASSIFIER_SCHEMA
            )));
        }
        if artifact.model_type != ModelType::LogisticRegression {
            return Err(AppError::Artifact(format!(
                "text classifier must be {}, got {}",
                ModelType::LogisticRegression,
                artifact.model_type
            )));
        }
        if artifact.coefficients.len() != artifact.vocabulary.len() {
            return Err(AppError::Artifact(format!(
                "{} coefficients for {} terms",
                artifact.coefficients.len(),
                artifact.vocabulary.len()
            )));
        }

        let terms = artifact.vocabulary.clone();
        let vectorizer = TfidfVectorizer::from_parts(artifact.vocabulary, artifact.idf, artifact.ngram_range)?;

        Ok(Self {
            vectorizer,
            terms,
            coefficients: Array1::from_vec(artifact.coefficients),
            intercept: artifact.intercept,
        })
    }

    /// Load a JSON artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Artifact(format!("cannot read {}: {}", path.display(), e)))?;
        let artifact: TextClassifierArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Artifact(format!("cannot decode {}: {}", path.display(), e)))?;

        Self::from_artifact(artifact)
    }

    /// Probability that the text describes a blocker
    pub fn predict_proba(&self, text: &str) -> f64 {
        let x = self.vectorizer.transform(text);
        sigmoid(self.coefficients.dot(&x) + self.intercept)
    }

    /// Known terms of `text` pushing towards the blocker class, strongest first
    pub fn top_terms(&self, text: &str, k: usize) -> Vec<String> {
        let x = self.vectorizer.transform(text);
        let mut contributions: Vec<(usize, f64)> = x
            .iter()
            .zip(self.coefficients.iter())
            .enumerate()
            .map(|(i, (&v, &w))| (i, v * w))
            .filter(|&(_, c)| c > 0.0)
            .collect();

        contributions.sort_by(|a, b| b.1.total_cmp(&a.1));
        contributions
            .into_iter()
            .take(k)
            .map(|(i, _)| self.terms[i].clone())
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
