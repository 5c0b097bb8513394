use crate::error::{AppError, Result};
use crate::ml::models::{
    ModelMetadata, ModelType, Priority, TaskFeatures, TaskType, TeamSize, TrainingDataset,
    TrainingSample,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// Current artifact schema version for both model and preprocessor
pub const SCHEMA_VERSION: u32 = 2;

/// Kind tag of the preprocessor this crate writes
pub const PREPROCESSOR_KIND: &str = "one_hot_standard_scaler";

const CATEGORICAL_FEATURES: [&str; 3] = ["priority", "team_size", "task_type"];
const NUMERIC_FEATURES: [&str; 3] = ["estimated_hours", "word_count", "dependency_count"];

pub type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// One-hot categories of a categorical feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub feature: String,
    pub categories: Vec<String>,
}

/// Standardization parameters of a numeric feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaling {
    pub feature: String,
    pub mean: f64,
    pub scale: f64,
}

/// Turns task features into the model's numeric input row
///
/// Categorical features are one-hot encoded over the categories seen while
/// fitting (unseen values encode as all zeros); numeric features are
/// standardized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub schema_version: u32,
    pub kind: String,
    pub categorical: Vec<CategoricalEncoding>,
    pub numeric: Vec<NumericScaling>,
}

impl Preprocessor {
    /// Fit encodings and scaling on training features
    pub fn fit(features: &[TaskFeatures]) -> Self {
        let categorical = CATEGORICAL_FEATURES
            .iter()
            .map(|&name| {
                let mut categories: Vec<String> = Vec::new();
                for f in features {
                    let value = categorical_value(f, name).unwrap_or_default();
                    if !categories.contains(&value) {
                        categories.push(value);
                    }
                }
                categories.sort();
                CategoricalEncoding {
                    feature: name.to_string(),
                    categories,
                }
            })
            .collect();

        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|&name| {
                let column: Array1<f64> = features
                    .iter()
                    .map(|f| numeric_value(f, name).unwrap_or(0.0))
                    .collect();
                let mean = column.mean().unwrap_or(0.0);
                let std = column.std(0.0);
                NumericScaling {
                    feature: name.to_string(),
                    mean,
                    scale: if std > 0.0 { std } else { 1.0 },
                }
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            kind: PREPROCESSOR_KIND.to_string(),
            categorical,
            numeric,
        }
    }

    /// Unfitted preprocessor covering every known category with identity scaling
    pub fn unfitted() -> Self {
        let categorical = vec![
            CategoricalEncoding {
                feature: "priority".to_string(),
                categories: Priority::iter().map(|p| p.to_string()).collect(),
            },
            CategoricalEncoding {
                feature: "team_size".to_string(),
                categories: TeamSize::iter().map(|t| t.to_string()).collect(),
            },
            CategoricalEncoding {
                feature: "task_type".to_string(),
                categories: TaskType::iter().map(|t| t.to_string()).collect(),
            },
        ];

        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|&name| NumericScaling {
                feature: name.to_string(),
                mean: 0.0,
                scale: 1.0,
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            kind: PREPROCESSOR_KIND.to_string(),
            categorical,
            numeric,
        }
    }

    /// Width of a transformed row
    pub fn n_outputs(&self) -> usize {
        self.categorical.iter().map(|c| c.categories.len()).sum::<usize>() + self.numeric.len()
    }

    pub fn transform(&self, features: &TaskFeatures) -> Result<Vec<f64>> {
        let mut row = Vec::with_capacity(self.n_outputs());

        for encoding in &self.categorical {
            let value = categorical_value(features, &encoding.feature)?;
            row.extend(
                encoding
                    .categories
                    .iter()
                    .map(|c| if *c == value { 1.0 } else { 0.0 }),
            );
        }

        for scaling in &self.numeric {
            let value = numeric_value(features, &scaling.feature)?;
            let scale = if scaling.scale != 0.0 { scaling.scale } else { 1.0 };
            row.push((value - scaling.mean) / scale);
        }

        Ok(row)
    }
}

fn categorical_value(features: &TaskFeatures, name: &str) -> Result<String> {
    match name {
        "priority" => Ok(features.priority.to_string()),
        "team_size" => Ok(features.team_size.to_string()),
        "task_type" => Ok(features.task_type.to_string()),
        other => Err(AppError::Transform(format!("unknown categorical feature {}", other))),
    }
}

fn numeric_value(features: &TaskFeatures, name: &str) -> Result<f64> {
    match name {
        "estimated_hours" => Ok(features.estimated_hours),
        "word_count" => Ok(features.word_count as f64),
        "dependency_count" => Ok(features.dependency_count as f64),
        other => Err(AppError::Transform(format!("unknown numeric feature {}", other))),
    }
}

/// Serialized regression estimator
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest { forest: Box<Forest> },

    /// Inert stand-in for an estimator kind that could not be resolved
    Placeholder { original_kind: String },
}

impl Estimator {
    pub fn kind(&self) -> &str {
        match self {
            Estimator::RandomForest { .. } => "random_forest",
            Estimator::Placeholder { .. } => "placeholder",
        }
    }

    /// Predict the target for one transformed row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        match self {
            Estimator::RandomForest { forest } => {
                let x = DenseMatrix::new(1, row.len(), row.to_vec(), false);
                let predictions = forest
                    .predict(&x)
                    .map_err(|e| AppError::Transform(format!("Prediction failed: {}", e)))?;
                predictions
                    .first()
                    .copied()
                    .ok_or_else(|| AppError::Transform("model returned no prediction".to_string()))
            }
            Estimator::Placeholder { original_kind } => Err(AppError::Transform(format!(
                "placeholder estimator standing in for {} cannot predict",
                original_kind
            ))),
        }
    }

    fn predict_matrix(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        x.axis_iter(Axis(0))
            .map(|row| self.predict_row(&row.to_vec()))
            .collect()
    }
}

impl std::fmt::Debug for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimator::RandomForest { .. } => f.write_str("Estimator::RandomForest"),
            Estimator::Placeholder { original_kind } => f
                .debug_struct("Estimator::Placeholder")
                .field("original_kind", original_kind)
                .finish(),
        }
    }
}

/// Persisted model: metadata plus estimator
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub metadata: ModelMetadata,
    pub estimator: Estimator,
}

/// Model + preprocessor pair; immutable once built
#[derive(Debug)]
pub struct TimelineModel {
    pub preprocessor: Preprocessor,
    pub artifact: ModelArtifact,
}

impl TimelineModel {
    pub fn new(artifact: ModelArtifact, preprocessor: Preprocessor) -> Self {
        Self {
            preprocessor,
            artifact,
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.artifact.metadata
    }

    /// Fit a preprocessor and random forest on the samples
    pub fn fit(samples: &[TrainingSample], n_trees: usize, test_split: f64) -> Result<Self> {
        let features: Vec<TaskFeatures> = samples.iter().map(|s| s.features.clone()).collect();
        let preprocessor = Preprocessor::fit(&features);

        let rows = features
            .iter()
            .map(|f| preprocessor.transform(f))
            .collect::<Result<Vec<_>>>()?;
        let targets = samples.iter().map(|s| s.actual_days).collect();
        let dataset = TrainingDataset::from_rows(rows, targets);
        let (train, test) = dataset.train_test_split(test_split);

        let x = to_dense(&train.features);
        let y = train.targets.to_vec();
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(n_trees.try_into().unwrap_or(100));
        let forest = RandomForestRegressor::fit(&x, &y, params)
            .map_err(|e| AppError::Internal(format!("Failed to train random forest: {}", e)))?;

        let estimator = Estimator::RandomForest {
            forest: Box::new(forest),
        };

        let train_r2 = r2_score(&train.targets, &estimator.predict_matrix(&train.features)?);
        let test_r2 = if test.n_samples > 0 {
            r2_score(&test.targets, &estimator.predict_matrix(&test.features)?)
        } else {
            None
        };

        let mut hyperparameters = HashMap::new();
        hyperparameters.insert("n_trees".to_string(), n_trees.to_string());
        hyperparameters.insert("test_split".to_string(), test_split.to_string());

        let metadata = ModelMetadata {
            name: "Timeline Random Forest".to_string(),
            version: "1.0".to_string(),
            model_type: ModelType::RandomForest,
            trained_at: chrono::Utc::now(),
            n_training_samples: train.n_samples,
            n_features: dataset.n_features,
            train_r2,
            test_r2,
            hyperparameters,
        };

        Ok(Self::new(
            ModelArtifact {
                schema_version: SCHEMA_VERSION,
                metadata,
                estimator,
            },
            preprocessor,
        ))
    }

    /// Raw duration estimate in days
    pub fn predict_days(&self, features: &TaskFeatures) -> Result<f64> {
        let row = self.preprocessor.transform(features)?;

        let expected = self.artifact.metadata.n_features;
        if expected > 0 && row.len() != expected {
            return Err(AppError::Transform(format!(
                "preprocessor produced {} features, model expects {}",
                row.len(),
                expected
            )));
        }

        self.artifact.estimator.predict_row(&row)
    }
}

fn to_dense(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

/// Coefficient of determination; `None` when the targets have no variance
pub fn r2_score(actual: &Array1<f64>, predicted: &[f64]) -> Option<f64> {
    let mean = actual.mean()?;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}
