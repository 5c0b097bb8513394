use crate::error::{AppError, Result};
use crate::ml::artifact::{self, DecodeMode};
use crate::ml::regressor::{Preprocessor, TimelineModel};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Locations of the persisted model and preprocessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub preprocessor: PathBuf,
}

impl ArtifactPaths {
    pub fn new(model: impl Into<PathBuf>, preprocessor: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            preprocessor: preprocessor.into(),
        }
    }

    /// Persist a model pair.
    ///
    /// Both files are staged before either target is replaced, so a failed
    /// write leaves the previous pair untouched. Only the two final renames
    /// can interleave with a reader.
    pub fn persist(&self, model: &TimelineModel) -> Result<()> {
        let model_bytes = artifact::encode_model(&model.artifact)?;
        let preprocessor_bytes = artifact::encode_preprocessor(&model.preprocessor)?;

        let staged_model = artifact::stage(&self.model, &model_bytes)?;
        let staged_preprocessor = match artifact::stage(&self.preprocessor, &preprocessor_bytes) {
            Ok(path) => path,
            Err(e) => {
                discard(&staged_model);
                return Err(e);
            }
        };

        if let Err(e) = artifact::commit(&staged_model, &self.model) {
            discard(&staged_model);
            discard(&staged_preprocessor);
            return Err(e);
        }
        artifact::commit(&staged_preprocessor, &self.preprocessor).map_err(|e| {
            discard(&staged_preprocessor);
            e
        })
    }
}

fn discard(staged: &Path) {
    if let Err(e) = std::fs::remove_file(staged) {
        debug!(path = %staged.display(), error = %e, "Could not remove staged artifact");
    }
}

/// Loader state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoaderState {
    /// A model is available; `strategy` names how it got there
    Loaded { strategy: String },
    /// No model; predictions use the rule-based tier
    Fallback { reason: String },
}

impl LoaderState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoaderState::Loaded { .. })
    }
}

/// One way of turning artifact files into a model
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, paths: &ArtifactPaths) -> Result<TimelineModel>;
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| AppError::Artifact(format!("cannot read {}: {}", path.display(), e)))
}

fn load_pair(paths: &ArtifactPaths, mode: DecodeMode) -> Result<TimelineModel> {
    let model = artifact::decode_model(&read(&paths.model)?, mode)?;
    let preprocessor = artifact::decode_preprocessor(&read(&paths.preprocessor)?, mode)?;
    Ok(TimelineModel::new(model, preprocessor))
}

/// Current schema, exact kinds
pub struct DirectLoad;

impl LoadStrategy for DirectLoad {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn load(&self, paths: &ArtifactPaths) -> Result<TimelineModel> {
        load_pair(paths, DecodeMode::Strict)
    }
}

/// Unknown kinds replaced by a compatible stand-in or a placeholder
pub struct StandInLoad;

impl LoadStrategy for StandInLoad {
    fn name(&self) -> &'static str {
        "stand_in"
    }

    fn load(&self, paths: &ArtifactPaths) -> Result<TimelineModel> {
        load_pair(paths, DecodeMode::StandIn)
    }
}

/// Stand-in resolution under any namespace, legacy layouts accepted
pub struct NamespacedLoad;

impl LoadStrategy for NamespacedLoad {
    fn name(&self) -> &'static str {
        "namespaced"
    }

    fn load(&self, paths: &ArtifactPaths) -> Result<TimelineModel> {
        load_pair(paths, DecodeMode::Namespaced)
    }
}

/// Model alone; a broken preprocessor is replaced by an unfitted one
pub struct ModelOnlyLoad;

impl LoadStrategy for ModelOnlyLoad {
    fn name(&self) -> &'static str {
        "model_only"
    }

    fn load(&self, paths: &ArtifactPaths) -> Result<TimelineModel> {
        let model = artifact::decode_model(&read(&paths.model)?, DecodeMode::Namespaced)?;

        let preprocessor = read(&paths.preprocessor)
            .and_then(|bytes| artifact::decode_preprocessor(&bytes, DecodeMode::Namespaced))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Preprocessor unusable, constructing a default one");
                Preprocessor::unfitted()
            });

        Ok(TimelineModel::new(model, preprocessor))
    }
}

/// Result of a load attempt
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: LoaderState,
    pub model: Option<TimelineModel>,
}

/// Ordered policy chain of load strategies
pub struct ModelLoader {
    strategies: Vec<Box<dyn LoadStrategy>>,
}

impl ModelLoader {
    /// Direct, stand-in, namespaced, then model-only
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(DirectLoad),
            Box::new(StandInLoad),
            Box::new(NamespacedLoad),
            Box::new(ModelOnlyLoad),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order. Never fails: exhaustion or missing files
    /// end in `Fallback`.
    pub fn load(&self, paths: &ArtifactPaths) -> LoadOutcome {
        if !paths.model.exists() {
            info!(path = %paths.model.display(), "No model artifact found, using rule-based predictions");
            return LoadOutcome {
                state: LoaderState::Fallback {
                    reason: format!("model artifact {} not found", paths.model.display()),
                },
                model: None,
            };
        }

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.load(paths) {
                Ok(model) => {
                    info!(
                        strategy = strategy.name(),
                        estimator = model.artifact.estimator.kind(),
                        "Timeline model loaded"
                    );
                    return LoadOutcome {
                        state: LoaderState::Loaded {
                            strategy: strategy.name().to_string(),
                        },
                        model: Some(model),
                    };
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "Load strategy failed");
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        warn!(attempts = failures.len(), "All load strategies failed, using rule-based predictions");
        LoadOutcome {
            state: LoaderState::Fallback {
                reason: failures.join("; "),
            },
            model: None,
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
