//! Versioned artifact codec
//!
//! All reading and writing of persisted model and preprocessor files goes
//! through this module. Compatibility contract:
//!
//! - schema version 2 is current and is the only one written;
//! - version 1 (`"model"` instead of `"estimator"`, optional metadata) is
//!   read by the namespaced decoder only;
//! - kind tags may carry a module prefix (`sklearn.ensemble.X`, `crate::X`),
//!   which only the namespaced decoder strips;
//! - unknown estimator kinds are replaced by an inert placeholder by the
//!   lenient decoders.

use crate::error::{AppError, Result};
use crate::ml::models::{ModelMetadata, ModelType};
use crate::ml::regressor::{ModelArtifact, Preprocessor, PREPROCESSOR_KIND, SCHEMA_VERSION};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Oldest schema version the namespaced decoder accepts
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

/// Estimator kind aliases resolving to the random forest stand-in
const FOREST_ALIASES: &[&str] = &[
    "random_forest",
    "randomforest",
    "random_forest_regressor",
    "randomforestregressor",
    "forest",
    "pipeline",
];

/// Preprocessor kind aliases resolving to the crate's preprocessor
const PREPROCESSOR_ALIASES: &[&str] = &[
    PREPROCESSOR_KIND,
    "column_transformer",
    "columntransformer",
    "preprocessor",
];

/// How strictly an artifact is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Current schema, exact kind tags
    Strict,
    /// Current schema, aliased kinds resolved, unknown estimators replaced
    StandIn,
    /// Like `StandIn`, also stripping namespaces and migrating legacy layouts
    Namespaced,
}

/// Decode a model artifact
pub fn decode_model(bytes: &[u8], mode: DecodeMode) -> Result<ModelArtifact> {
    if mode == DecodeMode::Strict {
        let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(decode_error)?;
        check_version(artifact.schema_version, mode)?;
        return Ok(artifact);
    }

    let mut value: Value = serde_json::from_slice(bytes).map_err(decode_error)?;
    let version = schema_version(&value);
    check_version(version, mode)?;

    if mode == DecodeMode::Namespaced {
        migrate_legacy_model(&mut value);
    }

    let estimator = value
        .get_mut("estimator")
        .ok_or_else(|| AppError::Artifact("model artifact has no estimator".to_string()))?;
    let kind = kind_tag(estimator)?;
    let kind = resolvable_kind(&kind, mode)?;

    match resolve_alias(&kind, FOREST_ALIASES) {
        Some(_) => estimator["kind"] = Value::from("random_forest"),
        None => {
            warn!(kind = %kind, "Unresolvable estimator kind, substituting placeholder");
            *estimator = json!({ "kind": "placeholder", "original_kind": kind });
        }
    }

    value["schema_version"] = Value::from(SCHEMA_VERSION);
    serde_json::from_value(value).map_err(decode_error)
}

/// Decode a preprocessor artifact
pub fn decode_preprocessor(bytes: &[u8], mode: DecodeMode) -> Result<Preprocessor> {
    if mode == DecodeMode::Strict {
        let preprocessor: Preprocessor = serde_json::from_slice(bytes).map_err(decode_error)?;
        check_version(preprocessor.schema_version, mode)?;
        if preprocessor.kind != PREPROCESSOR_KIND {
            return Err(AppError::Artifact(format!(
                "unexpected preprocessor kind {}",
                preprocessor.kind
            )));
        }
        return Ok(preprocessor);
    }

    let mut value: Value = serde_json::from_slice(bytes).map_err(decode_error)?;
    check_version(schema_version(&value), mode)?;

    let kind = kind_tag(&value)?;
    let kind = resolvable_kind(&kind, mode)?;
    if resolve_alias(&kind, PREPROCESSOR_ALIASES).is_none() {
        return Err(AppError::Artifact(format!(
            "no stand-in for preprocessor kind {}",
            kind
        )));
    }

    value["kind"] = Value::from(PREPROCESSOR_KIND);
    value["schema_version"] = Value::from(SCHEMA_VERSION);
    serde_json::from_value(value).map_err(decode_error)
}

pub fn encode_model(artifact: &ModelArtifact) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(artifact)?)
}

pub fn encode_preprocessor(preprocessor: &Preprocessor) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(preprocessor)?)
}

/// Sibling temp file a write to `path` is staged in
pub fn staging_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write `bytes` to the staging file of `path`, creating parent directories
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = staging_path(path);
    std::fs::write(&tmp, bytes)?;
    Ok(tmp)
}

/// Rename a staged file over its target
pub fn commit(staged: &Path, path: &Path) -> Result<()> {
    std::fs::rename(staged, path)?;
    Ok(())
}

/// Drop any `a.b.` or `a::b::` prefix from a kind tag
pub fn strip_namespace(kind: &str) -> &str {
    let after_path = kind.rsplit("::").next().unwrap_or(kind);
    after_path.rsplit('.').next().unwrap_or(after_path)
}

fn is_namespaced(kind: &str) -> bool {
    kind.contains('.') || kind.contains("::")
}

fn resolvable_kind(kind: &str, mode: DecodeMode) -> Result<String> {
    if !is_namespaced(kind) {
        return Ok(kind.to_string());
    }
    if mode == DecodeMode::Namespaced {
        return Ok(strip_namespace(kind).to_string());
    }
    Err(AppError::Artifact(format!(
        "kind {} references a namespace this decoder does not resolve",
        kind
    )))
}

fn resolve_alias(kind: &str, aliases: &[&'static str]) -> Option<&'static str> {
    let normalized = kind.to_ascii_lowercase().replace('-', "_");
    aliases
        .iter()
        .copied()
        .find(|alias| *alias == normalized || alias.replace('_', "") == normalized)
}

fn kind_tag(value: &Value) -> Result<String> {
    value
        .get("kind")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Artifact("artifact has no kind tag".to_string()))
}

fn schema_version(value: &Value) -> u32 {
    value
        .get("schema_version")
        .or_else(|| value.get("version"))
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(LEGACY_SCHEMA_VERSION)
}

fn check_version(version: u32, mode: DecodeMode) -> Result<()> {
    let accepted = match mode {
        DecodeMode::Namespaced => (LEGACY_SCHEMA_VERSION..=SCHEMA_VERSION).contains(&version),
        _ => version == SCHEMA_VERSION,
    };
    if accepted {
        Ok(())
    } else {
        Err(AppError::Artifact(format!(
            "unsupported schema version {} for {:?} decoding",
            version, mode
        )))
    }
}

/// Rename version 1 fields and fill metadata the old layout lacked
fn migrate_legacy_model(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    if !obj.contains_key("estimator") {
        if let Some(model) = obj.remove("model") {
            obj.insert("estimator".to_string(), model);
        }
    }

    if !obj.contains_key("metadata") {
        let metadata = ModelMetadata {
            name: "Timeline Random Forest".to_string(),
            version: format!("legacy-{}", LEGACY_SCHEMA_VERSION),
            model_type: ModelType::RandomForest,
            trained_at: chrono::Utc::now(),
            n_training_samples: 0,
            n_features: 0,
            train_r2: None,
            test_r2: None,
            hyperparameters: HashMap::new(),
        };
        if let Ok(meta) = serde_json::to_value(metadata) {
            obj.insert("metadata".to_string(), meta);
        }
    }
}

fn decode_error(err: serde_json::Error) -> AppError {
    AppError::Artifact(format!("cannot decode artifact: {}", err))
}
