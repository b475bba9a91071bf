//! # Pretrained artifacts
//!
//! A pretrained model is a directory holding `config.json`,
//! `tokenizer.json` and `model.safetensors`, identified by a model name.

use std::path::{Path, PathBuf};

use candle_core::Device;
use candle_nn::VarMap;
use candle_transformers::models::bert::Config as BertConfig;
use tracing::{debug, info, warn};

use crate::error::{KansouError, Result};

/// Environment variable naming a directory of model folders.
pub const MODEL_DIR_ENV: &str = "KANSOU_MODEL_DIR";

/// Default directory of model folders: `<data_dir>/kansou/models`.
fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kansou")
        .join("models")
}

/// Locate the directory for `name`.
///
/// An existing path is used as-is. Otherwise `name` is looked up under
/// `$KANSOU_MODEL_DIR`, then under the default models directory.
pub fn resolve_model_dir(name: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_dir() {
        return Ok(direct);
    }

    let mut searched = Vec::new();
    if let Some(root) = std::env::var_os(MODEL_DIR_ENV) {
        searched.push(PathBuf::from(root).join(name));
    }
    searched.push(default_models_dir().join(name));

    searched.iter().find(|p| p.is_dir()).cloned().ok_or_else(|| {
        KansouError::ModelLoad(format!(
            "unknown model {name:?}; searched {}",
            searched
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Paths of the files that make up a pretrained model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PretrainedFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl PretrainedFiles {
    /// Expected file layout inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }

    /// Resolve `name` and check that every file is present.
    pub fn locate(name: &str) -> Result<Self> {
        let files = Self::in_dir(resolve_model_dir(name)?);
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.is_file() {
                return Err(KansouError::ModelLoad(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }
        Ok(files)
    }

    pub fn bert_config(&self) -> Result<BertConfig> {
        let raw = std::fs::read_to_string(&self.config)?;
        serde_json::from_str(&raw).map_err(|e| {
            KansouError::ModelLoad(format!("{}: {e}", self.config.display()))
        })
    }
}

/// Outcome of copying pretrained tensors into a var map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PretrainedLoad {
    pub loaded: usize,
    /// Vars with no source tensor; they keep their fresh initialisation.
    pub missing: Vec<String>,
}

/// Copy tensors from a safetensors file into the matching vars of `varmap`.
///
/// Each var is matched by its own name, by its name without the leading
/// `bert.` prefix, and by the legacy `LayerNorm.gamma`/`beta` spelling of
/// `weight`/`bias`. A shape mismatch is an error.
pub fn load_pretrained_weights<P: AsRef<Path>>(
    varmap: &VarMap,
    weights: P,
    device: &Device,
) -> Result<PretrainedLoad> {
    let weights = weights.as_ref();
    let tensors = candle_core::safetensors::load(weights, device)?;
    debug!(path = %weights.display(), tensors = tensors.len(), "read pretrained weights");

    let data = varmap
        .data()
        .lock()
        .map_err(|_| KansouError::ModelLoad("var map lock poisoned".into()))?;

    let mut outcome = PretrainedLoad::default();
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let var = &data[name];
        match candidate_names(name).iter().find_map(|n| tensors.get(n)) {
            Some(tensor) => {
                var.set(&tensor.to_dtype(var.dtype())?)?;
                outcome.loaded += 1;
            }
            None => outcome.missing.push(name.clone()),
        }
    }

    info!(
        loaded = outcome.loaded,
        missing = outcome.missing.len(),
        "copied pretrained weights"
    );
    if !outcome.missing.is_empty() {
        warn!(vars = ?outcome.missing, "vars newly initialised (not in pretrained weights)");
    }
    Ok(outcome)
}

fn candidate_names(name: &str) -> Vec<String> {
    let mut bases = vec![name.to_string()];
    if let Some(stripped) = name.strip_prefix("bert.") {
        bases.push(stripped.to_string());
    }

    let mut out = bases.clone();
    for base in bases {
        if let Some(stem) = base.strip_suffix(".LayerNorm.weight") {
            out.push(format!("{stem}.LayerNorm.gamma"));
        } else if let Some(stem) = base.strip_suffix(".LayerNorm.bias") {
            out.push(format!("{stem}.LayerNorm.beta"));
        }
    }
    out
}
