//! ONNX Runtime session loading and tensor extraction helpers.

use std::path::Path;

use half::f16;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::DynValue;
use tracing::debug;

use crate::config::{Device, SongGenConfig};
use crate::error::{Result, SongGenError};

/// How sessions are built: device and thread count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub device: Device,
    pub threads: Option<usize>,
}

impl SessionOptions {
    pub fn from_config(config: &SongGenConfig) -> Self {
        Self {
            device: config.device,
            threads: config.threads.map(|t| t as usize),
        }
    }

    /// Execution providers registered for the device, in priority order.
    ///
    /// ONNX Runtime falls back to CPU when a provider is unavailable.
    pub fn execution_providers(&self) -> Vec<ExecutionProviderDispatch> {
        match self.device {
            Device::Auto => vec![
                CUDAExecutionProvider::default().build(),
                CoreMLExecutionProvider::default().build(),
            ],
            Device::Cpu => Vec::new(),
            Device::Cuda => vec![CUDAExecutionProvider::default().build()],
            Device::Metal => vec![CoreMLExecutionProvider::default().build()],
        }
    }
}

/// Loads an ONNX session from `path`.
pub fn load_session(path: &Path, options: &SessionOptions) -> Result<Session> {
    if !path.is_file() {
        return Err(SongGenError::model_not_found(path.display().to_string()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut builder = Session::builder()
        .map_err(|e| SongGenError::model_load_failed(format!("Failed to create session: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| SongGenError::model_load_failed(format!("Failed to set optimization level: {}", e)))?;

    let providers = options.execution_providers();
    if !providers.is_empty() {
        builder = builder.with_execution_providers(providers).map_err(|e| {
            SongGenError::model_load_failed(format!("Failed to set execution providers: {}", e))
        })?;
    }

    if let Some(threads) = options.threads {
        builder = builder.with_intra_threads(threads).map_err(|e| {
            SongGenError::model_load_failed(format!("Failed to set thread count: {}", e))
        })?;
    }

    let session = builder.commit_from_file(path).map_err(|e| {
        SongGenError::model_load_failed(format!("Failed to load {}: {}", file_name, e))
    })?;

    debug!(model = %file_name, device = %options.device, "loaded session");
    Ok(session)
}

/// Extracts a float tensor, accepting f32 or f16 outputs.
pub fn extract_f32(value: &DynValue, name: &str) -> Result<(Vec<usize>, Vec<f32>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        return Ok((shape_vec, data.to_vec()));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
        let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let data_f32: Vec<f32> = data.iter().map(|e| f32::from(*e)).collect();
        return Ok((shape_vec, data_f32));
    }
    Err(SongGenError::generation_failed(format!(
        "{} must be f32 or f16",
        name
    )))
}

/// Extracts an i64 tensor.
pub fn extract_i64(value: &DynValue, name: &str) -> Result<(Vec<usize>, Vec<i64>)> {
    let (shape, data) = value.try_extract_tensor::<i64>().map_err(|e| {
        SongGenError::generation_failed(format!("Failed to extract {}: {}", name, e))
    })?;
    let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
    Ok((shape_vec, data.to_vec()))
}
