//! ONNX Runtime session configuration.

use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Execution providers for ONNX Runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider, requires the `cuda` feature.
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
    },
}

/// Configuration applied to every ONNX Runtime session the crate creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Replaces the execution provider list.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    /// Builds a configuration from a device string such as `cpu`, `cuda` or `cuda:1`.
    ///
    /// Unknown device strings are rejected rather than silently mapped to CPU.
    pub fn from_device(device: &str) -> Result<Self, crate::core::OCRError> {
        let device = device.trim().to_ascii_lowercase();
        let provider = match device.as_str() {
            "cpu" => OrtExecutionProvider::CPU,
            "cuda" | "gpu" => OrtExecutionProvider::CUDA { device_id: None },
            other => match other.strip_prefix("cuda:") {
                Some(id) => {
                    let id = id.parse::<i32>().map_err(|_| {
                        crate::core::OCRError::invalid_field("device", "cuda:<index>", other)
                    })?;
                    OrtExecutionProvider::CUDA {
                        device_id: Some(id),
                    }
                }
                None => {
                    return Err(crate::core::OCRError::invalid_field(
                        "device",
                        "cpu, cuda or cuda:<index>",
                        other,
                    ));
                }
            },
        };
        Ok(Self::new().with_execution_providers(vec![provider]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ort_session_config_builder() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(2)
            .with_optimization_level(OrtGraphOptimizationLevel::Level3);

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(2));
        assert_eq!(
            config.optimization_level,
            Some(OrtGraphOptimizationLevel::Level3)
        );
        assert!(config.execution_providers.is_none());
    }

    #[test]
    fn test_ort_session_config_from_device() {
        let cpu = OrtSessionConfig::from_device("CPU").unwrap();
        assert_eq!(
            cpu.execution_providers,
            Some(vec![OrtExecutionProvider::CPU])
        );

        let cuda = OrtSessionConfig::from_device("cuda:1").unwrap();
        assert_eq!(
            cuda.execution_providers,
            Some(vec![OrtExecutionProvider::CUDA { device_id: Some(1) }])
        );

        assert!(OrtSessionConfig::from_device("tpu").is_err());
        assert!(OrtSessionConfig::from_device("cuda:x").is_err());
    }
}
