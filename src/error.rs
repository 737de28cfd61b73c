//! Error type for fallible physics operations.
//!
//! Only GPU setup and GPU detection passes can fail. Per-frame simulation
//! anomalies are absorbed by clamps and never surface here.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum PhysicsError {
    /// A Vulkan call or allocation failed.
    Vulkan(String),
    /// A compiled compute shader could not be read or parsed.
    ShaderLoad {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A configuration value is outside its valid range.
    InvalidConfig(String),
    /// A GPU operation was attempted before `initialize`.
    GpuNotInitialized,
    /// The scene exceeds a fixed GPU capacity.
    CapacityExceeded {
        resource: &'static str,
        requested: usize,
        capacity: usize,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Vulkan(msg) => write!(f, "Vulkan error: {msg}"),
            Self::ShaderLoad { path, source } => {
                write!(f, "Failed to load shader {}: {source}", path.display())
            }
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::GpuNotInitialized => write!(f, "GPU collision system is not initialized"),
            Self::CapacityExceeded {
                resource,
                requested,
                capacity,
            } => write!(
                f,
                "GPU {resource} capacity exceeded: {requested} requested, {capacity} available"
            ),
        }
    }
}

impl std::error::Error for PhysicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ShaderLoad { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

impl From<ash::vk::Result> for PhysicsError {
    fn from(result: ash::vk::Result) -> Self {
        Self::Vulkan(format!("{result:?}"))
    }
}

impl From<ash_renderer::AshError> for PhysicsError {
    fn from(err: ash_renderer::AshError) -> Self {
        Self::Vulkan(err.to_string())
    }
}
