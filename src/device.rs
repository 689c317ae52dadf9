//! Compute device tags.
//!
//! A tensor's storage physically resides on its device. The copy dispatcher
//! resolves an execution device per call and uses [`DeviceType`] as the key
//! into the elementwise backend registry.

use std::fmt;

/// Compute device holding a tensor's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host main memory.
    Cpu,
    /// CUDA accelerator memory.
    Cuda {
        /// Zero-based CUDA device index.
        device_id: usize,
    },
}

impl Device {
    /// Whether this device is an accelerator domain (anything but the host).
    pub fn is_accelerator(self) -> bool {
        !matches!(self, Device::Cpu)
    }

    /// The device type used as a backend registry key.
    pub fn device_type(self) -> DeviceType {
        match self {
            Device::Cpu => DeviceType::Cpu,
            Device::Cuda { .. } => DeviceType::Cuda,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

/// Device type keying the elementwise copy backend registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Host CPU.
    Cpu,
    /// CUDA accelerator.
    Cuda,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Cuda => write!(f, "cuda"),
        }
    }
}
