//! Container runtime state locations.
//!
//! The profiler pod mounts the host directory where the target container's
//! runtime keeps its state; this is the lookup table for that directory.

use crate::error::ControllerError;

/// Host path of the state directory of `runtime`
pub fn runtime_host_path(runtime: &str) -> Result<&'static str, ControllerError> {
    match runtime {
        "docker" => Ok("/var/lib/docker"),
        "containerd" => Ok("/run/containerd"),
        other => Err(ControllerError::UnsupportedRuntime(other.to_string())),
    }
}
