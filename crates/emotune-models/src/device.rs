use candle_core::{Device, DeviceLocation};

/// Environment variable that forces CPU even when CUDA is compiled in.
pub const FORCE_CPU_ENV: &str = "EMOTUNE_FORCE_CPU";

/// Pick the training device once: CUDA when compiled in and present, else CPU.
pub fn select_device() -> Device {
    let force_cpu = std::env::var(FORCE_CPU_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    if force_cpu || !cfg!(feature = "cuda") {
        tracing::info!("training on CPU");
        return Device::Cpu;
    }

    match Device::cuda_if_available(0) {
        Ok(device @ Device::Cuda(_)) => {
            tracing::info!("training on CUDA device 0");
            device
        }
        Ok(_) => {
            tracing::warn!("CUDA not available; falling back to CPU");
            Device::Cpu
        }
        Err(err) => {
            tracing::warn!("CUDA init failed ({err}); falling back to CPU");
            Device::Cpu
        }
    }
}

#[must_use]
pub fn device_name(device: &Device) -> String {
    match device.location() {
        DeviceLocation::Cpu => "cpu".to_string(),
        DeviceLocation::Cuda { gpu_id } => format!("cuda:{gpu_id}"),
        DeviceLocation::Metal { gpu_id } => format!("metal:{gpu_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_name() {
        assert_eq!(device_name(&Device::Cpu), "cpu");
    }
}
