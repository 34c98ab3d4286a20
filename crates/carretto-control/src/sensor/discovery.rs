//! Serial port auto-detection

/// Port used when nothing better is found
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Pick the most likely microcontroller port from `candidates`
///
/// Preference: first USB/ACM adapter (`USB0`, `ACM0`), then any USB/ACM
/// device, then [`DEFAULT_PORT`].
pub fn choose_port(candidates: &[String]) -> String {
    let first = candidates
        .iter()
        .find(|p| p.contains("USB0") || p.contains("ACM0"));
    let any = || {
        candidates
            .iter()
            .find(|p| p.contains("USB") || p.contains("ACM"))
    };
    first
        .or_else(any)
        .cloned()
        .unwrap_or_else(|| DEFAULT_PORT.to_string())
}

/// Enumerate serial ports and choose one
#[cfg(feature = "serial")]
pub fn detect_port() -> String {
    let names: Vec<String> = match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        }
    };
    let port = choose_port(&names);
    tracing::info!(candidates = names.len(), "Auto-detected sensor port {}", port);
    port
}
