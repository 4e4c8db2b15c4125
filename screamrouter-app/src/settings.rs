use std::net::{IpAddr, Ipv4Addr};

use screamrouter_codec::constants::{
    RTP_RECEIVER_PORT, SCREAM_PER_PROCESS_RECEIVER_PORT, SCREAM_RECEIVER_PORT,
};

/// Boot-time configuration, read once from the environment (spec §6
/// "Environment/config at boot"). Everything has a default so the process
/// comes up with no configuration at all; a control plane overrides these
/// via env vars before spawning the process, mirroring `original_source`'s
/// `constants.py` env-var convention rather than this workspace's YAML
/// persistence (out of scope per spec §1).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_ip: IpAddr,
    pub scream_port: u16,
    pub scream_per_process_port: u16,
    pub rtp_port: u16,
    pub worker_threads: usize,
    pub mp3_bitrate_kbps: u32,
    pub max_history_seconds: f64,
    /// Path to a JSON-encoded `DesiredState` document applied once at boot.
    /// Normally a control plane calls `Engine::apply_state` directly; this
    /// is only a convenience for running the audio plane standalone.
    pub initial_state_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            bind_ip: env_parse("SCREAMROUTER_BIND_IP", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            scream_port: env_parse("SCREAMROUTER_SCREAM_PORT", SCREAM_RECEIVER_PORT),
            scream_per_process_port: env_parse(
                "SCREAMROUTER_PER_PROCESS_PORT",
                SCREAM_PER_PROCESS_RECEIVER_PORT,
            ),
            rtp_port: env_parse("SCREAMROUTER_RTP_PORT", RTP_RECEIVER_PORT),
            worker_threads: env_parse("SCREAMROUTER_WORKER_THREADS", 4usize),
            mp3_bitrate_kbps: env_parse("SCREAMROUTER_MP3_BITRATE_KBPS", 128u32),
            max_history_seconds: env_parse("SCREAMROUTER_MAX_HISTORY_SECONDS", 300.0f64),
            initial_state_path: std::env::var("SCREAMROUTER_INITIAL_STATE").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_canonical_ports_when_unset() {
        std::env::remove_var("SCREAMROUTER_SCREAM_PORT");
        let settings = Settings::from_env();
        assert_eq!(settings.scream_port, SCREAM_RECEIVER_PORT);
        assert_eq!(settings.worker_threads, 4);
    }

    #[test]
    fn malformed_env_value_falls_back_to_default() {
        std::env::set_var("SCREAMROUTER_WORKER_THREADS", "not-a-number");
        let settings = Settings::from_env();
        assert_eq!(settings.worker_threads, 4);
        std::env::remove_var("SCREAMROUTER_WORKER_THREADS");
    }
}
