//! Host-level performance samples shown next to the published counters.

use std::time::Instant;

use sysinfo::{Disks, Networks, System};

/// One host reading. Network rates need two samples, so the first reading
/// carries `None` rates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostSnapshot {
    pub cpu_percent: f32,
    pub available_memory_bytes: u64,
    pub total_memory_bytes: u64,
    /// Mounted volumes, ordered by mount point.
    pub disks: Vec<DiskSample>,
    pub network: Option<NetworkSample>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskSample {
    pub mount_point: String,
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSample {
    /// Share of the volume in use, `0.0` for an empty volume.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 * 100.0 / self.total_bytes as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetworkSample {
    pub interface: String,
    /// `None` until a previous total exists for the same interface.
    pub bytes_per_sec: Option<f64>,
    pub packets_per_sec: Option<f64>,
}

#[derive(Debug)]
struct NetTotals {
    interface: String,
    bytes: u64,
    packets: u64,
    at: Instant,
}

/// Samples processor, memory, disk and network counters of the host.
pub struct HostSampler {
    system: System,
    last_net: Option<NetTotals>,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta; prime it so the next sample is meaningful.
        system.refresh_cpu_usage();

        Self {
            system,
            last_net: None,
        }
    }

    pub fn sample(&mut self) -> HostSnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        HostSnapshot {
            cpu_percent: self.system.global_cpu_usage(),
            available_memory_bytes: self.system.available_memory(),
            total_memory_bytes: self.system.total_memory(),
            disks: sample_disks(),
            network: self.sample_network(),
        }
    }

    fn sample_network(&mut self) -> Option<NetworkSample> {
        let networks = Networks::new_with_refreshed_list();
        let names: Vec<&str> = networks.list().keys().map(String::as_str).collect();
        let interface = preferred_interface(&names)?.to_string();

        let data = networks.list().get(&interface)?;
        let now = NetTotals {
            interface,
            bytes: data.total_received() + data.total_transmitted(),
            packets: data.total_packets_received() + data.total_packets_transmitted(),
            at: Instant::now(),
        };

        let (bytes_per_sec, packets_per_sec) = match &self.last_net {
            Some(prev) if prev.interface == now.interface => {
                let secs = now.at.duration_since(prev.at).as_secs_f64();
                (
                    per_sec(prev.bytes, now.bytes, secs),
                    per_sec(prev.packets, now.packets, secs),
                )
            }
            _ => (None, None),
        };

        let sample = NetworkSample {
            interface: now.interface.clone(),
            bytes_per_sec,
            packets_per_sec,
        };
        self.last_net = Some(now);
        Some(sample)
    }
}

fn per_sec(prev: u64, now: u64, secs: f64) -> Option<f64> {
    (secs > 0.0).then(|| now.saturating_sub(prev) as f64 / secs)
}

fn sample_disks() -> Vec<DiskSample> {
    let disks = Disks::new_with_refreshed_list();
    let mut out: Vec<DiskSample> = disks
        .list()
        .iter()
        .filter(|d| d.total_space() > 0)
        .map(|d| DiskSample {
            mount_point: d.mount_point().display().to_string(),
            available_bytes: d.available_space(),
            total_bytes: d.total_space(),
        })
        .collect();
    out.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    out.dedup_by(|a, b| a.mount_point == b.mount_point);
    out
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the interface worth reporting: virtual/tunnel adapters are skipped,
/// wired and wireless adapters win, ties keep name order.
pub fn preferred_interface<'a>(names: &[&'a str]) -> Option<&'a str> {
    const SKIP: [&str; 3] = ["loopback", "isatap", "teredo"];
    const PREFER: [&str; 2] = ["ethernet", "wi-fi"];
    const PREFER_PREFIX: [&str; 3] = ["eth", "en", "wl"];

    let mut candidates: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| {
            let lower = n.to_lowercase();
            lower != "lo" && !SKIP.iter().any(|s| lower.contains(s))
        })
        .collect();
    candidates.sort_unstable();

    let preferred = |n: &str| {
        let lower = n.to_lowercase();
        PREFER.iter().any(|p| lower.contains(p))
            || PREFER_PREFIX.iter().any(|p| lower.starts_with(p))
    };

    candidates
        .iter()
        .copied()
        .find(|n| preferred(n))
        .or_else(|| candidates.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_loopback_and_tunnels() {
        assert_eq!(
            preferred_interface(&["lo", "isatap.{1234}", "Teredo Tunneling"]),
            None
        );
        assert_eq!(
            preferred_interface(&["Loopback Pseudo-Interface 1"]),
            None
        );
    }

    #[test]
    fn prefers_wired_or_wireless() {
        assert_eq!(
            preferred_interface(&["docker0", "lo", "wlp2s0"]),
            Some("wlp2s0")
        );
        assert_eq!(
            preferred_interface(&["vEthernet (WSL)", "Wi-Fi", "lo"]),
            Some("Wi-Fi")
        );
        assert_eq!(
            preferred_interface(&["eth1", "eth0", "docker0"]),
            Some("eth0")
        );
    }

    #[test]
    fn falls_back_to_any_remaining_interface() {
        assert_eq!(preferred_interface(&["lo", "tun0"]), Some("tun0"));
        assert_eq!(preferred_interface(&[]), None);
    }

    #[test]
    fn disk_usage_share() {
        let disk = DiskSample {
            mount_point: "/".into(),
            available_bytes: 25,
            total_bytes: 100,
        };
        assert_eq!(disk.used_percent(), 75.0);

        let empty = DiskSample {
            mount_point: "/empty".into(),
            available_bytes: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.used_percent(), 0.0);
    }

    #[test]
    fn rates_need_elapsed_time() {
        assert_eq!(per_sec(100, 300, 2.0), Some(100.0));
        assert_eq!(per_sec(100, 300, 0.0), None);
        // Counter reset on the interface.
        assert_eq!(per_sec(300, 100, 1.0), Some(0.0));
    }

    #[test]
    fn sampler_reads_memory() {
        let mut sampler = HostSampler::new();
        let snap = sampler.sample();

        assert!(snap.total_memory_bytes > 0);
        assert!(snap.available_memory_bytes <= snap.total_memory_bytes);
        assert!(snap.cpu_percent >= 0.0);
        for disk in &snap.disks {
            assert!(disk.available_bytes <= disk.total_bytes);
        }
    }
}
