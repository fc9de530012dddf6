//! Best-effort facts about the requesting host.
//!
//! Neither lookup can fail a request: an unknown name or hardware address
//! comes back as `None` and the client context falls back to the IP or an
//! empty string.

use async_trait::async_trait;
use netpreseed_core::config::ResolverConfig;
use regex::Regex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};

/// Resolves the name and hardware address of a client.
#[async_trait]
pub trait ClientResolver: Send + Sync {
    /// Name found by reverse DNS.
    async fn reverse_name(&self, ip: IpAddr) -> Option<String>;

    /// Hardware address, lowercase and colon separated.
    async fn hardware_address(&self, ip: IpAddr) -> Option<String>;
}

/// Resolver backed by the system resolver and the ARP table.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    config: ResolverConfig,
}

impl SystemResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    async fn arp_command(&self, ip: IpAddr) -> Option<String> {
        let target = ip.to_string();
        let output = Command::new(&self.config.arp_command)
            .args(["-a", "-n", target.as_str()])
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.config.arp_timeout(), output).await {
            Ok(Ok(output)) => find_mac(&String::from_utf8_lossy(&output.stdout)),
            Ok(Err(e)) => {
                debug!(command = %self.config.arp_command.display(), error = %e, "arp command failed");
                None
            }
            Err(_) => {
                warn!(ip = %ip, timeout_secs = self.config.arp_timeout_secs, "arp command timed out");
                None
            }
        }
    }
}

#[async_trait]
impl ClientResolver for SystemResolver {
    async fn reverse_name(&self, ip: IpAddr) -> Option<String> {
        if !self.config.reverse_dns {
            return None;
        }

        match tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip)).await {
            Ok(Ok(name)) if name != ip.to_string() => Some(name.trim_end_matches('.').to_string()),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                debug!(ip = %ip, error = %e, "Reverse lookup failed");
                None
            }
            Err(e) => {
                warn!(ip = %ip, error = %e, "Reverse lookup task failed");
                None
            }
        }
    }

    async fn hardware_address(&self, ip: IpAddr) -> Option<String> {
        if !self.config.arp || ip.is_loopback() {
            return None;
        }

        if let Some(mac) = read_proc_arp(&self.config.proc_arp_path, ip).await {
            return Some(mac);
        }
        self.arp_command(ip).await
    }
}

async fn read_proc_arp(path: &Path, ip: IpAddr) -> Option<String> {
    let table = tokio::fs::read_to_string(path).await.ok()?;
    parse_proc_arp(&table, ip)
}

/// Finds `ip` in a `/proc/net/arp` table. Incomplete entries are ignored.
pub fn parse_proc_arp(table: &str, ip: IpAddr) -> Option<String> {
    let wanted = ip.to_string();
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [addr, _hw_type, _flags, mac, ..] if *addr == wanted => {
                normalize_mac(mac).filter(|mac| mac != "00:00:00:00:00:00")
            }
            _ => None,
        }
    })
}

/// Extracts the first hardware address from free-form `arp` output.
pub fn find_mac(text: &str) -> Option<String> {
    static MAC: OnceLock<Option<Regex>> = OnceLock::new();
    let re = MAC
        .get_or_init(|| Regex::new(r"\b([0-9a-fA-F]{1,2}[:-]){5}[0-9a-fA-F]{1,2}\b").ok())
        .as_ref()?;
    re.find(text).and_then(|m| normalize_mac(m.as_str()))
}

/// Lowercases, uses `:` separators and pads every octet to two digits.
fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<String> = raw
        .split(|c: char| c == ':' || c == '-')
        .map(|octet| format!("{:0>2}", octet.to_ascii_lowercase()))
        .collect();
    if octets.len() != 6 || octets.iter().any(|o| o.len() != 2) {
        return None;
    }
    Some(octets.join(":"))
}

/// Fixed answers, for tests and offline rendering.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    names: HashMap<IpAddr, String>,
    hardware: HashMap<IpAddr, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, ip: IpAddr, name: impl Into<String>) -> Self {
        self.names.insert(ip, name.into());
        self
    }

    pub fn with_hardware_address(mut self, ip: IpAddr, mac: impl Into<String>) -> Self {
        self.hardware.insert(ip, mac.into());
        self
    }
}

#[async_trait]
impl ClientResolver for StaticResolver {
    async fn reverse_name(&self, ip: IpAddr) -> Option<String> {
        self.names.get(&ip).cloned()
    }

    async fn hardware_address(&self, ip: IpAddr) -> Option<String> {
        self.hardware.get(&ip).cloned()
    }
}
