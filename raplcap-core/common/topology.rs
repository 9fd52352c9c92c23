// Socket discovery: how many packages exist and which core addresses each one

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{RaplcapError, Result};

/// Source of host topology information
///
/// Implementations report the number of distinct physical sockets and a
/// list of `(core, socket)` pairs covering every socket in `[0, count)`.
pub trait TopologyProvider {
    fn socket_count(&self) -> Result<u32>;

    fn core_socket_pairs(&self) -> Result<Vec<(u32, u32)>>;
}

/// Choose one core per socket, validating the mapping
///
/// When several cores share a socket the last pair observed wins. Any
/// socket outside `[0, sockets)` or without a core is an error.
pub fn cores_per_socket(sockets: u32, pairs: &[(u32, u32)]) -> Result<Vec<u32>> {
    let mut cores: Vec<Option<u32>> = vec![None; sockets as usize];

    for &(core, socket) in pairs {
        tracing::debug!("Found mapping: socket {}, core {}", socket, core);
        let slot = cores.get_mut(socket as usize).ok_or_else(|| {
            RaplcapError::TopologyError(format!(
                "Socket {socket} is outside range [0, {sockets})"
            ))
        })?;
        *slot = Some(core);
    }

    cores
        .into_iter()
        .enumerate()
        .map(|(socket, core)| {
            core.ok_or_else(|| {
                RaplcapError::TopologyError(format!("No core found for socket {socket}"))
            })
        })
        .collect()
}

/// Topology read from `/sys/devices/system/cpu`
#[derive(Debug, Clone)]
pub struct SysfsTopology {
    root: PathBuf,
}

impl SysfsTopology {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Online CPUs from `online`
    fn online_cpus(&self) -> Result<Vec<u32>> {
        let path = self.root.join("online");
        let list = std::fs::read_to_string(&path).map_err(|e| {
            RaplcapError::TopologyError(format!("Failed to read {}: {e}", path.display()))
        })?;
        parse_cpu_list(&list).ok_or_else(|| {
            RaplcapError::TopologyError(format!("Failed to parse CPU list: {:?}", list.trim()))
        })
    }

    fn package_id(&self, cpu: u32) -> Result<u32> {
        let path = self
            .root
            .join(format!("cpu{cpu}"))
            .join("topology")
            .join("physical_package_id");
        let id = std::fs::read_to_string(&path).map_err(|e| {
            RaplcapError::TopologyError(format!("Failed to read {}: {e}", path.display()))
        })?;
        id.trim().parse::<u32>().map_err(|_| {
            RaplcapError::TopologyError(format!(
                "Failed to parse socket to core mapping for CPU {cpu}: {:?}",
                id.trim()
            ))
        })
    }
}

impl TopologyProvider for SysfsTopology {
    fn socket_count(&self) -> Result<u32> {
        let mut sockets = BTreeSet::new();
        for pair in self.core_socket_pairs()? {
            sockets.insert(pair.1);
        }

        let count = sockets.len() as u32;
        tracing::debug!("socket_count: sockets={}", count);
        if count == 0 {
            return Err(RaplcapError::TopologyError("No sockets found".into()));
        }
        Ok(count)
    }

    fn core_socket_pairs(&self) -> Result<Vec<(u32, u32)>> {
        self.online_cpus()?
            .into_iter()
            .map(|cpu| Ok((cpu, self.package_id(cpu)?)))
            .collect()
    }
}

/// A fixed topology, for hosts described by other means and for tests
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    pub sockets: u32,
    pub pairs: Vec<(u32, u32)>,
}

impl StaticTopology {
    /// `sockets` sockets, one core each, with core `n` on socket `n`
    pub fn uniform(sockets: u32) -> Self {
        Self {
            sockets,
            pairs: (0..sockets).map(|s| (s, s)).collect(),
        }
    }
}

impl TopologyProvider for StaticTopology {
    fn socket_count(&self) -> Result<u32> {
        if self.sockets == 0 {
            return Err(RaplcapError::TopologyError("No sockets found".into()));
        }
        Ok(self.sockets)
    }

    fn core_socket_pairs(&self) -> Result<Vec<(u32, u32)>> {
        Ok(self.pairs.clone())
    }
}

/// Parse CPU list like "0-3,8-11" into `Vec<u32>`
pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            cpus.extend(start..=end);
        } else {
            cpus.push(part.trim().parse().ok()?);
        }
    }
    Some(cpus)
}
