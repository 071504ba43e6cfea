//! Physical core topology from the per-CPU sysfs device tree
//!
//! Every physical core is represented by the lowest-numbered logical CPU of
//! its SMT sibling group. That CPU's id is used to build per-core device
//! paths (register access, cpufreq).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use zen_sens_types::TopologyEntry;

/// Parse a kernel CPU list such as `0,4` or `0-1,8-9`
pub fn parse_cpu_list(text: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in text.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().ok()?;
                let end: u32 = end.trim().parse().ok()?;
                if end < start {
                    return None;
                }
                cpus.extend(start..=end);
            }
            None => cpus.push(part.trim().parse().ok()?),
        }
    }
    if cpus.is_empty() {
        None
    } else {
        Some(cpus)
    }
}

/// Logical CPU number of a `cpuN` directory entry
fn cpu_number(name: &str) -> Option<u32> {
    name.strip_prefix("cpu")?.parse().ok()
}

fn read_u32(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// All `cpuN` entries under the device root, sorted by N
fn list_logical_cpus(cpu_devices: &Path) -> Vec<(u32, PathBuf)> {
    let entries = match fs::read_dir(cpu_devices) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", cpu_devices.display(), e);
            return Vec::new();
        }
    };

    let mut cpus: Vec<(u32, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            cpu_number(&name.to_string_lossy()).map(|id| (id, entry.path()))
        })
        .collect();
    cpus.sort_by_key(|(id, _)| *id);
    cpus
}

/// One entry per physical core, sorted by representative logical id
///
/// Returns exactly `core_count` entries. Discovered cores beyond that count
/// are dropped (CPUID counts one package); missing cores, or a tree whose
/// topology files cannot be read at all, are filled with identity entries
/// (`core_id == logical_cpu_id == index`).
pub fn resolve_topology(cpu_devices: &Path, core_count: usize) -> Vec<TopologyEntry> {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut found: Vec<(u32, u32)> = Vec::new();

    for (cpu, path) in list_logical_cpus(cpu_devices) {
        if seen.contains(&cpu) {
            continue;
        }

        let topology = path.join("topology");
        let Some(core_id) = read_u32(&topology.join("core_id")) else {
            log::debug!("cpu{}: core_id unreadable, skipping", cpu);
            continue;
        };
        let siblings = fs::read_to_string(topology.join("thread_siblings_list"))
            .ok()
            .and_then(|text| parse_cpu_list(&text))
            .unwrap_or_else(|| vec![cpu]);

        let representative = siblings.iter().copied().chain([cpu]).min().unwrap_or(cpu);
        if !seen.insert(representative) {
            continue;
        }
        seen.insert(cpu);
        seen.extend(siblings);

        log::trace!("cpu{}: core_id {} -> representative cpu{}", cpu, core_id, representative);
        found.push((core_id, representative));
    }

    if found.is_empty() && core_count > 0 {
        log::warn!(
            "No readable CPU topology under {}, assuming one thread per core",
            cpu_devices.display()
        );
    }

    found.sort_by_key(|&(_, logical)| logical);
    if found.len() > core_count {
        log::info!(
            "Found {} physical cores, keeping the first {}",
            found.len(),
            core_count
        );
        found.truncate(core_count);
    }

    // Padding must not reuse any claimed thread or a discovered core id
    let mut taken_cpus = seen;
    let mut taken_cores: HashSet<u32> = found.iter().map(|&(core_id, _)| core_id).collect();
    let (mut next_cpu, mut next_core) = (0u32, 0u32);
    while found.len() < core_count {
        while taken_cpus.contains(&next_cpu) {
            next_cpu += 1;
        }
        while taken_cores.contains(&next_core) {
            next_core += 1;
        }
        taken_cpus.insert(next_cpu);
        taken_cores.insert(next_core);
        found.push((next_core, next_cpu));
    }

    found
        .into_iter()
        .enumerate()
        .map(|(index, (core_id, logical_cpu_id))| TopologyEntry {
            physical_core_index: index,
            core_id,
            logical_cpu_id,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    /// Write `cpuN/topology/{core_id,thread_siblings_list}` under `root`
    pub fn add_cpu(root: &Path, cpu: u32, core_id: u32, siblings: &str) {
        let topology = root.join(format!("cpu{}", cpu)).join("topology");
        fs::create_dir_all(&topology).unwrap();
        fs::write(topology.join("core_id"), format!("{}\n", core_id)).unwrap();
        fs::write(topology.join("thread_siblings_list"), format!("{}\n", siblings)).unwrap();
    }
}
