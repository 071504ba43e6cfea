//! CPU topology table entries

use serde::{Deserialize, Serialize};

/// One physical core and the logical CPU chosen to represent it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEntry {
    /// Position of this core in the resolved table (display index)
    pub physical_core_index: usize,
    /// Core id as reported by the OS (may be sparse on multi-CCD parts)
    pub core_id: u32,
    /// Lowest-numbered SMT sibling; used to address per-CPU device paths
    pub logical_cpu_id: u32,
}
