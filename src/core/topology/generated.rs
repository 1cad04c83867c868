// Generated by mutrep-gen from a core-cache-numa-system description. Do not edit.

use crate::core::topology::{LevelSpec, Topology};
use std::borrow::Cow;

crate::declare_topology! {
    /// 128 cpus on 64 cores in 4 NUMA domains
    pub MachineTopology = Topology {
        cpus: 128,
        cores: 64,
        numa_domains: 4,
        levels: Cow::Borrowed(&[
            LevelSpec { fanout: 1, threshold: 1 }, // system
            LevelSpec { fanout: 4, threshold: 128 }, // numa
            LevelSpec { fanout: 8, threshold: 128 }, // cache
            LevelSpec { fanout: 2, threshold: 128 }, // core
        ]),
        cpus_per_leaf: 2,
    }
}
