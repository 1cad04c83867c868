//! Machine topology for the hierarchical locks.
//!
//! A [`Topology`] describes a tree of cohort locks mirroring the machine:
//! one root, then one level per hardware grouping (NUMA domain, cache,
//! core...), each node having `fanout` children. Threads are routed to a leaf
//! by their virtual CPU id, which interleaves hyperthread siblings so that
//! consecutive virtual ids share a core.
//!
//! Topologies are compile-time constants attached to marker types with
//! [`declare_topology!`](crate::declare_topology); the routing table of a
//! topology is computed once and shared by every lock using it.

mod cna;
mod cpu;
mod generated;
mod hmcs;

pub use cna::{NumaCnaLock, NumaCnaNode};
pub use cpu::{CpuProbe, SchedCpu};
pub use generated::MachineTopology;
pub use hmcs::{NumaHmcsLock, NumaHmcsNode};

use crate::core::algo::CohortNode;
use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Size of the routing table: the largest virtual CPU id plus one
pub const MAX_THREADS: usize = 512;

/// One level of the lock tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    /// Children per node of the level above (1 for the root)
    pub fanout: usize,
    /// Consecutive local hand-offs before the level escalates
    pub threshold: u32,
}

/// Shape of a machine and of its lock tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Hardware threads
    pub cpus: usize,
    /// Physical cores
    pub cores: usize,
    /// NUMA domains
    pub numa_domains: usize,
    /// Tree levels, root first
    pub levels: Cow<'static, [LevelSpec]>,
    /// Virtual CPUs sharing one leaf lock
    pub cpus_per_leaf: usize,
}

impl Topology {
    /// Virtual CPU id of physical CPU `cpu`
    pub fn virtual_cpu(&self, cpu: usize) -> usize {
        let cores = self.cores.max(1);
        (cpu % cores) * (self.cpus / cores) + cpu / cores
    }

    /// NUMA domain of physical CPU `cpu`
    pub fn numa_node(&self, cpu: usize) -> u32 {
        let per_domain = (self.cores / self.numa_domains.max(1)).max(1);
        (self.virtual_cpu(cpu) / per_domain) as u32
    }

    /// Number of nodes on each level, root first
    pub fn level_counts(&self) -> Vec<usize> {
        self.levels
            .iter()
            .scan(1usize, |count, level| {
                *count *= level.fanout;
                Some(*count)
            })
            .collect()
    }

    /// Total number of locks in the tree
    pub fn lock_count(&self) -> usize {
        self.level_counts().iter().sum()
    }

    /// Number of leaf locks
    pub fn leaf_count(&self) -> usize {
        self.level_counts().last().copied().unwrap_or(0)
    }

    /// Index of the first leaf lock
    pub fn leaf_base(&self) -> usize {
        self.lock_count() - self.leaf_count()
    }

    /// Leaf lock serving virtual CPU `vcpu`.
    ///
    /// Virtual ids beyond the described CPUs wrap around the leaves.
    pub fn leaf_for_vcpu(&self, vcpu: usize) -> usize {
        let leaves = self.leaf_count().max(1);
        self.leaf_base() + (vcpu / self.cpus_per_leaf.max(1)) % leaves
    }

    /// Check that the description is consistent.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.cpus > 0, "cpu count must be positive");
        ensure!(self.cores > 0, "core count must be positive");
        ensure!(self.numa_domains > 0, "NUMA domain count must be positive");
        ensure!(
            self.cpus <= MAX_THREADS,
            "{} cpus exceed the routing table size {MAX_THREADS}",
            self.cpus
        );
        ensure!(
            self.cpus % self.cores == 0,
            "{} cpus are not evenly spread over {} cores",
            self.cpus,
            self.cores
        );
        ensure!(
            self.cores % self.numa_domains == 0,
            "{} cores are not evenly spread over {} NUMA domains",
            self.cores,
            self.numa_domains
        );
        ensure!(self.cpus_per_leaf > 0, "cpus per leaf must be positive");

        let Some(root) = self.levels.first() else {
            bail!("topology has no levels");
        };
        ensure!(root.fanout == 1, "root level must have a single lock, got {}", root.fanout);
        if let Some(level) = self.levels.iter().position(|l| l.fanout == 0) {
            bail!("level {level} has a zero fan-out");
        }
        Ok(())
    }
}

/// Leaf lock of every virtual CPU id, computed once per topology
#[derive(Debug)]
pub struct RoutingTable {
    leaves: Box<[usize]>,
}

impl RoutingTable {
    /// Compute the leaf of every virtual CPU id below [`MAX_THREADS`]
    pub fn build(topology: &Topology) -> Self {
        RoutingTable {
            leaves: (0..MAX_THREADS)
                .map(|vcpu| topology.leaf_for_vcpu(vcpu))
                .collect(),
        }
    }

    /// Leaf lock of `vcpu`, `None` past the end of the table
    pub fn leaf(&self, vcpu: usize) -> Option<usize> {
        self.leaves.get(vcpu).copied()
    }
}

/// Instantiate the lock tree of `topology`: a flat sequence of nodes, root
/// first and level by level, each child following its parent's level.
pub fn build_tree(topology: &Topology) -> Box<[CohortNode]> {
    let mut nodes = Vec::with_capacity(topology.lock_count());
    let mut parent_base = 0;
    let mut parents = 0;
    for (level, spec) in topology.levels.iter().enumerate() {
        let count = parents.max(1) * spec.fanout;
        for i in 0..count {
            let parent = (level > 0).then(|| parent_base + i / spec.fanout);
            nodes.push(CohortNode::new(level, parent, spec.threshold));
        }
        parent_base = nodes.len() - count;
        parents = count;
    }
    nodes.into_boxed_slice()
}

/// A topology attached to a type, so locks can be generic over it
pub trait TopologyConfig: 'static {
    /// The machine description
    const TOPOLOGY: Topology;

    /// The shared routing table of [`TopologyConfig::TOPOLOGY`]
    fn routes() -> &'static RoutingTable;
}

/// Declare a marker type implementing [`TopologyConfig`].
///
/// ```
/// use mutrep::topology::{LevelSpec, Topology};
/// use std::borrow::Cow;
///
/// mutrep::declare_topology! {
///     /// Two sockets of four dual-threaded cores
///     pub TwoSockets = Topology {
///         cpus: 16,
///         cores: 8,
///         numa_domains: 2,
///         levels: Cow::Borrowed(&[
///             LevelSpec { fanout: 1, threshold: 1 },
///             LevelSpec { fanout: 2, threshold: 64 },
///             LevelSpec { fanout: 4, threshold: 64 },
///         ]),
///         cpus_per_leaf: 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! declare_topology {
    ($(#[$meta:meta])* $vis:vis $name:ident = $topology:expr $(,)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::topology::TopologyConfig for $name {
            const TOPOLOGY: $crate::topology::Topology = $topology;

            fn routes() -> &'static $crate::topology::RoutingTable {
                static ROUTES: ::std::sync::OnceLock<$crate::topology::RoutingTable> =
                    ::std::sync::OnceLock::new();
                ROUTES.get_or_init(|| {
                    $crate::topology::RoutingTable::build(
                        &<Self as $crate::topology::TopologyConfig>::TOPOLOGY,
                    )
                })
            }
        }
    };
}
