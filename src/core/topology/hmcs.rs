use crate::core::algo::{CohortNode, RawLock, cohort};
use crate::core::error::{Violation, fatal};
use crate::core::topology::{CpuProbe, MachineTopology, SchedCpu, TopologyConfig, build_tree};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Context of a [`NumaHmcsLock`] acquisition
#[derive(Debug, Default)]
pub struct NumaHmcsNode {
    current_cpu: AtomicUsize,
}

impl NumaHmcsNode {
    /// CPU the acquisition ran on
    pub fn recorded_cpu(&self) -> usize {
        self.current_cpu.load(Ordering::Relaxed)
    }
}

/// Hierarchical lock over the cohort tree of topology `T`.
///
/// A thread enters through the leaf of the CPU it runs on. The CPU is
/// recorded in the context at acquire time and release goes through the
/// same leaf, even if the thread migrated in between.
pub struct NumaHmcsLock<T: TopologyConfig = MachineTopology, P: CpuProbe = SchedCpu> {
    nodes: Box<[CohortNode]>,
    _config: PhantomData<fn() -> (T, P)>,
}

impl<T: TopologyConfig, P: CpuProbe> NumaHmcsLock<T, P> {
    /// Leaf lock serving physical CPU `cpu`
    pub fn leaf_of(cpu: usize) -> usize {
        let vcpu = T::TOPOLOGY.virtual_cpu(cpu);
        match T::routes().leaf(vcpu) {
            Some(leaf) => leaf,
            None => fatal(None, Violation::CpuOutOfRange { cpu, vcpu }),
        }
    }

    /// The lock tree, root first
    pub fn nodes(&self) -> &[CohortNode] {
        &self.nodes
    }
}

impl<T: TopologyConfig, P: CpuProbe> RawLock for NumaHmcsLock<T, P> {
    type Node = NumaHmcsNode;
    const NAME: &'static str = "numa_hmcslock";

    fn new() -> Self {
        NumaHmcsLock {
            nodes: build_tree(&T::TOPOLOGY),
            _config: PhantomData,
        }
    }

    unsafe fn acquire(&self, node: &NumaHmcsNode) {
        let cpu = P::current_cpu();
        node.current_cpu.store(cpu, Ordering::Relaxed);
        cohort::acquire_from(&self.nodes, Self::leaf_of(cpu));
    }

    unsafe fn release(&self, node: &NumaHmcsNode) {
        cohort::release_from(&self.nodes, Self::leaf_of(node.recorded_cpu()));
    }
}
