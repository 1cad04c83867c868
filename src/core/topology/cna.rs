use crate::core::algo::{CnaLock, CnaNode, RawLock};
use crate::core::topology::{CpuProbe, MachineTopology, SchedCpu, TopologyConfig};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Context of a [`NumaCnaLock`] acquisition
#[derive(Debug, Default)]
pub struct NumaCnaNode {
    cna: CnaNode,
    current_cpu: AtomicUsize,
}

impl NumaCnaNode {
    /// CPU the acquisition ran on
    pub fn recorded_cpu(&self) -> usize {
        self.current_cpu.load(Ordering::Relaxed)
    }

    /// NUMA domain handed to the queue lock
    pub fn numa(&self) -> u32 {
        self.cna.numa()
    }
}

/// CNA queue lock fed with the NUMA domain of the calling thread, derived
/// from topology `T`.
///
/// The domain used at release is the one of the CPU recorded at acquire.
pub struct NumaCnaLock<T: TopologyConfig = MachineTopology, P: CpuProbe = SchedCpu> {
    lock: CnaLock,
    _config: PhantomData<fn() -> (T, P)>,
}

impl<T: TopologyConfig, P: CpuProbe> NumaCnaLock<T, P> {
    /// NUMA domain of physical CPU `cpu`
    pub fn numa_of(cpu: usize) -> u32 {
        T::TOPOLOGY.numa_node(cpu)
    }

    /// NUMA domain of the most recent owner
    pub fn owner_numa(&self) -> u32 {
        self.lock.owner_numa()
    }

    fn enter(node: &NumaCnaNode) -> u32 {
        let cpu = P::current_cpu();
        node.current_cpu.store(cpu, Ordering::Relaxed);
        Self::numa_of(cpu)
    }
}

impl<T: TopologyConfig, P: CpuProbe> RawLock for NumaCnaLock<T, P> {
    type Node = NumaCnaNode;
    const NAME: &'static str = "numa_cnalock";

    fn new() -> Self {
        NumaCnaLock {
            lock: CnaLock::new(),
            _config: PhantomData,
        }
    }

    unsafe fn acquire(&self, node: &NumaCnaNode) {
        let numa = Self::enter(node);
        // SAFETY: forwarded caller contract.
        unsafe { self.lock.acquire(&node.cna, numa) };
    }

    unsafe fn release(&self, node: &NumaCnaNode) {
        let numa = Self::numa_of(node.recorded_cpu());
        // SAFETY: forwarded caller contract.
        unsafe { self.lock.release(&node.cna, numa) };
    }

    unsafe fn try_acquire(&self, node: &NumaCnaNode) -> bool {
        let numa = Self::enter(node);
        // SAFETY: forwarded caller contract.
        unsafe { self.lock.try_acquire(&node.cna, numa) }
    }
}
