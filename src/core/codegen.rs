//! Topology code generation.
//!
//! Turns a machine description into the Rust source of the constants module
//! behind [`MachineTopology`](crate::topology::MachineTopology).

use crate::core::topology::{LevelSpec, Topology};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// A machine as described to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDescription {
    /// Hyphen-separated level names, leaf first (e.g. `core-cache-numa-system`)
    pub nomenclature: String,
    /// Number of nodes on each level, leaf first; the last one must be 1
    pub sizes: Vec<usize>,
    /// Hand-off thresholds of every level below the root, root side first
    pub thresholds: Vec<u32>,
    /// Hardware threads
    pub cpus: usize,
    /// Physical cores
    pub cores: usize,
    /// NUMA domains
    pub numa_domains: usize,
}

impl Default for MachineDescription {
    fn default() -> Self {
        MachineDescription {
            nomenclature: "core-cache-numa-system".to_string(),
            sizes: vec![64, 32, 4, 1],
            thresholds: vec![128, 128, 128],
            cpus: 128,
            cores: 64,
            numa_domains: 4,
        }
    }
}

impl MachineDescription {
    /// Parse a JSON description
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse machine description")
    }

    /// Read a JSON description from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read machine description {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Level names, leaf first
    pub fn level_names(&self) -> Vec<&str> {
        self.nomenclature.split('-').collect()
    }

    /// Derive and validate the lock tree topology
    pub fn topology(&self) -> Result<Topology> {
        let names = self.level_names();
        ensure!(!self.sizes.is_empty(), "no level sizes given");
        ensure!(
            names.len() == self.sizes.len(),
            "nomenclature names {} levels but {} sizes are given",
            names.len(),
            self.sizes.len()
        );
        ensure!(
            self.thresholds.len() + 1 == self.sizes.len(),
            "expected {} thresholds, got {}",
            self.sizes.len() - 1,
            self.thresholds.len()
        );
        ensure!(
            self.sizes.iter().all(|&s| s > 0),
            "level sizes must be positive"
        );

        let mut levels = Vec::with_capacity(self.sizes.len());
        let mut parent_count = 1;
        for (depth, (&count, name)) in self.sizes.iter().rev().zip(names.iter().rev()).enumerate() {
            ensure!(
                count % parent_count == 0,
                "{count} {name} nodes cannot be split evenly under {parent_count} parents"
            );
            let threshold = match depth {
                0 => 1,
                _ => self.thresholds[depth - 1],
            };
            levels.push(LevelSpec {
                fanout: count / parent_count,
                threshold,
            });
            parent_count = count;
        }

        let leaves = self.sizes[0];
        ensure!(
            self.cpus % leaves == 0,
            "{} cpus cannot be split evenly over {leaves} leaves",
            self.cpus
        );

        let topology = Topology {
            cpus: self.cpus,
            cores: self.cores,
            numa_domains: self.numa_domains,
            levels: Cow::Owned(levels),
            cpus_per_leaf: self.cpus / leaves,
        };
        topology.validate().context("Invalid machine description")?;
        Ok(topology)
    }

    /// Render the constants module for this machine
    pub fn render(&self) -> Result<String> {
        let topology = self.topology()?;
        let names: Vec<&str> = self.level_names().into_iter().rev().collect();

        let mut out = String::new();
        writeln!(
            out,
            "// Generated by mutrep-gen from a {} description. Do not edit.",
            self.nomenclature
        )?;
        out.push_str("\nuse crate::core::topology::{LevelSpec, Topology};\n");
        out.push_str("use std::borrow::Cow;\n\n");
        out.push_str("crate::declare_topology! {\n");
        writeln!(
            out,
            "    /// {} cpus on {} cores in {} NUMA domains",
            topology.cpus, topology.cores, topology.numa_domains
        )?;
        out.push_str("    pub MachineTopology = Topology {\n");
        writeln!(out, "        cpus: {},", topology.cpus)?;
        writeln!(out, "        cores: {},", topology.cores)?;
        writeln!(out, "        numa_domains: {},", topology.numa_domains)?;
        out.push_str("        levels: Cow::Borrowed(&[\n");
        for (level, name) in topology.levels.iter().zip(names) {
            writeln!(
                out,
                "            LevelSpec {{ fanout: {}, threshold: {} }}, // {name}",
                level.fanout, level.threshold
            )?;
        }
        out.push_str("        ]),\n");
        writeln!(out, "        cpus_per_leaf: {},", topology.cpus_per_leaf)?;
        out.push_str("    }\n}\n");
        Ok(out)
    }
}
