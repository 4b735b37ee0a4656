// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Registry of CPU modules.
//!
//! The registry has no knowledge of concrete CPUs. CPU modules register a
//! name, aliases and a handler factory; the assembler looks handlers up by
//! name for `--cpu` and `.CPU`.

use std::collections::HashMap;

use crate::core::cpu::{CpuHandler, CpuType};

/// Registration interface for a specific CPU.
pub trait CpuModule {
    fn cpu_id(&self) -> CpuType;
    fn cpu_name(&self) -> &'static str;
    fn cpu_aliases(&self) -> &'static [&'static str] {
        &[]
    }
    fn handler(&self) -> Box<dyn CpuHandler>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    MissingCpu(CpuType),
    UnknownName(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCpu(cpu) => write!(f, "no handler registered for CPU {}", cpu.as_str()),
            Self::UnknownName(name) => write!(f, "unknown CPU '{name}'"),
        }
    }
}

impl std::error::Error for RegistryError {}

pub struct CpuRegistry {
    cpus: HashMap<CpuType, Box<dyn CpuModule>>,
    cpu_names: HashMap<String, CpuType>,
    default_cpu: Option<CpuType>,
}

impl Default for CpuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRegistry {
    pub fn new() -> Self {
        Self {
            cpus: HashMap::new(),
            cpu_names: HashMap::new(),
            default_cpu: None,
        }
    }

    /// Register a CPU. The first registered CPU becomes the default.
    pub fn register_cpu(&mut self, module: Box<dyn CpuModule>) {
        let cpu_id = module.cpu_id();
        self.cpu_names
            .insert(normalize_cpu_name(module.cpu_name()), cpu_id);
        self.cpu_names
            .insert(normalize_cpu_name(cpu_id.as_str()), cpu_id);
        for alias in module.cpu_aliases() {
            self.cpu_names.insert(normalize_cpu_name(alias), cpu_id);
        }
        self.default_cpu.get_or_insert(cpu_id);
        self.cpus.insert(cpu_id, module);
    }

    pub fn resolve_cpu_name(&self, name: &str) -> Option<CpuType> {
        self.cpu_names.get(&normalize_cpu_name(name)).copied()
    }

    pub fn default_cpu(&self) -> Option<CpuType> {
        self.default_cpu
    }

    pub fn cpu_name_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cpu_names.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn handler(&self, cpu: CpuType) -> Result<Box<dyn CpuHandler>, RegistryError> {
        self.cpus
            .get(&cpu)
            .map(|module| module.handler())
            .ok_or(RegistryError::MissingCpu(cpu))
    }

    pub fn handler_by_name(&self, name: &str) -> Result<Box<dyn CpuHandler>, RegistryError> {
        let cpu = self
            .resolve_cpu_name(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;
        self.handler(cpu)
    }
}

fn normalize_cpu_name(name: &str) -> String {
    name.to_ascii_lowercase()
}
