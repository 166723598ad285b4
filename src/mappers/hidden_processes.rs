//! Hides helper processes from the simulator.
//!
//! Templates whose name starts with `__` are generated plumbing. Their
//! processes still run, but the simulator's process list does not show them.

use log::debug;

use super::{Mapper, ProcessEntry};

pub const ID: &str = "hidden-processes";

pub const HIDDEN_PREFIX: &str = "__";

#[derive(Debug, Default, Clone, Copy)]
pub struct HiddenProcesses;

pub fn create() -> Box<dyn Mapper> {
    Box::new(HiddenProcesses)
}

impl Mapper for HiddenProcesses {
    fn id(&self) -> &'static str {
        ID
    }

    fn map_processes(&self, processes: &mut Vec<ProcessEntry>) {
        let before = processes.len();
        processes.retain(|p| !p.template.starts_with(HIDDEN_PREFIX));
        debug!(hidden = before - processes.len(); "Filtered simulator processes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_processes_of_hidden_templates() {
        let mut processes = vec![
            ProcessEntry::new("P1", "Worker"),
            ProcessEntry::new("Clock", "__Tick"),
            ProcessEntry::new("__P2", "Worker"),
        ];
        HiddenProcesses.map_processes(&mut processes);
        assert_eq!(
            processes,
            vec![ProcessEntry::new("P1", "Worker"), ProcessEntry::new("__P2", "Worker")]
        );
    }

    #[test]
    fn contributes_nothing_to_models_or_queries() {
        assert!(HiddenProcesses.phases().is_empty());
        assert!(HiddenProcesses.map_query("ALWAYS x").unwrap().is_none());
    }
}
