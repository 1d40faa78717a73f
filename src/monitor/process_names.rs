use std::collections::HashMap;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

/// Entries kept before the cache is reset; pids get reused, so the cache is
/// only meant to absorb bursts of events from the same writer.
const CACHE_LIMIT: usize = 1024;

/// Resolves process ids to executable names for event enrichment
pub struct ProcessNames {
    system: System,
    cache: HashMap<i32, Option<String>>,
}

impl ProcessNames {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            cache: HashMap::new(),
        }
    }

    /// Name of `pid`, or `None` if the process already exited
    pub fn lookup(&mut self, pid: i32) -> Option<String> {
        if let Some(name) = self.cache.get(&pid) {
            return name.clone();
        }
        if self.cache.len() >= CACHE_LIMIT {
            self.cache.clear();
        }

        let name = u32::try_from(pid).ok().and_then(|raw| {
            let pid = Pid::from_u32(raw);
            if self.system.refresh_process(pid) {
                self.system.process(pid).map(|p| p.name().to_string())
            } else {
                None
            }
        });
        self.cache.insert(pid, name.clone());
        name
    }
}

impl Default for ProcessNames {
    fn default() -> Self {
        Self::new()
    }
}
