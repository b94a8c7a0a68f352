//! Device capability queries.
//!
//! The expander knows nothing about electrical devices. It only asks, for a
//! device key letter, how many node tokens follow the device name, how many
//! device-reference tokens follow those, and whether a model name must appear.
//! `SpiceDevices` answers with the conventional SPICE element table; any other
//! simulator front end can plug in its own `DeviceCatalog`.

use std::collections::HashMap;

/// Token layout of one device statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Node tokens that are always present.
    pub min_nodes: usize,
    /// Node tokens that may be present; slots past `min_nodes` may instead
    /// hold the model name.
    pub max_nodes: usize,
    /// Device-name references following the nodes (`f1 a b vsense ...`).
    pub dev_refs: usize,
    /// The statement must name a model.
    pub has_model: bool,
}

impl DeviceInfo {
    pub const fn new(min_nodes: usize, max_nodes: usize, dev_refs: usize, has_model: bool) -> Self {
        Self {
            min_nodes,
            max_nodes,
            dev_refs,
            has_model,
        }
    }

    /// Node slots that may hold either a node or the model name.
    pub fn optional_nodes(&self) -> usize {
        self.max_nodes.saturating_sub(self.min_nodes)
    }
}

/// Answers "for device key K, return (min_nodes, max_nodes, dev_refs, has_model)".
pub trait DeviceCatalog {
    fn info(&self, key: char) -> Option<DeviceInfo>;
}

/// Conventional SPICE element letters.
#[derive(Debug, Clone)]
pub struct SpiceDevices {
    table: HashMap<char, DeviceInfo>,
}

impl Default for SpiceDevices {
    fn default() -> Self {
        let entries = [
            ('r', DeviceInfo::new(2, 2, 0, false)),
            ('c', DeviceInfo::new(2, 2, 0, false)),
            ('l', DeviceInfo::new(2, 2, 0, false)),
            ('v', DeviceInfo::new(2, 2, 0, false)),
            ('i', DeviceInfo::new(2, 2, 0, false)),
            ('b', DeviceInfo::new(2, 2, 0, false)),
            ('k', DeviceInfo::new(0, 0, 2, false)),
            ('e', DeviceInfo::new(4, 4, 0, false)),
            ('g', DeviceInfo::new(4, 4, 0, false)),
            ('f', DeviceInfo::new(2, 2, 1, false)),
            ('h', DeviceInfo::new(2, 2, 1, false)),
            ('d', DeviceInfo::new(2, 2, 0, true)),
            ('j', DeviceInfo::new(3, 3, 0, true)),
            ('z', DeviceInfo::new(3, 3, 0, true)),
            ('m', DeviceInfo::new(4, 4, 0, true)),
            ('q', DeviceInfo::new(3, 4, 0, true)),
            ('t', DeviceInfo::new(4, 4, 0, false)),
            ('o', DeviceInfo::new(4, 4, 0, true)),
            ('u', DeviceInfo::new(3, 3, 0, true)),
            ('s', DeviceInfo::new(4, 4, 0, true)),
            ('w', DeviceInfo::new(2, 2, 1, true)),
        ];
        Self {
            table: entries.into_iter().collect(),
        }
    }
}

impl SpiceDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the layout for a key letter.
    pub fn with(mut self, key: char, info: DeviceInfo) -> Self {
        self.table.insert(key.to_ascii_lowercase(), info);
        self
    }
}

impl DeviceCatalog for SpiceDevices {
    fn info(&self, key: char) -> Option<DeviceInfo> {
        self.table.get(&key.to_ascii_lowercase()).copied()
    }
}
