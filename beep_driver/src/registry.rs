//! In-process character-device registry.
//!
//! Provides a `CharDeviceRegistry` that plays the part of the kernel's
//! char-device and device-class bookkeeping: it allocates a major number,
//! creates a device class and a device node, and routes `open` on the node
//! to the registered [`FileOperations`]. It uses constructor-injection
//! rather than global state, so every test gets its own namespace.

use beep_common::consts::{
    DYNAMIC_MAJOR_END, DYNAMIC_MAJOR_START, MINOR_BASE, MINOR_NUM, node_name,
};
use beep_common::error::FileError;
use beep_common::registration::{
    DevNum, DeviceClassRegistry, FileOperations, RegistrationError, RegistrationHandle,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// A published device node.
struct NodeEntry {
    devnum: DevNum,
    fops: Arc<dyn FileOperations>,
}

#[derive(Default)]
struct RegistryInner {
    /// Allocated major numbers
    regions: BTreeSet<u32>,
    /// Existing device classes
    classes: HashSet<String>,
    /// Device nodes by name
    nodes: HashMap<String, NodeEntry>,
}

impl RegistryInner {
    /// Highest free major in the dynamic range.
    fn alloc_region(&mut self) -> Option<u32> {
        let major = (DYNAMIC_MAJOR_END..=DYNAMIC_MAJOR_START)
            .rev()
            .find(|m| !self.regions.contains(m))?;
        self.regions.insert(major);
        Some(major)
    }
}

/// Registry of character devices.
///
/// Constructed at startup and shared (`Arc`) between the driver that
/// registers devices and the callers that open them.
pub struct CharDeviceRegistry {
    inner: Mutex<RegistryInner>,
}

impl CharDeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Open a device node.
    ///
    /// # Errors
    /// - `FileError::NotFound` if no such node is registered
    /// - whatever the device's `open` handler returns
    pub fn open(&self, node: &str) -> Result<OpenFile, FileError> {
        let fops = self
            .inner
            .lock()
            .nodes
            .get(node)
            .map(|entry| Arc::clone(&entry.fops))
            .ok_or_else(|| FileError::NotFound(node.to_string()))?;
        fops.open()?;
        Ok(OpenFile {
            node: node.to_string(),
            fops,
        })
    }

    /// Device number of a node.
    pub fn devnum(&self, node: &str) -> Option<DevNum> {
        self.inner.lock().nodes.get(node).map(|entry| entry.devnum)
    }

    /// List all registered node names, sorted.
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.inner.lock().nodes.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    /// True if a device class with this name exists.
    pub fn has_class(&self, class: &str) -> bool {
        self.inner.lock().classes.contains(class)
    }
}

impl Default for CharDeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceClassRegistry for CharDeviceRegistry {
    fn register(
        &self,
        class: &str,
        node_prefix: &str,
        fops: Arc<dyn FileOperations>,
    ) -> Result<RegistrationHandle, RegistrationError> {
        let mut inner = self.inner.lock();

        let major = inner
            .alloc_region()
            .ok_or_else(|| RegistrationError::RegionUnavailable(class.to_string()))?;

        if !inner.classes.insert(class.to_string()) {
            inner.regions.remove(&major);
            return Err(RegistrationError::ClassExists(class.to_string()));
        }

        let node = node_name(node_prefix, MINOR_BASE);
        if inner.nodes.contains_key(&node) {
            inner.classes.remove(class);
            inner.regions.remove(&major);
            return Err(RegistrationError::NodeExists(node));
        }

        let devnum = DevNum::new(major, MINOR_BASE);
        inner.nodes.insert(node.clone(), NodeEntry { devnum, fops });
        info!(
            "Registered class '{}' node /dev/{} ({}, {} minor)",
            class, node, devnum, MINOR_NUM
        );

        Ok(RegistrationHandle::new(class, node, devnum))
    }

    fn unregister(&self, handle: &RegistrationHandle) {
        let mut inner = self.inner.lock();

        let owned = inner
            .nodes
            .get(handle.node())
            .is_some_and(|entry| entry.devnum == handle.devnum());
        if !owned {
            debug!("Node /dev/{} already unregistered", handle.node());
            return;
        }

        inner.nodes.remove(handle.node());
        inner.classes.remove(handle.class());
        inner.regions.remove(&handle.devnum().major);
        info!(
            "Unregistered class '{}' node /dev/{}",
            handle.class(),
            handle.node()
        );
    }
}

/// A caller's open handle on a device node. Dropping it closes the node.
pub struct OpenFile {
    node: String,
    fops: Arc<dyn FileOperations>,
}

impl OpenFile {
    /// Node this handle was opened on.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Read from the device into `buf`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        self.fops.read(buf)
    }

    /// Write `buf` to the device.
    pub fn write(&self, buf: &[u8]) -> Result<usize, FileError> {
        self.fops.write(buf)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        self.fops.release();
    }
}
