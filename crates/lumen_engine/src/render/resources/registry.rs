//! GPU resource registry
//!
//! Every GPU-resident object is registered here when it is initialized and
//! removed when it is freed. The registry is owned by the engine context, so
//! teardown order is explicit: [`ResourceRegistry::force_release`] destroys
//! whatever is still registered at shutdown, and
//! [`ResourceRegistry::check_leaks`] reports anything that was not freed by
//! its owner first.

use crate::foundation::collections::{HandleMap, ResourceKey};
use crate::render::api::{GpuBackend, GpuHandle};
use std::fmt;
use thiserror::Error;

/// Category of a registered object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linked shader program
    Program,
    /// Texture or render target
    Texture,
    /// Framebuffer object
    Framebuffer,
    /// Storage buffer
    StorageBuffer,
    /// Vertex array with its vertex and index buffers
    VertexArray,
    /// Render pipeline (owns no backend object itself)
    Pipeline,
}

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// `init` was called on an object that is already registered
    #[error("Object '{0}' already initialized")]
    AlreadyInitialized(String),

    /// The key does not refer to a registered object
    #[error("Unknown resource")]
    UnknownResource,
}

#[derive(Debug)]
struct ResourceEntry {
    label: String,
    kind: ResourceKind,
    gpu: Option<GpuHandle>,
}

/// Snapshot of the registry contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryReport {
    /// Registered objects
    pub total: usize,
    /// Registered objects with a backend object attached
    pub backed: usize,
}

impl fmt::Display for RegistryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} managed object(s), {} backed by the device", self.total, self.backed)
    }
}

/// Outcome of a forced release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseSummary {
    /// Objects that were unregistered
    pub released: usize,
    /// Backend objects that were destroyed
    pub destroyed: usize,
}

/// Arena of all GPU-resident objects
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HandleMap<ResourceKey, ResourceEntry>,
}

impl ResourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { entries: HandleMap::with_key() }
    }

    /// Register an initialized object and return its key
    pub fn register(&mut self, label: &str, kind: ResourceKind) -> ResourceKey {
        let key = self.entries.insert(ResourceEntry {
            label: label.to_string(),
            kind,
            gpu: None,
        });
        log::trace!("[+] {:?} '{}'", kind, label);
        key
    }

    /// Attach the backend object that backs a registered entry
    pub fn attach(&mut self, key: ResourceKey, gpu: GpuHandle) -> Result<(), ResourceError> {
        let entry = self.entries.get_mut(key).ok_or(ResourceError::UnknownResource)?;
        entry.gpu = Some(gpu);
        Ok(())
    }

    /// Whether `key` refers to a registered object
    ///
    /// Registration is initialization: an object is live from `register`
    /// until it is released.
    pub fn is_initialized(&self, key: ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Backend object attached to an entry
    pub fn gpu_handle(&self, key: ResourceKey) -> Option<GpuHandle> {
        self.entries.get(key).and_then(|entry| entry.gpu)
    }

    /// Label of an entry
    pub fn label(&self, key: ResourceKey) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.label.as_str())
    }

    /// Kind of an entry
    pub fn kind(&self, key: ResourceKey) -> Option<ResourceKind> {
        self.entries.get(key).map(|entry| entry.kind)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered objects of one kind
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.entries.values().filter(|entry| entry.kind == kind).count()
    }

    /// Destroy the backend object of an entry and unregister it
    pub fn release(&mut self, key: ResourceKey, backend: &mut dyn GpuBackend) -> Result<(), ResourceError> {
        let entry = self.entries.remove(key).ok_or(ResourceError::UnknownResource)?;
        if let Some(gpu) = entry.gpu {
            backend.destroy(gpu);
        }
        log::trace!("[-] {:?} '{}'", entry.kind, entry.label);
        Ok(())
    }

    /// Release every registered object
    ///
    /// Called at shutdown. Keys held by owners become stale, so a later
    /// `free` on them is a no-op.
    pub fn force_release(&mut self, backend: &mut dyn GpuBackend) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        for (_, entry) in self.entries.drain() {
            if let Some(gpu) = entry.gpu {
                backend.destroy(gpu);
                summary.destroyed += 1;
            }
            summary.released += 1;
        }
        log::info!("{} released, {} backend object(s) destroyed", summary.released, summary.destroyed);
        summary
    }

    /// Current contents
    pub fn report(&self) -> RegistryReport {
        RegistryReport {
            total: self.entries.len(),
            backed: self.entries.values().filter(|entry| entry.gpu.is_some()).count(),
        }
    }

    /// Log the current contents
    pub fn dump_report(&self) {
        log::info!("{}", self.report());
        for entry in self.entries.values() {
            match entry.gpu {
                Some(gpu) => log::debug!("   {:?} '{}' ({:?})", entry.kind, entry.label, gpu),
                None => log::debug!("   {:?} '{}' (no backend object)", entry.kind, entry.label),
            }
        }
    }

    /// Report objects that are still registered
    ///
    /// # Returns
    /// The number of outstanding objects; zero means no leaks.
    pub fn check_leaks(&self) -> usize {
        let outstanding = self.entries.len();
        if outstanding > 0 {
            log::warn!("{} GPU resource(s) still registered:", outstanding);
            for entry in self.entries.values() {
                log::warn!("   {:?} '{}'", entry.kind, entry.label);
            }
        }
        outstanding
    }
}

/// Registration state embedded in every managed object
///
/// Holds the registry key while the object is initialized.
#[derive(Debug, Default)]
pub struct ManagedState {
    key: Option<ResourceKey>,
}

impl ManagedState {
    /// Fresh, uninitialized state
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the owning object
    ///
    /// Fails if the object is already initialized.
    pub fn init(
        &mut self,
        registry: &mut ResourceRegistry,
        label: &str,
        kind: ResourceKind,
    ) -> Result<ResourceKey, ResourceError> {
        if self.is_initialized(registry) {
            log::error!("Object '{}' already initialized", label);
            return Err(ResourceError::AlreadyInitialized(label.to_string()));
        }
        let key = registry.register(label, kind);
        self.key = Some(key);
        Ok(key)
    }

    /// Whether the owning object is currently registered and initialized
    pub fn is_initialized(&self, registry: &ResourceRegistry) -> bool {
        self.key.is_some_and(|key| registry.is_initialized(key))
    }

    /// Registry key, if the object was initialized
    pub fn key(&self) -> Option<ResourceKey> {
        self.key
    }

    /// Unregister the owning object, destroying its backend object
    ///
    /// Freeing an uninitialized or already force-released object is a no-op.
    ///
    /// # Returns
    /// `true` if something was released
    pub fn free(&mut self, registry: &mut ResourceRegistry, backend: &mut dyn GpuBackend) -> bool {
        match self.key.take() {
            Some(key) => registry.release(key, backend).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::RecordingBackend;

    #[test]
    fn test_init_twice_fails() {
        let mut registry = ResourceRegistry::new();
        let mut state = ManagedState::new();

        assert!(state.init(&mut registry, "program", ResourceKind::Program).is_ok());
        assert_eq!(
            state.init(&mut registry, "program", ResourceKind::Program),
            Err(ResourceError::AlreadyInitialized("program".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_free_unregisters_and_destroys() {
        let mut backend = RecordingBackend::new();
        let mut registry = ResourceRegistry::new();
        let mut state = ManagedState::new();

        let key = state.init(&mut registry, "texture", ResourceKind::Texture).unwrap();
        registry.attach(key, GpuHandle(42)).unwrap();

        assert!(state.free(&mut registry, &mut backend));
        assert!(registry.is_empty());
        assert_eq!(backend.destroyed(), vec![GpuHandle(42)]);

        // Second free is a no-op
        assert!(!state.free(&mut registry, &mut backend));
    }

    #[test]
    fn test_free_does_not_reinitialize() {
        let mut backend = RecordingBackend::new();
        let mut registry = ResourceRegistry::new();
        let mut state = ManagedState::new();

        state.init(&mut registry, "fbo", ResourceKind::Framebuffer).unwrap();
        state.free(&mut registry, &mut backend);
        assert!(!state.is_initialized(&registry));

        // Re-initialization after free is allowed
        assert!(state.init(&mut registry, "fbo", ResourceKind::Framebuffer).is_ok());
    }

    #[test]
    fn test_force_release_reports_and_empties() {
        let mut backend = RecordingBackend::new();
        let mut registry = ResourceRegistry::new();
        let mut a = ManagedState::new();
        let mut b = ManagedState::new();

        let key_a = a.init(&mut registry, "a", ResourceKind::Texture).unwrap();
        registry.attach(key_a, GpuHandle(1)).unwrap();
        b.init(&mut registry, "b", ResourceKind::Pipeline).unwrap();
        assert_eq!(registry.report(), RegistryReport { total: 2, backed: 1 });
        assert_eq!(registry.check_leaks(), 2);

        let summary = registry.force_release(&mut backend);
        assert_eq!(summary, ReleaseSummary { released: 2, destroyed: 1 });
        assert_eq!(registry.check_leaks(), 0);
        assert_eq!(backend.destroyed(), vec![GpuHandle(1)]);

        // Owners see stale keys after a forced release
        assert!(!a.is_initialized(&registry));
        assert!(!a.free(&mut registry, &mut backend));
    }

    #[test]
    fn test_report_display() {
        let report = RegistryReport { total: 3, backed: 2 };
        assert_eq!(report.to_string(), "3 managed object(s), 2 backed by the device");
    }

    #[test]
    fn test_registration_without_backend_object() {
        let mut backend = RecordingBackend::new();
        let mut registry = ResourceRegistry::new();

        let pipeline = registry.register("forward", ResourceKind::Pipeline);
        assert!(registry.is_initialized(pipeline));
        assert_eq!(registry.gpu_handle(pipeline), None);
        assert_eq!(registry.report(), RegistryReport { total: 1, backed: 0 });

        let texture = registry.register("albedo", ResourceKind::Texture);
        registry.attach(texture, GpuHandle(7)).unwrap();
        assert_eq!(registry.report(), RegistryReport { total: 2, backed: 1 });

        registry.release(pipeline, &mut backend).unwrap();
        assert!(!registry.is_initialized(pipeline));
        assert!(backend.destroyed().is_empty());
        assert_eq!(registry.release(pipeline, &mut backend), Err(ResourceError::UnknownResource));
    }
}
