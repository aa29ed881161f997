//! Identity and lifecycle state shared by every engine object
//!
//! Nodes, materials and pipelines each embed an [`Entity`]: a process-unique
//! id, a mutable display name and the dirty flag that signals "GPU-side state
//! derived from this object must be rebuilt".

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use thiserror::Error;

/// Name given to entities that were never named
pub const UNNAMED: &str = "[none]";

/// Names that cannot be assigned explicitly
const RESERVED_NAMES: [&str; 3] = ["", UNNAMED, "[empty]"];

static NEXT_ID: AtomicU32 = AtomicU32::new(1);
static LIVE_ENTITIES: AtomicUsize = AtomicUsize::new(0);

/// Process-unique entity identifier
///
/// Ids are handed out by a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Raw numeric value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity naming errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// The requested name is empty or reserved
    #[error("Invalid entity name '{0}'")]
    ReservedName(String),
}

/// Identity record embedded in engine objects
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: String,
    dirty: bool,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Create an unnamed, dirty entity with a fresh id
    pub fn new() -> Self {
        let id = EntityId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        LIVE_ENTITIES.fetch_add(1, Ordering::Relaxed);
        log::trace!("[+] entity {}", id);
        Self {
            id,
            name: UNNAMED.to_string(),
            dirty: true,
        }
    }

    /// Create a dirty entity with the given name
    ///
    /// A reserved name is logged and the entity stays unnamed.
    pub fn named(name: &str) -> Self {
        let mut entity = Self::new();
        if let Err(e) = entity.set_name(name) {
            log::error!("{}", e);
        }
        entity
    }

    /// Unique id of this entity
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the entity
    ///
    /// Empty and reserved names are rejected and leave the name unchanged.
    pub fn set_name(&mut self, name: &str) -> Result<(), EntityError> {
        if RESERVED_NAMES.contains(&name) {
            return Err(EntityError::ReservedName(name.to_string()));
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Whether GPU-side state derived from this entity is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set or clear the dirty flag
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Number of entities currently alive in the process
    pub fn live_count() -> usize {
        LIVE_ENTITIES.load(Ordering::Relaxed)
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        LIVE_ENTITIES.fetch_sub(1, Ordering::Relaxed);
        log::trace!("[-] entity {} ({})", self.id, self.name);
    }
}

/// Access to the [`Entity`] embedded in an engine object
pub trait Identity {
    /// Embedded identity record
    fn entity(&self) -> &Entity;

    /// Mutable identity record
    fn entity_mut(&mut self) -> &mut Entity;

    /// Unique id
    fn id(&self) -> EntityId {
        self.entity().id()
    }

    /// Current name
    fn name(&self) -> &str {
        self.entity().name()
    }

    /// Whether this object needs a GPU-side rebuild
    fn is_dirty(&self) -> bool {
        self.entity().is_dirty()
    }

    /// Set or clear the dirty flag
    fn set_dirty(&mut self, dirty: bool) {
        self.entity_mut().set_dirty(dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = Entity::new();
        let b = Entity::new();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_new_entity_is_dirty_and_unnamed() {
        let entity = Entity::new();
        assert!(entity.is_dirty());
        assert_eq!(entity.name(), UNNAMED);
    }

    #[test]
    fn test_reserved_names_are_rejected() {
        let mut entity = Entity::named("lamp");
        for reserved in ["", "[none]", "[empty]"] {
            assert_eq!(
                entity.set_name(reserved),
                Err(EntityError::ReservedName(reserved.to_string()))
            );
        }
        assert_eq!(entity.name(), "lamp");
    }

    #[test]
    fn test_dirty_flag_toggles() {
        let mut entity = Entity::new();
        entity.set_dirty(false);
        assert!(!entity.is_dirty());
        entity.set_dirty(true);
        assert!(entity.is_dirty());
    }
}
