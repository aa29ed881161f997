//! Handle-keyed collections
//!
//! Scene nodes, materials and GPU resources all live in `slotmap` arenas and
//! are referred to by generational keys. A stale key simply fails to resolve,
//! which is how "the empty node" and "an already released resource" surface.

pub use slotmap::{Key, SlotMap};

slotmap::new_key_type! {
    /// Key of a node in a [`Scene`](crate::scene::Scene)
    pub struct NodeId;

    /// Key of a material in a scene's material library
    pub struct MaterialId;

    /// Key of an entry in the [`ResourceRegistry`](crate::render::resources::ResourceRegistry)
    pub struct ResourceKey;
}

/// Arena mapping a typed key to its value
pub type HandleMap<K, T> = SlotMap<K, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_key_no_longer_resolves() {
        let mut map: HandleMap<NodeId, &str> = HandleMap::with_key();
        let first = map.insert("first");
        map.remove(first);
        let second = map.insert("second");

        assert!(map.get(first).is_none());
        assert_eq!(map.get(second), Some(&"second"));
    }

    #[test]
    fn test_default_key_is_null() {
        assert!(NodeId::default().is_null());
        assert!(ResourceKey::default().is_null());
    }
}
