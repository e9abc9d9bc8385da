//! The type metadata registry.
//!
//! Metadata is built on first access and cached for the registry's lifetime.
//! Concurrent first accesses for the same type coalesce on a per-type cell: one
//! caller builds, the others block until the build finishes and then share the
//! same `Arc`. Nested types are only resolved when something asks for them, so
//! self-referential and mutually recursive types build without recursion.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::FieldNamingStrategy;
use crate::error::MappingError;

use super::descriptor::{Mapped, TypeRef};
use super::metadata::EntityMetadata;

type Slot = Arc<OnceCell<Arc<EntityMetadata>>>;

/// Registry of entity metadata keyed by type.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    naming: FieldNamingStrategy,
    entries: RwLock<HashMap<TypeId, Slot>>,
    builds: AtomicUsize,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new(naming: FieldNamingStrategy) -> Self {
        Self {
            naming,
            entries: RwLock::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Returns the metadata of `T`, building it on first use.
    pub fn metadata_for<T: Mapped>(&self) -> Result<Arc<EntityMetadata>, MappingError> {
        self.resolve(TypeRef::of::<T>())
    }

    /// Returns the metadata of a referenced type, building it on first use.
    pub fn resolve(&self, type_ref: TypeRef) -> Result<Arc<EntityMetadata>, MappingError> {
        let slot = self.slot(type_ref.type_id);
        slot.get_or_try_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let metadata =
                EntityMetadata::build(type_ref.type_id, (type_ref.describe)(), self.naming)?;
            debug!(
                type_name = type_ref.type_name,
                properties = metadata.properties().len(),
                "Built entity metadata"
            );
            Ok(Arc::new(metadata))
        })
        .cloned()
    }

    /// Returns cached metadata without building.
    pub fn cached(&self, type_id: TypeId) -> Option<Arc<EntityMetadata>> {
        self.entries
            .read()
            .get(&type_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// The naming strategy applied to properties.
    pub fn naming(&self) -> FieldNamingStrategy {
        self.naming
    }

    /// Number of metadata builds performed, including failed ones.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn slot(&self, type_id: TypeId) -> Slot {
        if let Some(slot) = self.entries.read().get(&type_id) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(type_id).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EntityDescriptor, Property};

    struct Node;
    impl Mapped for Node {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .property(Property::keyword("label"))
                .property(Property::object("children", TypeRef::of::<Node>()).collection())
        }
    }

    struct Broken;
    impl Mapped for Broken {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::of::<Self>()
                .index("broken")
                .property(Property::text("name"))
        }
    }

    #[test]
    fn test_builds_once() {
        let registry = MetadataRegistry::default();
        let first = registry.metadata_for::<Node>().unwrap();
        let second = registry.metadata_for::<Node>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.build_count(), 1);
    }

    #[test]
    fn test_self_referential_type() {
        let registry = MetadataRegistry::default();
        let node = registry.metadata_for::<Node>().unwrap();
        let children = node.property("children").unwrap();
        let nested = registry.resolve(children.shape.entity().unwrap()).unwrap();
        assert!(Arc::ptr_eq(&node, &nested));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let registry = MetadataRegistry::default();
        assert!(registry.metadata_for::<Broken>().is_err());
        assert!(registry.cached(TypeId::of::<Broken>()).is_none());
        assert!(registry.metadata_for::<Broken>().is_err());
        assert_eq!(registry.build_count(), 2);
    }

    #[test]
    fn test_concurrent_first_access() {
        let registry = Arc::new(MetadataRegistry::default());
        let barrier = Arc::new(std::sync::Barrier::new(50));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.metadata_for::<Node>().unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.build_count(), 1);
        assert!(results.iter().all(|m| Arc::ptr_eq(m, &results[0])));
    }
}
