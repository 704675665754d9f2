//! Value type to accessor factory mapping, built once at startup

use super::codec::MemoryType;
use super::handle::{Memory, MemoryBinding};
use crate::core::types::{Color, MemoryError, MemoryResult, Quaternion, Vector};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Builds the typed handle for one value type
pub type MemoryFactory<T> = fn(MemoryBinding) -> Memory<T>;

/// One registered accessor
pub struct AccessorDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    size: usize,
    // Always a `MemoryFactory<T>` for the `T` behind `type_id`
    factory: Box<dyn Any + Send + Sync>,
}

impl AccessorDescriptor {
    fn new<T: MemoryType>(factory: MemoryFactory<T>) -> Self {
        AccessorDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: T::NAME,
            size: T::SIZE,
            factory: Box::new(factory),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for AccessorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorDescriptor")
            .field("type_name", &self.type_name)
            .field("size", &self.size)
            .finish()
    }
}

/// Collects the accessor list; duplicates are reported by [`RegistryBuilder::build`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<AccessorDescriptor>,
}

impl RegistryBuilder {
    /// Registers `T` with the default [`Memory::bind`] factory
    pub fn register<T: MemoryType>(self) -> Self {
        self.register_with::<T>(Memory::<T>::bind)
    }

    pub fn register_with<T: MemoryType>(mut self, factory: MemoryFactory<T>) -> Self {
        self.entries.push(AccessorDescriptor::new::<T>(factory));
        self
    }

    /// Freezes the list. Fails on the first type registered twice.
    pub fn build(self) -> MemoryResult<MemoryTypeRegistry> {
        let mut accessors = HashMap::with_capacity(self.entries.len());

        for entry in self.entries {
            if accessors.contains_key(&entry.type_id) {
                return Err(MemoryError::DuplicateAccessor(entry.type_name));
            }
            accessors.insert(entry.type_id, entry);
        }

        debug!(count = accessors.len(), "Built memory type registry");
        Ok(MemoryTypeRegistry { accessors })
    }
}

/// Read-only lookup from value type to accessor factory
#[derive(Debug)]
pub struct MemoryTypeRegistry {
    accessors: HashMap<TypeId, AccessorDescriptor>,
}

impl MemoryTypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Every value type the crate ships an accessor for
    pub fn builtin() -> MemoryResult<Self> {
        Self::builder()
            .register::<bool>()
            .register::<u8>()
            .register::<i8>()
            .register::<u16>()
            .register::<i16>()
            .register::<u32>()
            .register::<i32>()
            .register::<u64>()
            .register::<i64>()
            .register::<f32>()
            .register::<f64>()
            .register::<Vector>()
            .register::<Color>()
            .register::<Quaternion>()
            .build()
    }

    /// The factory for `T`, or [`MemoryError::UnsupportedType`]
    pub fn lookup<T: MemoryType>(&self) -> MemoryResult<MemoryFactory<T>> {
        self.lookup_id(TypeId::of::<T>())
            .and_then(|d| d.factory.downcast_ref::<MemoryFactory<T>>())
            .copied()
            .ok_or(MemoryError::UnsupportedType(T::NAME))
    }

    pub fn lookup_id(&self, type_id: TypeId) -> Option<&AccessorDescriptor> {
        self.accessors.get(&type_id)
    }

    pub fn contains<T: MemoryType>(&self) -> bool {
        self.accessors.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.accessors.values().map(|d| d.type_name).collect();
        names.sort_unstable();
        names
    }
}
