//! Shared construction and lookup of sealed symbol tables.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use marshal_core::Result;

use super::SymbolTable;

/// Opaque cache key identifying the record type a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(TypeId);

impl TypeKey {
    /// The key for the Rust type `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// Concurrent cache of sealed symbol tables, keyed by record type.
///
/// Building a table walks the type's schema, so it happens at most
/// once per key. Later lookups, including concurrent ones racing the
/// first, share the sealed [`Arc`].
#[derive(Debug, Default)]
pub struct MappingProvider {
    cache: DashMap<TypeKey, Arc<SymbolTable>>,
}

impl MappingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table for `key`, building and sealing it
    /// via `builder` on first use.
    ///
    /// The entry stays locked while `builder` runs, so a concurrent
    /// lookup of the same key waits instead of building twice. A
    /// failed build caches nothing and the error is returned as-is.
    pub fn get_or_build<F>(&self, key: TypeKey, builder: F) -> Result<Arc<SymbolTable>>
    where
        F: FnOnce() -> Result<SymbolTable>,
    {
        match self.cache.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                log::debug!("building symbol table for {key:?}");
                let table = builder()?.seal();
                entry.insert(Arc::clone(&table));
                Ok(table)
            }
        }
    }

    /// Returns the cached table for `key` without building.
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<Arc<SymbolTable>> {
        self.cache.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of cached tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Supplies symbol tables to a [`Reader`](crate::Reader) as it
/// descends into the document.
///
/// Every hook has a fallback: the root defaults to the
/// [identity](SymbolTable::identity) table, and returning `None` from
/// [`nested`](Self::nested) or [`type_tag`](Self::type_tag) keeps the
/// table the reader would use anyway.
pub trait TableResolver {
    /// Table for the outermost object.
    fn root(&self) -> Arc<SymbolTable> {
        Arc::clone(SymbolTable::identity())
    }

    /// Table for the object stored under `property` of an object
    /// using `parent`.
    fn nested(&self, parent: &Arc<SymbolTable>, property: &str) -> Option<Arc<SymbolTable>> {
        let _ = (parent, property);
        None
    }

    /// Table for a polymorphic object whose discriminator property
    /// decoded to `type_name`. Called after the discriminator value
    /// is read; the returned table replaces the frame's table for the
    /// remaining properties.
    fn type_tag(&self, type_name: &str) -> Option<Arc<SymbolTable>> {
        let _ = type_name;
        None
    }
}

/// Resolver that reads everything with the identity table.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl TableResolver for IdentityResolver {}

/// Resolver that reads the whole document with one fixed table.
///
/// Nested objects inherit the same table; useful for homogeneous
/// trees and for decoding what [`Writer`](crate::Writer) produced
/// with a single schema.
#[derive(Debug, Clone)]
pub struct FixedResolver {
    table: Arc<SymbolTable>,
}

impl FixedResolver {
    #[must_use]
    pub fn new(table: Arc<SymbolTable>) -> Self {
        Self { table }
    }
}

impl TableResolver for FixedResolver {
    fn root(&self) -> Arc<SymbolTable> {
        Arc::clone(&self.table)
    }

    fn nested(&self, _parent: &Arc<SymbolTable>, _property: &str) -> Option<Arc<SymbolTable>> {
        Some(Arc::clone(&self.table))
    }
}
