//! Identifier registry: name ↔ hash dictionary for one trace session.
//!
//! Records carry compact [`IdHash`] values; the registry is what makes them
//! readable again. Two distinct names mapping to the same hash is an error,
//! never a silent merge.

use crate::error::TraceError;
use crate::trace::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Hash of a registered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdHash(u64);

impl IdHash {
    pub fn new(raw: u64) -> Self {
        IdHash(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}

/// Hash function used by a registry.
pub type HashFn = fn(&str) -> u64;

/// 64-bit FNV-1a over the UTF-8 bytes of `name`.
pub fn fnv1a(name: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in name.as_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Reject names that cannot be written as one field of a BTF record.
///
/// Fields are comma-separated and records end at a line break, so a name
/// holding either would not read back as itself.
pub fn validate_name(name: &str) -> Result<(), TraceError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains(',') {
        "name contains a comma"
    } else if name.contains(['\n', '\r']) {
        "name contains a line break"
    } else {
        return Ok(());
    };
    warn!(name, reason, "invalid identifier");
    Err(TraceError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Name dictionary with optional entity-type bookkeeping.
#[derive(Clone, Debug)]
pub struct Registry {
    hasher: HashFn,
    names: HashMap<IdHash, String>,
    types: HashMap<IdHash, EntityType>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry hashing with [`fnv1a`].
    pub fn new() -> Self {
        Self::with_hasher(fnv1a)
    }

    /// Empty registry with a custom hash function.
    pub fn with_hasher(hasher: HashFn) -> Self {
        Self {
            hasher,
            names: HashMap::new(),
            types: HashMap::new(),
        }
    }

    /// The hash `name` would receive, without registering it.
    pub fn hash_of(&self, name: &str) -> IdHash {
        IdHash((self.hasher)(name))
    }

    /// Register `name` and return its hash.
    ///
    /// Idempotent for the same name. A different name that already owns the
    /// hash fails with [`TraceError::HashCollision`] and is not stored; a name
    /// that [`validate_name`] refuses fails with [`TraceError::InvalidName`].
    pub fn register(&mut self, name: &str) -> Result<IdHash, TraceError> {
        let hash = self.check(name)?;
        self.names.entry(hash).or_insert_with(|| name.to_string());
        Ok(hash)
    }

    /// Register `name` as an entity of type `entity_type`.
    ///
    /// A name may carry only one type for the whole session.
    pub fn register_typed(
        &mut self,
        name: &str,
        entity_type: EntityType,
    ) -> Result<IdHash, TraceError> {
        self.check_typed(name, entity_type)?;
        let hash = self.register(name)?;
        self.types.entry(hash).or_insert(entity_type);
        Ok(hash)
    }

    /// What [`Registry::register_typed`] would do, without changing anything.
    pub fn check_typed(&self, name: &str, entity_type: EntityType) -> Result<IdHash, TraceError> {
        let hash = self.check(name)?;
        match self.types.get(&hash) {
            Some(registered) if *registered != entity_type => Err(TraceError::TypeMismatch {
                name: name.to_string(),
                registered: *registered,
                requested: entity_type,
            }),
            _ => Ok(hash),
        }
    }

    /// Require that `hash` is registered, recording `entity_type` for it.
    pub fn ensure_type(&mut self, hash: IdHash, entity_type: EntityType) -> Result<(), TraceError> {
        let name = self.resolve(hash)?;
        match self.types.get(&hash) {
            Some(registered) if *registered != entity_type => Err(TraceError::TypeMismatch {
                name: name.to_string(),
                registered: *registered,
                requested: entity_type,
            }),
            Some(_) => Ok(()),
            None => {
                self.types.insert(hash, entity_type);
                Ok(())
            }
        }
    }

    /// Name registered under `hash`.
    pub fn resolve(&self, hash: IdHash) -> Result<&str, TraceError> {
        self.names
            .get(&hash)
            .map(String::as_str)
            .ok_or(TraceError::UnknownIdentifier(hash))
    }

    pub fn entity_type(&self, hash: IdHash) -> Option<EntityType> {
        self.types.get(&hash).copied()
    }

    pub fn contains(&self, hash: IdHash) -> bool {
        self.names.contains_key(&hash)
    }

    /// Restore a dictionary entry verbatim, as read from a checkpoint.
    ///
    /// The hash is not recomputed, so dictionaries written with another hash
    /// function stay resolvable.
    pub fn insert(
        &mut self,
        hash: IdHash,
        name: String,
        entity_type: Option<EntityType>,
    ) -> Result<(), TraceError> {
        validate_name(&name)?;
        if let Some(existing) = self.names.get(&hash) {
            if *existing != name {
                return Err(TraceError::HashCollision {
                    name,
                    existing: existing.clone(),
                    hash,
                });
            }
        }
        self.names.insert(hash, name);
        if let Some(entity_type) = entity_type {
            self.types.insert(hash, entity_type);
        }
        Ok(())
    }

    /// Dictionary entries sorted by hash.
    pub fn iter(&self) -> impl Iterator<Item = (IdHash, &str, Option<EntityType>)> {
        let mut hashes: Vec<_> = self.names.keys().copied().collect();
        hashes.sort();
        hashes.into_iter().filter_map(move |hash| {
            self.names
                .get(&hash)
                .map(|name| (hash, name.as_str(), self.types.get(&hash).copied()))
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn check(&self, name: &str) -> Result<IdHash, TraceError> {
        validate_name(name)?;
        let hash = self.hash_of(name);
        match self.names.get(&hash) {
            Some(existing) if existing != name => {
                warn!(%hash, name, existing = existing.as_str(), "hash collision");
                Err(TraceError::HashCollision {
                    name: name.to_string(),
                    existing: existing.clone(),
                    hash,
                })
            }
            _ => Ok(hash),
        }
    }
}
