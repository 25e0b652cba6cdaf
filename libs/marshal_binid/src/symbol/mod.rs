//! Name ↔ numeric-id mapping for one record type's properties.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash as _, Hasher as _};
use std::sync::{Arc, LazyLock};

use marshal_core::{Error, Result};

pub mod provider;

/// Reserved discriminator property name for polymorphic payloads.
pub const RESERVED_NAME: &str = "@type";
/// Reserved id permanently bound to [`RESERVED_NAME`].
pub const RESERVED_ID: u32 = 1;

const MIN_BUCKETS: usize = 16;
const MAX_BUCKETS: usize = 2048;
/// Identity names precomputed for ids `1..=IDENTITY_CACHE`.
const IDENTITY_CACHE: usize = 64;

static RESERVED_ARC: LazyLock<Arc<str>> = LazyLock::new(|| Arc::from(RESERVED_NAME));
static EMPTY: LazyLock<Arc<SymbolTable>> =
    LazyLock::new(|| Arc::new(SymbolTable { repr: Repr::Empty }));
static IDENTITY: LazyLock<Arc<SymbolTable>> =
    LazyLock::new(|| Arc::new(SymbolTable { repr: Repr::Identity }));
static SMALL_IDS: LazyLock<[Arc<str>; IDENTITY_CACHE]> =
    LazyLock::new(|| std::array::from_fn(|i| Arc::from((i + 1).to_string().as_str())));

/// Bidirectional mapping between property names and small positive
/// integer ids, scoped to one logical record type.
///
/// Within one table, name ↔ id is a bijection, and the reserved
/// discriminator pair ([`RESERVED_NAME`], [`RESERVED_ID`]) is
/// permanently bound; [`bind`](Self::bind) rejects any attempt to pair
/// either half with something else.
///
/// Explicit tables are populated once during schema construction and
/// then [sealed](Self::seal) behind an [`Arc`]. Two degenerate shared
/// variants exist for record types without a schema: [`empty`]
/// (every lookup fails) and [`identity`] (each name is the canonical
/// decimal string of its id).
///
/// [`empty`]: Self::empty
/// [`identity`]: Self::identity
#[derive(Debug)]
pub struct SymbolTable {
    repr: Repr,
}

#[derive(Debug)]
enum Repr {
    Explicit(Explicit),
    Identity,
    Empty,
}

#[derive(Debug)]
struct Explicit {
    /// Open-chaining buckets over the name hash. The length is a
    /// power of two in `[MIN_BUCKETS, MAX_BUCKETS]` and never changes.
    buckets: Box<[Option<Box<Chain>>]>,
    names: HashMap<u32, Arc<str>>,
    /// Next candidate for auto-assignment; skips [`RESERVED_ID`] and
    /// explicitly bound ids.
    next_auto: u32,
}

#[derive(Debug)]
struct Chain {
    name: Arc<str>,
    id: u32,
    next: Option<Box<Chain>>,
}

impl SymbolTable {
    /// Creates an empty explicit table sized for about `capacity`
    /// names.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let buckets = capacity
            .next_power_of_two()
            .clamp(MIN_BUCKETS, MAX_BUCKETS);
        Self {
            repr: Repr::Explicit(Explicit {
                buckets: std::iter::repeat_with(|| None).take(buckets).collect(),
                names: HashMap::new(),
                next_auto: RESERVED_ID + 1,
            }),
        }
    }

    /// Creates an empty explicit table with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// The shared table where every lookup fails.
    pub fn empty() -> &'static Arc<Self> {
        &EMPTY
    }

    /// The shared table where each name is the canonical decimal
    /// string of its id.
    pub fn identity() -> &'static Arc<Self> {
        &IDENTITY
    }

    /// Wraps the populated table for shared use. Sealed tables can no
    /// longer learn names.
    #[must_use]
    pub fn seal(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Looks up the id bound to `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<u32> {
        match &self.repr {
            Repr::Explicit(_) if name == RESERVED_NAME => Some(RESERVED_ID),
            Repr::Explicit(table) => table.id_of(name),
            Repr::Identity => identity_id_of(name),
            Repr::Empty => None,
        }
    }

    /// Looks up the name bound to `id`.
    ///
    /// Returns `None` for 0 and unregistered ids.
    #[must_use]
    pub fn name_of(&self, id: u32) -> Option<Arc<str>> {
        match &self.repr {
            Repr::Explicit(_) if id == RESERVED_ID => Some(Arc::clone(&RESERVED_ARC)),
            Repr::Explicit(table) => table.names.get(&id).map(Arc::clone),
            Repr::Identity => identity_name_of(id),
            Repr::Empty => None,
        }
    }

    /// Registers an id ↔ name pair.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ReservedIdConflict`] when either half of
    /// the reserved discriminator pair is bound to something else (or
    /// the non-id 0 is used), and with [`Error::DuplicateBinding`]
    /// when the name or id is already bound. The table is left
    /// unchanged on failure; re-binding the exact reserved pair is a
    /// no-op.
    pub fn bind(&mut self, id: u32, name: &str) -> Result<()> {
        let reserved_half = id == RESERVED_ID || name == RESERVED_NAME;
        if id == 0 || (reserved_half && (id != RESERVED_ID || name != RESERVED_NAME)) {
            return Err(Error::ReservedIdConflict {
                id,
                name: name.into(),
            });
        }
        if id == RESERVED_ID {
            return Ok(());
        }

        let table = self.explicit_mut(id, name)?;
        if table.id_of(name).is_some() || table.names.contains_key(&id) {
            return Err(Error::DuplicateBinding {
                id,
                name: name.into(),
            });
        }
        table.insert(id, name);
        Ok(())
    }

    /// Returns the id bound to `name`, assigning the next sequential
    /// auto id on first use.
    ///
    /// This is the population path for tables built on the fly while
    /// writing without a schema; auto-assigned ids increase
    /// monotonically and skip the reserved discriminator.
    pub fn add(&mut self, name: &str) -> Result<u32> {
        if let Some(id) = self.id_of(name) {
            return Ok(id);
        }

        let table = self.explicit_mut(0, name)?;
        let mut id = table.next_auto;
        while id == RESERVED_ID || table.names.contains_key(&id) {
            id += 1;
        }
        table.next_auto = id + 1;
        table.insert(id, name);
        Ok(id)
    }

    /// Number of bound names, not counting the implicit reserved
    /// pair. Unbounded variants report 0.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Explicit(table) => table.names.len(),
            Repr::Identity | Repr::Empty => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn explicit_mut(&mut self, id: u32, name: &str) -> Result<&mut Explicit> {
        match &mut self.repr {
            Repr::Explicit(table) => Ok(table),
            // the degenerate singletons are only handed out behind an
            // Arc, but be defensive about future construction paths
            Repr::Identity | Repr::Empty => Err(Error::DuplicateBinding {
                id,
                name: name.into(),
            }),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Explicit {
    fn bucket_of(&self, name: &str) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        fn fold(hash: u64) -> usize {
            hash as usize
        }

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        fold(hasher.finish()) & (self.buckets.len() - 1)
    }

    fn id_of(&self, name: &str) -> Option<u32> {
        let mut link = self.buckets[self.bucket_of(name)].as_deref();
        while let Some(chain) = link {
            if *chain.name == *name {
                return Some(chain.id);
            }
            link = chain.next.as_deref();
        }
        None
    }

    /// Inserts a pair both callers have already checked for
    /// conflicts.
    fn insert(&mut self, id: u32, name: &str) {
        let name: Arc<str> = Arc::from(name);
        let bucket = self.bucket_of(&name);
        let head = self.buckets[bucket].take();
        self.buckets[bucket] = Some(Box::new(Chain {
            name: Arc::clone(&name),
            id,
            next: head,
        }));
        self.names.insert(id, name);
    }
}

fn identity_id_of(name: &str) -> Option<u32> {
    // only canonical decimal strings map back ("07" or "+7" do not)
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    name.parse::<u32>().ok().filter(|&id| id > 0)
}

fn identity_name_of(id: u32) -> Option<Arc<str>> {
    if id == 0 {
        return None;
    }
    match SMALL_IDS.get(id as usize - 1) {
        Some(cached) => Some(Arc::clone(cached)),
        None => Some(Arc::from(id.to_string().as_str())),
    }
}
