//! Immutable, query-only registry produced by the binder.
//!
//! # Responsibility
//! - Expose the merged declared-name to id map.
//! - Resolve repositories by concrete type, by declared interface, or by
//!   declared type name.
//!
//! # Invariants
//! - A `RepoSet` never mutates after the binder returns it; concurrent
//!   readers need no locking.
//! - Interface lookup never picks a winner silently: more than one
//!   provider is an `AmbiguousRepository` error.
//! - Replacement happens only by swapping a whole `Arc<RepoSet>` inside
//!   `SharedRepoSet`.

use crate::binder::{bind, BindResult};
use crate::catalog::TypeCatalogReader;
use crate::spec::{RuntimeType, Spec};
use log::info;
use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, RwLock};

pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    UnknownRepository {
        requested: RuntimeType,
    },
    AmbiguousRepository {
        requested: RuntimeType,
        candidates: Vec<String>,
    },
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownRepository { requested } => {
                write!(f, "unknown repository type `{requested}`")
            }
            Self::AmbiguousRepository {
                requested,
                candidates,
            } => write!(
                f,
                "repository type `{requested}` is provided by several repositories: {}",
                candidates.join(", ")
            ),
        }
    }
}

impl Error for LookupError {}

struct StoredRepository {
    name: String,
    repository_type: RuntimeType,
    /// `Arc<R>` of the concrete type.
    typed: Box<dyn Any + Send + Sync>,
    /// `Arc<I>` per declared interface.
    views: Vec<(RuntimeType, Box<dyn Any + Send + Sync>)>,
}

impl StoredRepository {
    fn exact<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.typed.downcast_ref::<Arc<T>>().cloned()
    }

    fn view<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let requested = RuntimeType::of::<T>();
        self.views
            .iter()
            .find(|(interface, _)| *interface == requested)
            .and_then(|(_, view)| view.downcast_ref::<Arc<T>>().cloned())
    }
}

/// Type-indexed repositories plus the declared type ids they were bound to.
pub struct RepoSet {
    name_ids: HashMap<String, i32>,
    repositories: Vec<StoredRepository>,
    by_type: HashMap<RuntimeType, usize>,
    by_name: HashMap<String, usize>,
}

impl RepoSet {
    /// Returns a copy of the merged declared-name to id map.
    pub fn type_map(&self) -> HashMap<String, i32> {
        self.name_ids.clone()
    }

    pub fn type_id(&self, name: &str) -> Option<i32> {
        self.name_ids.get(name).copied()
    }

    pub fn type_count(&self) -> usize {
        self.name_ids.len()
    }

    /// Resolves the repository reachable as `T`.
    ///
    /// `T` is either a concrete repository type or an interface (trait
    /// object) declared with `SpecType::implements`. The exact concrete
    /// match wins; otherwise exactly one interface provider must exist.
    ///
    /// # Errors
    /// - `UnknownRepository` when nothing provides `T`.
    /// - `AmbiguousRepository` when several repositories provide `T`; use
    ///   [`RepoSet::repositories`] to choose among them.
    pub fn repository<T>(&self) -> LookupResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let requested = RuntimeType::of::<T>();
        if let Some(repo) = self
            .by_type
            .get(&requested)
            .and_then(|index| self.repositories[*index].exact::<T>())
        {
            return Ok(repo);
        }

        let mut providers: Vec<(&str, Arc<T>)> = self
            .repositories
            .iter()
            .filter_map(|stored| stored.view::<T>().map(|view| (stored.name.as_str(), view)))
            .collect();
        match providers.len() {
            0 => Err(LookupError::UnknownRepository { requested }),
            1 => Ok(providers.remove(0).1),
            _ => Err(LookupError::AmbiguousRepository {
                requested,
                candidates: providers
                    .iter()
                    .map(|(name, _)| name.to_string())
                    .collect(),
            }),
        }
    }

    /// Every repository reachable as `T`, in construction order.
    pub fn repositories<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.repositories
            .iter()
            .filter_map(|stored| stored.exact::<T>().or_else(|| stored.view::<T>()))
            .collect()
    }

    /// Repository built for one declared type name (`other[N]` for others).
    pub fn repository_named<T>(&self, name: &str) -> LookupResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.by_name
            .get(name)
            .map(|index| &self.repositories[*index])
            .and_then(|stored| stored.exact::<T>().or_else(|| stored.view::<T>()))
            .ok_or(LookupError::UnknownRepository {
                requested: RuntimeType::of::<T>(),
            })
    }

    /// Storage names in construction order.
    pub fn names(&self) -> Vec<&str> {
        self.repositories
            .iter()
            .map(|stored| stored.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl Debug for RepoSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoSet")
            .field("name_ids", &self.name_ids)
            .field(
                "repositories",
                &self
                    .repositories
                    .iter()
                    .map(|stored| (stored.name.as_str(), stored.repository_type))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Accumulates repositories during one binder run.
pub(crate) struct RepoSetBuilder {
    set: RepoSet,
}

impl RepoSetBuilder {
    pub(crate) fn new(name_ids: HashMap<String, i32>) -> Self {
        Self {
            set: RepoSet {
                name_ids,
                repositories: Vec::new(),
                by_type: HashMap::new(),
                by_name: HashMap::new(),
            },
        }
    }

    /// Storage name of the repository already built with this type.
    pub(crate) fn owner_of(&self, repository_type: RuntimeType) -> Option<&str> {
        self.set
            .by_type
            .get(&repository_type)
            .map(|index| self.set.repositories[*index].name.as_str())
    }

    pub(crate) fn insert(
        &mut self,
        name: String,
        repository_type: RuntimeType,
        typed: Box<dyn Any + Send + Sync>,
        views: Vec<(RuntimeType, Box<dyn Any + Send + Sync>)>,
    ) {
        let index = self.set.repositories.len();
        self.set.by_type.insert(repository_type, index);
        self.set.by_name.insert(name.clone(), index);
        self.set.repositories.push(StoredRepository {
            name,
            repository_type,
            typed,
            views,
        });
    }

    pub(crate) fn finish(self) -> RepoSet {
        self.set
    }
}

/// Swappable reference to the current `RepoSet`.
///
/// Readers take an `Arc` snapshot; a rebuild replaces the whole set and
/// never touches a snapshot already handed out.
pub struct SharedRepoSet {
    current: RwLock<Arc<RepoSet>>,
}

impl SharedRepoSet {
    pub fn new(set: RepoSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    pub fn snapshot(&self) -> Arc<RepoSet> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Installs `set` and returns the one it replaced.
    pub fn replace(&self, set: RepoSet) -> Arc<RepoSet> {
        self.swap(Arc::new(set))
    }

    /// Binds `spec` again and swaps the result in. On error the current set
    /// stays installed.
    ///
    /// Returns the set this call installed, even if another rebuild has
    /// replaced it since.
    pub fn rebuild<H>(&self, spec: &Spec, db: H) -> BindResult<Arc<RepoSet>>
    where
        H: TypeCatalogReader + Clone + Send + Sync + 'static,
    {
        let installed = Arc::new(bind(spec, db)?);
        let previous = self.swap(Arc::clone(&installed));
        info!(
            "event=repo_rebuild module=repo_set status=ok previous_types={} types={}",
            previous.type_count(),
            installed.type_count()
        );
        Ok(installed)
    }

    fn swap(&self, set: Arc<RepoSet>) -> Arc<RepoSet> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, set)
    }
}

impl Debug for SharedRepoSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedRepoSet").field(&self.snapshot()).finish()
    }
}
