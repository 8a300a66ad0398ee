//! Binding of a declared `Spec` against the live type catalog.
//!
//! # Responsibility
//! - Load the catalog, verify every declared name exists, project the
//!   per-category name to id maps.
//! - Run every initializer with type-resolved arguments and collect the
//!   results into an immutable `RepoSet`.
//!
//! # Invariants
//! - Either a fully populated `RepoSet` is returned or none at all.
//! - "Other" initializers run before any category initializer.
//! - Category order is artifact, context, execution; names run in
//!   ascending order within a category.
//! - No two built repositories share a concrete type or a storage name.

use crate::catalog::{CatalogError, TypeCatalogReader};
use crate::repo_set::{RepoSet, RepoSetBuilder};
use crate::spec::{
    BoxError, Category, Initializer, InterfaceBinding, InvokeError, RuntimeType, Spec,
};
use log::{debug, error, info};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

mod environment;

pub use environment::{
    ArtifactTypeMap, ContextTypeMap, Environment, ExecutionTypeMap, TypeIdValue,
};

pub type BindResult<T> = Result<T, BindError>;

/// Where an initializer was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitSite {
    Other { index: usize },
    Typed { category: Category, type_name: String },
}

impl InitSite {
    /// Key under which the built repository is indexed by name.
    pub fn storage_name(&self) -> String {
        match self {
            Self::Other { index } => format!("other[{index}]"),
            Self::Typed { type_name, .. } => type_name.clone(),
        }
    }

    /// `key=value` fields identifying this site in log lines.
    pub fn log_fields(&self) -> String {
        match self {
            Self::Other { index } => format!("category=other index={index}"),
            Self::Typed {
                category,
                type_name,
            } => format!("category={category} type_name={type_name}"),
        }
    }
}

impl Display for InitSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other { index } => write!(f, "other initializer #{index}"),
            Self::Typed {
                category,
                type_name,
            } => write!(f, "{category} type `{type_name}`"),
        }
    }
}

#[derive(Debug)]
pub enum BindError {
    CatalogRead(CatalogError),
    /// Declared names absent from a non-empty catalog, sorted.
    MissingType { missing: Vec<String> },
    /// The catalog holds no types at all.
    EmptyCatalog { missing: Vec<String> },
    InvalidInitializer { site: InitSite, reason: String },
    UnsatisfiableArgument { site: InitSite, parameter: RuntimeType },
    Constructor { site: InitSite, source: BoxError },
    DuplicateRepositoryType {
        repository_type: RuntimeType,
        first: String,
        second: String,
    },
    /// Two initializers would be indexed under the same storage name.
    DuplicateRepositoryName {
        name: String,
        first: InitSite,
        second: InitSite,
    },
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CatalogRead(err) => write!(f, "failed to read type catalog: {err}"),
            Self::MissingType { missing } => {
                write!(f, "missing required types: {}", missing.join(", "))
            }
            Self::EmptyCatalog { missing } => write!(
                f,
                "no types available in catalog; missing required types: {}",
                missing.join(", ")
            ),
            Self::InvalidInitializer { site, reason } => {
                write!(f, "invalid initializer for {site}: {reason}")
            }
            Self::UnsatisfiableArgument { site, parameter } => write!(
                f,
                "no value of type `{parameter}` available for {site}"
            ),
            Self::Constructor { site, source } => {
                write!(f, "failed to construct repository for {site}: {source}")
            }
            Self::DuplicateRepositoryType {
                repository_type,
                first,
                second,
            } => write!(
                f,
                "repository type `{repository_type}` built for both `{first}` and `{second}`"
            ),
            Self::DuplicateRepositoryName {
                name,
                first,
                second,
            } => write!(
                f,
                "repository name `{name}` claimed by both {first} and {second}"
            ),
        }
    }
}

impl Error for BindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CatalogRead(err) => Some(err),
            Self::Constructor { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Binds `spec` using `db` both as catalog reader and injected handle.
pub fn bind<H>(spec: &Spec, db: H) -> BindResult<RepoSet>
where
    H: TypeCatalogReader + Clone + Send + Sync + 'static,
{
    let reader = db.clone();
    bind_with_reader(spec, &reader, db)
}

/// Binds `spec`, reading types from `reader` and injecting `db`.
///
/// # Errors
/// Aborts on the first failure; see [`BindError`].
pub fn bind_with_reader<R, H>(spec: &Spec, reader: &R, db: H) -> BindResult<RepoSet>
where
    R: TypeCatalogReader + ?Sized,
    H: Clone + Send + Sync + 'static,
{
    let started_at = Instant::now();
    info!(
        "event=repo_bind module=binder status=start declared={} others={}",
        spec.len(),
        spec.others().len()
    );

    match bind_inner(spec, reader, db) {
        Ok(set) => {
            info!(
                "event=repo_bind module=binder status=ok duration_ms={} types={} repositories={}",
                started_at.elapsed().as_millis(),
                set.type_count(),
                set.len()
            );
            Ok(set)
        }
        Err(err) => {
            error!(
                "event=repo_bind module=binder status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bind_inner<R, H>(spec: &Spec, reader: &R, db: H) -> BindResult<RepoSet>
where
    R: TypeCatalogReader + ?Sized,
    H: Clone + Send + Sync + 'static,
{
    let catalog: HashMap<String, i32> = reader
        .get_all()
        .map_err(BindError::CatalogRead)?
        .into_iter()
        .map(|entry| (entry.name, entry.id))
        .collect();

    let missing: Vec<String> = spec
        .all_names()
        .into_iter()
        .filter(|name| !catalog.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(if catalog.is_empty() {
            BindError::EmptyCatalog { missing }
        } else {
            BindError::MissingType { missing }
        });
    }

    claim_storage_names(spec)?;

    let project = |category: Category| -> BTreeMap<String, i32> {
        spec.types(category)
            .keys()
            .filter_map(|name| catalog.get(name).map(|id| (name.clone(), *id)))
            .collect()
    };
    let artifacts = project(Category::Artifact);
    let contexts = project(Category::Context);
    let executions = project(Category::Execution);

    let mut name_ids = HashMap::new();
    for ids in [&artifacts, &contexts, &executions] {
        name_ids.extend(ids.iter().map(|(name, id)| (name.clone(), *id)));
    }

    let mut env = Environment::new();
    env.insert(db);
    env.insert(ArtifactTypeMap::new(artifacts));
    env.insert(ContextTypeMap::new(contexts));
    env.insert(ExecutionTypeMap::new(executions));

    let mut builder = RepoSetBuilder::new(name_ids);

    for (index, initializer) in spec.others().iter().enumerate() {
        construct(
            &env,
            &mut builder,
            InitSite::Other { index },
            Some(initializer),
            &[],
        )?;
    }

    for category in Category::ALL {
        for (type_name, spec_type) in spec.types(category) {
            let id = catalog.get(type_name).copied().ok_or_else(|| BindError::MissingType {
                missing: vec![type_name.clone()],
            })?;
            env.insert(TypeIdValue::new(id));
            construct(
                &env,
                &mut builder,
                InitSite::Typed {
                    category,
                    type_name: type_name.clone(),
                },
                spec_type.initializer(),
                spec_type.interface_bindings(),
            )?;
        }
    }

    Ok(builder.finish())
}

/// Rejects specs where two initializers share a storage name, before any
/// of them runs.
fn claim_storage_names(spec: &Spec) -> BindResult<()> {
    let others = (0..spec.others().len()).map(|index| InitSite::Other { index });
    let typed = Category::ALL.into_iter().flat_map(|category| {
        spec.types(category)
            .keys()
            .map(move |type_name| InitSite::Typed {
                category,
                type_name: type_name.clone(),
            })
    });

    let mut claimed: HashMap<String, InitSite> = HashMap::new();
    for site in others.chain(typed) {
        match claimed.entry(site.storage_name()) {
            Entry::Occupied(entry) => {
                return Err(BindError::DuplicateRepositoryName {
                    name: entry.key().clone(),
                    first: entry.get().clone(),
                    second: site,
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(site);
            }
        }
    }
    Ok(())
}

fn construct(
    env: &Environment,
    builder: &mut RepoSetBuilder,
    site: InitSite,
    initializer: Option<&Initializer>,
    bindings: &[InterfaceBinding],
) -> BindResult<()> {
    let Some(initializer) = initializer else {
        return Err(BindError::InvalidInitializer {
            site,
            reason: "no initializer registered".to_string(),
        });
    };

    let repository_type = initializer.output_type();
    if let Some(binding) = bindings
        .iter()
        .find(|binding| binding.source != repository_type)
    {
        return Err(BindError::InvalidInitializer {
            reason: format!(
                "declared `{}` for `{}` but the initializer builds `{repository_type}`",
                binding.interface, binding.source
            ),
            site,
        });
    }
    if let Some(first) = builder.owner_of(repository_type) {
        return Err(BindError::DuplicateRepositoryType {
            repository_type,
            first: first.to_string(),
            second: site.storage_name(),
        });
    }

    debug!(
        "event=repo_init module=binder {} repository_type={}",
        site.log_fields(),
        repository_type
    );
    let built = initializer.invoke(env).map_err(|err| match err {
        InvokeError::Unsatisfiable(parameter) => BindError::UnsatisfiableArgument {
            site: site.clone(),
            parameter,
        },
        InvokeError::Constructor(source) => BindError::Constructor {
            site: site.clone(),
            source,
        },
    })?;

    let mut views = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let view = binding
            .cast(&built.instance)
            .ok_or_else(|| BindError::InvalidInitializer {
                site: site.clone(),
                reason: format!("instance is not `{}`", binding.source),
            })?;
        views.push((binding.interface, view));
    }

    builder.insert(site.storage_name(), repository_type, built.typed, views);
    Ok(())
}
