//! Declaration API for the named domain types an application needs.
//!
//! # Responsibility
//! - Collect artifact/context/execution type names with their initializers
//!   and property schemas.
//! - Collect category-less "other" initializers in declaration order.
//!
//! # Invariants
//! - Declaration never validates anything; errors surface when binding.
//! - Within one category a name maps to exactly one `SpecType`; declaring it
//!   again replaces the earlier entry.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

mod initializer;

pub use initializer::{
    BoxError, FromEnvironment, InitOutput, Initializer, IntoInitializer, InvokeError, Repository,
    RuntimeType,
};

/// Grouping of declared types sharing one injection shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Artifact,
    Context,
    Execution,
}

impl Category {
    /// Binding order for category-specific initializers.
    pub const ALL: [Category; 3] = [Category::Artifact, Category::Context, Category::Execution];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::Context => "context",
            Self::Execution => "execution",
        }
    }

    /// Value stored in `types.type_kind`.
    pub(crate) fn type_kind(self) -> i64 {
        match self {
            Self::Execution => 0,
            Self::Artifact => 1,
            Self::Context => 2,
        }
    }

    pub(crate) fn from_type_kind(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Execution),
            1 => Some(Self::Artifact),
            2 => Some(Self::Context),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kind of one declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Unknown,
    Int,
    Double,
    String,
    Struct,
    Proto,
    Boolean,
}

impl PropertyKind {
    /// Value stored in `type_properties.data_type`.
    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Int => 1,
            Self::Double => 2,
            Self::String => 3,
            Self::Struct => 4,
            Self::Proto => 5,
            Self::Boolean => 6,
        }
    }

    pub fn from_code(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Int),
            2 => Some(Self::Double),
            3 => Some(Self::String),
            4 => Some(Self::Struct),
            5 => Some(Self::Proto),
            6 => Some(Self::Boolean),
            _ => None,
        }
    }
}

type CastFn =
    dyn Fn(&Arc<dyn Any + Send + Sync>) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync;

/// Trait-object view a constructed repository offers for interface lookup.
pub(crate) struct InterfaceBinding {
    pub(crate) interface: RuntimeType,
    pub(crate) source: RuntimeType,
    cast: Box<CastFn>,
}

impl InterfaceBinding {
    /// Returns `Arc<I>` boxed as `Any`, or `None` when `instance` is not the
    /// concrete type this binding was declared for.
    pub(crate) fn cast(
        &self,
        instance: &Arc<dyn Any + Send + Sync>,
    ) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast)(instance)
    }
}

/// One declared type: initializer plus descriptive property schema.
#[derive(Default)]
pub struct SpecType {
    initializer: Option<Initializer>,
    properties: BTreeMap<String, PropertyKind>,
    interfaces: Vec<InterfaceBinding>,
}

impl SpecType {
    pub fn new<Args>(initializer: impl IntoInitializer<Args>) -> Self {
        Self {
            initializer: Some(initializer.into_initializer()),
            ..Self::default()
        }
    }

    /// Schema-only declaration. Binding rejects it until an initializer is set.
    pub fn schema_only() -> Self {
        Self::default()
    }

    pub fn with_initializer<Args>(mut self, initializer: impl IntoInitializer<Args>) -> Self {
        self.initializer = Some(initializer.into_initializer());
        self
    }

    pub fn add_property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    pub fn add_int(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::Int)
    }

    pub fn add_double(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::Double)
    }

    pub fn add_string(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::String)
    }

    pub fn add_struct(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::Struct)
    }

    pub fn add_proto(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::Proto)
    }

    pub fn add_boolean(self, name: impl Into<String>) -> Self {
        self.add_property(name, PropertyKind::Boolean)
    }

    /// Declares that the constructed `R` is also reachable as `I`.
    ///
    /// `cast` is normally an unsizing identity such as
    /// `|repo: Arc<MyRepo>| -> Arc<dyn MyTrait> { repo }`.
    pub fn implements<R, I, F>(mut self, cast: F) -> Self
    where
        R: Repository,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<R>) -> Arc<I> + Send + Sync + 'static,
    {
        self.interfaces.push(InterfaceBinding {
            interface: RuntimeType::of::<I>(),
            source: RuntimeType::of::<R>(),
            cast: Box::new(move |instance| {
                let repo = Arc::clone(instance).downcast::<R>().ok()?;
                let view: Box<dyn Any + Send + Sync> = Box::new(cast(repo));
                Some(view)
            }),
        });
        self
    }

    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyKind> {
        &self.properties
    }

    /// Interface types declared through [`SpecType::implements`].
    pub fn interfaces(&self) -> Vec<RuntimeType> {
        self.interfaces.iter().map(|binding| binding.interface).collect()
    }

    pub(crate) fn interface_bindings(&self) -> &[InterfaceBinding] {
        &self.interfaces
    }
}

impl Debug for SpecType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecType")
            .field("initializer", &self.initializer)
            .field("properties", &self.properties)
            .field("interfaces", &self.interfaces())
            .finish()
    }
}

/// Declarative set of types an application expects in the type catalog.
#[derive(Debug, Default)]
pub struct Spec {
    artifacts: BTreeMap<String, SpecType>,
    contexts: BTreeMap<String, SpecType>,
    executions: BTreeMap<String, SpecType>,
    others: Vec<Initializer>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artifact(self, name: impl Into<String>, spec_type: SpecType) -> Self {
        self.add(Category::Artifact, name, spec_type)
    }

    pub fn add_context(self, name: impl Into<String>, spec_type: SpecType) -> Self {
        self.add(Category::Context, name, spec_type)
    }

    pub fn add_execution(self, name: impl Into<String>, spec_type: SpecType) -> Self {
        self.add(Category::Execution, name, spec_type)
    }

    /// Adds a category-less initializer. Others run before any typed entry.
    pub fn add_other<Args>(mut self, initializer: impl IntoInitializer<Args>) -> Self {
        self.others.push(initializer.into_initializer());
        self
    }

    pub fn add(mut self, category: Category, name: impl Into<String>, spec_type: SpecType) -> Self {
        self.category_mut(category).insert(name.into(), spec_type);
        self
    }

    /// Declared entries of one category, ordered by name.
    pub fn types(&self, category: Category) -> &BTreeMap<String, SpecType> {
        match category {
            Category::Artifact => &self.artifacts,
            Category::Context => &self.contexts,
            Category::Execution => &self.executions,
        }
    }

    pub fn others(&self) -> &[Initializer] {
        &self.others
    }

    /// Union of declared names across all three categories.
    pub fn all_names(&self) -> Vec<&str> {
        Category::ALL
            .iter()
            .flat_map(|category| self.types(*category).keys())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of declared named types, counting each category separately.
    pub fn len(&self) -> usize {
        self.artifacts.len() + self.contexts.len() + self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.others.is_empty()
    }

    fn category_mut(&mut self, category: Category) -> &mut BTreeMap<String, SpecType> {
        match category {
            Category::Artifact => &mut self.artifacts,
            Category::Context => &mut self.contexts,
            Category::Execution => &mut self.executions,
        }
    }
}
