//! Values injectable into initializers, keyed by exact type.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};

/// Exact-type value table consulted for every initializer parameter.
#[derive(Default)]
pub struct Environment {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("values", &self.values.len())
            .finish()
    }
}

/// Catalog id of the type an initializer is building.
///
/// Only category entries receive one; "other" initializers cannot ask for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdValue(i32);

impl TypeIdValue {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl Display for TypeIdValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! category_type_map {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(BTreeMap<String, i32>);

        impl $name {
            pub fn new(ids: BTreeMap<String, i32>) -> Self {
                Self(ids)
            }

            pub fn get(&self, name: &str) -> Option<i32> {
                self.0.get(name).copied()
            }

            pub fn contains(&self, name: &str) -> bool {
                self.0.contains_key(name)
            }

            pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
                self.0.iter().map(|(name, id)| (name.as_str(), *id))
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }
    };
}

category_type_map!(
    /// Name to id projection of the declared artifact types.
    ArtifactTypeMap
);
category_type_map!(
    /// Name to id projection of the declared context types.
    ContextTypeMap
);
category_type_map!(
    /// Name to id projection of the declared execution types.
    ExecutionTypeMap
);
