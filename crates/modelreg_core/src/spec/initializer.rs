//! Typed repository factories.
//!
//! Any `Fn(A1, .., An) -> R` (up to six parameters) becomes an
//! [`Initializer`] when every parameter implements [`FromEnvironment`] and
//! the return type implements [`InitOutput`]. Parameters are resolved by
//! exact type before the function is called, so an unsatisfiable parameter
//! never reaches the constructor body.

use crate::binder::Environment;
use std::any::{type_name, Any, TypeId};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Marker for values an initializer may produce.
///
/// Implement it for every concrete repository type the binder builds.
pub trait Repository: Send + Sync + 'static {}

/// Return shapes accepted from an initializer: `T` or `Result<T, E>`.
pub trait InitOutput {
    type Repo: Repository;

    fn into_result(self) -> Result<Self::Repo, BoxError>;
}

impl<T: Repository> InitOutput for T {
    type Repo = T;

    fn into_result(self) -> Result<T, BoxError> {
        Ok(self)
    }
}

impl<T, E> InitOutput for Result<T, E>
where
    T: Repository,
    E: Into<BoxError>,
{
    type Repo = T;

    fn into_result(self) -> Result<T, BoxError> {
        self.map_err(Into::into)
    }
}

/// Parameter types an initializer can ask for.
///
/// Every cloneable `'static` type qualifies; resolution succeeds only when
/// the environment holds a value of exactly that type.
pub trait FromEnvironment: Sized + 'static {
    fn from_environment(env: &Environment) -> Result<Self, InvokeError>;
}

impl<T: Clone + Send + Sync + 'static> FromEnvironment for T {
    fn from_environment(env: &Environment) -> Result<Self, InvokeError> {
        env.get::<T>()
            .cloned()
            .ok_or(InvokeError::Unsatisfiable(RuntimeType::of::<T>()))
    }
}

/// Identity of a Rust type at runtime, with its name kept for diagnostics.
#[derive(Clone, Copy)]
pub struct RuntimeType {
    id: TypeId,
    name: &'static str,
}

impl RuntimeType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RuntimeType {}

impl Hash for RuntimeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for RuntimeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Display for RuntimeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Failure of one initializer call, before binder context is attached.
#[derive(Debug)]
pub enum InvokeError {
    Unsatisfiable(RuntimeType),
    Constructor(BoxError),
}

/// One constructed repository in both erased and typed form.
pub(crate) struct Built {
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
    /// `Arc<R>` for the concrete repository type `R`.
    pub(crate) typed: Box<dyn Any + Send + Sync>,
}

pub(crate) trait ErasedInitializer: Send + Sync {
    fn output_type(&self) -> RuntimeType;
    fn parameter_types(&self) -> Vec<RuntimeType>;
    fn invoke(&self, env: &Environment) -> Result<Built, InvokeError>;
}

/// Type-erased initializer stored in a `Spec`.
pub struct Initializer {
    inner: Box<dyn ErasedInitializer>,
}

impl Initializer {
    /// Concrete type of the repository this initializer returns.
    pub fn output_type(&self) -> RuntimeType {
        self.inner.output_type()
    }

    /// Parameter types, in declaration order.
    pub fn parameter_types(&self) -> Vec<RuntimeType> {
        self.inner.parameter_types()
    }

    pub(crate) fn invoke(&self, env: &Environment) -> Result<Built, InvokeError> {
        self.inner.invoke(env)
    }
}

impl Debug for Initializer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initializer")
            .field("params", &self.parameter_types())
            .field("output", &self.output_type())
            .finish()
    }
}

/// Conversion from a plain function or closure into an [`Initializer`].
///
/// `Args` is the parameter tuple and only exists to keep the impls apart.
pub trait IntoInitializer<Args> {
    fn into_initializer(self) -> Initializer;
}

struct FnInitializer<F, Args> {
    f: F,
    _args: PhantomData<fn() -> Args>,
}

macro_rules! impl_initializer {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> ErasedInitializer for FnInitializer<F, ($($arg,)*)>
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: InitOutput,
            $($arg: FromEnvironment,)*
        {
            fn output_type(&self) -> RuntimeType {
                RuntimeType::of::<R::Repo>()
            }

            fn parameter_types(&self) -> Vec<RuntimeType> {
                vec![$(RuntimeType::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn invoke(&self, env: &Environment) -> Result<Built, InvokeError> {
                $(let $arg = $arg::from_environment(env)?;)*
                let repo = (self.f)($($arg),*)
                    .into_result()
                    .map_err(InvokeError::Constructor)?;
                let repo = Arc::new(repo);
                Ok(Built {
                    instance: repo.clone(),
                    typed: Box::new(repo),
                })
            }
        }

        impl<F, R, $($arg,)*> IntoInitializer<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: InitOutput,
            $($arg: FromEnvironment,)*
        {
            fn into_initializer(self) -> Initializer {
                Initializer {
                    inner: Box::new(FnInitializer::<F, ($($arg,)*)> {
                        f: self,
                        _args: PhantomData,
                    }),
                }
            }
        }
    };
}

impl_initializer!();
impl_initializer!(A1);
impl_initializer!(A1, A2);
impl_initializer!(A1, A2, A3);
impl_initializer!(A1, A2, A3, A4);
impl_initializer!(A1, A2, A3, A4, A5);
impl_initializer!(A1, A2, A3, A4, A5, A6);
