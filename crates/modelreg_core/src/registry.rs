//! Default model registry declaration.
//!
//! # Responsibility
//! - Declare the `kf.*` context, artifact and execution types the model
//!   registry expects, with their property schemas.
//! - Provide one distinct repository type per declared name so concrete
//!   type lookup stays unambiguous.
//!
//! # Invariants
//! - Every record repository is also reachable as `dyn RecordRepository`
//!   (ambiguous on purpose; use `RepoSet::repositories` to enumerate).

use crate::binder::{ArtifactTypeMap, ContextTypeMap, ExecutionTypeMap, TypeIdValue};
use crate::db::DbHandle;
use crate::repo::record_repo::{Record, RecordRepository, RepoResult, SqliteRecordRepository};
use crate::spec::{Category, Repository, Spec, SpecType};
use std::sync::Arc;

pub const REGISTERED_MODEL_TYPE: &str = "kf.RegisteredModel";
pub const MODEL_VERSION_TYPE: &str = "kf.ModelVersion";
pub const SERVING_ENVIRONMENT_TYPE: &str = "kf.ServingEnvironment";
pub const INFERENCE_SERVICE_TYPE: &str = "kf.InferenceService";
pub const MODEL_ARTIFACT_TYPE: &str = "kf.ModelArtifact";
pub const DOC_ARTIFACT_TYPE: &str = "kf.DocArtifact";
pub const SERVE_MODEL_TYPE: &str = "kf.ServeModel";

macro_rules! record_repository {
    ($(#[$meta:meta])* $name:ident, $category:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(SqliteRecordRepository);

        impl $name {
            pub fn new(db: DbHandle, type_id: TypeIdValue) -> Self {
                Self(SqliteRecordRepository::new(db, $category, type_id))
            }
        }

        impl Repository for $name {}

        impl RecordRepository for $name {
            fn category(&self) -> Category {
                self.0.category()
            }

            fn type_id(&self) -> TypeIdValue {
                self.0.type_id()
            }

            fn create(&self, name: &str) -> RepoResult<i64> {
                self.0.create(name)
            }

            fn get(&self, id: i64) -> RepoResult<Option<Record>> {
                self.0.get(id)
            }

            fn rename(&self, id: i64, name: &str) -> RepoResult<()> {
                self.0.rename(id, name)
            }

            fn list(&self) -> RepoResult<Vec<Record>> {
                self.0.list()
            }
        }
    };
}

record_repository!(
    /// Registered models (`kf.RegisteredModel` contexts).
    RegisteredModelRepository,
    Category::Context
);
record_repository!(
    /// Versions of a registered model (`kf.ModelVersion` contexts).
    ModelVersionRepository,
    Category::Context
);
record_repository!(
    /// Serving environments (`kf.ServingEnvironment` contexts).
    ServingEnvironmentRepository,
    Category::Context
);
record_repository!(
    /// Deployed inference services (`kf.InferenceService` contexts).
    InferenceServiceRepository,
    Category::Context
);
record_repository!(
    /// Model binaries and their storage coordinates.
    ModelArtifactRepository,
    Category::Artifact
);
record_repository!(
    /// Documentation attached to a model (`kf.DocArtifact` artifacts).
    DocArtifactRepository,
    Category::Artifact
);
record_repository!(
    /// Serving runs (`kf.ServeModel` executions).
    ServeModelRepository,
    Category::Execution
);

/// Declared type ids per category, built before any record repository.
#[derive(Debug, Clone)]
pub struct TypeDirectory {
    artifacts: ArtifactTypeMap,
    contexts: ContextTypeMap,
    executions: ExecutionTypeMap,
}

impl TypeDirectory {
    pub fn new(
        artifacts: ArtifactTypeMap,
        contexts: ContextTypeMap,
        executions: ExecutionTypeMap,
    ) -> Self {
        Self {
            artifacts,
            contexts,
            executions,
        }
    }

    pub fn category_of(&self, name: &str) -> Option<Category> {
        if self.artifacts.contains(name) {
            Some(Category::Artifact)
        } else if self.contexts.contains(name) {
            Some(Category::Context)
        } else if self.executions.contains(name) {
            Some(Category::Execution)
        } else {
            None
        }
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.artifacts
            .get(name)
            .or_else(|| self.contexts.get(name))
            .or_else(|| self.executions.get(name))
    }

    /// Declared names of one category with their ids, ordered by name.
    pub fn names(&self, category: Category) -> Vec<(&str, i32)> {
        match category {
            Category::Artifact => self.artifacts.iter().collect(),
            Category::Context => self.contexts.iter().collect(),
            Category::Execution => self.executions.iter().collect(),
        }
    }
}

impl Repository for TypeDirectory {}

fn record_type<R>(init: fn(DbHandle, TypeIdValue) -> R) -> SpecType
where
    R: RecordRepository + Repository,
{
    SpecType::new(init).implements(|repo: Arc<R>| -> Arc<dyn RecordRepository> { repo })
}

/// Builds the declaration bound against a `DbHandle`.
pub fn model_registry_spec() -> Spec {
    Spec::new()
        .add_other(TypeDirectory::new)
        .add_context(
            REGISTERED_MODEL_TYPE,
            record_type(RegisteredModelRepository::new)
                .add_string("description")
                .add_string("owner")
                .add_string("state")
                .add_string("license")
                .add_struct("language"),
        )
        .add_context(
            MODEL_VERSION_TYPE,
            record_type(ModelVersionRepository::new)
                .add_string("description")
                .add_string("author")
                .add_string("state")
                .add_string("model_name")
                .add_string("version"),
        )
        .add_context(
            SERVING_ENVIRONMENT_TYPE,
            record_type(ServingEnvironmentRepository::new).add_string("description"),
        )
        .add_context(
            INFERENCE_SERVICE_TYPE,
            record_type(InferenceServiceRepository::new)
                .add_string("description")
                .add_int("model_version_id")
                .add_int("registered_model_id")
                .add_int("serving_environment_id")
                .add_string("runtime")
                .add_string("desired_state"),
        )
        .add_artifact(
            MODEL_ARTIFACT_TYPE,
            record_type(ModelArtifactRepository::new)
                .add_string("description")
                .add_string("model_format_name")
                .add_string("model_format_version")
                .add_string("storage_key")
                .add_string("storage_path")
                .add_string("service_account_name"),
        )
        .add_artifact(
            DOC_ARTIFACT_TYPE,
            record_type(DocArtifactRepository::new).add_string("description"),
        )
        .add_execution(
            SERVE_MODEL_TYPE,
            record_type(ServeModelRepository::new)
                .add_string("description")
                .add_int("model_version_id"),
        )
}
