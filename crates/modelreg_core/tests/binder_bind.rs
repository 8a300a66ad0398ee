use modelreg_core::{
    bind, ArtifactTypeMap, BindError, CatalogError, CatalogResult, Category, ContextTypeMap,
    ExecutionTypeMap, InitSite, Repository, RuntimeType, Spec, SpecType, TypeCatalogEntry,
    TypeCatalogReader, TypeIdValue,
};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct FakeDb {
    entries: Vec<TypeCatalogEntry>,
    unavailable: bool,
    journal: Arc<Mutex<Vec<String>>>,
}

impl FakeDb {
    fn with_types(types: &[(&str, i32)]) -> Self {
        Self {
            entries: types
                .iter()
                .map(|(name, id)| TypeCatalogEntry::new(*name, *id))
                .collect(),
            ..Self::default()
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.journal.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl TypeCatalogReader for FakeDb {
    fn get_all(&self) -> CatalogResult<Vec<TypeCatalogEntry>> {
        if self.unavailable {
            return Err(CatalogError::Unavailable("connection refused".to_string()));
        }
        Ok(self.entries.clone())
    }
}

#[derive(Debug)]
struct FooRepo {
    type_id: i32,
}

impl Repository for FooRepo {}

#[derive(Debug)]
struct BarRepo {
    type_id: i32,
}

impl Repository for BarRepo {}

#[derive(Debug)]
struct BazRepo {
    type_id: i32,
}

impl Repository for BazRepo {}

#[derive(Debug)]
struct Directory {
    artifacts: ArtifactTypeMap,
    contexts: ContextTypeMap,
    executions: ExecutionTypeMap,
}

impl Repository for Directory {}

fn foo(db: FakeDb, id: TypeIdValue) -> FooRepo {
    db.record(format!("foo:{id}"));
    FooRepo { type_id: id.get() }
}

fn bar(db: FakeDb, id: TypeIdValue) -> BarRepo {
    db.record(format!("bar:{id}"));
    BarRepo { type_id: id.get() }
}

fn baz(db: FakeDb, id: TypeIdValue) -> BazRepo {
    db.record(format!("baz:{id}"));
    BazRepo { type_id: id.get() }
}

#[test]
fn binds_single_artifact_end_to_end() {
    let db = FakeDb::with_types(&[("kf.CatalogModelArtifact", 7)]);
    let spec = Spec::new().add_artifact("kf.CatalogModelArtifact", SpecType::new(foo));

    let set = bind(&spec, db.clone()).unwrap();

    assert_eq!(set.type_map()["kf.CatalogModelArtifact"], 7);
    let repo = set.repository::<FooRepo>().unwrap();
    assert_eq!(repo.type_id, 7);
    assert_eq!(db.events(), vec!["foo:7"]);
    assert_eq!(set.len(), 1);
}

#[test]
fn type_map_holds_exactly_the_declared_names() {
    let db = FakeDb::with_types(&[
        ("kf.ModelArtifact", 1),
        ("kf.RegisteredModel", 2),
        ("kf.ServeModel", 3),
        ("kf.Unrelated", 4),
    ]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_context("kf.RegisteredModel", SpecType::new(bar))
        .add_execution("kf.ServeModel", SpecType::new(baz));

    let set = bind(&spec, db).unwrap();
    let type_map = set.type_map();

    assert_eq!(type_map.len(), 3);
    assert_eq!(type_map["kf.ModelArtifact"], 1);
    assert_eq!(type_map["kf.RegisteredModel"], 2);
    assert_eq!(type_map["kf.ServeModel"], 3);
    assert!(!type_map.contains_key("kf.Unrelated"));
    assert_eq!(set.repository::<BarRepo>().unwrap().type_id, 2);
    assert_eq!(set.repository::<BazRepo>().unwrap().type_id, 3);
}

#[test]
fn missing_types_are_all_named_and_nothing_is_built() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1)]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_context("kf.RegisteredModel", SpecType::new(bar))
        .add_execution("kf.ServeModel", SpecType::new(baz));

    let err = bind(&spec, db.clone()).unwrap_err();

    match &err {
        BindError::MissingType { missing } => {
            assert_eq!(missing, &vec!["kf.RegisteredModel", "kf.ServeModel"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("kf.RegisteredModel"));
    assert!(db.events().is_empty());
}

#[test]
fn empty_catalog_is_reported_distinctly() {
    let spec = Spec::new().add_artifact("kf.ModelArtifact", SpecType::new(foo));

    let err = bind(&spec, FakeDb::default()).unwrap_err();

    assert!(matches!(err, BindError::EmptyCatalog { ref missing } if missing == &vec!["kf.ModelArtifact"]));
    assert!(err.to_string().contains("no types available"));
}

#[test]
fn catalog_read_failure_aborts() {
    let db = FakeDb {
        unavailable: true,
        ..FakeDb::default()
    };
    let spec = Spec::new().add_artifact("kf.ModelArtifact", SpecType::new(foo));

    let err = bind(&spec, db).unwrap_err();

    assert!(matches!(err, BindError::CatalogRead(CatalogError::Unavailable(_))));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn unsatisfiable_parameter_fails_whole_build() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1), ("kf.ServeModel", 3)]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_execution(
            "kf.ServeModel",
            SpecType::new(|_db: FakeDb, _label: String| BazRepo { type_id: 0 }),
        );

    let err = bind(&spec, db.clone()).unwrap_err();

    match err {
        BindError::UnsatisfiableArgument { site, parameter } => {
            assert_eq!(parameter, RuntimeType::of::<String>());
            assert_eq!(
                site,
                InitSite::Typed {
                    category: Category::Execution,
                    type_name: "kf.ServeModel".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.events(), vec!["foo:1"]);
}

#[test]
fn other_initializers_cannot_request_a_type_id() {
    let spec = Spec::new().add_other(|id: TypeIdValue| FooRepo { type_id: id.get() });

    let err = bind(&spec, FakeDb::with_types(&[("kf.Any", 1)])).unwrap_err();

    assert!(matches!(
        err,
        BindError::UnsatisfiableArgument { site: InitSite::Other { index: 0 }, .. }
    ));
    assert!(err.to_string().contains("TypeIdValue"));
}

#[test]
fn constructor_error_names_category_and_type() {
    let db = FakeDb::with_types(&[("kf.DocArtifact", 5)]);
    let spec = Spec::new().add_artifact(
        "kf.DocArtifact",
        SpecType::new(|_db: FakeDb| -> Result<FooRepo, String> {
            Err("table missing".to_string())
        }),
    );

    let err = bind(&spec, db).unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, BindError::Constructor { .. }));
    assert!(message.contains("artifact"));
    assert!(message.contains("kf.DocArtifact"));
    assert!(message.contains("table missing"));
}

#[test]
fn fallible_constructor_success_is_stored() {
    let db = FakeDb::with_types(&[("kf.DocArtifact", 5)]);
    let spec = Spec::new().add_artifact(
        "kf.DocArtifact",
        SpecType::new(|id: TypeIdValue| -> Result<FooRepo, String> {
            Ok(FooRepo { type_id: id.get() })
        }),
    );

    let set = bind(&spec, db).unwrap();

    assert_eq!(set.repository::<FooRepo>().unwrap().type_id, 5);
}

#[test]
fn others_run_before_category_initializers() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1), ("kf.RegisteredModel", 2)]);
    let spec = Spec::new()
        .add_context("kf.RegisteredModel", SpecType::new(bar))
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_other(|db: FakeDb| {
            db.record("other:0");
            BazRepo { type_id: -1 }
        });

    bind(&spec, db.clone()).unwrap();

    assert_eq!(db.events(), vec!["other:0", "foo:1", "bar:2"]);
}

#[test]
fn category_maps_are_scoped_to_declared_names() {
    let db = FakeDb::with_types(&[
        ("kf.ModelArtifact", 1),
        ("kf.DocArtifact", 6),
        ("kf.RegisteredModel", 2),
        ("kf.Unrelated", 9),
    ]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_artifact("kf.DocArtifact", SpecType::new(baz))
        .add_context("kf.RegisteredModel", SpecType::new(bar))
        .add_other(
            |artifacts: ArtifactTypeMap, contexts: ContextTypeMap, executions: ExecutionTypeMap| {
                Directory {
                    artifacts,
                    contexts,
                    executions,
                }
            },
        );

    let set = bind(&spec, db).unwrap();
    let directory = set.repository::<Directory>().unwrap();

    assert_eq!(directory.artifacts.len(), 2);
    assert_eq!(directory.artifacts.get("kf.DocArtifact"), Some(6));
    assert_eq!(directory.contexts.get("kf.RegisteredModel"), Some(2));
    assert!(!directory.contexts.contains("kf.Unrelated"));
    assert!(directory.executions.is_empty());
    assert_eq!(set.type_map().len(), 3);
}

#[test]
fn each_entry_receives_its_own_type_id() {
    let db = FakeDb::with_types(&[("a.First", 10), ("a.Second", 20), ("c.Third", 30)]);
    let spec = Spec::new()
        .add_artifact("a.First", SpecType::new(foo))
        .add_artifact("a.Second", SpecType::new(bar))
        .add_context("c.Third", SpecType::new(baz));

    let set = bind(&spec, db).unwrap();

    assert_eq!(set.repository::<FooRepo>().unwrap().type_id, 10);
    assert_eq!(set.repository::<BarRepo>().unwrap().type_id, 20);
    assert_eq!(set.repository::<BazRepo>().unwrap().type_id, 30);
}

#[test]
fn shared_concrete_type_is_rejected() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1), ("kf.DocArtifact", 2)]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", SpecType::new(foo))
        .add_artifact("kf.DocArtifact", SpecType::new(foo));

    let err = bind(&spec, db).unwrap_err();

    match err {
        BindError::DuplicateRepositoryType {
            repository_type,
            first,
            second,
        } => {
            assert_eq!(repository_type, RuntimeType::of::<FooRepo>());
            assert_eq!(first, "kf.DocArtifact");
            assert_eq!(second, "kf.ModelArtifact");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn name_declared_in_two_categories_is_rejected() {
    let db = FakeDb::with_types(&[("kf.Shared", 3)]);
    let spec = Spec::new()
        .add_artifact("kf.Shared", SpecType::new(foo))
        .add_context("kf.Shared", SpecType::new(bar));

    let err = bind(&spec, db.clone()).unwrap_err();

    match err {
        BindError::DuplicateRepositoryName {
            name,
            first,
            second,
        } => {
            assert_eq!(name, "kf.Shared");
            assert_eq!(
                first,
                InitSite::Typed {
                    category: Category::Artifact,
                    type_name: "kf.Shared".to_string(),
                }
            );
            assert_eq!(
                second,
                InitSite::Typed {
                    category: Category::Context,
                    type_name: "kf.Shared".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(db.events().is_empty());
}

#[test]
fn declared_name_cannot_shadow_an_other_initializer() {
    let db = FakeDb::with_types(&[("other[0]", 1)]);
    let spec = Spec::new()
        .add_other(|db: FakeDb| {
            db.record("other:0");
            BazRepo { type_id: -1 }
        })
        .add_artifact("other[0]", SpecType::new(foo));

    let err = bind(&spec, db.clone()).unwrap_err();

    assert!(matches!(
        err,
        BindError::DuplicateRepositoryName {
            ref name,
            first: InitSite::Other { index: 0 },
            second: InitSite::Typed { category: Category::Artifact, .. },
        } if name == "other[0]"
    ));
    assert!(err.to_string().contains("other initializer #0"));
    assert!(db.events().is_empty());
}

#[test]
fn schema_only_entry_is_an_invalid_initializer() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1)]);
    let spec = Spec::new().add_artifact(
        "kf.ModelArtifact",
        SpecType::schema_only().add_string("uri"),
    );

    let err = bind(&spec, db).unwrap_err();

    assert!(matches!(err, BindError::InvalidInitializer { .. }));
    assert!(err.to_string().contains("kf.ModelArtifact"));
}
