use modelreg_core::{
    bind, BindError, CatalogResult, LookupError, Repository, RuntimeType, SharedRepoSet, Spec,
    SpecType, TypeCatalogEntry, TypeCatalogReader, TypeIdValue,
};
use std::sync::Arc;

#[derive(Clone)]
struct FakeDb {
    entries: Vec<TypeCatalogEntry>,
}

impl FakeDb {
    fn with_types(types: &[(&str, i32)]) -> Self {
        Self {
            entries: types
                .iter()
                .map(|(name, id)| TypeCatalogEntry::new(*name, *id))
                .collect(),
        }
    }
}

impl TypeCatalogReader for FakeDb {
    fn get_all(&self) -> CatalogResult<Vec<TypeCatalogEntry>> {
        Ok(self.entries.clone())
    }
}

trait Labeled: Send + Sync {
    fn label(&self) -> String;
}

trait Unused: Send + Sync + std::fmt::Debug {}

#[derive(Debug)]
struct ModelRepo(i32);

impl Repository for ModelRepo {}

impl Labeled for ModelRepo {
    fn label(&self) -> String {
        format!("model:{}", self.0)
    }
}

#[derive(Debug)]
struct DocRepo(i32);

impl Repository for DocRepo {}

impl Labeled for DocRepo {
    fn label(&self) -> String {
        format!("doc:{}", self.0)
    }
}

fn model_type() -> SpecType {
    SpecType::new(|id: TypeIdValue| ModelRepo(id.get()))
        .implements(|repo: Arc<ModelRepo>| -> Arc<dyn Labeled> { repo })
}

fn doc_type() -> SpecType {
    SpecType::new(|id: TypeIdValue| DocRepo(id.get()))
        .implements(|repo: Arc<DocRepo>| -> Arc<dyn Labeled> { repo })
}

#[test]
fn type_map_returns_a_copy() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 1)]);
    let set = bind(&Spec::new().add_artifact("kf.ModelArtifact", model_type()), db).unwrap();

    let mut copy = set.type_map();
    copy.insert("kf.Injected".to_string(), 99);
    copy.remove("kf.ModelArtifact");

    let fresh = set.type_map();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh["kf.ModelArtifact"], 1);
    assert_eq!(set.type_id("kf.Injected"), None);
}

#[test]
fn exact_lookup_returns_the_constructed_instance() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let set = bind(&Spec::new().add_artifact("kf.ModelArtifact", model_type()), db).unwrap();

    let first = set.repository::<ModelRepo>().unwrap();
    let second = set.repository::<ModelRepo>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.0, 4);
}

#[test]
fn interface_lookup_with_single_provider() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let set = bind(&Spec::new().add_artifact("kf.ModelArtifact", model_type()), db).unwrap();

    let labeled = set.repository::<dyn Labeled>().unwrap();

    assert_eq!(labeled.label(), "model:4");
}

#[test]
fn unknown_types_are_reported() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let set = bind(&Spec::new().add_artifact("kf.ModelArtifact", model_type()), db).unwrap();

    let err = set.repository::<dyn Unused>().unwrap_err();
    assert_eq!(
        err,
        LookupError::UnknownRepository {
            requested: RuntimeType::of::<dyn Unused>(),
        }
    );
    assert!(err.to_string().contains("unknown repository type"));

    assert!(matches!(
        set.repository::<DocRepo>(),
        Err(LookupError::UnknownRepository { .. })
    ));
}

#[test]
fn several_interface_providers_are_ambiguous_but_enumerable() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4), ("kf.DocArtifact", 5)]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", model_type())
        .add_artifact("kf.DocArtifact", doc_type());
    let set = bind(&spec, db).unwrap();

    match set.repository::<dyn Labeled>() {
        Err(LookupError::AmbiguousRepository { candidates, .. }) => {
            assert_eq!(candidates, vec!["kf.DocArtifact", "kf.ModelArtifact"]);
        }
        other => panic!("unexpected result: {:?}", other.map(|repo| repo.label())),
    }

    let labels: Vec<String> = set
        .repositories::<dyn Labeled>()
        .iter()
        .map(|repo| repo.label())
        .collect();
    assert_eq!(labels, vec!["doc:5", "model:4"]);
}

#[test]
fn lookup_by_declared_name() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4), ("kf.DocArtifact", 5)]);
    let spec = Spec::new()
        .add_artifact("kf.ModelArtifact", model_type())
        .add_artifact("kf.DocArtifact", doc_type())
        .add_other(|| ModelRepoless);
    let set = bind(&spec, db).unwrap();

    let doc = set.repository_named::<dyn Labeled>("kf.DocArtifact").unwrap();
    assert_eq!(doc.label(), "doc:5");
    assert_eq!(set.repository_named::<ModelRepo>("kf.ModelArtifact").unwrap().0, 4);
    assert!(set.repository_named::<ModelRepoless>("other[0]").is_ok());
    assert!(set.repository_named::<ModelRepo>("kf.DocArtifact").is_err());
    assert_eq!(set.names(), vec!["other[0]", "kf.DocArtifact", "kf.ModelArtifact"]);
}

#[derive(Debug)]
struct ModelRepoless;

impl Repository for ModelRepoless {}

#[test]
fn mismatched_interface_declaration_is_rejected() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let spec = Spec::new().add_artifact(
        "kf.ModelArtifact",
        SpecType::new(|id: TypeIdValue| ModelRepo(id.get()))
            .implements(|repo: Arc<DocRepo>| -> Arc<dyn Labeled> { repo }),
    );

    let err = bind(&spec, db).unwrap_err();

    assert!(matches!(err, BindError::InvalidInitializer { .. }));
    assert!(err.to_string().contains("DocRepo"));
}

#[test]
fn shared_set_swaps_whole_snapshots() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let spec = Spec::new().add_artifact("kf.ModelArtifact", model_type());
    let shared = SharedRepoSet::new(bind(&spec, db).unwrap());
    let before = shared.snapshot();

    let rebuilt = shared
        .rebuild(&spec, FakeDb::with_types(&[("kf.ModelArtifact", 8)]))
        .unwrap();

    assert_eq!(before.type_id("kf.ModelArtifact"), Some(4));
    assert_eq!(rebuilt.type_id("kf.ModelArtifact"), Some(8));
    assert_eq!(shared.snapshot().repository::<ModelRepo>().unwrap().0, 8);

    let failed = shared.rebuild(&spec, FakeDb::with_types(&[]));
    assert!(matches!(failed, Err(BindError::EmptyCatalog { .. })));
    assert_eq!(shared.snapshot().type_id("kf.ModelArtifact"), Some(8));
}

#[test]
fn concurrent_rebuilds_return_the_set_each_installed() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 0)]);
    let spec = Spec::new().add_artifact("kf.ModelArtifact", model_type());
    let shared = Arc::new(SharedRepoSet::new(bind(&spec, db).unwrap()));

    let handles: Vec<_> = (1..=8)
        .map(|id| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let spec = Spec::new().add_artifact("kf.ModelArtifact", model_type());
                (0..50)
                    .map(|_| {
                        let db = FakeDb::with_types(&[("kf.ModelArtifact", id)]);
                        shared.rebuild(&spec, db).unwrap().type_id("kf.ModelArtifact")
                    })
                    .all(|seen| seen == Some(id))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn snapshots_are_readable_across_threads() {
    let db = FakeDb::with_types(&[("kf.ModelArtifact", 4)]);
    let spec = Spec::new().add_artifact("kf.ModelArtifact", model_type());
    let set = Arc::new(bind(&spec, db).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let set = Arc::clone(&set);
            std::thread::spawn(move || set.repository::<dyn Labeled>().unwrap().label())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "model:4");
    }
}
