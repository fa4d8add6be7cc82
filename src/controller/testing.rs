//! In-memory cluster API fakes shared by the controller unit tests

use crate::constants::{
    ANNOTATION_APP_CODE, ANNOTATION_APP_NAME, ANNOTATION_ENVIRONMENT, ANNOTATION_MODULE_NAME,
    ANNOTATION_REGION,
};
use crate::controller::error::{ApiError, Verb};
use crate::controller::reconciler::StatusWriter;
use crate::controller::upsert::{ObjectApi, PruneApi};
use crate::crd::{Application, ApplicationSpec, ApplicationStatus};
use async_trait::async_trait;
use kube::Resource;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// `demo-web` in `demo-stag`, with a complete identity and no domains
pub fn application() -> Application {
    let mut app = Application::new(
        "demo-web",
        ApplicationSpec {
            image: "registry.example.com/demo/web:1.4.2".to_string(),
            replicas: 2,
            target_port: 5000,
            domains: Vec::new(),
            suspend: false,
        },
    );
    app.metadata.namespace = Some("demo-stag".to_string());
    app.metadata.uid = Some("0b9c3c55-5d0e-4a55-9df4-3f1b6a3c0001".to_string());
    app.metadata.annotations = Some(
        [
            (ANNOTATION_REGION, "default"),
            (ANNOTATION_APP_CODE, "demo"),
            (ANNOTATION_APP_NAME, "Demo"),
            (ANNOTATION_MODULE_NAME, "web"),
            (ANNOTATION_ENVIRONMENT, "stag"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    );
    app
}

struct Store<K> {
    objects: BTreeMap<(String, String), K>,
    next_version: u64,
    writes: usize,
    failures: VecDeque<(Verb, ApiError)>,
}

/// Object store with optimistic concurrency on `resourceVersion`
pub struct InMemoryApi<K> {
    store: Arc<Mutex<Store<K>>>,
}

impl<K> Clone for InMemoryApi<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K> InMemoryApi<K>
where
    K: Resource + Clone,
{
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store {
                objects: BTreeMap::new(),
                next_version: 1,
                writes: 0,
                failures: VecDeque::new(),
            })),
        }
    }

    /// Seed an object without counting it as a write
    pub fn insert(&self, mut object: K) {
        let mut store = self.store.lock().unwrap();
        let key = key_of(&object);
        object.meta_mut().resource_version = Some(store.next_version.to_string());
        store.next_version += 1;
        store.objects.insert(key, object);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        let store = self.store.lock().unwrap();
        store
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().objects.len()
    }

    pub fn writes(&self) -> usize {
        self.store.lock().unwrap().writes
    }

    /// Make the next call with `verb` fail with `error`
    pub fn fail_on(&self, verb: Verb, error: ApiError) {
        self.store.lock().unwrap().failures.push_back((verb, error));
    }

    fn take_failure(&self, verb: Verb) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        if store.failures.front().is_some_and(|(v, _)| *v == verb) {
            if let Some((_, error)) = store.failures.pop_front() {
                return Err(error);
            }
        }
        Ok(())
    }
}

fn key_of<K: Resource>(object: &K) -> (String, String) {
    let meta = object.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl<K> ObjectApi<K> for InMemoryApi<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError> {
        self.take_failure(Verb::Get)?;
        self.stored(namespace, name).ok_or(ApiError::NotFound)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, ApiError> {
        self.take_failure(Verb::Create)?;
        let mut store = self.store.lock().unwrap();
        let key = (namespace.to_string(), key_of(object).1);
        if store.objects.contains_key(&key) {
            return Err(ApiError::Conflict(format!("{} already exists", key.1)));
        }
        let mut created = object.clone();
        created.meta_mut().namespace = Some(namespace.to_string());
        created.meta_mut().resource_version = Some(store.next_version.to_string());
        store.next_version += 1;
        store.writes += 1;
        store.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, namespace: &str, name: &str, object: &K) -> Result<K, ApiError> {
        self.take_failure(Verb::Update)?;
        let mut store = self.store.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let current_version = match store.objects.get(&key) {
            Some(current) => current.meta().resource_version.clone(),
            None => return Err(ApiError::NotFound),
        };
        if object.meta().resource_version != current_version {
            return Err(ApiError::Conflict(
                "the object has been modified; please apply your changes to the latest version"
                    .to_string(),
            ));
        }
        let mut updated = object.clone();
        updated.meta_mut().resource_version = Some(store.next_version.to_string());
        store.next_version += 1;
        store.writes += 1;
        store.objects.insert(key, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl<K> PruneApi<K> for InMemoryApi<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, ApiError> {
        self.take_failure(Verb::List)?;
        let store = self.store.lock().unwrap();
        Ok(store
            .objects
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, object)| object)
            .filter(|object| {
                let stored = object.meta().labels.as_ref();
                labels
                    .iter()
                    .all(|(k, v)| stored.and_then(|l| l.get(k)) == Some(v))
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        self.take_failure(Verb::Delete)?;
        let mut store = self.store.lock().unwrap();
        store
            .objects
            .remove(&(namespace.to_string(), name.to_string()))
            .ok_or(ApiError::NotFound)?;
        store.writes += 1;
        Ok(())
    }
}

/// Serves a frozen read of one object while writing through to the live store
///
/// Models a writer whose fetch happened before another writer's update.
pub struct StaleReadApi<K> {
    live: InMemoryApi<K>,
    snapshot: K,
}

impl<K> StaleReadApi<K>
where
    K: Resource + Clone,
{
    pub fn snapshot(live: &InMemoryApi<K>, namespace: &str, name: &str) -> Self {
        let snapshot = live.stored(namespace, name).unwrap();
        Self {
            live: live.clone(),
            snapshot,
        }
    }
}

#[async_trait]
impl<K> ObjectApi<K> for StaleReadApi<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn get(&self, _namespace: &str, _name: &str) -> Result<K, ApiError> {
        Ok(self.snapshot.clone())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, ApiError> {
        self.live.create(namespace, object).await
    }

    async fn update(&self, namespace: &str, name: &str, object: &K) -> Result<K, ApiError> {
        self.live.update(namespace, name, object).await
    }
}

/// Records every status write
#[derive(Clone, Default)]
pub struct RecordingStatusWriter {
    written: Arc<Mutex<Vec<(String, String, ApplicationStatus)>>>,
}

impl RecordingStatusWriter {
    pub fn last(&self) -> Option<ApplicationStatus> {
        self.written
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, status)| status.clone())
    }

    pub fn count(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

#[async_trait]
impl StatusWriter for RecordingStatusWriter {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ApplicationStatus,
    ) -> Result<(), ApiError> {
        self.written.lock().unwrap().push((
            namespace.to_string(),
            name.to_string(),
            status.clone(),
        ));
        Ok(())
    }
}
