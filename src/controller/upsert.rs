//! # Upsert
//!
//! Generic get-or-create-or-update against the cluster API.
//!
//! The engine is written once against the [`ObjectApi`] capability set
//! (get, create, update) and works for every namespaced kind. Each call:
//!
//! 1. fetches the current object by namespace/name
//! 2. creates `desired` when the fetch reports not-found; any other fetch error
//!    is returned with operation context
//! 3. otherwise asks the [`UpdatePolicy`] what to write, if anything
//!
//! At most one write is issued per call and nothing is retried internally. A
//! conflict on write surfaces as [`ReconcilerError::Conflict`]; the caller
//! re-runs the whole pass.

use crate::constants::{ANNOTATION_SPEC_HASH, FIELD_MANAGER};
use crate::controller::error::{ApiError, ObjectRef, ReconcilerError, Verb};
use crate::observability;
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Capability set the upsert engine needs from the cluster API
#[async_trait]
pub trait ObjectApi<K>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError>;
    async fn create(&self, namespace: &str, object: &K) -> Result<K, ApiError>;
    /// Full replace; fails with a conflict when `object` carries a stale resource version
    async fn update(&self, namespace: &str, name: &str, object: &K) -> Result<K, ApiError>;
}

/// Listing and deletion, for children that are no longer desired
#[async_trait]
pub trait PruneApi<K>: Send + Sync {
    /// Objects in `namespace` carrying every label in `labels`
    async fn list(&self, namespace: &str, labels: &BTreeMap<String, String>)
        -> Result<Vec<K>, ApiError>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError>;
}

/// [`ObjectApi`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeObjectApi {
    client: Client,
}

impl fmt::Debug for KubeObjectApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeObjectApi").finish_non_exhaustive()
    }
}

impl KubeObjectApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }
}

#[async_trait]
impl<K> ObjectApi<K> for KubeObjectApi
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&Self::post_params(), object).await?)
    }

    async fn update(&self, namespace: &str, name: &str, object: &K) -> Result<K, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.replace(name, &Self::post_params(), object).await?)
    }
}

#[async_trait]
impl<K> PruneApi<K> for KubeObjectApi
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let selector = labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        Ok(api.list(&ListParams::default().labels(&selector)).await?.items)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }
}

/// Decides what, if anything, to write over an existing object
pub trait UpdatePolicy<K>: Send + Sync {
    /// Object to write, or `None` to leave `current` untouched
    fn reconcile(&self, current: &K, desired: &K) -> Option<K>;
}

/// Default policy: overwrite the current object with `desired`
///
/// Carries the current resource version over so that concurrent writers
/// still conflict. Always writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace;

impl<K> UpdatePolicy<K> for Replace
where
    K: Resource + Clone + Send + Sync,
{
    fn reconcile(&self, current: &K, desired: &K) -> Option<K> {
        let mut next = desired.clone();
        next.meta_mut()
            .resource_version
            .clone_from(&current.meta().resource_version);
        Some(next)
    }
}

/// Compare-before-write merge policy
///
/// Starts from `current`, applies the kind-specific `merge` function, overlays
/// the desired labels and annotations and takes the desired owner references.
/// `merge` writes only the fields the operator owns, so fields the server
/// assigned or defaulted on `current` survive.
///
/// The write is skipped when the merged object equals `current`. A differing
/// spec hash (see [`stamp_spec_hash`]) means the desired state moved and the
/// comparison is skipped; a matching hash still goes through the comparison,
/// so out-of-band edits are corrected on the next pass.
pub struct SpecHashMerge<K> {
    merge: fn(&mut K, &K),
}

impl<K> SpecHashMerge<K> {
    #[must_use]
    pub const fn new(merge: fn(&mut K, &K)) -> Self {
        Self { merge }
    }
}

impl<K> fmt::Debug for SpecHashMerge<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecHashMerge").finish_non_exhaustive()
    }
}

impl<K> UpdatePolicy<K> for SpecHashMerge<K>
where
    K: Resource + Clone + PartialEq + Send + Sync,
{
    fn reconcile(&self, current: &K, desired: &K) -> Option<K> {
        let desired_hash = spec_hash(desired);
        let hash_moved = desired_hash.is_none() || desired_hash != spec_hash(current);

        let mut next = current.clone();
        (self.merge)(&mut next, desired);

        let desired_meta = desired.meta();
        let meta = next.meta_mut();
        if let Some(labels) = &desired_meta.labels {
            meta.labels
                .get_or_insert_with(BTreeMap::new)
                .extend(labels.clone());
        }
        if let Some(annotations) = &desired_meta.annotations {
            meta.annotations
                .get_or_insert_with(BTreeMap::new)
                .extend(annotations.clone());
        }
        meta.owner_references
            .clone_from(&desired_meta.owner_references);

        (hash_moved || next != *current).then_some(next)
    }
}

/// Stamp a hash of the object onto its annotations
///
/// Call after the desired object is fully built. Labels, annotations, owner
/// references and spec all feed the hash.
pub fn stamp_spec_hash<K>(object: &mut K)
where
    K: Resource + Serialize,
{
    if let Some(annotations) = object.meta_mut().annotations.as_mut() {
        annotations.remove(ANNOTATION_SPEC_HASH);
    }
    // An empty hash never matches, so a serialization failure degrades to always writing
    let hash = serde_json::to_vec(&*object)
        .map(|bytes| format!("{:x}", md5::compute(bytes)))
        .unwrap_or_default();
    object
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ANNOTATION_SPEC_HASH.to_string(), hash);
}

fn spec_hash<K: Resource>(object: &K) -> Option<&String> {
    object
        .meta()
        .annotations
        .as_ref()?
        .get(ANNOTATION_SPEC_HASH)
        .filter(|hash| !hash.is_empty())
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

/// Namespace, name and kind of an object
pub fn object_ref<K>(object: &K) -> ObjectRef
where
    K: Resource<DynamicType = ()>,
{
    let meta = object.meta();
    ObjectRef {
        kind: K::kind(&()).to_string(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
    }
}

/// Reconcile one object toward `desired`
pub async fn upsert<K>(
    api: &dyn ObjectApi<K>,
    desired: &K,
    policy: &dyn UpdatePolicy<K>,
) -> Result<UpsertOutcome, ReconcilerError>
where
    K: Resource<DynamicType = ()> + Send + Sync,
{
    let object = object_ref(desired);

    let outcome = match api.get(&object.namespace, &object.name).await {
        Err(ApiError::NotFound) => {
            api.create(&object.namespace, desired)
                .await
                .map_err(|e| ReconcilerError::from_api(e, object.clone(), Verb::Create))?;
            UpsertOutcome::Created
        }
        Err(e) => return Err(ReconcilerError::from_api(e, object, Verb::Get)),
        Ok(current) => match policy.reconcile(&current, desired) {
            None => UpsertOutcome::Unchanged,
            Some(next) => {
                api.update(&object.namespace, &object.name, &next)
                    .await
                    .map_err(|e| ReconcilerError::from_api(e, object.clone(), Verb::Update))?;
                UpsertOutcome::Updated
            }
        },
    };

    debug!(
        kind = object.kind.as_str(),
        resource.namespace = object.namespace.as_str(),
        resource.name = object.name.as_str(),
        outcome = outcome.as_str(),
        "upsert.completed"
    );
    observability::metrics::increment_upserts(&object.kind, outcome.as_str());

    Ok(outcome)
}

/// Delete the objects selected by `labels` for which `is_stale` holds
///
/// Objects already gone count as deleted. Returns the deleted names.
pub async fn prune<K>(
    api: &dyn PruneApi<K>,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    is_stale: impl Fn(&K) -> bool + Send + Sync,
) -> Result<Vec<String>, ReconcilerError>
where
    K: Resource<DynamicType = ()> + Send + Sync,
{
    let kind = K::kind(&()).to_string();
    let listed = api.list(namespace, labels).await.map_err(|e| {
        let object = ObjectRef {
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: String::new(),
        };
        ReconcilerError::from_api(e, object, Verb::List)
    })?;

    let mut deleted = Vec::new();
    for object in listed.iter().filter(|object| is_stale(object)) {
        let object = object_ref(object);
        match api.delete(namespace, &object.name).await {
            Ok(()) | Err(ApiError::NotFound) => {}
            Err(e) => return Err(ReconcilerError::from_api(e, object, Verb::Delete)),
        }
        debug!(
            kind = object.kind.as_str(),
            resource.namespace = object.namespace.as_str(),
            resource.name = object.name.as_str(),
            "prune.deleted"
        );
        observability::metrics::increment_upserts(&kind, "deleted");
        deleted.push(object.name);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::error::ErrorKind;
    use crate::controller::testing::{InMemoryApi, StaleReadApi};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        let mut cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("demo-settings".to_string()),
                namespace: Some("demo-stag".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ConfigMap::default()
        };
        stamp_spec_hash(&mut cm);
        cm
    }

    fn merge_data(current: &mut ConfigMap, desired: &ConfigMap) {
        current.data.clone_from(&desired.data);
    }

    const MERGE: SpecHashMerge<ConfigMap> = SpecHashMerge::new(merge_data);

    #[tokio::test]
    async fn test_upsert_creates_when_absent() {
        let api = InMemoryApi::<ConfigMap>::new();
        let desired = config_map(&[("LOG_LEVEL", "info")]);

        let outcome = upsert(&api, &desired, &Replace).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(api.writes(), 1);
        let stored = api.stored("demo-stag", "demo-settings").unwrap();
        assert_eq!(stored.data, desired.data);
    }

    #[tokio::test]
    async fn test_replace_policy_always_writes_and_converges() {
        let api = InMemoryApi::<ConfigMap>::new();
        let desired = config_map(&[("LOG_LEVEL", "info")]);

        upsert(&api, &desired, &Replace).await.unwrap();
        let outcome = upsert(&api, &desired, &Replace).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(api.writes(), 2);
        let stored = api.stored("demo-stag", "demo-settings").unwrap();
        assert_eq!(stored.data, desired.data);
    }

    #[tokio::test]
    async fn test_merge_policy_skips_unchanged_write() {
        let api = InMemoryApi::<ConfigMap>::new();
        let desired = config_map(&[("LOG_LEVEL", "info")]);

        assert_eq!(
            upsert(&api, &desired, &MERGE).await.unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            upsert(&api, &desired, &MERGE).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(api.writes(), 1);
    }

    #[tokio::test]
    async fn test_merge_policy_corrects_out_of_band_edit() {
        let api = InMemoryApi::<ConfigMap>::new();
        let desired = config_map(&[("LOG_LEVEL", "info")]);
        upsert(&api, &desired, &MERGE).await.unwrap();

        // Edited by hand; the spec hash annotation is left as it was
        let mut edited = api.stored("demo-stag", "demo-settings").unwrap();
        edited
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert("LOG_LEVEL".to_string(), "trace".to_string());
        api.insert(edited);

        let outcome = upsert(&api, &desired, &MERGE).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        let stored = api.stored("demo-stag", "demo-settings").unwrap();
        assert_eq!(
            stored.data.unwrap().get("LOG_LEVEL").map(String::as_str),
            Some("info")
        );
        assert_eq!(
            upsert(&api, &desired, &MERGE).await.unwrap(),
            UpsertOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_merge_policy_preserves_foreign_metadata() {
        let api = InMemoryApi::<ConfigMap>::new();
        let mut existing = config_map(&[("LOG_LEVEL", "debug")]);
        existing
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("team".to_string(), "platform".to_string());
        api.insert(existing);

        let desired = config_map(&[("LOG_LEVEL", "info")]);
        let outcome = upsert(&api, &desired, &MERGE).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Updated);
        let stored = api.stored("demo-stag", "demo-settings").unwrap();
        assert_eq!(stored.data, desired.data);
        assert_eq!(
            stored.metadata.labels.unwrap().get("team").map(String::as_str),
            Some("platform")
        );
        assert_eq!(
            stored
                .metadata
                .annotations
                .unwrap()
                .get(ANNOTATION_SPEC_HASH),
            desired.metadata.annotations.unwrap().get(ANNOTATION_SPEC_HASH)
        );
    }

    #[tokio::test]
    async fn test_fetch_error_is_wrapped_and_nothing_is_written() {
        let api = InMemoryApi::<ConfigMap>::new();
        api.fail_on(Verb::Get, ApiError::Other("connection refused".into()));

        let err = upsert(&api, &config_map(&[]), &Replace).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("get of ConfigMap demo-stag/demo-settings"));
        assert_eq!(api.writes(), 0);
    }

    #[tokio::test]
    async fn test_stale_writer_gets_conflict() {
        let api = InMemoryApi::<ConfigMap>::new();
        api.insert(config_map(&[("LOG_LEVEL", "debug")]));
        let stale = StaleReadApi::snapshot(&api, "demo-stag", "demo-settings");

        let first = upsert(&api, &config_map(&[("LOG_LEVEL", "info")]), &MERGE).await;
        let second = upsert(&stale, &config_map(&[("LOG_LEVEL", "warn")]), &MERGE).await;

        assert_eq!(first.unwrap(), UpsertOutcome::Updated);
        assert_eq!(second.unwrap_err().kind(), ErrorKind::Conflict);
        let stored = api.stored("demo-stag", "demo-settings").unwrap();
        assert_eq!(
            stored.data.unwrap().get("LOG_LEVEL").map(String::as_str),
            Some("info")
        );
    }

    fn labelled(name: &str, team: &str) -> ConfigMap {
        let mut cm = config_map(&[]);
        cm.metadata.name = Some(name.to_string());
        cm.metadata.labels = Some(BTreeMap::from([("team".to_string(), team.to_string())]));
        cm
    }

    #[tokio::test]
    async fn test_prune_deletes_only_selected_stale_objects() {
        let api = InMemoryApi::<ConfigMap>::new();
        api.insert(labelled("keep-me", "platform"));
        api.insert(labelled("drop-me", "platform"));
        api.insert(labelled("not-ours", "billing"));
        let selector = BTreeMap::from([("team".to_string(), "platform".to_string())]);

        let deleted = prune(&api, "demo-stag", &selector, |cm: &ConfigMap| {
            cm.metadata.name.as_deref() != Some("keep-me")
        })
        .await
        .unwrap();

        assert_eq!(deleted, vec!["drop-me"]);
        assert!(api.stored("demo-stag", "keep-me").is_some());
        assert!(api.stored("demo-stag", "not-ours").is_some());
        assert_eq!(api.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_list_failure_is_wrapped() {
        let api = InMemoryApi::<ConfigMap>::new();
        api.fail_on(Verb::List, ApiError::Other("connection refused".into()));

        let err = prune(&api, "demo-stag", &BTreeMap::new(), |_: &ConfigMap| true)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().starts_with("list of ConfigMap"));
    }
}
