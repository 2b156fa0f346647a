//! Test utilities for unit testing reconcilers
//!
//! Builders for test resources and in-memory stand-ins for the cluster, the custom
//! resource API, the dashboard store and the event recorder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crds::{Grafana, GrafanaDashboard, GrafanaDashboardSpec, GrafanaSpec};
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::error::ErrorResponse;
use kube::{Resource, ResourceExt};

use crate::cluster::{ClusterClient, ClusterError, ManagedKind, ManagedObject};
use crate::dashboard::store::{DashboardStore, dashboard_file_name};
use crate::error::ControllerError;
use crate::events::EventSink;
use crate::metrics::Metrics;

/// Helper to create a test Grafana with a uid so it can own objects
pub fn create_test_grafana(name: &str, namespace: &str) -> Grafana {
    let mut grafana = Grafana::new(name, GrafanaSpec::default());
    grafana.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("{}-uid", name)),
        resource_version: Some("1".to_string()),
        ..Default::default()
    };
    grafana
}

/// Helper to create a test GrafanaDashboard without status
pub fn create_test_dashboard(name: &str, namespace: &str, dashboard_name: &str, json: &str) -> GrafanaDashboard {
    let mut dashboard = GrafanaDashboard::new(
        name,
        GrafanaDashboardSpec {
            name: dashboard_name.to_string(),
            json: json.to_string(),
            ..Default::default()
        },
    );
    dashboard.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("{}-uid", name)),
        resource_version: Some("1".to_string()),
        ..Default::default()
    };
    dashboard
}

pub fn create_test_config_map(namespace: &str, name: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("7".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().unwrap())
}

pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("mock error {}", code),
        reason: "Mock".to_string(),
        code,
    })
}

/// How an injected cluster call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Conflict,
    Unavailable,
}

impl MockFailure {
    fn error(self, what: &str) -> ClusterError {
        match self {
            MockFailure::Conflict => ClusterError::Conflict(what.to_string()),
            MockFailure::Unavailable => ClusterError::Api(api_error(503)),
        }
    }
}

type ObjectKey = (ManagedKind, String, String);

/// In-memory cluster keyed by kind, namespace and name
#[derive(Debug, Default)]
pub struct MockClusterClient {
    objects: Mutex<HashMap<ObjectKey, ManagedObject>>,
    read_failures: Mutex<HashMap<(ManagedKind, String), MockFailure>>,
    write_failures: Mutex<HashMap<(ManagedKind, String), MockFailure>>,
    writes: Mutex<Vec<String>>,
}

fn key_of(object: &ManagedObject) -> ObjectKey {
    let meta = object.meta();
    (
        object.kind(),
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: ManagedObject) {
        self.objects.lock().unwrap().insert(key_of(&object), object);
    }

    pub fn object(&self, kind: ManagedKind, namespace: &str, name: &str) -> Option<ManagedObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every get of `kind`/`name` fails
    pub fn fail_reads(&self, kind: ManagedKind, name: &str, failure: MockFailure) {
        self.read_failures.lock().unwrap().insert((kind, name.to_string()), failure);
    }

    /// Every create or update of `kind`/`name` fails
    pub fn fail_writes(&self, kind: ManagedKind, name: &str, failure: MockFailure) {
        self.write_failures.lock().unwrap().insert((kind, name.to_string()), failure);
    }

    /// Attempted writes in order, as `create Service ns/name`
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn write(&self, verb: &str, object: &ManagedObject) -> Result<ObjectKey, ClusterError> {
        self.writes
            .lock()
            .unwrap()
            .push(format!("{} {}", verb, object.describe()));
        let key = key_of(object);
        if let Some(failure) = self.write_failures.lock().unwrap().get(&(key.0, key.2.clone())) {
            return Err(failure.error(&object.describe()));
        }
        Ok(key)
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn get(&self, kind: ManagedKind, namespace: &str, name: &str) -> Result<ManagedObject, ClusterError> {
        if let Some(failure) = self.read_failures.lock().unwrap().get(&(kind, name.to_string())) {
            return Err(failure.error(name));
        }
        self.object(kind, namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{}", namespace, name)))
    }

    async fn create(&self, object: &ManagedObject) -> Result<(), ClusterError> {
        let key = self.write("create", object)?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(ClusterError::Conflict(object.describe()));
        }
        objects.insert(key, object.clone());
        Ok(())
    }

    async fn update(&self, object: &ManagedObject) -> Result<(), ClusterError> {
        let key = self.write("update", object)?;
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&key) {
            return Err(ClusterError::NotFound(object.describe()));
        }
        objects.insert(key, object.clone());
        Ok(())
    }
}

/// In-memory custom resource API recording status and finalizer writes
pub struct MockResourceClient<K> {
    objects: Mutex<HashMap<(String, String), K>>,
    status_writes: Mutex<Vec<K>>,
    finalizer_writes: Mutex<Vec<Vec<String>>>,
    status_failure: Mutex<Option<u16>>,
}

impl<K: Resource + Clone> MockResourceClient<K> {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            status_writes: Mutex::new(Vec::new()),
            finalizer_writes: Mutex::new(Vec::new()),
            status_failure: Mutex::new(None),
        }
    }

    pub fn with_object(object: K) -> Self {
        let client = Self::new();
        client.insert(object);
        client
    }

    pub fn insert(&self, object: K) {
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Status writes fail with this HTTP code
    pub fn fail_status_writes(&self, code: u16) {
        *self.status_failure.lock().unwrap() = Some(code);
    }

    pub fn status_writes(&self) -> Vec<K> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn finalizer_writes(&self) -> Vec<Vec<String>> {
        self.finalizer_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl<K> crate::resources::ResourceClient<K> for MockResourceClient<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ControllerError> {
        Ok(self.stored(namespace, name))
    }

    async fn write_status(&self, object: &K) -> Result<(), ControllerError> {
        if let Some(code) = *self.status_failure.lock().unwrap() {
            return Err(ControllerError::Kube(api_error(code)));
        }
        self.status_writes.lock().unwrap().push(object.clone());
        self.insert(object.clone());
        Ok(())
    }

    async fn write_finalizers(&self, object: &K, finalizers: Vec<String>) -> Result<(), ControllerError> {
        self.finalizer_writes.lock().unwrap().push(finalizers.clone());
        let mut updated = object.clone();
        updated.meta_mut().finalizers = Some(finalizers);
        self.insert(updated);
        Ok(())
    }
}

/// In-memory dashboard store
#[derive(Debug)]
pub struct MockDashboardStore {
    dashboards: Mutex<HashMap<String, String>>,
    ready: Mutex<bool>,
    upserts: Mutex<usize>,
    removes: Mutex<usize>,
}

impl Default for MockDashboardStore {
    fn default() -> Self {
        Self {
            dashboards: Mutex::new(HashMap::new()),
            ready: Mutex::new(true),
            upserts: Mutex::new(0),
            removes: Mutex::new(0),
        }
    }
}

impl MockDashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An unready store applies nothing on upsert
    pub fn set_ready(&self, ready: bool) {
        *self.ready.lock().unwrap() = ready;
    }

    pub fn content(&self, dashboard: &GrafanaDashboard) -> Option<String> {
        self.dashboards
            .lock()
            .unwrap()
            .get(&dashboard_file_name(dashboard))
            .cloned()
    }

    pub fn upserts(&self) -> usize {
        *self.upserts.lock().unwrap()
    }

    pub fn removes(&self) -> usize {
        *self.removes.lock().unwrap()
    }
}

#[async_trait]
impl DashboardStore for MockDashboardStore {
    async fn is_known(&self, dashboard: &GrafanaDashboard) -> Result<bool, ControllerError> {
        Ok(self.content(dashboard).is_some())
    }

    async fn upsert(&self, dashboard: &GrafanaDashboard, json: &str) -> Result<bool, ControllerError> {
        if !*self.ready.lock().unwrap() {
            return Ok(false);
        }
        *self.upserts.lock().unwrap() += 1;
        self.dashboards
            .lock()
            .unwrap()
            .insert(dashboard_file_name(dashboard), json.to_string());
        Ok(true)
    }

    async fn remove(&self, dashboard: &GrafanaDashboard) -> Result<(), ControllerError> {
        *self.removes.lock().unwrap() += 1;
        self.dashboards
            .lock()
            .unwrap()
            .remove(&dashboard_file_name(dashboard));
        Ok(())
    }
}

/// Records published events as `(reason, note)`
#[derive(Debug, Default)]
pub struct MockEventSink {
    events: Mutex<Vec<(String, String)>>,
}

impl MockEventSink {
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for MockEventSink {
    async fn warning(&self, _object: &ObjectReference, reason: &str, note: String) {
        self.events.lock().unwrap().push((reason.to_string(), note));
    }
}
