//! # Owned Object Mutators
//!
//! Copies Dashboard spec fields onto the owned Deployment and Service and links them back
//! to the Dashboard through a controller owner reference.

use crate::constants::APP_LABEL;
use crate::crd::Dashboard;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure establishing the owner link
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutateError {
    /// The owner carries a deletion timestamp
    #[error("owner {0} is being deleted")]
    OwnerBeingDeleted(String),
    /// The owner has no name or uid yet
    #[error("owner {0} has no uid")]
    OwnerWithoutUid(String),
    /// Another object already controls the target
    #[error("object is already controlled by {kind} {name}")]
    AlreadyControlled { kind: String, name: String },
}

fn selector_labels(dashboard: &Dashboard) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), dashboard.name_any())])
}

fn quantities(values: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect(),
    )
}

fn dashboard_container(dashboard: &Dashboard) -> Container {
    let spec = &dashboard.spec;
    let resources = spec.resources.as_ref().map(|r| ResourceRequirements {
        requests: quantities(&r.requests),
        limits: quantities(&r.limits),
        ..Default::default()
    });
    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|e| EnvVar {
            name: e.name.clone(),
            value: Some(e.value.clone()),
            ..Default::default()
        })
        .collect();

    Container {
        name: dashboard.name_any(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: spec.primary_port(),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        resources,
        env: (!env.is_empty()).then_some(env),
        ..Default::default()
    }
}

/// Apply the Dashboard spec to its Deployment
///
/// Only fields the operator manages are overwritten; server-populated fields survive.
pub fn mutate_deployment(dashboard: &Dashboard, deployment: &mut Deployment) {
    let labels = selector_labels(dashboard);
    deployment
        .labels_mut()
        .extend(labels.clone());

    let spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
    spec.replicas = Some(dashboard.spec.desired_replicas());
    spec.selector = LabelSelector {
        match_labels: Some(labels.clone()),
        ..Default::default()
    };
    spec.template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![dashboard_container(dashboard)],
            ..Default::default()
        }),
    };
}

/// Apply the Dashboard spec to its Service
pub fn mutate_service(dashboard: &Dashboard, service: &mut Service) {
    let labels = selector_labels(dashboard);
    service.labels_mut().extend(labels.clone());

    let node_port = if dashboard.spec.exposes_node_port() {
        dashboard.spec.ports.first().and_then(|p| p.node_port)
    } else {
        None
    };

    let spec = service.spec.get_or_insert_with(ServiceSpec::default);
    spec.type_ = Some(
        dashboard
            .spec
            .service_type
            .clone()
            .unwrap_or_else(|| "ClusterIP".to_string()),
    );
    spec.selector = Some(labels);
    spec.ports = Some(vec![ServicePort {
        name: Some("http".to_string()),
        port: dashboard.spec.primary_port(),
        protocol: Some("TCP".to_string()),
        node_port,
        ..Default::default()
    }]);
}

/// Link `obj` to `owner` with a controller owner reference
///
/// Idempotent: an existing reference to the same owner is replaced, references to
/// non-controlling owners are kept.
pub fn set_controller_reference<K: Resource>(owner: &Dashboard, obj: &mut K) -> Result<(), MutateError> {
    let owner_key = format!(
        "{}/{}",
        owner.namespace().unwrap_or_default(),
        owner.name_any()
    );
    if owner.meta().deletion_timestamp.is_some() {
        return Err(MutateError::OwnerBeingDeleted(owner_key));
    }
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| MutateError::OwnerWithoutUid(owner_key))?;

    let refs = obj.meta_mut().owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_ref.uid)
    {
        return Err(MutateError::AlreadyControlled {
            kind: other.kind.clone(),
            name: other.name.clone(),
        });
    }
    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
