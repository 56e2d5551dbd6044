//! Ownership detectors in priority order
//!
//! Each detector is a pure predicate + extractor. Order matters: the first
//! detector returning `Some` decides the owner, so tools that wrap other tools
//! (Flux and Argo CD both render Helm charts) must come before the tools they wrap.

use super::{OwnerType, OwnershipResult};
use crate::models::ClusterObject;

// Flux
pub const FLUX_KUSTOMIZE_NAME: &str = "kustomize.toolkit.fluxcd.io/name";
pub const FLUX_KUSTOMIZE_NAMESPACE: &str = "kustomize.toolkit.fluxcd.io/namespace";
pub const FLUX_HELM_NAME: &str = "helm.toolkit.fluxcd.io/name";
pub const FLUX_HELM_NAMESPACE: &str = "helm.toolkit.fluxcd.io/namespace";

// Argo CD
pub const ARGO_INSTANCE: &str = "argocd.argoproj.io/instance";
pub const APP_INSTANCE: &str = "app.kubernetes.io/instance";
pub const ARGO_TRACKING_ID: &str = "argocd.argoproj.io/tracking-id";
pub const ARGO_DEFAULT_NAMESPACE: &str = "argocd";

// Helm
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const HELM_CHART: &str = "helm.sh/chart";
pub const HELM_RELEASE_NAME: &str = "meta.helm.sh/release-name";
pub const HELM_RELEASE_NAMESPACE: &str = "meta.helm.sh/release-namespace";

// Terraform
pub const TERRAFORM_WORKSPACE: &str = "app.terraform.io/workspace-name";
pub const TERRAFORM_WORKSPACE_LEGACY: &str = "terraform.io/workspace";
pub const TERRAFORM_ORGANIZATION: &str = "app.terraform.io/organization";
pub const MANAGED: &str = "managed";

// ConfigHub
pub const CONFIGHUB_UNIT: &str = "confighub.com/UnitSlug";
pub const CONFIGHUB_SPACE: &str = "confighub.com/SpaceName";

/// One entry of the detection table
pub struct Detector {
    pub owner_type: OwnerType,
    pub detect: fn(&ClusterObject) -> Option<OwnershipResult>,
}

/// Detection table, highest priority first
pub const DETECTORS: &[Detector] = &[
    Detector {
        owner_type: OwnerType::Flux,
        detect: detect_flux,
    },
    Detector {
        owner_type: OwnerType::Argo,
        detect: detect_argo,
    },
    Detector {
        owner_type: OwnerType::Helm,
        detect: detect_helm,
    },
    Detector {
        owner_type: OwnerType::Terraform,
        detect: detect_terraform,
    },
    Detector {
        owner_type: OwnerType::ConfigHub,
        detect: detect_confighub,
    },
    Detector {
        owner_type: OwnerType::Kubernetes,
        detect: detect_native,
    },
];

fn detect_flux(obj: &ClusterObject) -> Option<OwnershipResult> {
    let families = [
        ("kustomization", FLUX_KUSTOMIZE_NAME, FLUX_KUSTOMIZE_NAMESPACE),
        ("helmrelease", FLUX_HELM_NAME, FLUX_HELM_NAMESPACE),
    ];

    families.iter().find_map(|(sub_type, name_key, ns_key)| {
        let name = obj.label(name_key)?;
        let namespace = obj.label(ns_key).unwrap_or(&obj.namespace);
        Some(OwnershipResult::new(OwnerType::Flux, *sub_type, name, namespace))
    })
}

fn detect_argo(obj: &ClusterObject) -> Option<OwnershipResult> {
    // Helm also sets app.kubernetes.io/instance, so the label alone is not enough
    if let (Some(app), Some(_)) = (obj.label(ARGO_INSTANCE), obj.label(APP_INSTANCE)) {
        let (namespace, name) = split_app_reference(app);
        return Some(OwnershipResult::new(
            OwnerType::Argo,
            "application",
            name,
            namespace,
        ));
    }

    let tracking_id = obj.annotation(ARGO_TRACKING_ID)?;
    let app = parse_tracking_id(tracking_id)?;
    let (namespace, name) = split_app_reference(app);
    Some(OwnershipResult::new(
        OwnerType::Argo,
        "application",
        name,
        namespace,
    ))
}

/// Extract the application part of a tracking id
///
/// Format: `<app>:<group>/<Kind>:<namespace>/<name>`. A value without the
/// resource descriptor is taken as the app name on its own.
pub fn parse_tracking_id(value: &str) -> Option<&str> {
    let app = match value.split_once(':') {
        Some((app, _descriptor)) => app,
        None => value,
    };
    let app = app.trim();
    (!app.is_empty()).then_some(app)
}

/// Split `<namespace>_<app>` (apps-in-any-namespace form) into its parts
fn split_app_reference(app: &str) -> (&str, &str) {
    match app.split_once('_') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => (namespace, name),
        _ => (ARGO_DEFAULT_NAMESPACE, app),
    }
}

fn detect_helm(obj: &ClusterObject) -> Option<OwnershipResult> {
    let managed_by_helm = obj
        .label(MANAGED_BY)
        .is_some_and(|v| v.eq_ignore_ascii_case("helm"));
    if !managed_by_helm && obj.label(HELM_CHART).is_none() {
        return None;
    }

    let name = obj
        .label(APP_INSTANCE)
        .or_else(|| obj.annotation(HELM_RELEASE_NAME))
        .unwrap_or_default();
    let namespace = obj
        .annotation(HELM_RELEASE_NAMESPACE)
        .unwrap_or(&obj.namespace);
    Some(OwnershipResult::new(OwnerType::Helm, "release", name, namespace))
}

fn detect_terraform(obj: &ClusterObject) -> Option<OwnershipResult> {
    if let Some(workspace) = obj
        .annotation(TERRAFORM_WORKSPACE)
        .or_else(|| obj.annotation(TERRAFORM_WORKSPACE_LEGACY))
    {
        let organization = obj.annotation(TERRAFORM_ORGANIZATION).unwrap_or_default();
        return Some(OwnershipResult::new(
            OwnerType::Terraform,
            "workspace",
            workspace,
            organization,
        ));
    }

    let managed = obj.label(MANAGED).is_some_and(|v| v == "true")
        || obj
            .label(MANAGED_BY)
            .is_some_and(|v| v.eq_ignore_ascii_case("terraform"));
    managed.then(|| OwnershipResult::new(OwnerType::Terraform, "managed", "", ""))
}

fn detect_confighub(obj: &ClusterObject) -> Option<OwnershipResult> {
    let unit = obj
        .label(CONFIGHUB_UNIT)
        .or_else(|| obj.annotation(CONFIGHUB_UNIT))?;
    let space = obj.annotation(CONFIGHUB_SPACE).unwrap_or_default();
    Some(OwnershipResult::new(OwnerType::ConfigHub, "unit", unit, space))
}

fn detect_native(obj: &ClusterObject) -> Option<OwnershipResult> {
    let owner = obj.controller_ref()?;
    Some(OwnershipResult::new(
        OwnerType::Kubernetes,
        owner.kind.to_lowercase(),
        &owner.name,
        &obj.namespace,
    ))
}
