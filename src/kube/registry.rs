//! Kind registry for live snapshots
//!
//! Every kind the analyses read is listed here once. The live source lists
//! each entry in parallel; the CLI resolves user-typed kind names through the
//! aliases.
//!
//! To track a new kind, add an entry to `KIND_REGISTRY` below. Versions are
//! tried in order until the API server accepts one.

use kube::core::ApiResource;

/// Registry entry for one listable kind
#[derive(Debug)]
pub struct KindEntry {
    pub group: &'static str,
    /// Served versions in preference order
    pub versions: &'static [&'static str],
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
    pub aliases: &'static [&'static str],
}

impl KindEntry {
    /// ApiResource for one of this kind's versions
    pub fn api_resource(&self, version: &str) -> ApiResource {
        let api_version = if self.group.is_empty() {
            version.to_string()
        } else {
            format!("{}/{}", self.group, version)
        };
        ApiResource {
            group: self.group.to_string(),
            version: version.to_string(),
            api_version,
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }

    fn answers_to(&self, name: &str) -> bool {
        self.kind.eq_ignore_ascii_case(name)
            || self.plural.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

pub const KIND_REGISTRY: &[KindEntry] = &[
    // Core workloads and plumbing
    KindEntry {
        group: "",
        versions: &["v1"],
        kind: "Pod",
        plural: "pods",
        namespaced: true,
        aliases: &["po", "pod"],
    },
    KindEntry {
        group: "",
        versions: &["v1"],
        kind: "Service",
        plural: "services",
        namespaced: true,
        aliases: &["svc", "service"],
    },
    KindEntry {
        group: "",
        versions: &["v1"],
        kind: "ConfigMap",
        plural: "configmaps",
        namespaced: true,
        aliases: &["cm", "configmap"],
    },
    KindEntry {
        group: "",
        versions: &["v1"],
        kind: "PersistentVolumeClaim",
        plural: "persistentvolumeclaims",
        namespaced: true,
        aliases: &["pvc"],
    },
    KindEntry {
        group: "",
        versions: &["v1"],
        kind: "ReplicationController",
        plural: "replicationcontrollers",
        namespaced: true,
        aliases: &["rc"],
    },
    KindEntry {
        group: "apps",
        versions: &["v1"],
        kind: "Deployment",
        plural: "deployments",
        namespaced: true,
        aliases: &["deploy", "deployment"],
    },
    KindEntry {
        group: "apps",
        versions: &["v1"],
        kind: "StatefulSet",
        plural: "statefulsets",
        namespaced: true,
        aliases: &["sts", "statefulset"],
    },
    KindEntry {
        group: "apps",
        versions: &["v1"],
        kind: "DaemonSet",
        plural: "daemonsets",
        namespaced: true,
        aliases: &["ds", "daemonset"],
    },
    KindEntry {
        group: "apps",
        versions: &["v1"],
        kind: "ReplicaSet",
        plural: "replicasets",
        namespaced: true,
        aliases: &["rs", "replicaset"],
    },
    KindEntry {
        group: "batch",
        versions: &["v1"],
        kind: "Job",
        plural: "jobs",
        namespaced: true,
        aliases: &["job"],
    },
    KindEntry {
        group: "batch",
        versions: &["v1"],
        kind: "CronJob",
        plural: "cronjobs",
        namespaced: true,
        aliases: &["cj", "cronjob"],
    },
    // Traffic and policy
    KindEntry {
        group: "networking.k8s.io",
        versions: &["v1"],
        kind: "Ingress",
        plural: "ingresses",
        namespaced: true,
        aliases: &["ing", "ingress"],
    },
    KindEntry {
        group: "networking.k8s.io",
        versions: &["v1"],
        kind: "NetworkPolicy",
        plural: "networkpolicies",
        namespaced: true,
        aliases: &["netpol", "networkpolicy"],
    },
    KindEntry {
        group: "gateway.networking.k8s.io",
        versions: &["v1", "v1beta1"],
        kind: "HTTPRoute",
        plural: "httproutes",
        namespaced: true,
        aliases: &["httproute", "route"],
    },
    KindEntry {
        group: "autoscaling",
        versions: &["v2", "v1"],
        kind: "HorizontalPodAutoscaler",
        plural: "horizontalpodautoscalers",
        namespaced: true,
        aliases: &["hpa"],
    },
    KindEntry {
        group: "policy",
        versions: &["v1"],
        kind: "PodDisruptionBudget",
        plural: "poddisruptionbudgets",
        namespaced: true,
        aliases: &["pdb"],
    },
    // Flux source controller
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "GitRepository",
        plural: "gitrepositories",
        namespaced: true,
        aliases: &["gitrepo", "gitrepository"],
    },
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "OCIRepository",
        plural: "ocirepositories",
        namespaced: true,
        aliases: &["oci", "ocirepository"],
    },
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "HelmRepository",
        plural: "helmrepositories",
        namespaced: true,
        aliases: &["helmrepo", "helmrepository"],
    },
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "Bucket",
        plural: "buckets",
        namespaced: true,
        aliases: &["bucket"],
    },
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "HelmChart",
        plural: "helmcharts",
        namespaced: true,
        aliases: &["helmchart"],
    },
    KindEntry {
        group: "source.toolkit.fluxcd.io",
        versions: &["v1"],
        kind: "ExternalArtifact",
        plural: "externalartifacts",
        namespaced: true,
        aliases: &["ea", "externalartifact"],
    },
    // Flux deployers
    KindEntry {
        group: "kustomize.toolkit.fluxcd.io",
        versions: &["v1", "v1beta2"],
        kind: "Kustomization",
        plural: "kustomizations",
        namespaced: true,
        aliases: &["ks", "kustomization"],
    },
    KindEntry {
        group: "helm.toolkit.fluxcd.io",
        versions: &["v2", "v2beta2", "v2beta1"],
        kind: "HelmRelease",
        plural: "helmreleases",
        namespaced: true,
        aliases: &["hr", "helmrelease"],
    },
    // Argo CD
    KindEntry {
        group: "argoproj.io",
        versions: &["v1alpha1"],
        kind: "Application",
        plural: "applications",
        namespaced: true,
        aliases: &["app", "application"],
    },
];

/// Look up a kind by name, plural or short alias (case-insensitive)
pub fn find_kind(name: &str) -> Option<&'static KindEntry> {
    KIND_REGISTRY.iter().find(|entry| entry.answers_to(name))
}
