use k8s_openapi::api::core::v1::{Endpoints, Node, Service};
use kube::{api::ListParams, Api, Client, ResourceExt};

use crate::config::ReconcileConfig;
use crate::context::RequestContext;
use crate::error::Error;
use crate::model::load_balancer::Flag;
use crate::util::{get_namespace, get_namespaced_name};

pub const LABEL_NODE_ROLE_MASTER: &str = "node-role.kubernetes.io/master";
pub const LABEL_NODE_EXCLUDE_BALANCER: &str =
    "node.kubernetes.io/exclude-from-external-load-balancers";
pub const LABEL_NODE_TYPE: &str = "type";
pub const VIRTUAL_NODE_TYPE: &str = "virtual-kubelet";

const NODE_CONDITION_READY: &str = "Ready";
const CONDITION_TRUE: &str = "True";

/// Strategy selecting which cluster entities become backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficPolicy {
    /// Traffic is forwarded to pod network interfaces directly.
    InterfaceDirect,
    /// Traffic is forwarded only to nodes hosting relevant pods.
    NodeLocal,
    /// Traffic is forwarded to every eligible node.
    ClusterWide,
}

impl std::fmt::Display for TrafficPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InterfaceDirect => write!(f, "interface-direct"),
            Self::NodeLocal => write!(f, "node-local"),
            Self::ClusterWide => write!(f, "cluster-wide"),
        }
    }
}

/// Candidate cluster state for one backend build: filtered nodes, the
/// service's endpoint subsets and the selected traffic policy. Lives for
/// one build invocation only.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub nodes: Vec<Node>,
    pub endpoints: Endpoints,
    pub policy: TrafficPolicy,
}

impl CandidateSet {
    pub async fn collect(client: &Client, ctx: &RequestContext) -> Result<CandidateSet, Error> {
        let nodes = collect_nodes(client, &ctx.config).await?;
        let endpoints = collect_endpoints(client, &ctx.service).await?;
        Ok(CandidateSet {
            nodes,
            endpoints,
            policy: infer_traffic_policy(&ctx.service, &ctx.config),
        })
    }

    pub fn has_endpoint_subsets(&self) -> bool {
        self.endpoints
            .subsets
            .as_ref()
            .map(|subsets| !subsets.is_empty())
            .unwrap_or(false)
    }
}

pub fn infer_traffic_policy(svc: &Service, config: &ReconcileConfig) -> TrafficPolicy {
    if config.interface_direct {
        return TrafficPolicy::InterfaceDirect;
    }
    let local = svc
        .spec
        .as_ref()
        .and_then(|spec| spec.external_traffic_policy.as_ref())
        .map(|etp| etp == "Local")
        .unwrap_or(false);
    if local {
        return TrafficPolicy::NodeLocal;
    }
    TrafficPolicy::ClusterWide
}

pub async fn collect_nodes(client: &Client, config: &ReconcileConfig) -> Result<Vec<Node>, Error> {
    let node_api = Api::<Node>::all(client.clone());
    let nodes = node_api
        .list(&ListParams::default())
        .await
        .map_err(Error::Kube)?;
    filter_nodes(nodes.items, config)
}

/// Filter candidate nodes for backend membership.
pub fn filter_nodes(nodes: Vec<Node>, config: &ReconcileConfig) -> Result<Vec<Node>, Error> {
    let items = if config.backend_label.is_empty() {
        nodes
    } else {
        filter_by_label(nodes, &config.backend_label)?
    };

    let mut accepted = Vec::new();
    for node in items {
        if is_unschedulable(&node) && matches!(config.remove_unscheduled, Some(Flag::On)) {
            tracing::info!(node = node.name_any(), "Ignore unschedulable node");
            continue;
        }

        // Masters may be tainted without being marked unschedulable, so
        // they are recognized by label and always dropped.
        if node.labels().contains_key(LABEL_NODE_ROLE_MASTER) {
            continue;
        }

        // Virtual nodes report no usable conditions.
        if is_virtual_node(&node) {
            tracing::info!(
                node = node.name_any(),
                "Skip condition check for virtual node"
            );
            accepted.push(node);
            continue;
        }

        let conditions = node
            .status
            .as_ref()
            .and_then(|status| status.conditions.clone())
            .unwrap_or_default();
        // No condition information at all, not usable.
        if conditions.is_empty() {
            continue;
        }

        // Not-ready nodes are logged here but still accepted.
        for cond in conditions.iter() {
            if cond.type_ == NODE_CONDITION_READY && cond.status != CONDITION_TRUE {
                tracing::info!(
                    node = node.name_any(),
                    condition = cond.type_,
                    status = cond.status,
                    "Node condition is not ready"
                );
            }
        }

        accepted.push(node);
    }

    Ok(accepted)
}

/// Keep nodes matching every `k=v` term of the comma separated selector.
/// A term without exactly one `=` is malformed.
pub fn filter_by_label(nodes: Vec<Node>, selector: &str) -> Result<Vec<Node>, Error> {
    if selector.is_empty() {
        return Ok(nodes);
    }
    let mut terms = Vec::new();
    for term in selector.split(',') {
        let kv: Vec<&str> = term.split('=').collect();
        if kv.len() != 2 {
            return Err(Error::InvalidLabelSelector(term.to_string()));
        }
        terms.push((kv[0], kv[1]));
    }

    let accepted: Vec<Node> = nodes
        .into_iter()
        .filter(|node| {
            terms
                .iter()
                .all(|(k, v)| node.labels().get(*k).map(|s| s.as_str()) == Some(*v))
        })
        .collect();
    tracing::debug!(
        selector = selector,
        accepted = accepted.len(),
        "Accept nodes by backend label"
    );
    Ok(accepted)
}

/// Fetch endpoint subsets for a service. A missing Endpoints object is
/// not an error and yields empty subsets.
pub async fn collect_endpoints(client: &Client, svc: &Service) -> Result<Endpoints, Error> {
    let ns = get_namespace::<Service>(svc)?;
    let endpoints_api = Api::<Endpoints>::namespaced(client.clone(), &ns);
    match endpoints_api
        .get_opt(&svc.name_any())
        .await
        .map_err(|e| Error::Endpoints {
            service: get_namespaced_name(svc),
            source: e,
        })? {
        Some(eps) => Ok(eps),
        None => {
            tracing::warn!(service = get_namespaced_name(svc), "Endpoints not found");
            Ok(Endpoints::default())
        }
    }
}

pub fn find_node_by_name<'a>(nodes: &'a [Node], name: &str) -> Option<&'a Node> {
    nodes.iter().find(|n| n.name_any() == name)
}

pub fn is_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

pub fn is_virtual_node(node: &Node) -> bool {
    node.labels()
        .get(LABEL_NODE_TYPE)
        .map(|t| t == VIRTUAL_NODE_TYPE)
        .unwrap_or(false)
}

pub fn is_exclude_node(node: &Node) -> bool {
    node.labels().contains_key(LABEL_NODE_EXCLUDE_BALANCER)
}
