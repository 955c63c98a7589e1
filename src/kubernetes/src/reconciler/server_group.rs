use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use k8s_openapi::api::core::v1::ServicePort;
use kube::{Client, ResourceExt};

use crate::context::RequestContext;
use crate::error::Error;
use crate::model::load_balancer::LoadBalancer;
use crate::model::server_group::{
    BackendAttribute, BackendKey, BackendKind, NamedKey, ServerGroup, DEFAULT_SERVER_WEIGHT,
    MAX_BACKEND_BATCH,
};
use crate::provider::{NetworkInterfaceOps, ServerGroupOps};
use crate::reconciler::candidates::{
    find_node_by_name, is_exclude_node, is_virtual_node, CandidateSet, TrafficPolicy,
};
use crate::reconciler::interfaces::attach_interface_ids;
use crate::util::{apply_batched, instance_from_provider_id};

/// Backend membership changes needed to converge one server group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendDiff {
    pub additions: Vec<BackendAttribute>,
    pub removals: Vec<BackendAttribute>,
    pub weight_updates: Vec<BackendAttribute>,
}

impl BackendDiff {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.weight_updates.is_empty()
    }
}

/// Compare the observed backend list of a group against the desired one.
///
/// Matching is by backend key only; once a backend exists, weight is the
/// only field that is diffed.
pub fn diff_backends(observed: &[BackendAttribute], desired: &[BackendAttribute]) -> BackendDiff {
    let observed_keys: HashSet<BackendKey> = observed.iter().map(|b| b.matching_key()).collect();
    let desired_keys: HashSet<BackendKey> = desired.iter().map(|b| b.matching_key()).collect();

    let additions = desired
        .iter()
        .filter(|b| !observed_keys.contains(&b.matching_key()))
        .cloned()
        .collect();
    let removals = observed
        .iter()
        .filter(|b| !desired_keys.contains(&b.matching_key()))
        .cloned()
        .collect();

    let observed_weights: HashMap<BackendKey, u32> = observed
        .iter()
        .map(|b| (b.matching_key(), b.weight))
        .collect();
    let weight_updates = desired
        .iter()
        .filter(|b| {
            observed_weights
                .get(&b.matching_key())
                .map(|w| *w != b.weight)
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    BackendDiff {
        additions,
        removals,
        weight_updates,
    }
}

pub struct ServerGroupManager<P> {
    client: Client,
    cloud: Arc<P>,
}

impl<P> ServerGroupManager<P>
where
    P: ServerGroupOps + NetworkInterfaceOps + 'static,
{
    pub fn new(client: Client, cloud: Arc<P>) -> ServerGroupManager<P> {
        ServerGroupManager { client, cloud }
    }

    /// Build the desired server groups from cluster state, one per
    /// service port.
    pub async fn build_local_model(
        &self,
        ctx: &RequestContext,
        mdl: &mut LoadBalancer,
    ) -> Result<(), Error> {
        let candidates = CandidateSet::collect(&self.client, ctx).await?;
        let mut groups = Vec::new();
        for port in ctx.ports() {
            groups.push(build_server_group(ctx, &port, &candidates, self.cloud.as_ref()).await?);
        }
        mdl.server_groups = groups;
        Ok(())
    }

    /// Fetch the observed server groups from the cloud API.
    pub async fn build_remote_model(
        &self,
        ctx: &RequestContext,
        mdl: &mut LoadBalancer,
    ) -> Result<(), Error> {
        let lb_id = mdl.attribute.load_balancer_id.clone();
        mdl.server_groups =
            self.cloud
                .describe_server_groups(&lb_id)
                .await
                .map_err(|e| Error::Provider {
                    id: ctx.namespaced_name(),
                    source: e,
                })?;
        Ok(())
    }

    pub async fn create_group(&self, group: &mut ServerGroup, lb_id: &str) -> Result<(), Error> {
        self.cloud
            .create_server_group(group, lb_id)
            .await
            .map_err(|e| Error::Provider {
                id: lb_id.to_string(),
                source: e,
            })
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<(), Error> {
        self.cloud
            .delete_server_group(group_id)
            .await
            .map_err(|e| Error::Provider {
                id: group_id.to_string(),
                source: e,
            })
    }

    /// Converge one observed group onto its desired counterpart with the
    /// minimal set of mutating calls: additions, then removals, then
    /// weight updates.
    pub async fn update(&self, local: &ServerGroup, remote: &ServerGroup) -> Result<(), Error> {
        let diff = diff_backends(&remote.backends, &local.backends);
        if diff.is_empty() {
            tracing::info!(group = remote.group_name, "No backend needs to be updated");
            return Ok(());
        }
        if !diff.additions.is_empty() {
            self.add_backends_batched(remote, &diff.additions).await?;
        }
        if !diff.removals.is_empty() {
            self.remove_backends_batched(remote, &diff.removals).await?;
        }
        if !diff.weight_updates.is_empty() {
            self.set_backend_weights_batched(remote, &diff.weight_updates)
                .await?;
        }
        Ok(())
    }

    async fn add_backends_batched(
        &self,
        group: &ServerGroup,
        additions: &[BackendAttribute],
    ) -> Result<(), Error> {
        apply_batched(additions, MAX_BACKEND_BATCH, |chunk| {
            let cloud = self.cloud.clone();
            let group_id = group.group_id.clone();
            let group_name = group.group_name.clone();
            async move {
                let payload = serde_json::to_string(&chunk).map_err(Error::Serialization)?;
                tracing::info!(group = group_name, additions = payload, "Add backends");
                cloud
                    .add_backends(&group_id, &payload)
                    .await
                    .map_err(|e| Error::Provider {
                        id: group_id.clone(),
                        source: e,
                    })
            }
        })
        .await
    }

    async fn remove_backends_batched(
        &self,
        group: &ServerGroup,
        removals: &[BackendAttribute],
    ) -> Result<(), Error> {
        apply_batched(removals, MAX_BACKEND_BATCH, |chunk| {
            let cloud = self.cloud.clone();
            let group_id = group.group_id.clone();
            let group_name = group.group_name.clone();
            async move {
                let payload = serde_json::to_string(&chunk).map_err(Error::Serialization)?;
                tracing::info!(group = group_name, removals = payload, "Remove backends");
                cloud
                    .remove_backends(&group_id, &payload)
                    .await
                    .map_err(|e| Error::Provider {
                        id: group_id.clone(),
                        source: e,
                    })
            }
        })
        .await
    }

    async fn set_backend_weights_batched(
        &self,
        group: &ServerGroup,
        updates: &[BackendAttribute],
    ) -> Result<(), Error> {
        apply_batched(updates, MAX_BACKEND_BATCH, |chunk| {
            let cloud = self.cloud.clone();
            let group_id = group.group_id.clone();
            let group_name = group.group_name.clone();
            async move {
                let payload = serde_json::to_string(&chunk).map_err(Error::Serialization)?;
                tracing::info!(group = group_name, updates = payload, "Update backend weights");
                cloud
                    .set_backend_weights(&group_id, &payload)
                    .await
                    .map_err(|e| Error::Provider {
                        id: group_id.clone(),
                        source: e,
                    })
            }
        })
        .await
    }
}

/// Build the desired server group for one service port under the
/// candidate set's traffic policy.
pub async fn build_server_group<P>(
    ctx: &RequestContext,
    port: &ServicePort,
    candidates: &CandidateSet,
    cloud: &P,
) -> Result<ServerGroup, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    let named_key = NamedKey::new(&ctx.service, &ctx.cluster_id, port.port)?;
    let mut group = ServerGroup {
        group_id: String::new(),
        group_name: named_key.to_string(),
        service_port: port.clone(),
        backends: Vec::new(),
    };

    let backends = match candidates.policy {
        TrafficPolicy::InterfaceDirect => {
            tracing::info!(group = group.group_name, "Build backends in interface-direct mode");
            build_interface_backends(ctx, candidates, &group, cloud).await?
        }
        TrafficPolicy::NodeLocal => {
            tracing::info!(group = group.group_name, "Build backends in node-local mode");
            build_node_local_backends(ctx, candidates, &group, cloud).await?
        }
        TrafficPolicy::ClusterWide => {
            tracing::info!(group = group.group_name, "Build backends in cluster-wide mode");
            build_cluster_wide_backends(ctx, candidates, &group, cloud).await?
        }
    };

    group.backends = backends;
    Ok(group)
}

/// Backends straight from the endpoint subsets: one entry per address,
/// port matched by service port name, node reference preserved. The port
/// is the endpoint target port; the instance path overrides it with the
/// node port later.
fn endpoint_backends(candidates: &CandidateSet, group: &ServerGroup) -> Vec<BackendAttribute> {
    let mut backends = Vec::new();
    for subset in candidates.endpoints.subsets.iter().flatten() {
        let backend_port = subset
            .ports
            .iter()
            .flatten()
            .find(|p| p.name == group.service_port.name)
            .map(|p| p.port)
            .unwrap_or_default();

        for addr in subset.addresses.iter().flatten() {
            backends.push(BackendAttribute {
                kind: BackendKind::Instance,
                server_id: String::new(),
                server_ip: addr.ip.clone(),
                node_name: addr.node_name.clone(),
                port: backend_port,
                weight: DEFAULT_SERVER_WEIGHT,
                description: group.group_name.clone(),
            });
        }
    }
    backends
}

async fn build_interface_backends<P>(
    ctx: &RequestContext,
    candidates: &CandidateSet,
    group: &ServerGroup,
    cloud: &P,
) -> Result<Vec<BackendAttribute>, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    if !candidates.has_endpoint_subsets() {
        tracing::warn!(group = group.group_name, "Endpoint subsets are empty");
        return Ok(Vec::new());
    }

    let backends = endpoint_backends(candidates, group);
    let mut backends = attach_interface_ids(cloud, &ctx.network.vpc_id, backends).await?;

    for backend in backends.iter_mut() {
        backend.weight = DEFAULT_SERVER_WEIGHT;
    }
    Ok(backends)
}

async fn build_node_local_backends<P>(
    ctx: &RequestContext,
    candidates: &CandidateSet,
    group: &ServerGroup,
    cloud: &P,
) -> Result<Vec<BackendAttribute>, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    if !candidates.has_endpoint_subsets() {
        tracing::warn!(group = group.group_name, "Endpoint subsets are empty");
        return Ok(Vec::new());
    }

    let mut instance_backends = Vec::new();
    let mut interface_backends = Vec::new();
    for mut backend in endpoint_backends(candidates, group) {
        let node_name = backend
            .node_name
            .clone()
            .ok_or_else(|| Error::NodeNameMissing {
                service: ctx.namespaced_name(),
                ip: backend.server_ip.clone(),
            })?;
        let node = match find_node_by_name(&candidates.nodes, &node_name) {
            Some(node) => node,
            None => {
                tracing::warn!(
                    node = node_name,
                    endpoint = backend.server_ip,
                    "No corresponding node for endpoint address"
                );
                continue;
            }
        };

        if is_virtual_node(node) {
            interface_backends.push(backend);
            continue;
        }
        if is_exclude_node(node) {
            continue;
        }

        let provider_id = node
            .spec
            .as_ref()
            .and_then(|spec| spec.provider_id.clone())
            .unwrap_or_default();
        let (_, instance_id) = instance_from_provider_id(&provider_id)?;
        backend.server_id = instance_id;
        backend.kind = BackendKind::Instance;
        // Instance backends receive traffic on the allocated node port.
        backend.port = group.service_port.node_port.unwrap_or_default();
        instance_backends.push(backend);
    }

    if !interface_backends.is_empty() {
        interface_backends =
            attach_interface_ids(cloud, &ctx.network.vpc_id, interface_backends).await?;
    }

    let mut backends = instance_backends;
    backends.extend(interface_backends);

    // Weight is the endpoint fan-out per server: a server hosting three
    // relevant pod addresses gets weight three.
    let backends = weight_by_fanout(backends);
    Ok(dedup_by_server_id(backends))
}

async fn build_cluster_wide_backends<P>(
    ctx: &RequestContext,
    candidates: &CandidateSet,
    group: &ServerGroup,
    cloud: &P,
) -> Result<Vec<BackendAttribute>, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    if !candidates.has_endpoint_subsets() {
        tracing::warn!(group = group.group_name, "Endpoint subsets are empty");
        return Ok(Vec::new());
    }

    // Every eligible node becomes a backend whether or not it currently
    // hosts a relevant pod; kube-proxy forwards from there.
    let mut instance_backends = Vec::new();
    for node in candidates.nodes.iter() {
        if is_exclude_node(node) || is_virtual_node(node) {
            continue;
        }
        let provider_id = node
            .spec
            .as_ref()
            .and_then(|spec| spec.provider_id.clone())
            .unwrap_or_default();
        let (_, instance_id) = instance_from_provider_id(&provider_id)?;
        instance_backends.push(BackendAttribute {
            kind: BackendKind::Instance,
            server_id: instance_id,
            server_ip: String::new(),
            node_name: Some(node.name_any()),
            port: group.service_port.node_port.unwrap_or_default(),
            weight: DEFAULT_SERVER_WEIGHT,
            description: group.group_name.clone(),
        });
    }

    // Addresses living on virtual nodes cannot be reached through a node
    // port and are steered to their interfaces instead.
    let mut interface_backends = Vec::new();
    for backend in endpoint_backends(candidates, group) {
        let node_name = backend
            .node_name
            .clone()
            .ok_or_else(|| Error::NodeNameMissing {
                service: ctx.namespaced_name(),
                ip: backend.server_ip.clone(),
            })?;
        match find_node_by_name(&candidates.nodes, &node_name) {
            Some(node) => {
                if is_virtual_node(node) {
                    interface_backends.push(backend);
                }
            }
            None => {
                tracing::warn!(
                    node = node_name,
                    endpoint = backend.server_ip,
                    "No corresponding node for endpoint address"
                );
            }
        }
    }

    if !interface_backends.is_empty() {
        interface_backends =
            attach_interface_ids(cloud, &ctx.network.vpc_id, interface_backends).await?;
    }

    let mut backends = instance_backends;
    backends.extend(interface_backends);
    for backend in backends.iter_mut() {
        backend.weight = DEFAULT_SERVER_WEIGHT;
    }
    Ok(backends)
}

/// Set each backend's weight to the number of entries sharing its server
/// id. Returns a new list.
fn weight_by_fanout(backends: Vec<BackendAttribute>) -> Vec<BackendAttribute> {
    let mut fanout: HashMap<String, u32> = HashMap::new();
    for backend in backends.iter() {
        *fanout.entry(backend.server_id.clone()).or_default() += 1;
    }
    backends
        .into_iter()
        .map(|mut backend| {
            backend.weight = fanout[&backend.server_id];
            backend
        })
        .collect()
}

/// Keep the first backend per server id. Returns a new list.
fn dedup_by_server_id(backends: Vec<BackendAttribute>) -> Vec<BackendAttribute> {
    let mut seen: HashSet<String> = HashSet::new();
    backends
        .into_iter()
        .filter(|backend| seen.insert(backend.server_id.clone()))
        .collect()
}
