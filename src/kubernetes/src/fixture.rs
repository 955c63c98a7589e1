// Object constructors shared by unit and integration tests.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Node, NodeCondition, NodeSpec,
    NodeStatus, Service, ServicePort, ServiceSpec,
};
use kube::core::ObjectMeta;

use crate::config::{NetworkDefaults, ReconcileConfig};
use crate::context::RequestContext;
use crate::model::server_group::{BackendAttribute, BackendKind};
use crate::reconciler::candidates::{LABEL_NODE_TYPE, VIRTUAL_NODE_TYPE};

pub const TEST_CLUSTER_ID: &str = "c0ffee";
pub const TEST_VPC_ID: &str = "vpc-test";

pub fn test_node(name: &str, provider_id: &str) -> Node {
    test_node_with_labels(name, provider_id, &[])
}

pub fn test_node_with_labels(name: &str, provider_id: &str, labels: &[(&str, &str)]) -> Node {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            provider_id: Some(provider_id.to_string()),
            ..Default::default()
        }),
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

pub fn unready_node(name: &str, provider_id: &str) -> Node {
    let mut node = test_node(name, provider_id);
    node.status.as_mut().unwrap().conditions = Some(vec![NodeCondition {
        type_: "Ready".to_string(),
        status: "False".to_string(),
        ..Default::default()
    }]);
    node
}

pub fn virtual_node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_NODE_TYPE.to_string(),
                VIRTUAL_NODE_TYPE.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus::default()),
    }
}

pub fn test_service_port(name: &str, port: i32, node_port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        node_port: Some(node_port),
        ..Default::default()
    }
}

pub fn test_service(name: &str, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some("01234567-89ab-cdef-0123-456789abcdef".to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            ports: Some(ports),
            ..Default::default()
        }),
        status: None,
    }
}

/// Endpoints with one subset; addresses are `(ip, owning node)` pairs.
pub fn test_endpoints(
    svc: &Service,
    addresses: &[(&str, Option<&str>)],
    port_name: &str,
    port: i32,
) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: svc.metadata.name.clone(),
            namespace: svc.metadata.namespace.clone(),
            ..Default::default()
        },
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                addresses
                    .iter()
                    .map(|(ip, node)| EndpointAddress {
                        ip: ip.to_string(),
                        node_name: node.map(|n| n.to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                name: Some(port_name.to_string()),
                port,
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

pub fn test_request_context(service: Service, config: ReconcileConfig) -> RequestContext {
    RequestContext::new(
        service,
        config,
        TEST_CLUSTER_ID.to_string(),
        NetworkDefaults {
            vpc_id: TEST_VPC_ID.to_string(),
            vswitch_id: "vsw-test".to_string(),
        },
    )
}

pub fn instance_backend(server_id: &str, weight: u32) -> BackendAttribute {
    BackendAttribute {
        kind: BackendKind::Instance,
        server_id: server_id.to_string(),
        weight,
        ..Default::default()
    }
}

pub fn interface_backend(server_id: &str, server_ip: &str, weight: u32) -> BackendAttribute {
    BackendAttribute {
        kind: BackendKind::Interface,
        server_id: server_id.to_string(),
        server_ip: server_ip.to_string(),
        weight,
        ..Default::default()
    }
}
