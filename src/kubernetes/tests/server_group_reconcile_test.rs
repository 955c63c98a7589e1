// Relocated from an inline #[cfg(test)] module: these tests use MockCloud from
// the cloudlb-mock dev-dependency, which depends back on this crate. Inline unit
// tests would pull two copies of this crate into the graph; integration tests
// link a single copy, so they live here.

use std::collections::HashMap;

use rstest::rstest;

use cloudlb_kubernetes::config::ReconcileConfig;
use cloudlb_kubernetes::error::Error;
use cloudlb_kubernetes::fixture::{
    instance_backend, interface_backend, test_endpoints, test_node, test_request_context,
    test_service, test_service_port, virtual_node,
};
use cloudlb_kubernetes::model::server_group::{
    BackendAttribute, BackendKind, NamedKey, DEFAULT_SERVER_WEIGHT,
};
use cloudlb_kubernetes::provider::InterfacePage;
use cloudlb_kubernetes::reconciler::candidates::{CandidateSet, TrafficPolicy};
use cloudlb_kubernetes::reconciler::server_group::*;
use cloudlb_mock::cloud::MockCloud;

#[rstest(
    observed,
    desired,
    expected,
    case(vec![], vec![], BackendDiff::default()),
    case(
        vec![],
        vec![instance_backend("i-aaa", 100)],
        BackendDiff {
            additions: vec![instance_backend("i-aaa", 100)],
            ..Default::default()
        },
    ),
    case(
        vec![instance_backend("i-aaa", 100)],
        vec![],
        BackendDiff {
            removals: vec![instance_backend("i-aaa", 100)],
            ..Default::default()
        },
    ),
    case(
        vec![instance_backend("i-aaa", 100)],
        vec![instance_backend("i-aaa", 3)],
        BackendDiff {
            weight_updates: vec![instance_backend("i-aaa", 3)],
            ..Default::default()
        },
    ),
    case(
        vec![instance_backend("i-aaa", 100), instance_backend("i-bbb", 100)],
        vec![instance_backend("i-bbb", 100), instance_backend("i-ccc", 100)],
        BackendDiff {
            additions: vec![instance_backend("i-ccc", 100)],
            removals: vec![instance_backend("i-aaa", 100)],
            ..Default::default()
        },
    ),
    case(
        vec![interface_backend("eni-aaa", "10.0.0.1", 100)],
        vec![interface_backend("eni-aaa", "10.0.0.2", 100)],
        BackendDiff {
            additions: vec![interface_backend("eni-aaa", "10.0.0.2", 100)],
            removals: vec![interface_backend("eni-aaa", "10.0.0.1", 100)],
            ..Default::default()
        },
    ),
)]
fn works_diff_backends(
    observed: Vec<BackendAttribute>,
    desired: Vec<BackendAttribute>,
    expected: BackendDiff,
) {
    assert_eq!(diff_backends(&observed, &desired), expected);
}

#[test]
fn works_diff_backends_idempotence() {
    let observed = vec![
        instance_backend("i-aaa", 100),
        instance_backend("i-bbb", 2),
        interface_backend("eni-aaa", "10.0.0.1", 100),
    ];
    let desired = vec![
        instance_backend("i-bbb", 3),
        instance_backend("i-ccc", 100),
        interface_backend("eni-aaa", "10.0.0.1", 100),
    ];
    let diff = diff_backends(&observed, &desired);
    assert!(!diff.is_empty());
    // After applying the diff the observed set equals the desired
    // one and the next pass is a no-op.
    assert_eq!(diff_backends(&desired, &desired), BackendDiff::default());
}

#[test]
fn works_diff_backends_instance_key_ignores_ip() {
    let mut observed = instance_backend("i-aaa", 100);
    observed.server_ip = "10.0.0.1".to_string();
    let mut desired = instance_backend("i-aaa", 100);
    desired.server_ip = "10.0.0.2".to_string();
    assert_eq!(
        diff_backends(&[observed], &[desired]),
        BackendDiff::default()
    );
}

fn candidates(
    nodes: Vec<k8s_openapi::api::core::v1::Node>,
    endpoints: k8s_openapi::api::core::v1::Endpoints,
    policy: TrafficPolicy,
) -> CandidateSet {
    CandidateSet {
        nodes,
        endpoints,
        policy,
    }
}

#[tokio::test]
async fn works_node_local_fanout_weighting() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(
        &svc,
        &[
            ("10.0.0.1", Some("node-a")),
            ("10.0.0.2", Some("node-a")),
            ("10.0.0.3", Some("node-a")),
            ("10.0.1.1", Some("node-b")),
        ],
        "http",
        8080,
    );
    let nodes = vec![
        test_node("node-a", "ap-east-1.i-aaa"),
        test_node("node-b", "ap-east-1.i-bbb"),
    ];
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(nodes, endpoints, TrafficPolicy::NodeLocal),
        &cloud,
    )
    .await
    .unwrap();

    assert_eq!(group.backends.len(), 2);
    let by_id: HashMap<String, &BackendAttribute> = group
        .backends
        .iter()
        .map(|b| (b.server_id.clone(), b))
        .collect();
    assert_eq!(by_id["i-aaa"].weight, 3);
    assert_eq!(by_id["i-bbb"].weight, 1);
    for backend in group.backends.iter() {
        assert_eq!(backend.kind, BackendKind::Instance);
        assert_eq!(backend.port, 30080);
    }
}

#[tokio::test]
async fn works_node_local_missing_node_name_is_fatal() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(&svc, &[("10.0.0.1", None)], "http", 8080);
    let nodes = vec![test_node("node-a", "ap-east-1.i-aaa")];
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();

    let res = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(nodes, endpoints, TrafficPolicy::NodeLocal),
        &cloud,
    )
    .await;
    assert!(matches!(res, Err(Error::NodeNameMissing { .. })));
}

#[tokio::test]
async fn works_node_local_unknown_node_is_skipped() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(
        &svc,
        &[("10.0.0.1", Some("node-a")), ("10.0.0.2", Some("gone"))],
        "http",
        8080,
    );
    let nodes = vec![test_node("node-a", "ap-east-1.i-aaa")];
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(nodes, endpoints, TrafficPolicy::NodeLocal),
        &cloud,
    )
    .await
    .unwrap();
    assert_eq!(group.backends.len(), 1);
    assert_eq!(group.backends[0].server_id, "i-aaa");
}

#[tokio::test]
async fn works_node_local_virtual_node_uses_interfaces() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(
        &svc,
        &[("10.0.0.1", Some("node-a")), ("10.0.9.1", Some("vk-0"))],
        "http",
        8080,
    );
    let nodes = vec![test_node("node-a", "ap-east-1.i-aaa"), virtual_node("vk-0")];
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();
    cloud.queue_interface_page(InterfacePage {
        interfaces: [("10.0.9.1".to_string(), "eni-aaa".to_string())].into(),
        next_token: None,
    });

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(nodes, endpoints, TrafficPolicy::NodeLocal),
        &cloud,
    )
    .await
    .unwrap();
    assert_eq!(group.backends.len(), 2);
    let eni = group
        .backends
        .iter()
        .find(|b| b.kind == BackendKind::Interface)
        .unwrap();
    assert_eq!(eni.server_id, "eni-aaa");
    // Interface backends keep the endpoint target port.
    assert_eq!(eni.port, 8080);
}

#[tokio::test]
async fn works_cluster_wide_covers_all_eligible_nodes() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(&svc, &[("10.0.0.1", Some("node-a"))], "http", 8080);
    let nodes = vec![
        test_node("node-a", "ap-east-1.i-aaa"),
        test_node("node-b", "ap-east-1.i-bbb"),
        test_node("node-c", "ap-east-1.i-ccc"),
    ];
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(nodes, endpoints, TrafficPolicy::ClusterWide),
        &cloud,
    )
    .await
    .unwrap();

    assert_eq!(group.backends.len(), 3);
    for backend in group.backends.iter() {
        assert_eq!(backend.kind, BackendKind::Instance);
        assert_eq!(backend.weight, DEFAULT_SERVER_WEIGHT);
        assert_eq!(backend.port, 30080);
    }
    assert_eq!(cloud.interface_lookups(), 0);
}

#[tokio::test]
async fn works_interface_direct_empty_endpoints_builds_empty_group() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(
            Vec::new(),
            k8s_openapi::api::core::v1::Endpoints::default(),
            TrafficPolicy::InterfaceDirect,
        ),
        &cloud,
    )
    .await
    .unwrap();
    assert!(group.backends.is_empty());
    assert_eq!(cloud.interface_lookups(), 0);
}

#[tokio::test]
async fn works_interface_direct_resolves_all_addresses() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let endpoints = test_endpoints(
        &svc,
        &[("10.0.0.1", Some("node-a")), ("10.0.0.2", Some("node-b"))],
        "http",
        8080,
    );
    let ctx = test_request_context(svc, ReconcileConfig::default());
    let cloud = MockCloud::default();
    cloud.queue_interface_page(InterfacePage {
        interfaces: [
            ("10.0.0.1".to_string(), "eni-aaa".to_string()),
            ("10.0.0.2".to_string(), "eni-bbb".to_string()),
        ]
        .into(),
        next_token: None,
    });

    let group = build_server_group(
        &ctx,
        &ctx.ports()[0],
        &candidates(Vec::new(), endpoints, TrafficPolicy::InterfaceDirect),
        &cloud,
    )
    .await
    .unwrap();
    assert_eq!(group.backends.len(), 2);
    for backend in group.backends.iter() {
        assert_eq!(backend.kind, BackendKind::Interface);
        assert_eq!(backend.weight, DEFAULT_SERVER_WEIGHT);
    }
}

#[test]
fn works_group_name_from_named_key() {
    let svc = test_service("web", vec![test_service_port("http", 80, 30080)]);
    let key = NamedKey::new(&svc, "c0ffee", 80).unwrap();
    assert_eq!(key.to_string(), "k8s/80/web/default/c0ffee");
}
