use std::str::FromStr;

use k8s_openapi::api::core::v1::{Service, ServicePort};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_SERVER_WEIGHT: u32 = 100;

/// Maximum number of backends accepted by one mutating server group call.
pub const MAX_BACKEND_BATCH: usize = 39;

pub const NAMED_KEY_PREFIX: &str = "k8s";

/// Substrate a backend is addressed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A compute instance, addressed by instance id and node port.
    #[default]
    Instance,
    /// A virtual network interface, addressed by interface id.
    Interface,
}

/// Identity of a backend inside one server group.
///
/// Interface backends are keyed by interface id and source ip because one
/// interface can carry several addresses. Everything else is keyed by
/// instance id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendKey {
    Instance(String),
    Interface(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendAttribute {
    pub kind: BackendKind,
    pub server_id: String,
    pub server_ip: String,
    #[serde(skip)]
    pub node_name: Option<String>,
    pub port: i32,
    pub weight: u32,
    pub description: String,
}

impl BackendAttribute {
    pub fn matching_key(&self) -> BackendKey {
        match self.kind {
            BackendKind::Interface => {
                BackendKey::Interface(self.server_id.clone(), self.server_ip.clone())
            }
            BackendKind::Instance => BackendKey::Instance(self.server_id.clone()),
        }
    }
}

/// Naming key of a server group, derived from the owning service and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedKey {
    pub prefix: String,
    pub cluster_id: String,
    pub namespace: String,
    pub service: String,
    pub port: i32,
}

impl NamedKey {
    pub fn new(svc: &Service, cluster_id: &str, port: i32) -> Result<NamedKey, Error> {
        Ok(NamedKey {
            prefix: NAMED_KEY_PREFIX.to_string(),
            cluster_id: cluster_id.to_string(),
            namespace: svc.namespace().ok_or(Error::GetNamespace)?,
            service: svc.name_any(),
            port,
        })
    }
}

impl std::fmt::Display for NamedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.prefix, self.port, self.service, self.namespace, self.cluster_id
        )
    }
}

impl FromStr for NamedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('/').collect();
        if fields.len() != 5 || fields[0] != NAMED_KEY_PREFIX {
            return Err(Error::InvalidNamedKey(s.to_string()));
        }
        let port = fields[1]
            .parse::<i32>()
            .map_err(|_| Error::InvalidNamedKey(s.to_string()))?;
        Ok(NamedKey {
            prefix: fields[0].to_string(),
            port,
            service: fields[2].to_string(),
            namespace: fields[3].to_string(),
            cluster_id: fields[4].to_string(),
        })
    }
}

/// A named, remotely managed collection of backends for one service port.
#[derive(Debug, Clone, Default)]
pub struct ServerGroup {
    pub group_id: String,
    pub group_name: String,
    pub service_port: ServicePort,
    pub backends: Vec<BackendAttribute>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest(
        backend,
        expected,
        case(
            BackendAttribute {
                kind: BackendKind::Instance,
                server_id: "i-aaa".to_string(),
                server_ip: "10.0.0.1".to_string(),
                ..Default::default()
            },
            BackendKey::Instance("i-aaa".to_string()),
        ),
        case(
            BackendAttribute {
                kind: BackendKind::Interface,
                server_id: "eni-aaa".to_string(),
                server_ip: "10.0.0.1".to_string(),
                ..Default::default()
            },
            BackendKey::Interface("eni-aaa".to_string(), "10.0.0.1".to_string()),
        ),
    )]
    fn works_matching_key(backend: BackendAttribute, expected: BackendKey) {
        assert_eq!(backend.matching_key(), expected);
    }

    #[test]
    fn works_matching_key_ignores_ip_for_instances() {
        let a = BackendAttribute {
            kind: BackendKind::Instance,
            server_id: "i-aaa".to_string(),
            server_ip: "10.0.0.1".to_string(),
            ..Default::default()
        };
        let b = BackendAttribute {
            kind: BackendKind::Instance,
            server_id: "i-aaa".to_string(),
            server_ip: "10.0.0.2".to_string(),
            ..Default::default()
        };
        assert_eq!(a.matching_key(), b.matching_key());
    }

    #[rstest(
        input,
        expected,
        case(
            "k8s/80/web/default/c1",
            Some(NamedKey {
                prefix: "k8s".to_string(),
                port: 80,
                service: "web".to_string(),
                namespace: "default".to_string(),
                cluster_id: "c1".to_string(),
            }),
        ),
        case("k8s/80/web/default", None),
        case("v2/80/web/default/c1", None),
        case("k8s/http/web/default/c1", None),
    )]
    fn works_named_key_parse(input: &str, expected: Option<NamedKey>) {
        let res = NamedKey::from_str(input);
        match expected {
            Some(key) => {
                let parsed = res.unwrap();
                assert_eq!(parsed, key);
                assert_eq!(parsed.to_string(), input);
            }
            None => assert!(res.is_err()),
        }
    }
}
