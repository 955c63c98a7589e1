use serde::{Deserialize, Serialize};

use crate::model::load_balancer::{AddressIpVersion, AddressType, ChargeType, Flag, Tag};

/// Desired load balancer values resolved from service metadata by the
/// owning controller. Empty strings and None mean "not specified".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub load_balancer_id: String,
    pub load_balancer_name: String,
    pub address_type: Option<AddressType>,
    pub address_ip_version: Option<AddressIpVersion>,
    pub charge_type: Option<ChargeType>,
    /// Raw bandwidth value. Parsed as an integer when the charge type
    /// requires it.
    pub bandwidth: String,
    pub spec: String,
    pub master_zone_id: String,
    pub slave_zone_id: String,
    pub vswitch_id: String,
    pub resource_group_id: String,
    pub delete_protection: Option<Flag>,
    pub modification_protection: Option<Flag>,
    /// Comma separated k=v terms selecting backend nodes, ANDed.
    pub backend_label: String,
    pub remove_unscheduled: Option<Flag>,
    /// Steer traffic directly to pod network interfaces instead of nodes.
    pub interface_direct: bool,
    pub default_tags: Vec<Tag>,
}

/// Cluster-level network identity, passed explicitly to the defaulting
/// routine and the interface resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDefaults {
    pub vpc_id: String,
    pub vswitch_id: String,
}
