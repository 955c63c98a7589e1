use serde::{Deserialize, Serialize};

use crate::model::server_group::ServerGroup;

/// Reason attached to a load balancer when modification protection is
/// enabled with a defaulted configuration.
pub const MODIFICATION_PROTECTION_REASON: &str = "managed.by.cloudlb";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Internet,
    Intranet,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internet => write!(f, "internet"),
            Self::Intranet => write!(f, "intranet"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressIpVersion {
    #[default]
    IPv4,
    IPv6,
}

impl std::fmt::Display for AddressIpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IPv4 => write!(f, "ipv4"),
            Self::IPv6 => write!(f, "ipv6"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeType {
    #[default]
    PayByTraffic,
    PayByBandwidth,
}

impl std::fmt::Display for ChargeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PayByTraffic => write!(f, "paybytraffic"),
            Self::PayByBandwidth => write!(f, "paybybandwidth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    On,
    Off,
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Scalar attributes of one remote load balancer.
///
/// Optional enum fields distinguish "not specified" from an explicit value.
/// Identifier fields use the empty string for "not specified", matching the
/// cloud API convention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerAttribute {
    pub load_balancer_id: String,
    pub load_balancer_name: String,
    pub address_type: Option<AddressType>,
    pub address_ip_version: Option<AddressIpVersion>,
    pub charge_type: Option<ChargeType>,
    pub bandwidth: i32,
    pub spec: String,
    pub master_zone_id: String,
    pub slave_zone_id: String,
    pub vpc_id: String,
    pub vswitch_id: String,
    pub resource_group_id: String,
    pub delete_protection: Option<Flag>,
    pub modification_protection: Option<Flag>,
    pub modification_protection_reason: String,
    pub tags: Vec<Tag>,
    pub user_managed: bool,
}

/// One load balancer as seen from one side of a reconciliation pass.
///
/// A pass builds two instances, one desired and one observed, and never
/// merges them in place.
#[derive(Debug, Clone, Default)]
pub struct LoadBalancer {
    pub namespaced_name: String,
    pub attribute: LoadBalancerAttribute,
    pub server_groups: Vec<ServerGroup>,
}
