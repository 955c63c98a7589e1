use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::load_balancer::{ChargeType, Flag, LoadBalancer};
use crate::model::server_group::ServerGroup;

pub mod error;

use error::Error;

/// One page of a network interface lookup.
#[derive(Debug, Clone, Default)]
pub struct InterfacePage {
    /// Resolved private ip to interface id mapping for this page.
    pub interfaces: HashMap<String, String>,
    /// Continuation token. None or empty means the lookup is complete.
    pub next_token: Option<String>,
}

/// Load balancer lifecycle and attribute operations.
#[async_trait]
pub trait LoadBalancerOps: Send + Sync {
    async fn find_load_balancer(&self, mdl: &mut LoadBalancer) -> Result<(), Error>;
    async fn create_load_balancer(&self, mdl: &mut LoadBalancer) -> Result<(), Error>;
    async fn delete_load_balancer(&self, lb_id: &str) -> Result<(), Error>;
    async fn add_tags(&self, lb_id: &str, tags: &str) -> Result<(), Error>;
    async fn modify_internet_spec(
        &self,
        lb_id: &str,
        charge_type: ChargeType,
        bandwidth: i32,
    ) -> Result<(), Error>;
    async fn modify_instance_spec(&self, lb_id: &str, spec: &str) -> Result<(), Error>;
    async fn set_delete_protection(&self, lb_id: &str, flag: Flag) -> Result<(), Error>;
    async fn set_modification_protection(
        &self,
        lb_id: &str,
        flag: Flag,
        reason: &str,
    ) -> Result<(), Error>;
    async fn set_name(&self, lb_id: &str, name: &str) -> Result<(), Error>;
}

/// Server group lifecycle and backend membership operations.
///
/// Backend batches are serialized as an ordered json list. Each mutating
/// call is all-or-nothing; no partial-batch result is reported back.
#[async_trait]
pub trait ServerGroupOps: Send + Sync {
    async fn describe_server_groups(&self, lb_id: &str) -> Result<Vec<ServerGroup>, Error>;
    async fn create_server_group(&self, group: &mut ServerGroup, lb_id: &str)
        -> Result<(), Error>;
    async fn delete_server_group(&self, group_id: &str) -> Result<(), Error>;
    async fn add_backends(&self, group_id: &str, backends: &str) -> Result<(), Error>;
    async fn remove_backends(&self, group_id: &str, backends: &str) -> Result<(), Error>;
    async fn set_backend_weights(&self, group_id: &str, backends: &str) -> Result<(), Error>;
}

/// Paginated virtual network interface lookup.
#[async_trait]
pub trait NetworkInterfaceOps: Send + Sync {
    async fn describe_network_interfaces(
        &self,
        vpc_id: &str,
        ips: &[String],
        next_token: Option<&str>,
    ) -> Result<InterfacePage, Error>;
}
