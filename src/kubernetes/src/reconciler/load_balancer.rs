use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

use crate::config::{NetworkDefaults, ReconcileConfig};
use crate::context::RequestContext;
use crate::error::Error;
use crate::model::load_balancer::{
    AddressIpVersion, AddressType, ChargeType, Flag, LoadBalancer, MODIFICATION_PROTECTION_REASON,
};
use crate::provider::LoadBalancerOps;

pub const DEFAULT_LOAD_BALANCER_SPEC: &str = "lb.s1.small";

pub struct LoadBalancerManager<P> {
    cloud: Arc<P>,
}

impl<P> LoadBalancerManager<P>
where
    P: LoadBalancerOps + 'static,
{
    pub fn new(cloud: Arc<P>) -> LoadBalancerManager<P> {
        LoadBalancerManager { cloud }
    }

    /// Locate the remote load balancer for a service, either by the
    /// configured id or by the derived default name and tags.
    pub async fn find(&self, ctx: &RequestContext, mdl: &mut LoadBalancer) -> Result<(), Error> {
        if !ctx.config.load_balancer_id.is_empty() {
            mdl.attribute.load_balancer_id = ctx.config.load_balancer_id.clone();
        }
        // Safe to preset, the lookup overwrites the name on a match.
        mdl.attribute.load_balancer_name = default_load_balancer_name(&ctx.service);
        mdl.attribute.tags = ctx.config.default_tags.clone();
        self.cloud
            .find_load_balancer(mdl)
            .await
            .map_err(|e| Error::Provider {
                id: ctx.namespaced_name(),
                source: e,
            })
    }

    pub async fn create(&self, ctx: &RequestContext, local: &mut LoadBalancer) -> Result<(), Error> {
        apply_default_attributes(local, &ctx.service, &ctx.config, &ctx.network);
        self.cloud
            .create_load_balancer(local)
            .await
            .map_err(|e| Error::Provider {
                id: ctx.namespaced_name(),
                source: e,
            })?;

        let tags = serde_json::to_string(&local.attribute.tags).map_err(Error::Serialization)?;
        self.cloud
            .add_tags(&local.attribute.load_balancer_id, &tags)
            .await
            .map_err(|e| Error::Provider {
                id: local.attribute.load_balancer_id.clone(),
                source: e,
            })
    }

    pub async fn delete(&self, ctx: &RequestContext, remote: &LoadBalancer) -> Result<(), Error> {
        let lb_id = remote.attribute.load_balancer_id.clone();
        if lb_id.is_empty() {
            return Ok(());
        }

        // Delete protection has to come off before the delete call.
        if remote.attribute.delete_protection == Some(Flag::On) {
            self.cloud
                .set_delete_protection(&lb_id, Flag::Off)
                .await
                .map_err(|e| Error::Provider {
                    id: lb_id.clone(),
                    source: e,
                })?;
        }

        tracing::info!(
            lb_id = lb_id,
            service = ctx.namespaced_name(),
            "Delete load balancer"
        );
        self.cloud
            .delete_load_balancer(&lb_id)
            .await
            .map_err(|e| Error::Provider {
                id: lb_id.clone(),
                source: e,
            })
    }

    /// Converge observed attributes onto desired ones. Issues at most one
    /// mutating call per invocation, in fixed priority order; callers
    /// re-invoke until no condition remains unmet.
    pub async fn update(
        &self,
        local: &LoadBalancer,
        remote: &LoadBalancer,
    ) -> Result<(), Error> {
        let lb_id = remote.attribute.load_balancer_id.clone();
        tracing::info!(lb_id = lb_id, "Try to update load balancer attributes");
        let l = &local.attribute;
        let r = &remote.attribute;

        // Fixed at creation time.
        if !l.master_zone_id.is_empty() && l.master_zone_id != r.master_zone_id {
            return Err(Error::ImmutableAttribute("master zone id"));
        }
        if !l.slave_zone_id.is_empty() && l.slave_zone_id != r.slave_zone_id {
            return Err(Error::ImmutableAttribute("slave zone id"));
        }
        if l.address_type.is_some() && l.address_type != r.address_type {
            return Err(Error::ImmutableAttribute("address type"));
        }
        if !equal_ip_version(l.address_ip_version, r.address_ip_version) {
            return Err(Error::AddressIpVersionMismatch {
                desired: l.address_ip_version.unwrap_or_default(),
                observed: r.address_ip_version.unwrap_or_default(),
            });
        }
        if !l.resource_group_id.is_empty() && l.resource_group_id != r.resource_group_id {
            return Err(Error::ImmutableAttribute("resource group id"));
        }

        // Charge type and bandwidth go out as one internet spec update.
        let mut need_update = false;
        let mut charge = r.charge_type.unwrap_or_default();
        let mut bandwidth = r.bandwidth;
        if let Some(desired_charge) = l.charge_type {
            if Some(desired_charge) != r.charge_type {
                need_update = true;
                charge = desired_charge;
                tracing::info!(
                    lb_id = lb_id,
                    observed = %r.charge_type.unwrap_or_default(),
                    desired = %desired_charge,
                    "Internet charge type changed"
                );
            }
        }
        if l.bandwidth != 0
            && l.bandwidth != r.bandwidth
            && l.charge_type == Some(ChargeType::PayByBandwidth)
        {
            need_update = true;
            bandwidth = l.bandwidth;
            tracing::info!(
                lb_id = lb_id,
                observed = r.bandwidth,
                desired = l.bandwidth,
                "Bandwidth changed"
            );
        }
        if need_update {
            if r.address_type == Some(AddressType::Internet) {
                return self
                    .cloud
                    .modify_internet_spec(&lb_id, charge, bandwidth)
                    .await
                    .map_err(|e| Error::Provider {
                        id: lb_id.clone(),
                        source: e,
                    });
            }
            tracing::warn!(
                lb_id = lb_id,
                "Only internet-facing load balancers can change bandwidth and charge type"
            );
        }

        if !l.spec.is_empty() && l.spec != r.spec {
            tracing::info!(
                lb_id = lb_id,
                observed = r.spec,
                desired = l.spec,
                "Load balancer spec changed"
            );
            return self
                .cloud
                .modify_instance_spec(&lb_id, &l.spec)
                .await
                .map_err(|e| Error::Provider {
                    id: lb_id.clone(),
                    source: e,
                });
        }

        if let Some(flag) = l.delete_protection {
            if Some(flag) != r.delete_protection {
                tracing::info!(lb_id = lb_id, desired = %flag, "Delete protection changed");
                return self
                    .cloud
                    .set_delete_protection(&lb_id, flag)
                    .await
                    .map_err(|e| Error::Provider {
                        id: lb_id.clone(),
                        source: e,
                    });
            }
        }

        if let Some(flag) = l.modification_protection {
            if Some(flag) != r.modification_protection {
                let reason = if l.modification_protection_reason.is_empty() {
                    MODIFICATION_PROTECTION_REASON
                } else {
                    l.modification_protection_reason.as_str()
                };
                tracing::info!(lb_id = lb_id, desired = %flag, "Modification protection changed");
                return self
                    .cloud
                    .set_modification_protection(&lb_id, flag, reason)
                    .await
                    .map_err(|e| Error::Provider {
                        id: lb_id.clone(),
                        source: e,
                    });
            }
        }

        // Renames apply to every managed load balancer.
        if !l.load_balancer_name.is_empty() && l.load_balancer_name != r.load_balancer_name {
            tracing::info!(
                lb_id = lb_id,
                observed = r.load_balancer_name,
                desired = l.load_balancer_name,
                "Load balancer name changed"
            );
            return self
                .cloud
                .set_name(&lb_id, &l.load_balancer_name)
                .await
                .map_err(|e| Error::Provider {
                    id: lb_id.clone(),
                    source: e,
                });
        }

        Ok(())
    }

    /// Build the desired attribute set from the resolved configuration.
    pub fn build_local_model(
        &self,
        ctx: &RequestContext,
        mdl: &mut LoadBalancer,
    ) -> Result<(), Error> {
        let cfg = &ctx.config;
        let attr = &mut mdl.attribute;
        mdl.namespaced_name = ctx.namespaced_name();

        attr.address_type = cfg.address_type;
        attr.charge_type = cfg.charge_type;
        if !cfg.bandwidth.is_empty() {
            match cfg.bandwidth.parse::<i32>() {
                Ok(bandwidth) => attr.bandwidth = bandwidth,
                Err(_) => {
                    if cfg.charge_type == Some(ChargeType::PayByBandwidth) {
                        return Err(Error::InvalidBandwidth(cfg.bandwidth.clone()));
                    }
                }
            }
        }
        if !cfg.load_balancer_id.is_empty() {
            attr.load_balancer_id = cfg.load_balancer_id.clone();
            attr.user_managed = true;
        }
        attr.load_balancer_name = cfg.load_balancer_name.clone();
        attr.vswitch_id = cfg.vswitch_id.clone();
        attr.master_zone_id = cfg.master_zone_id.clone();
        attr.slave_zone_id = cfg.slave_zone_id.clone();
        attr.spec = cfg.spec.clone();
        attr.resource_group_id = cfg.resource_group_id.clone();
        attr.address_ip_version = cfg.address_ip_version;
        attr.delete_protection = cfg.delete_protection;
        attr.modification_protection = cfg.modification_protection;
        Ok(())
    }

    /// Fetch the observed attribute set from the cloud API.
    pub async fn build_remote_model(
        &self,
        ctx: &RequestContext,
        mdl: &mut LoadBalancer,
    ) -> Result<(), Error> {
        mdl.namespaced_name = ctx.namespaced_name();
        self.find(ctx, mdl).await
    }
}

/// Blank versions default to ipv4 on both sides before comparison.
fn equal_ip_version(local: Option<AddressIpVersion>, remote: Option<AddressIpVersion>) -> bool {
    local.unwrap_or_default() == remote.unwrap_or_default()
}

pub fn default_load_balancer_name(svc: &Service) -> String {
    let uid = svc.uid().unwrap_or_default().replace('-', "");
    let mut name = format!("a{uid}");
    name.truncate(32);
    name
}

/// Fill unspecified desired attributes before creation. Cluster network
/// identity comes in as an explicit parameter.
pub fn apply_default_attributes(
    mdl: &mut LoadBalancer,
    svc: &Service,
    config: &ReconcileConfig,
    network: &NetworkDefaults,
) {
    let attr = &mut mdl.attribute;
    if attr.address_type.is_none() {
        attr.address_type = Some(AddressType::default());
    }
    if attr.load_balancer_name.is_empty() {
        attr.load_balancer_name = default_load_balancer_name(svc);
    }
    if attr.address_type == Some(AddressType::Intranet) {
        attr.vpc_id = network.vpc_id.clone();
        if attr.vswitch_id.is_empty() {
            attr.vswitch_id = network.vswitch_id.clone();
        }
    }
    if attr.spec.is_empty() {
        attr.spec = DEFAULT_LOAD_BALANCER_SPEC.to_string();
    }
    if attr.delete_protection.is_none() {
        attr.delete_protection = Some(Flag::On);
    }
    if attr.modification_protection.is_none() {
        attr.modification_protection = Some(Flag::On);
        attr.modification_protection_reason = MODIFICATION_PROTECTION_REASON.to_string();
    }
    attr.tags.extend(config.default_tags.iter().cloned());
}
