use k8s_openapi::api::core::v1::{Service, ServicePort};

use crate::config::{NetworkDefaults, ReconcileConfig};
use crate::util::get_namespaced_name;

/// Everything one reconciliation pass needs about its service.
///
/// Built fresh by the owning controller for every pass; holds no state of
/// its own and is never shared between services.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub service: Service,
    pub config: ReconcileConfig,
    pub cluster_id: String,
    pub network: NetworkDefaults,
}

impl RequestContext {
    pub fn new(
        service: Service,
        config: ReconcileConfig,
        cluster_id: String,
        network: NetworkDefaults,
    ) -> RequestContext {
        RequestContext {
            service,
            config,
            cluster_id,
            network,
        }
    }

    pub fn namespaced_name(&self) -> String {
        get_namespaced_name(&self.service)
    }

    pub fn ports(&self) -> Vec<ServicePort> {
        self.service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.clone())
            .unwrap_or_default()
    }
}
