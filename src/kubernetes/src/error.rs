use cloudlb_trace::error::TraceableError;
use thiserror::Error;

use crate::model::load_balancer::AddressIpVersion;
use crate::provider;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Get Namespace Error")]
    GetNamespace,

    #[error("Kube Error: {0}")]
    Kube(#[source] kube::Error),

    #[error("SerializationError: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Cloud API error for {id}: {source}")]
    Provider {
        id: String,
        #[source]
        source: provider::error::Error,
    },

    #[error("Invalid backend label selector term {0}, expected k1=v1,k2=v2")]
    InvalidLabelSelector(String),

    #[error("Node name is not set for endpoint address {ip} of service {service}")]
    NodeNameMissing { service: String, ip: String },

    #[error("No network interface found for ip {ip} in vpc {vpc_id}")]
    InterfaceNotFound { ip: String, vpc_id: String },

    #[error("Invalid provider id {0}, expected <region-id>.<instance-id>")]
    InvalidProviderId(String),

    #[error("Invalid server group name {0}")]
    InvalidNamedKey(String),

    #[error("Cannot change load balancer {0} once created")]
    ImmutableAttribute(&'static str),

    #[error("Cannot change load balancer address ip version once created: {desired} != {observed}")]
    AddressIpVersionMismatch {
        desired: AddressIpVersion,
        observed: AddressIpVersion,
    },

    #[error("Bandwidth must be an integer, got {0}")]
    InvalidBandwidth(String),

    #[error("Failed to apply batch chunk {chunk}: {source}")]
    Batch {
        chunk: usize,
        source: Box<Error>,
    },

    #[error("Failed to get endpoints for service {service}: {source}")]
    Endpoints {
        service: String,
        #[source]
        source: kube::Error,
    },
}

impl TraceableError for &Error {
    fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }
}

impl TraceableError for Error {
    fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }
}
