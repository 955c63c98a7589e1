use std::collections::HashMap;

use crate::error::Error;
use crate::model::server_group::{BackendAttribute, BackendKind};
use crate::provider::NetworkInterfaceOps;

/// Resolve a set of private ips to their network interface ids through the
/// paginated lookup, following continuation tokens until exhausted.
///
/// Every page is an await point, so cancelling the caller's future aborts
/// the resolution between pages.
pub async fn resolve_interfaces<P>(
    cloud: &P,
    vpc_id: &str,
    ips: &[String],
) -> Result<HashMap<String, String>, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    let mut resolved: HashMap<String, String> = HashMap::new();
    let mut next_token: Option<String> = None;
    loop {
        let page = cloud
            .describe_network_interfaces(vpc_id, ips, next_token.as_deref())
            .await
            .map_err(|e| Error::Provider {
                id: vpc_id.to_string(),
                source: e,
            })?;
        resolved.extend(page.interfaces);
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }
    Ok(resolved)
}

/// Rewrite a backend list as interface backends, attaching the resolved
/// interface id of each source ip. An unresolved ip is fatal, silently
/// dropping it would blackhole that address.
///
/// The port stays at the endpoint target port; interface backends receive
/// traffic on the pod address itself.
pub async fn attach_interface_ids<P>(
    cloud: &P,
    vpc_id: &str,
    backends: Vec<BackendAttribute>,
) -> Result<Vec<BackendAttribute>, Error>
where
    P: NetworkInterfaceOps + ?Sized,
{
    if backends.is_empty() {
        return Ok(backends);
    }
    let ips: Vec<String> = backends.iter().map(|b| b.server_ip.clone()).collect();
    let resolved = resolve_interfaces(cloud, vpc_id, &ips).await?;

    backends
        .into_iter()
        .map(|mut backend| match resolved.get(&backend.server_ip) {
            Some(interface_id) => {
                backend.server_id = interface_id.clone();
                backend.kind = BackendKind::Interface;
                Ok(backend)
            }
            None => Err(Error::InterfaceNotFound {
                ip: backend.server_ip.clone(),
                vpc_id: vpc_id.to_string(),
            }),
        })
        .collect()
}
