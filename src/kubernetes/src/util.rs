use std::future::Future;

use kube::{Resource, ResourceExt};

use crate::error::Error;

pub fn get_namespace<T: Resource<DynamicType = ()>>(resource: &T) -> Result<String, Error> {
    resource.namespace().ok_or(Error::GetNamespace)
}

pub fn get_namespaced_name<T: Resource<DynamicType = ()>>(resource: &T) -> String {
    match resource.namespace() {
        Some(ns) => format!("{ns}/{}", resource.name_any()),
        None => resource.name_any(),
    }
}

/// Split a node provider id of the form `<region-id>.<instance-id>` into
/// its parts. A leading `<scheme>://` prefix is tolerated.
pub fn instance_from_provider_id(provider_id: &str) -> Result<(String, String), Error> {
    let id = match provider_id.split_once("://") {
        Some((_, rest)) => rest,
        None => provider_id,
    };
    match id.split_once('.') {
        Some((region, instance)) if !region.is_empty() && !instance.is_empty() => {
            Ok((region.to_string(), instance.to_string()))
        }
        _ => Err(Error::InvalidProviderId(provider_id.to_string())),
    }
}

/// Apply `items` through `apply` in ordered chunks of at most `max`
/// entries, sequentially. The first failing chunk aborts the dispatch;
/// later chunks are never submitted. Chunks already applied are left as
/// they are, the next pass's diff targets only the unapplied remainder.
pub async fn apply_batched<T, F, Fut>(items: &[T], max: usize, mut apply: F) -> Result<(), Error>
where
    T: Clone,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    if items.is_empty() {
        return Ok(());
    }
    let max = max.max(1);
    for (idx, batch) in items.chunks(max).enumerate() {
        apply(batch.to_vec()).await.map_err(|e| Error::Batch {
            chunk: idx + 1,
            source: Box::new(e),
        })?;
    }
    Ok(())
}
