use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use cloudlb_kubernetes::model::load_balancer::{
    ChargeType, Flag, LoadBalancer, LoadBalancerAttribute,
};
use cloudlb_kubernetes::model::server_group::ServerGroup;
use cloudlb_kubernetes::provider::error::Error;
use cloudlb_kubernetes::provider::{
    InterfacePage, LoadBalancerOps, NetworkInterfaceOps, ServerGroupOps,
};

/// One recorded mutating call against the mock cloud.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudCall {
    CreateLoadBalancer {
        name: String,
    },
    DeleteLoadBalancer {
        lb_id: String,
    },
    AddTags {
        lb_id: String,
        tags: String,
    },
    ModifyInternetSpec {
        lb_id: String,
        charge_type: ChargeType,
        bandwidth: i32,
    },
    ModifyInstanceSpec {
        lb_id: String,
        spec: String,
    },
    SetDeleteProtection {
        lb_id: String,
        flag: Flag,
    },
    SetModificationProtection {
        lb_id: String,
        flag: Flag,
        reason: String,
    },
    SetName {
        lb_id: String,
        name: String,
    },
    CreateServerGroup {
        lb_id: String,
        group_name: String,
    },
    DeleteServerGroup {
        group_id: String,
    },
    AddBackends {
        group_id: String,
        backends: String,
    },
    RemoveBackends {
        group_id: String,
        backends: String,
    },
    SetBackendWeights {
        group_id: String,
        backends: String,
    },
}

#[derive(Debug, Default)]
struct Inner {
    remote: Option<LoadBalancerAttribute>,
    server_groups: Vec<ServerGroup>,
    interface_pages: VecDeque<InterfacePage>,
    interface_lookups: usize,
    calls: Vec<CloudCall>,
    created_groups: usize,
    add_backends_calls: usize,
    fail_add_backends_on: Option<usize>,
}

/// In-memory stand-in for the cloud API. Serves canned state and records
/// every mutating call in order so tests can assert on exact sequences.
#[derive(Debug, Default)]
pub struct MockCloud {
    inner: Mutex<Inner>,
}

impl MockCloud {
    /// Seed the observed load balancer returned by the find operation.
    pub fn set_remote(&self, attribute: LoadBalancerAttribute) {
        self.inner.lock().unwrap().remote = Some(attribute);
    }

    /// Seed the observed server groups.
    pub fn set_server_groups(&self, groups: Vec<ServerGroup>) {
        self.inner.lock().unwrap().server_groups = groups;
    }

    /// Queue one page for the network interface lookup. Pages are served
    /// in queue order, one per call.
    pub fn queue_interface_page(&self, page: InterfacePage) {
        self.inner.lock().unwrap().interface_pages.push_back(page);
    }

    /// Fail the nth add-backends call, counted from one.
    pub fn fail_add_backends_on(&self, nth: usize) {
        self.inner.lock().unwrap().fail_add_backends_on = Some(nth);
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn interface_lookups(&self) -> usize {
        self.inner.lock().unwrap().interface_lookups
    }
}

#[async_trait]
impl LoadBalancerOps for MockCloud {
    async fn find_load_balancer(&self, mdl: &mut LoadBalancer) -> Result<(), Error> {
        let inner = self.inner.lock().unwrap();
        if let Some(remote) = &inner.remote {
            mdl.attribute = remote.clone();
        }
        Ok(())
    }

    async fn create_load_balancer(&self, mdl: &mut LoadBalancer) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        mdl.attribute.load_balancer_id = "lb-mock-0001".to_string();
        inner.remote = Some(mdl.attribute.clone());
        inner.calls.push(CloudCall::CreateLoadBalancer {
            name: mdl.attribute.load_balancer_name.clone(),
        });
        Ok(())
    }

    async fn delete_load_balancer(&self, lb_id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.remote = None;
        inner.calls.push(CloudCall::DeleteLoadBalancer {
            lb_id: lb_id.to_string(),
        });
        Ok(())
    }

    async fn add_tags(&self, lb_id: &str, tags: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().calls.push(CloudCall::AddTags {
            lb_id: lb_id.to_string(),
            tags: tags.to_string(),
        });
        Ok(())
    }

    async fn modify_internet_spec(
        &self,
        lb_id: &str,
        charge_type: ChargeType,
        bandwidth: i32,
    ) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::ModifyInternetSpec {
                lb_id: lb_id.to_string(),
                charge_type,
                bandwidth,
            });
        Ok(())
    }

    async fn modify_instance_spec(&self, lb_id: &str, spec: &str) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::ModifyInstanceSpec {
                lb_id: lb_id.to_string(),
                spec: spec.to_string(),
            });
        Ok(())
    }

    async fn set_delete_protection(&self, lb_id: &str, flag: Flag) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::SetDeleteProtection {
                lb_id: lb_id.to_string(),
                flag,
            });
        Ok(())
    }

    async fn set_modification_protection(
        &self,
        lb_id: &str,
        flag: Flag,
        reason: &str,
    ) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::SetModificationProtection {
                lb_id: lb_id.to_string(),
                flag,
                reason: reason.to_string(),
            });
        Ok(())
    }

    async fn set_name(&self, lb_id: &str, name: &str) -> Result<(), Error> {
        self.inner.lock().unwrap().calls.push(CloudCall::SetName {
            lb_id: lb_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ServerGroupOps for MockCloud {
    async fn describe_server_groups(&self, _lb_id: &str) -> Result<Vec<ServerGroup>, Error> {
        Ok(self.inner.lock().unwrap().server_groups.clone())
    }

    async fn create_server_group(
        &self,
        group: &mut ServerGroup,
        lb_id: &str,
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.created_groups += 1;
        group.group_id = format!("sg-mock-{:04}", inner.created_groups);
        inner.server_groups.push(group.clone());
        inner.calls.push(CloudCall::CreateServerGroup {
            lb_id: lb_id.to_string(),
            group_name: group.group_name.clone(),
        });
        Ok(())
    }

    async fn delete_server_group(&self, group_id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.server_groups.retain(|g| g.group_id != group_id);
        inner.calls.push(CloudCall::DeleteServerGroup {
            group_id: group_id.to_string(),
        });
        Ok(())
    }

    async fn add_backends(&self, group_id: &str, backends: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.add_backends_calls += 1;
        if inner.fail_add_backends_on == Some(inner.add_backends_calls) {
            return Err(Error::Api(format!(
                "add backends rejected for group {group_id}"
            )));
        }
        inner.calls.push(CloudCall::AddBackends {
            group_id: group_id.to_string(),
            backends: backends.to_string(),
        });
        Ok(())
    }

    async fn remove_backends(&self, group_id: &str, backends: &str) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::RemoveBackends {
                group_id: group_id.to_string(),
                backends: backends.to_string(),
            });
        Ok(())
    }

    async fn set_backend_weights(&self, group_id: &str, backends: &str) -> Result<(), Error> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(CloudCall::SetBackendWeights {
                group_id: group_id.to_string(),
                backends: backends.to_string(),
            });
        Ok(())
    }
}

#[async_trait]
impl NetworkInterfaceOps for MockCloud {
    async fn describe_network_interfaces(
        &self,
        _vpc_id: &str,
        _ips: &[String],
        _next_token: Option<&str>,
    ) -> Result<InterfacePage, Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.interface_lookups += 1;
        Ok(inner.interface_pages.pop_front().unwrap_or_default())
    }
}
