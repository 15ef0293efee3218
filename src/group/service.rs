//! Group capability trait and its RPC bindings.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::group::types::*;
use crate::rpc::{Dispatcher, MethodError};

/// Service name used as the method prefix.
pub const SERVICE: &str = "Group";

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group not found: {0}")]
    NotFound(GroupId),

    #[error("invalid group spec: {0}")]
    InvalidSpec(String),

    #[error("{0}")]
    Backend(String),
}

/// A group management implementation hosted by the plugin server.
#[async_trait]
pub trait GroupPlugin: Send + Sync {
    /// Create or update a group. With `pretend`, report what would change without changing it.
    async fn commit_group(&self, spec: GroupSpec, pretend: bool) -> Result<String, GroupError>;

    /// Stop managing a group, leaving its instances in place.
    async fn free_group(&self, id: &GroupId) -> Result<(), GroupError>;

    async fn describe_group(&self, id: &GroupId) -> Result<GroupDescription, GroupError>;

    /// Remove a group and its instances.
    async fn destroy_group(&self, id: &GroupId) -> Result<(), GroupError>;

    async fn inspect_groups(&self) -> Result<Vec<GroupSpec>, GroupError>;
}

fn method_name(method: &str) -> String {
    format!("{}.{}", SERVICE, method)
}

/// Register the five `Group.*` methods backed by `plugin`.
pub fn register(dispatcher: &mut Dispatcher, plugin: Arc<dyn GroupPlugin>) {
    let p = plugin.clone();
    dispatcher.register(method_name("CommitGroup"), move |req: CommitGroupRequest| {
        let p = p.clone();
        async move {
            let details = p.commit_group(req.spec, req.pretend).await.map_err(MethodError::plugin)?;
            Ok::<_, MethodError>(CommitGroupResponse { details })
        }
    });

    let p = plugin.clone();
    dispatcher.register(method_name("FreeGroup"), move |req: FreeGroupRequest| {
        let p = p.clone();
        async move {
            p.free_group(&req.id).await.map_err(MethodError::plugin)?;
            Ok::<_, MethodError>(FreeGroupResponse { ok: true })
        }
    });

    let p = plugin.clone();
    dispatcher.register(method_name("DescribeGroup"), move |req: DescribeGroupRequest| {
        let p = p.clone();
        async move {
            let description = p.describe_group(&req.id).await.map_err(MethodError::plugin)?;
            Ok::<_, MethodError>(DescribeGroupResponse { description })
        }
    });

    let p = plugin.clone();
    dispatcher.register(method_name("DestroyGroup"), move |req: DestroyGroupRequest| {
        let p = p.clone();
        async move {
            p.destroy_group(&req.id).await.map_err(MethodError::plugin)?;
            Ok::<_, MethodError>(DestroyGroupResponse { ok: true })
        }
    });

    let p = plugin;
    dispatcher.register(method_name("InspectGroups"), move |_req: InspectGroupsRequest| {
        let p = p.clone();
        async move {
            let groups = p.inspect_groups().await.map_err(MethodError::plugin)?;
            Ok::<_, MethodError>(InspectGroupsResponse { groups })
        }
    });
}
