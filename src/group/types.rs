//! Group domain types and per-method request/response shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Desired state of a group. `properties` is opaque to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(rename = "ID")]
    pub id: GroupId,
    #[serde(rename = "Properties", default)]
    pub properties: Option<Value>,
}

/// One member instance of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDescription {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "LogicalID", default)]
    pub logical_id: Option<String>,
    #[serde(rename = "Tags", default)]
    pub tags: BTreeMap<String, String>,
}

/// Observed state of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDescription {
    #[serde(rename = "Instances", default)]
    pub instances: Vec<InstanceDescription>,
    #[serde(rename = "Converged", default)]
    pub converged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitGroupRequest {
    #[serde(rename = "Spec")]
    pub spec: GroupSpec,
    #[serde(rename = "Pretend", default)]
    pub pretend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitGroupResponse {
    #[serde(rename = "Details")]
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeGroupRequest {
    #[serde(rename = "ID")]
    pub id: GroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeGroupResponse {
    #[serde(rename = "OK")]
    pub ok: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeGroupRequest {
    #[serde(rename = "ID")]
    pub id: GroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeGroupResponse {
    #[serde(rename = "Description")]
    pub description: GroupDescription,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyGroupRequest {
    #[serde(rename = "ID")]
    pub id: GroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyGroupResponse {
    #[serde(rename = "OK")]
    pub ok: bool,
}

/// The ID is accepted for compatibility and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectGroupsRequest {
    #[serde(rename = "ID", default)]
    pub id: GroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectGroupsResponse {
    #[serde(rename = "Groups", default)]
    pub groups: Vec<GroupSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commit_request_uses_wire_names() {
        let request: CommitGroupRequest = serde_json::from_value(json!({
            "Spec": {"ID": "workers", "Properties": {"Size": 2}},
            "Pretend": true
        }))
        .unwrap();

        assert_eq!(request.spec.id, GroupId::from("workers"));
        assert_eq!(request.spec.properties, Some(json!({"Size": 2})));
        assert!(request.pretend);
    }

    #[test]
    fn pretend_defaults_to_false() {
        let request: CommitGroupRequest =
            serde_json::from_value(json!({"Spec": {"ID": "workers"}})).unwrap();
        assert!(!request.pretend);
        assert_eq!(request.spec.properties, None);
    }

    #[test]
    fn ok_flag_serializes_upper_case() {
        let encoded = serde_json::to_value(FreeGroupResponse { ok: true }).unwrap();
        assert_eq!(encoded, json!({"OK": true}));
    }
}
