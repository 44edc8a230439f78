// OpenSearch Serverless data access and network policies.
//
// Policy bodies are typed records; they become the JSON string the service
// expects only when written into the template.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SynthResult;
use crate::expr::Expr;
use crate::template::Resource;
use crate::types::{
    ACCESS_POLICY_LOGICAL_ID, NETWORK_POLICY_LOGICAL_ID, TYPE_ACCESS_POLICY, TYPE_SECURITY_POLICY,
};

use super::collection::Collection;
use super::compute::ExecutionIdentity;
use super::StackContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AossResourceType {
    Index,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataAccessRule {
    pub resource_type: AossResourceType,
    pub resource: Vec<String>,
    pub permission: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataAccessStatement {
    pub rules: Vec<DataAccessRule>,
    pub principal: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkRule {
    pub resource_type: AossResourceType,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkStatement {
    pub rules: Vec<NetworkRule>,
    #[serde(default)]
    pub allow_from_public: bool,
}

impl NetworkStatement {
    /// Whether a collection rule of this statement matches `collection/<name>`.
    pub fn covers_collection(&self, name: &str) -> bool {
        let target = format!("collection/{name}");
        self.rules
            .iter()
            .filter(|r| r.resource_type == AossResourceType::Collection)
            .flat_map(|r| r.resource.iter())
            .any(|pattern| pattern_matches(pattern, &target))
    }
}

/// Resource patterns match exactly, or by prefix when they end in `*`.
pub fn pattern_matches(pattern: &str, target: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => target.starts_with(prefix),
        None => pattern == target,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub logical_id: String,
    pub name: String,
    pub statements: Vec<DataAccessStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPolicy {
    pub logical_id: String,
    pub name: String,
    pub statements: Vec<NetworkStatement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyProperties<'a> {
    name: &'a str,
    #[serde(rename = "Type")]
    kind: &'static str,
    policy: Expr,
}

impl AccessPolicy {
    pub fn principals(&self) -> impl Iterator<Item = &Expr> {
        self.statements.iter().flat_map(|s| s.principal.iter())
    }

    pub fn document(&self) -> SynthResult<Expr> {
        Ok(Expr::json_document(&self.statements)?)
    }
}

impl NetworkPolicy {
    pub fn allows_public(&self) -> bool {
        self.statements.iter().any(|s| s.allow_from_public)
    }

    pub fn document(&self) -> SynthResult<Expr> {
        Ok(Expr::json_document(&self.statements)?)
    }
}

/// Grants `identity` every action on the collection's indexes.
pub fn declare_access_policy(
    ctx: &mut StackContext,
    name: String,
    collection: &Collection,
    identity: &ExecutionIdentity,
) -> SynthResult<AccessPolicy> {
    let policy = AccessPolicy {
        logical_id: ACCESS_POLICY_LOGICAL_ID.to_string(),
        name,
        statements: vec![DataAccessStatement {
            rules: vec![DataAccessRule {
                resource_type: AossResourceType::Index,
                resource: vec![collection.index_pattern()],
                permission: vec!["aoss:*".to_string()],
            }],
            principal: vec![identity.arn()],
        }],
    };
    let properties = PolicyProperties {
        name: &policy.name,
        kind: "data",
        policy: policy.document()?,
    };
    ctx.add_resource(&policy.logical_id, Resource::new(TYPE_ACCESS_POLICY, &properties)?);
    debug!(name = %policy.name, "data access policy declared");
    Ok(policy)
}

/// Opens the collection to public network access. Serverless collections
/// are unreachable without a network policy, so this is always declared.
pub fn declare_network_policy(
    ctx: &mut StackContext,
    name: String,
    collection: &Collection,
) -> SynthResult<NetworkPolicy> {
    let policy = NetworkPolicy {
        logical_id: NETWORK_POLICY_LOGICAL_ID.to_string(),
        name,
        statements: vec![NetworkStatement {
            rules: vec![NetworkRule {
                resource_type: AossResourceType::Collection,
                resource: vec![collection.collection_pattern()],
            }],
            allow_from_public: true,
        }],
    };
    let properties = PolicyProperties {
        name: &policy.name,
        kind: "network",
        policy: policy.document()?,
    };
    ctx.add_resource(&policy.logical_id, Resource::new(TYPE_SECURITY_POLICY, &properties)?);
    debug!(name = %policy.name, "network policy declared");
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::stack::collection;
    use serde_json::json;

    fn identity() -> ExecutionIdentity {
        ExecutionIdentity {
            role_logical_id: "Role".to_string(),
            default_policy_logical_id: "RolePolicy".to_string(),
        }
    }

    #[test]
    fn test_access_policy_principal_is_identity() {
        let mut ctx = StackContext::new("test");
        let collection = collection::declare(&mut ctx, &CollectionConfig::default()).unwrap();
        let policy =
            declare_access_policy(&mut ctx, "p".to_string(), &collection, &identity()).unwrap();
        let principals: Vec<_> = policy.principals().collect();
        assert_eq!(principals, vec![&identity().arn()]);

        let template = ctx.into_template();
        let resource = template.resource(ACCESS_POLICY_LOGICAL_ID).unwrap();
        assert_eq!(resource.property("Type"), Some(&json!("data")));
        let rendered = resource.property("Policy").unwrap();
        assert!(Expr::is_intrinsic(rendered));
        assert_eq!(Expr::from_value(rendered).unwrap().references(), vec!["Role"]);
    }

    #[test]
    fn test_collection_patterns() {
        assert!(pattern_matches("collection/video-similarity*", "collection/video-similarity"));
        assert!(pattern_matches("collection/video-similarity", "collection/video-similarity"));
        assert!(!pattern_matches(
            "collection/video-similarity-archive",
            "collection/video-similarity"
        ));
        assert!(!pattern_matches("collection/other*", "collection/video-similarity"));
    }

    #[test]
    fn test_network_policy_document_is_literal_json() {
        let mut ctx = StackContext::new("test");
        let collection = collection::declare(&mut ctx, &CollectionConfig::default()).unwrap();
        let policy = declare_network_policy(&mut ctx, "n".to_string(), &collection).unwrap();
        assert!(policy.allows_public());

        let Expr::Literal(text) = policy.document().unwrap() else {
            panic!("network policy has no deploy-time values");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!([{
                "Rules": [{ "ResourceType": "collection", "Resource": ["collection/video-similarity*"] }],
                "AllowFromPublic": true
            }])
        );
    }
}
