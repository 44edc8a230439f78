// IAM policy documents and the grants attached to the function's execution identity.

use serde::Serialize;
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::expr::Expr;
use crate::template::Resource;
use crate::types::TYPE_POLICY;

use super::compute::{ComputeFunction, ExecutionIdentity};
use super::StackContext;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePrincipal {
    #[serde(rename = "Service")]
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<ServicePrincipal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<Expr>,
    {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Trust statement letting `service` assume a role.
    pub fn assume_role(service: &str) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(ServicePrincipal {
                service: service.to_string(),
            }),
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
        }
    }

    pub fn allows(&self, action: &str) -> bool {
        self.effect == Effect::Allow && self.action.iter().any(|a| a == action)
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyProperties<'a> {
    policy_name: &'a str,
    policy_document: &'a PolicyDocument,
    roles: Vec<Expr>,
}

/// Object storage, inference and collection access. Resources are left
/// unscoped, matching the deployed service.
pub fn role_grants() -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow(
            ["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
            ["arn:aws:s3:::*"],
        ),
        PolicyStatement::allow(["sagemaker:InvokeEndpoint"], ["*"]),
        PolicyStatement::allow(["aoss:*"], ["*"]),
    ]
}

/// Attaches `statements` to the identity's default policy and makes the
/// function wait for it.
pub fn attach(
    ctx: &mut StackContext,
    identity: &ExecutionIdentity,
    function: &ComputeFunction,
    statements: Vec<PolicyStatement>,
) -> SynthResult<PolicyDocument> {
    if statements.is_empty() {
        return Err(SynthError::Config("no role grants to attach".to_string()));
    }
    let document = PolicyDocument::new(statements);
    let properties = PolicyProperties {
        policy_name: &identity.default_policy_logical_id,
        policy_document: &document,
        roles: vec![identity.reference()],
    };
    ctx.add_resource(
        &identity.default_policy_logical_id,
        Resource::new(TYPE_POLICY, &properties)?,
    );
    ctx.add_dependency(&function.logical_id, &identity.default_policy_logical_id)?;
    debug!(statements = document.statement.len(), "role grants attached");
    Ok(document)
}
