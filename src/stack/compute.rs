// Container function and its execution identity.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::ComputeConfig;
use crate::error::SynthResult;
use crate::expr::Expr;
use crate::template::Resource;
use crate::types::{
    DEFAULT_POLICY_LOGICAL_ID, ENV_OPENSEARCH_HOST, ENV_SAGEMAKER_ENDPOINT, FUNCTION_LOGICAL_ID,
    PSEUDO_PARTITION, ROLE_LOGICAL_ID, TYPE_FUNCTION, TYPE_ROLE,
};

use super::collection::Collection;
use super::grants::{PolicyDocument, PolicyStatement};
use super::parameter::ResolvedParameter;
use super::StackContext;

const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";
const BASIC_EXECUTION_POLICY: &str = ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Role the function runs under. Every policy naming the function as a
/// principal takes this value, never a looked-up one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIdentity {
    pub role_logical_id: String,
    pub default_policy_logical_id: String,
}

impl ExecutionIdentity {
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.role_logical_id, "Arn")
    }

    pub fn reference(&self) -> Expr {
        Expr::reference(&self.role_logical_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub asset_path: String,
    pub uri: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeFunction {
    pub logical_id: String,
    pub image: ImageSource,
    pub memory_mib: u32,
    pub timeout_secs: u32,
    pub ephemeral_storage_mib: u32,
    pub environment: BTreeMap<String, Expr>,
}

impl ComputeFunction {
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }

    pub fn environment_value(&self, key: &str) -> Option<&Expr> {
        self.environment.get(key)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties {
    assume_role_policy_document: PolicyDocument,
    managed_policy_arns: Vec<Expr>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties<'a> {
    package_type: &'static str,
    code: ImageCode<'a>,
    role: Expr,
    memory_size: u32,
    timeout: u32,
    ephemeral_storage: EphemeralStorage,
    environment: Environment<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageCode<'a> {
    image_uri: &'a Expr,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EphemeralStorage {
    size: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Environment<'a> {
    variables: &'a BTreeMap<String, Expr>,
}

/// Image in the stack account's registry, `<account>.dkr.ecr.<region>.<suffix>/<repo>:<tag>`.
fn image_uri(config: &ComputeConfig) -> Expr {
    Expr::sub(format!(
        "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}:{}",
        config.image_repository, config.image_tag
    ))
}

/// Declares the execution role and the function. The returned identity is
/// what policies and grants must reference.
pub fn declare(
    ctx: &mut StackContext,
    config: &ComputeConfig,
    sagemaker_endpoint: &ResolvedParameter,
    collection: &Collection,
) -> SynthResult<(ComputeFunction, ExecutionIdentity)> {
    let identity = ExecutionIdentity {
        role_logical_id: ROLE_LOGICAL_ID.to_string(),
        default_policy_logical_id: DEFAULT_POLICY_LOGICAL_ID.to_string(),
    };
    let role = RoleProperties {
        assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement::assume_role(
            LAMBDA_SERVICE_PRINCIPAL,
        )]),
        managed_policy_arns: vec![Expr::join(
            "",
            vec![
                Expr::literal("arn:"),
                Expr::reference(PSEUDO_PARTITION),
                Expr::literal(BASIC_EXECUTION_POLICY),
            ],
        )],
    };
    ctx.add_resource(&identity.role_logical_id, Resource::new(TYPE_ROLE, &role)?);

    let mut environment = BTreeMap::new();
    environment.insert(ENV_SAGEMAKER_ENDPOINT.to_string(), sagemaker_endpoint.reference());
    environment.insert(ENV_OPENSEARCH_HOST.to_string(), collection.host());

    let function = ComputeFunction {
        logical_id: FUNCTION_LOGICAL_ID.to_string(),
        image: ImageSource {
            asset_path: config.image_asset_path.clone(),
            uri: image_uri(config),
        },
        memory_mib: config.memory_mib,
        timeout_secs: config.timeout_secs,
        ephemeral_storage_mib: config.ephemeral_storage_mib,
        environment,
    };
    let properties = FunctionProperties {
        package_type: "Image",
        code: ImageCode {
            image_uri: &function.image.uri,
        },
        role: identity.arn(),
        memory_size: function.memory_mib,
        timeout: function.timeout_secs,
        ephemeral_storage: EphemeralStorage {
            size: function.ephemeral_storage_mib,
        },
        environment: Environment {
            variables: &function.environment,
        },
    };
    let resource = Resource::new(TYPE_FUNCTION, &properties)?
        .with_depends_on(&identity.role_logical_id)
        .with_metadata(json!({
            "aws:asset:path": function.image.asset_path,
            "aws:asset:property": "Code.ImageUri",
        }));
    ctx.add_resource(&function.logical_id, resource);
    debug!(
        memory_mib = function.memory_mib,
        timeout_secs = function.timeout_secs,
        "function declared"
    );
    Ok((function, identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::stack::{collection, parameter};

    fn declare_default() -> (StackContext, ComputeFunction, ExecutionIdentity) {
        let mut ctx = StackContext::new("test");
        let endpoint =
            parameter::resolve(&parameter::SAGEMAKER_ENDPOINT, &parameter::Parameters::new()).unwrap();
        let collection = collection::declare(&mut ctx, &CollectionConfig::default()).unwrap();
        let (function, identity) =
            declare(&mut ctx, &ComputeConfig::default(), &endpoint, &collection).unwrap();
        (ctx, function, identity)
    }

    #[test]
    fn test_function_limits_and_environment() {
        let (ctx, function, _) = declare_default();
        assert_eq!(function.memory_mib, 4096);
        assert_eq!(function.timeout_secs, 300);
        assert_eq!(function.ephemeral_storage_mib, 4096);
        assert_eq!(
            function.environment_value(ENV_SAGEMAKER_ENDPOINT),
            Some(&Expr::reference("sagemakerEndpoint"))
        );
        assert_eq!(function.environment.len(), 2);

        let template = ctx.into_template();
        let resource = template.resource(FUNCTION_LOGICAL_ID).unwrap();
        assert_eq!(resource.property("MemorySize"), Some(&json!(4096)));
        assert_eq!(resource.property("Timeout"), Some(&json!(300)));
        assert_eq!(resource.property_path(&["EphemeralStorage", "Size"]), Some(&json!(4096)));
        assert_eq!(resource.property("PackageType"), Some(&json!("Image")));
        assert_eq!(
            resource.property_path(&["Environment", "Variables", "SAGEMAKER_ENDPOINT"]),
            Some(&json!({ "Ref": "sagemakerEndpoint" }))
        );
        assert_eq!(resource.depends_on, vec![ROLE_LOGICAL_ID.to_string()]);
    }

    #[test]
    fn test_function_role_is_identity_arn() {
        let (ctx, _, identity) = declare_default();
        let template = ctx.into_template();
        let resource = template.resource(FUNCTION_LOGICAL_ID).unwrap();
        assert_eq!(resource.property("Role"), Some(&identity.arn().to_value()));
        let role = template.resource(ROLE_LOGICAL_ID).unwrap();
        assert_eq!(
            role.property_path(&["AssumeRolePolicyDocument", "Statement"])
                .and_then(|s| s.get(0))
                .and_then(|s| s.get("Principal")),
            Some(&json!({ "Service": "lambda.amazonaws.com" }))
        );
    }

    #[test]
    fn test_image_uri_uses_configured_repository() {
        let config = ComputeConfig {
            image_repository: "vsim".to_string(),
            image_tag: "abc".to_string(),
            ..ComputeConfig::default()
        };
        assert_eq!(
            image_uri(&config),
            Expr::sub("${AWS::AccountId}.dkr.ecr.${AWS::Region}.${AWS::URLSuffix}/vsim:abc")
        );
    }
}
