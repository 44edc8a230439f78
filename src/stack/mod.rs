//! Declaration of the video similarity stack.
//!
//! Each component is one step taking the shared [`StackContext`] by
//! reference and returning a typed record. Records are threaded into the
//! steps that depend on them (the execution identity in particular), so
//! the reference graph in the template is exactly the one built here.

pub mod api;
pub mod collection;
pub mod compute;
pub mod grants;
pub mod output;
pub mod parameter;
pub mod policy;

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::{SynthError, SynthResult};
use crate::template::{OutputDecl, ParameterDecl, Resource, Template};
use crate::types::STACK_DESCRIPTION;

pub use api::{HttpApi, HttpMethod, Integration, Route};
pub use collection::Collection;
pub use compute::{ComputeFunction, ExecutionIdentity};
pub use grants::{PolicyDocument, PolicyStatement};
pub use parameter::{Parameters, ResolvedParameter};
pub use policy::{AccessPolicy, NetworkPolicy};

/// Accumulates declared records into one template.
#[derive(Debug, Clone)]
pub struct StackContext {
    template: Template,
}

impl StackContext {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            template: Template::new(description),
        }
    }

    pub fn add_parameter(&mut self, name: &str, decl: ParameterDecl) {
        debug!(name, "parameter declared");
        self.template.parameters.insert(name.to_string(), decl);
    }

    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) {
        self.template
            .resources
            .insert(logical_id.to_string(), resource);
    }

    /// Makes `logical_id` wait for `dependency`.
    pub fn add_dependency(&mut self, logical_id: &str, dependency: &str) -> SynthResult<()> {
        let resource = self.template.resources.get_mut(logical_id).ok_or_else(|| {
            SynthError::Config(format!("cannot add dependency to undeclared resource {logical_id}"))
        })?;
        if !resource.depends_on.iter().any(|d| d == dependency) {
            resource.depends_on.push(dependency.to_string());
        }
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, output: OutputDecl) {
        self.template.outputs.insert(name.to_string(), output);
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }
}

/// The template together with the typed records it was built from.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub stack_name: String,
    pub template: Template,
    pub sagemaker_endpoint: ResolvedParameter,
    pub collection: Collection,
    pub function: ComputeFunction,
    pub identity: ExecutionIdentity,
    pub access_policy: AccessPolicy,
    pub network_policy: NetworkPolicy,
    pub role_policy: PolicyDocument,
    pub api: HttpApi,
}

/// Builds the whole topology. Configuration and parameters are checked
/// before anything is declared.
pub fn synthesize(config: &StackConfig, parameters: &Parameters) -> SynthResult<SynthesizedStack> {
    config.validate()?;
    let sagemaker_endpoint = parameter::resolve(&parameter::SAGEMAKER_ENDPOINT, parameters)?;

    let mut ctx = StackContext::new(STACK_DESCRIPTION);
    parameter::declare(&mut ctx, &sagemaker_endpoint);
    let collection = collection::declare(&mut ctx, &config.collection)?;
    let (function, identity) =
        compute::declare(&mut ctx, &config.compute, &sagemaker_endpoint, &collection)?;
    let access_policy = policy::declare_access_policy(
        &mut ctx,
        config.collection.access_policy_name(),
        &collection,
        &identity,
    )?;
    let network_policy = policy::declare_network_policy(
        &mut ctx,
        config.collection.network_policy_name(),
        &collection,
    )?;
    let role_policy = grants::attach(&mut ctx, &identity, &function, grants::role_grants())?;
    let api = api::declare(&mut ctx, &config.api, &function)?;
    output::declare(&mut ctx, &api);

    let template = ctx.into_template();
    info!(
        stack = %config.stack_name,
        resources = template.resources.len(),
        sagemaker_endpoint = %sagemaker_endpoint.value,
        "stack synthesized"
    );
    Ok(SynthesizedStack {
        stack_name: config.stack_name.clone(),
        template,
        sagemaker_endpoint,
        collection,
        function,
        identity,
        access_policy,
        network_policy,
        role_policy,
        api,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn test_synthesize_declares_full_topology() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let t = &stack.template;
        assert_eq!(t.resources_of_type(TYPE_COLLECTION).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_ACCESS_POLICY).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_SECURITY_POLICY).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_FUNCTION).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_ROLE).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_POLICY).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_HTTP_API).count(), 1);
        assert_eq!(t.resources_of_type(TYPE_STAGE).count(), 1);
        assert_eq!(t.resources.len(), 9 + 2 * API_ROUTES.len());
        assert!(t.outputs.contains_key(OUTPUT_API_URL));
        assert_eq!(
            t.parameters[PARAM_SAGEMAKER_ENDPOINT].default.as_deref(),
            Some("Resnet50")
        );
        assert_eq!(t.parameters[PARAM_SAGEMAKER_ENDPOINT].min_length, Some(1));
    }

    #[test]
    fn test_access_policy_principal_is_function_identity() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let principals: Vec<_> = stack.access_policy.principals().cloned().collect();
        assert_eq!(principals, vec![stack.identity.arn()]);
    }

    #[test]
    fn test_function_waits_for_role_and_grants() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let function = stack.template.resource(FUNCTION_LOGICAL_ID).unwrap();
        assert_eq!(
            function.depends_on,
            vec![ROLE_LOGICAL_ID.to_string(), DEFAULT_POLICY_LOGICAL_ID.to_string()]
        );
    }

    #[test]
    fn test_invalid_config_fails_before_declaration() {
        let mut config = StackConfig::default();
        config.compute.ephemeral_storage_mib = 100;
        let err = synthesize(&config, &Parameters::new()).unwrap_err();
        assert!(matches!(err, SynthError::Config(_)));
    }

    #[test]
    fn test_add_dependency_requires_declared_resource() {
        let mut ctx = StackContext::new("test");
        assert!(ctx.add_dependency("Missing", "Other").is_err());
        assert!(ctx.template().resources.is_empty());
    }
}
