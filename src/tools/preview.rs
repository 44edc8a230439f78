// Preview what the provisioned stack would hand to the function and to operators.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::resolve::{self, ResolveContext};
use crate::stack::Parameters;
use crate::template::Template;
use crate::types::{API_LOGICAL_ID, COLLECTION_LOGICAL_ID, FUNCTION_LOGICAL_ID, ROLE_LOGICAL_ID};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";

/// Values the provisioning engine would produce for the stack.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreviewRequest {
    /// Collection endpoint as returned by the service, e.g. https://abc123.us-east-1.aoss.amazonaws.com
    pub collection_endpoint: String,
    /// Physical id of the HTTP API
    pub api_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Deploy-time parameter overrides as KEY=VALUE
    #[serde(default)]
    pub parameters: Vec<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

impl PreviewRequest {
    pub fn new(collection_endpoint: impl Into<String>, api_id: impl Into<String>) -> Self {
        Self {
            collection_endpoint: collection_endpoint.into(),
            api_id: api_id.into(),
            region: default_region(),
            account_id: default_account_id(),
            parameters: Vec::new(),
        }
    }

    /// Resolution context for a template synthesized by this crate.
    pub fn context(&self, template: &Template) -> SynthResult<ResolveContext> {
        let overrides = Parameters::parse_pairs(&self.parameters)?;
        let mut ctx = ResolveContext::new(&self.region, &self.account_id);
        for (name, value) in overrides.iter() {
            ctx = ctx.with_parameter(name, value);
        }
        let partition = ctx.partition.clone();
        let ctx = ctx
            .with_template_defaults(template)
            .with_physical_id(API_LOGICAL_ID, &self.api_id)
            .with_attribute(COLLECTION_LOGICAL_ID, "CollectionEndpoint", &self.collection_endpoint)
            .with_attribute(
                ROLE_LOGICAL_ID,
                "Arn",
                format!("arn:{partition}:iam::{}:role/{ROLE_LOGICAL_ID}", self.account_id),
            )
            .with_attribute(
                FUNCTION_LOGICAL_ID,
                "Arn",
                format!(
                    "arn:{partition}:lambda:{}:{}:function:{FUNCTION_LOGICAL_ID}",
                    self.region, self.account_id
                ),
            );

        for (name, decl) in &template.parameters {
            let Some(min) = decl.min_length else {
                continue;
            };
            let len = ctx.parameters.get(name).map_or(0, |v| v.len());
            if len < min as usize {
                return Err(SynthError::Config(format!(
                    "parameter {name} must be at least {min} characters"
                )));
            }
        }
        Ok(ctx)
    }
}

/// Resolves the function environment and outputs of `template_text`, as JSON.
pub fn preview_deployment(template_text: &str, request: &PreviewRequest) -> SynthResult<String> {
    let template = Template::parse(template_text)?;
    let ctx = request.context(&template)?;
    let preview = resolve::preview(&template, &ctx)?;
    debug!(outputs = preview.outputs.len(), "deployment preview resolved");
    Ok(serde_json::to_string_pretty(&preview)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::synthesize;
    use serde_json::Value;

    fn template_yaml() -> String {
        synthesize(&StackConfig::default(), &Parameters::new())
            .unwrap()
            .template
            .to_yaml()
            .unwrap()
    }

    #[test]
    fn test_preview_resolves_environment_and_url() {
        let request = PreviewRequest::new("https://abc123.us-east-1.aoss.amazonaws.com", "a1b2c3");
        let out = preview_deployment(&template_yaml(), &request).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        let env = &v["environment"]["VideoSimilarityFunction"];
        assert_eq!(env["SAGEMAKER_ENDPOINT"], "Resnet50");
        assert_eq!(env["OPENSEARCH_HOST"], "abc123.us-east-1.aoss.amazonaws.com");
        assert_eq!(
            v["outputs"]["ApiUrl"],
            "https://a1b2c3.execute-api.us-east-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_preview_parameter_override_and_empty_override() {
        let mut request = PreviewRequest::new("https://x.aoss.amazonaws.com", "api");
        request.parameters = vec!["sagemakerEndpoint=Other".to_string()];
        let out = preview_deployment(&template_yaml(), &request).unwrap();
        assert!(out.contains("\"SAGEMAKER_ENDPOINT\": \"Other\""));

        request.parameters = vec!["sagemakerEndpoint=".to_string()];
        let err = preview_deployment(&template_yaml(), &request).unwrap_err();
        assert!(err.to_string().contains("sagemakerEndpoint"));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: PreviewRequest =
            serde_json::from_str(r#"{"collection_endpoint":"https://h","api_id":"a"}"#).unwrap();
        assert_eq!(request.region, DEFAULT_REGION);
        assert_eq!(request.account_id, DEFAULT_ACCOUNT_ID);
        assert!(request.parameters.is_empty());
    }
}
