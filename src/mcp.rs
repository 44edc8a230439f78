// MCP server exposing synthesis, validation and preview as tools.

use rmcp::{
    handler::server::ServerHandler,
    model::{CallToolResult, Content},
    tool, tool_handler, tool_router,
    transport::stdio,
    ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use vsim_infra::tools::{preview, reference, synth, validate};
use vsim_infra::types::PARAM_SAGEMAKER_ENDPOINT;
use vsim_infra::{Parameters, StackConfig, SynthResult, TemplateFormat};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct SynthesizeParams {
    /// SageMaker endpoint name (default Resnet50)
    #[serde(default)]
    sagemaker_endpoint: Option<String>,
    /// Stack configuration as TOML text (optional)
    #[serde(default)]
    config_toml: Option<String>,
    /// Output format: yaml or json (default yaml)
    #[serde(default)]
    format: Option<TemplateFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct ValidateParams {
    /// CloudFormation template (YAML or JSON) to validate
    template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct PreviewParams {
    /// Synthesized template (YAML or JSON)
    template: String,
    #[serde(flatten)]
    request: preview::PreviewRequest,
}

fn synthesize(p: &SynthesizeParams) -> SynthResult<String> {
    let config = match p.config_toml.as_deref() {
        Some(text) => StackConfig::from_toml_str(text)?,
        None => StackConfig::default(),
    };
    let mut params = Parameters::new();
    if let Some(endpoint) = &p.sagemaker_endpoint {
        params = params.with(PARAM_SAGEMAKER_ENDPOINT, endpoint.as_str());
    }
    synth::synthesize_template(&config, &params, p.format.unwrap_or_default())
}

#[derive(Clone)]
pub struct VideoSimilarityMcpService {
    tool_router: rmcp::handler::server::tool::ToolRouter<Self>,
}

#[tool_router]
impl VideoSimilarityMcpService {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Synthesize the video similarity stack into a CloudFormation template")]
    async fn synthesize_stack_template(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<SynthesizeParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        match synthesize(&params.0) {
            Ok(out) => Ok(CallToolResult::success(vec![Content::text(out)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Validate a template: collection, network and access policies, function environment, five POST routes on one integration, ApiUrl output")]
    async fn validate_stack_template(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<ValidateParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        match validate::validate_template(&params.0.template) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text("Template is valid.")])),
            Err(errors) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Validation errors:\n{}",
                errors.join("\n")
            ))])),
        }
    }

    #[tool(description = "Resolve the function environment and stack outputs for given provisioned values")]
    async fn preview_stack_deployment(
        &self,
        params: rmcp::handler::server::wrapper::Parameters<PreviewParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let p = params.0;
        match preview::preview_deployment(&p.template, &p.request) {
            Ok(out) => Ok(CallToolResult::success(vec![Content::text(out)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "List the HTTP API routes and CORS configuration")]
    async fn list_api_routes(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let out = reference::list_api_routes_json();
        Ok(CallToolResult::success(vec![Content::text(out)]))
    }

    #[tool(description = "Describe the contract the compute image must meet (environment, routes, limits)")]
    async fn describe_compute_contract(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let out = reference::compute_contract_json();
        Ok(CallToolResult::success(vec![Content::text(out)]))
    }
}

#[tool_handler]
impl ServerHandler for VideoSimilarityMcpService {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        let mut info = rmcp::model::ServerInfo::default();
        info.instructions = Some(
            "Synthesize, validate and preview the video similarity deployment template.".to_string(),
        );
        info.capabilities = rmcp::model::ServerCapabilities::builder()
            .enable_tools()
            .build();
        info
    }
}

pub async fn serve() -> anyhow::Result<()> {
    let service = VideoSimilarityMcpService::new();
    info!("MCP server listening on stdio");
    let server = service.serve(stdio()).await?;
    server.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_params_default_endpoint() {
        let p: SynthesizeParams = serde_json::from_str("{}").unwrap();
        let out = synthesize(&p).unwrap();
        assert!(out.contains("Resnet50"));
    }

    #[test]
    fn test_synthesize_params_empty_endpoint() {
        let p: SynthesizeParams =
            serde_json::from_str(r#"{"sagemaker_endpoint":"","format":"json"}"#).unwrap();
        let err = synthesize(&p).unwrap_err();
        assert!(err.to_string().contains("sagemakerEndpoint"));
    }

    #[test]
    fn test_preview_params_flatten() {
        let p: PreviewParams = serde_json::from_str(
            r#"{"template":"Resources: {}","collection_endpoint":"https://h","api_id":"a"}"#,
        )
        .unwrap();
        assert_eq!(p.request.api_id, "a");
        assert_eq!(p.request.region, preview::DEFAULT_REGION);
    }
}
