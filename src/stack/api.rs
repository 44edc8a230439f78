// HTTP API: one integration shared by every route.

use std::fmt;

use convert_case::{Case, Casing};
use serde::Serialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::SynthResult;
use crate::expr::Expr;
use crate::template::Resource;
use crate::types::{
    API_LOGICAL_ID, API_ROUTES, CORS_ALLOW_HEADERS, CORS_ALLOW_ORIGINS, INTEGRATION_LOGICAL_ID,
    PSEUDO_ACCOUNT_ID, PSEUDO_PARTITION, PSEUDO_REGION, PSEUDO_URL_SUFFIX,
    ROUTE_LOGICAL_ID_PREFIX, STAGE_LOGICAL_ID, TYPE_HTTP_API, TYPE_INTEGRATION, TYPE_PERMISSION,
    TYPE_ROUTE, TYPE_STAGE,
};

use super::compute::ComputeFunction;
use super::StackContext;

pub const PAYLOAD_FORMAT_VERSION: &str = "2.0";
pub const DEFAULT_STAGE_NAME: &str = "$default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
            HttpMethod::Options => f.write_str("OPTIONS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CorsConfiguration {
    pub allow_headers: Vec<String>,
    pub allow_methods: Vec<HttpMethod>,
    pub allow_origins: Vec<String>,
}

impl Default for CorsConfiguration {
    fn default() -> Self {
        Self {
            allow_headers: CORS_ALLOW_HEADERS.iter().map(|h| h.to_string()).collect(),
            allow_methods: vec![HttpMethod::Post, HttpMethod::Get, HttpMethod::Options],
            allow_origins: CORS_ALLOW_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

/// Binding from routes to the function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub logical_id: String,
    pub function_arn: Expr,
}

impl Integration {
    /// Route target, `integrations/<id>`.
    pub fn target(&self) -> Expr {
        Expr::join(
            "",
            vec![Expr::literal("integrations/"), Expr::reference(&self.logical_id)],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub logical_id: String,
    pub path: String,
    pub method: HttpMethod,
    pub integration_id: String,
}

impl Route {
    pub fn route_key(&self) -> String {
        format!("{} /{}", self.method, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApi {
    pub logical_id: String,
    pub name: String,
    pub cors: CorsConfiguration,
    pub stage_logical_id: String,
    pub integration: Integration,
    pub routes: Vec<Route>,
}

impl HttpApi {
    pub fn reference(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// Base URL of the `$default` stage.
    pub fn url(&self) -> Expr {
        Expr::join(
            "",
            vec![
                Expr::literal("https://"),
                self.reference(),
                Expr::literal(".execute-api."),
                Expr::reference(PSEUDO_REGION),
                Expr::literal("."),
                Expr::reference(PSEUDO_URL_SUFFIX),
                Expr::literal("/"),
            ],
        )
    }

    fn execute_arn(&self, route: &Route) -> Expr {
        Expr::join(
            "",
            vec![
                Expr::literal("arn:"),
                Expr::reference(PSEUDO_PARTITION),
                Expr::literal(":execute-api:"),
                Expr::reference(PSEUDO_REGION),
                Expr::literal(":"),
                Expr::reference(PSEUDO_ACCOUNT_ID),
                Expr::literal(":"),
                self.reference(),
                Expr::literal(format!("/*/*/{}", route.path)),
            ],
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiProperties<'a> {
    name: &'a str,
    protocol_type: &'static str,
    cors_configuration: &'a CorsConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StageProperties {
    api_id: Expr,
    stage_name: &'static str,
    auto_deploy: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct IntegrationProperties<'a> {
    api_id: Expr,
    integration_type: &'static str,
    integration_uri: &'a Expr,
    payload_format_version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RouteProperties {
    api_id: Expr,
    route_key: String,
    authorization_type: &'static str,
    target: Expr,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PermissionProperties {
    action: &'static str,
    function_name: Expr,
    principal: &'static str,
    source_arn: Expr,
}

/// Declares the API, its default stage, the shared integration and one
/// POST route (plus invoke permission) per entry of [`API_ROUTES`].
pub fn declare(
    ctx: &mut StackContext,
    config: &ApiConfig,
    function: &ComputeFunction,
) -> SynthResult<HttpApi> {
    let integration = Integration {
        logical_id: INTEGRATION_LOGICAL_ID.to_string(),
        function_arn: function.arn(),
    };
    let routes = API_ROUTES
        .iter()
        .map(|path| Route {
            logical_id: format!("{ROUTE_LOGICAL_ID_PREFIX}{}", path.to_case(Case::Pascal)),
            path: path.to_string(),
            method: HttpMethod::Post,
            integration_id: integration.logical_id.clone(),
        })
        .collect();
    let api = HttpApi {
        logical_id: API_LOGICAL_ID.to_string(),
        name: config.name.clone(),
        cors: CorsConfiguration::default(),
        stage_logical_id: STAGE_LOGICAL_ID.to_string(),
        integration,
        routes,
    };

    ctx.add_resource(
        &api.logical_id,
        Resource::new(
            TYPE_HTTP_API,
            &ApiProperties {
                name: &api.name,
                protocol_type: "HTTP",
                cors_configuration: &api.cors,
            },
        )?,
    );
    ctx.add_resource(
        &api.stage_logical_id,
        Resource::new(
            TYPE_STAGE,
            &StageProperties {
                api_id: api.reference(),
                stage_name: DEFAULT_STAGE_NAME,
                auto_deploy: true,
            },
        )?,
    );
    ctx.add_resource(
        &api.integration.logical_id,
        Resource::new(
            TYPE_INTEGRATION,
            &IntegrationProperties {
                api_id: api.reference(),
                integration_type: "AWS_PROXY",
                integration_uri: &api.integration.function_arn,
                payload_format_version: PAYLOAD_FORMAT_VERSION,
            },
        )?,
    );

    for route in &api.routes {
        ctx.add_resource(
            &route.logical_id,
            Resource::new(
                TYPE_ROUTE,
                &RouteProperties {
                    api_id: api.reference(),
                    route_key: route.route_key(),
                    authorization_type: "NONE",
                    target: api.integration.target(),
                },
            )?,
        );
        ctx.add_resource(
            &format!("{}Permission", route.logical_id),
            Resource::new(
                TYPE_PERMISSION,
                &PermissionProperties {
                    action: "lambda:InvokeFunction",
                    function_name: function.arn(),
                    principal: "apigateway.amazonaws.com",
                    source_arn: api.execute_arn(route),
                },
            )?,
        );
    }
    debug!(name = %api.name, routes = api.routes.len(), "http api declared");
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::{synthesize, Parameters};
    use serde_json::json;

    #[test]
    fn test_route_logical_ids_are_pascal_cased() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let ids: Vec<&str> = stack.api.routes.iter().map(|r| r.logical_id.as_str()).collect();
        assert!(ids.contains(&"VideoSimilarityApiRouteGetVideoVector"));
        assert!(ids.contains(&"VideoSimilarityApiRouteCreateOpensearchIndex"));
    }

    #[test]
    fn test_five_post_routes_share_one_integration() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let api = &stack.api;
        assert_eq!(api.routes.len(), 5);
        assert!(api.routes.iter().all(|r| r.method == HttpMethod::Post));
        assert!(api.routes.iter().all(|r| r.integration_id == api.integration.logical_id));
        let keys: Vec<_> = api.routes.iter().map(Route::route_key).collect();
        assert_eq!(
            keys,
            vec![
                "POST /get_video_vector",
                "POST /insert_video_vector",
                "POST /search_similarity_videos",
                "POST /video_similarity",
                "POST /create_opensearch_index",
            ]
        );

        let targets: Vec<_> = stack
            .template
            .resources_of_type(TYPE_ROUTE)
            .map(|(_, r)| r.property("Target").cloned())
            .collect();
        assert_eq!(targets.len(), 5);
        assert!(targets.iter().all(|t| t == &Some(api.integration.target().to_value())));
        assert_eq!(stack.template.resources_of_type(TYPE_INTEGRATION).count(), 1);
        assert_eq!(stack.template.resources_of_type(TYPE_PERMISSION).count(), 5);
    }

    #[test]
    fn test_cors_configuration() {
        let stack = synthesize(&StackConfig::default(), &Parameters::new()).unwrap();
        let resource = stack.template.resource(API_LOGICAL_ID).unwrap();
        assert_eq!(resource.property("ProtocolType"), Some(&json!("HTTP")));
        assert_eq!(
            resource.property("CorsConfiguration"),
            Some(&json!({
                "AllowHeaders": ["Content-Type", "Authorization"],
                "AllowMethods": ["POST", "GET", "OPTIONS"],
                "AllowOrigins": ["*"]
            }))
        );
    }
}
