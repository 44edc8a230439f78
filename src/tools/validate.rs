// Validate a template against the topology's invariants.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::expr::Expr;
use crate::stack::policy::NetworkStatement;
use crate::template::{Resource, Template};
use crate::types::{
    API_ROUTES, ENV_OPENSEARCH_HOST, ENV_SAGEMAKER_ENDPOINT, OUTPUT_API_URL, TYPE_ACCESS_POLICY,
    TYPE_COLLECTION, TYPE_FUNCTION, TYPE_ROUTE, TYPE_SECURITY_POLICY,
};

fn str_prop<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource.property(key).and_then(Value::as_str)
}

fn expr_prop(resource: &Resource, key: &str) -> Option<Expr> {
    resource.property(key).and_then(|v| Expr::from_value(v).ok())
}

/// Validates a template (YAML or JSON): collection, network and data
/// access policies, function environment, the five POST routes on one
/// integration, and the API URL output. Returns every violation found.
pub fn validate_template(text: &str) -> Result<(), Vec<String>> {
    let template =
        Template::parse(text).map_err(|e| vec![format!("template parse error: {}", e)])?;

    let mut errors = Vec::new();

    let collections: Vec<&str> = template
        .resources_of_type(TYPE_COLLECTION)
        .filter_map(|(_, r)| str_prop(r, "Name"))
        .collect();
    if collections.is_empty() {
        errors.push(format!("no {} declared", TYPE_COLLECTION));
    }

    let network_policies: Vec<&Resource> = template
        .resources_of_type(TYPE_SECURITY_POLICY)
        .map(|(_, r)| r)
        .filter(|r| str_prop(r, "Type") == Some("network"))
        .collect();
    if network_policies.is_empty() {
        errors.push("no network security policy declared; the collection is unreachable without one".to_string());
    }
    let mut network_statements: Vec<NetworkStatement> = Vec::new();
    for policy in &network_policies {
        let Some(text) = str_prop(policy, "Policy") else {
            errors.push("network policy document must be a literal JSON string".to_string());
            continue;
        };
        match serde_json::from_str::<Vec<NetworkStatement>>(text) {
            Ok(statements) => network_statements.extend(statements),
            Err(e) => errors.push(format!("network policy document is malformed: {}", e)),
        }
    }
    if !network_policies.is_empty() {
        for name in &collections {
            let covering: Vec<&NetworkStatement> = network_statements
                .iter()
                .filter(|s| s.covers_collection(name))
                .collect();
            if covering.is_empty() {
                errors.push(format!("no network policy rule covers collection '{}'", name));
            } else if !covering.iter().any(|s| s.allow_from_public) {
                errors.push(format!(
                    "network policy for collection '{}' does not allow public access",
                    name
                ));
            }
        }
    }

    let functions: Vec<(&String, &Resource)> = template.resources_of_type(TYPE_FUNCTION).collect();
    if functions.is_empty() {
        errors.push(format!("no {} declared", TYPE_FUNCTION));
    }

    let access_policies: Vec<Expr> = template
        .resources_of_type(TYPE_ACCESS_POLICY)
        .map(|(_, r)| r)
        .filter(|r| str_prop(r, "Type") == Some("data"))
        .filter_map(|r| expr_prop(r, "Policy"))
        .collect();
    if access_policies.is_empty() {
        errors.push("no data access policy declared".to_string());
    }

    for (logical_id, function) in &functions {
        let role_refs = expr_prop(function, "Role")
            .map(|e| e.references())
            .unwrap_or_default();
        if role_refs.is_empty() {
            errors.push(format!("{}: Role must reference the declared execution role", logical_id));
        } else if !access_policies.is_empty()
            && !access_policies
                .iter()
                .any(|p| p.references().iter().any(|r| role_refs.contains(r)))
        {
            errors.push(format!(
                "data access policy principal does not reference {}'s execution role",
                logical_id
            ));
        }

        let vars = function.property_path(&["Environment", "Variables"]);
        for key in [ENV_SAGEMAKER_ENDPOINT, ENV_OPENSEARCH_HOST] {
            if vars.and_then(|v| v.get(key)).is_none() {
                errors.push(format!("{}: environment variable {} is required", logical_id, key));
            }
        }
        match vars.and_then(|v| v.get(ENV_OPENSEARCH_HOST)).map(Expr::from_value) {
            Some(Ok(Expr::Literal(host))) if host.contains("://") => errors.push(format!(
                "{}: {} must be a bare host, got '{}'",
                logical_id, ENV_OPENSEARCH_HOST, host
            )),
            Some(Ok(Expr::GetAtt { attribute, .. })) if attribute == "CollectionEndpoint" => {
                errors.push(format!(
                    "{}: {} passes the raw collection endpoint; strip its scheme",
                    logical_id, ENV_OPENSEARCH_HOST
                ))
            }
            Some(Err(e)) => errors.push(format!("{}: {}: {}", logical_id, ENV_OPENSEARCH_HOST, e)),
            _ => {}
        }
    }

    let routes: Vec<&Resource> = template.resources_of_type(TYPE_ROUTE).map(|(_, r)| r).collect();
    if routes.len() != API_ROUTES.len() {
        errors.push(format!(
            "expected exactly {} routes, found {}",
            API_ROUTES.len(),
            routes.len()
        ));
    }
    let mut paths = BTreeSet::new();
    for route in &routes {
        match str_prop(route, "RouteKey").and_then(|k| k.split_once(' ')) {
            Some(("POST", path)) => {
                paths.insert(path.trim_start_matches('/').to_string());
            }
            Some((method, path)) => errors.push(format!("route {} must be POST, found {}", path, method)),
            None => errors.push("route without a valid RouteKey".to_string()),
        }
    }
    for path in API_ROUTES {
        if !routes.is_empty() && !paths.contains(path) {
            errors.push(format!("route POST /{} is missing", path));
        }
    }
    let targets: BTreeSet<String> = routes
        .iter()
        .map(|r| r.property("Target").map(Value::to_string).unwrap_or_default())
        .collect();
    if targets.len() > 1 {
        errors.push("routes must share a single integration".to_string());
    }

    if !template.outputs.contains_key(OUTPUT_API_URL) {
        errors.push(format!("output {} is required", OUTPUT_API_URL));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::stack::{synthesize, Parameters};
    use crate::types::{NETWORK_POLICY_LOGICAL_ID, ROUTE_LOGICAL_ID_PREFIX};
    use serde_json::json;

    fn synthesized() -> Template {
        synthesize(&StackConfig::default(), &Parameters::new())
            .unwrap()
            .template
    }

    fn validate(template: &Template) -> Result<(), Vec<String>> {
        validate_template(&template.to_yaml().unwrap())
    }

    #[test]
    fn test_validate_synthesized_template() {
        assert_eq!(validate(&synthesized()), Ok(()));
        assert!(validate_template(&synthesized().to_json().unwrap()).is_ok());
    }

    #[test]
    fn test_validate_missing_network_policy() {
        let mut template = synthesized();
        template.resources.remove(NETWORK_POLICY_LOGICAL_ID);
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("network security policy")));
    }

    fn with_network_policy(document: serde_json::Value) -> Template {
        let mut template = synthesized();
        let policy = template.resources.get_mut(NETWORK_POLICY_LOGICAL_ID).unwrap();
        policy
            .properties
            .insert("Policy".to_string(), json!(document.to_string()));
        template
    }

    #[test]
    fn test_validate_network_policy_for_other_collection() {
        let template = with_network_policy(json!([{
            "Rules": [{ "ResourceType": "collection", "Resource": ["collection/video-similarity-archive"] }],
            "AllowFromPublic": true
        }]));
        let errors = validate(&template).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.contains("no network policy rule covers collection 'video-similarity'")));
    }

    #[test]
    fn test_validate_network_policy_not_public() {
        let template = with_network_policy(json!([{
            "Rules": [{ "ResourceType": "collection", "Resource": ["collection/video-similarity"] }],
            "AllowFromPublic": false
        }]));
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("does not allow public access")));
    }

    #[test]
    fn test_validate_network_policy_exact_pattern() {
        let template = with_network_policy(json!([{
            "Rules": [{ "ResourceType": "collection", "Resource": ["collection/video-similarity"] }],
            "AllowFromPublic": true
        }]));
        assert_eq!(validate(&template), Ok(()));
    }

    #[test]
    fn test_validate_raw_endpoint_and_scheme_literal() {
        let mut template = synthesized();
        let function = template.resources.get_mut("VideoSimilarityFunction").unwrap();
        function.properties["Environment"]["Variables"]["OPENSEARCH_HOST"] =
            json!({ "Fn::GetAtt": ["VideoSimilarityCollection", "CollectionEndpoint"] });
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("raw collection endpoint")));

        let function = template.resources.get_mut("VideoSimilarityFunction").unwrap();
        function.properties["Environment"]["Variables"]["OPENSEARCH_HOST"] = json!("https://host");
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("bare host")));
    }

    #[test]
    fn test_validate_route_violations() {
        let mut template = synthesized();
        let id = format!("{}VideoSimilarity", ROUTE_LOGICAL_ID_PREFIX);
        let route = template.resources.get_mut(&id).unwrap();
        route.properties.insert("RouteKey".to_string(), json!("GET /video_similarity"));
        route.properties.insert("Target".to_string(), json!("integrations/other"));
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("must be POST")));
        assert!(errors.iter().any(|e| e.contains("single integration")));
        assert!(errors.iter().any(|e| e.contains("POST /video_similarity is missing")));
    }

    #[test]
    fn test_validate_hard_coded_principal() {
        let mut template = synthesized();
        let policy = template.resources.get_mut("VideoSimilarityAccessPolicy").unwrap();
        policy.properties.insert(
            "Policy".to_string(),
            json!("[{\"Rules\":[],\"Principal\":[\"arn:aws:iam::1:role/x\"]}]"),
        );
        let errors = validate(&template).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("principal does not reference")));
    }

    #[test]
    fn test_validate_parse_error() {
        let errors = validate_template("Resources: [unclosed").unwrap_err();
        assert!(errors[0].starts_with("template parse error"));
    }
}
