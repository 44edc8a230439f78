// Reference data: the HTTP surface and the contract the compute image must meet.

use serde_json::{json, Value};

use crate::config::ComputeConfig;
use crate::stack::api::CorsConfiguration;
use crate::stack::grants::role_grants;
use crate::types::{
    API_ROUTES, DEFAULT_SAGEMAKER_ENDPOINT, ENV_OPENSEARCH_HOST, ENV_SAGEMAKER_ENDPOINT,
    INTEGRATION_LOGICAL_ID, PARAM_SAGEMAKER_ENDPOINT,
};

fn routes() -> Value {
    Value::Array(
        API_ROUTES
            .iter()
            .map(|path| json!({ "path": format!("/{path}"), "method": "POST", "integration": INTEGRATION_LOGICAL_ID }))
            .collect(),
    )
}

pub fn list_api_routes_json() -> String {
    let value = json!({
        "routes": routes(),
        "cors": CorsConfiguration::default(),
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

pub fn compute_contract_json() -> String {
    let limits = ComputeConfig::default();
    let value = json!({
        "package": "container image",
        "environment": {
            ENV_SAGEMAKER_ENDPOINT: format!("value of parameter {PARAM_SAGEMAKER_ENDPOINT} (default {DEFAULT_SAGEMAKER_ENDPOINT})"),
            ENV_OPENSEARCH_HOST: "collection endpoint host, without scheme",
        },
        "routes": routes(),
        "grants": role_grants(),
        "limits": {
            "memory_mib": limits.memory_mib,
            "timeout_secs": limits.timeout_secs,
            "ephemeral_storage_mib": limits.ephemeral_storage_mib,
        },
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_api_routes() {
        let v: Value = serde_json::from_str(&list_api_routes_json()).unwrap();
        let routes = v["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 5);
        assert_eq!(routes[0]["path"], "/get_video_vector");
        assert!(routes.iter().all(|r| r["method"] == "POST"));
        assert_eq!(v["cors"]["AllowOrigins"], json!(["*"]));
    }

    #[test]
    fn test_compute_contract() {
        let v: Value = serde_json::from_str(&compute_contract_json()).unwrap();
        assert!(v["environment"].get("SAGEMAKER_ENDPOINT").is_some());
        assert!(v["environment"].get("OPENSEARCH_HOST").is_some());
        assert_eq!(v["limits"]["memory_mib"], 4096);
        let grants = v["grants"].as_array().unwrap();
        assert!(grants.iter().any(|g| g["Action"] == json!(["aoss:*"])));
    }
}
