// Deployment parameter resolution. Fails closed on an empty value.

use std::collections::BTreeMap;

use crate::error::{SynthError, SynthResult};
use crate::expr::Expr;
use crate::template::ParameterDecl;
use crate::types::{
    DEFAULT_SAGEMAKER_ENDPOINT, KNOWN_PARAMETERS, PARAM_SAGEMAKER_ENDPOINT,
    PARAM_SAGEMAKER_ENDPOINT_DESCRIPTION, PARAM_SAGEMAKER_ENDPOINT_LABEL,
};

use super::StackContext;

/// Parameter values supplied by the operator (`KEY=VALUE`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Parses `KEY=VALUE` pairs. `KEY=` is kept as an explicit empty value.
    pub fn parse_pairs<I, S>(pairs: I) -> SynthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| SynthError::MalformedParameter(pair.to_string()))?;
            let name = name.trim();
            if !KNOWN_PARAMETERS.contains(&name) {
                return Err(SynthError::UnknownParameter(name.to_string()));
            }
            params.values.insert(name.to_string(), value.to_string());
        }
        Ok(params)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

/// A declared string parameter with its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub default: &'static str,
}

pub const SAGEMAKER_ENDPOINT: ParameterSpec = ParameterSpec {
    name: PARAM_SAGEMAKER_ENDPOINT,
    label: PARAM_SAGEMAKER_ENDPOINT_LABEL,
    description: PARAM_SAGEMAKER_ENDPOINT_DESCRIPTION,
    default: DEFAULT_SAGEMAKER_ENDPOINT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub name: String,
    pub description: String,
    pub value: String,
}

impl ResolvedParameter {
    pub fn reference(&self) -> Expr {
        Expr::reference(&self.name)
    }
}

/// Resolves `param` from supplied values, falling back to its default.
pub fn resolve(param: &ParameterSpec, supplied: &Parameters) -> SynthResult<ResolvedParameter> {
    let value = supplied.get(param.name).unwrap_or(param.default);
    if value.trim().is_empty() {
        return Err(SynthError::MissingParameter {
            label: param.label.to_string(),
            name: param.name.to_string(),
            example: param.default.to_string(),
        });
    }
    Ok(ResolvedParameter {
        name: param.name.to_string(),
        description: param.description.to_string(),
        value: value.to_string(),
    })
}

/// Declares the parameter with the resolved value as its default and a
/// minimum length, so an empty override at deploy time fails as well.
pub fn declare(ctx: &mut StackContext, parameter: &ResolvedParameter) {
    ctx.add_parameter(
        &parameter.name,
        ParameterDecl {
            type_: "String".to_string(),
            description: Some(parameter.description.clone()),
            default: Some(parameter.value.clone()),
            min_length: Some(1),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_applies_when_absent() {
        let resolved = resolve(&SAGEMAKER_ENDPOINT, &Parameters::new()).unwrap();
        assert_eq!(resolved.value, "Resnet50");
        assert_eq!(resolved.reference(), Expr::reference("sagemakerEndpoint"));
    }

    #[test]
    fn test_supplied_value_wins() {
        let params = Parameters::parse_pairs(["sagemakerEndpoint=my-endpoint"]).unwrap();
        let resolved = resolve(&SAGEMAKER_ENDPOINT, &params).unwrap();
        assert_eq!(resolved.value, "my-endpoint");
    }

    #[test]
    fn test_surrounding_whitespace_is_kept() {
        let params = Parameters::new().with("sagemakerEndpoint", " my-endpoint ");
        let resolved = resolve(&SAGEMAKER_ENDPOINT, &params).unwrap();
        assert_eq!(resolved.value, " my-endpoint ");
    }

    #[test]
    fn test_empty_and_blank_values_fail_closed() {
        for raw in ["sagemakerEndpoint=", "sagemakerEndpoint=   "] {
            let params = Parameters::parse_pairs([raw]).unwrap();
            let err = resolve(&SAGEMAKER_ENDPOINT, &params).unwrap_err();
            assert_eq!(
                err.to_string(),
                "SageMaker endpoint is not defined, use: --parameters sagemakerEndpoint=Resnet50"
            );
        }
    }

    #[test]
    fn test_parse_pairs_rejects_unknown_and_malformed() {
        let err = Parameters::parse_pairs(["bucket=x"]).unwrap_err();
        assert!(matches!(err, SynthError::UnknownParameter(name) if name == "bucket"));
        let err = Parameters::parse_pairs(["sagemakerEndpoint"]).unwrap_err();
        assert!(matches!(err, SynthError::MalformedParameter(_)));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let params = Parameters::parse_pairs(["sagemakerEndpoint=a=b"]).unwrap();
        assert_eq!(params.get("sagemakerEndpoint"), Some("a=b"));
    }
}
