// Render the stack template.

use std::path::Path;

use crate::config::StackConfig;
use crate::error::SynthResult;
use crate::stack::{synthesize, Parameters};
use crate::template::TemplateFormat;

/// Loads the stack configuration from `path`, or defaults when absent.
pub fn load_config(path: Option<&Path>) -> SynthResult<StackConfig> {
    match path {
        Some(p) => StackConfig::from_file(p),
        None => Ok(StackConfig::default()),
    }
}

/// Synthesizes the stack and renders it. YAML output carries a short header
/// naming the stack and the resolved endpoint parameter.
pub fn synthesize_template(
    config: &StackConfig,
    parameters: &Parameters,
    format: TemplateFormat,
) -> SynthResult<String> {
    let stack = synthesize(config, parameters)?;
    let body = stack.template.render(format)?;
    Ok(match format {
        TemplateFormat::Json => body,
        TemplateFormat::Yaml => {
            let mut out = format!("# Generated {} template\n", stack.stack_name);
            out.push_str(&format!(
                "# {}={}\n",
                stack.sagemaker_endpoint.name, stack.sagemaker_endpoint.value
            ));
            out.push_str(&body);
            out
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    #[test]
    fn test_synthesize_yaml_has_header_and_parses() {
        let params = Parameters::parse_pairs(["sagemakerEndpoint=Resnet50"]).unwrap();
        let yaml = synthesize_template(&StackConfig::default(), &params, TemplateFormat::Yaml).unwrap();
        assert!(yaml.starts_with("# Generated VideoSimilarityStack template\n"));
        assert!(yaml.contains("# sagemakerEndpoint=Resnet50"));
        assert!(yaml.contains("AWS::OpenSearchServerless::Collection"));
        assert!(yaml.contains("VECTORSEARCH"));
        let template = Template::parse(&yaml).unwrap();
        assert_eq!(template.resources.len(), 19);
    }

    #[test]
    fn test_synthesize_json_parses() {
        let json = synthesize_template(&StackConfig::default(), &Parameters::new(), TemplateFormat::Json).unwrap();
        let template = Template::parse(&json).unwrap();
        assert!(template.outputs.contains_key("ApiUrl"));
    }

    #[test]
    fn test_synthesize_empty_endpoint_fails() {
        let params = Parameters::parse_pairs(["sagemakerEndpoint="]).unwrap();
        let err = synthesize_template(&StackConfig::default(), &params, TemplateFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("sagemakerEndpoint"));
    }

    #[test]
    fn test_load_config_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/vsim.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/vsim.toml"));
        assert_eq!(load_config(None).unwrap(), StackConfig::default());
    }
}
