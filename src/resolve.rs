//! Deploy-time resolution preview.
//!
//! Evaluates intrinsic functions against values the provisioning engine
//! would supply (physical ids, resource attributes, pseudo parameters,
//! parameter values). Nothing here talks to the provider; callers provide
//! the values.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::error::ResolveError;
use crate::expr::{sub_variables, Expr, ListExpr};
use crate::template::Template;
use crate::types::{
    PSEUDO_ACCOUNT_ID, PSEUDO_PARTITION, PSEUDO_REGION, PSEUDO_STACK_NAME, PSEUDO_URL_SUFFIX,
    TYPE_FUNCTION,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    pub region: String,
    pub account_id: String,
    pub partition: String,
    pub url_suffix: String,
    pub stack_name: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub physical_ids: BTreeMap<String, String>,
    pub attributes: BTreeMap<(String, String), String>,
}

impl ResolveContext {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            partition: "aws".to_string(),
            url_suffix: "amazonaws.com".to_string(),
            stack_name: None,
            parameters: BTreeMap::new(),
            physical_ids: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_stack_name(mut self, name: impl Into<String>) -> Self {
        self.stack_name = Some(name.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_physical_id(mut self, logical_id: impl Into<String>, id: impl Into<String>) -> Self {
        self.physical_ids.insert(logical_id.into(), id.into());
        self
    }

    pub fn with_attribute(
        mut self,
        logical_id: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes
            .insert((logical_id.into(), attribute.into()), value.into());
        self
    }

    /// Fills parameters the caller did not set from the template's defaults.
    pub fn with_template_defaults(mut self, template: &Template) -> Self {
        for (name, decl) in &template.parameters {
            if let Some(default) = &decl.default {
                self.parameters
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        self
    }

    pub fn resolve(&self, expr: &Expr) -> Result<String, ResolveError> {
        match expr {
            Expr::Literal(s) => Ok(s.clone()),
            Expr::Ref(name) => self.resolve_ref(name),
            Expr::GetAtt {
                logical_id,
                attribute,
            } => self.resolve_attribute(logical_id, attribute),
            Expr::Join { delimiter, list } => Ok(self.resolve_list(list)?.join(delimiter)),
            Expr::Select { index, list } => {
                let items = self.resolve_list(list)?;
                let len = items.len();
                items
                    .into_iter()
                    .nth(*index)
                    .ok_or(ResolveError::SelectOutOfRange { index: *index, len })
            }
            Expr::Sub(template) => self.resolve_sub(template),
        }
    }

    pub fn resolve_list(&self, list: &ListExpr) -> Result<Vec<String>, ResolveError> {
        match list {
            ListExpr::Items(items) => items.iter().map(|e| self.resolve(e)).collect(),
            ListExpr::Split { delimiter, source } => {
                let source = self.resolve(source)?;
                Ok(source.split(delimiter.as_str()).map(str::to_string).collect())
            }
        }
    }

    /// Resolves every intrinsic inside a JSON value, leaving other values intact.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ResolveError> {
        if Expr::is_intrinsic(value) {
            return Ok(Value::String(self.resolve(&Expr::from_value(value)?)?));
        }
        Ok(match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_value(v))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = JsonMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(v)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }

    fn resolve_ref(&self, name: &str) -> Result<String, ResolveError> {
        let pseudo = match name {
            PSEUDO_REGION => Some(self.region.clone()),
            PSEUDO_ACCOUNT_ID => Some(self.account_id.clone()),
            PSEUDO_PARTITION => Some(self.partition.clone()),
            PSEUDO_URL_SUFFIX => Some(self.url_suffix.clone()),
            PSEUDO_STACK_NAME => self.stack_name.clone(),
            _ => None,
        };
        pseudo
            .or_else(|| self.parameters.get(name).cloned())
            .or_else(|| self.physical_ids.get(name).cloned())
            .ok_or_else(|| ResolveError::Unresolved(name.to_string()))
    }

    fn resolve_attribute(&self, logical_id: &str, attribute: &str) -> Result<String, ResolveError> {
        self.attributes
            .get(&(logical_id.to_string(), attribute.to_string()))
            .cloned()
            .ok_or_else(|| ResolveError::UnresolvedAttribute {
                logical_id: logical_id.to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn resolve_sub(&self, template: &str) -> Result<String, ResolveError> {
        let mut out = template.to_string();
        for name in sub_variables(template) {
            let value = match name.split_once('.') {
                Some((id, attr)) if !name.starts_with("AWS::") => self.resolve_attribute(id, attr)?,
                _ => self.resolve_ref(name)?,
            };
            out = out.replacen(&format!("${{{name}}}"), &value, 1);
        }
        Ok(out.replace("${!", "${"))
    }
}

/// Resolved function environments and stack outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub environment: BTreeMap<String, BTreeMap<String, String>>,
    pub outputs: BTreeMap<String, String>,
}

pub fn preview(template: &Template, ctx: &ResolveContext) -> Result<Preview, ResolveError> {
    let mut preview = Preview::default();
    for (logical_id, resource) in template.resources_of_type(TYPE_FUNCTION) {
        let Some(Value::Object(vars)) = resource.property_path(&["Environment", "Variables"]) else {
            continue;
        };
        let mut resolved = BTreeMap::new();
        for (key, value) in vars {
            let value = match ctx.resolve_value(value)? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            resolved.insert(key.clone(), value);
        }
        preview.environment.insert(logical_id.clone(), resolved);
    }
    for (name, output) in &template.outputs {
        preview
            .outputs
            .insert(name.clone(), ctx.resolve(&output.value)?);
    }
    Ok(preview)
}
