//! Cluster stack template

use crate::error::Result;

/// Template compiled into the binary
const CLUSTER_TEMPLATE: &str = include_str!("cluster_template.yaml");

/// Source of the infrastructure template body used when creating a stack
pub trait TemplateProvider {
    fn template_body(&self) -> Result<String>;
}

/// The cluster template shipped with keel
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplate;

impl TemplateProvider for EmbeddedTemplate {
    fn template_body(&self) -> Result<String> {
        Ok(CLUSTER_TEMPLATE.to_string())
    }
}

/// A parameter declared by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameter {
    pub name: String,
    pub default: Option<String>,
    /// Bounds of a `Number` parameter
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

impl TemplateParameter {
    /// Whether `value` satisfies the declared bounds
    pub fn in_range(&self, value: &str) -> bool {
        if self.min_value.is_none() && self.max_value.is_none() {
            return true;
        }
        let Ok(n) = value.trim().parse::<i64>() else {
            return false;
        };
        self.min_value.map_or(true, |min| n >= min) && self.max_value.map_or(true, |max| n <= max)
    }
}

/// A resource declared by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateResource {
    pub logical_id: String,
    pub resource_type: String,
}

/// Parameters declared in the template's `Parameters` section
pub fn declared_parameters(template_body: &str) -> Result<Vec<TemplateParameter>> {
    let doc: serde_yaml::Value = serde_yaml::from_str(template_body)?;
    let Some(section) = doc.get("Parameters").and_then(|p| p.as_mapping()) else {
        return Ok(Vec::new());
    };

    let params = section
        .iter()
        .filter_map(|(name, body)| {
            let name = name.as_str()?.to_string();
            let default = body.get("Default").and_then(scalar_to_string);
            let min_value = body.get("MinValue").and_then(scalar_to_i64);
            let max_value = body.get("MaxValue").and_then(scalar_to_i64);
            Some(TemplateParameter {
                name,
                default,
                min_value,
                max_value,
            })
        })
        .collect();

    Ok(params)
}

/// Resources declared in the template's `Resources` section, in template order
pub fn declared_resources(template_body: &str) -> Result<Vec<TemplateResource>> {
    let doc: serde_yaml::Value = serde_yaml::from_str(template_body)?;
    let Some(section) = doc.get("Resources").and_then(|r| r.as_mapping()) else {
        return Ok(Vec::new());
    };

    let resources = section
        .iter()
        .filter_map(|(logical_id, body)| {
            Some(TemplateResource {
                logical_id: logical_id.as_str()?.to_string(),
                resource_type: body.get("Type")?.as_str()?.to_string(),
            })
        })
        .collect();

    Ok(resources)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_to_i64(value: &serde_yaml::Value) -> Option<i64> {
    match value {
        serde_yaml::Value::Number(n) => n.as_i64(),
        serde_yaml::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
