//! `${name}` substitution over a YAML group file of named templates.
//!
//! Placeholders are dotted paths. The longest prefix naming a variable is
//! resolved first; the remainder selects within it:
//!
//! - service: `${db}` is `host:port`, `${db.host}`, `${db.port}`, `${db.<property>}`
//! - cluster: `${workers}` is comma-separated `host:port`, `${workers.cardinality}`,
//!   `${workers.first.<field>}`, `${workers.last.<field>}`, `${workers.<n>.<field>}`
//!   where `n` is the 1-based ordering position.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs;

use crate::config::Template;
use crate::variables::{ServiceModel, Value, VariableContext};

use super::renderer::{RenderError, Renderer};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}").expect("placeholder regex must compile")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Substitutes every placeholder in `text`.
    pub fn render_text(
        &self,
        template: &str,
        text: &str,
        variables: &VariableContext,
    ) -> Result<String, RenderError> {
        let mut undefined = None;
        let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let path = &caps[1];
            match lookup(variables, path) {
                Some(value) => value,
                None => {
                    undefined.get_or_insert_with(|| path.to_string());
                    String::new()
                }
            }
        });

        match undefined {
            Some(placeholder) => Err(RenderError::Undefined {
                template: template.to_string(),
                placeholder,
            }),
            None => Ok(rendered.into_owned()),
        }
    }
}

impl Renderer for PlaceholderRenderer {
    fn render(&self, template: &Template, variables: &VariableContext) -> Result<String, RenderError> {
        let raw = fs::read_to_string(&template.group).map_err(|source| RenderError::Group {
            path: template.group.clone(),
            source,
        })?;
        let group: BTreeMap<String, String> =
            serde_yaml::from_str(&raw).map_err(|e| RenderError::MalformedGroup {
                path: template.group.clone(),
                reason: e.to_string(),
            })?;
        let text = group
            .get(&template.template)
            .ok_or_else(|| RenderError::TemplateNotFound {
                template: template.template.clone(),
                group: template.group.clone(),
            })?;

        self.render_text(&template.name, text, variables)
    }
}

fn lookup(variables: &VariableContext, path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('.').collect();
    (1..=segments.len()).rev().find_map(|split| {
        let name = segments[..split].join(".");
        variables
            .get(&name)
            .and_then(|value| select(value, &segments[split..]))
    })
}

fn select(value: &Value, rest: &[&str]) -> Option<String> {
    match value {
        _ if rest.is_empty() => Some(value.to_string()),
        Value::Text(_) | Value::Path(_) => None,
        Value::Service(service) => field(service, rest),
        Value::Cluster(members) => {
            let member = match rest[0] {
                "cardinality" if rest.len() == 1 => return Some(members.len().to_string()),
                "first" => members.first(),
                "last" => members.last(),
                position => position
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| members.get(i)),
            }?;
            if rest.len() == 1 {
                Some(member.to_string())
            } else {
                field(member, &rest[1..])
            }
        }
    }
}

// Property names may themselves contain dots.
fn field(service: &ServiceModel, rest: &[&str]) -> Option<String> {
    service.lookup(&rest.join("."))
}
