use crate::utils::DeployError;
use crate::Result;
use handlebars::Handlebars;
use std::collections::HashMap;

/// Renders `{{NAME}}` placeholders from a fixed set of variables.
///
/// Strict: a placeholder without a variable is an error, so a missing secret
/// never silently becomes an empty string. Output is not HTML-escaped.
pub struct EnvironmentGenerator {
    handlebars: Handlebars<'static>,
    vars: HashMap<String, String>,
}

impl EnvironmentGenerator {
    pub fn new(vars: HashMap<String, String>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars, vars }
    }

    pub fn render(&self, template: &str) -> Result<String> {
        self.handlebars
            .render_template(template, &self.vars)
            .map_err(|e| DeployError::Template(e.to_string()))
    }

    pub fn render_bytes(&self, template: &[u8]) -> Result<Vec<u8>> {
        let template = std::str::from_utf8(template)
            .map_err(|e| DeployError::Template(format!("template is not UTF-8: {}", e)))?;
        Ok(self.render(template)?.into_bytes())
    }
}
