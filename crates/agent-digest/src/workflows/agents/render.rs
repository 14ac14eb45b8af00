use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::Value;

/// Name of the digest template inside the mail template directory.
pub const DIGEST_TEMPLATE: &str = "agent/mailing";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unable to read mail template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mail template '{name}': {reason}")]
    Template { name: String, reason: String },
    #[error("failed to render '{name}': {reason}")]
    Render { name: String, reason: String },
}

/// Turns template parameters into an HTML body.
pub trait DigestRenderer: Send + Sync {
    fn render(&self, template: &str, params: &Value) -> Result<String, RenderError>;
}

/// Handlebars templates stored as `<dir>/<name>.hbs`.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        Self {
            registry: Handlebars::new(),
        }
    }

    /// Loads the digest template from a mail template directory.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = dir.as_ref().join(format!("{DIGEST_TEMPLATE}.hbs"));
        let source = std::fs::read_to_string(&path)
            .map_err(|source| RenderError::Io { path, source })?;
        let mut renderer = Self::new();
        renderer.register(DIGEST_TEMPLATE, &source)?;
        Ok(renderer)
    }

    pub fn register(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.registry
            .register_template_string(name, source)
            .map_err(|err| RenderError::Template {
                name: name.to_string(),
                reason: err.to_string(),
            })
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, params: &Value) -> Result<String, RenderError> {
        self.registry
            .render(template, params)
            .map_err(|err| RenderError::Render {
                name: template.to_string(),
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_digest_parameters() {
        let mut renderer = HandlebarsRenderer::new();
        renderer
            .register(
                DIGEST_TEMPLATE,
                "<h1>{{translations.header}}</h1>{{#each offers}}<p>{{title}}</p>{{/each}}<a href=\"https://{{domain}}{{showAll}}\">all</a>",
            )
            .expect("template registers");

        let html = renderer
            .render(
                DIGEST_TEMPLATE,
                &json!({
                    "showAll": "/jobs",
                    "domain": "jobs.example",
                    "offers": [{ "title": "Welder" }, { "title": "Cook" }],
                    "translations": { "header": "New vacancies" }
                }),
            )
            .expect("renders");

        assert_eq!(
            html,
            "<h1>New vacancies</h1><p>Welder</p><p>Cook</p><a href=\"https://jobs.example/jobs\">all</a>"
        );
    }

    #[test]
    fn unknown_template_is_a_render_error() {
        let renderer = HandlebarsRenderer::default();
        let err = renderer
            .render("missing", &json!({}))
            .expect_err("nothing registered");
        assert!(matches!(err, RenderError::Render { .. }));
    }

    #[test]
    fn from_directory_requires_digest_template() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            HandlebarsRenderer::from_directory(dir.path()),
            Err(RenderError::Io { .. })
        ));

        std::fs::create_dir_all(dir.path().join("agent")).expect("agent dir");
        std::fs::write(dir.path().join("agent/mailing.hbs"), "{{showAll}}").expect("template");
        let renderer = HandlebarsRenderer::from_directory(dir.path()).expect("template loads");
        assert_eq!(
            renderer
                .render(DIGEST_TEMPLATE, &json!({ "showAll": "/cv" }))
                .expect("renders"),
            "/cv"
        );
    }
}
