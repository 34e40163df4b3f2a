//! OpenAPI document and Swagger UI served under `/api-docs`.
//!
//! The document is embedded at build time, validated as OpenAPI 3.0 once at
//! startup, and handed to the vendored Swagger UI as JSON. A malformed
//! document fails startup rather than the first request.

use anyhow::{Context, Result};
use openapiv3::OpenAPI;
use serde_json::Value;
use utoipa_swagger_ui::SwaggerUi;

const OPENAPI_YAML: &str = include_str!("../../assets/openapi.yaml");

/// Mount point of the UI.
pub const SWAGGER_UI_PATH: &str = "/api-docs";

/// Path the UI fetches the document from.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Parsed API document, rendered to JSON for serving.
#[derive(Debug)]
pub struct ApiDocs {
    json: Value,
}

impl ApiDocs {
    /// Parse the embedded document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid OpenAPI 3.0.
    pub fn load() -> Result<Self> {
        let api: OpenAPI =
            serde_yaml::from_str(OPENAPI_YAML).context("embedded OpenAPI document is invalid")?;
        let json = serde_json::to_value(&api).context("failed to render OpenAPI document")?;
        Ok(Self { json })
    }

    /// Swagger UI at [`SWAGGER_UI_PATH`], serving the document at
    /// [`OPENAPI_JSON_PATH`]. Merge the result into the router.
    pub fn swagger_ui(&self) -> SwaggerUi {
        SwaggerUi::new(SWAGGER_UI_PATH).external_url_unchecked(OPENAPI_JSON_PATH, self.json.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_document_parses() {
        let docs = ApiDocs::load().unwrap();
        assert_eq!(docs.json["info"]["title"], "Shop API");
        for path in ["/", "/_health", "/callback", "/api/v1/staff/me", "/api/v1/internal/ping"] {
            assert!(docs.json["paths"][path].is_object(), "missing {path}");
        }
    }

    #[test]
    fn rendered_json_is_openapi() {
        let docs = ApiDocs::load().unwrap();
        assert_eq!(docs.json["openapi"], "3.0.3");
        assert!(docs.json["components"]["securitySchemes"]["masterKey"].is_object());
        assert!(docs.json["paths"]["/callback"]["post"].is_object());
    }
}
