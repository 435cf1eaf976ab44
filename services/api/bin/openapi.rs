//! Writes the OpenAPI document for the HTTP surface.
//!
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use eli10_api::router::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&output, spec_json)?;
    println!("OpenAPI document written to {output}");
    Ok(())
}
