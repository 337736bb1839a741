use utoipa::OpenApi;

/// Write the OpenAPI document to the given path (default `openapi.json`)
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let doc = kubeprobe::api::openapi::ApiDoc::openapi();
    std::fs::write(&path, doc.to_pretty_json()?)?;
    println!("Wrote {} ({} paths)", path, doc.paths.paths.len());
    Ok(())
}
