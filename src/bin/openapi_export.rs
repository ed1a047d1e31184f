use std::{fs, path::PathBuf};

use ticketflow_api::openapi::ApiDocV1;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let openapi = ApiDocV1::openapi();
    let json = serde_json::to_string_pretty(&openapi)?;

    // `-` prints to stdout; anything else is an output directory.
    match std::env::args().nth(1).as_deref() {
        Some("-") => println!("{json}"),
        dir => {
            let output_dir = PathBuf::from(dir.unwrap_or("openapi"));
            fs::create_dir_all(&output_dir)?;

            let output_path = output_dir.join("ticketflow-api.v1.json");
            fs::write(&output_path, json)?;

            println!("OpenAPI document written to {}", output_path.display());
        }
    }
    Ok(())
}
