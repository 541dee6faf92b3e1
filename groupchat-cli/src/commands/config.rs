use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use shared::config::ClientConfig;

/// Writes a default configuration file into `dir`.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str, dir: &Path) -> Result<()> {
    let config = ClientConfig::with_defaults();
    let (file_name, serialized) = match format {
        "yaml" | "yml" => ("config.yaml", serde_yml::to_string(&config)?),
        "json" => ("config.json", serde_json::to_string_pretty(&config)?),
        other => bail!("unsupported format `{other}`; use `yaml` or `json`"),
    };

    let path = dir.join(file_name);
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(())
}
