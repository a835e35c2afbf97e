use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// Run `<tool> -version` and return the first line of its output
pub fn tool_version(program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is it installed and in PATH?",
                program.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!(
            "{} -version failed with status: {}",
            program.display(),
            output.status
        );
    }

    Ok(first_line(&String::from_utf8_lossy(&output.stdout)))
}

/// Check which of `codecs` the ffmpeg build lists under `-encoders`
pub fn available_encoders(program: &Path, codecs: &[String]) -> Result<Vec<String>> {
    let output = Command::new(program)
        .args(["-hide_banner", "-encoders"])
        .output()
        .with_context(|| format!("Failed to execute {}", program.display()))?;

    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(codecs
        .iter()
        .filter(|codec| listing_contains_encoder(&listing, codec))
        .cloned()
        .collect())
}

/// Match an encoder name as a whole word in `ffmpeg -encoders` output
fn listing_contains_encoder(listing: &str, codec: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(codec))
}

fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("Unknown version").to_string()
}
