/// Model file auto-download from HuggingFace.
///
/// Fetches the ONNX export and tokenizer of a sentence-transformer model the
/// first time it is used. Files land under a `.part` name and are renamed once
/// complete, so an interrupted download is retried on the next run.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const HF_BASE: &str = "https://huggingface.co";

/// Files required for the embedder, with their paths inside the model repo.
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
    ("special_tokens_map.json", "special_tokens_map.json"),
    ("tokenizer_config.json", "tokenizer_config.json"),
];

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Download URL of one file from a HuggingFace repo such as
/// `sentence-transformers/all-MiniLM-L6-v2`.
fn file_url(repo: &str, url_path: &str) -> String {
    format!("{HF_BASE}/{}/resolve/main/{url_path}", repo.trim_matches('/'))
}

/// Download whichever model files are missing from `model_dir`.
pub fn download_model_files(model_dir: &Path, repo: &str) -> Result<()> {
    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create model directory: {}", model_dir.display()))?;

    if all_files_present(model_dir) {
        info!("Model files found in {}", model_dir.display());
        return Ok(());
    }

    info!("Downloading model files for {repo} (one-time)...");

    for &(filename, url_path) in MODEL_FILES {
        let dest = model_dir.join(filename);
        if dest.exists() {
            continue;
        }

        let url = file_url(repo, url_path);
        info!("Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
    }

    info!("Model download complete");
    Ok(())
}

/// Download a single file with a progress bar.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let pb = match resp.content_length() {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                    .context("invalid progress template")?
                    .progress_chars("█▓░"),
            );
            pb
        }
        _ => ProgressBar::new_spinner(),
    };

    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("failed to create file: {}", partial.display()))?;

    std::io::copy(&mut pb.wrap_read(resp), &mut file).context("failed to write file")?;
    file.sync_all().context("failed to flush file")?;
    pb.finish_and_clear();

    fs::rename(&partial, dest)
        .with_context(|| format!("failed to move {} into place", partial.display()))?;
    Ok(())
}
