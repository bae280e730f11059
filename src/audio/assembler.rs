// src/audio/assembler.rs — Lossless concatenation of chunk audio via ffmpeg
//
// Chunks share one codec and sample rate, so the concat demuxer with stream
// copy is enough: no re-encode, no quality loss.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::infra::errors::VoxbookError;

#[derive(Debug, Clone)]
pub struct AudioAssembler {
    ffmpeg: String,
}

impl AudioAssembler {
    pub fn new(ffmpeg: &str) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.ffmpeg
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.ffmpeg).is_ok()
    }

    /// Join `inputs` in the given order into `output`.
    pub async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<PathBuf, VoxbookError> {
        if inputs.is_empty() {
            return Err(VoxbookError::Assembly("no audio chunks to combine".into()));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(VoxbookError::OutputDirMissing(parent.to_path_buf()));
            }
        }
        for input in inputs {
            if !input.is_file() {
                return Err(VoxbookError::Assembly(format!(
                    "missing chunk file {}",
                    input.display()
                )));
            }
        }

        if inputs.len() == 1 {
            tokio::fs::copy(&inputs[0], output).await?;
            return Ok(output.to_path_buf());
        }

        let list_path = output.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(inputs)?).await?;

        let result = tokio::process::Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;
        let _ = tokio::fs::remove_file(&list_path).await;

        let out = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxbookError::MuxerUnavailable
            } else {
                VoxbookError::Assembly(format!("failed to run ffmpeg: {e}"))
            }
        })?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(VoxbookError::Assembly(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                crate::util::truncate_str(stderr.trim(), 500)
            )));
        }

        tracing::info!("Combined {} chunks into {}", inputs.len(), output.display());
        Ok(output.to_path_buf())
    }

    /// Best-effort removal of chunk files after a single-file assembly.
    pub async fn remove_chunks(&self, files: &[PathBuf]) -> usize {
        let mut removed = 0;
        for file in files {
            match tokio::fs::remove_file(file).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Could not remove {}: {e}", file.display()),
            }
        }
        removed
    }
}

/// ffconcat list body. Entries are absolute, since ffmpeg resolves relative
/// ones against the list file's directory. Single quotes are closed, escaped
/// and reopened.
fn concat_list(inputs: &[PathBuf]) -> std::io::Result<String> {
    let mut body = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input)?;
        let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
        body.push_str(&format!("file '{escaped}'\n"));
    }
    Ok(body)
}
