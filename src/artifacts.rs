use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::models::Analysis;

/// Best-effort diagnostic files. Nothing here is ever read back, and a failed
/// write never fails the request that triggered it.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn analysis_dir(&self) -> PathBuf { self.root.join("analysis") }

    pub fn images_dir(&self) -> PathBuf { self.root.join("generated-images") }

    /// ISO-8601 UTC instant with `:` and `.` replaced so it is safe in file names.
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true).replace([':', '.'], "-")
    }

    pub async fn save_analysis(&self, original: &str, analysis: &Analysis) -> PathBuf {
        let timestamp = Self::timestamp();
        let prompts = analysis.image_prompts.iter().map(|p| format!("- {p}")).collect::<Vec<_>>().join("\n");
        let markdown = format!(
            "# Document Analysis {timestamp}\n\n\
             ## Original Text\n{original}\n\n\
             ## Enhanced Text\n{}\n\n\
             ## Image Prompts\n{prompts}\n\n\
             ## Layout Recommendations\n\
             - Style: {}\n\
             - Images per page: {}\n\
             - Orientation: {}\n",
            analysis.enhanced_text,
            analysis.recommended_style.as_str(),
            analysis.recommended_images_per_page,
            analysis.recommended_orientation.as_str(),
        );
        write_best_effort(&self.analysis_dir(), &format!("analysis-{timestamp}.md"), markdown.into_bytes()).await
    }

    pub async fn save_image(&self, prompt: &str, b64_json: &str) -> PathBuf {
        let timestamp = Self::timestamp();
        let record = json!({ "timestamp": timestamp, "prompt": prompt, "b64_json": b64_json });
        let body = serde_json::to_vec_pretty(&record).unwrap_or_default();
        write_best_effort(&self.images_dir(), &format!("image-{timestamp}.json"), body).await
    }
}

async fn write_best_effort(dir: &Path, file_name: &str, contents: Vec<u8>) -> PathBuf {
    let path = dir.join(file_name);
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, contents).await
    }
    .await;
    match result {
        Ok(()) => debug!("💾 Saved debug artifact {}", path.display()),
        Err(e) => warn!("⚠️ Failed to save debug artifact {}: {}", path.display(), e),
    }
    path
}
