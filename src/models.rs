use serde::{Serialize, Deserialize};

use crate::layout::{LayoutStyle, Orientation};

pub const GENERIC_PROMPTS: [&str; 3] = [
    "A visual summary of the key concepts",
    "An illustration of the main themes",
    "A conceptual representation of the content",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRecommendation {
    pub style: LayoutStyle,
    pub images_per_page: usize,
    pub orientation: Orientation,
}

impl Default for LayoutRecommendation {
    fn default() -> Self {
        Self { style: LayoutStyle::Modern, images_per_page: 1, orientation: Orientation::Portrait }
    }
}

/// Text, image prompts and layout hints produced once per wizard run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub text: String,
    pub image_prompts: Vec<String>,
    pub recommended: LayoutRecommendation,
}

impl Document {
    /// Used whenever analysis of uploaded text cannot produce anything better.
    pub fn from_plain_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_prompts: GENERIC_PROMPTS.iter().map(|p| p.to_string()).collect(),
            recommended: LayoutRecommendation::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    #[serde(default)]
    pub text: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub enhanced_text: String,
    pub image_prompts: Vec<String>,
    pub recommended_style: LayoutStyle,
    pub recommended_images_per_page: usize,
    pub recommended_orientation: Orientation,
}

impl From<Analysis> for Document {
    fn from(a: Analysis) -> Self {
        Document {
            text: a.enhanced_text,
            image_prompts: a.image_prompts,
            recommended: LayoutRecommendation {
                style: a.recommended_style,
                images_per_page: a.recommended_images_per_page,
                orientation: a.recommended_orientation,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTextResponse {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub saved_to_file: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub prompt: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageData {
    pub b64_json: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub data: Vec<ImageData>,
    pub saved_to_file: String,
}
