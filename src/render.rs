use serde::Serialize;

use crate::layout::{fit_to_content, page_title, LayoutTemplate, Orientation};
use crate::wizard::{ImageSlot, Page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TextBlock {
    Heading { level: u8, text: String },
    Paragraph { text: String },
}

/// Splits page text on blank lines; `#`, `##` and `###` prefixes become headings.
pub fn text_blocks(text: &str) -> Vec<TextBlock> {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            for (level, prefix) in [(1, "# "), (2, "## "), (3, "### ")] {
                if let Some(rest) = block.strip_prefix(prefix) {
                    return TextBlock::Heading { level, text: rest.trim().to_string() };
                }
            }
            TextBlock::Paragraph { text: block.trim().to_string() }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub id: usize,
    pub title: String,
    pub orientation: Orientation,
    pub classes: LayoutTemplate,
    pub images: Vec<ImageSlot>,
    pub blocks: Vec<TextBlock>,
}

pub fn render_page(page: &Page) -> RenderedPage {
    RenderedPage {
        id: page.id,
        title: page_title(&page.text),
        orientation: page.orientation,
        classes: fit_to_content(page.layout, page.orientation, page.images.len(), page.text.chars().count(), page.text_display),
        images: page.images.clone(),
        blocks: text_blocks(&page.text),
    }
}
