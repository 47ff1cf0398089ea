use std::io::BufWriter;

use base64::Engine;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use thiserror::Error;

use crate::layout::Orientation;
use crate::render::{render_page, TextBlock};
use crate::wizard::{ImageSlot, Page};

const MARGIN: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;
// Rough Helvetica advance per character, in mm per point of font size.
const CHAR_WIDTH: f32 = 0.18;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

fn page_size(orientation: Orientation) -> (Mm, Mm) {
    match orientation {
        Orientation::Portrait => (Mm(210.0), Mm(297.0)),
        Orientation::Landscape => (Mm(297.0), Mm(210.0)),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max).collect::<String>())
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Caption text for a slot: the decoded format and size for generated images.
pub fn describe_image(slot: &ImageSlot) -> String {
    let Some((_, b64)) = slot.url.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) else {
        return if slot.url.contains("Error") { "generation failed".into() } else { "not generated".into() };
    };
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(b64) else {
        return "undecodable image data".into();
    };
    match (image::guess_format(&bytes), image::load_from_memory(&bytes)) {
        (Ok(format), Ok(img)) => format!("{} {}x{}", format!("{format:?}").to_uppercase(), img.width(), img.height()),
        (Ok(format), Err(_)) => format!("{format:?}").to_uppercase(),
        _ => "unknown image format".into(),
    }
}

/// Print-ready PDF of the finished pages: title, text blocks and one caption
/// per image slot. Images themselves are not embedded.
pub fn generate_pdf(pages: &[Page]) -> Result<Vec<u8>, PdfError> {
    let first_orientation = pages.first().map(|p| p.orientation).unwrap_or_default();
    let (width, height) = page_size(first_orientation);
    let doc_title = pages.first().map(|p| truncate(&p.title, 48)).unwrap_or_else(|| "Illustrated Document".into());
    let (doc, first_page, first_layer) = PdfDocument::new(doc_title, width, height, "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| PdfError::Render(format!("{e:?}")))?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(|e| PdfError::Render(format!("{e:?}")))?;

    for (index, page) in pages.iter().enumerate() {
        let (width, height) = page_size(page.orientation);
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(width, height, format!("Page {}", index + 1));
            doc.get_page(p).get_layer(l)
        };

        let rendered = render_page(page);
        let usable = width.0 - 2.0 * MARGIN;
        let captions_height = rendered.images.len() as f32 * 5.0 + 10.0;
        let floor = MARGIN + captions_height;
        let mut y = height.0 - MARGIN - 5.0;

        layer.use_text(truncate(&rendered.title, 80), 18.0, Mm(MARGIN), Mm(y), &bold);
        y -= 12.0;

        'blocks: for block in &rendered.blocks {
            let (text, size, face) = match block {
                TextBlock::Heading { level, text } => (text, 16.0 - 2.0 * *level as f32, &bold),
                TextBlock::Paragraph { text } => (text, 10.0, &font),
            };
            let line_height = size * PT_TO_MM * 1.4;
            let width_chars = (usable / (size * CHAR_WIDTH)) as usize;
            for line in wrap(text, width_chars.max(10)) {
                if y - line_height < floor {
                    layer.use_text("…", size, Mm(MARGIN), Mm(y), face);
                    break 'blocks;
                }
                layer.use_text(line, size, Mm(MARGIN), Mm(y), face);
                y -= line_height;
            }
            y -= line_height * 0.5;
        }

        let mut caption_y = MARGIN + captions_height - 5.0;
        for (n, slot) in rendered.images.iter().enumerate() {
            let caption = format!("Image {}: {} [{}]", n + 1, truncate(&slot.prompt, 120), describe_image(slot));
            layer.use_text(caption, 8.0, Mm(MARGIN), Mm(caption_y), &font);
            caption_y -= 5.0;
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer).map_err(|e| PdfError::Render(format!("{e:?}")))?;
    }
    Ok(buf)
}
