use serde::{Deserialize, Serialize};

const BASE_CONTAINER: &str = "w-full bg-white shadow-lg rounded-lg overflow-hidden flex flex-col";
const BASE_IMAGE: &str = "flex flex-wrap gap-4 justify-center p-4";
const BASE_TEXT: &str = "prose prose-sm max-w-none p-6";
const BASE_TITLE: &str = "text-xl font-bold mb-4 px-4 pt-4";
const EXPANDED_TEXT: &str = "prose prose-sm max-w-none p-4 text-gray-800 overflow-y-auto";

/// Above this many characters a page counts as text heavy.
pub const TEXT_HEAVY_THRESHOLD: usize = 500;

pub const MAX_IMAGES_PER_PAGE: usize = 6;
pub const MAX_PAGES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LayoutStyle {
    #[default]
    Modern,
    Classic,
    Magazine,
    Minimal,
}

impl LayoutStyle {
    pub const ALL: [LayoutStyle; 4] = [Self::Modern, Self::Classic, Self::Magazine, Self::Minimal];

    /// Unknown names resolve to `Modern`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|style| style.as_str() == name).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Classic => "classic",
            Self::Magazine => "magazine",
            Self::Minimal => "minimal",
        }
    }

    fn defaults(self) -> StyleDefaults {
        match self {
            Self::Modern => StyleDefaults { image_min: 300, image_max: 400, title: "text-center" },
            Self::Classic => StyleDefaults { image_min: 300, image_max: 400, title: "font-serif" },
            Self::Magazine => StyleDefaults { image_min: 250, image_max: 350, title: "text-2xl tracking-tight" },
            Self::Minimal => StyleDefaults { image_min: 200, image_max: 300, title: "font-light" },
        }
    }
}

impl From<String> for LayoutStyle {
    fn from(name: String) -> Self { Self::from_name(&name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("landscape") { Self::Landscape } else { Self::Portrait }
    }

    pub fn is_landscape(self) -> bool { matches!(self, Self::Landscape) }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

impl From<String> for Orientation {
    fn from(name: String) -> Self { Self::from_name(&name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDisplay {
    #[default]
    Compact,
    Expanded,
}

struct StyleDefaults {
    image_min: u32,
    image_max: u32,
    title: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelBounds {
    Px(u32, u32),
    Percent(u32, u32),
}

impl PanelBounds {
    fn class(self) -> String {
        match self {
            Self::Px(min, max) => format!("min-h-[{min}px] max-h-[{max}px]"),
            Self::Percent(min, max) => format!("min-h-[{min}%] max-h-[{max}%]"),
        }
    }
}

/// Structural class strings for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTemplate {
    pub container: String,
    pub image_class: String,
    pub text_class: String,
    pub title_class: String,
}

fn image_panel(bounds: PanelBounds, grid: bool) -> String {
    let mut class = format!("{BASE_IMAGE} flex-shrink-0 {}", bounds.class());
    if grid {
        class.push_str(" grid grid-cols-2");
    }
    class
}

fn default_bounds(style: LayoutStyle, image_count: usize) -> PanelBounds {
    let defaults = style.defaults();
    let min = if image_count > 1 { defaults.image_min.min(200) } else { defaults.image_min };
    PanelBounds::Px(min, defaults.image_max)
}

pub fn template(style: LayoutStyle, orientation: Orientation, image_count: usize) -> LayoutTemplate {
    let defaults = style.defaults();
    let landscape = orientation.is_landscape();

    let mut container = format!("{BASE_CONTAINER} min-h-[800px]");
    if landscape {
        container = container.replace("flex-col", "grid grid-cols-2 gap-4");
    }

    LayoutTemplate {
        container,
        image_class: image_panel(default_bounds(style, image_count), image_count > 1 && landscape),
        text_class: format!("{BASE_TEXT} flex-grow overflow-y-auto"),
        title_class: format!("{BASE_TITLE} {}", defaults.title),
    }
}

/// Render-time adjustment: shrinks the image panel and grows the text panel
/// according to how much text shares the page with how many images.
pub fn fit_to_content(
    style: LayoutStyle,
    orientation: Orientation,
    image_count: usize,
    text_len: usize,
    display: TextDisplay,
) -> LayoutTemplate {
    let mut fitted = template(style, orientation, image_count);
    let heavy = text_len > TEXT_HEAVY_THRESHOLD;

    let bounds = match (image_count > 2, heavy) {
        (true, true) => Some(PanelBounds::Percent(35, 45)),
        (true, false) => Some(PanelBounds::Percent(45, 55)),
        (false, true) => Some(PanelBounds::Percent(30, 40)),
        (false, false) => None,
    };
    if let Some(bounds) = bounds {
        fitted.image_class = image_panel(bounds, image_count > 1 && orientation.is_landscape());
    }

    if display == TextDisplay::Expanded {
        let height = if text_len > 2000 {
            "min-h-[500px]"
        } else if text_len > 1000 {
            "min-h-[400px]"
        } else {
            "min-h-[300px]"
        };
        fitted.text_class = format!("{} {EXPANDED_TEXT} {height} flex-grow", fitted.text_class);
    }
    fitted
}

/// Page title: the first heading line, or the first five words capped at 20 characters.
pub fn page_title(text: &str) -> String {
    let first_line = text.split('\n').next().unwrap_or_default();
    if first_line.starts_with('#') {
        return first_line.trim_start_matches('#').trim_start().to_string();
    }
    let first_words = text.split_whitespace().take(5).collect::<Vec<_>>().join(" ");
    if first_words.chars().count() > 20 {
        format!("{}...", first_words.chars().take(20).collect::<String>())
    } else {
        first_words
    }
}
