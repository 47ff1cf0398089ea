//! Five-step document wizard.
//!
//! `Input → Analysis → LayoutOptions → Preview → Generate`, with a page
//! editor nested inside `Preview`. Each step carries only the data that is
//! valid in it, so e.g. editing a page outside `Preview` is unrepresentable.
//!
//! Image generation is sequential: [`Wizard::next_job`] hands out at most one
//! [`ImageJob`] at a time and [`Wizard::finish_job`] folds its result back into
//! the pages. Slots fill in page-major, slot-minor order.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::{page_title, LayoutStyle, Orientation, TextDisplay, MAX_IMAGES_PER_PAGE, MAX_PAGES};
use crate::models::Document;
use crate::random::RandomSource;
use crate::render::{render_page, RenderedPage};
use crate::synth::{synthesize, SynthError};
use crate::together::{GatewayError, GeneratedImage, TextAnalyzer};

pub const INITIAL_PLACEHOLDER: &str = "https://placehold.co/600x400/gray/white?text=Placeholder+Image";
pub const WAITING_PLACEHOLDER: &str = "https://placehold.co/600x400/gray/white?text=Waiting+To+Generate";
pub const ERROR_PLACEHOLDER: &str = "https://placehold.co/600x400/ff0000/white?text=Error+Generating+Image";
pub const DEFAULT_IMAGE_PROMPT: &str = "Default image prompt";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("This action belongs to the {expected} step, but the wizard is at {actual}")]
    WrongStep { expected: &'static str, actual: &'static str },
    #[error("{0}")]
    InvalidInput(String),
    #[error("Page {0} does not exist")]
    UnknownPage(usize),
    #[error("Image {slot} does not exist on page {page}")]
    UnknownSlot { page: usize, slot: usize },
    #[error("Image {slot} on page {page} has not been generated yet")]
    NotRendered { page: usize, slot: usize },
    #[error("An image request is already in progress")]
    Busy,
    #[error("Finish or cancel the page layout edit first")]
    Editing,
    #[error("Image generation is not complete")]
    GenerationIncomplete,
    #[error("Image result does not match the current generation cursor")]
    StaleJob,
}

impl From<SynthError> for WizardError {
    fn from(e: SynthError) -> Self { WizardError::InvalidInput(e.to_string()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Prompt,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSlot {
    pub id: String,
    pub prompt: String,
    pub url: String,
}

impl ImageSlot {
    fn placeholder(page_id: usize, index: usize, prompts: &[String]) -> Self {
        let prompt = if prompts.is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            prompts[index % prompts.len()].clone()
        };
        Self { id: format!("img-{page_id}-{index}"), prompt, url: INITIAL_PLACEHOLDER.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: usize,
    pub title: String,
    pub layout: LayoutStyle,
    pub orientation: Orientation,
    pub images: Vec<ImageSlot>,
    pub text: String,
    pub text_display: TextDisplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub orientation: Orientation,
    pub total_pages: usize,
    pub images_per_page: usize,
    pub layout_style: LayoutStyle,
}

impl LayoutOptions {
    fn recommended_for(document: &Document) -> Self {
        Self {
            orientation: document.recommended.orientation,
            total_pages: 1,
            images_per_page: document.recommended.images_per_page,
            layout_style: document.recommended.style,
        }
        .clamped()
    }

    fn clamped(self) -> Self {
        Self {
            total_pages: self.total_pages.clamp(1, MAX_PAGES),
            images_per_page: self.images_per_page.clamp(1, MAX_IMAGES_PER_PAGE),
            ..self
        }
    }
}

/// Scratch options while one page's layout is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayoutOptions {
    pub layout: LayoutStyle,
    pub images_per_page: usize,
    pub text_display: TextDisplay,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEditor {
    pub page_id: usize,
    pub options: PageLayoutOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCursor {
    pub page: usize,
    pub image: usize,
    pub complete: bool,
    /// An image request (sequential or regenerate) is outstanding.
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum WizardStep {
    Input {
        mode: InputMode,
    },
    Analysis {
        document: Document,
    },
    LayoutOptions {
        document: Document,
        options: LayoutOptions,
    },
    Preview {
        document: Document,
        options: LayoutOptions,
        pages: Vec<Page>,
        editing: Option<PageEditor>,
    },
    Generate {
        document: Document,
        options: LayoutOptions,
        pages: Vec<Page>,
        cursor: GenerationCursor,
    },
}

impl Default for WizardStep {
    fn default() -> Self { WizardStep::Input { mode: InputMode::Prompt } }
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        match self {
            Self::Input { .. } => 1,
            Self::Analysis { .. } => 2,
            Self::LayoutOptions { .. } => 3,
            Self::Preview { .. } => 4,
            Self::Generate { .. } => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Input { .. } => "Input",
            Self::Analysis { .. } => "Analysis",
            Self::LayoutOptions { .. } => "LayoutOptions",
            Self::Preview { .. } => "Preview",
            Self::Generate { .. } => "Generate",
        }
    }

    fn wrong(&self, expected: &'static str) -> WizardError {
        WizardError::WrongStep { expected, actual: self.name() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    Sequential,
    Regenerate,
}

/// One image request handed out by the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageJob {
    pub page: usize,
    pub slot: usize,
    pub prompt: String,
    pub kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum NextJob {
    /// Every page has been walked; nothing left to do.
    Complete,
    /// The current page was exhausted, the cursor moved on without a request.
    AdvancedPage { page: usize },
    Request(ImageJob),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Progress {
    Complete,
    AdvancedPage { page: usize },
    Generated { page: usize, slot: usize, succeeded: bool },
}

/// Replaces anything outside printable ASCII and `\n`, `\r`, `\t` with a space.
pub fn sanitize_upload(raw: &str) -> String {
    raw.chars()
        .map(|c| if matches!(c, '\x20'..='\x7E' | '\n' | '\r' | '\t') { c } else { ' ' })
        .collect()
}

/// Runs text analysis, degrading to the plain text with generic prompts on any failure.
pub async fn analyze_upload(text: &str, analyzer: &dyn TextAnalyzer) -> Document {
    match analyzer.analyze_text(text).await {
        Ok(outcome) => outcome.analysis.into(),
        Err(e) => {
            warn!("⚠️ Text analysis failed ({}), using the uploaded text as-is", e);
            Document::from_plain_text(text)
        }
    }
}

pub fn data_uri(b64: &str) -> String { format!("data:image/png;base64,{b64}") }

fn build_pages(document: &Document, options: &LayoutOptions) -> Vec<Page> {
    (0..options.total_pages)
        .map(|i| Page {
            id: i,
            title: page_title(&document.text),
            layout: options.layout_style,
            orientation: options.orientation,
            images: (0..options.images_per_page)
                .map(|j| ImageSlot::placeholder(i, j, &document.image_prompts))
                .collect(),
            text: document.text.clone(),
            text_display: TextDisplay::Compact,
        })
        .collect()
}

fn slot_mut(pages: &mut [Page], page: usize, slot: usize) -> Result<&mut ImageSlot, WizardError> {
    pages
        .get_mut(page)
        .ok_or(WizardError::UnknownPage(page))?
        .images
        .get_mut(slot)
        .ok_or(WizardError::UnknownSlot { page, slot })
}

/// The step plus what outlives it: the input mode chosen at step 1 and the
/// layout options last set at step 3.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wizard {
    step: WizardStep,
    mode: InputMode,
    layout: Option<LayoutOptions>,
}

impl Wizard {
    pub fn new() -> Self { Self::default() }

    pub fn step(&self) -> &WizardStep { &self.step }

    pub fn pages(&self) -> &[Page] {
        match &self.step {
            WizardStep::Preview { pages, .. } | WizardStep::Generate { pages, .. } => pages,
            _ => &[],
        }
    }

    pub fn rendered_pages(&self) -> Vec<RenderedPage> { self.pages().iter().map(render_page).collect() }

    fn transition(
        &mut self,
        f: impl FnOnce(WizardStep) -> Result<WizardStep, (WizardStep, WizardError)>,
    ) -> Result<(), WizardError> {
        let from = self.step.name();
        match f(std::mem::take(&mut self.step)) {
            Ok(next) => {
                info!("🧭 Wizard {} → {}", from, next.name());
                self.step = next;
                Ok(())
            }
            Err((unchanged, e)) => {
                self.step = unchanged;
                Err(e)
            }
        }
    }

    pub fn set_mode(&mut self, new_mode: InputMode) -> Result<(), WizardError> {
        match &mut self.step {
            WizardStep::Input { mode } => {
                *mode = new_mode;
                self.mode = new_mode;
                Ok(())
            }
            other => Err(other.wrong("Input")),
        }
    }

    fn require_mode(&self, wanted: InputMode) -> Result<(), WizardError> {
        match &self.step {
            WizardStep::Input { mode } if *mode == wanted => Ok(()),
            WizardStep::Input { .. } => Err(WizardError::InvalidInput(format!("Switch the input mode to {wanted:?} first"))),
            other => Err(other.wrong("Input")),
        }
    }

    /// Input → Analysis with an already produced document.
    pub fn accept_document(&mut self, document: Document) -> Result<(), WizardError> {
        self.transition(|step| match step {
            WizardStep::Input { .. } => Ok(WizardStep::Analysis { document }),
            other => {
                let e = other.wrong("Input");
                Err((other, e))
            }
        })?;
        // A new document is seeded from its own recommendations.
        self.layout = None;
        Ok(())
    }

    /// Prompt mode: synthesize a document from `topic` and move to Analysis.
    pub fn submit_prompt(&mut self, topic: &str, rng: &mut dyn RandomSource) -> Result<(), WizardError> {
        self.require_mode(InputMode::Prompt)?;
        let document = synthesize(topic, rng)?;
        self.accept_document(document)
    }

    /// File mode: checks the step and returns the sanitized text to analyze.
    pub fn prepare_upload(&self, raw: &str) -> Result<String, WizardError> {
        self.require_mode(InputMode::File)?;
        let text = sanitize_upload(raw);
        if text.trim().is_empty() {
            return Err(WizardError::InvalidInput("Uploaded text is empty".into()));
        }
        Ok(text)
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        let mode = self.mode;
        self.transition(|step| match step {
            WizardStep::Input { .. } => {
                let e = step.wrong("Analysis");
                Err((step, e))
            }
            WizardStep::Analysis { .. } => Ok(WizardStep::Input { mode }),
            WizardStep::LayoutOptions { document, .. } => Ok(WizardStep::Analysis { document }),
            WizardStep::Preview { editing: Some(_), .. } => Err((step, WizardError::Editing)),
            WizardStep::Preview { document, options, .. } => Ok(WizardStep::LayoutOptions { document, options }),
            WizardStep::Generate { cursor: GenerationCursor { loading: true, .. }, .. } => Err((step, WizardError::Busy)),
            WizardStep::Generate { document, options, pages, .. } => {
                Ok(WizardStep::Preview { document, options, pages, editing: None })
            }
        })
    }

    /// Analysis → LayoutOptions: the options set last time round, or the
    /// document's recommendations on first entry.
    pub fn continue_to_layout(&mut self) -> Result<(), WizardError> {
        let remembered = self.layout;
        self.transition(|step| match step {
            WizardStep::Analysis { document } => {
                let options = remembered.unwrap_or_else(|| LayoutOptions::recommended_for(&document));
                Ok(WizardStep::LayoutOptions { document, options })
            }
            other => {
                let e = other.wrong("Analysis");
                Err((other, e))
            }
        })
    }

    pub fn update_layout_options(&mut self, new_options: LayoutOptions) -> Result<(), WizardError> {
        match &mut self.step {
            WizardStep::LayoutOptions { options, .. } => {
                *options = new_options.clamped();
                self.layout = Some(*options);
                Ok(())
            }
            other => Err(other.wrong("LayoutOptions")),
        }
    }

    /// LayoutOptions → Preview: creates every page with placeholder slots.
    pub fn confirm_layout(&mut self) -> Result<(), WizardError> {
        self.transition(|step| match step {
            WizardStep::LayoutOptions { document, options } => {
                let pages = build_pages(&document, &options);
                info!("📄 Created {} pages with {} image(s) each", pages.len(), options.images_per_page);
                Ok(WizardStep::Preview { document, options, pages, editing: None })
            }
            other => {
                let e = other.wrong("LayoutOptions");
                Err((other, e))
            }
        })
    }

    pub fn start_editing(&mut self, page_id: usize) -> Result<(), WizardError> {
        match &mut self.step {
            WizardStep::Preview { pages, editing, .. } => {
                let page = pages.get(page_id).ok_or(WizardError::UnknownPage(page_id))?;
                *editing = Some(PageEditor {
                    page_id,
                    options: PageLayoutOptions {
                        layout: page.layout,
                        images_per_page: page.images.len(),
                        text_display: page.text_display,
                        orientation: page.orientation,
                    },
                });
                Ok(())
            }
            other => Err(other.wrong("Preview")),
        }
    }

    pub fn editor(&self) -> Option<&PageEditor> {
        match &self.step {
            WizardStep::Preview { editing, .. } => editing.as_ref(),
            _ => None,
        }
    }

    /// Applies `options` to the page being edited and leaves the editor.
    /// Existing slots are kept by position; growth adds fresh placeholders.
    pub fn apply_edit(&mut self, options: PageLayoutOptions) -> Result<(), WizardError> {
        match &mut self.step {
            WizardStep::Preview { document, pages, editing, .. } => {
                let editor = editing.take().ok_or_else(|| WizardError::InvalidInput("No page is being edited".into()))?;
                let page = pages.get_mut(editor.page_id).ok_or(WizardError::UnknownPage(editor.page_id))?;
                let count = options.images_per_page.clamp(1, MAX_IMAGES_PER_PAGE);

                page.layout = options.layout;
                page.orientation = options.orientation;
                page.text_display = options.text_display;
                page.images.truncate(count);
                let page_id = page.id;
                for j in page.images.len()..count {
                    page.images.push(ImageSlot::placeholder(page_id, j, &document.image_prompts));
                }
                debug!("✏️ Page {} now {:?} with {} image(s)", page_id, page.layout, count);
                Ok(())
            }
            other => Err(other.wrong("Preview")),
        }
    }

    pub fn cancel_edit(&mut self) -> Result<(), WizardError> {
        match &mut self.step {
            WizardStep::Preview { editing, .. } => {
                *editing = None;
                Ok(())
            }
            other => Err(other.wrong("Preview")),
        }
    }

    /// Preview → Generate: every slot waits, the cursor restarts at (0, 0).
    pub fn start_generation(&mut self) -> Result<(), WizardError> {
        self.transition(|step| match step {
            WizardStep::Preview { editing: Some(_), .. } => Err((step, WizardError::Editing)),
            WizardStep::Preview { document, options, mut pages, .. } => {
                for slot in pages.iter_mut().flat_map(|p| p.images.iter_mut()) {
                    slot.url = WAITING_PLACEHOLDER.to_string();
                }
                let cursor = GenerationCursor { complete: pages.is_empty(), ..GenerationCursor::default() };
                Ok(WizardStep::Generate { document, options, pages, cursor })
            }
            other => {
                let e = other.wrong("Preview");
                Err((other, e))
            }
        })
    }

    pub fn cursor(&self) -> Option<GenerationCursor> {
        match &self.step {
            WizardStep::Generate { cursor, .. } => Some(*cursor),
            _ => None,
        }
    }

    /// Advances the sequential loop by one step. Returns a request to run
    /// only when a slot is due; at most one request is ever outstanding.
    pub fn next_job(&mut self) -> Result<NextJob, WizardError> {
        let WizardStep::Generate { pages, cursor, .. } = &mut self.step else {
            return Err(self.step.wrong("Generate"));
        };
        if cursor.loading {
            return Err(WizardError::Busy);
        }
        if cursor.complete || cursor.page >= pages.len() {
            cursor.complete = true;
            return Ok(NextJob::Complete);
        }
        let page = &pages[cursor.page];
        if cursor.image >= page.images.len() {
            cursor.page += 1;
            cursor.image = 0;
            if cursor.page >= pages.len() {
                cursor.complete = true;
                info!("🏁 All {} pages generated", pages.len());
            }
            return Ok(NextJob::AdvancedPage { page: cursor.page });
        }
        cursor.loading = true;
        Ok(NextJob::Request(ImageJob {
            page: cursor.page,
            slot: cursor.image,
            prompt: page.images[cursor.image].prompt.clone(),
            kind: JobKind::Sequential,
        }))
    }

    /// Out-of-sequence request for a slot that has already been rendered.
    pub fn regenerate_job(&mut self, page: usize, slot: usize) -> Result<ImageJob, WizardError> {
        let WizardStep::Generate { pages, cursor, .. } = &mut self.step else {
            return Err(self.step.wrong("Generate"));
        };
        if cursor.loading {
            return Err(WizardError::Busy);
        }
        let prompt = slot_mut(pages, page, slot)?.prompt.clone();
        let rendered = cursor.complete || page < cursor.page || (page == cursor.page && slot < cursor.image);
        if !rendered {
            return Err(WizardError::NotRendered { page, slot });
        }
        cursor.loading = true;
        Ok(ImageJob { page, slot, prompt, kind: JobKind::Regenerate })
    }

    /// Stores a finished request: the image as a data URI, or the error
    /// placeholder. A sequential job also advances the cursor.
    pub fn finish_job(&mut self, job: &ImageJob, result: Result<GeneratedImage, GatewayError>) -> Result<Progress, WizardError> {
        let WizardStep::Generate { pages, cursor, .. } = &mut self.step else {
            return Err(self.step.wrong("Generate"));
        };
        if !cursor.loading || (job.kind == JobKind::Sequential && (job.page, job.slot) != (cursor.page, cursor.image)) {
            return Err(WizardError::StaleJob);
        }
        let slot = slot_mut(pages, job.page, job.slot)?;
        let succeeded = match result {
            Ok(image) => {
                slot.url = data_uri(&image.b64_json);
                true
            }
            Err(e) => {
                warn!("❌ Image {} failed: {}", slot.id, e);
                slot.url = ERROR_PLACEHOLDER.to_string();
                false
            }
        };
        cursor.loading = false;
        if job.kind == JobKind::Sequential {
            cursor.image += 1;
        }
        Ok(Progress::Generated { page: job.page, slot: job.slot, succeeded })
    }

    /// Pages ready for printing: only once generation has completed.
    pub fn printable_pages(&self) -> Result<&[Page], WizardError> {
        match &self.step {
            WizardStep::Generate { pages, cursor, .. } if cursor.complete => Ok(pages),
            WizardStep::Generate { .. } => Err(WizardError::GenerationIncomplete),
            other => Err(other.wrong("Generate")),
        }
    }
}
