//! Topic-driven document synthesis.
//!
//! Builds a markdown document (title, introduction, 2–4 body sections and a
//! conclusion) plus matching image prompts from a free-text topic. Every
//! random choice goes through a [`RandomSource`], so a scripted source yields
//! exact output.

use thiserror::Error;
use tracing::{info, warn};

use crate::layout::{LayoutStyle, Orientation};
use crate::models::{Document, LayoutRecommendation};
use crate::random::RandomSource;

const STOP_WORDS: [&str; 11] = ["about", "with", "that", "this", "these", "those", "there", "their", "from", "have", "been"];

const IMAGE_PROMPT_LEADS: [&str; 5] = [
    "A photorealistic representation of",
    "A detailed illustration showing",
    "An abstract visualization depicting",
    "A conceptual diagram explaining",
    "A high-quality infographic about",
];

const MIN_PROMPTS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthError {
    #[error("Topic must not be empty")]
    EmptyTopic,
    #[error("Random draw {draw} out of range for {len} choices")]
    OutOfRange { draw: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Educational,
    Business,
    Technical,
    Creative,
    General,
}

impl TopicKind {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Educational => &["guide", "learn", "course", "tutorial", "education", "study", "teach"],
            Self::Business => &["business", "market", "company", "startup", "enterprise", "corporate", "industry"],
            Self::Technical => &["software", "hardware", "code", "programming", "technology", "system", "data"],
            Self::Creative => &["art", "design", "creative", "story", "novel", "poetry", "fiction"],
            Self::General => &[],
        }
    }

    /// First matching kind wins, in this order.
    pub fn classify(words: &[String]) -> Self {
        [Self::Educational, Self::Business, Self::Technical, Self::Creative]
            .into_iter()
            .find(|kind| words.iter().any(|w| kind.keywords().contains(&w.as_str())))
            .unwrap_or(Self::General)
    }

    fn title(self, topic: &str) -> String {
        match self {
            Self::Educational => format!("The Complete Guide to {topic}"),
            Self::Business => format!("{topic}: Market Analysis and Insights"),
            Self::Technical => format!("Understanding {topic}: Technical Overview"),
            Self::Creative => format!("Exploring {topic} Through Creative Expression"),
            Self::General => format!("{topic}: An In-depth Analysis"),
        }
    }

    fn sections(self) -> [&'static str; 4] {
        match self {
            Self::Educational => ["Key Concepts", "Learning Approaches", "Practical Applications", "Future Directions"],
            Self::Business => ["Market Overview", "Strategic Considerations", "Competitive Analysis", "Growth Opportunities"],
            Self::Technical => ["Technical Foundation", "System Architecture", "Implementation Strategies", "Performance Optimization"],
            Self::Creative => ["Creative Process", "Artistic Elements", "Inspiration Sources", "Expressive Techniques"],
            Self::General => ["Background", "Main Considerations", "Key Benefits", "Future Outlook"],
        }
    }

    pub fn recommended_style(self) -> LayoutStyle {
        match self {
            Self::Educational | Self::Technical => LayoutStyle::Classic,
            Self::Creative => LayoutStyle::Magazine,
            Self::Business | Self::General => LayoutStyle::Modern,
        }
    }
}

/// Lower-cased content words: longer than three characters, stop words removed.
pub fn content_words(topic: &str) -> Vec<String> {
    topic
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || ".,!?;:()[]{}'\"".contains(c))
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn sentence(template: usize, cap: &str, lower: &str, section: &str) -> Result<String, SynthError> {
    let s = section.to_lowercase();
    let line = match template {
        0 => format!("{cap} provides significant advantages in the context of {s}."),
        1 => format!("Many experts consider {lower} essential when discussing {s}."),
        2 => format!("Research has shown that {lower} can dramatically improve outcomes related to {s}."),
        3 => format!("When implementing {lower}, it's crucial to consider various aspects of {s}."),
        4 => format!("The relationship between {lower} and {s} continues to evolve in interesting ways."),
        5 => format!("Recent developments in {lower} have transformed our understanding of {s}."),
        6 => format!("Organizations that effectively leverage {lower} often excel in {s}."),
        7 => format!("A comprehensive approach to {lower} must address key elements of {s}."),
        other => return Err(SynthError::OutOfRange { draw: other, len: SENTENCE_TEMPLATES }),
    };
    Ok(line)
}

const SENTENCE_TEMPLATES: usize = 8;

fn build(topic: &str, rng: &mut dyn RandomSource) -> Result<Document, SynthError> {
    let kind = TopicKind::classify(&content_words(topic));
    let cap = capitalize(topic);
    let lower = topic.to_lowercase();

    let mut text = format!("# {}\n\n", kind.title(&cap));
    text.push_str("## Introduction\n\n");
    text.push_str(&format!(
        "{cap} has become increasingly important in today's rapidly evolving world. \
         This document explores the key aspects, benefits, and applications of {lower}, \
         providing valuable insights for readers interested in this subject.\n\n"
    ));

    let section_count = rng.between(2, 4);
    let all_sections = kind.sections();
    let sections = all_sections
        .get(..section_count)
        .ok_or(SynthError::OutOfRange { draw: section_count, len: all_sections.len() })?;

    for section in sections {
        text.push_str(&format!("## {section}\n\n"));
        for _ in 0..rng.between(2, 3) {
            let sentences = (0..rng.between(3, 5))
                .map(|_| sentence(rng.below(SENTENCE_TEMPLATES), &cap, &lower, section))
                .collect::<Result<Vec<_>, _>>()?;
            text.push_str(&sentences.join(" "));
            text.push_str("\n\n");
        }
    }

    text.push_str("## Conclusion\n\n");
    text.push_str(&format!(
        "In summary, {lower} represents a critical area worthy of attention and further exploration. \
         By understanding the key elements discussed in this document, readers can better appreciate the significance \
         and potential applications of {lower} in various contexts. \
         As developments continue to emerge, the importance of staying informed about {lower} \
         will only increase in the coming years.\n\n"
    ));

    let mut image_prompts: Vec<String> = sections
        .iter()
        .enumerate()
        .map(|(i, section)| format!("{} {topic} in the context of {section}", IMAGE_PROMPT_LEADS[i % IMAGE_PROMPT_LEADS.len()]))
        .collect();
    while image_prompts.len() < MIN_PROMPTS {
        image_prompts.push(format!("A creative visualization of {topic} from a unique perspective"));
    }

    info!(kind = ?kind, sections = section_count, prompts = image_prompts.len(), "📝 Synthesized document");

    Ok(Document {
        text,
        image_prompts,
        recommended: LayoutRecommendation {
            style: kind.recommended_style(),
            images_per_page: 1,
            orientation: Orientation::Portrait,
        },
    })
}

/// One-line document with generic prompts, used when synthesis fails.
pub fn fallback_document(topic: &str) -> Document {
    Document {
        text: format!("# {topic}\n\nThis is a basic overview of {topic}. The content generation encountered an error."),
        image_prompts: vec![
            format!("A visualization of {topic}"),
            format!("An illustration related to {topic}"),
            format!("A conceptual image of {topic}"),
        ],
        recommended: LayoutRecommendation::default(),
    }
}

/// Synthesizes a document for `topic`. Only an empty topic is an error; any
/// failure while building degrades to [`fallback_document`].
pub fn synthesize(topic: &str, rng: &mut dyn RandomSource) -> Result<Document, SynthError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(SynthError::EmptyTopic);
    }
    Ok(build(topic, rng).unwrap_or_else(|e| {
        warn!("⚠️ Content synthesis failed for '{}': {}, using fallback", topic, e);
        fallback_document(topic)
    }))
}
