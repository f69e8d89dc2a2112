use domain::{AnalysisParams, SummaryLength, Tone};
use serde_json::{json, Value};

pub const ELI5_SYSTEM_PROMPT: &str = "Rewrite the following analysis of a Reddit thread so that a \
five year old could follow it. Use short sentences and everyday words. Keep every main point.";

pub const IMAGE_PROMPT: &str = "This image is attached to a Reddit post. Describe what it shows \
and anything in it that matters for understanding the discussion.";

pub const PAGE_SYSTEM_PROMPT: &str = "You are given the text of a web page linked from a Reddit \
post. Summarize what it says in one or two paragraphs, focusing on facts the discussion may \
refer to.";

/// Upper bound on page text handed to the model.
pub const MAX_PAGE_CHARS: usize = 20_000;

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Teacher => "Write like a patient teacher: clear, structured and neutral.",
        Tone::Pompous => {
            "Write like a pompous aristocrat who finds the whole discussion faintly beneath them."
        }
        Tone::Foulmouthed => "Write like a foulmouthed but sharp friend who does not sugarcoat anything.",
        Tone::ClickbaiterYoutuber => {
            "Write like an over-excited YouTuber chasing clicks, while staying factually accurate."
        }
    }
}

fn length_instruction(length: SummaryLength) -> &'static str {
    match length {
        SummaryLength::Short => "Keep it short: a few sentences, proportional to a small thread.",
        SummaryLength::Medium => "Use a medium length: a handful of paragraphs.",
        SummaryLength::Long => "Be thorough: cover every notable sub-discussion in detail.",
    }
}

pub fn summary_system_prompt(params: &AnalysisParams) -> String {
    format!(
        "You analyse Reddit threads. You receive the title, the original post, any image \
         descriptions and linked page summaries, and the full comment tree as JSON; each comment \
         has an author, score, depth and replies. Summarize the thread with this focus: {}. {} {} \
         Point out where the community agrees, where it disagrees, and which answers it \
         rewarded.",
        params.summary_focus,
        length_instruction(params.summary_length),
        tone_instruction(params.tone),
    )
}

/// Schema of the structured summary reply.
pub fn summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" }
        },
        "required": ["summary"]
    })
}

/// Truncates on a char boundary.
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
