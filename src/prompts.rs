//! Prompts for the outline request and the placeholder outline.
//!
//! Centralising every prompt here keeps prompt wording out of the stage
//! logic and lets unit tests inspect prompts without a model.
//!
//! Callers can replace the system prompt via
//! [`crate::config::GenerationConfig::system_prompt`]; the language block is
//! only part of the built-in prompt.

use crate::request::Language;

/// Suffix every image prompt must end with so the image model draws no glyphs.
pub const NO_TEXT_DIRECTIVE: &str = "no text no letters no words";

/// Background prompt used by the placeholder outline.
pub const PLACEHOLDER_IMAGE_PROMPT: &str = "Abstract modern corporate gradient background for a \
presentation slide, deep blue to purple gradient, subtle geometric shapes, soft lighting, clean \
and minimal, professional business style, 4K high resolution, no text no letters no words";

const SYSTEM_PROMPT_BODY: &str = r#"You are a professional presentation planner and an expert at writing prompts for text-to-image models.
Turn the user's text into structured data for a slide deck.

{language}

For every slide produce:
1. title: a short, punchy title (at most about 10 words) in the requested language
2. content: 2-4 key points in the requested language, separated by semicolons (;)
3. image_prompt: an English prompt for the slide's background image

Rules for image_prompt:
- Always English
- Describe a pure visual background: abstract patterns, gradients, textures, light effects, geometric or technology motifs
- NEVER include text, titles, letters, numbers, people, characters, or concrete objects
- Keep enough contrast for white text overlaid on a dark band
- Professional, modern, designed look
- End every image_prompt with "no text no letters no words"

Deck structure:
1. Slide 1 is the cover: a striking gradient or light-effect background; its content is a one-line subtitle
2. Middle slides carry the substantive content: calm backgrounds that do not compete with the text
3. The final slide is a closing / thank-you page: warm, professional background
4. Keep the narrative coherent and the points distinct

Output must be a valid JSON array and nothing else:
[
  {
    "slide_number": 1,
    "title": "Title in the requested language",
    "content": "Point 1; Point 2; Point 3",
    "image_prompt": "Abstract modern gradient background for presentation, blue and purple colors blending smoothly, subtle geometric shapes, soft lighting effects, professional corporate style, clean and minimal, 4K high resolution, no text no letters no words"
  }
]"#;

const CHINESE_BLOCK: &str = "【重要】语言要求：
- title（标题）必须使用中文
- content（内容要点）必须使用中文
- image_prompt 保持英文，只描述背景画面";

const ENGLISH_BLOCK: &str = "IMPORTANT language requirements:
- title must be in English
- content must be in English
- image_prompt must be in English";

const JAPANESE_BLOCK: &str = "【重要】言語要件：
- title（タイトル）は日本語で記述
- content（内容）は日本語で記述
- image_promptは英語で記述し、背景のみを描写";

/// Language instructions inserted into the built-in system prompt.
pub fn language_instruction(language: &Language) -> String {
    match language {
        Language::Chinese => CHINESE_BLOCK.to_string(),
        Language::English => ENGLISH_BLOCK.to_string(),
        Language::Japanese => JAPANESE_BLOCK.to_string(),
        Language::Other(tag) => format!(
            "IMPORTANT language requirements:\n\
- title and content must be written in {tag}\n\
- image_prompt stays in English"
        ),
    }
}

/// Built-in outline system prompt for `language`.
pub fn system_prompt(language: &Language) -> String {
    SYSTEM_PROMPT_BODY.replace("{language}", &language_instruction(language))
}

/// The count-and-topic instruction sent as the user turn.
pub fn user_prompt(text: &str, slide_count: usize) -> String {
    format!(
        "Create the structure of a {slide_count}-slide presentation from the following content:\n\n\
{text}\n\n\
Output the JSON array directly, without markdown code fences."
    )
}
