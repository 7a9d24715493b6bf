//! Prompt Composition and Language Policy
//!
//! Maps language codes to localized instructions and caption caps, and
//! composes the two pipeline prompts: the vision prompt (base template +
//! language instruction, context ignored) and the refinement prompt (stage-1
//! description + labeled context block + output requirements).

use crate::constants::caption;
use crate::types::EntityContext;

/// Default vision instruction when the host configures no template
pub const DEFAULT_VISION_PROMPT: &str = "Describe this image in detail.";

/// Per-language policy: localized instructions, display name, caption cap
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    pub code: &'static str,
    /// Human-readable name interpolated into the refinement requirements
    pub display_name: &'static str,
    /// Localized instruction appended to the vision prompt
    pub vision_instruction: &'static str,
    /// Localized instruction appended to the refinement requirements
    pub refine_instruction: &'static str,
    /// Visible-character cap for the final caption
    pub caption_cap: usize,
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "en",
        display_name: "English",
        vision_instruction: "Write the description in English, keep it under 120 characters.",
        refine_instruction: "Respond in English only.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "zh",
        display_name: "繁體中文",
        vision_instruction: "請用繁體中文描述，不超過50個中文字。",
        refine_instruction: "請以繁體中文回覆。",
        caption_cap: caption::DENSE_SCRIPT_CAP,
    },
    LanguageProfile {
        code: "zh-cn",
        display_name: "简体中文",
        vision_instruction: "请用简体中文描述，不超过50个中文字。",
        refine_instruction: "请以简体中文回复。",
        caption_cap: caption::DENSE_SCRIPT_CAP,
    },
    LanguageProfile {
        code: "ja",
        display_name: "日本語",
        vision_instruction: "日本語で説明してください。50文字以内でお願いします。",
        refine_instruction: "日本語で回答してください。",
        caption_cap: caption::DENSE_SCRIPT_CAP,
    },
    LanguageProfile {
        code: "ko",
        display_name: "한국어",
        vision_instruction: "한국어로 설명해주세요. 50자 이내로 작성해주세요.",
        refine_instruction: "한국어로 답변해주세요.",
        caption_cap: caption::DENSE_SCRIPT_CAP,
    },
    LanguageProfile {
        code: "fr",
        display_name: "Français",
        vision_instruction: "Écrivez la description en français, en moins de 120 caractères.",
        refine_instruction: "Répondez uniquement en français.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "de",
        display_name: "Deutsch",
        vision_instruction: "Beschreiben Sie auf Deutsch, unter 120 Zeichen.",
        refine_instruction: "Antworten Sie nur auf Deutsch.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "es",
        display_name: "Español",
        vision_instruction: "Escriba la descripción en español, menos de 120 caracteres.",
        refine_instruction: "Responda únicamente en español.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "it",
        display_name: "Italiano",
        vision_instruction: "Scrivi la descrizione in italiano, sotto 120 caratteri.",
        refine_instruction: "Rispondi solo in italiano.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "pt",
        display_name: "Português",
        vision_instruction: "Escreva a descrição em português, menos de 120 caracteres.",
        refine_instruction: "Responda apenas em português.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "ru",
        display_name: "Русский",
        vision_instruction: "Опишите на русском языке, менее 120 символов.",
        refine_instruction: "Отвечайте только на русском языке.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
    LanguageProfile {
        code: "ar",
        display_name: "العربية",
        vision_instruction: "اكتب الوصف بالعربية، أقل من 120 حرفاً.",
        refine_instruction: "أجب بالعربية فقط.",
        caption_cap: caption::ALPHABETIC_CAP,
    },
];

/// Look up the profile for a language code; unknown codes use English.
pub fn profile(language: &str) -> &'static LanguageProfile {
    let lang = language.trim().to_ascii_lowercase();
    PROFILES
        .iter()
        .find(|p| p.code == lang)
        // "zh-tw" and friends share the base-language entry
        .or_else(|| {
            let base = lang.split('-').next().unwrap_or(&lang);
            PROFILES.iter().find(|p| p.code == base)
        })
        .unwrap_or(&PROFILES[0])
}

/// Compose the stage-1 vision prompt: base template plus the localized
/// language instruction. Entity context is deliberately not included.
pub fn vision_prompt(base_override: Option<&str>, language: &str) -> String {
    let base = base_override.unwrap_or(DEFAULT_VISION_PROMPT).trim();
    format!("{} {}", base, profile(language).vision_instruction)
}

/// Compose the stage-2 refinement prompt embedding the stage-1 description
/// and one labeled line per non-empty context field. An all-empty context
/// gets an explicit marker rather than an omitted section.
pub fn refine_prompt(
    description: &str,
    context: Option<&EntityContext>,
    base_override: Option<&str>,
    language: &str,
) -> String {
    let lang = profile(language);
    let intro = base_override.unwrap_or(
        "You are a web accessibility expert. Generate concise alt text for an image using the information below.",
    );

    let mut prompt = format!("{intro}\n\nImage description: {description}\n\n");

    let context_block = context.map(format_context_block).unwrap_or_default();
    if context_block.is_empty() {
        prompt.push_str("No additional context is available.\n");
    } else {
        prompt.push_str("Page context:\n");
        prompt.push_str(&context_block);
        prompt.push_str("Combine the article topic with the image description so the alt text fits the page.\n");
    }

    prompt.push_str(&format!(
        "\nRequirements:\n\
         - Language: {}. {}\n\
         - At most {} characters\n\
         - Return the alt text only, with no prefix or explanation\n\
         - Meet accessibility standards\n",
        lang.display_name, lang.refine_instruction, lang.caption_cap
    ));

    prompt
}

/// One labeled line per non-empty context field, in a fixed order.
fn format_context_block(context: &EntityContext) -> String {
    let mut block = String::new();

    if !context.title.trim().is_empty() {
        block.push_str(&format!("Title: {}\n", context.title.trim()));
    }
    if !context.excerpt.trim().is_empty() {
        let excerpt: String = context
            .excerpt
            .trim()
            .chars()
            .take(caption::EXCERPT_PROMPT_LEN)
            .collect();
        block.push_str(&format!("Content excerpt: {excerpt}\n"));
    }
    if !context.categories.is_empty() {
        block.push_str(&format!("Categories: {}\n", context.categories.join(", ")));
    }
    if !context.tags.is_empty() {
        block.push_str(&format!("Tags: {}\n", context.tags.join(", ")));
    }
    if !context.entity_type.trim().is_empty() {
        block.push_str(&format!("Content type: {}\n", context.entity_type.trim()));
    }

    block
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup() {
        assert_eq!(profile("en").display_name, "English");
        assert_eq!(profile("ja").caption_cap, caption::DENSE_SCRIPT_CAP);
        assert_eq!(profile("ZH").display_name, "繁體中文");
    }

    #[test]
    fn test_profile_regional_variant_uses_base() {
        assert_eq!(profile("zh-TW").display_name, "繁體中文");
        assert_eq!(profile("zh-cn").display_name, "简体中文");
        assert_eq!(profile("pt-BR").display_name, "Português");
    }

    #[test]
    fn test_profile_unknown_falls_back_to_english() {
        assert_eq!(profile("tlh").display_name, "English");
        assert_eq!(profile("").display_name, "English");
    }

    #[test]
    fn test_vision_prompt_appends_language_instruction() {
        let prompt = vision_prompt(None, "de");
        assert!(prompt.starts_with(DEFAULT_VISION_PROMPT));
        assert!(prompt.contains("Deutsch"));
    }

    #[test]
    fn test_vision_prompt_honors_override() {
        let prompt = vision_prompt(Some("Describe the product."), "en");
        assert!(prompt.starts_with("Describe the product."));
        assert!(prompt.contains("English"));
    }

    #[test]
    fn test_refine_prompt_includes_context_fields() {
        let ctx = EntityContext {
            title: "Cycling in Copenhagen".into(),
            excerpt: "The city has more bikes than people.".into(),
            categories: vec!["Travel".into(), "Cycling".into()],
            tags: vec!["denmark".into()],
            entity_type: "post".into(),
        };
        let prompt = refine_prompt("A red bicycle.", Some(&ctx), None, "en");

        assert!(prompt.contains("Image description: A red bicycle."));
        assert!(prompt.contains("Title: Cycling in Copenhagen"));
        assert!(prompt.contains("Categories: Travel, Cycling"));
        assert!(prompt.contains("Tags: denmark"));
        assert!(prompt.contains("Content type: post"));
        assert!(prompt.contains("Language: English"));
        assert!(prompt.contains("120"));
    }

    #[test]
    fn test_refine_prompt_empty_context_uses_marker() {
        let prompt = refine_prompt("A dog.", Some(&EntityContext::default()), None, "en");
        assert!(prompt.contains("No additional context is available."));
        assert!(!prompt.contains("Page context:"));
    }

    #[test]
    fn test_refine_prompt_no_context_uses_marker() {
        let prompt = refine_prompt("A dog.", None, None, "zh");
        assert!(prompt.contains("No additional context is available."));
        assert!(prompt.contains("繁體中文"));
        assert!(prompt.contains("請以繁體中文回覆。"));
        assert!(prompt.contains("50"));
    }

    #[test]
    fn test_refine_prompt_truncates_excerpt() {
        let ctx = EntityContext {
            excerpt: "word ".repeat(100),
            ..Default::default()
        };
        let prompt = refine_prompt("A dog.", Some(&ctx), None, "en");
        let line = prompt
            .lines()
            .find(|l| l.starts_with("Content excerpt:"))
            .unwrap();
        assert!(line.chars().count() <= "Content excerpt: ".len() + caption::EXCERPT_PROMPT_LEN);
    }

    #[test]
    fn test_refine_prompt_skips_empty_fields() {
        let ctx = EntityContext {
            title: "Only a title".into(),
            ..Default::default()
        };
        let prompt = refine_prompt("A dog.", Some(&ctx), None, "en");
        assert!(prompt.contains("Title: Only a title"));
        assert!(!prompt.contains("Categories:"));
        assert!(!prompt.contains("Content excerpt:"));
    }
}
