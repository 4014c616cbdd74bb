//! Prompt templates for phrase recommendation.

/// Default instructions sent ahead of each page's text.
///
/// Asks for a bare JSON array so the response can be parsed directly after
/// fence stripping. The exact-substring requirement matters: anything the
/// model paraphrases cannot be located on the page and is dropped.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"You are helping a student study a document. Read the page text below and pick the phrases most worth highlighting: key definitions, important claims, and facts likely to appear on an exam.

Respond with ONLY a JSON array, no prose and no markdown fences. Each element must be an object with exactly two string fields:
  "phrase": an EXACT, character-for-character substring copied from the page text
  "details": one short sentence explaining why this phrase matters

Rules:
- Copy each phrase verbatim from the text, including punctuation and capitalisation. Do not paraphrase, shorten, or fix typos.
- Prefer 3 to 8 phrases per page. If the page has nothing worth highlighting, return [].
- Keep each phrase under roughly 200 characters."#;

/// Assembles the full prompt for one page.
pub fn build_prompt(instructions: &str, page_text: &str) -> String {
    format!("{instructions}\n\nText:\n{page_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_page_text() {
        let p = build_prompt(DEFAULT_ANALYSIS_PROMPT, "Mitochondria are organelles.");
        assert!(p.starts_with(DEFAULT_ANALYSIS_PROMPT));
        assert!(p.ends_with("Text:\nMitochondria are organelles."));
    }

    #[test]
    fn default_prompt_demands_json_array() {
        assert!(DEFAULT_ANALYSIS_PROMPT.contains("JSON array"));
        assert!(DEFAULT_ANALYSIS_PROMPT.contains("\"phrase\""));
        assert!(DEFAULT_ANALYSIS_PROMPT.contains("\"details\""));
    }
}
