//! 新图层命名。

/// 名称中保留的提示词单词数上限。
pub const LAYER_NAME_WORDS: usize = 5;

/// `"Gemini Gen: {前 5 个单词}..."`，单词按空白切分。
pub fn layer_name(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().take(LAYER_NAME_WORDS).collect();
    format!("Gemini Gen: {}...", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_at_most_five_words() {
        assert_eq!(
            layer_name("a red fox jumping over seven lazy dogs quickly"),
            "Gemini Gen: a red fox jumping over..."
        );
    }

    #[test]
    fn short_prompt_and_extra_whitespace() {
        assert_eq!(layer_name("sunset"), "Gemini Gen: sunset...");
        assert_eq!(layer_name("  two\t\nwords  "), "Gemini Gen: two words...");
    }
}
