/// Discord rejects message content longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Splits `text` into chunks of at most `limit` characters, preferring to cut
/// after a newline in the second half of a chunk. A zero `limit` is treated as
/// one character.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let head = &rest[..hard];
        let cut = match head.rfind('\n') {
            Some(i) if head[..i].chars().count() >= limit / 2 => i + 1,
            _ => hard,
        };

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Last `limit` characters of `text`, with a leading ellipsis when cut.
pub fn preview_tail(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }

    let skip = count - limit + 1;
    let mut out = String::from("…");
    out.extend(text.chars().skip(skip));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("안녕하세요", 2000), vec!["안녕하세요"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn splits_on_char_boundaries() {
        let text = "가".repeat(25);
        let chunks = split_message(&text, 10);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(7), "b".repeat(7));
        let chunks = split_message(&text, 10);

        assert_eq!(chunks, vec![format!("{}\n", "a".repeat(7)), "b".repeat(7)]);
    }

    #[test]
    fn zero_limit_still_terminates() {
        assert_eq!(split_message("abc", 0), vec!["a", "b", "c"]);
        assert_eq!(split_message("\n\n", 0), vec!["\n", "\n"]);
    }

    #[test]
    fn preview_keeps_the_tail() {
        assert_eq!(preview_tail("abc", 5), "abc");

        let preview = preview_tail("0123456789", 5);
        assert_eq!(preview, "…6789");
        assert_eq!(preview.chars().count(), 5);
    }
}
