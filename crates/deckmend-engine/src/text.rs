//! Small text helpers shared by the extractor and the normalizer.

/// Abbreviations whose period does not end a sentence.
const ABBREVIATIONS: &[&str] = &["fig.", "figs.", "e.g.", "i.e.", "vs.", "etc.", "dr.", "et al."];

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether `text` ends in `?`, `.` or `!` (ignoring trailing whitespace).
pub fn has_terminal_punctuation(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some('?' | '.' | '!'))
}

/// Append `mark` unless the text already ends in terminal punctuation.
pub fn ensure_terminal(text: &str, mark: char) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || has_terminal_punctuation(trimmed) {
        trimmed.to_string()
    } else {
        // "movement;" reads better as "movement." than "movement;."
        let base = trimmed.trim_end_matches([',', ';', ':']);
        format!("{}{}", base, mark)
    }
}

/// Uppercase the first character.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `X` from "What is X?", "Which are X?" or "What characterizes X?".
pub fn question_subject(question: &str) -> Option<&str> {
    let lower = question.to_lowercase();
    let rest_at = ["what is ", "what are ", "which is ", "which are ", "what characterizes "]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| prefix.len())?;
    let subject = question.get(rest_at..)?.trim().trim_end_matches('?').trim();
    (!subject.is_empty()).then_some(subject)
}

/// Split text into sentences, each keeping its trailing whitespace.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// the text, except after common abbreviations such as `Fig.`. Joining the
/// spans gives back the input exactly.
pub fn sentence_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_break = match chars.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace(),
        };
        if !at_break || (c == '.' && ends_with_abbreviation(&text[start..=i])) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some((j, ws)) = chars.peek().copied() {
            if !ws.is_whitespace() {
                break;
            }
            end = j + ws.len_utf8();
            chars.next();
        }
        spans.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        spans.push(&text[start..]);
    }
    spans
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    ABBREVIATIONS.iter().any(|abbr| {
        lower.ends_with(abbr)
            && lower[..lower.len() - abbr.len()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_rejoin_to_input() {
        let text = "Neurons fire. See Fig. 4.2 for details!  Glia support them? yes";
        let spans = sentence_spans(text);
        assert_eq!(
            spans,
            vec!["Neurons fire. ", "See Fig. 4.2 for details!  ", "Glia support them? ", "yes"]
        );
        assert_eq!(spans.concat(), text);
    }

    #[test]
    fn decimals_do_not_split() {
        assert_eq!(sentence_spans("Pi is 3.14 roughly."), vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn terminal_punctuation() {
        assert!(has_terminal_punctuation("Done. "));
        assert!(!has_terminal_punctuation("Not done"));
        assert_eq!(ensure_terminal("movement;", '.'), "movement.");
        assert_eq!(ensure_terminal("What is it", '?'), "What is it?");
        assert_eq!(ensure_terminal("Already!", '.'), "Already!");
    }

    #[test]
    fn capitalizes_first_letter() {
        assert_eq!(capitalize("the soma"), "The soma");
        assert_eq!(capitalize(""), "");
    }
}
