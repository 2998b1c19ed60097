//! Sentence segmentation for narration scripts.
//!
//! Sentences end at runs of `.`, `!`, `?` or `…` (optionally followed by
//! closing quotes or brackets) that are followed by whitespace or the end of
//! the script. Periods get extra scrutiny: abbreviations, single-letter
//! initials and a lowercase continuation all keep the sentence open.

use std::collections::HashSet;

/// Common English abbreviations that end with a period but rarely end a sentence.
const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "e.g", "i.e", "etc", "inc",
    "ltd", "co", "corp", "dept", "approx", "fig", "gen", "gov", "lt", "col", "capt", "sgt", "rev",
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "a.m",
    "p.m", "u.s", "u.k",
];

/// Rule-based sentence splitter.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    abbreviations: HashSet<String>,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::with_abbreviations(DEFAULT_ABBREVIATIONS.iter().copied())
    }
}

impl SentenceSplitter {
    /// Create a splitter that only knows the given abbreviations.
    ///
    /// Entries are matched case-insensitively and without their final period
    /// (`"Dr"` or `"dr."` both cover `Dr.`).
    pub fn with_abbreviations<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let abbreviations = abbreviations
            .into_iter()
            .map(|a| a.as_ref().trim_end_matches('.').to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { abbreviations }
    }

    /// Split `text` into trimmed, non-empty sentences in reading order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0usize;
        let mut i = 0usize;

        while i < chars.len() {
            if !is_terminal(chars[i].1) {
                i += 1;
                continue;
            }

            let run_start = i;
            let mut j = i;
            while j < chars.len() && is_terminal(chars[j].1) {
                j += 1;
            }
            let periods_only = chars[run_start..j].iter().all(|&(_, c)| c == '.');
            while j < chars.len() && is_closing(chars[j].1) {
                j += 1;
            }

            let end = chars.get(j).map_or(text.len(), |&(byte, _)| byte);
            let followed_by_space = chars.get(j).is_none_or(|&(_, c)| c.is_whitespace());

            if followed_by_space
                && (!periods_only || self.period_ends_sentence(text, start, chars[run_start].0, end))
            {
                push_sentence(&mut sentences, &text[start..end]);
                start = end;
            }
            i = j;
        }

        push_sentence(&mut sentences, &text[start..]);
        sentences
    }

    fn period_ends_sentence(&self, text: &str, start: usize, period: usize, end: usize) -> bool {
        let next = text[end..].trim_start().chars().next();
        let Some(next) = next else {
            return true;
        };
        if next.is_lowercase() {
            return false;
        }

        let word = text[start..period]
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .trim_start_matches(is_opening);
        if word.is_empty() {
            return true;
        }

        let mut letters = word.chars();
        if let (Some(c), None) = (letters.next(), letters.next()) {
            if c.is_alphabetic() {
                return false;
            }
        }

        !self.abbreviations.contains(&word.to_lowercase())
    }
}

/// Split `text` into sentences with the default English abbreviations.
pub fn split_sentences(text: &str) -> Vec<String> {
    SentenceSplitter::default().split(text)
}

/// Normalize scraped or hand-pasted text before splitting.
///
/// Decodes `&nbsp;` and `&amp;`, drops stray backslashes and folds every run
/// of whitespace (tabs and newlines included) into a single space.
pub fn clean_script(text: &str) -> String {
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace('\\', "");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}' | '»')
}

fn is_opening(c: char) -> bool {
    matches!(c, '"' | '\'' | '(' | '[' | '\u{201c}' | '\u{2018}' | '«')
}
