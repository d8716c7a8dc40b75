//! Tokenization shared by text query parsing and document matching.

use crate::utils::ValidationError;

/// Wildcard matching zero or more characters
pub const ANY_MANY: char = '*';
/// Wildcard matching exactly one character
pub const ANY_ONE: char = '?';

/// One term of a free-text query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTerm {
    /// A single lowercased token; may contain `*` or `?`
    Term(String),
    /// A quoted phrase: consecutive lowercased tokens, no wildcards
    Phrase(Vec<String>),
}

impl TextTerm {
    pub fn has_wildcard(&self) -> bool {
        match self {
            TextTerm::Term(t) => has_wildcard(t),
            TextTerm::Phrase(_) => false,
        }
    }
}

pub fn has_wildcard(s: &str) -> bool {
    s.contains(ANY_MANY) || s.contains(ANY_ONE)
}

/// Split document text into lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    split_tokens(text, |c| c.is_alphanumeric())
}

fn tokenize_query_word(word: &str) -> Vec<String> {
    split_tokens(word, |c| c.is_alphanumeric() || c == ANY_MANY || c == ANY_ONE)
}

fn split_tokens(text: &str, keep: impl Fn(char) -> bool) -> Vec<String> {
    text.split(|c: char| !keep(c))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Parse a free-text parameter value into terms.
///
/// Double quotes delimit exact phrases; unquoted words may carry `*`/`?`
/// wildcards. A word with internal punctuation (`de-sitter`) becomes a
/// phrase of its parts unless one of the parts is a wildcard, in which case
/// each part is a separate term.
pub fn parse_text_terms(parameter: &str, raw: &str) -> Result<Vec<TextTerm>, ValidationError> {
    if raw.matches('"').count() % 2 != 0 {
        return Err(ValidationError::invalid(parameter, raw, "unterminated quote"));
    }

    let mut terms = Vec::new();
    for (i, chunk) in raw.split('"').enumerate() {
        let quoted = i % 2 == 1;
        if quoted {
            let tokens = tokenize(chunk);
            match tokens.len() {
                0 => {}
                1 => terms.push(TextTerm::Term(tokens.into_iter().next().unwrap_or_default())),
                _ => terms.push(TextTerm::Phrase(tokens)),
            }
            continue;
        }

        for word in chunk.split_whitespace() {
            let parts = tokenize_query_word(word);
            if parts.len() == 1 || parts.iter().any(|p| has_wildcard(p)) {
                terms.extend(parts.into_iter().map(TextTerm::Term));
            } else if parts.len() > 1 {
                terms.push(TextTerm::Phrase(parts));
            }
        }
    }

    if terms.is_empty() {
        return Err(ValidationError::invalid(parameter, raw, "no searchable terms"));
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Dark-Matter halos, revisited!"), vec!["dark", "matter", "halos", "revisited"]);
        assert!(tokenize("  --  ").is_empty());
    }

    #[test]
    fn test_words_and_phrases() {
        let terms = parse_text_terms("title", r#"Muon "Anomalous Magnetic moment""#).unwrap();
        assert_eq!(
            terms,
            vec![
                TextTerm::Term("muon".into()),
                TextTerm::Phrase(vec!["anomalous".into(), "magnetic".into(), "moment".into()]),
            ]
        );
    }

    #[test]
    fn test_wildcards_are_kept() {
        let terms = parse_text_terms("title", "schr?dinger quant*").unwrap();
        assert_eq!(
            terms,
            vec![TextTerm::Term("schr?dinger".into()), TextTerm::Term("quant*".into())]
        );
        assert!(terms.iter().all(|t| t.has_wildcard()));
    }

    #[test]
    fn test_wildcards_inside_quotes_are_dropped() {
        let terms = parse_text_terms("title", r#""dark mat*""#).unwrap();
        assert_eq!(terms, vec![TextTerm::Phrase(vec!["dark".into(), "mat".into()])]);
    }

    #[test]
    fn test_hyphenated_word_becomes_phrase() {
        let terms = parse_text_terms("all", "de-Sitter").unwrap();
        assert_eq!(terms, vec![TextTerm::Phrase(vec!["de".into(), "sitter".into()])]);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_text_terms("abstract", r#""open phrase"#).unwrap_err();
        assert_eq!(err.parameter(), "abstract");
    }

    #[test]
    fn test_nothing_searchable() {
        assert!(parse_text_terms("title", "!!! --").is_err());
    }
}
