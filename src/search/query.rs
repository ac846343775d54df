use once_cell::sync::Lazy;
use regex::Regex;

/// Quantity plus unit: 600mg, 2.5 mcg, 10,000iu, 1000mg
static DOSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s?(?:mg|mcg|iu|g|ug|µg|μg)$")
        .expect("dose pattern is a valid regex")
});

/// Whether a single token looks like a dose
pub fn is_dose_token(token: &str) -> bool {
    DOSE_PATTERN.is_match(token)
}

/// Lower-cased dose tokens of the input, in order, without repeats
pub fn dose_tokens(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw.to_lowercase().split_whitespace() {
        if is_dose_token(token) && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Build the supplement search query from free text.
///
/// The trimmed, lower-cased input leads (quoted when it has more than one
/// word, to favour phrase hits), followed by each dose token once. An empty
/// result means "no search".
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let phrase = trimmed.to_lowercase();
    let mut parts: Vec<String> = Vec::new();
    if phrase.split_whitespace().nth(1).is_some() {
        parts.push(format!("\"{}\"", phrase));
    } else {
        parts.push(phrase.clone());
    }

    for token in dose_tokens(&phrase) {
        if !parts.contains(&token) {
            parts.push(token);
        }
    }

    parts.join(" ")
}

/// The drug source searches on the trimmed input as typed
pub fn drug_query(raw: &str) -> String {
    raw.trim().to_string()
}
