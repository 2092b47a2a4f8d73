//! Abbreviation detection (Schwartz & Hearst, 2003).
//!
//! Finds `long form (SHORT)` definitions so a gene tagged by its full name can also
//! be reported under the short form the paper uses for it, e.g.
//! "epidermal growth factor receptor (EGFR)".

/// One short-form/long-form pair. Spans are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbreviation {
    pub short_form: String,
    pub long_form: String,
    pub short_span: (usize, usize),
    pub long_span: (usize, usize),
}

/// Scan `text` for parenthesised abbreviation definitions.
pub fn detect_abbreviations(text: &str) -> Vec<Abbreviation> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(rel_open) = text[cursor..].find('(') {
        let open = cursor + rel_open;
        cursor = open + 1;

        let Some(rel_close) = text[open + 1..].find(')') else { break };
        let close = open + 1 + rel_close;
        let inner = &text[open + 1..close];
        if inner.contains('(') {
            continue;
        }

        // "(EGFR; ...)" or "(EGFR, ...)" define the first item only
        let candidate = inner.split([';', ',']).next().unwrap_or(inner);
        let short_form = candidate.trim();
        if !is_short_form(short_form) {
            continue;
        }
        let lead = candidate.len() - candidate.trim_start().len();
        let short_start = open + 1 + lead;
        let short_span = (short_start, short_start + short_form.len());

        let window_start = long_form_window(&text[..open], short_form);
        let window = text[window_start..open].trim_end();
        if window.is_empty() {
            continue;
        }

        let Some(lf_offset) = best_long_form(short_form, window) else { continue };
        let long_form = &window[lf_offset..];
        if long_form.len() <= short_form.len() || long_form.contains(short_form) {
            continue;
        }

        let long_start = window_start + lf_offset;
        found.push(Abbreviation {
            short_form: short_form.to_string(),
            long_form: long_form.to_string(),
            short_span,
            long_span: (long_start, long_start + long_form.len()),
        });
    }

    found
}

fn is_short_form(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (2..=10).contains(&len)
        && candidate.split_whitespace().count() <= 2
        && candidate.chars().any(char::is_alphabetic)
        && candidate.chars().next().is_some_and(char::is_alphanumeric)
}

/// Byte offset where the long-form search window starts: at most
/// `min(|SF| + 5, 2 * |SF|)` words back, never crossing a clause boundary.
fn long_form_window(before: &str, short_form: &str) -> usize {
    let sf_len = short_form.chars().count();
    let max_words = (sf_len + 5).min(sf_len * 2);

    let boundary = before
        .rfind(|c| matches!(c, ';' | ')' | '(' | '[' | ']'))
        .map(|i| i + 1)
        .max(before.rfind(". ").map(|i| i + 2))
        .unwrap_or(0);
    let segment = &before[boundary..];

    let mut word_starts = Vec::new();
    let mut prev_ws = true;
    for (i, c) in segment.char_indices() {
        if !c.is_whitespace() && prev_ws {
            word_starts.push(i);
        }
        prev_ws = c.is_whitespace();
    }

    let first = word_starts.len().saturating_sub(max_words);
    boundary + word_starts.get(first).copied().unwrap_or(segment.len())
}

/// Match short-form characters right-to-left against the window; the first
/// short-form character must start a word. Returns the byte offset of the long form.
fn best_long_form(short_form: &str, window: &str) -> Option<usize> {
    let sf: Vec<char> = short_form.chars().flat_map(char::to_lowercase).collect();
    let lf: Vec<(usize, char)> = window.char_indices().collect();

    let mut s = sf.len();
    let mut l = lf.len();
    while s > 0 {
        let c = sf[s - 1];
        if !c.is_alphanumeric() {
            s -= 1;
            continue;
        }
        loop {
            if l == 0 {
                return None;
            }
            let (_, lc) = lf[l - 1];
            let mid_word = l > 1 && lf[l - 2].1.is_alphanumeric();
            if lc.to_lowercase().eq(std::iter::once(c)) && !(s == 1 && mid_word) {
                break;
            }
            l -= 1;
        }
        l -= 1;
        s -= 1;
    }

    let matched = lf.get(l).map(|&(i, _)| i)?;
    let word_start = window[..matched]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    Some(word_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_gene_definition() {
        let text = "Mutations in the epidermal growth factor receptor (EGFR) drive NSCLC.";
        let found = detect_abbreviations(text);
        assert_eq!(found.len(), 1);
        let abbr = &found[0];
        assert_eq!(abbr.short_form, "EGFR");
        assert_eq!(abbr.long_form, "epidermal growth factor receptor");
        assert_eq!(&text[abbr.long_span.0..abbr.long_span.1], "epidermal growth factor receptor");
        assert_eq!(&text[abbr.short_span.0..abbr.short_span.1], "EGFR");
    }

    #[test]
    fn test_digits_in_short_form() {
        let found = detect_abbreviations("Loss of tumor protein p53 (TP53) was common.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].long_form, "tumor protein p53");
    }

    #[test]
    fn test_first_item_of_list_in_parens() {
        let found = detect_abbreviations("phosphatase and tensin homolog (PTEN; also MMAC1) loss");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].short_form, "PTEN");
        assert_eq!(found[0].long_form, "phosphatase and tensin homolog");
    }

    #[test]
    fn test_ignores_non_abbreviations() {
        assert!(detect_abbreviations("patients (n = 42) were enrolled").is_empty());
        assert!(detect_abbreviations("as shown previously (2019)").is_empty());
        assert!(detect_abbreviations("an unrelated phrase (XYZQ)").is_empty());
        assert!(detect_abbreviations("unbalanced (EGFR").is_empty());
    }

    #[test]
    fn test_window_stops_at_sentence_boundary() {
        let found = detect_abbreviations("Growth was slow. Kirsten rat sarcoma viral oncogene (KRAS) was mutated.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].long_form, "Kirsten rat sarcoma viral oncogene");
        assert!(!found[0].long_form.contains("slow"));
    }

    #[test]
    fn test_multibyte_whitespace_before_long_form() {
        // no-break space (2 bytes) and thin space (3 bytes)
        for text in [
            "Mutations in the\u{a0}epidermal growth factor receptor (EGFR) drive NSCLC.",
            "Mutations in the\u{2009}epidermal growth factor receptor (EGFR) drive NSCLC.",
        ] {
            let found = detect_abbreviations(text);
            assert_eq!(found.len(), 1, "{text:?}");
            let abbr = &found[0];
            assert_eq!(abbr.long_form, "epidermal growth factor receptor");
            assert_eq!(&text[abbr.long_span.0..abbr.long_span.1], "epidermal growth factor receptor");
        }
    }

    #[test]
    fn test_multibyte_whitespace_inside_long_form() {
        let text = "tumor\u{a0}protein\u{2009}p53 (TP53) was lost";
        let found = detect_abbreviations(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].long_form, "tumor\u{a0}protein\u{2009}p53");
    }
}
