//! Recovers an ordered list of translations from free-form model output.

use log::warn;

use super::prompt::{has_line_break, restore_line_breaks};

/// Lines opening with one of these are model commentary ("original",
/// "translation", "note"), not translations.
const COMMENTARY_MARKERS: &[&str] = &["原文", "翻译", "注"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// Exactly one value per input, in input order.
    pub values: Vec<String>,
    /// Trailing positions filled with the source text.
    pub padded: usize,
    /// Surplus response lines dropped.
    pub truncated: usize,
}

/// Non-blank, trimmed lines of `text` with commentary lines removed.
pub fn response_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !COMMENTARY_MARKERS.iter().any(|marker| line.starts_with(marker)))
        .map(str::to_string)
        .collect()
}

/// Matches response lines to `originals` by position. Missing tail positions
/// keep their source value; surplus lines are dropped. Line-break escapes are
/// restored only where the source value had line breaks.
pub fn align_response(text: &str, originals: &[String]) -> Alignment {
    let lines = response_lines(text);
    let received = lines.len();
    let mut values: Vec<String> = lines
        .into_iter()
        .zip(originals)
        .map(|(line, original)| {
            if has_line_break(original) {
                restore_line_breaks(&line)
            } else {
                line
            }
        })
        .collect();

    let padded = originals.len().saturating_sub(received);
    let truncated = received.saturating_sub(originals.len());

    if padded > 0 {
        warn!(
            "translation returned {received} lines for {} inputs; keeping source text for the last {padded}",
            originals.len()
        );
        values.extend(originals[received..].iter().cloned());
    }

    Alignment {
        values,
        padded,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn pads_shortfall_with_source_values() {
        let originals = owned(&["Apple", "Bread", "Carrot"]);
        let alignment = align_response("苹果\n\n   \n", &originals);

        assert_eq!(alignment.values, owned(&["苹果", "Bread", "Carrot"]));
        assert_eq!(alignment.padded, 2);
        assert_eq!(alignment.truncated, 0);
    }

    #[test]
    fn truncates_surplus_lines() {
        let originals = owned(&["Apple"]);
        let alignment = align_response("苹果\n面包\n胡萝卜", &originals);

        assert_eq!(alignment.values, owned(&["苹果"]));
        assert_eq!(alignment.truncated, 2);
    }

    #[test]
    fn drops_commentary_lines() {
        let originals = owned(&["Apple", "Bread"]);
        let text = "翻译结果如下：\n原文: Apple\n  苹果  \n注：面包是食物\n面包\n";
        let alignment = align_response(text, &originals);

        assert_eq!(alignment.values, owned(&["苹果", "面包"]));
        assert_eq!(alignment.padded, 0);
    }

    #[test]
    fn restores_line_breaks_only_for_multi_line_sources() {
        let originals = owned(&["Line one\nLine two", "Path C:\\new", "Author"]);
        let text = "第一行\\n第二行\n路径 C:\\new\n作者";
        let alignment = align_response(text, &originals);

        assert_eq!(
            alignment.values,
            owned(&["第一行\n第二行", "路径 C:\\new", "作者"])
        );
        assert_eq!(alignment.padded, 0);
        assert_eq!(alignment.truncated, 0);
    }

    #[test]
    fn empty_response_returns_sources() {
        let originals = owned(&["Apple", "Bread"]);
        let alignment = align_response("", &originals);
        assert_eq!(alignment.values, originals);
        assert_eq!(alignment.padded, 2);
    }

    #[test]
    fn output_length_always_matches_input_length() {
        let response = "一\n二\n三\n四\n五";
        for size in 0..8 {
            let originals: Vec<String> = (0..size).map(|i| format!("line {i}")).collect();
            assert_eq!(align_response(response, &originals).values.len(), size);
        }
    }
}
