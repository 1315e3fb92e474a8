/// Normalizes review text
///
/// - strips zero-width characters and byte-order marks
/// - normalizes `\r\n` and `\r` line endings to `\n`
/// - collapses runs of horizontal whitespace (including NBSP) to one space
/// - keeps at most one blank line between paragraphs
/// - trims the result
///
/// An all-whitespace input cleans to an empty string.
pub fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;

    for line in normalized.split('\n') {
        let collapsed = collapse_whitespace(line);
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(collapsed);
    }

    lines.join("\n").trim().to_string()
}

fn collapse_whitespace(line: &str) -> String {
    line.chars()
        .filter(|c| !is_zero_width(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_collapses_spaces() {
        assert_eq!(clean_text("  too    many\tspaces  "), "too many spaces");
    }

    #[test]
    fn test_paragraphs_preserved_but_capped() {
        assert_eq!(
            clean_text("Title\n\n\n\n\nBody text\nsecond line"),
            "Title\n\nBody text\nsecond line"
        );
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_zero_width_and_nbsp() {
        assert_eq!(clean_text("\u{FEFF}great\u{200B}\u{00A0}value"), "great value");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(clean_text(" \n\n\t \r\n "), "");
    }
}
