use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static HIDDEN_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>|<ix:header\b.*?</ix:header\s*>|<!--.*?-->",
    )
    .expect("hidden block pattern")
});
static ROW_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</tr\s*>").expect("row end pattern"));
static CELL_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<t[dh](?:\s[^<>]*)?>").expect("cell start pattern"));
static BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>|</li\s*>|</h[1-6]\s*>|</table\s*>")
        .expect("break pattern")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?[A-Za-z][\w:.-]*(?:\s[^<>]*)?/?>|<![A-Za-z][^<>]*>|<\?[^<>]*\?>")
        .expect("tag pattern")
});
static INLINE_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\x0B\x0C]+").expect("inline space pattern"));
static EMPTY_CELLS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|(?: *\|)+").expect("empty cells pattern"));
static DOLLAR_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$ *\| *").expect("dollar cell pattern"));
static CLOSING_PAREN_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" *\| *\)").expect("closing paren cell pattern"));
static PERCENT_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" *\| *%").expect("percent cell pattern"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{4,}").expect("blank lines pattern"));

/// Turns raw filing markup (or already cleaned text) into searchable text.
///
/// Hidden blocks (scripts, styles, head, the inline XBRL header) disappear
/// with their content. Table rows become `| cell | cell |` lines so column
/// alignment survives, block-level tags become newlines, every other tag is
/// unwrapped keeping its content. Entities are decoded, runs of spaces and
/// tabs collapse to one space and at most two blank lines remain in a row.
///
/// `normalize(normalize(x)) == normalize(x)`: the pass repeats until the text
/// stops changing. Only decoding an entity can expose new markup, and every
/// decode shortens the text, so the loop ends.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_pass(raw);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(raw: &str) -> String {
    let mut text = raw.replace("\r\n", "\n").replace('\r', "\n");

    text = HIDDEN_BLOCK_RE.replace_all(&text, "").into_owned();

    text = ROW_END_RE.replace_all(&text, " |\n").into_owned();
    text = CELL_START_RE.replace_all(&text, " | ").into_owned();
    text = BREAK_RE.replace_all(&text, "\n").into_owned();

    text = TAG_RE.replace_all(&text, "").into_owned();

    // after tags are gone, so a decoded `<` is text and not markup
    text = decode_html_entities(&text).into_owned();

    // NFKC folds non-breaking and other compatibility spaces to plain spaces
    text = text.nfkc().collect::<String>();

    text = INLINE_SPACE_RE.replace_all(&text, " ").into_owned();

    let lines: Vec<String> = text.lines().map(tidy_line).collect();
    text = lines.join("\n");

    text = BLANK_LINES_RE.replace_all(&text, "\n\n\n").into_owned();
    text.trim_matches('\n').to_string()
}

fn tidy_line(line: &str) -> String {
    let mut line = line.trim().to_string();
    if line.contains('|') {
        line = EMPTY_CELLS_RE.replace_all(&line, "|").into_owned();
        line = DOLLAR_CELL_RE.replace_all(&line, "$").into_owned();
        line = CLOSING_PAREN_CELL_RE.replace_all(&line, ")").into_owned();
        line = PERCENT_CELL_RE.replace_all(&line, "%").into_owned();
        line = line.trim().to_string();
        if line.chars().all(|c| c == '|' || c == ' ') {
            line.clear();
        } else {
            if !line.starts_with('|') {
                line.insert_str(0, "| ");
            }
            if !line.ends_with('|') {
                line.push_str(" |");
            }
        }
    }
    line
}

/// Truncates to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_hidden_blocks() {
        let html = "<html><head><title>x</title></head><body><script>var a = 1;</script>\
                    <style>p { color: red; }</style><ix:header><ix:hidden>secret</ix:hidden></ix:header>\
                    <p>Visible</p></body></html>";
        assert_eq!(normalize(html), "Visible");
    }

    #[test]
    fn test_unwraps_inline_fact_tags() {
        let html = r#"<p>Total revenue was $<ix:nonFraction name="us-gaap:Revenues" contextRef="c1" unitRef="usd" scale="6">1,234.5</ix:nonFraction> million</p>"#;
        assert_eq!(normalize(html), "Total revenue was $1,234.5 million");
    }

    #[test]
    fn test_tables_become_pipe_rows() {
        let html = "<table><tr><td>Total revenue</td><td>$</td><td>1,234</td><td></td><td>$</td><td>1,100</td></tr>\
                    <tr><td>Net loss</td><td>(45</td><td>)</td></tr></table>";
        let text = normalize(html);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "| Total revenue | $1,234 | $1,100 |");
        assert_eq!(lines[1], "| Net loss | (45) |");
    }

    #[test]
    fn test_breaks_entities_and_whitespace() {
        let html = "Line&nbsp;one<br/>Line\t\ttwo&amp;more</p>\n\n\n\n\n\nEnd";
        assert_eq!(normalize(html), "Line one\nLine two&more\n\n\nEnd");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<div>Revenue&nbsp;|&nbsp;1,234</div><div>&amp;lt;b&amp;gt;bold</div>",
            "<table><tr><td>a</td><td></td><td>b</td></tr></table>\n\n\n\n\nTail   text",
            "already normalized\n| Total assets | $5,000 |",
            "&amp;amp;amp; <<b>a> <> x",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_stray_angle_brackets_are_text() {
        let text = "Growth was <5% this year\nTotal revenue $5,000\nMargin was >10%";
        assert_eq!(normalize(text), text);

        let escaped = "<p>Growth was &lt;5% this year</p><p>Total revenue $5,000</p><p>Margin &gt;10%</p>";
        assert_eq!(
            normalize(escaped),
            "Growth was <5% this year\nTotal revenue $5,000\nMargin >10%"
        );
    }

    #[test]
    fn test_deeply_nested_entities() {
        let input = format!("A &{}lt;b", "amp;".repeat(20));
        let once = normalize(&input);
        assert_eq!(once, "A <b");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("\u{e9}\u{e9}\u{e9}", 2), "\u{e9}\u{e9}");
    }
}
