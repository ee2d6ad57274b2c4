//! Text layout for the typewriter: plain ASCII, no pictographs, 55 columns.

use unicode_normalization::UnicodeNormalization;

/// Maximum printable characters per line.
pub const LINE_WIDTH: usize = 55;

/// Lay `text` out as paragraphs of wrapped lines.
///
/// Paragraphs follow the source line breaks (a trailing newline does not
/// start an extra paragraph). Long words are broken and hyphenated words may
/// wrap at the hyphen. Every returned line is ASCII and at most `width` wide.
pub fn layout(text: &str, width: usize) -> Vec<Vec<String>> {
    let options = textwrap::Options::new(width.max(1)).break_words(true);
    text.lines()
        .map(|paragraph| {
            let flat = to_ascii(paragraph);
            if flat.is_empty() {
                return Vec::new();
            }
            textwrap::wrap(&flat, &options)
                .into_iter()
                .map(|line| line.trim_end().to_string())
                .collect()
        })
        .collect()
}

/// Flatten `text` to printable ASCII.
///
/// Typographic punctuation and common ligatures are substituted, accents are
/// dropped through compatibility decomposition, pictographs and joiners are
/// removed and runs of spaces collapse to one.
pub fn to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            match c {
                '\t' => out.push(' '),
                c if c.is_ascii_control() => {},
                c => out.push(c),
            }
        } else if is_joiner(c) {
            continue;
        } else if is_pictograph(c) {
            out.push(' ');
        } else if let Some(sub) = substitute(c) {
            out.push_str(sub);
        } else {
            out.extend(
                std::iter::once(c)
                    .nfkd()
                    .filter(|d| d.is_ascii() && !d.is_ascii_control()),
            );
        }
    }
    collapse_spaces(&out)
}

fn collapse_spaces(s: &str) -> String {
    s.split(' ')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Zero-width joiners, variation selectors and skin-tone modifiers.
pub fn is_joiner(c: char) -> bool {
    matches!(c,
        '\u{200B}'..='\u{200D}'
        | '\u{2060}'
        | '\u{20E3}'
        | '\u{FE00}'..='\u{FE0F}'
        | '\u{E0020}'..='\u{E007F}'
        | '\u{1F3FB}'..='\u{1F3FF}'
    )
}

/// Symbols and emoji the typewriter has no glyph for.
pub fn is_pictograph(c: char) -> bool {
    matches!(c,
        '\u{2190}'..='\u{21FF}'
        | '\u{2300}'..='\u{23FF}'
        | '\u{2460}'..='\u{24FF}'
        | '\u{25A0}'..='\u{27BF}'
        | '\u{2900}'..='\u{297F}'
        | '\u{2B00}'..='\u{2BFF}'
        | '\u{3030}'
        | '\u{303D}'
        | '\u{3297}'
        | '\u{3299}'
        | '\u{1F000}'..='\u{1FAFF}'
    )
}

fn substitute(c: char) -> Option<&'static str> {
    let s = match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
        | '\u{00BB}' => "\"",
        '\u{2010}'..='\u{2015}' | '\u{2212}' => "-",
        '\u{2026}' => "...",
        '\u{2022}' | '\u{00B7}' => "*",
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => " ",
        '\u{00DF}' => "ss",
        '\u{00E6}' => "ae",
        '\u{00C6}' => "AE",
        '\u{0153}' => "oe",
        '\u{0152}' => "OE",
        '\u{00F8}' => "o",
        '\u{00D8}' => "O",
        '\u{0142}' => "l",
        '\u{0141}' => "L",
        '\u{0111}' | '\u{00F0}' => "d",
        '\u{0110}' | '\u{00D0}' => "D",
        '\u{00FE}' => "th",
        '\u{00DE}' => "Th",
        '\u{00A9}' => "(c)",
        '\u{00AE}' => "(R)",
        '\u{00B0}' => " degrees ",
        '\u{20AC}' => "EUR",
        '\u{00A3}' => "GBP",
        '\u{00D7}' => "x",
        '\u{00F7}' => "/",
        _ => return None,
    };
    Some(s)
}
