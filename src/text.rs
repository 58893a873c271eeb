//! Text Layout Engine - measurement, greedy wrapping, budgeted truncation

use serde::{Deserialize, Serialize};

use crate::templates::{StreetFormat, TextStyle};

pub const ELLIPSIS: char = '\u{2026}';

/// Sentence-aware truncation only stops at a sentence end found past this
/// fraction of the character budget.
const SENTENCE_MIN_FRACTION: f32 = 0.4;

/// Smallest size, relative to the styled size, that fitting shrinks text to.
pub const MIN_FIT_SCALE: f32 = 0.5;

const FIT_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationMode {
    /// Cut at the budget, back up to whitespace, append an ellipsis.
    #[default]
    WordBoundary,
    /// Prefer a complete sentence; otherwise cut at a word and end with a period.
    SentenceAware,
}

/// Font parameters relevant to measurement. The family is engine-wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub weight: u16,
    pub letter_spacing: f32,
}

impl FontSpec {
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            size: self.size * factor,
            weight: self.weight,
            letter_spacing: self.letter_spacing * factor,
        }
    }
}

impl From<&TextStyle> for FontSpec {
    fn from(style: &TextStyle) -> Self {
        Self {
            size: style.font_size,
            weight: style.font_weight,
            letter_spacing: style.letter_spacing,
        }
    }
}

/// Pixel width of a run of text. Supplied by whoever draws the text so that
/// wrap decisions agree with the rendered glyphs.
pub trait TextMeasure: Send + Sync {
    fn measure(&self, text: &str, font: &FontSpec) -> f32;
}

/// Width table approximating a humanist sans-serif. Used when the font
/// database has no face for the requested family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMetrics;

impl ApproxMetrics {
    fn advance_em(c: char) -> f32 {
        match c {
            ' ' | 'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
            'f' | 't' | 'r' | 'I' | '(' | ')' | '-' => 0.36,
            'm' | 'w' => 0.82,
            'M' | 'W' => 0.9,
            '0'..='9' => 0.56,
            c if c.is_uppercase() => 0.68,
            _ => 0.52,
        }
    }
}

impl TextMeasure for ApproxMetrics {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        let weight_factor = 1.0 + (font.weight as f32 - 400.0) / 3000.0;
        let mut em = 0.0;
        let mut count = 0usize;
        for c in text.chars() {
            em += Self::advance_em(c);
            count += 1;
        }
        em * font.size * weight_factor + font.letter_spacing * count as f32
    }
}

/// Lines produced for one text field against one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WrappedTextBlock {
    pub lines: Vec<String>,
    /// The text that was wrapped, after any truncation.
    pub text: String,
    pub truncated: bool,
}

/// Lines fitted into a box by shrinking first and cutting last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedText {
    pub lines: Vec<String>,
    /// Multiplier for the styled font size and letter spacing.
    pub scale: f32,
    pub truncated: bool,
}

impl Default for FittedText {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            scale: 1.0,
            truncated: false,
        }
    }
}

impl From<WrappedTextBlock> for FittedText {
    fn from(block: WrappedTextBlock) -> Self {
        Self {
            lines: block.lines,
            scale: 1.0,
            truncated: block.truncated,
        }
    }
}

/// Fit a single line without wrapping, keeping its internal spacing. The line
/// shrinks down to `MIN_FIT_SCALE`; past that it loses trailing characters and
/// ends in an ellipsis.
pub fn fit_line(text: &str, max_width: f32, font: &FontSpec, measure: &dyn TextMeasure) -> FittedText {
    let text = text.trim();
    if text.is_empty() {
        return FittedText::default();
    }
    let full = measure.measure(text, font);
    if full <= max_width {
        return FittedText {
            lines: vec![text.to_string()],
            ..FittedText::default()
        };
    }
    let scale = (max_width / full).clamp(MIN_FIT_SCALE, 1.0);
    let scaled = font.scaled(scale);
    let width = measure.measure(text, &scaled);
    // Linear measures land exactly on the box; allow for float error.
    if width <= max_width + 0.5 {
        return FittedText {
            lines: vec![text.to_string()],
            scale,
            truncated: false,
        };
    }

    let mut chars: Vec<char> = text.chars().collect();
    let estimate = (chars.len() as f32 * max_width / width).ceil() as usize + 1;
    chars.truncate(estimate.min(chars.len()));
    let line = loop {
        chars.pop();
        let mut candidate = chars.iter().collect::<String>().trim_end().to_string();
        candidate.push(ELLIPSIS);
        if chars.is_empty() || measure.measure(&candidate, &scaled) <= max_width {
            break candidate;
        }
    };
    FittedText {
        lines: vec![line],
        scale,
        truncated: true,
    }
}

/// Wrap into at most `max_lines`, stepping the size down to `MIN_FIT_SCALE`
/// before any words are dropped. At the smallest size, overflowing lines are
/// cut and the last kept line ends in an ellipsis.
pub fn fit_wrapped(
    text: &str,
    max_width: f32,
    max_lines: usize,
    font: &FontSpec,
    measure: &dyn TextMeasure,
) -> FittedText {
    if max_lines == 0 {
        return FittedText::default();
    }
    let steps = ((1.0 - MIN_FIT_SCALE) / FIT_STEP).round() as usize;
    let mut scale = 1.0;
    let mut block = WrappedTextBlock::default();
    for step in 0..=steps {
        scale = 1.0 - step as f32 * FIT_STEP;
        let scaled = font.scaled(scale);
        block = wrap(text, max_width, &scaled, measure);
        let fits = block.lines.len() <= max_lines
            && block.lines.iter().all(|line| measure.measure(line, &scaled) <= max_width);
        if fits {
            return FittedText {
                lines: block.lines,
                scale,
                truncated: false,
            };
        }
    }

    let scaled = font.scaled(scale);
    block.lines.truncate(max_lines);
    if let Some(last) = block.lines.last_mut() {
        *last = ellipsize(last, max_width, &scaled, measure);
    }
    FittedText {
        lines: block.lines,
        scale,
        truncated: true,
    }
}

/// Greedy word wrap. A word wider than the box gets a line of its own.
pub fn wrap(text: &str, max_width: f32, font: &FontSpec, measure: &dyn TextMeasure) -> WrappedTextBlock {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure.measure(&candidate, font) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    WrappedTextBlock {
        lines,
        text: text.to_string(),
        truncated: false,
    }
}

/// Character-budget truncation. Text within budget is returned trimmed but
/// otherwise untouched.
pub fn truncate(text: &str, max_chars: usize, mode: TruncationMode) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let cut = prefix_chars(text, max_chars);
    match mode {
        TruncationMode::WordBoundary => {
            let mut out = word_cut(text, cut).to_string();
            out.push(ELLIPSIS);
            out
        }
        TruncationMode::SentenceAware => {
            if let Some(end) = sentence_end(text, cut, max_chars) {
                return cut[..end].to_string();
            }
            let trimmed = word_cut(text, cut).trim_end_matches(|c: char| {
                c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '\u{2013}' | '\u{2014}')
            });
            if trimmed.is_empty() {
                return String::new();
            }
            let mut out = trimmed.to_string();
            if !out.ends_with(['.', '!', '?']) {
                out.push('.');
            }
            out
        }
    }
}

/// Hard input limit for headlines: trim to `max_chars` without any marker.
pub fn clamp_headline(text: &str, max_chars: usize) -> String {
    prefix_chars(text.trim(), max_chars).trim_end().to_string()
}

/// Truncate to the budget, wrap into the box, and cap the line count. When
/// lines overflow, the last kept line is shortened to end in an ellipsis.
pub fn layout_text(
    text: &str,
    max_chars: usize,
    mode: TruncationMode,
    max_width: f32,
    max_lines: usize,
    font: &FontSpec,
    measure: &dyn TextMeasure,
) -> WrappedTextBlock {
    let cut = truncate(text, max_chars, mode);
    let mut block = wrap(&cut, max_width, font, measure);
    block.truncated = cut != text.trim();
    if block.lines.len() > max_lines {
        block.lines.truncate(max_lines);
        if let Some(last) = block.lines.last_mut() {
            *last = ellipsize(last, max_width, font, measure);
        }
        block.truncated = true;
    }
    block
}

fn ellipsize(line: &str, max_width: f32, font: &FontSpec, measure: &dyn TextMeasure) -> String {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    loop {
        let mut candidate = words.join(" ");
        candidate = candidate
            .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '.' | '-'))
            .to_string();
        candidate.push(ELLIPSIS);
        if words.len() <= 1 || measure.measure(&candidate, font) <= max_width {
            return candidate;
        }
        words.pop();
    }
}

/// Cosmetic transform for the street line.
pub fn format_street(street: &str, format: StreetFormat) -> String {
    match format {
        StreetFormat::Plain => street.trim().to_string(),
        StreetFormat::LetterSpaced => street.trim().to_uppercase(),
        StreetFormat::TokenSpaced => street
            .split_whitespace()
            .map(token_spaced)
            .collect::<Vec<_>>()
            .join("   "),
    }
}

/// Digit runs stay contiguous, letters are spaced out, punctuation sticks to
/// the preceding character.
fn token_spaced(token: &str) -> String {
    let mut out = String::with_capacity(token.len() * 2);
    let mut prev: Option<char> = None;
    for c in token.chars() {
        if let Some(p) = prev {
            let together = (p.is_ascii_digit() && c.is_ascii_digit()) || !c.is_alphanumeric();
            if !together {
                out.push(' ');
            }
        }
        out.extend(c.to_uppercase());
        prev = Some(c);
    }
    out
}

fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Back `cut` (a prefix of `text`) up to the last whitespace, unless it already
/// ends on a word boundary. A single over-long word is hard cut.
fn word_cut<'a>(text: &'a str, cut: &'a str) -> &'a str {
    let at_boundary = text[cut.len()..]
        .chars()
        .next()
        .map_or(true, char::is_whitespace);
    if at_boundary {
        return cut.trim_end();
    }
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end(),
        _ => cut,
    }
}

/// Byte length of `cut` up to and including the last sentence terminator that
/// ends a sentence in `text` and lies past the minimum fraction of the budget.
fn sentence_end(text: &str, cut: &str, max_chars: usize) -> Option<usize> {
    let min_position = max_chars as f32 * SENTENCE_MIN_FRACTION;
    cut.char_indices()
        .enumerate()
        .filter(|&(_, (_, c))| matches!(c, '.' | '!' | '?'))
        .filter(|&(_, (idx, _))| {
            text[idx + 1..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace)
        })
        .last()
        .filter(|&(position, _)| position as f32 >= min_position)
        .map(|(_, (idx, _))| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every word is 10px wide, every space 2px.
    struct FixedWords;

    impl TextMeasure for FixedWords {
        fn measure(&self, text: &str, _font: &FontSpec) -> f32 {
            let words = text.split(' ').filter(|w| !w.is_empty()).count() as f32;
            words * 10.0 + (words - 1.0).max(0.0) * 2.0
        }
    }

    fn font() -> FontSpec {
        FontSpec { size: 10.0, weight: 400, letter_spacing: 0.0 }
    }

    #[test]
    fn test_wrap_greedy_three_words_per_line() {
        let block = wrap("one two three four", 34.0, &font(), &FixedWords);
        assert_eq!(block.lines, vec!["one two three", "four"]);
    }

    #[test]
    fn test_wrap_oversized_word_gets_own_line() {
        let block = wrap("a b", 5.0, &font(), &FixedWords);
        assert_eq!(block.lines, vec!["a", "b"]);
    }

    #[test]
    fn test_wrap_respects_paragraphs() {
        let block = wrap("one\ntwo three", 100.0, &font(), &FixedWords);
        assert_eq!(block.lines, vec!["one", "two three"]);
    }

    #[test]
    fn test_sentence_aware_stops_at_sentence() {
        let out = truncate("A great home. It has a pool and more.", 20, TruncationMode::SentenceAware);
        assert_eq!(out, "A great home.");
    }

    #[test]
    fn test_sentence_aware_falls_back_to_period() {
        // The only period sits before 40% of the budget.
        let out = truncate(
            "Wow. Spacious rooms, updated kitchen, huge yard and garage",
            40,
            TruncationMode::SentenceAware,
        );
        assert_eq!(out, "Wow. Spacious rooms, updated kitchen.");
    }

    #[test]
    fn test_sentence_aware_strips_trailing_separator() {
        let out = truncate("Spacious rooms, updated kitchen, big yard", 32, TruncationMode::SentenceAware);
        assert_eq!(out, "Spacious rooms, updated kitchen.");
    }

    #[test]
    fn test_sentence_aware_ignores_decimal_points() {
        let out = truncate("Offers 3.5 baths and a bonus room upstairs", 20, TruncationMode::SentenceAware);
        assert_eq!(out, "Offers 3.5 baths and.");
    }

    #[test]
    fn test_word_boundary_ellipsis() {
        let out = truncate(
            "A really long word with no punctuation at all",
            15,
            TruncationMode::WordBoundary,
        );
        assert_eq!(out, "A really long\u{2026}");
        assert!(out.chars().count() <= 16);
    }

    #[test]
    fn test_word_boundary_hard_cuts_single_word() {
        let out = truncate("Supercalifragilistic", 5, TruncationMode::WordBoundary);
        assert_eq!(out, "Super\u{2026}");
    }

    #[test]
    fn test_truncate_within_budget_untouched() {
        assert_eq!(truncate("  Short.  ", 20, TruncationMode::WordBoundary), "Short.");
        assert_eq!(truncate("abc", 0, TruncationMode::SentenceAware), "");
    }

    #[test]
    fn test_layout_caps_lines_with_ellipsis() {
        let block = layout_text(
            "one two three four five six seven",
            500,
            TruncationMode::WordBoundary,
            34.0,
            2,
            &font(),
            &FixedWords,
        );
        assert_eq!(block.lines.len(), 2);
        assert!(block.truncated);
        assert!(block.lines[1].ends_with(ELLIPSIS));
    }

    #[test]
    fn test_layout_reports_truncation() {
        let block = layout_text("Short and sweet", 500, TruncationMode::WordBoundary, 999.0, 4, &font(), &FixedWords);
        assert!(!block.truncated);
        assert_eq!(block.lines, vec!["Short and sweet"]);
    }

    #[test]
    fn test_clamp_headline() {
        assert_eq!(clamp_headline("Stunning views from every room", 16), "Stunning views f");
        assert_eq!(clamp_headline("Short", 16), "Short");
    }

    #[test]
    fn test_street_formats() {
        assert_eq!(format_street("123 Main St", StreetFormat::Plain), "123 Main St");
        assert_eq!(format_street("123 Main St", StreetFormat::LetterSpaced), "123 MAIN ST");
        assert_eq!(format_street("123 Main St", StreetFormat::TokenSpaced), "123   M A I N   S T");
        assert_eq!(format_street("4500B Oak Ave.", StreetFormat::TokenSpaced), "4500 B   O A K   A V E.");
    }

    #[test]
    fn test_approx_metrics_scale_with_size_and_weight() {
        let regular = ApproxMetrics.measure("Listing", &FontSpec { size: 20.0, weight: 400, letter_spacing: 0.0 });
        let large = ApproxMetrics.measure("Listing", &FontSpec { size: 40.0, weight: 400, letter_spacing: 0.0 });
        let bold = ApproxMetrics.measure("Listing", &FontSpec { size: 20.0, weight: 700, letter_spacing: 0.0 });
        assert!((large - regular * 2.0).abs() < 0.001);
        assert!(bold > regular);
    }

    #[test]
    fn test_fit_line_shrinks_before_cutting() {
        // 10 words of 10px plus 9 spaces of 2px = 118px at scale 1.
        let line = "a b c d e f g h i j";
        let fitted = fit_line(line, 200.0, &font(), &FixedWords);
        assert_eq!(fitted.scale, 1.0);
        assert_eq!(fitted.lines, vec![line]);

        let fitted = fit_line(line, 50.0, &font(), &ApproxMetrics);
        assert!(fitted.scale < 1.0 && fitted.scale >= MIN_FIT_SCALE);
        assert_eq!(fitted.lines, vec![line]);
        assert!(!fitted.truncated);
    }

    #[test]
    fn test_fit_line_keeps_token_spacing() {
        let street = "123   M A I N   S T";
        let fitted = fit_line(street, 500.0, &font(), &ApproxMetrics);
        assert_eq!(fitted.lines, vec![street]);
    }

    #[test]
    fn test_fit_line_cuts_with_ellipsis_past_min_scale() {
        let street = "12345 Extraordinarily Long Boulevard Name Northeast Apartment 9000";
        let font = font();
        let fitted = fit_line(street, 60.0, &font, &ApproxMetrics);
        assert_eq!(fitted.scale, MIN_FIT_SCALE);
        assert!(fitted.truncated);
        let line = &fitted.lines[0];
        assert!(line.ends_with(ELLIPSIS));
        assert!(ApproxMetrics.measure(line, &font.scaled(fitted.scale)) <= 60.0);
    }

    #[test]
    fn test_fit_wrapped_shrinks_instead_of_ellipsizing() {
        let headline = "Sunlit harbor cottage with deck";
        let font = FontSpec { size: 36.0, weight: 700, letter_spacing: 0.0 };
        let full = ApproxMetrics.measure(headline, &font);
        let fitted = fit_wrapped(headline, full * 0.8, 1, &font, &ApproxMetrics);
        assert_eq!(fitted.lines, vec![headline]);
        assert!(fitted.scale <= 0.8);
        assert!(!fitted.truncated);
    }

    #[test]
    fn test_fit_wrapped_last_resort_ellipsis() {
        let fitted = fit_wrapped("one two three four five six seven eight", 22.0, 1, &font(), &FixedWords);
        assert!((fitted.scale - MIN_FIT_SCALE).abs() < 1e-4);
        assert!(fitted.truncated);
        assert_eq!(fitted.lines.len(), 1);
        assert!(fitted.lines[0].ends_with(ELLIPSIS));
    }
}
