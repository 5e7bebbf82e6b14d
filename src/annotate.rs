//! Pinyin annotation pipeline.
//!
//! Text is split into single-`char` display units. Units in the CJK Unified
//! Ideographs block get a tone-marked reading from the `pinyin` crate's
//! embedded dictionary; everything else passes through unannotated.

use clap::ValueEnum;
use pinyin::ToPinyin;
use serde::{Deserialize, Serialize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::i18n::Language;

/// One display unit of annotated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharInfo {
    pub ch: char,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    pub is_target_script: bool,
}

/// Output style for [`text_pinyin`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PinyinStyle {
    /// Tone marks: `nǐ hǎo`
    #[default]
    Tone,
    /// Trailing tone digits: `ni3 hao3`
    ToneNum,
    /// No tones: `ni hao`
    Plain,
    /// Initial letter only: `n h`
    FirstLetter,
}

/// CJK Unified Ideographs, U+4E00..=U+9FFF.
pub fn is_target_script(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn reading(c: char, style: PinyinStyle) -> Option<String> {
    if !is_target_script(c) {
        return None;
    }
    let py = c.to_pinyin()?;
    let s = match style {
        PinyinStyle::Tone => py.with_tone().to_string(),
        PinyinStyle::ToneNum => py.with_tone_num_end().to_string(),
        PinyinStyle::Plain => py.plain().to_string(),
        PinyinStyle::FirstLetter => py.plain().chars().take(1).collect(),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Tone-marked reading for a single character, `None` outside the target
/// script or when the dictionary has no entry.
pub fn char_pinyin(c: char) -> Option<String> {
    reading(c, PinyinStyle::Tone)
}

/// Annotate every character of `text`.
pub fn annotate(text: &str) -> Vec<CharInfo> {
    text.chars()
        .map(|ch| {
            let is_target_script = is_target_script(ch);
            CharInfo {
                ch,
                pinyin: if is_target_script { char_pinyin(ch) } else { None },
                is_target_script,
            }
        })
        .collect()
}

/// Annotate each `\n`-separated line separately.
pub fn annotate_lines(content: &str) -> Vec<Vec<CharInfo>> {
    content.split('\n').map(annotate).collect()
}

/// Reading of a whole string joined by spaces. Runs of non-target,
/// non-whitespace characters are kept verbatim as one item.
pub fn text_pinyin(text: &str, style: PinyinStyle) -> String {
    let mut items: Vec<String> = Vec::new();
    let mut run = String::new();
    for c in text.chars() {
        if is_target_script(c) {
            if !run.is_empty() {
                items.push(std::mem::take(&mut run));
            }
            items.push(reading(c, style).unwrap_or_else(|| c.to_string()));
        } else if c.is_whitespace() {
            if !run.is_empty() {
                items.push(std::mem::take(&mut run));
            }
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        items.push(run);
    }
    items.join(" ")
}

// ---------------------------------------------------------------------------
// Terminal layout
// ---------------------------------------------------------------------------

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

fn push_centered(out: &mut String, s: &str, width: usize) {
    let pad = width.saturating_sub(UnicodeWidthStr::width(s));
    let left = pad / 2;
    out.extend(std::iter::repeat(' ').take(left));
    out.push_str(s);
    out.extend(std::iter::repeat(' ').take(pad - left));
}

/// Lay out one annotated line. With `show_pinyin` the result is two rows,
/// the reading centred above each character; otherwise just the text.
pub fn render_line(units: &[CharInfo], show_pinyin: bool) -> String {
    if !show_pinyin {
        return units.iter().map(|u| u.ch).collect();
    }

    let mut top = String::new();
    let mut bottom = String::new();
    for (i, unit) in units.iter().enumerate() {
        match (&unit.pinyin, unit.is_target_script) {
            (Some(py), true) => {
                let width = UnicodeWidthStr::width(py.as_str()).max(char_width(unit.ch));
                push_centered(&mut top, py, width);
                push_centered(&mut bottom, &unit.ch.to_string(), width);
                if units.get(i + 1).is_some_and(|n| n.is_target_script) {
                    top.push(' ');
                    bottom.push(' ');
                }
            }
            _ => {
                top.extend(std::iter::repeat(' ').take(char_width(unit.ch)));
                bottom.push(unit.ch);
            }
        }
    }
    let top = top.trim_end();
    if top.is_empty() {
        return bottom;
    }
    format!("{top}\n{bottom}")
}

/// Annotated view of a block of content with a show/hide pinyin toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinyinView {
    pub show_pinyin: bool,
}

impl Default for PinyinView {
    fn default() -> Self {
        Self { show_pinyin: true }
    }
}

impl PinyinView {
    pub fn toggle(&mut self) {
        self.show_pinyin = !self.show_pinyin;
    }

    /// Label of the toggle button in its current state.
    pub fn toggle_label(&self, lang: Language) -> &'static str {
        if self.show_pinyin {
            lang.t("pinyin.hide")
        } else {
            lang.t("pinyin.show")
        }
    }

    /// Render `content` line by line; blank lines stay blank.
    pub fn render(&self, content: &str) -> String {
        annotate_lines(content)
            .iter()
            .map(|units| {
                if units.iter().all(|u| u.ch.is_whitespace()) {
                    String::new()
                } else {
                    render_line(units, self.show_pinyin)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_text_classification() {
        let units = annotate("abc你好");
        assert_eq!(units.len(), 5);
        for u in &units[..3] {
            assert!(!u.is_target_script);
            assert!(u.pinyin.is_none());
        }
        for u in &units[3..] {
            assert!(u.is_target_script);
            assert!(u.pinyin.as_deref().is_some_and(|p| !p.is_empty()));
        }
        assert_eq!(units[3].pinyin.as_deref(), Some("nǐ"));
        assert_eq!(units[4].pinyin.as_deref(), Some("hǎo"));
    }

    #[test]
    fn test_is_target_script_bounds() {
        assert!(is_target_script('\u{4e00}'));
        assert!(is_target_script('\u{9fff}'));
        assert!(!is_target_script('\u{3400}'));
        assert!(!is_target_script('。'));
        assert!(!is_target_script('a'));
    }

    #[test]
    fn test_char_pinyin_outside_script_is_none() {
        assert_eq!(char_pinyin('x'), None);
        assert_eq!(char_pinyin('，'), None);
    }

    #[test]
    fn test_char_pinyin_known() {
        assert_eq!(char_pinyin('天').as_deref(), Some("tiān"));
        assert_eq!(char_pinyin('人').as_deref(), Some("rén"));
    }

    #[test]
    fn test_annotate_empty() {
        assert!(annotate("").is_empty());
    }

    #[test]
    fn test_annotate_lines_splits_on_newline() {
        let lines = annotate_lines("天地\n\nok");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 2);
        assert!(lines[1].is_empty());
        assert_eq!(lines[2].len(), 2);
    }

    #[test]
    fn test_text_pinyin_styles() {
        assert_eq!(text_pinyin("你好", PinyinStyle::Tone), "nǐ hǎo");
        assert_eq!(text_pinyin("你好", PinyinStyle::ToneNum), "ni3 hao3");
        assert_eq!(text_pinyin("你好", PinyinStyle::Plain), "ni hao");
        assert_eq!(text_pinyin("你好", PinyinStyle::FirstLetter), "n h");
    }

    #[test]
    fn test_text_pinyin_keeps_latin_runs() {
        assert_eq!(text_pinyin("hi 天人", PinyinStyle::Plain), "hi tian ren");
        assert_eq!(text_pinyin("AI人", PinyinStyle::Plain), "AI ren");
    }

    #[test]
    fn test_render_line_aligns_reading_above_char() {
        let out = render_line(&annotate("天"), true);
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trim(), "tiān");
        assert_eq!(rows[1].trim(), "天");
    }

    #[test]
    fn test_render_line_reserves_full_width_for_wide_neighbours() {
        for wide in ["😀", "㐀", "한"] {
            let out = render_line(&annotate(&format!("{wide}天")), true);
            assert_eq!(out, format!("  tiān\n{wide} 天 "), "after {wide}");
        }
    }

    #[test]
    fn test_render_line_hidden_pinyin_is_plain_text() {
        assert_eq!(render_line(&annotate("a天b"), false), "a天b");
    }

    #[test]
    fn test_render_line_latin_only_is_single_row() {
        assert_eq!(render_line(&annotate("hello"), true), "hello");
    }

    #[test]
    fn test_view_toggle_label() {
        let mut view = PinyinView::default();
        assert_eq!(view.toggle_label(Language::En), "Hide Pinyin");
        view.toggle();
        assert_eq!(view.toggle_label(Language::Zh), "显示拼音");
        assert_eq!(view.render("天"), "天");
    }

    #[test]
    fn test_view_keeps_blank_lines() {
        let view = PinyinView::default();
        let out = view.render("天\n \n地");
        assert_eq!(out.lines().filter(|l| l.is_empty()).count(), 1);
    }
}
