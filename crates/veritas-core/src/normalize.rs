//! Source text normalization (§4.6).
//!
//! Defines the byte coordinate system every `byte_start`/`byte_end` in the
//! shard refers to. Must be pure and stable across runs and versions: a
//! change here invalidates every previously compiled shard's offsets.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use std::sync::OnceLock;

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\(?\d+\)?\.?\s+").unwrap())
}

fn internal_whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

/// Normalize `input` per §4.6:
/// - Unicode NFC
/// - CRLF/CR -> LF
/// - trim trailing whitespace per line, collapse internal whitespace runs
/// - conservative soft-wrap repair (sentence/heading/list-aware merge,
///   hyphenation join)
/// - ensure a single trailing newline
pub fn normalize_source_text(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    let unified = nfc.replace("\r\n", "\n").replace('\r', "\n");

    let mut raw_lines: Vec<String> = unified
        .split('\n')
        .map(|line| collapse_internal_whitespace(line.trim_end()))
        .collect();

    while raw_lines.first().is_some_and(|l| l.is_empty()) {
        raw_lines.remove(0);
    }
    while raw_lines.last().is_some_and(|l| l.is_empty()) {
        raw_lines.pop();
    }

    let mut out: Vec<String> = Vec::new();
    let mut i = 0usize;
    while i < raw_lines.len() {
        let line = raw_lines[i].clone();

        if line.is_empty() {
            let mut j = i + 1;
            while j < raw_lines.len() && raw_lines[j].is_empty() {
                j += 1;
            }

            if let (Some(prev), true) = (out.last().cloned(), j < raw_lines.len()) {
                let next_trimmed = raw_lines[j].trim_start();
                let prev_ends_sentence = prev
                    .chars()
                    .last()
                    .is_some_and(|c| ".:;!?)".contains(c));
                let next_continues = next_trimmed
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_lowercase() || c.is_ascii_digit());
                if !prev.is_empty() && !prev_ends_sentence && next_continues {
                    let merged = format!("{prev} {next_trimmed}");
                    *out.last_mut().unwrap() = merged;
                    i = j + 1;
                    continue;
                }
            }

            if out.last().map_or(true, |l| !l.is_empty()) {
                out.push(String::new());
            }
            i += 1;
            continue;
        }

        let mut buf = line;
        i += 1;

        while i < raw_lines.len() {
            let next = &raw_lines[i];
            if next.is_empty() {
                break;
            }

            if let Some(stripped) = buf.strip_suffix('-') {
                buf = format!("{stripped}{}", next.trim_start());
                i += 1;
                continue;
            }

            let looks_like_heading = buf.chars().all(|c| !c.is_lowercase()) || buf.ends_with(':');
            let looks_like_list = next.trim_start().starts_with(['-', '*']) || list_marker_re().is_match(next.trim_start());
            if looks_like_heading || looks_like_list {
                break;
            }

            buf = format!("{buf} {}", next.trim_start());
            i += 1;
        }

        out.push(buf);
    }

    let mut cleaned: Vec<String> = Vec::with_capacity(out.len());
    for line in out {
        if line.is_empty() && cleaned.last().is_some_and(|l: &String| l.is_empty()) {
            continue;
        }
        cleaned.push(line);
    }

    let mut normalized = cleaned.join("\n");
    normalized.push('\n');
    normalized
}

fn collapse_internal_whitespace(line: &str) -> String {
    internal_whitespace_re().replace_all(line, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triple_source_matches_spec_scenario_1() {
        let src = "Tourniquet treats severe bleeding.\n";
        let n = normalize_source_text(src);
        assert_eq!(n, "Tourniquet treats severe bleeding.\n");
        let content = n.as_bytes();
        assert_eq!(&content[0..34], b"Tourniquet treats severe bleeding");
    }

    #[test]
    fn crlf_is_normalized_to_lf() {
        let n = normalize_source_text("a\r\nb\r\n");
        assert!(!n.contains('\r'));
    }

    #[test]
    fn trailing_newline_is_ensured() {
        let n = normalize_source_text("no trailing newline");
        assert!(n.ends_with('\n'));
    }

    #[test]
    fn internal_whitespace_runs_collapse() {
        let n = normalize_source_text("a    b\tc\n");
        assert_eq!(n, "a b c\n");
    }

    #[test]
    fn hyphenated_break_is_joined() {
        let n = normalize_source_text("severe bleed-\ning requires pressure.\n");
        assert!(n.contains("bleeding requires pressure."));
    }

    #[test]
    fn heading_boundary_is_not_merged() {
        let n = normalize_source_text("INTRODUCTION\nfirst body line.\n");
        assert!(n.contains("INTRODUCTION\nfirst body line."));
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_source_text("A paragraph that\nwraps softly here.\n");
        let twice = normalize_source_text(&once);
        assert_eq!(once, twice);
    }
}
