//! IRCv3 tag handling for Twitch PRIVMSG lines.

use std::collections::HashMap;

use crate::models::Emote;

const EMOTE_CDN: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

/// Splits `@key=value;key2=value2` into a map, unescaping values.
pub fn parse_tags(tag_str: &str) -> HashMap<String, String> {
    tag_str
        .trim_start_matches('@')
        .split(';')
        .filter(|kv| !kv.is_empty())
        .map(|kv| {
            let mut parts = kv.splitn(2, '=');
            let key = parts.next().unwrap_or("").to_string();
            let value = unescape_tag_value(parts.next().unwrap_or(""));
            (key, value)
        })
        .collect()
}

/// IRCv3 tag value escapes: `\s` space, `\:` semicolon, `\\` backslash,
/// `\r` and `\n`.
pub fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Parses the `emotes` tag (`25:0-4,12-16/1902:6-10`) against the message
/// text. Twitch gives inclusive end offsets in chars; the result uses
/// half-open ranges. Malformed entries are skipped, not reported.
pub fn parse_emotes_tag(tag: &str, text: &str) -> Vec<Emote> {
    let chars: Vec<char> = text.chars().collect();
    let mut emotes = Vec::new();

    for group in tag.split('/').filter(|g| !g.is_empty()) {
        let Some((id, ranges)) = group.split_once(':') else {
            continue;
        };
        for range in ranges.split(',') {
            let Some((start, end)) = range.split_once('-') else {
                continue;
            };
            let (Ok(start), Ok(end_inclusive)) = (start.parse::<usize>(), end.parse::<usize>()) else {
                continue;
            };
            let Some(end_index) = end_inclusive.checked_add(1) else {
                continue;
            };
            if start >= end_index {
                continue;
            }
            let name = chars
                .get(start..end_index.min(chars.len()))
                .map(|s| s.iter().collect::<String>())
                .unwrap_or_default();
            emotes.push(Emote {
                id: id.to_string(),
                name,
                image_ref: format!("{EMOTE_CDN}/{id}/default/dark/1.0"),
                start_index: start,
                end_index,
            });
        }
    }
    emotes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_unescaped() {
        let tags = parse_tags("@color=#1E90FF;display-name=Some\\sOne;emotes=;user-id=42");
        assert_eq!(tags.get("color").map(String::as_str), Some("#1E90FF"));
        assert_eq!(tags.get("display-name").map(String::as_str), Some("Some One"));
        assert_eq!(tags.get("emotes").map(String::as_str), Some(""));
        assert_eq!(tags.get("user-id").map(String::as_str), Some("42"));
    }

    #[test]
    fn emotes_tag_becomes_half_open_spans() {
        let text = "Kappa hey Kappa Keepo";
        let emotes = parse_emotes_tag("25:0-4,10-14/1902:16-20", text);
        assert_eq!(emotes.len(), 3);
        assert_eq!((emotes[0].start_index, emotes[0].end_index), (0, 5));
        assert_eq!(emotes[0].name, "Kappa");
        assert_eq!(emotes[2].id, "1902");
        assert_eq!(emotes[2].name, "Keepo");
        assert!(emotes[2].image_ref.ends_with("/1902/default/dark/1.0"));
    }

    #[test]
    fn malformed_ranges_are_skipped() {
        let emotes = parse_emotes_tag("25:0-4,x-9,7/bad", "Kappa");
        assert_eq!(emotes.len(), 1);
    }

    #[test]
    fn huge_or_reversed_offsets_are_skipped() {
        let emotes = parse_emotes_tag("25:0-18446744073709551615,4-2,0-4", "Kappa");
        assert_eq!(emotes.len(), 1);
        assert_eq!((emotes[0].start_index, emotes[0].end_index), (0, 5));
    }
}
