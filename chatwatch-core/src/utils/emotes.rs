//! Emote span normalization.
//!
//! Sources hand us emote spans in whatever order they parsed them, and
//! nothing stops two spans from overlapping or running past the end of the
//! text (substituted text can be shorter than the original). After
//! [`normalize_emotes`] the spans are sorted, in bounds, non-empty, and
//! satisfy `emotes[i].end_index < emotes[i + 1].start_index`.
//!
//! Clipping rule: a span that starts at or before the previous kept span's
//! end is moved to start one char after it (emotes are whitespace-separated
//! tokens, so there is always a separator). If that leaves it empty it is
//! dropped. A span whose bounds change gets its `name` re-read from the
//! clipped range of `text`.

use tracing::debug;

use crate::models::Emote;

/// Sorts and clips `emotes` in place against `text`. Returns how many spans were dropped.
pub fn normalize_emotes(text: &str, emotes: &mut Vec<Emote>) -> usize {
    if emotes.is_empty() {
        return 0;
    }
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();

    emotes.sort_by(|a, b| {
        a.start_index
            .cmp(&b.start_index)
            .then(a.end_index.cmp(&b.end_index))
    });

    let mut kept: Vec<Emote> = Vec::with_capacity(emotes.len());
    let mut dropped = 0;
    for mut emote in emotes.drain(..) {
        let original = (emote.start_index, emote.end_index);
        emote.end_index = emote.end_index.min(text_len);
        if let Some(prev) = kept.last() {
            let min_start = prev.end_index + 1;
            if emote.start_index < min_start {
                emote.start_index = min_start;
            }
        }
        if emote.start_index >= emote.end_index {
            dropped += 1;
            continue;
        }
        if (emote.start_index, emote.end_index) != original {
            emote.name = chars[emote.start_index..emote.end_index].iter().collect();
        }
        kept.push(emote);
    }

    if dropped > 0 {
        debug!("normalize_emotes: dropped {} span(s) for text of {} chars", dropped, text_len);
    }
    *emotes = kept;
    dropped
}
