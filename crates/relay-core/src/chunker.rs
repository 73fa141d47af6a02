//! Re-segments the delta sequence into bounded display chunks.

use tracing::debug;

use crate::delta::{Delta, DeltaKind};

/// Default chunk limit in characters. Host chat lines cap out around 256.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 250;

/// A period further back than this from the limit makes the break look too early.
const PERIOD_LOOKBACK: usize = 30;
/// Same for commas, with a tighter window.
const COMMA_LOOKBACK: usize = 20;

/// A bounded, trimmed, non-empty piece of answer text ready for display.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Position of this chunk within its query, starting at 0 with no gaps.
    pub sequence: u64,
}

/// Lifecycle of a [`Chunker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkerState {
    Accumulating,
    Done,
}

/// Returns the byte offset at which `text` should be cut so the head holds at
/// most `max_len` characters.
///
/// Preference order inside the first `max_len` characters: after the last
/// period if it sits in the final 30 characters, after the last comma if it
/// sits in the final 20, after the last space anywhere past the start, and
/// finally a hard cut at `max_len`. Text that already fits is returned whole.
pub fn find_break_point(text: &str, max_len: usize) -> usize {
    let mut hard_cut = None;
    let mut period = None;
    let mut comma = None;
    let mut space = None;

    for (idx, (offset, ch)) in text.char_indices().enumerate() {
        if idx == max_len {
            hard_cut = Some(offset);
            break;
        }
        let after = offset + ch.len_utf8();
        match ch {
            '.' => period = Some((idx, after)),
            ',' => comma = Some((idx, after)),
            ' ' => space = Some((idx, after)),
            _ => {}
        }
    }

    let Some(hard_cut) = hard_cut else {
        return text.len();
    };
    if let Some((idx, after)) = period
        && idx + PERIOD_LOOKBACK > max_len
    {
        return after;
    }
    if let Some((idx, after)) = comma
        && idx + COMMA_LOOKBACK > max_len
    {
        return after;
    }
    if let Some((idx, after)) = space
        && idx > 0
    {
        return after;
    }
    hard_cut
}

/// Per-query accumulation buffer plus duplicate-suppression memory.
#[derive(Debug)]
pub struct Chunker {
    max_len: usize,
    buffer: String,
    last_emitted: Option<String>,
    next_sequence: u64,
    state: ChunkerState,
}

impl Chunker {
    /// Creates a chunker. A zero limit is raised to one character.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            buffer: String::new(),
            last_emitted: None,
            next_sequence: 0,
            state: ChunkerState::Accumulating,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn state(&self) -> ChunkerState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ChunkerState::Done
    }

    /// Number of chunks emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Text received but not yet emitted.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feeds one delta and returns the chunks it completes, in order.
    pub fn push(&mut self, delta: Delta) -> Vec<Chunk> {
        let mut out = Vec::new();
        if self.is_done() {
            debug!(kind = ?delta.kind, "ignoring delta after end of generation");
            return out;
        }
        match delta.kind {
            DeltaKind::Text => {
                self.buffer.push_str(&delta.text);
                self.drain_full(&mut out);
            }
            DeltaKind::Flush => self.flush(&mut out),
            DeltaKind::End => {
                self.flush(&mut out);
                self.state = ChunkerState::Done;
            }
        }
        out
    }

    /// Emits a one-off notice (for example a failure message) and ends the
    /// query. Buffered text is dropped. The notice is cut to the chunk limit.
    pub fn notice(&mut self, message: &str) -> Option<Chunk> {
        self.buffer.clear();
        self.state = ChunkerState::Done;
        let cut = match message.char_indices().nth(self.max_len) {
            Some((offset, _)) => offset,
            None => message.len(),
        };
        let mut out = Vec::new();
        self.emit(&message[..cut], &mut out);
        out.pop()
    }

    fn drain_full(&mut self, out: &mut Vec<Chunk>) {
        while self.buffer.chars().count() >= self.max_len {
            let cut = find_break_point(&self.buffer, self.max_len);
            let head: String = self.buffer.drain(..cut).collect();
            self.emit(&head, out);
        }
    }

    fn flush(&mut self, out: &mut Vec<Chunk>) {
        self.drain_full(out);
        if self.buffer.is_empty() {
            return;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.emit(&rest, out);
    }

    fn emit(&mut self, raw: &str, out: &mut Vec<Chunk>) {
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        if self.last_emitted.as_deref() == Some(text) {
            debug!(seq = self.next_sequence, "suppressing duplicate chunk");
            return;
        }
        out.push(Chunk {
            text: text.to_string(),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        self.last_emitted = Some(text.to_string());
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn run(chunker: &mut Chunker, deltas: Vec<Delta>) -> Vec<Chunk> {
        deltas.into_iter().flat_map(|d| chunker.push(d)).collect()
    }

    #[test]
    fn short_text_is_returned_whole() {
        assert_eq!(find_break_point("hello world", 250), 11);
        assert_eq!(find_break_point(&"x".repeat(250), 250), 250);
    }

    #[test]
    fn prefers_late_period() {
        let text = format!("{}. tail words here", "a".repeat(240));
        assert_eq!(find_break_point(&text, 250), 241);
    }

    #[test]
    fn rejects_early_period_and_uses_late_comma() {
        // period at 100 is too early, comma at 235 is inside the 20-char window
        let mut text = "a".repeat(100);
        text.push('.');
        text.push_str(&"b".repeat(134));
        text.push(',');
        text.push_str(&"c".repeat(50));
        assert_eq!(find_break_point(&text, 250), 236);
    }

    #[test]
    fn falls_back_to_last_space() {
        // comma at 200 is outside the 20-char window
        let mut text = "a".repeat(200);
        text.push(',');
        text.push_str(&"b".repeat(20));
        text.push(' ');
        text.push_str(&"c".repeat(60));
        assert_eq!(find_break_point(&text, 250), 222);
    }

    #[test]
    fn leading_space_does_not_count_and_hard_break_applies() {
        let text = format!(" {}", "z".repeat(300));
        assert_eq!(find_break_point(&text, 250), 250);
        assert_eq!(find_break_point(&"q".repeat(260), 250), 250);
    }

    #[test]
    fn never_looks_past_the_limit() {
        // the only period sits exactly at the limit and must not be used
        let text = format!("{}.{}", "a".repeat(250), "b".repeat(10));
        assert_eq!(find_break_point(&text, 250), 250);
    }

    #[test]
    fn break_point_respects_multibyte_characters() {
        let text = "é".repeat(260);
        let cut = find_break_point(&text, 250);
        assert_eq!(text[..cut].chars().count(), 250);
    }

    #[test]
    fn undelimited_text_yields_hard_break_then_remainder() {
        let mut chunker = Chunker::new(250);
        let chunks = run(
            &mut chunker,
            vec![Delta::text("x".repeat(130)), Delta::text("x".repeat(130)), Delta::end()],
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.len(), 250);
        assert_eq!(chunks[1].text.len(), 10);
        assert_eq!(
            chunks.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(chunker.is_done());
    }

    #[test]
    fn large_delta_is_split_until_under_limit() {
        let mut chunker = Chunker::new(10);
        let chunks = chunker.push(Delta::text("abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(texts(&chunks), vec!["abcdefghij", "klmnopqrst"]);
        assert_eq!(chunker.pending(), "uvwxyz");
    }

    #[test]
    fn chunks_are_trimmed_and_whitespace_only_is_dropped() {
        let mut chunker = Chunker::new(12);
        let chunks = run(
            &mut chunker,
            vec![Delta::text("hello there friend"), Delta::text("   "), Delta::end()],
        );
        assert_eq!(texts(&chunks), vec!["hello there", "friend"]);
    }

    #[test]
    fn consecutive_duplicates_are_suppressed() {
        let mut chunker = Chunker::new(5);
        let chunks = run(
            &mut chunker,
            vec![Delta::text("abcde"), Delta::text("abcde"), Delta::text("fgh"), Delta::end()],
        );
        assert_eq!(texts(&chunks), vec!["abcde", "fgh"]);
        assert_eq!(chunks[1].sequence, 1);
    }

    #[test]
    fn flush_emits_short_buffer_without_ending() {
        let mut chunker = Chunker::new(250);
        let first = run(&mut chunker, vec![Delta::text("Short answer."), Delta::flush()]);
        assert_eq!(texts(&first), vec!["Short answer."]);
        assert!(!chunker.is_done());
        let second = run(&mut chunker, vec![Delta::text("More."), Delta::end()]);
        assert_eq!(second[0].sequence, 1);
    }

    #[test]
    fn end_without_text_is_a_clean_zero_chunk_outcome() {
        let mut chunker = Chunker::default();
        assert!(chunker.push(Delta::end()).is_empty());
        assert!(chunker.is_done());
        assert_eq!(chunker.emitted(), 0);
    }

    #[test]
    fn deltas_after_end_are_ignored() {
        let mut chunker = Chunker::default();
        chunker.push(Delta::end());
        assert!(chunker.push(Delta::text("late")).is_empty());
        assert!(chunker.push(Delta::end()).is_empty());
        assert_eq!(chunker.pending(), "");
    }

    #[test]
    fn notice_takes_next_sequence_and_is_bounded() {
        let mut chunker = Chunker::new(10);
        let before = chunker.push(Delta::text("0123456789"));
        assert_eq!(before.len(), 1);
        chunker.push(Delta::text("pending"));
        let notice = chunker.notice("Error talking to Claude: boom").expect("notice");
        assert_eq!(notice.sequence, 1);
        assert_eq!(notice.text, "Error talk");
        assert!(chunker.is_done());
    }

    /// Replays `fragments` through the break rules without duplicate
    /// suppression and returns every trimmed, non-empty piece in order.
    fn unsuppressed_pieces(fragments: &[String], limit: usize) -> Vec<String> {
        fn cut_into(raw: String, pieces: &mut Vec<String>) {
            let text = raw.trim();
            if !text.is_empty() {
                pieces.push(text.to_string());
            }
        }

        let mut buffer = String::new();
        let mut pieces = Vec::new();
        for fragment in fragments {
            buffer.push_str(fragment);
            while buffer.chars().count() >= limit {
                let cut = find_break_point(&buffer, limit);
                cut_into(buffer.drain(..cut).collect(), &mut pieces);
            }
        }
        cut_into(buffer, &mut pieces);
        pieces
    }

    #[test]
    fn invariants_hold_for_varied_inputs() {
        let words = [
            "The", "creeper", "explodes,", "so", "keep", "distance.", "Use", "a", "shield",
            "and", "bow;", "diamonds", "spawn", "below", "y=16.", "Redstone", "dust,", "too",
            "",
        ];
        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        let limits = [8_usize, 25, 60, 250];
        let mut seed = 7_u64;
        let mut checked = 0;
        for limit in limits {
            let mut chunker = Chunker::new(limit);
            let mut fragments = Vec::new();
            let mut chunks = Vec::new();
            for _ in 0..400 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let word = words[(seed >> 33) as usize % words.len()];
                let fragment = if seed % 3 == 0 {
                    format!("{word} ")
                } else {
                    word.to_string()
                };
                chunks.extend(chunker.push(Delta::text(fragment.clone())));
                fragments.push(fragment);
            }
            chunks.extend(chunker.push(Delta::end()));

            for (idx, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.sequence, idx as u64);
                assert!(chunk.text.chars().count() <= limit);
                assert!(!chunk.text.is_empty());
            }
            for pair in chunks.windows(2) {
                assert_ne!(pair[0].text, pair[1].text);
            }

            // every piece of input lands in some piece, and only consecutive
            // repeats of a piece are missing from the output
            let pieces = unsuppressed_pieces(&fragments, limit);
            assert_eq!(strip(&pieces.concat()), strip(&fragments.concat()));
            let mut expected = pieces;
            expected.dedup();
            let emitted: Vec<String> = chunks.into_iter().map(|chunk| chunk.text).collect();
            assert_eq!(emitted, expected, "limit {limit}");
            checked += 1;
        }
        assert_eq!(checked, limits.len());
    }
}
