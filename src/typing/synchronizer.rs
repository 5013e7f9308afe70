//! Incremental transcript synchronization.
//!
//! Streaming providers revise their partials: a later snapshot may change
//! or drop words an earlier one contained. Typing every partial verbatim
//! corrupts the screen; retyping from scratch flickers. The synchronizer
//! diffs each snapshot against what has already been committed and emits
//! the minimal command sequence that converges the screen on the newest
//! transcript.
//!
//! Diff policy (fixed deliberately, see DESIGN.md): character-level
//! longest-common-prefix diff with **end-anchored corrections**. Keystroke
//! deletion can only remove characters from the end of the typed text, so
//! when a revision touches the middle of the committed text the correction
//! deletes back to the divergence point and retypes the rest; the common
//! suffix is folded into the replacement instead of being preserved
//! in place. Appends at word boundaries become plain `TypeWord`s.

use crate::typing::command::TypingCommand;

/// Collapse whitespace runs and trim, so the committed transcript matches
/// the screen text the injector produces (words joined by single spaces).
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Diffs transcript snapshots into typing commands for one utterance.
#[derive(Debug, Default)]
pub struct TranscriptSynchronizer {
    /// Whitespace-normalized transcript already converted to commands.
    committed: String,
}

impl TranscriptSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transcript state the emitted commands have converged on.
    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// Process a provisional snapshot.
    pub fn push_partial(&mut self, text: &str) -> Vec<TypingCommand> {
        self.diff(text)
    }

    /// Process the final snapshot for the utterance, then reset for the
    /// next one.
    pub fn finalize(&mut self, text: &str) -> Vec<TypingCommand> {
        let commands = self.diff(text);
        self.committed.clear();
        commands
    }

    /// Forget the current utterance without emitting anything.
    pub fn reset(&mut self) {
        self.committed.clear();
    }

    fn diff(&mut self, raw: &str) -> Vec<TypingCommand> {
        let new = normalize_whitespace(raw);
        if new == self.committed {
            return Vec::new();
        }

        let old_chars: Vec<char> = self.committed.chars().collect();
        let new_chars: Vec<char> = new.chars().collect();

        let prefix = old_chars
            .iter()
            .zip(new_chars.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let commands = if prefix == old_chars.len() {
            // The committed text is a prefix of the new text.
            let appended: String = new_chars[prefix..].iter().collect();
            if prefix == 0 || appended.starts_with(' ') {
                // Word-boundary append: one TypeWord per token. The
                // injector reintroduces the separating spaces.
                appended
                    .split_whitespace()
                    .map(|word| TypingCommand::TypeWord {
                        word: word.to_string(),
                    })
                    .collect()
            } else {
                // The last word grew in place ("he" -> "hello"): typed
                // directly, no separating space.
                vec![TypingCommand::Correction {
                    position: prefix,
                    chars_to_delete: 0,
                    new_text: appended,
                }]
            }
        } else {
            // Revision: delete back to the divergence point, retype the
            // rest. End-anchored, so the range always ends at the
            // committed length.
            vec![TypingCommand::Correction {
                position: prefix,
                chars_to_delete: old_chars.len() - prefix,
                new_text: new_chars[prefix..].iter().collect(),
            }]
        };

        self.committed = new;
        commands
    }
}
