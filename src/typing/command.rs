//! Typing commands and their shared execution semantics.

/// One unit of work for the injector.
///
/// Positions and lengths are counted in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingCommand {
    /// Type one word, with a separating space decided at execution time.
    TypeWord { word: String },
    /// Replace the tail of the typed text: delete `chars_to_delete`
    /// characters starting at `position`, then type `new_text`. The
    /// deletion range always extends to the end of the typed text.
    Correction {
        position: usize,
        chars_to_delete: usize,
        new_text: String,
    },
}

/// Punctuation that attaches to the preceding word without a space.
fn is_leading_punctuation(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | '!' | '?' | ';' | ':' | ')' | ']' | '}' | '\'' | '"' | '…' | '%'
    )
}

/// Decide whether a separating space is needed before `word`.
///
/// No space at session start, after whitespace, or before leading
/// punctuation. This single rule is shared by the injector and by
/// [`replay`] so the two can never disagree.
pub fn needs_leading_space(last_char: Option<char>, word: &str) -> bool {
    let Some(last) = last_char else {
        return false;
    };
    if last.is_whitespace() {
        return false;
    }
    match word.chars().next() {
        Some(first) => !is_leading_punctuation(first),
        None => false,
    }
}

/// Apply a command log to an empty buffer.
///
/// Mirrors the injector's execution semantics exactly (spacing rule,
/// end-anchored corrections); used as the replay oracle in tests and for
/// logging what a session typed.
pub fn replay(commands: &[TypingCommand]) -> String {
    let mut text = String::new();

    for command in commands {
        match command {
            TypingCommand::TypeWord { word } => {
                if needs_leading_space(text.chars().last(), word) {
                    text.push(' ');
                }
                text.push_str(word);
            }
            TypingCommand::Correction {
                position, new_text, ..
            } => {
                // Backspacing to `position` then typing the replacement.
                let keep: String = text.chars().take(*position).collect();
                text = keep;
                text.push_str(new_text);
            }
        }
    }

    text
}
