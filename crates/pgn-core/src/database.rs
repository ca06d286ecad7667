//! Splitting a multi-game notation database into single game texts.

/// Split `text` into individual game texts, lazily. A game ends at a
/// literal result token (`1-0`, `0-1`, `1/2-1/2`, `*`); tag runs
/// (`[` … `"]`) and comment runs (`{` … `}`) are copied verbatim and are
/// never scanned for terminators, so a comment containing `1-0` does not
/// end a game. Each produced game is the tag section, a blank line, and
/// the move text (newlines normalized to spaces, terminator included).
pub fn split_games(text: &str) -> GameSplitter<'_> {
    GameSplitter {
        bytes: text.as_bytes(),
        pos: 0,
    }
}

const TERMINATORS: [&[u8]; 4] = [b"1/2-1/2", b"1-0", b"0-1", b"*"];

/// Lazy iterator over game texts. Finite, not restartable.
pub struct GameSplitter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn assemble(tags: &[u8], movetext: &[u8]) -> String {
    let tags = String::from_utf8_lossy(tags);
    let moves = String::from_utf8_lossy(movetext);
    let tags = tags.trim();
    let moves = moves.trim();
    if tags.is_empty() {
        moves.to_string()
    } else {
        format!("{tags}\n\n{moves}")
    }
}

fn is_blank(buf: &[u8]) -> bool {
    buf.iter().all(|b| b.is_ascii_whitespace())
}

impl Iterator for GameSplitter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let bytes = self.bytes;
        let mut tags: Vec<u8> = Vec::new();
        let mut movetext: Vec<u8> = Vec::new();
        let mut i = self.pos;

        while i < bytes.len() {
            match bytes[i] {
                b'[' => {
                    // tag run: up to the closing `"]` (or end of line for
                    // a tag that never closes)
                    let start = i;
                    i += 1;
                    let mut prev = b'[';
                    while i < bytes.len() {
                        let c = bytes[i];
                        i += 1;
                        if (c == b']' && prev == b'"') || c == b'\n' {
                            break;
                        }
                        prev = c;
                    }
                    tags.extend_from_slice(&bytes[start..i]);
                    tags.push(b'\n');
                }
                b'{' => {
                    let start = i;
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'}' {
                        i += 1;
                    }
                    if i < bytes.len() {
                        i += 1;
                    }
                    movetext.extend_from_slice(&bytes[start..i]);
                }
                _ => {
                    if let Some(token) = TERMINATORS.iter().find(|t| bytes[i..].starts_with(t)) {
                        if movetext.last().map_or(false, |b| !b.is_ascii_whitespace()) {
                            movetext.push(b' ');
                        }
                        movetext.extend_from_slice(token);
                        self.pos = i + token.len();
                        return Some(assemble(&tags, &movetext));
                    }
                    movetext.push(match bytes[i] {
                        b'\n' | b'\r' => b' ',
                        c => c,
                    });
                    i += 1;
                }
            }
        }

        self.pos = bytes.len();
        if is_blank(&tags) && is_blank(&movetext) {
            None
        } else {
            // trailing game without a terminator
            Some(assemble(&tags, &movetext))
        }
    }
}
