//! The workarea: the ordered list of emitted text fragments and the
//! line-break discipline every emission goes through.
//!
//! Before text is appended, the current last line is considered; anything
//! that would overflow the line width is split at the last space inside the
//! window, or cut hard when a single token is wider than the window.
//! Continuation lines may carry an alignment indent.

/// Evaluator output buffer.
#[derive(Debug)]
pub struct Workarea {
    pieces: Vec<String>,
    pub linesep: String,
    pub max_width: usize,
}

impl Workarea {
    pub fn new(max_width: usize) -> Self {
        Self {
            pieces: Vec::new(),
            linesep: "\n".to_owned(),
            max_width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.iter().all(|p| p.is_empty())
    }

    /// Index marking the current end; used to carve out nested output.
    pub fn mark(&self) -> usize {
        self.pieces.len()
    }

    /// Remove and return everything emitted after `mark`.
    pub fn take_from(&mut self, mark: usize) -> String {
        self.pieces.split_off(mark).concat()
    }

    /// Text since the last line separator.
    pub fn last_line(&self) -> String {
        let mut collected: Vec<&str> = Vec::new();
        for piece in self.pieces.iter().rev() {
            if let Some(at) = piece.rfind(&self.linesep) {
                collected.push(&piece[at + self.linesep.len()..]);
                break;
            }
            collected.push(piece);
        }
        collected.into_iter().rev().collect()
    }

    pub fn push_raw(&mut self, text: &str) {
        if !text.is_empty() {
            self.pieces.push(text.to_owned());
        }
    }

    pub fn newline(&mut self) {
        self.pieces.push(self.linesep.clone());
    }

    /// `/`: break only when the last line already has content.
    pub fn conditional_newline(&mut self) {
        if !self.last_line().is_empty() {
            self.newline();
        }
    }

    /// `%`: collapse runs of blank lines into a single one.
    pub fn squeeze_blank_lines(&mut self) {
        let mut kept = Vec::with_capacity(self.pieces.len());
        let mut run = 0usize;
        for piece in self.pieces.drain(..) {
            if piece == self.linesep {
                run += 1;
            } else if !piece.is_empty() {
                run = 0;
            }
            if run <= 1 {
                kept.push(piece);
            }
        }
        self.pieces = kept;
    }

    /// `Xn`: n spaces, or a line break when they would overflow.
    pub fn spaces(&mut self, n: usize) {
        if char_len(&self.last_line()) + n <= self.max_width {
            self.push_raw(&" ".repeat(n));
        } else {
            self.newline();
        }
    }

    /// `Cn`: tabulate to column n, moving to the next line when already
    /// past it; ignored when the column lies outside the line width.
    pub fn tab_to(&mut self, n: usize) {
        if n > self.max_width || n == 0 {
            return;
        }
        let len = char_len(&self.last_line());
        if len >= n {
            self.newline();
            self.push_raw(&" ".repeat(n - 1));
        } else {
            self.push_raw(&" ".repeat(n - len - 1));
        }
    }

    /// Append text under the width discipline, no alignment.
    pub fn emit(&mut self, text: &str) {
        self.emit_aligned(text, 0, 0, self.max_width);
    }

    /// Append field text: indent `first` on a fresh line, `next` on
    /// continuations, within `max_width - 1` columns.
    pub fn emit_field(&mut self, text: &str, first: usize, next: usize) {
        self.emit_aligned(text, first, next, self.max_width.saturating_sub(1));
    }

    fn emit_aligned(&mut self, text: &str, first: usize, next: usize, width: usize) {
        let linesep = self.linesep.clone();
        let segments: Vec<&str> = text.split(linesep.as_str()).collect();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.emit_segment(segment, first, next, width);
        }
    }

    fn emit_segment(&mut self, segment: &str, first: usize, next: usize, width: usize) {
        if segment.is_empty() {
            return;
        }
        if width == 0 {
            self.push_raw(segment);
            return;
        }

        let mut lastline = self.last_line();
        if char_len(&lastline) >= width {
            self.newline();
            lastline.clear();
        }

        let mut piece = String::new();
        if lastline.is_empty() && first > 0 {
            piece.push_str(&" ".repeat(first));
        }
        piece.push_str(segment);

        // a leading unbreakable token ending in two spaces forces an early
        // break instead of a mid-token cut
        if !lastline.is_empty() {
            if let Some((head, _)) = piece.split_once("  ") {
                if !head.contains(' ')
                    && char_len(&lastline) + char_len(head) + 2 > width
                {
                    self.newline();
                    lastline.clear();
                    piece = if first > 0 {
                        format!("{}{}", " ".repeat(first), segment)
                    } else {
                        segment.to_owned()
                    };
                }
            }
        }

        let full = format!("{lastline}{piece}");
        if char_len(&full) <= width {
            self.push_raw(&piece);
            return;
        }

        let continuation = " ".repeat(next);
        let mut pieces = break_line(&full, width, &continuation);

        if char_len(&pieces[0]) < char_len(&lastline) {
            // nothing of the new text fits after the existing line
            self.newline();
            let fresh = format!(
                "{}{}",
                if first > 0 { " ".repeat(first) } else { String::new() },
                segment
            );
            pieces = break_line(&fresh, width, &continuation);
            for (i, p) in pieces.iter().enumerate() {
                if i > 0 {
                    self.newline();
                }
                self.push_raw(p);
            }
            return;
        }

        let skip = lastline.chars().count();
        for (i, p) in pieces.iter().enumerate() {
            if i == 0 {
                self.push_raw(&p.chars().skip(skip).collect::<String>());
            } else {
                self.newline();
                self.push_raw(p);
            }
        }
    }

    pub fn into_string(self) -> String {
        self.pieces.concat()
    }
}

/// Split a line into pieces no longer than `max_width`, breaking at word
/// boundaries. A token with no spaces inside the window is cut hard at the
/// window edge. Continuation pieces are prefixed with `continuation`.
pub fn break_line(line: &str, max_width: usize, continuation: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= max_width || max_width == 0 {
        return vec![line.to_owned()];
    }
    // an indent as wide as the window would never converge
    let continuation = if char_len(continuation) >= max_width {
        ""
    } else {
        continuation
    };

    let window_end = (max_width + 1).min(chars.len());
    let mut cut = chars[..window_end]
        .iter()
        .rposition(|&c| c == ' ')
        .map(|p| p as isize)
        .unwrap_or(-1);

    // step over a double space so the break lands before it
    if cut > 0 && chars.get(cut as usize + 1) == Some(&' ') {
        cut = chars[..cut as usize]
            .iter()
            .rposition(|&c| c == ' ')
            .map(|p| p as isize)
            .unwrap_or(-1);
    }

    if cut <= 0 {
        cut = max_width as isize;
    }
    let mut cut = cut as usize;
    if chars[..cut].iter().all(|&c| c == ' ') {
        cut = max_width - 1;
    }

    let head: String = chars[..(cut + 1).min(chars.len())].iter().collect();
    let rest: String = chars[(cut + 1).min(chars.len())..].iter().collect();

    let mut result = vec![head];
    if !rest.is_empty() {
        let rest = format!("{continuation}{rest}");
        result.extend(break_line(&rest, max_width, continuation));
    }
    result
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
