//! ANSI escape decoding
//!
//! The proxy writes coloured output. Lines are kept raw in the buffer and
//! decoded here either into styled spans or into plain text.

use vte::{Params, Parser, Perform};

/// Terminal colour as written by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiColor {
    /// 0..=7 normal, 8..=15 bright
    Basic(u8),
    /// 256-colour palette index
    Palette(u8),
    Rgb(u8, u8, u8),
}

impl AnsiColor {
    /// Resolve to concrete RGB using the xterm palette
    pub fn to_rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Basic(idx) | Self::Palette(idx) if idx < 16 => BASIC_PALETTE[idx as usize],
            Self::Basic(_) => BASIC_PALETTE[7],
            Self::Palette(idx) if idx < 232 => {
                let idx = idx - 16;
                let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
                (level(idx / 36), level((idx / 6) % 6), level(idx % 6))
            }
            Self::Palette(idx) => {
                let gray = 8 + (idx - 232) * 10;
                (gray, gray, gray)
            }
            Self::Rgb(r, g, b) => (r, g, b),
        }
    }
}

const BASIC_PALETTE: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00),
    (0xcd, 0x31, 0x31),
    (0x0d, 0xbc, 0x79),
    (0xe5, 0xe5, 0x10),
    (0x24, 0x72, 0xc8),
    (0xbc, 0x3f, 0xbc),
    (0x11, 0xa8, 0xcd),
    (0xe5, 0xe5, 0xe5),
    (0x66, 0x66, 0x66),
    (0xf1, 0x4c, 0x4c),
    (0x23, 0xd1, 0x8b),
    (0xf5, 0xf5, 0x43),
    (0x3b, 0x8e, 0xea),
    (0xd6, 0x70, 0xd6),
    (0x29, 0xb8, 0xdb),
    (0xff, 0xff, 0xff),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub fg: Option<AnsiColor>,
    pub bg: Option<AnsiColor>,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Style {
    fn apply_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            *self = Style::default();
            return;
        }

        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => *self = Style::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                n @ 30..=37 => self.fg = Some(AnsiColor::Basic((n - 30) as u8)),
                39 => self.fg = None,
                n @ 40..=47 => self.bg = Some(AnsiColor::Basic((n - 40) as u8)),
                49 => self.bg = None,
                n @ 90..=97 => self.fg = Some(AnsiColor::Basic((n - 90 + 8) as u8)),
                n @ 100..=107 => self.bg = Some(AnsiColor::Basic((n - 100 + 8) as u8)),
                n @ (38 | 48) => {
                    let (color, used) = extended_color(&params[i + 1..]);
                    if let Some(color) = color {
                        if n == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse the tail of a 38/48 sequence. Returns the colour and how many
/// parameters it consumed.
fn extended_color(rest: &[u16]) -> (Option<AnsiColor>, usize) {
    match rest {
        [5, idx, ..] => (Some(AnsiColor::Palette((*idx).min(255) as u8)), 2),
        [2, r, g, b, ..] => (
            Some(AnsiColor::Rgb(
                (*r).min(255) as u8,
                (*g).min(255) as u8,
                (*b).min(255) as u8,
            )),
            4,
        ),
        [] => (None, 0),
        _ => (None, rest.len()),
    }
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: Style,
}

/// Collects printed text into spans, switching style on SGR
#[derive(Default)]
struct SpanCollector {
    spans: Vec<StyledSpan>,
    style: Style,
    text: String,
}

impl SpanCollector {
    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        match self.spans.last_mut() {
            Some(last) if last.style == self.style => last.text.push_str(&text),
            _ => self.spans.push(StyledSpan {
                text,
                style: self.style,
            }),
        }
    }

    fn finish(mut self) -> Vec<StyledSpan> {
        self.flush();
        self.spans
    }
}

impl Perform for SpanCollector {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\t' {
            self.text.push('\t');
        }
    }

    fn csi_dispatch(&mut self, params: &Params, _intermediates: &[u8], _ignore: bool, action: char) {
        if action != 'm' {
            return;
        }
        self.flush();
        // Colon sub-parameters (38:5:208) flatten to the same list as semicolons
        let params: Vec<u16> = params.iter().flatten().copied().collect();
        self.style.apply_sgr(&params);
    }
}

/// Decode a line into styled spans. Unknown escape sequences are dropped.
pub fn parse(line: &str) -> Vec<StyledSpan> {
    let mut parser = Parser::new();
    let mut collector = SpanCollector::default();
    for &byte in line.as_bytes() {
        parser.advance(&mut collector, byte);
    }
    collector.finish()
}

/// Remove every escape sequence, keeping only the visible text
pub fn strip(line: &str) -> String {
    if !line.contains('\x1b') {
        return line.to_string();
    }
    parse(line).into_iter().map(|span| span.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_text_unchanged() {
        assert_eq!(strip("[INFO] Proxy started"), "[INFO] Proxy started");
    }

    #[test]
    fn test_strip_removes_sgr_and_osc() {
        let line = "\x1b[32m[INFO]\x1b[0m Listening on \x1b]0;title\x07port 25565";
        assert_eq!(strip(line), "[INFO] Listening on port 25565");
    }

    #[test]
    fn test_parse_colors() {
        let spans = parse("\x1b[1;31mERROR\x1b[0m plain \x1b[38;5;208morange\x1b[38;2;1;2;3mrgb");
        assert_eq!(spans.len(), 4);

        assert_eq!(spans[0].text, "ERROR");
        assert!(spans[0].style.bold);
        assert_eq!(spans[0].style.fg, Some(AnsiColor::Basic(1)));

        assert_eq!(spans[1].text, " plain ");
        assert_eq!(spans[1].style, Style::default());

        assert_eq!(spans[2].style.fg, Some(AnsiColor::Palette(208)));
        assert_eq!(spans[3].style.fg, Some(AnsiColor::Rgb(1, 2, 3)));
    }

    #[test]
    fn test_parse_bright_and_merge() {
        let spans = parse("\x1b[92mok\x1b[92m still ok");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "ok still ok");
        assert_eq!(spans[0].style.fg, Some(AnsiColor::Basic(10)));
    }

    #[test]
    fn test_parse_drops_cursor_sequences() {
        let spans = parse("\x1b[2K\x1b[1Gdone \x1b[33m\u{2713}\x1b[m");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "done ");
        assert_eq!(spans[1].text, "\u{2713}");
        assert_eq!(spans[1].style.fg, Some(AnsiColor::Basic(3)));
    }

    #[test]
    fn test_palette_resolution() {
        assert_eq!(AnsiColor::Palette(16).to_rgb(), (0, 0, 0));
        assert_eq!(AnsiColor::Palette(231).to_rgb(), (255, 255, 255));
        assert_eq!(AnsiColor::Palette(232).to_rgb(), (8, 8, 8));
        assert_eq!(AnsiColor::Basic(1).to_rgb(), BASIC_PALETTE[1]);
    }
}
