//! mIRC formatting codes.
//!
//! Channel topics and list entries often carry colour and style control
//! codes. The engine hands plain text to its owner, so they are removed here.

const BOLD: char = '\x02';
const COLOR: char = '\x03';
const HEX_COLOR: char = '\x04';
const RESET: char = '\x0f';
const MONOSPACE: char = '\x11';
const REVERSE: char = '\x16';
const ITALIC: char = '\x1d';
const STRIKETHROUGH: char = '\x1e';
const UNDERLINE: char = '\x1f';

/// Remove bold/italic/underline/reverse/reset toggles and colour codes
/// (`\x03` followed by up to two foreground digits and an optional
/// `,` plus up to two background digits).
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            BOLD | RESET | MONOSPACE | REVERSE | ITALIC | STRIKETHROUGH | UNDERLINE => {}
            COLOR => {
                if take_digits(&mut chars, 2) > 0 && chars.peek() == Some(&',') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    // A comma not followed by a digit is ordinary text.
                    if lookahead.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                        take_digits(&mut chars, 2);
                    }
                }
            }
            HEX_COLOR => {
                if take_hex(&mut chars) && chars.peek() == Some(&',') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(char::is_ascii_hexdigit) {
                        chars.next();
                        take_hex(&mut chars);
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, max: usize) -> usize {
    let mut taken = 0;
    while taken < max && chars.peek().is_some_and(char::is_ascii_digit) {
        chars.next();
        taken += 1;
    }
    taken
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let mut taken = 0;
    while taken < 6 && chars.peek().is_some_and(char::is_ascii_hexdigit) {
        chars.next();
        taken += 1;
    }
    taken == 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_formatting("hello, wörld"), "hello, wörld");
    }

    #[test]
    fn test_style_toggles() {
        assert_eq!(
            strip_formatting("\x02bold\x02 \x1ditalic\x1d \x1funder\x0f"),
            "bold italic under"
        );
    }

    #[test]
    fn test_colors() {
        assert_eq!(strip_formatting("\x034red\x03 plain"), "red plain");
        assert_eq!(strip_formatting("\x0304,12on blue"), "on blue");
        assert_eq!(strip_formatting("\x0312,x"), ",x");
        assert_eq!(strip_formatting("\x03,5"), ",5");
        assert_eq!(strip_formatting("\x03123"), "3");
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(strip_formatting("\x04FF0000red"), "red");
        assert_eq!(strip_formatting("\x04FF0000,00FF00both"), "both");
    }
}
