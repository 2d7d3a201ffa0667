use crate::router::ParseError;

const RESET: &str = "\x1b[0m";

#[derive(Clone, Copy)]
enum Tone {
    Frame,
    Detail,
    Location,
    Source,
    Caret,
    Hint,
    Plain,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Frame => "\x1b[38;5;220m",
            Tone::Detail => "\x1b[38;5;203m",
            Tone::Location => "\x1b[38;5;81m",
            Tone::Source => "\x1b[38;5;250m",
            Tone::Caret => "\x1b[38;5;214m",
            Tone::Hint => "\x1b[38;5;111m",
            Tone::Plain => "",
        }
    }
}

const GUTTER: &str = "  | ";

/// Boxed report of a syntax error with a caret under the offending column.
/// `color` adds ANSI colours; pass `false` when stderr is not a terminal.
pub fn render_parse_error(err: &ParseError, color: bool) -> String {
    let caret = format!(
        "{}{}^",
        " ".repeat(GUTTER.chars().count()),
        " ".repeat(err.col.saturating_sub(1))
    );
    let rows = [
        (format!("error: {}", err.detail), Tone::Detail),
        (format!("at line {}, column {}", err.line, err.col), Tone::Location),
        (String::new(), Tone::Plain),
        (format!("{GUTTER}{}", err.snippet), Tone::Source),
        (caret, Tone::Caret),
        (format!("hint: {}", friendly_hint(&err.detail)), Tone::Hint),
    ];
    let width = rows.iter().map(|(r, _)| r.chars().count()).max().unwrap_or(0);

    let paint = |text: &str, tone: Tone| match (color, tone) {
        (true, Tone::Plain) | (false, _) => text.to_string(),
        (true, t) => format!("{}{text}{RESET}", t.code()),
    };

    let mut out = paint(
        &format!("╭─{:─^width$}─╮", " a11ycheck syntax error ", width = width),
        Tone::Frame,
    );
    out.push('\n');
    for (row, tone) in &rows {
        out.push_str(&paint(&format!("{row:<width$}"), *tone));
        out.push('\n');
    }
    out.push_str(&paint(&format!("╰{:─^w$}╯", "", w = width + 2), Tone::Frame));
    out
}

pub fn friendly_hint(detail: &str) -> &'static str {
    const HINTS: &[(&str, &str)] = &[
        ("unclosed '{'", "Every '{' needs a matching '}'. Quoted braces like \"{\" are not counted."),
        ("unexpected '}'", "This '}' closes nothing. Check for an extra brace or a missing '@if ... {'."),
        ("without a preceding '@if'", "'@elif' and '@else' must follow the closing '}' of an '@if' block."),
        ("needs a condition", "Write the condition before the brace, e.g. '@if: count > 3 {'."),
        ("to open the", "Put the opening '{' at the end of the header line."),
        ("after block parameter", "Nothing may follow the closing '}' of a block parameter on the same line."),
        ("action name", "Actions look like '@name: params', with no space after '@'."),
        ("needs a file name", "Name the script to pull in, e.g. '@include: parts/login.txt'."),
        ("unterminated", "A string or /regex/ was opened but never closed on this line."),
        ("nesting too deep", "Flatten the blocks or move the inner part into a file pulled in with '@include'."),
    ];
    HINTS
        .iter()
        .find(|(needle, _)| detail.contains(needle))
        .map(|(_, hint)| *hint)
        .unwrap_or("Check the directive syntax on this line.")
}
