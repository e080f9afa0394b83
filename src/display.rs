//! Console status panels
//!
//! Every user-facing milestone of a run is printed as a titled box. Output
//! goes to any `io::Write` so runs can be captured in tests.

use crate::ai::ERROR_MARKER;
use crossterm::style::{style, Color, Stylize};
use crossterm::tty::IsTty;
use log::{debug, warn};
use ratatui::symbols::border;
use ratatui::text::Span;
use std::io::{self, Stdout, Write};
use std::time::Duration;

/// Visual tone of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Status,
    Summary,
    Success,
    Failure,
    Warning,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Status => Color::Cyan,
            Tone::Summary | Tone::Warning => Color::Yellow,
            Tone::Success => Color::Green,
            Tone::Failure => Color::Red,
        }
    }
}

/// Terminal columns taken by `text`
fn columns(text: &str) -> usize {
    Span::raw(text).width()
}

/// Render a titled box with rounded borders around `body`
///
/// Widths are measured in terminal columns, so wide characters stay aligned.
pub fn render_panel(title: &str, body: &str, tone: Tone, color: bool) -> String {
    let set = border::ROUNDED;
    let lines: Vec<&str> = if body.is_empty() {
        vec![""]
    } else {
        body.lines().collect()
    };
    let title_width = columns(title);
    let content_width = lines
        .iter()
        .map(|line| columns(line))
        .max()
        .unwrap_or(0)
        .max(title_width + 2);

    let paint = |text: String| -> String {
        if color {
            style(text).with(tone.color()).to_string()
        } else {
            text
        }
    };

    let mut out = String::new();
    let top_fill = content_width - title_width - 1;
    out.push_str(&paint(format!(
        "{}{} {} {}{}",
        set.top_left,
        set.horizontal_top,
        title,
        set.horizontal_top.repeat(top_fill),
        set.top_right
    )));
    out.push('\n');
    for line in lines {
        let pad = content_width - columns(line);
        out.push_str(&paint(set.vertical_left.to_string()));
        out.push_str(&format!(" {}{} ", line, " ".repeat(pad)));
        out.push_str(&paint(set.vertical_right.to_string()));
        out.push('\n');
    }
    out.push_str(&paint(format!(
        "{}{}{}",
        set.bottom_left,
        set.horizontal_bottom.repeat(content_width + 2),
        set.bottom_right
    )));
    out.push('\n');
    out
}

/// True when the suggestion text is a rendered failure
pub fn is_error_text(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

/// Panel printer for one run
pub struct Display<W: Write> {
    out: W,
    color: bool,
}

impl Display<Stdout> {
    /// Print to stdout, coloured when attached to a terminal
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_tty();
        Self { out, color }
    }
}

impl<W: Write> Display<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn start(&mut self) {
        self.panel(
            "Status",
            "Starting recurring error log analyzer",
            Tone::Status,
        );
    }

    pub fn summary(&mut self, summary: &str) {
        self.panel("Recurring Error Summary", summary, Tone::Summary);
    }

    /// Show LLM output; rendered failures get the error style
    pub fn suggestions(&mut self, text: &str) {
        if is_error_text(text) {
            self.panel("LLM Request Error", text.trim(), Tone::Failure);
        } else {
            self.panel("LLM Troubleshooting Suggestions", text, Tone::Success);
        }
    }

    pub fn warning(&mut self, message: &str) {
        warn!("{}", message);
        self.panel("Warning", message, Tone::Warning);
    }

    pub fn end(&mut self, duration: Duration) {
        self.panel(
            "Status",
            &format!("Analysis complete in {:.2} seconds", duration.as_secs_f64()),
            Tone::Status,
        );
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn panel(&mut self, title: &str, body: &str, tone: Tone) {
        let rendered = render_panel(title, body, tone, self.color);
        if let Err(e) = self
            .out
            .write_all(rendered.as_bytes())
            .and_then(|_| self.out.flush())
        {
            debug!("Failed to write '{}' panel: {}", title, e);
        }
    }
}
