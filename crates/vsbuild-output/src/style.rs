//! Line-oriented console output with a textual style label per line.

use std::fmt;
use std::io::{self, Write};

/// How a line is presented. Rendered as a fixed-width text label rather than
/// colour so the output survives any terminal and any log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Normal,
    Header,
    Success,
    Info,
    Failure,
    Error,
}

impl Style {
    /// The five-character label printed in front of every line.
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "     ",
            Self::Header => "hdr  ",
            Self::Success => "OK   ",
            Self::Info => "Inf  ",
            Self::Failure => "FAIL ",
            Self::Error => "ERR  ",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A console that prints whole lines in a current style.
pub trait StyledTextOutput {
    /// Print `text` as one line in the current style.
    ///
    /// # Errors
    /// Returns an error if the underlying stream cannot be written.
    fn println(&mut self, text: &str) -> io::Result<()>;

    /// Print an empty, unlabelled line.
    ///
    /// # Errors
    /// Returns an error if the underlying stream cannot be written.
    fn blank_line(&mut self) -> io::Result<()>;

    fn style(&self) -> Style;

    fn set_style(&mut self, style: Style);
}

impl<T: StyledTextOutput + ?Sized> StyledTextOutput for &mut T {
    fn println(&mut self, text: &str) -> io::Result<()> {
        (**self).println(text)
    }

    fn blank_line(&mut self) -> io::Result<()> {
        (**self).blank_line()
    }

    fn style(&self) -> Style {
        (**self).style()
    }

    fn set_style(&mut self, style: Style) {
        (**self).set_style(style);
    }
}

/// Restores the saved style when dropped, including during unwinding.
struct StyleGuard<'a, O: StyledTextOutput + ?Sized> {
    out: &'a mut O,
    saved: Style,
}

impl<O: StyledTextOutput + ?Sized> Drop for StyleGuard<'_, O> {
    fn drop(&mut self) {
        self.out.set_style(self.saved);
    }
}

/// Run `action` with `out` switched to `style`, then put the previous style back.
///
/// The previous style is restored on every exit path, whether `action`
/// returns `Ok`, returns `Err` or panics.
///
/// # Errors
/// Returns whatever error `action` returns.
pub fn with_style<O, R, F>(out: &mut O, style: Style, action: F) -> io::Result<R>
where
    O: StyledTextOutput + ?Sized,
    F: FnOnce(&mut O) -> io::Result<R>,
{
    let saved = out.style();
    out.set_style(style);
    let guard = StyleGuard { out, saved };
    let result = action(&mut *guard.out);
    drop(guard);
    result
}

/// Writes `"<label> <text>"` lines to any byte stream.
#[derive(Debug)]
pub struct DefaultStyledTextOutput<W: Write> {
    output: W,
    style: Style,
}

impl<W: Write> DefaultStyledTextOutput<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            style: Style::Normal,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl DefaultStyledTextOutput<io::Stdout> {
    /// A console over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> StyledTextOutput for DefaultStyledTextOutput<W> {
    fn println(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{} {text}", self.style.label())
    }

    fn blank_line(&mut self) -> io::Result<()> {
        writeln!(self.output)
    }

    fn style(&self) -> Style {
        self.style
    }

    fn set_style(&mut self, style: Style) {
        self.style = style;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rendered(out: DefaultStyledTextOutput<Vec<u8>>) -> String {
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn labels_are_fixed_width() {
        for style in [
            Style::Normal,
            Style::Header,
            Style::Success,
            Style::Info,
            Style::Failure,
            Style::Error,
        ] {
            assert_eq!(style.label().len(), 5, "{style:?}");
        }
    }

    #[test]
    fn println_prefixes_current_style() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        out.println("plain").unwrap();
        out.set_style(Style::Failure);
        out.println("broken").unwrap();
        assert_eq!(rendered(out), "      plain\nFAIL  broken\n");
    }

    #[test]
    fn blank_line_has_no_label() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        out.set_style(Style::Info);
        out.blank_line().unwrap();
        assert_eq!(rendered(out), "\n");
    }

    #[test]
    fn with_style_restores_after_success() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        with_style(&mut out, Style::Info, |o| o.println("note")).unwrap();
        assert_eq!(out.style(), Style::Normal);
        out.println("after").unwrap();
        assert_eq!(rendered(out), "Inf   note\n      after\n");
    }

    #[test]
    fn with_style_restores_after_error() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        out.set_style(Style::Header);
        let result: io::Result<()> = with_style(&mut out, Style::Failure, |_| {
            Err(io::Error::other("console gone"))
        });
        assert!(result.is_err());
        assert_eq!(out.style(), Style::Header);
    }

    #[test]
    fn with_style_restores_after_panic() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = with_style(&mut out, Style::Error, |_| -> io::Result<()> {
                panic!("action blew up")
            });
        }));
        assert!(caught.is_err());
        assert_eq!(out.style(), Style::Normal);
    }

    #[test]
    fn nested_styles_unwind_in_order() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        with_style(&mut out, Style::Header, |o| {
            o.println("outer")?;
            with_style(o, Style::Success, |o| o.println("inner"))?;
            o.println("outer again")
        })
        .unwrap();
        assert_eq!(
            rendered(out),
            "hdr   outer\nOK    inner\nhdr   outer again\n"
        );
    }

    #[test]
    fn works_through_trait_object() {
        let mut out = DefaultStyledTextOutput::new(Vec::new());
        {
            let dyn_out: &mut dyn StyledTextOutput = &mut out;
            with_style(dyn_out, Style::Info, |o| o.println("via dyn")).unwrap();
        }
        assert_eq!(rendered(out), "Inf   via dyn\n");
    }
}
