//! Streaming sink that highlights warnings and errors in build tool output.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::classify::{LineClass, RegexRuleSet};
use crate::style::{with_style, Style, StyledTextOutput};

/// Width of the `=` banners printed by [`ErrorHighlightingOutput::summarise`].
pub const SUMMARY_WIDTH: usize = 75;

/// Receives raw process output in arbitrary chunks, prints each completed line
/// once through a styled console, and remembers warning and error lines for an
/// end-of-run summary.
///
/// All mutation happens under one lock, so chunks from stdout and stderr may
/// be written from different threads. A trailing partial line is held back
/// until a later chunk completes it or [`finish`](Self::finish) is called.
#[derive(Debug)]
pub struct ErrorHighlightingOutput<O> {
    title: String,
    rules: Arc<RegexRuleSet>,
    state: Mutex<State<O>>,
}

#[derive(Debug)]
struct State<O> {
    output: O,
    pending: Vec<u8>,
    transcript: Vec<u8>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<O: StyledTextOutput> ErrorHighlightingOutput<O> {
    /// `title` names the build in the summary banners, e.g. `app (x64 Release)`.
    pub fn new(title: &str, output: O, rules: Arc<RegexRuleSet>) -> Self {
        Self {
            title: title.to_owned(),
            rules,
            state: Mutex::new(State {
                output,
                pending: Vec::new(),
                transcript: Vec::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }

    /// Append a chunk of output and dispatch every line it completes.
    ///
    /// # Errors
    /// Returns an error if the console cannot be written.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.transcript.extend_from_slice(bytes);
        state.pending.extend_from_slice(bytes);
        while let Some(end) = state.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = state.pending.drain(..=end).collect();
            self.dispatch(&mut state, &line)?;
        }
        Ok(())
    }

    /// Dispatch the trailing partial line, if any. Call once the process has exited.
    ///
    /// # Errors
    /// Returns an error if the console cannot be written.
    pub fn finish(&self) -> io::Result<()> {
        let mut state = self.lock();
        if state.pending.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut state.pending);
        self.dispatch(&mut state, &line)
    }

    /// Print a banner-framed list of the errors, then of the warnings.
    ///
    /// Prints nothing when neither was seen.
    ///
    /// # Errors
    /// Returns an error if the console cannot be written.
    pub fn summarise(&self) -> io::Result<()> {
        let mut state = self.lock();
        let State {
            output,
            warnings,
            errors,
            ..
        } = &mut *state;
        if errors.is_empty() && warnings.is_empty() {
            return Ok(());
        }
        output.blank_line()?;
        if !errors.is_empty() {
            summarise_messages(output, &self.title, errors, "errors", Style::Failure)?;
        }
        if !warnings.is_empty() {
            summarise_messages(output, &self.title, warnings, "warnings", Style::Info)?;
        }
        Ok(())
    }

    /// Everything written so far, unfiltered.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.lock().transcript).into_owned()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock().warnings.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    /// Give back the console.
    pub fn into_output(self) -> O {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .output
    }

    fn lock(&self) -> MutexGuard<'_, State<O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, state: &mut State<O>, raw: &[u8]) -> io::Result<()> {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw).into_owned();

        let style = match self.rules.classify(&line) {
            LineClass::Normal => Style::Normal,
            LineClass::Warning => {
                state.warnings.push(line.clone());
                Style::Info
            }
            LineClass::Error => {
                state.errors.push(line.clone());
                Style::Failure
            }
        };
        with_style(&mut state.output, style, |o| o.println(&line))
    }
}

fn summarise_messages<O: StyledTextOutput + ?Sized>(
    output: &mut O,
    title: &str,
    messages: &[String],
    kind: &str,
    style: Style,
) -> io::Result<()> {
    let banner = format!(" {title}: {} {kind} ", messages.len());
    let padding = SUMMARY_WIDTH.saturating_sub(banner.chars().count());
    let left = padding / 2;
    let right = padding - left;
    with_style(output, style, |o| {
        o.println(&format!("{}{banner}{}", "=".repeat(left), "=".repeat(right)))?;
        for message in messages {
            o.println(message)?;
        }
        o.println(&"=".repeat(SUMMARY_WIDTH))
    })?;
    output.blank_line()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::style::DefaultStyledTextOutput;

    /// Records every printed line together with the style it was printed in.
    #[derive(Debug, Default)]
    struct Recorder {
        style: Style,
        lines: Vec<(Style, String)>,
    }

    impl StyledTextOutput for Recorder {
        fn println(&mut self, text: &str) -> io::Result<()> {
            self.lines.push((self.style, text.to_owned()));
            Ok(())
        }

        fn blank_line(&mut self) -> io::Result<()> {
            self.lines.push((Style::Normal, String::new()));
            Ok(())
        }

        fn style(&self) -> Style {
            self.style
        }

        fn set_style(&mut self, style: Style) {
            self.style = style;
        }
    }

    fn sink() -> ErrorHighlightingOutput<Recorder> {
        let mut rules = RegexRuleSet::new();
        rules.add_warning_pattern("warn.*").unwrap();
        rules.add_error_pattern("err.*").unwrap();
        ErrorHighlightingOutput::new("app (x64 Release)", Recorder::default(), Arc::new(rules))
    }

    fn texts(recorder: &Recorder) -> Vec<&str> {
        recorder.lines.iter().map(|(_, t)| t.as_str()).collect()
    }

    #[test]
    fn partial_line_held_until_completed() {
        let sink = sink();
        sink.write(b"a\nb\n").unwrap();
        assert_eq!(texts(&sink.lock().output), vec!["a", "b"]);

        sink.write(b"c").unwrap();
        assert_eq!(texts(&sink.lock().output), vec!["a", "b"]);

        sink.finish().unwrap();
        let out = sink.into_output();
        assert_eq!(texts(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn line_split_across_chunks_is_dispatched_once() {
        let sink = sink();
        sink.write(b"hel").unwrap();
        sink.write(b"lo wo").unwrap();
        sink.write(b"rld\nnext").unwrap();
        sink.finish().unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["hello world", "next"]);
    }

    #[test]
    fn finish_without_pending_is_noop() {
        let sink = sink();
        sink.write(b"done\n").unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["done"]);
    }

    #[test]
    fn crlf_line_endings_are_stripped() {
        let sink = sink();
        sink.write(b"one\r\ntwo\r\n").unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["one", "two"]);
    }

    #[test]
    fn empty_lines_are_preserved() {
        let sink = sink();
        sink.write(b"a\n\nb\n").unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["a", "", "b"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let sink = sink();
        let text = "caf\u{e9}\n".as_bytes();
        let (head, tail) = text.split_at(4);
        sink.write(head).unwrap();
        sink.write(tail).unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["caf\u{e9}"]);
    }

    #[test]
    fn lines_are_styled_and_recorded() {
        let sink = sink();
        sink.write(b"plain\nwarning: x\nerror: y\n").unwrap();
        assert_eq!(sink.warnings(), vec!["warning: x"]);
        assert_eq!(sink.errors(), vec!["error: y"]);

        let out = sink.into_output();
        let styles: Vec<Style> = out.lines.iter().map(|(s, _)| *s).collect();
        assert_eq!(styles, vec![Style::Normal, Style::Info, Style::Failure]);
        assert_eq!(out.style, Style::Normal);
    }

    #[test]
    fn transcript_is_raw_input() {
        let sink = sink();
        sink.write(b"a\r\nerr").unwrap();
        sink.write(b"or: z\npartial").unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.transcript(), "a\r\nerror: z\npartial");
    }

    #[test]
    fn summarise_with_nothing_prints_nothing() {
        let sink = sink();
        sink.write(b"fine\n").unwrap();
        sink.summarise().unwrap();
        assert_eq!(texts(&sink.into_output()), vec!["fine"]);
    }

    #[test]
    fn summarise_prints_errors_then_warnings() {
        let sink = sink();
        sink.write(b"warn 1\nerr 1\nerr 2\n").unwrap();
        sink.summarise().unwrap();
        let out = sink.into_output();
        let printed: Vec<(Style, String)> = out.lines.into_iter().skip(3).collect();

        let errors_banner = " app (x64 Release): 2 errors ";
        let pad = SUMMARY_WIDTH - errors_banner.len();
        let expected_errors_banner = format!(
            "{}{errors_banner}{}",
            "=".repeat(pad / 2),
            "=".repeat(pad - pad / 2)
        );
        let warnings_banner = " app (x64 Release): 1 warnings ";
        let pad = SUMMARY_WIDTH - warnings_banner.len();
        let expected_warnings_banner = format!(
            "{}{warnings_banner}{}",
            "=".repeat(pad / 2),
            "=".repeat(pad - pad / 2)
        );
        let rule = "=".repeat(SUMMARY_WIDTH);

        assert_eq!(
            printed,
            vec![
                (Style::Normal, String::new()),
                (Style::Failure, expected_errors_banner.clone()),
                (Style::Failure, "err 1".to_owned()),
                (Style::Failure, "err 2".to_owned()),
                (Style::Failure, rule.clone()),
                (Style::Normal, String::new()),
                (Style::Info, expected_warnings_banner.clone()),
                (Style::Info, "warn 1".to_owned()),
                (Style::Info, rule),
                (Style::Normal, String::new()),
            ]
        );
        assert_eq!(expected_errors_banner.len(), SUMMARY_WIDTH);
        assert_eq!(expected_warnings_banner.len(), SUMMARY_WIDTH);
    }

    #[test]
    fn summarise_banner_survives_long_titles() {
        let rules = Arc::new(RegexRuleSet::with_defaults());
        let title = "x".repeat(100);
        let sink = ErrorHighlightingOutput::new(&title, Recorder::default(), rules);
        sink.write(b"1>Build FAILED\n").unwrap();
        sink.summarise().unwrap();
        let out = sink.into_output();
        assert!(texts(&out).iter().any(|t| t.starts_with(&format!(" {title}: 1 errors"))));
    }

    #[test]
    fn renders_through_default_console() {
        let rules = Arc::new(RegexRuleSet::with_defaults());
        let sink = ErrorHighlightingOutput::new(
            "core (Win32 Debug)",
            DefaultStyledTextOutput::new(Vec::new()),
            rules,
        );
        sink.write(b"1>main.cpp(3): error C2143: syntax error\n").unwrap();
        let text = String::from_utf8(sink.into_output().into_inner()).unwrap();
        assert_eq!(text, "FAIL  1>main.cpp(3): error C2143: syntax error\n");
    }

    #[test]
    fn concurrent_writers_lose_no_lines() {
        let sink = sink();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let sink = &sink;
                scope.spawn(move || {
                    for i in 0..50 {
                        sink.write(format!("t{t} line {i}\n").as_bytes()).unwrap();
                    }
                });
            }
        });
        let out = sink.into_output();
        assert_eq!(out.lines.len(), 200);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_chunking_dispatches_each_line_once(
                lines in proptest::collection::vec("[a-z ]{0,12}", 0..12),
                trailing_newline in any::<bool>(),
                cuts in proptest::collection::vec(any::<usize>(), 0..6),
            ) {
                let mut text = lines.join("\n");
                if trailing_newline && !lines.is_empty() {
                    text.push('\n');
                }
                let bytes = text.as_bytes();

                let mut cut_points: Vec<usize> = cuts
                    .iter()
                    .map(|c| if bytes.is_empty() { 0 } else { c % (bytes.len() + 1) })
                    .collect();
                cut_points.sort_unstable();

                let sink = sink();
                let mut start = 0;
                for cut in cut_points.into_iter().chain(std::iter::once(bytes.len())) {
                    sink.write(bytes.get(start..cut).unwrap_or_default()).unwrap();
                    start = cut;
                }
                sink.finish().unwrap();

                let expected: Vec<String> = if text.is_empty() {
                    Vec::new()
                } else {
                    text.strip_suffix('\n').unwrap_or(&text).split('\n').map(str::to_owned).collect()
                };
                prop_assert_eq!(sink.transcript(), text.clone());
                let out = sink.into_output();
                let got: Vec<String> = out.lines.into_iter().map(|(_, t)| t).collect();
                prop_assert_eq!(got, expected);
            }
        }
    }
}
