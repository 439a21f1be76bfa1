use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

use crate::control::{Reply, StatusView};
use crate::errors::RecorderError;
use crate::session::{SessionEvent, SessionState};

/// Renders what the recorder reports
pub trait Presenter {
    fn render_event(&mut self, event: &SessionEvent) -> io::Result<()>;

    fn render_reply(&mut self, reply: &Reply) -> io::Result<()>;

    fn render_error(&mut self, error: &RecorderError) -> io::Result<()>;

    /// Free-form message, e.g. a command line that did not parse
    fn notice(&mut self, message: &str) -> io::Result<()>;
}

/// `HH:MM:SS`, hours not wrapped
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

fn state_line(state: SessionState, filename: Option<&str>) -> String {
    let name = filename.unwrap_or("-");
    match state {
        SessionState::Idle => "Idle".to_string(),
        SessionState::Recording => format!("Recording: {name}"),
        SessionState::Paused => format!("Paused: {name}"),
        SessionState::Stopped => format!("Stopped: {name}"),
    }
}

/// Plain text, or one JSON object per line with `--json`
pub struct TerminalPresenter<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn json_line<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    fn status(&mut self, status: &StatusView) -> io::Result<()> {
        let mut text = format!(
            "{}  {}",
            state_line(status.state, status.filename.as_deref()),
            format_elapsed(status.elapsed)
        );
        if status.unsaved {
            text.push_str("  (unsaved audio: save FILE or discard)");
        }
        self.line(&text)
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        if self.json {
            return self.json_line(event);
        }

        match event {
            SessionEvent::StateChanged {
                state,
                filename,
                elapsed,
                ..
            } => {
                let text = match state {
                    SessionState::Stopped => state_line(*state, filename.as_deref()),
                    _ => format!("{}  {}", state_line(*state, filename.as_deref()), format_elapsed(*elapsed)),
                };
                self.line(&text)
            }
            SessionEvent::ElapsedTick { elapsed, .. } => self.line(&format_elapsed(*elapsed)),
            SessionEvent::Fault { message, .. } => {
                self.line(&RecorderError::DeviceFault(message.clone()).to_string())
            }
        }
    }

    fn render_reply(&mut self, reply: &Reply) -> io::Result<()> {
        if self.json {
            return self.json_line(reply);
        }

        match reply {
            // State changes are shown from the session's own events
            Reply::Started { .. } | Reply::Paused | Reply::Resumed => Ok(()),
            Reply::Stopped { summary } | Reply::Saved { summary } => self.line(&format!(
                "Saved {} ({}, {} blocks, {} bytes)",
                summary.path.display(),
                format_elapsed(summary.elapsed),
                summary.blocks,
                summary.data_bytes
            )),
            Reply::Discarded { blocks } => self.line(&format!("Discarded {blocks} unsaved blocks")),
            Reply::Status { status } => self.status(status),
            Reply::Device { device: Some(device) } => self.line(&format!(
                "Input: {} ({} Hz, {} channels)",
                device.name, device.sample_rate, device.channels
            )),
            Reply::Device { device: None } => self.line("No input device available"),
            Reply::Quit => self.line("Bye"),
        }
    }

    fn render_error(&mut self, error: &RecorderError) -> io::Result<()> {
        if self.json {
            return self.json_line(&serde_json::json!({
                "error": error.to_string(),
                "warning": error.is_warning(),
            }));
        }

        let label = if error.is_warning() { "Warning" } else { "Error" };
        self.line(&format!("{label}: {error}"))
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        if self.json {
            return self.json_line(&serde_json::json!({ "notice": message }));
        }
        self.line(message.trim_end())
    }
}
