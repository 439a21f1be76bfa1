use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// One line typed into the shell
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ShellCommand {
    /// Start recording (or resume when paused)
    Start {
        /// Output file; defaults to a timestamped name in the output directory
        file: Option<PathBuf>,
    },
    /// Pause recording (or resume when paused)
    Pause,
    /// Resume a paused recording
    Resume,
    /// Stop and save the recording
    Stop,
    /// Write unsaved audio from a failed stop to a new file
    Save { file: PathBuf },
    /// Drop unsaved audio from a failed stop
    Discard,
    /// Show the current state and elapsed time
    Status,
    /// Show the input device
    Device,
    /// Leave the recorder
    #[command(alias = "exit")]
    Quit,
}

impl ShellCommand {
    /// Parse a shell line. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, clap::Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        ShellLine::try_parse_from(words).map(|parsed| Some(parsed.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_and_without_files() {
        assert_eq!(
            ShellCommand::parse_line("start take.wav").unwrap(),
            Some(ShellCommand::Start {
                file: Some(PathBuf::from("take.wav"))
            })
        );
        assert_eq!(
            ShellCommand::parse_line("  start ").unwrap(),
            Some(ShellCommand::Start { file: None })
        );
        assert_eq!(ShellCommand::parse_line("exit").unwrap(), Some(ShellCommand::Quit));
        assert_eq!(ShellCommand::parse_line("").unwrap(), None);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(ShellCommand::parse_line("rewind").is_err());
        assert!(ShellCommand::parse_line("save").is_err());
    }
}
