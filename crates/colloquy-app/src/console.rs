//! Stdin line parsing. Plain lines stand in for the microphone.

use colloquy_speech::RecognizerInput;

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Start or resume the conversation.
    Start,
    /// Print the current turn state.
    State,
    /// Leave the program.
    Quit,
    /// Feed the recognizer as if the engine produced this result.
    Speech(RecognizerInput),
    Unknown(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(command) = line.trim_start().strip_prefix('/') else {
            return ConsoleInput::Speech(RecognizerInput::Final(line.to_string()));
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        match name {
            "start" => ConsoleInput::Start,
            "state" => ConsoleInput::State,
            "quit" | "exit" => ConsoleInput::Quit,
            "partial" => ConsoleInput::Speech(RecognizerInput::Interim(rest.trim().to_string())),
            "cancel" => {
                let reason = match rest.trim() {
                    "" => "canceled by operator",
                    r => r,
                };
                ConsoleInput::Speech(RecognizerInput::Canceled(reason.to_string()))
            }
            other => ConsoleInput::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &str = "Type to speak. Commands: /start /state /partial <text> /cancel [reason] /quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_final_transcript() {
        assert_eq!(
            ConsoleInput::parse("hello there\n"),
            ConsoleInput::Speech(RecognizerInput::Final("hello there".into()))
        );
        assert_eq!(
            ConsoleInput::parse(""),
            ConsoleInput::Speech(RecognizerInput::Final(String::new()))
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(ConsoleInput::parse("/start"), ConsoleInput::Start);
        assert_eq!(ConsoleInput::parse("  /quit"), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse("/exit"), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse("/state"), ConsoleInput::State);
        assert_eq!(
            ConsoleInput::parse("/frobnicate"),
            ConsoleInput::Unknown("frobnicate".into())
        );
    }

    #[test]
    fn test_recognizer_commands() {
        assert_eq!(
            ConsoleInput::parse("/partial hel"),
            ConsoleInput::Speech(RecognizerInput::Interim("hel".into()))
        );
        assert_eq!(
            ConsoleInput::parse("/cancel network lost"),
            ConsoleInput::Speech(RecognizerInput::Canceled("network lost".into()))
        );
        assert_eq!(
            ConsoleInput::parse("/cancel"),
            ConsoleInput::Speech(RecognizerInput::Canceled("canceled by operator".into()))
        );
    }
}
