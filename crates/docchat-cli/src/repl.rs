//! Line commands understood by `docchat chat`.

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// A question for the document.
    Ask(String),
    /// `/clear`: forget the conversation.
    Clear,
    /// `/model <name>`: switch model.
    Model(String),
    /// `/temperature <t>`: change creativity.
    Temperature(f32),
    /// `/prompt <text>`: replace the system prompt.
    Prompt(String),
    /// `/history`: print the conversation.
    History,
    /// `/config`: print the bound settings.
    Config,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// Blank line.
    Empty,
    /// A command that could not be understood, with the reason.
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  /clear               forget the conversation
  /model <name>        switch model
  /temperature <0..1>  change creativity
  /prompt <text>       replace the system prompt
  /history             show the conversation
  /config              show model, temperature and system prompt
  /help                show this help
  /quit                leave
Anything else is asked as a question.";

impl ReplCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Ask(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_lowercase().as_str() {
            "clear" => ReplCommand::Clear,
            "history" => ReplCommand::History,
            "config" => ReplCommand::Config,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "model" if arg.is_empty() => ReplCommand::Invalid("usage: /model <name>".into()),
            "model" => ReplCommand::Model(arg.to_string()),
            "prompt" if arg.is_empty() => ReplCommand::Invalid("usage: /prompt <text>".into()),
            "prompt" => ReplCommand::Prompt(arg.to_string()),
            "temperature" | "temp" => match arg.parse::<f32>() {
                Ok(t) => ReplCommand::Temperature(t),
                Err(_) => ReplCommand::Invalid(format!(
                    "usage: /temperature <number between 0 and 1>, got '{arg}'"
                )),
            },
            other => ReplCommand::Invalid(format!("unknown command '/{other}', try /help")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questions_and_blanks() {
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
        assert_eq!(
            ReplCommand::parse("  What is X?  "),
            ReplCommand::Ask("What is X?".into())
        );
    }

    #[test]
    fn test_commands() {
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/QUIT"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/history"), ReplCommand::History);
        assert_eq!(
            ReplCommand::parse("/model llama2"),
            ReplCommand::Model("llama2".into())
        );
        assert_eq!(
            ReplCommand::parse("/temperature 0.8"),
            ReplCommand::Temperature(0.8)
        );
        assert_eq!(
            ReplCommand::parse("/prompt  You are terse.  "),
            ReplCommand::Prompt("You are terse.".into())
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(matches!(ReplCommand::parse("/model"), ReplCommand::Invalid(_)));
        assert!(matches!(
            ReplCommand::parse("/temperature hot"),
            ReplCommand::Invalid(_)
        ));
        assert!(matches!(ReplCommand::parse("/dance"), ReplCommand::Invalid(_)));
    }
}
