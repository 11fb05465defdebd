//! Parsing of chat input lines.

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Quit,
    Tools,
    Models,
    /// `/model` with no argument shows the current model.
    Model(Option<&'a str>),
    /// `/system` with no argument shows the current directive.
    System(Option<&'a str>),
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if line == "quit" || line == "exit" {
            return Self::Quit;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (command, None),
        };
        match name {
            "tools" => Self::Tools,
            "models" => Self::Models,
            "model" => Self::Model(arg),
            "system" => Self::System(arg),
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name),
        }
    }
}

pub const HELP: &str = "Commands: /tools, /models, /model <name>, /system <text>, quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(Input::parse("  add 1 and 2 \n"), Input::Message("add 1 and 2"));
        assert_eq!(Input::parse("   "), Input::Empty);
    }

    #[test]
    fn quit_words() {
        assert_eq!(Input::parse("quit"), Input::Quit);
        assert_eq!(Input::parse("exit\n"), Input::Quit);
        assert_eq!(Input::parse("/exit"), Input::Quit);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(Input::parse("/tools"), Input::Tools);
        assert_eq!(Input::parse("/models"), Input::Models);
        assert_eq!(
            Input::parse("/model litellm_proxy/gpt-4o-mini"),
            Input::Model(Some("litellm_proxy/gpt-4o-mini"))
        );
        assert_eq!(Input::parse("/model"), Input::Model(None));
        assert_eq!(
            Input::parse("/system Answer in French.  "),
            Input::System(Some("Answer in French."))
        );
        assert_eq!(Input::parse("/system   "), Input::System(None));
        assert_eq!(Input::parse("/frobnicate x"), Input::Unknown("frobnicate"));
    }
}
