use roam_console::FilterChannel;

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    /// Forward to the server.
    Command(String),
    Filter(FilterChannel),
    Quit,
    /// A `:` directive that did not parse.
    Unknown(String),
}

pub fn parse_input(line: &str) -> OperatorInput {
    let trimmed = line.trim();
    let Some(directive) = trimmed.strip_prefix(':') else {
        return OperatorInput::Command(trimmed.to_owned());
    };
    let mut parts = directive.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("q" | "quit"), None) => OperatorInput::Quit,
        (Some("filter" | "f"), channel) => match FilterChannel::parse(channel.unwrap_or("all")) {
            Some(channel) => OperatorInput::Filter(channel),
            None => OperatorInput::Unknown(trimmed.to_owned()),
        },
        _ => OperatorInput::Unknown(trimmed.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_input, OperatorInput};
    use roam_console::{FilterChannel, Subsystem};

    #[test]
    fn plain_lines_are_commands() {
        assert_eq!(
            parse_input(" say hello \n"),
            OperatorInput::Command("say hello".to_owned())
        );
        assert_eq!(parse_input(""), OperatorInput::Command(String::new()));
    }

    #[test]
    fn directives() {
        assert_eq!(parse_input(":quit"), OperatorInput::Quit);
        assert_eq!(
            parse_input(":filter sync"),
            OperatorInput::Filter(FilterChannel::Subsystem(Subsystem::Sync))
        );
        assert_eq!(parse_input(":filter"), OperatorInput::Filter(FilterChannel::All));
        assert_eq!(
            parse_input(":filter nope"),
            OperatorInput::Unknown(":filter nope".to_owned())
        );
        assert_eq!(
            parse_input(":bogus"),
            OperatorInput::Unknown(":bogus".to_owned())
        );
    }
}
