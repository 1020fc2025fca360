use shared::domain::PatientId;

pub const HELP: &str = "\
type to search the directory
  :add N     link result row N
  :rm ID     unlink patient ID
  :retry     re-run a failed search
  :roster    show linked patients
  :help      show this help
  :quit      exit";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    /// 1-based row in the current search results.
    Add(usize),
    Remove(PatientId),
    Retry,
    Roster,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix(':') else {
            return Command::Query(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let verb = parts.next().unwrap_or_default();
        let arg = parts.next();
        match (verb, arg) {
            ("add", Some(row)) => match row.parse::<usize>() {
                Ok(row) if row > 0 => Command::Add(row),
                _ => Command::Invalid(format!("'{row}' is not a result row")),
            },
            ("rm", Some(id)) => Command::Remove(PatientId::from(id)),
            ("retry", None) => Command::Retry,
            ("roster", None) => Command::Roster,
            ("help", None) => Command::Help,
            ("quit" | "q", None) => Command::Quit,
            _ => Command::Invalid(format!("unknown command ':{rest}'")),
        }
    }
}
