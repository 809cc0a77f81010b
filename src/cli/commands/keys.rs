use clap::{Arg, Command};

pub const CMD_ROTATE: &str = "rotate";
pub const CMD_RETIRE: &str = "retire";
pub const CMD_LIST: &str = "list";
pub const ARG_KID: &str = "kid";

#[must_use]
pub fn command() -> Command {
    Command::new(super::CMD_KEYS)
        .about("Manage session signing keys")
        .subcommand_required(true)
        .subcommand(
            Command::new(CMD_ROTATE)
                .about("Generate a new signing key; the previous one stays published"),
        )
        .subcommand(
            Command::new(CMD_RETIRE)
                .about("Stop publishing a retained key; sessions it signed become invalid")
                .arg(Arg::new(ARG_KID).help("Key id to retire").required(true)),
        )
        .subcommand(Command::new(CMD_LIST).about("List published keys"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retire_needs_kid() {
        assert!(command().try_get_matches_from(vec!["keys", "retire"]).is_err());

        let matches = command().get_matches_from(vec!["keys", "retire", "k1"]);
        let kid = matches
            .subcommand_matches(CMD_RETIRE)
            .and_then(|m| m.get_one::<String>(ARG_KID).cloned());
        assert_eq!(kid, Some("k1".to_string()));
    }

    #[test]
    fn test_keys_requires_subcommand() {
        assert!(command().try_get_matches_from(vec!["keys"]).is_err());
        assert!(command().try_get_matches_from(vec!["keys", "rotate"]).is_ok());
    }
}
