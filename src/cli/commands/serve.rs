use clap::{Arg, ArgAction, Command};

pub const ARG_PORT: &str = "port";
pub const ARG_BEHIND_PROXY: &str = "behind-proxy";
pub const ARG_SESSION_TTL: &str = "session-ttl";

#[must_use]
pub fn command() -> Command {
    Command::new(super::CMD_SERVE)
        .about("Run the HTTP server")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTHGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_BEHIND_PROXY)
                .long("behind-proxy")
                .help("A trusted reverse proxy terminates TLS and sets X-Forwarded-For")
                .env("AUTHGATE_BEHIND_PROXY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long("session-ttl")
                .help("Session lifetime in seconds")
                .default_value("86400")
                .env("AUTHGATE_SESSION_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
