pub mod keys;
pub mod logging;
pub mod serve;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_STORAGE: &str = "storage";
pub const CMD_SERVE: &str = "serve";
pub const CMD_INIT: &str = "init";
pub const CMD_KEYS: &str = "keys";

fn init_command() -> Command {
    Command::new(CMD_INIT)
        .about("Create a storage file with a fresh signing key")
        .arg(
            Arg::new("root-uri")
                .long("root-uri")
                .help("Public origin of the broker, e.g. https://auth.example.com")
                .required(true),
        )
        .arg(
            Arg::new("display-name")
                .long("display-name")
                .help("Name shown on the login page")
                .default_value(""),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("authgate")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_STORAGE)
                .short('s')
                .long("storage")
                .help("Path to the JSON storage file")
                .default_value("authgate.json")
                .env("AUTHGATE_STORAGE")
                .global(true),
        )
        .subcommand(serve::command())
        .subcommand(init_command())
        .subcommand(keys::command());

    logging::with_args(command)
}
