//! Map parsed arguments to the action the binary runs.

use crate::cli::{
    actions::{init, keys, keys::KeysCommand, server, Action},
    commands::{self, keys as keys_cmd, serve},
    globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let storage = matches
        .get_one::<String>(commands::ARG_STORAGE)
        .cloned()
        .context("missing required argument: --storage")?;
    let globals = GlobalArgs::new(storage);

    match matches.subcommand() {
        Some((commands::CMD_SERVE, sub_m)) => Ok(Action::Server(server::Args {
            globals,
            port: sub_m.get_one::<u16>(serve::ARG_PORT).copied().unwrap_or(8080),
            behind_proxy: sub_m.get_flag(serve::ARG_BEHIND_PROXY),
            session_ttl_seconds: sub_m
                .get_one::<u64>(serve::ARG_SESSION_TTL)
                .copied()
                .unwrap_or(86_400),
        })),
        Some((commands::CMD_INIT, sub_m)) => Ok(Action::Init(init::Args {
            globals,
            root_uri: sub_m
                .get_one::<String>("root-uri")
                .cloned()
                .context("missing required argument: --root-uri")?,
            display_name: sub_m
                .get_one::<String>("display-name")
                .cloned()
                .unwrap_or_default(),
        })),
        Some((commands::CMD_KEYS, sub_m)) => {
            let command = match sub_m.subcommand() {
                Some((keys_cmd::CMD_ROTATE, _)) => KeysCommand::Rotate,
                Some((keys_cmd::CMD_RETIRE, retire_m)) => KeysCommand::Retire(
                    retire_m
                        .get_one::<String>(keys_cmd::ARG_KID)
                        .cloned()
                        .context("missing required argument: <kid>")?,
                ),
                Some((keys_cmd::CMD_LIST, _)) => KeysCommand::List,
                other => return Err(anyhow!("unknown keys command: {other:?}")),
            };
            Ok(Action::Keys(keys::Args { globals, command }))
        }
        other => Err(anyhow!("unknown command: {other:?}")),
    }
}
