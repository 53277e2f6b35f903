use std::io::{self, Write};

use agui_chat::{logging, ChatController, EnvConfig};
use anyhow::Context;
use chat_cli::repl::run_repl;
use chat_cli::transports::transport_from_config;

fn main() -> anyhow::Result<()> {
    let config = EnvConfig::from_env().context("invalid configuration")?;
    logging::init_from_config(&config);

    let transport = transport_from_config(&config).context("failed to start transport")?;
    let profile = transport.profile();
    tracing::info!(
        transport = %profile.transport_id,
        endpoint = %profile.endpoint,
        "starting chat session"
    );

    let mut controller = ChatController::new(transport, config.controller_options());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "agui-chat ({}) -> {}. Type /help for commands.",
        profile.transport_id, profile.endpoint
    )?;

    run_repl(&mut controller, stdin.lock(), &mut out)?;
    Ok(())
}
