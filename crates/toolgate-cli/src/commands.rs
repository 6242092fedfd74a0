//! Subcommand implementations.

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::{Context, Result};
use toolgate_core::{Error, SessionId, StationConfig, SystemClock};
use toolgate_gateway::{GatewayConfig, HttpGateway};
use toolgate_kiosk::{
    Kiosk, Stage, TerminalInput, login_stage, run, settlement_stage, timer_stage, usage_stage,
};
use toolgate_storage::SessionJournal;
use tracing::{error, info};

use crate::{Cli, Command};

/// Run one command. Returns the stage to chain to, if any.
///
/// Only start-up failures are returned as errors. A stage that fails after
/// start-up is logged and the chain restarts at login.
pub async fn execute(command: Command, config: StationConfig) -> Result<Option<Command>> {
    match command {
        Command::CheckLogin => check_login(config).await.map(|()| None),
        Command::Run => {
            let mut kiosk = open_kiosk(config, None).await?;
            let mut input = TerminalInput::new();
            let settled = run(&mut kiosk, &mut input).await?;
            info!(settled, "Kiosk stopped");
            Ok(None)
        }
        Command::Login => {
            let mut kiosk = open_kiosk(config, None).await?;
            Ok(recover(command, login(&mut kiosk).await))
        }
        Command::Timer => {
            let mut kiosk = open_kiosk(config, Some(Stage::Timer)).await?;
            Ok(recover(command, timer(&mut kiosk).await))
        }
        Command::Usage => {
            let mut kiosk = open_kiosk(config, Some(Stage::Usage)).await?;
            Ok(recover(command, usage(&mut kiosk).await))
        }
        Command::Settle => {
            let mut kiosk = open_kiosk(config, Some(Stage::Settlement)).await?;
            Ok(recover(command, settle(&mut kiosk).await))
        }
    }
}

/// Replace this process with the next stage.
///
/// On platforms without `exec` the next stage runs as a child and this
/// process waits for it.
pub fn chain(next: Command, cli: &Cli) -> Result<()> {
    let exe = std::env::current_exe().context("cannot locate the toolgate binary")?;
    let mut command = std::process::Command::new(&exe);
    command.args(stage_args(next, cli));
    info!(next = next.as_arg(), "Starting next stage");
    hand_over(command).with_context(|| format!("failed to start stage {}", next.as_arg()))
}

#[cfg(unix)]
fn hand_over(mut command: std::process::Command) -> Result<()> {
    use std::os::unix::process::CommandExt;
    // exec only returns on failure
    Err(command.exec().into())
}

#[cfg(not(unix))]
fn hand_over(mut command: std::process::Command) -> Result<()> {
    let status = command.status()?;
    anyhow::ensure!(status.success(), "exited with {status}");
    Ok(())
}

/// Arguments for the next stage process, carrying over the global options.
pub fn stage_args(next: Command, cli: &Cli) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        next.as_arg().into(),
        "--config".into(),
        cli.config.clone().into_os_string(),
    ];
    if let Some(level) = &cli.log_level {
        args.push("--log-level".into());
        args.push(level.into());
    }
    args
}

/// Stage that follows a resumable kiosk state.
pub fn command_for(stage: Stage) -> Command {
    match stage {
        Stage::Timer => Command::Timer,
        Stage::Usage => Command::Usage,
        Stage::Settlement => Command::Settle,
    }
}

async fn open_kiosk(config: StationConfig, stage: Option<Stage>) -> Result<Kiosk<HttpGateway>> {
    let backend = HttpGateway::new(GatewayConfig::from_station(&config))
        .context("failed to create the HTTP client")?;
    let journal = SessionJournal::open(&config)
        .await
        .with_context(|| format!("failed to open {}", config.logging.log_file_path.display()))?;
    let clock = Arc::new(SystemClock);

    match stage {
        Some(stage) => Kiosk::resume(stage, config, backend, journal, clock)
            .await
            .with_context(|| format!("failed to resume the {stage} stage")),
        None => Ok(Kiosk::new(config, backend, journal, clock)),
    }
}

async fn check_login(config: StationConfig) -> Result<()> {
    let gateway_config = GatewayConfig::from_station(&config);
    let login_url = gateway_config.login_url.clone();
    let mut gateway =
        HttpGateway::new(gateway_config).context("failed to create the HTTP client")?;

    gateway
        .login()
        .await
        .with_context(|| format!("login to {login_url} failed"))?;
    info!(%login_url, "Login successful");
    println!("Login successful.");
    Ok(())
}

fn recover(stage: Command, result: toolgate_core::Result<Option<Command>>) -> Option<Command> {
    match result {
        Ok(next) => next,
        Err(e) => {
            error!(stage = stage.as_arg(), error = %e, "Stage failed, restarting at login");
            Some(Command::Login)
        }
    }
}

fn resumed_session(kiosk: &Kiosk<HttpGateway>) -> toolgate_core::Result<SessionId> {
    kiosk
        .session()
        .map(|s| s.session_id())
        .ok_or(Error::NoActiveSession)
}

async fn login(kiosk: &mut Kiosk<HttpGateway>) -> toolgate_core::Result<Option<Command>> {
    let mut input = TerminalInput::new();
    if login_stage(kiosk, &mut input).await?.is_none() {
        return Ok(None);
    }
    kiosk.hand_off()?;
    Ok(Some(Command::Timer))
}

async fn timer(kiosk: &mut Kiosk<HttpGateway>) -> toolgate_core::Result<Option<Command>> {
    let mut input = TerminalInput::new();
    let session_id = resumed_session(kiosk)?;
    let stopped = timer_stage(kiosk, &mut input, session_id).await?;
    // Hand off either way so `toolgate timer` can pick a running session up
    kiosk.hand_off()?;
    Ok(stopped.and(Stage::for_state(*kiosk.state()).map(command_for)))
}

async fn usage(kiosk: &mut Kiosk<HttpGateway>) -> toolgate_core::Result<Option<Command>> {
    let mut input = TerminalInput::new();
    let session_id = resumed_session(kiosk)?;
    usage_stage(kiosk, &mut input, session_id).await?;
    kiosk.hand_off()?;
    Ok(Some(Command::Settle))
}

async fn settle(kiosk: &mut Kiosk<HttpGateway>) -> toolgate_core::Result<Option<Command>> {
    let mut input = TerminalInput::new();
    let session_id = resumed_session(kiosk)?;
    let settled = settlement_stage(kiosk, &mut input, session_id).await?;
    Ok(settled.map(|_| Command::Login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    #[rstest]
    #[case(Stage::Timer, Command::Timer)]
    #[case(Stage::Usage, Command::Usage)]
    #[case(Stage::Settlement, Command::Settle)]
    fn test_command_for_stage(#[case] stage: Stage, #[case] command: Command) {
        assert_eq!(command_for(stage), command);
        assert_eq!(command.as_arg(), stage.to_string());
    }

    #[test]
    fn test_stage_args_carry_global_options() {
        let cli = Cli::try_parse_from([
            "toolgate",
            "login",
            "--config",
            "station.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let args = stage_args(Command::Timer, &cli);
        assert_eq!(
            args,
            ["timer", "--config", "station.toml", "--log-level", "debug"]
                .map(OsString::from)
                .to_vec()
        );

        // The next process parses what it is given
        let mut argv = vec![OsString::from("toolgate")];
        argv.extend(args);
        let next = Cli::try_parse_from(argv).unwrap();
        assert_eq!(next.command, Some(Command::Timer));
        assert_eq!(next.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_stage_args_without_log_level() {
        let cli = Cli::try_parse_from(["toolgate", "usage"]).unwrap();
        let args = stage_args(Command::Settle, &cli);
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], "settle");
    }

    #[test]
    fn test_failed_stage_restarts_at_login() {
        assert_eq!(
            recover(Command::Timer, Err(Error::NoActiveSession)),
            Some(Command::Login)
        );
        assert_eq!(recover(Command::Settle, Ok(None)), None);
        assert_eq!(
            recover(Command::Usage, Ok(Some(Command::Settle))),
            Some(Command::Settle)
        );
    }
}
