//! Interactive stop lookup console

use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use integration_masstransit::{MasstransitConfig, MasstransitError, StopInfo, StopInfoClient};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::render::render_stop_info;

/// Deadline for one stop lookup, retries included
pub const FETCH_DEADLINE: Duration = Duration::from_secs(15);

/// Prefix every stop identifier carries
pub const STOP_PREFIX: &str = "stop__";

const COMMANDS: &[(&str, &str)] = &[
    ("stop__<id>", "show arrivals for a stop"),
    ("p", "toggle prognosis mode"),
    ("json", "toggle JSON dump of each lookup"),
    ("token", "refresh the anti-forgery token"),
    ("prompt", "show the banner"),
    ("help", "list commands"),
    ("exit", "quit (an empty line works too)"),
];

/// What a single console line asks for
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Stop(&'a str),
    TogglePrognosis,
    ToggleJson,
    Token,
    Prompt,
    Help,
    Exit,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    match line.trim() {
        "" | "exit" => Line::Exit,
        "p" => Line::TogglePrognosis,
        "json" => Line::ToggleJson,
        "token" => Line::Token,
        "prompt" => Line::Prompt,
        "help" => Line::Help,
        id if id.starts_with(STOP_PREFIX) => Line::Stop(id),
        other => Line::Unknown(other),
    }
}

fn banner(out: &mut impl Write) -> std::io::Result<()> {
    let rule = "*".repeat(40);
    writeln!(out, "{rule}")?;
    writeln!(out, "Type help for available commands")?;
    writeln!(out, "send empty line or type 'exit' to exit")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "keep in mind that stop id should start with '{STOP_PREFIX}' prefix")
}

fn help(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "commands are:")?;
    for (command, description) in COMMANDS {
        writeln!(out, "  {command:<12} {description}")?;
    }
    Ok(())
}

/// Fetch one stop, cancelling the whole retry loop after `deadline`
pub async fn fetch_with_deadline<C>(
    client: &C,
    stop_id: &str,
    prognosis: bool,
    deadline: Duration,
) -> Result<StopInfo, MasstransitError>
where
    C: StopInfoClient + ?Sized,
{
    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel();
        })
    };

    let result = client.fetch_stop_info(stop_id, prognosis, &cancel).await;
    timer.abort();
    result
}

/// Refresh the token, unless connecting just bootstrapped a fresh one
pub async fn refresh_unless_bootstrapped<C>(
    client: &C,
    config: &MasstransitConfig,
) -> Result<(), MasstransitError>
where
    C: StopInfoClient + ?Sized,
{
    if config.initial_token().is_none() {
        return Ok(());
    }
    client.refresh_token().await
}

/// Console toggles applied to each lookup
#[derive(Debug, Clone, Copy)]
struct Modes {
    prognosis: bool,
    json: bool,
}

async fn show_stop<C>(
    client: &C,
    stop_id: &str,
    modes: Modes,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    C: StopInfoClient + ?Sized,
{
    match fetch_with_deadline(client, stop_id, modes.prognosis, FETCH_DEADLINE).await {
        Ok(info) => {
            for line in render_stop_info(&info, Utc::now()) {
                writeln!(out, "{line}")?;
            }
            if modes.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
            }
        },
        Err(e) => writeln!(out, "error fetching info: {e}")?,
    }
    Ok(())
}

/// Read commands from `input` until exit or end of input
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub async fn run<C, R, W>(
    client: &C,
    input: R,
    out: &mut W,
    prognosis: bool,
    json: bool,
) -> anyhow::Result<()>
where
    C: StopInfoClient + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut modes = Modes { prognosis, json };
    let mut lines = input.lines();

    writeln!(out, "Prognosis: {}", modes.prognosis)?;
    banner(out)?;

    loop {
        write!(out, "command: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match parse_line(&line) {
            Line::Exit => {
                writeln!(out, "exiting")?;
                break;
            },
            Line::TogglePrognosis => {
                modes.prognosis = !modes.prognosis;
                writeln!(out, "Prognosis: {}", modes.prognosis)?;
            },
            Line::ToggleJson => {
                modes.json = !modes.json;
                writeln!(out, "JSON: {}", modes.json)?;
            },
            Line::Token => match client.refresh_token().await {
                Ok(()) => writeln!(out, "token refreshed")?,
                Err(e) => writeln!(out, "error refreshing token: {e}")?,
            },
            Line::Prompt => banner(out)?,
            Line::Help => help(out)?,
            Line::Stop(id) => show_stop(client, id, modes, out).await?,
            Line::Unknown(command) => writeln!(out, "command {command:?} not found")?,
        }
    }

    Ok(())
}
