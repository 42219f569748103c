use anyhow::{Context, Result, bail};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use ttychain::{Interaction, InteractionOptions, parse_duration, parse_file};

#[derive(Parser, Debug)]
#[command(
    name = "ttychain",
    about = "Drive an interactive program through a wait/send script",
    version
)]
struct Args {
    /// Path to the script file
    #[arg(short, long)]
    script: String,

    /// Shell the program is launched from
    #[arg(long, default_value = "bash")]
    shell: String,

    /// How long a wait step may go unmatched
    #[arg(short, long, default_value = "2s", value_parser = parse_duration)]
    timeout: Duration,

    /// Delay between match attempts of a wait step
    #[arg(long, default_value = "500ms", value_parser = parse_poll_interval)]
    poll_interval: Duration,

    /// Log every step to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Program invocation typed into the shell
    #[arg(trailing_var_arg = true, required = true)]
    program: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let actions = parse_file(&args.script)
        .with_context(|| format!("Failed to parse script file: {}", args.script))?;

    let options = InteractionOptions::default()
        .with_timeout(args.timeout)
        .with_poll_interval(args.poll_interval)
        .with_shell(args.shell);

    let interaction = actions
        .into_iter()
        .fold(Interaction::new(args.program.join(" "), options), Interaction::push);

    let code = interaction.start().await.context("Interaction failed")?;
    println!("{code}");

    Ok(())
}

fn parse_poll_interval(s: &str) -> Result<Duration> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        bail!("Poll interval must be greater than zero");
    }
    Ok(interval)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
