use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use formcheck::{
    EmailMessage, FormHandler, FormOptions, FormRegistry, Outcome, Page, PipelineConfig, Query,
    RenderCache, Request,
};

#[derive(Debug, Parser)]
#[command(
    name = "formcheck",
    version,
    about = "Render, validate and strip self-validating HTML forms"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Populate, validate and submit a form against a request
    Render(RenderArgs),
    /// Print the control-free rendering of a form
    Strip {
        /// Form markup file (defaults to stdin)
        #[arg(value_name = "FORM")]
        form: Option<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
    /// Check that a form parses
    Check {
        /// Form markup file (defaults to stdin)
        #[arg(value_name = "FORM")]
        form: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Form markup file (defaults to stdin)
    #[arg(value_name = "FORM")]
    form: Option<PathBuf>,
    /// Form name (defaults to the file stem)
    #[arg(short, long)]
    name: Option<String>,
    /// JSON request: {"method": "POST", "payload": {...}}
    #[arg(long, value_name = "FILE")]
    request: Option<PathBuf>,
    /// JSON description of the embedding page
    #[arg(long, value_name = "FILE")]
    page: Option<PathBuf>,
    /// Send a plain text email instead of the stripped form
    #[arg(long)]
    plain_text: bool,
    /// Copy the submitter on the email
    #[arg(long)]
    cc_sender: bool,
    #[arg(long)]
    recipient: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long, value_name = "URL")]
    success_url: Option<String>,
    /// Remove backslash escaping from request values
    #[arg(long)]
    unescape: bool,
    /// Write the email here instead of logging it
    #[arg(long, value_name = "FILE")]
    email_out: Option<PathBuf>,
    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Returns whether the form was displayed or submitted cleanly
fn run(command: Command) -> Result<bool> {
    match command {
        Command::Render(args) => render(args),
        Command::Strip { form, output } => {
            let markup = read_input(&form)?;
            let doc = formcheck::from_str(&markup).map_err(|err| describe(&err, &markup))?;
            write_output(&output, formcheck::stripped(&doc).as_bytes())?;
            Ok(true)
        }
        Command::Check { form } => check(&form),
    }
}

fn render(args: RenderArgs) -> Result<bool> {
    let markup = read_input(&args.form)?;
    let name = match (&args.name, &args.form) {
        (Some(name), _) => name.clone(),
        (None, Some(path)) => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a form name from {}", path.display()))?,
        (None, None) => bail!("pass --name when reading the form from stdin"),
    };

    let request: Request = match &args.request {
        Some(path) => load_json(path)?,
        None => Request::default(),
    };
    let page: Page = match &args.page {
        Some(path) => load_json(path)?,
        None => Page::default(),
    };
    let options = FormOptions {
        name: name.clone(),
        recipient: args.recipient.unwrap_or_default(),
        subject: args.subject.unwrap_or_default(),
        success_url: args.success_url.unwrap_or_default(),
        cc_sender: args.cc_sender,
        html_email: !args.plain_text,
        ..FormOptions::default()
    };

    let mut registry = FormRegistry::new();
    registry.register_markup(&name, markup);
    let email_out = args.email_out;
    let mailer = move |message: &EmailMessage| deliver(message, email_out.as_deref());
    let handler = FormHandler::new(registry, &mailer)
        .with_config(PipelineConfig::new().with_unescape_request(args.unescape));

    let rendered = handler.render(&options, &page, &request, &mut RenderCache::new());
    info!(form = name.as_str(), status = rendered.status.code(), outcome = ?rendered.outcome, "rendered form");
    if let Some(redirect) = &rendered.redirect {
        info!(url = redirect.url.as_str(), status = redirect.status, "redirect");
    }

    write_output(&args.output, rendered.markup.as_bytes())?;
    Ok(matches!(rendered.outcome, Outcome::Displayed | Outcome::Submitted))
}

fn check(form: &Option<PathBuf>) -> Result<bool> {
    let markup = read_input(form)?;
    match formcheck::from_str(&markup) {
        Ok(doc) => {
            let controls = doc.select(&Query::any().with_attr("name")).len();
            write_output(&None, format!("ok: {controls} named controls\n").as_bytes())?;
            Ok(true)
        }
        Err(err) => {
            let mut stderr = io::stderr();
            writeln!(stderr, "{}", describe(&err, &markup)).context("failed to write stderr")?;
            Ok(false)
        }
    }
}

/// Parse error with the offending source line
fn describe(err: &formcheck::Error, source: &str) -> anyhow::Error {
    match err.excerpt(source) {
        Some(line) => anyhow::anyhow!("{err}\n  | {line}"),
        None => anyhow::anyhow!("{err}"),
    }
}

fn deliver(message: &EmailMessage, path: Option<&Path>) -> bool {
    match path {
        Some(path) => match std::fs::write(path, message.to_string()) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to write email");
                false
            }
        },
        None => {
            info!(recipient = message.recipient.as_str(), "email\n{message}");
            true
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_input(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            if buffer.trim().is_empty() {
                bail!("no input provided on stdin");
            }
            Ok(buffer)
        }
    }
}

fn write_output(path: &Option<PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data).context("failed to write stdout")?;
            Ok(())
        }
    }
}
