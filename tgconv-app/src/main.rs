//! tgconv: convert Telegram session files between Telethon, Pyrogram and
//! string-session formats.
//!
//! ```text
//! tgconv convert --to pyrogram --input telethon_session --output pyrogram_session
//! tgconv convert --from pyrogram --to string --input account --api-id 12345 --api-hash abcdef
//! tgconv inspect --session account
//! tgconv delete --session old_account --yes
//! tgconv config --api-id 12345 --api-hash abcdef
//! ```
//!
//! Logging goes through `RUST_LOG` (default `tgconv=info,tgconv_app=info`).

mod credentials;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tgconv::{ApiCredentials, Converter, Inspection, Output, SessionFormat, Source, Target};

/// Telegram session converter.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a session between formats
    Convert(ConvertArgs),
    /// Show what a session file contains and whether it converts
    Inspect {
        /// Session file path (`.session` is appended if needed)
        #[arg(long)]
        session: PathBuf,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Delete a session file
    Delete {
        /// Session file path (`.session` is appended if needed)
        #[arg(long)]
        session: PathBuf,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Save API credentials to a file
    Config {
        #[command(flatten)]
        api: ApiArgs,
        /// Where to write them
        #[arg(long, default_value = credentials::DEFAULT_FILE)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Source format: auto, telethon, pyrogram, string or telethon-string
    #[arg(long = "from", default_value = "auto", value_parser = parse_source_format)]
    from: SourceFormat,
    /// Target format: telethon, pyrogram, string or telethon-string
    #[arg(long)]
    to: SessionFormat,
    /// Input session file, or for string sources the string itself (or a file holding it)
    #[arg(long)]
    input: String,
    /// Output session file; string targets print to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    /// Delete the input file after a successful conversion (kept if it is also
    /// the output or already in the target format)
    #[arg(long)]
    delete_original: bool,
    #[command(flatten)]
    api: ApiArgs,
}

#[derive(Args, Debug, Default)]
struct ApiArgs {
    /// Telegram API ID
    #[arg(long, env = "TG_API_ID")]
    api_id: Option<i32>,
    /// Telegram API hash
    #[arg(long, env = "TG_API_HASH", hide_env_values = true)]
    api_hash: Option<String>,
}

impl ApiArgs {
    fn load(&self) -> anyhow::Result<Option<ApiCredentials>> {
        credentials::load(self.api_id, self.api_hash.as_deref())
    }
}

#[derive(Clone, Copy, Debug)]
enum SourceFormat {
    Auto,
    Known(SessionFormat),
}

fn parse_source_format(s: &str) -> Result<SourceFormat, tgconv::UnknownFormat> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(SourceFormat::Auto);
    }
    s.parse().map(SourceFormat::Known)
}

fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("tgconv=info,tgconv_app=info"))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Convert(args) => convert(args),
        Command::Inspect { session, api } => inspect(&session, &api),
        Command::Delete { session, yes } => delete(&session, yes),
        Command::Config { api, file } => config(api, &file),
    }
}

// ─── convert ──────────────────────────────────────────────────────────────────

fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    let mut converter = Converter::default();
    if let Some(creds) = args.api.load()? {
        converter = converter.with_credentials(creds);
    }

    let string_value;
    let (source, input_file) = match args.from {
        SourceFormat::Known(format) if format.is_string() => {
            string_value = read_string_input(&args.input)?;
            (Source::String { value: &string_value, format }, None)
        }
        SourceFormat::Known(format) => {
            let path = Path::new(&args.input);
            (Source::File { path, format: Some(format) }, Some(tgconv::input_path(path)))
        }
        SourceFormat::Auto => {
            let path = Path::new(&args.input);
            (Source::File { path, format: None }, Some(tgconv::input_path(path)))
        }
    };

    // The source format decides whether deleting the input is safe; read it
    // before the input can be overwritten.
    let source_format = match args.from {
        SourceFormat::Known(format) => Some(format),
        SourceFormat::Auto if args.delete_original => Some(converter.read(source)?.0),
        SourceFormat::Auto => None,
    };

    let target = if args.to.is_file() {
        let Some(path) = args.output.as_deref() else {
            bail!("--output is required when converting to {}", args.to);
        };
        Target::File { path, format: args.to }
    } else {
        Target::String { format: args.to }
    };

    let written = match converter.convert(source, target)? {
        Output::File { path, format } => {
            println!("✅ Wrote {format} session to {}", path.display());
            Some(path)
        }
        Output::String { format, value } => match &args.output {
            Some(path) => {
                fs::write(path, format!("{value}\n"))
                    .with_context(|| format!("cannot write {}", path.display()))?;
                println!("✅ Wrote {format} string session to {}", path.display());
                Some(path.clone())
            }
            None => {
                println!("{value}");
                None
            }
        },
    };

    if args.delete_original {
        match input_file {
            Some(input) => {
                delete_original(&input, written.as_deref(), source_format, args.to)?;
            }
            None => log::warn!("--delete-original ignored: the input is a string"),
        }
    }
    Ok(())
}

/// Remove a converted input file, unless it is the only copy of the session.
/// Returns whether the file was deleted.
fn delete_original(
    input: &Path,
    written: Option<&Path>,
    from: Option<SessionFormat>,
    to: SessionFormat,
) -> anyhow::Result<bool> {
    if from == Some(to) {
        log::warn!("--delete-original ignored: {} is already a {to} session", input.display());
        return Ok(false);
    }
    if written.is_some_and(|out| same_file(input, out)) {
        log::warn!("--delete-original ignored: {} was overwritten by the output", input.display());
        return Ok(false);
    }
    fs::remove_file(input).with_context(|| format!("cannot delete {}", input.display()))?;
    log::info!("deleted original {}", input.display());
    Ok(true)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// A string source is taken literally unless it names an existing file.
fn read_string_input(input: &str) -> anyhow::Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        return Ok(text.trim().to_string());
    }
    Ok(input.trim().to_string())
}

// ─── inspect ──────────────────────────────────────────────────────────────────

fn inspect(session: &Path, api: &ApiArgs) -> anyhow::Result<()> {
    let mut converter = Converter::default();
    if let Some(creds) = api.load()? {
        converter = converter.with_credentials(creds);
    }
    let report = converter.inspect(session)?;
    print_inspection(&report);
    if !report.is_convertible() {
        bail!("{} cannot be converted", report.path.display());
    }
    Ok(())
}

fn print_inspection(r: &Inspection) {
    println!("📂 {} ({} bytes)", r.path.display(), r.size);
    println!("   Page size:  {}", r.header.page_size);
    println!("   Encoding:   {:?}", r.header.text_encoding);
    if r.header.is_wal() {
        println!("   Journal:    WAL (frames not yet checkpointed are not read)");
    }
    println!("   Tables:");
    for t in &r.tables {
        let rows = t.rows.map_or_else(|| "?".to_string(), |n| n.to_string());
        println!("     {:<14} {:>5} rows  ({})", t.name, rows, t.columns.join(", "));
    }
    println!();
    match (&r.format, &r.session) {
        (Some(format), Some(s)) => {
            println!("   Format:     {format}");
            println!("   DC:         {} ({}:{})", s.dc_id(), s.server_address(), s.port());
            println!("   Auth key:   {} bytes, id {:016x}", s.auth_key().len(), s.auth_key().key_id());
            if let Some(api_id) = s.api_id() {
                println!("   API ID:     {api_id}");
            }
            match s.user_id() {
                Some(id) => println!("   User ID:    {id}"),
                None => println!("   User ID:    unknown"),
            }
            println!("   Bot:        {}", if s.is_bot() { "yes" } else { "no" });
            println!("   Test mode:  {}", if s.test_mode() { "yes" } else { "no" });
        }
        _ => println!("   Format:     not detected"),
    }
    match &r.problem {
        None => println!("✅ Session looks valid"),
        Some(e) => println!("✗ {e}"),
    }
}

// ─── delete / config ──────────────────────────────────────────────────────────

fn delete(session: &Path, yes: bool) -> anyhow::Result<()> {
    let path = tgconv::output_path(session);
    if !path.is_file() {
        bail!("session file not found: {}", path.display());
    }
    if !yes && !confirm(&format!("Delete {}? (yes/no): ", path.display()))? {
        println!("Deletion cancelled");
        return Ok(());
    }
    fs::remove_file(&path).with_context(|| format!("cannot delete {}", path.display()))?;
    println!("🗑  Deleted {}", path.display());
    Ok(())
}

fn config(api: ApiArgs, file: &Path) -> anyhow::Result<()> {
    let api_id = match api.api_id {
        Some(id) => id,
        None => {
            let raw = prompt("Enter your API ID: ")?;
            raw.parse().with_context(|| format!("API ID `{raw}` is not a number"))?
        }
    };
    let api_hash = match api.api_hash {
        Some(hash) => hash,
        None => prompt("Enter your API hash: ")?,
    };
    if api_hash.is_empty() {
        bail!("API hash is empty");
    }
    credentials::write_file(file, &ApiCredentials::new(api_id, api_hash))?;
    println!("💾 API credentials saved to {}", file.display());
    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{msg}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(msg: &str) -> io::Result<bool> {
    let answer = prompt(msg)?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}
