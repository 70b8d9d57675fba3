//! Binary entry point for the renamer CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Rename the declaration under a cursor and print the new source
//! renamer rename --at src/Account.java:12:9 --to balance
//!
//! # Rename by declaration path, rewriting the file
//! renamer rename --file src/Account.java --kind field --name amt --scope Account \
//!     --to balance --in-place
//!
//! # Show what the binder sees
//! renamer analyze src/Account.java
//!
//! # Rename a field in every Java file under a directory
//! renamer batch --path src --kind field --name amt --scope Account --to balance --in-place
//! ```
//!
//! Command results go to stdout. Errors are written to stdout as a JSON
//! `ErrorResponse` and the process exits with the error's code. Logs go to
//! stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use renamer::cli::{
    parse_at, parse_kind, run_analyze, run_batch, run_rename, BatchRequest, LocatorSpec,
};
use renamer::engine::pipeline::RenameOptions;
use renamer::error::RenamerError;
use renamer::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Scope-aware identifier rename for C-family source.
#[derive(Parser, Debug)]
#[command(name = "renamer", version, about = "Scope-aware identifier rename")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Output format for rename command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum RenameFormat {
    /// Rewritten source, or a one-line summary with `--in-place` (default).
    #[default]
    Text,
    /// Unified diff.
    Diff,
    /// Full JSON response.
    Json,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Rename one declaration and every reference bound to it.
    Rename {
        #[command(flatten)]
        locator: LocatorArgs,

        /// New name.
        #[arg(long)]
        to: String,

        /// Rewrite the file instead of printing the result.
        #[arg(long)]
        in_place: bool,

        /// Refuse renames that hide an outer declaration.
        #[arg(long)]
        strict_shadowing: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = RenameFormat::default())]
        format: RenameFormat,
    },
    /// Print every declaration and reference in a file as JSON.
    Analyze {
        /// Source file.
        file: PathBuf,
    },
    /// Rename a declaration path in every matching file under a directory.
    Batch {
        /// Directory to walk.
        #[arg(long)]
        path: PathBuf,

        /// Declaration kind: type, field, method, parameter or local.
        #[arg(long)]
        kind: String,

        /// Current name.
        #[arg(long)]
        name: String,

        /// Dotted path of the enclosing scopes, e.g. `Outer.Inner.method`.
        #[arg(long)]
        scope: Option<String>,

        /// Declared type the declaration must have.
        #[arg(long = "type")]
        type_name: Option<String>,

        /// New name.
        #[arg(long)]
        to: String,

        /// Include glob, relative to `--path`. Repeatable; defaults to `**/*.java`.
        #[arg(long)]
        include: Vec<String>,

        /// Rewrite matching files.
        #[arg(long)]
        in_place: bool,

        /// Refuse renames that hide an outer declaration.
        #[arg(long)]
        strict_shadowing: bool,
    },
}

/// How `rename` finds its declaration.
#[derive(Args, Debug)]
struct LocatorArgs {
    /// Cursor position `path:line:col` (1-indexed).
    #[arg(long, conflicts_with_all = ["file", "offset", "kind", "name", "scope", "type_name"])]
    at: Option<String>,

    /// Source file, with `--offset` or `--kind`/`--name`.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Byte offset into `--file`.
    #[arg(long, requires = "file", conflicts_with_all = ["kind", "name", "scope", "type_name"])]
    offset: Option<u64>,

    /// Declaration kind: type, field, method, parameter or local.
    #[arg(long, requires_all = ["file", "name"])]
    kind: Option<String>,

    /// Declaration name.
    #[arg(long, requires_all = ["file", "kind"])]
    name: Option<String>,

    /// Dotted path of the enclosing scopes.
    #[arg(long, requires = "kind")]
    scope: Option<String>,

    /// Declared type the declaration must have, e.g. `double` or `int[]`.
    #[arg(long = "type", requires = "kind")]
    type_name: Option<String>,
}

impl LocatorArgs {
    fn resolve(&self) -> Result<(PathBuf, LocatorSpec), RenamerError> {
        if let Some(at) = &self.at {
            return parse_at(at);
        }
        let file = self.file.clone().ok_or_else(|| {
            RenamerError::invalid_args("one of --at or --file is required")
        })?;
        if let Some(offset) = self.offset {
            return Ok((file, LocatorSpec::Offset(offset)));
        }
        match (&self.kind, &self.name) {
            (Some(kind), Some(name)) => {
                let mut spec = LocatorSpec::path(self.scope.as_deref(), kind, name)?;
                if let Some(ty) = &self.type_name {
                    spec = spec.with_type_name(ty.as_str());
                }
                Ok((file, spec))
            }
            _ => Err(RenamerError::invalid_args(
                "--file needs either --offset or --kind with --name",
            )),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_format);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, same as results
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), RenamerError> {
    match cli.command {
        Command::Rename {
            locator,
            to,
            in_place,
            strict_shadowing,
            format,
        } => execute_rename(&locator, &to, in_place, strict_shadowing, format),
        Command::Analyze { file } => {
            let response = run_analyze(&file)?;
            emit(&response)
        }
        Command::Batch {
            path,
            kind,
            name,
            scope,
            type_name,
            to,
            include,
            in_place,
            strict_shadowing,
        } => {
            let request = BatchRequest {
                scope: scope.unwrap_or_default(),
                kind: parse_kind(&kind)?,
                name,
                type_name,
                to,
                includes: include,
                in_place,
            };
            let response = run_batch(&path, &request, &options(strict_shadowing))?;
            emit(&response)
        }
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn execute_rename(
    locator: &LocatorArgs,
    to: &str,
    in_place: bool,
    strict_shadowing: bool,
    format: RenameFormat,
) -> Result<(), RenamerError> {
    let (file, spec) = locator.resolve()?;
    let run = run_rename(&file, &spec, to, &options(strict_shadowing), in_place)?;

    let mut stdout = io::stdout();
    match format {
        RenameFormat::Json => return emit(&run.response),
        RenameFormat::Diff => write!(stdout, "{}", run.response.patch.unified_diff)?,
        RenameFormat::Text if in_place => writeln!(
            stdout,
            "{}: renamed '{}' to '{}' ({} edits)",
            run.response.file,
            run.response.symbol.name,
            run.response.new_name,
            run.response.summary.edits_count
        )?,
        RenameFormat::Text => write!(stdout, "{}", run.text)?,
    }
    for warning in &run.response.warnings {
        tracing::warn!(code = %warning.code, "{}", warning.message);
    }
    stdout.flush()?;
    Ok(())
}

fn options(strict_shadowing: bool) -> RenameOptions {
    RenameOptions {
        strict_shadowing,
        ..RenameOptions::default()
    }
}

fn emit<T: serde::Serialize>(response: &T) -> Result<(), RenamerError> {
    emit_response(response, &mut io::stdout()).map_err(|e| RenamerError::internal(e.to_string()))?;
    let _ = io::stdout().flush();
    Ok(())
}
