//! layerprop CLI - resolve layered properties from the command line
//!
//! Usage:
//!   layerprop get base.properties local.yaml db.url
//!   layerprop dump base.properties --env --set server.port=9090
//!   layerprop check base.properties local.yaml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use layerprop_core::{
    build, BuildOptions, EnvReader, Error, ErrorKind, FileReader, MapReader, PropertyStore, Reader,
    SourceRegistration, ENV_PRIORITY, OVERRIDE_PRIORITY,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// layerprop - Layered properties with placeholder resolution
#[derive(Parser)]
#[command(name = "layerprop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a single resolved value
    Get {
        /// Property file(s); later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Key to look up (e.g., db.url)
        key: String,

        /// Value to print if the key is not defined
        #[arg(short, long)]
        default: Option<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Print every resolved property
    Dump {
        /// Property file(s); later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format: properties, yaml, json
        #[arg(short, long, default_value = "properties", value_parser = ["properties", "yaml", "json"])]
        format: String,

        /// Show the source of each key instead of its value
        #[arg(long)]
        sources: bool,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Check that property files parse, without resolving placeholders
    Check {
        /// Property file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Sources and placeholder settings shared by `get` and `dump`
#[derive(Args, Debug, Clone)]
struct ResolveArgs {
    /// Additional file that is skipped when missing (repeatable)
    #[arg(long = "optional", value_name = "FILE")]
    optional: Vec<PathBuf>,

    /// Include environment variables, as is and as dotted lower-case keys
    #[arg(long)]
    env: bool,

    /// Override a property (repeatable); wins over files and environment
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Placeholder start delimiter
    #[arg(long, default_value = "${")]
    start_delimiter: String,

    /// Placeholder end delimiter
    #[arg(long, default_value = "}")]
    end_delimiter: String,

    /// Separator between a placeholder key and its default (empty disables defaults)
    #[arg(long, default_value = ":")]
    separator: String,

    /// Keep unresolvable placeholders as text instead of failing
    #[arg(long)]
    ignore_unresolvable: bool,

    /// Treat keys case-insensitively
    #[arg(long)]
    case_insensitive: bool,
}

impl ResolveArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions::default()
            .with_start_delimiter(self.start_delimiter.as_str())
            .with_end_delimiter(self.end_delimiter.as_str())
            .with_default_value_separator(self.separator.as_str())
            .with_ignore_unresolvable_placeholders(self.ignore_unresolvable)
            .with_case_sensitive(!self.case_insensitive)
    }

    /// Files at the default priority in command-line order, then the
    /// environment, then `--set` overrides
    fn registrations(&self, files: &[PathBuf]) -> Vec<SourceRegistration> {
        let mut registrations: Vec<SourceRegistration> = files
            .iter()
            .map(|file| SourceRegistration::new(FileReader::new(file)))
            .collect();

        registrations.extend(
            self.optional
                .iter()
                .map(|file| SourceRegistration::new(FileReader::new(file).optional(true))),
        );

        if self.env {
            registrations.push(SourceRegistration::with_priority(EnvReader::new(), ENV_PRIORITY));
            registrations.push(SourceRegistration::with_priority(
                EnvReader::dotted(),
                ENV_PRIORITY,
            ));
        }

        if !self.set.is_empty() {
            let overrides = self
                .set
                .iter()
                .fold(MapReader::named("--set"), |reader, (k, v)| {
                    reader.add(k.as_str(), v.as_str())
                });
            registrations.push(SourceRegistration::with_priority(
                overrides,
                OVERRIDE_PRIORITY,
            ));
        }

        registrations
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get {
            files,
            key,
            default,
            format,
            resolve,
        } => cmd_get(&files, &key, default, &format, &resolve),

        Commands::Dump {
            files,
            format,
            sources,
            output,
            resolve,
        } => cmd_dump(&files, &format, sources, output, &resolve),

        Commands::Check { files } => cmd_check(files),
    }
}

fn load_store(files: &[PathBuf], args: &ResolveArgs) -> Result<PropertyStore, Error> {
    build(&args.registrations(files), &args.options())
}

/// Exit status for a failed build: 1 when placeholders could not be
/// resolved, 2 when sources could not be loaded
fn failure_code(err: &Error) -> u8 {
    match err.kind {
        ErrorKind::UnresolvablePlaceholders { .. } => 1,
        _ => 2,
    }
}

fn report_failure(err: &Error) -> ExitCode {
    eprintln!("{} {}", "✗".red(), err);
    ExitCode::from(failure_code(err))
}

fn render_value(key: &str, value: &str, source: Option<&str>, format: &str) -> String {
    match format {
        "json" => {
            let json = serde_json::json!({
                "key": key,
                "value": value,
                "source": source,
            });
            format!("{:#}", json)
        }
        _ => value.to_string(),
    }
}

/// Output for `get`: the stored value, else the fallback, else `None`
fn render_get(
    store: &PropertyStore,
    key: &str,
    default: Option<&str>,
    format: &str,
) -> Option<String> {
    match store.get(key) {
        Some(value) => Some(render_value(key, value, store.source_of(key), format)),
        None => default.map(|default| render_value(key, default, None, format)),
    }
}

fn cmd_get(
    files: &[PathBuf],
    key: &str,
    default: Option<String>,
    format: &str,
    args: &ResolveArgs,
) -> ExitCode {
    let store = match load_store(files, args) {
        Ok(store) => store,
        Err(e) => return report_failure(&e),
    };

    match render_get(&store, key, default.as_deref(), format) {
        Some(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("{}: Key '{}' not found", "Error".red(), key);
            ExitCode::from(1)
        }
    }
}

fn render_dump(store: &PropertyStore, format: &str, sources: bool) -> Result<String, Error> {
    if sources {
        let source_map = store.dump_sources();
        return Ok(match format {
            "json" => format!("{:#}", serde_json::json!(source_map)),
            _ => source_map
                .iter()
                .map(|(key, source)| format!("{}: {}\n", key, source))
                .collect(),
        });
    }

    match format {
        "json" => store.to_json().map(|json| json + "\n"),
        "yaml" => store.to_yaml(),
        _ => Ok(store.to_properties()),
    }
}

fn cmd_dump(
    files: &[PathBuf],
    format: &str,
    sources: bool,
    output: Option<PathBuf>,
    args: &ResolveArgs,
) -> ExitCode {
    let store = match load_store(files, args) {
        Ok(store) => store,
        Err(e) => return report_failure(&e),
    };

    let content = match render_dump(&store, format, sources) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, &content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", content);
    }

    ExitCode::SUCCESS
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let reader = FileReader::new(&file);
        match reader.read() {
            Ok(entries) => {
                println!(
                    "{} {}: valid {} ({} properties)",
                    "✓".green(),
                    file.display(),
                    reader.file_format().name(),
                    entries.len()
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
