use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::{Map, Value, json};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use metagenscope_cli::catalog::{
    Catalog, FileSource, RepositorySource, SampleSource, is_result_file_name,
};
use metagenscope_cli::client::{MgsClient, MgsHttpClient, response_str};
use metagenscope_cli::config::{ConfigStore, Settings};
use metagenscope_cli::dispatch;
use metagenscope_cli::domain::UploadOutcome;
use metagenscope_cli::error::MgsError;
use metagenscope_cli::metadata::parse_metadata_csv;
use metagenscope_cli::output::{HumanOutput, JsonOutput, OutputMode};
use metagenscope_cli::repository::DirectoryRepository;
use metagenscope_cli::uploader::{PARALLEL_WORKERS, SampleErrorPolicy, UploadOptions, Uploader};

#[derive(Parser)]
#[command(name = "metagenscope")]
#[command(about = "Upload bioinformatics tool results to a MetaGenScope server")]
#[command(version, author)]
struct Cli {
    /// Server URL (defaults to METAGENSCOPE_HOST, the config file, then the public server)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Bearer token (defaults to METAGENSCOPE_TOKEN, then the config file)
    #[arg(short = 'a', long, global = true)]
    auth_token: Option<String>,

    /// Print machine-readable JSON instead of colored text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Register a new user")]
    Register(RegisterArgs),
    #[command(about = "Log in and print an auth token")]
    Login(LoginArgs),
    #[command(about = "Show the status of the current token")]
    Status,
    #[command(about = "Get data from the server")]
    Get(GetArgs),
    #[command(about = "Run actions on the server")]
    Run(RunArgs),
    #[command(about = "Upload results or metadata")]
    Upload(UploadArgs),
    #[command(about = "Parse result files and print the normalized JSON without uploading")]
    Parse(ParseArgs),
}

#[derive(Args)]
struct RegisterArgs {
    username: String,
    user_email: String,
    password: String,
}

#[derive(Args)]
struct LoginArgs {
    user_email: String,
    password: String,

    /// Store the token in the config file
    #[arg(long)]
    save: bool,
}

#[derive(Args)]
struct GetArgs {
    #[command(subcommand)]
    command: GetCommand,
}

#[derive(Subcommand)]
enum GetCommand {
    #[command(subcommand, about = "Get UUIDs from the server")]
    Uuids(UuidCommand),
}

#[derive(Subcommand)]
enum UuidCommand {
    #[command(about = "UUIDs for the given sample names")]
    Samples { names: Vec<String> },
    #[command(about = "UUIDs for the given sample group names")]
    Groups { names: Vec<String> },
}

#[derive(Args)]
struct RunArgs {
    #[command(subcommand)]
    command: RunCommand,
}

#[derive(Subcommand)]
enum RunCommand {
    #[command(subcommand, about = "Run middleware")]
    Middleware(MiddlewareCommand),
}

#[derive(Subcommand)]
enum MiddlewareCommand {
    #[command(about = "Run middleware for a sample group")]
    Group { group_uuid: String },
    #[command(about = "Run middleware for a sample")]
    Sample { sample_name: String },
}

#[derive(Args)]
struct UploadArgs {
    #[command(subcommand)]
    command: UploadCommand,
}

#[derive(Subcommand)]
enum UploadCommand {
    #[command(about = "Upload results named <sample>.<result_type>.<role>")]
    Files {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(required = true)]
        result_files: Vec<Utf8PathBuf>,
    },
    #[command(about = "Upload every sample of a local result repository")]
    Repo {
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(default_value = ".")]
        root: Utf8PathBuf,
    },
    #[command(about = "Upload sample metadata from a CSV file")]
    Metadata {
        metadata_csv: PathBuf,
        sample_names: Vec<String>,
    },
}

#[derive(Args, Clone)]
struct BatchArgs {
    /// Existing sample group UUID; a new group is created when omitted
    #[arg(short, long)]
    group: Option<String>,

    /// Upload each sample's results with a pool of workers
    #[arg(long)]
    parallel: bool,

    /// Look up sample UUIDs on the server instead of trusting only this session
    #[arg(long)]
    lenient: bool,

    #[arg(long, value_enum, default_value_t = SampleErrorPolicy::Abort)]
    on_sample_error: SampleErrorPolicy,
}

impl BatchArgs {
    fn options(&self) -> UploadOptions {
        UploadOptions {
            workers: if self.parallel { PARALLEL_WORKERS } else { 1 },
            on_sample_error: self.on_sample_error,
            strict: !self.lenient,
        }
    }
}

#[derive(Args)]
struct ParseArgs {
    #[arg(required = true)]
    result_files: Vec<Utf8PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<MgsError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &MgsError) -> u8 {
    match error {
        MgsError::UnparsableResultType { .. }
        | MgsError::InvalidResultFileName(_)
        | MgsError::MissingAuthentication
        | MgsError::MetadataParse(_) => 2,
        MgsError::Http(_) | MgsError::Status { .. } | MgsError::UnexpectedResponse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let store = ConfigStore::new()?;
    let config = store.load()?;
    let settings = Settings::resolve(cli.host, cli.auth_token, &config);

    match cli.command {
        Commands::Register(args) => run_register(args, &settings),
        Commands::Login(args) => run_login(args, &settings, &store),
        Commands::Parse(args) => run_parse(args),
        command => {
            let client = MgsHttpClient::authenticated(&settings)?;
            run_authenticated(command, client, &config.unsupported_result_types, output_mode)
        }
    }
}

fn run_authenticated(
    command: Commands,
    client: MgsHttpClient,
    unsupported: &[String],
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    match command {
        Commands::Status => {
            let response = client.get("/api/v1/auth/status")?;
            print_value(&response).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get(GetArgs {
            command: GetCommand::Uuids(command),
        }) => {
            let uploader = Uploader::new(client);
            match command {
                UuidCommand::Samples { names } => {
                    for name in names {
                        let (name, uuid) = uploader.lookup_sample_uuid(&name)?;
                        HumanOutput::print_uuid(&name, &uuid);
                    }
                }
                UuidCommand::Groups { names } => {
                    for name in names {
                        let (name, uuid) = uploader.lookup_group_uuid(&name)?;
                        HumanOutput::print_uuid(&name, &uuid);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(RunArgs {
            command: RunCommand::Middleware(command),
        }) => {
            let uploader = Uploader::new(client);
            let response = match command {
                MiddlewareCommand::Group { group_uuid } => {
                    uploader.run_group_middleware(&group_uuid)?
                }
                MiddlewareCommand::Sample { sample_name } => {
                    uploader.run_sample_middleware(&sample_name)?
                }
            };
            print_value(&response).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Upload(UploadArgs { command }) => match command {
            UploadCommand::Files {
                batch,
                result_files,
            } => {
                let files = guard_result_files(result_files);
                let source = FileSource::new(files);
                run_batch(client, &source, &batch, output_mode)
            }
            UploadCommand::Repo { batch, root } => {
                let source =
                    RepositorySource::new(DirectoryRepository::new(root), unsupported.to_vec());
                run_batch(client, &source, &batch, output_mode)
            }
            UploadCommand::Metadata {
                metadata_csv,
                sample_names,
            } => run_upload_metadata(client, &metadata_csv, &sample_names),
        },
        Commands::Register(_) | Commands::Login(_) | Commands::Parse(_) => {
            Err(miette::Report::msg("command does not need authentication"))
        }
    }
}

fn run_register(args: RegisterArgs, settings: &Settings) -> miette::Result<ExitCode> {
    let client = MgsHttpClient::anonymous(&settings.host)?;
    let payload = json!({
        "username": args.username,
        "email": args.user_email,
        "password": args.password,
    });
    let response = client.post("/api/v1/auth/register", &payload)?;
    print_value(&response).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_login(args: LoginArgs, settings: &Settings, store: &ConfigStore) -> miette::Result<ExitCode> {
    let client = MgsHttpClient::anonymous(&settings.host)?;
    let payload = json!({
        "email": args.user_email,
        "password": args.password,
    });
    let response = client.post("/api/v1/auth/login", &payload)?;
    let token = response_str(&response, "/data/auth_token")?;
    if args.save {
        store.set_token(&token)?;
        eprintln!("token saved to {}", store.path().display());
    }
    println!("{token}");
    Ok(ExitCode::SUCCESS)
}

fn run_parse(args: ParseArgs) -> miette::Result<ExitCode> {
    let catalog = FileSource::new(args.result_files).catalog()?;
    let mut parsed = Map::new();
    for (sample_name, results) in catalog.samples() {
        let mut sample = Map::new();
        for (result_type, schema) in results {
            let value = dispatch::parse_schema(result_type, schema)?.to_json()?;
            sample.insert(result_type.clone(), value);
        }
        parsed.insert(sample_name.clone(), Value::Object(sample));
    }
    JsonOutput::print_json(&parsed).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_batch<S: SampleSource>(
    client: MgsHttpClient,
    source: &S,
    batch: &BatchArgs,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let catalog: Catalog = source.catalog()?;
    let metadata = source.metadata()?;
    if catalog.is_empty() {
        eprintln!("no result files to upload");
        return Ok(ExitCode::SUCCESS);
    }

    let mut uploader = Uploader::with_options(client, batch.options());
    let group_uuid = uploader.resolve_group(batch.group.as_deref())?;
    if let Some(group_name) = uploader.created_group_name() {
        if matches!(output_mode, OutputMode::Human) {
            println!("group created: <name: '{group_name}' UUID: '{group_uuid}'>");
        }
    }

    let outcomes = uploader.upload_all_results(Some(&group_uuid), &catalog, &metadata)?;
    report_outcomes(&outcomes, output_mode)
}

fn report_outcomes(outcomes: &[UploadOutcome], output_mode: OutputMode) -> miette::Result<ExitCode> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_outcomes(outcomes).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_outcomes(outcomes).into_diagnostic()?,
    }
    if outcomes.iter().any(UploadOutcome::is_error) {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_upload_metadata(
    client: MgsHttpClient,
    metadata_csv: &std::path::Path,
    sample_names: &[String],
) -> miette::Result<ExitCode> {
    let metadata = parse_metadata_csv(metadata_csv, sample_names)?;
    let uploader = Uploader::new(client);
    let mut failed = false;
    for (sample_name, attributes) in &metadata {
        match uploader.upload_metadata(sample_name, attributes) {
            Ok(response) => print_value(&response).into_diagnostic()?,
            Err(err) => {
                failed = true;
                eprintln!("[upload-metadata-error] {sample_name}: {err}");
            }
        }
    }
    Ok(if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Drops paths that do not follow the result naming scheme.
fn guard_result_files(files: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    files
        .into_iter()
        .filter(|path| {
            let keep = is_result_file_name(path);
            if !keep {
                warn!(%path, "skipping file without <sample>.<result_type>.<role> name");
            }
            keep
        })
        .collect()
}

fn print_value(value: &Value) -> std::io::Result<()> {
    JsonOutput::print_json(value)
}
