use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use reshelve_lib::commands::organize_pipeline::{run_pipeline, PipelineOutcome, PipelineStatus, Preview};
use reshelve_lib::commands::render;
use reshelve_lib::config::{
    parse_directory_list, resolve_api_key, DescriptorFormat, ModelConfig, OrganizerConfig,
    ProposalOptions, StrategyKind, UnmappedPolicy, DEFAULT_CHECKPOINT_FILE, DEFAULT_MAX_DEPTH,
    DEFAULT_TOKEN_BUDGET,
};
use reshelve_lib::error::AppError;
use reshelve_lib::logging;
use reshelve_lib::services::model_service::OpenAiCompatibleClient;

const MAX_LISTED_MISSING: usize = 20;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reorganize a directory with a language model")]
struct Args {
    /// Directory to organize
    #[arg(value_hint = clap::ValueHint::DirPath)]
    directory: PathBuf,

    /// Model identifier sent to the API
    #[arg(short, long, env = "RESHELVE_MODEL")]
    model: String,

    /// API key (takes precedence over the environment)
    #[arg(long)]
    api_key: Option<String>,

    /// Environment variable holding the API key
    #[arg(long, value_name = "VAR")]
    api_key_env: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "RESHELVE_API_BASE", value_name = "URL")]
    api_base: Option<String>,

    /// Port of a local inference server on localhost
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra guidance for the model
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// How the proposal is requested
    #[arg(long, value_enum, default_value_t = StrategyKind::SingleStage)]
    strategy: StrategyKind,

    /// Ask for a free-text analysis before the single-stage mapping
    #[arg(long)]
    analyze_first: bool,

    /// Summarize each text file with the model before mapping
    #[arg(long)]
    summarize: bool,

    /// Space-separated destination directories for the per-file strategy
    #[arg(long, value_name = "DIRS")]
    directories: Option<String>,

    /// How file descriptors are serialized into prompts
    #[arg(long, value_enum, default_value_t = DescriptorFormat::Compact)]
    format: DescriptorFormat,

    /// Maximum nesting depth of proposed directories
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Only collect files this many directories below the root
    #[arg(long, value_name = "N")]
    scan_depth: Option<usize>,

    /// Estimated prompt tokens before the file listing is shrunk
    #[arg(long, default_value_t = DEFAULT_TOKEN_BUDGET)]
    token_budget: usize,

    /// Leave files the model never maps where they are instead of failing
    #[arg(long)]
    leave_unmapped: bool,

    /// Where the proposed structure is saved
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CHECKPOINT_FILE)]
    checkpoint: PathBuf,

    /// Apply a previously saved proposal instead of asking the model
    #[arg(long, value_name = "PATH")]
    from_checkpoint: Option<PathBuf>,

    /// Keep directories emptied by the moves
    #[arg(long)]
    no_cleanup: bool,

    /// Remove every empty directory under the root after moving
    #[arg(long, conflicts_with = "no_cleanup")]
    sweep_empty: bool,

    /// Apply the moves without asking
    #[arg(short, long)]
    yes: bool,

    /// Print debug logs
    #[arg(short, long)]
    debug: bool,
}

fn build_config(args: Args) -> Result<OrganizerConfig> {
    let root = fs::canonicalize(&args.directory)
        .with_context(|| format!("cannot access {}", args.directory.display()))?;

    let mut model = ModelConfig::new(args.model);
    if let Some(base) = args.api_base {
        model.api_base = base;
    }
    if let Some(port) = args.port {
        model = model.with_local_port(port);
    }
    model.api_key = resolve_api_key(args.api_key, args.api_key_env.as_deref());

    let mut config = OrganizerConfig::new(root, model);
    config.proposal = ProposalOptions {
        strategy: args.strategy,
        format: args.format,
        max_depth: args.max_depth,
        token_budget: args.token_budget,
        guidance: args.prompt,
        analyze_first: args.analyze_first,
        summarize: args.summarize,
        directories: args
            .directories
            .as_deref()
            .map(parse_directory_list)
            .unwrap_or_default(),
    };
    if args.leave_unmapped {
        config.unmapped = UnmappedPolicy::LeaveInPlace;
    }
    config.checkpoint = Some(args.checkpoint);
    config.from_checkpoint = args.from_checkpoint;
    config.max_scan_depth = args.scan_depth;
    config.cleanup = !args.no_cleanup;
    config.sweep_tree = args.sweep_empty;
    config.assume_yes = args.yes;
    Ok(config)
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

fn show_preview(preview: &Preview<'_>) {
    let root_name = preview
        .root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| preview.root.display().to_string());

    println!("{}\n", render::render_current(&root_name, preview.mapping));
    println!("{}", render::render_proposal(&root_name, preview.mapping));
    if !preview.warnings.is_empty() {
        println!("{}", render::render_warnings(preview.warnings));
    }
    if !preview.left_in_place.is_empty() {
        println!(
            "{} {} files stay where they are",
            "note:".cyan().bold(),
            preview.left_in_place.len()
        );
    }
    if preview.report.has_issues() {
        println!("{}", render::render_report(preview.report, preview.root));
    }
}

fn report_outcome(outcome: &PipelineOutcome, root: &Path) {
    match outcome.status {
        PipelineStatus::NothingToOrganize => println!("No files to organize."),
        PipelineStatus::NoChanges => println!("Everything is already in place."),
        PipelineStatus::Declined => println!("Operation cancelled."),
        PipelineStatus::Applied => {
            if let Some(moves) = &outcome.moves {
                println!(
                    "{}",
                    render::render_move_summary(moves, outcome.cleanup.as_ref(), root)
                );
            }
        }
    }
}

fn report_error(err: &anyhow::Error) -> i32 {
    eprintln!("{} {err:#}", "error:".red().bold());
    let Some(app_err) = err.downcast_ref::<AppError>() else {
        return 1;
    };

    if let AppError::IncompleteMapping(missing) = app_err {
        for path in missing.iter().take(MAX_LISTED_MISSING) {
            eprintln!("    {path}");
        }
        if missing.len() > MAX_LISTED_MISSING {
            eprintln!("    ... and {} more", missing.len() - MAX_LISTED_MISSING);
        }
    }
    let guidance = app_err.guidance();
    if !guidance.is_empty() {
        eprintln!("{}", "Troubleshooting:".bold());
        for hint in guidance {
            eprintln!("  - {hint}");
        }
    }
    app_err.exit_code()
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(args)?;
    debug!(root = %config.root.display(), model = %config.model.model, "Starting");

    let client = OpenAiCompatibleClient::new(config.model.clone())?;
    let assume_yes = config.assume_yes;
    let outcome = run_pipeline(&config, &client, |preview| {
        show_preview(preview);
        if assume_yes {
            return Ok(true);
        }
        prompt_confirm("Proceed with moving files?", Some(false)).map_err(AppError::from)
    })
    .await?;

    report_outcome(&outcome, &config.root);
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init_logger(args.debug);

    if let Err(err) = run(args).await {
        debug!(error = ?err, "Organization failed");
        process::exit(report_error(&err));
    }
}
