use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Local;
use clap::{Parser, Subcommand};

use vmk_core::config::{ConfigManager, Settings};
use vmk_core::logging::{init_tracing_with_file, LogLevel, RunLogger};
use vmk_core::models::{StepStatus, VideoPlan, WorkflowResult};
use vmk_core::services::OpenAiClient;
use vmk_core::workflow::{PlanningStep, StepServices, WorkflowExecutor};

#[derive(Parser, Debug)]
#[command(name = "videomaker", version, about = "Turn one image into a narrated video")]
struct Cli {
    /// Configuration file (created with defaults when missing).
    #[arg(long, default_value = ".config/videomaker.toml")]
    config: PathBuf,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan regions and narration for an image.
    Plan(PlanArgs),
    /// Run the generation workflow for a plan.
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Source image.
    image: PathBuf,

    /// Target video length in seconds.
    #[arg(long, default_value_t = 60.0)]
    duration: f64,

    /// Directory the generated videos go to (default: configured output folder).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Video title; the planner proposes one when omitted.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Plan JSON written by `plan`.
    plan: PathBuf,

    /// Base output directory (default: the plan's output directory).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Comma-separated step ids to run (default: all).
    #[arg(long, value_delimiter = ',')]
    steps: Option<Vec<String>>,

    /// Only validate the plan.
    #[arg(long, default_value_t = false)]
    validate_only: bool,

    /// Run the requested steps even if their prerequisites are not requested.
    #[arg(long, default_value_t = false)]
    skip_dependencies: bool,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ConfigManager::new(&cli.config);
    config
        .load_or_create()
        .with_context(|| format!("load config '{}'", cli.config.display()))?;
    config.ensure_dirs_exist().context("create configured folders")?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.settings().logging.level
    };
    let _guard = init_tracing_with_file(level, &config.logs_folder());
    tracing::debug!("Using config {}", config.path().display());

    let settings = config.into_settings();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(settings, args),
        Command::Generate(args) => cmd_generate(settings, args),
    }
}

fn run_logger(settings: &Settings, run_name: &str) -> anyhow::Result<Arc<RunLogger>> {
    let logger = RunLogger::new(
        run_name,
        &settings.paths.logs_folder,
        settings.logging.to_log_config(),
        Some(Box::new(|line: &str| println!("{line}"))),
    )
    .with_context(|| format!("create run log in '{}'", settings.paths.logs_folder))?;
    Ok(Arc::new(logger))
}

fn cmd_plan(settings: Settings, args: PlanArgs) -> anyhow::Result<ExitCode> {
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&settings.paths.output_folder));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output dir '{}'", output_dir.display()))?;

    let mut plan = VideoPlan::create_empty(&args.image, &output_dir, args.duration);
    if let Some(title) = args.title {
        plan.meta_info.title = title;
    }

    let logger = run_logger(&settings, &format!("plan_{}", Local::now().format("%Y%m%d_%H%M%S")))?;
    let client = OpenAiClient::for_planning(&settings.planning, &settings.retry)
        .context("create planning client")?;
    let outcome = PlanningStep::new(Arc::new(client)).run(&mut plan, &logger);

    let snapshot = plan
        .save_snapshot(&settings.paths.plans_folder)
        .context("save plan")?;
    logger.close();

    match outcome {
        Ok(()) => {
            println!("Plan saved: {}", snapshot.display());
            let validation = plan.validate();
            if validation.is_valid {
                return Ok(ExitCode::SUCCESS);
            }
            eprintln!("Planned video is not valid:");
            for error in &validation.errors {
                eprintln!("  - {error}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("Planning failed: {e}");
            eprintln!("Failed plan saved: {}", snapshot.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_generate(settings: Settings, args: GenerateArgs) -> anyhow::Result<ExitCode> {
    let mut plan = VideoPlan::load_json(&args.plan)
        .with_context(|| format!("load plan '{}'", args.plan.display()))?;

    if let Some(output) = &args.output {
        fs::create_dir_all(output)
            .with_context(|| format!("create output dir '{}'", output.display()))?;
        plan.meta_info.output_dir = output.clone();
    }

    let validation = plan.validate();
    if !validation.is_valid {
        eprintln!("Plan is not valid:");
        for error in &validation.errors {
            eprintln!("  - {error}");
        }
        return Ok(ExitCode::FAILURE);
    }
    if args.validate_only {
        println!("Plan is valid: {} regions", plan.regions.len());
        return Ok(ExitCode::SUCCESS);
    }

    let run_name = format!("video_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = plan.meta_info.output_dir.join(&run_name);
    plan.save_json(run_dir.join("video_plan_input.json"))
        .context("copy plan into run directory")?;

    let logger = run_logger(&settings, &run_name)?;
    let services = StepServices::from_settings(&settings).context("create service clients")?;
    let mut executor = WorkflowExecutor::standard(settings, &services, Arc::clone(&logger));

    let result = executor
        .execute_workflow(&mut plan, &run_dir, args.steps.as_deref(), args.skip_dependencies)
        .context("run workflow")?;

    let snapshot = plan.save_snapshot(&run_dir).context("save updated plan")?;
    logger.close();

    print_summary(&result, &snapshot);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(result: &WorkflowResult, plan_path: &Path) {
    println!();
    println!(
        "{} of {} steps completed in {:.1}s",
        result.completed_steps, result.total_steps, result.execution_time
    );
    for step in &result.step_results {
        let detail = match step.status {
            StepStatus::Failed | StepStatus::Skipped => step.error_message.clone().unwrap_or_default(),
            _ => format!("{} file(s), {:.1}s", step.output_files.len(), step.duration()),
        };
        println!("  [{}] {} {}: {}", step.status, step.step_id, step.step_name, detail);
    }
    println!("Output: {}", result.output_directory.display());
    if let Some(report) = &result.report_path {
        println!("Report: {}", report.display());
    }
    println!("Plan: {}", plan_path.display());
}
