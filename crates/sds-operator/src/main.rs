//! CLI entry point for applying trained MICE models through the engine.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use polars::prelude::*;
use sds_operator::{ExecutorConfig, Matrix, ProcessExecutor, SystemDsContext, mice_apply};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Apply trained MICE imputation models with SystemDS",
    long_about = "Builds a miceApply call from files on disk and runs it with a SystemDS installation.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  SYSTEMDS_ROOT       SystemDS installation (command becomes $SYSTEMDS_ROOT/bin/systemds)\n  \
                  SYSTEMDS_COMMAND    Explicit engine command\n\n\
                  EXAMPLES:\n  \
                  # Print the generated script only\n  \
                  mice-apply -x X.csv --meta meta.csv --threshold 0.8 --dm dM.csv --beta-list betaList --dry-run\n\n  \
                  # Run and save the imputed matrix\n  \
                  mice-apply -x X.csv --meta meta.csv --threshold 0.8 --dm dM.csv --beta-list betaList -o imputed.csv"
)]
struct Args {
    /// Data matrix (recoded for categorical features), CSV without header
    #[arg(short = 'x', long = "x")]
    x: PathBuf,

    /// Meta matrix: mask, missing-value flags and distinct-value counts
    #[arg(long)]
    meta: PathBuf,

    /// Confidence in [0, 1] required to impute a categorical value
    #[arg(long)]
    threshold: f64,

    /// Meta frame from one-hot encoding the original data
    #[arg(long = "dm")]
    d_m: PathBuf,

    /// List of models trained for each column
    #[arg(long)]
    beta_list: PathBuf,

    /// Write the imputed matrix to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the generated script without running the engine
    #[arg(long)]
    dry_run: bool,

    /// Engine command (overrides SYSTEMDS_ROOT / SYSTEMDS_COMMAND)
    #[arg(long)]
    systemds: Option<PathBuf>,

    /// Parent directory for each run's script, inputs and engine logs
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep the temporary working directory after the run
    #[arg(long)]
    keep_work_dir: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Print the execution report as JSON; disables logging
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load SYSTEMDS_ROOT and friends from a .env file
    dotenv().ok();

    if !(0.0..=1.0).contains(&args.threshold) {
        warn!(
            "Threshold {} is outside [0, 1]; passing it to the engine unchanged",
            args.threshold
        );
    }

    let script = build_call(&args).script()?;
    debug!("Generated script:\n{}", script);

    if args.dry_run {
        // Printed rather than logged: the script is the command's output here.
        print!("{}", script);
        return Ok(());
    }

    check_inputs(&args)?;
    let config = build_config(&args, ExecutorConfig::from_env())?;
    let executor = ProcessExecutor::builder().config(config).build()?;

    info!("Running miceApply on {}", args.x.display());
    let (result, report) = executor.execute_with_report(&script)?;
    let mut df = result.into_dataframe()?;
    info!("Imputed matrix shape: {:?}", df.shape());

    if let Some(output) = &args.output {
        write_csv(&mut df, output)?;
        info!("Wrote imputed matrix to {}", output.display());
    }

    if args.json {
        let json = serde_json::json!({
            "report": report,
            "rows": df.height(),
            "columns": df.width(),
            "output": args.output,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if args.output.is_none() {
        println!("{}", df);
    }

    Ok(())
}

/// The deferred `miceApply` call described by the command line.
fn build_call(args: &Args) -> Matrix {
    let sds = SystemDsContext::new();
    let x = sds.read_matrix(&args.x);
    let meta = sds.read_matrix(&args.meta);
    let d_m = sds.read_frame(&args.d_m);
    let beta_list = sds.read_list(&args.beta_list);

    mice_apply(&x, &meta, args.threshold, &d_m, &beta_list)
}

/// Input files must exist before the engine is launched; a dry run only
/// prints the script and skips this.
fn check_inputs(args: &Args) -> Result<()> {
    for (name, path) in [
        ("X", &args.x),
        ("meta", &args.meta),
        ("dM", &args.d_m),
        ("betaList", &args.beta_list),
    ] {
        if !path.exists() {
            return Err(anyhow!("Input '{}' not found: {}", name, path.display()));
        }
    }
    Ok(())
}

/// Apply command-line overrides on top of `base` (usually from the environment).
fn build_config(args: &Args, base: ExecutorConfig) -> Result<ExecutorConfig> {
    let mut config = base;
    if let Some(command) = &args.systemds {
        config.systemds_command = command.clone();
    }
    if let Some(dir) = &args.work_dir {
        config.working_dir = Some(dir.clone());
    }
    config.keep_working_dir = args.keep_work_dir;
    config.validate()?;
    Ok(config)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(false).finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sds_operator::config::{SYSTEMDS_COMMAND_ENV, SYSTEMDS_ROOT_ENV};

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "mice-apply",
            "-x",
            "X.csv",
            "--meta",
            "meta.csv",
            "--threshold",
            "0.8",
            "--dm",
            "dM.csv",
            "--beta-list",
            "betaList",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn env_config() -> ExecutorConfig {
        ExecutorConfig::from_vars(|name| match name {
            SYSTEMDS_ROOT_ENV => Some("/opt/systemds".to_string()),
            SYSTEMDS_COMMAND_ENV => Some("/usr/local/bin/sds".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_parse_required_arguments() {
        let args = parse(&[]);
        assert_eq!(args.x, PathBuf::from("X.csv"));
        assert_eq!(args.d_m, PathBuf::from("dM.csv"));
        assert_eq!(args.threshold, 0.8);
        assert!(!args.dry_run);

        let missing = Args::try_parse_from(["mice-apply", "-x", "X.csv", "--threshold", "0.8"]);
        assert!(missing.is_err());
    }

    #[test]
    fn test_systemds_flag_overrides_environment() {
        let args = parse(&["--systemds", "/bin/custom-sds"]);
        let config = build_config(&args, env_config()).unwrap();

        assert_eq!(config.systemds_command, PathBuf::from("/bin/custom-sds"));
        assert_eq!(config.systemds_home, Some(PathBuf::from("/opt/systemds")));
    }

    #[test]
    fn test_environment_command_used_without_flag() {
        let args = parse(&["--work-dir", "runs", "--keep-work-dir"]);
        let config = build_config(&args, env_config()).unwrap();

        assert_eq!(config.systemds_command, PathBuf::from("/usr/local/bin/sds"));
        assert_eq!(config.working_dir, Some(PathBuf::from("runs")));
        assert!(config.keep_working_dir);
    }

    #[test]
    fn test_dry_run_script_without_input_files() {
        let args = parse(&["--dry-run"]);
        assert!(args.dry_run);
        assert!(check_inputs(&args).is_err());

        let script = build_call(&args).script().unwrap();
        assert!(
            script
                .text()
                .contains("miceApply(X=V0, meta=V1, threshold=0.8, dM=V2, betaList=V3)")
        );
        let paths: Vec<String> = script
            .inputs()
            .iter()
            .map(|input| match &input.binding {
                sds_operator::InputBinding::Path(path) => path.display().to_string(),
                sds_operator::InputBinding::Data(_) => String::new(),
            })
            .collect();
        assert_eq!(paths, ["X.csv", "meta.csv", "dM.csv", "betaList"]);
    }
}
