use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const RUNTIME_PACKAGE: &str = "fn_runtime_lambda";
const RUNTIME_BINARY: &str = "bootstrap";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the function runtime workspace",
    long_about = "Builds the deployable function archive and runs CI checks\n\
                  for the function runtime workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the `bootstrap` binary and zip it for deployment
    Package {
        /// Compilation target triple
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Archive to write
        #[arg(long, default_value = "dist/function.zip")]
        output: PathBuf,
    },
    /// Run CI checks
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Workspace tests
    Test,
    /// Run check + test
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> Result<ExitStatus, String> {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("failed to execute cargo: {error}"))
}

fn run_cargo(args: &[&str]) -> Result<(), String> {
    let status = cargo(args)?;
    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "`cargo {}` exited with status {}",
            args.join(" "),
            status.code().unwrap_or(1)
        ))
    }
}

// ── packaging ──────────────────────────────────────────────────────

fn package_function(target: &str, profile: BuildProfile, output: &Path) -> Result<(), String> {
    ensure_rust_target_installed(target)?;

    step("Build bootstrap binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        RUNTIME_PACKAGE,
        "--target",
        target,
        "--bin",
        RUNTIME_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package function archive");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(RUNTIME_BINARY);
    if let Some(parent) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create '{}': {error}", parent.display()))?;
    }
    write_bootstrap_zip(&binary_path, output)?;

    eprintln!("\nPackaged artifact:\n- {}", output.display());
    Ok(())
}

fn ensure_rust_target_installed(target: &str) -> Result<(), String> {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return Ok(());
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "failed to list installed rust targets: {}",
            stderr.trim()
        ));
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().any(|line| line.trim() == target) {
        Ok(())
    } else {
        Err(format!(
            "rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        ))
    }
}

/// Zip `binary_path` as an executable `bootstrap` entry, the layout the
/// function host expects for custom runtimes.
fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path)
        .map_err(|error| format!("failed to read '{}': {error}", binary_path.display()))?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create '{}': {error}", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(RUNTIME_BINARY, options)
        .map_err(|error| format!("failed to start bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish archive: {error}"))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() -> Result<(), String> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ])
}

fn ci_test() -> Result<(), String> {
    step("Test fn_runtime_core");
    run_cargo(&["test", "-p", "fn_runtime_core"])?;

    step("Test fn_runtime_lambda");
    run_cargo(&["test", "-p", RUNTIME_PACKAGE])
}

// ── main ───────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Package {
            target,
            profile,
            output,
        } => package_function(&target, profile, &output),
        Commands::Ci { job } => {
            let outcome = match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
                CiJob::All => ci_check().and_then(|()| ci_test()),
            };
            if outcome.is_ok() {
                eprintln!("\nCI job passed.");
            }
            outcome
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
