//! mcp-python-executor CLI entry point
//!
//! Usage:
//!   mcp-python-executor [mcp]                     Start MCP server over stdio
//!   mcp-python-executor exec <env> -e <code>      Run code in an environment
//!   mcp-python-executor envs                      List environments
//!   mcp-python-executor install <env> <pkg>...    Install packages
//!   mcp-python-executor config                    Show configuration

use std::borrow::Cow;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mcp_python_executor::cli::{
    commands::{
        CleanArgs, ConfigArgs, CreateArgs, DeleteArgs, EnvArgs, ExecArgs, FormatArgs, PackagesArgs,
        ReadArgs,
    },
    run_mcp_server, Cli, Commands, OutputFormat,
};
use mcp_python_executor::config::{find_config_files, load_config, Config};
use mcp_python_executor::environment::{
    CreateStatus, DocumentKind, EnvManager, FileContent, PackageInfo, UvCli,
};
use mcp_python_executor::error::{EnvError, ErrorInfo};
use mcp_python_executor::logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.resolved_command() {
        Commands::Mcp => run_mcp_server(&config).await?,
        Commands::Envs(args) => list_envs(args, &config)?,
        Commands::Create(args) => create_env(args, &config).await?,
        Commands::Exec(args) => execute(args, &config, cli.verbose).await?,
        Commands::Files(args) => list_files(args, &config).await?,
        Commands::Read(args) => read_file(args, &config).await?,
        Commands::Install(args) => install_packages(args, &config).await?,
        Commands::Remove(args) => remove_packages(args, &config).await?,
        Commands::Packages(args) => list_packages(args, &config).await?,
        Commands::Delete(args) => delete_env(args, &config).await?,
        Commands::Clean(args) => clean(args, &config).await?,
        Commands::Config(args) => show_config(args, &config)?,
    }

    Ok(())
}

/// Print the suggestion for an error, then hand it to anyhow
fn report(err: EnvError) -> anyhow::Error {
    if let Some(suggestion) = ErrorInfo::from(&err).suggestion {
        eprintln!("{}: {}", "hint".yellow(), suggestion);
    }
    err.into()
}

/// Spinner on stderr for uv operations; hidden when stderr is not a terminal
fn spinner(message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// List environments
fn list_envs(args: FormatArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);
    let envs = manager.list_envs().map_err(report)?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "environments": envs }))?,
        OutputFormat::Plain => {
            for env in &envs {
                println!("{}", env);
            }
        }
        OutputFormat::Table => {
            println!("{}: {}", "Directory".cyan(), manager.envs_dir().display());
            println!();
            if envs.is_empty() {
                println!("No environments found.");
            } else {
                for env in &envs {
                    println!("  {}", env.green());
                }
            }
        }
    }

    Ok(())
}

/// Create an environment
async fn create_env(args: CreateArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);

    let pb = spinner(format!("Creating environment '{}'", args.env_id));
    let result = manager.create_env(&args.env_id, &args.packages).await;
    pb.finish_and_clear();
    let outcome = result.map_err(report)?;

    match outcome.status {
        CreateStatus::Created => println!("{}: {}", "Created".green(), outcome.env_id),
        CreateStatus::AlreadyExists => {
            println!("{}: {}", "Already exists".yellow(), outcome.env_id)
        }
        CreateStatus::CreatedWithWarning => {
            println!("{}: {}", "Created".green(), outcome.env_id);
            if let Some(warning) = outcome.warning {
                eprintln!("{}: {}", "warning".yellow(), warning);
            }
        }
    }

    Ok(())
}

/// Code to write before running: inline, from a local script, or none
fn resolve_code(args: &ExecArgs) -> Result<Option<String>> {
    if let Some(ref code) = args.code {
        return Ok(Some(code.clone()));
    }
    match args.script {
        Some(ref path) => {
            let code = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script {}", path.display()))?;
            Ok(Some(code))
        }
        None => Ok(None),
    }
}

/// Write and run Python code
async fn execute(args: ExecArgs, config: &Config, verbose: bool) -> Result<()> {
    let manager = EnvManager::from_config(config);
    let code = resolve_code(&args)?;

    // A local script keeps its own name unless one was given
    let filename = args.filename.clone().or_else(|| {
        args.script
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    });

    if verbose {
        eprintln!(
            "{}: {} in '{}'",
            "running".cyan(),
            filename.as_deref().unwrap_or(manager.default_filename()),
            args.env_id
        );
    }

    let pb = (!args.packages.is_empty())
        .then(|| spinner(format!("Adding {}", args.packages.join(", "))));
    let result = manager
        .execute_python(&args.env_id, code.as_deref(), filename.as_deref(), &args.packages)
        .await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let output = match result {
        Ok(output) => output,
        Err(EnvError::ExecutionFailed {
            exit_code,
            stdout,
            stderr,
        }) => {
            print!("{}", stdout);
            let err = EnvError::ExecutionFailed {
                exit_code,
                stdout: String::new(),
                stderr,
            };
            return Err(report(err));
        }
        Err(e) => return Err(report(e)),
    };

    match args.format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Plain | OutputFormat::Table => {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
        }
    }

    Ok(())
}

/// List files in an environment
async fn list_files(args: EnvArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);
    let files = manager.list_files(&args.env_id).await.map_err(report)?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "env_id": args.env_id,
            "files": files,
        }))?,
        OutputFormat::Plain => {
            for file in &files {
                println!("{}", file);
            }
        }
        OutputFormat::Table => {
            println!("{}: {}", "Environment".cyan(), args.env_id);
            println!();
            if files.is_empty() {
                println!("No files found.");
            } else {
                for file in &files {
                    println!("  {}", file);
                }
            }
        }
    }

    Ok(())
}

/// Print or save a file
async fn read_file(args: ReadArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);

    if let Some(ref output) = args.output {
        let source = manager
            .get_file_path(&args.env_id, &args.filename)
            .await
            .map_err(report)?;
        let bytes = std::fs::copy(&source, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!("{}: {} ({} bytes)", "Saved".green(), output.display(), bytes);
        return Ok(());
    }

    let content = manager
        .read_file(&args.env_id, &args.filename)
        .await
        .map_err(report)?;

    match (args.format, content) {
        (OutputFormat::Json, FileContent::Image { mime_type, data }) => {
            print_json(&serde_json::json!({
                "filename": args.filename,
                "type": "image",
                "mime_type": mime_type,
                "content": data,
            }))?;
        }
        (OutputFormat::Json, FileContent::Document(doc)) => print_json(&doc)?,
        (_, FileContent::Document(doc)) if doc.kind == DocumentKind::Text => {
            print!("{}", doc.content);
        }
        (_, FileContent::Document(doc)) => {
            eprintln!(
                "{} is binary ({}); use --output to save it",
                doc.filename, doc.mime_type
            );
        }
        (_, FileContent::Image { mime_type, .. }) => {
            eprintln!(
                "{} is an image ({}); use --output to save it",
                args.filename, mime_type
            );
        }
    }

    Ok(())
}

/// Install packages
async fn install_packages(args: PackagesArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);

    let pb = spinner(format!("Installing {}", args.packages.join(", ")));
    let result = manager.install_packages(&args.env_id, &args.packages).await;
    pb.finish_and_clear();
    result.map_err(report)?;

    println!("{}: {}", "Installed".green(), args.packages.join(", "));
    Ok(())
}

/// Remove packages
async fn remove_packages(args: PackagesArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);

    let pb = spinner(format!("Removing {}", args.packages.join(", ")));
    let result = manager.remove_packages(&args.env_id, &args.packages).await;
    pb.finish_and_clear();
    result.map_err(report)?;

    println!("{}: {}", "Removed".green(), args.packages.join(", "));
    Ok(())
}

/// Rows for the package table, names padded to the widest entry
fn package_rows(packages: &[PackageInfo]) -> Vec<String> {
    let width = packages.iter().map(|p| p.name.len()).max().unwrap_or(10);
    packages
        .iter()
        .map(|p| format!("  {:width$}  {}", p.name, p.version, width = width))
        .collect()
}

/// List installed packages
async fn list_packages(args: EnvArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);
    let packages = manager.list_packages(&args.env_id).await.map_err(report)?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "env_id": args.env_id,
            "packages": packages,
        }))?,
        OutputFormat::Plain => {
            for package in &packages {
                println!("{}=={}", package.name, package.version);
            }
        }
        OutputFormat::Table => {
            println!("{}: {}", "Environment".cyan(), args.env_id);
            println!();
            if packages.is_empty() {
                println!("No packages installed.");
            } else {
                for row in package_rows(&packages) {
                    println!("{}", row);
                }
            }
        }
    }

    Ok(())
}

/// Delete one environment
async fn delete_env(args: DeleteArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);
    manager.delete_env(&args.env_id).await.map_err(report)?;

    println!("{}: {}", "Deleted".green(), args.env_id);
    Ok(())
}

/// Delete every environment
async fn clean(args: CleanArgs, config: &Config) -> Result<()> {
    let manager = EnvManager::from_config(config);

    if !args.yes {
        let count = manager.list_envs().map_err(report)?.len();
        anyhow::bail!(
            "Refusing to delete {} environment(s) in {} without --yes",
            count,
            manager.envs_dir().display()
        );
    }

    let removed = manager.clean_all().await.map_err(report)?;
    if removed.is_empty() {
        println!("No environments to delete.");
    } else {
        println!("{}: {}", "Deleted".green(), removed.join(", "));
    }
    Ok(())
}

/// Show resolved configuration
fn show_config(args: ConfigArgs, config: &Config) -> Result<()> {
    let envs_dir = config.envs_dir();

    match args.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "config": config,
            "envs_dir": envs_dir,
            "config_files": find_config_files(),
        }))?,
        OutputFormat::Plain => println!("{}", envs_dir.display()),
        OutputFormat::Table => {
            let uv = UvCli::new(&config.uv);
            let uv_status = if uv.is_available() {
                "found".green()
            } else {
                "not found".red()
            };

            println!("{}: {}", "Environments".cyan(), envs_dir.display());
            println!("{}: {} ({})", "uv".cyan(), uv.command(), uv_status);
            println!("{}: {}s", "Timeout".cyan(), config.uv.timeout);
            println!(
                "{}: {} bytes",
                "Max read size".cyan(),
                config.files.max_read_bytes
            );
            println!(
                "{}: {}",
                "Default file".cyan(),
                config.execution.default_filename
            );

            let files = find_config_files();
            println!();
            println!("{}:", "Config Files".cyan());
            if files.is_empty() {
                println!("  None (using defaults)");
            } else {
                for file in &files {
                    println!("  - {}", file.display());
                }
            }
        }
    }

    Ok(())
}
