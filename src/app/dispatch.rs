use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result, bail};
use microprobe::compiler::Compiler;
use microprobe::config::Config;
use microprobe::engine::{Context, Runtime, RuntimeOptions};
use microprobe::report::evaluate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::example::example_program;
use crate::cli::commands::{Cli, Commands};

async fn read_program(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read program {}", path.display()))
}

/// Compile, evaluate and report. Ctrl-C cancels the evaluation; the report
/// is still written.
async fn run_program(config: Config, program: &Path, output: Option<&Path>) -> Result<()> {
    let compiler = Compiler::new();
    let source = read_program(program).await?;
    let func = compiler
        .compile_json(&source)
        .with_context(|| format!("Failed to compile {}", program.display()))?;

    let token = CancellationToken::new();
    let interrupt = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling the evaluation");
                token.cancel();
            }
        })
    };

    let rtx = Runtime::new(RuntimeOptions {
        config: Arc::new(config),
        zero_time: Instant::now(),
        span: tracing::info_span!("evaluation", program = %program.display()),
    });
    info!(program = %program.display(), "starting evaluation");
    let report = evaluate(func.as_ref(), &Context::with_token(token), &rtx).await;
    interrupt.abort();

    let json = report.to_json_pretty()?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }

    if let Some(reason) = &report.exception {
        bail!("program raised an exception: {reason}");
    }
    Ok(())
}

async fn check_program(program: &Path) -> Result<()> {
    let source = read_program(program).await?;
    Compiler::new()
        .compile_json(&source)
        .with_context(|| format!("Failed to compile {}", program.display()))?;
    println!("{}: ok", program.display());
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run { program, output } => {
            run_program(config, &program, output.as_deref()).await
        }
        Commands::Check { program } => check_program(&program).await,
        Commands::Templates => {
            for name in Compiler::new().template_names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Example { domain } => {
            let ast = example_program(&domain)?;
            println!("{}", serde_json::to_string_pretty(&ast)?);
            Ok(())
        }
    }
}
