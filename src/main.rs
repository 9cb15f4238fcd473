mod cli;

use convertkit::{JobController, TranscodeRequest};

use anyhow::{Context, Result};
use ck_av::{SharedEngine, ToolRegistry};
use ck_core::config::Config;
use ck_plan::{option_domains, OperationKind, OptionsBag};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "convertkit=trace,ck_av=trace,ck_plan=debug,ck_core=debug".to_string()
        } else {
            "convertkit=info,ck_av=info,ck_plan=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            operation,
            input,
            output_dir,
            options,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(
                cli.config.as_deref(),
                &operation,
                &input,
                output_dir,
                &options,
                json,
            ))
        }
        Commands::Operations => {
            list_operations();
            Ok(())
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("convertkit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let mut config = Config::load_or_default(path);
    config.apply_env();
    config
}

async fn convert(
    config_path: Option<&Path>,
    operation: &str,
    input: &Path,
    output_dir: Option<PathBuf>,
    raw_options: &[String],
    json: bool,
) -> Result<()> {
    let config = load_config(config_path);

    let mut options = OptionsBag::new();
    for pair in raw_options {
        let (key, value) = OptionsBag::parse_pair(pair)?;
        options.insert(key, value);
    }

    let source = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read input file {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = TranscodeRequest::new(source, filename, "", operation, options);

    // No engine is linked into the CLI build.
    let engine = Arc::new(SharedEngine::unavailable());
    let controller = JobController::from_config(&config, engine).build();

    let result = match controller.run(&request).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let out_path = dir.join(&result.filename);
    tokio::fs::write(&out_path, &result.bytes)
        .await
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Output: {}", out_path.display());
        println!("Type: {}", result.mime_type);
        println!(
            "Size: {} -> {} bytes ({:+.1}%)",
            result.original_size,
            result.output_size,
            result.size_change_percent()
        );
    }

    Ok(())
}

fn list_operations() {
    for kind in OperationKind::ALL {
        println!("{kind}");
        println!("  family: {}", kind.family());
        println!("  sources: {}", kind.source_extensions().join(", "));
        for (key, values) in option_domains(*kind) {
            if values.is_empty() {
                println!("  -O {key}=<time>");
            } else {
                println!("  -O {key}={}", values.join("|"));
            }
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else if config.engine.enabled {
        println!("Some tools are missing. Jobs will fall back to the embedded engine.");
    } else {
        println!("Some tools are missing and the embedded engine is disabled.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Scratch root: {}", config.scratch.root.display());
    match config.local.timeout() {
        Some(t) => println!("  Local timeout: {}s", t.as_secs()),
        None => println!("  Local timeout: none"),
    }
    println!("  Embedded engine: {}", config.engine.enabled);

    for warning in config.validate() {
        println!("  warning: {warning}");
    }

    Ok(())
}
