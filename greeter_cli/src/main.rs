use clap::{Parser, Subcommand};
use greeter_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "greeter")]
#[command(about = "Companion greeting selection engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to the XDG config path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the registry table
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Override the content table
    #[arg(long, global = true)]
    content: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a greeting for a context snapshot (default)
    Pick {
        #[command(flatten)]
        input: ContextArgs,

        /// Sampling seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draw many times and report how often each greeting wins
    Simulate {
        #[command(flatten)]
        input: ContextArgs,

        #[arg(long, default_value_t = 10_000)]
        trials: usize,

        /// Sampling seed (defaults to the configured seed, then 0)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check the registry and content tables
    Validate,

    /// Write the effective tables as TOML for editing
    Export {
        /// Destination for the registry table
        #[arg(long = "registry-out")]
        registry_out: Option<PathBuf>,

        /// Destination for the content table
        #[arg(long = "content-out")]
        content_out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Default)]
struct ContextArgs {
    /// JSON context snapshot
    #[arg(long)]
    context: Option<PathBuf>,

    /// Local time of the greeting, e.g. 2024-01-15T08:00:00 (defaults to now)
    #[arg(long)]
    at: Option<chrono::NaiveDateTime>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    greeter_core::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::debug!("Using config file {:?}", path);
            Config::load_from(path)?
        }
        None => Config::load()?,
    };
    if let Some(path) = cli.registry {
        config.registry.path = Some(path);
    }
    if let Some(path) = cli.content {
        config.content.path = Some(path);
    }

    let predicates = PredicateRegistry::with_builtins();

    match cli.command {
        Some(Commands::Pick { input, seed, json }) => {
            cmd_pick(&config, &predicates, &input, seed, json).await
        }
        Some(Commands::Simulate {
            input,
            trials,
            seed,
        }) => {
            let seed = seed.or(config.engine.seed).unwrap_or(0);
            cmd_simulate(&config, &predicates, &input, trials, seed).await
        }
        Some(Commands::Validate) => cmd_validate(&config, &predicates),
        Some(Commands::Export {
            registry_out,
            content_out,
        }) => cmd_export(&config, registry_out.as_deref(), content_out.as_deref()),
        None => {
            // Default to "pick" command
            cmd_pick(&config, &predicates, &ContextArgs::default(), None, false).await
        }
    }
}

fn build_context(input: &ContextArgs) -> Result<GreetingContext> {
    let mut ctx = match &input.context {
        Some(path) => GreetingContext::load_from(path)?,
        None => GreetingContext::default(),
    };

    if let Some(at) = input.at {
        ctx.current_time = Some(at);
    } else if ctx.current_time.is_none() {
        ctx.current_time = Some(chrono::Local::now().naive_local());
    }

    Ok(ctx)
}

async fn cmd_pick(
    config: &Config,
    predicates: &PredicateRegistry,
    input: &ContextArgs,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let engine = GreetingEngine::from_config(config, predicates)?;
    let ctx = build_context(input)?;

    let result = match seed.or(config.engine.seed) {
        Some(seed) => {
            tracing::debug!("Picking with seed {}", seed);
            engine.select_seeded(&ctx, seed).await?
        }
        None => engine.select_random(&ctx).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display_result(&result);
    }

    Ok(())
}

async fn cmd_simulate(
    config: &Config,
    predicates: &PredicateRegistry,
    input: &ContextArgs,
    trials: usize,
    seed: u64,
) -> Result<()> {
    let engine = GreetingEngine::from_config(config, predicates)?;
    let ctx = build_context(input)?;

    let simulation = engine.simulate(&ctx, trials, seed).await?;

    let mut rows: Vec<_> = simulation.counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!("{} draws (seed {})", simulation.trials, seed);
    println!();
    for (leaf, count) in rows {
        println!(
            "  {:<40} {:>8} {:>6.2}%",
            leaf,
            count,
            simulation.frequency(leaf) * 100.0
        );
    }
    if simulation.fallbacks > 0 {
        println!(
            "  {:<40} {:>8} {:>6.2}%",
            "(fallback)",
            simulation.fallbacks,
            simulation.fallbacks as f64 * 100.0 / simulation.trials.max(1) as f64
        );
    }

    Ok(())
}

fn cmd_validate(config: &Config, predicates: &PredicateRegistry) -> Result<()> {
    let registry = config.registry_table()?;
    let content = config.content_table()?;

    let errors = registry.validate(predicates);
    if !errors.is_empty() {
        eprintln!("Registry validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::RegistryValidation(format!(
            "{} problem(s) in registry table",
            errors.len()
        )));
    }

    if registry.categories.is_empty() {
        eprintln!("Registry has no categories; every selection would fail.");
        return Err(Error::EmptyRegistry);
    }

    for leaf in content.unmapped_leaves(&registry) {
        println!("  ! {} has no content mapping (uses default)", leaf);
    }
    for key in content.orphan_entries(&registry) {
        println!("  ! content entry {} matches no greeting", key);
    }

    println!(
        "✓ Registry OK: {} categories, {} greetings",
        registry.categories.len(),
        registry.leaves().len()
    );
    Ok(())
}

fn cmd_export(config: &Config, registry_out: Option<&Path>, content_out: Option<&Path>) -> Result<()> {
    if registry_out.is_none() && content_out.is_none() {
        print!("{}", config.registry_table()?.to_toml_string()?);
        return Ok(());
    }

    if let Some(path) = registry_out {
        config.registry_table()?.save_to(path)?;
        println!("✓ Wrote registry table to {}", path.display());
    }
    if let Some(path) = content_out {
        config.content_table()?.save_to(path)?;
        println!("✓ Wrote content table to {}", path.display());
    }

    Ok(())
}

fn display_result(result: &SelectionResult) {
    println!();
    if result.fallback {
        println!("  Greeting: (fallback)");
    } else {
        println!("  Greeting: {}", result.leaf());
    }
    println!("  Content:  {}", result.content_key);
    println!("  Visual:   {}", result.visual_variant_key);
    println!();
}
