use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::future::FutureExt;

use walkthrough::core::geometry::Rect;
use walkthrough::core::logging::{self, LogFormat};
use walkthrough::core::orchestrator::module_from_json;
use walkthrough::{
    Host, MemoryStore, MemorySurface, RegisteredTour, RouteMode, RouteTours, TourLoader,
    TourOrchestrator, WalkthroughConfig,
};

/// Upper bound on simulated "next" presses, for tours that ignore the keyboard.
const MAX_SIMULATED_PRESSES: usize = 1_000;

/// Walkthrough - check and rehearse tour definitions without a browser
#[derive(Parser)]
#[command(name = "walkthrough")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = "walkthrough.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a tour file and list its tours
    Validate {
        /// JSON file: an array of tours, or an object with a `tours` export
        tours: PathBuf,
    },
    /// Show which tours would start on a path, in start order
    Match {
        tours: PathBuf,
        pathname: String,
    },
    /// Run the tours for a path on a headless document and print the
    /// recorded events
    Simulate {
        tours: PathBuf,
        pathname: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init("walkthrough=info", format);
    log::info!("{} v{} starting", walkthrough::NAME, walkthrough::VERSION);

    let config = WalkthroughConfig::load_or_default(&cli.config);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Validate { tours } => validate(&config, &tours).await,
            Commands::Match { tours, pathname } => match_path(&config, &tours, &pathname).await,
            Commands::Simulate { tours, pathname } => simulate(&config, &tours, &pathname).await,
        }
    })
}

/// Loader reading tour modules from JSON files on disk.
fn file_loader() -> TourLoader {
    Rc::new(|specifier: &str| {
        let path = specifier.to_string();
        async move {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {path}"))?;
            let value: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("{path} is not valid JSON"))?;
            Ok::<_, anyhow::Error>(module_from_json(value))
        }
        .boxed_local()
    })
}

/// Headless host where every step selector of `tours` resolves.
fn rehearsal_host(config: &WalkthroughConfig, tours: &[RegisteredTour]) -> (Host, Rc<MemorySurface>) {
    let surface = Rc::new(MemorySurface::new());
    let mut y = 16.0;
    for step in tours.iter().flat_map(|tour| tour.steps.iter()) {
        if surface.element(&step.selector).is_none() {
            surface.add_element(&step.selector, Rect::new(32.0, y, 160.0, 32.0));
            y += 64.0;
        }
    }
    let host = Host::new(
        surface.clone(),
        Rc::new(MemoryStore::new()),
        Rc::new(MemoryStore::new()),
    )
    .with_debug(config.debug_recorder());
    (host, surface)
}

async fn load(host: Host, path: &Path) -> anyhow::Result<TourOrchestrator> {
    let orchestrator = TourOrchestrator::new(host);
    let specifier = path.to_string_lossy();
    let found = orchestrator.load_tours(&file_loader(), &specifier).await?;
    if found.is_none() {
        anyhow::bail!("{specifier} exports no tours");
    }
    Ok(orchestrator)
}

async fn validate(config: &WalkthroughConfig, path: &Path) -> anyhow::Result<()> {
    let (host, _) = rehearsal_host(config, &[]);
    let orchestrator = load(host, path).await?;
    for tour in orchestrator.list_tours() {
        println!(
            "{:<24} {:>3} steps  trigger={:?} order={}",
            tour.id,
            tour.steps.len(),
            tour.trigger,
            tour.order
        );
    }
    Ok(())
}

async fn match_path(config: &WalkthroughConfig, path: &Path, pathname: &str) -> anyhow::Result<()> {
    let (host, _) = rehearsal_host(config, &[]);
    let orchestrator = load(host, path).await?;
    let mut eligible = orchestrator.eligible_tours(pathname).await;
    if config.route.mode == RouteMode::Chained {
        eligible.sort_by_key(|tour| tour.order);
    }
    if config.route.mode == RouteMode::FirstOnly {
        eligible.truncate(1);
    }
    if eligible.is_empty() {
        println!("no tours match {pathname}");
    }
    for tour in eligible {
        println!("{}", tour.id);
    }
    Ok(())
}

async fn simulate(config: &WalkthroughConfig, path: &Path, pathname: &str) -> anyhow::Result<()> {
    let (scratch, _) = rehearsal_host(config, &[]);
    let tours = load(scratch, path).await?.list_tours();

    let (host, surface) = rehearsal_host(config, &tours);
    let recorder = host.debug.clone();
    recorder.enable();
    let orchestrator = TourOrchestrator::new(host);
    orchestrator.register_tours(tours.into_iter().map(|tour| {
        let options = tour.options.clone().layered_over(&config.options);
        tour.with_options(options)
    }));

    let routes = RouteTours::new(orchestrator, config.route.mode);
    let started = routes.navigate(pathname).await;
    surface.flush().await;
    log::info!("Started {} tour(s): {:?}", started.len(), started);

    let mut presses = 0;
    while surface.active_overlay().is_some() {
        if presses == MAX_SIMULATED_PRESSES {
            log::warn!("Tours still running after {presses} key presses; stopping");
            routes.dispose();
            break;
        }
        surface.press("ArrowRight");
        surface.flush().await;
        presses += 1;
    }

    let snapshot = recorder.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
