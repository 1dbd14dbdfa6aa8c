use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solitaire_autoplay::{
    action::format_moves,
    autoplay::{EnigoActuator, tap},
    config::Config,
    game::{Game, RunSummary, perceive_board},
    logging::init_logging,
    vision::{
        NormalizedCorrelation, ScreenPerception, ScreenshotCapture, Templates, shared_classifier,
    },
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// YAML file overriding the default screen layout and timings
    #[arg(long, value_name = "FILE", global = true)]
    layout: Option<PathBuf>,
    /// Directory holding `templates/` and `samples/`
    #[arg(long, value_name = "DIR", default_value = "assets", global = true)]
    assets: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the board from the screen and print it
    Inspect,
    /// Play the game on screen until no further progress is possible
    Play {
        /// Max outer passes through the planner
        #[arg(long, default_value_t = 20, value_name = "NUM")]
        iterations: usize,
        /// Deal a new game before playing
        #[arg(long)]
        new_deal: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.layout.as_deref()).context("Failed to load layout")?;
    let perception = screen_perception(&cli.assets, &config)?;

    match &cli.command {
        Commands::Inspect => {
            let mut perception = perception;
            let board = perceive_board(&mut perception, &config)?;
            println!("{}", board.pretty_print());
        }
        Commands::Play {
            iterations,
            new_deal,
        } => {
            let mut actuator = EnigoActuator::new(config.timing.drag_leg())?;
            if *new_deal {
                tap(&mut actuator, config.new_deal_key, config.timing.click_hold())?;
                std::thread::sleep(Duration::from_millis(config.timing.new_deal_ms));
            }
            let start = Instant::now();
            let mut game = Game::new(perception, actuator, config)?;
            let state = game.board().pretty_print();
            let RunSummary { passes, total, won } = game.run(*iterations)?;
            let elapsed = format_elapsed(start.elapsed());
            let verdict = if won { "Won the game" } else { "Stopped" };
            println!(
                r#"✓ {verdict}. Passes: {passes}, Foundations: {}, Reveals: {}, Moves: {}, Draws: {}, Elapsed: {elapsed}

===== STATE =====
{state}
===== STEPS =====
{}"#,
                total.foundations,
                total.reveals,
                total.tableau_moves,
                total.draws,
                format_moves(game.history())
            );
        }
    }

    Ok(())
}

fn screen_perception(
    assets: &Path,
    config: &Config,
) -> Result<ScreenPerception<ScreenshotCapture, NormalizedCorrelation>> {
    let templates = Templates::load(&assets.join("templates"))?;
    let classifier = shared_classifier(&assets.join("samples"))?;
    let capture = ScreenshotCapture::primary()?;
    Ok(ScreenPerception::new(
        capture,
        NormalizedCorrelation,
        templates,
        classifier,
        config.clone(),
    ))
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 90 {
        let ms = elapsed.subsec_millis();
        format!("{secs}.{ms:03}s")
    } else {
        let minutes = secs / 60;
        let secs = secs % 60;
        format!("{minutes}m {secs}s")
    }
}
