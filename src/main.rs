use anyhow::Context;
use clap::{Parser, Subcommand};
use gantrykit::{
    init_logging, install_interrupt_handler, list_ports, CancelToken, Gantry, GcodeWriter,
    MachineConfig, SystemClock, SystemPortDirectory, Toolpath,
};
use gantrykit_gcode::DEFAULT_FEED;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Two-axis gantry controller
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")")
)]
struct Args {
    /// Machine configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// enable debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports and their hardware IDs
    Ports,
    /// Connect and home both axes
    Home,
    /// Home, then replay a g-code program
    Run {
        /// Program to replay
        gcode: PathBuf,
        /// Ask before each run and offer to repeat
        #[arg(short, long)]
        interactive: bool,
        /// Skip homing
        #[arg(long)]
        no_home: bool,
    },
    /// Bench cycle: drive X out with the tool off and back with it on
    Cycle {
        /// Number of out-and-back cycles
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Travel in millimetres
        #[arg(long, default_value_t = 50.0)]
        distance: f64,
        /// Pause after each move in milliseconds
        #[arg(long, default_value_t = 1000)]
        dwell_ms: u64,
    },
    /// Write g-code from a JSON list of contours ([[[x, y], ...], ...])
    Emit {
        toolpaths: PathBuf,
        output: PathBuf,
        /// Feed rate for linear moves
        #[arg(long, default_value_t = DEFAULT_FEED)]
        feed: u32,
    },
    /// Write the default machine configuration
    InitConfig { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    match args.command {
        Command::Ports => print_ports(),
        Command::Home => {
            let config = load_config(args.config.as_deref())?;
            with_gantry(&config, |gantry| Ok(gantry.home_all()?))
        }
        Command::Run {
            gcode,
            interactive,
            no_home,
        } => {
            let config = load_config(args.config.as_deref())?;
            with_gantry(&config, |gantry| {
                if !no_home {
                    gantry.home_all()?;
                }
                if interactive {
                    run_interactive(gantry, &gcode)
                } else {
                    report(gantry.run_gcode(&gcode)?);
                    Ok(())
                }
            })
        }
        Command::Cycle {
            count,
            distance,
            dwell_ms,
        } => {
            let config = load_config(args.config.as_deref())?;
            with_gantry(&config, |gantry| {
                Ok(gantry.cycle(count, distance, Duration::from_millis(dwell_ms))?)
            })
        }
        Command::Emit {
            toolpaths,
            output,
            feed,
        } => emit(&toolpaths, &output, feed),
        Command::InitConfig { path } => {
            MachineConfig::new().save_to_file(&path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MachineConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match MachineConfig::default_path() {
            Ok(path) if path.exists() => path,
            _ => {
                tracing::info!("No configuration file; using stock defaults");
                return Ok(MachineConfig::new());
            }
        },
    };

    MachineConfig::load_from_file(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

/// Connect with an interrupt handler armed, run `f`, then shut down
fn with_gantry(
    config: &MachineConfig,
    f: impl FnOnce(&mut Gantry) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;
    gantrykit::with_gantry(
        &SystemPortDirectory,
        config,
        SystemClock::shared(),
        cancel,
        f,
    )
}

fn run_interactive(gantry: &mut Gantry, gcode: &Path) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let Some(answer) = prompt(&mut lines, "spray? [y/N] ")? else {
            return Ok(());
        };
        if answer.eq_ignore_ascii_case("y") {
            report(gantry.run_gcode(gcode)?);
        }

        let Some(answer) = prompt(&mut lines, "again? [Y/n] ")? else {
            return Ok(());
        };
        if answer.eq_ignore_ascii_case("n") {
            return Ok(());
        }
    }
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    question: &str,
) -> anyhow::Result<Option<String>> {
    print!("{}", question);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

fn report(summary: gantrykit::ReplaySummary) {
    println!(
        "{} moves, {} tool on, {} tool off, {} lines skipped",
        summary.moves, summary.tool_on, summary.tool_off, summary.skipped
    );
}

fn print_ports() -> anyhow::Result<()> {
    for (port, hardware_id) in list_ports(&SystemPortDirectory)? {
        println!("{}: {} [{}]", port.port_name, port.description, hardware_id);
    }
    Ok(())
}

fn emit(toolpaths: &Path, output: &Path, feed: u32) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(toolpaths)
        .with_context(|| format!("reading {}", toolpaths.display()))?;
    let contours: Vec<Toolpath> = serde_json::from_str(&text)
        .with_context(|| format!("parsing contours from {}", toolpaths.display()))?;

    let mut writer = GcodeWriter::new();
    writer.add_toolpaths(&contours, feed);
    writer.save(output)?;
    Ok(())
}
