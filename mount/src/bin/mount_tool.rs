//! Operator console for the alt/az mount.
//!
//! One-shot subcommands cover scripted use; `console` opens the interactive
//! session used at the telescope:
//! - `goto`: resolve a target and slew to it
//! - `track`: follow a target until Enter is pressed
//! - `scan`: raster-scan around the current pointing
//! - `home`: drive both axes back to zero
//! - `align`: seed pointing from the inertial sensor
//! - `bodies`: list the catalog
//! - `console`: menu-driven session with jog mode

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use strum::IntoEnumIterator;
use tracing::info;

use ephemeris::stellarium::DEFAULT_STELLARIUM_URL;
use ephemeris::{Body, StellariumProvider};
use mount::scan::ScanConfig;
use mount::tracking::TrackConfig;
use mount::{
    transport, CancelToken, HorizontalCoordinates, JogDirection, JogSpeed, MountError,
    PointingEngine, ScanOutcome, SerialTransport, TargetOutcome,
};

/// Serial device the motion controller usually enumerates as.
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

const HISTORY_PATH: &str = "/tmp/mount_tool_history";

#[derive(Parser, Debug)]
#[command(name = "mount_tool")]
#[command(about = "Operator console for the alt/az telescope mount")]
#[command(version)]
struct Args {
    #[command(flatten)]
    connection: MountArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection parameters for the mount and its position source.
#[derive(clap::Args, Debug, Clone)]
struct MountArgs {
    /// Serial port of the motion controller
    #[arg(long, global = true, default_value = DEFAULT_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(long, global = true, default_value_t = transport::BAUD_RATE)]
    baud: u32,

    /// Base URL of the Stellarium remote-control API
    #[arg(long, global = true, default_value = DEFAULT_STELLARIUM_URL)]
    stellarium: String,

    /// Mount attitude at startup, as `ALT,AZ` degrees
    #[arg(long, global = true, default_value = "0,0", value_parser = parse_attitude)]
    reference: HorizontalCoordinates,
}

impl MountArgs {
    /// Open the serial link and run the startup sequence.
    fn connect(&self) -> Result<PointingEngine<SerialTransport>> {
        info!("connecting to mount on {} at {} baud", self.port, self.baud);
        let transport = SerialTransport::open(&self.port, self.baud)
            .with_context(|| format!("failed to open mount controller on {}", self.port))?;
        PointingEngine::initialize(transport, self.reference)
            .context("mount startup sequence failed")
    }

    fn provider(&self) -> StellariumProvider {
        StellariumProvider::new(&self.stellarium)
    }
}

fn parse_attitude(s: &str) -> std::result::Result<HorizontalCoordinates, String> {
    let (alt, az) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ALT,AZ degrees, got {s:?}"))?;
    let altitude = alt
        .trim()
        .parse()
        .map_err(|_| format!("bad altitude {alt:?}"))?;
    let azimuth = az
        .trim()
        .parse()
        .map_err(|_| format!("bad azimuth {az:?}"))?;
    Ok(HorizontalCoordinates::new(altitude, azimuth))
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive operator console
    Console,

    /// Resolve a target and slew to it
    Goto {
        /// Catalog body or free-form object name
        target: String,
    },

    /// Follow a target until Enter is pressed
    Track {
        /// Catalog body or free-form object name
        target: String,

        /// Seconds between re-points
        #[arg(long, default_value_t = 10)]
        cadence: u64,
    },

    /// Raster-scan around the current pointing
    Scan {
        /// Cells per side (odd, 3 to 99)
        #[arg(short, long, default_value_t = 5)]
        matrix: usize,

        /// Degrees between adjacent cells (0 to 5, exclusive)
        #[arg(short, long, default_value_t = 0.021)]
        step: f64,
    },

    /// Drive both axes back to the zero reference
    Home,

    /// Seed pointing from one averaged inertial-sensor sample
    Align,

    /// List the catalog bodies
    Bodies,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Bodies => {
            for body in Body::iter() {
                println!("{body}");
            }
            Ok(())
        }
        Command::Console => {
            let mut engine = args.connection.connect()?;
            let provider = args.connection.provider();
            run_console(&mut engine, &provider)
        }
        Command::Goto { ref target } => {
            let mut engine = args.connection.connect()?;
            let provider = args.connection.provider();
            let outcome = engine.goto_target(&provider, target)?;
            print_target_outcome(target, &outcome);
            Ok(())
        }
        Command::Track { ref target, cadence } => {
            let mut engine = args.connection.connect()?;
            let provider = args.connection.provider();
            cmd_track(&mut engine, &provider, target, Duration::from_secs(cadence))
        }
        Command::Scan { matrix, step } => {
            let mut engine = args.connection.connect()?;
            let config = ScanConfig::new(matrix, step);
            config.validate()?;
            cmd_scan(&mut engine, config)
        }
        Command::Home => {
            let mut engine = args.connection.connect()?;
            engine.home()?;
            println!("Mount homed");
            Ok(())
        }
        Command::Align => {
            let mut engine = args.connection.connect()?;
            cmd_align(&mut engine)
        }
    }
}

// ==================== Session Commands ====================

/// Run a cancellable session on a worker thread while this thread waits for
/// the operator's Enter. The worker may finish on its own; Enter is still
/// what hands the console back.
fn run_session<T, F>(prompt: &str, session: F) -> Result<T>
where
    T: Send,
    F: FnOnce(&CancelToken) -> std::result::Result<T, MountError> + Send,
{
    let token = CancelToken::new();
    thread::scope(|scope| {
        let worker = {
            let token = token.clone();
            scope.spawn(move || session(&token))
        };

        println!("{prompt}");
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        token.cancel();

        match worker.join() {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(_) => bail!("session worker panicked"),
        }
    })
}

fn cmd_track(
    engine: &mut PointingEngine<SerialTransport>,
    provider: &StellariumProvider,
    target: &str,
    cadence: Duration,
) -> Result<()> {
    let config = TrackConfig { cadence };
    let tally = run_session(
        &format!("Tracking {target} (press Enter to stop)"),
        |token| engine.run_tracking(provider, target, &config, token),
    )?;
    println!(
        "Tracking stopped: {} re-points, {} held cycles",
        tally.moves_issued, tally.cycles_skipped
    );
    Ok(())
}

fn cmd_scan(engine: &mut PointingEngine<SerialTransport>, config: ScanConfig) -> Result<()> {
    let outcome = run_session(
        &format!(
            "Scanning a {n}x{n} grid at {:.3}° pitch (press Enter to stop)",
            config.step_deg,
            n = config.matrix_size
        ),
        |token| engine.run_scan(&config, token),
    )?;
    match outcome {
        ScanOutcome::Completed { cells_visited } => {
            println!("Scan complete: {cells_visited} cells, returned to start");
        }
        ScanOutcome::Cancelled { cells_visited } => {
            println!("Scan stopped after {cells_visited} cells; holding position");
        }
    }
    Ok(())
}

fn cmd_align(engine: &mut PointingEngine<SerialTransport>) -> Result<()> {
    println!("Reading averaged inertial sample...");
    let sample = engine.align_from_sensor()?;
    println!(
        "Aligned to alt {:.3}°, az {:.3}° (yaw {:.3}°, {} sensor comm errors)",
        sample.altitude_deg, sample.azimuth_deg, sample.yaw_deg, sample.comm_errors
    );
    Ok(())
}

fn print_target_outcome(name: &str, outcome: &TargetOutcome) {
    match outcome {
        TargetOutcome::Acquired {
            commanded,
            move_outcome,
        } => {
            if move_outcome.was_rejected() {
                println!("{name} is past the altitude ceiling; move dropped");
            } else {
                println!("Slewing to {name} at {commanded}");
            }
        }
        TargetOutcome::BelowHorizon { altitude_deg } => {
            println!("Sorry, {name} is not currently visible (altitude {altitude_deg:.2}°)");
        }
    }
}

// ==================== Console ====================

const CONSOLE_HELP: &str = "\
  g <target>    go to a catalog body or named object
  t [target]    track the selection (or the named object)
  a             raster-scan around the current pointing
  j             jog with the arrow keys
  c             fold jog corrections into the calibration offsets
  h             re-center both axes
  i             seed pointing from the inertial sensor
  f / s         fast / slow joystick speed
  m / n         mirror mode on / off
  js on|off     joystick input on / off
  p             pointing, offsets and modes
  b             list catalog bodies
  ?             this help
  q             quit";

fn run_console(
    engine: &mut PointingEngine<SerialTransport>,
    provider: &StellariumProvider,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_PATH);
    let mut selection: Option<String> = None;

    println!("Mount console, '?' lists commands.");
    loop {
        match rl.readline("mount> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let mut parts = line.splitn(2, char::is_whitespace);
                let verb = parts.next().unwrap_or("");
                let rest = parts.next().map(str::trim).unwrap_or("");

                if matches!(verb, "q" | "quit" | "exit") {
                    break;
                }
                let result = dispatch(engine, provider, &mut rl, &mut selection, verb, rest);
                if let Err(err) = result {
                    println!("Error: {err:#}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {err}");
                break;
            }
        }
    }
    let _ = rl.save_history(HISTORY_PATH);
    Ok(())
}

fn dispatch(
    engine: &mut PointingEngine<SerialTransport>,
    provider: &StellariumProvider,
    rl: &mut DefaultEditor,
    selection: &mut Option<String>,
    verb: &str,
    rest: &str,
) -> Result<()> {
    match verb {
        "?" | "help" => {
            println!("{CONSOLE_HELP}");
            Ok(())
        }
        "g" | "goto" => console_goto(engine, provider, rest, selection),
        "t" | "track" => {
            let target = if rest.is_empty() {
                match selection.as_deref() {
                    Some(name) => name.to_string(),
                    None => {
                        println!("No selection; go to a target first (g <name>)");
                        return Ok(());
                    }
                }
            } else {
                rest.to_string()
            };
            cmd_track(engine, provider, &target, TrackConfig::default().cadence)
        }
        "a" | "scan" => console_scan(engine, rl),
        "j" | "jog" => console_jog(engine),
        "c" | "cal" => {
            let offsets = engine.calibrate();
            println!(
                "Offsets now alt {:+.4}°, az {:+.4}°",
                offsets.altitude_deg, offsets.azimuth_deg
            );
            Ok(())
        }
        "h" | "home" => {
            engine.home()?;
            println!("Mount homed");
            Ok(())
        }
        "i" | "align" => cmd_align(engine),
        "f" | "fast" => {
            engine.set_jog_speed(JogSpeed::Fast)?;
            println!("Joystick speed fast");
            Ok(())
        }
        "s" | "slow" => {
            engine.set_jog_speed(JogSpeed::Slow)?;
            println!("Joystick speed slow");
            Ok(())
        }
        "m" | "mirror" => {
            engine.set_mirror(true)?;
            println!("Mirror mode on");
            Ok(())
        }
        "n" | "normal" => {
            engine.set_mirror(false)?;
            println!("Mirror mode off");
            Ok(())
        }
        "js" => match rest {
            "on" => {
                engine.set_joystick(true)?;
                println!("Joystick enabled");
                Ok(())
            }
            "off" => {
                engine.set_joystick(false)?;
                println!("Joystick disabled");
                Ok(())
            }
            _ => {
                println!("Usage: js on|off");
                Ok(())
            }
        },
        "p" | "status" => {
            print_status(engine, provider, selection);
            Ok(())
        }
        "b" | "bodies" => {
            for body in Body::iter() {
                println!("  {body}");
            }
            Ok(())
        }
        other => {
            println!("Unknown command {other:?} ('?' for help)");
            Ok(())
        }
    }
}

fn console_goto(
    engine: &mut PointingEngine<SerialTransport>,
    provider: &StellariumProvider,
    rest: &str,
    selection: &mut Option<String>,
) -> Result<()> {
    if rest.is_empty() {
        println!("Catalog:");
        for body in Body::iter() {
            println!("  {body}");
        }
        println!("Usage: g <target>");
        return Ok(());
    }
    let outcome = engine.goto_target(provider, rest)?;
    print_target_outcome(rest, &outcome);
    if let TargetOutcome::Acquired { .. } = outcome {
        *selection = Some(rest.to_string());
    }
    Ok(())
}

fn console_scan(engine: &mut PointingEngine<SerialTransport>, rl: &mut DefaultEditor) -> Result<()> {
    let config = loop {
        let Some(matrix) = prompt_parse(rl, "matrix size (odd, 3-99) [5]: ", 5usize)? else {
            println!("Scan abandoned");
            return Ok(());
        };
        let Some(step) = prompt_parse(rl, "step size degrees (0-5) [0.021]: ", 0.021f64)? else {
            println!("Scan abandoned");
            return Ok(());
        };
        let config = ScanConfig::new(matrix, step);
        match config.validate() {
            Ok(()) => break config,
            Err(err) => println!("{err}"),
        }
    };
    cmd_scan(engine, config)
}

/// Prompt until a value parses; empty input takes the default, Ctrl-C or
/// Ctrl-D abandons with `None`.
fn prompt_parse<V>(rl: &mut DefaultEditor, prompt: &str, default: V) -> Result<Option<V>>
where
    V: std::str::FromStr + Copy,
{
    loop {
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(Some(default));
        }
        match line.parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => println!("Could not parse {line:?}, try again"),
        }
    }
}

fn print_status(
    engine: &PointingEngine<SerialTransport>,
    provider: &StellariumProvider,
    selection: &Option<String>,
) {
    let pointing = engine.pointing();
    let offsets = engine.offsets();
    let site = provider.site();
    println!("Pointing      {pointing}");
    println!(
        "Offsets       alt {:+.4}°, az {:+.4}°",
        offsets.altitude_deg, offsets.azimuth_deg
    );
    println!("Last command  {}", engine.last_commanded());
    println!(
        "Jog           {:?} speed, step {:.3}°, mirror {}",
        engine.jog_speed(),
        engine.jog_step_deg(),
        if engine.mirror() { "on" } else { "off" }
    );
    println!("Target        {}", selection.as_deref().unwrap_or("none"));
    println!(
        "Site          lat {:.7}°, lon {:.7}°",
        site.latitude_deg, site.longitude_deg
    );
}

// ==================== Jog Mode ====================

fn console_jog(engine: &mut PointingEngine<SerialTransport>) -> Result<()> {
    println!("Arrow keys jog, 's' cycles the step size, 'q' leaves jog mode.");
    set_raw_mode()?;
    let result = jog_loop(engine);
    restore_terminal();
    println!();
    result
}

fn jog_loop(engine: &mut PointingEngine<SerialTransport>) -> Result<()> {
    const STEP_SIZES: [f64; 5] = [0.01, 0.05, 0.1, 0.5, 1.0];

    let mut stdin = io::stdin();
    loop {
        let pointing = engine.pointing();
        print!(
            "\rPointing alt {:9.4}°, az {:9.4}°  (step {:.3}°)   ",
            pointing.altitude_deg,
            pointing.azimuth_deg,
            engine.jog_step_deg()
        );
        io::stdout().flush()?;

        let mut buf = [0u8; 3];
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            break;
        }
        match &buf[..n] {
            [27, 91, 65] => {
                engine.jog(JogDirection::Up)?;
            }
            [27, 91, 66] => {
                engine.jog(JogDirection::Down)?;
            }
            [27, 91, 67] => {
                engine.jog(JogDirection::Right)?;
            }
            [27, 91, 68] => {
                engine.jog(JogDirection::Left)?;
            }
            [b's'] => {
                let step = engine.jog_step_deg();
                let next = STEP_SIZES
                    .iter()
                    .position(|s| (s - step).abs() < 1e-9)
                    .map(|i| STEP_SIZES[(i + 1) % STEP_SIZES.len()])
                    .unwrap_or(STEP_SIZES[0]);
                engine.set_jog_step(next);
            }
            // 'q', bare Escape, or Ctrl-C in raw mode
            [b'q'] | [27] | [3] => break,
            _ => {}
        }
    }
    Ok(())
}

fn set_raw_mode() -> Result<()> {
    let status = std::process::Command::new("stty")
        .arg("raw")
        .arg("-echo")
        .stdin(std::process::Stdio::inherit())
        .status()
        .context("failed to run stty")?;
    if !status.success() {
        bail!("could not put the terminal in raw mode");
    }
    Ok(())
}

fn restore_terminal() {
    let _ = std::process::Command::new("stty")
        .arg("sane")
        .stdin(std::process::Stdio::inherit())
        .status();
}
