use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info, warn};
use rppal::gpio::Gpio;

use goal_gimbal::bus::I2cBus;
use goal_gimbal::config::{Config, TriggerSection};
use goal_gimbal::gpio_input::{GpioLine, TriggerLine};
use goal_gimbal::gpio_output::GpioOutput;
use goal_gimbal::{Alarm, Controls, Gimbal, Goal, GoalWatcher, Pca9685, TiltOutcome, pca9685};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Goal-lock servo gimbal controller", long_about = None)]
struct Args {
    /// Configuration file (TOML); built-in defaults if it does not exist
    #[arg(short, long, default_value = "goal-gimbal.toml")]
    config: PathBuf,

    /// No operator console, only watch for goals and log status
    #[arg(long, default_value_t = false)]
    headless: bool,
}

// Usage (console):
//  tilt 0.4 -1   → move the gimbal, refused while a goal is latched
//  center        → re-center, clear the win, silence LED/buzzer
//  reset         → clear the goal and re-center
//  status        → goal / alert / last ticks
//  pwm 50        → reprogram the PWM frequency
//  quit
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let bus = I2cBus::open(config.pwm.bus, config.pwm.address).context("opening PCA9685")?;
    let driver = Pca9685::new(bus).into_shared();
    pca9685::configure_pwm(&driver, config.pwm.frequency_hz).context("setting PWM frequency")?;

    let (x, y) = config.axes()?;
    let gimbal = Arc::new(Gimbal::new(driver, x, y)?);
    let (x_tick, y_tick) = gimbal.center().context("centering gimbal")?;
    info!("gimbal centered X={} Y={}", x_tick, y_tick);

    let gpio = Gpio::new().context("opening GPIO")?;
    let mut alarm = Alarm::new(GpioOutput::open(&gpio, config.alert.buzzer_pin)?);
    if let Some(pin) = config.alert.led_pin {
        alarm = alarm.with_led(GpioOutput::open(&gpio, pin)?);
    }
    let alarm = Arc::new(alarm);
    let goal = Arc::new(Goal::new());

    let mut controls = Controls::new(
        Arc::clone(&gimbal),
        Arc::clone(&goal),
        Arc::clone(&alarm),
        config.alert.celebration,
    );
    if let Some(win) = &config.win {
        controls = controls.with_win_sensor(open_trigger(&gpio, win, &config)?);
    }

    let trigger = open_trigger(&gpio, &config.goal, &config)?;
    let watcher = GoalWatcher::new(
        trigger,
        config.watcher_timing(),
        config.alert.goal,
        goal,
        gimbal,
        alarm,
    )
    .spawn()
    .context("starting goal watcher")?;

    if args.headless {
        loop {
            thread::sleep(STATUS_INTERVAL);
            if !watcher.is_running() {
                bail!("goal watcher exited");
            }
            let status = controls.status();
            info!(
                "[status] goal={} won={} ticks={:?}",
                status.goal.triggered, status.won, status.last_ticks
            );
        }
    }

    console(&controls)?;

    info!("shutting down");
    if watcher.stop().is_err() {
        error!("goal watcher panicked");
    }
    Ok(())
}

fn open_trigger(gpio: &Gpio, section: &TriggerSection, config: &Config) -> Result<TriggerLine> {
    let line = GpioLine::open(gpio, section.pin, section.pull)
        .with_context(|| format!("opening {} on GPIO {}", section.sensor, section.pin))?;
    Ok(TriggerLine::with_setting(
        line,
        section.polarity,
        section.sensor,
        config.polarity_probe(),
        config.poll_interval(),
    ))
}

/// Read commands from stdin until `quit` or EOF.
fn console(controls: &Controls) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Commands: tilt X Y | center | reset | status | pwm HZ | quit");

    for line in stdin.lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => {}
            ["tilt", x, y] => match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => match controls.tilt(x, y) {
                    Ok(TiltOutcome::Locked) => println!("locked: goal scored, reset first"),
                    Ok(TiltOutcome::Moved {
                        x_tick,
                        y_tick,
                        sensor_active,
                        won,
                    }) => println!("X={x_tick} Y={y_tick} sensor={sensor_active} won={won}"),
                    Err(e) => error!("tilt failed: {}", e),
                },
                _ => warn!("tilt expects two numbers in [-1, 1]"),
            },
            ["center"] => match controls.center() {
                Ok((x, y)) => println!("centered X={x} Y={y}"),
                Err(e) => error!("center failed: {}", e),
            },
            ["reset"] => {
                controls.reset_goal();
                println!("goal cleared");
            }
            ["status"] => {
                let status = controls.status();
                let at = status
                    .goal
                    .triggered_at_unix()
                    .map_or_else(|| "-".to_string(), |t| format!("{t:.3}"));
                println!(
                    "goal={} at={} alert={} won={} ticks={:?}",
                    status.goal.triggered, at, status.alert.active, status.won, status.last_ticks
                );
            }
            ["pwm", hz] => match hz.parse::<f64>() {
                Ok(hz) => match controls.configure_pwm(hz) {
                    Ok(()) => println!("PWM at {hz} Hz"),
                    Err(e) => error!("configure failed: {}", e),
                },
                Err(_) => warn!("pwm expects a frequency in Hz"),
            },
            ["quit"] | ["exit"] => break,
            _ => warn!("unknown command: {}", line.trim()),
        }
        stdout.flush()?;
    }
    Ok(())
}
