use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use goal_gimbal::Config;
use goal_gimbal::bus::I2cBus;
use goal_gimbal::pca9685::{self, Pca9685};

/// Hard limits while calibrating, whatever the config says.
const TICK_FLOOR: u16 = 100;
const TICK_CEILING: u16 = 650;
const STEP_SMALL: i32 = 2;
const STEP_BIG: i32 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find servo endpoints for the gimbal", long_about = None)]
struct Args {
    /// Configuration file (TOML) holding the channels and current endpoints
    #[arg(short, long, default_value = "goal-gimbal.toml")]
    config: PathBuf,
}

fn clamp_tick(tick: i32) -> u16 {
    tick.clamp(i32::from(TICK_FLOOR), i32::from(TICK_CEILING)) as u16
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let (x_axis, y_axis) = (config.gimbal.x, config.gimbal.y);

    let bus = I2cBus::open(config.pwm.bus, config.pwm.address).context("opening PCA9685")?;
    let driver = Pca9685::new(bus).into_shared();
    pca9685::configure_pwm(&driver, config.pwm.frequency_hz)?;

    let midpoint_x = (x_axis.min + x_axis.max) / 2;
    let midpoint_y = (y_axis.min + y_axis.max) / 2;
    let (mut x, mut y) = (midpoint_x, midpoint_y);

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     Servo Endpoint Calibration (PCA9685)             ║");
    println!("╚══════════════════════════════════════════════════════╝\n");
    println!("Keys (then Enter):");
    println!("  a/d : X -/+  (small)     A/D : X -/+  (big)");
    println!("  w/s : Y +/-  (small)     W/S : Y +/-  (big)");
    println!("  c   : center both        q   : quit and print");
    println!("\nStart at CENTER. Adjust until the tilt looks right and the servo is not straining.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        {
            let mut pca = pca9685::lock(&driver);
            pca.set_channel_off(x_axis.channel, x)?;
            pca.set_channel_off(y_axis.channel, y)?;
        }

        print!("X(ch{})={:4}  Y(ch{})={:4} > ", x_axis.channel, x, y_axis.channel, y);
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        // several keys on one line are applied in order
        let mut quit = false;
        for key in line.trim().chars() {
            let (dx, dy) = match key {
                'a' => (-STEP_SMALL, 0),
                'd' => (STEP_SMALL, 0),
                'A' => (-STEP_BIG, 0),
                'D' => (STEP_BIG, 0),
                'w' => (0, STEP_SMALL),
                's' => (0, -STEP_SMALL),
                'W' => (0, STEP_BIG),
                'S' => (0, -STEP_BIG),
                'c' => {
                    x = midpoint_x;
                    y = midpoint_y;
                    (0, 0)
                }
                'q' => {
                    quit = true;
                    break;
                }
                _ => (0, 0),
            };
            x = clamp_tick(i32::from(x) + dx);
            y = clamp_tick(i32::from(y) + dy);
        }
        if quit {
            break;
        }
    }

    println!("\n\nFinal:");
    println!("  X PWM = {}", x);
    println!("  Y PWM = {}", y);
    println!("Put the measured endpoints into [gimbal.x] / [gimbal.y] of {}:", args.config.display());
    println!("drive each axis to the furthest position that does not strain and use it as min/max.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_tick() {
        assert_eq!(clamp_tick(50), TICK_FLOOR);
        assert_eq!(clamp_tick(700), TICK_CEILING);
        assert_eq!(clamp_tick(380), 380);
    }
}
