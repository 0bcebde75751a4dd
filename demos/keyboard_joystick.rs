// Keyboard gamepad: WASD left stick, Z/X right stick, arrows POV, Q quit
//
// Buttons: 1=A 2=B 3=X 4=Y, B=Back, N=Start (held for the key-repeat window)
// Usage: cargo run --example keyboard_joystick
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_vision_runtime::config::TOPIC_CMD_JOYSTICK;
use swerve_vision_runtime::messages::{Button, JoystickSample};

const STICK_LEVELS: [f64; 3] = [0.3, 0.6, 1.0];
const INPUT_TIMEOUT_MS: u64 = 100; // Release everything after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_JOYSTICK).await?;

    info!("Controls: WASD=drive, Z/X=rotate, arrows=POV, 1-4=A/B/X/Y, B=Back, N=Start, R/F=level, Q=quit");
    info!("Stick level: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut level: usize = 0;
    let mut sample = JoystickSample::default();
    let mut last_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let stick = STICK_LEVELS[level];

                match code {
                    // Gamepad convention: stick forward reads negative
                    KeyCode::Char('w') if pressed => sample.left_y = -stick,
                    KeyCode::Char('s') if pressed => sample.left_y = stick,
                    KeyCode::Char('a') if pressed => sample.left_x = -stick,
                    KeyCode::Char('d') if pressed => sample.left_x = stick,
                    KeyCode::Char('z') if pressed => sample.right_x = -stick,
                    KeyCode::Char('x') if pressed => sample.right_x = stick,

                    KeyCode::Up if pressed => sample.pov = Some(0),
                    KeyCode::Right if pressed => sample.pov = Some(90),
                    KeyCode::Down if pressed => sample.pov = Some(180),
                    KeyCode::Left if pressed => sample.pov = Some(270),

                    KeyCode::Char('1') if pressed => hold(&mut sample, Button::A),
                    KeyCode::Char('2') if pressed => hold(&mut sample, Button::B),
                    KeyCode::Char('3') if pressed => hold(&mut sample, Button::X),
                    KeyCode::Char('4') if pressed => hold(&mut sample, Button::Y),
                    KeyCode::Char('b') if pressed => hold(&mut sample, Button::Back),
                    KeyCode::Char('n') if pressed => hold(&mut sample, Button::Start),

                    KeyCode::Char('r') if pressed => {
                        level = (level + 1).min(2);
                        print_level(level);
                    }
                    KeyCode::Char('f') if pressed => {
                        level = level.saturating_sub(1);
                        print_level(level);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
                if pressed {
                    last_input = Instant::now();
                }
            }
        }

        // Terminals have no key-up events; release after a quiet period
        if last_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            sample = JoystickSample::default();
        }

        // Always publish at ~50Hz so the runtime watchdog stays fed
        publisher.put(serde_json::to_string(&sample)?).await?;
    }

    Ok(())
}

fn hold(sample: &mut JoystickSample, button: Button) {
    if !sample.is_pressed(button) {
        sample.buttons.push(button);
    }
}

fn print_level(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Stick level: {}", label);
}
