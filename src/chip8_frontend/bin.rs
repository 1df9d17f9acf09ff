mod screen;
mod config;

use chip8_lib::config::DEFAULT_CONFIG_PATH;
use chip8_lib::display::PIXEL_COUNT;
use chip8_lib::input::InputController;
use chip8_lib::Chip8;
use crate::config::KeyLayout;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use std::time::Duration;
use std::{env, fs, process, thread};
use std::sync::mpsc::{self, Sender, Receiver};
use log::{error, info, warn};

const USAGE: &str = "usage: chip8_frontend ROM [CONFIG]";

fn main() -> Result<(), String> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(rom_path) = args.next() else {
        eprintln!("{USAGE}");
        // EX_USAGE
        process::exit(64);
    };
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let rom = fs::read(&rom_path).map_err(|e| format!("Unable to read ROM {rom_path}: {e}"))?;
    let mut chip8 = Chip8::new();
    chip8.load_config(&config_path).map_err(|e| e.to_string())?;
    chip8.load_rom(&rom).map_err(|e| e.to_string())?;
    let conf = chip8.config().clone();
    let layout = KeyLayout::from_config(&conf);

    // Backend will run in its own separate thread, reacting to keypresses sent by message from
    // the main thread (SDL2 context). Backend will send frame buffer to frontend in similar way.
    let (input_tx, input_rx): (Sender<u16>, Receiver<u16>) = mpsc::channel();
    let (quit_tx, quit_rx): (Sender<bool>, Receiver<bool>) = mpsc::channel();
    let (display_tx, display_rx): (Sender<[u8; PIXEL_COUNT]>, Receiver<[u8; PIXEL_COUNT]>) =
        mpsc::channel();
    chip8.connect(input_rx, quit_rx, display_tx);

    let backend = thread::spawn(move || {
        if let Err(e) = chip8.main_loop() {
            error!("Interpreter stopped: {e}");
        }
    });

    let mut current_keyboard_state = InputController::default();

    info!("Initializing SDL2 context...");
    let sdl_context = sdl2::init()?;
    let video_subsystem = sdl_context.video()?;
    let (width, height) = screen::window_size(conf.scale());
    let window = video_subsystem
        .window("CHIP-8", width, height)
        .position_centered()
        .build()
        .map_err(|e| e.to_string())?;

    let mut canvas = window.into_canvas().build().map_err(|e| e.to_string())?;
    canvas.set_draw_color(screen::BG_COLOR);
    canvas.clear();
    canvas.present();
    let mut event_pump = sdl_context.event_pump()?;

    'running: loop {
        // Handle input
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::ESCAPE),
                    ..
                } => break 'running,
                // If a key is pressed, see if it corresponds to a key in the layout defined in config,
                // then update internal keyboard state
                Event::KeyDown { keycode: Some(k), .. } => {
                    if let Some(val) = layout.get_u8_from_keycode(&k) {
                        current_keyboard_state.press_key(val)
                    }
                }
                Event::KeyUp { keycode: Some(k), .. } => {
                    if let Some(val) = layout.get_u8_from_keycode(&k) {
                        current_keyboard_state.unpress_key(val)
                    }
                }
                _ => {}
            }
        }

        if input_tx.send(current_keyboard_state.keys()).is_err() {
            warn!("Interpreter is no longer running");
            break 'running;
        }

        // Frames may queue up between renders; only the newest one is shown
        if let Some(frame) = display_rx.try_iter().last() {
            screen::draw_frame(&mut canvas, &frame, conf.scale())?;
        }

        thread::sleep(Duration::new(0, 1_000_000_000u32 / screen::RENDER_FPS));
    }

    if let Err(e) = quit_tx.send(true) {
        warn!("Failed to send quit message to backend: {e}");
    }
    if backend.join().is_err() {
        error!("Interpreter thread panicked");
    }
    Ok(())
}
