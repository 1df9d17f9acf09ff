// Maps host keys to the CHIP-8 keypad using the layout from the emulator config
use chip8_lib::config::Cfg;
use std::collections::HashMap;
use sdl2::keyboard::Keycode;
use log::{debug, warn};

pub struct KeyLayout {
    keyboard_layout: HashMap<Keycode, u8>,
}

impl KeyLayout {
    pub fn from_config(cfg: &Cfg) -> Self {
        let mut keyboard_layout = HashMap::with_capacity(cfg.keyboard_layout().len());
        for (name, &val) in cfg.keyboard_layout() {
            match Keycode::from_name(name) {
                Some(k) => {
                    debug!("Mapping {name} to key {val:X}");
                    keyboard_layout.insert(k, val);
                }
                None => warn!("Failed to parse config entry {name:?} to SDL keycode. Controls may not work as expected."),
            }
        }
        Self { keyboard_layout }
    }

    pub fn get_u8_from_keycode(&self, k: &Keycode) -> Option<u8> {
        self.keyboard_layout.get(k).copied()
    }
}
