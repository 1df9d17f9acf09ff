use configparser::ini::Ini;
use std::{collections::HashMap, time::Duration};
use log::{debug, warn};
use thiserror::Error;

use crate::input::KEY_COUNT;

pub const DEFAULT_CONFIG_PATH: &str = "cfg/config.ini";
pub const DEFAULT_CYCLES_PER_SECOND: u32 = 500;
pub const DEFAULT_SCALE: u32 = 16;
// Largest pixel size; keeps the window size within i32 pixel coordinates
pub const MAX_SCALE: u32 = 64;

// Left-hand side of a QWERTY keyboard; entry n is the key for keypad index n
const DEFAULT_LAYOUT: [&str; KEY_COUNT] = [
    "x", "1", "2", "3", "q", "w", "e", "a", "s", "d", "z", "c", "4", "r", "f", "v",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unable to parse config: {0}")]
    Load(String),
    #[error("invalid value {value:?} for {key} in [{section}]")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
    #[error("key {name:?} is mapped to {value:?}, expected a keypad index from 0 to 15")]
    InvalidKey { name: String, value: String },
}

/// Emulator settings read from an INI file.
///
/// ```ini
/// [emulator]
/// cycles_per_second = 500
///
/// [display]
/// scale = 16
///
/// [keyboard_layout]
/// x = 0
/// 1 = 0x1
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfg {
    // Host key name (lowercase) to keypad index
    keyboard_layout: HashMap<String, u8>,
    cycles_per_second: u32,
    scale: u32,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            keyboard_layout: DEFAULT_LAYOUT
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u8))
                .collect(),
            cycles_per_second: DEFAULT_CYCLES_PER_SECOND,
            scale: DEFAULT_SCALE,
        }
    }
}

impl Cfg {
    pub fn get_u8_from_key_name(&self, name: &str) -> Option<u8> {
        self.keyboard_layout.get(&name.to_lowercase()).copied()
    }

    pub fn keyboard_layout(&self) -> &HashMap<String, u8> {
        &self.keyboard_layout
    }

    pub fn cycles_per_second(&self) -> u32 {
        self.cycles_per_second
    }

    /// Wall-clock period of one interpreter cycle.
    pub fn cycle_time(&self) -> Duration {
        Duration::from_secs(1) / self.cycles_per_second
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Load a config file which overrides the defaults.
    ///
    /// A file that cannot be read is not an error: a warning is logged and the
    /// current settings are kept. Malformed entries are reported.
    pub fn load_config(&mut self, filepath: &str) -> Result<&mut Self, ConfigError> {
        let mut config = Ini::new();
        if let Err(e) = config.load(filepath) {
            warn!("Unable to load config file {filepath}: [{e}]. Using default settings.");
            return Ok(self);
        }
        self.apply(&config)?;
        debug!("Loaded config from {filepath}");
        Ok(self)
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Ini::new();
        config
            .read(contents.to_string())
            .map_err(ConfigError::Load)?;
        let mut cfg = Self::default();
        cfg.apply(&config)?;
        Ok(cfg)
    }

    fn apply(&mut self, config: &Ini) -> Result<(), ConfigError> {
        if let Some(cps) = read_bounded(config, "emulator", "cycles_per_second", u32::MAX)? {
            self.cycles_per_second = cps;
        }
        if let Some(scale) = read_bounded(config, "display", "scale", MAX_SCALE)? {
            self.scale = scale;
        }

        let heading = "keyboard_layout";
        match config.get_map_ref().get(heading) {
            Some(map) => {
                let mut layout = HashMap::with_capacity(map.len());
                for (name, val) in map {
                    let value = val.as_deref().unwrap_or_default();
                    let index = parse_key_index(value).ok_or_else(|| ConfigError::InvalidKey {
                        name: name.clone(),
                        value: value.to_string(),
                    })?;
                    debug!("Mapping {name} to key {index:X}");
                    layout.insert(name.to_lowercase(), index);
                }
                if layout.len() < KEY_COUNT {
                    warn!(
                        "Keyboard layout only maps {} of {KEY_COUNT} keys. Controls may not work as expected.",
                        layout.len()
                    );
                }
                self.keyboard_layout = layout;
            }
            None => {
                debug!("No [{heading}] section, keeping current keyboard layout");
            }
        }
        Ok(())
    }
}

// Value in 1..=max
fn read_bounded(
    config: &Ini,
    section: &str,
    key: &str,
    max: u32,
) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = config.get(section, key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(val) if val > 0 && val <= max => Ok(Some(val)),
        _ => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw,
        }),
    }
}

// Decimal or 0x-prefixed hexadecimal, 0 to 15
fn parse_key_index(value: &str) -> Option<u8> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.ok().filter(|&i| (i as usize) < KEY_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_covers_keypad() {
        let cfg = Cfg::default();
        assert_eq!(cfg.keyboard_layout().len(), KEY_COUNT);
        assert_eq!(cfg.get_u8_from_key_name("X"), Some(0x0));
        assert_eq!(cfg.get_u8_from_key_name("4"), Some(0xC));
        assert_eq!(cfg.get_u8_from_key_name("v"), Some(0xF));
        assert_eq!(cfg.get_u8_from_key_name("p"), None);
    }

    #[test]
    fn parses_all_sections() {
        let cfg = Cfg::from_ini_str(
            "[emulator]\ncycles_per_second = 700\n\n[display]\nscale = 8\n\n[keyboard_layout]\nUp = 0x2\nDown = 8\n",
        )
        .expect("config should parse");
        assert_eq!(cfg.cycles_per_second(), 700);
        assert_eq!(cfg.scale(), 8);
        assert_eq!(cfg.get_u8_from_key_name("up"), Some(2));
        assert_eq!(cfg.get_u8_from_key_name("Down"), Some(8));
        assert_eq!(cfg.get_u8_from_key_name("x"), None, "layout replaces the default");
    }

    #[test]
    fn missing_sections_keep_defaults() {
        let cfg = Cfg::from_ini_str("[display]\nscale = 4\n").expect("config should parse");
        assert_eq!(cfg.cycles_per_second(), DEFAULT_CYCLES_PER_SECOND);
        assert_eq!(cfg.keyboard_layout(), Cfg::default().keyboard_layout());
    }

    #[test]
    fn rejects_zero_cycles() {
        let err = Cfg::from_ini_str("[emulator]\ncycles_per_second = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "cycles_per_second"));
    }

    #[test]
    fn rejects_oversized_scale() {
        let cfg = Cfg::from_ini_str(&format!("[display]\nscale = {MAX_SCALE}\n"))
            .expect("largest scale is accepted");
        assert_eq!(cfg.scale(), MAX_SCALE);

        let err = Cfg::from_ini_str("[display]\nscale = 4294967295\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                section: "display".to_string(),
                key: "scale".to_string(),
                value: "4294967295".to_string()
            }
        );
    }

    #[test]
    fn rejects_out_of_range_key() {
        let err = Cfg::from_ini_str("[keyboard_layout]\nq = 16\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidKey {
                name: "q".to_string(),
                value: "16".to_string()
            }
        );
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let mut cfg = Cfg::default();
        cfg.load_config("no/such/config.ini")
            .expect("missing file is not an error");
        assert_eq!(cfg, Cfg::default());
    }

    #[test]
    fn cycle_time() {
        let cfg = Cfg::from_ini_str("[emulator]\ncycles_per_second = 100\n").unwrap();
        assert_eq!(cfg.cycle_time(), Duration::from_millis(10));
    }
}
