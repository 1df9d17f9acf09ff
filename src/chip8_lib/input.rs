pub const KEY_COUNT: usize = 16;

/// State of the hexadecimal keypad, keys 0x0 - 0xF.
/// Written by the frontend between cycles, read by the interpreter.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputController {
    keys: [bool; KEY_COUNT],
}

impl InputController {
    // Only the low nibble selects a key
    pub fn key_pressed(&self, key: u8) -> bool {
        self.keys[(key & 0xF) as usize]
    }
    pub fn press_key(&mut self, key: u8) {
        self.set_key(key, true);
    }
    pub fn unpress_key(&mut self, key: u8) {
        self.set_key(key, false);
    }
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.keys[(key & 0xF) as usize] = pressed;
    }

    /// Lowest-indexed key currently held down.
    pub fn first_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|&k| k).map(|k| k as u8)
    }

    pub fn clear(&mut self) {
        self.keys = [false; KEY_COUNT];
    }

    pub fn states(&self) -> &[bool; KEY_COUNT] {
        &self.keys
    }

    pub fn states_mut(&mut self) -> &mut [bool; KEY_COUNT] {
        &mut self.keys
    }

    /// Bit flag form of the key state, bit n set means key n is pressed.
    /// Used to ship the state over a channel.
    pub fn keys(&self) -> u16 {
        self.keys
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &k)| if k { acc | (1u16 << i) } else { acc })
    }

    pub fn update_keys(&mut self, bits: u16) {
        for (i, key) in self.keys.iter_mut().enumerate() {
            *key = bits & (1u16 << i) != 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pressed() {
        let mut ict = InputController::default();
        ict.update_keys(0xAAAA);
        assert!(!ict.key_pressed(0x0));
        assert!(ict.key_pressed(0x1));
        assert!(!ict.key_pressed(0x2));
        assert!(ict.key_pressed(0x3));
        assert!(!ict.key_pressed(0xE));
        assert!(ict.key_pressed(0xF));
        assert_eq!(ict.keys(), 0xAAAA);
    }

    #[test]
    fn press_unpress_key() {
        let mut ict = InputController::default();
        ict.press_key(0xA);
        assert!(ict.key_pressed(0xA));
        ict.unpress_key(0xA);
        assert!(!ict.key_pressed(0xA));
        // releasing twice must not toggle it back on
        ict.unpress_key(0xA);
        assert!(!ict.key_pressed(0xA));
    }

    #[test]
    fn first_pressed_is_lowest_index() {
        let mut ict = InputController::default();
        assert_eq!(ict.first_pressed(), None);
        ict.press_key(0xC);
        ict.press_key(0x5);
        assert_eq!(ict.first_pressed(), Some(0x5));
        ict.clear();
        assert_eq!(ict.first_pressed(), None);
    }

    #[test]
    fn states_are_settable() {
        let mut ict = InputController::default();
        ict.states_mut()[7] = true;
        assert!(ict.key_pressed(7));
        assert_eq!(ict.keys(), 1 << 7);
    }
}
