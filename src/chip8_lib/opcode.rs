use std::fmt;

/// Raw 16-bit instruction word, as fetched from memory.
///
/// Operand layout follows the usual CHIP-8 notation:
///
/// ```text
/// | C | X | Y | N |
///         |  NN   |
///     |    NNN    |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Compose an opcode from the two bytes at PC and PC + 1.
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self(((high as u16) << 8) | low as u16)
    }

    /// High nibble; selects the primary instruction category.
    pub fn category(self) -> usize {
        ((self.0 & 0xF000) >> 12) as usize
    }

    pub fn x(self) -> usize {
        ((self.0 & 0x0F00) >> 8) as usize
    }

    pub fn y(self) -> usize {
        ((self.0 & 0x00F0) >> 4) as usize
    }

    pub fn n(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    pub fn nn(self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_extraction() {
        let op = Opcode(0xD12F);
        assert_eq!(op.category(), 0xD);
        assert_eq!(op.x(), 0x1);
        assert_eq!(op.y(), 0x2);
        assert_eq!(op.n(), 0xF);
        assert_eq!(op.nn(), 0x2F);
        assert_eq!(op.nnn(), 0x12F);
    }

    #[test]
    fn from_bytes_is_big_endian() {
        assert_eq!(Opcode::from_bytes(0xA2, 0xF0), Opcode(0xA2F0));
    }

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(Opcode(0x00E0).to_string(), "00E0");
    }
}
