use std::fmt;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
pub const PIXEL_COUNT: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Monochrome framebuffer. One byte per pixel, 0 is off and 1 is on,
/// stored row-major so pixel (x, y) lives at `x + y * SCREEN_WIDTH`.
pub struct DisplayController {
    frame_buffer: [u8; PIXEL_COUNT],
    // Set whenever the frame buffer changes; the consumer clears it
    redraw: bool,
}

impl Default for DisplayController {
    fn default() -> Self {
        Self {
            frame_buffer: [0; PIXEL_COUNT],
            redraw: false,
        }
    }
}

impl DisplayController {
    pub fn clear_screen(&mut self) {
        self.frame_buffer.fill(0);
        self.redraw = true;
    }

    /// XOR an 8-pixel-wide sprite onto the screen with its top-left corner at (x, y).
    ///
    /// The origin is reduced modulo the screen size. Rows and columns that then
    /// run past the right or bottom edge are clipped, not wrapped.
    ///
    /// Returns `true` if any pixel went from on to off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let x0 = x % SCREEN_WIDTH;
        let y0 = y % SCREEN_HEIGHT;
        let mut collision = false;

        for (row, bits) in rows.iter().enumerate() {
            let py = y0 + row;
            if py >= SCREEN_HEIGHT {
                break;
            }
            for col in 0..8 {
                let px = x0 + col;
                if px >= SCREEN_WIDTH {
                    break;
                }
                if bits & (0x80 >> col) == 0 {
                    continue;
                }
                let pixel = &mut self.frame_buffer[px + py * SCREEN_WIDTH];
                collision |= *pixel == 1;
                *pixel ^= 1;
            }
        }
        self.redraw = true;
        collision
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < SCREEN_WIDTH && y < SCREEN_HEIGHT && self.frame_buffer[x + y * SCREEN_WIDTH] == 1
    }

    pub fn frame_buffer(&self) -> &[u8; PIXEL_COUNT] {
        &self.frame_buffer
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Read and clear the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}

/// Text rendering, one line per row, `X` for a lit pixel.
impl fmt::Display for DisplayController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.frame_buffer.chunks(SCREEN_WIDTH) {
            for &px in row {
                f.write_str(if px != 0 { "X" } else { " " })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_sets_pixels_row_major() {
        let mut dct = DisplayController::default();
        let collision = dct.draw_sprite(2, 1, &[0b1010_0000]);
        assert!(!collision);
        assert_eq!(dct.frame_buffer[2 + SCREEN_WIDTH], 1);
        assert_eq!(dct.frame_buffer[3 + SCREEN_WIDTH], 0);
        assert_eq!(dct.frame_buffer[4 + SCREEN_WIDTH], 1);
        assert!(dct.needs_redraw());
    }

    #[test]
    fn redraw_reports_collision_and_erases() {
        let mut dct = DisplayController::default();
        dct.draw_sprite(10, 10, &[0xFF]);
        assert!(dct.draw_sprite(10, 10, &[0xFF]));
        assert!(dct.frame_buffer.iter().all(|&px| px == 0));
    }

    #[test]
    fn sprite_is_clipped_at_right_and_bottom_edges() {
        let mut dct = DisplayController::default();
        dct.draw_sprite(60, 30, &[0xFF, 0xFF, 0xFF]);
        let lit = dct.frame_buffer.iter().filter(|&&px| px == 1).count();
        // 4 columns by 2 rows remain on screen
        assert_eq!(lit, 8);
        assert!(dct.pixel(63, 31));
        assert!(!dct.pixel(0, 0));
    }

    #[test]
    fn origin_wraps_modulo_screen_size() {
        let mut dct = DisplayController::default();
        dct.draw_sprite(SCREEN_WIDTH + 1, SCREEN_HEIGHT + 2, &[0x80]);
        assert!(dct.pixel(1, 2));
    }

    #[test]
    fn clear_screen_zeroes_and_flags() {
        let mut dct = DisplayController::default();
        dct.draw_sprite(0, 0, &[0xFF]);
        assert!(dct.take_redraw());
        assert!(!dct.needs_redraw());
        dct.clear_screen();
        assert!(dct.needs_redraw());
        assert!(dct.frame_buffer.iter().all(|&px| px == 0));
    }

    #[test]
    fn text_rendering() {
        let mut dct = DisplayController::default();
        dct.draw_sprite(0, 0, &[0xC0]);
        let text = dct.to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first.len(), SCREEN_WIDTH);
        assert!(first.starts_with("XX "));
        assert_eq!(text.lines().count(), SCREEN_HEIGHT);
    }
}
