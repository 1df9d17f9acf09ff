use chip8_lib::display::{PIXEL_COUNT, SCREEN_HEIGHT, SCREEN_WIDTH};
use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::render::WindowCanvas;

pub const RENDER_FPS: u32 = 60;
pub const BG_COLOR: Color = Color::BLACK;
pub const FG_COLOR: Color = Color::GREEN;

// True resolution for a given pixel size
pub fn window_size(scale: u32) -> (u32, u32) {
    (SCREEN_WIDTH as u32 * scale, SCREEN_HEIGHT as u32 * scale)
}

/// Paint every lit pixel of the frame buffer as a `scale` sized square.
pub fn draw_frame(canvas: &mut WindowCanvas, frame: &[u8; PIXEL_COUNT], scale: u32) -> Result<(), String> {
    let lit: Vec<Rect> = frame
        .iter()
        .enumerate()
        .filter(|(_, &px)| px != 0)
        .map(|(i, _)| {
            let x = (i % SCREEN_WIDTH) as i32 * scale as i32;
            let y = (i / SCREEN_WIDTH) as i32 * scale as i32;
            Rect::new(x, y, scale, scale)
        })
        .collect();

    canvas.set_draw_color(BG_COLOR);
    canvas.clear();
    canvas.set_draw_color(FG_COLOR);
    canvas.fill_rects(&lit)?;
    canvas.present();
    Ok(())
}
