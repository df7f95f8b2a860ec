use textimg::{
    TextCanvas,
    fontdb::Family,
    image::{Rgba, RgbaImage},
};

#[allow(clippy::unwrap_used)]
fn main() {
    let mut canvas = TextCanvas::new(
        Some(RgbaImage::new(640, 200)),
        Some(Rgba([255, 255, 255, 255])),
    );

    let font_result = match std::env::args().nth(1) {
        Some(path) => canvas.set_font_from_path(path),
        None => canvas.set_font_from_system(&[Family::SansSerif]).or_else(|_| {
            // fontdb maps sans-serif to "Arial"; fall back to a common Linux family
            canvas.font_storage_mut().set_sans_serif_family("DejaVu Sans");
            canvas.set_font_from_storage(&[Family::SansSerif])
        }),
    };
    if let Err(e) = font_result {
        println!("No usable font ({e}); pass a font file path as the first argument.");
        return;
    }
    canvas.set_font_size(18.0);

    let timer = std::time::Instant::now();
    canvas
        .draw_text(
            Some(Rgba([20, 20, 120, 255])),
            &["textimg demo", "lines advance by three font sizes"],
        )
        .unwrap();

    // a small badge composited from an HTML data uri
    let badge = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAIAAAACCAYAAABytg0kAAAAEUlEQVR4nGM4ISf3H4QZYAwARzQIDWbIDqkAAAAASUVORK5CYII=";
    canvas
        .composite_from_data_uri_resized((560, 20), badge, 48, 48)
        .unwrap();

    let png = canvas.png().unwrap();
    println!(
        "Rendered {}x{} canvas into {} bytes (elapsed: {:.2?})",
        canvas.width(),
        canvas.height(),
        png.len(),
        timer.elapsed()
    );

    std::fs::create_dir_all("debug").expect("failed to create debug directory");
    std::fs::write("debug/text_to_png.png", png).expect("failed to save png");
    println!("Saved debug image to debug/text_to_png.png");
}
