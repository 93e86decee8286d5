//! Generator of synthetic camera shots and their scans
//!
//! Usage: cargo run -p docscan-core --example gen_scans

use docscan_core::{DocumentScanner, EnhanceOptions};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use qrcode::QrCode;
use rand::Rng;
use std::fs;
use std::path::Path;

fn main() {
    env_logger::init();

    let output_dir = Path::new("generated_scans");
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).unwrap();
    }
    fs::create_dir_all(output_dir).unwrap();

    println!("Generating scans in {:?}", output_dir);

    let mut rng = rand::thread_rng();
    let mut scanner = DocumentScanner::new();
    let modes = [
        ("bw", EnhanceOptions { color_mode: false, filter_mode: true }),
        ("color", EnhanceOptions { color_mode: true, filter_mode: true }),
        ("raw", EnhanceOptions { color_mode: true, filter_mode: false }),
    ];

    let mut found = 0;
    for page in 1..=8 {
        // Sheet corners jittered around a centered A4-ish page
        let (w, h) = (1280u32, 960u32);
        let mut jitter = |x: i32, y: i32| Point::new(x + rng.gen_range(-60..60), y + rng.gen_range(-40..40));
        let corners = [
            jitter(120, 70),
            jitter(1000, 70),
            jitter(1000, 900),
            jitter(120, 900),
        ];

        let mut shot = RgbImage::from_pixel(w, h, Rgb([40, 38, 35]));
        draw_polygon_mut(&mut shot, &corners, Rgb([232, 230, 225]));

        // A few lines of "text" and a red stamp inside the sheet
        for line in 0..12 {
            let y = 200 + line * 50;
            draw_filled_rect_mut(&mut shot, Rect::at(260, y).of_size(600, 14), Rgb([50, 50, 60]));
        }
        draw_filled_rect_mut(&mut shot, Rect::at(700, 760).of_size(120, 60), Rgb([200, 40, 40]));

        draw_page_code(&mut shot, &format!("P{:02} V01 S{}", page, page), 1100, 10, 5);
        shot.save(output_dir.join(format!("page_{:02}_shot.png", page))).unwrap();

        for (name, options) in modes {
            let doc = scanner.process_picture(shot.clone(), options);
            if doc.quadrilateral.is_some() && name == "bw" {
                found += 1;
            }
            doc.processed
                .save(output_dir.join(format!("page_{:02}_{}.png", page, name)))
                .unwrap();
        }
    }

    println!("Document found on {} of 8 shots.", found);
}

fn draw_page_code(img: &mut RgbImage, text: &str, x: u32, y: u32, module: u32) {
    let qr = QrCode::new(text.as_bytes()).unwrap();

    // Manual render to avoid image crate version mismatch (qrcode uses old image)
    let width = qr.width() as u32;
    let quiet_zone = 4u32;
    let size = (width + quiet_zone * 2) * module;
    draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(size, size), Rgb([255, 255, 255]));

    for my in 0..width {
        for mx in 0..width {
            if qr[(mx as usize, my as usize)] == qrcode::Color::Dark {
                let px = (x + (quiet_zone + mx) * module) as i32;
                let py = (y + (quiet_zone + my) * module) as i32;
                draw_filled_rect_mut(img, Rect::at(px, py).of_size(module, module), Rgb([0, 0, 0]));
            }
        }
    }
}
