//! Synthetic camera frames for end-to-end tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use docscan_core::Clock;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect as PixelRect;
use qrcode::QrCode;

pub const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);
pub const PAPER: Rgb<u8> = Rgb([235, 235, 235]);

/// Часы, которыми управляет тест
#[derive(Clone)]
pub struct TestClock(Arc<AtomicI64>);

impl TestClock {
    pub fn at(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dark frame with a light sheet at the given corners (clockwise from
/// top-left).
pub fn document_frame(width: u32, height: u32, corners: [(i32, i32); 4]) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let poly: Vec<PixelPoint<i32>> = corners.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect();
    draw_polygon_mut(&mut img, &poly, PAPER);
    img
}

/// 640x480 frame with an axis-aligned sheet covering the hot area
pub fn covered_frame() -> RgbImage {
    document_frame(640, 480, [(30, 20), (460, 20), (460, 460), (30, 460)])
}

/// Frame without any document
pub fn empty_frame() -> RgbImage {
    RgbImage::from_pixel(640, 480, BACKGROUND)
}

/// Paint `text` as a QR code with its top-left corner at (x, y).
pub fn draw_qr(img: &mut RgbImage, text: &str, x: u32, y: u32, module: u32) {
    let qr = QrCode::new(text.as_bytes()).expect("encodable text");
    let modules = qr.width() as u32;
    let quiet = 4u32;
    let size = (modules + quiet * 2) * module;

    draw_filled_rect_mut(
        img,
        PixelRect::at(x as i32, y as i32).of_size(size, size),
        Rgb([255, 255, 255]),
    );

    for my in 0..modules {
        for mx in 0..modules {
            if qr[(mx as usize, my as usize)] == qrcode::Color::Dark {
                let px = x + (quiet + mx) * module;
                let py = y + (quiet + my) * module;
                draw_filled_rect_mut(
                    img,
                    PixelRect::at(px as i32, py as i32).of_size(module, module),
                    Rgb([0, 0, 0]),
                );
            }
        }
    }
}

/// Covered frame with a page code in the top-right QR region
pub fn covered_frame_with_qr(text: &str) -> RgbImage {
    let mut img = covered_frame();
    draw_qr(&mut img, text, 500, 2, 4);
    img
}
