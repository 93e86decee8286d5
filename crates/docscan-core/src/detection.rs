//! Модуль обнаружения документа
//!
//! Перебирает контуры в порядке убывания площади, аппроксимирует каждый
//! многоугольником и возвращает первый четырёхугольник, который полностью
//! покрывает «горячую» область кадра.

use imageproc::geometry::arc_length;
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

use crate::config::{hot_area, DetectionConfig};
use crate::contours::{Contour, DetectionFrame};
use crate::geometry::{encloses, order_corners, Point, Rect};

/// Обнаруженный документ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    /// Углы [top-left, top-right, bottom-right, bottom-left]
    corners: [Point; 4],
    /// Исходный контур (для отладки и подсказок)
    contour: Vec<Point>,
}

impl Quadrilateral {
    /// Builds a quad from four points in any order.
    pub fn new(points: [Point; 4], contour: Vec<Point>) -> Self {
        Self {
            corners: order_corners(&points),
            contour,
        }
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn contour(&self) -> &[Point] {
        &self.contour
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }
}

/// Детектор четырёхугольника документа
pub struct QuadDetector {
    config: DetectionConfig,
}

impl Default for QuadDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl QuadDetector {
    /// Создание детектора
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Greedy largest-valid-quad selection.
    ///
    /// Contours are expected in descending area order; the first one that
    /// approximates to exactly four vertices and encloses the hot area wins.
    pub fn detect(&self, frame: &DetectionFrame, aspect_ratio: f64) -> Option<Quadrilateral> {
        let (width, height) = frame.size;
        let area = hot_area(width, height, aspect_ratio);
        self.detect_in(&frame.contours, &area)
    }

    /// Поиск с явно заданной «горячей» областью
    pub fn detect_in(&self, contours: &[Contour], area: &Rect) -> Option<Quadrilateral> {
        for (idx, contour) in contours.iter().enumerate() {
            let Some(corners) = self.approximate_quad(contour) else {
                continue;
            };

            let ordered = order_corners(&corners);
            if encloses(&ordered, area) {
                log::debug!("Contour #{} accepted as document: {:?}", idx, ordered);
                let raw = contour.points.iter().copied().map(Point::from).collect();
                return Some(Quadrilateral {
                    corners: ordered,
                    contour: raw,
                });
            }

            log::debug!("Contour #{} is a quad outside the hot area", idx);
        }

        None
    }

    /// Аппроксимация контура; `Some` только для ровно четырёх вершин
    fn approximate_quad(&self, contour: &Contour) -> Option<[Point; 4]> {
        let perimeter = arc_length(&contour.points, true);
        if perimeter <= 0.0 {
            return None;
        }

        let approx = approximate_closed(&contour.points, self.config.approx_epsilon * perimeter);
        if approx.len() != 4 {
            return None;
        }

        Some([
            Point::from(approx[0]),
            Point::from(approx[1]),
            Point::from(approx[2]),
            Point::from(approx[3]),
        ])
    }
}

/// Углы документа в координатах превью-кадра.
///
/// Corners are rescaled by `ratio` and truncated to whole pixels. With
/// `bug_rotate` each corner is mirrored through the frame and shifted two
/// places, so the order stays [top-left, top-right, bottom-right,
/// bottom-left] on the rotated display.
pub fn preview_points(quad: &Quadrilateral, ratio: f64, size: (u32, u32), bug_rotate: bool) -> [Point; 4] {
    let (width, height) = (size.0 as f64, size.1 as f64);
    let mut out = [Point::default(); 4];

    for (i, p) in quad.corners().iter().enumerate() {
        let x = (p.x * ratio).trunc();
        let y = (p.y * ratio).trunc();
        if bug_rotate {
            out[(i + 2) % 4] = Point::new((x - width).abs(), (y - height).abs());
        } else {
            out[i] = Point::new(x, y);
        }
    }

    out
}

/// Douglas–Peucker approximation of a closed curve.
///
/// The curve is split at the vertex farthest from its first point and both
/// halves are simplified as open chains. The result has no repeated
/// closing vertex.
pub fn approximate_closed(curve: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if curve.len() < 3 {
        return curve.to_vec();
    }

    let start = curve[0];
    let (split, _) = curve
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, p)| (i, squared_distance(&start, p)))
        .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if split == 0 {
        return vec![start];
    }

    let mut second: Vec<PixelPoint<i32>> = curve[split..].to_vec();
    second.push(start);

    let mut result = simplify_open(&curve[..=split], epsilon);
    result.pop();
    let mut tail = simplify_open(&second, epsilon);
    tail.pop();
    result.extend(tail);

    result.dedup();
    result
}

fn simplify_open(chain: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if chain.len() < 3 {
        return chain.to_vec();
    }

    let first = chain[0];
    let last = chain[chain.len() - 1];

    let mut max_dist = 0.0;
    let mut index = 0;
    for (i, p) in chain.iter().enumerate().take(chain.len() - 1).skip(1) {
        let d = perpendicular_distance(&first, &last, p);
        if d > max_dist {
            max_dist = d;
            index = i;
        }
    }

    if max_dist > epsilon {
        let mut left = simplify_open(&chain[..=index], epsilon);
        let right = simplify_open(&chain[index..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn squared_distance(a: &PixelPoint<i32>, b: &PixelPoint<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    dx * dx + dy * dy
}

fn perpendicular_distance(a: &PixelPoint<i32>, b: &PixelPoint<i32>, p: &PixelPoint<i32>) -> f64 {
    let len = squared_distance(a, b).sqrt();
    if len == 0.0 {
        return squared_distance(a, p).sqrt();
    }
    let cross = (b.x - a.x) as f64 * (p.y - a.y) as f64 - (b.y - a.y) as f64 * (p.x - a.x) as f64;
    cross.abs() / len
}
