//! Конфигурация сканера
//!
//! Все настройки читаются один раз на проход обработки. Значения по
//! умолчанию совпадают с константами детектора и улучшения изображения.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::ScanError;

/// Preference value selecting a custom page size.
pub const CUSTOM_PAGE_FORMAT: &str = "0.0001";

/// Полная конфигурация сканера
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Сенсор установлен с поворотом на 180°
    pub bug_rotate: bool,
    /// Формат страницы (ограничение соотношения сторон)
    pub page_format: PageFormat,
    pub detection: DetectionConfig,
    pub enhance: EnhanceConfig,
    pub qr: QrConfig,
}

impl ScannerConfig {
    /// Загрузка конфигурации из JSON
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        serde_json::from_str(json).map_err(ScanError::Config)
    }

    pub fn to_json(&self) -> Result<String, ScanError> {
        serde_json::to_string_pretty(self).map_err(ScanError::Config)
    }

    /// Соотношение сторон документа (0 = без ограничения)
    pub fn document_aspect_ratio(&self) -> f64 {
        self.page_format.aspect_ratio()
    }
}

/// Настройки поиска контуров и четырёхугольника
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Sigma of the 5x5 Gaussian blur applied before edge detection
    pub blur_sigma: f32,
    /// Нижний порог Canny
    pub canny_low: f32,
    /// Верхний порог Canny
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the perimeter
    pub approx_epsilon: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            approx_epsilon: 0.02,
        }
    }
}

/// Настройки улучшения документа
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Контраст
    pub color_gain: f64,
    /// Яркость
    pub color_bias: f64,
    /// Порог цветового фильтра
    pub color_threshold: u8,
    /// Размер окна адаптивной бинаризации (нечётное число)
    pub block_size: u32,
    /// Смещение порога адаптивной бинаризации
    pub threshold_offset: i32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            color_gain: 1.5,
            color_bias: 0.0,
            color_threshold: 110,
            block_size: 225,
            threshold_offset: 15,
        }
    }
}

/// Настройки QR-триггера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Window in seconds during which the same page code is ignored
    pub dedup_window_secs: i64,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self { dedup_window_secs: 15 }
    }
}

/// Режимы улучшения, передаются в каждый вызов обработки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceOptions {
    pub color_mode: bool,
    pub filter_mode: bool,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            color_mode: false,
            filter_mode: true,
        }
    }
}

/// Формат страницы
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageFormat {
    /// Любой документ
    #[default]
    Unconstrained,
    /// Height / width ratio, e.g. 1.4142 for ISO A-series portrait
    Ratio { value: f64 },
    /// Пользовательский размер страницы
    Custom { width: f64, height: f64 },
}

impl PageFormat {
    /// Разбор значения из настроек приложения.
    ///
    /// `"0.0001"` selects the custom size; any other number is taken as the
    /// ratio itself. Unparsable or non-positive values disable the constraint.
    pub fn from_preference(value: &str, custom_width: &str, custom_height: &str) -> Self {
        let value = value.trim();
        if value == CUSTOM_PAGE_FORMAT {
            let width = custom_width.trim().parse::<f64>().unwrap_or(0.0);
            let height = custom_height.trim().parse::<f64>().unwrap_or(0.0);
            if width > 0.0 && height > 0.0 {
                return PageFormat::Custom { width, height };
            }
            return PageFormat::Unconstrained;
        }

        match value.parse::<f64>() {
            Ok(ratio) if ratio > 0.0 && ratio.is_finite() => PageFormat::Ratio { value: ratio },
            _ => PageFormat::Unconstrained,
        }
    }

    /// Соотношение высоты к ширине; 0 отключает ограничение
    pub fn aspect_ratio(&self) -> f64 {
        let ratio = match *self {
            PageFormat::Unconstrained => 0.0,
            PageFormat::Ratio { value } => value,
            PageFormat::Custom { width, height } if width > 0.0 => height / width,
            PageFormat::Custom { .. } => 0.0,
        };
        if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            0.0
        }
    }
}

/// Область документа для подсказки на экране.
///
/// Returns `None` when no aspect ratio is configured.
pub fn document_area(width: u32, height: u32, aspect_ratio: f64) -> Option<Rect> {
    if !(aspect_ratio > 0.0) || width == 0 || height == 0 {
        return None;
    }

    let (w, h) = (width as i32, height as i32);
    let image_ratio = width as f64 / height as f64;

    let (left, top, right, bottom);
    if image_ratio >= aspect_ratio {
        let document_width = (h - h / 10) as f64;
        let document_height = document_width * aspect_ratio;

        top = h / 20;
        bottom = h - top;
        left = ((w as f64 - document_height) / 2.0) as i32;
        right = w - left;
    } else {
        let document_height = (w - w / 5) as f64;
        let document_width = document_height / aspect_ratio;

        left = w / 10;
        right = w - left;
        top = ((h as f64 - document_width) / 2.0) as i32;
        bottom = h - top;
    }

    Some(Rect::new(left, top, right, bottom))
}

/// «Горячая» область, которую должен полностью покрыть документ
pub fn hot_area(width: u32, height: u32, aspect_ratio: f64) -> Rect {
    let (w, h) = (width as i32, height as i32);

    match document_area(width, height, aspect_ratio) {
        Some(area) => {
            let offset = h / 10;
            Rect::new(
                area.left + offset,
                area.top + offset,
                area.right - offset,
                area.bottom - offset,
            )
        }
        None => {
            let base = h / 4;
            Rect::new(w / 2 - base, base, w / 2 + base, h - base)
        }
    }
}
