//! DocScan Core - Модуль сканирования документов
//!
//! Библиотека для поиска листа бумаги в кадре камеры с поддержкой:
//! - Поиска контуров и четырёхугольника документа
//! - Коррекции перспективы
//! - Улучшения изображения (бинаризация, цветовой фильтр)
//! - Автоматической съёмки по QR-коду страницы

pub mod config;
pub mod contours;
pub mod decoding;
pub mod detection;
pub mod enhance;
pub mod gate;
pub mod geometry;
pub mod page_code;
pub mod rectify;
pub mod worker;

pub use config::{EnhanceOptions, PageFormat, ScannerConfig};
pub use contours::{ContourExtractor, DetectionFrame};
pub use decoding::{QrDecoder, QrReader};
pub use detection::{QuadDetector, Quadrilateral};
pub use enhance::DocumentEnhancer;
pub use gate::{CaptureDecision, CaptureGate, CaptureMode, Clock, GateState, PageHistory, SystemClock};
pub use geometry::{GeometryError, Point, Rect};
pub use page_code::PageCode;
pub use rectify::PerspectiveRectifier;
pub use worker::{BusyFlag, ScanEvents, ScanWorker};

use image::{imageops, DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid image format: {0}")]
    InvalidFormat(String),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Configuration error: {0}")]
    Config(#[source] serde_json::Error),

    #[error("Failed to start scan worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Scan worker has stopped")]
    WorkerStopped,
}

/// Превью-кадр камеры
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub image: RgbImage,
    pub auto_mode: bool,
    pub preview_only: bool,
}

impl PreviewFrame {
    pub fn new(image: RgbImage, auto_mode: bool, preview_only: bool) -> Self {
        Self {
            image,
            auto_mode,
            preview_only,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        CaptureMode {
            auto_mode: self.auto_mode,
            preview_only: self.preview_only,
        }
    }
}

/// Результат поиска документа на превью (для подсказки на экране)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewDetection {
    /// Документ в координатах кадра детекции
    pub quad: Option<Quadrilateral>,
    /// Углы документа в координатах превью
    pub preview_points: Option<[Point; 4]>,
    /// Размер превью (ширина, высота)
    pub preview_size: (u32, u32),
    /// Рамка для листа заданного формата
    pub document_area: Option<Rect>,
}

impl PreviewDetection {
    pub fn document_detected(&self) -> bool {
        self.quad.is_some()
    }
}

/// Результат обработки превью-кадра
#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub detection: PreviewDetection,
    pub decision: CaptureDecision,
}

/// Отсканированный документ
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// Исходный снимок (после поворота, если он нужен)
    pub original: RgbImage,
    /// Найденный документ (`None`, если документа нет)
    pub quadrilateral: Option<Quadrilateral>,
    /// Углы из последнего превью
    pub preview_points: Option<[Point; 4]>,
    /// Размер последнего превью
    pub preview_size: Option<(u32, u32)>,
    /// Выпрямленное и улучшенное изображение
    pub processed: DynamicImage,
}

/// Главный сканер документов
pub struct DocumentScanner<D: QrDecoder = QrReader, C: Clock = SystemClock> {
    config: ScannerConfig,
    extractor: ContourExtractor,
    detector: QuadDetector,
    rectifier: PerspectiveRectifier,
    enhancer: DocumentEnhancer,
    decoder: D,
    gate: CaptureGate<C>,
    last_preview: Option<PreviewDetection>,
}

impl Default for DocumentScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentScanner {
    /// Создание нового сканера с настройками по умолчанию
    pub fn new() -> Self {
        Self::with_config(ScannerConfig::default())
    }

    /// Создание сканера с пользовательскими настройками
    pub fn with_config(config: ScannerConfig) -> Self {
        Self::with_parts(config, QrReader::new(), SystemClock)
    }
}

impl<D: QrDecoder, C: Clock> DocumentScanner<D, C> {
    /// Сканер с внешним QR-декодером и часами
    pub fn with_parts(config: ScannerConfig, decoder: D, clock: C) -> Self {
        Self {
            extractor: ContourExtractor::new(config.detection.clone()),
            detector: QuadDetector::new(config.detection.clone()),
            rectifier: PerspectiveRectifier::new(),
            enhancer: DocumentEnhancer::new(config.enhance.clone()),
            decoder,
            gate: CaptureGate::with_clock(config.qr.dedup_window_secs, clock),
            last_preview: None,
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn gate(&self) -> &CaptureGate<C> {
        &self.gate
    }

    pub fn set_bug_rotate(&mut self, bug_rotate: bool) {
        self.config.bug_rotate = bug_rotate;
    }

    /// Обработка превью-кадра: поиск документа, QR и решение о съёмке
    pub fn process_preview(&mut self, frame: &PreviewFrame) -> PreviewOutcome {
        let texts = self.decode_qr(&frame.image);
        let detection = self.detect_preview(&frame.image);

        let decision = self
            .gate
            .evaluate(detection.document_detected(), frame.mode(), &texts);
        if decision.capture {
            log::info!("Requesting picture (qr: {:?})", decision.qr_text);
        }

        self.last_preview = Some(detection.clone());
        PreviewOutcome { detection, decision }
    }

    /// Поиск документа на превью
    pub fn detect_preview(&self, img: &RgbImage) -> PreviewDetection {
        let aspect = self.config.document_aspect_ratio();
        let frame = self.extractor.extract(img);
        let quad = self.detector.detect(&frame, aspect);

        let preview_size = img.dimensions();
        let preview_points = quad.as_ref().map(|q| {
            detection::preview_points(q, frame.ratio, preview_size, self.config.bug_rotate)
        });

        PreviewDetection {
            quad,
            preview_points,
            preview_size,
            document_area: config::document_area(preview_size.0, preview_size.1, aspect),
        }
    }

    /// QR-коды в углу кадра
    fn decode_qr(&self, img: &RgbImage) -> Vec<String> {
        let (width, height) = img.dimensions();
        let Some(region) = decoding::qr_region(width, height, self.config.bug_rotate) else {
            return Vec::new();
        };

        let crop = decoding::crop_region(img, &region);
        self.decoder.decode_all(&crop)
    }

    /// Обработка полноразмерного снимка
    pub fn process_picture(&mut self, picture: RgbImage, options: EnhanceOptions) -> ScannedDocument {
        log::info!(
            "Processing picture {}x{}",
            picture.width(),
            picture.height()
        );

        let picture = if self.config.bug_rotate {
            imageops::rotate180(&picture)
        } else {
            picture
        };

        let frame = self.extractor.extract(&picture);
        let quad = self
            .detector
            .detect(&frame, self.config.document_aspect_ratio());

        let (doc, rectified) = self
            .rectifier
            .rectify_or_copy(&picture, quad.as_ref(), frame.ratio);
        // Degenerate geometry counts as no document
        let quadrilateral = if rectified { quad } else { None };
        if quadrilateral.is_none() {
            log::info!("No document found, keeping full picture");
        }

        let processed = self.enhancer.enhance(doc, options);
        self.gate.capture_finished();

        let (preview_points, preview_size) = match &self.last_preview {
            Some(p) if quadrilateral.is_some() => (p.preview_points, Some(p.preview_size)),
            _ => (None, None),
        };

        ScannedDocument {
            original: picture,
            quadrilateral,
            preview_points,
            preview_size,
            processed,
        }
    }

    /// Обработка снимка из байтов (PNG, JPEG)
    pub fn scan_bytes(&mut self, image_bytes: &[u8], options: EnhanceOptions) -> Result<ScannedDocument, ScanError> {
        let img = image::load_from_memory(image_bytes)
            .map_err(|e| ScanError::InvalidFormat(e.to_string()))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(ScanError::EmptyImage);
        }

        Ok(self.process_picture(img.to_rgb8(), options))
    }
}
