//! Sequential scan worker.
//!
//! One dedicated thread owns the `DocumentScanner` and handles commands in
//! arrival order. Preview frames are not queued behind each other: the
//! producer drops them while the shared busy flag is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::RgbImage;

use crate::config::EnhanceOptions;
use crate::decoding::QrDecoder;
use crate::gate::Clock;
use crate::{DocumentScanner, PreviewDetection, PreviewFrame, ScanError, ScannedDocument};

/// Колбэки хост-приложения
pub trait ScanEvents: Send + 'static {
    /// Запросить полноразмерный снимок
    fn request_picture(&self);

    /// Геометрия для подсказки на экране
    fn preview_detected(&self, _detection: &PreviewDetection) {}

    /// Документ готов к сохранению
    fn document_ready(&self, document: ScannedDocument);
}

/// Флаг занятости, общий для камеры и обработчика
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Set the flag if it was clear; `false` means somebody holds it.
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn set_busy(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Command {
    Preview(PreviewFrame),
    Picture(RgbImage),
    SetColorMode(bool),
    SetFilterMode(bool),
    SetBugRotate(bool),
    Shutdown,
}

/// Обработчик кадров в отдельном потоке
pub struct ScanWorker {
    sender: Sender<Command>,
    busy: BusyFlag,
    handle: Option<JoinHandle<()>>,
}

impl ScanWorker {
    /// Start the worker thread.
    pub fn spawn<D, C, E>(scanner: DocumentScanner<D, C>, events: E) -> Result<Self, ScanError>
    where
        D: QrDecoder + 'static,
        C: Clock + 'static,
        E: ScanEvents,
    {
        let (sender, receiver) = mpsc::channel();
        let busy = BusyFlag::new();
        let worker_busy = busy.clone();

        let handle = thread::Builder::new()
            .name("docscan-worker".to_string())
            .spawn(move || run(scanner, events, receiver, worker_busy))
            .map_err(ScanError::WorkerSpawn)?;

        log::info!("Scan worker started");
        Ok(Self {
            sender,
            busy,
            handle: Some(handle),
        })
    }

    /// Флаг занятости для источника кадров
    pub fn busy(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Отправить превью-кадр; `false`, если обработчик занят и кадр отброшен
    pub fn submit_preview(&self, frame: PreviewFrame) -> bool {
        if !self.busy.try_acquire() {
            log::trace!("Worker busy, dropping preview frame");
            return false;
        }

        if self.sender.send(Command::Preview(frame)).is_err() {
            self.busy.release();
            return false;
        }
        true
    }

    /// Отправить полноразмерный снимок
    pub fn submit_picture(&self, picture: RgbImage) -> Result<(), ScanError> {
        self.busy.set_busy();
        self.send(Command::Picture(picture))
    }

    pub fn set_color_mode(&self, enabled: bool) -> Result<(), ScanError> {
        self.send(Command::SetColorMode(enabled))
    }

    pub fn set_filter_mode(&self, enabled: bool) -> Result<(), ScanError> {
        self.send(Command::SetFilterMode(enabled))
    }

    pub fn set_bug_rotate(&self, enabled: bool) -> Result<(), ScanError> {
        self.send(Command::SetBugRotate(enabled))
    }

    /// Process everything already queued, then stop the thread.
    pub fn shutdown(mut self) -> Result<(), ScanError> {
        self.stop()
    }

    fn send(&self, command: Command) -> Result<(), ScanError> {
        self.sender
            .send(command)
            .map_err(|_| ScanError::WorkerStopped)
    }

    fn stop(&mut self) -> Result<(), ScanError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        // The thread may already be gone; joining reports a panic either way
        let _ = self.sender.send(Command::Shutdown);
        handle.join().map_err(|_| ScanError::WorkerStopped)
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Scan worker ended abnormally: {}", e);
        }
    }
}

fn run<D, C, E>(mut scanner: DocumentScanner<D, C>, events: E, receiver: Receiver<Command>, busy: BusyFlag)
where
    D: QrDecoder,
    C: Clock,
    E: ScanEvents,
{
    let mut options = EnhanceOptions::default();

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Preview(frame) => {
                let outcome = scanner.process_preview(&frame);
                events.preview_detected(&outcome.detection);

                if outcome.decision.capture {
                    // Stays busy until the picture has been processed
                    busy.set_busy();
                    events.request_picture();
                } else {
                    busy.release();
                }
            }
            Command::Picture(picture) => {
                let document = scanner.process_picture(picture, options);
                events.document_ready(document);
                busy.release();
            }
            Command::SetColorMode(enabled) => options.color_mode = enabled,
            Command::SetFilterMode(enabled) => options.filter_mode = enabled,
            Command::SetBugRotate(enabled) => scanner.set_bug_rotate(enabled),
            Command::Shutdown => break,
        }
    }

    log::info!("Scan worker stopped");
}
