//! Capture gate: decides whether a preview frame should trigger a
//! full-resolution capture.
//!
//! In manual mode any detected document triggers a capture unless the
//! frame is preview-only. In automatic mode a capture also needs a page QR
//! code that has not been captured within the de-duplication window.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::page_code::PageCode;

/// Источник текущего времени (Unix, секунды)
pub trait Clock: Send {
    fn now_unix(&self) -> i64;
}

/// Системные часы
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// История принятых QR-кодов: текст → время последнего захвата
#[derive(Debug, Default, Clone)]
pub struct PageHistory {
    entries: HashMap<String, i64>,
}

impl PageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Время последнего захвата страницы
    pub fn last_seen(&self, text: &str) -> Option<i64> {
        self.entries.get(text).copied()
    }

    /// A text is fresh unless it was recorded less than `window` seconds ago.
    pub fn is_fresh(&self, text: &str, now: i64, window: i64) -> bool {
        match self.entries.get(text) {
            Some(&seen) => seen <= now - window,
            None => true,
        }
    }

    /// Record `text` at `now`, dropping entries that can no longer block a
    /// capture.
    pub fn record(&mut self, text: &str, now: i64, window: i64) {
        self.entries.retain(|_, seen| *seen > now - window);
        self.entries.insert(text.to_string(), now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Флаги режима съёмки для одного превью-кадра
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMode {
    pub auto_mode: bool,
    pub preview_only: bool,
}

/// Состояние шлюза
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Idle,
    AwaitingCapture,
}

/// Решение по одному превью-кадру
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDecision {
    /// Запросить полноразмерный снимок
    pub capture: bool,
    /// Принятый QR-код страницы (если есть)
    pub page: Option<PageCode>,
    /// Текст принятого QR-кода
    pub qr_text: Option<String>,
}

/// Шлюз захвата
pub struct CaptureGate<C: Clock = SystemClock> {
    history: PageHistory,
    clock: C,
    window_secs: i64,
    state: GateState,
}

impl CaptureGate<SystemClock> {
    pub fn new(window_secs: i64) -> Self {
        Self::with_clock(window_secs, SystemClock)
    }
}

impl<C: Clock> CaptureGate<C> {
    pub fn with_clock(window_secs: i64, clock: C) -> Self {
        Self {
            history: PageHistory::new(),
            clock,
            window_secs,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn history(&self) -> &PageHistory {
        &self.history
    }

    /// First decoded text that is a page code and outside the window.
    pub fn accept_qr<'a>(&self, texts: &'a [String], now: i64) -> Option<(&'a str, PageCode)> {
        for text in texts {
            match PageCode::parse(text) {
                Ok(code) if self.history.is_fresh(text, now, self.window_secs) => {
                    log::debug!("QR Code valid: {}", text);
                    return Some((text.as_str(), code));
                }
                Ok(_) => log::debug!("QR Code ignored (seen recently): {}", text),
                Err(_) => log::debug!("QR Code ignored: {}", text),
            }
        }
        None
    }

    /// Evaluate one preview frame.
    ///
    /// Moves to `AwaitingCapture` when a capture is requested; the accepted
    /// QR text is recorded only in that case.
    pub fn evaluate(&mut self, document_detected: bool, mode: CaptureMode, qr_texts: &[String]) -> CaptureDecision {
        let now = self.clock.now_unix();
        let accepted = self.accept_qr(qr_texts, now);
        let qr_ok = accepted.is_some();

        let capture = document_detected
            && ((!mode.auto_mode && !mode.preview_only) || (mode.auto_mode && qr_ok));

        if !capture {
            return CaptureDecision {
                capture: false,
                page: None,
                qr_text: None,
            };
        }

        self.state = GateState::AwaitingCapture;
        let (qr_text, page) = match accepted {
            Some((text, code)) => {
                let text = text.to_string();
                self.history.record(&text, now, self.window_secs);
                log::info!("QR Code scanned: {}", text);
                (Some(text), Some(code))
            }
            None => (None, None),
        };

        CaptureDecision {
            capture: true,
            page,
            qr_text,
        }
    }

    /// Called once the requested capture has been processed.
    pub fn capture_finished(&mut self) {
        self.state = GateState::Idle;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Ручные часы для тестов
    #[derive(Clone, Default)]
    pub(crate) struct ManualClock(pub Arc<AtomicI64>);

    impl ManualClock {
        pub fn at(now: i64) -> Self {
            Self(Arc::new(AtomicI64::new(now)))
        }

        pub fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_unix(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const AUTO: CaptureMode = CaptureMode { auto_mode: true, preview_only: false };
    const MANUAL: CaptureMode = CaptureMode { auto_mode: false, preview_only: false };

    fn qr(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    #[test]
    fn test_manual_mode_ignores_qr() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        assert!(gate.evaluate(true, MANUAL, &[]).capture);
        assert_eq!(gate.state(), GateState::AwaitingCapture);
        assert!(!gate.evaluate(false, MANUAL, &[]).capture);
    }

    #[test]
    fn test_manual_capture_records_qr() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        let decision = gate.evaluate(true, MANUAL, &qr("P01 V02 S3"));
        assert!(decision.capture);
        assert_eq!(decision.qr_text.as_deref(), Some("P01 V02 S3"));
        assert_eq!(gate.history().last_seen("P01 V02 S3"), Some(1000));

        // The same page is then blocked for auto capture
        gate.capture_finished();
        assert!(!gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);
    }

    #[test]
    fn test_preview_only_never_captures_in_manual_mode() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        let mode = CaptureMode { auto_mode: false, preview_only: true };
        assert!(!gate.evaluate(true, mode, &qr("P01 V01 S1")).capture);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn test_auto_mode_requires_qr() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        assert!(!gate.evaluate(true, AUTO, &[]).capture);
        assert!(!gate.evaluate(true, AUTO, &qr("hello")).capture);

        let decision = gate.evaluate(true, AUTO, &qr("P01 V02 S3"));
        assert!(decision.capture);
        assert_eq!(decision.qr_text.as_deref(), Some("P01 V02 S3"));
        assert_eq!(decision.page.map(|p| p.sequence), Some("3".to_string()));
    }

    #[test]
    fn test_duplicate_within_window_captures_once() {
        let clock = ManualClock::at(1000);
        let mut gate = CaptureGate::with_clock(15, clock.clone());

        assert!(gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);
        gate.capture_finished();
        clock.advance(14);
        assert!(!gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);

        // Exactly 15 seconds later the code is acceptable again
        clock.advance(1);
        assert!(gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);
    }

    #[test]
    fn test_different_page_not_blocked() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        assert!(gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);
        assert!(gate.evaluate(true, AUTO, &qr("P01 V02 S4")).capture);
    }

    #[test]
    fn test_first_fresh_code_wins() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        gate.evaluate(true, AUTO, &qr("P01 V02 S3"));

        let texts = vec!["P01 V02 S3".to_string(), "junk".to_string(), "P01 V02 S9".to_string()];
        let decision = gate.evaluate(true, AUTO, &texts);
        assert_eq!(decision.qr_text.as_deref(), Some("P01 V02 S9"));
    }

    #[test]
    fn test_no_document_does_not_record() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(1000));
        assert!(!gate.evaluate(false, AUTO, &qr("P01 V02 S3")).capture);
        assert!(gate.history().is_empty());
        assert!(gate.evaluate(true, AUTO, &qr("P01 V02 S3")).capture);
    }

    #[test]
    fn test_history_purges_expired_entries() {
        let mut history = PageHistory::new();
        history.record("a", 100, 15);
        history.record("b", 110, 15);
        assert_eq!(history.len(), 2);

        history.record("c", 120, 15);
        assert_eq!(history.last_seen("a"), None);
        assert_eq!(history.last_seen("b"), Some(110));
        assert_eq!(history.last_seen("c"), Some(120));
    }

    #[test]
    fn test_capture_finished_resets_state() {
        let mut gate = CaptureGate::with_clock(15, ManualClock::at(0));
        gate.evaluate(true, MANUAL, &[]);
        gate.capture_finished();
        assert_eq!(gate.state(), GateState::Idle);
    }
}
