//! Модуль разбора QR-кода страницы
//!
//! Распечатанные шаблоны несут QR вида `P01 V02 S1234`:
//! - `P..`: идентификатор шаблона страницы (два любых символа)
//! - `V..`: версия шаблона (два любых символа)
//! - `S<цифры>`: порядковый номер листа

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ошибки разбора
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageCodeError {
    #[error("Text does not match the page code pattern: {0:?}")]
    Pattern(String),
}

/// Разобранный код страницы
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCode {
    /// Шаблон страницы
    pub page: String,
    /// Версия шаблона
    pub version: String,
    /// Порядковый номер (как в QR, без нормализации)
    pub sequence: String,
}

impl PageCode {
    /// Разбор текста QR. Шаблон должен совпасть со всей строкой.
    pub fn parse(text: &str) -> Result<Self, PageCodeError> {
        let err = || PageCodeError::Pattern(text.to_string());
        let chars: Vec<char> = text.chars().collect();

        // "P" + 2 + " V" + 2 + " S" + at least one digit
        if chars.len() < 10 {
            return Err(err());
        }

        let page = field(&chars, 0, 'P').ok_or_else(err)?;
        if chars[3] != ' ' {
            return Err(err());
        }
        let version = field(&chars, 4, 'V').ok_or_else(err)?;
        if chars[7] != ' ' || chars[8] != 'S' {
            return Err(err());
        }

        let sequence: String = chars[9..].iter().collect();
        if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        Ok(Self { page, version, sequence })
    }

    /// Проверка без выделения результата
    pub fn matches(text: &str) -> bool {
        Self::parse(text).is_ok()
    }
}

/// Letter at `start` followed by two arbitrary non-line-terminator chars
fn field(chars: &[char], start: usize, letter: char) -> Option<String> {
    if chars[start] != letter {
        return None;
    }
    let value = &chars[start + 1..start + 3];
    if value.iter().any(|c| is_line_terminator(*c)) {
        return None;
    }
    Some(value.iter().collect())
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let code = PageCode::parse("P01 V02 S1234").unwrap();
        assert_eq!(code.page, "01");
        assert_eq!(code.version, "02");
        assert_eq!(code.sequence, "1234");
    }

    #[test]
    fn test_any_chars_in_short_fields() {
        assert!(PageCode::matches("PAx V.9 S0"));
        assert!(PageCode::matches("P   V   S7"));
    }

    #[test]
    fn test_whole_string_must_match() {
        assert!(!PageCode::matches("P01 V02 S12a"));
        assert!(!PageCode::matches("xP01 V02 S12"));
        assert!(!PageCode::matches("P01 V02 S"));
        assert!(!PageCode::matches("P01 V02 S12\n"));
        assert!(!PageCode::matches("P01V02S12"));
        assert!(!PageCode::matches("https://example.com"));
        assert!(!PageCode::matches(""));
    }

    #[test]
    fn test_line_terminator_not_any_char() {
        assert!(!PageCode::matches("P0\n V02 S1"));
    }

    #[test]
    fn test_error_carries_text() {
        assert_eq!(
            PageCode::parse("nope"),
            Err(PageCodeError::Pattern("nope".to_string()))
        );
    }
}
