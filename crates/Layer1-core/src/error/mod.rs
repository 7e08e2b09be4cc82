//! Error types for Pulse
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pulse 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 핸들러 관련
    // ========================================================================
    #[error("Handler error in event '{event}': {message}")]
    Handler { event: String, message: String },

    #[error("Handler panicked in event '{event}': {message}")]
    HandlerPanic { event: String, message: String },

    // ========================================================================
    // 디스패치 관련
    // ========================================================================
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

impl Error {
    /// 핸들러 에러 생성
    pub fn handler(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            event: event.into(),
            message: message.into(),
        }
    }

    /// 핸들러 패닉 에러 생성
    pub fn handler_panic(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerPanic {
            event: event.into(),
            message: message.into(),
        }
    }
}
