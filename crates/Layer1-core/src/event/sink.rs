//! Error Sink - 핸들러/디스패치 실패 보고 채널
//!
//! 엔진은 실패를 절대 호출자에게 전파하지 않고 전부 sink로 보냅니다.

use tracing::error;

use crate::error::Error;

/// 에러 보고 수신자
///
/// `report`는 절대 panic하지 않아야 합니다. 같은 실패가 호출 시점과
/// 집계 시점에 두 번 보고될 수 있습니다.
pub trait ErrorSink: Send + Sync {
    /// 실패 보고 - context는 이벤트 이름
    fn report(&self, context: &str, error: &Error);
}

/// 기본 sink - tracing으로 에러 로깅
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, context: &str, error: &Error) {
        error!(event = context, "{}", error);
    }
}
