//! Event System - 이벤트 등록/발행 엔진
//!
//! 모든 서브시스템이 프로그래밍하는 계약:
//!
//! - `register(name, handler, priority)` — 이름에 핸들러 등록
//! - `fire(name, args, options)` — 핸들러 호출 + 결과 집계
//! - `fire_async(name, args)` — fire-and-forget
//!
//! 엔진이 스스로 발행하는 합성 이벤트:
//!
//! - `<name>.result.modify` — 집계 결과 재작성 훅 (single 모드로 발행)
//! - `<name>.after` — 디스패치 완료 후 발행, 결과는 버려짐
//!
//! 핸들러 실패는 전부 sink로 격리되며 발행 호출자에게 전파되지 않습니다.

pub mod bus;
pub mod registry;
pub mod sink;
pub mod types;

mod aggregate;
mod invoke;

// Re-exports
pub use bus::{EventBus, EventBusConfig};
pub use invoke::{FnHandler, Handler, HandlerLifecycle};
pub use registry::{HandlerEntry, Registry, DEFAULT_PRIORITY};
pub use sink::{ErrorSink, TracingSink};
pub use types::{is_truthy, EventArgs, FireOptions, HandlerCall, OrderToken, Outcome};
