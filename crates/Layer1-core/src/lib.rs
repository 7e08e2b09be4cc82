//! # pulse-core
//!
//! Core layer for Pulse:
//! - Event: 이벤트 등록/발행 엔진 (Registry, Dispatcher, Aggregator)
//! - Error: 중앙 에러 타입 (Error, Result)
//!
//! 모든 플러그인, 프로바이더, 서브시스템은 이름 기반 이벤트에 핸들러를
//! 등록하고 이벤트를 발행하는 방식으로만 통신합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  EventBus                                                │
//! │  ├── Registry (name → ordered handlers)                 │
//! │  ├── Invoker  (hooks + 장애 격리)                        │
//! │  ├── fan-out  (tokio::spawn, Semaphore ceiling)         │
//! │  ├── Aggregator (single / list / merge)                 │
//! │  └── post-process                                       │
//! │        ├── <name>.result.modify (결과 재작성)            │
//! │        └── <name>.after (후속 이벤트)                    │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod event;

pub use error::{Error, Result};
pub use event::{
    ErrorSink, EventArgs, EventBus, EventBusConfig, FireOptions, FnHandler, Handler, HandlerCall,
    HandlerLifecycle, OrderToken, Registry, TracingSink,
};
