//! Event Bus - 이벤트 디스패치 엔진
//!
//! 이름 기반 발행/구독 시스템을 제공합니다. 등록된 핸들러를 단일 경로
//! 또는 bounded fan-out으로 호출하고, 결과를 집계한 뒤 후속 이벤트를
//! 캐스케이드합니다.
//!
//! ## 사용법
//!
//! ```ignore
//! use std::sync::Arc;
//! use pulse_core::{EventArgs, EventBus, FireOptions};
//!
//! let bus = EventBus::new();
//!
//! // 1. 핸들러 등록
//! bus.register_fn("movie.search", |call| async move {
//!     Ok(serde_json::json!(["result"]))
//! }).await;
//!
//! // 2. 이벤트 발행
//! let results = bus.fire("movie.search", EventArgs::new(), FireOptions::new()).await;
//!
//! // 3. fire-and-forget
//! bus.fire_async("movie.search.done", EventArgs::new());
//! ```

use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use futures::FutureExt;

use super::aggregate::aggregate;
use super::invoke::{panic_message, FnHandler, Handler, Invoker};
use super::registry::{HandlerEntry, Registry, DEFAULT_PRIORITY};
use super::sink::{ErrorSink, TracingSink};
use super::types::{is_truthy, EventArgs, FireOptions, OrderToken, Outcome};
use crate::error::{Error, Result};

// ============================================================================
// EventBusConfig
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 발행 1회당 동시 실행 핸들러 상한
    pub fan_out_limit: usize,

    /// 등록 시 기본 우선순위
    pub default_priority: i32,

    /// 디버그 모드 (모든 발행 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            fan_out_limit: 10,
            default_priority: DEFAULT_PRIORITY,
            debug_mode: false,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스
///
/// 시스템 전체의 이벤트 등록/발행을 담당합니다. 전역 상태가 아니라
/// 명시적으로 생성하여 컴포넌트에 주입합니다. `Clone`은 같은 레지스트리를
/// 공유하는 가벼운 핸들입니다.
#[derive(Clone)]
pub struct EventBus {
    /// 설정
    config: EventBusConfig,

    /// 핸들러 레지스트리
    registry: Arc<Registry>,

    /// 핸들러 호출기
    invoker: Arc<Invoker>,

    /// 에러 보고 채널
    sink: Arc<dyn ErrorSink>,
}

impl EventBus {
    /// 기본 설정으로 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// 커스텀 sink로 생성 (테스트, 외부 로깅 연동)
    pub fn with_sink(config: EventBusConfig, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new()),
            invoker: Arc::new(Invoker::new(sink.clone())),
            sink,
        }
    }

    /// 레지스트리 접근 (introspection)
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 기본 우선순위로 핸들러 등록
    pub async fn register(&self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.register_with_priority(name, handler, self.config.default_priority)
            .await;
    }

    /// 우선순위를 지정하여 핸들러 등록
    ///
    /// 낮은 priority가 먼저 정렬됩니다. 같은 핸들러를 두 번 등록하면
    /// 발행마다 두 번 호출됩니다.
    pub async fn register_with_priority(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
        priority: i32,
    ) {
        self.registry.register(name, handler, priority).await;
    }

    /// async 클로저를 기본 우선순위로 등록
    pub async fn register_fn<F, Fut>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(super::types::HandlerCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let priority = self.config.default_priority;
        self.register_fn_with_priority(name, priority, func).await;
    }

    /// async 클로저를 우선순위 지정하여 등록
    pub async fn register_fn_with_priority<F, Fut>(
        &self,
        name: impl Into<String>,
        priority: i32,
        func: F,
    ) where
        F: Fn(super::types::HandlerCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let handler = Arc::new(FnHandler::new(name.clone(), func));
        self.registry.register(name, handler, priority).await;
    }

    // ========================================================================
    // 발행
    // ========================================================================

    /// 이벤트 발행
    ///
    /// 등록된 모든 핸들러를 호출하고 옵션에 따라 집계된 결과를 반환합니다.
    /// 핸들러 실패든 엔진 내부 실패든 이 경계를 넘어 전파되지 않습니다.
    /// 등록된 핸들러가 없으면 아무 일도 하지 않고 `None`을 반환합니다.
    pub async fn fire(&self, name: &str, args: EventArgs, options: FireOptions) -> Option<Value> {
        match AssertUnwindSafe(self.dispatch(name, args, options))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                self.sink
                    .report(name, &Error::Dispatch(panic_message(panic.as_ref())));
                None
            }
        }
    }

    /// fire-and-forget 발행
    ///
    /// 전체 디스패치를 분리된 태스크에서 실행합니다. 스케줄링 성공 여부만
    /// 반환하며 디스패치 결과는 버려집니다. 결과가 필요하면
    /// `FireOptions::with_on_complete`를 쓰세요.
    pub fn fire_async(&self, name: &str, args: EventArgs) -> bool {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let bus = self.clone();
                let name = name.to_string();
                handle.spawn(async move {
                    bus.fire(&name, args, FireOptions::new()).await;
                });
                true
            }
            Err(e) => {
                self.sink.report(name, &Error::Scheduling(e.to_string()));
                false
            }
        }
    }

    // ========================================================================
    // 내부 디스패치
    // ========================================================================

    async fn dispatch(&self, name: &str, args: EventArgs, options: FireOptions) -> Option<Value> {
        // 디스패치 시작 시점의 스냅샷 - 진행 중 등록은 이번 발행에 반영 안 됨
        let entries = self.registry.lookup(name).await;
        if entries.is_empty() {
            return None;
        }

        if self.config.debug_mode {
            trace!(event = name, handlers = entries.len(), "Firing event");
        }

        let mut outcomes = if entries.len() == 1 {
            // 단일 핸들러는 호출자 태스크에서 인라인 실행
            vec![
                self.invoker
                    .invoke(name, &entries[0], args, None)
                    .await,
            ]
        } else {
            let want_order = options.single || options.in_order;
            self.fan_out(name, &entries, args, want_order).await
        };

        // 완료 순서와 무관하게 항상 (priority, sequence) 순으로 제시
        outcomes.sort_by_key(|o| (o.priority, o.sequence));

        let result = aggregate(name, outcomes, &options, self.sink.as_ref());
        self.post_process(name, result, options).await
    }

    /// 다중 핸들러 fan-out
    ///
    /// 핸들러마다 태스크를 spawn하고 semaphore로 동시 실행을 상한까지
    /// 제한합니다. 제출된 모든 호출이 끝날 때까지 기다립니다 (타임아웃,
    /// 취소 없음).
    async fn fan_out(
        &self,
        name: &str,
        entries: &[HandlerEntry],
        args: EventArgs,
        want_order: bool,
    ) -> Vec<Outcome> {
        // FireOptions는 on_complete(FnOnce) 탓에 Sync가 아니라서 await 너머로
        // 참조를 들고 오지 않음 - fire의 future가 Send여야 spawn 가능
        let order = if want_order {
            Some(OrderToken::new())
        } else {
            None
        };
        let semaphore = Arc::new(Semaphore::new(self.config.fan_out_limit));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            let entry = entry.clone();
            let args = args.clone();
            let order = order.clone();
            let name = name.to_string();
            let invoker = Arc::clone(&self.invoker);
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                invoker.invoke(&name, &entry, args, order).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, entry) in handles.into_iter().zip(entries) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // invoke가 panic을 잡으므로 여기 도달은 이례적
                    warn!(event = name, "Handler task failed to join: {}", e);
                    outcomes.push(Outcome {
                        priority: entry.priority,
                        sequence: entry.sequence,
                        result: Err(Error::Dispatch(e.to_string())),
                    });
                }
            }
        }

        outcomes
    }

    /// 집계 이후의 후처리
    ///
    /// 결과 재작성 훅(`<name>.result.modify`)과 후속 이벤트(`<name>.after`)를
    /// 발행합니다. 내부 발행은 `is_after_event`가 강제되어 캐스케이드가
    /// 재귀하지 않습니다.
    async fn post_process(
        &self,
        name: &str,
        mut result: Option<Value>,
        options: FireOptions,
    ) -> Option<Value> {
        if !options.is_after_event {
            // 결과 재작성 훅
            let modify_name = format!("{name}.result.modify");
            let modify_args = EventArgs::positional(result.clone().unwrap_or(Value::Null));
            let modified = Box::pin(self.fire(
                &modify_name,
                modify_args,
                FireOptions::new().with_single().with_after_event(),
            ))
            .await;
            if let Some(value) = modified {
                if is_truthy(&value) {
                    debug!(event = name, "Returning modified result");
                    result = Some(value);
                }
            }

            // 후속 이벤트 - 반환 값은 버림
            let after_name = format!("{name}.after");
            let _ = Box::pin(self.fire(
                &after_name,
                EventArgs::new(),
                FireOptions::new().with_after_event(),
            ))
            .await;
        }

        if let Some(on_complete) = options.on_complete {
            on_complete();
        }

        result
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
