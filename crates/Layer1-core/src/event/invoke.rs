//! Handler Invoker - 핸들러 1회 호출의 래핑
//!
//! 라이프사이클 훅 실행과 장애 격리를 담당합니다. 핸들러 본문이나 훅에서
//! 무엇이 실패하든 호출자에게는 태그된 `Outcome`만 돌아갑니다.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::registry::HandlerEntry;
use super::sink::ErrorSink;
use super::types::{EventArgs, HandlerCall, OrderToken, Outcome};
use crate::error::{Error, Result};

// ============================================================================
// Handler Trait
// ============================================================================

/// 이벤트 핸들러 trait
///
/// 이벤트에 반응하는 컴포넌트가 구현합니다. 반환 값이 falsy면
/// "핸들러가 응답을 거절함"으로 집계에서 제외됩니다.
#[async_trait]
pub trait Handler: Send + Sync {
    /// 핸들러 이름 (디버깅용)
    fn name(&self) -> &str {
        "handler"
    }

    /// 이벤트 처리
    async fn call(&self, call: &HandlerCall) -> Result<Value>;

    /// 라이프사이클 훅 (지원하는 핸들러만 Some 반환)
    fn lifecycle(&self) -> Option<&dyn HandlerLifecycle> {
        None
    }
}

/// 핸들러 라이프사이클 훅
///
/// 본문 직전/직후에 best-effort로 호출됩니다. 훅 실패는 보고만 되고
/// 핸들러 본문의 결과에는 영향을 주지 않습니다. `after_call`은 본문이
/// 실패해도 무조건 호출됩니다.
#[async_trait]
pub trait HandlerLifecycle: Send + Sync {
    /// 본문 직전 호출
    async fn before_call(&self) -> Result<()> {
        Ok(())
    }

    /// 본문 직후 무조건 호출
    async fn after_call(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// FnHandler - 클로저 어댑터
// ============================================================================

/// 클로저를 핸들러로 감싸는 어댑터
///
/// trait 구현 없이 async 클로저를 바로 등록할 때 사용합니다.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F> {
    /// 새 어댑터 생성
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, call: &HandlerCall) -> Result<Value> {
        (self.func)(call.clone()).await
    }
}

// ============================================================================
// Invoker
// ============================================================================

/// 핸들러 호출기
///
/// 훅 + 본문을 실행하고 panic까지 격리하여 `Outcome`으로 변환합니다.
pub(crate) struct Invoker {
    sink: Arc<dyn ErrorSink>,
}

impl Invoker {
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self { sink }
    }

    /// 핸들러 1회 호출
    pub async fn invoke(
        &self,
        event: &str,
        entry: &HandlerEntry,
        args: EventArgs,
        order: Option<OrderToken>,
    ) -> Outcome {
        let call = HandlerCall::new(event, args, order);
        let handler = &entry.handler;

        // Open hook
        if let Some(hooks) = handler.lifecycle() {
            if let Err(e) = self.run_hook(event, hooks.before_call()).await {
                self.sink.report(event, &e);
            }
        }

        // Main body
        let result = match AssertUnwindSafe(handler.call(&call)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e),
            Err(panic) => Err(Error::handler_panic(event, panic_message(panic.as_ref()))),
        };

        // Close hook - 본문 실패 여부와 무관하게 실행
        if let Some(hooks) = handler.lifecycle() {
            if let Err(e) = self.run_hook(event, hooks.after_call()).await {
                self.sink.report(event, &e);
            }
        }

        if let Err(ref e) = result {
            self.sink.report(event, e);
        }

        Outcome {
            priority: entry.priority,
            sequence: entry.sequence,
            result,
        }
    }

    async fn run_hook(
        &self,
        event: &str,
        hook: impl Future<Output = Result<()>>,
    ) -> Result<()> {
        match AssertUnwindSafe(hook).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(Error::handler_panic(event, panic_message(panic.as_ref()))),
        }
    }
}

/// panic payload에서 메시지 추출
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
