//! Event Types - 디스패치 엔진의 공용 타입 정의
//!
//! 이벤트 인자, 발행 옵션, 호출 컨텍스트, 호출 결과를 정의합니다.
//! 인자와 결과 값은 모두 `serde_json::Value`로 표현됩니다.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Error;

// ============================================================================
// EventArgs - 이벤트 인자
// ============================================================================

/// 이벤트 인자 - positional / keyword 인자의 묶음
///
/// 핸들러에 전달되는 값은 전부 `Value`이므로 서로 모르는 서브시스템끼리도
/// 같은 이벤트를 공유할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    /// Positional 인자 (등록 순서 유지)
    pub args: Vec<Value>,

    /// Keyword 인자
    pub kwargs: Map<String, Value>,
}

impl EventArgs {
    /// 빈 인자 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional 인자 하나로 생성
    pub fn positional(value: Value) -> Self {
        Self {
            args: vec![value],
            kwargs: Map::new(),
        }
    }

    /// Positional 인자 추가
    pub fn with_arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Keyword 인자 추가
    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// n번째 positional 인자 조회
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword 인자 조회
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

// ============================================================================
// FireOptions - 발행 옵션
// ============================================================================

/// 발행 옵션
///
/// 모든 플래그는 기본적으로 꺼져 있습니다. `is_after_event`는 엔진이
/// 후속 이벤트(`<name>.after`, `<name>.result.modify`)를 발행할 때
/// 내부적으로 강제 설정됩니다.
#[derive(Default)]
pub struct FireOptions {
    /// 후속 이벤트 여부 (내부 발행 시 강제 true, 캐스케이드 차단)
    pub is_after_event: bool,

    /// 첫 번째 유효 결과만 반환
    pub single: bool,

    /// dict/list 결과를 deep-merge
    pub merge: bool,

    /// 핸들러 간 자율 순서화를 위한 order token 공유
    pub in_order: bool,

    /// 디스패치 완료 직후, 반환 직전에 호출되는 콜백
    pub on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl FireOptions {
    /// 기본 옵션 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// single 모드 설정
    pub fn with_single(mut self) -> Self {
        self.single = true;
        self
    }

    /// merge 모드 설정
    pub fn with_merge(mut self) -> Self {
        self.merge = true;
        self
    }

    /// in_order 설정
    pub fn with_in_order(mut self) -> Self {
        self.in_order = true;
        self
    }

    /// 후속 이벤트로 표시
    pub fn with_after_event(mut self) -> Self {
        self.is_after_event = true;
        self
    }

    /// 완료 콜백 설정
    pub fn with_on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for FireOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FireOptions")
            .field("is_after_event", &self.is_after_event)
            .field("single", &self.single)
            .field("merge", &self.merge)
            .field("in_order", &self.in_order)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

// ============================================================================
// OrderToken - 자율 순서화 토큰
// ============================================================================

/// 자율 순서화 토큰 (advisory lock)
///
/// `single` 또는 `in_order`가 요청된 발행에서 한 번 생성되어 해당 발행의
/// 모든 핸들러 호출에 공유됩니다. 엔진이 실행 순서를 강제하지는 않으며,
/// 협조하는 핸들러가 스스로 임계 구역을 직렬화할 때 사용합니다.
#[derive(Clone)]
pub struct OrderToken(Arc<Mutex<()>>);

impl OrderToken {
    /// 새 토큰 생성 (발행 1회당 하나)
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(())))
    }

    /// 토큰 획득 - guard가 살아 있는 동안 같은 발행의 다른 협조 핸들러를
    /// 임계 구역 밖에서 대기시킵니다.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

impl std::fmt::Debug for OrderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderToken").finish()
    }
}

// ============================================================================
// HandlerCall - 호출 컨텍스트
// ============================================================================

/// 핸들러 호출 컨텍스트
///
/// 핸들러 한 번의 호출에 전달되는 모든 것: 이벤트 이름, 인자,
/// (있다면) order token.
#[derive(Debug, Clone)]
pub struct HandlerCall {
    event: String,
    args: EventArgs,
    order: Option<OrderToken>,
}

impl HandlerCall {
    pub(crate) fn new(event: impl Into<String>, args: EventArgs, order: Option<OrderToken>) -> Self {
        Self {
            event: event.into(),
            args,
            order,
        }
    }

    /// 이벤트 이름
    pub fn event(&self) -> &str {
        &self.event
    }

    /// 이벤트 인자
    pub fn args(&self) -> &EventArgs {
        &self.args
    }

    /// n번째 positional 인자 조회
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.arg(index)
    }

    /// Keyword 인자 조회
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.args.kwarg(key)
    }

    /// Order token 조회 (`single`/`in_order` 발행에서만 존재)
    pub fn order_token(&self) -> Option<&OrderToken> {
        self.order.as_ref()
    }
}

// ============================================================================
// Outcome - 호출 결과
// ============================================================================

/// 핸들러 호출 1회의 결과
///
/// 실패는 예외가 아닌 값으로 전달됩니다. 발행 호출자에게는 절대
/// 전파되지 않습니다.
#[derive(Debug)]
pub struct Outcome {
    /// 등록 시 우선순위 (낮을수록 먼저)
    pub priority: i32,

    /// 등록 시퀀스 (priority 동률 시 tie-break)
    pub sequence: u64,

    /// 호출 결과 값 또는 에러
    pub result: Result<Value, Error>,
}

impl Outcome {
    /// 성공 여부
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// 성공 값 조회
    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }
}

// ============================================================================
// Truthiness
// ============================================================================

/// 값의 유효성 판정 - 비어 있는 값은 "핸들러가 응답을 거절함"으로 취급
///
/// `Null`, `false`, `0`, `""`, `[]`, `{}`는 falsy, 나머지는 truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
