//! Registry - 이벤트 이름 → 핸들러 목록 레지스트리
//!
//! Interior Mutability 패턴으로 thread-safe한 런타임 등록을 지원합니다.
//! 발행 중에도 등록이 가능하며, 진행 중인 발행은 디스패치 시작 시점의
//! 스냅샷으로 동작합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::invoke::Handler;

/// 기본 우선순위 - 낮을수록 먼저 정렬
pub const DEFAULT_PRIORITY: i32 = 100;

// ============================================================================
// HandlerEntry
// ============================================================================

/// 등록된 핸들러 항목 - 생성 후 불변
#[derive(Clone)]
pub struct HandlerEntry {
    /// 핸들러
    pub handler: Arc<dyn Handler>,

    /// 우선순위 (낮을수록 먼저)
    pub priority: i32,

    /// 등록 시퀀스 (priority 동률 시 tie-break)
    pub sequence: u64,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("handler", &self.handler.name())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// 이벤트 레지스트리
///
/// 이름별 핸들러 목록을 소유합니다. 같은 핸들러를 두 번 등록하면
/// 발행마다 두 번 호출됩니다 (de-dup 없음).
pub struct Registry {
    /// 항목 저장소 (RwLock으로 내부 가변성)
    entries: RwLock<HashMap<String, Vec<HandlerEntry>>>,

    /// 등록 시퀀스 카운터
    sequence: AtomicU64,
}

impl Registry {
    /// 새 레지스트리 생성
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// 핸들러 등록
    pub async fn register(&self, name: impl Into<String>, handler: Arc<dyn Handler>, priority: i32) {
        let name = name.into();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        debug!(
            event = %name,
            handler = handler.name(),
            priority,
            sequence,
            "Registering event handler"
        );

        let mut entries = self.entries.write().await;
        entries.entry(name).or_default().push(HandlerEntry {
            handler,
            priority,
            sequence,
        });
    }

    /// 이름에 등록된 핸들러 스냅샷 조회
    ///
    /// (priority 오름차순, sequence 오름차순)으로 정렬된 복사본을
    /// 반환합니다. 미등록 이름은 빈 목록입니다.
    pub async fn lookup(&self, name: &str) -> Vec<HandlerEntry> {
        let entries = self.entries.read().await;
        let mut snapshot = entries.get(name).cloned().unwrap_or_default();
        snapshot.sort_by_key(|e| (e.priority, e.sequence));
        snapshot
    }

    /// 이름에 등록된 핸들러 수
    pub async fn handler_count(&self, name: &str) -> usize {
        let entries = self.entries.read().await;
        entries.get(name).map(|v| v.len()).unwrap_or(0)
    }

    /// 등록된 모든 이벤트 이름
    pub async fn event_names(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
