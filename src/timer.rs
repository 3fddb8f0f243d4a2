//! 재전송 타이머
//!
//! 전송 인스턴스당 논리 타이머는 하나뿐이며 항상 base 세그먼트 기준이다.
//! 타이머는 송신 상태가 소유하는 마감 시각 값이다:
//! 재무장은 마감 시각 교체이고 별도 스레드를 만들지 않는다.
//! 마감 시각을 실제로 기다리는 쪽은 [`crate::Transport::spawn_timer`] 태스크.

use std::time::Duration;

use tokio::time::Instant;

/// 단일 재전송 타이머
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    /// 타임아웃 간격
    timeout: Duration,

    /// 무장된 마감 시각
    deadline: Option<Instant>,

    /// 무장 횟수 (재무장 추적용)
    generation: u64,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            generation: 0,
        }
    }

    /// 기존 마감 시각을 버리고 `now + timeout`으로 무장
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
        self.generation += 1;
    }

    /// 해제 (이미 해제 상태여도 무방)
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 무장 상태이고 마감 시각이 지났는지
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }
}
