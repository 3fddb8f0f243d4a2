//! 시뮬레이션 애플리케이션 계층
//!
//! - 송신측: 무작위 대문자 ASCII 청크 생성
//! - 수신측: 전달받은 페이로드 기록

use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::layer::Application;

/// 고정 크기 무작위 대문자 청크 생성기
pub struct PayloadGenerator {
    remaining: usize,
    chunk_size: usize,
    rng: StdRng,
}

impl PayloadGenerator {
    /// `count`개의 `chunk_size` 바이트 청크
    pub fn new(count: usize, chunk_size: usize, seed: Option<u64>) -> Self {
        Self {
            remaining: count,
            chunk_size,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Iterator for PayloadGenerator {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let chunk: Vec<u8> = (0..self.chunk_size)
            .map(|_| self.rng.gen_range(b'A'..=b'Z'))
            .collect();
        Some(Bytes::from(chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// 전달받은 페이로드를 순서대로 기록하는 애플리케이션
#[derive(Default)]
pub struct RecordingApplication {
    received: Mutex<Vec<Bytes>>,
    notify: Notify,
}

impl RecordingApplication {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전달받은 페이로드 목록
    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().clone()
    }

    /// 전달받은 페이로드를 이어 붙인 전체 데이터
    pub fn payload(&self) -> Vec<u8> {
        self.received.lock().concat()
    }

    pub fn delivered_count(&self) -> usize {
        self.received.lock().len()
    }

    /// `count`개가 전달될 때까지 대기. 제한 시간 안에 도달했으면 true.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.delivered_count() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.delivered_count() >= count;
            }
        }
    }
}

impl Application for RecordingApplication {
    fn deliver(&self, payload: Bytes) {
        self.received.lock().push(payload);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_shape() {
        let chunks: Vec<Bytes> = PayloadGenerator::new(4, 8, Some(1)).collect();
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(chunk.len(), 8);
            assert!(chunk.iter().all(u8::is_ascii_uppercase));
        }

        let again: Vec<Bytes> = PayloadGenerator::new(4, 8, Some(1)).collect();
        assert_eq!(chunks, again);
    }

    #[test]
    fn test_recording_concatenates() {
        let app = RecordingApplication::new();
        app.deliver(Bytes::from_static(b"AB"));
        app.deliver(Bytes::from_static(b"CD"));
        assert_eq!(app.payload(), b"ABCD".to_vec());
        assert_eq!(app.delivered_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let app = RecordingApplication::new();
        app.deliver(Bytes::from_static(b"A"));
        assert!(app.wait_for(1, Duration::from_millis(10)).await);
        assert!(!app.wait_for(2, Duration::from_millis(10)).await);
    }
}
