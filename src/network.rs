//! 시뮬레이션 네트워크 계층
//!
//! 한 방향 링크. 세그먼트마다 드롭 / 비트 손상 / 지연을 무작위로 적용한다.
//! 도착 시각을 단조 증가로 맞춰서 순서는 절대 바꾸지 않는다.
//!
//! ```text
//!  Transport A ──send()──▶ SimulatedNetwork ──mpsc──▶ Inbound pump ──▶ Transport B
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::layer::Network;
use crate::segment::Segment;
use crate::transport::Transport;
use crate::{NetworkConfig, Result};

/// 전송 중인 세그먼트
#[derive(Debug)]
struct InTransit {
    deliver_at: Instant,
    segment: Segment,
}

/// 링크 내부 상태
struct LinkState {
    rng: StdRng,

    /// 마지막으로 잡은 도착 시각 (재정렬 방지)
    last_delivery: Option<Instant>,
}

/// 채널 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// 전달 예약된 세그먼트 수 (손상 포함)
    pub forwarded: u64,

    /// 드롭된 세그먼트 수
    pub dropped: u64,

    /// 손상된 세그먼트 수
    pub corrupted: u64,
}

/// 손실/손상/지연이 있는 단방향 링크의 송신단
pub struct SimulatedNetwork {
    name: String,
    config: NetworkConfig,
    state: Mutex<LinkState>,
    tx: mpsc::UnboundedSender<InTransit>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    corrupted: AtomicU64,
}

/// 링크의 수신단
pub struct Inbound {
    name: String,
    rx: mpsc::UnboundedReceiver<InTransit>,
}

/// 새 단방향 링크 생성
pub fn link(name: impl Into<String>, config: NetworkConfig) -> Result<(Arc<SimulatedNetwork>, Inbound)> {
    config.validate()?;

    let name = name.into();
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (tx, rx) = mpsc::unbounded_channel();

    let network = Arc::new(SimulatedNetwork {
        name: name.clone(),
        config,
        state: Mutex::new(LinkState {
            rng,
            last_delivery: None,
        }),
        tx,
        forwarded: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
        corrupted: AtomicU64::new(0),
    });

    Ok((network, Inbound { name, rx }))
}

impl SimulatedNetwork {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
        }
    }
}

impl Network for SimulatedNetwork {
    fn send(&self, segment: Segment) {
        let mut state = self.state.lock();

        if state.rng.gen_bool(self.config.drop_probability) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("[{}] 드롭: {}", self.name, segment);
            return;
        }

        let segment = if state.rng.gen_bool(self.config.corruption_probability) {
            self.corrupted.fetch_add(1, Ordering::Relaxed);
            let bit = state.rng.gen::<usize>();
            debug!("[{}] 손상: {}", self.name, segment);
            segment.with_flipped_bit(bit)
        } else {
            segment
        };

        let delay_ms = state
            .rng
            .gen_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        let mut deliver_at = Instant::now() + Duration::from_millis(delay_ms);
        if let Some(last) = state.last_delivery {
            deliver_at = deliver_at.max(last);
        }
        state.last_delivery = Some(deliver_at);
        drop(state);

        if self.tx.send(InTransit { deliver_at, segment }).is_err() {
            debug!("[{}] 수신단 없음, 세그먼트 폐기", self.name);
            return;
        }
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }
}

impl Inbound {
    /// 도착 시각에 맞춰 대상 전송 계층으로 세그먼트를 넘기는 태스크 시작
    ///
    /// 대상이 drop되거나 링크 송신단이 사라지면 종료.
    /// 프로토콜 위반을 받으면 에러를 로그하고 에러로 종료한다.
    pub fn spawn_pump(self, target: &Arc<Transport>) -> JoinHandle<Result<()>> {
        let target = Arc::downgrade(target);
        tokio::spawn(self.pump(target))
    }

    async fn pump(mut self, target: Weak<Transport>) -> Result<()> {
        while let Some(InTransit { deliver_at, segment }) = self.rx.recv().await {
            tokio::time::sleep_until(deliver_at).await;

            let Some(transport) = target.upgrade() else {
                break;
            };
            if let Err(e) = transport.on_segment_received(segment) {
                error!("[{}] 프로토콜 위반, 링크 중단: {}", self.name, e);
                return Err(e);
            }
        }
        debug!("[{}] 링크 종료", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::testing::Collector;
    use crate::layer::testing::Recorder;
    use crate::Config;

    fn lossy(seed: u64) -> NetworkConfig {
        NetworkConfig {
            drop_probability: 0.3,
            corruption_probability: 0.3,
            min_delay_ms: 0,
            max_delay_ms: 50,
            seed: Some(seed),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lossless_link_preserves_order() {
        let (net, inbound) = link("a->b", NetworkConfig::lossless()).unwrap();
        let app = Arc::new(Collector::default());
        let bob = Transport::new(Config::default(), app.clone(), Arc::new(Recorder::default())).unwrap();
        let pump = inbound.spawn_pump(&bob);

        for seq in 0..5u32 {
            net.send(Segment::data(seq, vec![seq as u8]));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let delivered: Vec<u8> = app.payloads().iter().map(|p| p[0]).collect();
        assert_eq!(delivered, vec![0, 1, 2, 3, 4]);
        assert_eq!(net.stats(), ChannelStats { forwarded: 5, dropped: 0, corrupted: 0 });

        drop(net);
        assert!(pump.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lossy_link_never_reorders() {
        let (net, mut inbound) = link("a->b", lossy(42)).unwrap();
        for seq in 0..200u32 {
            net.send(Segment::data(seq % 10, vec![(seq % 256) as u8]));
        }

        let stats = net.stats();
        assert_eq!(stats.forwarded + stats.dropped, 200);
        assert!(stats.dropped > 0);
        assert!(stats.corrupted > 0);

        let mut last_at = None;
        let mut last_tag = None;
        while let Ok(InTransit { deliver_at, segment }) = inbound.rx.try_recv() {
            if let Some(prev) = last_at {
                assert!(deliver_at >= prev);
            }
            last_at = Some(deliver_at);

            // 손상되지 않은 것만 원래 태그를 믿을 수 있다
            if !segment.is_corrupt() {
                let tag = segment.payload()[0];
                if let Some(prev) = last_tag {
                    assert!(tag > prev);
                }
                last_tag = Some(tag);
            }
        }
    }

    #[test]
    fn test_seeded_links_are_reproducible() {
        let run = || {
            let (net, mut inbound) = link("x", lossy(7)).unwrap();
            for seq in 0..50u32 {
                net.send(Segment::data(seq % 10, vec![seq as u8]));
            }
            let mut survivors = Vec::new();
            while let Ok(t) = inbound.rx.try_recv() {
                survivors.push(t.segment);
            }
            survivors
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NetworkConfig {
            corruption_probability: -0.1,
            ..NetworkConfig::default()
        };
        assert!(link("bad", config).is_err());
    }
}
