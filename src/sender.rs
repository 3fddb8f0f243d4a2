//! 송신측 GBN 상태 기계
//!
//! - 최대 N개 세그먼트를 ACK 없이 전송
//! - 윈도우가 차면 페이로드를 FIFO 대기열에 보관 (호출자는 막히지 않음)
//! - 누적 ACK로 윈도우 전진, 타임아웃 시 base부터 전체 재전송
//!
//! ```text
//!   base              next_seqnum
//!    │                     │
//! ───┼─────────────────────┼──────────────▶ (mod 2N)
//!    │ <── in flight ────▶ │ <── 전송 가능 ──▶
//!    │ <────────── window N ─────────▶ │
//! ```

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tokio::time::Instant;
use tracing::debug;

use crate::layer::Network;
use crate::segment::{Segment, SeqNum};
use crate::stats::TransportStats;
use crate::timer::RetransmitTimer;
use crate::Config;

/// 송신 윈도우 상태 (전송 인스턴스 락 안에서만 변경)
#[derive(Debug, Clone)]
pub struct SendWindow {
    /// ACK되지 않은 가장 오래된 시퀀스 번호
    base: SeqNum,

    /// 다음에 할당할 시퀀스 번호
    next_seqnum: SeqNum,

    /// 윈도우 크기 N
    window_size: usize,

    /// 시퀀스 공간 크기 (2N)
    seqnum_space: u32,

    /// 전송했지만 ACK되지 않은 세그먼트 (재전송용 원본 그대로)
    in_flight: HashMap<SeqNum, Segment>,

    /// 윈도우가 가득 찬 동안 넘겨받은 페이로드
    pending: VecDeque<Bytes>,

    /// base 세그먼트 기준 재전송 타이머
    timer: RetransmitTimer,
}

impl SendWindow {
    pub fn new(config: &Config) -> Self {
        Self {
            base: 0,
            next_seqnum: 0,
            window_size: config.window_size,
            seqnum_space: config.seqnum_space(),
            in_flight: HashMap::with_capacity(config.window_size),
            pending: VecDeque::new(),
            timer: RetransmitTimer::new(config.timeout()),
        }
    }

    pub fn base(&self) -> SeqNum {
        self.base
    }

    pub fn next_seqnum(&self) -> SeqNum {
        self.next_seqnum
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    pub(crate) fn cancel_timer(&mut self) {
        self.timer.cancel();
    }

    /// `(a - b) mod 2N`
    fn distance(&self, a: SeqNum, b: SeqNum) -> u32 {
        (a + self.seqnum_space - b) % self.seqnum_space
    }

    /// seqnum이 반개구간 `[base, base + N)` 안인지
    fn in_window(&self, seqnum: SeqNum) -> bool {
        (self.distance(seqnum, self.base) as usize) < self.window_size
    }

    fn has_room(&self) -> bool {
        self.in_flight.len() < self.window_size && self.in_window(self.next_seqnum)
    }

    /// 애플리케이션 페이로드 제출
    ///
    /// 대기열이 비어 있지 않으면 그 뒤에 붙여 제출 순서를 지킨다.
    pub fn submit(
        &mut self,
        payload: Bytes,
        network: &dyn Network,
        stats: &mut TransportStats,
        now: Instant,
    ) {
        if !self.pending.is_empty() {
            self.enqueue(payload, stats);
            self.drain_pending(network, stats, now);
            return;
        }
        self.submit_locked(payload, network, stats, now);
    }

    /// 대기열을 거치지 않는 제출 (drain에서 재진입)
    fn submit_locked(
        &mut self,
        payload: Bytes,
        network: &dyn Network,
        stats: &mut TransportStats,
        now: Instant,
    ) {
        if !self.has_room() {
            self.enqueue(payload, stats);
            return;
        }

        let seqnum = self.next_seqnum;
        let segment = Segment::data(seqnum, payload);

        let was_empty = self.in_flight.is_empty();
        self.in_flight.insert(seqnum, segment.clone());
        if was_empty {
            self.timer.arm(now);
            debug!("타이머 시작: base={}", self.base);
        }

        network.send(segment);
        stats.segments_sent += 1;

        self.next_seqnum = (self.next_seqnum + 1) % self.seqnum_space;
        debug!(
            "DATA {} 전송: base={}, next={}, in_flight={}/{}",
            seqnum,
            self.base,
            self.next_seqnum,
            self.in_flight.len(),
            self.window_size
        );
    }

    fn enqueue(&mut self, payload: Bytes, stats: &mut TransportStats) {
        self.pending.push_back(payload);
        stats.queued += 1;
        debug!(
            "윈도우 가득 참, 대기열 {}: base={}, next={}",
            self.pending.len(),
            self.base,
            self.next_seqnum
        );
    }

    /// 체크섬이 유효한 ACK 처리
    ///
    /// 윈도우를 전진시켰으면 true.
    pub fn on_ack(
        &mut self,
        acknum: SeqNum,
        network: &dyn Network,
        stats: &mut TransportStats,
        now: Instant,
    ) -> bool {
        let dist = self.distance(acknum, self.base);
        if dist == 0 || dist as usize > self.window_size {
            stats.duplicate_acks += 1;
            debug!("중복 ACK {}: base={}", acknum, self.base);
            return false;
        }

        for offset in 0..dist {
            self.in_flight.remove(&((self.base + offset) % self.seqnum_space));
        }
        self.base = acknum;

        if self.in_flight.is_empty() {
            self.next_seqnum = self.base;
            self.timer.cancel();
        } else {
            self.timer.arm(now);
        }
        debug!(
            "ACK {}: base={}, next={}, in_flight={}",
            acknum,
            self.base,
            self.next_seqnum,
            self.in_flight.len()
        );

        self.drain_pending(network, stats, now);
        true
    }

    /// 타임아웃: base부터 next_seqnum 전까지 원본 세그먼트를 오름차순 재전송
    ///
    /// 타이머가 무장되어 있지 않으면 아무것도 하지 않고 false.
    pub fn on_timeout(
        &mut self,
        network: &dyn Network,
        stats: &mut TransportStats,
        now: Instant,
    ) -> bool {
        if !self.timer.is_armed() {
            return false;
        }
        stats.timeouts += 1;

        let outstanding = self.distance(self.next_seqnum, self.base);
        for offset in 0..outstanding {
            let seqnum = (self.base + offset) % self.seqnum_space;
            if let Some(segment) = self.in_flight.get(&seqnum) {
                network.send(segment.clone());
                stats.retransmitted += 1;
            }
        }
        debug!(
            "타임아웃: base={}부터 {}개 재전송",
            self.base,
            self.in_flight.len()
        );

        if self.in_flight.is_empty() {
            self.timer.cancel();
            self.drain_pending(network, stats, now);
        } else {
            self.timer.arm(now);
        }
        true
    }

    /// 비워진 윈도우만큼 대기열을 FIFO로 전송
    fn drain_pending(&mut self, network: &dyn Network, stats: &mut TransportStats, now: Instant) {
        while self.has_room() {
            let Some(payload) = self.pending.pop_front() else {
                break;
            };
            self.submit_locked(payload, network, stats, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::layer::testing::Recorder;

    fn setup(window: usize) -> (SendWindow, Recorder, TransportStats, Instant) {
        let config = Config::with_window_size(window);
        (
            SendWindow::new(&config),
            Recorder::default(),
            TransportStats::default(),
            Instant::now(),
        )
    }

    fn payload(i: u8) -> Bytes {
        Bytes::from(vec![b'A' + i])
    }

    /// in_flight 크기와 타이머 불변식
    fn assert_invariants(tx: &SendWindow) {
        assert!(tx.in_flight() <= tx.window_size);
        assert_eq!(tx.in_flight() as u32, tx.distance(tx.next_seqnum, tx.base));
        assert_eq!(tx.timer().is_armed(), tx.in_flight() > 0);
    }

    #[test]
    fn test_initial_state() {
        let (tx, _, _, _) = setup(5);
        assert_eq!(tx.base(), 0);
        assert_eq!(tx.next_seqnum(), 0);
        assert_eq!(tx.in_flight(), 0);
        assert!(!tx.timer().is_armed());
    }

    #[test]
    fn test_fill_window_then_queue() {
        let (mut tx, net, mut stats, now) = setup(5);

        for i in 0..5 {
            tx.submit(payload(i), &net, &mut stats, now);
            assert_invariants(&tx);
        }
        assert_eq!(net.seqnums(), vec![0, 1, 2, 3, 4]);
        assert_eq!(tx.in_flight(), 5);
        assert!(tx.timer().is_armed());

        tx.submit(payload(5), &net, &mut stats, now);
        assert_eq!(net.segments().len(), 5);
        assert_eq!(tx.pending(), 1);
        assert_eq!(stats.segments_sent, 5);
        assert_eq!(stats.queued, 1);
        assert_invariants(&tx);
    }

    #[test]
    fn test_timer_armed_only_by_first_segment() {
        let (mut tx, net, mut stats, now) = setup(5);
        tx.submit(payload(0), &net, &mut stats, now);
        let deadline = tx.timer().deadline();

        tx.submit(payload(1), &net, &mut stats, now + Duration::from_millis(50));
        assert_eq!(tx.timer().deadline(), deadline);
    }

    #[test]
    fn test_cumulative_ack_advances_and_drains() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..7 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        assert_eq!(tx.pending(), 2);
        net.take();

        assert!(tx.on_ack(3, &net, &mut stats, now));
        assert_eq!(tx.base(), 3);
        // 대기열 두 개가 seq 5, 6으로 나감
        assert_eq!(net.seqnums(), vec![5, 6]);
        assert_eq!(tx.pending(), 0);
        assert_eq!(tx.in_flight(), 4);
        assert_invariants(&tx);

        let payloads: Vec<_> = net.segments().iter().map(|s| s.payload().to_vec()).collect();
        assert_eq!(payloads, vec![b"F".to_vec(), b"G".to_vec()]);
    }

    #[test]
    fn test_full_ack_stops_timer() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..3 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        assert!(tx.on_ack(3, &net, &mut stats, now));
        assert_eq!(tx.in_flight(), 0);
        assert_eq!(tx.next_seqnum(), 3);
        assert!(!tx.timer().is_armed());
        assert_invariants(&tx);
    }

    #[test]
    fn test_partial_ack_restarts_timer() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..3 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        let later = now + Duration::from_millis(100);
        tx.on_ack(1, &net, &mut stats, later);
        assert_eq!(tx.timer().deadline(), Some(later + Duration::from_millis(400)));
    }

    #[test]
    fn test_duplicate_ack_no_change() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..4 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        tx.on_ack(2, &net, &mut stats, now);
        net.take();
        let deadline = tx.timer().deadline();

        assert!(!tx.on_ack(2, &net, &mut stats, now + Duration::from_millis(10)));
        assert_eq!(stats.duplicate_acks, 1);
        assert_eq!(tx.base(), 2);
        assert_eq!(tx.timer().deadline(), deadline);
        assert!(net.segments().is_empty());
    }

    #[test]
    fn test_stale_ack_beyond_window_ignored() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..5 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        tx.on_ack(3, &net, &mut stats, now);
        // base=3: ack 1은 거리 8 > N, 랩어라운드된 오래된 ACK
        assert!(!tx.on_ack(1, &net, &mut stats, now));
        assert_eq!(tx.base(), 3);
        assert_eq!(stats.duplicate_acks, 1);
    }

    #[test]
    fn test_timeout_retransmits_whole_window() {
        let (mut tx, net, mut stats, now) = setup(5);
        for i in 0..4 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        tx.on_ack(1, &net, &mut stats, now);
        let originals = net.take();

        let later = now + Duration::from_millis(400);
        assert!(tx.on_timeout(&net, &mut stats, later));

        let resent = net.segments();
        assert_eq!(net.seqnums(), vec![1, 2, 3]);
        assert_eq!(&resent[..], &originals[1..4]);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.retransmitted, 3);
        assert_eq!(tx.timer().deadline(), Some(later + Duration::from_millis(400)));
        assert_invariants(&tx);
    }

    #[test]
    fn test_timeout_when_idle_is_noop() {
        let (mut tx, net, mut stats, now) = setup(5);
        assert!(!tx.on_timeout(&net, &mut stats, now));
        assert_eq!(stats.timeouts, 0);
        assert!(net.segments().is_empty());
    }

    #[test]
    fn test_sequence_wraps() {
        let (mut tx, net, mut stats, now) = setup(2);
        // 시퀀스 공간 4
        for round in 0..5u32 {
            tx.submit(payload(0), &net, &mut stats, now);
            tx.submit(payload(1), &net, &mut stats, now);
            assert_invariants(&tx);
            let ack = (round * 2 + 2) % 4;
            assert!(tx.on_ack(ack, &net, &mut stats, now));
            assert_eq!(tx.base(), ack);
            assert_invariants(&tx);
        }
        assert_eq!(net.seqnums(), vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_submit_keeps_fifo_behind_queue() {
        let (mut tx, net, mut stats, now) = setup(2);
        for i in 0..4 {
            tx.submit(payload(i), &net, &mut stats, now);
        }
        assert_eq!(tx.pending(), 2);
        net.take();

        tx.on_ack(1, &net, &mut stats, now);
        assert_eq!(net.take()[0].payload(), b"C");
        tx.submit(payload(4), &net, &mut stats, now);
        assert!(net.segments().is_empty());

        tx.on_ack(3, &net, &mut stats, now);
        let order: Vec<_> = net.segments().iter().map(|s| s.payload().to_vec()).collect();
        assert_eq!(order, vec![b"D".to_vec(), b"E".to_vec()]);
    }

    #[test]
    fn test_window_bound_under_random_acks() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let (mut tx, net, mut stats, now) = setup(5);
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..500u32 {
            if rng.gen_bool(0.6) {
                tx.submit(payload((i % 26) as u8), &net, &mut stats, now);
            } else {
                let ack = rng.gen_range(0..10);
                tx.on_ack(ack, &net, &mut stats, now);
            }
            assert_invariants(&tx);
        }
    }
}
