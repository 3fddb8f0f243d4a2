//! 수신측 GBN 상태 기계
//!
//! - 순서대로 도착한 세그먼트만 애플리케이션에 전달
//! - 순서가 어긋난 세그먼트는 버퍼링 없이 폐기
//! - 모든 수신마다 누적 ACK 전송

use bytes::Bytes;
use tracing::debug;

use crate::layer::{Application, Network};
use crate::segment::{Segment, SeqNum};
use crate::stats::TransportStats;

/// 수신 상태 (전송 인스턴스 락 안에서만 변경)
#[derive(Debug, Clone)]
pub struct ReceiveState {
    /// 다음에 전달할 시퀀스 번호
    expected_seqnum: SeqNum,

    /// 마지막으로 보낸 ACK 값
    last_ack_sent: SeqNum,

    /// 시퀀스 공간 크기 (2N)
    seqnum_space: u32,
}

impl ReceiveState {
    pub fn new(seqnum_space: u32) -> Self {
        Self {
            expected_seqnum: 0,
            last_ack_sent: 0,
            seqnum_space,
        }
    }

    pub fn expected_seqnum(&self) -> SeqNum {
        self.expected_seqnum
    }

    pub fn last_ack_sent(&self) -> SeqNum {
        self.last_ack_sent
    }

    /// 손상된 DATA 수신: 진짜 다음 기대 값을 다시 알린다
    pub fn on_corrupt(&mut self, network: &dyn Network, stats: &mut TransportStats) {
        stats.corrupted_data += 1;
        debug!(
            "손상된 DATA 수신, ACK {} 재전송",
            self.expected_seqnum
        );
        self.send_ack(self.expected_seqnum, network, stats);
    }

    /// 체크섬이 유효한 DATA 수신
    pub fn on_data(
        &mut self,
        seqnum: SeqNum,
        payload: Bytes,
        application: &dyn Application,
        network: &dyn Network,
        stats: &mut TransportStats,
    ) {
        if seqnum == self.expected_seqnum {
            application.deliver(payload);
            stats.delivered += 1;

            self.expected_seqnum = (self.expected_seqnum + 1) % self.seqnum_space;
            self.last_ack_sent = self.expected_seqnum;
            debug!("DATA {} 전달, ACK {}", seqnum, self.expected_seqnum);
            self.send_ack(self.expected_seqnum, network, stats);
        } else {
            // 순서 어긋남 또는 중복: 이미 알린 누적 값을 다시 보낸다
            debug!(
                "DATA {} 폐기 (expected {}), ACK {} 재전송",
                seqnum, self.expected_seqnum, self.last_ack_sent
            );
            self.send_ack(self.last_ack_sent, network, stats);
        }
    }

    fn send_ack(&self, acknum: SeqNum, network: &dyn Network, stats: &mut TransportStats) {
        network.send(Segment::ack(acknum));
        stats.acks_sent += 1;
    }
}
