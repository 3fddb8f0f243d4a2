//! 전송 통계
//!
//! 진단/테스트용 읽기 전용 스냅샷. 모든 카운터는 전송 인스턴스 락 안에서 갱신된다.

/// 전송 인스턴스 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// 새로 보낸 DATA 세그먼트 수 (재전송 제외)
    pub segments_sent: u64,

    /// 재전송한 DATA 세그먼트 수
    pub retransmitted: u64,

    /// 타임아웃 횟수
    pub timeouts: u64,

    /// 중복/오래된 ACK 수
    pub duplicate_acks: u64,

    /// 손상된 DATA 수신 수
    pub corrupted_data: u64,

    /// 손상된 ACK 수신 수
    pub corrupted_acks: u64,

    /// 보낸 ACK 수
    pub acks_sent: u64,

    /// 애플리케이션에 전달한 페이로드 수
    pub delivered: u64,

    /// 윈도우가 가득 차서 대기열로 간 페이로드 수
    pub queued: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전체 DATA 송신 수 (재전송 포함)
    pub fn total_transmissions(&self) -> u64 {
        self.segments_sent + self.retransmitted
    }

    /// 재전송 비율
    pub fn retransmission_ratio(&self) -> f64 {
        if self.segments_sent == 0 {
            return 0.0;
        }
        self.retransmitted as f64 / self.segments_sent as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Sent: {} | Retransmitted: {} ({:.1}%) | Timeouts: {} | Dup ACKs: {} | Corrupt DATA/ACK: {}/{} | ACKs: {} | Delivered: {} | Queued: {}",
            self.segments_sent,
            self.retransmitted,
            self.retransmission_ratio() * 100.0,
            self.timeouts,
            self.duplicate_acks,
            self.corrupted_data,
            self.corrupted_acks,
            self.acks_sent,
            self.delivered,
            self.queued,
        )
    }
}
