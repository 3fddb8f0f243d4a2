//! 전송 계층 인스턴스
//!
//! 송신/수신 상태 기계를 하나의 락 아래 묶는다. 진입점은 세 실행 문맥에서 온다:
//! - 애플리케이션: [`Transport::submit`]
//! - 네트워크: [`Transport::on_segment_received`]
//! - 타이머 태스크: [`Transport::poll_timeout`] / [`Transport::on_timeout`]
//!
//! 모든 진입점은 락을 잡은 채 닫힘 여부부터 확인한다.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::layer::{Application, Network};
use crate::receiver::ReceiveState;
use crate::segment::{Segment, SegmentKind, SeqNum};
use crate::sender::SendWindow;
use crate::stats::TransportStats;
use crate::{Config, Error, Result};

/// 락으로 보호되는 전체 상태
struct Inner {
    sender: SendWindow,
    receiver: ReceiveState,
    stats: TransportStats,
    closed: bool,
}

/// GBN 전송 계층 (전이중, 송신자 + 수신자)
pub struct Transport {
    config: Config,

    inner: Mutex<Inner>,

    /// 위 계층
    application: Arc<dyn Application>,

    /// 아래 계층
    network: Arc<dyn Network>,

    /// 타이머 재무장/닫힘 알림
    timer_notify: Arc<Notify>,
}

impl Transport {
    /// 새 전송 인스턴스 생성
    ///
    /// 협력자는 여기서 한 번 주입되고 이후 바뀌지 않는다.
    pub fn new(
        config: Config,
        application: Arc<dyn Application>,
        network: Arc<dyn Network>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let inner = Inner {
            sender: SendWindow::new(&config),
            receiver: ReceiveState::new(config.seqnum_space()),
            stats: TransportStats::default(),
            closed: false,
        };

        Ok(Arc::new(Self {
            config,
            inner: Mutex::new(inner),
            application,
            network,
            timer_notify: Arc::new(Notify::new()),
        }))
    }

    /// 재전송 타이머 태스크 시작 (tokio 런타임 필요)
    ///
    /// 태스크는 약한 참조만 들고 있으며 close 또는 drop 시 종료된다.
    pub fn spawn_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(run_timer(weak))
    }

    /// 애플리케이션 데이터 제출
    ///
    /// 윈도우에 자리가 있으면 바로 전송, 없으면 대기열에 보관. 닫힌 뒤에는 무시.
    pub fn submit(&self, payload: impl Into<Bytes>) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }

        let armed_before = inner.sender.timer().generation();
        let Inner { sender, stats, .. } = &mut *inner;
        sender.submit(payload.into(), self.network.as_ref(), stats, Instant::now());

        self.wake_timer_if_rearmed(&inner, armed_before);
    }

    /// 네트워크로부터 세그먼트 수신 (DATA/ACK 분기)
    ///
    /// 체크섬이 유효한데 번호가 시퀀스 공간 밖이면 송신측 버그이므로
    /// 상태를 건드리지 않고 에러를 반환한다.
    pub fn on_segment_received(&self, segment: Segment) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }

        let space = self.config.seqnum_space();
        let corrupt = segment.is_corrupt();
        let armed_before = inner.sender.timer().generation();
        let Inner {
            sender,
            receiver,
            stats,
            ..
        } = &mut *inner;

        match segment.kind() {
            SegmentKind::Ack { .. } if corrupt => {
                stats.corrupted_acks += 1;
                debug!("손상된 ACK 폐기: {}", segment);
            }
            SegmentKind::Ack { acknum } => {
                let acknum = Self::check_range(*acknum, space, |acknum, space| {
                    Error::AcknumOutOfRange { acknum, space }
                })?;
                sender.on_ack(acknum, self.network.as_ref(), stats, Instant::now());
            }
            SegmentKind::Data { .. } if corrupt => {
                receiver.on_corrupt(self.network.as_ref(), stats);
            }
            SegmentKind::Data { seqnum, payload } => {
                let seqnum = Self::check_range(*seqnum, space, |seqnum, space| {
                    Error::SeqnumOutOfRange { seqnum, space }
                })?;
                receiver.on_data(
                    seqnum,
                    payload.clone(),
                    self.application.as_ref(),
                    self.network.as_ref(),
                    stats,
                );
            }
        }

        self.wake_timer_if_rearmed(&inner, armed_before);
        Ok(())
    }

    fn check_range(
        value: SeqNum,
        space: u32,
        violation: impl FnOnce(u32, u32) -> Error,
    ) -> Result<SeqNum> {
        if value < space {
            return Ok(value);
        }
        let err = violation(value, space);
        error!("{}", err);
        Err(err)
    }

    /// 타임아웃 강제 실행
    ///
    /// 닫혔거나 타이머가 무장되어 있지 않으면 무시.
    pub fn on_timeout(&self) {
        self.fire_timeout(None);
    }

    /// 마감 시각이 지났을 때만 타임아웃 실행
    ///
    /// 타이머 태스크가 깨어난 사이 재무장됐으면 아무것도 하지 않는다.
    /// 실행했으면 true.
    pub fn poll_timeout(&self, now: Instant) -> bool {
        self.fire_timeout(Some(now))
    }

    fn fire_timeout(&self, now: Option<Instant>) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        if let Some(now) = now {
            if !inner.sender.timer().is_expired(now) {
                return false;
            }
        }

        let armed_before = inner.sender.timer().generation();
        let Inner { sender, stats, .. } = &mut *inner;
        let fired = sender.on_timeout(self.network.as_ref(), stats, Instant::now());

        self.wake_timer_if_rearmed(&inner, armed_before);
        fired
    }

    /// 닫기: 타이머를 멈추고 이후 모든 진입점을 무시하게 한다. 여러 번 호출해도 무방.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.sender.cancel_timer();
        info!("전송 계층 종료: {}", inner.stats.summary());
        drop(inner);

        self.timer_notify.notify_one();
    }

    fn wake_timer_if_rearmed(&self, inner: &Inner, armed_before: u64) {
        if inner.sender.timer().generation() != armed_before {
            self.timer_notify.notify_one();
        }
    }

    /// 타이머 태스크가 기다릴 마감 시각. 닫혔으면 None.
    fn timer_state(&self) -> Option<Option<Instant>> {
        let inner = self.inner.lock();
        if inner.closed {
            None
        } else {
            Some(inner.sender.timer().deadline())
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> TransportStats {
        self.inner.lock().stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn base(&self) -> SeqNum {
        self.inner.lock().sender.base()
    }

    pub fn next_seqnum(&self) -> SeqNum {
        self.inner.lock().sender.next_seqnum()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().sender.in_flight()
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().sender.pending()
    }

    pub fn timer_armed(&self) -> bool {
        self.inner.lock().sender.timer().is_armed()
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.inner.lock().sender.timer().deadline()
    }

    pub fn expected_seqnum(&self) -> SeqNum {
        self.inner.lock().receiver.expected_seqnum()
    }

    pub fn last_ack_sent(&self) -> SeqNum {
        self.inner.lock().receiver.last_ack_sent()
    }

    /// 송신 쪽이 전부 비었는지 (in flight + 대기열)
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        inner.sender.in_flight() == 0 && inner.sender.pending() == 0
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // 마감 시각 없이 대기 중인 타이머 태스크를 깨워 종료시킨다
        self.timer_notify.notify_one();
    }
}

/// 재전송 타이머 태스크
async fn run_timer(transport: Weak<Transport>) {
    loop {
        let Some(strong) = transport.upgrade() else {
            break;
        };
        let Some(deadline) = strong.timer_state() else {
            break;
        };
        let notify = strong.timer_notify.clone();
        drop(strong);

        // Notify 퍼밋은 저장되므로 상태를 읽은 뒤의 재무장도 놓치지 않는다
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        let Some(strong) = transport.upgrade() else {
                            break;
                        };
                        strong.poll_timeout(Instant::now());
                    }
                    _ = notify.notified() => {}
                }
            }
            None => notify.notified().await,
        }
    }
    debug!("타이머 태스크 종료");
}
