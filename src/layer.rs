//! 위/아래 계층 인터페이스
//!
//! 전송 계층은 생성 시점에 두 협력자를 모두 주입받고 이후 바꾸지 않는다.
//! 두 호출 모두 전송 인스턴스 락을 쥔 채 일어나므로 블로킹하거나
//! 같은 전송 인스턴스를 동기적으로 다시 호출하면 안 된다.

use bytes::Bytes;

use crate::segment::Segment;

/// 애플리케이션 계층 (위)
pub trait Application: Send + Sync {
    /// 순서대로 도착한 페이로드 전달. 세그먼트당 정확히 한 번.
    fn deliver(&self, payload: Bytes);
}

/// 네트워크 계층 (아래)
pub trait Network: Send + Sync {
    /// 세그먼트 송신 (fire-and-forget, 손실/손상/지연 가능)
    fn send(&self, segment: Segment);
}

impl<F> Application for F
where
    F: Fn(Bytes) + Send + Sync,
{
    fn deliver(&self, payload: Bytes) {
        self(payload)
    }
}
