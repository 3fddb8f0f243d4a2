//! 에러 타입 정의
//!
//! 채널에서 생기는 손상, 손실, 중복 ACK는 에러가 아니다.
//! 여기 있는 것은 프레임 디코딩 실패, 설정 오류, 프로토콜 위반뿐이다.

use thiserror::Error;

/// GBN 전송 계층 에러 타입
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("프레임이 너무 짧음: 최소 {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("페이로드 길이 불일치: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("DATA도 ACK도 아닌 세그먼트: seqnum={seqnum}, acknum={acknum}, payload_len={payload_len}")]
    MalformedSegment {
        seqnum: i32,
        acknum: i32,
        payload_len: usize,
    },

    #[error("프로토콜 위반: seqnum {seqnum}이 시퀀스 공간 {space} 밖")]
    SeqnumOutOfRange { seqnum: u32, space: u32 },

    #[error("프로토콜 위반: acknum {acknum}이 시퀀스 공간 {space} 밖")]
    AcknumOutOfRange { acknum: u32, space: u32 },

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
