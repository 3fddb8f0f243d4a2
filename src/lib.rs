//! # GBN (Go-Back-N ARQ)
//!
//! 손실/손상/지연이 있는 채널 위에서 순서 보장, 무결성, 정확히 한 번 전달을
//! 제공하는 미니 네트워크 스택의 신뢰성 계층
//!
//! ## 핵심 특징
//! - **슬라이딩 윈도우**: 최대 N개 세그먼트를 ACK 없이 전송, 시퀀스 공간 2N
//! - **누적 ACK**: ACK k = k 이전 전부 순서대로 수신
//! - **단일 재전송 타이머**: 가장 오래된 미확인 세그먼트 기준, 타임아웃 시 윈도우 전체 재전송
//! - **체크섬**: 16비트 1의 보수 합으로 손상 감지
//! - **백프레셔**: 윈도우가 차면 FIFO 대기열, 호출자는 막히지 않음
//! - **단일 락**: 애플리케이션/네트워크/타이머 문맥을 인스턴스당 락 하나로 직렬화

pub mod application;
pub mod checksum;
pub mod config;
pub mod error;
pub mod layer;
pub mod network;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod stack;
pub mod stats;
pub mod timer;
pub mod transport;

pub use application::{PayloadGenerator, RecordingApplication};
pub use config::{Config, NetworkConfig};
pub use error::{Error, Result};
pub use layer::{Application, Network};
pub use network::{link, ChannelStats, Inbound, SimulatedNetwork};
pub use segment::{Segment, SegmentKind, SeqNum};
pub use stack::{Stack, Workload};
pub use stats::TransportStats;
pub use transport::Transport;

/// 기본 윈도우 크기 N
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// 기본 재전송 타임아웃 (밀리초)
pub const DEFAULT_TIMEOUT_MS: u64 = 400;
