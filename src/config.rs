//! 전송 계층 및 시뮬레이션 채널 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_TIMEOUT_MS, DEFAULT_WINDOW_SIZE};

/// GBN 전송 계층 설정
///
/// 시퀀스 공간은 항상 `2 * window_size`로 유도되며 따로 설정할 수 없다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 송신 윈도우 크기 N (동시에 ACK 대기 가능한 최대 세그먼트 수)
    pub window_size: usize,

    /// 재전송 타임아웃 (밀리초)
    /// 채널 편도 지연의 2배 + 여유보다 커야 함
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 윈도우 크기만 바꾼 기본 설정
    pub fn with_window_size(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정 (긴 지연 허용)
    pub fn unstable_network() -> Self {
        Self {
            window_size: 8,
            timeout_ms: 1000,
        }
    }

    /// 시퀀스 번호 공간 크기 (2N)
    pub fn seqnum_space(&self) -> u32 {
        (2 * self.window_size) as u32
    }

    /// 재전송 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        // 와이어 포맷의 seqnum/acknum은 i32
        if self.window_size > (i32::MAX as usize) / 2 {
            return Err(Error::InvalidConfig(format!(
                "window_size {}: 시퀀스 공간이 i32 범위를 넘음",
                self.window_size
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms는 0보다 커야 함".into()));
        }
        Ok(())
    }

    /// 채널 지연 대비 타임아웃 검증
    ///
    /// 타임아웃이 최대 왕복 지연(`2 * max_delay_ms`) 이하이면
    /// 정상 ACK보다 타임아웃이 먼저 터진다.
    pub fn check_channel(&self, channel: &NetworkConfig) -> Result<()> {
        let round_trip = channel.max_delay_ms.saturating_mul(2);
        if self.timeout_ms <= round_trip {
            return Err(Error::InvalidConfig(format!(
                "timeout {}ms <= 최대 왕복 지연 {}ms",
                self.timeout_ms, round_trip
            )));
        }
        Ok(())
    }
}

/// 시뮬레이션 채널의 장애 모델
///
/// 세그먼트를 드롭/손상/지연시킬 수 있지만 순서를 바꾸거나
/// 없는 세그먼트를 만들어내지는 않는다.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// 드롭 확률 (0.0 ~ 1.0)
    pub drop_probability: f64,

    /// 비트 손상 확률 (0.0 ~ 1.0)
    pub corruption_probability: f64,

    /// 최소 편도 지연 (밀리초)
    pub min_delay_ms: u64,

    /// 최대 편도 지연 (밀리초)
    pub max_delay_ms: u64,

    /// RNG 시드 (None이면 엔트로피 사용)
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.1,
            corruption_probability: 0.1,
            min_delay_ms: 0,
            max_delay_ms: 150,
            seed: None,
        }
    }
}

impl NetworkConfig {
    /// 손실/손상 없는 채널
    pub fn lossless() -> Self {
        Self {
            drop_probability: 0.0,
            corruption_probability: 0.0,
            min_delay_ms: 0,
            max_delay_ms: 10,
            seed: None,
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("drop_probability", self.drop_probability),
            ("corruption_probability", self.corruption_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("{name} {p}: 0.0 ~ 1.0 범위 밖")));
            }
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "min_delay_ms {} > max_delay_ms {}",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_size, 5);
        assert_eq!(config.seqnum_space(), 10);
        assert_eq!(config.timeout(), Duration::from_millis(400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_window() {
        assert!(Config::with_window_size(0).validate().is_err());
        assert!(Config::with_window_size(usize::MAX / 4).validate().is_err());
    }

    #[test]
    fn test_timeout_must_exceed_round_trip() {
        let config = Config::default();
        let mut channel = NetworkConfig::default();
        assert!(config.check_channel(&channel).is_ok());

        channel.max_delay_ms = 200;
        assert!(config.check_channel(&channel).is_err());
    }

    #[test]
    fn test_network_config_validation() {
        assert!(NetworkConfig::lossless().validate().is_ok());

        let bad = NetworkConfig {
            drop_probability: 1.5,
            ..NetworkConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad_delay = NetworkConfig {
            min_delay_ms: 50,
            max_delay_ms: 10,
            ..NetworkConfig::default()
        };
        assert!(bad_delay.validate().is_err());
    }
}
