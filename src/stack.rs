//! 한 종단의 계층 묶음 (애플리케이션 + 전송 + 네트워크)
//!
//! [`Stack::connect_pair`]가 두 종단과 양방향 링크를 한 번에 만든다.
//! 모든 협력자는 생성 시점에 연결되고 이후 바뀌지 않는다.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::{PayloadGenerator, RecordingApplication};
use crate::network::{self, ChannelStats, SimulatedNetwork};
use crate::transport::Transport;
use crate::{Config, NetworkConfig, Result};

/// 한 종단에서 보낼 작업량
#[derive(Debug, Clone, Copy, Default)]
pub struct Workload {
    /// 청크 수
    pub packets: usize,

    /// 청크 크기 (바이트)
    pub packet_size: usize,
}

/// 통신 스택 하나
pub struct Stack {
    name: String,
    application: Arc<RecordingApplication>,
    transport: Arc<Transport>,

    /// 이 종단에서 나가는 링크
    outbound: Arc<SimulatedNetwork>,

    generator: Mutex<PayloadGenerator>,

    /// 지금까지 제출한 원본 청크
    sent: Mutex<Vec<Bytes>>,

    timer_task: JoinHandle<()>,
    pump_task: JoinHandle<Result<()>>,
}

impl Stack {
    /// 두 스택을 만들고 서로 연결 (tokio 런타임 안에서 호출)
    ///
    /// 채널 시드가 있으면 방향별로 `seed`, `seed + 1`을 쓰고
    /// 청크 생성기는 `seed + 2`, `seed + 3`을 쓴다.
    pub fn connect_pair(
        names: (&str, &str),
        config: Config,
        channel: NetworkConfig,
        workloads: (Workload, Workload),
    ) -> Result<(Stack, Stack)> {
        config.validate()?;
        config.check_channel(&channel)?;

        let seeded = |offset: u64| channel.seed.map(|seed| seed.wrapping_add(offset));

        let (a_to_b, b_inbound) = network::link(
            format!("{}->{}", names.0, names.1),
            NetworkConfig {
                seed: seeded(0),
                ..channel.clone()
            },
        )?;
        let (b_to_a, a_inbound) = network::link(
            format!("{}->{}", names.1, names.0),
            NetworkConfig {
                seed: seeded(1),
                ..channel.clone()
            },
        )?;

        let a = Self::build(names.0, &config, a_to_b, a_inbound, workloads.0, seeded(2))?;
        let b = Self::build(names.1, &config, b_to_a, b_inbound, workloads.1, seeded(3))?;

        info!(
            "{} <-> {} 연결: window={}, timeout={}ms, drop={:.0}%, corrupt={:.0}%, delay={}~{}ms",
            a.name,
            b.name,
            config.window_size,
            config.timeout_ms,
            channel.drop_probability * 100.0,
            channel.corruption_probability * 100.0,
            channel.min_delay_ms,
            channel.max_delay_ms,
        );

        Ok((a, b))
    }

    fn build(
        name: &str,
        config: &Config,
        outbound: Arc<SimulatedNetwork>,
        inbound: network::Inbound,
        workload: Workload,
        seed: Option<u64>,
    ) -> Result<Self> {
        let application = Arc::new(RecordingApplication::new());
        let transport = Transport::new(config.clone(), application.clone(), outbound.clone())?;
        let timer_task = transport.spawn_timer();
        let pump_task = inbound.spawn_pump(&transport);

        Ok(Self {
            name: name.to_string(),
            application,
            transport,
            outbound,
            generator: Mutex::new(PayloadGenerator::new(
                workload.packets,
                workload.packet_size,
                seed,
            )),
            sent: Mutex::new(Vec::new()),
            timer_task,
            pump_task,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn application(&self) -> &Arc<RecordingApplication> {
        &self.application
    }

    /// 나가는 링크의 통계
    pub fn channel_stats(&self) -> ChannelStats {
        self.outbound.stats()
    }

    /// 다음 청크 하나를 전송 계층에 제출. 보낼 것이 없으면 false.
    pub fn tick(&self) -> bool {
        let Some(chunk) = self.generator.lock().next() else {
            return false;
        };
        self.sent.lock().push(chunk.clone());
        self.transport.submit(chunk);
        true
    }

    /// 생성기에 남은 청크 수
    pub fn remaining(&self) -> usize {
        self.generator.lock().remaining()
    }

    /// 지금까지 제출한 원본 데이터
    pub fn original_data(&self) -> Vec<u8> {
        self.sent.lock().concat()
    }

    /// 지금까지 전달받은 데이터
    pub fn received(&self) -> Vec<u8> {
        self.application.payload()
    }

    /// 전송 계층을 닫고 수신 링크를 멈춘다
    pub fn close(&self) {
        self.transport.close();
        self.pump_task.abort();
    }

    /// 타이머 태스크 종료 여부
    pub fn is_timer_finished(&self) -> bool {
        self.timer_task.is_finished()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Display for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
