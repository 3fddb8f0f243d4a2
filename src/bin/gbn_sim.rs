//! GBN 시뮬레이터 - Alice → Bob 전송
//!
//! 손실/손상/지연 채널 위에서 두 스택을 연결하고 Alice의 데이터를 Bob에게 보낸다.
//! 끝나면 양쪽 통계를 출력하고 데이터가 일치하지 않으면 1로 종료.
//!
//! 사용법:
//!   cargo run --release --bin gbn-sim -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (패킷 20개, 10% 드롭, 10% 손상)
//!   cargo run --release --bin gbn-sim
//!
//!   # 재현 가능한 불안정 채널
//!   cargo run --release --bin gbn-sim -- --drop 0.3 --corrupt 0.2 --seed 7

use std::time::{Duration, Instant};

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gbn::{Config, NetworkConfig, Stack, Workload};

/// 시뮬레이션 설정
struct SimConfig {
    packets: usize,
    packet_size: usize,
    interval_ms: u64,
    deadline_secs: u64,
    verbose: bool,
    config: Config,
    channel: NetworkConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            packets: 20,
            packet_size: 16,
            interval_ms: 50,
            deadline_secs: 60,
            verbose: false,
            config: Config::default(),
            channel: NetworkConfig::default(),
        }
    }
}

fn parse_args() -> SimConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--packets" | "-n" => {
                if i + 1 < args.len() {
                    config.packets = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--size" | "-s" => {
                if i + 1 < args.len() {
                    config.packet_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--window" | "-w" => {
                if i + 1 < args.len() {
                    config.config.window_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    config.config.timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--drop" => {
                if i + 1 < args.len() {
                    config.channel.drop_probability =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--corrupt" => {
                if i + 1 < args.len() {
                    config.channel.corruption_probability =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-delay-ms" => {
                if i + 1 < args.len() {
                    config.channel.max_delay_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--interval-ms" => {
                if i + 1 < args.len() {
                    config.interval_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--deadline-secs" => {
                if i + 1 < args.len() {
                    config.deadline_secs = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    config.channel.seed = Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN Simulator - Go-Back-N ARQ over a lossy channel

Alice가 무작위 대문자 청크를 보내고 Bob이 순서대로 받는지 확인

사용법:
  cargo run --release --bin gbn-sim -- [OPTIONS]

옵션:
  -n, --packets <N>        보낼 청크 수 (기본: 20)
  -s, --size <BYTES>       청크 크기 (기본: 16)
  -w, --window <N>         윈도우 크기 (기본: 5, 시퀀스 공간 2N)
  --timeout-ms <MS>        재전송 타임아웃 (기본: 400)
  --drop <P>               드롭 확률 0.0~1.0 (기본: 0.1)
  --corrupt <P>            손상 확률 0.0~1.0 (기본: 0.1)
  --max-delay-ms <MS>      최대 편도 지연 (기본: 150)
  --interval-ms <MS>       애플리케이션 tick 간격 (기본: 50)
  --deadline-secs <S>      전체 제한 시간 (기본: 60)
  --seed <N>               채널/데이터 RNG 시드
  -v, --verbose            DEBUG 로그
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("알 수 없는 옵션: {other} (--help 참고)");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sim = parse_args();

    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if sim.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("GBN Simulator starting...");
    info!("Packets: {} x {} bytes", sim.packets, sim.packet_size);

    let (alice, bob) = Stack::connect_pair(
        ("Alice", "Bob"),
        sim.config.clone(),
        sim.channel.clone(),
        (
            Workload {
                packets: sim.packets,
                packet_size: sim.packet_size,
            },
            Workload::default(),
        ),
    )?;

    let start = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(sim.interval_ms.max(1)));
    while alice.tick() {
        ticker.tick().await;
    }
    info!("{}: 애플리케이션 데이터 제출 완료", alice);

    let deadline = Duration::from_secs(sim.deadline_secs);
    let complete = bob
        .application()
        .wait_for(sim.packets, deadline.saturating_sub(start.elapsed()))
        .await;
    if !complete {
        warn!(
            "제한 시간 초과: {}/{} 전달됨",
            bob.application().delivered_count(),
            sim.packets
        );
    }

    let elapsed = start.elapsed();
    alice.close();
    bob.close();

    let matches = alice.original_data() == bob.received();

    info!("Simulation complete in {:.2}s", elapsed.as_secs_f64());
    for stack in [&alice, &bob] {
        let channel = stack.channel_stats();
        info!("{} transport: {}", stack, stack.transport().stats().summary());
        info!(
            "{} channel: forwarded={} dropped={} corrupted={}",
            stack, channel.forwarded, channel.dropped, channel.corrupted
        );
    }
    info!(
        "Bob received {} bytes, data {}",
        bob.received().len(),
        if matches { "matches" } else { "DIFFERS" }
    );

    if !matches {
        std::process::exit(1);
    }
    Ok(())
}
