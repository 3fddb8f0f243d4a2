//! 16비트 1의 보수 체크섬
//!
//! 12바이트 헤더(seqnum, acknum, payload 길이, 모두 big-endian)와 페이로드를
//! 16비트 big-endian 워드로 더하고 캐리를 접은 뒤 비트 반전한다.
//! 홀수 길이는 0 바이트 하나로 패딩.
//!
//! 약한 체크섬이다: 16비트 워드 순서가 바뀌거나 서로 상쇄되는
//! 다중 비트 오류는 잡지 못한다.

/// 체크섬 헤더 크기 (seqnum 4 + acknum 4 + 길이 4)
pub const CHECKSUM_HEADER_LEN: usize = 12;

/// 세그먼트 필드에 대한 체크섬 계산
///
/// `acknum`은 DATA 세그먼트일 때 `-1`.
pub fn checksum(seqnum: i32, acknum: i32, payload: &[u8]) -> u16 {
    let mut header = [0u8; CHECKSUM_HEADER_LEN];
    header[0..4].copy_from_slice(&seqnum.to_be_bytes());
    header[4..8].copy_from_slice(&acknum.to_be_bytes());
    header[8..12].copy_from_slice(&(payload.len() as u32).to_be_bytes());

    // 헤더 길이가 짝수라 따로 더해도 이어 붙인 것과 같다
    let sum = word_sum(&header) + word_sum(payload);
    !fold(sum)
}

/// big-endian 16비트 워드 합 (홀수 바이트는 0 패딩)
fn word_sum(bytes: &[u8]) -> u64 {
    let mut words = bytes.chunks_exact(2);
    let mut sum: u64 = words
        .by_ref()
        .map(|w| u16::from_be_bytes([w[0], w[1]]) as u64)
        .sum();
    if let [last] = words.remainder() {
        sum += (*last as u64) << 8;
    }
    sum
}

/// end-around carry 접기
fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}
