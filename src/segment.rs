//! 세그먼트 정의 및 와이어 포맷
//!
//! - DATA: 페이로드 + seqnum (와이어상 acknum = -1)
//! - ACK: 누적 ACK 값 (와이어상 seqnum = 0, 빈 페이로드)
//!
//! 와이어 포맷 (big-endian):
//! `seqnum(i32) | acknum(i32) | payload_len(u32) | payload | checksum(u16)`

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::{checksum, CHECKSUM_HEADER_LEN};
use crate::{Error, Result};

/// 시퀀스 번호 (0 ~ 2N-1)
pub type SeqNum = u32;

/// DATA 세그먼트의 와이어상 acknum
pub const DATA_ACKNUM: i32 = -1;

/// 와이어 프레임 최소 크기 (헤더 12 + 체크섬 2)
pub const MIN_FRAME_LEN: usize = CHECKSUM_HEADER_LEN + 2;

/// 세그먼트 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// 데이터 세그먼트
    Data { seqnum: SeqNum, payload: Bytes },

    /// 누적 ACK
    Ack { acknum: SeqNum },
}

/// 세그먼트 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    kind: SegmentKind,
    checksum: u16,
}

impl Segment {
    /// DATA 세그먼트 생성
    pub fn data(seqnum: SeqNum, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let checksum = checksum(seqnum as i32, DATA_ACKNUM, &payload);
        Self {
            kind: SegmentKind::Data { seqnum, payload },
            checksum,
        }
    }

    /// ACK 세그먼트 생성
    pub fn ack(acknum: SeqNum) -> Self {
        Self {
            kind: SegmentKind::Ack { acknum },
            checksum: checksum(0, acknum as i32, &[]),
        }
    }

    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn is_ack(&self) -> bool {
        matches!(self.kind, SegmentKind::Ack { .. })
    }

    /// 와이어상 seqnum (ACK는 0)
    pub fn seqnum(&self) -> i32 {
        match self.kind {
            SegmentKind::Data { seqnum, .. } => seqnum as i32,
            SegmentKind::Ack { .. } => 0,
        }
    }

    /// 와이어상 acknum (DATA는 -1)
    pub fn acknum(&self) -> i32 {
        match self.kind {
            SegmentKind::Data { .. } => DATA_ACKNUM,
            SegmentKind::Ack { acknum } => acknum as i32,
        }
    }

    /// 페이로드 (ACK는 빈 슬라이스)
    pub fn payload(&self) -> &[u8] {
        match &self.kind {
            SegmentKind::Data { payload, .. } => payload,
            SegmentKind::Ack { .. } => &[],
        }
    }

    /// 저장된 체크섬과 필드로 다시 계산한 값이 다르면 true
    pub fn is_corrupt(&self) -> bool {
        checksum(self.seqnum(), self.acknum(), self.payload()) != self.checksum
    }

    /// 비트 하나를 뒤집은 사본
    ///
    /// `bit`는 페이로드 비트 수로 나눈 나머지 위치를 쓴다.
    /// 페이로드가 비어 있으면 저장된 체크섬의 비트를 뒤집는다.
    pub fn with_flipped_bit(&self, bit: usize) -> Self {
        match &self.kind {
            SegmentKind::Data { seqnum, payload } if !payload.is_empty() => {
                let bit = bit % (payload.len() * 8);
                let mut damaged = BytesMut::from(&payload[..]);
                damaged[bit / 8] ^= 0x80 >> (bit % 8);
                Self {
                    kind: SegmentKind::Data {
                        seqnum: *seqnum,
                        payload: damaged.freeze(),
                    },
                    checksum: self.checksum,
                }
            }
            _ => Self {
                kind: self.kind.clone(),
                checksum: self.checksum ^ (1 << (bit % 16)),
            },
        }
    }

    /// 와이어 크기
    pub fn wire_len(&self) -> usize {
        MIN_FRAME_LEN + self.payload().len()
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let payload = self.payload();
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_i32(self.seqnum());
        buf.put_i32(self.acknum());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        buf.put_u16(self.checksum);
        buf.freeze()
    }

    /// 바이트에서 역직렬화
    ///
    /// 체크섬은 검증하지 않는다. 손상 여부는 [`Segment::is_corrupt`]로 확인.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(Error::Truncated {
                needed: MIN_FRAME_LEN,
                got: bytes.len(),
            });
        }

        let mut buf = bytes;
        let seqnum = buf.get_i32();
        let acknum = buf.get_i32();
        let declared = buf.get_u32() as usize;
        let actual = buf.remaining() - 2;
        if declared != actual {
            return Err(Error::LengthMismatch { declared, actual });
        }
        let payload = Bytes::copy_from_slice(&buf[..declared]);
        buf.advance(declared);
        let checksum = buf.get_u16();

        let kind = match acknum {
            DATA_ACKNUM if seqnum >= 0 => SegmentKind::Data {
                seqnum: seqnum as SeqNum,
                payload,
            },
            ack if ack >= 0 && seqnum == 0 && payload.is_empty() => SegmentKind::Ack {
                acknum: ack as SeqNum,
            },
            _ => {
                return Err(Error::MalformedSegment {
                    seqnum,
                    acknum,
                    payload_len: declared,
                })
            }
        };

        Ok(Self { kind, checksum })
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SegmentKind::Data { seqnum, payload } => write!(
                f,
                "DATA(seq={}, len={}, checksum={:04X})",
                seqnum,
                payload.len(),
                self.checksum
            ),
            SegmentKind::Ack { acknum } => {
                write!(f, "ACK(ack={}, checksum={:04X})", acknum, self.checksum)
            }
        }
    }
}
