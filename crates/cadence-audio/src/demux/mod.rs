//! Compressed packet sources feeding the decoder drivers.

pub mod container;

use std::collections::VecDeque;

use bytes::Bytes;

pub use container::ContainerDemuxer;

/// One compressed unit of the audio stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub data: Bytes,
    /// Presentation time in seconds, if known.
    pub pts: Option<f64>,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>, pts: Option<f64>) -> Self {
        Self {
            data: data.into(),
            pts,
        }
    }
}

/// Source of compressed packets for one audio stream.
pub trait Demuxer: Send {
    /// Read the next packet, or `None` at end of stream.
    fn next_packet(&mut self) -> Option<Packet>;

    /// Drop the next packet without decoding it.
    ///
    /// Returns false if the stream had no packet left.
    fn discard_next_unit(&mut self) -> bool {
        self.next_packet().is_some()
    }
}

/// In-memory packet queue.
#[derive(Debug, Clone, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a contiguous byte stream into packets of `packet_size` bytes.
    pub fn from_bytes(data: &Bytes, packet_size: usize) -> Self {
        let packet_size = packet_size.max(1);
        let packets = (0..data.len())
            .step_by(packet_size)
            .map(|start| {
                let end = (start + packet_size).min(data.len());
                Packet::new(data.slice(start..end), None)
            })
            .collect();
        Self { packets }
    }

    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl Demuxer for PacketQueue {
    fn next_packet(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}
