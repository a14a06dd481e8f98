use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

/// One IPv4 fragment's contribution to its datagram.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    /// Byte offset within the reassembled payload.
    pub offset: usize,
    /// Payload length announced by the IP header.
    pub declared_len: usize,
    pub more_fragments: bool,
    /// Link and network header bytes that carried this fragment.
    pub headers: &'a [u8],
    /// Captured payload bytes; may be shorter than `declared_len`.
    pub payload: &'a [u8],
}

/// A completed datagram: the final fragment's headers and the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub headers: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Partial reassembly of one datagram.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    data: Vec<u8>,
    covered: Vec<Range<usize>>,
    final_len: Option<usize>,
    final_headers: Vec<u8>,
    last_touched: u64,
}

impl FragmentBuffer {
    /// Highest byte offset written so far.
    pub fn highest_written(&self) -> usize {
        self.covered.last().map_or(0, |range| range.end)
    }

    pub fn final_len(&self) -> Option<usize> {
        self.final_len
    }

    fn write(&mut self, fragment: &Fragment<'_>) {
        let declared_end = fragment.offset + fragment.declared_len;
        if self.data.len() < declared_end {
            self.data.resize(declared_end, 0);
        }

        let copied = fragment.payload.len().min(fragment.declared_len);
        let end = fragment.offset + copied;
        self.data[fragment.offset..end].copy_from_slice(&fragment.payload[..copied]);
        self.cover(fragment.offset..end);

        if !fragment.more_fragments {
            self.final_len = Some(declared_end);
            self.final_headers = fragment.headers.to_vec();
        }
    }

    fn cover(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.covered.push(range);
        self.covered.sort_by_key(|range| range.start);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.covered.len());
        for range in self.covered.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        self.covered = merged;
    }

    fn is_complete(&self) -> bool {
        match (self.final_len, self.covered.as_slice()) {
            (Some(0), []) => true,
            (Some(len), [only]) => only.start == 0 && only.end >= len,
            _ => false,
        }
    }
}

/// Pending datagrams keyed by the IPv4 identification field.
///
/// Buffers leave the table only on completion, or by eviction when a bound is
/// configured.
#[derive(Debug, Default)]
pub struct FragmentTable {
    buffers: HashMap<u16, FragmentBuffer>,
    max_pending: Option<usize>,
    clock: u64,
}

impl FragmentTable {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            buffers: HashMap::new(),
            max_pending,
            clock: 0,
        }
    }

    /// Adds a fragment and returns the reassembled datagram once every byte up
    /// to the final fragment's end has arrived.
    pub fn insert(&mut self, identification: u16, fragment: Fragment<'_>) -> Option<Reassembled> {
        if !self.buffers.contains_key(&identification)
            && let Some(max) = self.max_pending
            && self.buffers.len() >= max
        {
            self.evict_oldest();
        }

        self.clock += 1;
        let buffer = self.buffers.entry(identification).or_default();
        buffer.last_touched = self.clock;
        buffer.write(&fragment);

        if !buffer.is_complete() {
            return None;
        }

        let mut buffer = self.buffers.remove(&identification)?;
        let len = buffer.final_len.unwrap_or(buffer.data.len());
        buffer.data.truncate(len);
        debug!(identification, len, "reassembled ipv4 datagram");
        Some(Reassembled {
            headers: buffer.final_headers,
            payload: buffer.data,
        })
    }

    pub fn get(&self, identification: u16) -> Option<&FragmentBuffer> {
        self.buffers.get(&identification)
    }

    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .buffers
            .iter()
            .min_by_key(|(_, buffer)| buffer.last_touched)
            .map(|(identification, _)| *identification)
        {
            debug!(identification = oldest, "evicting incomplete ipv4 datagram");
            self.buffers.remove(&oldest);
        }
    }
}
