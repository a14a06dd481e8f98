/// Bounds-checked big-endian reader over an untrusted byte slice.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn advance(&mut self, bytes: usize) -> bool {
        if bytes > self.remaining() {
            return false;
        }
        self.pos += bytes;
        true
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    pub fn read_u16_be(&mut self) -> Option<u16> {
        let bytes = self.read_array::<2>()?;
        Some(u16::from_be_bytes(bytes))
    }

    pub fn read_u32_be(&mut self) -> Option<u32> {
        let bytes = self.read_array::<4>()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_exact(N)?;
        bytes.try_into().ok()
    }

    pub fn read_exact(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let out = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn reads_stop_at_end_of_data() {
        let mut cursor = Cursor::new(&[0x12, 0x34, 0x56, 0x78, 0x9a]);
        assert_eq!(cursor.read_u32_be(), Some(0x1234_5678));
        assert_eq!(cursor.read_u16_be(), None);
        assert_eq!(cursor.remaining(), 1);
        assert!(cursor.advance(1));
        assert!(!cursor.advance(1));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn read_exact_leaves_position_on_failure() {
        let mut cursor = Cursor::new(&[1, 2, 3]);
        assert!(cursor.advance(1));
        assert_eq!(cursor.read_exact(3), None);
        assert_eq!(cursor.read_array::<2>(), Some([2, 3]));
    }
}
