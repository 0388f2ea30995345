// fixed length bitset, one bit per node id
// used to detect repeated nodes while walking a path
pub(crate) struct BitSet {
    size:usize,
    bytes:Vec<u8>
}

impl BitSet {
    pub(crate) fn new() -> Self {
        Self {size:0,bytes:vec![]}
    }
    pub(crate) fn zeros(size:usize) -> Self {
        if size == 0 {return Self::new()}
        Self {
            size,
            bytes:vec![0;size/8 + 1]
        }
    }
    fn locate(&self,index:usize) -> Option<(usize,u8)> {
        if index >= self.size {return None}
        Some((index/8,1u8 << (index%8)))
    }
    // sets the bit, returns false if it was already set
    // out of range indexes are reported as already set
    pub(crate) fn insert(&mut self,index:usize) -> bool {
        let Some((byte_pos,mask)) = self.locate(index) else {return false};
        let byte = &mut self.bytes[byte_pos];
        if *byte & mask > 0 {
            return false;
        }
        *byte |= mask;
        true
    }
    pub(crate) fn clear(&mut self) {
        self.bytes.fill(0);
    }
}
