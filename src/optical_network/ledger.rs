use super::error::{NetworkError, Result};
use super::{DemandId, LinkId};

// slot occupancy of one link, together with a table of free blocks per width
// the table is rebuilt after every mutation, so it always agrees with the slots
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct SpectrumLedger {
    link:LinkId,
    slots:Vec<Option<DemandId>>,
    //free_starts[w] holds, ascending, every s such that s..s+w is free
    //free_starts[0] stays empty
    free_starts:Vec<Vec<usize>>
}

impl SpectrumLedger {
    pub fn new(link:LinkId,slot_count:usize) -> Self {
        let mut ledger = Self {
            link,
            slots:vec![None;slot_count],
            free_starts:vec![Vec::new();slot_count + 1]
        };
        ledger.rebuild();
        ledger
    }
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
    pub fn holder(&self,slot:usize) -> Option<DemandId> {
        self.slots.get(slot).copied().flatten()
    }
    pub fn slots(&self) -> &[Option<DemandId>] {
        &self.slots
    }
    pub fn free_starts(&self,width:usize) -> &[usize] {
        self.free_starts.get(width).map(|v| v.as_slice()).unwrap_or(&[])
    }
    pub fn is_free(&self,start:usize,end:usize) -> bool {
        start <= end && end < self.slots.len() && self.slots[start..=end].iter().all(|s| s.is_none())
    }
    // distinct holders in slot order
    pub fn holders(&self) -> Vec<DemandId> {
        let mut holders:Vec<DemandId> = Vec::new();
        for holder in self.slots.iter().flatten() {
            if !holders.contains(holder) {
                holders.push(*holder);
            }
        }
        holders
    }

    fn check_range(&self,start:usize,end:usize) -> Result<()> {
        if start > end || end >= self.slots.len() {
            return Err(NetworkError::SlotOutOfRange {
                link:self.link,start,end,slot_count:self.slots.len()
            })
        }
        Ok(())
    }

    // slots already held by the same demand are accepted as they are
    pub fn occupy(&mut self,start:usize,end:usize,demand:DemandId) -> Result<()> {
        self.check_range(start, end)?;
        for slot in start..=end {
            if let Some(holder) = self.slots[slot] {
                if holder != demand {
                    return Err(NetworkError::SlotConflict {link:self.link,slot,holder,demand})
                }
            }
        }
        for slot in start..=end {
            self.slots[slot] = Some(demand);
        }
        self.rebuild();
        Ok(())
    }

    // slots for which keep returns true stay with the demand
    pub fn release<F:Fn(usize) -> bool>(&mut self,start:usize,end:usize,demand:DemandId,keep:F) -> Result<()> {
        self.check_range(start, end)?;
        for slot in start..=end {
            if keep(slot) {continue}
            if self.slots[slot] != Some(demand) {
                return Err(NetworkError::ForeignRelease {
                    link:self.link,slot,holder:self.slots[slot],demand
                })
            }
        }
        for slot in start..=end {
            if !keep(slot) {
                self.slots[slot] = None;
            }
        }
        self.rebuild();
        Ok(())
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.rebuild();
    }

    // O(slot_count^2), every free run of length n contributes one start to each width 1..=n
    fn rebuild(&mut self) {
        for starts in self.free_starts.iter_mut() {
            starts.clear();
        }
        let mut free_len = 0;
        for (i,slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                free_len = 0;
                continue;
            }
            free_len += 1;
            for width in (1..=free_len).rev() {
                self.free_starts[width].push(i + 1 - width);
            }
        }
    }
}
