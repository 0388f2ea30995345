use super::error::Result;
use super::topology::Network;
use super::{DemandId, Path, PathSegment};

#[derive(Clone,Debug)]
enum Entry {
    Occupied{demand:DemandId,path:Path,keep:Path},
    Released{demand:DemandId,path:Path,keep:Path}
}

// position in a transaction's journal, rolling back to it undoes everything after
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord)]
pub struct Savepoint(usize);

// journals every occupy/release applied to the network
// dropped without commit, it undoes all of them in reverse order
pub struct Transaction<'n> {
    network:&'n mut Network,
    journal:Vec<Entry>
}

impl<'n> Transaction<'n> {
    pub fn begin(network:&'n mut Network) -> Self {
        Self {network,journal:Vec::new()}
    }
    pub fn network(&self) -> &Network {
        self.network
    }
    pub fn len(&self) -> usize {
        self.journal.len()
    }
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }
    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.journal.len())
    }

    // path's slots and conversions go to the demand, conversions keep already holds are reused
    pub fn occupy(&mut self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        self.network.occupy_path(demand, path, keep)?;
        self.journal.push(Entry::Occupied {demand,path:path.to_vec(),keep:keep.to_vec()});
        Ok(())
    }
    // path's slots and conversions are freed, except what keep still uses
    pub fn release(&mut self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        self.network.release_path(demand, path, keep)?;
        self.journal.push(Entry::Released {demand,path:path.to_vec(),keep:keep.to_vec()});
        Ok(())
    }

    // an entry leaves the journal only once it was undone, a failed step stays for the next attempt
    pub fn rollback_to(&mut self,savepoint:Savepoint) -> Result<()> {
        while self.journal.len() > savepoint.0 {
            let Some(entry) = self.journal.last() else {break};
            match entry {
                Entry::Occupied {demand,path,keep} => self.network.release_path(*demand, path, keep)?,
                Entry::Released {demand,path,keep} => self.network.occupy_path(*demand, path, keep)?
            }
            self.journal.pop();
        }
        Ok(())
    }
    pub fn rollback(mut self) -> Result<()> {
        self.rollback_to(Savepoint(0))
    }
    pub fn commit(mut self) {
        self.journal.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.journal.is_empty() {
            return;
        }
        if let Err(e) = self.rollback_to(Savepoint(0)) {
            // already unwinding from another fault, a second panic would abort without a message
            if !std::thread::panicking() {
                panic!("Rolling back an uncommitted transaction failed: {e}");
            }
        }
    }
}
