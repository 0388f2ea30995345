// restores demands of a spectrum sliced optical network after link failures
// every link carries the same number of slots, a demand needs a contiguous block of them

/* rules, suppose a demand takes a width 3 block and goes through links A->B->C
then on each link 3 contiguous slots must be occupied by it
the block may start at a different slot on the next link only if the node in between
converts it, which consumes one unit of that node's conversion budget
the source node never converts */

pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod search;
pub mod session;
pub mod topology;
pub mod transaction;

type HashSet<K> = std::collections::hash_set::HashSet<K,nohash::BuildNoHashHasher<usize>>;

pub type NodeId = usize;
pub type LinkId = usize;
pub type DemandId = usize;

// a demand's block on one link, start and end are both inclusive
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub struct PathSegment {
    pub link:LinkId,
    pub start:usize,
    pub end:usize
}

impl PathSegment {
    pub fn new(link:LinkId,start:usize,width:usize) -> Self {
        debug_assert!(width > 0);
        Self {link,start,end:start + width - 1}
    }
    pub fn width(&self) -> usize {
        self.end + 1 - self.start
    }
    pub fn contains(&self,slot:usize) -> bool {
        slot >= self.start && slot <= self.end
    }
}

// ordered from the demand's source to its sink
pub type Path = Vec<PathSegment>;

fn empty_set<K>() -> HashSet<K> {
    HashSet::with_hasher(nohash::BuildNoHashHasher::default())
}
