use thiserror::Error;

use super::{DemandId, LinkId, NodeId};

// every variant is an integrity fault or a reference to something that does not exist
// none of them is recoverable, the run has to stop
#[derive(Error,Debug,Clone,PartialEq,Eq)]
pub enum NetworkError {
    #[error("Demand {demand} tried to occupy slot {slot} on link {link}, which is held by demand {holder}")]
    SlotConflict{link:LinkId,slot:usize,holder:DemandId,demand:DemandId},
    #[error("Demand {demand} tried to release slot {slot} on link {link}, but the slot is held by {holder:?}")]
    ForeignRelease{link:LinkId,slot:usize,holder:Option<DemandId>,demand:DemandId},
    #[error("Link {link} has {slot_count} slots, but slots {start}..={end} were accessed")]
    SlotOutOfRange{link:LinkId,start:usize,end:usize,slot_count:usize},
    #[error("Node {node} has no conversion left for demand {demand}")]
    ConversionUnderflow{node:NodeId,demand:DemandId},
    #[error("Node {node} would hold more than its {max} conversions after demand {demand} returned one")]
    ConversionOverflow{node:NodeId,max:usize,demand:DemandId},
    #[error("Demand {demand} already holds a conversion at node {node}")]
    DuplicateConversion{node:NodeId,demand:DemandId},
    #[error("Demand {demand} returned a conversion at node {node} it never held")]
    MissingConversion{node:NodeId,demand:DemandId},
    #[error("Node {node} holds {remaining} of {max} conversions, but {holders} demands are converting there")]
    ConversionMismatch{node:NodeId,remaining:usize,max:usize,holders:usize},
    #[error("Demand {demand} requires width {expected}, but a segment on link {link} is {found} wide")]
    WidthMismatch{demand:DemandId,link:LinkId,expected:usize,found:usize},
    #[error("Path of demand {demand} does not continue from node {node} over link {link}")]
    BrokenPath{demand:DemandId,node:NodeId,link:LinkId},
    #[error("Path of demand {demand} visits node {node} twice")]
    RepeatedNode{demand:DemandId,node:NodeId},
    #[error("Path of demand {demand} ends at node {reached}, but its sink is {sink}")]
    WrongSink{demand:DemandId,reached:NodeId,sink:NodeId},
    #[error("Slot {slot} on link {link} is held by demand {holder}, whose path does not cover it")]
    StraySlot{link:LinkId,slot:usize,holder:DemandId},
    #[error("Abandoned demand {0} still holds network resources")]
    AbandonedHolds(DemandId),
    #[error("Link {0} does not exist")]
    UnknownLink(LinkId),
    #[error("Node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("Demand {0} does not exist")]
    UnknownDemand(DemandId),
    #[error("Demand needs a block of {width} slots, which is empty or exceeds the {slot_count} slots per link")]
    InvalidWidth{width:usize,slot_count:usize}
}

pub type Result<T> = std::result::Result<T,NetworkError>;
