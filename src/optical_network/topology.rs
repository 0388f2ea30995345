use rand::Rng;

use crate::dsa::bitset::BitSet;
use crate::dsa::graph::{DistanceTable, UnDirectedGraph};

use super::error::{NetworkError, Result};
use super::ledger::SpectrumLedger;
use super::{empty_set, DemandId, HashSet, LinkId, NodeId, Path, PathSegment};

#[derive(Clone,Debug)]
pub struct Node {
    pub id:NodeId,
    max_conversions:usize,
    remaining_conversions:usize,
    // demands currently converting here, one conversion each
    converting:HashSet<DemandId>,
    // never set by the dispatcher, the search still honours it
    pub failed:bool
}

impl Node {
    fn new(id:NodeId,max_conversions:usize) -> Self {
        Self {
            id,
            max_conversions,
            remaining_conversions:max_conversions,
            converting:empty_set(),
            failed:false
        }
    }
    pub fn max_conversions(&self) -> usize {
        self.max_conversions
    }
    pub fn remaining_conversions(&self) -> usize {
        self.remaining_conversions
    }
    pub fn is_converting(&self,demand:DemandId) -> bool {
        self.converting.contains(&demand)
    }
    pub fn converting_len(&self) -> usize {
        self.converting.len()
    }
    fn consume(&mut self,demand:DemandId) -> Result<()> {
        if self.remaining_conversions == 0 {
            return Err(NetworkError::ConversionUnderflow {node:self.id,demand})
        }
        if !self.converting.insert(demand) {
            return Err(NetworkError::DuplicateConversion {node:self.id,demand})
        }
        self.remaining_conversions -= 1;
        Ok(())
    }
    fn refund(&mut self,demand:DemandId) -> Result<()> {
        if self.remaining_conversions >= self.max_conversions {
            return Err(NetworkError::ConversionOverflow {node:self.id,max:self.max_conversions,demand})
        }
        if !self.converting.remove(&demand) {
            return Err(NetworkError::MissingConversion {node:self.id,demand})
        }
        self.remaining_conversions += 1;
        Ok(())
    }
    fn reset(&mut self) {
        self.remaining_conversions = self.max_conversions;
        self.converting.clear();
        self.failed = false;
    }
}

#[derive(Clone,Debug)]
pub struct Link {
    pub id:LinkId,
    pub ends:(NodeId,NodeId),
    pub failed:bool,
    pub weight:u64,
    pub(crate) spectrum:SpectrumLedger
}

impl Link {
    pub fn other_end(&self,node:NodeId) -> Option<NodeId> {
        if self.ends.0 == node {
            Some(self.ends.1)
        } else if self.ends.1 == node {
            Some(self.ends.0)
        } else {
            None
        }
    }
    pub fn spectrum(&self) -> &SpectrumLedger {
        &self.spectrum
    }
}

#[derive(Clone,Debug)]
pub struct Demand {
    pub id:DemandId,
    pub source:NodeId,
    pub sink:NodeId,
    pub width:usize,
    pub value:u64,
    // set once, cleared only by Network::reset
    pub(crate) abandoned:bool,
    pub(crate) path:Path
}

impl Demand {
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }
}

// topology, demands and all their mutable state
// everything refers to everything else by index, nothing is shared by reference
#[derive(Clone,Debug)]
pub struct Network {
    slot_count:usize,
    nodes:Vec<Node>,
    links:Vec<Link>,
    demands:Vec<Demand>,
    original_paths:Vec<Path>,
    // adjacency the search walks, reshuffled by the dispatcher
    graph:UnDirectedGraph,
    original_graph:UnDirectedGraph,
    // hop counts of the original topology, never refreshed after failures
    distances:DistanceTable
}

impl Network {
    pub fn new(slot_count:usize,conversion_budgets:&[usize],link_ends:&[(NodeId,NodeId)]) -> Result<Self> {
        let nodes_len = conversion_budgets.len();
        let nodes:Vec<Node> = conversion_budgets.iter().enumerate()
            .map(|(id,budget)| Node::new(id,*budget)).collect();
        let mut graph = UnDirectedGraph::new(nodes_len);
        let mut links = Vec::with_capacity(link_ends.len());
        for (id,&(u,v)) in link_ends.iter().enumerate() {
            if u >= nodes_len {return Err(NetworkError::UnknownNode(u))}
            if v >= nodes_len {return Err(NetworkError::UnknownNode(v))}
            let link = graph.push_edge((u,v));
            debug_assert_eq!(link,id);
            links.push(Link {
                id,
                ends:(u,v),
                failed:false,
                weight:1,
                spectrum:SpectrumLedger::new(id,slot_count)
            });
        }
        graph.shrink_to_fit();
        let distances = graph.hop_distances();
        Ok(Self {
            slot_count,
            nodes,
            links,
            demands:Vec::new(),
            original_paths:Vec::new(),
            original_graph:graph.clone(),
            graph,
            distances
        })
    }

    // registers a demand with its pre-failure assignment and occupies it right away
    pub fn add_demand(&mut self,source:NodeId,sink:NodeId,width:usize,value:u64,path:Path) -> Result<DemandId> {
        if source >= self.nodes.len() {return Err(NetworkError::UnknownNode(source))}
        if sink >= self.nodes.len() {return Err(NetworkError::UnknownNode(sink))}
        if width == 0 || width > self.slot_count {
            return Err(NetworkError::InvalidWidth {width,slot_count:self.slot_count})
        }
        let id = self.demands.len();
        self.demands.push(Demand {
            id,source,sink,width,value,abandoned:false,path:Vec::new()
        });
        let checked = self.check_path(id, &path)
            .and_then(|_| self.check_available(id, &path, &[]));
        if let Err(e) = checked {
            self.demands.pop();
            return Err(e);
        }
        self.occupy_path(id, &path, &[])?;
        self.demands[id].path = path.clone();
        self.original_paths.push(path);
        Ok(id)
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn links(&self) -> &[Link] {
        &self.links
    }
    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }
    pub fn node(&self,id:NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(NetworkError::UnknownNode(id))
    }
    pub fn link(&self,id:LinkId) -> Result<&Link> {
        self.links.get(id).ok_or(NetworkError::UnknownLink(id))
    }
    pub fn demand(&self,id:DemandId) -> Result<&Demand> {
        self.demands.get(id).ok_or(NetworkError::UnknownDemand(id))
    }
    pub fn graph(&self) -> &UnDirectedGraph {
        &self.graph
    }
    pub fn distances(&self) -> &DistanceTable {
        &self.distances
    }

    pub(crate) fn shuffle_adjacency<R:Rng + ?Sized>(&mut self,rng:&mut R) {
        self.graph.shuffle(rng);
    }
    pub(crate) fn fail_link(&mut self,id:LinkId) -> Result<()> {
        let link = self.links.get_mut(id).ok_or(NetworkError::UnknownLink(id))?;
        link.failed = true;
        Ok(())
    }
    pub(crate) fn set_path(&mut self,id:DemandId,path:Path) -> Result<()> {
        let demand = self.demands.get_mut(id).ok_or(NetworkError::UnknownDemand(id))?;
        demand.path = path;
        Ok(())
    }
    // the caller releases the demand's resources first
    pub(crate) fn abandon(&mut self,id:DemandId) -> Result<()> {
        let demand = self.demands.get_mut(id).ok_or(NetworkError::UnknownDemand(id))?;
        demand.abandoned = true;
        demand.path.clear();
        Ok(())
    }

    // puts every link, node and demand back to the pre-failure assignment
    pub fn reset(&mut self) -> Result<()> {
        for link in self.links.iter_mut() {
            link.failed = false;
            link.spectrum.clear();
        }
        for node in self.nodes.iter_mut() {
            node.reset();
        }
        self.graph = self.original_graph.clone();
        for id in 0..self.demands.len() {
            let path = self.original_paths[id].clone();
            self.occupy_path(id, &path, &[])?;
            let demand = &mut self.demands[id];
            demand.abandoned = false;
            demand.path = path;
        }
        Ok(())
    }

    // node sequence of a path walked from the demand's source, one longer than the path
    pub fn walk(&self,demand:DemandId,path:&[PathSegment]) -> Result<Vec<NodeId>> {
        let source = self.demand(demand)?.source;
        let mut nodes = Vec::with_capacity(path.len() + 1);
        nodes.push(source);
        let mut from = source;
        for segment in path {
            let link = self.link(segment.link)?;
            let to = link.other_end(from)
                .ok_or(NetworkError::BrokenPath {demand,node:from,link:segment.link})?;
            nodes.push(to);
            from = to;
        }
        Ok(nodes)
    }

    // nodes where the path switches to a different start slot
    pub fn conversion_nodes(&self,demand:DemandId,path:&[PathSegment]) -> Result<Vec<NodeId>> {
        let nodes = self.walk(demand, path)?;
        let mut conversions = Vec::new();
        for (i,pair) in path.windows(2).enumerate() {
            if pair[0].start != pair[1].start {
                conversions.push(nodes[i + 1]);
            }
        }
        Ok(conversions)
    }

    // a committed path must lead from source to sink, loop free, at the demand's width
    pub fn check_path(&self,demand:DemandId,path:&[PathSegment]) -> Result<()> {
        let record = self.demand(demand)?;
        for segment in path {
            if segment.start > segment.end || segment.end >= self.slot_count {
                return Err(NetworkError::SlotOutOfRange {
                    link:segment.link,start:segment.start,end:segment.end,slot_count:self.slot_count
                })
            }
            if segment.width() != record.width {
                return Err(NetworkError::WidthMismatch {
                    demand,link:segment.link,expected:record.width,found:segment.width()
                })
            }
        }
        let nodes = self.walk(demand, path)?;
        let mut seen = BitSet::zeros(self.nodes.len());
        for node in nodes.iter() {
            if !seen.insert(*node) {
                return Err(NetworkError::RepeatedNode {demand,node:*node})
            }
        }
        let reached = nodes.last().copied().unwrap_or(record.source);
        if reached != record.sink {
            return Err(NetworkError::WrongSink {demand,reached,sink:record.sink})
        }
        Ok(())
    }

    // everything path needs beyond keep is free for the demand, nothing is mutated
    fn check_available(&self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        for segment in path {
            let ledger = &self.link(segment.link)?.spectrum;
            if segment.start > segment.end || segment.end >= ledger.slot_count() {
                return Err(NetworkError::SlotOutOfRange {
                    link:segment.link,start:segment.start,end:segment.end,slot_count:ledger.slot_count()
                })
            }
            for slot in segment.start..=segment.end {
                if let Some(holder) = ledger.holder(slot) {
                    if holder != demand {
                        return Err(NetworkError::SlotConflict {link:segment.link,slot,holder,demand})
                    }
                }
            }
        }
        let kept_conversions = self.conversion_nodes(demand, keep)?;
        for node in self.conversion_nodes(demand, path)? {
            if kept_conversions.contains(&node) {continue}
            let record = &self.nodes[node];
            if record.remaining_conversions == 0 {
                return Err(NetworkError::ConversionUnderflow {node,demand})
            }
            if record.is_converting(demand) {
                return Err(NetworkError::DuplicateConversion {node,demand})
            }
        }
        Ok(())
    }

    // everything path holds beyond keep belongs to the demand, nothing is mutated
    fn check_releasable(&self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        for segment in path {
            let ledger = &self.link(segment.link)?.spectrum;
            if segment.start > segment.end || segment.end >= ledger.slot_count() {
                return Err(NetworkError::SlotOutOfRange {
                    link:segment.link,start:segment.start,end:segment.end,slot_count:ledger.slot_count()
                })
            }
            let kept = keep.iter().find(|k| k.link == segment.link);
            for slot in segment.start..=segment.end {
                if kept.is_some_and(|k| k.contains(slot)) {continue}
                if ledger.holder(slot) != Some(demand) {
                    return Err(NetworkError::ForeignRelease {
                        link:segment.link,slot,holder:ledger.holder(slot),demand
                    })
                }
            }
        }
        let kept_conversions = self.conversion_nodes(demand, keep)?;
        for node in self.conversion_nodes(demand, path)? {
            if kept_conversions.contains(&node) {continue}
            let record = &self.nodes[node];
            if !record.is_converting(demand) {
                return Err(NetworkError::MissingConversion {node,demand})
            }
            if record.remaining_conversions >= record.max_conversions {
                return Err(NetworkError::ConversionOverflow {node,max:record.max_conversions,demand})
            }
        }
        Ok(())
    }

    // takes the slots and conversions of path, except conversions keep already holds
    // either everything is applied or nothing is
    pub(crate) fn occupy_path(&mut self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        self.check_available(demand, path, keep)?;
        let kept_conversions = self.conversion_nodes(demand, keep)?;
        let conversions = self.conversion_nodes(demand, path)?;
        for segment in path {
            self.links[segment.link].spectrum.occupy(segment.start, segment.end, demand)?;
        }
        for node in conversions {
            if !kept_conversions.contains(&node) {
                self.nodes[node].consume(demand)?;
            }
        }
        Ok(())
    }

    // gives back the slots and conversions of path, except what keep still uses
    // either everything is applied or nothing is
    pub(crate) fn release_path(&mut self,demand:DemandId,path:&[PathSegment],keep:&[PathSegment]) -> Result<()> {
        self.check_releasable(demand, path, keep)?;
        let kept_conversions = self.conversion_nodes(demand, keep)?;
        let conversions = self.conversion_nodes(demand, path)?;
        for segment in path {
            let kept = keep.iter().find(|k| k.link == segment.link).copied();
            self.links[segment.link].spectrum.release(segment.start, segment.end, demand, |slot| {
                kept.is_some_and(|k| k.contains(slot))
            })?;
        }
        for node in conversions {
            if !kept_conversions.contains(&node) {
                self.nodes[node].refund(demand)?;
            }
        }
        Ok(())
    }

    pub fn total_value(&self) -> u64 {
        self.demands.iter().map(|d| d.value).sum()
    }
    pub fn retained_value(&self) -> u64 {
        self.demands.iter().filter(|d| !d.abandoned).map(|d| d.value).sum()
    }
    // value per slot of the whole network, the yardstick for selective abandonment
    pub fn average_value_density(&self) -> f64 {
        let capacity = self.links.len()*self.slot_count;
        if capacity == 0 {
            return 0.0;
        }
        self.total_value() as f64 / capacity as f64
    }

    // verifies the committed state, returns the first violation found
    pub fn check_integrity(&self) -> Result<()> {
        let mut expected_conversions = vec![0usize;self.nodes.len()];
        for demand in self.demands.iter() {
            if demand.abandoned {
                if !demand.path.is_empty() {
                    return Err(NetworkError::AbandonedHolds(demand.id))
                }
                continue;
            }
            self.check_path(demand.id, &demand.path)?;
            for segment in demand.path.iter() {
                let ledger = &self.links[segment.link].spectrum;
                for slot in segment.start..=segment.end {
                    if ledger.holder(slot) != Some(demand.id) {
                        return Err(NetworkError::ForeignRelease {
                            link:segment.link,slot,holder:ledger.holder(slot),demand:demand.id
                        })
                    }
                }
            }
            for node in self.conversion_nodes(demand.id, &demand.path)? {
                if !self.nodes[node].is_converting(demand.id) {
                    return Err(NetworkError::MissingConversion {node,demand:demand.id})
                }
                expected_conversions[node] += 1;
            }
        }
        for link in self.links.iter() {
            for (slot,holder) in link.spectrum.slots().iter().enumerate() {
                let Some(holder) = holder else {continue};
                let covered = self.demands.get(*holder).is_some_and(|d| {
                    !d.abandoned && d.path.iter().any(|s| s.link == link.id && s.contains(slot))
                });
                if !covered {
                    return Err(NetworkError::StraySlot {link:link.id,slot,holder:*holder})
                }
            }
        }
        for node in self.nodes.iter() {
            let holders = node.converting_len();
            if holders != expected_conversions[node.id]
                || node.remaining_conversions + holders != node.max_conversions {
                return Err(NetworkError::ConversionMismatch {
                    node:node.id,
                    remaining:node.remaining_conversions,
                    max:node.max_conversions,
                    holders
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Network;
    use crate::optical_network::error::NetworkError;
    use crate::optical_network::PathSegment;

    // triangle 0-1-2 with link 0:0-1, 1:1-2, 2:2-0, 8 slots, one conversion per node
    pub(crate) fn triangle() -> Network {
        Network::new(8, &[1,1,1], &[(0,1),(1,2),(2,0)]).unwrap()
    }

    #[test]
    fn test_add_demand_occupies() {
        let mut network = triangle();
        let id = network.add_demand(0, 1, 2, 10, vec![PathSegment::new(0, 3, 2)]).unwrap();
        assert_eq!(id,0);
        assert_eq!(network.link(0).unwrap().spectrum().holder(3),Some(0));
        assert_eq!(network.link(0).unwrap().spectrum().holder(4),Some(0));
        assert_eq!(network.link(0).unwrap().spectrum().holder(5),None);
        network.check_integrity().unwrap();
        assert_eq!(
            network.add_demand(0, 1, 1, 5, vec![PathSegment::new(0, 4, 1)]),
            Err(NetworkError::SlotConflict {link:0,slot:4,holder:0,demand:1})
        );
        assert_eq!(network.demands().len(),1);
        assert!(matches!(
            network.add_demand(0, 2, 1, 5, vec![PathSegment::new(0, 0, 1)]),
            Err(NetworkError::WrongSink{..})
        ));
        assert!(matches!(
            network.add_demand(0, 1, 2, 5, vec![PathSegment::new(0, 0, 1)]),
            Err(NetworkError::WidthMismatch{..})
        ));
        assert!(matches!(
            network.add_demand(0, 1, 9, 5, vec![]),
            Err(NetworkError::InvalidWidth{..})
        ));
        network.check_integrity().unwrap();
    }
    #[test]
    fn test_conversions_are_counted() {
        let mut network = triangle();
        let path = vec![PathSegment::new(2, 0, 1),PathSegment::new(1, 4, 1)];
        assert_eq!(network.walk(0, &path),Err(NetworkError::UnknownDemand(0)));
        let id = network.add_demand(0, 1, 1, 10, path.clone()).unwrap();
        assert_eq!(network.walk(id, &path).unwrap(),vec![0,2,1]);
        assert_eq!(network.conversion_nodes(id, &path).unwrap(),vec![2]);
        assert_eq!(network.node(2).unwrap().remaining_conversions(),0);
        assert!(network.node(2).unwrap().is_converting(id));
        assert_eq!(network.node(2).unwrap().converting_len(),1);
        assert_eq!(network.node(1).unwrap().converting_len(),0);
        network.check_integrity().unwrap();
        // node 2 is out of conversions now
        assert_eq!(
            network.add_demand(0, 1, 1, 10, vec![PathSegment::new(2, 1, 1),PathSegment::new(1, 5, 1)]),
            Err(NetworkError::ConversionUnderflow {node:2,demand:1})
        );
    }
    #[test]
    fn test_release_keeps_shared_resources() {
        let mut network = triangle();
        let old = vec![PathSegment::new(2, 0, 1),PathSegment::new(1, 4, 1)];
        let id = network.add_demand(0, 1, 1, 10, old.clone()).unwrap();
        let new = vec![PathSegment::new(2, 0, 1),PathSegment::new(1, 6, 1)];
        network.occupy_path(id, &new, &old).unwrap();
        assert_eq!(network.node(2).unwrap().remaining_conversions(),0);
        network.release_path(id, &old, &new).unwrap();
        network.set_path(id, new).unwrap();
        network.check_integrity().unwrap();
        assert_eq!(network.link(1).unwrap().spectrum().holder(4),None);
        assert_eq!(network.link(2).unwrap().spectrum().holder(0),Some(id));
        assert!(network.node(2).unwrap().is_converting(id));
    }
    #[test]
    fn test_reset_restores_original() {
        let mut network = triangle();
        let path = vec![PathSegment::new(2, 0, 1),PathSegment::new(1, 4, 1)];
        let id = network.add_demand(0, 1, 1, 10, path.clone()).unwrap();
        let before = network.clone();
        network.fail_link(1).unwrap();
        network.release_path(id, &path, &[]).unwrap();
        network.abandon(id).unwrap();
        network.check_integrity().unwrap();
        network.reset().unwrap();
        network.check_integrity().unwrap();
        assert_eq!(network.demand(id).unwrap().path(),before.demand(id).unwrap().path());
        assert!(!network.demand(id).unwrap().is_abandoned());
        for (link,original) in network.links().iter().zip(before.links()) {
            assert_eq!(link.spectrum(),original.spectrum());
            assert!(!link.failed);
        }
        for (node,original) in network.nodes().iter().zip(before.nodes()) {
            assert_eq!(node.remaining_conversions(),original.remaining_conversions());
        }
    }
    #[test]
    fn test_density() {
        let mut network = triangle();
        network.add_demand(0, 1, 1, 12, vec![PathSegment::new(0, 0, 1)]).unwrap();
        network.add_demand(1, 2, 1, 36, vec![PathSegment::new(1, 0, 1)]).unwrap();
        assert_eq!(network.total_value(),48);
        assert_eq!(network.average_value_density(),2.0);
    }
}
