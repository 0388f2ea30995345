// best first search over (channel, node) states
// a state's channel is the start slot of the block the demand arrived with

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::dsa::bitset::BitSet;

use super::error::Result;
use super::topology::Network;
use super::{empty_set, DemandId, HashSet, LinkId, NodeId, Path, PathSegment};

// one hop always outweighs any number of conversions on a sane path
pub const LINK_COST_SCALE:u64 = 1000;
pub const CONVERSION_SURCHARGE:u64 = 1;

#[derive(Clone,Copy,Debug)]
struct Parent {
    channel:usize,
    node:NodeId,
    link:LinkId
}

// (priority, newest first among equal priorities, cost, channel, node)
type FrontierEntry = Reverse<(u64,Reverse<u64>,u64,usize,NodeId)>;

// scratch space is kept between searches, states are invalidated by bumping the epoch
pub struct PathSearch {
    nodes_len:usize,
    slot_count:usize,
    epoch:u64,
    stamps:Vec<u64>,
    costs:Vec<u64>,
    parents:Vec<Option<Parent>>,
    frontier:BinaryHeap<FrontierEntry>,
    // link*nodes_len + node, entering node over link is disabled
    blocked:HashSet<usize>,
    visited:BitSet
}

impl Default for PathSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSearch {
    pub fn new() -> Self {
        Self {
            nodes_len:0,
            slot_count:0,
            epoch:0,
            stamps:Vec::new(),
            costs:Vec::new(),
            parents:Vec::new(),
            frontier:BinaryHeap::new(),
            blocked:empty_set(),
            visited:BitSet::new()
        }
    }

    fn fit(&mut self,network:&Network) {
        let nodes_len = network.nodes().len();
        let slot_count = network.slot_count();
        if nodes_len == self.nodes_len && slot_count == self.slot_count {
            return;
        }
        let states = nodes_len*slot_count;
        self.nodes_len = nodes_len;
        self.slot_count = slot_count;
        self.epoch = 0;
        self.stamps = vec![0;states];
        self.costs = vec![0;states];
        self.parents = vec![None;states];
        self.visited = BitSet::zeros(nodes_len);
    }

    fn state(&self,channel:usize,node:NodeId) -> usize {
        channel*self.nodes_len + node
    }

    // searches a new path for a demand on the network as it currently is
    // the demand's own resources count as taken, release them first to reuse them
    pub fn find(&mut self,network:&Network,demand:DemandId) -> Result<Option<Path>> {
        let record = network.demand(demand)?;
        Ok(self.find_path(network, record.source, record.sink, record.width))
    }

    // loop free path of width slots from source to sink, None when there is none
    pub fn find_path(&mut self,network:&Network,source:NodeId,sink:NodeId,width:usize) -> Option<Path> {
        self.fit(network);
        self.blocked.clear();
        // every round blocks a pair the previous path used, so this bound is never the reason to stop early
        let limit = 2*network.links().len();
        loop {
            let path = self.search_once(network, source, sink, width)?;
            let Some((link,node)) = self.first_loop(network, source, &path) else {
                return Some(path);
            };
            if self.blocked.len() >= limit || !self.blocked.insert(link*self.nodes_len + node) {
                return None;
            }
            trace!(source,sink,link,node,blocked = self.blocked.len(),"path repeats a node, blocking link into node");
        }
    }

    // the link (and the node it leads to) the path used to first leave a node it later reenters
    fn first_loop(&mut self,network:&Network,source:NodeId,path:&[PathSegment]) -> Option<(LinkId,NodeId)> {
        self.visited.clear();
        self.visited.insert(source);
        let mut from = source;
        let mut repeated = None;
        for segment in path {
            let to = network.links()[segment.link].other_end(from)?;
            if !self.visited.insert(to) {
                repeated = Some(to);
                break;
            }
            from = to;
        }
        let repeated = repeated?;
        let mut from = source;
        for segment in path {
            let to = network.links()[segment.link].other_end(from)?;
            if from == repeated {
                return Some((segment.link,to));
            }
            from = to;
        }
        None
    }

    fn search_once(&mut self,network:&Network,source:NodeId,sink:NodeId,width:usize) -> Option<Path> {
        if source >= self.nodes_len || sink >= self.nodes_len {
            return None;
        }
        let distances = network.distances();
        // unreachable before any failure, unreachable now
        let start_hops = distances.get(source, sink)? as u64;
        self.epoch += 1;
        self.frontier.clear();
        let mut seq = 0u64;
        for channel in 0..self.slot_count {
            let index = self.state(channel, source);
            self.stamps[index] = self.epoch;
            self.costs[index] = 0;
            self.parents[index] = None;
            seq += 1;
            self.frontier.push(Reverse((start_hops*LINK_COST_SCALE,Reverse(seq),0,channel,source)));
        }

        let mut end_channel = None;
        while let Some(Reverse((_,_,cost,channel,node))) = self.frontier.pop() {
            let index = self.state(channel, node);
            if self.costs[index] != cost {
                continue;
            }
            if node == sink {
                end_channel = Some(channel);
                break;
            }
            let came_from = self.parents[index].map(|p| p.node);
            let record = &network.nodes()[node];
            let can_convert = node != source && record.remaining_conversions() > 0 && !record.failed;
            for adjacent in network.graph().neighbours(node) {
                let next = adjacent.to;
                // no walking straight back
                if came_from == Some(next) {
                    continue;
                }
                let link = &network.links()[adjacent.link];
                if link.failed {
                    continue;
                }
                if self.blocked.contains(&(adjacent.link*self.nodes_len + next)) {
                    continue;
                }
                let Some(hops) = distances.get(next, sink) else {continue};
                for &start in link.spectrum().free_starts(width) {
                    let mut next_cost = cost + link.weight*LINK_COST_SCALE;
                    if start != channel {
                        if !can_convert {
                            continue;
                        }
                        next_cost += CONVERSION_SURCHARGE;
                    }
                    let next_index = self.state(start, next);
                    if self.stamps[next_index] == self.epoch && self.costs[next_index] <= next_cost {
                        continue;
                    }
                    self.stamps[next_index] = self.epoch;
                    self.costs[next_index] = next_cost;
                    self.parents[next_index] = Some(Parent {channel,node,link:adjacent.link});
                    seq += 1;
                    let priority = next_cost + hops as u64*LINK_COST_SCALE;
                    self.frontier.push(Reverse((priority,Reverse(seq),next_cost,start,next)));
                }
            }
        }

        let mut channel = end_channel?;
        let mut node = sink;
        let mut path = Vec::new();
        while node != source {
            let parent = self.parents[self.state(channel, node)]?;
            path.push(PathSegment::new(parent.link, channel, width));
            channel = parent.channel;
            node = parent.node;
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::PathSearch;
    use crate::optical_network::topology::Network;
    use crate::optical_network::topology::tests::triangle;
    use crate::optical_network::{NodeId, PathSegment};

    // node sequence, panics if the path is not connected
    fn nodes_of(network:&Network,source:NodeId,path:&[PathSegment]) -> Vec<NodeId> {
        let mut nodes = vec![source];
        for segment in path {
            let last = *nodes.last().unwrap();
            nodes.push(network.link(segment.link).unwrap().other_end(last).unwrap());
        }
        nodes
    }

    fn is_loop_free(nodes:&[NodeId]) -> bool {
        let mut sorted = nodes.to_vec();
        sorted.sort();
        sorted.dedup();
        sorted.len() == nodes.len()
    }

    #[test]
    fn test_detour_around_failed_link() {
        let mut network = triangle();
        let id = network.add_demand(0, 1, 1, 10, vec![PathSegment::new(0, 0, 1)]).unwrap();
        network.fail_link(0).unwrap();
        let mut search = PathSearch::new();
        let path = search.find(&network, id).unwrap().unwrap();
        assert_eq!(path.len(),2);
        assert_eq!(nodes_of(&network, 0, &path),vec![0,2,1]);
        // plenty of room, no reason to convert
        assert_eq!(path[0].start,path[1].start);
    }
    #[test]
    fn test_prefers_fewer_hops() {
        let network = triangle();
        let mut search = PathSearch::new();
        let path = search.find_path(&network, 0, 1, 3).unwrap();
        assert_eq!(path.len(),1);
        assert_eq!(path[0].link,0);
        assert_eq!(path[0].width(),3);
        assert_eq!(search.find_path(&network, 2, 2, 1),Some(vec![]));
        assert_eq!(search.find_path(&network, 0, 1, 9),None);
    }
    #[test]
    fn test_conversion_rules() {
        // line 0-1-2, slot 0 free on link 0 only, slot 1 free on link 1 only
        let mut network = Network::new(2, &[1,0,0], &[(0,1),(1,2)]).unwrap();
        network.add_demand(0, 1, 1, 1, vec![PathSegment::new(0, 1, 1)]).unwrap();
        network.add_demand(1, 2, 1, 1, vec![PathSegment::new(1, 0, 1)]).unwrap();
        let mut search = PathSearch::new();
        // node 1 has no budget
        assert_eq!(search.find_path(&network, 0, 2, 1),None);

        let mut network = Network::new(2, &[1,1,0], &[(0,1),(1,2)]).unwrap();
        network.add_demand(0, 1, 1, 1, vec![PathSegment::new(0, 1, 1)]).unwrap();
        network.add_demand(1, 2, 1, 1, vec![PathSegment::new(1, 0, 1)]).unwrap();
        let path = search.find_path(&network, 0, 2, 1).unwrap();
        assert_eq!(path,vec![PathSegment::new(0, 0, 1),PathSegment::new(1, 1, 1)]);
        // the source never converts, so 2 -> 1 -> 0 only works by converting at 1
        let back = search.find_path(&network, 2, 0, 1).unwrap();
        assert_eq!(back,vec![PathSegment::new(1, 1, 1),PathSegment::new(0, 0, 1)]);

        let mut network = Network::new(2, &[1,1,0], &[(0,1),(1,2)]).unwrap();
        network.add_demand(0, 1, 1, 1, vec![PathSegment::new(0, 1, 1)]).unwrap();
        network.add_demand(1, 2, 1, 1, vec![PathSegment::new(1, 0, 1)]).unwrap();
        // another demand takes the last free slot of link 0 and node 1's only conversion
        network.add_demand(0, 2, 1, 1, vec![PathSegment::new(0, 0, 1),PathSegment::new(1, 1, 1)]).unwrap();
        assert_eq!(search.find_path(&network, 0, 2, 1),None);
    }
    #[test]
    fn test_loop_repair() {
        // S=0 A=1 B=2 C=3 T=4, D chain 5..=9
        // S-A has only slot 0 free, A-T only slot 1, A can not convert
        // the cheapest state path is S A B C A T (converting at B or C), which revisits A
        let links = [
            (0,1),(1,4),(1,2),(2,3),(3,1),
            (0,5),(5,6),(6,7),(7,8),(8,9),(9,4)
        ];
        let mut budgets = [0;10];
        budgets[2] = 1;
        budgets[3] = 1;
        let mut network = Network::new(4, &budgets, &links).unwrap();
        network.add_demand(0, 1, 3, 1, vec![PathSegment::new(0, 1, 3)]).unwrap();
        network.add_demand(1, 4, 1, 1, vec![PathSegment::new(1, 0, 1)]).unwrap();
        network.add_demand(1, 4, 2, 1, vec![PathSegment::new(1, 2, 2)]).unwrap();
        let mut search = PathSearch::new();
        let path = search.find_path(&network, 0, 4, 1).unwrap();
        let nodes = nodes_of(&network, 0, &path);
        assert!(is_loop_free(&nodes));
        assert_eq!(nodes,vec![0,5,6,7,8,9,4]);

        // without the detour chain nothing loop free is left
        let mut network = Network::new(4, &budgets[..5], &links[..5]).unwrap();
        network.add_demand(0, 1, 3, 1, vec![PathSegment::new(0, 1, 3)]).unwrap();
        network.add_demand(1, 4, 1, 1, vec![PathSegment::new(1, 0, 1)]).unwrap();
        network.add_demand(1, 4, 2, 1, vec![PathSegment::new(1, 2, 2)]).unwrap();
        assert_eq!(search.find_path(&network, 0, 4, 1),None);
    }
    #[test]
    fn test_random_paths_are_valid() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let nodes_len = rng.random_range(4..16);
            let slot_count = rng.random_range(2..10);
            let links:Vec<(usize,usize)> = (0..nodes_len*2).map(|_| {
                let u = rng.random_range(0..nodes_len);
                let v = (u + rng.random_range(1..nodes_len))%nodes_len;
                (u,v)
            }).collect();
            let budgets:Vec<usize> = (0..nodes_len).map(|_| rng.random_range(0..3)).collect();
            let mut network = Network::new(slot_count, &budgets, &links).unwrap();
            // random single link demands as background occupancy
            for _ in 0..links.len()*slot_count/2 {
                let link = rng.random_range(0..links.len());
                let start = rng.random_range(0..slot_count);
                let (u,v) = links[link];
                let _ = network.add_demand(u, v, 1, 1, vec![PathSegment::new(link, start, 1)]);
            }
            for link in 0..links.len() {
                if rng.random_bool(0.2) {
                    network.fail_link(link).unwrap();
                }
            }
            let mut search = PathSearch::new();
            for _ in 0..20 {
                let source = rng.random_range(0..nodes_len);
                let sink = rng.random_range(0..nodes_len);
                let width = rng.random_range(1..3);
                let Some(path) = search.find_path(&network, source, sink, width) else {continue};
                let nodes = nodes_of(&network, source, &path);
                assert!(is_loop_free(&nodes));
                assert_eq!(*nodes.last().unwrap(),sink);
                for (i,segment) in path.iter().enumerate() {
                    let link = network.link(segment.link).unwrap();
                    assert!(!link.failed);
                    assert_eq!(segment.width(),width);
                    assert!(link.spectrum().is_free(segment.start, segment.end));
                    if i > 0 && path[i - 1].start != segment.start {
                        let node = network.node(nodes[i]).unwrap();
                        assert!(nodes[i] != source);
                        assert!(node.remaining_conversions() > 0);
                    }
                }
            }
        }
    }
}
