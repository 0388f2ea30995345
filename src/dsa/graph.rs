use std::borrow::Borrow;
use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;

// one entry of a node's adjacency list
// parallel links between the same pair of nodes are kept apart by their link id
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Adjacent {
    pub link:usize,
    pub to:usize
}

// undirected multigraph over nodes 0..nodes_len
// link ids are handed out in insertion order, so they stay stable for the graph's lifetime
#[derive(Clone,Debug)]
pub struct UnDirectedGraph {
    edges_len:usize,
    adjacency_list:Vec<Vec<Adjacent>>
}

impl Default for UnDirectedGraph {
    fn default() -> Self {
        Self::new(0)
    }
}

impl UnDirectedGraph {
    pub fn new(nodes_len:usize) -> Self {
        Self {
            edges_len:0,
            adjacency_list:vec![Vec::new();nodes_len]
        }
    }
    pub fn edges_len(&self) -> usize {
        self.edges_len
    }
    pub fn nodes_len(&self) -> usize {
        self.adjacency_list.len()
    }
    pub fn is_empty(&self) -> bool {
        if self.nodes_len() == 0 {
            debug_assert!(self.edges_len() == 0);
            return true;
        }
        false
    }
    // grows the node range when an endpoint is out of it, returns the new link id
    pub fn push_edge<B:Borrow<(usize,usize)>>(&mut self,edge:B) -> usize {
        let (node1,node2) = *edge.borrow();
        let highest = node1.max(node2);
        if highest >= self.adjacency_list.len() {
            self.adjacency_list.resize(highest + 1, Vec::new());
        }
        let link = self.edges_len;
        self.adjacency_list[node1].push(Adjacent{link,to:node2});
        if node1 != node2 {
            self.adjacency_list[node2].push(Adjacent{link,to:node1});
        }
        self.edges_len += 1;
        link
    }
    pub fn neighbours(&self,node:usize) -> &[Adjacent] {
        self.adjacency_list.get(node).map(|v| v.as_slice()).unwrap_or(&[])
    }
    // randomizes every node's adjacency order, which changes how the search breaks ties
    pub fn shuffle<R:Rng + ?Sized>(&mut self,rng:&mut R) {
        for adjacent in self.adjacency_list.iter_mut() {
            adjacent.shuffle(rng);
        }
    }
    pub fn shrink_to_fit(&mut self) {
        self.adjacency_list.shrink_to_fit();
        for v in self.adjacency_list.iter_mut() {
            v.shrink_to_fit();
        }
    }

    // breadth first search from every node, O(V*(V + E))
    pub fn hop_distances(&self) -> DistanceTable {
        let nodes_len = self.nodes_len();
        let mut hops = vec![None;nodes_len*nodes_len];
        let mut queue = VecDeque::with_capacity(nodes_len);
        for start in 0..nodes_len {
            let row = &mut hops[start*nodes_len..(start + 1)*nodes_len];
            row[start] = Some(0);
            queue.clear();
            queue.push_back(start);
            let mut deep = 0;
            while !queue.is_empty() {
                deep += 1;
                for _ in 0..queue.len() {
                    let Some(node) = queue.pop_front() else {break};
                    for adjacent in self.adjacency_list[node].iter() {
                        if row[adjacent.to].is_none() {
                            row[adjacent.to] = Some(deep);
                            queue.push_back(adjacent.to);
                        }
                    }
                }
            }
        }
        DistanceTable {nodes_len,hops}
    }
}

impl<T:AsRef<[(usize,usize)]>> From<T> for UnDirectedGraph {
    fn from(value: T) -> Self {
        let mut new_graph = Self::new(0);
        for edge in value.as_ref() {
            new_graph.push_edge(edge);
        }
        new_graph.shrink_to_fit();
        new_graph
    }
}

impl<B:Borrow<(usize,usize)>> FromIterator<B> for UnDirectedGraph {
    fn from_iter<T: IntoIterator<Item = B>>(iter: T) -> Self {
        let mut new_graph = Self::new(0);
        for b in iter {
            new_graph.push_edge(b.borrow());
        }
        new_graph.shrink_to_fit();
        new_graph
    }
}

// all pairs hop counts, row major, None when unreachable
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct DistanceTable {
    nodes_len:usize,
    hops:Vec<Option<u32>>
}

impl DistanceTable {
    pub fn nodes_len(&self) -> usize {
        self.nodes_len
    }
    pub fn get(&self,from:usize,to:usize) -> Option<u32> {
        if from >= self.nodes_len || to >= self.nodes_len {
            return None;
        }
        self.hops[from*self.nodes_len + to]
    }
}

#[cfg(test)]
mod tests{
    use rand::Rng;

    use super::UnDirectedGraph;

    #[test]
    fn test_ring_distances() {
        let ring = [(0,1),(1,2),(2,3),(3,4),(4,5),(5,0)];
        let graph:UnDirectedGraph = ring.into();
        assert_eq!(graph.nodes_len(),6);
        assert_eq!(graph.edges_len(),6);
        let table = graph.hop_distances();
        assert_eq!(table.get(0,0),Some(0));
        assert_eq!(table.get(0,3),Some(3));
        assert_eq!(table.get(1,5),Some(2));
        assert_eq!(table.get(4,2),Some(2));
        assert_eq!(table.get(0,6),None);
    }
    #[test]
    fn test_parallel_links_and_isolated_nodes() {
        let mut graph = UnDirectedGraph::new(5);
        assert_eq!(graph.push_edge((0,1)),0);
        assert_eq!(graph.push_edge((1,0)),1);
        assert_eq!(graph.push_edge((2,3)),2);
        assert_eq!(graph.neighbours(0).len(),2);
        assert!(graph.neighbours(4).is_empty());
        assert!(graph.neighbours(17).is_empty());
        let table = graph.hop_distances();
        assert_eq!(table.get(0,1),Some(1));
        assert_eq!(table.get(0,2),None);
        assert_eq!(table.get(4,4),Some(0));
    }
    #[test]
    fn test_shuffle_keeps_adjacency() {
        let mut rng = rand::rng();
        let nodes_len = 40;
        let edges:Vec<(usize,usize)> = (0..300).map(|_| {
            (rng.random_range(0..nodes_len),rng.random_range(0..nodes_len))
        }).collect();
        let mut graph:UnDirectedGraph = edges.iter().collect();
        let before = graph.hop_distances();
        let sorted_before:Vec<_> = (0..graph.nodes_len()).map(|n| {
            let mut v:Vec<_> = graph.neighbours(n).iter().map(|a| (a.link,a.to)).collect();
            v.sort();
            v
        }).collect();
        graph.shuffle(&mut rng);
        for (n,expected) in sorted_before.iter().enumerate() {
            let mut v:Vec<_> = graph.neighbours(n).iter().map(|a| (a.link,a.to)).collect();
            v.sort();
            assert_eq!(&v,expected);
        }
        assert_eq!(graph.hop_distances(),before);
    }
}
