// text format of the restoration service, every id and slot is 1-based on the wire
// and 0-based everywhere else

use std::io::{BufRead, Write};
use std::str::FromStr;

use thiserror::Error;

use crate::optical_network::dispatcher::RestorationReport;
use crate::optical_network::error::NetworkError;
use crate::optical_network::topology::Network;
use crate::optical_network::{LinkId, PathSegment};

#[derive(Error,Debug)]
pub enum ParseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("Input ended while reading a {expected}")]
    UnexpectedEof{expected:&'static str},
    #[error("Line {line}: {token:?} is not a valid {expected}")]
    InvalidToken{line:usize,token:String,expected:&'static str},
    #[error("Line {line}: {expected} {value} is outside 1..={max}")]
    OutOfRange{line:usize,value:usize,max:usize,expected:&'static str},
    #[error("Line {line}: slot block {start}..={end} is empty")]
    EmptyBlock{line:usize,start:usize,end:usize}
}

type Result<T> = std::result::Result<T,ParseError>;

// whitespace separated tokens, a line is only read once the previous one is used up
// so a failure can be answered before the next one arrives
pub struct TokenReader<R:BufRead> {
    reader:R,
    line:String,
    pos:usize,
    line_no:usize
}

impl<R:BufRead> TokenReader<R> {
    pub fn new(reader:R) -> Self {
        Self {reader,line:String::new(),pos:0,line_no:0}
    }
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn next_span(&mut self) -> Result<Option<(usize,usize)>> {
        loop {
            if let Some((start,end)) = span(&self.line, self.pos) {
                self.pos = end;
                return Ok(Some((start,end)));
            }
            self.line.clear();
            self.pos = 0;
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
        }
    }

    pub fn next<T:FromStr>(&mut self,expected:&'static str) -> Result<T> {
        let (start,end) = self.next_span()?.ok_or(ParseError::UnexpectedEof {expected})?;
        let token = &self.line[start..end];
        token.parse().map_err(|_| ParseError::InvalidToken {line:self.line_no,token:token.to_string(),expected})
    }

    // a 1-based id in 1..=len, returned 0-based
    pub fn next_index(&mut self,expected:&'static str,len:usize) -> Result<usize> {
        let value:usize = self.next(expected)?;
        if value == 0 || value > len {
            return Err(ParseError::OutOfRange {line:self.line_no,value,max:len,expected});
        }
        Ok(value - 1)
    }
}

// byte range of the first token at or after pos
fn span(line:&str,pos:usize) -> Option<(usize,usize)> {
    let rest = &line[pos..];
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let start = pos + rest.len() - trimmed.len();
    let len = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    Some((start,start + len))
}

// topology, conversion budgets and the demands with their pre-failure paths
pub fn read_network<R:BufRead>(tokens:&mut TokenReader<R>,slot_count:usize) -> Result<Network> {
    let nodes_len:usize = tokens.next("node count")?;
    let links_len:usize = tokens.next("link count")?;
    let mut budgets:Vec<usize> = Vec::with_capacity(nodes_len);
    for _ in 0..nodes_len {
        budgets.push(tokens.next("conversion budget")?);
    }
    let mut ends = Vec::with_capacity(links_len);
    for _ in 0..links_len {
        let u = tokens.next_index("node", nodes_len)?;
        let v = tokens.next_index("node", nodes_len)?;
        ends.push((u,v));
    }
    let mut network = Network::new(slot_count, &budgets, &ends)?;

    let demands_len:usize = tokens.next("demand count")?;
    for _ in 0..demands_len {
        let source = tokens.next_index("node", nodes_len)?;
        let sink = tokens.next_index("node", nodes_len)?;
        let segments:usize = tokens.next("segment count")?;
        let start = tokens.next_index("slot", slot_count)?;
        let end = tokens.next_index("slot", slot_count)?;
        let value:u64 = tokens.next("value")?;
        if end < start {
            return Err(ParseError::EmptyBlock {line:tokens.line_no(),start:start + 1,end:end + 1});
        }
        let width = end - start + 1;
        let mut path = Vec::with_capacity(segments);
        for _ in 0..segments {
            path.push(PathSegment::new(tokens.next_index("link", links_len)?, start, width));
        }
        network.add_demand(source, sink, width, value, path)?;
    }
    Ok(network)
}

pub fn read_scenario_count<R:BufRead>(tokens:&mut TokenReader<R>) -> Result<usize> {
    tokens.next("scenario count")
}

// next failed link of the scenario, None at the -1 terminator
pub fn read_failure<R:BufRead>(tokens:&mut TokenReader<R>,links_len:usize) -> Result<Option<LinkId>> {
    let value:i64 = tokens.next("link")?;
    if value == -1 {
        return Ok(None);
    }
    if value < 1 || value as u64 > links_len as u64 {
        return Err(ParseError::OutOfRange {
            line:tokens.line_no(),
            value:value.max(0) as usize,
            max:links_len,
            expected:"link"
        });
    }
    Ok(Some(value as usize - 1))
}

// changed demands with their new paths, abandoned demands are not listed
pub fn write_report<W:Write>(writer:&mut W,report:&RestorationReport) -> std::io::Result<()> {
    writeln!(writer,"{}",report.changes.len())?;
    for change in report.changes.iter() {
        writeln!(writer,"{} {}",change.demand + 1,change.path.len())?;
        let segments:Vec<String> = change.path.iter()
            .map(|s| format!("{} {} {}",s.link + 1,s.start + 1,s.end + 1))
            .collect();
        writeln!(writer,"{}",segments.join(" "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{read_failure, read_network, read_scenario_count, write_report, ParseError, TokenReader};
    use crate::optical_network::dispatcher::{Reassignment, RestorationReport};
    use crate::optical_network::error::NetworkError;
    use crate::optical_network::PathSegment;

    const TRIANGLE:&str = "3 3\n1 1 1\n1 2\n2 3\n3 1\n2\n1 2 1 1 2 10\n1\n2 3 2 5 5 3\n1 3\n2\n1 -1\n3\n2 -1\n";

    #[test]
    fn test_tokens_across_lines() {
        let mut tokens = TokenReader::new(Cursor::new("  7 x\n\n\t-1  \n"));
        assert_eq!(tokens.next::<usize>("count").unwrap(),7);
        assert!(matches!(tokens.next::<usize>("count"),Err(ParseError::InvalidToken {line:1,..})));
        assert_eq!(tokens.next::<i64>("link").unwrap(),-1);
        assert_eq!(tokens.line_no(),3);
        assert!(matches!(tokens.next::<usize>("count"),Err(ParseError::UnexpectedEof {expected:"count"})));
    }
    #[test]
    fn test_read_network() {
        let mut tokens = TokenReader::new(Cursor::new(TRIANGLE));
        let network = read_network(&mut tokens, 8).unwrap();
        assert_eq!(network.nodes().len(),3);
        assert_eq!(network.links()[2].ends,(2,0));
        let first = network.demand(0).unwrap();
        assert_eq!((first.source,first.sink,first.width,first.value),(0,1,2,10));
        assert_eq!(first.path(),&[PathSegment::new(0, 0, 2)]);
        let second = network.demand(1).unwrap();
        assert_eq!(second.path(),&[PathSegment::new(0, 4, 1),PathSegment::new(2, 4, 1)]);
        assert_eq!(network.link(2).unwrap().spectrum().holder(4),Some(1));
        network.check_integrity().unwrap();

        assert_eq!(read_scenario_count(&mut tokens).unwrap(),2);
        let links = network.links().len();
        assert_eq!(read_failure(&mut tokens, links).unwrap(),Some(0));
        assert_eq!(read_failure(&mut tokens, links).unwrap(),None);
        assert_eq!(read_failure(&mut tokens, links).unwrap(),Some(2));
        assert_eq!(read_failure(&mut tokens, links).unwrap(),Some(1));
        assert_eq!(read_failure(&mut tokens, links).unwrap(),None);
        assert!(matches!(read_failure(&mut tokens, links),Err(ParseError::UnexpectedEof {..})));
    }
    #[test]
    fn test_rejects_bad_input() {
        let mut tokens = TokenReader::new(Cursor::new("2 1\n0 0\n1 3\n"));
        assert!(matches!(read_network(&mut tokens, 8),Err(ParseError::OutOfRange {value:3,max:2,..})));
        // both demands want slot 1 of link 1
        let mut tokens = TokenReader::new(Cursor::new("2 1\n0 0\n1 2\n2\n1 2 1 1 1 5\n1\n2 1 1 1 2 5\n1\n"));
        assert!(matches!(
            read_network(&mut tokens, 8),
            Err(ParseError::Network(NetworkError::SlotConflict {link:0,slot:0,holder:0,demand:1}))
        ));
        let mut tokens = TokenReader::new(Cursor::new("2 1\n0 0\n1 2\n1\n1 2 1 3 2 5\n1\n"));
        assert!(matches!(read_network(&mut tokens, 8),Err(ParseError::EmptyBlock {start:3,end:2,..})));
        let mut tokens = TokenReader::new(Cursor::new("0 4"));
        assert!(matches!(read_failure(&mut tokens, 3),Err(ParseError::OutOfRange {value:0,..})));
        assert!(matches!(read_failure(&mut tokens, 3),Err(ParseError::OutOfRange {value:4,..})));
    }
    #[test]
    fn test_write_report() {
        let report = RestorationReport {
            failed_link:0,
            changes:vec![
                Reassignment {demand:0,path:vec![PathSegment::new(2, 0, 2),PathSegment::new(1, 3, 2)]},
                Reassignment {demand:4,path:vec![PathSegment::new(5, 7, 1)]}
            ],
            abandoned:vec![2],
            rounds:1,
            best_round:0
        };
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(),"2\n1 2\n3 1 2 2 4 5\n5 1\n6 8 8\n");
        let mut out = Vec::new();
        write_report(&mut out, &RestorationReport::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(),"0\n");
    }
}
