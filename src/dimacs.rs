use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fs;

use nom::{IResult, error::Error};
use nom::bytes::complete::{take, tag, take_until};
use nom::branch::alt;

use crate::color::{Edge, GraphSnapshot, Node, NodeId};
use crate::error::ColoringError;


/** reads a DIMACS instance, returns (n, m, edges).
Edges use the DIMACS (1-based) vertex numbers, duplicates and reversed
duplicates are kept once. */
pub fn read_from_str(content:&str) -> Result<(usize, usize, Vec<(usize,usize)>), ColoringError> {
    let s1 = content.replace('\r', "");
    let s2 = skip_comments(s1.as_str())
        .map_err(|e| ColoringError::Parse(e.to_string()))?.0;
    let (mut s3,(n,m)) = read_header(s2)
        .map_err(|e| ColoringError::Parse(format!("invalid DIMACS header: {}", e)))?;
    let mut edges = BTreeSet::new();
    let mut check_nb_edges = 0;
    while let Ok((tmp,(a,b))) = read_edge(s3) {
        s3 = tmp;
        if a == 0 || b == 0 || a > n || b > n {
            return Err(ColoringError::Parse(format!("edge ({},{}) outside of 1..={}", a, b, n)));
        }
        edges.insert((a.min(b), a.max(b)));
        check_nb_edges += 1;
    }
    if check_nb_edges != m && 2*check_nb_edges != m {
        return Err(ColoringError::Parse(
            format!("header announces {} edges, read {}", m, check_nb_edges)
        ));
    }
    Ok((n, m, edges.into_iter().collect()))
}

/// reads an instance file, returns (n, m, edges)
pub fn read_from_file(filename:&str) -> Result<(usize, usize, Vec<(usize,usize)>), ColoringError> {
    read_from_str(&fs::read_to_string(filename)?)
}

/** builds a graph snapshot from a DIMACS instance. Node ids are the DIMACS
vertex numbers, nodes are uncolored and spread over a circle inside [0,1]. */
pub fn snapshot_from_str(content:&str) -> Result<GraphSnapshot, ColoringError> {
    let (n,_,edges) = read_from_str(content)?;
    let nodes = (1..=n).map(|i| {
        let angle = 2. * PI * (i-1) as f64 / n as f64;
        Node { id: i as NodeId, x: 0.5 + 0.4 * angle.cos(), y: 0.5 + 0.4 * angle.sin(), color: None }
    }).collect();
    let edges = edges.into_iter()
        .map(|(a,b)| Edge { source: a as NodeId, target: b as NodeId })
        .collect();
    Ok(GraphSnapshot { nodes, edges })
}

/// reads a graph snapshot from a DIMACS file
pub fn snapshot_from_file(filename:&str) -> Result<GraphSnapshot, ColoringError> {
    snapshot_from_str(&fs::read_to_string(filename)?)
}

/// skips a single comment
fn skip_comment(s:&str) -> IResult<&str, &str> {
    let (remaining,_) = tag("c")(s)?;
    let (remaining,_) = take_until("\n")(remaining)?;
    take(1usize)(remaining)
}

/// skips all comments
pub fn skip_comments(s:&str) -> IResult<&str, Vec<&str>> {
    nom::multi::many0(skip_comment)(s)
}

/// parses a run of digits
fn integer(s:&str) -> IResult<&str, usize> {
    let (remaining, digits) = nom::character::complete::digit1(s)?;
    match digits.parse::<usize>() {
        Ok(v) => Ok((remaining, v)),
        Err(_) => Err(nom::Err::Error(Error::new(s, nom::error::ErrorKind::Digit))),
    }
}

/// reads two numbers separated by a space (and the following newline, if any)
fn read_two_integers(s:&str) -> IResult<&str, (usize,usize)> {
    let (remaining, n1) = integer(s)?;
    let (remaining, _) = take(1usize)(remaining)?;
    let (remaining, n2) = integer(remaining)?;
    match remaining.as_bytes().first() {
        Some(c) if nom::character::is_newline(*c) => {
            let (remaining, _) = take::<usize, &str, Error<&str>>(1)(remaining)?;
            Ok((remaining, (n1,n2)))
        }
        _ => Ok((remaining, (n1,n2))),
    }
}

/// reads header containing (n,m)
pub fn read_header(s:&str) -> IResult<&str, (usize,usize)> {
    let (remaining,_) = alt((tag("p edge "), tag("p col ")))(s)?;
    read_two_integers(remaining)
}

/// reads edge line (WARNING: indices start at 1 in the DIMACS format)
pub fn read_edge(s:&str) -> IResult<&str, (usize,usize)> {
    let (remaining,_) = tag("e ")(s)?;
    read_two_integers(remaining)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Graph;

    const GRID2X2: &str = "c grid 2x2\nc second comment\np edge 4 4\ne 1 2\ne 2 4\ne 4 3\ne 3 1\n";

    #[test]
    fn test_read_instance() {
        let (n,m,edges) = read_from_str(GRID2X2).unwrap();
        assert_eq!(n, 4);
        assert_eq!(m, 4);
        assert_eq!(edges, vec![(1,2),(1,3),(2,4),(3,4)]);
    }

    #[test]
    fn test_read_comment1() {
        let s = "c this is a test comment\np edge 2 1\ne 1 2";
        assert_eq!(
            skip_comments(s),
            Ok((
                "p edge 2 1\ne 1 2",
                vec!["\n"]
            ))
        );
    }

    #[test]
    fn test_read_header() {
        let s = "p edge 2 1\ne 1 2";
        assert_eq!(read_header(s).unwrap().0, "e 1 2");
        assert_eq!(read_header(s).unwrap().1, (2,1));
    }

    #[test]
    fn test_read_header_col() {
        let s = "p col 2 1\ne 1 2";
        assert_eq!(read_header(s).unwrap().0, "e 1 2");
        assert_eq!(read_header(s).unwrap().1, (2,1));
    }

    #[test]
    fn test_read_edge() {
        let s = "e 1 2\n";
        assert_eq!(read_edge(s).unwrap().1, (1,2));
        assert_eq!(read_edge(s).unwrap().0, "");
    }

    #[test]
    fn test_edges_listed_twice() {
        let s = "p edge 3 4\ne 1 2\ne 2 1\ne 2 3\ne 3 2\n";
        let (_,_,edges) = read_from_str(s).unwrap();
        assert_eq!(edges, vec![(1,2),(2,3)]);
    }

    #[test]
    fn test_invalid_instances() {
        assert!(matches!(read_from_str("e 1 2\n"), Err(ColoringError::Parse(_))));
        assert!(matches!(read_from_str("p edge 2 3\ne 1 2\n"), Err(ColoringError::Parse(_))));
        assert!(matches!(read_from_str("p edge 2 1\ne 1 5\n"), Err(ColoringError::Parse(_))));
    }

    #[test]
    fn test_snapshot_builds_a_graph() {
        let snapshot = snapshot_from_str(GRID2X2).unwrap();
        assert!(snapshot.nodes.iter().all(|n| (0. ..=1.).contains(&n.x) && (0. ..=1.).contains(&n.y)));
        let graph = Graph::from_snapshot(snapshot).unwrap();
        assert_eq!(graph.nb_vertices(), 4);
        assert_eq!(graph.nb_edges(), 4);
        assert!(graph.isolated_nodes().is_empty());
    }
}
