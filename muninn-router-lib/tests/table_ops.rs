//! Property-style routing-table tests: longest-prefix match checked against
//! a linear reference scan, stored-entry invariants, pruning completeness,
//! and the drain-changed contract.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use muninn_router_lib::{Route, RoutingTable};

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap_or_else(|_| panic!("bad literal net: {s}"))
}

fn route(prefix: &str, if_index: usize, metric: u8) -> Route {
    Route { net: net(prefix), if_index, nexthop: None, metric }
}

/// A deliberately nested prefix set: default route, three levels under
/// 10/8, and a few unrelated blocks.
fn nested_routes() -> Vec<Route> {
    vec![
        route("0.0.0.0/0", 0, 15),
        route("10.0.0.0/8", 1, 4),
        route("10.0.0.0/16", 2, 3),
        route("10.0.5.0/24", 3, 2),
        route("10.0.5.128/25", 0, 1),
        route("10.0.5.64/26", 1, 1),
        route("172.16.0.0/12", 2, 5),
        route("192.168.0.0/16", 3, 6),
        route("192.168.4.0/24", 0, 2),
        route("203.0.113.96/27", 1, 7),
    ]
}

fn build(routes: &[Route]) -> RoutingTable {
    let mut table = RoutingTable::new();
    for r in routes {
        table.insert(*r);
    }
    table
}

/// The definition the trie must agree with: among stored prefixes covering
/// `addr`, the one with the greatest length.
fn reference_best_match(routes: &[Route], addr: Ipv4Addr) -> Option<Ipv4Net> {
    routes
        .iter()
        .filter(|r| r.net.contains(&addr))
        .max_by_key(|r| r.net.prefix_len())
        .map(|r| r.net)
}

#[test]
fn best_match_agrees_with_a_linear_scan() {
    let routes = nested_routes();
    let table = build(&routes);
    let probes = [
        [10, 0, 5, 200],
        [10, 0, 5, 130],
        [10, 0, 5, 70],
        [10, 0, 5, 1],
        [10, 0, 9, 9],
        [10, 9, 9, 9],
        [172, 20, 1, 1],
        [172, 15, 0, 1],
        [192, 168, 4, 77],
        [192, 168, 9, 9],
        [203, 0, 113, 100],
        [203, 0, 113, 200],
        [8, 8, 8, 8],
        [0, 0, 0, 1],
        [255, 255, 255, 255],
    ];
    for probe in probes {
        let addr = Ipv4Addr::from(probe);
        let got = table.best_match(addr).map(|r| r.net);
        assert_eq!(got, reference_best_match(&routes, addr), "probe {addr}");
    }
}

#[test]
fn removing_a_specific_falls_back_to_the_covering_prefix() {
    let routes = nested_routes();
    let mut table = build(&routes);
    let probe = Ipv4Addr::new(10, 0, 5, 200);
    assert_eq!(table.best_match(probe).map(|r| r.net), Some(net("10.0.5.128/25")));

    assert!(table.remove(net("10.0.5.128/25")));
    assert_eq!(table.best_match(probe).map(|r| r.net), Some(net("10.0.5.0/24")));
    assert!(table.remove(net("10.0.5.0/24")));
    assert_eq!(table.best_match(probe).map(|r| r.net), Some(net("10.0.0.0/16")));
}

#[test]
fn stored_entries_keep_their_invariants() {
    // Host bits in the inserted prefix must not survive.
    let mut routes = nested_routes();
    let unaligned = Ipv4Net::new(Ipv4Addr::new(10, 0, 5, 77), 24)
        .unwrap_or_else(|_| net("10.0.5.0/24"));
    routes.push(Route { net: unaligned, if_index: 2, nexthop: None, metric: 16 });
    let table = build(&routes);

    for stored in table.routes() {
        assert_eq!(stored.net.addr(), stored.net.network(), "host bits in {}", stored.net);
        assert!(stored.net.prefix_len() <= 32);
        assert!((1..=16).contains(&stored.metric), "metric {} in {}", stored.metric, stored.net);
    }
}

#[test]
fn insert_then_remove_leaves_no_empty_nodes_reachable() {
    let routes = nested_routes();
    let mut table = build(&routes);
    assert_eq!(table.len(), routes.len());

    // Tear down in a different order than insertion.
    for r in routes.iter().rev() {
        assert!(table.remove(r.net), "missing {}", r.net);
    }
    assert!(table.is_empty());
    assert_eq!(table.reachable_nodes(), 1); // only the root survives
}

#[test]
fn partial_removal_keeps_the_rest_resolvable() {
    let routes = nested_routes();
    let mut table = build(&routes);
    let before = table.reachable_nodes();

    assert!(table.remove(net("10.0.5.64/26")));
    assert!(table.remove(net("203.0.113.96/27")));
    assert!(table.reachable_nodes() < before);

    let remaining: Vec<Route> =
        routes.iter().filter(|r| r.net != net("10.0.5.64/26") && r.net != net("203.0.113.96/27"))
            .copied()
            .collect();
    for r in &remaining {
        assert_eq!(table.exact_match(r.net).map(|s| s.net), Some(r.net));
    }
    let probe = Ipv4Addr::new(10, 0, 5, 70);
    assert_eq!(table.best_match(probe).map(|r| r.net), reference_best_match(&remaining, probe));
}

#[test]
fn drain_changed_empties_the_change_set() {
    let routes = nested_routes();
    let mut table = build(&routes);

    assert_eq!(table.drain_changed().len(), routes.len());
    // No mutations in between: the second drain has nothing to say.
    assert!(table.drain_changed().is_empty());

    // Re-inserting identical routes raises no flags either.
    for r in &routes {
        assert!(!table.insert(*r));
    }
    assert!(table.drain_changed().is_empty());

    // A single metric change is exactly what the next drain yields.
    table.insert(route("10.0.5.0/24", 3, 9));
    let drained = table.drain_changed();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].net, net("10.0.5.0/24"));
    assert_eq!(drained[0].metric, 9);
    assert!(table.drain_changed().is_empty());
}
