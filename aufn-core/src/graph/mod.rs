pub mod signal_graph;

pub use signal_graph::{Connection, Endpoint, NodeId, RebuildReport, SignalGraph, TapCallback};
