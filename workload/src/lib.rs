//! MapReduce applications a worker can run, looked up by name.

use common::Workload;

pub mod wc;

/// Look up a workload by the name given on the command line.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        _ => None,
    }
}
