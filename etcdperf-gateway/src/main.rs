//! The key-value gateway binary.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    etcdperf_gateway::cli::execute()
}
