//! deferq - persistent deferred-action queue.
//!
//! Stock binary with no target kinds registered. It can enqueue, report and
//! clean up but refuses to `process`; entries are resolved by binaries that
//! register their own kinds.

use deferq::queue::TargetRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    deferq::run(TargetRegistry::new()).await
}
