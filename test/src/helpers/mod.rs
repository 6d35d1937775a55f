pub mod test_peer;

pub use exchange::{fixed_update_round, run_rounds, settle, SETTLE_ROUNDS};
pub use test_peer::TestPeer;
