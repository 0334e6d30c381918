//! Zap / Warp Conversion Engine
//!
//! Converts one asset into a share of a two-asset pool in a single atomic
//! call (and back), optionally staking the shares in a vault. Routes are
//! always supplied by the caller; the engine validates them, executes them,
//! and enforces the caller's floor once at the end.

pub mod atomic;
pub mod calculator;
pub mod custody;
pub mod ordering;
pub mod quote;
pub mod route;
pub mod state;
pub mod warp;
pub mod zap_in;
pub mod zap_out;

// Re-exports
pub use atomic::{AtomicSection, GuardToken, ReentrancyGuard};
pub use calculator::{
    apply_slippage, calculate_minimum_lp, calculate_redeem_shares, ideal_lp,
    minimum_lp_for_pool, read_reserves, split_input,
};
pub use custody::Custody;
pub use ordering::{is_pool, resolve_pool, sort_tokens};
pub use quote::{quote_zap_in, quote_zap_out};
pub use route::{validate_route, RouteExecutor};
pub use state::{UnzapRequest, WarpRequest, ZapInQuote, ZapOutQuote, ZapRequest};
pub use warp::WarpWrapper;
pub use zap_in::ZapEngine;

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zap=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}
