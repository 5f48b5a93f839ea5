//! # Ledger-Client Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Candidate generation and selection throughput
//! └── src/integration/  # Service flows with mock collaborators
//!     ├── flows.rs        # Policy retrieval through selection
//!     ├── concurrency.rs  # Single-flight and load balancing under contention
//!     └── properties.rs   # Property tests over random policies
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lc-tests
//! cargo bench -p lc-tests
//! ```

pub mod fixtures;
