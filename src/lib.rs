//! Monte Carlo charge-state histories.
//!
//! A particle crossing a medium changes charge by ±1 at random distances whose
//! means are given by an [`MfpTable`](core::MfpTable). The
//! [`ChargeHistoryGenerator`](core::ChargeHistoryGenerator) samples one history
//! per particle up to a target length and can resume earlier histories.
//!
//! ```no_run
//! use chargewalk::core::{ChargeHistoryGenerator, InitialCharge, MfpTable};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # fn main() -> chargewalk::error::Result<()> {
//! let table = MfpTable::from_labeled([("1->2", 1.0), ("2->1", 1.0)])?;
//! let generator = ChargeHistoryGenerator::new(table);
//! let mut rng = StdRng::seed_from_u64(1);
//! let histories = generator.generate(
//!     &InitialCharge::Uniform(1),
//!     10.0,
//!     100,
//!     &mut rng,
//!     None,
//!     false,
//! )?;
//! assert_eq!(histories.len(), 100);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;
