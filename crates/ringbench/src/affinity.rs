//! Core selection and pinning for the two worker threads.
//!
//! Uses `core_affinity` to list the cores available to the process and to
//! pin the calling thread.

use crate::config::Placement;
use crate::error::ResourceExhausted;
use core_affinity::CoreId;

/// Cores assigned to the producer and the consumer/forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorePair {
    /// Core for the producer loop.
    pub producer: usize,
    /// Core for the consumer/forwarder loop.
    pub forwarder: usize,
}

/// Lists the core ids this process may run on.
pub fn available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .map(|core| core.id)
        .collect()
}

/// Picks the cores for a run, or `None` when placement is left to the OS.
///
/// With automatic pinning the first core is left to the main thread when at
/// least three are available.
pub fn select_cores(
    placement: Placement,
    available: &[usize],
) -> Result<Option<CorePair>, ResourceExhausted> {
    match placement {
        Placement::Unpinned => Ok(None),
        Placement::Cores {
            producer,
            forwarder,
        } => {
            for core in [producer, forwarder] {
                if !available.contains(&core) {
                    return Err(ResourceExhausted::CoreUnavailable(core));
                }
            }
            Ok(Some(CorePair {
                producer,
                forwarder,
            }))
        }
        Placement::Pinned => {
            let usable = match available {
                [_main, rest @ ..] if rest.len() >= 2 => rest,
                all => all,
            };
            match usable {
                [forwarder, producer, ..] => Ok(Some(CorePair {
                    producer: *producer,
                    forwarder: *forwarder,
                })),
                _ => Err(ResourceExhausted::ExecutionUnits {
                    required: 2,
                    available: available.len(),
                }),
            }
        }
    }
}

/// Pins the calling thread to `core`. Returns false if the OS refused.
pub fn pin_current(core: usize) -> bool {
    core_affinity::set_for_current(CoreId { id: core })
}
