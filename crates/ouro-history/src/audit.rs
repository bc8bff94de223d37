//! Chain auditor
//!
//! The writer always computes hashes correctly, so an integrity violation
//! is only detectable by re-reading stored frames. This is a monitoring
//! signal, not an inline error path.

use crate::frame::Frame;
use ouro_core::{Error, Result};

/// Walk a frame sequence and verify the full chain: sequence numbers are
/// contiguous from 0, every content hash recomputes to its stored value,
/// and every parent hash matches the predecessor's content hash.
pub fn verify_chain(frames: &[Frame]) -> Result<()> {
    for (i, frame) in frames.iter().enumerate() {
        if frame.sequence_number != i as u64 {
            return Err(Error::integrity(
                frame.sequence_number,
                format!("expected sequence {}, found {}", i, frame.sequence_number),
            ));
        }

        if !frame.hash_matches() {
            return Err(Error::integrity(
                frame.sequence_number,
                "content hash does not recompute from frame fields",
            ));
        }

        match (i, &frame.parent_hash) {
            (0, Some(_)) => {
                return Err(Error::integrity(0, "genesis frame must not have a parent hash"));
            }
            (0, None) => {}
            (_, None) => {
                return Err(Error::integrity(
                    frame.sequence_number,
                    "non-genesis frame is missing its parent hash",
                ));
            }
            (_, Some(parent)) => {
                let expected = &frames[i - 1].content_hash;
                if parent != expected {
                    return Err(Error::integrity(
                        frame.sequence_number,
                        "parent hash does not match predecessor content hash",
                    ));
                }
            }
        }
    }
    Ok(())
}
