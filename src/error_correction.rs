//! Reconciliation stage.
//!
//! Only the pass-through reconciler exists: the corrected key is Alice's
//! sifted key. An interactive parity protocol can replace it as long as it
//! returns a key of the same length.

use crate::key_material::BitString;
use crate::sifting::SiftResult;

pub trait Reconciler {
    fn reconcile(&self, sift: &SiftResult) -> BitString;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Reconciler for PassThrough {
    fn reconcile(&self, sift: &SiftResult) -> BitString {
        sift.sifted_key()
    }

    fn name(&self) -> &'static str {
        "pass-through"
    }
}

pub fn reconcile(sift: &SiftResult) -> BitString {
    PassThrough.reconcile(sift)
}

/// Sifted positions where Bob still disagrees with the corrected key.
pub fn residual_mismatches(sift: &SiftResult, corrected: &BitString) -> usize {
    sift.sifted
        .iter()
        .zip(corrected.iter())
        .filter(|&(record, &bit)| record.bob_bit != bit)
        .count()
}

/// Number of blocks whose parities differ between the two keys, i.e. what the
/// first pass of a parity-based protocol would flag.
pub fn parity_mismatched_blocks(alice_bits: &[bool], bob_bits: &[bool]) -> usize {
    let len = alice_bits.len().min(bob_bits.len());
    if len == 0 {
        return 0;
    }
    let block_size = determine_optimal_block_size(len);
    alice_bits[..len]
        .chunks(block_size)
        .zip(bob_bits[..len].chunks(block_size))
        .filter(|(a, b)| calculate_parity(a) != calculate_parity(b))
        .count()
}

fn determine_optimal_block_size(length: usize) -> usize {
    std::cmp::max(4, length / 8)
}

fn calculate_parity(bits: &[bool]) -> bool {
    bits.iter().filter(|&&bit| bit).count() % 2 == 1
}
