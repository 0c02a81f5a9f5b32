//! Boolean secret sharing over F_2.
//!
//! One bit per share, kept in the low bit of a 32-bit cell; the high bits
//! stay zero. The structure mirrors [super::additive]: XOR replaces addition
//! and AND replaces multiplication.
use itertools::izip;
use rand::{CryptoRng, Rng};

use crate::party::error::{MpcError, MpcResult};
use crate::party::Party;

use super::{BeaverTriple, SharePair, SharePairVec, TripleVec};

#[derive(Default)]
pub struct BooleanSharing;

impl BooleanSharing {
    pub fn new() -> Self {
        Self
    }

    fn random_bit<R: Rng + CryptoRng>(&self, rng: &mut R) -> u32 {
        rng.next_u32() & 1
    }

    pub fn share<R: Rng + CryptoRng>(&self, rng: &mut R, x: u32) -> SharePair {
        debug_assert!(x <= 1);
        let x_0 = self.random_bit(rng);
        (x_0, x ^ x_0)
    }

    pub fn share_vec<R: Rng + CryptoRng>(&self, rng: &mut R, x_vec: &[u32]) -> SharePairVec {
        x_vec.iter().map(|x| self.share(rng, *x)).unzip()
    }

    pub fn reconst(&self, party: &mut Party, share: u32) -> MpcResult<u32> {
        let peer = party.send_recv(share)?;
        Ok(share ^ peer)
    }

    pub fn reconst_array<const N: usize>(
        &self,
        party: &mut Party,
        shares: &[u32; N],
    ) -> MpcResult<[u32; N]> {
        let peer = party.send_recv_array(shares)?;
        let mut output = [0u32; N];
        for (out, own, peer) in izip!(output.iter_mut(), shares.iter(), peer.iter()) {
            *out = *own ^ *peer;
        }
        Ok(output)
    }

    pub fn reconst_vec(&self, party: &mut Party, shares: &[u32]) -> MpcResult<Vec<u32>> {
        let mut peer = vec![0u32; shares.len()];
        party.send_recv_vec(shares, &mut peer)?;
        Ok(izip!(shares, &peer).map(|(own, peer)| *own ^ *peer).collect())
    }

    /// Dealer-side bulk generation of AND triples.
    pub fn generate_triples<R: Rng + CryptoRng>(&self, rng: &mut R, count: usize) -> TripleVec {
        (0..count)
            .map(|_| {
                let a = self.random_bit(rng);
                let b = self.random_bit(rng);
                BeaverTriple::new(a, b, a & b)
            })
            .collect()
    }

    /// Component-wise boolean split; the c-shares XOR back to a AND b.
    pub fn share_triples<R: Rng + CryptoRng>(
        &self,
        rng: &mut R,
        triples: &[BeaverTriple],
    ) -> (TripleVec, TripleVec) {
        triples
            .iter()
            .map(|t| {
                let (a_0, a_1) = self.share(rng, t.a);
                let (b_0, b_1) = self.share(rng, t.b);
                let (c_0, c_1) = self.share(rng, t.c);
                (
                    BeaverTriple::new(a_0, b_0, c_0),
                    BeaverTriple::new(a_1, b_1, c_1),
                )
            })
            .unzip()
    }

    /// The d&e correction enters the XOR exactly once, on party 0.
    fn combine(&self, party_id: usize, triple: &BeaverTriple, d: u32, e: u32) -> u32 {
        let mut z = (e & triple.a) ^ (d & triple.b) ^ triple.c;
        if party_id == 0 {
            z ^= d & e;
        }
        z
    }

    /// One secure AND, consuming `triple`. One exchange round.
    pub fn and(&self, party: &mut Party, triple: BeaverTriple, x: u32, y: u32) -> MpcResult<u32> {
        debug_assert!(x <= 1 && y <= 1);
        let masked = [x ^ triple.a, y ^ triple.b];
        let de = self.reconst_array(party, &masked)?;
        Ok(self.combine(party.id(), &triple, de[0], de[1]))
    }

    /// Element-wise vector AND in one exchange round.
    pub fn and_vec(
        &self,
        party: &mut Party,
        triples: TripleVec,
        x_vec: &[u32],
        y_vec: &[u32],
    ) -> MpcResult<Vec<u32>> {
        if x_vec.len() != y_vec.len() {
            return Err(MpcError::LengthMismatch {
                expected: x_vec.len(),
                actual: y_vec.len(),
            });
        }
        if triples.len() != x_vec.len() {
            return Err(MpcError::LengthMismatch {
                expected: x_vec.len(),
                actual: triples.len(),
            });
        }
        let mut masked = Vec::with_capacity(2 * x_vec.len());
        for (x, y, t) in izip!(x_vec, y_vec, &triples) {
            masked.push(*x ^ t.a);
            masked.push(*y ^ t.b);
        }
        let de = self.reconst_vec(party, &masked)?;
        Ok(izip!(de.chunks_exact(2), &triples)
            .map(|(de, t)| self.combine(party.id(), t, de[0], de[1]))
            .collect())
    }

    /// Secure OR via De Morgan: x OR y = NOT(NOT x AND NOT y). A shared bit
    /// is negated by flipping exactly one of its shares, so only party 0
    /// applies the flips; party 1 runs a plain AND.
    pub fn or(&self, party: &mut Party, triple: BeaverTriple, x: u32, y: u32) -> MpcResult<u32> {
        if party.id() == 0 {
            let z = self.and(party, triple, x ^ 1, y ^ 1)?;
            Ok(z ^ 1)
        } else {
            self.and(party, triple, x, y)
        }
    }

    /// Element-wise vector OR, composed the same way as [BooleanSharing::or].
    pub fn or_vec(
        &self,
        party: &mut Party,
        triples: TripleVec,
        x_vec: &[u32],
        y_vec: &[u32],
    ) -> MpcResult<Vec<u32>> {
        if party.id() == 0 {
            let nx_vec: Vec<u32> = x_vec.iter().map(|x| *x ^ 1).collect();
            let ny_vec: Vec<u32> = y_vec.iter().map(|y| *y ^ 1).collect();
            let z_vec = self.and_vec(party, triples, &nx_vec, &ny_vec)?;
            Ok(z_vec.into_iter().map(|z| z ^ 1).collect())
        } else {
            self.and_vec(party, triples, x_vec, y_vec)
        }
    }
}
