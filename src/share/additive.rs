//! Additive secret sharing over the ring Z/2^k.
use itertools::izip;
use rand::{CryptoRng, Rng};

use crate::party::error::{MpcError, MpcResult};
use crate::party::Party;

use super::{BeaverTriple, SharePair, SharePairVec, TripleVec};

/// Engine for additive shares in Z/2^k with 2 <= k <= 32.
///
/// All values are canonicalized to the low k bits. Splitting and triple
/// generation are dealer-side (local); reconstruction and multiplication are
/// interactive and cost one exchange round each.
pub struct AdditiveSharing {
    bitsize: u32,
    mask: u32,
}

impl AdditiveSharing {
    pub fn new(bitsize: u32) -> MpcResult<Self> {
        if !(2..=32).contains(&bitsize) {
            return Err(MpcError::InvalidParameter(format!(
                "bit size must be in [2, 32], got {}",
                bitsize
            )));
        }
        let mask = ((1u64 << bitsize) - 1) as u32;
        Ok(Self { bitsize, mask })
    }

    pub fn bitsize(&self) -> u32 {
        self.bitsize
    }

    #[inline]
    fn add(&self, x: u32, y: u32) -> u32 {
        x.wrapping_add(y) & self.mask
    }

    #[inline]
    fn sub(&self, x: u32, y: u32) -> u32 {
        x.wrapping_sub(y) & self.mask
    }

    #[inline]
    fn mul_mod(&self, x: u32, y: u32) -> u32 {
        x.wrapping_mul(y) & self.mask
    }

    fn random_element<R: Rng + CryptoRng>(&self, rng: &mut R) -> u32 {
        (rng.next_u64() as u32) & self.mask
    }

    /// Splits `x` into two shares. The first share is uniform in [0, 2^k),
    /// which hides `x` from either party alone.
    pub fn share<R: Rng + CryptoRng>(&self, rng: &mut R, x: u32) -> SharePair {
        let x_0 = self.random_element(rng);
        let x_1 = self.sub(x, x_0);
        (x_0, x_1)
    }

    pub fn share_vec<R: Rng + CryptoRng>(&self, rng: &mut R, x_vec: &[u32]) -> SharePairVec {
        x_vec.iter().map(|x| self.share(rng, *x)).unzip()
    }

    /// Recombines a shared value; both parties learn the same result.
    pub fn reconst(&self, party: &mut Party, share: u32) -> MpcResult<u32> {
        let peer = party.send_recv(share)?;
        Ok(self.add(share, peer))
    }

    pub fn reconst_array<const N: usize>(
        &self,
        party: &mut Party,
        shares: &[u32; N],
    ) -> MpcResult<[u32; N]> {
        let peer = party.send_recv_array(shares)?;
        let mut output = [0u32; N];
        for (out, own, peer) in izip!(output.iter_mut(), shares.iter(), peer.iter()) {
            *out = self.add(*own, *peer);
        }
        Ok(output)
    }

    /// Vector reconstruction in a single exchange round.
    pub fn reconst_vec(&self, party: &mut Party, shares: &[u32]) -> MpcResult<Vec<u32>> {
        let mut peer = vec![0u32; shares.len()];
        party.send_recv_vec(shares, &mut peer)?;
        Ok(izip!(shares, &peer).map(|(own, peer)| self.add(*own, *peer)).collect())
    }

    /// Dealer-side bulk generation of multiplication triples.
    pub fn generate_triples<R: Rng + CryptoRng>(&self, rng: &mut R, count: usize) -> TripleVec {
        (0..count)
            .map(|_| {
                let a = self.random_element(rng);
                let b = self.random_element(rng);
                BeaverTriple::new(a, b, self.mul_mod(a, b))
            })
            .collect()
    }

    /// Component-wise additive split of dealer triples. Every component,
    /// including c, is split so that the two shares sum back to the clear
    /// triple.
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

    /// Combine rule of Beaver's protocol. The d*e bridge term must enter the
    /// sum exactly once, so only party 0 adds it.
    fn combine(&self, party_id: usize, triple: &BeaverTriple, d: u32, e: u32) -> u32 {
        let mut z = self.add(
            self.add(self.mul_mod(e, triple.a), self.mul_mod(d, triple.b)),
            triple.c,
        );
        if party_id == 0 {
            z = self.add(z, self.mul_mod(d, e));
        }
        z
    }

    /// One secure multiplication, consuming `triple`. One exchange round.
    pub fn mul(
        &self,
        party: &mut Party,
        triple: BeaverTriple,
        x: u32,
        y: u32,
    ) -> MpcResult<u32> {
        let masked = [self.sub(x, triple.a), self.sub(y, triple.b)];
        let de = self.reconst_array(party, &masked)?;
        Ok(self.combine(party.id(), &triple, de[0], de[1]))
    }

    /// Two independent multiplications sharing a single exchange round.
    pub fn mul2(
        &self,
        party: &mut Party,
        triple1: BeaverTriple,
        triple2: BeaverTriple,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
    ) -> MpcResult<[u32; 2]> {
        let masked = [
            self.sub(x1, triple1.a),
            self.sub(y1, triple1.b),
            self.sub(x2, triple2.a),
            self.sub(y2, triple2.b),
        ];
        let de = self.reconst_array(party, &masked)?;
        Ok([
            self.combine(party.id(), &triple1, de[0], de[1]),
            self.combine(party.id(), &triple2, de[2], de[3]),
        ])
    }

    /// Element-wise vector multiplication: n products, one exchange round of
    /// 2n masked differences, n triples consumed.
    pub fn mul_vec(
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
            masked.push(self.sub(*x, t.a));
            masked.push(self.sub(*y, t.b));
        }
        let de = self.reconst_vec(party, &masked)?;
        Ok(izip!(de.chunks_exact(2), &triples)
            .map(|(de, t)| self.combine(party.id(), t, de[0], de[1]))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use crate::network::CommInfo;
    use crate::party::error::MpcError;
    use crate::party::test::simple_localhost_setup;
    use crate::party::Party;
    use crate::rng::SecureRng;
    use crate::share::BeaverTriple;

    use super::AdditiveSharing;

    #[test]
    fn bitsize_bounds() {
        assert!(AdditiveSharing::new(1).is_err());
        assert!(AdditiveSharing::new(33).is_err());
        for k in [2, 8, 16, 31, 32] {
            assert_eq!(AdditiveSharing::new(k).unwrap().bitsize(), k);
        }
    }

    #[test]
    fn share_reconstructs_locally() {
        let mut rng = SecureRng::seed_from_u64(11);
        for k in [2u32, 8, 16, 24, 32] {
            let engine = AdditiveSharing::new(k).unwrap();
            let mask = ((1u64 << k) - 1) as u32;
            for _ in 0..200 {
                let v = (rng.rand64() as u32) & mask;
                let (s_0, s_1) = engine.share(&mut rng, v);
                assert!(s_0 <= mask && s_1 <= mask);
                assert_eq!(s_0.wrapping_add(s_1) & mask, v);
            }
        }
    }

    #[test]
    fn fixed_shares_reconstruct() {
        // v = 0xDEADBEEF split as (0x11111111, 0xCD9CADDE)
        let ((v0, v1), _) = simple_localhost_setup(|p| {
            let engine = AdditiveSharing::new(32).unwrap();
            let own = if p.id() == 0 { 0x11111111 } else { 0xCD9CADDE };
            engine.reconst(p, own).unwrap()
        });
        assert_eq!(v0, 0xDEADBEEF);
        assert_eq!(v1, 0xDEADBEEF);
    }

    #[test]
    fn beaver_mult_with_fixed_triple() {
        // u = 7, v = 6, triple (3, 5, 15); shares from the worked example
        let ((z0, z1), _) = simple_localhost_setup(|p| {
            let engine = AdditiveSharing::new(32).unwrap();
            let (u, v, t) = if p.id() == 0 {
                (2, 1, BeaverTriple::new(1, 2, 10))
            } else {
                (5, 5, BeaverTriple::new(2, 3, 5))
            };
            engine.mul(p, t, u, v).unwrap()
        });
        assert_eq!(z0.wrapping_add(z1), 42);
    }

    #[test]
    fn mult_wraps_in_small_rings() {
        // 200 * 200 = 40000 = 64 mod 256
        let ((z0, z1), _) = simple_localhost_setup(|p| {
            let engine = AdditiveSharing::new(8).unwrap();
            let mut dealer = SecureRng::seed_from_u64(1234);
            let (u_0, u_1) = engine.share(&mut dealer, 200);
            let (v_0, v_1) = engine.share(&mut dealer, 200);
            let triples = engine.generate_triples(&mut dealer, 1);
            let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
            let (u, v, t) = if p.id() == 0 {
                (u_0, v_0, t_0.remove(0))
            } else {
                (u_1, v_1, t_1.remove(0))
            };
            let z = engine.mul(p, t, u, v).unwrap();
            engine.reconst(p, z).unwrap()
        });
        assert_eq!(z0, 64);
        assert_eq!(z1, 64);
    }

    #[test]
    fn mul2_shares_one_round() {
        let ((r0, r1), _) = simple_localhost_setup(|p| {
            let engine = AdditiveSharing::new(32).unwrap();
            let mut dealer = SecureRng::seed_from_u64(77);
            let (x1_0, x1_1) = engine.share(&mut dealer, 9);
            let (y1_0, y1_1) = engine.share(&mut dealer, 8);
            let (x2_0, x2_1) = engine.share(&mut dealer, 1_000_000);
            let (y2_0, y2_1) = engine.share(&mut dealer, 4_000);
            let triples = engine.generate_triples(&mut dealer, 2);
            let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
            let rounds_before = p.comm_stats().rounds;
            let z = if p.id() == 0 {
                engine
                    .mul2(p, t_0.remove(0), t_0.remove(0), x1_0, y1_0, x2_0, y2_0)
                    .unwrap()
            } else {
                engine
                    .mul2(p, t_1.remove(0), t_1.remove(0), x1_1, y1_1, x2_1, y2_1)
                    .unwrap()
            };
            // one send + one receive
            assert_eq!(p.comm_stats().rounds - rounds_before, 2);
            engine.reconst_array(p, &z).unwrap()
        });
        assert_eq!(r0, [72, 4_000_000_000]);
        assert_eq!(r1, [72, 4_000_000_000]);
    }

    #[test]
    fn vector_mult_matches_clear_products() {
        let x_clear = [1u32, 2, 3, 4];
        let y_clear = [10u32, 20, 30, 40];
        let ((z0, z1), _) = simple_localhost_setup(move |p| {
            let engine = AdditiveSharing::new(32).unwrap();
            let mut dealer = SecureRng::seed_from_u64(4242);
            let (x_0, x_1) = engine.share_vec(&mut dealer, &x_clear);
            let (y_0, y_1) = engine.share_vec(&mut dealer, &y_clear);
            let triples = engine.generate_triples(&mut dealer, x_clear.len());
            let (t_0, t_1) = engine.share_triples(&mut dealer, &triples);
            let (x, y, t) = if p.id() == 0 { (x_0, y_0, t_0) } else { (x_1, y_1, t_1) };
            let z = engine.mul_vec(p, t, &x, &y).unwrap();
            engine.reconst_vec(p, &z).unwrap()
        });
        assert_eq!(z0, vec![10, 40, 90, 160]);
        assert_eq!(z1, vec![10, 40, 90, 160]);
    }

    #[test]
    fn vector_mult_equals_scalar_mult() {
        // same inputs, same triples: element-wise scalar runs must agree with
        // the batched run
        let x_clear: Vec<u32> = (0..8).map(|i| i * 3 + 1).collect();
        let y_clear: Vec<u32> = (0..8).map(|i| i * 7 + 2).collect();
        let run = move |batched: bool| {
            let x_clear = x_clear.clone();
            let y_clear = y_clear.clone();
            let ((z0, z1), _) = simple_localhost_setup(move |p| {
                let engine = AdditiveSharing::new(16).unwrap();
                let mut dealer = SecureRng::seed_from_u64(555);
                let (x_0, x_1) = engine.share_vec(&mut dealer, &x_clear);
                let (y_0, y_1) = engine.share_vec(&mut dealer, &y_clear);
                let triples = engine.generate_triples(&mut dealer, x_clear.len());
                let (t_0, t_1) = engine.share_triples(&mut dealer, &triples);
                let (x, y, t) = if p.id() == 0 { (x_0, y_0, t_0) } else { (x_1, y_1, t_1) };
                let z = if batched {
                    engine.mul_vec(p, t, &x, &y).unwrap()
                } else {
                    itertools::izip!(t, &x, &y)
                        .map(|(t, x, y)| engine.mul(p, t, *x, *y).unwrap())
                        .collect()
                };
                engine.reconst_vec(p, &z).unwrap()
            });
            assert_eq!(z0, z1);
            z0
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn triple_shares_sum_to_clear_triples() {
        let engine = AdditiveSharing::new(32).unwrap();
        let mut rng = SecureRng::seed_from_u64(31337);
        let triples = engine.generate_triples(&mut rng, 50);
        let (t_0, t_1) = engine.share_triples(&mut rng, &triples);
        for (clear, s_0, s_1) in itertools::izip!(&triples, &t_0, &t_1) {
            assert_eq!(clear.c, clear.a.wrapping_mul(clear.b));
            assert_eq!(s_0.a.wrapping_add(s_1.a), clear.a);
            assert_eq!(s_0.b.wrapping_add(s_1.b), clear.b);
            // the c-shares must recombine to a*b, they are derived, not fresh
            assert_eq!(s_0.c.wrapping_add(s_1.c), clear.c);
        }
    }

    #[test]
    fn share_marginal_is_uniform() {
        // chi-squared over the 256 buckets of k = 8; seeded, so deterministic.
        // 255 degrees of freedom put the 99.9th percentile near 330.
        let engine = AdditiveSharing::new(8).unwrap();
        let mut rng = SecureRng::seed_from_u64(2024);
        const SAMPLES: usize = 1 << 16;
        let mut counts = [0u32; 256];
        for _ in 0..SAMPLES {
            let (s_0, _) = engine.share(&mut rng, 0xAB);
            counts[s_0 as usize] += 1;
        }
        let expected = (SAMPLES / 256) as f64;
        let chi2: f64 = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();
        assert!(chi2 < 330.0, "chi-squared statistic too large: {}", chi2);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let engine = AdditiveSharing::new(32).unwrap();
        let mut rng = SecureRng::seed_from_u64(1);
        let triples = engine.generate_triples(&mut rng, 2);
        // length checks run before any traffic, no connection needed
        let mut party = Party::new(CommInfo::new(0, Ipv4Addr::LOCALHOST, 12345)).unwrap();
        match engine.mul_vec(&mut party, triples.clone(), &[1, 2, 3], &[4, 5]) {
            Err(MpcError::LengthMismatch { .. }) => {}
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
        match engine.mul_vec(&mut party, triples, &[1, 2, 3], &[4, 5, 6]) {
            Err(MpcError::LengthMismatch { .. }) => {}
            other => panic!("expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn random_mults_reconstruct() {
        let ((ok0, ok1), _) = simple_localhost_setup(|p| {
            let engine = AdditiveSharing::new(32).unwrap();
            let mut dealer = SecureRng::seed_from_u64(90210);
            for _ in 0..20 {
                let u = dealer.rand64() as u32;
                let v = dealer.rand64() as u32;
                let (u_0, u_1) = engine.share(&mut dealer, u);
                let (v_0, v_1) = engine.share(&mut dealer, v);
                let triples = engine.generate_triples(&mut dealer, 1);
                let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
                let (us, vs, t) = if p.id() == 0 {
                    (u_0, v_0, t_0.remove(0))
                } else {
                    (u_1, v_1, t_1.remove(0))
                };
                let z = engine.mul(p, t, us, vs).unwrap();
                assert_eq!(engine.reconst(p, z).unwrap(), u.wrapping_mul(v));
            }
            true
        });
        assert!(ok0 && ok1);
    }
}
