use std::collections::HashSet;

use tracing::debug;

use crate::digest::Xxh3BuildHasher;
use crate::error::{Error, Result};
use crate::mph::bit_vector::BitVector;
use crate::mph::chd::Chd;
use crate::mph::hash::{nextpow2, rhash};
use crate::mph::seed_table::SeedTable;
use crate::utils::random_u64;

/// Seed budget per bucket. The displacement search gives up on a bucket
/// once this many seeds have been rejected; seeds this large would not fit
/// the search's goal of small, compressible values anyway.
pub(crate) const MAX_SEED: u32 = 131_072;

/// Accumulates distinct 64-bit keys and freezes them into a [`Chd`]
/// minimal perfect hash via compress-hash-displace.
///
/// Callers map their native keys (strings, byte blobs, ...) to `u64` with
/// any good hash before feeding them in. A fresh salt is drawn per builder,
/// so two builds over the same key set produce unrelated tables.
pub struct ChdBuilder {
    keys: HashSet<u64, Xxh3BuildHasher>,
    salt: u64,
}

/// Keys that first-level-hash to the same slot, displaced together by one
/// seed.
struct Bucket {
    slot: u64,
    keys: Vec<u64>,
}

impl ChdBuilder {
    /// Creates an empty builder with a fresh random salt.
    pub fn new() -> Self {
        Self {
            keys: HashSet::with_hasher(Xxh3BuildHasher),
            salt: random_u64(),
        }
    }

    /// Adds a key. Fails with [`Error::DuplicateKey`] if it was added
    /// before.
    pub fn add(&mut self, key: u64) -> Result<()> {
        if !self.keys.insert(key) {
            return Err(Error::DuplicateKey(key));
        }
        Ok(())
    }

    /// Number of distinct keys added so far.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no keys have been added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Runs the CHD construction at the given load factor (`0 < load < 1`)
    /// and returns the frozen function.
    ///
    /// Lower loads enlarge the table but make the displacement search
    /// easier. There is no built-in retry: on
    /// [`Error::ConstructionFailed`], start over with a lower load or a new
    /// builder (which draws a new salt).
    pub fn freeze(self, load: f64) -> Result<Chd> {
        if !(load > 0.0 && load < 1.0) {
            return Err(Error::InvalidLoad(load));
        }

        let n = self.keys.len();
        let m = nextpow2((n as f64 / load).ceil() as u64);

        let mut buckets: Vec<Bucket> = (0..m)
            .map(|slot| Bucket {
                slot,
                keys: Vec::new(),
            })
            .collect();
        for &key in &self.keys {
            let b = rhash(0, key, m, self.salt);
            buckets[b as usize].keys.push(key);
        }

        // Hardest buckets first, while the occupancy map is still sparse.
        buckets.sort_unstable_by(|a, b| b.keys.len().cmp(&a.keys.len()));

        let mut seeds = vec![0u32; m as usize];
        let mut occ = BitVector::new(m);
        let mut cur = BitVector::new(m);
        let mut max_seed = 0u32;
        let mut tries = 0u64;

        for bucket in &buckets {
            if bucket.keys.is_empty() {
                // Sorted descending, so every remaining bucket is empty too;
                // their seeds stay 0 and are never consulted.
                break;
            }

            let mut placed = false;
            for s in 1..MAX_SEED {
                cur.reset();
                let mut collided = false;
                for &key in &bucket.keys {
                    let h = rhash(s, key, m, self.salt);
                    if occ.test(h) || cur.test(h) {
                        collided = true;
                        break;
                    }
                    cur.set(h);
                }
                if collided {
                    tries += 1;
                    continue;
                }

                occ.merge(&cur);
                seeds[bucket.slot as usize] = s;
                max_seed = max_seed.max(s);
                placed = true;
                break;
            }

            if !placed {
                return Err(Error::ConstructionFailed(MAX_SEED));
            }
        }

        let table = SeedTable::compact(&seeds, max_seed);
        debug!(
            keys = n,
            table_len = m,
            seed_width = table.seed_size(),
            max_seed,
            retries = tries,
            "froze CHD function"
        );

        Ok(Chd::new(table, self.salt))
    }
}

impl Default for ChdBuilder {
    fn default() -> Self {
        Self::new()
    }
}
