//! Small shared helpers: endian-explicit table access and OS randomness.

mod endian;
pub(crate) use endian::{u16_le_at, u32_le_at, u64_le_at};

mod random;
pub(crate) use random::{fill_random, random_u32, random_u64};
